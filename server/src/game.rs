//! Authoritative light-cycle simulation for one round.
//!
//! The arena owns every cycle's heading, position and trail. A tick extends
//! trails with the previous positions, integrates motion, then resolves
//! collisions against the trails as they stood before any death this tick.

use crate::physics::{hits_wall, Trail, Vector2};
use log::debug;
use rand::Rng;
use shared::{
    Direction, PlayerId, PlayerUpdate, CYCLE_SPEED, SPAWN_MARGIN, WORLD_HEIGHT, WORLD_WIDTH,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionCause {
    Wall,
    /// Ran into the trail of the given player, possibly its own
    Trail(PlayerId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collision {
    pub player: PlayerId,
    pub cause: CollisionCause,
}

/// One player's cycle for the current round
#[derive(Debug, Clone)]
pub struct Cycle {
    /// Heading in whole degrees, kept in `0..360`
    pub heading: i32,
    pub position: Vector2,
    pub alive: bool,
    pub trail: Trail,
}

impl Cycle {
    pub fn new(x: f64, y: f64, heading: i32) -> Self {
        Self {
            heading: heading.rem_euclid(360),
            position: Vector2::new(x, y),
            alive: true,
            trail: Trail::new(),
        }
    }

    fn advance(&mut self, direction: Direction) {
        self.heading = (self.heading + direction.turn_degrees()).rem_euclid(360);

        let radians = f64::from(self.heading).to_radians();
        self.position.x += radians.cos() * CYCLE_SPEED;
        self.position.y += radians.sin() * CYCLE_SPEED;
    }

    pub fn update(&self) -> PlayerUpdate {
        PlayerUpdate {
            alive: self.alive,
            x: self.position.x,
            y: self.position.y,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Arena {
    cycles: Vec<Cycle>,
    tick: u64,
}

impl Arena {
    /// Builds an arena from explicit cycles, indexed by player id
    pub fn new(cycles: Vec<Cycle>) -> Self {
        Self { cycles, tick: 0 }
    }

    /// Seeds a fresh round: every cycle starts inside the spawn margin with a
    /// random heading and an empty trail.
    pub fn spawn<R: Rng>(player_count: usize, rng: &mut R) -> Self {
        let cycles = (0..player_count)
            .map(|_| {
                let x = rng
                    .gen_range(SPAWN_MARGIN..WORLD_WIDTH - SPAWN_MARGIN)
                    .floor();
                let y = rng
                    .gen_range(SPAWN_MARGIN..WORLD_HEIGHT - SPAWN_MARGIN)
                    .floor();
                let heading = rng.gen_range(0..360);
                Cycle::new(x, y, heading)
            })
            .collect();

        Self::new(cycles)
    }

    /// Advances the round by one tick.
    ///
    /// `directions` is indexed by player id; missing entries steer straight.
    /// Returns the collisions that killed a cycle during this tick.
    pub fn tick(&mut self, directions: &[Direction]) -> Vec<Collision> {
        self.tick += 1;

        for cycle in self.cycles.iter_mut().filter(|c| c.alive) {
            let previous = cycle.position;
            cycle.trail.push(previous);
        }

        for (index, cycle) in self.cycles.iter_mut().enumerate() {
            if cycle.alive {
                cycle.advance(directions.get(index).copied().unwrap_or_default());
            }
        }

        let collisions: Vec<Collision> = self
            .cycles
            .iter()
            .enumerate()
            .filter(|(_, cycle)| cycle.alive)
            .filter_map(|(index, cycle)| {
                self.collision_at(&cycle.position).map(|cause| Collision {
                    player: index as PlayerId,
                    cause,
                })
            })
            .collect();

        for collision in &collisions {
            self.cycles[usize::from(collision.player)].alive = false;
            debug!(
                "Tick {}: player {} died ({:?})",
                self.tick, collision.player, collision.cause
            );
        }

        collisions
    }

    fn collision_at(&self, position: &Vector2) -> Option<CollisionCause> {
        if hits_wall(position) {
            return Some(CollisionCause::Wall);
        }

        self.cycles
            .iter()
            .position(|other| other.trail.contains(position))
            .map(|owner| CollisionCause::Trail(owner as PlayerId))
    }

    /// Per-player state after the latest tick, in ascending id order
    pub fn snapshot(&self) -> Vec<PlayerUpdate> {
        self.cycles.iter().map(Cycle::update).collect()
    }

    pub fn alive_ids(&self) -> Vec<PlayerId> {
        self.cycles
            .iter()
            .enumerate()
            .filter(|(_, cycle)| cycle.alive)
            .map(|(index, _)| index as PlayerId)
            .collect()
    }

    pub fn alive_count(&self) -> usize {
        self.cycles.iter().filter(|c| c.alive).count()
    }

    pub fn player_count(&self) -> usize {
        self.cycles.len()
    }

    pub fn cycles(&self) -> &[Cycle] {
        &self.cycles
    }

    pub fn cycle(&self, id: PlayerId) -> Option<&Cycle> {
        self.cycles.get(usize::from(id))
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }
}
