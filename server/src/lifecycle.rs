//! Match orchestration: wait for every player to be ready, play the rounds
//! at a fixed tick period, score them and declare the match winner.

use crate::config::GameConfig;
use crate::game::{Arena, CollisionCause};
use crate::roster::{Outbound, Roster, SharedRoster};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{round_over, PlayerId, PlayerUpdate};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, sleep, MissedTickBehavior};

/// Match-wide phase, published to every connection handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    Lobby,
    Playing,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    Winner(PlayerId),
    /// Everybody died in the same tick
    Draw,
    /// A lone player's cycle died
    SoloOver,
}

/// Decides whether a round is over given the players still alive.
pub fn round_outcome(total_players: usize, alive: &[PlayerId]) -> Option<RoundOutcome> {
    if !round_over(total_players, alive.len()) {
        return None;
    }

    if total_players == 1 {
        return Some(RoundOutcome::SoloOver);
    }

    Some(match alive.first() {
        Some(&winner) => RoundOutcome::Winner(winner),
        None => RoundOutcome::Draw,
    })
}

/// Picks the match winner from `(id, score)` pairs in id order.
///
/// The first player holding the highest score wins, so tied leaders are
/// resolved in favour of the lowest id rather than reported as a draw.
pub fn match_winner(scores: &[(PlayerId, u32)]) -> Option<PlayerId> {
    let (&(first_id, first_score), rest) = scores.split_first()?;

    let (winner, _) = rest
        .iter()
        .fold((first_id, first_score), |(best_id, best), &(id, score)| {
            if score > best {
                (id, score)
            } else {
                (best_id, best)
            }
        });

    Some(winner)
}

#[derive(Debug, Clone)]
pub struct MatchState {
    pub rounds_played: u32,
    pub rounds_total: u32,
}

impl MatchState {
    pub fn new(rounds_total: u32) -> Self {
        Self {
            rounds_played: 0,
            rounds_total,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.rounds_played >= self.rounds_total
    }

    /// Counts a finished round and credits its winner
    pub fn record_round(&mut self, outcome: RoundOutcome, roster: &mut Roster) {
        if let RoundOutcome::Winner(id) = outcome {
            roster.award_point(id);
        }
        self.rounds_played += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSummary {
    pub rounds_played: u32,
    pub scores: Vec<(PlayerId, u32)>,
    pub winner: Option<PlayerId>,
}

/// Drives a whole match once the lobby is complete
pub struct MatchRunner {
    roster: SharedRoster,
    phase: Arc<watch::Sender<MatchPhase>>,
    config: GameConfig,
    state: MatchState,
}

impl MatchRunner {
    pub fn new(
        roster: SharedRoster,
        phase: Arc<watch::Sender<MatchPhase>>,
        config: GameConfig,
    ) -> Self {
        let state = MatchState::new(config.rounds_total);
        Self {
            roster,
            phase,
            config,
            state,
        }
    }

    async fn wait_for_players(&self) {
        let mut phase = self.phase.subscribe();
        while *phase.borrow_and_update() == MatchPhase::Lobby {
            // The sender lives in `self`, so this only fails if it is dropped.
            if phase.changed().await.is_err() {
                return;
            }
        }
    }

    /// Plays every round of the match and returns the final standings
    pub async fn run(mut self) -> MatchSummary {
        self.wait_for_players().await;

        let player_count = self.roster.lock().await.len();
        let mut rng = match self.config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        info!("Match started with {} players", player_count);

        while !self.state.is_terminal() {
            let mut arena = Arena::spawn(player_count, &mut rng);
            info!(
                "Starting round {} of {}",
                self.state.rounds_played + 1,
                self.state.rounds_total
            );

            let outcome = self.play_round(&mut arena).await;
            {
                let mut roster = self.roster.lock().await;
                self.state.record_round(outcome, &mut roster);
            }
            match outcome {
                RoundOutcome::Winner(id) => info!(
                    "Round {} over after {} ticks, player {} wins",
                    self.state.rounds_played,
                    arena.tick_count(),
                    id
                ),
                RoundOutcome::Draw => info!(
                    "Round {} over after {} ticks, draw",
                    self.state.rounds_played,
                    arena.tick_count()
                ),
                RoundOutcome::SoloOver => info!(
                    "Round {} over after {} ticks",
                    self.state.rounds_played,
                    arena.tick_count()
                ),
            }

            // Let clients show the final frame before trails are cleared.
            sleep(self.config.round_pause).await;

            let mut roster = self.roster.lock().await;
            roster.reset_directions();
            roster.broadcast(Outbound::NewRound);
        }

        let scores = self.roster.lock().await.scores();
        let winner = match_winner(&scores);
        match winner {
            Some(id) => info!("Match over, player {} wins with scores {:?}", id, scores),
            None => info!("Match over without players"),
        }

        self.phase.send_replace(MatchPhase::Finished);

        MatchSummary {
            rounds_played: self.state.rounds_played,
            scores,
            winner,
        }
    }

    /// Ticks the arena until the round is decided
    async fn play_round(&self, arena: &mut Arena) -> RoundOutcome {
        let mut ticker = interval(self.config.tick_duration);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            let directions = self.roster.lock().await.directions();
            for collision in arena.tick(&directions) {
                match collision.cause {
                    CollisionCause::Wall => {
                        info!("Player {} hit a wall", collision.player)
                    }
                    CollisionCause::Trail(owner) => info!(
                        "Player {} collided with the trail of player {}",
                        collision.player, owner
                    ),
                }
            }

            // The snapshot is taken after the whole tick, so broadcasts never
            // observe a half-applied tick.
            let snapshot: Arc<[PlayerUpdate]> = arena.snapshot().into();
            let delivered = self.roster.lock().await.broadcast(Outbound::Tick(snapshot));
            if arena.tick_count() % 200 == 0 {
                debug!(
                    "Tick {}: {} alive, snapshot delivered to {} connections",
                    arena.tick_count(),
                    arena.alive_count(),
                    delivered
                );
            }

            if let Some(outcome) = round_outcome(arena.player_count(), &arena.alive_ids()) {
                return outcome;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Cycle;
    use shared::PLAYER_RADIUS;
    use std::net::SocketAddr;
    use std::time::Duration;
    use crate::roster::{outbound_channel, OutboundReceiver};

    fn roster_with(players: usize) -> (Roster, Vec<OutboundReceiver>) {
        let mut roster = Roster::new(8);
        let mut receivers = Vec::new();
        for i in 0..players {
            let (tx, rx) = outbound_channel();
            let addr = SocketAddr::from(([127, 0, 0, 1], 7000 + i as u16));
            roster.add_player(addr, tx).unwrap();
            receivers.push(rx);
        }
        (roster, receivers)
    }

    fn fast_config(rounds: u32) -> GameConfig {
        GameConfig::default()
            .with_tick_duration(Duration::from_millis(1))
            .with_round_pause(Duration::from_millis(1))
            .with_rounds(rounds)
            .with_seed(11)
    }

    #[test]
    fn test_round_continues_with_two_of_three_alive() {
        assert_eq!(round_outcome(3, &[0, 2]), None);
    }

    #[test]
    fn test_round_ends_with_one_of_three_alive() {
        assert_eq!(round_outcome(3, &[2]), Some(RoundOutcome::Winner(2)));
    }

    #[test]
    fn test_round_draw_when_everyone_dies() {
        assert_eq!(round_outcome(2, &[]), Some(RoundOutcome::Draw));
    }

    #[test]
    fn test_single_player_round() {
        assert_eq!(round_outcome(1, &[0]), None);
        assert_eq!(round_outcome(1, &[]), Some(RoundOutcome::SoloOver));
    }

    #[test]
    fn test_match_terminal_after_all_rounds() {
        let (mut roster, _rx) = roster_with(2);
        let mut state = MatchState::new(2);

        assert!(!state.is_terminal());
        state.record_round(RoundOutcome::Draw, &mut roster);
        assert!(!state.is_terminal());
        state.record_round(RoundOutcome::Winner(1), &mut roster);
        assert!(state.is_terminal());
        assert_eq!(state.rounds_played, 2);
    }

    #[test]
    fn test_draw_grants_no_point() {
        let (mut roster, _rx) = roster_with(3);
        let mut state = MatchState::new(3);

        state.record_round(RoundOutcome::Winner(1), &mut roster);
        state.record_round(RoundOutcome::Draw, &mut roster);
        state.record_round(RoundOutcome::Winner(1), &mut roster);

        assert!(state.is_terminal());
        assert_eq!(roster.scores(), vec![(0, 0), (1, 2), (2, 0)]);
        assert_eq!(match_winner(&roster.scores()), Some(1));
    }

    #[test]
    fn test_match_winner_prefers_first_of_tied_leaders() {
        assert_eq!(match_winner(&[(0, 1), (1, 3), (2, 3)]), Some(1));
        assert_eq!(match_winner(&[(0, 0), (1, 0)]), Some(0));
        assert_eq!(match_winner(&[(0, 2), (1, 5), (2, 4)]), Some(1));
        assert_eq!(match_winner(&[]), None);
    }

    #[tokio::test]
    async fn test_play_round_broadcasts_until_winner() {
        let (roster, mut receivers) = roster_with(2);
        let roster = Arc::new(tokio::sync::Mutex::new(roster));
        let (phase, _) = watch::channel(MatchPhase::Playing);
        let runner = MatchRunner::new(Arc::clone(&roster), Arc::new(phase), fast_config(1));

        // Player 0 is two ticks from the left wall, player 1 cruises in the middle.
        let mut arena = Arena::new(vec![
            Cycle::new(PLAYER_RADIUS + 5.0, 300.0, 180),
            Cycle::new(500.0, 350.0, 90),
        ]);

        let outcome = runner.play_round(&mut arena).await;
        assert_eq!(outcome, RoundOutcome::Winner(1));
        assert_eq!(arena.tick_count(), 2);

        for rx in receivers.iter_mut() {
            let mut ticks = Vec::new();
            while let Ok(Outbound::Tick(updates)) = rx.try_recv() {
                ticks.push(updates);
            }
            assert_eq!(ticks.len(), 2);
            assert!(ticks[0][0].alive);
            assert!(!ticks[1][0].alive);
            assert!(ticks[1][1].alive);
        }
    }

    #[tokio::test]
    async fn test_full_match_runs_every_round() {
        let (mut roster, _receivers) = roster_with(2);
        roster.mark_ready(0);
        roster.mark_ready(1);
        let roster = Arc::new(tokio::sync::Mutex::new(roster));
        let (phase, mut phase_rx) = watch::channel(MatchPhase::Playing);

        let runner = MatchRunner::new(Arc::clone(&roster), Arc::new(phase), fast_config(3));
        let summary = runner.run().await;

        assert_eq!(summary.rounds_played, 3);
        assert_eq!(summary.scores.len(), 2);
        let total: u32 = summary.scores.iter().map(|(_, score)| score).sum();
        assert!(total <= 3);
        assert!(summary.winner.is_some());
        assert_eq!(*phase_rx.borrow_and_update(), MatchPhase::Finished);
    }
}
