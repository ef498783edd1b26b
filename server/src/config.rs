//! Runtime tunables for a match.
//!
//! Defaults reproduce the reference arena timing; tests shorten the tick and
//! pause durations to run whole matches in milliseconds.

use shared::{ROUNDS_PER_MATCH, ROUND_PAUSE_MILLIS, TICK_MILLIS};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Period of one simulation tick
    pub tick_duration: Duration,
    /// Pause after a round ends, before the next one is seeded
    pub round_pause: Duration,
    pub rounds_total: u32,
    /// Upper bound on registered players; ids are a single byte
    pub max_players: usize,
    /// Fixed seed for spawn positions, random when `None`
    pub rng_seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tick_duration: Duration::from_millis(TICK_MILLIS),
            round_pause: Duration::from_millis(ROUND_PAUSE_MILLIS),
            rounds_total: ROUNDS_PER_MATCH,
            max_players: usize::from(u8::MAX),
            rng_seed: None,
        }
    }
}

impl GameConfig {
    pub fn with_tick_duration(mut self, tick_duration: Duration) -> Self {
        self.tick_duration = tick_duration;
        self
    }

    pub fn with_round_pause(mut self, round_pause: Duration) -> Self {
        self.round_pause = round_pause;
        self
    }

    pub fn with_rounds(mut self, rounds_total: u32) -> Self {
        self.rounds_total = rounds_total;
        self
    }

    pub fn with_max_players(mut self, max_players: usize) -> Self {
        self.max_players = max_players.min(usize::from(u8::MAX));
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }
}
