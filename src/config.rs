//! Game configuration

use serde::{Deserialize, Serialize};

/// Tunable parameters of a single game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub starting_life: i32,
    pub opening_hand_size: usize,
    pub max_hand_size: usize,
    pub poison_limit: u32,
    pub lands_per_turn: u32,
    /// The player who goes first skips the draw of their first turn
    pub skip_first_draw: bool,
    /// London mulligan before the first turn
    pub mulligans_enabled: bool,
    /// Seed for the game RNG (library shuffles)
    pub seed: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig {
            starting_life: 20,
            opening_hand_size: 7,
            max_hand_size: 7,
            poison_limit: 10,
            lands_per_turn: 1,
            skip_first_draw: true,
            mulligans_enabled: true,
            seed: 0,
        }
    }
}

impl GameConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_starting_life(mut self, life: i32) -> Self {
        self.starting_life = life;
        self
    }

    pub fn without_mulligans(mut self) -> Self {
        self.mulligans_enabled = false;
        self
    }
}
