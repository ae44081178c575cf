//! Player representation

use crate::core::{ManaPool, PlayerId, PlayerName};
use serde::{Deserialize, Serialize};

/// Why a player lost the game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LossReason {
    ZeroLife,
    Poison,
    DrewFromEmptyLibrary,
    Conceded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: PlayerName,
    pub life: i32,
    pub poison: u32,
    pub mana_pool: ManaPool,

    /// Set by state-based actions (or conceding); never cleared
    pub has_lost: bool,
    pub loss_reason: Option<LossReason>,

    /// Attempted to draw from an empty library since the last SBA check
    pub drew_from_empty_library: bool,

    pub lands_played_this_turn: u32,
    pub max_lands_per_turn: u32,

    pub mulligans_taken: u32,
    pub has_kept_hand: bool,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<PlayerName>, starting_life: i32) -> Self {
        Player {
            id,
            name: name.into(),
            life: starting_life,
            poison: 0,
            mana_pool: ManaPool::new(),
            has_lost: false,
            loss_reason: None,
            drew_from_empty_library: false,
            lands_played_this_turn: 0,
            max_lands_per_turn: 1,
            mulligans_taken: 0,
            has_kept_hand: false,
        }
    }

    pub fn gain_life(&mut self, amount: i32) {
        self.life += amount;
    }

    /// Life loss only; losing the game is decided by state-based actions
    pub fn lose_life(&mut self, amount: i32) {
        self.life -= amount;
    }

    pub fn mark_lost(&mut self, reason: LossReason) {
        if !self.has_lost {
            self.has_lost = true;
            self.loss_reason = Some(reason);
        }
    }

    pub fn is_in_game(&self) -> bool {
        !self.has_lost
    }

    pub fn can_play_land(&self) -> bool {
        self.lands_played_this_turn < self.max_lands_per_turn
    }

    pub fn play_land(&mut self) {
        self.lands_played_this_turn += 1;
    }

    pub fn reset_lands_played(&mut self) {
        self.lands_played_this_turn = 0;
    }

    pub fn empty_mana_pool(&mut self) {
        self.mana_pool.clear();
    }
}
