//! Turn phases, steps and the turn/priority bookkeeping

use crate::core::PlayerId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Major phases of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Beginning,
    PreCombatMain,
    Combat,
    PostCombatMain,
    Ending,
}

/// Specific steps within phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Step {
    // Beginning Phase
    Untap,
    Upkeep,
    Draw,

    // Pre-Combat Main Phase
    Main1,

    // Combat Phase
    BeginCombat,
    DeclareAttackers,
    DeclareBlockers,
    CombatDamage,
    EndCombat,

    // Post-Combat Main Phase
    Main2,

    // Ending Phase
    End,
    Cleanup,
}

impl Step {
    pub fn phase(&self) -> Phase {
        match self {
            Step::Untap | Step::Upkeep | Step::Draw => Phase::Beginning,
            Step::Main1 => Phase::PreCombatMain,
            Step::BeginCombat
            | Step::DeclareAttackers
            | Step::DeclareBlockers
            | Step::CombatDamage
            | Step::EndCombat => Phase::Combat,
            Step::Main2 => Phase::PostCombatMain,
            Step::End | Step::Cleanup => Phase::Ending,
        }
    }

    /// Next step in turn order; None after Cleanup
    pub fn next(&self) -> Option<Step> {
        match self {
            Step::Untap => Some(Step::Upkeep),
            Step::Upkeep => Some(Step::Draw),
            Step::Draw => Some(Step::Main1),
            Step::Main1 => Some(Step::BeginCombat),
            Step::BeginCombat => Some(Step::DeclareAttackers),
            Step::DeclareAttackers => Some(Step::DeclareBlockers),
            Step::DeclareBlockers => Some(Step::CombatDamage),
            Step::CombatDamage => Some(Step::EndCombat),
            Step::EndCombat => Some(Step::Main2),
            Step::Main2 => Some(Step::End),
            Step::End => Some(Step::Cleanup),
            Step::Cleanup => None,
        }
    }

    pub fn is_main(&self) -> bool {
        matches!(self, Step::Main1 | Step::Main2)
    }

    /// Untap and Cleanup normally give no player priority
    pub fn has_priority(&self) -> bool {
        !matches!(self, Step::Untap | Step::Cleanup)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Turn and priority state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnStructure {
    /// Current turn number (starts at 1)
    pub turn_number: u32,
    pub current_step: Step,
    /// Whose turn it is
    pub active_player: PlayerId,
    /// The player who took the first turn of the game
    pub first_player: PlayerId,
    /// Who currently holds priority; None while no player may act
    pub priority_player: Option<PlayerId>,
    /// Passes in a row since the last action or stack change
    pub consecutive_passes: u32,
    /// Mulligans are being decided; turn 1 has not begun
    pub pregame: bool,
}

impl TurnStructure {
    pub fn new(starting_player: PlayerId) -> Self {
        TurnStructure {
            turn_number: 1,
            current_step: Step::Untap,
            active_player: starting_player,
            first_player: starting_player,
            priority_player: None,
            consecutive_passes: 0,
            pregame: false,
        }
    }

    pub fn current_phase(&self) -> Phase {
        self.current_step.phase()
    }

    pub fn is_first_turn(&self) -> bool {
        self.turn_number == 1
    }

    /// Give priority to a player and restart the pass count
    pub fn give_priority(&mut self, player: PlayerId) {
        self.priority_player = Some(player);
        self.consecutive_passes = 0;
    }

    pub fn start_turn(&mut self, player: PlayerId) {
        self.turn_number += 1;
        self.current_step = Step::Untap;
        self.active_player = player;
        self.priority_player = None;
        self.consecutive_passes = 0;
    }
}
