//! Domain events emitted by the engine, in order

use crate::core::{CounterType, EntityId, LossReason, PlayerId, Target};
use crate::game::phase::Step;
use crate::zones::Zone;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    GameStarted { first_player: PlayerId },
    Mulligan { player: PlayerId, count: u32 },
    HandKept { player: PlayerId, bottomed: usize },
    TurnBegan { player: PlayerId, turn: u32 },
    StepBegan { step: Step, active_player: PlayerId },
    PriorityPassed { player: PlayerId },

    LandPlayed { player: PlayerId, card: EntityId },
    SpellCast { player: PlayerId, spell: EntityId },
    AbilityActivated { player: PlayerId, source: EntityId, ability: EntityId },
    ManaAbilityActivated { player: PlayerId, source: EntityId },
    TriggerPutOnStack { controller: PlayerId, source: EntityId, ability: EntityId },
    TriggerRemoved { controller: PlayerId, source: EntityId },
    Resolved { id: EntityId },
    Fizzled { id: EntityId },
    Countered { id: EntityId },

    ZoneChanged { entity: EntityId, from: Option<Zone>, to: Zone },
    EnteredBattlefield { entity: EntityId, controller: PlayerId },
    /// A creature went from the battlefield to a graveyard
    Died { entity: EntityId, controller: PlayerId },
    TokenCeased { entity: EntityId },
    Shuffled { player: PlayerId },

    DamageDealt { source: EntityId, target: Target, amount: u32, combat: bool },
    LifeGained { player: PlayerId, amount: u32 },
    LifeLost { player: PlayerId, amount: u32 },
    PoisonAdded { player: PlayerId, amount: u32 },
    CardDrawn { player: PlayerId, card: EntityId },
    Discarded { player: PlayerId, card: EntityId },
    Tapped { entity: EntityId },
    Untapped { entity: EntityId },
    CountersAdded { entity: EntityId, counter: CounterType, amount: u32 },
    CountersRemoved { entity: EntityId, counter: CounterType, amount: u32 },
    ManaAdded { player: PlayerId, amount: u32 },
    Attached { entity: EntityId, to: EntityId },
    ControlChanged { entity: EntityId, controller: PlayerId },
    ReplacementApplied { source: EntityId },

    AttackersDeclared { player: PlayerId, attackers: Vec<EntityId> },
    BlockersDeclared { player: PlayerId, blocks: Vec<(EntityId, EntityId)> },

    DecisionRequested { player: PlayerId, decision_id: u64 },
    DecisionResolved { player: PlayerId, decision_id: u64 },

    PlayerLost { player: PlayerId, reason: LossReason },
    GameWon { player: PlayerId },
    GameDrawn,
}

impl fmt::Display for GameEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameEvent::GameStarted { first_player } => write!(f, "game started, {} goes first", first_player),
            GameEvent::Mulligan { player, count } => write!(f, "{} mulligans ({})", player, count),
            GameEvent::HandKept { player, bottomed } => {
                write!(f, "{} keeps, {} card(s) to the bottom", player, bottomed)
            }
            GameEvent::TurnBegan { player, turn } => write!(f, "turn {} ({})", turn, player),
            GameEvent::StepBegan { step, .. } => write!(f, "step {}", step),
            GameEvent::PriorityPassed { player } => write!(f, "{} passes", player),
            GameEvent::LandPlayed { player, card } => write!(f, "{} plays land {}", player, card),
            GameEvent::SpellCast { player, spell } => write!(f, "{} casts {}", player, spell),
            GameEvent::AbilityActivated { player, source, .. } => {
                write!(f, "{} activates an ability of {}", player, source)
            }
            GameEvent::ManaAbilityActivated { player, source } => {
                write!(f, "{} taps {} for mana", player, source)
            }
            GameEvent::TriggerPutOnStack { source, .. } => write!(f, "trigger of {} on the stack", source),
            GameEvent::TriggerRemoved { source, .. } => write!(f, "trigger of {} has no legal targets", source),
            GameEvent::Resolved { id } => write!(f, "{} resolves", id),
            GameEvent::Fizzled { id } => write!(f, "{} fizzles", id),
            GameEvent::Countered { id } => write!(f, "{} is countered", id),
            GameEvent::ZoneChanged { entity, from, to } => match from {
                Some(from) => write!(f, "{} moves {} -> {}", entity, from, to),
                None => write!(f, "{} created in {}", entity, to),
            },
            GameEvent::EnteredBattlefield { entity, controller } => {
                write!(f, "{} enters the battlefield under {}", entity, controller)
            }
            GameEvent::Died { entity, .. } => write!(f, "{} dies", entity),
            GameEvent::TokenCeased { entity } => write!(f, "token {} ceases to exist", entity),
            GameEvent::Shuffled { player } => write!(f, "{} shuffles", player),
            GameEvent::DamageDealt { source, target, amount, .. } => {
                write!(f, "{} deals {} damage to {:?}", source, amount, target)
            }
            GameEvent::LifeGained { player, amount } => write!(f, "{} gains {} life", player, amount),
            GameEvent::LifeLost { player, amount } => write!(f, "{} loses {} life", player, amount),
            GameEvent::PoisonAdded { player, amount } => write!(f, "{} gets {} poison", player, amount),
            GameEvent::CardDrawn { player, card } => write!(f, "{} draws {}", player, card),
            GameEvent::Discarded { player, card } => write!(f, "{} discards {}", player, card),
            GameEvent::Tapped { entity } => write!(f, "{} taps", entity),
            GameEvent::Untapped { entity } => write!(f, "{} untaps", entity),
            GameEvent::CountersAdded { entity, counter, amount } => {
                write!(f, "{} gets {} {} counter(s)", entity, amount, counter)
            }
            GameEvent::CountersRemoved { entity, counter, amount } => {
                write!(f, "{} loses {} {} counter(s)", entity, amount, counter)
            }
            GameEvent::ManaAdded { player, amount } => write!(f, "{} adds {} mana", player, amount),
            GameEvent::Attached { entity, to } => write!(f, "{} attached to {}", entity, to),
            GameEvent::ControlChanged { entity, controller } => {
                write!(f, "{} now controlled by {}", entity, controller)
            }
            GameEvent::ReplacementApplied { source } => write!(f, "replacement from {} applies", source),
            GameEvent::AttackersDeclared { player, attackers } => {
                write!(f, "{} attacks with {} creature(s)", player, attackers.len())
            }
            GameEvent::BlockersDeclared { player, blocks } => {
                write!(f, "{} declares {} block(s)", player, blocks.len())
            }
            GameEvent::DecisionRequested { player, decision_id } => {
                write!(f, "waiting for {} (decision {})", player, decision_id)
            }
            GameEvent::DecisionResolved { player, decision_id } => {
                write!(f, "{} answered decision {}", player, decision_id)
            }
            GameEvent::PlayerLost { player, reason } => write!(f, "{} loses ({:?})", player, reason),
            GameEvent::GameWon { player } => write!(f, "{} wins the game", player),
            GameEvent::GameDrawn => write!(f, "the game is a draw"),
        }
    }
}
