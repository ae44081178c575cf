//! Resumption frames for paused computations
//!
//! Asking a player something pushes a frame describing exactly what to do with
//! the answer. Frames form a stack: a decision raised while another frame is
//! still open is answered (and its frame consumed) first. Some frames do not
//! wait for an answer at all; they run once every frame above them is done.

use crate::core::{EntityId, PlayerId};
use crate::game::combat::{self, DamagePass};
use crate::game::context::{EngineContext, Flow};
use crate::game::decision::{DecisionKind, DecisionResponse};
use crate::game::events::GameEvent;
use crate::game::executor::{self, EffectFrame};
use crate::game::state::GameState;
use crate::game::triggers::{self, PendingTrigger};
use crate::game::turn;
use crate::{Result, RulesError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Continuation {
    /// A resolving effect tree
    Effect(EffectFrame),
    /// A player orders their simultaneous triggers
    TriggerOrder { player: PlayerId },
    /// Targets for a trigger about to go on the stack
    TriggerTargets { trigger: PendingTrigger },
    /// Damage-assignment order of the creatures blocking an attacker
    BlockerOrder { attacker: EntityId },
    /// A combat damage pass waiting for a damage assignment
    CombatDamage(DamagePass),
    /// Discarding down to maximum hand size
    CleanupDiscard { player: PlayerId },
    /// The rest of the cleanup step, run after the discard
    FinishCleanup,
}

impl Continuation {
    /// Whether this frame consumes a decision response
    pub fn awaits_decision(&self) -> bool {
        match self {
            Continuation::Effect(frame) => frame.awaiting.is_some(),
            Continuation::CombatDamage(pass) => pass.current.is_some(),
            Continuation::FinishCleanup => false,
            _ => true,
        }
    }
}

/// Request a decision and pause
pub fn ask(
    game: &mut GameState,
    cx: &mut EngineContext,
    player: PlayerId,
    kind: DecisionKind,
    source: Option<EntityId>,
    prompt: impl Into<String>,
    frame: Continuation,
) -> Flow {
    let decision_id = game.request_decision(player, kind, source, prompt, frame);
    cx.emit(GameEvent::DecisionRequested { player, decision_id });
    Flow::Paused
}

/// Feed a validated response to the frame that asked for it
pub fn resume(
    game: &mut GameState,
    cx: &mut EngineContext,
    frame: Continuation,
    response: DecisionResponse,
) -> Result<Flow> {
    match frame {
        Continuation::Effect(frame) => executor::resume_frame(game, cx, frame, response),
        Continuation::TriggerOrder { player } => match response {
            DecisionResponse::Order(order) => {
                triggers::apply_order(game, player, &order);
                Ok(Flow::Continue)
            }
            _ => Err(RulesError::DecisionMismatch("expected a trigger order".into())),
        },
        Continuation::TriggerTargets { trigger } => match response {
            DecisionResponse::Targets(targets) => Ok(triggers::put_with_targets(game, cx, trigger, targets)),
            _ => Err(RulesError::DecisionMismatch("expected targets".into())),
        },
        Continuation::BlockerOrder { attacker } => match response {
            DecisionResponse::Order(order) => {
                combat::apply_blocker_order(game, attacker, &order);
                Ok(combat::order_blockers(game, cx))
            }
            _ => Err(RulesError::DecisionMismatch("expected a blocker order".into())),
        },
        Continuation::CombatDamage(pass) => match response {
            DecisionResponse::DamageAssignment(assignment) => Ok(combat::resume_pass(game, cx, pass, assignment)),
            _ => Err(RulesError::DecisionMismatch("expected a damage assignment".into())),
        },
        Continuation::CleanupDiscard { player } => match response {
            DecisionResponse::Cards(cards) => {
                turn::discard_to_hand_size(game, cx, player, &cards);
                Ok(Flow::Continue)
            }
            _ => Err(RulesError::DecisionMismatch("expected cards to discard".into())),
        },
        Continuation::FinishCleanup => run_deferred(game, cx, Continuation::FinishCleanup),
    }
}

/// Run a frame that does not wait for an answer
pub fn run_deferred(game: &mut GameState, cx: &mut EngineContext, frame: Continuation) -> Result<Flow> {
    match frame {
        Continuation::FinishCleanup => turn::finish_cleanup(game, cx),
        Continuation::Effect(frame) => Ok(executor::run_frame(game, cx, frame)),
        other => Err(RulesError::DecisionMismatch(format!("frame {:?} needs a decision", other))),
    }
}

/// Run deferred frames left on top of the stack until one pauses
pub fn drain(game: &mut GameState, cx: &mut EngineContext) -> Result<Flow> {
    while game.pending_decision.is_none() && !game.game_over {
        match game.continuations.last() {
            Some(frame) if !frame.awaits_decision() => {}
            _ => break,
        }
        let Some(frame) = game.continuations.pop() else { break };
        if run_deferred(game, cx, frame)?.is_paused() {
            return Ok(Flow::Paused);
        }
    }
    Ok(Flow::Continue)
}
