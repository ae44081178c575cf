//! Player actions and their handlers
//!
//! Every action names the player taking it. [`apply`] validates an action
//! against the current state and performs it; a validation failure leaves
//! the caller to discard the partially-updated state (the engine always
//! works on a copy).

use crate::core::{
    AbilityKind, AbilityOnStack, Color, Cost, Counters, EntityId, LossReason, PlayerId, Tapped, Target,
};
use crate::game::combat;
use crate::game::context::{EngineContext, Flow};
use crate::game::continuation;
use crate::game::decision::DecisionResponse;
use crate::game::events::GameEvent;
use crate::game::hand_setup;
use crate::game::layers::Projection;
use crate::game::legality;
use crate::game::mana_engine::{self, Payment};
use crate::game::replacement;
use crate::game::sba;
use crate::game::stack;
use crate::game::state::GameState;
use crate::game::targeting::{self, TargetSource};
use crate::game::turn;
use crate::zones::Zone;
use crate::{Result, RulesError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Action {
    PassPriority {
        player: PlayerId,
    },

    /// Play a land from hand
    PlayLand {
        player: PlayerId,
        card: EntityId,
    },

    /// Cast a spell from hand; one target list per target slot
    CastSpell {
        player: PlayerId,
        card: EntityId,
        #[serde(default)]
        targets: Vec<Vec<Target>>,
        #[serde(default)]
        x_value: u32,
        #[serde(default)]
        payment: Payment,
    },

    /// Activate a non-mana ability of a permanent
    ActivateAbility {
        player: PlayerId,
        source: EntityId,
        index: usize,
        #[serde(default)]
        targets: Vec<Vec<Target>>,
        #[serde(default)]
        x_value: u32,
        #[serde(default)]
        payment: Payment,
        /// Permanents sacrificed to pay the cost
        #[serde(default)]
        sacrifice: Vec<EntityId>,
    },

    /// Activate a mana ability; resolves immediately
    ActivateManaAbility {
        player: PlayerId,
        source: EntityId,
        index: usize,
        #[serde(default)]
        color: Option<Color>,
    },

    /// Attacking creatures with the player each one attacks
    DeclareAttackers {
        player: PlayerId,
        attackers: Vec<(EntityId, PlayerId)>,
    },

    /// (blocker, attacker) pairs
    DeclareBlockers {
        player: PlayerId,
        blocks: Vec<(EntityId, EntityId)>,
    },

    SubmitDecision {
        player: PlayerId,
        decision_id: u64,
        response: DecisionResponse,
    },

    Concede {
        player: PlayerId,
    },

    Mulligan {
        player: PlayerId,
    },

    /// Keep the hand, putting one card per mulligan taken on the bottom
    KeepHand {
        player: PlayerId,
        #[serde(default)]
        bottom: Vec<EntityId>,
    },
}

impl Action {
    /// The acting player
    pub fn player(&self) -> PlayerId {
        match self {
            Action::PassPriority { player }
            | Action::PlayLand { player, .. }
            | Action::CastSpell { player, .. }
            | Action::ActivateAbility { player, .. }
            | Action::ActivateManaAbility { player, .. }
            | Action::DeclareAttackers { player, .. }
            | Action::DeclareBlockers { player, .. }
            | Action::SubmitDecision { player, .. }
            | Action::Concede { player }
            | Action::Mulligan { player }
            | Action::KeepHand { player, .. } => *player,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::PassPriority { .. } => "PassPriority",
            Action::PlayLand { .. } => "PlayLand",
            Action::CastSpell { .. } => "CastSpell",
            Action::ActivateAbility { .. } => "ActivateAbility",
            Action::ActivateManaAbility { .. } => "ActivateManaAbility",
            Action::DeclareAttackers { .. } => "DeclareAttackers",
            Action::DeclareBlockers { .. } => "DeclareBlockers",
            Action::SubmitDecision { .. } => "SubmitDecision",
            Action::Concede { .. } => "Concede",
            Action::Mulligan { .. } => "Mulligan",
            Action::KeepHand { .. } => "KeepHand",
        }
    }
}

/// Validate and perform one action
pub fn apply(game: &mut GameState, cx: &mut EngineContext, action: &Action) -> Result<Flow> {
    if game.game_over {
        return Err(RulesError::invalid("the game is over"));
    }
    let player = action.player();
    if !game.is_in_game(player) {
        return Err(RulesError::invalid(format!("{} is not in the game", player)));
    }
    if let Some(decision) = &game.pending_decision {
        if !matches!(action, Action::SubmitDecision { .. } | Action::Concede { .. }) {
            return Err(RulesError::invalid(format!(
                "waiting for {} to answer decision {}",
                decision.player, decision.id
            )));
        }
    }

    match action {
        Action::PassPriority { player } => turn::pass_priority(game, cx, *player),
        Action::PlayLand { player, card } => {
            play_land(game, cx, *player, *card)?;
            Ok(Flow::Continue)
        }
        Action::CastSpell { player, card, targets, x_value, payment } => {
            cast_spell(game, cx, *player, *card, targets, *x_value, payment)?;
            Ok(Flow::Continue)
        }
        Action::ActivateAbility { player, source, index, targets, x_value, payment, sacrifice } => {
            let request = Activation { source: *source, index: *index, targets, x_value: *x_value, payment, sacrifice };
            activate_ability(game, cx, *player, request)?;
            Ok(Flow::Continue)
        }
        Action::ActivateManaAbility { player, source, index, color } => {
            if game.turn.priority_player != Some(*player) || game.turn.pregame {
                return Err(RulesError::invalid(format!("{} does not have priority", player)));
            }
            mana_engine::activate_mana_ability(game, cx, *player, *source, *index, *color)?;
            Ok(Flow::Continue)
        }
        Action::DeclareAttackers { player, attackers } => {
            combat::declare_attackers(game, cx, *player, attackers)?;
            turn::after_attackers_declared(game, cx)
        }
        Action::DeclareBlockers { player, blocks } => combat::declare_blockers(game, cx, *player, blocks),
        Action::SubmitDecision { player, decision_id, response } => {
            submit_decision(game, cx, *player, *decision_id, response.clone())
        }
        Action::Concede { player } => {
            cx.logger.minimal(&format!("{} concedes", player));
            sba::lose_game(game, cx, *player, LossReason::Conceded);
            Ok(Flow::Continue)
        }
        Action::Mulligan { player } => {
            hand_setup::mulligan(game, cx, *player)?;
            Ok(Flow::Continue)
        }
        Action::KeepHand { player, bottom } => hand_setup::keep_hand(game, cx, *player, bottom),
    }
}

pub fn play_land(game: &mut GameState, cx: &mut EngineContext, player: PlayerId, card: EntityId) -> Result<()> {
    legality::check_play_land(game, player, card)?;
    replacement::enter_battlefield(game, cx, card, player);
    game.player_mut(player)?.play_land();
    cx.emit(GameEvent::LandPlayed { player, card });
    cx.logger.normal(&format!("{} plays {}", player, game.card_name(card)));
    Ok(())
}

/// Cast a spell: check timing and targets, pay the cost (X as extra generic), put it on the stack
pub fn cast_spell(
    game: &mut GameState,
    cx: &mut EngineContext,
    player: PlayerId,
    card: EntityId,
    targets: &[Vec<Target>],
    x_value: u32,
    payment: &Payment,
) -> Result<()> {
    let chars = legality::check_cast_timing(game, player, card)?;
    let requirements = cx.script(chars.name.as_str()).map(|s| s.targets.clone()).unwrap_or_default();
    let projection = Projection::compute(game, cx.registry);
    let source = TargetSource::new(player, Some(card), chars.colors.to_vec());
    targeting::validate_selection(game, &projection, &requirements, targets, &source)?;

    let printed = game.card(card).map(|c| c.mana_cost).unwrap_or_default();
    if x_value > 0 && printed.x_count == 0 {
        return Err(RulesError::invalid(format!("{} has no X in its cost", chars.name)));
    }
    let cost = printed.with_x(x_value)?;
    let stamped = targeting::stamp_targets(game, targets.to_vec());
    mana_engine::pay_mana(game, cx, player, &cost, payment, Some(card))?;
    stack::push_spell(game, cx, card, player, stamped, x_value)?;
    game.turn.give_priority(player);
    Ok(())
}

/// The payload of an ability activation
#[derive(Debug, Clone, Copy)]
pub struct Activation<'a> {
    pub source: EntityId,
    pub index: usize,
    pub targets: &'a [Vec<Target>],
    pub x_value: u32,
    pub payment: &'a Payment,
    pub sacrifice: &'a [EntityId],
}

/// Activate an ability: validate, pay every cost, then put the ability on the stack
pub fn activate_ability(
    game: &mut GameState,
    cx: &mut EngineContext,
    player: PlayerId,
    request: Activation,
) -> Result<EntityId> {
    let Activation { source, index, targets, x_value, payment, sacrifice } = request;
    let projection = Projection::compute(game, cx.registry);
    let ability = legality::check_activation(game, &projection, cx, player, source, index)?;
    let chars = projection
        .get(source)
        .ok_or_else(|| RulesError::invalid(format!("{} is not on the battlefield", source)))?;
    let (name, colors) = (chars.name.clone(), chars.colors.to_vec());

    let target_source = TargetSource::new(player, Some(source), colors.clone());
    targeting::validate_selection(game, &projection, &ability.targets, targets, &target_source)?;
    let requirements = ability.cost.sacrifice_requirements();
    legality::check_sacrifices(&projection, player, source, &requirements, sacrifice)?;
    if sacrifice.contains(&source) {
        return Err(RulesError::invalid(format!("{} cannot be sacrificed to pay for its own ability", name)));
    }

    let mana = ability.cost.mana_cost();
    if x_value > 0 && mana.x_count == 0 {
        return Err(RulesError::invalid(format!("this ability of {} has no X in its cost", name)));
    }
    let stamped = targeting::stamp_targets(game, targets.to_vec());
    mana_engine::pay_mana(game, cx, player, &mana.with_x(x_value)?, payment, None)?;
    pay_other_costs(game, cx, player, source, &ability.cost, sacrifice)?;

    let id = stack::push_ability(
        game,
        cx,
        AbilityOnStack {
            source,
            source_name: name,
            source_colors: colors,
            controller: player,
            kind: AbilityKind::Activated,
            effect: ability.effect.clone(),
            requirements: ability.targets.clone(),
            targets: stamped,
            x_value,
            trigger_subject: None,
        },
    );
    game.turn.give_priority(player);
    Ok(id)
}

/// Tap, life, counters and sacrifices
fn pay_other_costs(
    game: &mut GameState,
    cx: &mut EngineContext,
    player: PlayerId,
    source: EntityId,
    cost: &Cost,
    sacrifice: &[EntityId],
) -> Result<()> {
    for part in cost.parts() {
        match part {
            Cost::Tap => {
                if let Some(entity) = game.entity_mut(source) {
                    entity.insert(Tapped);
                }
                cx.emit(GameEvent::Tapped { entity: source });
            }
            Cost::PayLife(amount) => {
                game.player_mut(player)?.lose_life(*amount as i32);
                cx.emit(GameEvent::LifeLost { player, amount: *amount });
            }
            Cost::RemoveCounters { counter, count } => {
                let removed = game
                    .entity_mut(source)
                    .and_then(|e| e.get_mut::<Counters>())
                    .map(|c| c.remove(counter, *count))
                    .unwrap_or(0);
                cx.emit(GameEvent::CountersRemoved { entity: source, counter: counter.clone(), amount: removed });
            }
            Cost::AddCounters { counter, count } => {
                if let Some(entity) = game.entity_mut(source) {
                    let mut counters = entity.get::<Counters>().cloned().unwrap_or_default();
                    counters.add(counter.clone(), *count);
                    entity.insert(counters);
                }
                cx.emit(GameEvent::CountersAdded { entity: source, counter: counter.clone(), amount: *count });
            }
            Cost::Mana(_) | Cost::Sacrifice { .. } | Cost::SacrificeSelf | Cost::Composite(_) => {}
        }
    }
    for &id in sacrifice {
        replacement::move_object(game, cx, id, Zone::Graveyard);
    }
    if cost.sacrifices_self() {
        replacement::move_object(game, cx, source, Zone::Graveyard);
    }
    Ok(())
}

/// Answer the pending decision and resume the computation that asked
pub fn submit_decision(
    game: &mut GameState,
    cx: &mut EngineContext,
    player: PlayerId,
    decision_id: u64,
    response: DecisionResponse,
) -> Result<Flow> {
    let decision = game
        .pending_decision
        .clone()
        .ok_or_else(|| RulesError::DecisionMismatch("no decision is pending".into()))?;
    if decision.id != decision_id {
        return Err(RulesError::DecisionMismatch(format!(
            "decision {} is pending, not {}",
            decision.id, decision_id
        )));
    }
    if decision.player != player {
        return Err(RulesError::invalid(format!("decision {} belongs to {}", decision.id, decision.player)));
    }
    decision.validate(&response)?;

    game.pending_decision = None;
    let frame = game
        .continuations
        .pop()
        .ok_or_else(|| RulesError::DecisionMismatch("nothing is waiting for this decision".into()))?;
    cx.emit(GameEvent::DecisionResolved { player, decision_id });
    continuation::resume(game, cx, frame, response)
}
