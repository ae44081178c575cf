//! Step sequencing and priority passing
//!
//! The turn engine never loops waiting for input. Entering a step performs
//! its turn-based actions and returns; the engine then hands priority to the
//! active player. Passing priority either rotates it, resolves the top of the
//! stack, or advances to the next step once every player has passed in
//! succession.

use crate::core::{DamageMarked, EntityId, PlayerId, SummoningSickness, Tapped};
use crate::game::combat;
use crate::game::context::{EngineContext, Flow};
use crate::game::continuation::{self, Continuation};
use crate::game::decision::DecisionKind;
use crate::game::events::GameEvent;
use crate::game::executor;
use crate::game::layers::{self, Projection};
use crate::game::phase::Step;
use crate::game::replacement;
use crate::game::stack;
use crate::game::state::GameState;
use crate::{Result, RulesError};

/// Begin turn 1 for the first player
pub fn begin_first_turn(game: &mut GameState, cx: &mut EngineContext) -> Result<Flow> {
    game.turn.pregame = false;
    let player = game.turn.active_player;
    cx.emit(GameEvent::TurnBegan { player, turn: game.turn.turn_number });
    enter_step(game, cx, Step::Untap)
}

/// Move to the next step, or the next player's turn after cleanup
///
/// A no-op once the game is over.
pub fn advance_step(game: &mut GameState, cx: &mut EngineContext) -> Result<Flow> {
    if game.game_over {
        return Ok(Flow::Continue);
    }
    let current = game.turn.current_step;
    if current == Step::EndCombat {
        game.combat.clear();
    }
    match current.next() {
        Some(next) => enter_step(game, cx, next),
        None => start_next_turn(game, cx),
    }
}

pub fn start_next_turn(game: &mut GameState, cx: &mut EngineContext) -> Result<Flow> {
    if game.game_over {
        return Ok(Flow::Continue);
    }
    let Some(next) = game.next_player_in_game(game.turn.active_player) else {
        return Ok(Flow::Continue);
    };
    game.combat.clear();
    game.turn.start_turn(next);
    let turn = game.turn.turn_number;
    cx.emit(GameEvent::TurnBegan { player: next, turn });
    cx.logger.normal(&format!("=== Turn {} ({}) ===", turn, next));
    enter_step(game, cx, Step::Untap)
}

fn enter_step(game: &mut GameState, cx: &mut EngineContext, step: Step) -> Result<Flow> {
    for player in &mut game.players {
        player.empty_mana_pool();
    }
    game.turn.current_step = step;
    game.turn.priority_player = None;
    game.turn.consecutive_passes = 0;
    begin_step(game, cx)
}

/// Turn-based actions on entering the current step
pub fn begin_step(game: &mut GameState, cx: &mut EngineContext) -> Result<Flow> {
    let step = game.turn.current_step;
    let active = game.turn.active_player;
    cx.emit(GameEvent::StepBegan { step, active_player: active });

    match step {
        Step::Untap => {
            untap_step(game, cx, active);
            advance_step(game, cx)
        }
        Step::Draw => {
            let skip = game.config.skip_first_draw && game.turn.is_first_turn() && active == game.turn.first_player;
            if skip {
                cx.logger.normal("(First turn - no draw)");
            } else {
                replacement::draw_cards(game, cx, active, 1);
            }
            Ok(Flow::Continue)
        }
        Step::DeclareAttackers => {
            if combat::possible_attackers(game, cx.registry).is_empty() {
                game.combat.attackers_declared = true;
                cx.emit(GameEvent::AttackersDeclared { player: active, attackers: Vec::new() });
                return skip_to_end_of_combat(game, cx);
            }
            Ok(Flow::Continue)
        }
        Step::DeclareBlockers => Ok(combat::begin_declare_blockers(game, cx)),
        Step::CombatDamage => Ok(combat::begin_combat_damage(game, cx)),
        Step::Cleanup => cleanup_step(game, cx, active),
        Step::Upkeep | Step::Main1 | Step::BeginCombat | Step::EndCombat | Step::Main2 | Step::End => {
            Ok(Flow::Continue)
        }
    }
}

/// Untap the active player's permanents; they are no longer summoning sick
fn untap_step(game: &mut GameState, cx: &mut EngineContext, active: PlayerId) {
    let projection = Projection::compute(game, cx.registry);
    for id in projection.controlled_by(game, active) {
        if let Some(entity) = game.entity_mut(id) {
            entity.remove::<SummoningSickness>();
            if entity.remove::<Tapped>().is_some() {
                cx.emit(GameEvent::Untapped { entity: id });
            }
        }
    }
    if let Ok(player) = game.player_mut(active) {
        player.reset_lands_played();
    }
}

/// No attackers were declared: the rest of combat is skipped
pub fn skip_to_end_of_combat(game: &mut GameState, cx: &mut EngineContext) -> Result<Flow> {
    enter_step(game, cx, Step::EndCombat)
}

/// Called after the active player declared attackers
pub fn after_attackers_declared(game: &mut GameState, cx: &mut EngineContext) -> Result<Flow> {
    if game.combat.attackers.is_empty() {
        return skip_to_end_of_combat(game, cx);
    }
    Ok(Flow::Continue)
}

fn cleanup_step(game: &mut GameState, cx: &mut EngineContext, active: PlayerId) -> Result<Flow> {
    let hand = game.hand(active);
    let max = game.config.max_hand_size;
    if hand.len() <= max {
        return finish_cleanup(game, cx);
    }
    let excess = hand.len() - max;
    game.continuations.push(Continuation::FinishCleanup);
    let prompt = format!("Discard {} card(s) down to {}", excess, max);
    Ok(continuation::ask(
        game,
        cx,
        active,
        DecisionKind::SelectCards { candidates: hand, min: excess, max: excess },
        None,
        prompt,
        Continuation::CleanupDiscard { player: active },
    ))
}

pub fn discard_to_hand_size(game: &mut GameState, cx: &mut EngineContext, player: PlayerId, cards: &[EntityId]) {
    executor::discard(game, cx, player, cards);
}

/// Remove marked damage, end "this turn" effects, then begin the next turn
pub fn finish_cleanup(game: &mut GameState, cx: &mut EngineContext) -> Result<Flow> {
    for id in game.battlefield_ids() {
        if let Some(entity) = game.entity_mut(id) {
            entity.remove::<DamageMarked>();
        }
    }
    layers::expire_end_of_turn(game);
    game.damage_shields.clear();
    start_next_turn(game, cx)
}

/// The player who must declare attackers or blockers before anyone gets priority
pub fn awaiting_declaration(game: &GameState) -> Option<PlayerId> {
    match game.turn.current_step {
        Step::DeclareAttackers if !game.combat.attackers_declared => Some(game.turn.active_player),
        Step::DeclareBlockers => combat::awaiting_blockers(game),
        _ => None,
    }
}

/// Hand priority to the active player when nobody holds it and nothing is pending
pub fn assign_priority(game: &mut GameState) {
    if game.game_over
        || game.turn.pregame
        || game.pending_decision.is_some()
        || game.turn.priority_player.is_some()
        || !game.turn.current_step.has_priority()
        || awaiting_declaration(game).is_some()
    {
        return;
    }
    let active = game.turn.active_player;
    let holder = if game.is_in_game(active) { Some(active) } else { game.next_player_in_game(active) };
    if let Some(player) = holder {
        game.turn.give_priority(player);
    }
}

/// Pass priority
///
/// When every player still in the game has passed in succession, the top of
/// the stack resolves (or the owed regular combat damage pass is dealt, or
/// the game moves to the next step) and priority goes back to the active
/// player.
pub fn pass_priority(game: &mut GameState, cx: &mut EngineContext, player: PlayerId) -> Result<Flow> {
    if game.turn.priority_player != Some(player) {
        return Err(RulesError::invalid(format!("{} does not have priority", player)));
    }
    cx.emit(GameEvent::PriorityPassed { player });
    game.turn.consecutive_passes += 1;

    if game.turn.consecutive_passes as usize >= game.players_in_game() {
        game.turn.priority_player = None;
        game.turn.consecutive_passes = 0;
        if !game.stack.is_empty() {
            return stack::resolve_top(game, cx);
        }
        if game.turn.current_step == Step::CombatDamage && combat::regular_pass_pending(game) {
            return Ok(combat::start_damage_pass(game, cx, false));
        }
        return advance_step(game, cx);
    }

    game.turn.priority_player = game.next_player_in_game(player);
    Ok(Flow::Continue)
}
