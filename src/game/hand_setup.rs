//! Opening hands and the London mulligan
//!
//! Starting a game shuffles every library and deals opening hands. With
//! mulligans enabled the game then waits in a pregame where each player
//! either mulligans (shuffle the hand away and draw a fresh one) or keeps,
//! putting one card per mulligan taken on the bottom of their library.
//! Turn 1 begins once everybody has kept.

use crate::core::{EntityId, PlayerId};
use crate::game::context::{EngineContext, Flow};
use crate::game::events::GameEvent;
use crate::game::phase::Step;
use crate::game::state::GameState;
use crate::game::turn;
use crate::zones::Zone;
use crate::{Result, RulesError};
use std::collections::BTreeSet;

fn has_started(game: &GameState) -> bool {
    game.turn.pregame
        || game.turn.turn_number > 1
        || game.turn.current_step != Step::Untap
        || game.turn.priority_player.is_some()
}

/// Shuffle libraries, deal opening hands and enter the pregame (or turn 1)
pub fn start_game(game: &mut GameState, cx: &mut EngineContext) -> Result<Flow> {
    if has_started(game) {
        return Err(RulesError::invalid("the game has already started"));
    }
    cx.emit(GameEvent::GameStarted { first_player: game.turn.first_player });
    for player in game.player_ids() {
        game.shuffle_library(player);
        cx.emit(GameEvent::Shuffled { player });
        draw_opening_hand(game, player);
    }

    if game.config.mulligans_enabled {
        game.turn.pregame = true;
        return Ok(Flow::Continue);
    }
    for player in &mut game.players {
        player.has_kept_hand = true;
    }
    turn::begin_first_turn(game, cx)
}

/// Opening-hand draws are not card draws for triggers and never deck a player
fn draw_opening_hand(game: &mut GameState, player: PlayerId) {
    let count = game.config.opening_hand_size.min(game.library_size(player));
    for _ in 0..count {
        game.draw_card(player);
    }
}

fn check_undecided(game: &GameState, player: PlayerId) -> Result<()> {
    if !game.turn.pregame {
        return Err(RulesError::invalid("mulligans are only taken before the first turn"));
    }
    if game.player(player)?.has_kept_hand {
        return Err(RulesError::invalid(format!("{} has already kept", player)));
    }
    Ok(())
}

/// Shuffle the hand into the library and draw a new one
pub fn mulligan(game: &mut GameState, cx: &mut EngineContext, player: PlayerId) -> Result<()> {
    check_undecided(game, player)?;
    let taken = game.player(player)?.mulligans_taken;
    if taken as usize >= game.config.opening_hand_size {
        return Err(RulesError::invalid(format!("{} cannot mulligan any further", player)));
    }

    for card in game.hand(player) {
        game.move_entity(card, Zone::Library);
    }
    game.shuffle_library(player);
    draw_opening_hand(game, player);

    let p = game.player_mut(player)?;
    p.mulligans_taken += 1;
    let count = p.mulligans_taken;
    cx.emit(GameEvent::Mulligan { player, count });
    Ok(())
}

/// Keep the current hand, bottoming one card per mulligan taken
///
/// Begins turn 1 when this was the last undecided player.
pub fn keep_hand(game: &mut GameState, cx: &mut EngineContext, player: PlayerId, bottom: &[EntityId]) -> Result<Flow> {
    check_undecided(game, player)?;
    let owed = game.player(player)?.mulligans_taken as usize;
    if bottom.len() != owed {
        return Err(RulesError::invalid(format!(
            "{} must put exactly {} card(s) on the bottom, got {}",
            player,
            owed,
            bottom.len()
        )));
    }
    let distinct: BTreeSet<EntityId> = bottom.iter().copied().collect();
    if distinct.len() != bottom.len() {
        return Err(RulesError::invalid("a card is listed twice"));
    }
    let hand = game.hand(player);
    if let Some(card) = bottom.iter().find(|c| !hand.contains(c)) {
        return Err(RulesError::invalid(format!("{} is not in {}'s hand", card, player)));
    }

    for &card in bottom {
        game.move_to_library_bottom(card);
    }
    game.player_mut(player)?.has_kept_hand = true;
    cx.emit(GameEvent::HandKept { player, bottomed: bottom.len() });

    if game.players.iter().all(|p| p.has_kept_hand || !p.is_in_game()) {
        return turn::begin_first_turn(game, cx);
    }
    Ok(Flow::Continue)
}
