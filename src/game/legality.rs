//! Timing rules and legal-action enumeration
//!
//! The checks here are shared by action validation and by
//! [`legal_actions`], which lists what a player could submit right now.
//! Enumeration is representative rather than exhaustive where the choice
//! space is combinatorial: one action per castable card and first-slot
//! target, one attacker or one block at a time.

use crate::core::{
    ActivatedAbility, CardType, Characteristics, Cost, Counters, EntityId, FilterContext, Keyword, ObjectFilter,
    PlayerId, Restriction, SummoningSickness, Target, TargetRequirement,
};
use crate::game::actions::Action;
use crate::game::combat;
use crate::game::context::EngineContext;
use crate::game::layers::Projection;
use crate::game::mana_engine::{ManaEngine, Payment};
use crate::game::phase::Step;
use crate::game::state::GameState;
use crate::game::targeting::{self, TargetSource};
use crate::game::turn;
use crate::zones::Zone;
use crate::{Result, RulesError};

/// The player may take a priority action now
pub fn holds_priority(game: &GameState, player: PlayerId) -> bool {
    !game.game_over
        && !game.turn.pregame
        && game.pending_decision.is_none()
        && game.turn.priority_player == Some(player)
}

/// Main step of the player's own turn with an empty stack
pub fn sorcery_timing(game: &GameState, player: PlayerId) -> bool {
    holds_priority(game, player)
        && game.turn.active_player == player
        && game.turn.current_step.is_main()
        && game.stack.is_empty()
}

/// Instants and cards with flash may be cast whenever their caster has priority
pub fn has_instant_speed(chars: &Characteristics) -> bool {
    chars.is_type(CardType::Instant) || chars.has_keyword(&Keyword::Flash)
}

fn require_priority(game: &GameState, player: PlayerId) -> Result<()> {
    if holds_priority(game, player) {
        Ok(())
    } else {
        Err(RulesError::invalid(format!("{} does not have priority", player)))
    }
}

fn require_in_hand(game: &GameState, player: PlayerId, card: EntityId) -> Result<()> {
    if game.zones(player)?.hand.contains(card) {
        Ok(())
    } else {
        Err(RulesError::invalid(format!("{} is not in {}'s hand", card, player)))
    }
}

pub fn check_play_land(game: &GameState, player: PlayerId, card: EntityId) -> Result<()> {
    require_in_hand(game, player, card)?;
    let is_land = game.card(card).is_some_and(|c| c.is_land());
    if !is_land {
        return Err(RulesError::invalid(format!("{} is not a land", game.card_name(card))));
    }
    if !sorcery_timing(game, player) {
        return Err(RulesError::invalid(
            "lands are played in your main phase with an empty stack while you have priority",
        ));
    }
    if !game.player(player)?.can_play_land() {
        return Err(RulesError::invalid(format!("{} has no land drop left this turn", player)));
    }
    Ok(())
}

/// Card in hand, not a land, and castable at the current timing
pub fn check_cast_timing(game: &GameState, player: PlayerId, card: EntityId) -> Result<Characteristics> {
    require_in_hand(game, player, card)?;
    let chars = game
        .raw_characteristics(card)
        .ok_or(RulesError::EntityNotFound(card.as_u32()))?;
    if chars.is_land() {
        return Err(RulesError::invalid(format!("{} is a land and is played, not cast", chars.name)));
    }
    require_priority(game, player)?;
    if !has_instant_speed(&chars) && !sorcery_timing(game, player) {
        return Err(RulesError::invalid(format!(
            "{} can only be cast in your main phase with an empty stack",
            chars.name
        )));
    }
    Ok(chars)
}

/// Everything about an activated ability that can be checked before costs are paid
pub fn check_activation<'a>(
    game: &GameState,
    projection: &Projection,
    cx: &EngineContext<'a>,
    player: PlayerId,
    source: EntityId,
    index: usize,
) -> Result<&'a ActivatedAbility> {
    require_priority(game, player)?;
    let chars = projection
        .get(source)
        .ok_or_else(|| RulesError::invalid(format!("{} is not on the battlefield", source)))?;
    if chars.controller != player {
        return Err(RulesError::invalid(format!("{} does not control {}", player, chars.name)));
    }
    if chars.abilities_removed || chars.has_restriction(&Restriction::CantActivateAbilities) {
        return Err(RulesError::invalid(format!("abilities of {} cannot be activated", chars.name)));
    }
    let ability = cx
        .script(chars.name.as_str())
        .and_then(|s| s.activated.get(index))
        .ok_or_else(|| RulesError::invalid(format!("{} has no activated ability {}", chars.name, index)))?;
    if ability.sorcery_speed && !sorcery_timing(game, player) {
        return Err(RulesError::invalid(format!(
            "this ability of {} can only be activated as a sorcery",
            chars.name
        )));
    }

    if ability.cost.includes_tap() {
        if chars.tapped {
            return Err(RulesError::invalid(format!("{} is already tapped", chars.name)));
        }
        let sick = game.entity(source).is_some_and(|e| e.has::<SummoningSickness>());
        if chars.is_creature() && sick && !chars.has_keyword(&Keyword::Haste) {
            return Err(RulesError::invalid(format!("{} has summoning sickness", chars.name)));
        }
    }
    let life = game.player(player)?.life;
    if ability.cost.life_cost() as i32 > life {
        return Err(RulesError::invalid(format!("{} cannot pay {} life", player, ability.cost.life_cost())));
    }
    for part in ability.cost.parts() {
        if let Cost::RemoveCounters { counter, count } = part {
            let have = game
                .entity(source)
                .and_then(|e| e.get::<Counters>())
                .map(|c| c.get(counter))
                .unwrap_or(0);
            if have < *count {
                return Err(RulesError::invalid(format!(
                    "{} needs {} {} counter(s), has {}",
                    chars.name, count, counter, have
                )));
            }
        }
    }
    Ok(ability)
}

/// Check that `chosen` pays every sacrifice requirement, in requirement order
pub fn check_sacrifices(
    projection: &Projection,
    player: PlayerId,
    source: EntityId,
    requirements: &[(&ObjectFilter, u32)],
    chosen: &[EntityId],
) -> Result<()> {
    let needed: u32 = requirements.iter().map(|(_, n)| *n).sum();
    if chosen.len() != needed as usize {
        return Err(RulesError::invalid(format!(
            "expected {} permanent(s) to sacrifice, got {}",
            needed,
            chosen.len()
        )));
    }
    let ctx = FilterContext { you: player, source: Some(source) };
    let mut remaining = chosen.iter();
    for (filter, count) in requirements {
        for _ in 0..*count {
            let Some(&id) = remaining.next() else { break };
            if chosen.iter().filter(|c| **c == id).count() > 1 {
                return Err(RulesError::invalid(format!("{} is sacrificed twice", id)));
            }
            let ok = projection
                .get(id)
                .is_some_and(|c| c.controller == player && filter.matches(c, id, &ctx));
            if !ok {
                return Err(RulesError::invalid(format!("{} cannot be sacrificed for this cost", id)));
            }
        }
    }
    Ok(())
}

/// First legal choice for every slot, with `first` forced into slot 0
fn default_targets(
    game: &GameState,
    projection: &Projection,
    requirements: &[TargetRequirement],
    source: &TargetSource,
    first: Option<Target>,
) -> Vec<Vec<Target>> {
    requirements
        .iter()
        .enumerate()
        .map(|(slot, req)| match (slot, first) {
            (0, Some(target)) => vec![target],
            _ => targeting::legal_targets(game, projection, req, source)
                .into_iter()
                .take(req.min)
                .collect(),
        })
        .collect()
}

/// Representative target choices: one per legal target of the first slot
fn target_choices(
    game: &GameState,
    projection: &Projection,
    requirements: &[TargetRequirement],
    source: &TargetSource,
) -> Vec<Vec<Vec<Target>>> {
    if !targeting::has_legal_selection(game, projection, requirements, source) {
        return Vec::new();
    }
    match requirements.first() {
        None => vec![Vec::new()],
        Some(first) => {
            let options = targeting::legal_targets(game, projection, first, source);
            if options.is_empty() {
                vec![default_targets(game, projection, requirements, source, None)]
            } else {
                options
                    .into_iter()
                    .map(|t| default_targets(game, projection, requirements, source, Some(t)))
                    .collect()
            }
        }
    }
}

/// Actions `player` could submit in the current state
///
/// While a decision is pending nothing but conceding is listed; the
/// answer to a decision is built from the decision itself.
pub fn legal_actions(game: &GameState, cx: &EngineContext, player: PlayerId) -> Vec<Action> {
    let mut actions = Vec::new();
    if game.game_over || !game.is_in_game(player) {
        return actions;
    }
    if game.pending_decision.is_some() {
        actions.push(Action::Concede { player });
        return actions;
    }

    if game.turn.pregame {
        if let Ok(p) = game.player(player) {
            if !p.has_kept_hand {
                let owed = p.mulligans_taken as usize;
                actions.push(Action::KeepHand { player, bottom: game.hand(player).into_iter().take(owed).collect() });
                if owed < game.config.opening_hand_size {
                    actions.push(Action::Mulligan { player });
                }
            }
        }
        actions.push(Action::Concede { player });
        return actions;
    }

    if turn::awaiting_declaration(game) == Some(player) {
        declaration_actions(game, cx, player, &mut actions);
        actions.push(Action::Concede { player });
        return actions;
    }

    if holds_priority(game, player) {
        actions.push(Action::PassPriority { player });
        priority_actions(game, cx, player, &mut actions);
    }
    actions.push(Action::Concede { player });
    actions
}

fn declaration_actions(game: &GameState, cx: &EngineContext, player: PlayerId, actions: &mut Vec<Action>) {
    if game.turn.current_step == Step::DeclareAttackers {
        actions.push(Action::DeclareAttackers { player, attackers: Vec::new() });
        let opponents: Vec<PlayerId> = game.opponents(player).into_iter().filter(|p| game.is_in_game(*p)).collect();
        for attacker in combat::possible_attackers(game, cx.registry) {
            for &defending in &opponents {
                actions.push(Action::DeclareAttackers { player, attackers: vec![(attacker, defending)] });
            }
        }
    } else {
        actions.push(Action::DeclareBlockers { player, blocks: Vec::new() });
        for block in combat::possible_blocks(game, cx.registry, player) {
            if combat::validate_blockers(game, cx.registry, player, &[block]).is_ok() {
                actions.push(Action::DeclareBlockers { player, blocks: vec![block] });
            }
        }
    }
}

fn priority_actions(game: &GameState, cx: &EngineContext, player: PlayerId, actions: &mut Vec<Action>) {
    let projection = Projection::compute(game, cx.registry);
    let hand = game.hand(player);

    for &card in &hand {
        if check_play_land(game, player, card).is_ok() {
            actions.push(Action::PlayLand { player, card });
        }
    }

    let mut mana = ManaEngine::new(player);
    for &card in &hand {
        let Ok(chars) = check_cast_timing(game, player, card) else { continue };
        let cost = game.card(card).map(|c| c.mana_cost.without_x()).unwrap_or_default();
        mana.update(game, &projection, cx, Some(card));
        if !mana.can_pay(&cost) {
            continue;
        }
        let requirements = cx.script(chars.name.as_str()).map(|s| s.targets.clone()).unwrap_or_default();
        let source = TargetSource::new(player, Some(card), chars.colors.to_vec());
        for targets in target_choices(game, &projection, &requirements, &source) {
            actions.push(Action::CastSpell { player, card, targets, x_value: 0, payment: Payment::Auto });
        }
    }

    mana.update(game, &projection, cx, None);
    for source in projection.controlled_by(game, player) {
        let Some(chars) = projection.get(source) else { continue };
        let Some(script) = cx.script(chars.name.as_str()) else { continue };
        for index in 0..script.activated.len() {
            let Ok(ability) = check_activation(game, &projection, cx, player, source, index) else { continue };
            if !mana.can_pay(&ability.cost.mana_cost().without_x()) {
                continue;
            }
            let requirements = ability.cost.sacrifice_requirements();
            let ctx = FilterContext { you: player, source: Some(source) };
            let mut sacrifice = Vec::new();
            for (filter, count) in &requirements {
                let candidates = projection
                    .matching(game, filter, &ctx)
                    .into_iter()
                    .filter(|id| projection.controller(*id) == Some(player) && !sacrifice.contains(id));
                let picked: Vec<_> = candidates.take(*count as usize).collect();
                sacrifice.extend(picked);
            }
            if check_sacrifices(&projection, player, source, &requirements, &sacrifice).is_err() {
                continue;
            }
            let target_source = TargetSource::new(player, Some(source), chars.colors.to_vec());
            for targets in target_choices(game, &projection, &ability.targets, &target_source) {
                actions.push(Action::ActivateAbility {
                    player,
                    source,
                    index,
                    targets,
                    x_value: 0,
                    payment: Payment::Auto,
                    sacrifice: sacrifice.clone(),
                });
            }
        }
        if !chars.tapped && game.zone_of(source) == Some(Zone::Battlefield) {
            for (index, ability) in script.mana_abilities.iter().enumerate() {
                let sick = game.entity(source).is_some_and(|e| e.has::<SummoningSickness>());
                if chars.is_creature() && sick && !chars.has_keyword(&Keyword::Haste) {
                    break;
                }
                let color = ability.produces.colors().first().copied();
                actions.push(Action::ActivateManaAbility { player, source, index, color });
            }
        }
    }
}
