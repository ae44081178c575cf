//! State-based actions
//!
//! `check_once` makes one pass over every check and applies all corrections
//! it finds. `check_and_apply` repeats passes until one changes nothing.

use crate::core::{AttachedTo, CardType, Counters, CounterType, EntityId, Keyword, LossReason, PlayerId, Token};
use crate::game::context::EngineContext;
use crate::game::events::GameEvent;
use crate::game::layers::Projection;
use crate::game::replacement;
use crate::game::state::GameState;
use crate::game::targeting::{self, TargetSource};
use crate::zones::Zone;
use rustc_hash::FxHashMap;

/// Upper bound on passes; a well-formed rule set settles long before this
pub const MAX_PASSES: usize = 64;

/// Run passes until a pass produces no events; returns the number of passes that changed something
pub fn check_and_apply(game: &mut GameState, cx: &mut EngineContext) -> usize {
    let mut passes = 0;
    while passes < MAX_PASSES {
        if !check_once(game, cx) {
            return passes;
        }
        passes += 1;
    }
    cx.logger.minimal("state-based actions did not settle");
    passes
}

/// One pass of every check; true if anything happened
pub fn check_once(game: &mut GameState, cx: &mut EngineContext) -> bool {
    let before = cx.event_count();

    // Tokens that died last pass are still visible to trigger detection until now
    remove_stray_tokens(game, cx);

    if !game.game_over {
        check_player_losses(game, cx);
    }

    let projection = Projection::compute(game, cx.registry);
    let mut to_graveyard: Vec<EntityId> = Vec::new();
    check_creatures(game, &projection, &mut to_graveyard);
    check_planeswalkers(game, &projection, &mut to_graveyard);
    check_legend_rule(game, &projection, &mut to_graveyard);
    check_attachments(game, &projection, cx, &mut to_graveyard);
    for id in to_graveyard {
        if game.is_on_battlefield(id) {
            replacement::move_object(game, cx, id, Zone::Graveyard);
        }
    }

    annihilate_counters(game, cx);
    drop_dangling_attachments(game);

    if !game.game_over {
        check_game_end(game, cx);
    }

    cx.event_count() > before
}

fn check_player_losses(game: &mut GameState, cx: &mut EngineContext) {
    let poison_limit = game.config.poison_limit;
    let mut losers: Vec<(PlayerId, LossReason)> = Vec::new();
    for player in game.players.iter().filter(|p| p.is_in_game()) {
        let reason = if player.life <= 0 {
            Some(LossReason::ZeroLife)
        } else if player.poison >= poison_limit {
            Some(LossReason::Poison)
        } else if player.drew_from_empty_library {
            Some(LossReason::DrewFromEmptyLibrary)
        } else {
            None
        };
        if let Some(reason) = reason {
            losers.push((player.id, reason));
        }
    }
    for (player, reason) in losers {
        lose_game(game, cx, player, reason);
    }
}

/// Mark a player as having lost and take their objects out of a continuing game
pub fn lose_game(game: &mut GameState, cx: &mut EngineContext, player: PlayerId, reason: LossReason) {
    let Ok(p) = game.player_mut(player) else { return };
    if p.has_lost {
        return;
    }
    p.mark_lost(reason);
    p.empty_mana_pool();
    cx.emit(GameEvent::PlayerLost { player, reason });
    cx.logger.minimal(&format!("{} loses the game ({:?})", player, reason));

    if game.players_in_game() >= 2 {
        let owned: Vec<EntityId> = game
            .battlefield
            .cards
            .iter()
            .chain(game.stack.cards.iter())
            .copied()
            .filter(|id| game.owner_of(*id) == Some(player))
            .collect();
        for id in owned {
            game.remove_entity(id);
        }
        game.pending_triggers.retain(|t| t.controller != player);
        game.combat.remove_player(player);
        if game.turn.priority_player == Some(player) {
            game.turn.priority_player = game.next_player_in_game(player);
        }
    }
}

fn check_creatures(game: &GameState, projection: &Projection, out: &mut Vec<EntityId>) {
    for &id in &game.battlefield.cards {
        let Some(chars) = projection.get(id) else { continue };
        if !chars.is_creature() {
            continue;
        }
        let toughness = chars.toughness.unwrap_or(0);
        if toughness <= 0 {
            out.push(id);
            continue;
        }
        let Some(marked) = game.entity(id).and_then(|e| e.get::<crate::core::DamageMarked>()) else {
            continue;
        };
        let lethal = marked.amount >= toughness as u32 || (marked.deathtouch && marked.amount > 0);
        if lethal && !chars.has_keyword(&Keyword::Indestructible) {
            out.push(id);
        }
    }
}

fn check_planeswalkers(game: &GameState, projection: &Projection, out: &mut Vec<EntityId>) {
    for &id in &game.battlefield.cards {
        let is_planeswalker = projection.get(id).is_some_and(|c| c.is_type(CardType::Planeswalker));
        if is_planeswalker && game.entity(id).is_some_and(|e| e.counter(&CounterType::loyalty()) == 0) {
            out.push(id);
        }
    }
}

/// Legendary permanents sharing a name under one controller: the first found stays
fn check_legend_rule(game: &GameState, projection: &Projection, out: &mut Vec<EntityId>) {
    let mut seen: FxHashMap<(PlayerId, String), EntityId> = FxHashMap::default();
    for &id in &game.battlefield.cards {
        let Some(chars) = projection.get(id).filter(|c| c.is_legendary()) else { continue };
        let key = (chars.controller, chars.name.as_str().to_string());
        if seen.contains_key(&key) {
            if !out.contains(&id) {
                out.push(id);
            }
        } else {
            seen.insert(key, id);
        }
    }
}

/// Auras that are unattached or attached to something they could not enchant
///
/// The enchant restriction is the aura's first target requirement.
fn check_attachments(game: &GameState, projection: &Projection, cx: &EngineContext, out: &mut Vec<EntityId>) {
    for &id in &game.battlefield.cards {
        let Some(chars) = projection.get(id) else { continue };
        if !chars.subtypes.iter().any(|s| s.as_str() == "Aura") {
            continue;
        }
        let enchant = cx.script(chars.name.as_str()).and_then(|s| s.targets.first()).map(|req| &req.kind);
        let aura = TargetSource::new(chars.controller, Some(id), chars.colors.to_vec());
        let host = game.entity(id).and_then(|e| e.get::<AttachedTo>()).map(|a| a.0);
        let legal = host.is_some_and(|h| {
            h != id && game.is_on_battlefield(h) && targeting::can_enchant(projection, enchant, h, &aura)
        });
        if !legal && !out.contains(&id) {
            out.push(id);
        }
    }
}

/// Equipment and other non-aura attachments just fall off
fn drop_dangling_attachments(game: &mut GameState) {
    let dangling: Vec<EntityId> = game
        .battlefield
        .cards
        .iter()
        .copied()
        .filter(|id| {
            game.entity(*id)
                .and_then(|e| e.get::<AttachedTo>())
                .is_some_and(|a| !game.is_on_battlefield(a.0))
        })
        .collect();
    for id in dangling {
        if let Some(entity) = game.entity_mut(id) {
            entity.remove::<AttachedTo>();
        }
    }
}

/// +1/+1 and -1/-1 counters on one permanent cancel in pairs
fn annihilate_counters(game: &mut GameState, cx: &mut EngineContext) {
    let plus = CounterType::plus_one();
    let minus = CounterType::minus_one();
    for id in game.battlefield.cards.clone() {
        let Some(counters) = game.entity_mut(id).and_then(|e| e.get_mut::<Counters>()) else {
            continue;
        };
        let pairs = counters.get(&plus).min(counters.get(&minus));
        if pairs == 0 {
            continue;
        }
        counters.remove(&plus, pairs);
        counters.remove(&minus, pairs);
        cx.emit(GameEvent::CountersRemoved { entity: id, counter: plus.clone(), amount: pairs });
        cx.emit(GameEvent::CountersRemoved { entity: id, counter: minus.clone(), amount: pairs });
    }
}

/// Tokens exist only on the battlefield
fn remove_stray_tokens(game: &mut GameState, cx: &mut EngineContext) {
    let stray: Vec<EntityId> = game
        .player_zones
        .iter()
        .flat_map(|z| [&z.hand, &z.library, &z.graveyard, &z.exile])
        .flat_map(|zone| zone.cards.iter().copied())
        .filter(|id| game.entity(*id).is_some_and(|e| e.has::<Token>()))
        .collect();
    for id in stray {
        game.remove_entity(id);
        cx.emit(GameEvent::TokenCeased { entity: id });
    }
}

fn check_game_end(game: &mut GameState, cx: &mut EngineContext) {
    let remaining: Vec<PlayerId> = game.players.iter().filter(|p| p.is_in_game()).map(|p| p.id).collect();
    match remaining.as_slice() {
        [winner] => {
            game.game_over = true;
            game.winner = Some(*winner);
            game.turn.priority_player = None;
            cx.emit(GameEvent::GameWon { player: *winner });
            cx.logger.minimal(&format!("{} wins the game", winner));
        }
        [] => {
            game.game_over = true;
            game.winner = None;
            game.turn.priority_player = None;
            cx.emit(GameEvent::GameDrawn);
            cx.logger.minimal("the game is a draw");
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::core::{
        CardData, CardScript, Color, DamageMarked, Duration, Effect, EffectTarget, InMemoryRegistry, Modification,
        ObjectFilter, Target, TargetKind, TargetRequirement,
    };
    use crate::game::layers;
    use crate::game::logger::GameLogger;

    fn aura_registry() -> InMemoryRegistry {
        let mut registry = InMemoryRegistry::new();
        registry.register(CardScript::with_card(CardData::enchantment("Pacifism", "1W").with_subtype("Aura")).spell(
            Effect::Attach { what: EffectTarget::ThisObject, to: EffectTarget::Targets(0) },
            vec![TargetRequirement::single(TargetKind::Permanent(ObjectFilter::creature()))],
        ));
        registry
    }

    fn attach_pacifism(game: &mut GameState, controller: PlayerId, host: EntityId) -> EntityId {
        let aura = CardData::enchantment("Pacifism", "1W").with_subtype("Aura");
        let id = game.create_card(controller, aura, Zone::Battlefield);
        game.entity_mut(id).unwrap().insert(AttachedTo(host));
        id
    }

    fn setup() -> (GameState, PlayerId, PlayerId) {
        let game = GameState::new_two_player("Alice", "Bob", GameConfig::default());
        let p1 = game.players[0].id;
        let p2 = game.players[1].id;
        (game, p1, p2)
    }

    #[test]
    fn test_zero_life_loses_and_opponent_wins() {
        let (mut game, p1, p2) = setup();
        let registry = InMemoryRegistry::new();
        let logger = GameLogger::new();
        let mut cx = EngineContext::new(&registry, &logger);
        game.player_mut(p2).unwrap().life = 0;

        check_and_apply(&mut game, &mut cx);
        assert!(game.player(p2).unwrap().has_lost);
        assert!(game.game_over);
        assert_eq!(game.winner, Some(p1));
        assert!(cx.events.contains(&GameEvent::GameWon { player: p1 }));
    }

    #[test]
    fn test_fixpoint_is_idempotent() {
        let (mut game, p1, p2) = setup();
        let registry = InMemoryRegistry::new();
        let logger = GameLogger::new();
        let mut cx = EngineContext::new(&registry, &logger);
        let bears = game.create_card(p1, CardData::creature("Grizzly Bears", "1G", 2, 2), Zone::Battlefield);
        game.create_card(p2, CardData::creature("Hill Giant", "3R", 3, 3), Zone::Battlefield);
        replacement::deal_damage(&mut game, &mut cx, bears, Target::Object(bears), 2, false);

        assert!(check_and_apply(&mut game, &mut cx) > 0);
        assert_eq!(game.zone_of(bears), Some(Zone::Graveyard));
        let mark = cx.event_count();
        assert_eq!(check_and_apply(&mut game, &mut cx), 0);
        assert_eq!(cx.event_count(), mark);
    }

    #[test]
    fn test_deathtouch_damage_is_lethal() {
        let (mut game, p1, _) = setup();
        let registry = InMemoryRegistry::new();
        let logger = GameLogger::new();
        let mut cx = EngineContext::new(&registry, &logger);
        let giant = game.create_card(p1, CardData::creature("Hill Giant", "3R", 3, 3), Zone::Battlefield);
        game.entity_mut(giant).unwrap().insert(DamageMarked { amount: 1, deathtouch: true });
        check_and_apply(&mut game, &mut cx);
        assert_eq!(game.zone_of(giant), Some(Zone::Graveyard));
    }

    #[test]
    fn test_legend_rule_keeps_one() {
        let (mut game, p1, p2) = setup();
        let registry = InMemoryRegistry::new();
        let logger = GameLogger::new();
        let mut cx = EngineContext::new(&registry, &logger);
        let legend = CardData::creature("Isamaru, Hound of Konda", "W", 2, 1).legendary();
        let first = game.create_card(p1, legend.clone(), Zone::Battlefield);
        let second = game.create_card(p1, legend.clone(), Zone::Battlefield);
        let theirs = game.create_card(p2, legend, Zone::Battlefield);

        check_and_apply(&mut game, &mut cx);
        assert!(game.is_on_battlefield(first));
        assert_eq!(game.zone_of(second), Some(Zone::Graveyard));
        assert!(game.is_on_battlefield(theirs));
    }

    #[test]
    fn test_counters_annihilate() {
        let (mut game, p1, _) = setup();
        let registry = InMemoryRegistry::new();
        let logger = GameLogger::new();
        let mut cx = EngineContext::new(&registry, &logger);
        let bears = game.create_card(p1, CardData::creature("Grizzly Bears", "1G", 2, 2), Zone::Battlefield);
        let mut counters = Counters::default();
        counters.add(CounterType::plus_one(), 3);
        counters.add(CounterType::minus_one(), 1);
        game.entity_mut(bears).unwrap().insert(counters);

        check_and_apply(&mut game, &mut cx);
        let entity = game.entity(bears).unwrap();
        assert_eq!(entity.counter(&CounterType::plus_one()), 2);
        assert_eq!(entity.counter(&CounterType::minus_one()), 0);
    }

    #[test]
    fn test_bounced_token_ceases_to_exist() {
        let (mut game, p1, _) = setup();
        let registry = InMemoryRegistry::new();
        let logger = GameLogger::new();
        let mut cx = EngineContext::new(&registry, &logger);
        let token = game.create_token(p1, CardData::creature("Soldier", "", 1, 1));
        replacement::move_object(&mut game, &mut cx, token, Zone::Hand);
        assert_eq!(game.zone_of(token), Some(Zone::Hand));

        check_and_apply(&mut game, &mut cx);
        assert!(game.entity(token).is_none());
        assert!(game.hand(p1).is_empty());
        assert!(cx.events.contains(&GameEvent::TokenCeased { entity: token }));
    }

    #[test]
    fn test_unattached_aura_goes_to_graveyard() {
        let (mut game, p1, _) = setup();
        let registry = InMemoryRegistry::new();
        let logger = GameLogger::new();
        let mut cx = EngineContext::new(&registry, &logger);
        let bears = game.create_card(p1, CardData::creature("Grizzly Bears", "1G", 2, 2), Zone::Battlefield);
        let aura = game.create_card(p1, CardData::enchantment("Rancor", "G").with_subtype("Aura"), Zone::Battlefield);
        game.entity_mut(aura).unwrap().insert(AttachedTo(bears));

        assert_eq!(check_and_apply(&mut game, &mut cx), 0);
        replacement::move_object(&mut game, &mut cx, bears, Zone::Graveyard);
        check_and_apply(&mut game, &mut cx);
        assert_eq!(game.zone_of(aura), Some(Zone::Graveyard));
    }

    #[test]
    fn test_aura_falls_off_when_host_stops_being_a_creature() {
        let (mut game, p1, p2) = setup();
        let registry = aura_registry();
        let logger = GameLogger::new();
        let mut cx = EngineContext::new(&registry, &logger);
        let land = game.create_card(p2, CardData::basic_land("Forest"), Zone::Battlefield);
        layers::add_floating(
            &mut game,
            land,
            p2,
            vec![land],
            Modification::AddTypes(vec![CardType::Creature]),
            Duration::UntilEndOfTurn,
        );
        layers::add_floating(
            &mut game,
            land,
            p2,
            vec![land],
            Modification::SetPowerToughness(2, 2),
            Duration::UntilEndOfTurn,
        );
        let aura = attach_pacifism(&mut game, p1, land);

        assert_eq!(check_and_apply(&mut game, &mut cx), 0);
        assert!(game.is_on_battlefield(aura));

        // The animation wears off
        game.modifiers.clear();
        check_and_apply(&mut game, &mut cx);
        assert_eq!(game.zone_of(aura), Some(Zone::Graveyard));
        assert!(game.is_on_battlefield(land));
    }

    #[test]
    fn test_aura_falls_off_host_with_protection_from_its_color() {
        let (mut game, p1, p2) = setup();
        let registry = aura_registry();
        let logger = GameLogger::new();
        let mut cx = EngineContext::new(&registry, &logger);
        let knight = game.create_card(p2, CardData::creature("Silver Knight", "WW", 2, 2), Zone::Battlefield);
        let aura = attach_pacifism(&mut game, p1, knight);
        assert_eq!(check_and_apply(&mut game, &mut cx), 0);

        layers::add_floating(
            &mut game,
            knight,
            p2,
            vec![knight],
            Modification::AddKeywords(vec![Keyword::Protection(Color::White)]),
            Duration::UntilEndOfTurn,
        );
        check_and_apply(&mut game, &mut cx);
        assert_eq!(game.zone_of(aura), Some(Zone::Graveyard));
        assert!(game.is_on_battlefield(knight));
    }

    #[test]
    fn test_hexproof_host_keeps_its_aura() {
        let (mut game, p1, p2) = setup();
        let registry = aura_registry();
        let logger = GameLogger::new();
        let mut cx = EngineContext::new(&registry, &logger);
        let troll = game.create_card(
            p2,
            CardData::creature("Troll Ascetic", "1GG", 3, 2).with_keyword(Keyword::Hexproof),
            Zone::Battlefield,
        );
        let aura = attach_pacifism(&mut game, p1, troll);
        assert_eq!(check_and_apply(&mut game, &mut cx), 0);
        assert!(game.is_on_battlefield(aura));
    }

    #[test]
    fn test_zero_loyalty_planeswalker() {
        let (mut game, p1, _) = setup();
        let registry = InMemoryRegistry::new();
        let logger = GameLogger::new();
        let mut cx = EngineContext::new(&registry, &logger);
        let walker = game.create_card(p1, CardData::planeswalker("Chandra", "2RR", 4), Zone::Hand);
        replacement::enter_battlefield(&mut game, &mut cx, walker, p1);
        assert_eq!(game.entity(walker).unwrap().counter(&CounterType::loyalty()), 4);

        replacement::deal_damage(&mut game, &mut cx, walker, Target::Object(walker), 4, false);
        check_and_apply(&mut game, &mut cx);
        assert_eq!(game.zone_of(walker), Some(Zone::Graveyard));
    }

    #[test]
    fn test_both_players_lose_is_a_draw() {
        let (mut game, p1, p2) = setup();
        let registry = InMemoryRegistry::new();
        let logger = GameLogger::new();
        let mut cx = EngineContext::new(&registry, &logger);
        game.player_mut(p1).unwrap().life = 0;
        game.player_mut(p2).unwrap().poison = 10;
        check_and_apply(&mut game, &mut cx);
        assert!(game.game_over);
        assert_eq!(game.winner, None);
        assert!(cx.events.contains(&GameEvent::GameDrawn));
    }
}
