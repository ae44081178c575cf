//! The stack: pushing spells and abilities, resolving the top item, countering
//!
//! Spells keep their card entity and move between zones. Abilities are
//! transient entities that exist only while on the stack.

use crate::core::{
    AbilityKind, AbilityOnStack, ChosenTarget, Entity, EntityId, PlayerId, SpellOnStack, Timestamp,
};
use crate::game::context::{EngineContext, Flow};
use crate::game::events::GameEvent;
use crate::game::executor::{self, EffectContext};
use crate::game::layers::Projection;
use crate::game::replacement;
use crate::game::state::GameState;
use crate::game::targeting::{self, TargetSource};
use crate::zones::Zone;
use crate::{Result, RulesError};

/// Top of the stack, if any
pub fn top(game: &GameState) -> Option<EntityId> {
    game.stack.peek_top()
}

/// Move a card onto the stack as a spell cast by `caster`
pub fn push_spell(
    game: &mut GameState,
    cx: &mut EngineContext,
    card: EntityId,
    caster: PlayerId,
    targets: Vec<Vec<ChosenTarget>>,
    x_value: u32,
) -> Result<()> {
    let from = game
        .move_entity(card, Zone::Stack)
        .ok_or(RulesError::EntityNotFound(card.as_u32()))?;
    if let Some(entity) = game.entity_mut(card) {
        entity.insert(SpellOnStack { caster, targets, x_value });
    }
    cx.emit(GameEvent::ZoneChanged { entity: card, from: Some(from), to: Zone::Stack });
    cx.emit(GameEvent::SpellCast { player: caster, spell: card });
    cx.logger.normal(&format!("{} casts {}", caster, game.card_name(card)));
    Ok(())
}

/// Create a transient stack entity for an activated or triggered ability
pub fn push_ability(game: &mut GameState, cx: &mut EngineContext, ability: AbilityOnStack) -> EntityId {
    let id = game.entities.next_id();
    let stamp = game.next_timestamp();
    let (controller, source, kind) = (ability.controller, ability.source, ability.kind);
    cx.logger.verbose(&format!("ability of {} goes on the stack", ability.source_name));
    game.entities
        .insert(id, Entity::new(id).with(ability).with(Timestamp(stamp)));
    game.stack.add(id);
    match kind {
        AbilityKind::Activated => cx.emit(GameEvent::AbilityActivated { player: controller, source, ability: id }),
        AbilityKind::Triggered => cx.emit(GameEvent::TriggerPutOnStack { controller, source, ability: id }),
    }
    id
}

/// Pop and resolve the top item
///
/// Targets are revalidated first. A targeted item whose every target became
/// illegal fizzles; otherwise only the still-legal targets are used.
pub fn resolve_top(game: &mut GameState, cx: &mut EngineContext) -> Result<Flow> {
    let id = top(game).ok_or_else(|| RulesError::invalid("the stack is empty"))?;
    let entity = game.entity(id).ok_or(RulesError::EntityNotFound(id.as_u32()))?;

    if let Some(ability) = entity.get::<AbilityOnStack>().cloned() {
        return Ok(resolve_ability(game, cx, id, ability));
    }
    let spell = entity
        .get::<SpellOnStack>()
        .cloned()
        .ok_or_else(|| RulesError::InvalidZoneOperation(format!("{} on the stack is neither spell nor ability", id)))?;
    Ok(resolve_spell(game, cx, id, spell))
}

fn resolve_spell(game: &mut GameState, cx: &mut EngineContext, id: EntityId, spell: SpellOnStack) -> Flow {
    let name = game.card_name(id);
    let Some(card) = game.card(id).cloned() else {
        game.stack.remove(id);
        return Flow::Continue;
    };
    let script = cx.script(&name);
    let requirements = script.map(|s| s.targets.clone()).unwrap_or_default();

    let projection = Projection::compute(game, cx.registry);
    let source = TargetSource::new(spell.caster, Some(id), card.card_colors().to_vec());
    let still_legal = targeting::validate_on_resolution(game, &projection, &requirements, &spell.targets, &source);
    if targeting::had_targets(&spell.targets) && !targeting::had_targets(&still_legal) {
        cx.logger.normal(&format!("{} fizzles", name));
        replacement::move_object(game, cx, id, Zone::Graveyard);
        cx.emit(GameEvent::Fizzled { id });
        return Flow::Continue;
    }

    cx.logger.normal(&format!("{} resolves", name));
    let ctx = EffectContext {
        x_value: spell.x_value,
        ..EffectContext::new(id, spell.caster).with_targets(still_legal)
    };
    let effect = script.and_then(|s| s.spell_effect.clone());

    if card.is_permanent() {
        replacement::enter_battlefield(game, cx, id, spell.caster);
        cx.emit(GameEvent::Resolved { id });
        // Auras attach as part of resolving
        match effect {
            Some(effect) if game.is_on_battlefield(id) => executor::run_effect(game, cx, ctx, effect),
            _ => Flow::Continue,
        }
    } else {
        let flow = match effect {
            Some(effect) => executor::run_effect(game, cx, ctx, effect),
            None => Flow::Continue,
        };
        // The card leaves the stack now even if its effect is still waiting on a decision
        if game.stack.contains(id) {
            replacement::move_object(game, cx, id, Zone::Graveyard);
        }
        cx.emit(GameEvent::Resolved { id });
        flow
    }
}

fn resolve_ability(game: &mut GameState, cx: &mut EngineContext, id: EntityId, ability: AbilityOnStack) -> Flow {
    let projection = Projection::compute(game, cx.registry);
    let source = TargetSource::new(ability.controller, Some(ability.source), ability.source_colors.clone());
    let still_legal =
        targeting::validate_on_resolution(game, &projection, &ability.requirements, &ability.targets, &source);
    game.remove_entity(id);

    if targeting::had_targets(&ability.targets) && !targeting::had_targets(&still_legal) {
        cx.logger.normal(&format!("ability of {} fizzles", ability.source_name));
        cx.emit(GameEvent::Fizzled { id });
        return Flow::Continue;
    }

    cx.logger.normal(&format!("ability of {} resolves", ability.source_name));
    cx.emit(GameEvent::Resolved { id });
    let ctx = EffectContext {
        x_value: ability.x_value,
        trigger_subject: ability.trigger_subject,
        ..EffectContext::new(ability.source, ability.controller).with_targets(still_legal)
    };
    executor::run_effect(game, cx, ctx, ability.effect)
}

/// Remove a spell or ability from the stack without resolving it
pub fn counter_spell(game: &mut GameState, cx: &mut EngineContext, id: EntityId) -> Result<()> {
    if !game.stack.contains(id) {
        return Err(RulesError::invalid(format!("{} is not on the stack", id)));
    }
    let is_ability = game.entity(id).is_some_and(|e| e.has::<AbilityOnStack>());
    cx.logger.normal(&format!("{} is countered", game.card_name(id)));
    if is_ability {
        game.remove_entity(id);
    } else {
        replacement::move_object(game, cx, id, Zone::Graveyard);
    }
    cx.emit(GameEvent::Countered { id });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::core::{
        CardData, CardScript, Effect, EffectTarget, InMemoryRegistry, Target, TargetKind, TargetRequirement,
    };
    use crate::game::logger::GameLogger;

    fn registry() -> InMemoryRegistry {
        let mut registry = InMemoryRegistry::new();
        registry.register(CardScript::with_card(CardData::instant("Lightning Bolt", "R")).spell(
            Effect::damage(3, EffectTarget::Targets(0)),
            vec![TargetRequirement::single(TargetKind::AnyTarget)],
        ));
        registry.register(CardScript::with_card(CardData::instant("Forked Bolt", "R")).spell(
            Effect::damage(1, EffectTarget::Targets(0)),
            vec![TargetRequirement::exactly(TargetKind::AnyTarget, 2)],
        ));
        registry.register(CardScript::with_card(CardData::creature("Grizzly Bears", "1G", 2, 2)));
        registry
    }

    fn setup() -> (GameState, PlayerId, PlayerId) {
        let game = GameState::new_two_player("Alice", "Bob", GameConfig::default());
        let p1 = game.players[0].id;
        let p2 = game.players[1].id;
        (game, p1, p2)
    }

    fn cast(
        game: &mut GameState,
        cx: &mut EngineContext,
        owner: PlayerId,
        card: CardData,
        targets: Vec<Vec<Target>>,
    ) -> EntityId {
        let id = game.create_card(owner, card, Zone::Hand);
        let stamped = targeting::stamp_targets(game, targets);
        push_spell(game, cx, id, owner, stamped, 0).unwrap();
        id
    }

    #[test]
    fn test_stack_is_lifo() {
        let (mut game, p1, p2) = setup();
        let registry = registry();
        let logger = GameLogger::new();
        let mut cx = EngineContext::new(&registry, &logger);
        let a = cast(&mut game, &mut cx, p1, CardData::instant("Lightning Bolt", "R"), vec![vec![Target::Player(p2)]]);
        let b = cast(&mut game, &mut cx, p1, CardData::instant("Lightning Bolt", "R"), vec![vec![Target::Player(p2)]]);

        assert_eq!(top(&game), Some(b));
        let _ = resolve_top(&mut game, &mut cx).unwrap();
        assert_eq!(top(&game), Some(a));
        let _ = resolve_top(&mut game, &mut cx).unwrap();
        assert!(game.stack.is_empty());
        assert_eq!(game.player(p2).unwrap().life, 14);

        let resolved: Vec<EntityId> = cx
            .events
            .iter()
            .filter_map(|e| match e {
                GameEvent::Resolved { id } => Some(*id),
                _ => None,
            })
            .collect();
        assert_eq!(resolved, vec![b, a]);
    }

    #[test]
    fn test_single_target_fizzles() {
        let (mut game, p1, p2) = setup();
        let registry = registry();
        let logger = GameLogger::new();
        let mut cx = EngineContext::new(&registry, &logger);
        let bears = game.create_card(p2, CardData::creature("Grizzly Bears", "1G", 2, 2), Zone::Battlefield);
        let bolt = cast(&mut game, &mut cx, p1, CardData::instant("Lightning Bolt", "R"), vec![vec![Target::Object(bears)]]);

        replacement::move_object(&mut game, &mut cx, bears, Zone::Hand);
        let _ = resolve_top(&mut game, &mut cx).unwrap();

        assert_eq!(game.zone_of(bolt), Some(Zone::Graveyard));
        assert!(cx.events.contains(&GameEvent::Fizzled { id: bolt }));
        assert!(!cx.events.contains(&GameEvent::Resolved { id: bolt }));
        assert_eq!(game.player(p2).unwrap().life, 20);
    }

    #[test]
    fn test_partial_fizzle_uses_remaining_target() {
        let (mut game, p1, p2) = setup();
        let registry = registry();
        let logger = GameLogger::new();
        let mut cx = EngineContext::new(&registry, &logger);
        let bears = game.create_card(p2, CardData::creature("Grizzly Bears", "1G", 2, 2), Zone::Battlefield);
        let fork = cast(
            &mut game,
            &mut cx,
            p1,
            CardData::instant("Forked Bolt", "R"),
            vec![vec![Target::Object(bears), Target::Player(p2)]],
        );

        replacement::move_object(&mut game, &mut cx, bears, Zone::Exile);
        let _ = resolve_top(&mut game, &mut cx).unwrap();

        assert!(cx.events.contains(&GameEvent::Resolved { id: fork }));
        assert_eq!(game.player(p2).unwrap().life, 19);
        assert_eq!(game.zone_of(fork), Some(Zone::Graveyard));
    }

    #[test]
    fn test_permanent_spell_enters_under_caster() {
        let (mut game, p1, _) = setup();
        let registry = registry();
        let logger = GameLogger::new();
        let mut cx = EngineContext::new(&registry, &logger);
        let bears = cast(&mut game, &mut cx, p1, CardData::creature("Grizzly Bears", "1G", 2, 2), vec![]);
        let _ = resolve_top(&mut game, &mut cx).unwrap();
        assert!(game.is_on_battlefield(bears));
        assert_eq!(game.controller_of(bears), Some(p1));
        assert!(game.entity(bears).unwrap().has::<crate::core::SummoningSickness>());
        assert!(!game.entity(bears).unwrap().has::<SpellOnStack>());
    }

    #[test]
    fn test_counter_and_empty_stack_errors() {
        let (mut game, p1, p2) = setup();
        let registry = registry();
        let logger = GameLogger::new();
        let mut cx = EngineContext::new(&registry, &logger);
        assert!(resolve_top(&mut game, &mut cx).is_err());

        let bolt = cast(&mut game, &mut cx, p1, CardData::instant("Lightning Bolt", "R"), vec![vec![Target::Player(p2)]]);
        counter_spell(&mut game, &mut cx, bolt).unwrap();
        assert_eq!(game.zone_of(bolt), Some(Zone::Graveyard));
        assert!(counter_spell(&mut game, &mut cx, bolt).is_err());
        assert_eq!(game.player(p2).unwrap().life, 20);
    }

    #[test]
    fn test_ability_leaves_no_trace() {
        let (mut game, p1, p2) = setup();
        let registry = registry();
        let logger = GameLogger::new();
        let mut cx = EngineContext::new(&registry, &logger);
        let source = game.create_card(p1, CardData::creature("Prodigal Pyromancer", "2R", 1, 1), Zone::Battlefield);
        let ability = AbilityOnStack {
            source,
            source_name: "Prodigal Pyromancer".into(),
            source_colors: vec![crate::core::Color::Red],
            controller: p1,
            kind: AbilityKind::Activated,
            effect: Effect::damage(1, EffectTarget::Targets(0)),
            requirements: vec![TargetRequirement::single(TargetKind::AnyTarget)],
            targets: targeting::stamp_targets(&game, vec![vec![Target::Player(p2)]]),
            x_value: 0,
            trigger_subject: None,
        };
        let id = push_ability(&mut game, &mut cx, ability);
        let _ = resolve_top(&mut game, &mut cx).unwrap();
        assert!(game.entity(id).is_none());
        assert!(game.stack.is_empty());
        assert_eq!(game.player(p2).unwrap().life, 19);
    }
}
