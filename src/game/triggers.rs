//! Triggered abilities: detection from emitted events and placement on the stack

use crate::core::{
    AbilityKind, AbilityOnStack, CardName, Characteristics, Color, EntityId, FilterContext, PlayerId, Target,
    TriggerEvent, TriggerSubject, TriggeredAbility,
};
use crate::game::context::{EngineContext, Flow};
use crate::game::continuation::{self, Continuation};
use crate::game::decision::{DecisionKind, OrderItem};
use crate::game::events::GameEvent;
use crate::game::layers::Projection;
use crate::game::phase::Step;
use crate::game::stack;
use crate::game::state::GameState;
use crate::game::targeting::{self, TargetSource};
use serde::{Deserialize, Serialize};

/// A triggered ability waiting to be put on the stack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingTrigger {
    pub id: u64,
    pub controller: PlayerId,
    pub source: EntityId,
    pub source_name: CardName,
    pub source_colors: Vec<Color>,
    pub ability: TriggeredAbility,
    /// The object the triggering event was about
    pub trigger_subject: Option<EntityId>,
    /// The controller already placed this trigger in order
    #[serde(default)]
    pub ordered: bool,
}

impl PendingTrigger {
    fn label(&self) -> String {
        if self.ability.label.is_empty() {
            format!("{} trigger", self.source_name)
        } else {
            format!("{}: {}", self.source_name, self.ability.label)
        }
    }
}

/// A permanent (or, looking back, a card that just left) whose triggers are checked
struct Watcher {
    id: EntityId,
    controller: PlayerId,
    name: CardName,
    colors: Vec<Color>,
}

fn watchers(game: &GameState, projection: &Projection) -> Vec<Watcher> {
    game.battlefield
        .cards
        .iter()
        .filter_map(|&id| {
            let chars = projection.get(id)?;
            if chars.abilities_removed {
                return None;
            }
            Some(Watcher {
                id,
                controller: chars.controller,
                name: chars.name.clone(),
                colors: chars.colors.to_vec(),
            })
        })
        .collect()
}

fn subject_matches(
    subject: &TriggerSubject,
    watcher: &Watcher,
    object: EntityId,
    chars: Option<&Characteristics>,
) -> bool {
    match subject {
        TriggerSubject::ThisObject => watcher.id == object,
        TriggerSubject::Matching(filter) => {
            let ctx = FilterContext { you: watcher.controller, source: Some(watcher.id) };
            chars.is_some_and(|c| filter.matches(c, object, &ctx))
        }
    }
}

/// Scan events emitted since the last scan and queue every trigger they cause
pub fn detect(game: &mut GameState, cx: &mut EngineContext) {
    let events = cx.unscanned_events();
    if events.is_empty() {
        return;
    }
    let projection = Projection::compute(game, cx.registry);
    let on_battlefield = watchers(game, &projection);
    let mut found: Vec<(Watcher, TriggeredAbility, Option<EntityId>)> = Vec::new();

    for event in &events {
        // Look back: a card that just died still sees its own "when this dies"
        let departed = match event {
            GameEvent::Died { entity, controller } => game.entity(*entity).and_then(|e| e.card()).map(|card| Watcher {
                id: *entity,
                controller: *controller,
                name: card.name.clone(),
                colors: card.card_colors().to_vec(),
            }),
            _ => None,
        };
        let candidates = on_battlefield.iter().chain(departed.as_ref());

        for watcher in candidates {
            let Some(script) = cx.script(watcher.name.as_str()) else { continue };
            for ability in &script.triggers {
                if let Some(subject) = triggers_on(game, &projection, watcher, &ability.event, event) {
                    found.push((
                        Watcher {
                            id: watcher.id,
                            controller: watcher.controller,
                            name: watcher.name.clone(),
                            colors: watcher.colors.clone(),
                        },
                        ability.clone(),
                        subject,
                    ));
                }
            }
        }
    }

    for (watcher, ability, subject) in found {
        let id = game.next_trigger_id();
        cx.logger.verbose(&format!("{} triggers", watcher.name));
        game.pending_triggers.push(PendingTrigger {
            id,
            controller: watcher.controller,
            source: watcher.id,
            source_name: watcher.name,
            source_colors: watcher.colors,
            ability,
            trigger_subject: subject,
            ordered: false,
        });
    }
}

/// Whether `event` fires `trigger` for this watcher; the inner value is the trigger subject
fn triggers_on(
    game: &GameState,
    projection: &Projection,
    watcher: &Watcher,
    trigger: &TriggerEvent,
    event: &GameEvent,
) -> Option<Option<EntityId>> {
    let you = watcher.controller;
    match (trigger, event) {
        (TriggerEvent::EntersBattlefield(subject), GameEvent::EnteredBattlefield { entity, .. }) => {
            subject_matches(subject, watcher, *entity, projection.get(*entity)).then_some(Some(*entity))
        }
        (TriggerEvent::Dies(subject), GameEvent::Died { entity, controller }) => {
            let mut chars = game.raw_characteristics(*entity)?;
            chars.controller = *controller;
            subject_matches(subject, watcher, *entity, Some(&chars)).then_some(Some(*entity))
        }
        (TriggerEvent::BeginningOfUpkeep(filter), GameEvent::StepBegan { step: Step::Upkeep, active_player })
        | (TriggerEvent::BeginningOfEndStep(filter), GameEvent::StepBegan { step: Step::End, active_player }) => {
            filter.matches(*active_player, you).then_some(None)
        }
        (TriggerEvent::SpellCast { filter, caster }, GameEvent::SpellCast { player, spell }) => {
            let chars = game.raw_characteristics(*spell)?;
            let ctx = FilterContext { you, source: Some(watcher.id) };
            (caster.matches(*player, you) && filter.matches(&chars, *spell, &ctx)).then_some(Some(*spell))
        }
        (TriggerEvent::Attacks(subject), GameEvent::AttackersDeclared { attackers, .. }) => attackers
            .iter()
            .find(|a| subject_matches(subject, watcher, **a, projection.get(**a)))
            .map(|a| Some(*a)),
        (
            TriggerEvent::DealsCombatDamageToPlayer(subject),
            GameEvent::DamageDealt { source, target: Target::Player(_), combat: true, .. },
        ) => subject_matches(subject, watcher, *source, projection.get(*source)).then_some(Some(*source)),
        (TriggerEvent::LifeGained(filter), GameEvent::LifeGained { player, .. })
        | (TriggerEvent::CardDrawn(filter), GameEvent::CardDrawn { player, .. }) => {
            filter.matches(*player, you).then_some(None)
        }
        _ => None,
    }
}

/// Put waiting triggers on the stack in APNAP order
///
/// A player with several simultaneous triggers orders them first; a trigger
/// with targets asks for them, and is removed when no legal choice exists.
pub fn put_pending(game: &mut GameState, cx: &mut EngineContext) -> Flow {
    for player in game.apnap_order() {
        let mine: Vec<&PendingTrigger> = game.pending_triggers.iter().filter(|t| t.controller == player).collect();
        if mine.len() >= 2 && mine.iter().any(|t| !t.ordered) {
            let items = mine.iter().map(|t| OrderItem { id: t.id, label: t.label() }).collect();
            return continuation::ask(
                game,
                cx,
                player,
                DecisionKind::OrderObjects { items },
                None,
                "Order your triggered abilities (first goes on the stack first)",
                Continuation::TriggerOrder { player },
            );
        }

        while let Some(index) = game.pending_triggers.iter().position(|t| t.controller == player) {
            let trigger = game.pending_triggers.remove(index);
            if place(game, cx, trigger).is_paused() {
                return Flow::Paused;
            }
        }
    }
    Flow::Continue
}

/// Rearrange one player's pending triggers to match their chosen order
pub fn apply_order(game: &mut GameState, player: PlayerId, order: &[u64]) {
    let (mut mine, others): (Vec<PendingTrigger>, Vec<PendingTrigger>) =
        game.pending_triggers.drain(..).partition(|t| t.controller == player);
    mine.sort_by_key(|t| order.iter().position(|id| *id == t.id).unwrap_or(usize::MAX));
    for trigger in &mut mine {
        trigger.ordered = true;
    }
    game.pending_triggers = others;
    game.pending_triggers.extend(mine);
}

fn place(game: &mut GameState, cx: &mut EngineContext, trigger: PendingTrigger) -> Flow {
    let requirements = trigger.ability.targets.clone();
    if requirements.is_empty() {
        push(game, cx, trigger, Vec::new());
        return Flow::Continue;
    }

    let projection = Projection::compute(game, cx.registry);
    let source = TargetSource::new(trigger.controller, Some(trigger.source), trigger.source_colors.clone());
    if !targeting::has_legal_selection(game, &projection, &requirements, &source) {
        cx.logger.normal(&format!("{} has no legal targets", trigger.label()));
        cx.emit(GameEvent::TriggerRemoved { controller: trigger.controller, source: trigger.source });
        return Flow::Continue;
    }
    let legal = targeting::legal_targets_for_all(game, &projection, &requirements, &source);

    // Nothing to choose: every slot must take all of its legal targets
    if requirements.iter().zip(&legal).all(|(req, options)| options.len() == req.min) {
        push(game, cx, trigger, legal);
        return Flow::Continue;
    }

    let player = trigger.controller;
    let prompt = format!("Choose targets for {}", trigger.label());
    let source_id = Some(trigger.source);
    continuation::ask(
        game,
        cx,
        player,
        DecisionKind::ChooseTargets { requirements, legal },
        source_id,
        prompt,
        Continuation::TriggerTargets { trigger },
    )
}

/// Finish placing a trigger once its targets are chosen, then keep going
pub fn put_with_targets(
    game: &mut GameState,
    cx: &mut EngineContext,
    trigger: PendingTrigger,
    targets: Vec<Vec<Target>>,
) -> Flow {
    push(game, cx, trigger, targets);
    put_pending(game, cx)
}

fn push(game: &mut GameState, cx: &mut EngineContext, trigger: PendingTrigger, targets: Vec<Vec<Target>>) {
    let stamped = targeting::stamp_targets(game, targets);
    let ability = AbilityOnStack {
        source: trigger.source,
        source_name: trigger.source_name,
        source_colors: trigger.source_colors,
        controller: trigger.controller,
        kind: AbilityKind::Triggered,
        effect: trigger.ability.effect,
        requirements: trigger.ability.targets,
        targets: stamped,
        x_value: 0,
        trigger_subject: trigger.trigger_subject,
    };
    stack::push_ability(game, cx, ability);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::core::{
        Amount, CardData, CardScript, Effect, EffectTarget, InMemoryRegistry, ObjectFilter, PlayerFilter, PlayerRef,
        TargetKind, TargetRequirement,
    };
    use crate::game::decision::DecisionResponse;
    use crate::game::logger::GameLogger;
    use crate::game::replacement;
    use crate::zones::Zone;

    fn registry() -> InMemoryRegistry {
        let mut registry = InMemoryRegistry::new();
        registry.register(CardScript::with_card(CardData::creature("Doomed Traveler", "W", 1, 1)).with_trigger(
            TriggeredAbility {
                event: TriggerEvent::Dies(TriggerSubject::ThisObject),
                effect: Effect::GainLife { amount: Amount::Fixed(1), player: PlayerRef::You },
                targets: vec![],
                label: "gain 1 life".into(),
            },
        ));
        registry.register(CardScript::with_card(CardData::creature("Soul Warden", "W", 1, 1)).with_trigger(
            TriggeredAbility {
                event: TriggerEvent::EntersBattlefield(TriggerSubject::Matching(ObjectFilter::creature().other())),
                effect: Effect::GainLife { amount: Amount::Fixed(1), player: PlayerRef::You },
                targets: vec![],
                label: String::new(),
            },
        ));
        registry.register(CardScript::with_card(CardData::creature("Flametongue Kavu", "3R", 4, 2)).with_trigger(
            TriggeredAbility {
                event: TriggerEvent::EntersBattlefield(TriggerSubject::ThisObject),
                effect: Effect::damage(4, EffectTarget::Targets(0)),
                targets: vec![TargetRequirement::single(TargetKind::Permanent(ObjectFilter::creature()))],
                label: String::new(),
            },
        ));
        registry.register(CardScript::with_card(CardData::enchantment("Phyrexian Arena", "1BB")).with_trigger(
            TriggeredAbility {
                event: TriggerEvent::BeginningOfUpkeep(PlayerFilter::You),
                effect: Effect::draw(1),
                targets: vec![],
                label: String::new(),
            },
        ));
        registry
    }

    fn setup() -> (GameState, PlayerId, PlayerId) {
        let game = GameState::new_two_player("Alice", "Bob", GameConfig::default());
        let p1 = game.players[0].id;
        let p2 = game.players[1].id;
        (game, p1, p2)
    }

    #[test]
    fn test_dies_trigger_looks_back() {
        let (mut game, p1, _) = setup();
        let registry = registry();
        let logger = GameLogger::new();
        let mut cx = EngineContext::new(&registry, &logger);
        let traveler = game.create_card(p1, CardData::creature("Doomed Traveler", "W", 1, 1), Zone::Battlefield);
        replacement::move_object(&mut game, &mut cx, traveler, Zone::Graveyard);

        detect(&mut game, &mut cx);
        assert_eq!(game.pending_triggers.len(), 1);
        assert_eq!(game.pending_triggers[0].source, traveler);
        assert_eq!(put_pending(&mut game, &mut cx), Flow::Continue);
        assert_eq!(game.stack.len(), 1);
    }

    #[test]
    fn test_enter_trigger_asks_for_targets() {
        let (mut game, p1, p2) = setup();
        let registry = registry();
        let logger = GameLogger::new();
        let mut cx = EngineContext::new(&registry, &logger);
        let bears = game.create_card(p2, CardData::creature("Grizzly Bears", "1G", 2, 2), Zone::Battlefield);
        let kavu = game.create_card(p1, CardData::creature("Flametongue Kavu", "3R", 4, 2), Zone::Hand);
        replacement::enter_battlefield(&mut game, &mut cx, kavu, p1);

        detect(&mut game, &mut cx);
        // Kavu itself is also a legal target, so the controller must choose
        assert!(put_pending(&mut game, &mut cx).is_paused());
        let decision = game.pending_decision.take().unwrap();
        let response = DecisionResponse::Targets(vec![vec![Target::Object(bears)]]);
        decision.validate(&response).unwrap();
        let frame = game.continuations.pop().unwrap();
        let _ = continuation::resume(&mut game, &mut cx, frame, response).unwrap();
        assert_eq!(game.stack.len(), 1);
    }

    #[test]
    fn test_trigger_without_legal_target_is_removed() {
        let (mut game, p1, _) = setup();
        let registry = registry();
        let logger = GameLogger::new();
        let mut cx = EngineContext::new(&registry, &logger);
        let kavu = game.create_card(p1, CardData::creature("Flametongue Kavu", "3R", 4, 2), Zone::Hand);
        replacement::enter_battlefield(&mut game, &mut cx, kavu, p1);
        detect(&mut game, &mut cx);
        assert_eq!(game.pending_triggers.len(), 1);

        // Kavu leaves before its trigger is put on the stack; no creature remains to target
        replacement::move_object(&mut game, &mut cx, kavu, Zone::Graveyard);
        assert_eq!(put_pending(&mut game, &mut cx), Flow::Continue);
        assert!(game.stack.is_empty());
        assert!(cx.events.iter().any(|e| matches!(e, GameEvent::TriggerRemoved { .. })));
    }

    #[test]
    fn test_simultaneous_triggers_are_ordered() {
        let (mut game, p1, _) = setup();
        let registry = registry();
        let logger = GameLogger::new();
        let mut cx = EngineContext::new(&registry, &logger);
        game.create_card(p1, CardData::creature("Soul Warden", "W", 1, 1), Zone::Battlefield);
        game.create_card(p1, CardData::enchantment("Phyrexian Arena", "1BB"), Zone::Battlefield);
        let bears = game.create_card(p1, CardData::creature("Grizzly Bears", "1G", 2, 2), Zone::Hand);
        replacement::enter_battlefield(&mut game, &mut cx, bears, p1);
        cx.emit(GameEvent::StepBegan { step: Step::Upkeep, active_player: p1 });

        detect(&mut game, &mut cx);
        assert_eq!(game.pending_triggers.len(), 2);
        assert!(put_pending(&mut game, &mut cx).is_paused());

        let ids: Vec<u64> = game.pending_triggers.iter().rev().map(|t| t.id).collect();
        let arena_first = ids.clone();
        apply_order(&mut game, p1, &arena_first);
        game.pending_decision = None;
        game.continuations.clear();
        assert_eq!(put_pending(&mut game, &mut cx), Flow::Continue);
        assert_eq!(game.stack.len(), 2);
        // The last one placed is on top
        let top = game.entity(game.stack.peek_top().unwrap()).unwrap();
        assert_eq!(top.get::<AbilityOnStack>().unwrap().source_name.as_str(), "Soul Warden");
    }

    #[test]
    fn test_upkeep_trigger_only_for_controller() {
        let (mut game, p1, p2) = setup();
        let registry = registry();
        let logger = GameLogger::new();
        let mut cx = EngineContext::new(&registry, &logger);
        game.create_card(p1, CardData::enchantment("Phyrexian Arena", "1BB"), Zone::Battlefield);
        cx.emit(GameEvent::StepBegan { step: Step::Upkeep, active_player: p2 });
        detect(&mut game, &mut cx);
        assert!(game.pending_triggers.is_empty());
    }
}
