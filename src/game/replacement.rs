//! Replacement pipeline and event commitment
//!
//! Every damage, draw, counter, life-gain and zone-change event is first run
//! through the active replacement effects and only then applied to the state.
//! A replacement source applies at most once to a given event instance and to
//! everything that event is replaced with, which bounds the recursion.

use crate::core::{
    CardRegistry, Counters, CounterType, DamageMarked, EntityId, EventMatcher, FilterContext, Keyword, PlayerId,
    ReplacementAction, Target,
};
use crate::game::context::EngineContext;
use crate::game::events::GameEvent;
use crate::game::layers::Projection;
use crate::game::state::GameState;
use crate::zones::Zone;
use serde::{Deserialize, Serialize};

/// An event that has not happened yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReplaceableEvent {
    Damage { source: EntityId, target: Target, amount: u32, combat: bool },
    Draw { player: PlayerId },
    PutCounters { object: EntityId, counter: CounterType, amount: u32 },
    GainLife { player: PlayerId, amount: u32 },
    ZoneChange { object: EntityId, from: Zone, to: Zone },
}

/// Result of applying one replacement to one event
#[derive(Debug, Clone, PartialEq)]
pub enum Replacement {
    /// Keep processing the rewritten event
    Modified(ReplaceableEvent),
    /// The event is replaced by these events (possibly none)
    Replaced(Vec<ReplaceableEvent>),
    NotApplicable,
}

/// Floating "prevent the next N damage" shield
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageShield {
    pub id: u64,
    pub source: EntityId,
    pub target: Target,
    pub remaining: u32,
}

/// Identity of a replacement effect, used for the once-per-event rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplacementSource {
    Ability { object: EntityId, index: usize },
    Shield(u64),
}

impl ReplacementSource {
    fn object(&self, game: &GameState) -> EntityId {
        match self {
            ReplacementSource::Ability { object, .. } => *object,
            ReplacementSource::Shield(id) => game
                .damage_shields
                .iter()
                .find(|s| s.id == *id)
                .map(|s| s.source)
                .unwrap_or(EntityId::new(0)),
        }
    }
}

/// Run an event through the replacement pipeline
///
/// Returns the events that actually happen, in order. Candidates are tried in
/// encounter order: permanents in battlefield order, then floating shields.
pub fn process(game: &mut GameState, cx: &mut EngineContext, event: ReplaceableEvent) -> Vec<ReplaceableEvent> {
    let projection = Projection::compute(game, cx.registry);
    let mut out = Vec::new();
    run(game, cx, &projection, event, Vec::new(), &mut out);
    out
}

fn run(
    game: &mut GameState,
    cx: &mut EngineContext,
    projection: &Projection,
    mut event: ReplaceableEvent,
    mut applied: Vec<ReplacementSource>,
    out: &mut Vec<ReplaceableEvent>,
) {
    loop {
        let next = candidates(game, cx.registry, projection, &event)
            .into_iter()
            .find(|(source, _)| !applied.contains(source));
        let Some((source, action)) = next else {
            out.push(event);
            return;
        };
        applied.push(source);
        let object = source.object(game);

        let result = match &action {
            Candidate::Ability(action) => apply_action(action, &event),
            Candidate::Shield => apply_shield(game, source, &event),
        };
        if result != Replacement::NotApplicable {
            cx.emit(GameEvent::ReplacementApplied { source: object });
        }
        match result {
            Replacement::Modified(modified) => event = modified,
            Replacement::Replaced(events) => {
                for replacement in events {
                    run(game, cx, projection, replacement, applied.clone(), out);
                }
                return;
            }
            Replacement::NotApplicable => {}
        }
    }
}

enum Candidate {
    Ability(ReplacementAction),
    Shield,
}

fn candidates(
    game: &GameState,
    registry: &dyn CardRegistry,
    projection: &Projection,
    event: &ReplaceableEvent,
) -> Vec<(ReplacementSource, Candidate)> {
    let mut found = Vec::new();
    for &id in &game.battlefield.cards {
        let Some(chars) = projection.get(id) else { continue };
        if chars.abilities_removed {
            continue;
        }
        let Some(script) = registry.script(chars.name.as_str()) else { continue };
        for (index, ability) in script.replacements.iter().enumerate() {
            if matches_event(game, projection, &ability.matcher, id, chars.controller, event) {
                found.push((ReplacementSource::Ability { object: id, index }, Candidate::Ability(ability.action.clone())));
            }
        }
    }
    if let ReplaceableEvent::Damage { target, .. } = event {
        for shield in &game.damage_shields {
            if shield.target == *target && shield.remaining > 0 {
                found.push((ReplacementSource::Shield(shield.id), Candidate::Shield));
            }
        }
    }
    found
}

fn matches_event(
    game: &GameState,
    projection: &Projection,
    matcher: &EventMatcher,
    this: EntityId,
    you: PlayerId,
    event: &ReplaceableEvent,
) -> bool {
    let ctx = FilterContext { you, source: Some(this) };
    let object_matches = |object: EntityId, filter: &crate::core::ObjectFilter| {
        projection.get(object).is_some_and(|c| filter.matches(c, object, &ctx))
    };
    match (matcher, event) {
        (EventMatcher::DamageToYou, ReplaceableEvent::Damage { target, .. }) => *target == Target::Player(you),
        (EventMatcher::DamageToThis, ReplaceableEvent::Damage { target, .. }) => *target == Target::Object(this),
        (EventMatcher::DamageToPermanents(filter), ReplaceableEvent::Damage { target: Target::Object(o), .. }) => {
            object_matches(*o, filter)
        }
        (EventMatcher::DamageFromThis, ReplaceableEvent::Damage { source, .. }) => *source == this,
        (EventMatcher::DamageFromSourcesYouControl, ReplaceableEvent::Damage { source, .. }) => {
            projection.controller(*source).or_else(|| game.controller_of(*source)) == Some(you)
        }
        (EventMatcher::YouWouldDraw, ReplaceableEvent::Draw { player }) => *player == you,
        (EventMatcher::CountersOnThis(kind), ReplaceableEvent::PutCounters { object, counter, .. }) => {
            *object == this && kind.as_ref().map_or(true, |k| k == counter)
        }
        (EventMatcher::CountersOnPermanents(filter, kind), ReplaceableEvent::PutCounters { object, counter, .. }) => {
            object_matches(*object, filter) && kind.as_ref().map_or(true, |k| k == counter)
        }
        (EventMatcher::YouWouldGainLife, ReplaceableEvent::GainLife { player, .. }) => *player == you,
        (
            EventMatcher::WouldLeaveBattlefield { filter, to: watched },
            ReplaceableEvent::ZoneChange { object, from: Zone::Battlefield, to },
        ) => to == watched && object_matches(*object, filter),
        _ => false,
    }
}

fn apply_action(action: &ReplacementAction, event: &ReplaceableEvent) -> Replacement {
    use ReplaceableEvent as E;
    match (action, event) {
        (ReplacementAction::PreventDamage, E::Damage { .. }) => Replacement::Replaced(Vec::new()),
        (ReplacementAction::DoubleDamage, E::Damage { source, target, amount, combat }) => {
            Replacement::Modified(E::Damage { source: *source, target: *target, amount: amount * 2, combat: *combat })
        }
        (ReplacementAction::AddDamage(n), E::Damage { source, target, amount, combat }) => {
            Replacement::Modified(E::Damage { source: *source, target: *target, amount: amount + n, combat: *combat })
        }
        (ReplacementAction::SkipDraw, E::Draw { .. }) => Replacement::Replaced(Vec::new()),
        (ReplacementAction::DrawTwoInstead, E::Draw { player }) => {
            Replacement::Replaced(vec![E::Draw { player: *player }, E::Draw { player: *player }])
        }
        (ReplacementAction::DoubleCounters, E::PutCounters { object, counter, amount }) => {
            Replacement::Modified(E::PutCounters { object: *object, counter: counter.clone(), amount: amount * 2 })
        }
        (ReplacementAction::AddCounters(n), E::PutCounters { object, counter, amount }) => {
            Replacement::Modified(E::PutCounters { object: *object, counter: counter.clone(), amount: amount + n })
        }
        (ReplacementAction::DoubleLifeGain, E::GainLife { player, amount }) => {
            Replacement::Modified(E::GainLife { player: *player, amount: amount * 2 })
        }
        (ReplacementAction::ChangeDestination(zone), E::ZoneChange { object, from, .. }) => {
            Replacement::Modified(E::ZoneChange { object: *object, from: *from, to: *zone })
        }
        _ => Replacement::NotApplicable,
    }
}

fn apply_shield(game: &mut GameState, source: ReplacementSource, event: &ReplaceableEvent) -> Replacement {
    let ReplacementSource::Shield(id) = source else {
        return Replacement::NotApplicable;
    };
    let ReplaceableEvent::Damage { source, target, amount, combat } = event else {
        return Replacement::NotApplicable;
    };
    let Some(shield) = game.damage_shields.iter_mut().find(|s| s.id == id) else {
        return Replacement::NotApplicable;
    };
    let prevented = shield.remaining.min(*amount);
    shield.remaining -= prevented;
    game.damage_shields.retain(|s| s.remaining > 0);
    if prevented == *amount {
        Replacement::Replaced(Vec::new())
    } else {
        Replacement::Modified(ReplaceableEvent::Damage {
            source: *source,
            target: *target,
            amount: amount - prevented,
            combat: *combat,
        })
    }
}

/// Create a floating prevention shield
pub fn add_damage_shield(game: &mut GameState, source: EntityId, target: Target, amount: u32) {
    let id = game.next_timestamp();
    game.damage_shields.push(DamageShield { id, source, target, remaining: amount });
}

// ---- committing ----

/// Deal damage from one source; returns the damage actually dealt
pub fn deal_damage(
    game: &mut GameState,
    cx: &mut EngineContext,
    source: EntityId,
    target: Target,
    amount: u32,
    combat: bool,
) -> u32 {
    if amount == 0 {
        return 0;
    }
    let events = process(game, cx, ReplaceableEvent::Damage { source, target, amount, combat });
    commit_damage(game, cx, events)
}

/// Deal a batch of damage simultaneously (a combat damage pass)
///
/// Every assignment is replaced first, then all results are committed.
pub fn deal_damage_simultaneously(
    game: &mut GameState,
    cx: &mut EngineContext,
    assignments: Vec<(EntityId, Target, u32)>,
    combat: bool,
) -> u32 {
    let mut events = Vec::new();
    for (source, target, amount) in assignments {
        if amount > 0 {
            events.extend(process(game, cx, ReplaceableEvent::Damage { source, target, amount, combat }));
        }
    }
    commit_damage(game, cx, events)
}

fn commit_damage(game: &mut GameState, cx: &mut EngineContext, events: Vec<ReplaceableEvent>) -> u32 {
    let projection = Projection::compute(game, cx.registry);
    let mut total = 0;
    let mut lifelink: Vec<(PlayerId, u32)> = Vec::new();
    for event in events {
        match event {
            ReplaceableEvent::Damage { source, target, amount, combat } if amount > 0 => {
                let source_chars = projection.characteristics(game, source);
                let deathtouch = source_chars.as_ref().is_some_and(|c| c.has_keyword(&Keyword::Deathtouch));
                let dealt = match target {
                    Target::Player(player) => match game.player_mut(player) {
                        Ok(p) if p.is_in_game() => {
                            p.lose_life(amount as i32);
                            cx.emit(GameEvent::DamageDealt { source, target, amount, combat });
                            cx.emit(GameEvent::LifeLost { player, amount });
                            amount
                        }
                        _ => 0,
                    },
                    Target::Object(object) => damage_permanent(game, cx, &projection, source, object, amount, deathtouch, combat),
                };
                if dealt > 0 {
                    total += dealt;
                    if let Some(chars) = source_chars.filter(|c| c.has_keyword(&Keyword::Lifelink)) {
                        lifelink.push((chars.controller, dealt));
                    }
                }
            }
            ReplaceableEvent::Damage { .. } => {}
            other => commit(game, cx, other),
        }
    }
    for (player, amount) in lifelink {
        gain_life(game, cx, player, amount);
    }
    total
}

#[allow(clippy::too_many_arguments)]
fn damage_permanent(
    game: &mut GameState,
    cx: &mut EngineContext,
    projection: &Projection,
    source: EntityId,
    object: EntityId,
    amount: u32,
    deathtouch: bool,
    combat: bool,
) -> u32 {
    let Some(chars) = projection.get(object) else {
        return 0;
    };
    let is_creature = chars.is_creature();
    let is_planeswalker = chars.is_type(crate::core::CardType::Planeswalker);
    let Some(entity) = game.entity_mut(object) else {
        return 0;
    };
    if is_creature {
        let mut marked = entity.get::<DamageMarked>().copied().unwrap_or_default();
        marked.amount += amount;
        marked.deathtouch |= deathtouch;
        entity.insert(marked);
    }
    if is_planeswalker {
        if let Some(counters) = entity.get_mut::<Counters>() {
            let removed = counters.remove(&CounterType::loyalty(), amount);
            if removed > 0 {
                cx.emit(GameEvent::CountersRemoved { entity: object, counter: CounterType::loyalty(), amount: removed });
            }
        }
    }
    if !is_creature && !is_planeswalker {
        return 0;
    }
    cx.emit(GameEvent::DamageDealt { source, target: Target::Object(object), amount, combat });
    amount
}

/// Apply one already-replaced event to the state
fn commit(game: &mut GameState, cx: &mut EngineContext, event: ReplaceableEvent) {
    match event {
        ReplaceableEvent::Damage { source, target, amount, combat } => {
            commit_damage(game, cx, vec![ReplaceableEvent::Damage { source, target, amount, combat }]);
        }
        ReplaceableEvent::Draw { player } => {
            if let Some(card) = game.draw_card(player) {
                cx.emit(GameEvent::CardDrawn { player, card });
            }
        }
        ReplaceableEvent::PutCounters { object, counter, amount } => {
            if amount == 0 || !game.is_on_battlefield(object) {
                return;
            }
            if let Some(entity) = game.entity_mut(object) {
                let mut counters = entity.get::<Counters>().cloned().unwrap_or_default();
                counters.add(counter.clone(), amount);
                entity.insert(counters);
                cx.emit(GameEvent::CountersAdded { entity: object, counter, amount });
            }
        }
        ReplaceableEvent::GainLife { player, amount } => {
            if amount == 0 {
                return;
            }
            if let Ok(p) = game.player_mut(player) {
                if p.is_in_game() {
                    p.gain_life(amount as i32);
                    cx.emit(GameEvent::LifeGained { player, amount });
                }
            }
        }
        ReplaceableEvent::ZoneChange { object, from, to } => commit_zone_change(game, cx, object, from, to),
    }
}

fn commit_zone_change(game: &mut GameState, cx: &mut EngineContext, object: EntityId, from: Zone, to: Zone) {
    if game.zone_of(object) != Some(from) {
        return;
    }
    let (controller, was_creature) = if from == Zone::Battlefield {
        let projection = Projection::compute(game, cx.registry);
        (projection.controller(object), projection.is_creature(object))
    } else {
        (game.controller_of(object), false)
    };
    if game.move_entity(object, to).is_none() {
        return;
    }
    cx.emit(GameEvent::ZoneChanged { entity: object, from: Some(from), to });
    if was_creature && to == Zone::Graveyard {
        if let Some(controller) = controller {
            cx.emit(GameEvent::Died { entity: object, controller });
        }
    }
}

pub fn draw_cards(game: &mut GameState, cx: &mut EngineContext, player: PlayerId, count: u32) {
    for _ in 0..count {
        for event in process(game, cx, ReplaceableEvent::Draw { player }) {
            commit(game, cx, event);
        }
    }
}

pub fn gain_life(game: &mut GameState, cx: &mut EngineContext, player: PlayerId, amount: u32) {
    if amount == 0 {
        return;
    }
    for event in process(game, cx, ReplaceableEvent::GainLife { player, amount }) {
        commit(game, cx, event);
    }
}

pub fn put_counters(game: &mut GameState, cx: &mut EngineContext, object: EntityId, counter: CounterType, amount: u32) {
    if amount == 0 {
        return;
    }
    for event in process(game, cx, ReplaceableEvent::PutCounters { object, counter, amount }) {
        commit(game, cx, event);
    }
}

/// Move an object to one of its owner's zones through the pipeline
pub fn move_object(game: &mut GameState, cx: &mut EngineContext, object: EntityId, to: Zone) {
    let Some(from) = game.zone_of(object) else { return };
    for event in process(game, cx, ReplaceableEvent::ZoneChange { object, from, to }) {
        commit(game, cx, event);
    }
}

/// Put an object onto the battlefield under `controller`
pub fn enter_battlefield(game: &mut GameState, cx: &mut EngineContext, object: EntityId, controller: PlayerId) {
    let from = game.zone_of(object);
    if game.put_onto_battlefield(object, controller).is_none() {
        return;
    }
    if let Some(loyalty) = game.card(object).and_then(|c| c.loyalty) {
        if let Some(entity) = game.entity_mut(object) {
            let mut counters = Counters::default();
            counters.add(CounterType::loyalty(), loyalty);
            entity.insert(counters);
        }
    }
    cx.emit(GameEvent::ZoneChanged { entity: object, from, to: Zone::Battlefield });
    cx.emit(GameEvent::EnteredBattlefield { entity: object, controller });
}
