//! Continuous effect projection
//!
//! Effective characteristics are derived on demand by folding every active
//! modifier, layer by layer and in timestamp order within a layer, over the
//! raw card data of each permanent. A projection is a snapshot of one state;
//! it is recomputed after every change and never stored in `GameState`.
//!
//! Interdependent effects inside one layer are ordered by timestamp only.

use crate::core::{
    AttachedTo, CardRegistry, Characteristics, Counters, CounterType, Duration, EntityId, FilterContext, Keyword,
    Layer, Modification, ObjectFilter, PlayerId, Restriction, StaticTarget, Timestamp,
};
use crate::game::state::GameState;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Which objects a modifier applies to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AffectedObjects {
    /// Re-evaluated against the partially projected state at its layer
    Matching(ObjectFilter),
    /// Locked in when the effect was created
    Objects(Vec<EntityId>),
}

/// A timestamped, layered characteristic change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modifier {
    pub source: EntityId,
    pub controller: PlayerId,
    pub affected: AffectedObjects,
    pub modification: Modification,
    pub timestamp: u64,
    pub duration: Duration,
    /// Generated from a static ability (and so switched off if the source loses its abilities)
    #[serde(default)]
    pub from_static: bool,
}

impl Modifier {
    pub fn layer(&self) -> Layer {
        self.modification.layer()
    }
}

/// Effective characteristics of every permanent for one game state
#[derive(Debug, Clone, Default)]
pub struct Projection {
    chars: FxHashMap<EntityId, Characteristics>,
}

impl Projection {
    pub fn compute(game: &GameState, registry: &dyn CardRegistry) -> Self {
        let mut chars: FxHashMap<EntityId, Characteristics> = FxHashMap::default();
        for &id in &game.battlefield.cards {
            if let Some(c) = game.raw_characteristics(id) {
                chars.insert(id, c);
            }
        }

        let mut modifiers = active_modifiers(game, registry);
        modifiers.sort_by_key(|m| (m.layer(), m.timestamp));

        for layer in Layer::ALL {
            if layer == Layer::PowerToughnessModify {
                apply_counters(game, &mut chars);
            }
            for modifier in modifiers.iter().filter(|m| m.layer() == layer) {
                if modifier.from_static
                    && layer > Layer::Ability
                    && chars.get(&modifier.source).is_some_and(|c| c.abilities_removed)
                {
                    continue;
                }
                let you = chars
                    .get(&modifier.source)
                    .map(|c| c.controller)
                    .unwrap_or(modifier.controller);
                let affected: Vec<EntityId> = match &modifier.affected {
                    AffectedObjects::Matching(filter) => {
                        let ctx = FilterContext { you, source: Some(modifier.source) };
                        game.battlefield
                            .cards
                            .iter()
                            .filter(|id| chars.get(id).is_some_and(|c| filter.matches(c, **id, &ctx)))
                            .copied()
                            .collect()
                    }
                    AffectedObjects::Objects(ids) => ids.iter().filter(|id| chars.contains_key(id)).copied().collect(),
                };
                for id in affected {
                    if let Some(c) = chars.get_mut(&id) {
                        apply_modification(&modifier.modification, c, you);
                    }
                }
            }
        }

        Projection { chars }
    }

    pub fn get(&self, id: EntityId) -> Option<&Characteristics> {
        self.chars.get(&id)
    }

    /// Projected characteristics on the battlefield, raw characteristics elsewhere
    pub fn characteristics(&self, game: &GameState, id: EntityId) -> Option<Characteristics> {
        match self.chars.get(&id) {
            Some(c) => Some(c.clone()),
            None => game.raw_characteristics(id),
        }
    }

    pub fn power(&self, id: EntityId) -> Option<i32> {
        self.get(id).and_then(|c| c.power)
    }

    pub fn toughness(&self, id: EntityId) -> Option<i32> {
        self.get(id).and_then(|c| c.toughness)
    }

    pub fn controller(&self, id: EntityId) -> Option<PlayerId> {
        self.get(id).map(|c| c.controller)
    }

    pub fn has_keyword(&self, id: EntityId, keyword: &Keyword) -> bool {
        self.get(id).is_some_and(|c| c.has_keyword(keyword))
    }

    pub fn has_restriction(&self, id: EntityId, restriction: &Restriction) -> bool {
        self.get(id).is_some_and(|c| c.has_restriction(restriction))
    }

    pub fn is_creature(&self, id: EntityId) -> bool {
        self.get(id).is_some_and(|c| c.is_creature())
    }

    /// Battlefield permanents controlled by `player`, in battlefield order
    pub fn controlled_by(&self, game: &GameState, player: PlayerId) -> Vec<EntityId> {
        game.battlefield
            .cards
            .iter()
            .filter(|id| self.controller(**id) == Some(player))
            .copied()
            .collect()
    }

    /// Battlefield permanents matching a filter from `you`'s point of view
    pub fn matching(&self, game: &GameState, filter: &ObjectFilter, ctx: &FilterContext) -> Vec<EntityId> {
        game.battlefield
            .cards
            .iter()
            .filter(|id| self.get(**id).is_some_and(|c| filter.matches(c, **id, ctx)))
            .copied()
            .collect()
    }
}

/// Static abilities of permanents plus floating effects still in force
fn active_modifiers(game: &GameState, registry: &dyn CardRegistry) -> Vec<Modifier> {
    let mut modifiers = Vec::new();
    for &id in &game.battlefield.cards {
        let Some(entity) = game.entity(id) else { continue };
        let Some(card) = entity.card() else { continue };
        let Some(script) = registry.script(card.name.as_str()) else { continue };
        let timestamp = entity.get::<Timestamp>().map(|t| t.0).unwrap_or(0);
        let controller = game.controller_of(id).unwrap_or(PlayerId::new(0));
        for ability in &script.statics {
            let affected = match &ability.affects {
                StaticTarget::ThisObject => AffectedObjects::Objects(vec![id]),
                StaticTarget::AttachedObject => match entity.get::<AttachedTo>() {
                    Some(attached) => AffectedObjects::Objects(vec![attached.0]),
                    None => continue,
                },
                StaticTarget::Matching(filter) => AffectedObjects::Matching(filter.clone()),
            };
            modifiers.push(Modifier {
                source: id,
                controller,
                affected,
                modification: ability.modification.clone(),
                timestamp,
                duration: Duration::WhileSourceOnBattlefield,
                from_static: true,
            });
        }
    }

    modifiers.extend(
        game.modifiers
            .iter()
            .filter(|m| m.duration != Duration::WhileSourceOnBattlefield || game.is_on_battlefield(m.source))
            .cloned(),
    );
    modifiers
}

fn apply_counters(game: &GameState, chars: &mut FxHashMap<EntityId, Characteristics>) {
    for (id, c) in chars.iter_mut() {
        let Some(counters) = game.entity(*id).and_then(|e| e.get::<Counters>()) else { continue };
        let delta = counters.get(&CounterType::plus_one()) as i32 - counters.get(&CounterType::minus_one()) as i32;
        if delta != 0 {
            if let (Some(p), Some(t)) = (c.power.as_mut(), c.toughness.as_mut()) {
                *p += delta;
                *t += delta;
            }
        }
    }
}

fn apply_modification(modification: &Modification, c: &mut Characteristics, source_controller: PlayerId) {
    match modification {
        Modification::SetController(player) => c.controller = *player,
        Modification::ControlledBySourceController => c.controller = source_controller,
        Modification::AddTypes(types) => {
            for t in types {
                if !c.types.contains(t) {
                    c.types.push(*t);
                }
            }
        }
        Modification::AddSubtypes(subtypes) => {
            for s in subtypes {
                if !c.subtypes.contains(s) {
                    c.subtypes.push(s.clone());
                }
            }
        }
        Modification::SetColors(colors) => c.colors = colors.iter().copied().collect(),
        Modification::AddKeywords(keywords) => {
            for k in keywords {
                c.add_keyword(k.clone());
            }
        }
        Modification::RemoveKeywords(keywords) => c.keywords.retain(|k| !keywords.contains(k)),
        Modification::RemoveAllAbilities => {
            c.keywords.clear();
            c.abilities_removed = true;
        }
        Modification::SetPowerToughness(p, t) => {
            c.power = Some(*p);
            c.toughness = Some(*t);
        }
        Modification::ModifyPowerToughness(dp, dt) => {
            if let (Some(p), Some(t)) = (c.power.as_mut(), c.toughness.as_mut()) {
                *p += dp;
                *t += dt;
            }
        }
        Modification::SwitchPowerToughness => {
            std::mem::swap(&mut c.power, &mut c.toughness);
        }
        Modification::AddRestriction(r) => {
            if !c.restrictions.contains(r) {
                c.restrictions.push(r.clone());
            }
        }
    }
}

/// Add a floating effect created by a resolving spell or ability
pub fn add_floating(
    game: &mut GameState,
    source: EntityId,
    controller: PlayerId,
    objects: Vec<EntityId>,
    modification: Modification,
    duration: Duration,
) {
    if objects.is_empty() {
        return;
    }
    let timestamp = game.next_timestamp();
    game.modifiers.push(Modifier {
        source,
        controller,
        affected: AffectedObjects::Objects(objects),
        modification,
        timestamp,
        duration,
        from_static: false,
    });
}

/// Cleanup step: "until end of turn" effects end
pub fn expire_end_of_turn(game: &mut GameState) {
    game.modifiers.retain(|m| m.duration != Duration::UntilEndOfTurn);
}
