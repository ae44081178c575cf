//! Card scripts: the declarative behavior of each card, supplied by a registry

use crate::core::types::normalize_name;
use crate::core::{
    CardData, CounterType, Cost, Effect, Keyword, ManaProductionKind, Modification, ObjectFilter,
    PlayerFilter, TargetRequirement,
};
use crate::zones::Zone;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Everything the engine needs to know about a card beyond its printed characteristics
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CardScript {
    /// Printed characteristics, used when instantiating cards from a deck list
    pub card: Option<CardData>,
    /// Resolution effect of an instant or sorcery (or an aura's attach step)
    pub spell_effect: Option<Effect>,
    pub targets: Vec<TargetRequirement>,
    pub activated: Vec<ActivatedAbility>,
    pub mana_abilities: Vec<ManaAbility>,
    pub triggers: Vec<TriggeredAbility>,
    pub statics: Vec<StaticAbility>,
    pub replacements: Vec<ReplacementAbility>,
}

impl CardScript {
    pub fn with_card(card: CardData) -> Self {
        CardScript {
            card: Some(card),
            ..Self::default()
        }
    }

    pub fn spell(mut self, effect: Effect, targets: Vec<TargetRequirement>) -> Self {
        self.spell_effect = Some(effect);
        self.targets = targets;
        self
    }

    pub fn with_activated(mut self, ability: ActivatedAbility) -> Self {
        self.activated.push(ability);
        self
    }

    pub fn with_mana_ability(mut self, ability: ManaAbility) -> Self {
        self.mana_abilities.push(ability);
        self
    }

    pub fn with_trigger(mut self, trigger: TriggeredAbility) -> Self {
        self.triggers.push(trigger);
        self
    }

    pub fn with_static(mut self, ability: StaticAbility) -> Self {
        self.statics.push(ability);
        self
    }

    pub fn with_replacement(mut self, replacement: ReplacementAbility) -> Self {
        self.replacements.push(replacement);
        self
    }

    /// Any ability other than mana abilities (used by the mana solver's tiering)
    pub fn has_non_mana_abilities(&self) -> bool {
        !self.activated.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivatedAbility {
    pub cost: Cost,
    pub effect: Effect,
    #[serde(default)]
    pub targets: Vec<TargetRequirement>,
    #[serde(default)]
    pub sorcery_speed: bool,
    #[serde(default)]
    pub label: String,
}

/// A mana ability: taps (and possibly costs life) to add mana without using the stack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManaAbility {
    pub produces: ManaProductionKind,
    #[serde(default = "one_mana")]
    pub amount: u8,
    /// Life paid on activation ("pain" lands)
    #[serde(default)]
    pub life_cost: u32,
}

fn one_mana() -> u8 {
    1
}

impl ManaAbility {
    pub fn new(produces: ManaProductionKind) -> Self {
        ManaAbility { produces, amount: 1, life_cost: 0 }
    }

    pub fn painful(mut self, life: u32) -> Self {
        self.life_cost = life;
        self
    }
}

/// Which object a trigger is about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TriggerSubject {
    ThisObject,
    Matching(ObjectFilter),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TriggerEvent {
    EntersBattlefield(TriggerSubject),
    Dies(TriggerSubject),
    BeginningOfUpkeep(PlayerFilter),
    BeginningOfEndStep(PlayerFilter),
    SpellCast { filter: ObjectFilter, caster: PlayerFilter },
    Attacks(TriggerSubject),
    DealsCombatDamageToPlayer(TriggerSubject),
    LifeGained(PlayerFilter),
    CardDrawn(PlayerFilter),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggeredAbility {
    pub event: TriggerEvent,
    pub effect: Effect,
    #[serde(default)]
    pub targets: Vec<TargetRequirement>,
    #[serde(default)]
    pub label: String,
}

/// Which objects a static ability affects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StaticTarget {
    ThisObject,
    AttachedObject,
    Matching(ObjectFilter),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticAbility {
    pub affects: StaticTarget,
    pub modification: Modification,
}

impl StaticAbility {
    pub fn new(affects: StaticTarget, modification: Modification) -> Self {
        StaticAbility { affects, modification }
    }

    /// "This creature has <keyword>" style static
    pub fn keyword_for_self(keyword: Keyword) -> Self {
        StaticAbility::new(StaticTarget::ThisObject, Modification::AddKeywords(vec![keyword]))
    }
}

/// Which candidate events a replacement ability looks at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventMatcher {
    DamageToYou,
    DamageToThis,
    DamageToPermanents(ObjectFilter),
    DamageFromThis,
    DamageFromSourcesYouControl,
    YouWouldDraw,
    CountersOnThis(Option<CounterType>),
    CountersOnPermanents(ObjectFilter, Option<CounterType>),
    YouWouldGainLife,
    /// A matching permanent would move from the battlefield to the given zone
    WouldLeaveBattlefield { filter: ObjectFilter, to: Zone },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReplacementAction {
    PreventDamage,
    DoubleDamage,
    AddDamage(u32),
    SkipDraw,
    DrawTwoInstead,
    DoubleCounters,
    AddCounters(u32),
    DoubleLifeGain,
    ChangeDestination(Zone),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplacementAbility {
    pub matcher: EventMatcher,
    pub action: ReplacementAction,
}

/// Card behavior lookup, threaded through the engine explicitly
pub trait CardRegistry: Send + Sync {
    fn script(&self, name: &str) -> Option<&CardScript>;
}

/// Registry over an in-memory map keyed by normalized card name
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistry {
    scripts: FxHashMap<String, CardScript>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, script: CardScript) {
        self.scripts.insert(normalize_name(name), script);
    }

    /// Register a script under the name of its printed card
    pub fn register(&mut self, script: CardScript) -> bool {
        match script.card.as_ref().map(|c| c.name.as_str().to_string()) {
            Some(name) => {
                self.insert(&name, script);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    /// Printed characteristics for a card name, if the script carries them
    pub fn card_data(&self, name: &str) -> Option<CardData> {
        self.script(name).and_then(|s| s.card.clone())
    }
}

impl CardRegistry for InMemoryRegistry {
    fn script(&self, name: &str) -> Option<&CardScript> {
        self.scripts.get(&normalize_name(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Amount, EffectTarget, TargetKind};

    #[test]
    fn test_registry_lookup_is_normalized() {
        let mut registry = InMemoryRegistry::new();
        let bolt = CardScript::with_card(CardData::instant("Lightning Bolt", "R")).spell(
            Effect::DealDamage { amount: Amount::Fixed(3), to: EffectTarget::Targets(0) },
            vec![TargetRequirement::single(TargetKind::AnyTarget)],
        );
        assert!(registry.register(bolt));
        assert!(registry.script("lightning bolt").is_some());
        assert!(registry.script("LIGHTNING BOLT ").is_some());
        assert!(registry.script("Shock").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_script_from_json() {
        let json = r#"{
            "card": {"name": "Llanowar Elves", "mana_cost": "{G}", "types": ["Creature"], "power": 1, "toughness": 1},
            "mana_abilities": [{"produces": {"Fixed": "Green"}}]
        }"#;
        let script: CardScript = serde_json::from_str(json).unwrap();
        assert_eq!(script.mana_abilities.len(), 1);
        assert_eq!(script.mana_abilities[0].amount, 1);
        assert!(!script.has_non_mana_abilities());
    }
}
