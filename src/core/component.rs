//! Typed component bag attached to every game object
//!
//! An entity's shape changes over its lifetime (a card in hand becomes a spell,
//! then a permanent) purely by inserting and removing components.

use crate::core::{CardData, CardName, ChosenTarget, Color, CounterType, Effect, EntityId, PlayerId, TargetRequirement};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner(pub PlayerId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Controller(pub PlayerId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tapped;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DamageMarked {
    pub amount: u32,
    /// Some of the damage came from a deathtouch source
    pub deathtouch: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Counters(pub BTreeMap<CounterType, u32>);

impl Counters {
    pub fn get(&self, counter: &CounterType) -> u32 {
        self.0.get(counter).copied().unwrap_or(0)
    }

    pub fn add(&mut self, counter: CounterType, amount: u32) {
        *self.0.entry(counter).or_insert(0) += amount;
    }

    /// Remove up to `amount`, returning how many were removed
    pub fn remove(&mut self, counter: &CounterType, amount: u32) -> u32 {
        let current = self.get(counter);
        let removed = current.min(amount);
        if current == removed {
            self.0.remove(counter);
        } else if let Some(n) = self.0.get_mut(counter) {
            *n -= removed;
        }
        removed
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummoningSickness;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachedTo(pub EntityId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token;

/// Layer timestamp, refreshed whenever the object enters the battlefield or stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamp(pub u64);

/// Changes on every zone move; an object with a new stamp is a new object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneStamp(pub u64);

/// Stack payload of a cast spell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpellOnStack {
    pub caster: PlayerId,
    pub targets: Vec<Vec<ChosenTarget>>,
    pub x_value: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbilityKind {
    Activated,
    Triggered,
}

/// Stack payload of an activated or triggered ability (a transient entity)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityOnStack {
    pub source: EntityId,
    pub source_name: CardName,
    pub source_colors: Vec<Color>,
    pub controller: PlayerId,
    pub kind: AbilityKind,
    pub effect: Effect,
    pub requirements: Vec<TargetRequirement>,
    pub targets: Vec<Vec<ChosenTarget>>,
    pub x_value: u32,
    pub trigger_subject: Option<EntityId>,
}

/// Component trait implemented for every member of [`Component`]
pub trait ComponentData: Sized {
    const KIND: ComponentKind;
    fn into_component(self) -> Component;
    fn from_component(component: &Component) -> Option<&Self>;
    fn from_component_mut(component: &mut Component) -> Option<&mut Self>;
    fn from_owned(component: Component) -> Option<Self>;
}

macro_rules! component_bag {
    ($($name:ident),+ $(,)?) => {
        /// A single typed component
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        pub enum Component {
            $($name($name)),+
        }

        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum ComponentKind {
            $($name),+
        }

        impl Component {
            pub fn kind(&self) -> ComponentKind {
                match self {
                    $(Component::$name(_) => ComponentKind::$name),+
                }
            }
        }

        $(
            impl ComponentData for $name {
                const KIND: ComponentKind = ComponentKind::$name;

                fn into_component(self) -> Component {
                    Component::$name(self)
                }

                fn from_component(component: &Component) -> Option<&Self> {
                    match component {
                        Component::$name(value) => Some(value),
                        #[allow(unreachable_patterns)]
                        _ => None,
                    }
                }

                fn from_component_mut(component: &mut Component) -> Option<&mut Self> {
                    match component {
                        Component::$name(value) => Some(value),
                        #[allow(unreachable_patterns)]
                        _ => None,
                    }
                }

                fn from_owned(component: Component) -> Option<Self> {
                    match component {
                        Component::$name(value) => Some(value),
                        #[allow(unreachable_patterns)]
                        _ => None,
                    }
                }
            }
        )+
    };
}

component_bag!(
    CardData,
    Owner,
    Controller,
    Tapped,
    DamageMarked,
    Counters,
    SummoningSickness,
    AttachedTo,
    Token,
    Timestamp,
    ZoneStamp,
    SpellOnStack,
    AbilityOnStack,
);

impl ComponentKind {
    /// Components that only exist while an object is on the battlefield
    pub const BATTLEFIELD_ONLY: [ComponentKind; 5] = [
        ComponentKind::Tapped,
        ComponentKind::DamageMarked,
        ComponentKind::Counters,
        ComponentKind::SummoningSickness,
        ComponentKind::AttachedTo,
    ];

    /// Components that only exist while an object is on the stack
    pub const STACK_ONLY: [ComponentKind; 2] = [ComponentKind::SpellOnStack, ComponentKind::AbilityOnStack];
}

/// A game object: an id plus a component set kept sorted by kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    components: Vec<Component>,
}

impl Entity {
    pub fn new(id: EntityId) -> Self {
        Entity {
            id,
            components: Vec::new(),
        }
    }

    fn position(&self, kind: ComponentKind) -> std::result::Result<usize, usize> {
        self.components.binary_search_by(|c| c.kind().cmp(&kind))
    }

    pub fn get<T: ComponentData>(&self) -> Option<&T> {
        self.position(T::KIND)
            .ok()
            .and_then(|i| T::from_component(&self.components[i]))
    }

    pub fn get_mut<T: ComponentData>(&mut self) -> Option<&mut T> {
        match self.position(T::KIND) {
            Ok(i) => T::from_component_mut(&mut self.components[i]),
            Err(_) => None,
        }
    }

    pub fn has<T: ComponentData>(&self) -> bool {
        self.has_kind(T::KIND)
    }

    pub fn has_kind(&self, kind: ComponentKind) -> bool {
        self.position(kind).is_ok()
    }

    /// Insert or replace a component
    pub fn insert<T: ComponentData>(&mut self, value: T) {
        let component = value.into_component();
        match self.position(T::KIND) {
            Ok(i) => self.components[i] = component,
            Err(i) => self.components.insert(i, component),
        }
    }

    pub fn with<T: ComponentData>(mut self, value: T) -> Self {
        self.insert(value);
        self
    }

    pub fn remove<T: ComponentData>(&mut self) -> Option<T> {
        match self.position(T::KIND) {
            Ok(i) => T::from_owned(self.components.remove(i)),
            Err(_) => None,
        }
    }

    pub fn remove_kind(&mut self, kind: ComponentKind) -> bool {
        match self.position(kind) {
            Ok(i) => {
                self.components.remove(i);
                true
            }
            Err(_) => false,
        }
    }

    pub fn kinds(&self) -> impl Iterator<Item = ComponentKind> + '_ {
        self.components.iter().map(|c| c.kind())
    }

    pub fn card(&self) -> Option<&CardData> {
        self.get::<CardData>()
    }

    pub fn owner(&self) -> Option<PlayerId> {
        self.get::<Owner>().map(|o| o.0)
    }

    pub fn controller(&self) -> Option<PlayerId> {
        self.get::<Controller>().map(|c| c.0)
    }

    pub fn is_tapped(&self) -> bool {
        self.has::<Tapped>()
    }

    pub fn is_token(&self) -> bool {
        self.has::<Token>()
    }

    pub fn zone_stamp(&self) -> Option<u64> {
        self.get::<ZoneStamp>().map(|z| z.0)
    }

    pub fn counter(&self, counter: &CounterType) -> u32 {
        self.get::<Counters>().map(|c| c.get(counter)).unwrap_or(0)
    }

    pub fn damage(&self) -> u32 {
        self.get::<DamageMarked>().map(|d| d.amount).unwrap_or(0)
    }

    pub fn name(&self) -> &str {
        if let Some(card) = self.card() {
            card.name.as_str()
        } else if let Some(ability) = self.get::<AbilityOnStack>() {
            ability.source_name.as_str()
        } else {
            "<unknown>"
        }
    }
}
