//! Core game types: ids, components, card data, mana, effects and scripts

pub mod card;
pub mod component;
pub mod continuous;
pub mod costs;
pub mod effects;
pub mod entity;
pub mod filter;
pub mod mana;
pub mod player;
pub mod script;
pub mod types;

pub use card::{CardData, CardType, Characteristics, Supertype};
pub use component::{
    AbilityKind, AbilityOnStack, AttachedTo, Component, ComponentData, ComponentKind, Controller, Counters,
    DamageMarked, Entity, Owner, SpellOnStack, SummoningSickness, Tapped, Timestamp, Token, ZoneStamp,
};
pub use continuous::{Layer, Modification};
pub use costs::Cost;
pub use effects::{
    Amount, ChosenTarget, Condition, Duration, Effect, EffectTarget, Keyword, ManaSpec, PlayerRef, Restriction,
    Target, TargetKind, TargetRequirement,
};
pub use entity::{EntityId, EntityStore, PlayerId};
pub use filter::{ControllerFilter, FilterContext, ObjectFilter, PlayerFilter};
pub use mana::{Color, ManaCost, ManaPool, ManaProductionKind};
pub use player::{LossReason, Player};
pub use script::{
    ActivatedAbility, CardRegistry, CardScript, EventMatcher, InMemoryRegistry, ManaAbility, ReplacementAbility,
    ReplacementAction, StaticAbility, StaticTarget, TriggerEvent, TriggerSubject, TriggeredAbility,
};
pub use types::{CardName, CounterType, PlayerName, Subtype};
