//! Layer ordering and the modifications continuous effects make

use crate::core::{CardType, Color, Keyword, PlayerId, Restriction, Subtype};
use serde::{Deserialize, Serialize};

/// Application order for continuous effects, earliest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Layer {
    Control,
    Type,
    Color,
    Ability,
    PowerToughnessSet,
    /// Counters are applied at the start of this layer
    PowerToughnessModify,
    PowerToughnessSwitch,
    Restriction,
}

impl Layer {
    pub const ALL: [Layer; 8] = [
        Layer::Control,
        Layer::Type,
        Layer::Color,
        Layer::Ability,
        Layer::PowerToughnessSet,
        Layer::PowerToughnessModify,
        Layer::PowerToughnessSwitch,
        Layer::Restriction,
    ];
}

/// A single characteristic change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Modification {
    SetController(PlayerId),
    /// Controlled by whoever controls the source
    ControlledBySourceController,
    AddTypes(Vec<CardType>),
    AddSubtypes(Vec<Subtype>),
    SetColors(Vec<Color>),
    AddKeywords(Vec<Keyword>),
    RemoveKeywords(Vec<Keyword>),
    RemoveAllAbilities,
    SetPowerToughness(i32, i32),
    ModifyPowerToughness(i32, i32),
    SwitchPowerToughness,
    AddRestriction(Restriction),
}

impl Modification {
    pub fn layer(&self) -> Layer {
        match self {
            Modification::SetController(_) | Modification::ControlledBySourceController => Layer::Control,
            Modification::AddTypes(_) | Modification::AddSubtypes(_) => Layer::Type,
            Modification::SetColors(_) => Layer::Color,
            Modification::AddKeywords(_)
            | Modification::RemoveKeywords(_)
            | Modification::RemoveAllAbilities => Layer::Ability,
            Modification::SetPowerToughness(..) => Layer::PowerToughnessSet,
            Modification::ModifyPowerToughness(..) => Layer::PowerToughnessModify,
            Modification::SwitchPowerToughness => Layer::PowerToughnessSwitch,
            Modification::AddRestriction(_) => Layer::Restriction,
        }
    }
}
