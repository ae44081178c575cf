//! Object and player filters used by targeting, static abilities and effects

use crate::core::{CardName, CardType, Characteristics, Color, EntityId, Keyword, PlayerId, Subtype, Supertype};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ControllerFilter {
    #[default]
    Any,
    You,
    Opponent,
}

impl ControllerFilter {
    pub fn matches(&self, controller: PlayerId, you: PlayerId) -> bool {
        match self {
            ControllerFilter::Any => true,
            ControllerFilter::You => controller == you,
            ControllerFilter::Opponent => controller != you,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlayerFilter {
    #[default]
    Any,
    You,
    Opponent,
}

impl PlayerFilter {
    pub fn matches(&self, player: PlayerId, you: PlayerId) -> bool {
        match self {
            PlayerFilter::Any => true,
            PlayerFilter::You => player == you,
            PlayerFilter::Opponent => player != you,
        }
    }
}

/// Evaluation context: who "you" is and which object is the source
#[derive(Debug, Clone, Copy)]
pub struct FilterContext {
    pub you: PlayerId,
    pub source: Option<EntityId>,
}

/// Predicate over object characteristics
///
/// Empty lists mean "no constraint". `types` and `colors` match if any entry matches.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectFilter {
    pub types: Vec<CardType>,
    pub excluded_types: Vec<CardType>,
    pub subtypes: Vec<Subtype>,
    pub supertypes: Vec<Supertype>,
    pub colors: Vec<Color>,
    pub keywords: Vec<Keyword>,
    pub controller: ControllerFilter,
    pub tapped: Option<bool>,
    pub token: Option<bool>,
    pub name: Option<CardName>,
    pub max_power: Option<i32>,
    /// Exclude the source object itself
    pub other: bool,
}

impl ObjectFilter {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn of_type(card_type: CardType) -> Self {
        ObjectFilter {
            types: vec![card_type],
            ..Self::default()
        }
    }

    pub fn creature() -> Self {
        Self::of_type(CardType::Creature)
    }

    pub fn land() -> Self {
        Self::of_type(CardType::Land)
    }

    pub fn you_control(mut self) -> Self {
        self.controller = ControllerFilter::You;
        self
    }

    pub fn opponent_controls(mut self) -> Self {
        self.controller = ControllerFilter::Opponent;
        self
    }

    pub fn other(mut self) -> Self {
        self.other = true;
        self
    }

    pub fn with_subtype(mut self, subtype: &str) -> Self {
        self.subtypes.push(Subtype::new(subtype));
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.colors.push(color);
        self
    }

    pub fn or_type(mut self, card_type: CardType) -> Self {
        self.types.push(card_type);
        self
    }

    pub fn matches(&self, chars: &Characteristics, subject: EntityId, ctx: &FilterContext) -> bool {
        if self.other && ctx.source == Some(subject) {
            return false;
        }
        if !self.types.is_empty() && !self.types.iter().any(|t| chars.is_type(*t)) {
            return false;
        }
        if self.excluded_types.iter().any(|t| chars.is_type(*t)) {
            return false;
        }
        if !self.subtypes.iter().all(|s| chars.subtypes.contains(s)) {
            return false;
        }
        if !self.supertypes.iter().all(|s| chars.supertypes.contains(s)) {
            return false;
        }
        if !self.colors.is_empty() && !self.colors.iter().any(|c| chars.has_color(*c)) {
            return false;
        }
        if !self.keywords.iter().all(|k| chars.has_keyword(k)) {
            return false;
        }
        if !self.controller.matches(chars.controller, ctx.you) {
            return false;
        }
        if self.tapped.is_some_and(|t| t != chars.tapped) {
            return false;
        }
        if self.token.is_some_and(|t| t != chars.is_token) {
            return false;
        }
        if self.name.as_ref().is_some_and(|n| *n != chars.name) {
            return false;
        }
        if let Some(max) = self.max_power {
            if chars.power.unwrap_or(0) > max {
                return false;
            }
        }
        true
    }
}
