//! Printed card characteristics and their projected form

use crate::core::{CardName, Color, Keyword, ManaCost, PlayerId, Restriction, Subtype};
use serde::{Deserialize, Serialize};
use smallvec::{smallvec, SmallVec};

/// Card types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardType {
    Creature,
    Instant,
    Sorcery,
    Enchantment,
    Artifact,
    Land,
    Planeswalker,
}

impl CardType {
    pub fn is_permanent(&self) -> bool {
        !matches!(self, CardType::Instant | CardType::Sorcery)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Supertype {
    Basic,
    Legendary,
    Snow,
}

/// The raw, printed characteristics of a card or token
///
/// Stored as a component on the entity. Effective values are never read from
/// here directly during play; see the layer projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardData {
    pub name: CardName,
    #[serde(default)]
    pub mana_cost: ManaCost,
    pub types: SmallVec<[CardType; 2]>,
    #[serde(default)]
    pub supertypes: SmallVec<[Supertype; 1]>,
    #[serde(default)]
    pub subtypes: SmallVec<[Subtype; 2]>,
    /// Card colors; derived from the mana cost when left empty
    #[serde(default)]
    pub colors: SmallVec<[Color; 2]>,
    #[serde(default)]
    pub power: Option<i32>,
    #[serde(default)]
    pub toughness: Option<i32>,
    #[serde(default)]
    pub loyalty: Option<u32>,
    #[serde(default)]
    pub keywords: Vec<Keyword>,
}

impl CardData {
    pub fn new(name: impl Into<CardName>, types: &[CardType]) -> Self {
        CardData {
            name: name.into(),
            mana_cost: ManaCost::new(),
            types: types.iter().copied().collect(),
            supertypes: SmallVec::new(),
            subtypes: SmallVec::new(),
            colors: SmallVec::new(),
            power: None,
            toughness: None,
            loyalty: None,
            keywords: Vec::new(),
        }
    }

    pub fn creature(name: &str, cost: &str, power: i32, toughness: i32) -> Self {
        let mut card = CardData::new(name, &[CardType::Creature]).with_cost(cost);
        card.power = Some(power);
        card.toughness = Some(toughness);
        card
    }

    pub fn instant(name: &str, cost: &str) -> Self {
        CardData::new(name, &[CardType::Instant]).with_cost(cost)
    }

    pub fn sorcery(name: &str, cost: &str) -> Self {
        CardData::new(name, &[CardType::Sorcery]).with_cost(cost)
    }

    pub fn enchantment(name: &str, cost: &str) -> Self {
        CardData::new(name, &[CardType::Enchantment]).with_cost(cost)
    }

    pub fn artifact(name: &str, cost: &str) -> Self {
        CardData::new(name, &[CardType::Artifact]).with_cost(cost)
    }

    pub fn planeswalker(name: &str, cost: &str, loyalty: u32) -> Self {
        let mut card = CardData::new(name, &[CardType::Planeswalker]).with_cost(cost);
        card.loyalty = Some(loyalty);
        card.supertypes.push(Supertype::Legendary);
        card
    }

    /// A basic land with its land subtype, e.g. `basic_land("Forest")`
    pub fn basic_land(name: &str) -> Self {
        let mut card = CardData::new(name, &[CardType::Land]);
        card.supertypes.push(Supertype::Basic);
        card.subtypes.push(Subtype::new(name));
        card
    }

    pub fn land(name: &str) -> Self {
        CardData::new(name, &[CardType::Land])
    }

    pub fn with_cost(mut self, cost: &str) -> Self {
        self.mana_cost = ManaCost::from_string(cost);
        if self.colors.is_empty() {
            self.colors = self.mana_cost.colors().into_iter().collect();
        }
        self
    }

    pub fn with_keyword(mut self, keyword: Keyword) -> Self {
        self.keywords.push(keyword);
        self
    }

    pub fn with_subtype(mut self, subtype: &str) -> Self {
        self.subtypes.push(Subtype::new(subtype));
        self
    }

    pub fn with_colors(mut self, colors: &[Color]) -> Self {
        self.colors = colors.iter().copied().collect();
        self
    }

    pub fn legendary(mut self) -> Self {
        if !self.supertypes.contains(&Supertype::Legendary) {
            self.supertypes.push(Supertype::Legendary);
        }
        self
    }

    pub fn is_type(&self, card_type: CardType) -> bool {
        self.types.contains(&card_type)
    }

    pub fn is_permanent(&self) -> bool {
        self.types.iter().any(|t| t.is_permanent())
    }

    pub fn is_creature(&self) -> bool {
        self.is_type(CardType::Creature)
    }

    pub fn is_land(&self) -> bool {
        self.is_type(CardType::Land)
    }

    pub fn has_subtype(&self, subtype: &str) -> bool {
        self.subtypes.iter().any(|s| s.as_str() == subtype)
    }

    /// Card colors, falling back to the colors of the mana cost
    pub fn card_colors(&self) -> SmallVec<[Color; 2]> {
        if self.colors.is_empty() {
            self.mana_cost.colors().into_iter().collect()
        } else {
            self.colors.clone()
        }
    }
}

/// The effective characteristics of an object after all continuous effects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Characteristics {
    pub name: CardName,
    pub types: SmallVec<[CardType; 2]>,
    pub supertypes: SmallVec<[Supertype; 1]>,
    pub subtypes: SmallVec<[Subtype; 2]>,
    pub colors: SmallVec<[Color; 2]>,
    pub keywords: Vec<Keyword>,
    pub restrictions: Vec<Restriction>,
    pub power: Option<i32>,
    pub toughness: Option<i32>,
    pub owner: PlayerId,
    pub controller: PlayerId,
    pub is_token: bool,
    pub tapped: bool,
    pub abilities_removed: bool,
}

impl Characteristics {
    /// Unmodified characteristics taken from printed card data
    pub fn from_card(card: &CardData, owner: PlayerId, controller: PlayerId) -> Self {
        Characteristics {
            name: card.name.clone(),
            types: card.types.clone(),
            supertypes: card.supertypes.clone(),
            subtypes: card.subtypes.clone(),
            colors: card.card_colors(),
            keywords: card.keywords.clone(),
            restrictions: Vec::new(),
            power: card.power,
            toughness: card.toughness,
            owner,
            controller,
            is_token: false,
            tapped: false,
            abilities_removed: false,
        }
    }

    pub fn is_type(&self, card_type: CardType) -> bool {
        self.types.contains(&card_type)
    }

    pub fn is_creature(&self) -> bool {
        self.is_type(CardType::Creature)
    }

    pub fn is_land(&self) -> bool {
        self.is_type(CardType::Land)
    }

    pub fn is_legendary(&self) -> bool {
        self.supertypes.contains(&Supertype::Legendary)
    }

    pub fn has_keyword(&self, keyword: &Keyword) -> bool {
        self.keywords.contains(keyword)
    }

    pub fn has_restriction(&self, restriction: &Restriction) -> bool {
        self.restrictions.contains(restriction)
    }

    pub fn has_color(&self, color: Color) -> bool {
        self.colors.contains(&color)
    }

    pub fn has_protection_from(&self, colors: &[Color]) -> bool {
        colors
            .iter()
            .any(|c| self.has_keyword(&Keyword::Protection(*c)))
    }

    pub fn add_keyword(&mut self, keyword: Keyword) {
        if !self.keywords.contains(&keyword) {
            self.keywords.push(keyword);
        }
    }
}

impl Default for CardData {
    fn default() -> Self {
        CardData {
            name: CardName::new(""),
            mana_cost: ManaCost::new(),
            types: smallvec![],
            supertypes: SmallVec::new(),
            subtypes: SmallVec::new(),
            colors: SmallVec::new(),
            power: None,
            toughness: None,
            loyalty: None,
            keywords: Vec::new(),
        }
    }
}
