//! Mana colors, costs and pools

use crate::{Result, RulesError};
use nom::{
    branch::alt,
    character::complete::{char, digit1, multispace0, one_of},
    combinator::{all_consuming, map, map_res},
    multi::many0,
    sequence::delimited,
    IResult,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Mana colors (Colorless is a mana type, never a card color)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Color {
    White,
    Blue,
    Black,
    Red,
    Green,
    Colorless,
}

impl Color {
    /// The five card colors in WUBRG order
    pub const WUBRG: [Color; 5] = [Color::White, Color::Blue, Color::Black, Color::Red, Color::Green];

    pub fn is_colored(&self) -> bool {
        !matches!(self, Color::Colorless)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::White => write!(f, "W"),
            Color::Blue => write!(f, "U"),
            Color::Black => write!(f, "B"),
            Color::Red => write!(f, "R"),
            Color::Green => write!(f, "G"),
            Color::Colorless => write!(f, "C"),
        }
    }
}

/// A mana cost such as `{2}{R}{R}` or `{X}{U}`
///
/// Serialized as its printed string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ManaCost {
    pub generic: u8,
    pub white: u8,
    pub blue: u8,
    pub black: u8,
    pub red: u8,
    pub green: u8,
    pub colorless: u8,
    /// Number of {X} symbols
    pub x_count: u8,
}

#[derive(Debug, Clone, Copy)]
enum Symbol {
    Generic(u8),
    Mana(Color),
    X,
}

fn bare_symbol(input: &str) -> IResult<&str, Symbol> {
    alt((
        map_res(digit1, |digits: &str| digits.parse::<u8>().map(Symbol::Generic)),
        map(one_of("WUBRGCXwubrgcx"), |c: char| match c.to_ascii_uppercase() {
            'W' => Symbol::Mana(Color::White),
            'U' => Symbol::Mana(Color::Blue),
            'B' => Symbol::Mana(Color::Black),
            'R' => Symbol::Mana(Color::Red),
            'G' => Symbol::Mana(Color::Green),
            'X' => Symbol::X,
            _ => Symbol::Mana(Color::Colorless),
        }),
    ))(input)
}

fn symbol(input: &str) -> IResult<&str, Symbol> {
    alt((delimited(char('{'), bare_symbol, char('}')), bare_symbol))(input)
}

impl ManaCost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a cost in braced (`{1}{U}{B}`) or compact (`1UB`) notation
    pub fn parse(s: &str) -> Result<Self> {
        let (_, symbols) = all_consuming(delimited(multispace0, many0(symbol), multispace0))(s)
            .map_err(|e| RulesError::ParseError(format!("invalid mana cost '{}': {}", s, e)))?;

        let mut cost = ManaCost::new();
        for symbol in symbols {
            match symbol {
                Symbol::Generic(n) => cost.generic = cost.generic.saturating_add(n),
                Symbol::Mana(color) => *cost.amount_mut(color) += 1,
                Symbol::X => cost.x_count += 1,
            }
        }
        Ok(cost)
    }

    /// Lenient parse for literals in builders and tests; malformed input yields an empty cost
    pub fn from_string(s: &str) -> Self {
        Self::parse(s).unwrap_or_default()
    }

    /// Mana value (X counts as zero)
    pub fn cmc(&self) -> u32 {
        [self.generic, self.white, self.blue, self.black, self.red, self.green, self.colorless]
            .iter()
            .map(|&n| n as u32)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.cmc() == 0 && self.x_count == 0
    }

    pub fn amount(&self, color: Color) -> u8 {
        match color {
            Color::White => self.white,
            Color::Blue => self.blue,
            Color::Black => self.black,
            Color::Red => self.red,
            Color::Green => self.green,
            Color::Colorless => self.colorless,
        }
    }

    fn amount_mut(&mut self, color: Color) -> &mut u8 {
        match color {
            Color::White => &mut self.white,
            Color::Blue => &mut self.blue,
            Color::Black => &mut self.black,
            Color::Red => &mut self.red,
            Color::Green => &mut self.green,
            Color::Colorless => &mut self.colorless,
        }
    }

    /// The cost with every {X} replaced by `x` generic mana
    ///
    /// Fails when the resulting generic part does not fit in a cost.
    pub fn with_x(&self, x: u32) -> Result<Self> {
        let generic = x
            .checked_mul(self.x_count as u32)
            .and_then(|extra| extra.checked_add(self.generic as u32))
            .and_then(|total| u8::try_from(total).ok())
            .ok_or_else(|| RulesError::invalid(format!("X={} is too large for {}", x, self)))?;
        Ok(ManaCost { generic, x_count: 0, ..*self })
    }

    /// The cost with X chosen as zero
    pub fn without_x(&self) -> Self {
        ManaCost { x_count: 0, ..*self }
    }

    /// Sum of two costs
    pub fn plus(&self, other: &ManaCost) -> Self {
        ManaCost {
            generic: self.generic.saturating_add(other.generic),
            white: self.white.saturating_add(other.white),
            blue: self.blue.saturating_add(other.blue),
            black: self.black.saturating_add(other.black),
            red: self.red.saturating_add(other.red),
            green: self.green.saturating_add(other.green),
            colorless: self.colorless.saturating_add(other.colorless),
            x_count: self.x_count.saturating_add(other.x_count),
        }
    }

    /// Colored (and specifically-colorless) pips, one entry per symbol
    pub fn colored_pips(&self) -> Vec<Color> {
        let mut pips = Vec::with_capacity(self.cmc() as usize);
        for color in Color::WUBRG.iter().chain(std::iter::once(&Color::Colorless)) {
            for _ in 0..self.amount(*color) {
                pips.push(*color);
            }
        }
        pips
    }

    /// Card colors implied by this cost
    pub fn colors(&self) -> Vec<Color> {
        Color::WUBRG
            .iter()
            .copied()
            .filter(|c| self.amount(*c) > 0)
            .collect()
    }
}

impl fmt::Display for ManaCost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for _ in 0..self.x_count {
            write!(f, "{{X}}")?;
        }
        if self.generic > 0 {
            write!(f, "{{{}}}", self.generic)?;
        }
        for color in self.colored_pips() {
            write!(f, "{{{}}}", color)?;
        }
        Ok(())
    }
}

impl TryFrom<String> for ManaCost {
    type Error = RulesError;

    fn try_from(s: String) -> Result<Self> {
        ManaCost::parse(&s)
    }
}

impl From<ManaCost> for String {
    fn from(cost: ManaCost) -> Self {
        cost.to_string()
    }
}

/// What a mana source can produce
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManaProductionKind {
    /// Exactly one kind of mana (including colorless)
    Fixed(Color),
    /// One of a fixed set of colors (dual lands)
    Choice(Vec<Color>),
    /// Any of the five colors
    AnyColor,
}

impl ManaProductionKind {
    pub fn can_produce(&self, color: Color) -> bool {
        match self {
            ManaProductionKind::Fixed(c) => *c == color,
            ManaProductionKind::Choice(colors) => colors.contains(&color),
            ManaProductionKind::AnyColor => color.is_colored(),
        }
    }

    /// Every mana type this source could make
    pub fn colors(&self) -> Vec<Color> {
        match self {
            ManaProductionKind::Fixed(c) => vec![*c],
            ManaProductionKind::Choice(colors) => colors.clone(),
            ManaProductionKind::AnyColor => Color::WUBRG.to_vec(),
        }
    }
}

/// Floating mana for a player; emptied between steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ManaPool {
    pub white: u8,
    pub blue: u8,
    pub black: u8,
    pub red: u8,
    pub green: u8,
    pub colorless: u8,
}

impl ManaPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_color(&mut self, color: Color) {
        let amount = self.amount_mut(color);
        *amount = amount.saturating_add(1);
    }

    pub fn amount(&self, color: Color) -> u8 {
        match color {
            Color::White => self.white,
            Color::Blue => self.blue,
            Color::Black => self.black,
            Color::Red => self.red,
            Color::Green => self.green,
            Color::Colorless => self.colorless,
        }
    }

    fn amount_mut(&mut self, color: Color) -> &mut u8 {
        match color {
            Color::White => &mut self.white,
            Color::Blue => &mut self.blue,
            Color::Black => &mut self.black,
            Color::Red => &mut self.red,
            Color::Green => &mut self.green,
            Color::Colorless => &mut self.colorless,
        }
    }

    pub fn clear(&mut self) {
        *self = ManaPool::new();
    }

    pub fn total(&self) -> u32 {
        [self.white, self.blue, self.black, self.red, self.green, self.colorless]
            .iter()
            .map(|&n| n as u32)
            .sum()
    }

    pub fn can_pay(&self, cost: &ManaCost) -> bool {
        let colored_ok = Color::WUBRG
            .iter()
            .chain(std::iter::once(&Color::Colorless))
            .all(|c| self.amount(*c) >= cost.amount(*c));
        colored_ok && self.total() >= cost.cmc()
    }

    /// Pay a cost from the pool: colored requirements first, then generic in WUBRG order
    pub fn pay_cost(&mut self, cost: &ManaCost) -> Result<()> {
        if !self.can_pay(cost) {
            return Err(RulesError::InsufficientMana(format!(
                "cannot pay {} from pool {}W {}U {}B {}R {}G {}C",
                cost, self.white, self.blue, self.black, self.red, self.green, self.colorless
            )));
        }

        for color in Color::WUBRG.iter().chain(std::iter::once(&Color::Colorless)) {
            *self.amount_mut(*color) -= cost.amount(*color);
        }

        let mut generic_remaining = cost.generic;
        for color in Color::WUBRG.iter().chain(std::iter::once(&Color::Colorless)) {
            let used = generic_remaining.min(self.amount(*color));
            *self.amount_mut(*color) -= used;
            generic_remaining -= used;
        }
        debug_assert_eq!(generic_remaining, 0);
        Ok(())
    }
}
