//! Mana payment resolution
//!
//! Given a cost and the untapped mana sources a player could tap, decide which
//! sources to tap and for which color. The solver is greedy per pip, but every
//! greedy pick is checked with a bipartite matching over the pips still
//! unpaid, so it never commits to a choice that makes a payable cost
//! unpayable.
//!
//! Preference between sources that could equally pay a pip, strongest first:
//! 1. source tier (basic lands, other single-purpose lands, sources with
//!    other uses, then any-color or painful sources)
//! 2. colors still wanted by castable cards in hand
//! 3. entity id

use crate::core::{Color, EntityId, ManaCost, ManaProductionKind};
use serde::{Deserialize, Serialize};

/// Preference class of a mana source; lower tiers are tapped first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SourceTier {
    Basic,
    SinglePurpose,
    /// Has non-mana abilities (or is a creature) worth keeping untapped
    MultiPurpose,
    /// Any-color sources and sources that cost life
    Flexible,
}

/// A single untapped permanent able to produce mana
#[derive(Debug, Clone, PartialEq)]
pub struct ManaSource {
    pub id: EntityId,
    pub produces: ManaProductionKind,
    /// Mana produced per activation
    pub amount: u8,
    pub tier: SourceTier,
}

impl ManaSource {
    pub fn new(id: EntityId, produces: ManaProductionKind, tier: SourceTier) -> Self {
        ManaSource { id, produces, amount: 1, tier }
    }
}

/// Tap this source for this color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TapChoice {
    pub source: EntityId,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentResult {
    /// Payable; the sources to tap, in order
    Yes(Vec<TapChoice>),
    /// No assignment of the sources pays the cost
    No,
}

/// Strategy interface for mana payment
pub trait ManaPaymentResolver {
    fn check_payment(&self, cost: &ManaCost, sources: &[ManaSource]) -> PaymentResult;

    /// Fast necessary-condition check (total and per-color capacity)
    fn quick_check(&self, cost: &ManaCost, sources: &[ManaSource]) -> bool {
        let total: u32 = sources.iter().map(|s| s.amount as u32).sum();
        if total < cost.cmc() {
            return false;
        }
        Color::WUBRG
            .iter()
            .chain(std::iter::once(&Color::Colorless))
            .all(|color| {
                let capacity: u32 = sources
                    .iter()
                    .filter(|s| s.produces.can_produce(*color))
                    .map(|s| s.amount as u32)
                    .sum();
                capacity >= cost.amount(*color) as u32
            })
    }

    fn can_pay(&self, cost: &ManaCost, sources: &[ManaSource]) -> bool {
        matches!(self.check_payment(cost, sources), PaymentResult::Yes(_))
    }

    fn compute_tap_order(&self, cost: &ManaCost, sources: &[ManaSource]) -> Option<Vec<TapChoice>> {
        match self.check_payment(cost, sources) {
            PaymentResult::Yes(order) => Some(order),
            PaymentResult::No => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pip {
    Mana(Color),
    Generic,
}

impl Pip {
    fn accepts(&self, color: Color) -> bool {
        match self {
            Pip::Mana(c) => *c == color,
            Pip::Generic => true,
        }
    }

    fn payable_by(&self, produces: &ManaProductionKind) -> bool {
        match self {
            Pip::Mana(c) => produces.can_produce(*c),
            Pip::Generic => true,
        }
    }
}

fn color_index(color: Color) -> usize {
    match color {
        Color::White => 0,
        Color::Blue => 1,
        Color::Black => 2,
        Color::Red => 3,
        Color::Green => 4,
        Color::Colorless => 5,
    }
}

/// One unit of mana a pip can be matched with
#[derive(Debug, Clone)]
enum Slot<'a> {
    /// Mana already produced by a source tapped earlier in this solution
    Floating(Color),
    Source(&'a ManaProductionKind),
}

impl Slot<'_> {
    fn pays(&self, pip: Pip) -> bool {
        match self {
            Slot::Floating(color) => pip.accepts(*color),
            Slot::Source(produces) => pip.payable_by(produces),
        }
    }
}

/// Kuhn's augmenting-path matching: can every pip get its own slot?
fn all_pips_matchable(pips: &[Pip], slots: &[Slot]) -> bool {
    if pips.len() > slots.len() {
        return false;
    }
    let mut owner: Vec<Option<usize>> = vec![None; slots.len()];
    for pip in 0..pips.len() {
        let mut seen = vec![false; slots.len()];
        if !augment(pip, pips, slots, &mut owner, &mut seen) {
            return false;
        }
    }
    true
}

fn augment(pip: usize, pips: &[Pip], slots: &[Slot], owner: &mut [Option<usize>], seen: &mut [bool]) -> bool {
    for slot in 0..slots.len() {
        if seen[slot] || !slots[slot].pays(pips[pip]) {
            continue;
        }
        seen[slot] = true;
        let free = match owner[slot] {
            None => true,
            Some(other) => augment(other, pips, slots, owner, seen),
        };
        if free {
            owner[slot] = Some(pip);
            return true;
        }
    }
    false
}

/// Tiered, hand-aware mana solver
#[derive(Debug, Clone, Default)]
pub struct ManaSolver {
    /// Pips of castable cards still in hand, per color
    hand_demand: [u32; 6],
}

impl ManaSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Weigh the colors other cards in hand will need
    pub fn with_hand_demand(mut self, pips: &[Color]) -> Self {
        for color in pips {
            self.hand_demand[color_index(*color)] += 1;
        }
        self
    }

    fn demand_penalty(&self, produces: &ManaProductionKind) -> u32 {
        produces
            .colors()
            .iter()
            .filter(|c| c.is_colored())
            .map(|c| self.hand_demand[color_index(*c)])
            .sum()
    }

    /// Color to take from a source when paying a generic pip
    fn generic_color(&self, produces: &ManaProductionKind) -> Color {
        let colors = produces.colors();
        if colors.contains(&Color::Colorless) {
            return Color::Colorless;
        }
        colors
            .iter()
            .copied()
            .min_by_key(|c| self.hand_demand[color_index(*c)])
            .unwrap_or(Color::Colorless)
    }

    /// Colored pips, most constrained color first, then generic
    fn pips(cost: &ManaCost, sources: &[ManaSource]) -> Vec<Pip> {
        let mut colors: Vec<Color> = Color::WUBRG
            .iter()
            .chain(std::iter::once(&Color::Colorless))
            .copied()
            .filter(|c| cost.amount(*c) > 0)
            .collect();
        colors.sort_by_key(|c| {
            let producers = sources.iter().filter(|s| s.produces.can_produce(*c)).count();
            (producers, color_index(*c))
        });
        let mut pips = Vec::with_capacity(cost.cmc() as usize);
        for color in colors {
            pips.extend(std::iter::repeat(Pip::Mana(color)).take(cost.amount(color) as usize));
        }
        pips.extend(std::iter::repeat(Pip::Generic).take(cost.generic as usize));
        pips
    }

    fn feasible(remaining: &[Pip], sources: &[ManaSource], used: &[bool], floating: &[(Color, u8)]) -> bool {
        let mut slots: Vec<Slot> = Vec::new();
        for (color, units) in floating {
            slots.extend(std::iter::repeat(Slot::Floating(*color)).take(*units as usize));
        }
        for (i, source) in sources.iter().enumerate() {
            if !used[i] {
                slots.extend(std::iter::repeat(Slot::Source(&source.produces)).take(source.amount as usize));
            }
        }
        all_pips_matchable(remaining, &slots)
    }
}

impl ManaPaymentResolver for ManaSolver {
    fn check_payment(&self, cost: &ManaCost, sources: &[ManaSource]) -> PaymentResult {
        if cost.cmc() == 0 {
            return PaymentResult::Yes(Vec::new());
        }
        if !self.quick_check(cost, sources) {
            return PaymentResult::No;
        }

        let pips = Self::pips(cost, sources);
        let mut used = vec![false; sources.len()];
        let mut floating: Vec<(Color, u8)> = Vec::new();
        let mut taps = Vec::new();

        for (i, pip) in pips.iter().enumerate() {
            if let Some(unit) = floating.iter_mut().find(|(color, units)| *units > 0 && pip.accepts(*color)) {
                unit.1 -= 1;
                continue;
            }

            let mut candidates: Vec<usize> = (0..sources.len())
                .filter(|&s| !used[s] && pip.payable_by(&sources[s].produces))
                .collect();
            candidates.sort_by_key(|&s| {
                let source = &sources[s];
                (source.tier, self.demand_penalty(&source.produces), source.id)
            });

            let mut chosen = None;
            for s in candidates {
                let color = match pip {
                    Pip::Mana(c) => *c,
                    Pip::Generic => self.generic_color(&sources[s].produces),
                };
                used[s] = true;
                let extra = sources[s].amount.saturating_sub(1);
                if extra > 0 {
                    floating.push((color, extra));
                }
                if Self::feasible(&pips[i + 1..], sources, &used, &floating) {
                    chosen = Some((s, color));
                    break;
                }
                used[s] = false;
                if extra > 0 {
                    floating.pop();
                }
            }

            match chosen {
                Some((s, color)) => taps.push(TapChoice { source: sources[s].id, color }),
                None => return PaymentResult::No,
            }
        }

        PaymentResult::Yes(taps)
    }
}
