//! Costs for activated abilities

use crate::core::{CounterType, ManaCost, ObjectFilter};
use serde::{Deserialize, Serialize};

/// A cost that must be paid to activate an ability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cost {
    /// Tap the source ({T})
    Tap,
    Mana(ManaCost),
    PayLife(u32),
    SacrificeSelf,
    /// Sacrifice permanents matching a filter, chosen at activation
    Sacrifice { filter: ObjectFilter, count: u32 },
    RemoveCounters { counter: CounterType, count: u32 },
    /// Add counters to the source as a cost (planeswalker "+N" abilities)
    AddCounters { counter: CounterType, count: u32 },
    Composite(Vec<Cost>),
}

impl Cost {
    /// Flattened list of the individual costs
    pub fn parts(&self) -> Vec<&Cost> {
        match self {
            Cost::Composite(costs) => costs.iter().flat_map(|c| c.parts()).collect(),
            other => vec![other],
        }
    }

    pub fn includes_tap(&self) -> bool {
        self.parts().iter().any(|c| matches!(c, Cost::Tap))
    }

    /// Total mana component of the cost
    pub fn mana_cost(&self) -> ManaCost {
        self.parts().iter().fold(ManaCost::new(), |acc, c| match c {
            Cost::Mana(m) => acc.plus(m),
            _ => acc,
        })
    }

    pub fn life_cost(&self) -> u32 {
        self.parts()
            .iter()
            .map(|c| match c {
                Cost::PayLife(n) => *n,
                _ => 0,
            })
            .sum()
    }

    /// Filters and counts of permanents to sacrifice (excluding the source)
    pub fn sacrifice_requirements(&self) -> Vec<(&ObjectFilter, u32)> {
        self.parts()
            .into_iter()
            .filter_map(|c| match c {
                Cost::Sacrifice { filter, count } => Some((filter, *count)),
                _ => None,
            })
            .collect()
    }

    pub fn sacrifices_self(&self) -> bool {
        self.parts().iter().any(|c| matches!(c, Cost::SacrificeSelf))
    }
}
