//! Pending player decisions and response validation
//!
//! A decision carries everything a client needs to answer it; the answer is
//! checked here against the decision's shape before the continuation that
//! asked for it is resumed.

use crate::core::{Color, EntityId, ManaCost, PlayerId, Target, TargetRequirement};
use crate::{Result, RulesError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One orderable item (a trigger, a blocker)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: u64,
    pub label: String,
}

/// A creature receiving combat damage in damage-assignment order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageRecipient {
    pub blocker: EntityId,
    /// Damage that counts as lethal for this blocker (1 with deathtouch)
    pub lethal: u32,
}

/// What the deciding player has to choose
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DecisionKind {
    /// One list of legal choices per requirement, parallel to `requirements`
    ChooseTargets {
        requirements: Vec<TargetRequirement>,
        legal: Vec<Vec<Target>>,
    },
    YesNo,
    ChooseMode {
        labels: Vec<String>,
    },
    ChooseColor {
        options: Vec<Color>,
    },
    ChooseNumber {
        min: u32,
        max: u32,
    },
    /// Split `total` among the recipients, each getting at least `min_each`
    Distribute {
        total: u32,
        recipients: Vec<Target>,
        min_each: u32,
    },
    OrderObjects {
        items: Vec<OrderItem>,
    },
    /// Separate the cards into two piles
    SplitPiles {
        cards: Vec<EntityId>,
    },
    ChooseOption {
        labels: Vec<String>,
    },
    AssignDamage {
        attacker: EntityId,
        power: u32,
        /// Blockers in damage-assignment order
        order: Vec<DamageRecipient>,
        /// Where excess damage may go when the attacker has trample
        trample_to: Option<Target>,
    },
    SearchLibrary {
        candidates: Vec<EntityId>,
        max: u32,
    },
    /// Put each card on top (in the given order) or on the bottom
    ReorderLibrary {
        cards: Vec<EntityId>,
    },
    SelectCards {
        candidates: Vec<EntityId>,
        min: usize,
        max: usize,
    },
    /// Pay a cost by tapping some of these sources, or decline with an empty list
    SelectManaSources {
        sources: Vec<EntityId>,
        cost: ManaCost,
    },
}

impl DecisionKind {
    pub fn name(&self) -> &'static str {
        match self {
            DecisionKind::ChooseTargets { .. } => "ChooseTargets",
            DecisionKind::YesNo => "YesNo",
            DecisionKind::ChooseMode { .. } => "ChooseMode",
            DecisionKind::ChooseColor { .. } => "ChooseColor",
            DecisionKind::ChooseNumber { .. } => "ChooseNumber",
            DecisionKind::Distribute { .. } => "Distribute",
            DecisionKind::OrderObjects { .. } => "OrderObjects",
            DecisionKind::SplitPiles { .. } => "SplitPiles",
            DecisionKind::ChooseOption { .. } => "ChooseOption",
            DecisionKind::AssignDamage { .. } => "AssignDamage",
            DecisionKind::SearchLibrary { .. } => "SearchLibrary",
            DecisionKind::ReorderLibrary { .. } => "ReorderLibrary",
            DecisionKind::SelectCards { .. } => "SelectCards",
            DecisionKind::SelectManaSources { .. } => "SelectManaSources",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingDecision {
    pub id: u64,
    pub player: PlayerId,
    pub kind: DecisionKind,
    /// The object whose effect asked
    pub source: Option<EntityId>,
    pub prompt: String,
}

/// A player's answer to a pending decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DecisionResponse {
    Targets(Vec<Vec<Target>>),
    YesNo(bool),
    Mode(usize),
    Color(Color),
    Number(u32),
    Distribution(Vec<(Target, u32)>),
    Order(Vec<u64>),
    /// The first pile; every other card forms the second
    Piles(Vec<EntityId>),
    Option(usize),
    DamageAssignment(Vec<(Target, u32)>),
    Cards(Vec<EntityId>),
    Reorder { top: Vec<EntityId>, bottom: Vec<EntityId> },
    ManaSources(Vec<EntityId>),
}

fn mismatch(kind: &DecisionKind) -> RulesError {
    RulesError::DecisionMismatch(format!("expected a response to {}", kind.name()))
}

fn all_distinct<T: Ord + Copy>(items: &[T]) -> bool {
    let set: BTreeSet<T> = items.iter().copied().collect();
    set.len() == items.len()
}

impl PendingDecision {
    /// Check a response against the decision's shape and constraints
    pub fn validate(&self, response: &DecisionResponse) -> Result<()> {
        match (&self.kind, response) {
            (DecisionKind::ChooseTargets { requirements, legal }, DecisionResponse::Targets(chosen)) => {
                if chosen.len() != requirements.len() {
                    return Err(RulesError::invalid(format!(
                        "expected {} target slots, got {}",
                        requirements.len(),
                        chosen.len()
                    )));
                }
                for (slot, (req, picks)) in requirements.iter().zip(chosen).enumerate() {
                    if picks.len() < req.min || picks.len() > req.max {
                        return Err(RulesError::invalid(format!(
                            "slot {} needs {}..={} targets, got {}",
                            slot,
                            req.min,
                            req.max,
                            picks.len()
                        )));
                    }
                    if !all_distinct(picks) {
                        return Err(RulesError::invalid(format!("slot {} repeats a target", slot)));
                    }
                    let options = legal.get(slot).map(Vec::as_slice).unwrap_or(&[]);
                    if let Some(bad) = picks.iter().find(|t| !options.contains(t)) {
                        return Err(RulesError::invalid(format!("{:?} is not a legal target", bad)));
                    }
                }
                Ok(())
            }
            (DecisionKind::YesNo, DecisionResponse::YesNo(_)) => Ok(()),
            (DecisionKind::ChooseMode { labels }, DecisionResponse::Mode(i))
            | (DecisionKind::ChooseOption { labels }, DecisionResponse::Option(i)) => {
                if *i < labels.len() {
                    Ok(())
                } else {
                    Err(RulesError::invalid(format!("option {} out of range", i)))
                }
            }
            (DecisionKind::ChooseColor { options }, DecisionResponse::Color(color)) => {
                if options.contains(color) {
                    Ok(())
                } else {
                    Err(RulesError::invalid(format!("{:?} is not an option", color)))
                }
            }
            (DecisionKind::ChooseNumber { min, max }, DecisionResponse::Number(n)) => {
                if (*min..=*max).contains(n) {
                    Ok(())
                } else {
                    Err(RulesError::invalid(format!("{} is outside {}..={}", n, min, max)))
                }
            }
            (DecisionKind::Distribute { total, recipients, min_each }, DecisionResponse::Distribution(split)) => {
                let targets: Vec<Target> = split.iter().map(|(t, _)| *t).collect();
                if !all_distinct(&targets) {
                    return Err(RulesError::invalid("a recipient appears twice"));
                }
                if split.len() != recipients.len() || targets.iter().any(|t| !recipients.contains(t)) {
                    return Err(RulesError::invalid("every recipient must receive an amount"));
                }
                if split.iter().any(|(_, n)| n < min_each) {
                    return Err(RulesError::invalid(format!("each recipient needs at least {}", min_each)));
                }
                let sum: u32 = split.iter().map(|(_, n)| n).sum();
                if sum != *total {
                    return Err(RulesError::invalid(format!("distributed {} of {}", sum, total)));
                }
                Ok(())
            }
            (DecisionKind::OrderObjects { items }, DecisionResponse::Order(order)) => {
                let expected: BTreeSet<u64> = items.iter().map(|i| i.id).collect();
                let given: BTreeSet<u64> = order.iter().copied().collect();
                if order.len() == items.len() && expected == given {
                    Ok(())
                } else {
                    Err(RulesError::invalid("the order must list every item exactly once"))
                }
            }
            (DecisionKind::SplitPiles { cards }, DecisionResponse::Piles(first)) => {
                if all_distinct(first) && first.iter().all(|c| cards.contains(c)) {
                    Ok(())
                } else {
                    Err(RulesError::invalid("pile contains an unknown card"))
                }
            }
            (
                DecisionKind::AssignDamage { power, order, trample_to, .. },
                DecisionResponse::DamageAssignment(assignment),
            ) => validate_damage_assignment(*power, order, *trample_to, assignment),
            (DecisionKind::SearchLibrary { candidates, max }, DecisionResponse::Cards(picked)) => {
                if picked.len() > *max as usize {
                    return Err(RulesError::invalid(format!("at most {} card(s)", max)));
                }
                if !all_distinct(picked) || picked.iter().any(|c| !candidates.contains(c)) {
                    return Err(RulesError::invalid("card is not a legal choice"));
                }
                Ok(())
            }
            (DecisionKind::ReorderLibrary { cards }, DecisionResponse::Reorder { top, bottom }) => {
                let mut all: Vec<EntityId> = top.iter().chain(bottom).copied().collect();
                all.sort();
                let mut expected = cards.clone();
                expected.sort();
                if all == expected {
                    Ok(())
                } else {
                    Err(RulesError::invalid("every card must be placed exactly once"))
                }
            }
            (DecisionKind::SelectCards { candidates, min, max }, DecisionResponse::Cards(picked)) => {
                if picked.len() < *min || picked.len() > *max {
                    return Err(RulesError::invalid(format!("select {}..={} card(s)", min, max)));
                }
                if !all_distinct(picked) || picked.iter().any(|c| !candidates.contains(c)) {
                    return Err(RulesError::invalid("card is not a legal choice"));
                }
                Ok(())
            }
            (DecisionKind::SelectManaSources { sources, .. }, DecisionResponse::ManaSources(picked)) => {
                if all_distinct(picked) && picked.iter().all(|s| sources.contains(s)) {
                    Ok(())
                } else {
                    Err(RulesError::invalid("source is not available"))
                }
            }
            (kind, _) => Err(mismatch(kind)),
        }
    }
}

/// Lethal damage must be assigned to each blocker, in order, before the next
/// one (or the defending player, with trample) receives any
fn validate_damage_assignment(
    power: u32,
    order: &[DamageRecipient],
    trample_to: Option<Target>,
    assignment: &[(Target, u32)],
) -> Result<()> {
    let amount_for = |target: Target| -> u32 {
        assignment.iter().filter(|(t, _)| *t == target).map(|(_, n)| *n).sum()
    };
    for (target, _) in assignment {
        let known = order.iter().any(|r| Target::Object(r.blocker) == *target) || trample_to == Some(*target);
        if !known {
            return Err(RulesError::invalid(format!("{:?} cannot be assigned damage", target)));
        }
    }
    let total: u32 = assignment.iter().map(|(_, n)| *n).sum();
    if total != power {
        return Err(RulesError::invalid(format!("assigned {} damage, must assign {}", total, power)));
    }

    let mut all_lethal = true;
    for recipient in order {
        let assigned = amount_for(Target::Object(recipient.blocker));
        if assigned > 0 && !all_lethal {
            return Err(RulesError::invalid(format!(
                "{} receives damage before earlier blockers were assigned lethal damage",
                recipient.blocker
            )));
        }
        if assigned < recipient.lethal {
            all_lethal = false;
        }
    }
    if let Some(player) = trample_to {
        if amount_for(player) > 0 && !all_lethal {
            return Err(RulesError::invalid("trample damage requires lethal damage to every blocker"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TargetKind;

    fn decision(kind: DecisionKind) -> PendingDecision {
        PendingDecision { id: 1, player: PlayerId::new(0), kind, source: None, prompt: String::new() }
    }

    #[test]
    fn test_damage_assignment_lethal_in_order() {
        let first = EntityId::new(10);
        let second = EntityId::new(11);
        let defender = Target::Player(PlayerId::new(1));
        let d = decision(DecisionKind::AssignDamage {
            attacker: EntityId::new(1),
            power: 6,
            order: vec![
                DamageRecipient { blocker: first, lethal: 2 },
                DamageRecipient { blocker: second, lethal: 3 },
            ],
            trample_to: Some(defender),
        });

        let ok = DecisionResponse::DamageAssignment(vec![
            (Target::Object(first), 2),
            (Target::Object(second), 3),
            (defender, 1),
        ]);
        assert!(d.validate(&ok).is_ok());

        let skips_first = DecisionResponse::DamageAssignment(vec![
            (Target::Object(first), 1),
            (Target::Object(second), 5),
        ]);
        assert!(d.validate(&skips_first).is_err());

        let early_trample = DecisionResponse::DamageAssignment(vec![
            (Target::Object(first), 2),
            (Target::Object(second), 2),
            (defender, 2),
        ]);
        assert!(d.validate(&early_trample).is_err());

        let short = DecisionResponse::DamageAssignment(vec![(Target::Object(first), 2)]);
        assert!(d.validate(&short).is_err());
    }

    #[test]
    fn test_deathtouch_lethal_is_one() {
        let first = EntityId::new(10);
        let second = EntityId::new(11);
        let d = decision(DecisionKind::AssignDamage {
            attacker: EntityId::new(1),
            power: 2,
            order: vec![
                DamageRecipient { blocker: first, lethal: 1 },
                DamageRecipient { blocker: second, lethal: 1 },
            ],
            trample_to: None,
        });
        let split = DecisionResponse::DamageAssignment(vec![(Target::Object(first), 1), (Target::Object(second), 1)]);
        assert!(d.validate(&split).is_ok());
    }

    #[test]
    fn test_targets_checked_against_legal_lists() {
        let creature = Target::Object(EntityId::new(4));
        let d = decision(DecisionKind::ChooseTargets {
            requirements: vec![TargetRequirement::single(TargetKind::AnyTarget)],
            legal: vec![vec![creature, Target::Player(PlayerId::new(1))]],
        });
        assert!(d.validate(&DecisionResponse::Targets(vec![vec![creature]])).is_ok());
        assert!(d.validate(&DecisionResponse::Targets(vec![vec![]])).is_err());
        assert!(d
            .validate(&DecisionResponse::Targets(vec![vec![Target::Object(EntityId::new(9))]]))
            .is_err());
        assert!(matches!(
            d.validate(&DecisionResponse::YesNo(true)),
            Err(RulesError::DecisionMismatch(_))
        ));
    }

    #[test]
    fn test_order_and_distribution() {
        let d = decision(DecisionKind::OrderObjects {
            items: vec![OrderItem { id: 1, label: "a".into() }, OrderItem { id: 2, label: "b".into() }],
        });
        assert!(d.validate(&DecisionResponse::Order(vec![2, 1])).is_ok());
        assert!(d.validate(&DecisionResponse::Order(vec![2, 2])).is_err());

        let a = Target::Player(PlayerId::new(0));
        let b = Target::Object(EntityId::new(3));
        let d = decision(DecisionKind::Distribute { total: 3, recipients: vec![a, b], min_each: 1 });
        assert!(d.validate(&DecisionResponse::Distribution(vec![(a, 2), (b, 1)])).is_ok());
        assert!(d.validate(&DecisionResponse::Distribution(vec![(a, 3), (b, 0)])).is_err());
    }
}
