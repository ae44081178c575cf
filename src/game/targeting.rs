//! Legal targets, target validation and resolution-time revalidation

use crate::core::{
    CardType, Characteristics, ChosenTarget, Color, EntityId, FilterContext, Keyword, PlayerId, Target, TargetKind,
    TargetRequirement,
};
use crate::game::layers::Projection;
use crate::game::state::GameState;
use crate::zones::Zone;
use crate::{Result, RulesError};

/// Who is targeting, and with what
#[derive(Debug, Clone, PartialEq)]
pub struct TargetSource {
    pub controller: PlayerId,
    pub object: Option<EntityId>,
    /// Colors of the spell or ability source, checked against protection
    pub colors: Vec<Color>,
}

impl TargetSource {
    pub fn new(controller: PlayerId, object: Option<EntityId>, colors: Vec<Color>) -> Self {
        TargetSource { controller, object, colors }
    }

    fn filter_context(&self) -> FilterContext {
        FilterContext { you: self.controller, source: self.object }
    }
}

/// Hexproof, shroud and protection
fn can_be_targeted_by(chars: &Characteristics, source: &TargetSource) -> bool {
    if chars.has_keyword(&Keyword::Shroud) {
        return false;
    }
    if chars.has_keyword(&Keyword::Hexproof) && chars.controller != source.controller {
        return false;
    }
    !chars.has_protection_from(&source.colors)
}

pub fn is_legal_target(
    game: &GameState,
    projection: &Projection,
    kind: &TargetKind,
    target: Target,
    source: &TargetSource,
) -> bool {
    let ctx = source.filter_context();
    match (kind, target) {
        (TargetKind::Player(filter), Target::Player(player)) => {
            filter.matches(player, source.controller) && game.is_in_game(player)
        }
        (TargetKind::AnyTarget, Target::Player(player)) => game.is_in_game(player),
        (TargetKind::Permanent(filter), Target::Object(id)) => projection
            .get(id)
            .is_some_and(|c| filter.matches(c, id, &ctx) && can_be_targeted_by(c, source)),
        (TargetKind::AnyTarget, Target::Object(id)) => projection.get(id).is_some_and(|c| {
            (c.is_creature() || c.is_type(CardType::Planeswalker)) && can_be_targeted_by(c, source)
        }),
        (TargetKind::Spell(filter), Target::Object(id)) => {
            game.is_spell(id)
                && game
                    .raw_characteristics(id)
                    .is_some_and(|c| filter.matches(&c, id, &ctx) && can_be_targeted_by(&c, source))
        }
        (TargetKind::CardInGraveyard(filter), Target::Object(id)) => {
            game.zone_of(id) == Some(Zone::Graveyard)
                && game.raw_characteristics(id).is_some_and(|c| filter.matches(&c, id, &ctx))
        }
        _ => false,
    }
}

/// Whether an aura may stay attached to `host`
///
/// Checks the aura's enchant restriction and protection. Hexproof and shroud
/// only stop targeting, so they are ignored here.
pub fn can_enchant(
    projection: &Projection,
    enchant: Option<&TargetKind>,
    host: EntityId,
    aura: &TargetSource,
) -> bool {
    let Some(chars) = projection.get(host) else { return false };
    let allowed = match enchant {
        Some(TargetKind::Permanent(filter)) => filter.matches(chars, host, &aura.filter_context()),
        Some(TargetKind::AnyTarget) => chars.is_creature() || chars.is_type(CardType::Planeswalker),
        _ => true,
    };
    allowed && !chars.has_protection_from(&aura.colors)
}

/// Every legal choice for one requirement, players first, then objects by id
pub fn legal_targets(
    game: &GameState,
    projection: &Projection,
    requirement: &TargetRequirement,
    source: &TargetSource,
) -> Vec<Target> {
    let mut candidates: Vec<Target> = Vec::new();
    match &requirement.kind {
        TargetKind::Player(_) => {
            candidates.extend(game.players.iter().map(|p| Target::Player(p.id)));
        }
        TargetKind::Permanent(_) => {
            candidates.extend(game.battlefield.cards.iter().map(|id| Target::Object(*id)));
        }
        TargetKind::AnyTarget => {
            candidates.extend(game.players.iter().map(|p| Target::Player(p.id)));
            candidates.extend(game.battlefield.cards.iter().map(|id| Target::Object(*id)));
        }
        TargetKind::Spell(_) => {
            candidates.extend(game.stack.cards.iter().map(|id| Target::Object(*id)));
        }
        TargetKind::CardInGraveyard(_) => {
            for zones in &game.player_zones {
                candidates.extend(zones.graveyard.cards.iter().map(|id| Target::Object(*id)));
            }
        }
    }
    let mut legal: Vec<Target> = candidates
        .into_iter()
        .filter(|t| is_legal_target(game, projection, &requirement.kind, *t, source))
        .collect();
    legal.sort();
    legal.dedup();
    legal
}

/// Legal choices for every requirement
pub fn legal_targets_for_all(
    game: &GameState,
    projection: &Projection,
    requirements: &[TargetRequirement],
    source: &TargetSource,
) -> Vec<Vec<Target>> {
    requirements
        .iter()
        .map(|req| legal_targets(game, projection, req, source))
        .collect()
}

/// Whether every mandatory slot can be filled
pub fn has_legal_selection(
    game: &GameState,
    projection: &Projection,
    requirements: &[TargetRequirement],
    source: &TargetSource,
) -> bool {
    requirements
        .iter()
        .all(|req| legal_targets(game, projection, req, source).len() >= req.min)
}

/// Check a proposed selection against count bounds and per-target legality
pub fn validate_selection(
    game: &GameState,
    projection: &Projection,
    requirements: &[TargetRequirement],
    chosen: &[Vec<Target>],
    source: &TargetSource,
) -> Result<()> {
    if chosen.len() != requirements.len() {
        return Err(RulesError::invalid(format!(
            "expected {} target slot(s), got {}",
            requirements.len(),
            chosen.len()
        )));
    }
    for (slot, (req, picks)) in requirements.iter().zip(chosen).enumerate() {
        if picks.len() < req.min || picks.len() > req.max {
            return Err(RulesError::invalid(format!(
                "target slot {} needs between {} and {} target(s)",
                slot, req.min, req.max
            )));
        }
        for (i, target) in picks.iter().enumerate() {
            if picks[..i].contains(target) {
                return Err(RulesError::invalid(format!("{:?} chosen twice in slot {}", target, slot)));
            }
            if !is_legal_target(game, projection, &req.kind, *target, source) {
                return Err(RulesError::invalid(format!("{:?} is not a legal target", target)));
            }
        }
    }
    Ok(())
}

/// Record chosen targets with their current zone stamps
pub fn stamp_targets(game: &GameState, chosen: Vec<Vec<Target>>) -> Vec<Vec<ChosenTarget>> {
    chosen
        .into_iter()
        .map(|slot| {
            slot.into_iter()
                .map(|target| ChosenTarget {
                    target,
                    zone_stamp: target.as_object().and_then(|id| game.entity(id)).and_then(|e| e.zone_stamp()),
                })
                .collect()
        })
        .collect()
}

/// Still-legal subset of each slot at resolution
///
/// An object that changed zones since it was chosen is a new object and is
/// dropped even if the new object would match.
pub fn validate_on_resolution(
    game: &GameState,
    projection: &Projection,
    requirements: &[TargetRequirement],
    chosen: &[Vec<ChosenTarget>],
    source: &TargetSource,
) -> Vec<Vec<ChosenTarget>> {
    chosen
        .iter()
        .enumerate()
        .map(|(slot, picks)| {
            let Some(req) = requirements.get(slot) else {
                return Vec::new();
            };
            picks
                .iter()
                .filter(|chosen| {
                    let same_object = match chosen.target {
                        Target::Object(id) => game.entity(id).and_then(|e| e.zone_stamp()) == chosen.zone_stamp,
                        Target::Player(_) => true,
                    };
                    same_object && is_legal_target(game, projection, &req.kind, chosen.target, source)
                })
                .copied()
                .collect()
        })
        .collect()
}

/// Whether anything was chosen at all
pub fn had_targets(chosen: &[Vec<ChosenTarget>]) -> bool {
    chosen.iter().any(|slot| !slot.is_empty())
}
