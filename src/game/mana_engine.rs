//! Mana source discovery, mana abilities and cost payment
//!
//! [`ManaEngine`] scans one player's permanents through the layer projection,
//! classifies every usable mana source into a [`SourceTier`], and answers
//! whether (and how) a cost can be paid on top of the floating mana pool.
//! The payment functions below turn a plan into taps, life payments and pool
//! changes on the game state.

use crate::core::{
    CardScript, Color, EntityId, Keyword, ManaAbility, ManaCost, ManaPool, ManaProductionKind, PlayerId, Restriction,
    SummoningSickness, Supertype, Tapped,
};
use crate::game::context::EngineContext;
use crate::game::events::GameEvent;
use crate::game::layers::Projection;
use crate::game::mana_payment::{ManaPaymentResolver, ManaSolver, ManaSource, SourceTier, TapChoice};
use crate::game::state::GameState;
use crate::{Result, RulesError};
use serde::{Deserialize, Serialize};

/// How a player pays the mana part of a cost
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Payment {
    /// Floating mana first, then sources chosen by the solver
    #[default]
    Auto,
    /// Tap exactly these sources; together with the pool they must cover the cost
    Sources(Vec<EntityId>),
    /// Floating mana only
    Pool,
}

/// Mana availability for one player
#[derive(Debug, Clone)]
pub struct ManaEngine {
    player: PlayerId,
    sources: Vec<ManaSource>,
    pool: ManaPool,
    solver: ManaSolver,
}

impl ManaEngine {
    pub fn new(player: PlayerId) -> Self {
        ManaEngine {
            player,
            sources: Vec::new(),
            pool: ManaPool::new(),
            solver: ManaSolver::new(),
        }
    }

    /// Rescan sources, pool and hand; `casting` is left out of the hand demand
    pub fn update(&mut self, game: &GameState, projection: &Projection, cx: &EngineContext, casting: Option<EntityId>) {
        self.sources = available_sources(game, projection, cx, self.player);
        self.pool = game.player(self.player).map(|p| p.mana_pool).unwrap_or_default();
        let budget = self.sources.iter().map(|s| s.amount as usize).sum::<usize>() + self.pool.total() as usize;
        let demand = hand_demand(game, self.player, casting, budget);
        self.solver = ManaSolver::new().with_hand_demand(&demand);
    }

    pub fn sources(&self) -> &[ManaSource] {
        &self.sources
    }

    /// Sources to tap for whatever the pool does not cover
    pub fn plan(&self, cost: &ManaCost) -> Option<Vec<TapChoice>> {
        let remaining = uncovered_by_pool(&self.pool, cost);
        self.solver.compute_tap_order(&remaining, &self.sources)
    }

    /// Plan restricted to the given sources
    pub fn plan_with(&self, cost: &ManaCost, ids: &[EntityId]) -> Option<Vec<TapChoice>> {
        let remaining = uncovered_by_pool(&self.pool, cost);
        let chosen: Vec<ManaSource> = self.sources.iter().filter(|s| ids.contains(&s.id)).cloned().collect();
        if chosen.len() != ids.len() {
            return None;
        }
        self.solver.compute_tap_order(&remaining, &chosen)
    }

    pub fn can_pay(&self, cost: &ManaCost) -> bool {
        self.plan(cost).is_some()
    }
}

/// The part of a cost left after spending floating mana on it
pub fn uncovered_by_pool(pool: &ManaPool, cost: &ManaCost) -> ManaCost {
    let mut pool = *pool;
    let mut remaining = *cost;
    for color in Color::WUBRG.iter().chain(std::iter::once(&Color::Colorless)) {
        let covered = pool.amount(*color).min(cost.amount(*color));
        if covered > 0 {
            let mut spent = ManaCost::new();
            match color {
                Color::White => spent.white = covered,
                Color::Blue => spent.blue = covered,
                Color::Black => spent.black = covered,
                Color::Red => spent.red = covered,
                Color::Green => spent.green = covered,
                Color::Colorless => spent.colorless = covered,
            }
            // Cannot fail: covered never exceeds what the pool holds
            let _ = pool.pay_cost(&spent);
            match color {
                Color::White => remaining.white -= covered,
                Color::Blue => remaining.blue -= covered,
                Color::Black => remaining.black -= covered,
                Color::Red => remaining.red -= covered,
                Color::Green => remaining.green -= covered,
                Color::Colorless => remaining.colorless -= covered,
            }
        }
    }
    remaining.generic -= remaining.generic.min(u8::try_from(pool.total()).unwrap_or(u8::MAX));
    remaining
}

fn tier_of(script: &CardScript, is_basic_land: bool, is_creature: bool) -> SourceTier {
    let flexible = script
        .mana_abilities
        .iter()
        .any(|a| a.produces == ManaProductionKind::AnyColor || a.life_cost > 0);
    if flexible {
        SourceTier::Flexible
    } else if script.has_non_mana_abilities() || is_creature {
        SourceTier::MultiPurpose
    } else if is_basic_land {
        SourceTier::Basic
    } else {
        SourceTier::SinglePurpose
    }
}

/// Everything a source could produce across its mana abilities
fn combined_production(abilities: &[ManaAbility]) -> ManaProductionKind {
    if abilities.iter().any(|a| a.produces == ManaProductionKind::AnyColor) {
        let colorless = abilities.iter().any(|a| a.produces.can_produce(Color::Colorless));
        if !colorless {
            return ManaProductionKind::AnyColor;
        }
    }
    let mut colors: Vec<Color> = abilities.iter().flat_map(|a| a.produces.colors()).collect();
    colors.sort();
    colors.dedup();
    match colors.as_slice() {
        [single] => ManaProductionKind::Fixed(*single),
        _ => ManaProductionKind::Choice(colors),
    }
}

/// Untapped sources `player` could tap for mana right now
///
/// Summoning-sick creatures without haste are left out, as are permanents
/// whose abilities are removed or cannot be activated.
pub fn available_sources(
    game: &GameState,
    projection: &Projection,
    cx: &EngineContext,
    player: PlayerId,
) -> Vec<ManaSource> {
    let mut sources = Vec::new();
    for id in projection.controlled_by(game, player) {
        let Some(chars) = projection.get(id) else { continue };
        if chars.tapped || chars.abilities_removed || chars.has_restriction(&Restriction::CantActivateAbilities) {
            continue;
        }
        let Some(script) = cx.script(chars.name.as_str()) else { continue };
        if script.mana_abilities.is_empty() {
            continue;
        }
        let sick = game.entity(id).is_some_and(|e| e.has::<SummoningSickness>());
        if chars.is_creature() && sick && !chars.has_keyword(&Keyword::Haste) {
            continue;
        }
        let basic = chars.is_land() && chars.supertypes.contains(&Supertype::Basic);
        sources.push(ManaSource {
            id,
            produces: combined_production(&script.mana_abilities),
            amount: script.mana_abilities.iter().map(|a| a.amount).max().unwrap_or(1),
            tier: tier_of(script, basic, chars.is_creature()),
        });
    }
    sources
}

/// Colored pips of cards still in hand that the player could afford
pub fn hand_demand(game: &GameState, player: PlayerId, casting: Option<EntityId>, budget: usize) -> Vec<Color> {
    game.hand(player)
        .into_iter()
        .filter(|id| Some(*id) != casting)
        .filter_map(|id| game.card(id))
        .filter(|card| !card.is_land() && (card.mana_cost.cmc() as usize) <= budget)
        .flat_map(|card| card.mana_cost.colored_pips())
        .filter(|c| c.is_colored())
        .collect()
}

/// Ability to use for a color: the first that makes it, preferring no life cost
fn ability_for(script: &CardScript, color: Color) -> Option<(usize, &ManaAbility)> {
    script
        .mana_abilities
        .iter()
        .enumerate()
        .filter(|(_, a)| a.produces.can_produce(color))
        .min_by_key(|(i, a)| (a.life_cost, *i))
}

/// Activate a mana ability: tap, pay life, add mana. Never uses the stack.
pub fn activate_mana_ability(
    game: &mut GameState,
    cx: &mut EngineContext,
    player: PlayerId,
    source: EntityId,
    index: usize,
    color: Option<Color>,
) -> Result<()> {
    let projection = Projection::compute(game, cx.registry);
    let chars = projection
        .get(source)
        .ok_or_else(|| RulesError::invalid(format!("{} is not on the battlefield", source)))?;
    if chars.controller != player {
        return Err(RulesError::invalid(format!("{} does not control {}", player, source)));
    }
    if chars.tapped {
        return Err(RulesError::invalid(format!("{} is already tapped", chars.name)));
    }
    if chars.abilities_removed || chars.has_restriction(&Restriction::CantActivateAbilities) {
        return Err(RulesError::invalid(format!("abilities of {} cannot be activated", chars.name)));
    }
    let sick = game.entity(source).is_some_and(|e| e.has::<SummoningSickness>());
    if chars.is_creature() && sick && !chars.has_keyword(&Keyword::Haste) {
        return Err(RulesError::invalid(format!("{} has summoning sickness", chars.name)));
    }
    let script = cx
        .script(chars.name.as_str())
        .ok_or_else(|| RulesError::invalid(format!("no script for {}", chars.name)))?;
    let ability = script
        .mana_abilities
        .get(index)
        .ok_or_else(|| RulesError::invalid(format!("{} has no mana ability {}", chars.name, index)))?;
    let color = match (color, &ability.produces) {
        (Some(c), produces) if produces.can_produce(c) => c,
        (Some(c), _) => return Err(RulesError::invalid(format!("{} cannot produce {}", chars.name, c))),
        (None, ManaProductionKind::Fixed(c)) => *c,
        (None, _) => return Err(RulesError::invalid(format!("choose a color for {}", chars.name))),
    };
    produce(game, cx, player, source, ability, color);
    Ok(())
}

fn produce(
    game: &mut GameState,
    cx: &mut EngineContext,
    player: PlayerId,
    source: EntityId,
    ability: &ManaAbility,
    color: Color,
) {
    if ability.life_cost > 0 {
        if let Ok(p) = game.player_mut(player) {
            p.lose_life(ability.life_cost as i32);
        }
        cx.emit(GameEvent::LifeLost { player, amount: ability.life_cost });
    }
    if let Some(entity) = game.entity_mut(source) {
        entity.insert(Tapped);
    }
    cx.emit(GameEvent::Tapped { entity: source });
    if let Ok(p) = game.player_mut(player) {
        for _ in 0..ability.amount {
            p.mana_pool.add_color(color);
        }
    }
    cx.emit(GameEvent::ManaAbilityActivated { player, source });
    cx.emit(GameEvent::ManaAdded { player, amount: ability.amount as u32 });
}

fn tap_choices(game: &mut GameState, cx: &mut EngineContext, player: PlayerId, taps: &[TapChoice]) -> Result<()> {
    for tap in taps {
        let name = game.card_name(tap.source);
        let script = cx
            .script(&name)
            .ok_or_else(|| RulesError::invalid(format!("no script for {}", name)))?;
        let (_, ability) = ability_for(script, tap.color)
            .ok_or_else(|| RulesError::invalid(format!("{} cannot produce {}", name, tap.color)))?;
        produce(game, cx, player, tap.source, ability, tap.color);
    }
    Ok(())
}

/// Pay a mana cost; nothing is tapped unless the whole cost can be paid
pub fn pay_mana(
    game: &mut GameState,
    cx: &mut EngineContext,
    player: PlayerId,
    cost: &ManaCost,
    payment: &Payment,
    casting: Option<EntityId>,
) -> Result<()> {
    if cost.cmc() == 0 {
        return Ok(());
    }
    let taps = match payment {
        Payment::Pool => Vec::new(),
        Payment::Auto | Payment::Sources(_) => {
            let projection = Projection::compute(game, cx.registry);
            let mut engine = ManaEngine::new(player);
            engine.update(game, &projection, cx, casting);
            let plan = match payment {
                Payment::Sources(ids) => engine.plan_with(cost, ids),
                _ => engine.plan(cost),
            };
            plan.ok_or_else(|| RulesError::InsufficientMana(format!("cannot pay {}", cost)))?
        }
    };
    tap_choices(game, cx, player, &taps)?;
    if let Payment::Sources(ids) = payment {
        // Listed sources the plan did not need are still tapped; their mana floats
        for id in ids {
            if !taps.iter().any(|t| t.source == *id) && !game.entity(*id).is_some_and(|e| e.is_tapped()) {
                let name = game.card_name(*id);
                if let Some(ability) = cx.script(&name).and_then(|s| s.mana_abilities.first()) {
                    let color = ability.produces.colors().first().copied().unwrap_or(Color::Colorless);
                    produce(game, cx, player, *id, ability, color);
                }
            }
        }
    }
    game.player_mut(player)?.mana_pool.pay_cost(cost)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::core::{CardData, InMemoryRegistry};
    use crate::game::logger::GameLogger;
    use crate::zones::Zone;

    fn registry() -> InMemoryRegistry {
        let mut registry = InMemoryRegistry::new();
        registry.register(
            CardScript::with_card(CardData::basic_land("Forest"))
                .with_mana_ability(ManaAbility::new(ManaProductionKind::Fixed(Color::Green))),
        );
        registry.register(
            CardScript::with_card(CardData::land("Karplusan Forest"))
                .with_mana_ability(ManaAbility::new(ManaProductionKind::Fixed(Color::Colorless)))
                .with_mana_ability(ManaAbility::new(ManaProductionKind::Choice(vec![Color::Red, Color::Green])).painful(1)),
        );
        registry.register(
            CardScript::with_card(CardData::creature("Llanowar Elves", "G", 1, 1))
                .with_mana_ability(ManaAbility::new(ManaProductionKind::Fixed(Color::Green))),
        );
        registry
    }

    fn setup() -> (GameState, PlayerId) {
        let game = GameState::new_two_player("Alice", "Bob", GameConfig::default());
        let p1 = game.players[0].id;
        (game, p1)
    }

    #[test]
    fn test_sick_mana_creature_is_not_a_source() {
        let (mut game, p1) = setup();
        let registry = registry();
        let logger = GameLogger::new();
        let cx = EngineContext::new(&registry, &logger);
        let elves = game.create_card(p1, CardData::creature("Llanowar Elves", "G", 1, 1), Zone::Battlefield);

        let projection = Projection::compute(&game, &registry);
        assert!(available_sources(&game, &projection, &cx, p1).is_empty());

        game.entity_mut(elves).unwrap().remove::<SummoningSickness>();
        let projection = Projection::compute(&game, &registry);
        let sources = available_sources(&game, &projection, &cx, p1);
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].tier, SourceTier::MultiPurpose);
    }

    #[test]
    fn test_painland_is_flexible_and_costs_life() {
        let (mut game, p1) = setup();
        let registry = registry();
        let logger = GameLogger::new();
        let mut cx = EngineContext::new(&registry, &logger);
        let karplusan = game.create_card(p1, CardData::land("Karplusan Forest"), Zone::Battlefield);

        let projection = Projection::compute(&game, &registry);
        let sources = available_sources(&game, &projection, &cx, p1);
        assert_eq!(sources[0].tier, SourceTier::Flexible);

        pay_mana(&mut game, &mut cx, p1, &ManaCost::from_string("R"), &Payment::Auto, None).unwrap();
        assert_eq!(game.player(p1).unwrap().life, 19);
        assert!(game.entity(karplusan).unwrap().is_tapped());
        assert_eq!(game.player(p1).unwrap().mana_pool.total(), 0);
    }

    #[test]
    fn test_auto_payment_uses_pool_first() {
        let (mut game, p1) = setup();
        let registry = registry();
        let logger = GameLogger::new();
        let mut cx = EngineContext::new(&registry, &logger);
        let forest = game.create_card(p1, CardData::basic_land("Forest"), Zone::Battlefield);
        game.player_mut(p1).unwrap().mana_pool.add_color(Color::Red);

        pay_mana(&mut game, &mut cx, p1, &ManaCost::from_string("1G"), &Payment::Auto, None).unwrap();
        assert!(game.entity(forest).unwrap().is_tapped());
        assert_eq!(game.player(p1).unwrap().mana_pool.total(), 0);

        let err = pay_mana(&mut game, &mut cx, p1, &ManaCost::from_string("G"), &Payment::Auto, None);
        assert!(matches!(err, Err(RulesError::InsufficientMana(_))));
    }

    #[test]
    fn test_manual_mana_ability() {
        let (mut game, p1) = setup();
        let registry = registry();
        let logger = GameLogger::new();
        let mut cx = EngineContext::new(&registry, &logger);
        let forest = game.create_card(p1, CardData::basic_land("Forest"), Zone::Battlefield);

        activate_mana_ability(&mut game, &mut cx, p1, forest, 0, None).unwrap();
        assert_eq!(game.player(p1).unwrap().mana_pool.amount(Color::Green), 1);
        assert!(activate_mana_ability(&mut game, &mut cx, p1, forest, 0, None).is_err());
        assert!(cx.events.contains(&GameEvent::ManaAbilityActivated { player: p1, source: forest }));
    }

    #[test]
    fn test_uncovered_by_pool() {
        let mut pool = ManaPool::new();
        pool.add_color(Color::Blue);
        pool.add_color(Color::Red);
        let remaining = uncovered_by_pool(&pool, &ManaCost::from_string("2U"));
        assert_eq!(remaining, ManaCost::from_string("1"));
    }
}
