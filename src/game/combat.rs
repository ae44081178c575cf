//! Combat: declaring attackers and blockers, and combat damage
//!
//! Combat bookkeeping lives in [`CombatState`] for one combat phase and is
//! cleared when the phase ends. Damage is dealt in passes: a first strike
//! pass when any combatant has first strike or double strike, then the
//! regular pass. All damage of one pass is dealt simultaneously.

use crate::core::{CardRegistry, EntityId, Keyword, PlayerId, Restriction, SummoningSickness, Tapped, Target};
use crate::game::context::{EngineContext, Flow};
use crate::game::continuation::{self, Continuation};
use crate::game::decision::{DamageRecipient, DecisionKind, OrderItem};
use crate::game::events::GameEvent;
use crate::game::layers::Projection;
use crate::game::phase::Step;
use crate::game::replacement;
use crate::game::state::GameState;
use crate::{Result, RulesError};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Combat state for the current combat phase
///
/// Uses BTreeMap for deterministic iteration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CombatState {
    /// Attacking creature -> the player it attacks
    pub attackers: BTreeMap<EntityId, PlayerId>,

    /// Attacker -> its blockers, in damage-assignment order
    pub attacker_blockers: BTreeMap<EntityId, SmallVec<[EntityId; 4]>>,

    /// Blocker -> the attacker it blocks
    pub blockers: BTreeMap<EntityId, EntityId>,

    /// Attackers that were blocked; they stay blocked when their blockers leave
    pub blocked: BTreeSet<EntityId>,

    pub attackers_declared: bool,
    pub blockers_declared_by: Vec<PlayerId>,

    /// Attackers whose blockers have been put in order
    pub ordered: BTreeSet<EntityId>,

    pub first_strike_dealt: bool,
    pub regular_damage_dealt: bool,
}

impl CombatState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare_attacker(&mut self, attacker: EntityId, defending_player: PlayerId) {
        self.attackers.insert(attacker, defending_player);
    }

    pub fn declare_blocker(&mut self, blocker: EntityId, attacker: EntityId) {
        self.blockers.insert(blocker, attacker);
        self.attacker_blockers.entry(attacker).or_default().push(blocker);
        self.blocked.insert(attacker);
    }

    pub fn is_attacking(&self, id: EntityId) -> bool {
        self.attackers.contains_key(&id)
    }

    pub fn is_blocking(&self, id: EntityId) -> bool {
        self.blockers.contains_key(&id)
    }

    pub fn is_blocked(&self, attacker: EntityId) -> bool {
        self.blocked.contains(&attacker)
    }

    pub fn get_blockers(&self, attacker: EntityId) -> SmallVec<[EntityId; 4]> {
        self.attacker_blockers.get(&attacker).cloned().unwrap_or_default()
    }

    pub fn defending_player(&self, attacker: EntityId) -> Option<PlayerId> {
        self.attackers.get(&attacker).copied()
    }

    /// Every attacked player, in id order
    pub fn defending_players(&self) -> Vec<PlayerId> {
        let players: BTreeSet<PlayerId> = self.attackers.values().copied().collect();
        players.into_iter().collect()
    }

    /// Take a creature out of combat (it left the battlefield)
    pub fn remove_creature(&mut self, id: EntityId) {
        self.attackers.remove(&id);
        self.attacker_blockers.remove(&id);
        self.ordered.remove(&id);
        if let Some(attacker) = self.blockers.remove(&id) {
            if let Some(list) = self.attacker_blockers.get_mut(&attacker) {
                list.retain(|b| *b != id);
            }
        }
    }

    /// A player left the game: creatures attacking them leave combat
    pub fn remove_player(&mut self, player: PlayerId) {
        let attacking_them: Vec<EntityId> = self
            .attackers
            .iter()
            .filter(|(_, defending)| **defending == player)
            .map(|(id, _)| *id)
            .collect();
        for id in attacking_them {
            self.remove_creature(id);
        }
        self.blockers_declared_by.retain(|p| *p != player);
    }

    pub fn clear(&mut self) {
        *self = CombatState::default();
    }
}

// ---- declare attackers ----

/// Whether `id` may be declared as an attacker by `player`
pub fn can_attack(game: &GameState, projection: &Projection, player: PlayerId, id: EntityId) -> bool {
    let (Some(chars), Some(entity)) = (projection.get(id), game.entity(id)) else {
        return false;
    };
    chars.is_creature()
        && chars.controller == player
        && !entity.is_tapped()
        && (!entity.has::<SummoningSickness>() || chars.has_keyword(&Keyword::Haste))
        && !chars.has_keyword(&Keyword::Defender)
        && !chars.has_restriction(&Restriction::CantAttack)
}

/// Creatures the active player could attack with
pub fn possible_attackers(game: &GameState, registry: &dyn CardRegistry) -> Vec<EntityId> {
    let projection = Projection::compute(game, registry);
    let player = game.turn.active_player;
    projection
        .controlled_by(game, player)
        .into_iter()
        .filter(|id| can_attack(game, &projection, player, *id))
        .collect()
}

pub fn validate_attackers(
    game: &GameState,
    registry: &dyn CardRegistry,
    player: PlayerId,
    attackers: &[(EntityId, PlayerId)],
) -> Result<()> {
    if game.turn.current_step != Step::DeclareAttackers || player != game.turn.active_player {
        return Err(RulesError::invalid(
            "attackers are declared by the active player in the declare attackers step",
        ));
    }
    if game.combat.attackers_declared {
        return Err(RulesError::invalid("attackers have already been declared"));
    }
    let projection = Projection::compute(game, registry);
    let mut seen = BTreeSet::new();
    for &(attacker, defending) in attackers {
        if !seen.insert(attacker) {
            return Err(RulesError::invalid(format!("{} is declared twice", attacker)));
        }
        if !can_attack(game, &projection, player, attacker) {
            return Err(RulesError::invalid(format!("{} cannot attack", attacker)));
        }
        if defending == player || !game.is_in_game(defending) {
            return Err(RulesError::invalid(format!("{} cannot be attacked", defending)));
        }
    }
    Ok(())
}

/// Declare attackers; attackers without vigilance become tapped
pub fn declare_attackers(
    game: &mut GameState,
    cx: &mut EngineContext,
    player: PlayerId,
    attackers: &[(EntityId, PlayerId)],
) -> Result<()> {
    validate_attackers(game, cx.registry, player, attackers)?;
    let projection = Projection::compute(game, cx.registry);
    for &(attacker, defending) in attackers {
        game.combat.declare_attacker(attacker, defending);
        if !projection.has_keyword(attacker, &Keyword::Vigilance) {
            if let Some(entity) = game.entity_mut(attacker) {
                entity.insert(Tapped);
            }
            cx.emit(GameEvent::Tapped { entity: attacker });
        }
    }
    game.combat.attackers_declared = true;
    cx.emit(GameEvent::AttackersDeclared {
        player,
        attackers: attackers.iter().map(|(id, _)| *id).collect(),
    });
    Ok(())
}

// ---- declare blockers ----

/// Why `blocker` cannot block `attacker` for `player`, if it cannot
fn block_error(
    game: &GameState,
    projection: &Projection,
    player: PlayerId,
    blocker: EntityId,
    attacker: EntityId,
) -> Option<String> {
    let Some(b) = projection.get(blocker) else {
        return Some(format!("{} is not on the battlefield", blocker));
    };
    if !b.is_creature() || b.controller != player {
        return Some(format!("{} is not a creature you control", blocker));
    }
    if game.entity(blocker).is_some_and(|e| e.is_tapped()) {
        return Some(format!("{} is tapped", blocker));
    }
    if b.has_restriction(&Restriction::CantBlock) {
        return Some(format!("{} can't block", blocker));
    }
    if game.combat.defending_player(attacker) != Some(player) {
        return Some(format!("{} is not attacking you", attacker));
    }
    let Some(a) = projection.get(attacker) else {
        return Some(format!("{} is not attacking", attacker));
    };
    if a.has_restriction(&Restriction::CantBeBlocked) {
        return Some(format!("{} can't be blocked", attacker));
    }
    if a.has_keyword(&Keyword::Flying) && !b.has_keyword(&Keyword::Flying) && !b.has_keyword(&Keyword::Reach) {
        return Some(format!("{} has flying", attacker));
    }
    if a.has_protection_from(&b.colors) {
        return Some(format!("{} has protection from {}", attacker, blocker));
    }
    None
}

/// Every (blocker, attacker) pair legal on its own for a defending player
pub fn possible_blocks(game: &GameState, registry: &dyn CardRegistry, player: PlayerId) -> Vec<(EntityId, EntityId)> {
    let projection = Projection::compute(game, registry);
    let attackers: Vec<EntityId> = game
        .combat
        .attackers
        .iter()
        .filter(|(_, defending)| **defending == player)
        .map(|(id, _)| *id)
        .collect();
    let mut pairs = Vec::new();
    for blocker in projection.controlled_by(game, player) {
        for &attacker in &attackers {
            if block_error(game, &projection, player, blocker, attacker).is_none() {
                pairs.push((blocker, attacker));
            }
        }
    }
    pairs
}

pub fn validate_blockers(
    game: &GameState,
    registry: &dyn CardRegistry,
    player: PlayerId,
    blocks: &[(EntityId, EntityId)],
) -> Result<()> {
    if game.turn.current_step != Step::DeclareBlockers {
        return Err(RulesError::invalid("blockers are declared in the declare blockers step"));
    }
    if !game.combat.defending_players().contains(&player) {
        return Err(RulesError::invalid(format!("{} is not being attacked", player)));
    }
    if game.combat.blockers_declared_by.contains(&player) {
        return Err(RulesError::invalid(format!("{} has already declared blockers", player)));
    }
    let projection = Projection::compute(game, registry);
    let mut seen = BTreeSet::new();
    let mut per_attacker: BTreeMap<EntityId, usize> = BTreeMap::new();
    for &(blocker, attacker) in blocks {
        if !seen.insert(blocker) {
            return Err(RulesError::invalid(format!("{} blocks more than one attacker", blocker)));
        }
        if let Some(reason) = block_error(game, &projection, player, blocker, attacker) {
            return Err(RulesError::invalid(reason));
        }
        *per_attacker.entry(attacker).or_insert(0) += 1;
    }
    for (attacker, count) in per_attacker {
        if count == 1 && projection.has_keyword(attacker, &Keyword::Menace) {
            return Err(RulesError::invalid(format!(
                "{} has menace and can't be blocked except by two or more creatures",
                attacker
            )));
        }
    }
    Ok(())
}

/// Record one defending player's blocks
///
/// Once every defending player has declared, attackers with several
/// blockers have them ordered by their controller.
pub fn declare_blockers(
    game: &mut GameState,
    cx: &mut EngineContext,
    player: PlayerId,
    blocks: &[(EntityId, EntityId)],
) -> Result<Flow> {
    validate_blockers(game, cx.registry, player, blocks)?;
    for &(blocker, attacker) in blocks {
        game.combat.declare_blocker(blocker, attacker);
    }
    game.combat.blockers_declared_by.push(player);
    cx.emit(GameEvent::BlockersDeclared { player, blocks: blocks.to_vec() });
    Ok(finish_blocks(game, cx))
}

/// The next defending player who still has to declare blockers
pub fn awaiting_blockers(game: &GameState) -> Option<PlayerId> {
    game.combat
        .defending_players()
        .into_iter()
        .find(|p| game.is_in_game(*p) && !game.combat.blockers_declared_by.contains(p))
}

/// Entering the declare blockers step: players without a legal block declare none
pub fn begin_declare_blockers(game: &mut GameState, cx: &mut EngineContext) -> Flow {
    for defender in game.combat.defending_players() {
        if !game.is_in_game(defender) || game.combat.blockers_declared_by.contains(&defender) {
            continue;
        }
        if possible_blocks(game, cx.registry, defender).is_empty() {
            game.combat.blockers_declared_by.push(defender);
            cx.emit(GameEvent::BlockersDeclared { player: defender, blocks: Vec::new() });
        }
    }
    finish_blocks(game, cx)
}

fn finish_blocks(game: &mut GameState, cx: &mut EngineContext) -> Flow {
    if awaiting_blockers(game).is_some() {
        return Flow::Continue;
    }
    order_blockers(game, cx)
}

/// Ask for the damage-assignment order of the next attacker with several blockers
pub fn order_blockers(game: &mut GameState, cx: &mut EngineContext) -> Flow {
    let projection = Projection::compute(game, cx.registry);
    loop {
        let next = game
            .combat
            .attacker_blockers
            .iter()
            .find(|(attacker, blockers)| blockers.len() > 1 && !game.combat.ordered.contains(*attacker))
            .map(|(attacker, blockers)| (*attacker, blockers.clone()));
        let Some((attacker, blockers)) = next else {
            return Flow::Continue;
        };
        let Some(controller) = projection.controller(attacker) else {
            game.combat.ordered.insert(attacker);
            continue;
        };
        let items = blockers
            .iter()
            .map(|b| OrderItem { id: b.as_u32() as u64, label: game.card_name(*b) })
            .collect();
        let prompt = format!("Order the creatures blocking {}", game.card_name(attacker));
        return continuation::ask(
            game,
            cx,
            controller,
            DecisionKind::OrderObjects { items },
            Some(attacker),
            prompt,
            Continuation::BlockerOrder { attacker },
        );
    }
}

/// Apply a blocker order answer (item ids are blocker ids)
pub fn apply_blocker_order(game: &mut GameState, attacker: EntityId, order: &[u64]) {
    if let Some(blockers) = game.combat.attacker_blockers.get_mut(&attacker) {
        let mut sorted: SmallVec<[EntityId; 4]> = order
            .iter()
            .filter_map(|id| blockers.iter().find(|b| b.as_u32() as u64 == *id).copied())
            .collect();
        for b in blockers.iter() {
            if !sorted.contains(b) {
                sorted.push(*b);
            }
        }
        *blockers = sorted;
    }
    game.combat.ordered.insert(attacker);
}

// ---- combat damage ----

/// One combat damage pass, possibly waiting on a damage assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamagePass {
    pub first_strike: bool,
    /// Attackers not yet assigned
    pub remaining: VecDeque<EntityId>,
    /// (source, recipient, amount) collected so far
    pub assignments: Vec<(EntityId, Target, u32)>,
    /// The attacker whose assignment is being asked for
    pub current: Option<EntityId>,
}

fn deals_damage_in_pass(projection: &Projection, id: EntityId, first_strike: bool) -> bool {
    let first = projection.has_keyword(id, &Keyword::FirstStrike);
    let double = projection.has_keyword(id, &Keyword::DoubleStrike);
    if first_strike {
        first || double
    } else {
        !first || double
    }
}

pub fn has_first_strike_combat(game: &GameState, projection: &Projection) -> bool {
    game.combat.attackers.keys().chain(game.combat.blockers.keys()).any(|id| {
        projection.has_keyword(*id, &Keyword::FirstStrike) || projection.has_keyword(*id, &Keyword::DoubleStrike)
    })
}

/// The first strike pass happened and the regular pass is still owed
pub fn regular_pass_pending(game: &GameState) -> bool {
    game.combat.first_strike_dealt && !game.combat.regular_damage_dealt
}

/// Entering the combat damage step: run the first pass
pub fn begin_combat_damage(game: &mut GameState, cx: &mut EngineContext) -> Flow {
    let projection = Projection::compute(game, cx.registry);
    let first_strike = has_first_strike_combat(game, &projection);
    start_damage_pass(game, cx, first_strike)
}

pub fn start_damage_pass(game: &mut GameState, cx: &mut EngineContext, first_strike: bool) -> Flow {
    let projection = Projection::compute(game, cx.registry);
    let mut assignments = Vec::new();
    for (&blocker, &attacker) in &game.combat.blockers {
        if !game.combat.is_attacking(attacker) || !deals_damage_in_pass(&projection, blocker, first_strike) {
            continue;
        }
        let power = projection.power(blocker).unwrap_or(0);
        if power > 0 {
            assignments.push((blocker, Target::Object(attacker), power as u32));
        }
    }
    let pass = DamagePass {
        first_strike,
        remaining: game.combat.attackers.keys().copied().collect(),
        assignments,
        current: None,
    };
    run_pass(game, cx, pass)
}

/// Continue a pass with the assignment for its current attacker
pub fn resume_pass(
    game: &mut GameState,
    cx: &mut EngineContext,
    mut pass: DamagePass,
    assignment: Vec<(Target, u32)>,
) -> Flow {
    if let Some(attacker) = pass.current.take() {
        pass.assignments.extend(
            assignment
                .into_iter()
                .filter(|(_, amount)| *amount > 0)
                .map(|(target, amount)| (attacker, target, amount)),
        );
    }
    run_pass(game, cx, pass)
}

fn run_pass(game: &mut GameState, cx: &mut EngineContext, mut pass: DamagePass) -> Flow {
    let projection = Projection::compute(game, cx.registry);
    while let Some(attacker) = pass.remaining.pop_front() {
        if !deals_damage_in_pass(&projection, attacker, pass.first_strike) {
            continue;
        }
        let power = projection.power(attacker).unwrap_or(0);
        let Some(defending) = game.combat.defending_player(attacker) else { continue };
        if power <= 0 {
            continue;
        }
        let power = power as u32;
        let to_player = Target::Player(defending);
        if !game.combat.is_blocked(attacker) {
            pass.assignments.push((attacker, to_player, power));
            continue;
        }

        let blockers: Vec<EntityId> = game
            .combat
            .get_blockers(attacker)
            .into_iter()
            .filter(|b| projection.get(*b).is_some())
            .collect();
        let trample = projection.has_keyword(attacker, &Keyword::Trample);
        match (blockers.as_slice(), trample) {
            ([], true) => pass.assignments.push((attacker, to_player, power)),
            ([], false) => {}
            ([only], false) => pass.assignments.push((attacker, Target::Object(*only), power)),
            _ => {
                let Some(controller) = projection.controller(attacker) else { continue };
                let deathtouch = projection.has_keyword(attacker, &Keyword::Deathtouch);
                let order = blockers
                    .iter()
                    .map(|b| DamageRecipient {
                        blocker: *b,
                        lethal: lethal_damage(game, &projection, *b, deathtouch),
                    })
                    .collect();
                let kind = DecisionKind::AssignDamage {
                    attacker,
                    power,
                    order,
                    trample_to: trample.then_some(to_player),
                };
                let prompt = format!("Assign {} combat damage from {}", power, game.card_name(attacker));
                pass.current = Some(attacker);
                return continuation::ask(
                    game,
                    cx,
                    controller,
                    kind,
                    Some(attacker),
                    prompt,
                    Continuation::CombatDamage(pass),
                );
            }
        }
    }

    if pass.first_strike {
        game.combat.first_strike_dealt = true;
    } else {
        game.combat.regular_damage_dealt = true;
    }
    replacement::deal_damage_simultaneously(game, cx, pass.assignments, true);
    Flow::Continue
}

/// Damage that counts as lethal for a blocker: remaining toughness, 1 with deathtouch
fn lethal_damage(game: &GameState, projection: &Projection, blocker: EntityId, deathtouch: bool) -> u32 {
    if deathtouch {
        return 1;
    }
    let toughness = projection.toughness(blocker).unwrap_or(0);
    let marked = game.entity(blocker).map(|e| e.damage()).unwrap_or(0) as i32;
    (toughness - marked).max(1) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::core::{CardData, Color, InMemoryRegistry};
    use crate::game::decision::DecisionResponse;
    use crate::game::logger::GameLogger;
    use crate::zones::Zone;

    fn setup(step: Step) -> (GameState, PlayerId, PlayerId) {
        let mut game = GameState::new_two_player("Alice", "Bob", GameConfig::default());
        game.turn.current_step = step;
        let p1 = game.players[0].id;
        let p2 = game.players[1].id;
        (game, p1, p2)
    }

    fn creature(game: &mut GameState, owner: PlayerId, card: CardData) -> EntityId {
        let id = game.create_card(owner, card, Zone::Battlefield);
        game.entity_mut(id).unwrap().remove::<SummoningSickness>();
        id
    }

    fn answer(game: &mut GameState, cx: &mut EngineContext, response: DecisionResponse) -> Flow {
        let decision = game.pending_decision.take().unwrap();
        decision.validate(&response).unwrap();
        let frame = game.continuations.pop().unwrap();
        continuation::resume(game, cx, frame, response).unwrap()
    }

    #[test]
    fn test_attacking_taps_unless_vigilance() {
        let (mut game, p1, p2) = setup(Step::DeclareAttackers);
        let registry = InMemoryRegistry::new();
        let logger = GameLogger::new();
        let mut cx = EngineContext::new(&registry, &logger);
        let bears = creature(&mut game, p1, CardData::creature("Grizzly Bears", "1G", 2, 2));
        let knight = creature(
            &mut game,
            p1,
            CardData::creature("Vigilant Knight", "1W", 2, 2).with_keyword(Keyword::Vigilance),
        );

        declare_attackers(&mut game, &mut cx, p1, &[(bears, p2), (knight, p2)]).unwrap();
        assert!(game.entity(bears).unwrap().is_tapped());
        assert!(!game.entity(knight).unwrap().is_tapped());
        assert!(game.combat.is_attacking(knight));
        assert!(game.combat.attackers_declared);
    }

    #[test]
    fn test_summoning_sick_creature_cannot_attack() {
        let (mut game, p1, p2) = setup(Step::DeclareAttackers);
        let registry = InMemoryRegistry::new();
        let fresh = game.create_card(p1, CardData::creature("Grizzly Bears", "1G", 2, 2), Zone::Battlefield);
        let hasty = game.create_card(
            p1,
            CardData::creature("Raging Goblin", "R", 1, 1).with_keyword(Keyword::Haste),
            Zone::Battlefield,
        );
        assert!(validate_attackers(&game, &registry, p1, &[(fresh, p2)]).is_err());
        assert!(validate_attackers(&game, &registry, p1, &[(hasty, p2)]).is_ok());
        assert_eq!(possible_attackers(&game, &registry), vec![hasty]);
    }

    #[test]
    fn test_flying_needs_flying_or_reach() {
        let (mut game, p1, p2) = setup(Step::DeclareBlockers);
        let registry = InMemoryRegistry::new();
        let bird = creature(&mut game, p1, CardData::creature("Birds", "U", 1, 1).with_keyword(Keyword::Flying));
        let bears = creature(&mut game, p2, CardData::creature("Grizzly Bears", "1G", 2, 2));
        let spider = creature(&mut game, p2, CardData::creature("Spider", "1G", 1, 3).with_keyword(Keyword::Reach));
        game.combat.declare_attacker(bird, p2);

        assert!(validate_blockers(&game, &registry, p2, &[(bears, bird)]).is_err());
        assert!(validate_blockers(&game, &registry, p2, &[(spider, bird)]).is_ok());
        assert_eq!(possible_blocks(&game, &registry, p2), vec![(spider, bird)]);
    }

    #[test]
    fn test_menace_needs_two_blockers() {
        let (mut game, p1, p2) = setup(Step::DeclareBlockers);
        let registry = InMemoryRegistry::new();
        let brute = creature(&mut game, p1, CardData::creature("Brute", "2R", 3, 3).with_keyword(Keyword::Menace));
        let a = creature(&mut game, p2, CardData::creature("Grizzly Bears", "1G", 2, 2));
        let b = creature(&mut game, p2, CardData::creature("Elves", "G", 1, 1));
        game.combat.declare_attacker(brute, p2);

        assert!(validate_blockers(&game, &registry, p2, &[(a, brute)]).is_err());
        assert!(validate_blockers(&game, &registry, p2, &[(a, brute), (b, brute)]).is_ok());
    }

    #[test]
    fn test_protection_prevents_block() {
        let (mut game, p1, p2) = setup(Step::DeclareBlockers);
        let registry = InMemoryRegistry::new();
        let knight = creature(
            &mut game,
            p1,
            CardData::creature("White Knight", "WW", 2, 2).with_keyword(Keyword::Protection(Color::Black)),
        );
        let zombie = creature(&mut game, p2, CardData::creature("Zombie", "1B", 2, 2));
        game.combat.declare_attacker(knight, p2);
        assert!(validate_blockers(&game, &registry, p2, &[(zombie, knight)]).is_err());
    }

    #[test]
    fn test_unblocked_attacker_hits_player() {
        let (mut game, p1, p2) = setup(Step::CombatDamage);
        let registry = InMemoryRegistry::new();
        let logger = GameLogger::new();
        let mut cx = EngineContext::new(&registry, &logger);
        let giant = creature(&mut game, p1, CardData::creature("Hill Giant", "3R", 3, 3));
        game.combat.declare_attacker(giant, p2);

        assert_eq!(begin_combat_damage(&mut game, &mut cx), Flow::Continue);
        assert_eq!(game.player(p2).unwrap().life, 17);
        assert!(game.combat.regular_damage_dealt);
    }

    #[test]
    fn test_single_blocker_takes_all_and_strikes_back() {
        let (mut game, p1, p2) = setup(Step::CombatDamage);
        let registry = InMemoryRegistry::new();
        let logger = GameLogger::new();
        let mut cx = EngineContext::new(&registry, &logger);
        let giant = creature(&mut game, p1, CardData::creature("Hill Giant", "3R", 3, 3));
        let bears = creature(&mut game, p2, CardData::creature("Grizzly Bears", "1G", 2, 2));
        game.combat.declare_attacker(giant, p2);
        game.combat.declare_blocker(bears, giant);

        assert_eq!(begin_combat_damage(&mut game, &mut cx), Flow::Continue);
        assert_eq!(game.entity(bears).unwrap().damage(), 3);
        assert_eq!(game.entity(giant).unwrap().damage(), 2);
        assert_eq!(game.player(p2).unwrap().life, 20);
    }

    #[test]
    fn test_first_strike_pass_comes_first() {
        let (mut game, p1, p2) = setup(Step::CombatDamage);
        let registry = InMemoryRegistry::new();
        let logger = GameLogger::new();
        let mut cx = EngineContext::new(&registry, &logger);
        let knight = creature(
            &mut game,
            p1,
            CardData::creature("Striker", "1W", 2, 2).with_keyword(Keyword::FirstStrike),
        );
        let bears = creature(&mut game, p2, CardData::creature("Grizzly Bears", "1G", 2, 2));
        game.combat.declare_attacker(knight, p2);
        game.combat.declare_blocker(bears, knight);

        assert_eq!(begin_combat_damage(&mut game, &mut cx), Flow::Continue);
        assert_eq!(game.entity(bears).unwrap().damage(), 2);
        assert_eq!(game.entity(knight).unwrap().damage(), 0);
        assert!(regular_pass_pending(&game));

        // the bears die before the regular pass
        game.move_entity(bears, Zone::Graveyard);
        assert_eq!(start_damage_pass(&mut game, &mut cx, false), Flow::Continue);
        assert_eq!(game.entity(knight).unwrap().damage(), 0);
        assert!(!regular_pass_pending(&game));
    }

    #[test]
    fn test_double_block_orders_then_assigns() {
        let (mut game, p1, p2) = setup(Step::DeclareBlockers);
        let registry = InMemoryRegistry::new();
        let logger = GameLogger::new();
        let mut cx = EngineContext::new(&registry, &logger);
        let giant = creature(&mut game, p1, CardData::creature("Craw Giant", "3GG", 5, 5));
        let a = creature(&mut game, p2, CardData::creature("Grizzly Bears", "1G", 2, 2));
        let b = creature(&mut game, p2, CardData::creature("Elves", "G", 1, 1));
        game.combat.declare_attacker(giant, p2);

        let flow = declare_blockers(&mut game, &mut cx, p2, &[(a, giant), (b, giant)]).unwrap();
        assert!(flow.is_paused());
        assert!(matches!(
            game.pending_decision.as_ref().unwrap().kind,
            DecisionKind::OrderObjects { .. }
        ));
        let flow = answer(&mut game, &mut cx, DecisionResponse::Order(vec![b.as_u32() as u64, a.as_u32() as u64]));
        assert_eq!(flow, Flow::Continue);
        assert_eq!(game.combat.get_blockers(giant).as_slice(), &[b, a]);

        game.turn.current_step = Step::CombatDamage;
        assert!(begin_combat_damage(&mut game, &mut cx).is_paused());
        match &game.pending_decision.as_ref().unwrap().kind {
            DecisionKind::AssignDamage { power, order, trample_to, .. } => {
                assert_eq!(*power, 5);
                assert_eq!(order.iter().map(|r| r.blocker).collect::<Vec<_>>(), vec![b, a]);
                assert!(trample_to.is_none());
            }
            other => panic!("unexpected decision {:?}", other),
        }
        let flow = answer(
            &mut game,
            &mut cx,
            DecisionResponse::DamageAssignment(vec![(Target::Object(b), 1), (Target::Object(a), 4)]),
        );
        assert_eq!(flow, Flow::Continue);
        assert_eq!(game.entity(b).unwrap().damage(), 1);
        assert_eq!(game.entity(a).unwrap().damage(), 4);
        assert_eq!(game.entity(giant).unwrap().damage(), 3);
    }

    #[test]
    fn test_trample_assignment_must_be_lethal_first() {
        let (mut game, p1, p2) = setup(Step::CombatDamage);
        let registry = InMemoryRegistry::new();
        let logger = GameLogger::new();
        let mut cx = EngineContext::new(&registry, &logger);
        let wurm = creature(
            &mut game,
            p1,
            CardData::creature("Wurm", "4GG", 6, 6).with_keyword(Keyword::Trample),
        );
        let bears = creature(&mut game, p2, CardData::creature("Grizzly Bears", "1G", 2, 2));
        game.combat.declare_attacker(wurm, p2);
        game.combat.declare_blocker(bears, wurm);

        assert!(begin_combat_damage(&mut game, &mut cx).is_paused());
        let decision = game.pending_decision.clone().unwrap();
        let greedy = DecisionResponse::DamageAssignment(vec![(Target::Object(bears), 1), (Target::Player(p2), 5)]);
        assert!(decision.validate(&greedy).is_err());

        let flow = answer(
            &mut game,
            &mut cx,
            DecisionResponse::DamageAssignment(vec![(Target::Object(bears), 2), (Target::Player(p2), 4)]),
        );
        assert_eq!(flow, Flow::Continue);
        assert_eq!(game.player(p2).unwrap().life, 16);
    }

    #[test]
    fn test_blocked_attacker_stays_blocked() {
        let (mut game, p1, p2) = setup(Step::CombatDamage);
        let registry = InMemoryRegistry::new();
        let logger = GameLogger::new();
        let mut cx = EngineContext::new(&registry, &logger);
        let giant = creature(&mut game, p1, CardData::creature("Hill Giant", "3R", 3, 3));
        let bears = creature(&mut game, p2, CardData::creature("Grizzly Bears", "1G", 2, 2));
        game.combat.declare_attacker(giant, p2);
        game.combat.declare_blocker(bears, giant);
        game.move_entity(bears, Zone::Graveyard);

        assert_eq!(begin_combat_damage(&mut game, &mut cx), Flow::Continue);
        assert!(game.combat.is_blocked(giant));
        assert_eq!(game.player(p2).unwrap().life, 20);
    }

    #[test]
    fn test_remove_player_drops_their_attackers() {
        let mut combat = CombatState::new();
        let p2 = PlayerId::new(1);
        let p3 = PlayerId::new(2);
        combat.declare_attacker(EntityId::new(1), p2);
        combat.declare_attacker(EntityId::new(2), p3);
        combat.remove_player(p2);
        assert!(!combat.is_attacking(EntityId::new(1)));
        assert!(combat.is_attacking(EntityId::new(2)));
    }
}
