//! End-to-end scenarios driven through the public engine API

use mtg_rules_engine::core::{
    Amount, CardData, CardScript, Color, Effect, EffectTarget, EntityId, EventMatcher, InMemoryRegistry, Keyword,
    ManaAbility, ManaCost, ManaPool, ManaProductionKind, ObjectFilter, PlayerId, PlayerRef, ReplacementAbility,
    ReplacementAction, SummoningSickness, Target, TargetKind, TargetRequirement,
};
use mtg_rules_engine::game::decision::DecisionResponse;
use mtg_rules_engine::game::mana_engine::ManaEngine;
use mtg_rules_engine::game::{
    sba, Action, EngineContext, GameEvent, GameLogger, GameSnapshot, GameState, Payment, Projection, RulesEngine,
    Step,
};
use mtg_rules_engine::zones::Zone;
use mtg_rules_engine::GameConfig;
use similar_asserts::assert_eq;

fn registry() -> InMemoryRegistry {
    let mut registry = InMemoryRegistry::new();
    registry.register(
        CardScript::with_card(CardData::basic_land("Mountain"))
            .with_mana_ability(ManaAbility::new(ManaProductionKind::Fixed(Color::Red))),
    );
    registry.register(
        CardScript::with_card(CardData::basic_land("Island"))
            .with_mana_ability(ManaAbility::new(ManaProductionKind::Fixed(Color::Blue))),
    );
    registry.register(
        CardScript::with_card(CardData::basic_land("Forest"))
            .with_mana_ability(ManaAbility::new(ManaProductionKind::Fixed(Color::Green))),
    );
    registry.register(
        CardScript::with_card(CardData::land("Savannah"))
            .with_mana_ability(ManaAbility::new(ManaProductionKind::Choice(vec![Color::Green, Color::White]))),
    );
    registry.register(
        CardScript::with_card(CardData::creature("Llanowar Elves", "G", 1, 1))
            .with_mana_ability(ManaAbility::new(ManaProductionKind::Fixed(Color::Green))),
    );
    registry.register(CardScript::with_card(CardData::instant("Lightning Bolt", "R")).spell(
        Effect::damage(3, EffectTarget::Targets(0)),
        vec![TargetRequirement::single(TargetKind::AnyTarget)],
    ));
    registry.register(CardScript::with_card(CardData::sorcery("Soul Drain", "R")).spell(
        Effect::LoseLife { amount: Amount::Fixed(17), player: PlayerRef::Targets(0) },
        vec![TargetRequirement::single(TargetKind::Player(Default::default()))],
    ));
    registry.register(CardScript::with_card(CardData::instant("Forked Bolt", "R")).spell(
        Effect::damage(1, EffectTarget::Targets(0)),
        vec![TargetRequirement::exactly(TargetKind::AnyTarget, 2)],
    ));
    registry.register(CardScript::with_card(CardData::instant("Unsummon", "U")).spell(
        Effect::ReturnToHand { what: EffectTarget::Targets(0) },
        vec![TargetRequirement::single(TargetKind::Permanent(ObjectFilter::creature()))],
    ));
    registry.register(CardScript::with_card(CardData::sorcery("Careful Study", "U")).spell(
        Effect::MayDo { prompt: "Draw a card?".to_string(), effect: Box::new(Effect::draw(1)) },
        Vec::new(),
    ));
    registry.register(CardScript::with_card(CardData::enchantment("Font of Insight", "2U")).with_replacement(
        ReplacementAbility { matcher: EventMatcher::YouWouldDraw, action: ReplacementAction::DrawTwoInstead },
    ));
    registry.register(CardScript::with_card(CardData::sorcery("Blaze", "XR")).spell(
        Effect::DealDamage { amount: Amount::X, to: EffectTarget::Targets(0) },
        vec![TargetRequirement::single(TargetKind::AnyTarget)],
    ));
    registry.register(CardScript::with_card(CardData::creature("Grizzly Bears", "1G", 2, 2)));
    registry
}

fn main_phase_game() -> (GameState, PlayerId, PlayerId) {
    let mut game = GameState::new_two_player("Alice", "Bob", GameConfig::default().without_mulligans());
    let p1 = game.players[0].id;
    let p2 = game.players[1].id;
    for _ in 0..10 {
        game.create_card(p1, CardData::basic_land("Island"), Zone::Library);
        game.create_card(p2, CardData::basic_land("Island"), Zone::Library);
    }
    game.turn.current_step = Step::Main1;
    game.turn.give_priority(p1);
    (game, p1, p2)
}

fn battlefield_land(game: &mut GameState, player: PlayerId, name: &str) -> EntityId {
    let id = game.create_card(player, CardData::basic_land(name), Zone::Battlefield);
    game.entity_mut(id).unwrap().remove::<SummoningSickness>();
    id
}

fn ready_creature(game: &mut GameState, player: PlayerId, card: CardData) -> EntityId {
    let id = game.create_card(player, card, Zone::Battlefield);
    game.entity_mut(id).unwrap().remove::<SummoningSickness>();
    id
}

fn cast(player: PlayerId, card: EntityId, targets: Vec<Vec<Target>>) -> Action {
    Action::CastSpell { player, card, targets, x_value: 0, payment: Payment::Auto }
}

fn execute(engine: &RulesEngine, game: &GameState, action: Action) -> GameState {
    let result = engine.execute(game, &action);
    assert!(result.is_ok(), "{} rejected: {:?}", action.name(), result.error);
    result.state
}

/// Everyone passes once, starting with the current priority holder
fn pass_round(engine: &RulesEngine, game: &GameState) -> GameState {
    let mut state = game.clone();
    for _ in 0..state.players.len() {
        let Some(player) = state.turn.priority_player else { break };
        state = execute(engine, &state, Action::PassPriority { player });
    }
    state
}

#[test]
fn bolt_then_lethal_life_loss_ends_the_game() {
    let (mut game, p1, p2) = main_phase_game();
    let registry = registry();
    let engine = RulesEngine::new(&registry);
    battlefield_land(&mut game, p1, "Mountain");
    battlefield_land(&mut game, p1, "Mountain");
    let bolt = game.create_card(p1, CardData::instant("Lightning Bolt", "R"), Zone::Hand);
    let drain = game.create_card(p1, CardData::sorcery("Soul Drain", "R"), Zone::Hand);

    assert_eq!(game.player(p1).unwrap().life, 20);
    assert_eq!(game.player(p2).unwrap().life, 20);

    let game = execute(&engine, &game, cast(p1, bolt, vec![vec![Target::Player(p2)]]));
    let game = pass_round(&engine, &game);
    assert_eq!(game.player(p2).unwrap().life, 17);
    assert!(!game.game_over);

    let game = execute(&engine, &game, cast(p1, drain, vec![vec![Target::Player(p2)]]));
    let game = pass_round(&engine, &game);
    assert_eq!(game.player(p2).unwrap().life, 0);
    assert!(game.game_over);
    assert_eq!(game.winner, Some(p1));
    assert!(game.player(p2).unwrap().has_lost);
}

#[test]
fn stack_resolves_last_in_first_out() {
    let (mut game, p1, p2) = main_phase_game();
    let registry = registry();
    let engine = RulesEngine::new(&registry);
    battlefield_land(&mut game, p1, "Mountain");
    battlefield_land(&mut game, p1, "Mountain");
    let first = game.create_card(p1, CardData::instant("Lightning Bolt", "R"), Zone::Hand);
    let second = game.create_card(p1, CardData::instant("Lightning Bolt", "R"), Zone::Hand);

    let game = execute(&engine, &game, cast(p1, first, vec![vec![Target::Player(p2)]]));
    let game = execute(&engine, &game, cast(p1, second, vec![vec![Target::Player(p2)]]));

    let result = engine.execute(&game, &Action::PassPriority { player: p1 });
    let result = engine.execute(&result.state, &Action::PassPriority { player: p2 });
    assert!(result.events.contains(&GameEvent::Resolved { id: second }));
    assert!(!result.events.contains(&GameEvent::Resolved { id: first }));
    assert_eq!(result.state.zone_of(first), Some(Zone::Stack));

    let game = pass_round(&engine, &result.state);
    assert!(game.stack.is_empty());
    assert_eq!(game.player(p2).unwrap().life, 14);
}

#[test]
fn partial_fizzle_hits_only_the_remaining_target() {
    let (mut game, p1, p2) = main_phase_game();
    let registry = registry();
    let engine = RulesEngine::new(&registry);
    battlefield_land(&mut game, p1, "Mountain");
    battlefield_land(&mut game, p1, "Island");
    let bears = ready_creature(&mut game, p2, CardData::creature("Grizzly Bears", "1G", 2, 2));
    let fork = game.create_card(p1, CardData::instant("Forked Bolt", "R"), Zone::Hand);
    let unsummon = game.create_card(p1, CardData::instant("Unsummon", "U"), Zone::Hand);

    let game = execute(&engine, &game, cast(p1, fork, vec![vec![Target::Object(bears), Target::Player(p2)]]));
    let game = execute(&engine, &game, cast(p1, unsummon, vec![vec![Target::Object(bears)]]));
    let game = pass_round(&engine, &game);
    assert_eq!(game.zone_of(bears), Some(Zone::Hand));

    let game = pass_round(&engine, &game);
    assert_eq!(game.player(p2).unwrap().life, 19);
    assert_eq!(game.zone_of(fork), Some(Zone::Graveyard));
    assert!(game.stack.is_empty());
}

#[test]
fn single_target_spell_fizzles_without_effect() {
    let (mut game, p1, p2) = main_phase_game();
    let registry = registry();
    let engine = RulesEngine::new(&registry);
    battlefield_land(&mut game, p1, "Mountain");
    battlefield_land(&mut game, p1, "Island");
    let bears = ready_creature(&mut game, p2, CardData::creature("Grizzly Bears", "1G", 2, 2));
    let bolt = game.create_card(p1, CardData::instant("Lightning Bolt", "R"), Zone::Hand);
    let unsummon = game.create_card(p1, CardData::instant("Unsummon", "U"), Zone::Hand);

    let game = execute(&engine, &game, cast(p1, bolt, vec![vec![Target::Object(bears)]]));
    let game = execute(&engine, &game, cast(p1, unsummon, vec![vec![Target::Object(bears)]]));
    let game = pass_round(&engine, &game);

    let result = engine.execute(&game, &Action::PassPriority { player: p1 });
    let result = engine.execute(&result.state, &Action::PassPriority { player: p2 });
    assert!(result.events.contains(&GameEvent::Fizzled { id: bolt }));
    assert_eq!(result.state.zone_of(bolt), Some(Zone::Graveyard));
    assert_eq!(result.state.player(p2).unwrap().life, 20);
}

#[test]
fn bounced_token_ceases_to_exist() {
    let (mut game, p1, p2) = main_phase_game();
    let registry = registry();
    let engine = RulesEngine::new(&registry);
    battlefield_land(&mut game, p1, "Island");
    let token = game.create_token(p2, CardData::creature("Goblin", "", 1, 1));
    let unsummon = game.create_card(p1, CardData::instant("Unsummon", "U"), Zone::Hand);

    let game = execute(&engine, &game, cast(p1, unsummon, vec![vec![Target::Object(token)]]));
    let game = pass_round(&engine, &game);
    assert!(game.entity(token).is_none());
    assert_eq!(game.zone_of(token), None);
    assert!(game.hand(p2).is_empty());
}

#[test]
fn legend_rule_leaves_one_copy() {
    let (mut game, p1, p2) = main_phase_game();
    let registry = registry();
    let engine = RulesEngine::new(&registry);
    let legend = CardData::creature("Isamaru, Hound of Konda", "W", 2, 2).legendary();
    game.create_card(p1, legend.clone(), Zone::Battlefield);
    game.create_card(p1, legend.clone(), Zone::Battlefield);
    game.create_card(p2, legend, Zone::Battlefield);

    let game = execute(&engine, &game, Action::PassPriority { player: p1 });
    let copies = |player: PlayerId| {
        game.battlefield_ids()
            .into_iter()
            .filter(|id| game.controller_of(*id) == Some(player))
            .filter(|id| game.card_name(*id) == "Isamaru, Hound of Konda")
            .count()
    };
    assert_eq!(copies(p1), 1);
    assert_eq!(copies(p2), 1);
}

#[test]
fn state_based_actions_reach_a_fixpoint() {
    let (mut game, p1, p2) = main_phase_game();
    let registry = registry();
    let logger = GameLogger::new();
    let mut cx = EngineContext::new(&registry, &logger);
    game.create_card(p1, CardData::creature("Wall of Nothing", "", 0, 0), Zone::Battlefield);
    let token = game.create_token(p1, CardData::creature("Goblin", "", 1, 1));
    game.move_entity(token, Zone::Graveyard);
    game.player_mut(p2).unwrap().life = 0;

    assert!(sba::check_and_apply(&mut game, &mut cx) > 0);
    assert!(game.game_over);
    let settled = game.clone();
    let events = cx.events.len();

    assert_eq!(sba::check_and_apply(&mut game, &mut cx), 0);
    assert_eq!(cx.events.len(), events);
    assert_eq!(game, settled);
}

#[test]
fn solver_taps_basic_before_dual() {
    let (mut game, p1, _) = main_phase_game();
    let registry = registry();
    let logger = GameLogger::new();
    let cx = EngineContext::new(&registry, &logger);
    let dual = game.create_card(p1, CardData::land("Savannah"), Zone::Battlefield);
    let forest = battlefield_land(&mut game, p1, "Forest");
    game.entity_mut(dual).unwrap().remove::<SummoningSickness>();

    let projection = Projection::compute(&game, &registry);
    let mut mana = ManaEngine::new(p1);
    mana.update(&game, &projection, &cx, None);
    let plan = mana.plan(&ManaCost::from_string("G")).unwrap();
    assert_eq!(plan.len(), 1);
    assert_eq!(plan[0].source, forest);
}

#[test]
fn solver_skips_summoning_sick_mana_creature() {
    let (mut game, p1, _) = main_phase_game();
    let registry = registry();
    let logger = GameLogger::new();
    let cx = EngineContext::new(&registry, &logger);
    let elves = game.create_card(p1, CardData::creature("Llanowar Elves", "G", 1, 1), Zone::Battlefield);
    let cost = ManaCost::from_string("G");

    let mut mana = ManaEngine::new(p1);
    mana.update(&game, &Projection::compute(&game, &registry), &cx, None);
    assert!(!mana.can_pay(&cost));

    game.entity_mut(elves).unwrap().remove::<SummoningSickness>();
    mana.update(&game, &Projection::compute(&game, &registry), &cx, None);
    assert!(mana.can_pay(&cost));
}

#[test]
fn hasty_mana_creature_can_pay_immediately() {
    let (mut game, p1, _) = main_phase_game();
    let registry = registry();
    let logger = GameLogger::new();
    let cx = EngineContext::new(&registry, &logger);
    game.create_card(
        p1,
        CardData::creature("Llanowar Elves", "G", 1, 1).with_keyword(Keyword::Haste),
        Zone::Battlefield,
    );
    let mut mana = ManaEngine::new(p1);
    mana.update(&game, &Projection::compute(&game, &registry), &cx, None);
    assert!(mana.can_pay(&ManaCost::from_string("G")));
}

#[test]
fn draw_replacement_applies_once_per_draw() {
    let (mut game, p1, _) = main_phase_game();
    let registry = registry();
    let engine = RulesEngine::new(&registry);
    game.create_card(p1, CardData::enchantment("Font of Insight", "2U"), Zone::Battlefield);
    game.turn.turn_number = 2;
    game.turn.current_step = Step::Upkeep;
    game.turn.give_priority(p1);

    let game = pass_round(&engine, &game);
    assert_eq!(game.turn.current_step, Step::Draw);
    assert_eq!(game.hand(p1).len(), 2);
    assert_eq!(game.library_size(p1), 8);
}

#[test]
fn unblocked_attacker_deals_combat_damage() {
    let (mut game, p1, p2) = main_phase_game();
    let registry = registry();
    let engine = RulesEngine::new(&registry);
    let bears = ready_creature(&mut game, p1, CardData::creature("Grizzly Bears", "1G", 2, 2));

    let game = pass_round(&engine, &game);
    assert_eq!(game.turn.current_step, Step::BeginCombat);
    let game = pass_round(&engine, &game);
    assert_eq!(game.turn.current_step, Step::DeclareAttackers);
    assert_eq!(game.turn.priority_player, None);
    assert_eq!(engine.legal_actions(&game, p2), vec![Action::Concede { player: p2 }]);

    let game = execute(&engine, &game, Action::DeclareAttackers { player: p1, attackers: vec![(bears, p2)] });
    assert!(game.combat.is_attacking(bears));
    assert_eq!(game.turn.priority_player, Some(p1));

    let game = pass_round(&engine, &game);
    assert_eq!(game.turn.current_step, Step::DeclareBlockers);
    let game = pass_round(&engine, &game);
    assert_eq!(game.turn.current_step, Step::CombatDamage);
    assert_eq!(game.player(p2).unwrap().life, 18);
}

#[test]
fn paused_decision_survives_a_snapshot() {
    let (mut game, p1, p2) = main_phase_game();
    let registry = registry();
    let engine = RulesEngine::new(&registry);
    battlefield_land(&mut game, p1, "Island");
    let study = game.create_card(p1, CardData::sorcery("Careful Study", "U"), Zone::Hand);

    let game = execute(&engine, &game, cast(p1, study, Vec::new()));
    let result = engine.execute(&game, &Action::PassPriority { player: p1 });
    let result = engine.execute(&result.state, &Action::PassPriority { player: p2 });
    assert!(result.is_paused());
    let decision = result.pending_decision.clone().unwrap();
    assert_eq!(decision.player, p1);
    assert_eq!(result.state.zone_of(study), Some(Zone::Graveyard));

    let json = GameSnapshot::new(result.state.clone()).to_json().unwrap();
    let reloaded = GameSnapshot::from_json(&json).unwrap().into_state();
    assert_eq!(reloaded, result.state);

    let wrong = Action::SubmitDecision {
        player: p1,
        decision_id: decision.id + 1,
        response: DecisionResponse::YesNo(true),
    };
    assert!(engine.execute(&reloaded, &wrong).error.is_some());

    let answer = Action::SubmitDecision { player: p1, decision_id: decision.id, response: DecisionResponse::YesNo(true) };
    let original = engine.execute(&result.state, &answer);
    let resumed = engine.execute(&reloaded, &answer);
    assert!(resumed.is_ok());
    assert_eq!(resumed.state, original.state);
    assert_eq!(resumed.state.hand(p1).len(), 1);
    assert!(resumed.state.pending_decision.is_none());
}

#[test]
fn oversized_x_is_rejected_before_payment() {
    let (mut game, p1, p2) = main_phase_game();
    let registry = registry();
    let engine = RulesEngine::new(&registry);
    let mountain = battlefield_land(&mut game, p1, "Mountain");
    let blaze = game.create_card(p1, CardData::sorcery("Blaze", "XR"), Zone::Hand);
    let at_p2 = vec![vec![Target::Player(p2)]];

    let action = Action::CastSpell {
        player: p1,
        card: blaze,
        targets: at_p2.clone(),
        x_value: 255,
        payment: Payment::Auto,
    };
    let result = engine.execute(&game, &action);
    assert!(result.error.is_some());
    assert_eq!(result.state, game);
    assert!(!result.state.entity(mountain).unwrap().is_tapped());

    game.player_mut(p1).unwrap().mana_pool = ManaPool { colorless: 255, red: 1, ..ManaPool::new() };
    let action = Action::CastSpell {
        player: p1,
        card: blaze,
        targets: at_p2,
        x_value: 1000,
        payment: Payment::Pool,
    };
    let result = engine.execute(&game, &action);
    assert!(result.error.is_some());
    assert_eq!(result.state.zone_of(blaze), Some(Zone::Hand));
    assert_eq!(result.state.player(p1).unwrap().mana_pool.total(), 256);
}

#[test]
fn x_paid_from_the_pool_is_the_x_that_resolves() {
    let (mut game, p1, p2) = main_phase_game();
    let registry = registry();
    let engine = RulesEngine::new(&registry);
    let blaze = game.create_card(p1, CardData::sorcery("Blaze", "XR"), Zone::Hand);
    game.player_mut(p1).unwrap().mana_pool = ManaPool { colorless: 5, red: 1, ..ManaPool::new() };

    let action = Action::CastSpell {
        player: p1,
        card: blaze,
        targets: vec![vec![Target::Player(p2)]],
        x_value: 6,
        payment: Payment::Pool,
    };
    assert!(engine.execute(&game, &action).error.is_some());

    let action = Action::CastSpell {
        player: p1,
        card: blaze,
        targets: vec![vec![Target::Player(p2)]],
        x_value: 5,
        payment: Payment::Pool,
    };
    let game = execute(&engine, &game, action);
    assert_eq!(game.player(p1).unwrap().mana_pool.total(), 0);
    let game = pass_round(&engine, &game);
    assert_eq!(game.player(p2).unwrap().life, 15);
}
