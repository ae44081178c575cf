//! Performance benchmarks for the rules core
//!
//! Measures the three hot paths every action goes through:
//!
//! 1. **Projection** - folding static abilities into effective characteristics
//! 2. **SBA fixpoint** - state-based actions on a board with pending deaths
//! 3. **Mana solver** - choosing sources for colored and generic costs

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mtg_rules_engine::core::{
    CardData, CardScript, Color, InMemoryRegistry, ManaAbility, ManaCost, ManaProductionKind, Modification,
    ObjectFilter, StaticAbility, StaticTarget, SummoningSickness,
};
use mtg_rules_engine::game::mana_payment::{ManaPaymentResolver, ManaSolver, ManaSource, SourceTier};
use mtg_rules_engine::game::{sba, EngineContext, GameLogger, GameState, Projection};
use mtg_rules_engine::zones::Zone;
use mtg_rules_engine::GameConfig;

fn registry() -> InMemoryRegistry {
    let mut registry = InMemoryRegistry::new();
    registry.register(CardScript::with_card(CardData::enchantment("Glorious Anthem", "1WW")).with_static(
        StaticAbility::new(
            StaticTarget::Matching(ObjectFilter::creature().you_control()),
            Modification::ModifyPowerToughness(1, 1),
        ),
    ));
    registry.register(CardScript::with_card(CardData::creature("Grizzly Bears", "1G", 2, 2)));
    registry
}

/// Two players, `creatures` bears each and one anthem per player
fn board(creatures: usize) -> GameState {
    let mut game = GameState::new_two_player("Alice", "Bob", GameConfig::default().without_mulligans());
    for player in game.player_ids() {
        game.create_card(player, CardData::enchantment("Glorious Anthem", "1WW"), Zone::Battlefield);
        for _ in 0..creatures {
            let id = game.create_card(player, CardData::creature("Grizzly Bears", "1G", 2, 2), Zone::Battlefield);
            if let Some(entity) = game.entity_mut(id) {
                entity.remove::<SummoningSickness>();
            }
        }
    }
    game
}

fn bench_projection(c: &mut Criterion) {
    let registry = registry();
    let mut group = c.benchmark_group("projection");
    for creatures in [10, 50, 200] {
        let game = board(creatures);
        group.bench_with_input(BenchmarkId::from_parameter(creatures), &game, |b, game| {
            b.iter(|| black_box(Projection::compute(game, &registry)))
        });
    }
    group.finish();
}

fn bench_sba_fixpoint(c: &mut Criterion) {
    let registry = registry();
    let logger = GameLogger::with_verbosity(mtg_rules_engine::game::VerbosityLevel::Silent);
    let mut group = c.benchmark_group("sba_fixpoint");
    for creatures in [10, 50, 200] {
        let mut game = board(creatures);
        // Half of each board has lethal damage marked
        for (i, id) in game.battlefield_ids().into_iter().enumerate() {
            if i % 2 == 0 {
                if let Some(entity) = game.entity_mut(id) {
                    entity.insert(mtg_rules_engine::core::DamageMarked { amount: 5, deathtouch: false });
                }
            }
        }
        group.bench_with_input(BenchmarkId::from_parameter(creatures), &game, |b, game| {
            b.iter(|| {
                let mut game = game.clone();
                let mut cx = EngineContext::new(&registry, &logger);
                black_box(sba::check_and_apply(&mut game, &mut cx))
            })
        });
    }
    group.finish();
}

fn bench_mana_solver(c: &mut Criterion) {
    let mut sources = Vec::new();
    let mut next = 1u32;
    let mut add = |produces: ManaProductionKind, tier: SourceTier, sources: &mut Vec<ManaSource>| {
        sources.push(ManaSource::new(mtg_rules_engine::core::EntityId::new(next), produces, tier));
        next += 1;
    };
    for color in [Color::White, Color::Blue, Color::Green] {
        for _ in 0..3 {
            add(ManaProductionKind::Fixed(color), SourceTier::Basic, &mut sources);
        }
    }
    add(ManaProductionKind::Choice(vec![Color::White, Color::Blue]), SourceTier::SinglePurpose, &mut sources);
    add(ManaProductionKind::Choice(vec![Color::Blue, Color::Green]), SourceTier::SinglePurpose, &mut sources);
    add(ManaProductionKind::AnyColor, SourceTier::Flexible, &mut sources);

    let solver = ManaSolver::new().with_hand_demand(&[Color::Blue, Color::Blue, Color::Green]);
    let mut group = c.benchmark_group("mana_solver");
    for cost in ["G", "2WU", "4WUG", "1WWUUGG"] {
        let parsed = ManaCost::from_string(cost);
        group.bench_with_input(BenchmarkId::from_parameter(cost), &parsed, |b, parsed| {
            b.iter(|| black_box(solver.check_payment(parsed, &sources)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_projection, bench_sba_fixpoint, bench_mana_solver);
criterion_main!(benches);
