use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mtg_draw_odds::card::{CardPredicate, Category, EffectDescriptor};
use mtg_draw_odds::game::ActiveEffect;
use mtg_draw_odds::simulation::engine::{run_chunk, SimulationEngine};
use mtg_draw_odds::simulation::{parse_deck_str, DeckEntry, SimulationRequest, TargetCondition};

fn deck() -> Vec<DeckEntry> {
    vec![
        DeckEntry::new("Forest", Category::Land, 24),
        DeckEntry::new("Llanowar Elves", Category::Creature, 16),
        DeckEntry::new("Opt", Category::Instant, 20),
    ]
}

fn benchmark_single_chunk(c: &mut Criterion) {
    let scenario = SimulationRequest::new(deck(), TargetCondition::category(Category::Land))
        .with_trials(4096)
        .prepare()
        .expect("Failed to prepare request");

    c.bench_function("chunk_4096_trials", |b| {
        b.iter(|| run_chunk(black_box(&scenario), black_box(12345), 0..4096))
    });
}

fn benchmark_effects(c: &mut Criterion) {
    let engine = SimulationEngine::default();
    let request = SimulationRequest::new(deck(), TargetCondition::any_name(["Llanowar Elves"]))
        .with_effect(ActiveEffect::new(EffectDescriptor::scry(2, CardPredicate::category(Category::Creature))))
        .with_effect(ActiveEffect::new(EffectDescriptor::tutor(
            CardPredicate::category(Category::Land),
            mtg_draw_odds::game::Zone::Battlefield,
        )))
        .with_trials(10_000)
        .with_seed(7);

    c.bench_function("10k_trials_scry_and_tutor", |b| {
        b.iter(|| engine.run(black_box(&request)))
    });
}

fn benchmark_deck_parsing(c: &mut Criterion) {
    let content = "24 Forest | land\n16 Llanowar Elves | creature\n20 Opt | instant\n[top]\nOpt\n";

    c.bench_function("parse_deck_str", |b| {
        b.iter(|| parse_deck_str(black_box(content), None))
    });
}

criterion_group!(benches, benchmark_single_chunk, benchmark_effects, benchmark_deck_parsing);
criterion_main!(benches);
