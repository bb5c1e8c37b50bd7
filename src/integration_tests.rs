//! Integration tests for the draw-odds estimator
//! Runs whole requests through the engine with known seeds and checks the
//! statistical and reproducibility guarantees.

use crate::card::{CardPredicate, Category, EffectCatalog, EffectDescriptor};
use crate::game::{ActiveEffect, Zone};
use crate::simulation::stats::prob_none;
use crate::simulation::{
    effects_for_cards, parse_deck_str, simulate_by_category, simulate_by_names, simulate_full_state,
    DeckEntry, DrawPlan, FullStateRequest, HitScope, MulliganRule, SimulationConfig, SimulationEngine,
    SimulationRequest, TargetCondition,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

fn lands_deck() -> Vec<DeckEntry> {
    vec![
        DeckEntry::new("Forest", Category::Land, 24),
        DeckEntry::new("Llanowar Elves", Category::Creature, 16),
        DeckEntry::new("Opt", Category::Instant, 20),
    ]
}

fn land_request(trials: u64, seed: u64) -> SimulationRequest {
    SimulationRequest::new(lands_deck(), TargetCondition::category(Category::Land))
        .with_trials(trials)
        .with_seed(seed)
}

fn engine_with(threads: Option<usize>, chunk_size: u64) -> SimulationEngine {
    SimulationEngine::new(SimulationConfig {
        threads,
        chunk_size,
        ..SimulationConfig::default()
    })
    .expect("Failed to build engine")
}

/// 1 - C(36,7) / C(60,7)
fn exact_land_probability() -> f64 {
    1.0 - prob_none(60, 24, 7)
}

#[test]
fn test_estimate_converges_to_exact_value() {
    let engine = SimulationEngine::default();
    let exact = exact_land_probability();
    let sigma = |n: u64| (exact * (1.0 - exact) / n as f64).sqrt();

    let mut previous_band = f64::INFINITY;
    for trials in [1_000u64, 10_000, 100_000] {
        let result = engine.run(&land_request(trials, 2024)).unwrap();
        let theory = result.theoretical_probability.expect("no effects: exact value available");
        assert!((theory - exact).abs() < 1e-12);

        let band = 4.0 * sigma(trials);
        let error = result.absolute_error.unwrap();
        assert!(
            error <= band,
            "{} trials: error {} outside band {}",
            trials,
            error,
            band
        );
        assert!(band < previous_band);
        previous_band = band;
    }
}

#[test]
fn test_sixty_card_deck_matches_hypergeometric() {
    let result = SimulationEngine::default().run(&land_request(20_000, 12345)).unwrap();
    let exact = exact_land_probability();
    assert!((exact - 0.978).abs() < 0.001);

    // 99% interval of the exact value for 20000 trials
    let half_width = 2.5758 * (exact * (1.0 - exact) / 20_000.0).sqrt();
    assert!(
        (result.probability - exact).abs() <= half_width,
        "estimate {} outside {} ± {}",
        result.probability,
        exact,
        half_width
    );
    assert_eq!(result.trials_run, 20_000);
}

#[test]
fn test_same_seed_is_identical_across_thread_counts() {
    let request = land_request(30_000, 777)
        .with_breakdown(true)
        .with_effect(ActiveEffect::new(EffectDescriptor::scry(2, CardPredicate::category(Category::Land))));

    let baseline = engine_with(Some(1), 4096).run(&request).unwrap();
    for (threads, chunk) in [(Some(2), 1000), (Some(4), 333), (None, 4096)] {
        let result = engine_with(threads, chunk).run(&request).unwrap();
        assert_eq!(result.hits, baseline.hits, "threads {:?}", threads);
        assert_eq!(result.probability.to_bits(), baseline.probability.to_bits());
        assert_eq!(result.per_name, baseline.per_name);
        assert_eq!(result.per_category, baseline.per_category);
    }

    let repeat = engine_with(Some(1), 4096).run(&request).unwrap();
    assert_eq!(repeat.hits, baseline.hits);
}

#[test]
fn test_different_seeds_produce_different_samples() {
    let engine = SimulationEngine::default();
    let a = engine.run(&land_request(5_000, 1).with_breakdown(true)).unwrap();
    let b = engine.run(&land_request(5_000, 2).with_breakdown(true)).unwrap();
    assert!(a.hits != b.hits || a.per_name != b.per_name);
}

#[test]
fn test_full_state_known_top_target_is_certain() {
    let mut request = FullStateRequest::new(lands_deck());
    request.known_top = vec!["Opt".to_string()];
    request.horizon = 3;
    request.trials = 2_000;
    request.seed = Some(5);

    let result = simulate_full_state(&SimulationEngine::default(), &request).unwrap();
    let opt = result.odds("Opt").unwrap();
    assert_eq!(opt.p_now, 1.0);
    assert!(opt.deterministic);
    assert_eq!(opt.copies_remaining, 21);

    let forest = result.odds("Forest").unwrap();
    assert!(!forest.deterministic);
    assert!(forest.p_now > 0.0 && forest.p_now < 1.0);
    assert_eq!(result.library_size, 61);
}

#[test]
fn test_tutor_fizzle_matches_baseline() {
    let engine = SimulationEngine::default();
    let baseline = engine.run(&land_request(10_000, 99)).unwrap();

    for shuffle in [false, true] {
        let tutor = EffectDescriptor::Tutor {
            predicate: CardPredicate::category(Category::Artifact),
            destination: Zone::Hand,
            shuffle,
        };
        let result = engine
            .run(&land_request(10_000, 99).with_effect(ActiveEffect::new(tutor)))
            .unwrap();
        assert_eq!(result.hits, baseline.hits);
        assert_eq!(result.fizzled_tutors, 10_000);
        assert_eq!(result.theoretical_probability, None);
    }
}

#[test]
fn test_scry_zero_matches_baseline() {
    let engine = SimulationEngine::default();
    let request = land_request(10_000, 4242).with_breakdown(true);
    let baseline = engine.run(&request).unwrap();
    let scry_zero = engine
        .run(&request.clone().with_effect(ActiveEffect::new(EffectDescriptor::scry(0, CardPredicate::Any))))
        .unwrap();
    assert_eq!(scry_zero.hits, baseline.hits);
    assert_eq!(scry_zero.per_name, baseline.per_name);
}

#[test]
fn test_scry_keeping_everything_preserves_distribution() {
    let exact = exact_land_probability();
    let result = SimulationEngine::default()
        .run(&land_request(20_000, 31).with_effect(ActiveEffect::new(EffectDescriptor::scry(3, CardPredicate::Any))))
        .unwrap();
    let band = 4.0 * (exact * (1.0 - exact) / 20_000.0).sqrt();
    assert!((result.probability - exact).abs() <= band);
}

#[test]
fn test_scry_for_lands_raises_land_odds() {
    let engine = SimulationEngine::default();
    let request = SimulationRequest::new(lands_deck(), TargetCondition::any_name(["Forest"]))
        .with_draw(DrawPlan::draws(1))
        .with_trials(20_000)
        .with_seed(8);
    let plain = engine.run(&request).unwrap();
    let scried = engine
        .run(&request.clone().with_effect(ActiveEffect::new(EffectDescriptor::scry(
            2,
            CardPredicate::category(Category::Land),
        ))))
        .unwrap();
    // A land is kept on top unless both scried cards are spells, in which
    // case both go to the bottom and the draw comes from the other 58
    let expected = 1.0 - (36.0 * 35.0) / (60.0 * 59.0) * (34.0 / 58.0);
    assert!((plain.probability - 0.4).abs() < 0.02);
    assert!((scried.probability - expected).abs() < 0.02);
}

#[test]
fn test_cancel_after_k_trials_reports_prefix() {
    let engine = engine_with(Some(2), 100);
    let token = engine.cancel_token();
    let calls = Arc::new(AtomicU64::new(0));
    let seen = Arc::clone(&calls);
    let engine = engine.with_progress(move |done, _total| {
        seen.fetch_add(1, Ordering::SeqCst);
        if done >= 300 {
            token.cancel();
        }
    });

    let cancelled = engine.run(&land_request(10_000, 55)).unwrap();
    assert!(cancelled.cancelled);
    assert_eq!(cancelled.trials_run, 300);
    assert_eq!(cancelled.trials_requested, 10_000);
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let fresh = engine_with(None, 4096).run(&land_request(300, 55)).unwrap();
    assert_eq!(cancelled.hits, fresh.hits);
    assert_eq!(cancelled.probability, fresh.probability);
    assert_eq!(cancelled.probability, cancelled.hits as f64 / 300.0);
}

#[test]
fn test_all_names_matches_inclusion_exclusion() {
    let request = SimulationRequest::new(lands_deck(), TargetCondition::all_names(["Forest", "Opt"]))
        .with_trials(20_000)
        .with_seed(64);
    let result = SimulationEngine::default().run(&request).unwrap();
    let theory = result.theoretical_probability.unwrap();
    let expected = 1.0 - prob_none(60, 24, 7) - prob_none(60, 20, 7) + prob_none(60, 44, 7);
    assert!((theory - expected).abs() < 1e-12);
    let band = 4.0 * (theory * (1.0 - theory) / 20_000.0).sqrt();
    assert!(result.absolute_error.unwrap() <= band);
}

#[test]
fn test_interface_functions() {
    let engine = SimulationEngine::default();
    let by_category = simulate_by_category(&engine, lands_deck(), Category::Land, 2_000, Some(3), vec![]).unwrap();
    assert_eq!(by_category.trials_run, 2_000);
    assert!(by_category.per_name.is_empty());

    let names = vec!["Opt".to_string(), "Llanowar Elves".to_string()];
    let by_names = simulate_by_names(&engine, lands_deck(), &names, 2_000, Some(3), vec![]).unwrap();
    assert!(by_names.probability >= by_names.per_name["Opt"]);
    assert!(by_names.probability >= by_names.per_name["Llanowar Elves"]);
    assert!(by_names.per_category.contains_key("creature"));

    assert!(simulate_by_names(&engine, lands_deck(), &[], 10, None, vec![]).is_err());
}

#[test]
fn test_mulligan_rule_improves_keepable_hands() {
    let engine = SimulationEngine::default();
    let keepable = TargetCondition::AtLeast {
        predicate: CardPredicate::category(Category::Land),
        count: 2,
    };
    let request = SimulationRequest::new(lands_deck(), keepable)
        .with_trials(10_000)
        .with_seed(11);
    let plain = engine.run(&request).unwrap();
    let with_mulligan = engine
        .run(&request.clone().with_draw(DrawPlan::opening_hand().with_mulligan(MulliganRule::default())))
        .unwrap();
    assert!(with_mulligan.mulligans > 0);
    assert!(with_mulligan.probability > plain.probability);
}

#[test]
fn test_deck_file_with_catalog_effects() {
    let catalog = EffectCatalog::from_json_str(
        r#"{
            "version": "2024-06",
            "cards": {
                "Opt": {"type_line": "Instant", "actions": [
                    {"action": "scry", "count": 1, "strategy": "keep_lands"},
                    {"action": "draw", "count": 1}
                ]},
                "Forest": {"type_line": "Basic Land - Forest", "actions": []}
            }
        }"#,
    )
    .unwrap();
    let deck = parse_deck_str("24 Forest\n35 Opt\n\n[hand]\nOpt\n", Some(&catalog)).unwrap();
    let effects = effects_for_cards(&catalog, &["Opt".to_string()]).unwrap();
    assert_eq!(effects.len(), 2);

    let request = deck
        .request(TargetCondition::category(Category::Land))
        .with_effects(effects)
        .with_effect_zones(vec![Zone::Hand])
        .with_draw(DrawPlan::draws(0))
        .with_trials(20_000)
        .with_seed(21);
    let result = SimulationEngine::default().run(&request).unwrap();

    // Scry 1 keeping lands then draw 1: the draw is a land unless the top
    // two cards were both spells
    let expected = 1.0 - (35.0 / 59.0) * (34.0 / 58.0);
    assert!((result.probability - expected).abs() < 0.02);
}

#[test]
fn test_revealed_known_top_counts_as_held_by_default() {
    let request = SimulationRequest::new(lands_deck(), TargetCondition::any_name(["Opt"]))
        .with_known_top(["Opt"])
        .with_draw(DrawPlan::draws(0))
        .with_trials(1_000)
        .with_seed(17);
    let engine = SimulationEngine::default();

    let revealed = engine.run(&request).unwrap();
    assert_eq!(revealed.probability, 1.0);

    let drawn_only = engine.run(&request.clone().with_scope(HitScope::Drawn)).unwrap();
    assert_eq!(drawn_only.probability, 0.0);
}

#[test]
fn test_topdeck_from_hand_sets_up_the_next_draw() {
    let mut deck = lands_deck();
    deck.push(DeckEntry::new("Island", Category::Land, 0));
    let request = SimulationRequest::new(deck, TargetCondition::any_name(["Opt"]))
        .with_hand(["Island"])
        .with_draw(DrawPlan::draws(1))
        .with_trials(10_000)
        .with_seed(23);
    let engine = SimulationEngine::default();

    let plain = engine.run(&request).unwrap();
    assert!((plain.probability - 20.0 / 60.0).abs() < 0.02);

    // The Island goes back on top and is drawn again
    let topdecked = engine
        .run(&request.clone().with_effect(ActiveEffect::new(EffectDescriptor::topdeck_from_hand(
            1,
            CardPredicate::Any,
        ))))
        .unwrap();
    assert_eq!(topdecked.probability, 0.0);
    assert_eq!(topdecked.hits, 0);
}
