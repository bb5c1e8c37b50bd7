pub mod analyze;
pub mod deck;
pub mod engine;
pub mod error;
pub mod full_state;
pub mod mulligan;
pub mod request;
pub mod stats;

pub use analyze::{
    analyze_convergence, log_spaced_counts, measure_parallel_scaling, recommend_trial_count, ConvergencePoint,
    ScalingPoint, TrialRecommendation,
};
pub use deck::{parse_deck_file, parse_deck_str, DeckError, DeckFile};
pub use engine::{CancelToken, SimulationConfig, SimulationEngine};
pub use error::SimulationError;
pub use full_state::{simulate_full_state, CardOdds, FullStateRequest, FullStateResult};
pub use mulligan::MulliganRule;
pub use request::{DeckEntry, DrawPlan, HitScope, Scenario, SimulationRequest, TargetCondition};
pub use stats::{wilson_interval, ConfidenceInterval, SimulationResult};

use crate::card::{CatalogError, Category, EffectCatalog, EffectDescriptor};
use crate::game::ActiveEffect;

/// Probability of holding at least one card of `category` after the
/// opening hand
pub fn simulate_by_category(
    engine: &SimulationEngine,
    deck: Vec<DeckEntry>,
    category: Category,
    trials: u64,
    seed: Option<u64>,
    effects: Vec<ActiveEffect>,
) -> Result<SimulationResult, SimulationError> {
    let mut request = SimulationRequest::new(deck, TargetCondition::category(category))
        .with_trials(trials)
        .with_effects(effects);
    request.seed = seed;
    engine.run(&request)
}

/// Probability of holding any of `names` after the opening hand, with the
/// per-name breakdown
pub fn simulate_by_names(
    engine: &SimulationEngine,
    deck: Vec<DeckEntry>,
    names: &[String],
    trials: u64,
    seed: Option<u64>,
    effects: Vec<ActiveEffect>,
) -> Result<SimulationResult, SimulationError> {
    if names.is_empty() {
        return Err(SimulationError::malformed("no target names given"));
    }
    let mut request = SimulationRequest::new(deck, TargetCondition::any_name(names.iter().cloned()))
        .with_trials(trials)
        .with_effects(effects)
        .with_breakdown(true);
    request.seed = seed;
    engine.run(&request)
}

/// Descriptor list for one card, from the effect catalog
pub fn resolve_effects(catalog: &EffectCatalog, name: &str) -> Result<Vec<EffectDescriptor>, CatalogError> {
    catalog.resolve_effects(name)
}

/// Effects of the named cards, each bound to its card as the source
pub fn effects_for_cards(catalog: &EffectCatalog, names: &[String]) -> Result<Vec<ActiveEffect>, CatalogError> {
    let mut effects = Vec::new();
    for name in names {
        for effect in catalog.resolve_effects(name)? {
            effects.push(ActiveEffect::from_card(name.clone(), effect));
        }
    }
    Ok(effects)
}
