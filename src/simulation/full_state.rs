//! Per-card odds of being among the next cards off the library, given what
//! is already known about the library order.

use crate::card::{CardPredicate, Category};
use crate::rng::fresh_seed;
use crate::simulation::engine::SimulationEngine;
use crate::simulation::error::SimulationError;
use crate::simulation::request::{DeckEntry, DrawPlan, HitScope, SimulationRequest, TargetCondition, DEFAULT_TRIALS};
use serde::{Deserialize, Serialize};
use std::time::Instant;

fn default_horizon() -> u32 {
    1
}

fn default_trials() -> u64 {
    DEFAULT_TRIALS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullStateRequest {
    /// Unknown-order part of the library
    pub deck: Vec<DeckEntry>,
    #[serde(default)]
    pub known_top: Vec<String>,
    #[serde(default)]
    pub known_bottom: Vec<String>,
    /// Number of cards off the top to look at
    #[serde(default = "default_horizon")]
    pub horizon: u32,
    #[serde(default = "default_trials")]
    pub trials: u64,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl FullStateRequest {
    pub fn new(deck: Vec<DeckEntry>) -> Self {
        FullStateRequest {
            deck,
            known_top: Vec::new(),
            known_bottom: Vec::new(),
            horizon: default_horizon(),
            trials: DEFAULT_TRIALS,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardOdds {
    pub name: String,
    pub category: Category,
    /// Probability of being within the horizon
    pub p_now: f64,
    pub copies_remaining: u32,
    /// Decided from the known zones without any trials
    pub deterministic: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullStateResult {
    pub cards: Vec<CardOdds>,
    pub library_size: u64,
    pub horizon: u32,
    pub trials_run: u64,
    pub cancelled: bool,
    pub seed: u64,
    pub elapsed_seconds: f64,
}

impl FullStateResult {
    pub fn odds(&self, name: &str) -> Option<&CardOdds> {
        self.cards.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

pub fn simulate_full_state(
    engine: &SimulationEngine,
    request: &FullStateRequest,
) -> Result<FullStateResult, SimulationError> {
    let start = Instant::now();
    let seed = request.seed.unwrap_or_else(fresh_seed);

    let mut sim = SimulationRequest::new(request.deck.clone(), TargetCondition::Has(CardPredicate::Any))
        .with_known_top(request.known_top.iter().cloned())
        .with_known_bottom(request.known_bottom.iter().cloned())
        .with_draw(DrawPlan::draws(request.horizon))
        .with_trials(request.trials)
        .with_scope(HitScope::Drawn)
        .with_breakdown(true);
    sim.seed = Some(seed);
    let mut scenario = sim.prepare()?;

    let library = &scenario.base.library;
    let library_size = library.size();
    if request.horizon == 0 || request.horizon as u64 > library_size {
        return Err(SimulationError::malformed(format!(
            "horizon {} must be between 1 and the library size {}",
            request.horizon, library_size
        )));
    }

    let horizon = request.horizon as u64;
    let top = library.known_top();
    let top_len = top.len() as u64;
    let unknown_total = library.unknown().total();
    // Cards of the known bottom reached once the unknown part is exhausted
    let bottom_reach = horizon.saturating_sub(top_len + unknown_total);
    let top_window: Vec<usize> = top.iter().copied().take(horizon as usize).collect();
    let bottom_window: Vec<usize> = library
        .known_bottom()
        .iter()
        .copied()
        .take(bottom_reach as usize)
        .collect();
    let draws_into_unknown = horizon.saturating_sub(top_len);

    let mut cards = Vec::with_capacity(scenario.pool.len());
    let mut stochastic = Vec::new();
    for (id, card) in scenario.pool.iter() {
        let copies_remaining = library.count(id);
        let unknown = library.unknown().count(id);
        let decided = if top_window.contains(&id) || bottom_window.contains(&id) {
            Some(1.0)
        } else if unknown == 0 || draws_into_unknown == 0 {
            Some(0.0)
        } else if draws_into_unknown >= unknown_total {
            Some(1.0)
        } else {
            None
        };
        if decided.is_none() {
            stochastic.push(card.name.clone());
        }
        cards.push(CardOdds {
            name: card.name.clone(),
            category: card.category,
            p_now: decided.unwrap_or(0.0),
            copies_remaining,
            deterministic: decided.is_some(),
        });
    }

    let mut trials_run = 0;
    let mut cancelled = false;
    if stochastic.is_empty() {
        tracing::info!(horizon, "every card is determined by the known zones; no trials run");
    } else {
        tracing::debug!(stochastic = stochastic.len(), "simulating undetermined cards");
        scenario.target = TargetCondition::any_name(stochastic).compile(&scenario.pool);
        let result = engine.run_scenario(&scenario, seed)?;
        trials_run = result.trials_run;
        cancelled = result.cancelled;
        for odds in cards.iter_mut().filter(|c| !c.deterministic) {
            odds.p_now = result.per_name.get(&odds.name).copied().unwrap_or(0.0);
        }
    }

    Ok(FullStateResult {
        cards,
        library_size,
        horizon: request.horizon,
        trials_run,
        cancelled,
        seed,
        elapsed_seconds: start.elapsed().as_secs_f64(),
    })
}
