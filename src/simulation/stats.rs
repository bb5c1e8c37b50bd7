//! Tallies, confidence intervals and the closed-form reference probability.

use crate::card::Category;
use crate::simulation::request::{CompiledTarget, Scenario};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use statrs::function::factorial::ln_binomial;
use std::collections::BTreeMap;

/// Inclusion-exclusion is exponential in the number of parts
const MAX_EXCLUSION_TERMS: usize = 16;

/// Hit counts of a contiguous range of trials. Tallies of disjoint ranges
/// merge by addition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    pub trials: u64,
    pub hits: u64,
    /// Trials in which at least one copy of each card was held, by card id
    pub name_hits: Vec<u64>,
    /// Trials in which at least one card of each category was held
    pub category_hits: [u64; Category::ALL.len()],
    pub fizzles: u64,
    pub mulligans: u64,
}

impl Tally {
    pub fn new(distinct_cards: usize) -> Self {
        Tally {
            name_hits: vec![0; distinct_cards],
            ..Tally::default()
        }
    }

    pub fn merge(mut self, other: Tally) -> Tally {
        self.trials += other.trials;
        self.hits += other.hits;
        if self.name_hits.len() < other.name_hits.len() {
            self.name_hits.resize(other.name_hits.len(), 0);
        }
        for (mine, theirs) in self.name_hits.iter_mut().zip(&other.name_hits) {
            *mine += theirs;
        }
        for (mine, theirs) in self.category_hits.iter_mut().zip(&other.category_hits) {
            *mine += theirs;
        }
        self.fizzles += other.fizzles;
        self.mulligans += other.mulligans;
        self
    }

    pub fn probability(&self) -> f64 {
        if self.trials == 0 {
            0.0
        } else {
            self.hits as f64 / self.trials as f64
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub level: f64,
    pub low: f64,
    pub high: f64,
}

impl ConfidenceInterval {
    pub fn contains(&self, p: f64) -> bool {
        self.low <= p && p <= self.high
    }

    pub fn width(&self) -> f64 {
        self.high - self.low
    }
}

/// Two-sided z critical value for a confidence level in (0, 1)
fn z_score(level: f64) -> f64 {
    match Normal::new(0.0, 1.0) {
        Ok(normal) => normal.inverse_cdf(1.0 - (1.0 - level) / 2.0),
        Err(_) => 2.575_829_303_549,
    }
}

/// Wilson score interval for `hits` successes out of `trials`
pub fn wilson_interval(hits: u64, trials: u64, level: f64) -> ConfidenceInterval {
    if trials == 0 {
        return ConfidenceInterval { level, low: 0.0, high: 1.0 };
    }
    let n = trials as f64;
    let p = hits as f64 / n;
    let z = z_score(level);
    let z2 = z * z;
    let denom = 1.0 + z2 / n;
    let center = (p + z2 / (2.0 * n)) / denom;
    let half = z / denom * (p * (1.0 - p) / n + z2 / (4.0 * n * n)).sqrt();
    ConfidenceInterval {
        level,
        low: (center - half).clamp(0.0, 1.0),
        high: (center + half).clamp(0.0, 1.0),
    }
}

fn ln_choose(n: u64, k: u64) -> f64 {
    if k > n {
        f64::NEG_INFINITY
    } else {
        ln_binomial(n, k)
    }
}

/// P(no success) when drawing `draws` from `population` holding `successes`
pub fn prob_none(population: u64, successes: u64, draws: u64) -> f64 {
    let failures = population.saturating_sub(successes);
    if draws > failures {
        return 0.0;
    }
    (ln_choose(failures, draws) - ln_choose(population, draws)).exp()
}

/// Hypergeometric P(X = x)
pub fn hypergeometric_pmf(population: u64, successes: u64, draws: u64, x: u64) -> f64 {
    if x > successes || x > draws || draws - x > population.saturating_sub(successes) {
        return 0.0;
    }
    (ln_choose(successes, x) + ln_choose(population - successes, draws - x) - ln_choose(population, draws)).exp()
}

/// Hypergeometric P(X >= at_least)
pub fn hypergeometric_at_least(population: u64, successes: u64, draws: u64, at_least: u64) -> f64 {
    if at_least == 0 {
        return 1.0;
    }
    let upper = successes.min(draws);
    (at_least..=upper)
        .map(|x| hypergeometric_pmf(population, successes, draws, x))
        .sum::<f64>()
        .min(1.0)
}

/// Exact probability for scenarios the hypergeometric model covers: no
/// state-changing effects, no known library positions, no mulligan.
/// `None` means the value has no closed form here.
pub fn theoretical_probability(scenario: &Scenario) -> Option<f64> {
    let library = &scenario.base.library;
    if scenario.resolver.has_active_effects()
        || scenario.draw.mulligan.is_some()
        || !library.known_top().is_empty()
        || !library.known_bottom().is_empty()
    {
        return None;
    }
    let population = library.size();
    let draws = scenario.draw.draws as u64;
    if draws > population {
        return None;
    }

    let mut held = vec![0u32; scenario.pool.len()];
    scenario
        .base
        .visit_cards(scenario.scope.zones(), |id| held[id] += 1);
    let unknown = library.unknown().counts();

    closed_form(&scenario.target, &held, unknown, population, draws)
}

fn masked_sum(mask: &[bool], counts: &[u32]) -> u64 {
    mask.iter().zip(counts).filter(|(&m, _)| m).map(|(_, &c)| c as u64).sum()
}

fn closed_form(target: &CompiledTarget, held: &[u32], unknown: &[u32], population: u64, draws: u64) -> Option<f64> {
    match target {
        CompiledTarget::Has(mask) => {
            if masked_sum(mask, held) > 0 {
                return Some(1.0);
            }
            Some(1.0 - prob_none(population, masked_sum(mask, unknown), draws))
        }
        CompiledTarget::AtLeast { mask, count } => {
            let need = (*count as u64).saturating_sub(masked_sum(mask, held));
            Some(hypergeometric_at_least(population, masked_sum(mask, unknown), draws, need))
        }
        CompiledTarget::Any(parts) => {
            let masks = has_masks(parts)?;
            let union = union_mask(&masks, unknown.len());
            closed_form(&CompiledTarget::Has(union), held, unknown, population, draws)
        }
        CompiledTarget::All(parts) => {
            let masks = has_masks(parts)?;
            let open: Vec<&Vec<bool>> = masks
                .into_iter()
                .filter(|mask| masked_sum(mask, held) == 0)
                .collect();
            if open.len() > MAX_EXCLUSION_TERMS {
                return None;
            }
            // P(every part drawn) = sum over subsets S of (-1)^|S| P(none of S drawn)
            let mut total = 0.0;
            for subset in 0u32..(1 << open.len()) {
                let chosen: Vec<&Vec<bool>> = open
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| subset & (1 << i) != 0)
                    .map(|(_, m)| *m)
                    .collect();
                let union = union_mask(&chosen, unknown.len());
                let term = prob_none(population, masked_sum(&union, unknown), draws);
                if chosen.len() % 2 == 0 {
                    total += term;
                } else {
                    total -= term;
                }
            }
            Some(total.clamp(0.0, 1.0))
        }
    }
}

fn has_masks(parts: &[CompiledTarget]) -> Option<Vec<&Vec<bool>>> {
    parts
        .iter()
        .map(|part| match part {
            CompiledTarget::Has(mask) => Some(mask),
            _ => None,
        })
        .collect()
}

fn union_mask<M: AsRef<[bool]>>(masks: &[M], len: usize) -> Vec<bool> {
    let mut union = vec![false; len];
    for mask in masks {
        for (slot, &m) in union.iter_mut().zip(mask.as_ref()) {
            *slot |= m;
        }
    }
    union
}

/// Outcome of a simulation batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub probability: f64,
    pub hits: u64,
    pub trials_requested: u64,
    /// Trials that completed; lower than requested only when cancelled
    pub trials_run: u64,
    pub cancelled: bool,
    pub seed: u64,
    pub theoretical_probability: Option<f64>,
    pub absolute_error: Option<f64>,
    pub error_pct: Option<f64>,
    pub confidence: ConfidenceInterval,
    /// Per-card hit probability, when a breakdown was requested
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub per_name: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub per_category: BTreeMap<String, f64>,
    pub fizzled_tutors: u64,
    pub mulligans: u64,
    pub elapsed_seconds: f64,
    pub trials_per_second: f64,
}

impl SimulationResult {
    pub fn from_tally(
        tally: &Tally,
        scenario: &Scenario,
        seed: u64,
        cancelled: bool,
        confidence_level: f64,
        elapsed_seconds: f64,
    ) -> Self {
        let probability = tally.probability();
        let theoretical = theoretical_probability(scenario);
        let absolute_error = theoretical.map(|t| (probability - t).abs());
        let error_pct = theoretical
            .zip(absolute_error)
            .filter(|(t, _)| *t > 0.0)
            .map(|(t, e)| e / t * 100.0);

        let ratio = |count: u64| {
            if tally.trials == 0 {
                0.0
            } else {
                count as f64 / tally.trials as f64
            }
        };

        let mut per_name = BTreeMap::new();
        let mut per_category = BTreeMap::new();
        if scenario.breakdown {
            for (id, card) in scenario.pool.iter() {
                let count = tally.name_hits.get(id).copied().unwrap_or(0);
                per_name.insert(card.name.clone(), ratio(count));
            }
            let present: Vec<Category> = scenario.pool.iter().map(|(_, c)| c.category).collect();
            for category in Category::ALL {
                if present.contains(&category) {
                    per_category.insert(category.to_string(), ratio(tally.category_hits[category.index()]));
                }
            }
        }

        SimulationResult {
            probability,
            hits: tally.hits,
            trials_requested: scenario.trials,
            trials_run: tally.trials,
            cancelled,
            seed,
            theoretical_probability: theoretical,
            absolute_error,
            error_pct,
            confidence: wilson_interval(tally.hits, tally.trials, confidence_level),
            per_name,
            per_category,
            fizzled_tutors: tally.fizzles,
            mulligans: tally.mulligans,
            elapsed_seconds,
            trials_per_second: if elapsed_seconds > 0.0 {
                tally.trials as f64 / elapsed_seconds
            } else {
                0.0
            },
        }
    }
}
