//! Trial-count and thread-count analysis
//!
//! Runs one request repeatedly to see how the estimate converges with more
//! trials and how throughput scales with more worker threads.

use crate::simulation::engine::{SimulationConfig, SimulationEngine};
use crate::simulation::error::SimulationError;
use crate::simulation::request::SimulationRequest;
use crate::simulation::stats::SimulationResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Estimate quality at one trial count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergencePoint {
    pub trials: u64,
    pub probability: f64,
    pub absolute_error: Option<f64>,
    pub error_pct: Option<f64>,
    /// Half-width of the confidence interval, as a percentage of the estimate
    pub ci_half_width_pct: f64,
    pub elapsed_seconds: f64,
    pub trials_per_second: f64,
}

impl ConvergencePoint {
    fn from_result(result: &SimulationResult) -> Self {
        let half_width = result.confidence.width() / 2.0;
        ConvergencePoint {
            trials: result.trials_run,
            probability: result.probability,
            absolute_error: result.absolute_error,
            error_pct: result.error_pct,
            ci_half_width_pct: if result.probability > 0.0 {
                half_width / result.probability * 100.0
            } else {
                100.0
            },
            elapsed_seconds: result.elapsed_seconds,
            trials_per_second: result.trials_per_second,
        }
    }

    /// Error against the exact value when there is one, otherwise the
    /// relative confidence half-width
    pub fn effective_error_pct(&self) -> f64 {
        self.error_pct.unwrap_or(self.ci_half_width_pct)
    }
}

impl fmt::Display for ConvergencePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>10} trials  p={:.6}  error={:>8.4}%  {:>8.4}s  {:>12.0} trials/sec",
            self.trials,
            self.probability,
            self.effective_error_pct(),
            self.elapsed_seconds,
            self.trials_per_second
        )
    }
}

/// `points` trial counts spaced evenly on a log scale between `min` and `max`
pub fn log_spaced_counts(min: u64, max: u64, points: usize) -> Vec<u64> {
    if points == 0 || min == 0 || max < min {
        return Vec::new();
    }
    if points == 1 {
        return vec![max];
    }
    let (lo, hi) = ((min as f64).log10(), (max as f64).log10());
    let step = (hi - lo) / (points - 1) as f64;
    let mut counts: Vec<u64> = (0..points)
        .map(|i| 10f64.powf(lo + step * i as f64).round() as u64)
        .collect();
    counts.dedup();
    counts
}

/// Run `request` once per trial count
pub fn analyze_convergence(
    engine: &SimulationEngine,
    request: &SimulationRequest,
    counts: &[u64],
) -> Result<Vec<ConvergencePoint>, SimulationError> {
    let mut points = Vec::with_capacity(counts.len());
    for &trials in counts {
        let run = request.clone().with_trials(trials);
        let result = engine.run(&run)?;
        let point = ConvergencePoint::from_result(&result);
        tracing::debug!(trials, error_pct = point.effective_error_pct(), "convergence point");
        points.push(point);
        if result.cancelled {
            break;
        }
    }
    Ok(points)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecommendation {
    pub target_error_pct: f64,
    pub max_time_seconds: f64,
    /// Smallest count meeting the error target
    pub min_trials_for_error: Option<u64>,
    /// Largest count finishing within the time limit
    pub max_trials_for_time: Option<u64>,
    /// Counts meeting both constraints
    pub optimal_range: Option<(u64, u64)>,
    pub recommended_trials: Option<u64>,
}

impl fmt::Display for TrialRecommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.recommended_trials {
            Some(trials) => write!(
                f,
                "≤{}% error, ≤{}s: {} trials",
                self.target_error_pct, self.max_time_seconds, trials
            ),
            None => write!(
                f,
                "≤{}% error, ≤{}s: no measured count meets both",
                self.target_error_pct, self.max_time_seconds
            ),
        }
    }
}

pub fn recommend_trial_count(
    points: &[ConvergencePoint],
    target_error_pct: f64,
    max_time_seconds: f64,
) -> TrialRecommendation {
    let meets_error = |p: &&ConvergencePoint| p.effective_error_pct() <= target_error_pct;
    let meets_time = |p: &&ConvergencePoint| p.elapsed_seconds <= max_time_seconds;

    let min_trials_for_error = points.iter().filter(meets_error).map(|p| p.trials).min();
    let max_trials_for_time = points.iter().filter(meets_time).map(|p| p.trials).max();

    let both: Vec<u64> = points
        .iter()
        .filter(|p| meets_error(p) && meets_time(p))
        .map(|p| p.trials)
        .collect();
    let optimal_range = both
        .iter()
        .min()
        .zip(both.iter().max())
        .map(|(&lo, &hi)| (lo, hi));

    TrialRecommendation {
        target_error_pct,
        max_time_seconds,
        min_trials_for_error,
        max_trials_for_time,
        optimal_range,
        recommended_trials: optimal_range.map(|(lo, _)| lo),
    }
}

/// Throughput at one thread count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingPoint {
    pub threads: usize,
    pub hits: u64,
    pub elapsed_seconds: f64,
    pub trials_per_second: f64,
    /// Elapsed time of the first thread count over this one
    pub speedup: f64,
    pub efficiency: f64,
}

impl fmt::Display for ScalingPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>3} threads  {:>8.4}s  {:>12.0} trials/sec  speedup {:>5.2}x  efficiency {:>5.1}%",
            self.threads,
            self.elapsed_seconds,
            self.trials_per_second,
            self.speedup,
            self.efficiency * 100.0
        )
    }
}

/// Run `request` on a dedicated pool per thread count. A fixed seed is
/// required so every run computes the same trials.
pub fn measure_parallel_scaling(
    base: &SimulationConfig,
    request: &SimulationRequest,
    thread_counts: &[usize],
) -> Result<Vec<ScalingPoint>, SimulationError> {
    if request.seed.is_none() {
        return Err(SimulationError::malformed("scaling runs need a fixed seed"));
    }

    let mut points: Vec<ScalingPoint> = Vec::with_capacity(thread_counts.len());
    for &threads in thread_counts {
        let engine = SimulationEngine::new(SimulationConfig {
            threads: Some(threads),
            ..base.clone()
        })?;
        let result = engine.run(request)?;
        let baseline = points.first().map_or(result.elapsed_seconds, |p| p.elapsed_seconds);
        let speedup = if result.elapsed_seconds > 0.0 {
            baseline / result.elapsed_seconds
        } else {
            1.0
        };
        tracing::debug!(threads, speedup, "scaling point");
        points.push(ScalingPoint {
            threads,
            hits: result.hits,
            elapsed_seconds: result.elapsed_seconds,
            trials_per_second: result.trials_per_second,
            speedup,
            efficiency: speedup / threads as f64,
        });
    }
    Ok(points)
}
