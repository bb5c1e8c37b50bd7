use crate::card::Category;
use crate::game::GameError;
use crate::rng::{fresh_seed, GameRng};
use crate::simulation::error::SimulationError;
use crate::simulation::mulligan::resolve_mulligans;
use crate::simulation::request::{Scenario, SimulationRequest};
use crate::simulation::stats::{SimulationResult, Tally};
use rayon::prelude::*;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Engine settings that do not change the estimate, only how it is computed
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Worker threads. `None` uses the global rayon pool.
    pub threads: Option<usize>,
    /// Trials per chunk; cancellation is checked between chunks
    pub chunk_size: u64,
    pub confidence_level: f64,
    /// Stop starting new chunks once this much time has passed
    pub deadline: Option<Duration>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            threads: None,
            chunk_size: 4096,
            confidence_level: 0.99,
            deadline: None,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), SimulationError> {
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(SimulationError::malformed(format!(
                "confidence level {} must be strictly between 0 and 1",
                self.confidence_level
            )));
        }
        if self.chunk_size == 0 {
            return Err(SimulationError::malformed("chunk size must be at least 1"));
        }
        if self.threads == Some(0) {
            return Err(SimulationError::malformed("thread count must be at least 1"));
        }
        Ok(())
    }
}

/// Shared flag that stops a running batch at the next chunk boundary
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Called after each chunk with (completed trials, requested trials)
pub type ProgressCallback = Arc<dyn Fn(u64, u64) + Send + Sync>;

pub struct SimulationEngine {
    config: SimulationConfig,
    cancel: CancelToken,
    progress: Option<ProgressCallback>,
    pool: Option<rayon::ThreadPool>,
}

impl Default for SimulationEngine {
    fn default() -> Self {
        SimulationEngine {
            config: SimulationConfig::default(),
            cancel: CancelToken::new(),
            progress: None,
            pool: None,
        }
    }
}

impl SimulationEngine {
    pub fn new(config: SimulationConfig) -> Result<Self, SimulationError> {
        config.validate()?;
        let pool = match config.threads {
            Some(threads) => Some(rayon::ThreadPoolBuilder::new().num_threads(threads).build()?),
            None => None,
        };
        Ok(SimulationEngine {
            config,
            cancel: CancelToken::new(),
            progress: None,
            pool,
        })
    }

    pub fn with_progress(mut self, progress: impl Fn(u64, u64) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(progress));
        self
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Token that cancels batches run by this engine
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Validate and run a request
    pub fn run(&self, request: &SimulationRequest) -> Result<SimulationResult, SimulationError> {
        self.config.validate()?;
        let scenario = request.prepare()?;
        let seed = request.seed.unwrap_or_else(fresh_seed);
        self.run_scenario(&scenario, seed)
    }

    /// Run a prepared scenario chunk by chunk
    pub fn run_scenario(&self, scenario: &Scenario, seed: u64) -> Result<SimulationResult, SimulationError> {
        let start = Instant::now();
        let deadline = self.config.deadline.map(|d| start + d);
        let total = scenario.trials;

        tracing::info!(
            trials = total,
            seed,
            library = scenario.library_size(),
            effects = scenario.resolver.len(),
            "starting simulation"
        );

        let mut tally = Tally::new(scenario.pool.len());
        let mut next = 0u64;
        let mut cancelled = false;

        while next < total {
            if self.cancel.is_cancelled() || deadline.is_some_and(|d| Instant::now() >= d) {
                cancelled = true;
                tracing::warn!(completed = next, requested = total, "simulation cancelled");
                break;
            }

            let end = next.saturating_add(self.config.chunk_size).min(total);
            let chunk = self.install(|| run_chunk(scenario, seed, next..end))?;
            tally = tally.merge(chunk);
            next = end;

            tracing::debug!(completed = next, hits = tally.hits, "chunk finished");
            if let Some(progress) = &self.progress {
                progress(next, total);
            }
        }

        let elapsed = start.elapsed().as_secs_f64();
        let result = SimulationResult::from_tally(
            &tally,
            scenario,
            seed,
            cancelled,
            self.config.confidence_level,
            elapsed,
        );

        tracing::info!(
            trials = result.trials_run,
            probability = result.probability,
            elapsed_seconds = elapsed,
            "simulation finished"
        );
        Ok(result)
    }

    fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }
}

/// Run trials `range` of a batch in parallel and fold them into one tally
pub fn run_chunk(scenario: &Scenario, seed: u64, range: Range<u64>) -> Result<Tally, SimulationError> {
    let distinct = scenario.pool.len();
    range
        .into_par_iter()
        .try_fold(
            || Tally::new(distinct),
            |mut tally, trial| {
                run_trial(scenario, seed, trial, &mut tally)?;
                Ok::<_, SimulationError>(tally)
            },
        )
        .try_reduce(|| Tally::new(distinct), |a, b| Ok(a.merge(b)))
}

/// One trial: copy the base state, resolve effects, run the draw phase and
/// record whether the target was met
pub fn run_trial(scenario: &Scenario, seed: u64, trial: u64, tally: &mut Tally) -> Result<(), SimulationError> {
    let mut rng = GameRng::for_trial(seed, trial);
    let mut state = scenario.base.clone();
    let empty_library = |_: GameError| SimulationError::EmptyLibraryDraw { trial };

    let report = scenario
        .resolver
        .resolve(&mut state, &scenario.pool, &mut rng)
        .map_err(empty_library)?;

    let mut remaining = scenario.draw.draws;
    if let Some(rule) = &scenario.draw.mulligan {
        let mulligans = resolve_mulligans(&mut state, &scenario.pool, rule, &mut rng).map_err(empty_library)?;
        tally.mulligans += mulligans as u64;
        remaining = remaining.saturating_sub(rule.hand_size);
    }
    state.draw_n(remaining, &mut rng).map_err(empty_library)?;

    let mut held = vec![0u32; scenario.pool.len()];
    state.visit_cards(scenario.scope.zones(), |id| held[id] += 1);

    tally.trials += 1;
    tally.fizzles += report.fizzled as u64;
    if scenario.target.is_met(&held) {
        tally.hits += 1;
    }

    if scenario.breakdown {
        let mut seen = [false; Category::ALL.len()];
        for (id, &count) in held.iter().enumerate() {
            if count > 0 {
                tally.name_hits[id] += 1;
                seen[scenario.pool.category(id).index()] = true;
            }
        }
        for (hits, seen) in tally.category_hits.iter_mut().zip(seen) {
            if seen {
                *hits += 1;
            }
        }
    }

    Ok(())
}
