//! Pareto sweep over objective weights
//!
//! Each grid point runs a full, independent optimization. The first point is
//! solved on the calling thread so that an unusable solver fails fast; the
//! rest fan out over a `rayon` pool. Cancellation, the iteration cap and the
//! time budget are checked before each point starts, so collected rows are
//! never disturbed.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use phaseopt_core::{HardConstraint, Metrics, ProjectModel, SolveStatus, SweepConfig, Weights};

use crate::pareto::{non_dominated, weight_grid};
use crate::{OptimizationResult, Optimizer, SolveError};

// ============================================================================
// Control
// ============================================================================

/// Shared stop conditions for a running sweep
#[derive(Debug, Default)]
pub struct SweepControl {
    cancelled: AtomicBool,
    started: AtomicUsize,
    max_iterations: Option<usize>,
    time_budget: Option<Duration>,
    /// Set by the first claim, so the budget runs from the start of the sweep
    deadline: OnceLock<Instant>,
}

impl SweepControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits from config; the time budget starts with the first iteration
    pub fn from_config(config: &SweepConfig) -> Self {
        let control = Self::new();
        let control = match config.max_iterations {
            Some(cap) => control.with_max_iterations(cap),
            None => control,
        };
        match config.time_budget() {
            Some(budget) => control.with_time_budget(budget),
            None => control,
        }
    }

    pub fn with_max_iterations(mut self, cap: usize) -> Self {
        self.max_iterations = Some(cap);
        self
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    /// Stop starting new iterations
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Number of iterations allowed to start so far
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Claim a slot for one more iteration
    fn try_begin(&self) -> bool {
        if self.is_cancelled() {
            return false;
        }
        let deadline = self
            .time_budget
            .map(|budget| *self.deadline.get_or_init(|| Instant::now() + budget));
        if deadline.is_some_and(|d| Instant::now() >= d) {
            self.cancel();
            return false;
        }
        let claimed = self.started.fetch_add(1, Ordering::SeqCst);
        match self.max_iterations {
            Some(cap) if claimed >= cap => {
                self.started.fetch_sub(1, Ordering::SeqCst);
                false
            }
            _ => true,
        }
    }
}

// ============================================================================
// Results
// ============================================================================

/// Metrics of one solved weight combination
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SweepRow {
    pub weights: Weights,
    pub status: SolveStatus,
    pub objective: f64,
    #[serde(flatten)]
    pub metrics: Metrics,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SweepResult {
    /// Every collected row, in grid order
    pub rows: Vec<SweepRow>,
    /// The non-dominated subset of `rows`
    pub frontier: Vec<SweepRow>,
    /// Combinations that were solved
    pub attempted: usize,
    /// Solved combinations without a usable schedule, or that errored
    pub dropped: usize,
    /// Combinations never started
    pub skipped: usize,
    pub cancelled: bool,
}

enum Iteration {
    Solved(SweepRow),
    Dropped,
    Skipped,
}

// ============================================================================
// Sweep
// ============================================================================

pub struct ParetoSweep {
    optimizer: Optimizer,
    config: SweepConfig,
    control: Arc<SweepControl>,
}

impl ParetoSweep {
    pub fn new(optimizer: Optimizer, config: SweepConfig) -> Self {
        let control = Arc::new(SweepControl::from_config(&config));
        Self {
            optimizer,
            config,
            control,
        }
    }

    /// Replace the stop conditions, e.g. to share a cancel flag
    pub fn with_control(mut self, control: Arc<SweepControl>) -> Self {
        self.control = control;
        self
    }

    /// Handle for cancelling from another thread
    pub fn control(&self) -> Arc<SweepControl> {
        Arc::clone(&self.control)
    }

    pub fn run(
        &self,
        project: &ProjectModel,
        constraints: &[HardConstraint],
    ) -> Result<SweepResult, SolveError> {
        self.config.validate()?;
        let grid = weight_grid(self.config.steps);
        info!(combinations = grid.len(), steps = self.config.steps, "starting sweep");

        let Some((first, rest)) = grid.split_first() else {
            return Ok(SweepResult::default());
        };

        let mut outcomes = Vec::with_capacity(grid.len());
        if self.control.try_begin() {
            let result = self.optimizer.optimize(project, first, constraints)?;
            outcomes.push(to_iteration(first, result));
        } else {
            outcomes.push(Iteration::Skipped);
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.threads.unwrap_or(0))
            .thread_name(|i| format!("phaseopt-sweep-{}", i))
            .build()
            .map_err(|e| SolveError::ThreadPool(e.to_string()))?;

        let remaining: Vec<Iteration> = pool.install(|| {
            rest.par_iter()
                .map(|weights| {
                    if !self.control.try_begin() {
                        return Iteration::Skipped;
                    }
                    match self.optimizer.optimize(project, weights, constraints) {
                        Ok(result) => to_iteration(weights, result),
                        Err(e) => {
                            warn!(%weights, error = %e, "sweep iteration failed");
                            Iteration::Dropped
                        }
                    }
                })
                .collect()
        });
        outcomes.extend(remaining);

        let mut result = SweepResult::default();
        for outcome in outcomes {
            match outcome {
                Iteration::Solved(row) => {
                    result.attempted += 1;
                    result.rows.push(row);
                }
                Iteration::Dropped => {
                    result.attempted += 1;
                    result.dropped += 1;
                }
                Iteration::Skipped => result.skipped += 1,
            }
        }

        let metrics: Vec<Metrics> = result.rows.iter().map(|r| r.metrics).collect();
        result.frontier = non_dominated(&metrics)
            .into_iter()
            .map(|i| result.rows[i].clone())
            .collect();
        result.cancelled = self.control.is_cancelled() || result.skipped > 0;

        info!(
            rows = result.rows.len(),
            frontier = result.frontier.len(),
            dropped = result.dropped,
            skipped = result.skipped,
            "sweep finished"
        );
        Ok(result)
    }
}

fn to_iteration(weights: &Weights, result: OptimizationResult) -> Iteration {
    match (result.metrics, result.objective_value) {
        (Some(metrics), Some(objective)) if result.status.has_solution() => {
            Iteration::Solved(SweepRow {
                weights: *weights,
                status: result.status,
                objective,
                metrics,
            })
        }
        _ => {
            debug!(%weights, status = %result.status, "dropping combination without schedule");
            Iteration::Dropped
        }
    }
}
