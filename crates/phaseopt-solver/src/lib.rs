//! # phaseopt-solver
//!
//! Time-indexed MILP scheduling with financial valuation and Pareto sweeps.
//!
//! This crate provides:
//! - Horizon discretization into fixed-length periods
//! - A solver-agnostic MILP model of start/activity binaries per task and period
//! - Pluggable backends (`microlp` by default, Pumpkin with `cp-solver`)
//! - Schedule extraction, cash-flow tables and NPV
//! - Weight-grid sweeps filtered to the Pareto frontier
//!
//! ## Example
//!
//! ```rust,ignore
//! use phaseopt_core::{ProjectModel, Revenue, RunConfig, Task, Weights};
//! use phaseopt_solver::Optimizer;
//!
//! let project = ProjectModel::new(
//!     vec![Task::new("A").duration_days(7), Task::new("B").duration_days(14).depends_on("A")],
//!     Vec::new(),
//!     Vec::new(),
//!     Revenue::None,
//! )?;
//! let optimizer = Optimizer::new(RunConfig::default())?;
//! let result = optimizer.optimize(&project, &Weights::balanced(), &[])?;
//! assert_eq!(result.metrics.unwrap().makespan_periods, 3);
//! ```

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use phaseopt_core::{
    CashflowTable, HardConstraint, InputError, Metrics, ProjectModel, Proposer, RunConfig,
    ScheduleTable, SolveStatus, Weights,
};

pub mod backend;
pub mod builder;
pub mod cashflow;
pub mod extract;
pub mod horizon;
pub mod milp;
pub mod pareto;
pub mod sweep;

pub use backend::{default_backend, SolveOptions, SolveOutcome, SolverBackend};
pub use builder::{build_model, ScheduleModel};
pub use horizon::Horizon;
pub use sweep::{ParetoSweep, SweepControl, SweepResult, SweepRow};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum SolveError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error("Solver unavailable: {0}")]
    SolverUnavailable(String),

    #[error("Solver backend failed: {0}")]
    Backend(String),

    #[error("Failed to start worker pool: {0}")]
    ThreadPool(String),
}

// ============================================================================
// Results
// ============================================================================

/// Outcome of one build, solve, extract and value cycle.
///
/// Everything after `horizon` is `None` unless `status` carries a solution.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OptimizationResult {
    pub status: SolveStatus,
    /// Scalarized objective at the returned assignment, without tie-break
    pub objective_value: Option<f64>,
    /// Horizon of the final attempt
    pub horizon: Horizon,
    pub schedule: Option<ScheduleTable>,
    pub cashflow: Option<CashflowTable>,
    pub npv: Option<f64>,
    pub metrics: Option<Metrics>,
}

impl OptimizationResult {
    fn without_solution(status: SolveStatus, horizon: Horizon) -> Self {
        Self {
            status,
            objective_value: None,
            horizon,
            schedule: None,
            cashflow: None,
            npv: None,
            metrics: None,
        }
    }
}

// ============================================================================
// Optimizer
// ============================================================================

/// Runs single optimizations against one backend
#[derive(Clone)]
pub struct Optimizer {
    config: RunConfig,
    backend: Arc<dyn SolverBackend>,
}

impl std::fmt::Debug for Optimizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Optimizer")
            .field("config", &self.config)
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl Optimizer {
    pub fn new(config: RunConfig) -> Result<Self, SolveError> {
        config.validate()?;
        Ok(Self {
            config,
            backend: default_backend(),
        })
    }

    pub fn with_backend(mut self, backend: Arc<dyn SolverBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Optimize with the weights and constraints a proposer returns
    pub fn optimize_with(
        &self,
        project: &ProjectModel,
        proposer: &dyn Proposer,
    ) -> Result<OptimizationResult, SolveError> {
        let proposal = proposer.propose(project);
        self.optimize(project, &proposal.weights, &proposal.constraints)
    }

    /// Build, solve, extract and value one schedule.
    ///
    /// An infeasible model is rebuilt on a larger horizon up to
    /// `horizon_retries` times before `Infeasible` is reported.
    pub fn optimize(
        &self,
        project: &ProjectModel,
        weights: &Weights,
        constraints: &[HardConstraint],
    ) -> Result<OptimizationResult, SolveError> {
        let mut horizon = Horizon::for_project(
            project,
            self.config.calendar_step_days,
            self.config.horizon_slack,
        );
        let mut retries_left = self.config.horizon_retries;

        loop {
            let result = self.solve_on(project, weights, constraints, &horizon)?;
            if result.status != SolveStatus::Infeasible || retries_left == 0 {
                return Ok(result);
            }
            retries_left -= 1;
            let larger = horizon
                .enlarged(2)
                .at_least(horizon.sequential_periods(project));
            info!(
                from = horizon.num_periods,
                to = larger.num_periods,
                "infeasible, retrying on a larger horizon"
            );
            horizon = larger;
        }
    }

    fn solve_on(
        &self,
        project: &ProjectModel,
        weights: &Weights,
        constraints: &[HardConstraint],
        horizon: &Horizon,
    ) -> Result<OptimizationResult, SolveError> {
        let model = build_model(project, weights, constraints, horizon);

        let outcome = match model.milp.trivially_infeasible() {
            Some(label) => {
                debug!(constraint = label, "model infeasible before solving");
                SolveOutcome::without_solution(SolveStatus::Infeasible)
            }
            None => {
                let options = SolveOptions {
                    time_limit: self.config.solver_timeout(),
                };
                self.backend.solve(&model.milp, &options)?
            }
        };
        info!(
            backend = self.backend.name(),
            status = %outcome.status,
            periods = horizon.num_periods,
            %weights,
            "solve finished"
        );

        if !outcome.status.has_solution() || outcome.values.len() != model.milp.num_vars() {
            let status = if outcome.status.has_solution() {
                SolveStatus::NotSolved
            } else {
                outcome.status
            };
            return Ok(OptimizationResult::without_solution(status, *horizon));
        }

        let objective_value = model.milp.objective().evaluate(&outcome.values);
        let schedule = extract::extract(project, &model, &outcome.values);
        let cashflow = cashflow::cashflow_table(project, &schedule);
        let npv = cashflow::npv(
            &cashflow,
            self.config.discount_rate_annual,
            schedule.step_days,
        );
        let metrics = cashflow::metrics(project, &schedule, &cashflow, npv);

        Ok(OptimizationResult {
            status: outcome.status,
            objective_value: Some(objective_value),
            horizon: *horizon,
            schedule: Some(schedule),
            cashflow: Some(cashflow),
            npv: Some(npv),
            metrics: Some(metrics),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use phaseopt_core::{Proposal, Revenue, Task};

    struct Failing;

    impl SolverBackend for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn solve(&self, _: &milp::MilpModel, _: &SolveOptions) -> Result<SolveOutcome, SolveError> {
            Err(SolveError::Backend("boom".into()))
        }
    }

    struct Stalled;

    impl SolverBackend for Stalled {
        fn name(&self) -> &'static str {
            "stalled"
        }

        fn solve(&self, _: &milp::MilpModel, _: &SolveOptions) -> Result<SolveOutcome, SolveError> {
            Ok(SolveOutcome::without_solution(SolveStatus::NotSolved))
        }
    }

    fn project() -> ProjectModel {
        ProjectModel::new(
            vec![Task::new("A").duration_days(7)],
            Vec::new(),
            Vec::new(),
            Revenue::None,
        )
        .unwrap()
    }

    #[test]
    fn rejects_invalid_config() {
        let config = RunConfig {
            calendar_step_days: 0,
            ..RunConfig::default()
        };
        assert!(matches!(
            Optimizer::new(config),
            Err(SolveError::Input(InputError::InvalidConfig(_)))
        ));
    }

    #[test]
    fn backend_errors_propagate() {
        let optimizer = Optimizer::new(RunConfig::default())
            .unwrap()
            .with_backend(Arc::new(Failing));
        let err = optimizer
            .optimize(&project(), &Weights::balanced(), &[])
            .unwrap_err();
        assert!(matches!(err, SolveError::Backend(_)));
    }

    #[test]
    fn unsolved_status_has_no_schedule() {
        let optimizer = Optimizer::new(RunConfig::default())
            .unwrap()
            .with_backend(Arc::new(Stalled));
        assert_eq!(optimizer.backend_name(), "stalled");
        let result = optimizer
            .optimize(&project(), &Weights::balanced(), &[])
            .unwrap();
        assert_eq!(result.status, SolveStatus::NotSolved);
        assert!(result.schedule.is_none());
        assert!(result.metrics.is_none());
        assert!(result.objective_value.is_none());
    }

    #[test]
    fn proposer_supplies_weights() {
        let optimizer = Optimizer::new(RunConfig::default()).unwrap();
        let proposer = |_: &ProjectModel| Proposal {
            weights: Weights::new(0.0, 0.0, 1.0, 0.0).unwrap(),
            constraints: Vec::new(),
        };
        let result = optimizer.optimize_with(&project(), &proposer).unwrap();
        assert_eq!(result.status, SolveStatus::Optimal);
        assert_eq!(result.schedule.unwrap().get("A").unwrap().start_period, 0);
    }
}
