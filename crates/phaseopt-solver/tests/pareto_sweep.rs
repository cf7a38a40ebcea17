//! Integration tests for the Pareto sweep
//!
//! Covers frontier non-dominance, iteration caps, cancellation and dropped
//! combinations.

use std::sync::Arc;

use phaseopt_core::{
    HardConstraint, ProjectModel, Resource, Revenue, RunConfig, SolveStatus, SweepConfig, Task,
};
use phaseopt_solver::milp::MilpModel;
use phaseopt_solver::pareto::{dominates, weight_grid};
use phaseopt_solver::{
    OptimizationResult, Optimizer, ParetoSweep, SolveError, SolveOptions, SolveOutcome,
    SolverBackend, SweepControl,
};

fn project() -> ProjectModel {
    ProjectModel::new(
        vec![
            Task::new("clear")
                .duration_days(7)
                .capex(100.0)
                .emissions_per_day(2.0)
                .uses("crew", 1.0),
            Task::new("build")
                .duration_days(7)
                .capex(300.0)
                .opex_per_day(10.0)
                .uses("crew", 1.0),
            Task::new("run")
                .duration_days(7)
                .production()
                .depends_on("build"),
        ],
        vec![Resource::new("crew").capacity(1.0)],
        Vec::new(),
        Revenue::PerActiveDay(50.0),
    )
    .unwrap()
}

fn sweep(config: SweepConfig) -> ParetoSweep {
    ParetoSweep::new(Optimizer::new(RunConfig::default()).unwrap(), config)
}

fn small_grid() -> SweepConfig {
    SweepConfig {
        steps: 2,
        threads: Some(2),
        ..SweepConfig::default()
    }
}

// ============================================================================
// Frontier
// ============================================================================

#[test]
fn frontier_is_mutually_non_dominated() {
    let result = sweep(small_grid()).run(&project(), &[]).unwrap();

    assert_eq!(result.attempted, weight_grid(2).len());
    assert_eq!(result.rows.len(), result.attempted);
    assert_eq!(result.dropped, 0);
    assert_eq!(result.skipped, 0);
    assert!(!result.cancelled);
    assert!(!result.frontier.is_empty());

    for a in &result.frontier {
        for b in &result.frontier {
            assert!(!dominates(&a.metrics, &b.metrics));
        }
    }
    for row in &result.rows {
        assert!(row.status.has_solution());
        assert!((row.weights.sum() - 1.0).abs() < 1e-9);
    }
}

#[test]
fn every_row_outside_frontier_is_dominated() {
    let result = sweep(small_grid()).run(&project(), &[]).unwrap();
    for row in &result.rows {
        if !result.frontier.contains(row) {
            assert!(result
                .frontier
                .iter()
                .any(|f| dominates(&f.metrics, &row.metrics)));
        }
    }
}

// ============================================================================
// Stop conditions
// ============================================================================

#[test]
fn iteration_cap_skips_remaining_combinations() {
    let config = SweepConfig {
        max_iterations: Some(2),
        ..small_grid()
    };
    let result = sweep(config).run(&project(), &[]).unwrap();

    assert_eq!(result.attempted, 2);
    assert_eq!(result.rows.len(), 2);
    assert_eq!(result.skipped, weight_grid(2).len() - 2);
    assert!(result.cancelled);
    assert!(!result.frontier.is_empty());
}

#[test]
fn time_budget_runs_from_the_start_of_the_sweep() {
    let config = SweepConfig {
        time_budget_ms: Some(50),
        ..small_grid()
    };
    let prepared = sweep(config);
    std::thread::sleep(std::time::Duration::from_millis(100));
    let result = prepared.run(&project(), &[]).unwrap();

    assert!(result.attempted >= 1);
    assert!(!result.rows.is_empty());
}

#[test]
fn cancelled_sweep_returns_empty_frontier() {
    let control = Arc::new(SweepControl::new());
    control.cancel();
    let result = sweep(small_grid())
        .with_control(Arc::clone(&control))
        .run(&project(), &[])
        .unwrap();

    assert_eq!(result.attempted, 0);
    assert!(result.rows.is_empty());
    assert!(result.frontier.is_empty());
    assert!(result.cancelled);
}

// ============================================================================
// Dropped combinations
// ============================================================================

#[test]
fn infeasible_combinations_are_dropped() {
    let deadline = HardConstraint::Deadline {
        task_id: "run".into(),
        period_index: 0,
    };
    let result = sweep(small_grid()).run(&project(), &[deadline]).unwrap();

    assert_eq!(result.attempted, weight_grid(2).len());
    assert_eq!(result.dropped, result.attempted);
    assert!(result.rows.is_empty());
    assert!(result.frontier.is_empty());
}

/// Fails every solve after the first
struct FlakyBackend {
    calls: std::sync::atomic::AtomicUsize,
}

impl SolverBackend for FlakyBackend {
    fn name(&self) -> &'static str {
        "flaky"
    }

    fn solve(&self, model: &MilpModel, options: &SolveOptions) -> Result<SolveOutcome, SolveError> {
        let call = self
            .calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if call == 0 {
            phaseopt_solver::default_backend().solve(model, options)
        } else {
            Err(SolveError::Backend("license lost".into()))
        }
    }
}

#[test]
fn iteration_errors_do_not_abort_sweep() {
    let backend = Arc::new(FlakyBackend {
        calls: Default::default(),
    });
    let optimizer = Optimizer::new(RunConfig::default())
        .unwrap()
        .with_backend(backend);
    let result = ParetoSweep::new(optimizer, small_grid())
        .run(&project(), &[])
        .unwrap();

    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.dropped, weight_grid(2).len() - 1);
    assert_eq!(result.frontier.len(), 1);
}

struct Unavailable;

impl SolverBackend for Unavailable {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn solve(&self, _: &MilpModel, _: &SolveOptions) -> Result<SolveOutcome, SolveError> {
        Err(SolveError::SolverUnavailable("no license".into()))
    }
}

#[test]
fn first_solve_error_is_fatal() {
    let optimizer = Optimizer::new(RunConfig::default())
        .unwrap()
        .with_backend(Arc::new(Unavailable));
    let err = ParetoSweep::new(optimizer, small_grid())
        .run(&project(), &[])
        .unwrap_err();
    assert!(matches!(err, SolveError::SolverUnavailable(_)));
}

#[test]
fn single_result_is_serializable() {
    let result: OptimizationResult = Optimizer::new(RunConfig::default())
        .unwrap()
        .optimize(&project(), &weight_grid(1)[0], &[])
        .unwrap();
    assert_eq!(result.status, SolveStatus::Optimal);
    let json = serde_json::to_value(&result).unwrap();
    assert!(json["metrics"]["NPV"].is_number());
    assert!(json["schedule"]["rows"].is_array());
}
