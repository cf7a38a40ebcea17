//! Pure-Rust branch-and-bound through `good_lp`'s `microlp` solver

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use good_lp::{
    default_solver, variable, variables, Expression, ResolutionError, Solution, SolverModel,
    Variable,
};
use tracing::{debug, warn};

use phaseopt_core::SolveStatus;

use super::{SolveOptions, SolveOutcome, SolverBackend};
use crate::milp::{LinearExpr, MilpModel, Relation, VarKind};
use crate::SolveError;

/// Timed-out solves allowed to keep running before new timed solves are refused
pub const MAX_ABANDONED_SOLVES: usize = 4;

static ABANDONED_SOLVES: AbandonedSolves = AbandonedSolves::new(MAX_ABANDONED_SOLVES);

/// Default backend; needs no native libraries
#[derive(Clone, Copy, Debug, Default)]
pub struct MicroLpBackend;

impl SolverBackend for MicroLpBackend {
    fn name(&self) -> &'static str {
        "microlp"
    }

    fn solve(&self, model: &MilpModel, options: &SolveOptions) -> Result<SolveOutcome, SolveError> {
        let Some(limit) = options.time_limit else {
            return solve_guarded(model);
        };
        solve_timed(model, limit, &ABANDONED_SOLVES)
    }
}

// microlp has no time limit of its own. The solve runs on a helper thread
// which is abandoned when the limit expires.
fn solve_timed(
    model: &MilpModel,
    limit: Duration,
    abandoned: &'static AbandonedSolves,
) -> Result<SolveOutcome, SolveError> {
    if abandoned.is_full() {
        warn!(
            running = abandoned.live(),
            "too many timed-out solves still running; not starting another"
        );
        return Ok(SolveOutcome::without_solution(SolveStatus::NotSolved));
    }

    let owned = model.clone();
    let state = Arc::new(HelperState::default());
    let helper_state = Arc::clone(&state);
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("phaseopt-microlp".into())
        .spawn(move || {
            let result = solve_guarded(&owned);
            abandoned.finish(&helper_state);
            let _ = tx.send(result);
        })
        .map_err(|e| SolveError::Backend(format!("failed to spawn solver thread: {}", e)))?;

    match rx.recv_timeout(limit) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => {
            abandoned.abandon(&state);
            warn!(limit_ms = limit.as_millis() as u64, "solver time limit reached");
            Ok(SolveOutcome::without_solution(SolveStatus::NotSolved))
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(SolveError::Backend(
            "solver thread exited without a result".into(),
        )),
    }
}

const RUNNING: u8 = 0;
const FINISHED: u8 = 1;
const ABANDONED: u8 = 2;

/// Lifecycle of one helper thread, shared with the thread waiting on it
#[derive(Debug, Default)]
struct HelperState(AtomicU8);

/// Count of helper threads whose caller gave up on them
#[derive(Debug)]
struct AbandonedSolves {
    live: AtomicUsize,
    cap: usize,
}

impl AbandonedSolves {
    const fn new(cap: usize) -> Self {
        Self {
            live: AtomicUsize::new(0),
            cap,
        }
    }

    fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    fn is_full(&self) -> bool {
        self.live() >= self.cap
    }

    /// The waiting side stopped waiting
    fn abandon(&self, state: &HelperState) {
        // Count first so a racing `finish` never decrements below zero
        self.live.fetch_add(1, Ordering::SeqCst);
        if state
            .0
            .compare_exchange(RUNNING, ABANDONED, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// The helper's solve returned
    fn finish(&self, state: &HelperState) {
        if state
            .0
            .compare_exchange(RUNNING, FINISHED, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

fn solve_guarded(model: &MilpModel) -> Result<SolveOutcome, SolveError> {
    panic::catch_unwind(AssertUnwindSafe(|| solve_model(model))).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(SolveError::Backend(format!("microlp panicked: {}", message)))
    })
}

fn solve_model(model: &MilpModel) -> Result<SolveOutcome, SolveError> {
    let mut vars = variables!();
    let handles: Vec<Variable> = model
        .vars()
        .iter()
        .map(|def| {
            let var = match def.kind {
                VarKind::Binary => variable().binary(),
                VarKind::Integer => variable().integer().min(def.lower).max(def.upper),
                VarKind::Continuous => variable().min(def.lower).max(def.upper),
            };
            vars.add(var)
        })
        .collect();

    let objective = to_expression(&model.solved_objective(), &handles);
    let mut problem = vars.minimise(objective).using(default_solver);
    for constraint in model.constraints() {
        let expr = to_expression(&constraint.expr, &handles);
        problem = problem.with(match constraint.relation {
            Relation::LessEq => expr.leq(constraint.rhs),
            Relation::GreaterEq => expr.geq(constraint.rhs),
            Relation::Equal => expr.eq(constraint.rhs),
        });
    }

    debug!(
        vars = model.num_vars(),
        constraints = model.num_constraints(),
        "solving with microlp"
    );

    match problem.solve() {
        Ok(solution) => Ok(SolveOutcome {
            status: SolveStatus::Optimal,
            values: handles.iter().map(|&v| solution.value(v)).collect(),
        }),
        Err(ResolutionError::Infeasible) => {
            Ok(SolveOutcome::without_solution(SolveStatus::Infeasible))
        }
        Err(ResolutionError::Unbounded) => {
            Ok(SolveOutcome::without_solution(SolveStatus::Unbounded))
        }
        Err(other) => Err(SolveError::Backend(other.to_string())),
    }
}

fn to_expression(expr: &LinearExpr, handles: &[Variable]) -> Expression {
    let mut out = Expression::with_capacity(expr.terms().len());
    for &(var, coefficient) in expr.terms() {
        out.add_mul(coefficient, handles[var.index()]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn knapsack() -> MilpModel {
        // min -(3x + 2y + 4z) s.t. 2x + y + 3z <= 4
        let mut model = MilpModel::new();
        let x = model.add_binary();
        let y = model.add_binary();
        let z = model.add_binary();
        model.add_constraint(
            "weight",
            LinearExpr::new().term(x, 2.0).term(y, 1.0).term(z, 3.0),
            Relation::LessEq,
            4.0,
        );
        model.set_objective(LinearExpr::new().term(x, -3.0).term(y, -2.0).term(z, -4.0));
        model
    }

    #[test]
    fn solves_small_knapsack() {
        let model = knapsack();
        let outcome = MicroLpBackend
            .solve(&model, &SolveOptions::default())
            .unwrap();
        assert_eq!(outcome.status, SolveStatus::Optimal);
        let picked: Vec<bool> = outcome.values.iter().map(|v| *v > 0.5).collect();
        // y + z is worth 6 and weighs 4
        assert_eq!(picked, vec![false, true, true]);
        assert!(model.is_feasible(&outcome.values, 1e-6));
    }

    #[test]
    fn reports_infeasible() {
        let mut model = MilpModel::new();
        let x = model.add_binary();
        model.add_constraint("lo", LinearExpr::new().term(x, 1.0), Relation::GreaterEq, 2.0);
        let outcome = MicroLpBackend
            .solve(&model, &SolveOptions::default())
            .unwrap();
        assert_eq!(outcome.status, SolveStatus::Infeasible);
        assert!(outcome.values.is_empty());
    }

    #[test]
    fn abandoned_solves_are_counted_until_they_finish() {
        let solves = AbandonedSolves::new(1);

        let late = HelperState::default();
        solves.abandon(&late);
        assert_eq!(solves.live(), 1);
        assert!(solves.is_full());
        solves.finish(&late);
        assert_eq!(solves.live(), 0);

        // Finished before the waiter gave up: nothing left running
        let early = HelperState::default();
        solves.finish(&early);
        solves.abandon(&early);
        assert_eq!(solves.live(), 0);
        assert!(!solves.is_full());
    }

    #[test]
    fn full_abandon_count_refuses_timed_solves() {
        static FULL: AbandonedSolves = AbandonedSolves::new(0);
        let outcome = solve_timed(&knapsack(), Duration::from_secs(30), &FULL).unwrap();
        assert_eq!(outcome.status, SolveStatus::NotSolved);
        assert!(outcome.values.is_empty());
    }

    #[test]
    fn time_limited_solve_still_returns() {
        let model = knapsack();
        let options = SolveOptions {
            time_limit: Some(Duration::from_secs(30)),
        };
        let outcome = MicroLpBackend.solve(&model, &options).unwrap();
        assert_eq!(outcome.status, SolveStatus::Optimal);
    }
}
