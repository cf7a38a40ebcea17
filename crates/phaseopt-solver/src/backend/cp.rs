//! Constraint-programming backend using the Pumpkin solver
//!
//! Pumpkin works over bounded integers, so the model is translated with
//! fixed-point arithmetic:
//! - continuous variables become integers within their rounded bounds
//! - each constraint row is scaled to integer coefficients
//! - the objective is scaled by [`OBJECTIVE_RESOLUTION`] into an auxiliary
//!   integer variable that LSU search minimizes
//!
//! Schedule models only have integral coefficients apart from resource
//! quantities and CAPEX, so rows lose at most the sub-cent part of those.

use std::time::Duration;

use pumpkin_solver::constraints as cp;
use pumpkin_solver::optimisation::linear_sat_unsat::LinearSatUnsat;
use pumpkin_solver::optimisation::OptimisationDirection;
use pumpkin_solver::results::{OptimisationResult, ProblemSolution};
use pumpkin_solver::termination::TimeBudget;
use pumpkin_solver::variables::{AffineView, DomainId, TransformableVariable};
use pumpkin_solver::Solver;
use tracing::debug;

use phaseopt_core::SolveStatus;

use super::{SolveOptions, SolveOutcome, SolverBackend};
use crate::milp::{LinearExpr, MilpModel, Relation};
use crate::SolveError;

/// Fixed-point factor applied to objective coefficients
pub const OBJECTIVE_RESOLUTION: f64 = 1_000_000.0;

/// Fixed-point factor applied to constraint coefficients
const ROW_RESOLUTION: f64 = 100.0;

/// Largest coefficient magnitude allowed after scaling a row
const MAX_ROW_COEFFICIENT: f64 = 1_000_000.0;

#[derive(Clone, Copy, Debug)]
pub struct CpBackend {
    /// Search budget when the caller sets no limit
    pub default_time_limit: Duration,
}

impl Default for CpBackend {
    fn default() -> Self {
        Self {
            default_time_limit: Duration::from_secs(60),
        }
    }
}

impl SolverBackend for CpBackend {
    fn name(&self) -> &'static str {
        "pumpkin"
    }

    fn solve(&self, model: &MilpModel, options: &SolveOptions) -> Result<SolveOutcome, SolveError> {
        let mut solver = Solver::default();

        let vars: Vec<DomainId> = model
            .vars()
            .iter()
            .map(|def| {
                let (lower, upper) = (clamp_i32(def.lower.ceil()), clamp_i32(def.upper.floor()));
                solver.new_bounded_integer(lower, upper.max(lower))
            })
            .collect();

        let tag = solver.new_constraint_tag();
        for constraint in model.constraints() {
            let (terms, rhs) = scale_row(&constraint.expr, constraint.relation, constraint.rhs);
            let views: Vec<AffineView<DomainId>> = terms
                .iter()
                .map(|&(idx, coefficient)| vars[idx].scaled(coefficient))
                .collect();
            let posted = match constraint.relation {
                Relation::LessEq => solver
                    .add_constraint(cp::less_than_or_equals(views, rhs, tag))
                    .post(),
                Relation::GreaterEq => solver
                    .add_constraint(cp::greater_than_or_equals(views, rhs, tag))
                    .post(),
                Relation::Equal => solver.add_constraint(cp::equals(views, rhs, tag)).post(),
            };
            if posted.is_err() {
                debug!(constraint = %constraint.label, "infeasible at root");
                return Ok(SolveOutcome::without_solution(SolveStatus::Infeasible));
            }
        }

        // objective - sum(coef * x) = 0
        let objective_terms: Vec<(usize, i32)> = model
            .solved_objective()
            .terms()
            .iter()
            .map(|&(var, c)| (var.index(), clamp_i32((c * OBJECTIVE_RESOLUTION).round())))
            .filter(|&(_, c)| c != 0)
            .collect();
        let (mut lower, mut upper) = (0i64, 0i64);
        for &(idx, c) in &objective_terms {
            let def = model.vars()[idx];
            let a = i64::from(c) * def.lower.ceil() as i64;
            let b = i64::from(c) * def.upper.floor() as i64;
            lower += a.min(b);
            upper += a.max(b);
        }
        let objective = solver.new_bounded_integer(
            clamp_i32(lower as f64),
            clamp_i32(upper as f64),
        );
        let mut link: Vec<AffineView<DomainId>> = objective_terms
            .iter()
            .map(|&(idx, c)| vars[idx].scaled(-c))
            .collect();
        link.push(objective.scaled(1));
        if solver.add_constraint(cp::equals(link, 0, tag)).post().is_err() {
            return Ok(SolveOutcome::without_solution(SolveStatus::Infeasible));
        }

        let limit = options.time_limit.unwrap_or(self.default_time_limit);
        let mut brancher = solver.default_brancher();
        let mut termination = TimeBudget::starting_now(limit);

        fn noop_callback<B>(_: &Solver, _: pumpkin_solver::results::SolutionReference, _: &B) {}
        let result = solver.optimise(
            &mut brancher,
            &mut termination,
            LinearSatUnsat::new(OptimisationDirection::Minimise, objective, noop_callback),
        );

        let outcome = match result {
            OptimisationResult::Optimal(solution) => SolveOutcome {
                status: SolveStatus::Optimal,
                values: vars
                    .iter()
                    .map(|&v| f64::from(solution.get_integer_value(v)))
                    .collect(),
            },
            OptimisationResult::Satisfiable(solution) => SolveOutcome {
                status: SolveStatus::Feasible,
                values: vars
                    .iter()
                    .map(|&v| f64::from(solution.get_integer_value(v)))
                    .collect(),
            },
            OptimisationResult::Unsatisfiable => {
                SolveOutcome::without_solution(SolveStatus::Infeasible)
            }
            OptimisationResult::Unknown => SolveOutcome::without_solution(SolveStatus::NotSolved),
        };
        Ok(outcome)
    }
}

/// Integer coefficients and right-hand side for one row.
///
/// Rounding of the right-hand side keeps `<=` and `>=` rows sound for
/// integral left-hand sides.
fn scale_row(expr: &LinearExpr, relation: Relation, rhs: f64) -> (Vec<(usize, i32)>, i32) {
    let max_abs = expr
        .terms()
        .iter()
        .map(|(_, c)| c.abs())
        .fold(0.0_f64, f64::max);
    let factor = if max_abs * ROW_RESOLUTION > MAX_ROW_COEFFICIENT {
        MAX_ROW_COEFFICIENT / max_abs
    } else {
        ROW_RESOLUTION
    };
    let terms = expr
        .terms()
        .iter()
        .map(|&(var, c)| (var.index(), clamp_i32((c * factor).round())))
        .collect();
    let scaled = rhs * factor;
    let rhs = match relation {
        Relation::LessEq => scaled.floor(),
        Relation::GreaterEq => scaled.ceil(),
        Relation::Equal => scaled.round(),
    };
    (terms, clamp_i32(rhs))
}

fn clamp_i32(value: f64) -> i32 {
    value.clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32
}
