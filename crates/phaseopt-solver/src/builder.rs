//! Time-indexed schedule model
//!
//! One binary `start[t, p]` per task and feasible start period, one binary
//! `active[t, p]` per task and period, a `completion[t]` per task and a
//! single `makespan`. Variables are kept in dense `(task, period)` grids.
//!
//! Constraints:
//! - single start: `sum_p start[t, p] = 1`
//! - activity: `active[t, p] = sum of start[t, s]` over starts covering `p`
//! - completion: `completion[t] = sum_p (p + d_t) * start[t, p]`
//! - precedence: `sum_p p * start[s, p] >= completion[pred]`
//! - makespan: `makespan >= completion[t]`
//! - capacity: `sum_t qty_t * active[t, p] <= capacity` per resource and period
//! - budget: `sum_t capex_t * start[t, p] <= cap` per budgeted period
//! - deadline: `completion[t] <= period + 1`
//!
//! The objective is the weighted sum of normalized cost, makespan and
//! emissions, with the NPV weight applied to the undiscounted cost. Discounted
//! NPV is computed after the solve.

use std::collections::BTreeMap;
use tracing::debug;

use phaseopt_core::{HardConstraint, PeriodIndex, ProjectModel, Weights};

use crate::horizon::Horizon;
use crate::milp::{LinearExpr, MilpModel, Relation, VarId};

/// Weight of the earliest-start tie-break relative to the normalized objective
pub const TIE_BREAK_WEIGHT: f64 = 1e-4;

/// Dense `(task, period)` grid of optional variables
#[derive(Clone, Debug)]
pub struct VarGrid {
    periods: usize,
    cells: Vec<Option<VarId>>,
}

impl VarGrid {
    fn new(tasks: usize, periods: usize) -> Self {
        Self {
            periods,
            cells: vec![None; tasks * periods],
        }
    }

    fn set(&mut self, task: usize, period: PeriodIndex, var: VarId) {
        self.cells[task * self.periods + period] = Some(var);
    }

    pub fn get(&self, task: usize, period: PeriodIndex) -> Option<VarId> {
        if period >= self.periods {
            return None;
        }
        self.cells[task * self.periods + period]
    }

    /// `(period, var)` pairs that exist for a task
    pub fn row(&self, task: usize) -> impl Iterator<Item = (PeriodIndex, VarId)> + '_ {
        self.cells[task * self.periods..(task + 1) * self.periods]
            .iter()
            .enumerate()
            .filter_map(|(p, var)| var.map(|v| (p, v)))
    }
}

/// Scale constants that keep the weighted objective terms comparable
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ObjectiveScales {
    pub cost: f64,
    pub time: f64,
    pub emissions: f64,
}

/// A built model plus the variable layout needed to read a solution back
#[derive(Clone, Debug)]
pub struct ScheduleModel {
    pub milp: MilpModel,
    pub horizon: Horizon,
    pub scales: ObjectiveScales,
    start: VarGrid,
    active: VarGrid,
    completion: Vec<VarId>,
    makespan: VarId,
    duration_periods: Vec<usize>,
}

impl ScheduleModel {
    pub fn start_var(&self, task: usize, period: PeriodIndex) -> Option<VarId> {
        self.start.get(task, period)
    }

    pub fn active_var(&self, task: usize, period: PeriodIndex) -> Option<VarId> {
        self.active.get(task, period)
    }

    /// Feasible start periods of a task with their variables
    pub fn start_row(&self, task: usize) -> impl Iterator<Item = (PeriodIndex, VarId)> + '_ {
        self.start.row(task)
    }

    pub fn completion_var(&self, task: usize) -> VarId {
        self.completion[task]
    }

    pub fn makespan_var(&self) -> VarId {
        self.makespan
    }

    pub fn duration_periods(&self, task: usize) -> usize {
        self.duration_periods[task]
    }
}

/// Build the model for one weights configuration.
///
/// Hard constraints naming unknown tasks, and budget caps beyond the
/// horizon, are ignored.
pub fn build_model(
    project: &ProjectModel,
    weights: &Weights,
    constraints: &[HardConstraint],
    horizon: &Horizon,
) -> ScheduleModel {
    let tasks = project.tasks();
    let n = tasks.len();
    let periods = horizon.num_periods;
    let step = f64::from(horizon.step_days);

    let mut milp = MilpModel::new();
    let mut start = VarGrid::new(n, periods);
    let mut active = VarGrid::new(n, periods);
    let duration_periods: Vec<usize> = tasks
        .iter()
        .map(|t| horizon.duration_periods(t.duration_days))
        .collect();

    for (t, &d) in duration_periods.iter().enumerate() {
        // A task may only start where it can finish inside the horizon
        for p in 0..periods {
            if p + d <= periods {
                start.set(t, p, milp.add_binary());
            }
        }
        for p in 0..periods {
            active.set(t, p, milp.add_binary());
        }
    }
    let completion: Vec<VarId> = (0..n)
        .map(|_| milp.add_continuous(0.0, periods as f64))
        .collect();
    let makespan = milp.add_continuous(0.0, periods as f64);

    for (t, task) in tasks.iter().enumerate() {
        let d = duration_periods[t];

        let mut single = LinearExpr::new();
        for (_, var) in start.row(t) {
            single.add(var, 1.0);
        }
        milp.add_constraint(format!("start[{}]", task.id), single, Relation::Equal, 1.0);

        for p in 0..periods {
            let Some(active_var) = active.get(t, p) else {
                continue;
            };
            let mut link = LinearExpr::new().term(active_var, 1.0);
            for s in p.saturating_sub(d - 1)..=p {
                if let Some(var) = start.get(t, s) {
                    link.add(var, -1.0);
                }
            }
            milp.add_constraint(
                format!("active[{},{}]", task.id, p),
                link,
                Relation::Equal,
                0.0,
            );
        }

        let mut finish = LinearExpr::new().term(completion[t], 1.0);
        for (p, var) in start.row(t) {
            finish.add(var, -((p + d) as f64));
        }
        milp.add_constraint(
            format!("completion[{}]", task.id),
            finish,
            Relation::Equal,
            0.0,
        );

        milp.add_constraint(
            format!("makespan[{}]", task.id),
            LinearExpr::new().term(makespan, 1.0).term(completion[t], -1.0),
            Relation::GreaterEq,
            0.0,
        );
    }

    for (s, task) in tasks.iter().enumerate() {
        for pred_id in &task.predecessors {
            let Some(pred) = project.task_position(pred_id) else {
                continue;
            };
            let mut precedence = LinearExpr::new().term(completion[pred], -1.0);
            for (p, var) in start.row(s) {
                precedence.add(var, p as f64);
            }
            milp.add_constraint(
                format!("precedence[{}->{}]", pred_id, task.id),
                precedence,
                Relation::GreaterEq,
                0.0,
            );
        }
    }

    for resource in project.resources() {
        let users: Vec<(usize, f64)> = tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.resource.as_deref() == Some(resource.name.as_str()))
            .filter(|(_, t)| t.resource_qty > 0.0)
            .map(|(i, t)| (i, t.resource_qty))
            .collect();
        if users.is_empty() {
            continue;
        }
        for p in 0..periods {
            let mut usage = LinearExpr::with_capacity(users.len());
            for &(t, qty) in &users {
                if let Some(var) = active.get(t, p) {
                    usage.add(var, qty);
                }
            }
            milp.add_constraint(
                format!("capacity[{},{}]", resource.name, p),
                usage,
                Relation::LessEq,
                resource.capacity_qty,
            );
        }
    }

    for (period, cap) in budget_caps(project, constraints, periods) {
        let mut spend = LinearExpr::new();
        for (t, task) in tasks.iter().enumerate() {
            if let Some(var) = start.get(t, period) {
                spend.add(var, task.capex_usd);
            }
        }
        milp.add_constraint(format!("budget[{}]", period), spend, Relation::LessEq, cap);
    }

    for constraint in constraints {
        if let HardConstraint::Deadline {
            task_id,
            period_index,
        } = constraint
        {
            let due = period_index.saturating_add(1);
            match project.task_position(task_id) {
                // Every completion already lies inside the horizon
                Some(_) if due >= periods => {
                    debug!(task = %task_id, period_index, "ignoring deadline past the horizon")
                }
                Some(t) => milp.add_constraint(
                    format!("deadline[{}]", task_id),
                    LinearExpr::new().term(completion[t], 1.0),
                    Relation::LessEq,
                    due as f64,
                ),
                None => debug!(task = %task_id, "ignoring deadline for unknown task"),
            }
        }
    }

    let scales = objective_scales(project, horizon, &duration_periods);
    let cost_weight = weights.cost() + weights.npv();
    let mut objective = LinearExpr::new();
    let mut tie_break = LinearExpr::new();
    let tie_scale = TIE_BREAK_WEIGHT / (n.max(1) * periods.max(1)) as f64;

    for (t, task) in tasks.iter().enumerate() {
        for (p, var) in start.row(t) {
            objective.add(var, cost_weight * task.capex_usd / scales.cost);
            tie_break.add(var, tie_scale * p as f64);
        }
        let per_active = cost_weight * task.opex_usd_per_day * step / scales.cost
            + weights.emissions() * task.emissions_tco2e_per_day * step / scales.emissions;
        for p in 0..periods {
            if let Some(var) = active.get(t, p) {
                objective.add(var, per_active);
            }
        }
    }
    objective.add(makespan, weights.makespan() / scales.time);

    milp.set_objective(objective);
    milp.set_tie_break(tie_break);

    debug!(
        tasks = n,
        periods,
        vars = milp.num_vars(),
        constraints = milp.num_constraints(),
        "built schedule model"
    );

    ScheduleModel {
        milp,
        horizon: *horizon,
        scales,
        start,
        active,
        completion,
        makespan,
        duration_periods,
    }
}

/// Effective CAPEX cap per period inside the horizon; the tighter cap wins
fn budget_caps(
    project: &ProjectModel,
    constraints: &[HardConstraint],
    periods: usize,
) -> BTreeMap<PeriodIndex, f64> {
    let mut caps: BTreeMap<PeriodIndex, f64> = project
        .budget()
        .iter()
        .filter(|(p, _)| **p < periods)
        .map(|(p, cap)| (*p, *cap))
        .collect();
    for constraint in constraints {
        if let HardConstraint::BudgetCap {
            period_index,
            cap_usd,
        } = constraint
        {
            if *period_index < periods {
                caps.entry(*period_index)
                    .and_modify(|cap| *cap = cap.min(*cap_usd))
                    .or_insert(*cap_usd);
            }
        }
    }
    caps
}

fn objective_scales(
    project: &ProjectModel,
    horizon: &Horizon,
    duration_periods: &[usize],
) -> ObjectiveScales {
    let step = f64::from(horizon.step_days);
    let mut cost = 0.0;
    let mut emissions = 0.0;
    for (task, &d) in project.tasks().iter().zip(duration_periods) {
        let active_days = d as f64 * step;
        cost += task.capex_usd + task.opex_usd_per_day * active_days;
        emissions += task.emissions_tco2e_per_day * active_days;
    }
    ObjectiveScales {
        cost: cost.max(1.0),
        time: (horizon.num_periods as f64).max(1.0),
        emissions: emissions.max(1.0),
    }
}
