//! # phaseopt-core
//!
//! Core domain model for the phaseopt schedule optimization engine.
//!
//! This crate provides:
//! - Domain types: `Task`, `Resource`, `BudgetEntry`, `Revenue`, `Weights`, `HardConstraint`
//! - Input ingestion: raw records coerced into an immutable `ProjectModel`
//! - Run configuration and scenario files
//! - Result types shared by the solver: `ScheduleTable`, `CashflowTable`, `Metrics`
//! - Error types
//!
//! ## Example
//!
//! ```rust
//! use phaseopt_core::{ProjectModel, Resource, Revenue, Task};
//!
//! let model = ProjectModel::new(
//!     vec![
//!         Task::new("site_prep").duration_days(14).capex(250_000.0),
//!         Task::new("drilling")
//!             .duration_days(21)
//!             .depends_on("site_prep")
//!             .uses("rig", 1.0),
//!     ],
//!     vec![Resource::new("rig").capacity(1.0)],
//!     Vec::new(),
//!     Revenue::None,
//! )
//! .unwrap();
//! assert_eq!(model.tasks().len(), 2);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

pub mod config;
pub mod graph;
pub mod input;
pub mod scenario;

pub use config::{RunConfig, SweepConfig};
pub use input::{
    parse_hard_constraints, BudgetRecord, ConstraintRecord, FieldValue, ProjectModel,
    ResourceRecord, RevenueRecord, RevenueRow, SkippedRecord, TaskRecord,
};
pub use scenario::Scenario;

// ============================================================================
// Type Aliases
// ============================================================================

/// Unique identifier for a task
pub type TaskId = String;

/// Name of a shared resource
pub type ResourceName = String;

/// Zero-based index of a fixed-length period
pub type PeriodIndex = usize;

/// Largest period index accepted from input rows
pub const MAX_PERIOD_INDEX: PeriodIndex = 100_000;

// ============================================================================
// Tasks and Resources
// ============================================================================

/// A schedulable unit of work with its costs and emissions
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier
    pub id: TaskId,
    /// Human-readable name
    pub name: String,
    /// Duration in calendar days (scheduled as at least one day)
    pub duration_days: u32,
    /// Resource consumed while active
    pub resource: Option<ResourceName>,
    /// Quantity of `resource` consumed while active
    pub resource_qty: f64,
    /// One-time outflow booked in the start period
    pub capex_usd: f64,
    /// Recurring outflow per active day
    pub opex_usd_per_day: f64,
    /// Recurring emissions per active day
    pub emissions_tco2e_per_day: f64,
    /// Tasks that must finish before this one starts
    pub predecessors: Vec<TaskId>,
    /// Generates revenue while active (constant-rate revenue mode only)
    pub is_production: bool,
}

impl Task {
    /// Create a new task with the given ID; the name defaults to the ID
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            duration_days: 0,
            resource: None,
            resource_qty: 0.0,
            capex_usd: 0.0,
            opex_usd_per_day: 0.0,
            emissions_tco2e_per_day: 0.0,
            predecessors: Vec::new(),
            is_production: false,
        }
    }

    /// Set the display name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the duration in days
    pub fn duration_days(mut self, days: u32) -> Self {
        self.duration_days = days;
        self
    }

    /// Bind the task to a resource with the given quantity
    pub fn uses(mut self, resource: impl Into<String>, qty: f64) -> Self {
        self.resource = Some(resource.into());
        self.resource_qty = qty;
        self
    }

    /// Set the one-time capital expenditure
    pub fn capex(mut self, usd: f64) -> Self {
        self.capex_usd = usd;
        self
    }

    /// Set the operating expenditure per active day
    pub fn opex_per_day(mut self, usd: f64) -> Self {
        self.opex_usd_per_day = usd;
        self
    }

    /// Set the emissions per active day
    pub fn emissions_per_day(mut self, tco2e: f64) -> Self {
        self.emissions_tco2e_per_day = tco2e;
        self
    }

    /// Add a predecessor
    pub fn depends_on(mut self, predecessor: impl Into<String>) -> Self {
        let predecessor = predecessor.into();
        if !self.predecessors.contains(&predecessor) {
            self.predecessors.push(predecessor);
        }
        self
    }

    /// Mark the task as revenue-generating while active
    pub fn production(mut self) -> Self {
        self.is_production = true;
        self
    }

    /// Duration used for scheduling: zero-day tasks still occupy a day
    pub fn scheduled_days(&self) -> u32 {
        self.duration_days.max(1)
    }
}

/// A shared resource with a per-period consumption ceiling
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub name: ResourceName,
    pub capacity_qty: f64,
}

impl Resource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capacity_qty: 0.0,
        }
    }

    pub fn capacity(mut self, qty: f64) -> Self {
        self.capacity_qty = qty;
        self
    }
}

/// Ceiling on CAPEX incurred by tasks starting in a period
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BudgetEntry {
    pub period_index: PeriodIndex,
    pub capex_cap_usd: f64,
}

/// Revenue assumptions for cash-flow valuation
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Revenue {
    /// No revenue
    #[default]
    None,
    /// Explicit revenue per period
    Table(BTreeMap<PeriodIndex, f64>),
    /// Constant rate accrued while any production task is active
    PerActiveDay(f64),
}

// ============================================================================
// Weights and Hard Constraints
// ============================================================================

/// Scalarization weights, always normalized to sum to 1
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawWeights")]
pub struct Weights {
    npv: f64,
    cost: f64,
    makespan: f64,
    emissions: f64,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct RawWeights {
    #[serde(alias = "w_npv")]
    npv: f64,
    #[serde(alias = "w_cost")]
    cost: f64,
    #[serde(alias = "w_makespan")]
    makespan: f64,
    #[serde(alias = "w_emissions")]
    emissions: f64,
}

impl TryFrom<RawWeights> for Weights {
    type Error = InputError;

    fn try_from(raw: RawWeights) -> Result<Self, Self::Error> {
        Weights::new(raw.npv, raw.cost, raw.makespan, raw.emissions)
    }
}

impl Weights {
    /// Normalize four non-negative weights so they sum to 1.
    ///
    /// Fails on negative or non-finite components and on an all-zero input.
    pub fn new(npv: f64, cost: f64, makespan: f64, emissions: f64) -> Result<Self, InputError> {
        let parts = [npv, cost, makespan, emissions];
        if parts.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(InputError::InvalidWeights(format!(
                "weights must be finite and non-negative, got {:?}",
                parts
            )));
        }
        let total: f64 = parts.iter().sum();
        if total <= f64::EPSILON {
            return Err(InputError::InvalidWeights(
                "at least one weight must be positive".into(),
            ));
        }
        Ok(Self {
            npv: npv / total,
            cost: cost / total,
            makespan: makespan / total,
            emissions: emissions / total,
        })
    }

    /// Equal weight on every objective
    pub fn balanced() -> Self {
        Self {
            npv: 0.25,
            cost: 0.25,
            makespan: 0.25,
            emissions: 0.25,
        }
    }

    pub fn npv(&self) -> f64 {
        self.npv
    }

    pub fn cost(&self) -> f64 {
        self.cost
    }

    pub fn makespan(&self) -> f64 {
        self.makespan
    }

    pub fn emissions(&self) -> f64 {
        self.emissions
    }

    pub fn sum(&self) -> f64 {
        self.npv + self.cost + self.makespan + self.emissions
    }
}

impl Default for Weights {
    fn default() -> Self {
        Self::balanced()
    }
}

impl std::fmt::Display for Weights {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "npv={:.3} cost={:.3} makespan={:.3} emissions={:.3}",
            self.npv, self.cost, self.makespan, self.emissions
        )
    }
}

/// Caller-supplied constraint layered on top of the base model
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HardConstraint {
    /// The task must finish by the given period
    Deadline {
        task_id: TaskId,
        period_index: PeriodIndex,
    },
    /// Total CAPEX starting in the period must not exceed the cap
    BudgetCap {
        period_index: PeriodIndex,
        cap_usd: f64,
    },
}

/// Weights and hard constraints proposed by an external advisor
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Proposal {
    pub weights: Weights,
    pub constraints: Vec<HardConstraint>,
}

/// Source of objective weights and extra constraints for a model.
///
/// Advisors (interactive tools, heuristics, assistants) live outside the
/// engine; the optimizer only consumes what they return.
pub trait Proposer {
    fn propose(&self, model: &ProjectModel) -> Proposal;
}

impl<F> Proposer for F
where
    F: Fn(&ProjectModel) -> Proposal,
{
    fn propose(&self, model: &ProjectModel) -> Proposal {
        self(model)
    }
}

// ============================================================================
// Results
// ============================================================================

/// Termination status of a single solve
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SolveStatus {
    Optimal,
    Feasible,
    Infeasible,
    Unbounded,
    NotSolved,
}

impl SolveStatus {
    /// Whether the solver returned an assignment that can be trusted
    pub fn has_solution(&self) -> bool {
        matches!(self, SolveStatus::Optimal | SolveStatus::Feasible)
    }
}

impl std::fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolveStatus::Optimal => write!(f, "Optimal"),
            SolveStatus::Feasible => write!(f, "Feasible"),
            SolveStatus::Infeasible => write!(f, "Infeasible"),
            SolveStatus::Unbounded => write!(f, "Unbounded"),
            SolveStatus::NotSolved => write!(f, "Not Solved"),
        }
    }
}

/// One scheduled task
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRow {
    pub task_id: TaskId,
    pub name: String,
    pub start_period: PeriodIndex,
    /// First period after the task's active span
    pub finish_period: PeriodIndex,
    pub start_day: u64,
    pub finish_day: u64,
    pub duration_days: u32,
    pub resource: Option<ResourceName>,
    pub is_production: bool,
}

impl ScheduleRow {
    /// Whether the task occupies the given period
    pub fn is_active(&self, period: PeriodIndex) -> bool {
        self.start_period <= period && period < self.finish_period
    }
}

/// Schedule extracted from a solved model, sorted by start, finish, then ID
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleTable {
    pub step_days: u32,
    pub rows: Vec<ScheduleRow>,
}

impl ScheduleTable {
    pub fn get(&self, task_id: &str) -> Option<&ScheduleRow> {
        self.rows.iter().find(|r| r.task_id == task_id)
    }

    /// Latest finish period across all tasks
    pub fn makespan_periods(&self) -> PeriodIndex {
        self.rows.iter().map(|r| r.finish_period).max().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Cash flows booked in one period
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CashflowRow {
    pub period_index: PeriodIndex,
    pub capex_out: f64,
    pub opex_out: f64,
    pub revenue_in: f64,
    pub net_cf: f64,
}

/// Period-indexed cash flows of a schedule
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CashflowTable {
    pub rows: Vec<CashflowRow>,
}

impl CashflowTable {
    pub fn total_capex(&self) -> f64 {
        self.rows.iter().map(|r| r.capex_out).sum()
    }

    pub fn total_opex(&self) -> f64 {
        self.rows.iter().map(|r| r.opex_out).sum()
    }

    pub fn total_revenue(&self) -> f64 {
        self.rows.iter().map(|r| r.revenue_in).sum()
    }

    /// CAPEX plus OPEX over the whole table
    pub fn total_cost(&self) -> f64 {
        self.total_capex() + self.total_opex()
    }
}

/// Tradeoff metrics of one solved schedule
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    #[serde(rename = "NPV")]
    pub npv: f64,
    #[serde(rename = "TotalCost")]
    pub total_cost: f64,
    #[serde(rename = "MakespanPeriods")]
    pub makespan_periods: PeriodIndex,
    #[serde(rename = "Emissions_tCO2e")]
    pub emissions_tco2e: f64,
}

// ============================================================================
// Errors
// ============================================================================

/// Input and configuration error
#[derive(Debug, Error)]
pub enum InputError {
    #[error("No usable tasks: {0}")]
    NoUsableTasks(String),

    #[error("Circular dependency detected among tasks: {0:?}")]
    CircularDependency(Vec<TaskId>),

    #[error("Invalid weights: {0}")]
    InvalidWeights(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Scenario error: {0}")]
    Scenario(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Tests
// ============================================================================
