//! Raw record ingestion
//!
//! Turns loosely-typed task, resource, budget, revenue and constraint rows
//! into the typed, immutable [`ProjectModel`]. Rows with malformed fields are
//! skipped and reported as [`SkippedRecord`]s; only a build that ends with no
//! usable tasks (or with a dependency cycle) is an error.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

use crate::graph;
use crate::{
    BudgetEntry, HardConstraint, InputError, PeriodIndex, Resource, Revenue, Task, TaskId,
    MAX_PERIOD_INDEX,
};

// ============================================================================
// Field Values
// ============================================================================

/// A loosely-typed input cell
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// Blank text cells count as missing
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.trim().is_empty(),
            FieldValue::List(items) => items.iter().all(|v| v.is_blank()),
            _ => false,
        }
    }

    /// Numeric value; numeric strings may carry `$`, `,` and surrounding whitespace
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            FieldValue::Number(n) => *n,
            FieldValue::Text(s) => {
                let cleaned: String = s
                    .trim()
                    .chars()
                    .filter(|c| *c != ',' && *c != '$' && *c != '_')
                    .collect();
                cleaned.parse::<f64>().ok()?
            }
            FieldValue::Bool(_) | FieldValue::List(_) => return None,
        };
        value.is_finite().then_some(value)
    }

    /// Textual value; integral numbers render without a fractional part
    pub fn as_text(&self) -> Option<String> {
        match self {
            FieldValue::Text(s) => Some(s.trim().to_string()),
            FieldValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                Some(format!("{}", *n as i64))
            }
            FieldValue::Number(n) => Some(n.to_string()),
            FieldValue::Bool(b) => Some(b.to_string()),
            FieldValue::List(_) => None,
        }
    }

    /// Truthiness: booleans, non-zero numbers, and `true/yes/y/1/t/x`
    pub fn is_truthy(&self) -> bool {
        match self {
            FieldValue::Bool(b) => *b,
            FieldValue::Number(n) => *n != 0.0,
            FieldValue::Text(s) => matches!(
                s.trim().to_ascii_lowercase().as_str(),
                "true" | "yes" | "y" | "1" | "t" | "x"
            ),
            FieldValue::List(_) => false,
        }
    }

    /// Split into ID tokens: comma-delimited text or a list of scalars
    pub fn as_id_list(&self) -> Vec<String> {
        let raw: Vec<String> = match self {
            FieldValue::List(items) => items.iter().filter_map(|v| v.as_text()).collect(),
            other => other
                .as_text()
                .map(|s| s.split(',').map(str::to_string).collect())
                .unwrap_or_default(),
        };
        raw.into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

fn present(field: &Option<FieldValue>) -> Option<&FieldValue> {
    field.as_ref().filter(|v| !v.is_blank())
}

fn required_text(field: &Option<FieldValue>, name: &str) -> Result<String, String> {
    present(field)
        .and_then(|v| v.as_text())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("missing {}", name))
}

fn required_number(field: &Option<FieldValue>, name: &str) -> Result<f64, String> {
    let value = present(field).ok_or_else(|| format!("missing {}", name))?;
    value
        .as_f64()
        .ok_or_else(|| format!("{} is not a number: {:?}", name, value))
}

/// Missing cells default to zero; present cells must be non-negative numbers
fn amount(field: &Option<FieldValue>, name: &str) -> Result<f64, String> {
    match present(field) {
        None => Ok(0.0),
        Some(value) => {
            let n = value
                .as_f64()
                .ok_or_else(|| format!("{} is not a number: {:?}", name, value))?;
            if n < 0.0 {
                Err(format!("{} must be non-negative, got {}", name, n))
            } else {
                Ok(n)
            }
        }
    }
}

fn period_index(field: &Option<FieldValue>, name: &str) -> Result<PeriodIndex, String> {
    let n = required_number(field, name)?;
    if n < 0.0 || n.fract() != 0.0 {
        return Err(format!("{} must be a non-negative integer, got {}", name, n));
    }
    if n > MAX_PERIOD_INDEX as f64 {
        return Err(format!("{} must be at most {}, got {}", name, MAX_PERIOD_INDEX, n));
    }
    Ok(n as PeriodIndex)
}

// ============================================================================
// Raw Records
// ============================================================================

/// A task row as supplied by the caller
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskRecord {
    pub task_id: Option<FieldValue>,
    pub name: Option<FieldValue>,
    pub duration_days: Option<FieldValue>,
    pub resource: Option<FieldValue>,
    pub resource_qty: Option<FieldValue>,
    pub capex_usd: Option<FieldValue>,
    pub opex_usd_per_day: Option<FieldValue>,
    #[serde(alias = "emissions_tCO2e_per_day")]
    pub emissions_tco2e_per_day: Option<FieldValue>,
    pub predecessor_ids: Option<FieldValue>,
    pub is_production: Option<FieldValue>,
}

impl TaskRecord {
    /// Minimal row with an ID and duration
    pub fn new(task_id: impl Into<FieldValue>, duration_days: impl Into<FieldValue>) -> Self {
        Self {
            task_id: Some(task_id.into()),
            duration_days: Some(duration_days.into()),
            ..Default::default()
        }
    }

    fn parse(&self) -> Result<Task, String> {
        let id = required_text(&self.task_id, "task_id")?;
        let duration = required_number(&self.duration_days, "duration_days")?;
        let name = present(&self.name)
            .and_then(|v| v.as_text())
            .unwrap_or_else(|| id.clone());
        let resource = present(&self.resource)
            .and_then(|v| v.as_text())
            .filter(|s| !s.is_empty());

        let mut predecessors: Vec<TaskId> = Vec::new();
        if let Some(ids) = present(&self.predecessor_ids) {
            for pred in ids.as_id_list() {
                if pred != id && !predecessors.contains(&pred) {
                    predecessors.push(pred);
                }
            }
        }

        Ok(Task {
            name,
            duration_days: duration.max(0.0).ceil() as u32,
            resource,
            resource_qty: amount(&self.resource_qty, "resource_qty")?,
            capex_usd: amount(&self.capex_usd, "capex_usd")?,
            opex_usd_per_day: amount(&self.opex_usd_per_day, "opex_usd_per_day")?,
            emissions_tco2e_per_day: amount(
                &self.emissions_tco2e_per_day,
                "emissions_tco2e_per_day",
            )?,
            predecessors,
            is_production: present(&self.is_production)
                .map(|v| v.is_truthy())
                .unwrap_or(false),
            id,
        })
    }
}

/// A resource row
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceRecord {
    #[serde(alias = "name")]
    pub resource: Option<FieldValue>,
    pub capacity_qty: Option<FieldValue>,
}

impl ResourceRecord {
    fn parse(&self) -> Result<Resource, String> {
        let name = required_text(&self.resource, "resource")?;
        let capacity = required_number(&self.capacity_qty, "capacity_qty")?;
        if capacity < 0.0 {
            return Err(format!("capacity_qty must be non-negative, got {}", capacity));
        }
        Ok(Resource::new(name).capacity(capacity))
    }
}

/// A budget row
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetRecord {
    pub period_index: Option<FieldValue>,
    pub capex_cap_usd: Option<FieldValue>,
}

impl BudgetRecord {
    fn parse(&self) -> Result<BudgetEntry, String> {
        let period_index = period_index(&self.period_index, "period_index")?;
        let cap = required_number(&self.capex_cap_usd, "capex_cap_usd")?;
        if cap < 0.0 {
            return Err(format!("capex_cap_usd must be non-negative, got {}", cap));
        }
        Ok(BudgetEntry {
            period_index,
            capex_cap_usd: cap,
        })
    }
}

/// One row of an explicit revenue table
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RevenueRow {
    pub period_index: Option<FieldValue>,
    pub revenue_usd: Option<FieldValue>,
}

/// Revenue input: an explicit table or a constant daily rate
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RevenueRecord {
    pub table: Vec<RevenueRow>,
    #[serde(alias = "revenue_per_active_day")]
    pub per_active_day: Option<FieldValue>,
}

/// A hard-constraint row, e.g. `{type = "deadline", task_id = "A", period_index = 4}`
pub type ConstraintRecord = BTreeMap<String, FieldValue>;

/// A row dropped during ingestion
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SkippedRecord {
    /// Source table (`tasks`, `resources`, `budget`, `revenue`, `constraints`)
    pub table: String,
    /// Zero-based row position within the table
    pub row: usize,
    pub reason: String,
}

impl SkippedRecord {
    fn new(table: &str, row: usize, reason: impl Into<String>) -> Self {
        let record = Self {
            table: table.to_string(),
            row,
            reason: reason.into(),
        };
        warn!(table, row, reason = %record.reason, "skipping input row");
        record
    }
}

impl std::fmt::Display for SkippedRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]: {}", self.table, self.row, self.reason)
    }
}

// ============================================================================
// Project Model
// ============================================================================

/// Immutable tasks, resources, budget caps and revenue of one optimization run
#[derive(Clone, Debug)]
pub struct ProjectModel {
    tasks: Vec<Task>,
    task_index: HashMap<TaskId, usize>,
    resources: Vec<Resource>,
    budget: BTreeMap<PeriodIndex, f64>,
    revenue: Revenue,
    skipped: Vec<SkippedRecord>,
}

impl ProjectModel {
    /// Ingest raw rows, skipping malformed ones.
    ///
    /// Fails only when no task row is usable or the known predecessor edges
    /// form a cycle.
    pub fn build(
        tasks_raw: &[TaskRecord],
        resources_raw: &[ResourceRecord],
        budget_raw: &[BudgetRecord],
        revenue_raw: &RevenueRecord,
    ) -> Result<Self, InputError> {
        let mut skipped = Vec::new();

        let mut tasks = Vec::with_capacity(tasks_raw.len());
        for (row, record) in tasks_raw.iter().enumerate() {
            match record.parse() {
                Ok(task) => tasks.push((row, task)),
                Err(reason) => skipped.push(SkippedRecord::new("tasks", row, reason)),
            }
        }

        let mut resources = Vec::with_capacity(resources_raw.len());
        for (row, record) in resources_raw.iter().enumerate() {
            match record.parse() {
                Ok(resource) => resources.push((row, resource)),
                Err(reason) => skipped.push(SkippedRecord::new("resources", row, reason)),
            }
        }

        let mut budget = Vec::with_capacity(budget_raw.len());
        for (row, record) in budget_raw.iter().enumerate() {
            match record.parse() {
                Ok(entry) => budget.push(entry),
                Err(reason) => skipped.push(SkippedRecord::new("budget", row, reason)),
            }
        }

        let revenue = parse_revenue(revenue_raw, &mut skipped);

        Self::assemble(tasks, resources, budget, revenue, skipped)
    }

    /// Build from already-typed values, applying the same validation as [`build`](Self::build)
    pub fn new(
        tasks: Vec<Task>,
        resources: Vec<Resource>,
        budget: Vec<BudgetEntry>,
        revenue: Revenue,
    ) -> Result<Self, InputError> {
        Self::assemble(
            tasks.into_iter().enumerate().collect(),
            resources.into_iter().enumerate().collect(),
            budget,
            revenue,
            Vec::new(),
        )
    }

    fn assemble(
        tasks: Vec<(usize, Task)>,
        resources: Vec<(usize, Resource)>,
        budget: Vec<BudgetEntry>,
        revenue: Revenue,
        mut skipped: Vec<SkippedRecord>,
    ) -> Result<Self, InputError> {
        let mut kept: Vec<Task> = Vec::with_capacity(tasks.len());
        let mut task_index: HashMap<TaskId, usize> = HashMap::new();
        for (row, task) in tasks {
            if task_index.contains_key(&task.id) {
                skipped.push(SkippedRecord::new(
                    "tasks",
                    row,
                    format!("duplicate task_id '{}'", task.id),
                ));
                continue;
            }
            task_index.insert(task.id.clone(), kept.len());
            kept.push(task);
        }

        if kept.is_empty() {
            return Err(InputError::NoUsableTasks(format!(
                "{} row(s) skipped",
                skipped.iter().filter(|s| s.table == "tasks").count()
            )));
        }

        // Dangling predecessor references are dropped, not errors
        for task in &mut kept {
            let id = task.id.clone();
            task.predecessors.retain(|pred| {
                let known = task_index.contains_key(pred) && *pred != id;
                if !known {
                    debug!(task = %id, predecessor = %pred, "ignoring unknown predecessor");
                }
                known
            });
        }

        graph::topological_order(&kept, &task_index).map_err(InputError::CircularDependency)?;

        let mut seen = HashSet::new();
        let mut kept_resources = Vec::with_capacity(resources.len());
        for (row, resource) in resources {
            if !seen.insert(resource.name.clone()) {
                skipped.push(SkippedRecord::new(
                    "resources",
                    row,
                    format!("duplicate resource '{}'", resource.name),
                ));
                continue;
            }
            kept_resources.push(resource);
        }

        let mut caps: BTreeMap<PeriodIndex, f64> = BTreeMap::new();
        for entry in budget {
            caps.entry(entry.period_index)
                .and_modify(|cap| *cap = cap.min(entry.capex_cap_usd))
                .or_insert(entry.capex_cap_usd);
        }

        Ok(Self {
            tasks: kept,
            task_index,
            resources: kept_resources,
            budget: caps,
            revenue,
            skipped,
        })
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.task_index.get(id).map(|&i| &self.tasks[i])
    }

    /// Dense index of a task, used by solver arenas
    pub fn task_position(&self, id: &str) -> Option<usize> {
        self.task_index.get(id).copied()
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.name == name)
    }

    /// Budget caps by period (duplicates collapsed to the tighter cap)
    pub fn budget(&self) -> &BTreeMap<PeriodIndex, f64> {
        &self.budget
    }

    pub fn revenue(&self) -> &Revenue {
        &self.revenue
    }

    /// Rows dropped while building this model
    pub fn skipped(&self) -> &[SkippedRecord] {
        &self.skipped
    }

    /// Scheduled days summed over all tasks
    pub fn total_scheduled_days(&self) -> u64 {
        self.tasks.iter().map(|t| u64::from(t.scheduled_days())).sum()
    }
}

fn parse_revenue(raw: &RevenueRecord, skipped: &mut Vec<SkippedRecord>) -> Revenue {
    let mut table: BTreeMap<PeriodIndex, f64> = BTreeMap::new();
    for (row, record) in raw.table.iter().enumerate() {
        let parsed = period_index(&record.period_index, "period_index").and_then(|period| {
            required_number(&record.revenue_usd, "revenue_usd").map(|usd| (period, usd))
        });
        match parsed {
            Ok((period, usd)) => *table.entry(period).or_insert(0.0) += usd,
            Err(reason) => skipped.push(SkippedRecord::new("revenue", row, reason)),
        }
    }
    if !table.is_empty() {
        return Revenue::Table(table);
    }

    match present(&raw.per_active_day).map(|v| v.as_f64()) {
        Some(Some(rate)) if rate > 0.0 => Revenue::PerActiveDay(rate),
        Some(None) => {
            skipped.push(SkippedRecord::new(
                "revenue",
                0,
                "revenue_per_active_day is not a number",
            ));
            Revenue::None
        }
        _ => Revenue::None,
    }
}

/// Parse hard-constraint rows, skipping malformed or unrecognized ones
pub fn parse_hard_constraints(
    records: &[ConstraintRecord],
) -> (Vec<HardConstraint>, Vec<SkippedRecord>) {
    let mut constraints = Vec::with_capacity(records.len());
    let mut skipped = Vec::new();

    for (row, record) in records.iter().enumerate() {
        let field = |key: &str| record.get(key).cloned();
        let kind = field("type")
            .and_then(|v| v.as_text())
            .map(|s| s.to_ascii_lowercase());

        let parsed = match kind.as_deref() {
            Some("deadline") => required_text(&field("task_id"), "task_id").and_then(|task_id| {
                period_index(&field("period_index"), "period_index").map(|period_index| {
                    HardConstraint::Deadline {
                        task_id,
                        period_index,
                    }
                })
            }),
            Some("budget_cap") => {
                period_index(&field("period_index"), "period_index").and_then(|period_index| {
                    required_number(&field("cap_usd"), "cap_usd").and_then(|cap_usd| {
                        if cap_usd < 0.0 {
                            Err(format!("cap_usd must be non-negative, got {}", cap_usd))
                        } else {
                            Ok(HardConstraint::BudgetCap {
                                period_index,
                                cap_usd,
                            })
                        }
                    })
                })
            }
            Some(other) => Err(format!("unrecognized constraint type '{}'", other)),
            None => Err("missing constraint type".to_string()),
        };

        match parsed {
            Ok(constraint) => constraints.push(constraint),
            Err(reason) => skipped.push(SkippedRecord::new("constraints", row, reason)),
        }
    }

    (constraints, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn task(id: &str, duration: f64) -> TaskRecord {
        TaskRecord::new(id, duration)
    }

    #[test]
    fn field_value_coercion() {
        assert_eq!(FieldValue::from(" $1,250.5 ").as_f64(), Some(1250.5));
        assert_eq!(FieldValue::from("abc").as_f64(), None);
        assert_eq!(FieldValue::from("NaN").as_f64(), None);
        assert_eq!(FieldValue::Number(7.0).as_text(), Some("7".into()));
        assert!(FieldValue::from("Yes").is_truthy());
        assert!(FieldValue::from("x").is_truthy());
        assert!(!FieldValue::from("no").is_truthy());
        assert!(FieldValue::Number(1.0).is_truthy());
    }

    #[test]
    fn id_list_from_text_and_list() {
        assert_eq!(
            FieldValue::from("a, b,,c ").as_id_list(),
            vec!["a".to_string(), "b".into(), "c".into()]
        );
        let list = FieldValue::List(vec![FieldValue::from("a"), FieldValue::Number(12.0)]);
        assert_eq!(list.as_id_list(), vec!["a".to_string(), "12".into()]);
    }

    #[test]
    fn build_coerces_and_defaults() {
        let mut a = task("A", 7.0);
        a.capex_usd = Some("1000".into());
        a.is_production = Some("true".into());
        let mut b = task("B", 2.5);
        b.predecessor_ids = Some("A, missing, B".into());
        b.resource = Some("rig".into());
        b.resource_qty = Some(1.0.into());

        let model = ProjectModel::build(
            &[a, b],
            &[ResourceRecord {
                resource: Some("rig".into()),
                capacity_qty: Some("1".into()),
            }],
            &[],
            &RevenueRecord::default(),
        )
        .unwrap();

        let a = model.task("A").unwrap();
        assert_eq!(a.capex_usd, 1000.0);
        assert_eq!(a.name, "A");
        assert!(a.is_production);
        assert_eq!(a.opex_usd_per_day, 0.0);

        let b = model.task("B").unwrap();
        assert_eq!(b.duration_days, 3);
        assert_eq!(b.predecessors, vec!["A".to_string()]);
        assert_eq!(model.resource("rig").unwrap().capacity_qty, 1.0);
        assert!(model.skipped().is_empty());
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let mut bad_capex = task("C", 3.0);
        bad_capex.capex_usd = Some("lots".into());
        let mut negative = task("D", 3.0);
        negative.resource_qty = Some((-1.0).into());
        let rows = vec![
            task("A", 5.0),
            TaskRecord::default(),
            task("B", f64::NAN),
            bad_capex,
            negative,
            task("A", 9.0),
        ];

        let model = ProjectModel::build(&rows, &[], &[], &RevenueRecord::default()).unwrap();
        assert_eq!(model.tasks().len(), 1);
        assert_eq!(model.task("A").unwrap().duration_days, 5);

        let skipped_rows: Vec<usize> = model.skipped().iter().map(|s| s.row).collect();
        assert_eq!(skipped_rows, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn no_usable_tasks_is_fatal() {
        let rows = vec![TaskRecord::default(), task("", 3.0)];
        let err = ProjectModel::build(&rows, &[], &[], &RevenueRecord::default()).unwrap_err();
        assert!(matches!(err, InputError::NoUsableTasks(_)));
    }

    #[test]
    fn cycles_fail_fast() {
        let err = ProjectModel::new(
            vec![
                Task::new("a").duration_days(1).depends_on("c"),
                Task::new("b").duration_days(1).depends_on("a"),
                Task::new("c").duration_days(1).depends_on("b"),
                Task::new("d").duration_days(1),
            ],
            Vec::new(),
            Vec::new(),
            Revenue::None,
        )
        .unwrap_err();

        match err {
            InputError::CircularDependency(mut ids) => {
                ids.sort();
                assert_eq!(ids, vec!["a".to_string(), "b".into(), "c".into()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn budget_rows_keep_tighter_cap() {
        let budget = vec![
            BudgetRecord {
                period_index: Some(0.0.into()),
                capex_cap_usd: Some(5000.0.into()),
            },
            BudgetRecord {
                period_index: Some("0".into()),
                capex_cap_usd: Some(3000.0.into()),
            },
            BudgetRecord {
                period_index: Some(1.5.into()),
                capex_cap_usd: Some(10.0.into()),
            },
        ];
        let model =
            ProjectModel::build(&[task("A", 1.0)], &[], &budget, &RevenueRecord::default())
                .unwrap();
        assert_eq!(model.budget().get(&0), Some(&3000.0));
        assert_eq!(model.budget().len(), 1);
        assert_eq!(model.skipped().len(), 1);
    }

    #[test]
    fn revenue_table_wins_over_rate() {
        let revenue = RevenueRecord {
            table: vec![
                RevenueRow {
                    period_index: Some(0.0.into()),
                    revenue_usd: Some(1000.0.into()),
                },
                RevenueRow {
                    period_index: Some(1.0.into()),
                    revenue_usd: Some("500".into()),
                },
            ],
            per_active_day: Some(10.0.into()),
        };
        let model = ProjectModel::build(&[task("A", 1.0)], &[], &[], &revenue).unwrap();
        let expected: BTreeMap<PeriodIndex, f64> = [(0, 1000.0), (1, 500.0)].into_iter().collect();
        assert_eq!(model.revenue(), &Revenue::Table(expected));

        let rate_only = RevenueRecord {
            table: Vec::new(),
            per_active_day: Some(25.0.into()),
        };
        let model = ProjectModel::build(&[task("A", 1.0)], &[], &[], &rate_only).unwrap();
        assert_eq!(model.revenue(), &Revenue::PerActiveDay(25.0));

        let zero_rate = RevenueRecord {
            table: Vec::new(),
            per_active_day: Some(0.0.into()),
        };
        let model = ProjectModel::build(&[task("A", 1.0)], &[], &[], &zero_rate).unwrap();
        assert_eq!(model.revenue(), &Revenue::None);
    }

    #[test]
    fn hard_constraints_skip_bad_records() {
        let record = |pairs: &[(&str, FieldValue)]| -> ConstraintRecord {
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect()
        };
        let records = vec![
            record(&[
                ("type", "deadline".into()),
                ("task_id", "A".into()),
                ("period_index", 2.0.into()),
            ]),
            record(&[
                ("type", "budget_cap".into()),
                ("period_index", "1".into()),
                ("cap_usd", "2500".into()),
            ]),
            record(&[("type", "deadline".into()), ("task_id", "A".into())]),
            record(&[("type", "budget_cap".into()), ("period_index", 1.0.into())]),
            record(&[("type", "resource_swap".into())]),
            record(&[("task_id", "A".into())]),
            record(&[
                ("type", "deadline".into()),
                ("task_id", "A".into()),
                ("period_index", (-1.0).into()),
            ]),
        ];

        let (constraints, skipped) = parse_hard_constraints(&records);
        assert_eq!(
            constraints,
            vec![
                HardConstraint::Deadline {
                    task_id: "A".into(),
                    period_index: 2
                },
                HardConstraint::BudgetCap {
                    period_index: 1,
                    cap_usd: 2500.0
                },
            ]
        );
        assert_eq!(skipped.len(), 5);
        assert!(skipped.iter().all(|s| s.table == "constraints"));
    }

    #[test]
    fn far_future_periods_are_skipped() {
        let deadline: ConstraintRecord = [
            ("type".to_string(), FieldValue::from("deadline")),
            ("task_id".to_string(), "A".into()),
            ("period_index".to_string(), 1e20.into()),
        ]
        .into_iter()
        .collect();
        let (constraints, skipped) = parse_hard_constraints(&[deadline]);
        assert!(constraints.is_empty());
        assert!(skipped[0].reason.contains("at most"));

        let revenue = RevenueRecord {
            table: vec![
                RevenueRow {
                    period_index: Some(0.0.into()),
                    revenue_usd: Some(1.0.into()),
                },
                RevenueRow {
                    period_index: Some(((1u64 << 40) as f64).into()),
                    revenue_usd: Some(5.0.into()),
                },
            ],
            per_active_day: None,
        };
        let budget = vec![BudgetRecord {
            period_index: Some(((MAX_PERIOD_INDEX + 1) as f64).into()),
            capex_cap_usd: Some(10.0.into()),
        }];
        let model = ProjectModel::build(&[task("A", 1.0)], &[], &budget, &revenue).unwrap();
        let expected: BTreeMap<PeriodIndex, f64> = [(0, 1.0)].into_iter().collect();
        assert_eq!(model.revenue(), &Revenue::Table(expected));
        assert!(model.budget().is_empty());
        let tables: Vec<&str> = model.skipped().iter().map(|s| s.table.as_str()).collect();
        assert_eq!(tables, vec!["budget", "revenue"]);
    }
}
