//! Output rendering for CLI commands
//!
//! Text output is a fixed-width table meant for terminals; JSON output is
//! the serialized result types unchanged, so downstream tools see the same
//! field names as the library.

use clap::ValueEnum;
use serde::Serialize;

use phaseopt_core::{HardConstraint, ProjectModel, Revenue, SkippedRecord};
use phaseopt_solver::{OptimizationResult, SweepResult, SweepRow};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

// ============================================================================
// check
// ============================================================================

#[derive(Serialize)]
struct CheckSummary<'a> {
    tasks: usize,
    resources: usize,
    budget_periods: usize,
    revenue: &'static str,
    constraints: usize,
    skipped: Vec<&'a SkippedRecord>,
}

fn revenue_mode(revenue: &Revenue) -> &'static str {
    match revenue {
        Revenue::None => "none",
        Revenue::Table(_) => "table",
        Revenue::PerActiveDay(_) => "per_active_day",
    }
}

pub fn check(
    project: &ProjectModel,
    constraints: &[HardConstraint],
    skipped_constraints: &[SkippedRecord],
    format: OutputFormat,
) -> anyhow::Result<String> {
    let skipped: Vec<&SkippedRecord> = project
        .skipped()
        .iter()
        .chain(skipped_constraints)
        .collect();
    let summary = CheckSummary {
        tasks: project.tasks().len(),
        resources: project.resources().len(),
        budget_periods: project.budget().len(),
        revenue: revenue_mode(project.revenue()),
        constraints: constraints.len(),
        skipped,
    };

    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(&summary)?);
    }

    let mut out = String::new();
    out.push_str(&format!("Tasks:        {}\n", summary.tasks));
    out.push_str(&format!("Resources:    {}\n", summary.resources));
    out.push_str(&format!("Budget caps:  {}\n", summary.budget_periods));
    out.push_str(&format!("Revenue:      {}\n", summary.revenue));
    out.push_str(&format!("Constraints:  {}\n", summary.constraints));
    if summary.skipped.is_empty() {
        out.push_str("No rows skipped\n");
    } else {
        out.push_str(&format!("Skipped {} row(s):\n", summary.skipped.len()));
        for record in &summary.skipped {
            out.push_str(&format!("  {}\n", record));
        }
    }
    Ok(out)
}

// ============================================================================
// optimize
// ============================================================================

pub fn optimization(result: &OptimizationResult, format: OutputFormat) -> anyhow::Result<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(result)?);
    }

    let mut out = String::new();
    out.push_str(&format!("Status:   {}\n", result.status));
    out.push_str(&format!(
        "Horizon:  {} periods of {} days\n",
        result.horizon.num_periods, result.horizon.step_days
    ));
    let (Some(schedule), Some(metrics)) = (&result.schedule, &result.metrics) else {
        out.push_str("No schedule available\n");
        return Ok(out);
    };
    if let Some(objective) = result.objective_value {
        out.push_str(&format!("Objective: {:.6}\n", objective));
    }
    out.push_str(&format!(
        "NPV: {:.2}  TotalCost: {:.2}  Makespan: {} periods  Emissions: {:.3} tCO2e\n\n",
        metrics.npv, metrics.total_cost, metrics.makespan_periods, metrics.emissions_tco2e
    ));

    out.push_str(&format!(
        "{:<16} {:>6} {:>6} {:>8} {:>8}  {}\n",
        "Task", "Start", "Finish", "StartDay", "EndDay", "Resource"
    ));
    for row in &schedule.rows {
        out.push_str(&format!(
            "{:<16} {:>6} {:>6} {:>8} {:>8}  {}\n",
            row.task_id,
            row.start_period,
            row.finish_period,
            row.start_day,
            row.finish_day,
            row.resource.as_deref().unwrap_or("-")
        ));
    }

    if let Some(cashflow) = &result.cashflow {
        out.push_str(&format!(
            "\n{:<6} {:>12} {:>12} {:>12} {:>12}\n",
            "Period", "CAPEX", "OPEX", "Revenue", "Net"
        ));
        for row in &cashflow.rows {
            out.push_str(&format!(
                "{:<6} {:>12.2} {:>12.2} {:>12.2} {:>12.2}\n",
                row.period_index, row.capex_out, row.opex_out, row.revenue_in, row.net_cf
            ));
        }
    }
    Ok(out)
}

// ============================================================================
// sweep
// ============================================================================

#[derive(Serialize)]
struct SweepOutput<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    rows: Option<&'a [SweepRow]>,
    frontier: &'a [SweepRow],
    attempted: usize,
    dropped: usize,
    skipped: usize,
    cancelled: bool,
}

pub fn sweep(
    result: &SweepResult,
    frontier_only: bool,
    format: OutputFormat,
) -> anyhow::Result<String> {
    if format == OutputFormat::Json {
        let output = SweepOutput {
            rows: (!frontier_only).then_some(result.rows.as_slice()),
            frontier: &result.frontier,
            attempted: result.attempted,
            dropped: result.dropped,
            skipped: result.skipped,
            cancelled: result.cancelled,
        };
        return Ok(serde_json::to_string_pretty(&output)?);
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Solved {} of {} combination(s), {} dropped, {} skipped{}\n",
        result.rows.len(),
        result.attempted + result.skipped,
        result.dropped,
        result.skipped,
        if result.cancelled { " (stopped early)" } else { "" }
    ));
    if !frontier_only {
        out.push_str("\nAll results\n");
        push_rows(&mut out, &result.rows);
    }
    out.push_str(&format!("\nPareto frontier ({} row(s))\n", result.frontier.len()));
    push_rows(&mut out, &result.frontier);
    Ok(out)
}

fn push_rows(out: &mut String, rows: &[SweepRow]) {
    out.push_str(&format!(
        "{:>6} {:>6} {:>6} {:>6} {:>10} {:>14} {:>12} {:>8} {:>10}\n",
        "w_npv", "w_cost", "w_mk", "w_em", "objective", "NPV", "TotalCost", "Makespan", "tCO2e"
    ));
    for row in rows {
        out.push_str(&format!(
            "{:>6.3} {:>6.3} {:>6.3} {:>6.3} {:>10.6} {:>14.2} {:>12.2} {:>8} {:>10.3}\n",
            row.weights.npv(),
            row.weights.cost(),
            row.weights.makespan(),
            row.weights.emissions(),
            row.objective,
            row.metrics.npv,
            row.metrics.total_cost,
            row.metrics.makespan_periods,
            row.metrics.emissions_tco2e
        ));
    }
}
