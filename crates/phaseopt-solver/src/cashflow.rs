//! Cash flow and NPV valuation of a solved schedule
//!
//! Every active period is charged in full: OPEX and emissions accrue at
//! `rate_per_day * step_days` for each period a task occupies.

use std::collections::HashMap;

use phaseopt_core::{
    CashflowRow, CashflowTable, Metrics, PeriodIndex, ProjectModel, Revenue, ScheduleTable,
    MAX_PERIOD_INDEX,
};

/// Per-period discount rate equivalent to an annual rate
pub fn per_period_rate(annual_rate: f64, step_days: u32) -> f64 {
    let periods_per_year = (365.0 / f64::from(step_days.max(1))).max(1.0);
    (1.0 + annual_rate).powf(1.0 / periods_per_year) - 1.0
}

/// Book CAPEX, OPEX and revenue per period.
///
/// The table covers every period from 0 through the later of the makespan
/// and the last explicit revenue period. Revenue periods beyond
/// [`MAX_PERIOD_INDEX`] get a row of their own after the contiguous span.
pub fn cashflow_table(project: &ProjectModel, schedule: &ScheduleTable) -> CashflowTable {
    let step = f64::from(schedule.step_days);
    let last_revenue = match project.revenue() {
        Revenue::Table(table) => table
            .range(..=MAX_PERIOD_INDEX)
            .next_back()
            .map(|(p, _)| p + 1)
            .unwrap_or(0),
        Revenue::None | Revenue::PerActiveDay(_) => 0,
    };
    let span = schedule.makespan_periods().max(last_revenue);

    let mut rows: Vec<CashflowRow> = (0..span)
        .map(|period_index| CashflowRow {
            period_index,
            ..CashflowRow::default()
        })
        .collect();
    if let Revenue::Table(table) = project.revenue() {
        rows.extend(table.range(span..).map(|(&period_index, _)| CashflowRow {
            period_index,
            ..CashflowRow::default()
        }));
    }

    for entry in &schedule.rows {
        let Some(task) = project.task(&entry.task_id) else {
            continue;
        };
        if let Some(row) = rows.get_mut(entry.start_period) {
            row.capex_out += task.capex_usd;
        }
        for row in rows
            .iter_mut()
            .take(entry.finish_period)
            .skip(entry.start_period)
        {
            row.opex_out += task.opex_usd_per_day * step;
        }
    }

    match project.revenue() {
        Revenue::Table(table) => {
            for (period, amount) in table {
                let row = if *period < span {
                    rows.get_mut(*period)
                } else {
                    rows[span..].iter_mut().find(|r| r.period_index == *period)
                };
                if let Some(row) = row {
                    row.revenue_in += amount;
                }
            }
        }
        Revenue::PerActiveDay(rate) if *rate > 0.0 => {
            for row in rows.iter_mut() {
                let producing = schedule
                    .rows
                    .iter()
                    .any(|r| r.is_production && r.is_active(row.period_index));
                if producing {
                    row.revenue_in += rate * step;
                }
            }
        }
        Revenue::PerActiveDay(_) | Revenue::None => {}
    }

    for row in &mut rows {
        row.net_cf = row.revenue_in - (row.capex_out + row.opex_out);
    }
    CashflowTable { rows }
}

/// Net present value of `net_cf`, discounted by period index
pub fn npv(cashflow: &CashflowTable, annual_rate: f64, step_days: u32) -> f64 {
    let rate = per_period_rate(annual_rate, step_days);
    let mut by_period: HashMap<PeriodIndex, f64> = HashMap::new();
    for row in &cashflow.rows {
        *by_period.entry(row.period_index).or_insert(0.0) += row.net_cf;
    }
    let mut periods: Vec<PeriodIndex> = by_period.keys().copied().collect();
    periods.sort_unstable();
    periods
        .into_iter()
        .map(|p| by_period[&p] / (1.0 + rate).powf(p as f64))
        .sum()
}

/// Total emissions over every active period
pub fn emissions(project: &ProjectModel, schedule: &ScheduleTable) -> f64 {
    let step = f64::from(schedule.step_days);
    schedule
        .rows
        .iter()
        .filter_map(|r| {
            project.task(&r.task_id).map(|task| {
                let periods = (r.finish_period - r.start_period) as f64;
                task.emissions_tco2e_per_day * step * periods
            })
        })
        .sum()
}

pub fn metrics(
    project: &ProjectModel,
    schedule: &ScheduleTable,
    cashflow: &CashflowTable,
    npv: f64,
) -> Metrics {
    Metrics {
        npv,
        total_cost: cashflow.total_cost(),
        makespan_periods: schedule.makespan_periods(),
        emissions_tco2e: emissions(project, schedule),
    }
}
