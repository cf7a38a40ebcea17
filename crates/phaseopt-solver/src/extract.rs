//! Solution extraction: solved variable values to a [`ScheduleTable`]

use tracing::warn;

use phaseopt_core::{ProjectModel, ScheduleRow, ScheduleTable};

use crate::builder::ScheduleModel;

/// Values above this count as a set binary
pub const BINARY_THRESHOLD: f64 = 0.5;

/// Read start periods from a solved assignment.
///
/// A task with no start value above [`BINARY_THRESHOLD`] starts at period 0.
/// Rows are sorted by start period, finish period, then task ID.
pub fn extract(project: &ProjectModel, model: &ScheduleModel, values: &[f64]) -> ScheduleTable {
    let step = model.horizon.step_days;
    let value_of = |idx: usize| values.get(idx).copied().unwrap_or(0.0);

    let mut rows: Vec<ScheduleRow> = project
        .tasks()
        .iter()
        .enumerate()
        .map(|(t, task)| {
            let chosen = model
                .start_row(t)
                .map(|(p, var)| (p, value_of(var.index())))
                .filter(|&(_, v)| v > BINARY_THRESHOLD)
                .max_by(|a, b| a.1.total_cmp(&b.1).then(b.0.cmp(&a.0)))
                .map(|(p, _)| p);
            let start_period = chosen.unwrap_or_else(|| {
                warn!(task = %task.id, "no start period selected, defaulting to 0");
                0
            });
            let finish_period = start_period + model.duration_periods(t);
            ScheduleRow {
                task_id: task.id.clone(),
                name: task.name.clone(),
                start_period,
                finish_period,
                start_day: model.horizon.day_of(start_period),
                finish_day: model.horizon.day_of(finish_period),
                duration_days: task.duration_days,
                resource: task.resource.clone(),
                is_production: task.is_production,
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        a.start_period
            .cmp(&b.start_period)
            .then(a.finish_period.cmp(&b.finish_period))
            .then_with(|| a.task_id.cmp(&b.task_id))
    });

    ScheduleTable {
        step_days: step,
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build_model;
    use crate::horizon::Horizon;
    use phaseopt_core::{Revenue, Task, Weights};
    use pretty_assertions::assert_eq;

    fn setup() -> (ProjectModel, ScheduleModel) {
        let project = ProjectModel::new(
            vec![
                Task::new("b").duration_days(14),
                Task::new("a").duration_days(7).production(),
            ],
            Vec::new(),
            Vec::new(),
            Revenue::None,
        )
        .unwrap();
        let model = build_model(
            &project,
            &Weights::balanced(),
            &[],
            &Horizon::from_days(35, 7),
        );
        (project, model)
    }

    #[test]
    fn reads_starts_and_sorts_rows() {
        let (project, model) = setup();
        let mut values = vec![0.0; model.milp.num_vars()];
        values[model.start_var(0, 1).unwrap().index()] = 0.9999;
        values[model.start_var(1, 1).unwrap().index()] = 1.0;

        let table = extract(&project, &model, &values);
        let summary: Vec<(&str, usize, usize, u64, u64)> = table
            .rows
            .iter()
            .map(|r| {
                (
                    r.task_id.as_str(),
                    r.start_period,
                    r.finish_period,
                    r.start_day,
                    r.finish_day,
                )
            })
            .collect();
        assert_eq!(summary, vec![("a", 1, 2, 7, 14), ("b", 1, 3, 7, 21)]);
        assert!(table.get("a").unwrap().is_production);
        assert_eq!(table.makespan_periods(), 3);
    }

    #[test]
    fn missing_start_defaults_to_zero() {
        let (project, model) = setup();
        let mut values = vec![0.0; model.milp.num_vars()];
        values[model.start_var(0, 2).unwrap().index()] = 0.4;

        let table = extract(&project, &model, &values);
        assert_eq!(table.get("b").unwrap().start_period, 0);
        assert_eq!(table.get("b").unwrap().finish_period, 2);
        assert_eq!(table.get("a").unwrap().start_period, 0);
    }
}
