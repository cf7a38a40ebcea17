//! Horizon discretization
//!
//! The planning horizon is derived from the tasks, never configured:
//! `ceil(sum(max(1, duration_days)) * slack)` days, cut into periods of
//! `step_days` days. With the default 1.5 slack a fully sequential
//! schedule always fits.

use phaseopt_core::{PeriodIndex, ProjectModel};
use serde::Serialize;
use std::ops::Range;

/// Default multiplier on summed durations
pub const DEFAULT_SLACK: f64 = 1.5;

/// A finite run of equal-length periods
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Horizon {
    pub step_days: u32,
    pub horizon_days: u64,
    pub num_periods: usize,
}

impl Horizon {
    /// Size the horizon for a project
    pub fn for_project(project: &ProjectModel, step_days: u32, slack: f64) -> Self {
        let total_days = project.total_scheduled_days();
        let horizon_days = (total_days as f64 * slack.max(1.0)).ceil() as u64;
        Self::from_days(horizon_days, step_days)
    }

    /// Cover `horizon_days` with periods of `step_days` (at least one period)
    pub fn from_days(horizon_days: u64, step_days: u32) -> Self {
        let step = u64::from(step_days.max(1));
        let num_periods = horizon_days.div_ceil(step).max(1) as usize;
        Self {
            step_days: step_days.max(1),
            horizon_days,
            num_periods,
        }
    }

    /// Same step, `factor` times as many days
    pub fn enlarged(&self, factor: u64) -> Self {
        let days = self
            .horizon_days
            .max(self.num_periods as u64 * u64::from(self.step_days));
        Self::from_days(days.saturating_mul(factor.max(1)), self.step_days)
    }

    /// Grow to at least `periods` periods
    pub fn at_least(self, periods: usize) -> Self {
        if periods <= self.num_periods {
            return self;
        }
        Self::from_days(periods as u64 * u64::from(self.step_days), self.step_days)
    }

    /// Periods needed to run every task back to back
    pub fn sequential_periods(&self, project: &ProjectModel) -> usize {
        project
            .tasks()
            .iter()
            .map(|t| self.duration_periods(t.duration_days))
            .sum()
    }

    /// Periods a task of `duration_days` occupies (zero-day tasks occupy one)
    pub fn duration_periods(&self, duration_days: u32) -> usize {
        duration_days.max(1).div_ceil(self.step_days) as usize
    }

    pub fn periods(&self) -> Range<PeriodIndex> {
        0..self.num_periods
    }

    /// First calendar day of a period
    pub fn day_of(&self, period: PeriodIndex) -> u64 {
        period as u64 * u64::from(self.step_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phaseopt_core::{Revenue, Task};

    fn project(durations: &[u32]) -> ProjectModel {
        let tasks = durations
            .iter()
            .enumerate()
            .map(|(i, d)| Task::new(format!("t{i}")).duration_days(*d))
            .collect();
        ProjectModel::new(tasks, Vec::new(), Vec::new(), Revenue::None).unwrap()
    }

    #[test]
    fn sizes_from_summed_durations() {
        // 7 + 14 = 21 days * 1.5 = 31.5 -> 32 days -> 5 weekly periods
        let h = Horizon::for_project(&project(&[7, 14]), 7, DEFAULT_SLACK);
        assert_eq!(h.horizon_days, 32);
        assert_eq!(h.num_periods, 5);
    }

    #[test]
    fn zero_day_tasks_count_as_one() {
        let h = Horizon::for_project(&project(&[0, 0]), 1, DEFAULT_SLACK);
        assert_eq!(h.horizon_days, 3);
        assert_eq!(h.num_periods, 3);
        assert_eq!(h.duration_periods(0), 1);
    }

    #[test]
    fn duration_periods_round_up() {
        let h = Horizon::from_days(70, 7);
        assert_eq!(h.duration_periods(7), 1);
        assert_eq!(h.duration_periods(8), 2);
        assert_eq!(h.duration_periods(14), 2);
        assert_eq!(h.duration_periods(1), 1);
    }

    #[test]
    fn sequential_schedule_fits_period_aligned_tasks() {
        for durations in [&[7u32, 14, 21][..], &[28; 6], &[7]] {
            let h = Horizon::for_project(&project(durations), 7, DEFAULT_SLACK);
            let sequential = h.sequential_periods(&project(durations));
            assert!(
                sequential <= h.num_periods,
                "{durations:?}: {sequential} > {}",
                h.num_periods
            );
        }
    }

    #[test]
    fn sub_period_tasks_can_outgrow_day_based_horizon() {
        let p = project(&[1, 1, 1]);
        let h = Horizon::for_project(&p, 7, DEFAULT_SLACK);
        assert_eq!(h.num_periods, 1);
        assert_eq!(h.sequential_periods(&p), 3);
        assert_eq!(h.at_least(3).num_periods, 3);
        assert_eq!(h.at_least(1), h);
    }

    #[test]
    fn enlarging_doubles_days() {
        let h = Horizon::from_days(32, 7);
        let bigger = h.enlarged(2);
        assert_eq!(bigger.step_days, 7);
        assert_eq!(bigger.horizon_days, 70);
        assert_eq!(bigger.num_periods, 10);
        assert_eq!(bigger.day_of(3), 21);
    }
}
