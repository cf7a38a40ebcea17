//! Run and sweep configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::InputError;

/// Settings for a single optimization run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Days per period
    pub calendar_step_days: u32,
    /// Annual discount rate used for NPV
    pub discount_rate_annual: f64,
    /// Wall-clock limit per solve; expiry reports `NotSolved`
    pub solver_timeout_ms: Option<u64>,
    /// Multiplier on summed task durations when sizing the horizon
    pub horizon_slack: f64,
    /// Re-solves with a doubled horizon after an infeasible result
    pub horizon_retries: u32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            calendar_step_days: 7,
            discount_rate_annual: 0.10,
            solver_timeout_ms: None,
            horizon_slack: 1.5,
            horizon_retries: 1,
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), InputError> {
        if self.calendar_step_days == 0 {
            return Err(InputError::InvalidConfig(
                "calendar_step_days must be at least 1".into(),
            ));
        }
        if !self.discount_rate_annual.is_finite() || self.discount_rate_annual <= -1.0 {
            return Err(InputError::InvalidConfig(format!(
                "discount_rate_annual must be greater than -1, got {}",
                self.discount_rate_annual
            )));
        }
        if !self.horizon_slack.is_finite() || self.horizon_slack < 1.0 {
            return Err(InputError::InvalidConfig(format!(
                "horizon_slack must be at least 1.0, got {}",
                self.horizon_slack
            )));
        }
        Ok(())
    }

    pub fn solver_timeout(&self) -> Option<Duration> {
        self.solver_timeout_ms.map(Duration::from_millis)
    }
}

/// Settings for a Pareto sweep
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Grid resolution per free weight dimension
    pub steps: u32,
    /// Worker threads (defaults to available parallelism)
    pub threads: Option<usize>,
    /// Stop scheduling new combinations after this many
    pub max_iterations: Option<usize>,
    /// Stop scheduling new combinations after this much wall-clock time
    pub time_budget_ms: Option<u64>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            steps: 4,
            threads: None,
            max_iterations: None,
            time_budget_ms: None,
        }
    }
}

impl SweepConfig {
    pub fn validate(&self) -> Result<(), InputError> {
        if self.steps == 0 {
            return Err(InputError::InvalidConfig("sweep steps must be at least 1".into()));
        }
        if self.threads == Some(0) {
            return Err(InputError::InvalidConfig("sweep threads must be at least 1".into()));
        }
        Ok(())
    }

    pub fn time_budget(&self) -> Option<Duration> {
        self.time_budget_ms.map(Duration::from_millis)
    }
}
