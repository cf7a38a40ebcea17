//! Scenario files
//!
//! A scenario bundles everything one run needs: configuration, weights,
//! and the raw input tables. Cells stay loosely typed until
//! [`Scenario::build_model`] so that a bad row is skipped instead of
//! rejecting the whole file.
//!
//! ```toml
//! [run]
//! calendar_step_days = 7
//! discount_rate_annual = 0.10
//!
//! [weights]
//! npv = 1
//! makespan = 1
//!
//! [[tasks]]
//! task_id = "A"
//! duration_days = 7
//! capex_usd = 1000
//!
//! [[tasks]]
//! task_id = "B"
//! duration_days = 14
//! predecessor_ids = "A"
//!
//! [[constraints]]
//! type = "deadline"
//! task_id = "B"
//! period_index = 4
//! ```

use serde::Deserialize;
use std::path::Path;

use crate::input::{
    parse_hard_constraints, BudgetRecord, ConstraintRecord, ProjectModel, ResourceRecord,
    RevenueRecord, SkippedRecord, TaskRecord,
};
use crate::{HardConstraint, InputError, Proposal, Proposer, RunConfig, SweepConfig, Weights};

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub run: RunConfig,
    pub sweep: SweepConfig,
    pub weights: Weights,
    pub tasks: Vec<TaskRecord>,
    pub resources: Vec<ResourceRecord>,
    pub budget: Vec<BudgetRecord>,
    pub revenue: RevenueRecord,
    pub constraints: Vec<ConstraintRecord>,
}

impl Scenario {
    pub fn from_toml_str(content: &str) -> Result<Self, InputError> {
        let scenario: Scenario =
            toml::from_str(content).map_err(|e| InputError::Scenario(e.to_string()))?;
        scenario.run.validate()?;
        scenario.sweep.validate()?;
        Ok(scenario)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, InputError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn build_model(&self) -> Result<ProjectModel, InputError> {
        ProjectModel::build(&self.tasks, &self.resources, &self.budget, &self.revenue)
    }

    pub fn hard_constraints(&self) -> (Vec<HardConstraint>, Vec<SkippedRecord>) {
        parse_hard_constraints(&self.constraints)
    }
}

impl Proposer for Scenario {
    /// The scenario's own weights and well-formed constraints
    fn propose(&self, _model: &ProjectModel) -> Proposal {
        Proposal {
            weights: self.weights,
            constraints: self.hard_constraints().0,
        }
    }
}
