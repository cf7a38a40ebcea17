//! Pluggable MILP backends
//!
//! A backend receives a solver-agnostic [`MilpModel`] and returns a status
//! plus one value per variable. The pure-Rust `microlp` backend is always
//! available; the `pumpkin` constraint-programming backend is compiled in
//! with the `cp-solver` feature.

use std::sync::Arc;
use std::time::Duration;

use phaseopt_core::SolveStatus;

use crate::milp::MilpModel;
use crate::SolveError;

#[cfg(feature = "cp-solver")]
pub mod cp;
pub mod microlp;

#[cfg(feature = "cp-solver")]
pub use cp::CpBackend;
pub use microlp::MicroLpBackend;

/// Per-solve limits
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SolveOptions {
    pub time_limit: Option<Duration>,
}

/// Raw backend result
#[derive(Clone, Debug, PartialEq)]
pub struct SolveOutcome {
    pub status: SolveStatus,
    /// One value per model variable; empty unless the status has a solution
    pub values: Vec<f64>,
}

impl SolveOutcome {
    pub fn without_solution(status: SolveStatus) -> Self {
        Self {
            status,
            values: Vec::new(),
        }
    }
}

/// A MILP solver the optimizer can delegate to
pub trait SolverBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Solve the model.
    ///
    /// Infeasibility, unboundedness and timeouts are statuses, not errors.
    /// `Err` is reserved for backend failures.
    fn solve(&self, model: &MilpModel, options: &SolveOptions) -> Result<SolveOutcome, SolveError>;
}

/// The backend used when none is configured
pub fn default_backend() -> Arc<dyn SolverBackend> {
    Arc::new(MicroLpBackend)
}

/// Look a backend up by name
pub fn backend_by_name(name: &str) -> Result<Arc<dyn SolverBackend>, SolveError> {
    match name {
        "microlp" => Ok(Arc::new(MicroLpBackend)),
        #[cfg(feature = "cp-solver")]
        "cp" | "pumpkin" => Ok(Arc::new(CpBackend::default())),
        other => Err(SolveError::SolverUnavailable(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_backends() {
        assert_eq!(default_backend().name(), "microlp");
        assert_eq!(backend_by_name("microlp").unwrap().name(), "microlp");
        assert!(matches!(
            backend_by_name("cplex"),
            Err(SolveError::SolverUnavailable(name)) if name == "cplex"
        ));
    }
}
