use std::collections::HashMap;
use std::time::Duration;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::constraints::ConstraintSet;

/// A concrete value per price variable, keyed by variable name.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub values: HashMap<String, Decimal>,
    pub objective: Decimal,
}

/// Minimal subset of constraint labels that cannot be satisfied together.
/// Empty when the backend cannot produce one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnsatCore {
    pub constraints: Vec<String>,
}

/// Outcome of one solve: infeasibility is an expected result, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum SolveOutcome {
    Satisfiable(Solution),
    Unsatisfiable(UnsatCore),
}

/// Faults distinct from infeasibility. The constraint system is
/// deterministic, so none of these are retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SolverError {
    #[error("solver exceeded {limit_ms} ms wall clock ({elapsed_ms} ms elapsed)")]
    Timeout { elapsed_ms: u64, limit_ms: u64 },
    #[error("solver backend fault: {details}")]
    Backend { details: String },
    #[error("value {value} is not representable in exact minor units")]
    Precision { value: Decimal },
}

/// Common interface for constraint-solver backends.
pub trait Solver: Send + Sync {
    /// Solve one constraint system.
    ///
    /// # Arguments
    /// * `constraints` - The constraint set with variable bounds and objective
    /// * `timeout` - Optional wall-clock limit; exceeding it is a `SolverError`
    ///
    /// # Returns
    /// A satisfiable solution, a tagged unsatisfiable outcome with its
    /// diagnostic core, or a fatal `SolverError`.
    fn solve(
        &self,
        constraints: &ConstraintSet,
        timeout: Option<Duration>,
    ) -> Result<SolveOutcome, SolverError>;

    /// Get the solver name for logging/debugging
    fn name(&self) -> &str;
}
