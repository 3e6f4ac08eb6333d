use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::{debug, warn};

use glpk_rust::{solve_ilps as glpk_solve_ilps, Status as GlpkStatus};

use crate::constraints::ConstraintSet;
use crate::convert::{from_minor_units, to_borrowed_objective, to_glpk_polyhedron};
use crate::domain::solver::{SolveOutcome, Solution, Solver, SolverError, UnsatCore};
use crate::models::SolverDirection;

const NO_TERMINAL_OUTPUT: bool = false;
// Deletion filtering re-solves once per constraint; cap the diagnostic work.
const MAX_CORE_PROBES: usize = 64;

/// GLPK solver implementation
pub struct GlpkSolver;

impl GlpkSolver {
    pub fn new() -> Self {
        GlpkSolver
    }
}

impl Default for GlpkSolver {
    fn default() -> Self {
        GlpkSolver::new()
    }
}

enum RawOutcome {
    Feasible {
        values: HashMap<String, i64>,
        objective: i32,
    },
    Infeasible,
}

fn status_name(status: &GlpkStatus) -> &'static str {
    match status {
        GlpkStatus::Undefined => "Undefined",
        GlpkStatus::Feasible => "Feasible",
        GlpkStatus::Infeasible => "Infeasible",
        GlpkStatus::NoFeasible => "NoFeasible",
        GlpkStatus::Optimal => "Optimal",
        GlpkStatus::Unbounded => "Unbounded",
        GlpkStatus::SimplexFailed => "SimplexFailed",
        GlpkStatus::MIPFailed => "MIPFailed",
        GlpkStatus::EmptySpace => "EmptySpace",
    }
}

/// Run GLPK on the subset of constraints flagged in `active`.
fn run_glpk(set: &ConstraintSet, active: &[bool]) -> Result<RawOutcome, SolverError> {
    // Keep owned IDs alive while GLPK borrows &str from them
    let id_storage: Vec<String> = set.variables.iter().map(|v| v.name.clone()).collect();
    let polyhedron = to_glpk_polyhedron(set, active, &id_storage)?;

    let borrowed_objective = to_borrowed_objective(&set.objective);
    let maximize = set.direction == SolverDirection::Maximize;

    // Solver expects &mut
    let mut mut_polyhedron = polyhedron;

    let solutions = glpk_solve_ilps(
        &mut mut_polyhedron,
        vec![borrowed_objective],
        maximize,
        NO_TERMINAL_OUTPUT,
    );

    let solution = solutions.into_iter().next().ok_or(SolverError::Backend {
        details: "GLPK returned no solution record".to_string(),
    })?;

    match solution.status {
        GlpkStatus::Optimal | GlpkStatus::Feasible => Ok(RawOutcome::Feasible {
            values: solution
                .solution
                .into_iter()
                .map(|(k, v)| (k.to_string(), i64::from(v)))
                .collect(),
            objective: solution.objective,
        }),
        GlpkStatus::Infeasible | GlpkStatus::NoFeasible | GlpkStatus::EmptySpace => {
            Ok(RawOutcome::Infeasible)
        }
        other => Err(SolverError::Backend {
            details: solution.error.unwrap_or_else(|| {
                format!("GLPK terminated with status {}", status_name(&other))
            }),
        }),
    }
}

/// Deletion filter: drop one constraint at a time; a constraint whose
/// removal makes the system feasible belongs to the minimal core.
fn extract_core(set: &ConstraintSet) -> UnsatCore {
    let n = set.constraints.len();
    if n == 0 || n > MAX_CORE_PROBES {
        return UnsatCore::default();
    }
    let mut active = vec![true; n];
    for i in 0..n {
        active[i] = false;
        match run_glpk(set, &active) {
            Ok(RawOutcome::Feasible { .. }) => active[i] = true,
            Ok(RawOutcome::Infeasible) => {}
            Err(err) => {
                warn!("unsat core probe failed: {err}");
                return UnsatCore::default();
            }
        }
    }
    UnsatCore {
        constraints: set
            .constraints
            .iter()
            .zip(&active)
            .filter(|(_, keep)| **keep)
            .map(|(constraint, _)| constraint.label.clone())
            .collect(),
    }
}

impl Solver for GlpkSolver {
    fn solve(
        &self,
        constraints: &ConstraintSet,
        timeout: Option<Duration>,
    ) -> Result<SolveOutcome, SolverError> {
        let started = Instant::now();
        let active = vec![true; constraints.constraints.len()];
        let raw = run_glpk(constraints, &active)?;

        // The call blocks and cannot be interrupted; a budget overrun is
        // detected after the fact and fails the invocation.
        let elapsed = started.elapsed();
        if let Some(limit) = timeout {
            if elapsed > limit {
                return Err(SolverError::Timeout {
                    elapsed_ms: elapsed.as_millis() as u64,
                    limit_ms: limit.as_millis() as u64,
                });
            }
        }

        match raw {
            RawOutcome::Feasible { values, objective } => {
                let mut solved = HashMap::with_capacity(constraints.variables.len());
                for var in &constraints.variables {
                    let minor = values.get(&var.name).copied().ok_or_else(|| {
                        SolverError::Backend {
                            details: format!("solution is missing variable {}", var.name),
                        }
                    })?;
                    let value = from_minor_units(minor);
                    if value < var.lower || value > var.upper {
                        return Err(SolverError::Backend {
                            details: format!(
                                "solved value {value} for {} violates bounds [{}, {}]",
                                var.name, var.lower, var.upper
                            ),
                        });
                    }
                    solved.insert(var.name.clone(), value);
                }
                debug!(
                    "{} solved {} variables / {} constraints in {} ms",
                    self.name(),
                    constraints.variables.len(),
                    constraints.constraints.len(),
                    elapsed.as_millis()
                );
                Ok(SolveOutcome::Satisfiable(Solution {
                    values: solved,
                    objective: from_minor_units(i64::from(objective)),
                }))
            }
            RawOutcome::Infeasible => {
                let core = extract_core(constraints);
                debug!(
                    "{} found the system infeasible; core has {} constraints",
                    self.name(),
                    core.constraints.len()
                );
                Ok(SolveOutcome::Unsatisfiable(core))
            }
        }
    }

    fn name(&self) -> &str {
        "GLPK"
    }
}
