use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::debug;

use ::highs::{ColProblem, HighsModelStatus, Sense};

use crate::constraints::ConstraintSet;
use crate::convert::{from_minor_units, lower_constraint, variable_bounds, LoweredRow};
use crate::domain::solver::{SolveOutcome, Solution, Solver, SolverError, UnsatCore};
use crate::models::SolverDirection;

/// HiGHS solver implementation
pub struct HighsSolver;

impl HighsSolver {
    pub fn new() -> Self {
        HighsSolver
    }
}

impl Default for HighsSolver {
    fn default() -> Self {
        HighsSolver::new()
    }
}

impl Solver for HighsSolver {
    fn solve(
        &self,
        constraints: &ConstraintSet,
        timeout: Option<Duration>,
    ) -> Result<SolveOutcome, SolverError> {
        let started = Instant::now();

        let mut lowered: Vec<LoweredRow> = Vec::new();
        for constraint in &constraints.constraints {
            lowered.extend(lower_constraint(constraint)?);
        }
        let bounds = variable_bounds(constraints)?;

        let mut problem = ColProblem::new();

        // First, add all constraint rows
        let mut rows = Vec::with_capacity(lowered.len());
        for row in &lowered {
            rows.push(problem.add_row(..=f64::from(row.rhs)));
        }

        // Build sparse matrix data: for each column, collect its row entries
        let n_cols = constraints.variables.len();
        let mut col_data: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n_cols];
        for (row_idx, row) in lowered.iter().enumerate() {
            for (col, coeff) in &row.terms {
                if *col < n_cols {
                    col_data[*col].push((row_idx, f64::from(*coeff)));
                }
            }
        }

        for (col_idx, var) in constraints.variables.iter().enumerate() {
            let obj_coeff = constraints.objective.get(&var.name).copied().unwrap_or(0.0);
            let (lower, upper) = bounds[col_idx];
            let row_factors: Vec<_> = col_data[col_idx]
                .iter()
                .map(|(row_idx, val)| (rows[*row_idx], *val))
                .collect();
            problem.add_integer_column(
                obj_coeff,
                f64::from(lower)..=f64::from(upper),
                &row_factors,
            );
        }

        let sense = match constraints.direction {
            SolverDirection::Maximize => Sense::Maximise,
            SolverDirection::Minimize => Sense::Minimise,
        };

        // Solve the problem with presolve disabled
        let mut model = problem.optimise(sense);
        model.set_option("presolve", "off");
        let solved = model.solve();

        let elapsed = started.elapsed();
        if let Some(limit) = timeout {
            if elapsed > limit {
                return Err(SolverError::Timeout {
                    elapsed_ms: elapsed.as_millis() as u64,
                    limit_ms: limit.as_millis() as u64,
                });
            }
        }

        match solved.status() {
            HighsModelStatus::Optimal => {
                let columns = solved.get_solution().columns().to_vec();
                let mut values = HashMap::with_capacity(n_cols);
                let mut objective_minor = 0.0f64;
                for (col_idx, var) in constraints.variables.iter().enumerate() {
                    let minor = columns.get(col_idx).copied().unwrap_or(0.0).round() as i64;
                    let coeff = constraints.objective.get(&var.name).copied().unwrap_or(0.0);
                    objective_minor += coeff * minor as f64;
                    values.insert(var.name.clone(), from_minor_units(minor));
                }
                debug!(
                    "{} solved {} variables / {} rows in {} ms",
                    self.name(),
                    n_cols,
                    lowered.len(),
                    elapsed.as_millis()
                );
                Ok(SolveOutcome::Satisfiable(Solution {
                    values,
                    objective: from_minor_units(objective_minor.round() as i64),
                }))
            }
            // HiGHS exposes no unsatisfiable core; report the outcome bare.
            HighsModelStatus::Infeasible => Ok(SolveOutcome::Unsatisfiable(UnsatCore::default())),
            other => Err(SolverError::Backend {
                details: format!("HiGHS terminated with status {other:?}"),
            }),
        }
    }

    fn name(&self) -> &str {
        "HiGHS"
    }
}
