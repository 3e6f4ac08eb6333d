use std::collections::HashMap;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use glpk_rust::{
    Bound, IntegerSparseMatrix as GlpkMatrix, SparseLEIntegerPolyhedron as GlpkPoly,
    Variable as GlpkVar,
};

use crate::constraints::{Constraint, ConstraintSense, ConstraintSet};
use crate::domain::solver::SolverError;
use crate::models::ObjectiveOwned;

/// Prices are lowered to integer minor units (two decimal places) so the
/// solver works on exact quantities.
pub const PRICE_SCALE: u32 = 2;

fn scale_factor() -> Decimal {
    Decimal::from(10i64.pow(PRICE_SCALE))
}

/// Whether a value is representable in minor units without loss.
pub fn fits_minor_units(value: Decimal) -> bool {
    (value * scale_factor()).fract().is_zero()
}

pub fn to_minor_units(value: Decimal) -> Result<i32, SolverError> {
    let scaled = value * scale_factor();
    if !scaled.fract().is_zero() {
        return Err(SolverError::Precision { value });
    }
    scaled.to_i32().ok_or(SolverError::Precision { value })
}

pub fn from_minor_units(value: i64) -> Decimal {
    Decimal::new(value, PRICE_SCALE)
}

/// Constraint coefficients multiply money variables, so they must already be
/// integers; only the right-hand side carries money units.
fn to_integer_coeff(value: Decimal) -> Result<i32, SolverError> {
    if !value.fract().is_zero() {
        return Err(SolverError::Precision { value });
    }
    value.to_i32().ok_or(SolverError::Precision { value })
}

/// One `a . x <= rhs` row in solver units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoweredRow {
    pub terms: Vec<(usize, i32)>,
    pub rhs: i32,
}

/// Normalize a constraint to less-equal rows: GE rows are negated, EQ rows
/// split into a LE/GE pair.
pub fn lower_constraint(constraint: &Constraint) -> Result<Vec<LoweredRow>, SolverError> {
    let mut terms = Vec::with_capacity(constraint.terms.len());
    for (col, coeff) in &constraint.terms {
        terms.push((*col, to_integer_coeff(*coeff)?));
    }
    let rhs = to_minor_units(constraint.rhs)?;
    let negated = |terms: &[(usize, i32)], rhs: i32| LoweredRow {
        terms: terms.iter().map(|&(col, coeff)| (col, -coeff)).collect(),
        rhs: -rhs,
    };
    Ok(match constraint.sense {
        ConstraintSense::LessEqual => vec![LoweredRow { terms, rhs }],
        ConstraintSense::GreaterEqual => vec![negated(&terms, rhs)],
        ConstraintSense::Equal => {
            let le = LoweredRow {
                terms: terms.clone(),
                rhs,
            };
            vec![le, negated(&terms, rhs)]
        }
    })
}

/// Lower the variable bounds of a constraint set to solver units.
pub fn variable_bounds(set: &ConstraintSet) -> Result<Vec<Bound>, SolverError> {
    set.variables
        .iter()
        .map(|var| Ok((to_minor_units(var.lower)?, to_minor_units(var.upper)?)))
        .collect()
}

/// Build a GLPK LE polyhedron from a constraint set, skipping constraints
/// whose `active` flag is cleared (used for unsat-core probing). The caller
/// keeps `id_storage` alive while GLPK borrows variable ids from it.
pub fn to_glpk_polyhedron<'a>(
    set: &ConstraintSet,
    active: &[bool],
    id_storage: &'a [String],
) -> Result<GlpkPoly<'a>, SolverError> {
    let mut rows: Vec<i32> = Vec::new();
    let mut cols: Vec<i32> = Vec::new();
    let mut vals: Vec<i32> = Vec::new();
    let mut b: Vec<Bound> = Vec::new();

    let mut row_idx: i32 = 0;
    for (i, constraint) in set.constraints.iter().enumerate() {
        if !active.get(i).copied().unwrap_or(true) {
            continue;
        }
        for lowered in lower_constraint(constraint)? {
            for (col, coeff) in &lowered.terms {
                rows.push(row_idx);
                cols.push(*col as i32);
                vals.push(*coeff);
            }
            b.push((0, lowered.rhs));
            row_idx += 1;
        }
    }

    let bounds = variable_bounds(set)?;
    let variables: Vec<GlpkVar<'a>> = set
        .variables
        .iter()
        .zip(id_storage.iter())
        .zip(bounds)
        .map(|((_, id), bound)| GlpkVar {
            id: id.as_str(),
            bound,
        })
        .collect();

    Ok(GlpkPoly {
        a: GlpkMatrix { rows, cols, vals },
        b,
        variables,
        double_bound: false,
    })
}

pub fn to_borrowed_objective(obj: &ObjectiveOwned) -> HashMap<&str, f64> {
    obj.iter().map(|(k, v)| (k.as_str(), *v)).collect()
}
