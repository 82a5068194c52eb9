//! Validity constraints over tensor values.
//!
//! A [`Constraint`] is a predicate checked over the trailing
//! `event_dim()` axes of a value jointly: 0 for scalar predicates, 1 for
//! the simplex, 2 for the triangular matrix constraints. Distributions
//! declare one constraint per parameter and one for their support;
//! [`crate::registry::biject_to`] maps constraints to canonical
//! transforms.

use bd_core::tensor::{broadcast_shapes, Tensor};
use bd_core::{Error, Result};
use ndarray::{ArrayD, IxDyn, Zip};

/// Tolerance for the simplex normalization check.
const SIMPLEX_ATOL: f64 = 1e-6;

/// A predicate over tensor values.
///
/// Parameterized variants compare equal iff their parameters are equal
/// elementwise.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// Placeholder for a constraint whose satisfiability depends on a
    /// parameter not locally known (e.g. `Uniform.low` depends on
    /// `high`). Never checked eagerly.
    Dependent,
    /// `{0, 1}`.
    Boolean,
    /// Integers `>= 0`.
    NonnegativeInteger,
    /// Integers in `[lo, hi]` inclusive.
    IntegerInterval(i64, i64),
    /// All of `R`.
    Real,
    /// `(0, inf)`.
    Positive,
    /// `(lb, inf)` elementwise.
    GreaterThan(Tensor),
    /// `(-inf, ub)` elementwise.
    LessThan(Tensor),
    /// `[0, 1]`.
    UnitInterval,
    /// `[lo, hi]` elementwise.
    Interval(Tensor, Tensor),
    /// Nonnegative vectors summing to 1 along the last axis.
    Simplex,
    /// Square lower-triangular matrices (trailing two axes).
    LowerTriangular,
    /// Lower-triangular matrices with positive diagonal.
    LowerCholesky,
}

impl Constraint {
    /// Whether the constrained space is countable.
    pub fn is_discrete(&self) -> bool {
        matches!(
            self,
            Constraint::Boolean
                | Constraint::NonnegativeInteger
                | Constraint::IntegerInterval(_, _)
        )
    }

    /// Number of trailing axes that form one jointly-checked event.
    pub fn event_dim(&self) -> usize {
        match self {
            Constraint::Simplex => 1,
            Constraint::LowerTriangular | Constraint::LowerCholesky => 2,
            _ => 0,
        }
    }

    /// Check the constraint, returning one boolean per event.
    ///
    /// The result shape is `value.shape()` minus the trailing
    /// `event_dim()` axes. [`Constraint::Dependent`] cannot be checked.
    pub fn check(&self, value: &Tensor) -> Result<ArrayD<bool>> {
        match self {
            Constraint::Dependent => Err(Error::Validation(
                "cannot determine validity of a dependent constraint".into(),
            )),
            Constraint::Boolean => Ok(check_scalar(value, |v| v == 0.0 || v == 1.0)),
            Constraint::NonnegativeInteger => {
                Ok(check_scalar(value, |v| v >= 0.0 && v.fract() == 0.0))
            }
            Constraint::IntegerInterval(lo, hi) => {
                let (lo, hi) = (*lo as f64, *hi as f64);
                Ok(check_scalar(value, move |v| {
                    v.fract() == 0.0 && v >= lo && v <= hi
                }))
            }
            Constraint::Real => Ok(check_scalar(value, |v| v.is_finite())),
            Constraint::Positive => Ok(check_scalar(value, |v| v > 0.0)),
            Constraint::GreaterThan(lb) => check_scalar2(value, lb, |v, b| v > b),
            Constraint::LessThan(ub) => check_scalar2(value, ub, |v, b| v < b),
            Constraint::UnitInterval => Ok(check_scalar(value, |v| (0.0..=1.0).contains(&v))),
            Constraint::Interval(lo, hi) => {
                let ge = check_scalar2(value, lo, |v, b| v >= b)?;
                let le = check_scalar2(value, hi, |v, b| v <= b)?;
                Ok(Zip::from(&ge).and(&le).map_collect(|&a, &b| a && b))
            }
            Constraint::Simplex => check_rows(value, |row| {
                let sum: f64 = row.iter().sum();
                row.iter().all(|&v| v >= 0.0) && (sum - 1.0).abs() < SIMPLEX_ATOL
            }),
            Constraint::LowerTriangular => check_matrices(value, |m| {
                upper_is_zero(m)
            }),
            Constraint::LowerCholesky => check_matrices(value, |m| {
                upper_is_zero(m) && (0..m.nrows()).all(|i| m[(i, i)] > 0.0)
            }),
        }
    }

    /// Whether every event of `value` satisfies the constraint.
    pub fn is_valid(&self, value: &Tensor) -> Result<bool> {
        Ok(self.check(value)?.iter().all(|&b| b))
    }
}

fn check_scalar(value: &Tensor, pred: impl Fn(f64) -> bool) -> ArrayD<bool> {
    value.map(|&v| pred(v))
}

fn check_scalar2(
    value: &Tensor,
    bound: &Tensor,
    pred: impl Fn(f64, f64) -> bool,
) -> Result<ArrayD<bool>> {
    let common = broadcast_shapes(value.shape(), bound.shape())?;
    let va = value
        .broadcast(IxDyn(&common))
        .ok_or_else(|| Error::Validation("value does not broadcast against bound".into()))?;
    let vb = bound
        .broadcast(IxDyn(&common))
        .ok_or_else(|| Error::Validation("bound does not broadcast against value".into()))?;
    Ok(Zip::from(&va).and(&vb).map_collect(|&v, &b| pred(v, b)))
}

fn check_rows(value: &Tensor, pred: impl Fn(&[f64]) -> bool) -> Result<ArrayD<bool>> {
    if value.ndim() < 1 {
        return Err(Error::Validation(
            "simplex constraint needs at least one axis".into(),
        ));
    }
    let k = value.shape()[value.ndim() - 1];
    let lead: Vec<usize> = value.shape()[..value.ndim() - 1].to_vec();
    let n: usize = lead.iter().product();
    let flat = value
        .to_owned()
        .into_shape((n, k))
        .map_err(|e| Error::Computation(e.to_string()))?;
    let out: Vec<bool> = (0..n).map(|i| pred(flat.row(i).as_slice().unwrap_or(&[]))).collect();
    // Rows of a standard-layout 2-d array are contiguous, so as_slice
    // above cannot fail; the fallback keeps the closure total.
    ArrayD::from_shape_vec(IxDyn(&lead), out).map_err(|e| Error::Computation(e.to_string()))
}

fn check_matrices(
    value: &Tensor,
    pred: impl Fn(&ndarray::ArrayView2<f64>) -> bool,
) -> Result<ArrayD<bool>> {
    if value.ndim() < 2 {
        return Err(Error::Validation(
            "matrix constraint needs at least two axes".into(),
        ));
    }
    let (r, c) = (value.shape()[value.ndim() - 2], value.shape()[value.ndim() - 1]);
    if r != c {
        return Err(Error::Validation(format!(
            "matrix constraint needs square trailing axes, got {}x{}",
            r, c
        )));
    }
    let lead: Vec<usize> = value.shape()[..value.ndim() - 2].to_vec();
    let n: usize = lead.iter().product();
    let flat = value
        .to_owned()
        .into_shape((n, r, c))
        .map_err(|e| Error::Computation(e.to_string()))?;
    let out: Vec<bool> = (0..n)
        .map(|i| pred(&flat.index_axis(ndarray::Axis(0), i)))
        .collect();
    ArrayD::from_shape_vec(IxDyn(&lead), out).map_err(|e| Error::Computation(e.to_string()))
}

fn upper_is_zero(m: &ndarray::ArrayView2<f64>) -> bool {
    for i in 0..m.nrows() {
        for j in (i + 1)..m.ncols() {
            if m[(i, j)] != 0.0 {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use bd_core::tensor::IntoTensor;
    use ndarray::arr2;

    #[test]
    fn test_scalar_constraints() {
        let v = vec![0.0, 0.5, 1.0].into_tensor();
        assert!(Constraint::UnitInterval.is_valid(&v).unwrap());
        assert!(!Constraint::Positive.is_valid(&v).unwrap());
        assert!(!Constraint::Boolean.is_valid(&v).unwrap());
        assert!(Constraint::Boolean
            .is_valid(&vec![0.0, 1.0].into_tensor())
            .unwrap());
    }

    #[test]
    fn test_integer_constraints() {
        let v = vec![0.0, 3.0, 7.0].into_tensor();
        assert!(Constraint::NonnegativeInteger.is_valid(&v).unwrap());
        assert!(Constraint::IntegerInterval(0, 7).is_valid(&v).unwrap());
        assert!(!Constraint::IntegerInterval(0, 6).is_valid(&v).unwrap());
        assert!(!Constraint::NonnegativeInteger
            .is_valid(&vec![1.5].into_tensor())
            .unwrap());
    }

    #[test]
    fn test_parameterized_bounds_broadcast() {
        let lb = vec![0.0, 2.0].into_tensor();
        let v = vec![1.0, 3.0].into_tensor();
        assert!(Constraint::GreaterThan(lb.clone()).is_valid(&v).unwrap());
        let checks = Constraint::GreaterThan(lb).check(&vec![1.0, 1.0].into_tensor()).unwrap();
        assert_eq!(checks.iter().cloned().collect::<Vec<_>>(), vec![true, false]);
    }

    #[test]
    fn test_simplex_event_reduction() {
        let v = arr2(&[[0.2, 0.8], [0.5, 0.6]]).into_dyn().into_shared();
        let checks = Constraint::Simplex.check(&v).unwrap();
        assert_eq!(checks.shape(), &[2]);
        assert!(checks[[0]]);
        assert!(!checks[[1]]);
        assert_eq!(Constraint::Simplex.event_dim(), 1);
    }

    #[test]
    fn test_lower_cholesky() {
        let good = arr2(&[[1.0, 0.0], [0.5, 2.0]]).into_dyn().into_shared();
        let bad = arr2(&[[1.0, 0.3], [0.5, 2.0]]).into_dyn().into_shared();
        let neg = arr2(&[[1.0, 0.0], [0.5, -2.0]]).into_dyn().into_shared();
        assert!(Constraint::LowerCholesky.is_valid(&good).unwrap());
        assert!(!Constraint::LowerCholesky.is_valid(&bad).unwrap());
        assert!(Constraint::LowerTriangular.is_valid(&neg).unwrap());
        assert!(!Constraint::LowerCholesky.is_valid(&neg).unwrap());
    }

    #[test]
    fn test_dependent_is_never_checked() {
        assert!(Constraint::Dependent.check(&0.5.into_tensor()).is_err());
    }

    #[test]
    fn test_equality_by_parameters() {
        let a = Constraint::GreaterThan(1.0.into_tensor());
        let b = Constraint::GreaterThan(1.0.into_tensor());
        let c = Constraint::GreaterThan(2.0.into_tensor());
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
