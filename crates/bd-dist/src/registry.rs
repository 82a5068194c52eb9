//! Constraint-to-transform registries.
//!
//! [`biject_to`] returns a true bijection from unconstrained real space
//! onto the constrained space (used to reparameterize constrained
//! optimization variables); [`transform_to`] may relax bijectivity to a
//! cheaper surjection. Both dispatch on the constraint variant and its
//! parameters.

use bd_core::tensor::{map2, scalar, Tensor};
use bd_core::{Error, Result};

use crate::constraint::Constraint;
use crate::transforms::{
    identity_transform, AffineTransform, BoltzmannTransform, ComposeTransform, ExpTransform,
    LowerCholeskyTransform, SigmoidTransform, StickBreakingTransform, Transform,
};

/// A transform whose codomain is exactly `constraint` and which is a
/// true bijection from unconstrained space.
///
/// Discrete and unregistered constraints are `NotImplemented`.
pub fn biject_to(constraint: &Constraint) -> Result<Transform> {
    match constraint {
        Constraint::Simplex => Ok(Transform::new(StickBreakingTransform)),
        Constraint::LowerCholesky => Err(Error::NotImplemented(
            "biject_to for the lower-Cholesky constraint".into(),
        )),
        _ => shared_lookup(constraint),
    }
}

/// A transform whose codomain is `constraint`; a surjection with a
/// pseudo-inverse suffices.
///
/// Defined for every constraint `biject_to` handles, plus the
/// lower-Cholesky projection; the simplex case uses the cheaper softmax.
pub fn transform_to(constraint: &Constraint) -> Result<Transform> {
    match constraint {
        Constraint::Simplex => Ok(Transform::new(BoltzmannTransform)),
        Constraint::LowerCholesky => Ok(Transform::new(LowerCholeskyTransform)),
        _ => shared_lookup(constraint),
    }
}

fn shared_lookup(constraint: &Constraint) -> Result<Transform> {
    match constraint {
        Constraint::Real => Ok(identity_transform()),
        Constraint::Positive => Ok(Transform::new(ExpTransform)),
        Constraint::GreaterThan(lb) => Ok(compose(vec![
            Transform::new(ExpTransform),
            affine(lb.clone(), scalar(1.0))?,
        ])),
        Constraint::LessThan(ub) => Ok(compose(vec![
            Transform::new(ExpTransform),
            affine(ub.clone(), scalar(-1.0))?,
        ])),
        Constraint::UnitInterval => Ok(Transform::new(SigmoidTransform)),
        Constraint::Interval(lo, hi) => {
            let width = map2(hi, lo, |h, l| h - l)?;
            Ok(compose(vec![
                Transform::new(SigmoidTransform),
                affine(lo.clone(), width)?,
            ]))
        }
        other => Err(Error::NotImplemented(format!(
            "no canonical transform registered for constraint {:?}",
            other
        ))),
    }
}

fn affine(loc: Tensor, scale: Tensor) -> Result<Transform> {
    Ok(Transform::new(AffineTransform::new(loc, scale, 0)?))
}

fn compose(parts: Vec<Transform>) -> Transform {
    Transform::new(ComposeTransform::new(parts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use bd_core::tensor::IntoTensor;

    fn roundtrip(c: &Constraint, xs: &[f64]) {
        let t = biject_to(c).unwrap();
        let x = xs.to_vec().into_tensor();
        let y = t.forward(&x).unwrap();
        assert!(c.is_valid(&y).unwrap(), "{:?} not satisfied by {:?}", c, y);
        let back = t.inverse(&y).unwrap();
        for (a, b) in x.iter().zip(back.iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-8, max_relative = 1e-8);
        }
    }

    #[test]
    fn test_biject_to_roundtrips_into_support() {
        let xs = [-2.0, -0.3, 0.0, 0.7, 2.5];
        roundtrip(&Constraint::Real, &xs);
        roundtrip(&Constraint::Positive, &xs);
        roundtrip(&Constraint::GreaterThan(3.0.into_tensor()), &xs);
        roundtrip(&Constraint::LessThan((-1.0).into_tensor()), &xs);
        roundtrip(&Constraint::UnitInterval, &xs);
        roundtrip(
            &Constraint::Interval(2.0.into_tensor(), 5.0.into_tensor()),
            &xs,
        );
    }

    #[test]
    fn test_biject_to_simplex_is_stick_breaking() {
        let t = biject_to(&Constraint::Simplex).unwrap();
        assert!(t.bijective());
        let x = vec![0.5, -0.5, 1.0].into_tensor();
        let y = t.forward(&x).unwrap();
        assert!(Constraint::Simplex.is_valid(&y).unwrap());
        let back = t.inverse(&y).unwrap();
        for (a, b) in x.iter().zip(back.iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_transform_to_simplex_is_pseudo_invertible() {
        let t = transform_to(&Constraint::Simplex).unwrap();
        assert!(!t.bijective());
        let x = vec![1.0, 0.0, -1.0].into_tensor();
        let y = t.forward(&x).unwrap();
        let again = t.forward(&t.inverse(&y).unwrap()).unwrap();
        for (a, b) in y.iter().zip(again.iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_discrete_constraints_are_not_registered() {
        assert!(biject_to(&Constraint::Boolean).is_err());
        assert!(biject_to(&Constraint::NonnegativeInteger).is_err());
        assert!(transform_to(&Constraint::IntegerInterval(0, 3)).is_err());
    }

    #[test]
    fn test_lower_cholesky_is_transform_to_only() {
        assert!(biject_to(&Constraint::LowerCholesky).is_err());
        let t = transform_to(&Constraint::LowerCholesky).unwrap();
        let x = ndarray::arr2(&[[0.1, 2.0], [0.4, -0.3]]).into_dyn().into_shared();
        let y = t.forward(&x).unwrap();
        assert!(Constraint::LowerCholesky.is_valid(&y).unwrap());
    }

    #[test]
    fn test_codomain_matches_constraint() {
        let c = Constraint::Interval(2.0.into_tensor(), 5.0.into_tensor());
        let t = biject_to(&c).unwrap();
        // The composed transform lands in the interval; spot-check bounds.
        let y = t.forward(&vec![-50.0, 50.0].into_tensor()).unwrap();
        assert!(y.iter().all(|&v| (2.0..=5.0).contains(&v)));
    }
}
