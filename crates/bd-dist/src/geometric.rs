//! Geometric distribution (number of failures before the first
//! success).

use std::any::Any;

use bd_core::tensor::{map1, map2, IntoTensor, Tensor};
use bd_core::{Error, Result};
use rand::Rng;

use crate::constraint::Constraint;
use crate::distribution::{
    check_log_prob_shape, draw_elementwise, validate_params, Distribution,
};
use crate::math::{log_sigmoid, sigmoid};
use crate::param::BinaryParam;

/// Geometric distribution over `{0, 1, 2, ...}` with success
/// probability `probs` per trial.
///
/// `probs == 1` is a valid degenerate case (every draw is `0`);
/// `probs == 0` would place no mass anywhere and is rejected.
#[derive(Debug, Clone)]
pub struct Geometric {
    param: BinaryParam,
    batch_shape: Vec<usize>,
}

impl Geometric {
    /// Construct from success probabilities in `(0, 1]`.
    pub fn from_probs(probs: impl IntoTensor) -> Result<Self> {
        let probs = probs.into_tensor();
        if probs.iter().any(|&p| !(p > 0.0 && p <= 1.0)) {
            return Err(Error::Validation(
                "geometric probs must lie in the half-open interval (0, 1]".into(),
            ));
        }
        let batch_shape = probs.shape().to_vec();
        Ok(Self { param: BinaryParam::Probs(probs), batch_shape })
    }

    /// Construct from log-odds.
    pub fn from_logits(logits: impl IntoTensor) -> Result<Self> {
        let logits = logits.into_tensor();
        validate_params(&[("logits", &logits, &Constraint::Real)])?;
        let batch_shape = logits.shape().to_vec();
        Ok(Self { param: BinaryParam::Logits(logits), batch_shape })
    }

    /// Success probabilities (derived if constructed from logits).
    pub fn probs(&self) -> Tensor {
        self.param.probs()
    }

    /// Log-odds (derived if constructed from probs).
    pub fn logits(&self) -> Tensor {
        self.param.logits()
    }
}

impl Distribution for Geometric {
    fn batch_shape(&self) -> &[usize] {
        &self.batch_shape
    }

    fn support(&self) -> Constraint {
        Constraint::NonnegativeInteger
    }

    fn arg_constraints(&self) -> Vec<(&'static str, Constraint)> {
        vec![("probs", Constraint::UnitInterval)]
    }

    fn sample(&self, sample_shape: &[usize]) -> Result<Tensor> {
        // floor(ln U / ln(1-p)); ln(1-p) = -inf at p = 1 collapses every
        // draw to exactly 0.
        match &self.param {
            BinaryParam::Probs(p) => {
                draw_elementwise(sample_shape, &self.batch_shape, &[p], |rng, a| {
                    let u: f64 = rng.gen_range(f64::MIN_POSITIVE..1.0);
                    let denom = (-a[0]).ln_1p();
                    (u.ln() / denom).floor()
                })
            }
            BinaryParam::Logits(l) => {
                draw_elementwise(sample_shape, &self.batch_shape, &[l], |rng, a| {
                    let u: f64 = rng.gen_range(f64::MIN_POSITIVE..1.0);
                    let denom = (-sigmoid(a[0])).ln_1p();
                    (u.ln() / denom).floor()
                })
            }
        }
    }

    fn log_prob(&self, value: &Tensor) -> Result<Tensor> {
        check_log_prob_shape(value, &self.batch_shape, &[])?;
        match &self.param {
            BinaryParam::Probs(p) => map2(value, p, |k, p| {
                if k < 0.0 || k.fract() != 0.0 {
                    f64::NEG_INFINITY
                } else if k == 0.0 {
                    p.ln()
                } else {
                    k * (-p).ln_1p() + p.ln()
                }
            }),
            BinaryParam::Logits(l) => map2(value, l, |k, l| {
                if k < 0.0 || k.fract() != 0.0 {
                    f64::NEG_INFINITY
                } else if k == 0.0 {
                    log_sigmoid(l)
                } else {
                    k * log_sigmoid(-l) + log_sigmoid(l)
                }
            }),
        }
    }

    fn entropy(&self) -> Result<Tensor> {
        Ok(map1(&self.probs(), |p| {
            let q = 1.0 - p;
            let a = if p > 0.0 { -p * p.ln() } else { 0.0 };
            let b = if q > 0.0 { -q * q.ln() } else { 0.0 };
            (a + b) / p
        }))
    }

    fn mean(&self) -> Result<Tensor> {
        Ok(map1(&self.probs(), |p| (1.0 - p) / p))
    }

    fn variance(&self) -> Result<Tensor> {
        Ok(map1(&self.probs(), |p| (1.0 - p) / (p * p)))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use bd_core::tensor::item;

    #[test]
    fn test_zero_probability_is_rejected() {
        assert!(Geometric::from_probs(0.0).is_err());
        assert!(Geometric::from_probs(vec![0.5, 0.0]).is_err());
        assert!(Geometric::from_probs(1.0).is_ok());
    }

    #[test]
    fn test_degenerate_success_probability() {
        let d = Geometric::from_probs(1.0).unwrap();
        let s = d.sample(&[200]).unwrap();
        assert!(s.iter().all(|&v| v == 0.0));
        assert_eq!(item(&d.log_prob(&0.0.into_tensor()).unwrap()), 0.0);
        assert_eq!(
            item(&d.log_prob(&1.0.into_tensor()).unwrap()),
            f64::NEG_INFINITY
        );
    }

    #[test]
    fn test_pmf_values() {
        let d = Geometric::from_probs(0.25).unwrap();
        // P(k) = (1-p)^k p
        for k in 0..5 {
            let expect = 0.75_f64.powi(k) * 0.25;
            assert_relative_eq!(
                item(&d.log_prob(&f64::from(k).into_tensor()).unwrap()),
                expect.ln(),
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn test_mean_of_samples() {
        bd_core::rng::seed(23);
        let d = Geometric::from_probs(0.3).unwrap();
        let s = d.sample(&[40_000]).unwrap();
        let mean: f64 = s.iter().sum::<f64>() / s.len() as f64;
        assert_relative_eq!(mean, item(&d.mean().unwrap()), max_relative = 0.05);
    }

    #[test]
    fn test_non_integer_values_are_impossible() {
        let d = Geometric::from_probs(0.5).unwrap();
        assert_eq!(
            item(&d.log_prob(&1.5.into_tensor()).unwrap()),
            f64::NEG_INFINITY
        );
    }
}
