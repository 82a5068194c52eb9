//! Bernoulli distribution.

use std::any::Any;

use bd_ad::Dual;
use bd_core::tensor::{map1, map2, IntoTensor, Tensor};
use bd_core::{Error, Result};
use ndarray::{ArrayD, IxDyn};
use rand::Rng;

use crate::constraint::Constraint;
use crate::distribution::{
    check_log_prob_shape, draw_elementwise, validate_params, Distribution,
};
use crate::exp_family::ExponentialFamily;
use crate::math::{log_sigmoid, sigmoid};
use crate::param::BinaryParam;

/// Bernoulli distribution, parameterized by either `probs` or `logits`
/// (mutually exclusive; the other representation is derived on read).
#[derive(Debug, Clone)]
pub struct Bernoulli {
    param: BinaryParam,
    batch_shape: Vec<usize>,
}

impl Bernoulli {
    /// Construct from success probabilities in `[0, 1]`.
    pub fn from_probs(probs: impl IntoTensor) -> Result<Self> {
        let probs = probs.into_tensor();
        validate_params(&[("probs", &probs, &Constraint::UnitInterval)])?;
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

    /// Whether the stored representation is `probs`.
    pub fn holds_probs(&self) -> bool {
        self.param.is_probs()
    }
}

impl Distribution for Bernoulli {
    fn batch_shape(&self) -> &[usize] {
        &self.batch_shape
    }

    fn support(&self) -> Constraint {
        Constraint::Boolean
    }

    fn arg_constraints(&self) -> Vec<(&'static str, Constraint)> {
        vec![("probs", Constraint::UnitInterval)]
    }

    fn sample(&self, sample_shape: &[usize]) -> Result<Tensor> {
        // Each stored representation samples directly; the derived one is
        // never computed here.
        match &self.param {
            BinaryParam::Probs(p) => {
                draw_elementwise(sample_shape, &self.batch_shape, &[p], |rng, a| {
                    f64::from(rng.gen::<f64>() < a[0])
                })
            }
            BinaryParam::Logits(l) => {
                draw_elementwise(sample_shape, &self.batch_shape, &[l], |rng, a| {
                    f64::from(rng.gen::<f64>() < sigmoid(a[0]))
                })
            }
        }
    }

    fn log_prob(&self, value: &Tensor) -> Result<Tensor> {
        check_log_prob_shape(value, &self.batch_shape, &[])?;
        match &self.param {
            BinaryParam::Probs(p) => map2(value, p, |v, p| {
                if v == 1.0 {
                    p.ln()
                } else if v == 0.0 {
                    (-p).ln_1p()
                } else {
                    f64::NEG_INFINITY
                }
            }),
            BinaryParam::Logits(l) => map2(value, l, |v, l| {
                if v == 1.0 {
                    log_sigmoid(l)
                } else if v == 0.0 {
                    log_sigmoid(-l)
                } else {
                    f64::NEG_INFINITY
                }
            }),
        }
    }

    fn entropy(&self) -> Result<Tensor> {
        Ok(map1(&self.probs(), |p| {
            let a = if p > 0.0 { -p * p.ln() } else { 0.0 };
            let q = 1.0 - p;
            let b = if q > 0.0 { -q * q.ln() } else { 0.0 };
            a + b
        }))
    }

    fn enumerate_support(&self) -> Result<Tensor> {
        let mut shape = vec![2];
        shape.extend_from_slice(&self.batch_shape);
        let n: usize = self.batch_shape.iter().product();
        let mut vals = vec![0.0; n];
        vals.extend(std::iter::repeat(1.0).take(n));
        Ok(ArrayD::from_shape_vec(IxDyn(&shape), vals)
            .map_err(|e| Error::Computation(e.to_string()))?
            .into_shared())
    }

    fn mean(&self) -> Result<Tensor> {
        Ok(self.probs())
    }

    fn variance(&self) -> Result<Tensor> {
        Ok(map1(&self.probs(), |p| p * (1.0 - p)))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_exp_family(&self) -> Option<&dyn ExponentialFamily> {
        Some(self)
    }
}

impl ExponentialFamily for Bernoulli {
    fn natural_params(&self) -> Vec<Tensor> {
        vec![self.logits()]
    }

    fn log_normalizer(&self, eta: &[Dual]) -> Dual {
        // A(η) = ln(1 + exp(η))
        eta[0].log1pexp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use bd_core::tensor::item;

    #[test]
    fn test_entropy_reference_value() {
        let d = Bernoulli::from_probs(0.3).unwrap();
        assert_relative_eq!(item(&d.entropy().unwrap()), 0.6108643020548935, epsilon = 1e-4);
    }

    #[test]
    fn test_log_prob_boundaries_are_exact() {
        let d = Bernoulli::from_probs(0.0).unwrap();
        assert_eq!(item(&d.log_prob(&0.0.into_tensor()).unwrap()), 0.0);
        assert_eq!(item(&d.log_prob(&1.0.into_tensor()).unwrap()), f64::NEG_INFINITY);
        let d = Bernoulli::from_probs(1.0).unwrap();
        assert_eq!(item(&d.log_prob(&1.0.into_tensor()).unwrap()), 0.0);
        assert_eq!(item(&d.log_prob(&0.0.into_tensor()).unwrap()), f64::NEG_INFINITY);
    }

    #[test]
    fn test_logits_construction_matches_probs() {
        let p = Bernoulli::from_probs(0.7).unwrap();
        let l = Bernoulli::from_logits((0.7_f64 / 0.3).ln()).unwrap();
        for v in [0.0, 1.0] {
            assert_relative_eq!(
                item(&p.log_prob(&v.into_tensor()).unwrap()),
                item(&l.log_prob(&v.into_tensor()).unwrap()),
                epsilon = 1e-10
            );
        }
    }

    #[test]
    fn test_stored_representation_is_untouched_by_sampling() {
        let d = Bernoulli::from_probs(vec![0.2, 0.9]).unwrap();
        let _ = d.sample(&[10]).unwrap();
        assert!(d.holds_probs());
        let d = Bernoulli::from_logits(vec![-1.0, 2.0]).unwrap();
        let _ = d.log_prob(&vec![1.0, 0.0].into_tensor()).unwrap();
        assert!(!d.holds_probs());
    }

    #[test]
    fn test_enumerate_support_shape() {
        let d = Bernoulli::from_probs(vec![0.2, 0.9, 0.4]).unwrap();
        let s = d.enumerate_support().unwrap();
        assert_eq!(s.shape(), &[2, 3]);
        assert_eq!(s[[0, 1]], 0.0);
        assert_eq!(s[[1, 1]], 1.0);
    }

    #[test]
    fn test_invalid_probs() {
        assert!(Bernoulli::from_probs(1.2).is_err());
        assert!(Bernoulli::from_probs(-0.1).is_err());
    }
}
