//! Exponential distribution.

use std::any::Any;

use bd_ad::Dual;
use bd_core::tensor::{broadcast_all, map1, map2, IntoTensor, Tensor};
use bd_core::Result;
use rand_distr::{Distribution as RandDistribution, Exp1};

use crate::constraint::Constraint;
use crate::distribution::{
    check_log_prob_shape, draw_elementwise, validate_params, Distribution,
};
use crate::exp_family::ExponentialFamily;

/// Exponential distribution with `rate` (inverse scale).
#[derive(Debug, Clone)]
pub struct Exponential {
    rate: Tensor,
    batch_shape: Vec<usize>,
}

impl Exponential {
    /// Create an Exponential distribution, validating `rate > 0`.
    pub fn new(rate: impl IntoTensor) -> Result<Self> {
        let ts = broadcast_all(&[&rate.into_tensor()])?;
        let rate = ts.into_iter().next().expect("one tensor");
        validate_params(&[("rate", &rate, &Constraint::Positive)])?;
        let batch_shape = rate.shape().to_vec();
        Ok(Self { rate, batch_shape })
    }

    /// Rate parameter.
    pub fn rate(&self) -> &Tensor {
        &self.rate
    }
}

impl Distribution for Exponential {
    fn batch_shape(&self) -> &[usize] {
        &self.batch_shape
    }

    fn support(&self) -> Constraint {
        Constraint::Positive
    }

    fn arg_constraints(&self) -> Vec<(&'static str, Constraint)> {
        vec![("rate", Constraint::Positive)]
    }

    fn has_rsample(&self) -> bool {
        true
    }

    fn rsample(&self, sample_shape: &[usize]) -> Result<Tensor> {
        // standard exponential noise / rate
        draw_elementwise(sample_shape, &self.batch_shape, &[&self.rate], |rng, p| {
            let e: f64 = Exp1.sample(rng);
            e / p[0]
        })
    }

    fn log_prob(&self, value: &Tensor) -> Result<Tensor> {
        check_log_prob_shape(value, &self.batch_shape, &[])?;
        map2(value, &self.rate, |x, r| {
            if x < 0.0 { f64::NEG_INFINITY } else { r.ln() - r * x }
        })
    }

    fn cdf(&self, value: &Tensor) -> Result<Tensor> {
        check_log_prob_shape(value, &self.batch_shape, &[])?;
        map2(value, &self.rate, |x, r| {
            if x < 0.0 { 0.0 } else { -(-r * x).exp_m1() }
        })
    }

    fn icdf(&self, value: &Tensor) -> Result<Tensor> {
        map2(value, &self.rate, |p, r| -(-p).ln_1p() / r)
    }

    fn entropy(&self) -> Result<Tensor> {
        Ok(map1(&self.rate, |r| 1.0 - r.ln()))
    }

    fn mean(&self) -> Result<Tensor> {
        Ok(map1(&self.rate, |r| 1.0 / r))
    }

    fn variance(&self) -> Result<Tensor> {
        Ok(map1(&self.rate, |r| 1.0 / (r * r)))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_exp_family(&self) -> Option<&dyn ExponentialFamily> {
        Some(self)
    }
}

impl ExponentialFamily for Exponential {
    fn natural_params(&self) -> Vec<Tensor> {
        vec![map1(&self.rate, |r| -r)]
    }

    fn log_normalizer(&self, eta: &[Dual]) -> Dual {
        // A(η) = -ln(-η)
        -((-eta[0]).ln())
    }
}
