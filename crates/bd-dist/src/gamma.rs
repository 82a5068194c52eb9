//! Gamma distribution.

use std::any::Any;

use bd_ad::Dual;
use bd_core::tensor::{broadcast_all, map2, map3, IntoTensor, Tensor};
use bd_core::Result;
use statrs::function::gamma::{digamma, gamma_lr, ln_gamma};

use crate::constraint::Constraint;
use crate::distribution::{
    check_log_prob_shape, draw_elementwise, validate_params, Distribution,
};
use crate::exp_family::ExponentialFamily;
use crate::math::standard_gamma;

/// Gamma distribution with `concentration` (shape) and `rate`
/// (inverse scale).
#[derive(Debug, Clone)]
pub struct Gamma {
    concentration: Tensor,
    rate: Tensor,
    batch_shape: Vec<usize>,
}

impl Gamma {
    /// Create a Gamma distribution, validating both parameters positive.
    pub fn new(concentration: impl IntoTensor, rate: impl IntoTensor) -> Result<Self> {
        let mut ts = broadcast_all(&[&concentration.into_tensor(), &rate.into_tensor()])?;
        let rate = ts.pop().expect("two tensors");
        let concentration = ts.pop().expect("two tensors");
        validate_params(&[
            ("concentration", &concentration, &Constraint::Positive),
            ("rate", &rate, &Constraint::Positive),
        ])?;
        let batch_shape = concentration.shape().to_vec();
        Ok(Self { concentration, rate, batch_shape })
    }

    /// Shape parameter.
    pub fn concentration(&self) -> &Tensor {
        &self.concentration
    }

    /// Rate parameter.
    pub fn rate(&self) -> &Tensor {
        &self.rate
    }

    /// Log-density at `x` for one `(shape, rate)` pair, with exact
    /// boundary behavior at `x == 0`.
    pub(crate) fn logpdf(x: f64, shape: f64, rate: f64) -> f64 {
        if x < 0.0 {
            return f64::NEG_INFINITY;
        }
        if x == 0.0 {
            if shape < 1.0 {
                return f64::INFINITY;
            }
            if shape > 1.0 {
                return f64::NEG_INFINITY;
            }
            // shape == 1 is the exponential density at zero
            return rate.ln();
        }
        shape * rate.ln() - ln_gamma(shape) + (shape - 1.0) * x.ln() - rate * x
    }
}

impl Distribution for Gamma {
    fn batch_shape(&self) -> &[usize] {
        &self.batch_shape
    }

    fn support(&self) -> Constraint {
        Constraint::Positive
    }

    fn arg_constraints(&self) -> Vec<(&'static str, Constraint)> {
        vec![
            ("concentration", Constraint::Positive),
            ("rate", Constraint::Positive),
        ]
    }

    fn has_rsample(&self) -> bool {
        true
    }

    fn rsample(&self, sample_shape: &[usize]) -> Result<Tensor> {
        draw_elementwise(
            sample_shape,
            &self.batch_shape,
            &[&self.concentration, &self.rate],
            |rng, p| standard_gamma(rng, p[0]) / p[1],
        )
    }

    fn log_prob(&self, value: &Tensor) -> Result<Tensor> {
        check_log_prob_shape(value, &self.batch_shape, &[])?;
        map3(value, &self.concentration, &self.rate, Self::logpdf)
    }

    fn cdf(&self, value: &Tensor) -> Result<Tensor> {
        check_log_prob_shape(value, &self.batch_shape, &[])?;
        map3(value, &self.concentration, &self.rate, |x, a, r| {
            if x <= 0.0 { 0.0 } else { gamma_lr(a, r * x) }
        })
    }

    fn entropy(&self) -> Result<Tensor> {
        map2(&self.concentration, &self.rate, |a, r| {
            a - r.ln() + ln_gamma(a) + (1.0 - a) * digamma(a)
        })
    }

    fn mean(&self) -> Result<Tensor> {
        map2(&self.concentration, &self.rate, |a, r| a / r)
    }

    fn variance(&self) -> Result<Tensor> {
        map2(&self.concentration, &self.rate, |a, r| a / (r * r))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_exp_family(&self) -> Option<&dyn ExponentialFamily> {
        Some(self)
    }
}

impl ExponentialFamily for Gamma {
    fn natural_params(&self) -> Vec<Tensor> {
        let eta1 = bd_core::tensor::map1(&self.concentration, |a| a - 1.0);
        let eta2 = bd_core::tensor::map1(&self.rate, |r| -r);
        vec![eta1, eta2]
    }

    fn log_normalizer(&self, eta: &[Dual]) -> Dual {
        // A(η) = ln Γ(η1 + 1) - (η1 + 1) ln(-η2)
        let a = eta[0] + 1.0;
        a.ln_gamma() - a * (-eta[1]).ln()
    }
}
