//! Poisson distribution.

use std::any::Any;

use bd_ad::Dual;
use bd_core::tensor::{broadcast_all, map1, map2, IntoTensor, Tensor};
use bd_core::{Error, Result};
use rand_distr::Distribution as RandDistribution;
use statrs::function::gamma::ln_gamma;

use crate::constraint::Constraint;
use crate::distribution::{
    check_log_prob_shape, draw_elementwise, validate_params, Distribution,
};
use crate::exp_family::ExponentialFamily;

/// Poisson distribution with `rate` parameter.
#[derive(Debug, Clone)]
pub struct Poisson {
    rate: Tensor,
    batch_shape: Vec<usize>,
}

impl Poisson {
    /// Create a Poisson distribution, validating `rate > 0`.
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

impl Distribution for Poisson {
    fn batch_shape(&self) -> &[usize] {
        &self.batch_shape
    }

    fn support(&self) -> Constraint {
        Constraint::NonnegativeInteger
    }

    fn arg_constraints(&self) -> Vec<(&'static str, Constraint)> {
        vec![("rate", Constraint::Positive)]
    }

    fn sample(&self, sample_shape: &[usize]) -> Result<Tensor> {
        draw_elementwise(sample_shape, &self.batch_shape, &[&self.rate], |rng, p| {
            let d = rand_distr::Poisson::new(p[0]).expect("validated rate");
            let k: f64 = d.sample(rng);
            k
        })
    }

    fn log_prob(&self, value: &Tensor) -> Result<Tensor> {
        check_log_prob_shape(value, &self.batch_shape, &[])?;
        map2(value, &self.rate, |k, lambda| {
            if k < 0.0 || k.fract() != 0.0 {
                f64::NEG_INFINITY
            } else {
                k * lambda.ln() - lambda - ln_gamma(k + 1.0)
            }
        })
    }

    fn mean(&self) -> Result<Tensor> {
        Ok(self.rate.clone())
    }

    fn variance(&self) -> Result<Tensor> {
        Ok(self.rate.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_exp_family(&self) -> Option<&dyn ExponentialFamily> {
        Some(self)
    }
}

impl ExponentialFamily for Poisson {
    fn natural_params(&self) -> Vec<Tensor> {
        vec![map1(&self.rate, f64::ln)]
    }

    fn log_normalizer(&self, eta: &[Dual]) -> Dual {
        // A(η) = exp(η)
        eta[0].exp()
    }

    fn mean_carrier_measure(&self) -> Result<f64> {
        // E[-ln k!] has no closed form; the generic entropy path is
        // unavailable for this family.
        Err(Error::NotImplemented(
            "mean carrier measure for Poisson".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use bd_core::tensor::item;

    #[test]
    fn test_pmf_at_zero() {
        let d = Poisson::new(2.0).unwrap();
        assert_relative_eq!(
            item(&d.log_prob(&0.0.into_tensor()).unwrap()),
            -2.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_invalid_rate() {
        assert!(Poisson::new(0.0).is_err());
        assert!(Poisson::new(-2.0).is_err());
    }

    #[test]
    fn test_non_integer_impossible() {
        let d = Poisson::new(1.0).unwrap();
        assert_eq!(item(&d.log_prob(&0.5.into_tensor()).unwrap()), f64::NEG_INFINITY);
    }

    #[test]
    fn test_sample_mean_matches_rate() {
        bd_core::rng::seed(31);
        let d = Poisson::new(vec![1.0, 6.5]).unwrap();
        let s = d.sample(&[20_000]).unwrap();
        let m0: f64 = (0..20_000).map(|i| s[[i, 0]]).sum::<f64>() / 20_000.0;
        let m1: f64 = (0..20_000).map(|i| s[[i, 1]]).sum::<f64>() / 20_000.0;
        assert_relative_eq!(m0, 1.0, max_relative = 0.05);
        assert_relative_eq!(m1, 6.5, max_relative = 0.05);
    }

    #[test]
    fn test_entropy_is_not_implemented() {
        let d = Poisson::new(3.0).unwrap();
        assert!(d.entropy().is_err());
    }
}
