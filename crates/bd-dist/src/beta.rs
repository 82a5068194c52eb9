//! Beta distribution.

use std::any::Any;

use bd_ad::Dual;
use bd_core::tensor::{broadcast_all, map2, map3, IntoTensor, Tensor};
use bd_core::Result;
use statrs::function::gamma::{digamma, ln_gamma};

use crate::constraint::Constraint;
use crate::distribution::{
    check_log_prob_shape, draw_elementwise, validate_params, Distribution,
};
use crate::exp_family::ExponentialFamily;
use crate::math::standard_gamma;

#[inline]
fn ln_beta(a: f64, b: f64) -> f64 {
    ln_gamma(a) + ln_gamma(b) - ln_gamma(a + b)
}

/// Beta distribution with concentrations `concentration1` (α) and
/// `concentration0` (β).
#[derive(Debug, Clone)]
pub struct Beta {
    concentration1: Tensor,
    concentration0: Tensor,
    batch_shape: Vec<usize>,
}

impl Beta {
    /// Create a Beta distribution, validating both concentrations
    /// positive.
    pub fn new(
        concentration1: impl IntoTensor,
        concentration0: impl IntoTensor,
    ) -> Result<Self> {
        let mut ts = broadcast_all(&[
            &concentration1.into_tensor(),
            &concentration0.into_tensor(),
        ])?;
        let concentration0 = ts.pop().expect("two tensors");
        let concentration1 = ts.pop().expect("two tensors");
        validate_params(&[
            ("concentration1", &concentration1, &Constraint::Positive),
            ("concentration0", &concentration0, &Constraint::Positive),
        ])?;
        let batch_shape = concentration1.shape().to_vec();
        Ok(Self { concentration1, concentration0, batch_shape })
    }

    /// α parameter.
    pub fn concentration1(&self) -> &Tensor {
        &self.concentration1
    }

    /// β parameter.
    pub fn concentration0(&self) -> &Tensor {
        &self.concentration0
    }

    pub(crate) fn logpdf(x: f64, a: f64, b: f64) -> f64 {
        if !(0.0..=1.0).contains(&x) {
            return f64::NEG_INFINITY;
        }
        let ln_norm = -ln_beta(a, b);
        if x == 0.0 {
            if a < 1.0 {
                return f64::INFINITY;
            }
            if a > 1.0 {
                return f64::NEG_INFINITY;
            }
            return ln_norm;
        }
        if x == 1.0 {
            if b < 1.0 {
                return f64::INFINITY;
            }
            if b > 1.0 {
                return f64::NEG_INFINITY;
            }
            return ln_norm;
        }
        ln_norm + (a - 1.0) * x.ln() + (b - 1.0) * (-x).ln_1p()
    }
}

impl Distribution for Beta {
    fn batch_shape(&self) -> &[usize] {
        &self.batch_shape
    }

    fn support(&self) -> Constraint {
        Constraint::UnitInterval
    }

    fn arg_constraints(&self) -> Vec<(&'static str, Constraint)> {
        vec![
            ("concentration1", Constraint::Positive),
            ("concentration0", Constraint::Positive),
        ]
    }

    fn has_rsample(&self) -> bool {
        true
    }

    fn rsample(&self, sample_shape: &[usize]) -> Result<Tensor> {
        // Ratio of two gamma draws
        draw_elementwise(
            sample_shape,
            &self.batch_shape,
            &[&self.concentration1, &self.concentration0],
            |rng, p| {
                let x = standard_gamma(rng, p[0]);
                let y = standard_gamma(rng, p[1]);
                x / (x + y)
            },
        )
    }

    fn log_prob(&self, value: &Tensor) -> Result<Tensor> {
        check_log_prob_shape(value, &self.batch_shape, &[])?;
        map3(value, &self.concentration1, &self.concentration0, Self::logpdf)
    }

    fn entropy(&self) -> Result<Tensor> {
        map2(&self.concentration1, &self.concentration0, |a, b| {
            ln_beta(a, b) - (a - 1.0) * digamma(a) - (b - 1.0) * digamma(b)
                + (a + b - 2.0) * digamma(a + b)
        })
    }

    fn mean(&self) -> Result<Tensor> {
        map2(&self.concentration1, &self.concentration0, |a, b| a / (a + b))
    }

    fn variance(&self) -> Result<Tensor> {
        map2(&self.concentration1, &self.concentration0, |a, b| {
            let t = a + b;
            a * b / (t * t * (t + 1.0))
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_exp_family(&self) -> Option<&dyn ExponentialFamily> {
        Some(self)
    }
}

impl ExponentialFamily for Beta {
    fn natural_params(&self) -> Vec<Tensor> {
        vec![
            bd_core::tensor::map1(&self.concentration1, |a| a - 1.0),
            bd_core::tensor::map1(&self.concentration0, |b| b - 1.0),
        ]
    }

    fn log_normalizer(&self, eta: &[Dual]) -> Dual {
        // A(η) = ln Γ(η1+1) + ln Γ(η2+1) - ln Γ(η1+η2+2)
        let a = eta[0] + 1.0;
        let b = eta[1] + 1.0;
        a.ln_gamma() + b.ln_gamma() - (a + b).ln_gamma()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use bd_core::tensor::item;

    #[test]
    fn test_uniform_special_case() {
        let d = Beta::new(1.0, 1.0).unwrap();
        for x in [0.0, 0.2, 0.5, 1.0] {
            assert_relative_eq!(
                item(&d.log_prob(&x.into_tensor()).unwrap()),
                0.0,
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn test_symmetry_when_concentrations_match() {
        let d = Beta::new(2.0, 2.0).unwrap();
        let a = item(&d.log_prob(&0.2.into_tensor()).unwrap());
        let b = item(&d.log_prob(&0.8.into_tensor()).unwrap());
        assert_relative_eq!(a, b, epsilon = 1e-12);
    }

    #[test]
    fn test_out_of_support_and_boundaries() {
        let d = Beta::new(2.0, 3.0).unwrap();
        assert_eq!(item(&d.log_prob(&(-0.1).into_tensor()).unwrap()), f64::NEG_INFINITY);
        assert_eq!(item(&d.log_prob(&0.0.into_tensor()).unwrap()), f64::NEG_INFINITY);
        let spike = Beta::new(0.5, 1.0).unwrap();
        assert_eq!(item(&spike.log_prob(&0.0.into_tensor()).unwrap()), f64::INFINITY);
    }

    #[test]
    fn test_sample_mean_matches_closed_form() {
        bd_core::rng::seed(13);
        let d = Beta::new(2.0, 5.0).unwrap();
        let s = d.rsample(&[40_000]).unwrap();
        let mean: f64 = s.iter().sum::<f64>() / s.len() as f64;
        assert_relative_eq!(mean, item(&d.mean().unwrap()), max_relative = 0.03);
        assert!(s.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }
}
