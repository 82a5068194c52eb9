//! Binomial distribution.

use std::any::Any;

use bd_core::tensor::{map1, map2, IntoTensor, Tensor};
use bd_core::Result;
use rand_distr::Distribution as RandDistribution;
use statrs::function::gamma::ln_gamma;

use crate::constraint::Constraint;
use crate::distribution::{
    check_log_prob_shape, draw_elementwise, validate_params, Distribution,
};
use crate::math::{log_sigmoid, sigmoid};
use crate::param::BinaryParam;

#[inline]
fn ln_choose(n: f64, k: f64) -> f64 {
    ln_gamma(n + 1.0) - ln_gamma(k + 1.0) - ln_gamma(n - k + 1.0)
}

/// Binomial distribution: number of successes in `total_count`
/// independent trials.
#[derive(Debug, Clone)]
pub struct Binomial {
    total_count: u64,
    param: BinaryParam,
    batch_shape: Vec<usize>,
}

impl Binomial {
    /// Construct from a trial count and per-trial success
    /// probabilities.
    pub fn from_probs(total_count: u64, probs: impl IntoTensor) -> Result<Self> {
        let probs = probs.into_tensor();
        validate_params(&[("probs", &probs, &Constraint::UnitInterval)])?;
        let batch_shape = probs.shape().to_vec();
        Ok(Self { total_count, param: BinaryParam::Probs(probs), batch_shape })
    }

    /// Construct from a trial count and log-odds.
    pub fn from_logits(total_count: u64, logits: impl IntoTensor) -> Result<Self> {
        let logits = logits.into_tensor();
        validate_params(&[("logits", &logits, &Constraint::Real)])?;
        let batch_shape = logits.shape().to_vec();
        Ok(Self { total_count, param: BinaryParam::Logits(logits), batch_shape })
    }

    /// Number of trials.
    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    /// Per-trial success probabilities.
    pub fn probs(&self) -> Tensor {
        self.param.probs()
    }

    /// Per-trial log-odds.
    pub fn logits(&self) -> Tensor {
        self.param.logits()
    }
}

impl Distribution for Binomial {
    fn batch_shape(&self) -> &[usize] {
        &self.batch_shape
    }

    fn support(&self) -> Constraint {
        Constraint::IntegerInterval(0, self.total_count as i64)
    }

    fn arg_constraints(&self) -> Vec<(&'static str, Constraint)> {
        vec![("probs", Constraint::UnitInterval)]
    }

    fn sample(&self, sample_shape: &[usize]) -> Result<Tensor> {
        let n = self.total_count;
        match &self.param {
            BinaryParam::Probs(p) => {
                draw_elementwise(sample_shape, &self.batch_shape, &[p], |rng, a| {
                    let d = rand_distr::Binomial::new(n, a[0]).expect("validated probs");
                    d.sample(rng) as f64
                })
            }
            BinaryParam::Logits(l) => {
                draw_elementwise(sample_shape, &self.batch_shape, &[l], |rng, a| {
                    let d = rand_distr::Binomial::new(n, sigmoid(a[0]))
                        .expect("sigmoid lands in [0, 1]");
                    d.sample(rng) as f64
                })
            }
        }
    }

    fn log_prob(&self, value: &Tensor) -> Result<Tensor> {
        check_log_prob_shape(value, &self.batch_shape, &[])?;
        let n = self.total_count as f64;
        match &self.param {
            BinaryParam::Probs(p) => map2(value, p, move |k, p| {
                if k < 0.0 || k > n || k.fract() != 0.0 {
                    return f64::NEG_INFINITY;
                }
                // The k = 0 / k = n guards keep 0 * ln(0) out of the sum
                // so boundary probabilities stay exact.
                let mut lp = ln_choose(n, k);
                if k > 0.0 {
                    lp += k * p.ln();
                }
                if k < n {
                    lp += (n - k) * (-p).ln_1p();
                }
                lp
            }),
            BinaryParam::Logits(l) => map2(value, l, move |k, l| {
                if k < 0.0 || k > n || k.fract() != 0.0 {
                    return f64::NEG_INFINITY;
                }
                let mut lp = ln_choose(n, k);
                if k > 0.0 {
                    lp += k * log_sigmoid(l);
                }
                if k < n {
                    lp += (n - k) * log_sigmoid(-l);
                }
                lp
            }),
        }
    }

    fn mean(&self) -> Result<Tensor> {
        let n = self.total_count as f64;
        Ok(map1(&self.probs(), |p| n * p))
    }

    fn variance(&self) -> Result<Tensor> {
        let n = self.total_count as f64;
        Ok(map1(&self.probs(), |p| n * p * (1.0 - p)))
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
    fn test_pmf_against_direct_computation() {
        let d = Binomial::from_probs(10, 0.3).unwrap();
        // P(3) = C(10,3) 0.3^3 0.7^7
        let expect = 120.0 * 0.3_f64.powi(3) * 0.7_f64.powi(7);
        assert_relative_eq!(
            item(&d.log_prob(&3.0.into_tensor()).unwrap()),
            expect.ln(),
            epsilon = 1e-10
        );
    }

    #[test]
    fn test_boundary_probabilities_are_exact() {
        let d = Binomial::from_probs(4, 0.0).unwrap();
        assert_eq!(item(&d.log_prob(&0.0.into_tensor()).unwrap()), 0.0);
        assert_eq!(item(&d.log_prob(&1.0.into_tensor()).unwrap()), f64::NEG_INFINITY);
        let d = Binomial::from_probs(4, 1.0).unwrap();
        assert_eq!(item(&d.log_prob(&4.0.into_tensor()).unwrap()), 0.0);
        assert_eq!(item(&d.log_prob(&3.0.into_tensor()).unwrap()), f64::NEG_INFINITY);
    }

    #[test]
    fn test_values_outside_count_range() {
        let d = Binomial::from_probs(4, 0.5).unwrap();
        assert_eq!(item(&d.log_prob(&5.0.into_tensor()).unwrap()), f64::NEG_INFINITY);
        assert_eq!(item(&d.log_prob(&(-1.0).into_tensor()).unwrap()), f64::NEG_INFINITY);
    }

    #[test]
    fn test_sample_range_and_mean() {
        bd_core::rng::seed(29);
        let d = Binomial::from_logits(20, 0.0).unwrap();
        let s = d.sample(&[10_000]).unwrap();
        assert!(s.iter().all(|&v| (0.0..=20.0).contains(&v) && v.fract() == 0.0));
        let mean: f64 = s.iter().sum::<f64>() / s.len() as f64;
        assert_relative_eq!(mean, 10.0, max_relative = 0.05);
    }
}
