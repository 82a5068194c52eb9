//! Multinomial distribution over category counts.

use std::any::Any;

use bd_core::tensor::{map1, zip_reduce_rows, IntoTensor, Tensor};
use bd_core::{Error, Result};
use ndarray::{ArrayD, IxDyn};
use statrs::function::gamma::ln_gamma;

use crate::categorical::Categorical;
use crate::constraint::Constraint;
use crate::distribution::{check_log_prob_shape, extended_shape, Distribution};

/// Multinomial distribution: counts over `K` categories after
/// `total_count` categorical trials.
#[derive(Debug, Clone)]
pub struct Multinomial {
    total_count: u64,
    inner: Categorical,
    event_shape: Vec<usize>,
}

impl Multinomial {
    /// Construct from a trial count and nonnegative per-category
    /// weights.
    pub fn from_probs(total_count: u64, probs: impl IntoTensor) -> Result<Self> {
        let inner = Categorical::from_probs(probs)?;
        let event_shape = vec![inner.num_events()];
        Ok(Self { total_count, inner, event_shape })
    }

    /// Construct from a trial count and unnormalized
    /// log-probabilities.
    pub fn from_logits(total_count: u64, logits: impl IntoTensor) -> Result<Self> {
        let inner = Categorical::from_logits(logits)?;
        let event_shape = vec![inner.num_events()];
        Ok(Self { total_count, inner, event_shape })
    }

    /// Number of trials.
    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    fn k(&self) -> usize {
        self.event_shape[0]
    }
}

impl Distribution for Multinomial {
    fn batch_shape(&self) -> &[usize] {
        self.inner.batch_shape()
    }

    fn event_shape(&self) -> &[usize] {
        &self.event_shape
    }

    fn support(&self) -> Constraint {
        Constraint::NonnegativeInteger
    }

    fn arg_constraints(&self) -> Vec<(&'static str, Constraint)> {
        vec![("probs", Constraint::Simplex)]
    }

    fn sample(&self, sample_shape: &[usize]) -> Result<Tensor> {
        let reps: usize = sample_shape.iter().product();
        let n_batch: usize = self.inner.batch_shape().iter().product();
        let k = self.k();
        // total_count categorical draws per element, accumulated into
        // counts.
        let mut counts = vec![0.0; reps * n_batch * k];
        for _ in 0..self.total_count {
            let idx = self.inner.draw_indices(reps)?;
            for (elem, &i) in idx.iter().enumerate() {
                counts[elem * k + i] += 1.0;
            }
        }
        let shape = extended_shape(sample_shape, self.inner.batch_shape(), &self.event_shape);
        Ok(ArrayD::from_shape_vec(IxDyn(&shape), counts)
            .map_err(|e| Error::Computation(e.to_string()))?
            .into_shared())
    }

    fn log_prob(&self, value: &Tensor) -> Result<Tensor> {
        check_log_prob_shape(value, self.inner.batch_shape(), &self.event_shape)?;
        let lp = self.inner.log_probs()?;
        let n = self.total_count as f64;
        zip_reduce_rows(value, &lp, move |counts, row| {
            let mut total = 0.0;
            for &c in counts {
                if c < 0.0 || c.fract() != 0.0 {
                    return f64::NEG_INFINITY;
                }
                total += c;
            }
            if total != n {
                return f64::NEG_INFINITY;
            }
            let mut acc = ln_gamma(n + 1.0);
            for (&c, &l) in counts.iter().zip(row) {
                acc -= ln_gamma(c + 1.0);
                if c > 0.0 {
                    // 0 * (-inf) never enters the sum
                    acc += c * l;
                }
            }
            acc
        })
    }

    fn mean(&self) -> Result<Tensor> {
        let n = self.total_count as f64;
        Ok(map1(&self.inner.probs()?, |p| n * p))
    }

    fn variance(&self) -> Result<Tensor> {
        let n = self.total_count as f64;
        Ok(map1(&self.inner.probs()?, |p| n * p * (1.0 - p)))
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
    fn test_counts_sum_to_total() {
        bd_core::rng::seed(41);
        let d = Multinomial::from_probs(12, vec![0.1, 0.6, 0.3]).unwrap();
        let s = d.sample(&[30]).unwrap();
        assert_eq!(s.shape(), &[30, 3]);
        for row in 0..30 {
            let total: f64 = (0..3).map(|j| s[[row, j]]).sum();
            assert_eq!(total, 12.0);
        }
    }

    #[test]
    fn test_log_prob_binomial_consistency() {
        // K = 2 multinomial reduces to a binomial over the first count.
        let m = Multinomial::from_probs(6, vec![0.3, 0.7]).unwrap();
        let b = crate::binomial::Binomial::from_probs(6, 0.3).unwrap();
        let lp_m = item(&m.log_prob(&vec![2.0, 4.0].into_tensor()).unwrap());
        let lp_b = item(&b.log_prob(&2.0.into_tensor()).unwrap());
        assert_relative_eq!(lp_m, lp_b, epsilon = 1e-10);
    }

    #[test]
    fn test_wrong_total_is_impossible() {
        let m = Multinomial::from_probs(5, vec![0.5, 0.5]).unwrap();
        assert_eq!(
            item(&m.log_prob(&vec![1.0, 2.0].into_tensor()).unwrap()),
            f64::NEG_INFINITY
        );
    }

    #[test]
    fn test_mean_scales_probs() {
        let m = Multinomial::from_probs(10, vec![0.25, 0.75]).unwrap();
        let mean = m.mean().unwrap();
        assert_relative_eq!(mean[[0]], 2.5, epsilon = 1e-12);
        assert_relative_eq!(mean[[1]], 7.5, epsilon = 1e-12);
    }
}
