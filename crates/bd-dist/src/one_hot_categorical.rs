//! One-hot encoded categorical distribution.

use std::any::Any;

use bd_core::tensor::{map1, zip_reduce_rows, IntoTensor, Tensor};
use bd_core::{Error, Result};
use ndarray::{ArrayD, IxDyn};

use crate::categorical::Categorical;
use crate::constraint::Constraint;
use crate::distribution::{check_log_prob_shape, extended_shape, Distribution};

/// Categorical distribution whose draws are one-hot vectors along the
/// last axis.
#[derive(Debug, Clone)]
pub struct OneHotCategorical {
    inner: Categorical,
    event_shape: Vec<usize>,
}

impl OneHotCategorical {
    /// Construct from nonnegative per-category weights.
    pub fn from_probs(probs: impl IntoTensor) -> Result<Self> {
        let inner = Categorical::from_probs(probs)?;
        let event_shape = vec![inner.num_events()];
        Ok(Self { inner, event_shape })
    }

    /// Construct from unnormalized log-probabilities.
    pub fn from_logits(logits: impl IntoTensor) -> Result<Self> {
        let inner = Categorical::from_logits(logits)?;
        let event_shape = vec![inner.num_events()];
        Ok(Self { inner, event_shape })
    }

    /// Normalized per-category probabilities.
    pub fn probs(&self) -> Result<Tensor> {
        self.inner.probs()
    }

    pub(crate) fn inner(&self) -> &Categorical {
        &self.inner
    }

    fn k(&self) -> usize {
        self.event_shape[0]
    }
}

impl Distribution for OneHotCategorical {
    fn batch_shape(&self) -> &[usize] {
        self.inner.batch_shape()
    }

    fn event_shape(&self) -> &[usize] {
        &self.event_shape
    }

    fn support(&self) -> Constraint {
        Constraint::Simplex
    }

    fn arg_constraints(&self) -> Vec<(&'static str, Constraint)> {
        vec![("probs", Constraint::Simplex)]
    }

    fn sample(&self, sample_shape: &[usize]) -> Result<Tensor> {
        let reps: usize = sample_shape.iter().product();
        let idx = self.inner.draw_indices(reps)?;
        let k = self.k();
        let mut vals = vec![0.0; idx.len() * k];
        for (row, &i) in idx.iter().enumerate() {
            vals[row * k + i] = 1.0;
        }
        let shape = extended_shape(sample_shape, self.inner.batch_shape(), &self.event_shape);
        Ok(ArrayD::from_shape_vec(IxDyn(&shape), vals)
            .map_err(|e| Error::Computation(e.to_string()))?
            .into_shared())
    }

    fn log_prob(&self, value: &Tensor) -> Result<Tensor> {
        check_log_prob_shape(value, self.inner.batch_shape(), &self.event_shape)?;
        let lp = self.inner.log_probs()?;
        // The hot index carries the mass; argmax tolerates float one-hots.
        zip_reduce_rows(value, &lp, |v, row| {
            let mut hot = 0;
            for (i, &x) in v.iter().enumerate() {
                if x > v[hot] {
                    hot = i;
                }
            }
            row[hot]
        })
    }

    fn entropy(&self) -> Result<Tensor> {
        self.inner.entropy()
    }

    fn enumerate_support(&self) -> Result<Tensor> {
        let k = self.k();
        let n_batch: usize = self.inner.batch_shape().iter().product();
        let mut vals = Vec::with_capacity(k * n_batch * k);
        for hot in 0..k {
            for _ in 0..n_batch {
                for j in 0..k {
                    vals.push(f64::from(j == hot));
                }
            }
        }
        let mut shape = vec![k];
        shape.extend_from_slice(self.inner.batch_shape());
        shape.push(k);
        Ok(ArrayD::from_shape_vec(IxDyn(&shape), vals)
            .map_err(|e| Error::Computation(e.to_string()))?
            .into_shared())
    }

    fn mean(&self) -> Result<Tensor> {
        self.probs()
    }

    fn variance(&self) -> Result<Tensor> {
        Ok(map1(&self.probs()?, |p| p * (1.0 - p)))
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
    fn test_samples_are_one_hot() {
        bd_core::rng::seed(37);
        let d = OneHotCategorical::from_probs(vec![0.2, 0.3, 0.5]).unwrap();
        let s = d.sample(&[20]).unwrap();
        assert_eq!(s.shape(), &[20, 3]);
        for row in 0..20 {
            let sum: f64 = (0..3).map(|j| s[[row, j]]).sum();
            assert_eq!(sum, 1.0);
        }
    }

    #[test]
    fn test_log_prob_matches_categorical() {
        let d = OneHotCategorical::from_logits(vec![0.5, -0.5, 1.0]).unwrap();
        let c = Categorical::from_logits(vec![0.5, -0.5, 1.0]).unwrap();
        let one_hot = vec![0.0, 0.0, 1.0].into_tensor();
        assert_relative_eq!(
            item(&d.log_prob(&one_hot).unwrap()),
            item(&c.log_prob(&2.0.into_tensor()).unwrap()),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_event_shape_must_match() {
        let d = OneHotCategorical::from_probs(vec![0.5, 0.5]).unwrap();
        assert!(d.log_prob(&vec![1.0, 0.0, 0.0].into_tensor()).is_err());
    }

    #[test]
    fn test_enumerate_support_is_identity_stack() {
        let d = OneHotCategorical::from_probs(vec![0.3, 0.7]).unwrap();
        let s = d.enumerate_support().unwrap();
        assert_eq!(s.shape(), &[2, 2]);
        assert_eq!(s[[0, 0]], 1.0);
        assert_eq!(s[[0, 1]], 0.0);
        assert_eq!(s[[1, 1]], 1.0);
    }

    #[test]
    fn test_mean_is_probs() {
        let d = OneHotCategorical::from_probs(vec![1.0, 3.0]).unwrap();
        let m = d.mean().unwrap();
        assert_relative_eq!(m[[0]], 0.25, epsilon = 1e-12);
    }
}
