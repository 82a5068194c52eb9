//! Categorical distribution over integer category indices.

use std::any::Any;

use bd_core::rng::with_rng;
use bd_core::tensor::{reduce_rows, zip_reduce_rows, IntoTensor, Tensor};
use bd_core::{Error, Result};
use ndarray::{ArrayD, Axis, IxDyn};
use rand::Rng;

use crate::constraint::Constraint;
use crate::distribution::{check_log_prob_shape, extended_shape, Distribution};
use crate::math::softmax_slice;
use crate::param::CategoricalParam;

/// Categorical distribution whose last parameter axis indexes
/// categories.
///
/// Values are category indices in `{0, ..., K-1}`; the event is a
/// scalar, so `batch_shape` is the parameter shape minus the category
/// axis.
#[derive(Debug, Clone)]
pub struct Categorical {
    param: CategoricalParam,
    batch_shape: Vec<usize>,
    num_events: usize,
}

impl Categorical {
    /// Construct from nonnegative per-category weights; rows are
    /// normalized to sum to one.
    pub fn from_probs(probs: impl IntoTensor) -> Result<Self> {
        let probs = probs.into_tensor();
        if probs.ndim() < 1 {
            return Err(Error::Validation(
                "categorical probs need at least one axis".into(),
            ));
        }
        if probs.iter().any(|&p| !(p >= 0.0) || !p.is_finite()) {
            return Err(Error::Validation(
                "categorical probs must be finite and nonnegative".into(),
            ));
        }
        let k = probs.shape()[probs.ndim() - 1];
        let normalized = bd_core::tensor::map_rows(&probs, k, |row, out| {
            let total: f64 = row.iter().sum();
            for (o, &p) in out.iter_mut().zip(row) {
                *o = p / total;
            }
        })?;
        if normalized.iter().any(|p| p.is_nan()) {
            return Err(Error::Validation(
                "categorical probs rows must have positive mass".into(),
            ));
        }
        let batch_shape = probs.shape()[..probs.ndim() - 1].to_vec();
        Ok(Self {
            param: CategoricalParam::Probs(normalized),
            batch_shape,
            num_events: k,
        })
    }

    /// Construct from unnormalized log-probabilities.
    pub fn from_logits(logits: impl IntoTensor) -> Result<Self> {
        let logits = logits.into_tensor();
        if logits.ndim() < 1 {
            return Err(Error::Validation(
                "categorical logits need at least one axis".into(),
            ));
        }
        if logits.iter().any(|l| !l.is_finite()) {
            return Err(Error::Validation(
                "categorical logits must be finite".into(),
            ));
        }
        let batch_shape = logits.shape()[..logits.ndim() - 1].to_vec();
        let num_events = logits.shape()[logits.ndim() - 1];
        Ok(Self { param: CategoricalParam::Logits(logits), batch_shape, num_events })
    }

    /// Number of categories.
    pub fn num_events(&self) -> usize {
        self.num_events
    }

    /// Normalized per-category probabilities.
    pub fn probs(&self) -> Result<Tensor> {
        self.param.probs()
    }

    /// Normalized per-category log-probabilities.
    pub fn log_probs(&self) -> Result<Tensor> {
        self.param.log_probs()
    }

    /// Whether the stored representation is `probs`.
    pub fn holds_probs(&self) -> bool {
        self.param.is_probs()
    }

    /// Draw flat category indices, one per `(rep, batch)` element.
    pub(crate) fn draw_indices(&self, reps: usize) -> Result<Vec<usize>> {
        let n_batch: usize = self.batch_shape.iter().product();
        let k = self.num_events;
        // Per-row probabilities; the logits variant converts transiently.
        let rows: Vec<f64> = match &self.param {
            CategoricalParam::Probs(p) => p.iter().cloned().collect(),
            CategoricalParam::Logits(l) => {
                let flat: Vec<f64> = l.iter().cloned().collect();
                flat.chunks(k).flat_map(|row| softmax_slice(row)).collect()
            }
        };
        let mut out = Vec::with_capacity(reps * n_batch);
        with_rng(|rng| {
            for _ in 0..reps {
                for b in 0..n_batch {
                    let row = &rows[b * k..(b + 1) * k];
                    let u: f64 = rng.gen();
                    let mut acc = 0.0;
                    let mut idx = k - 1;
                    for (i, &p) in row.iter().enumerate() {
                        acc += p;
                        if u < acc {
                            idx = i;
                            break;
                        }
                    }
                    out.push(idx);
                }
            }
        });
        Ok(out)
    }
}

impl Distribution for Categorical {
    fn batch_shape(&self) -> &[usize] {
        &self.batch_shape
    }

    fn support(&self) -> Constraint {
        Constraint::IntegerInterval(0, self.num_events as i64 - 1)
    }

    fn arg_constraints(&self) -> Vec<(&'static str, Constraint)> {
        vec![("probs", Constraint::Simplex)]
    }

    fn sample(&self, sample_shape: &[usize]) -> Result<Tensor> {
        let reps: usize = sample_shape.iter().product();
        let idx = self.draw_indices(reps)?;
        let shape = extended_shape(sample_shape, &self.batch_shape, &[]);
        Ok(ArrayD::from_shape_vec(IxDyn(&shape), idx.iter().map(|&i| i as f64).collect())
            .map_err(|e| Error::Computation(e.to_string()))?
            .into_shared())
    }

    fn log_prob(&self, value: &Tensor) -> Result<Tensor> {
        check_log_prob_shape(value, &self.batch_shape, &[])?;
        let lp = self.log_probs()?;
        let k = self.num_events;
        let indexed = value.clone().insert_axis(Axis(value.ndim()));
        zip_reduce_rows(&indexed, &lp, move |v, row| {
            let x = v[0];
            if x < 0.0 || x >= k as f64 || x.fract() != 0.0 {
                f64::NEG_INFINITY
            } else {
                row[x as usize]
            }
        })
    }

    fn entropy(&self) -> Result<Tensor> {
        let lp = self.log_probs()?;
        reduce_rows(&lp, |row| {
            -row.iter()
                .map(|&l| if l == f64::NEG_INFINITY { 0.0 } else { l.exp() * l })
                .sum::<f64>()
        })
    }

    fn enumerate_support(&self) -> Result<Tensor> {
        let k = self.num_events;
        let n_batch: usize = self.batch_shape.iter().product();
        let mut vals = Vec::with_capacity(k * n_batch);
        for i in 0..k {
            vals.extend(std::iter::repeat(i as f64).take(n_batch));
        }
        let mut shape = vec![k];
        shape.extend_from_slice(&self.batch_shape);
        Ok(ArrayD::from_shape_vec(IxDyn(&shape), vals)
            .map_err(|e| Error::Computation(e.to_string()))?
            .into_shared())
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
    fn test_probs_are_normalized() {
        let d = Categorical::from_probs(vec![2.0, 6.0]).unwrap();
        let p = d.probs().unwrap();
        assert_relative_eq!(p[[0]], 0.25, epsilon = 1e-12);
        assert_relative_eq!(p[[1]], 0.75, epsilon = 1e-12);
    }

    #[test]
    fn test_log_prob_gathers_by_index() {
        let d = Categorical::from_logits(vec![0.0, 1.0, 2.0]).unwrap();
        let lp = d.log_probs().unwrap();
        for i in 0..3 {
            assert_relative_eq!(
                item(&d.log_prob(&(i as f64).into_tensor()).unwrap()),
                lp[[i]],
                epsilon = 1e-12
            );
        }
        assert_eq!(item(&d.log_prob(&3.0.into_tensor()).unwrap()), f64::NEG_INFINITY);
        assert_eq!(item(&d.log_prob(&0.5.into_tensor()).unwrap()), f64::NEG_INFINITY);
    }

    #[test]
    fn test_batched_sampling_shapes() {
        let probs = ndarray::arr2(&[[0.9, 0.1], [0.1, 0.9]]).into_dyn().into_shared();
        let d = Categorical::from_probs(probs).unwrap();
        assert_eq!(d.batch_shape(), &[2]);
        let s = d.sample(&[50]).unwrap();
        assert_eq!(s.shape(), &[50, 2]);
        assert!(s.iter().all(|&v| v == 0.0 || v == 1.0));
    }

    #[test]
    fn test_entropy_uniform() {
        let d = Categorical::from_probs(vec![1.0, 1.0, 1.0, 1.0]).unwrap();
        assert_relative_eq!(item(&d.entropy().unwrap()), 4.0_f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_entropy_with_zero_probability_category() {
        let d = Categorical::from_probs(vec![0.0, 1.0]).unwrap();
        assert_relative_eq!(item(&d.entropy().unwrap()), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_enumerate_support() {
        let probs = ndarray::arr2(&[[0.5, 0.5], [0.2, 0.8]]).into_dyn().into_shared();
        let d = Categorical::from_probs(probs).unwrap();
        let s = d.enumerate_support().unwrap();
        assert_eq!(s.shape(), &[2, 2]);
        assert_eq!(s[[0, 0]], 0.0);
        assert_eq!(s[[1, 1]], 1.0);
    }

    #[test]
    fn test_invalid_probs_rejected() {
        assert!(Categorical::from_probs(vec![-1.0, 2.0]).is_err());
        assert!(Categorical::from_probs(vec![0.0, 0.0]).is_err());
        assert!(Categorical::from_logits(vec![f64::INFINITY, 0.0]).is_err());
    }
}
