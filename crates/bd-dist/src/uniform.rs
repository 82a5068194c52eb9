//! Continuous uniform distribution on `[low, high)`.

use std::any::Any;

use bd_core::tensor::{broadcast_all, map2, map3, IntoTensor, Tensor};
use bd_core::{Error, Result};
use rand::Rng;

use crate::constraint::Constraint;
use crate::distribution::{check_log_prob_shape, draw_elementwise, Distribution};

/// Uniform distribution with elementwise bounds.
///
/// Each bound's validity depends on the other, so both carry the
/// `Dependent` constraint; the ordering `low < high` is checked here at
/// construction.
#[derive(Debug, Clone)]
pub struct Uniform {
    low: Tensor,
    high: Tensor,
    batch_shape: Vec<usize>,
}

impl Uniform {
    /// Create a Uniform distribution; requires `low < high` elementwise.
    pub fn new(low: impl IntoTensor, high: impl IntoTensor) -> Result<Self> {
        let mut ts = broadcast_all(&[&low.into_tensor(), &high.into_tensor()])?;
        let high = ts.pop().expect("two tensors");
        let low = ts.pop().expect("two tensors");
        if low.iter().zip(high.iter()).any(|(&l, &h)| !(l < h)) {
            return Err(Error::Validation(
                "uniform requires low < high elementwise".into(),
            ));
        }
        let batch_shape = low.shape().to_vec();
        Ok(Self { low, high, batch_shape })
    }

    /// Lower bound, broadcast to `batch_shape`.
    pub fn low(&self) -> &Tensor {
        &self.low
    }

    /// Upper bound, broadcast to `batch_shape`.
    pub fn high(&self) -> &Tensor {
        &self.high
    }
}

impl Distribution for Uniform {
    fn batch_shape(&self) -> &[usize] {
        &self.batch_shape
    }

    fn support(&self) -> Constraint {
        Constraint::Interval(self.low.clone(), self.high.clone())
    }

    fn arg_constraints(&self) -> Vec<(&'static str, Constraint)> {
        vec![("low", Constraint::Dependent), ("high", Constraint::Dependent)]
    }

    fn has_rsample(&self) -> bool {
        true
    }

    fn rsample(&self, sample_shape: &[usize]) -> Result<Tensor> {
        draw_elementwise(sample_shape, &self.batch_shape, &[&self.low, &self.high], |rng, p| {
            let u: f64 = rng.gen();
            p[0] + (p[1] - p[0]) * u
        })
    }

    fn log_prob(&self, value: &Tensor) -> Result<Tensor> {
        check_log_prob_shape(value, &self.batch_shape, &[])?;
        map3(value, &self.low, &self.high, |x, l, h| {
            if x >= l && x < h { -(h - l).ln() } else { f64::NEG_INFINITY }
        })
    }

    fn cdf(&self, value: &Tensor) -> Result<Tensor> {
        check_log_prob_shape(value, &self.batch_shape, &[])?;
        map3(value, &self.low, &self.high, |x, l, h| {
            ((x - l) / (h - l)).clamp(0.0, 1.0)
        })
    }

    fn icdf(&self, value: &Tensor) -> Result<Tensor> {
        map3(value, &self.low, &self.high, |p, l, h| l + p * (h - l))
    }

    fn entropy(&self) -> Result<Tensor> {
        map2(&self.high, &self.low, |h, l| (h - l).ln())
    }

    fn mean(&self) -> Result<Tensor> {
        map2(&self.low, &self.high, |l, h| 0.5 * (l + h))
    }

    fn variance(&self) -> Result<Tensor> {
        map2(&self.high, &self.low, |h, l| (h - l) * (h - l) / 12.0)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
