//! Pareto (type I) distribution.

use std::any::Any;

use bd_core::tensor::{map2, map3, scalar, IntoTensor, Tensor};
use bd_core::Result;

use crate::constraint::Constraint;
use crate::distribution::{check_log_prob_shape, Distribution};
use crate::exponential::Exponential;
use crate::transformed::TransformedDistribution;
use crate::transforms::{AffineTransform, ExpTransform, Transform};

/// Pareto distribution with minimum `scale` and shape `alpha`.
///
/// Draws are `scale * exp(E)` with `E ~ Exponential(alpha)`; sampling
/// rides the transformed machinery.
pub struct Pareto {
    inner: TransformedDistribution,
    scale: Tensor,
    alpha: Tensor,
}

impl Pareto {
    /// Create a Pareto distribution, validating both parameters
    /// positive.
    pub fn new(scale: impl IntoTensor, alpha: impl IntoTensor) -> Result<Self> {
        let mut ts =
            bd_core::tensor::broadcast_all(&[&scale.into_tensor(), &alpha.into_tensor()])?;
        let alpha = ts.pop().expect("two tensors");
        let scale = ts.pop().expect("two tensors");
        if scale.iter().any(|&s| s <= 0.0 || !s.is_finite()) {
            return Err(bd_core::Error::Validation(
                "pareto scale must be finite and positive".into(),
            ));
        }
        let base = Exponential::new(alpha.clone())?;
        let inner = TransformedDistribution::new(
            base,
            vec![
                Transform::new(ExpTransform),
                Transform::new(AffineTransform::new(scalar(0.0), scale.clone(), 0)?),
            ],
        )?;
        Ok(Self { inner, scale, alpha })
    }

    /// Minimum value.
    pub fn scale(&self) -> &Tensor {
        &self.scale
    }

    /// Tail index.
    pub fn alpha(&self) -> &Tensor {
        &self.alpha
    }
}

impl Distribution for Pareto {
    fn batch_shape(&self) -> &[usize] {
        self.inner.batch_shape()
    }

    fn support(&self) -> Constraint {
        Constraint::GreaterThan(self.scale.clone())
    }

    fn arg_constraints(&self) -> Vec<(&'static str, Constraint)> {
        vec![("scale", Constraint::Positive), ("alpha", Constraint::Positive)]
    }

    fn has_rsample(&self) -> bool {
        true
    }

    fn rsample(&self, sample_shape: &[usize]) -> Result<Tensor> {
        self.inner.rsample(sample_shape)
    }

    fn log_prob(&self, value: &Tensor) -> Result<Tensor> {
        check_log_prob_shape(value, self.inner.batch_shape(), &[])?;
        map3(value, &self.scale, &self.alpha, |x, m, a| {
            if x < m {
                f64::NEG_INFINITY
            } else {
                a.ln() + a * m.ln() - (a + 1.0) * x.ln()
            }
        })
    }

    fn cdf(&self, value: &Tensor) -> Result<Tensor> {
        check_log_prob_shape(value, self.inner.batch_shape(), &[])?;
        map3(value, &self.scale, &self.alpha, |x, m, a| {
            if x < m { 0.0 } else { 1.0 - (m / x).powf(a) }
        })
    }

    fn icdf(&self, value: &Tensor) -> Result<Tensor> {
        map3(value, &self.scale, &self.alpha, |p, m, a| {
            m * (1.0 - p).powf(-1.0 / a)
        })
    }

    fn entropy(&self) -> Result<Tensor> {
        map2(&self.scale, &self.alpha, |m, a| (m / a).ln() + 1.0 + 1.0 / a)
    }

    fn mean(&self) -> Result<Tensor> {
        map2(&self.scale, &self.alpha, |m, a| {
            if a > 1.0 { a * m / (a - 1.0) } else { f64::INFINITY }
        })
    }

    fn variance(&self) -> Result<Tensor> {
        map2(&self.scale, &self.alpha, |m, a| {
            if a > 2.0 {
                m * m * a / ((a - 1.0) * (a - 1.0) * (a - 2.0))
            } else {
                f64::INFINITY
            }
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
