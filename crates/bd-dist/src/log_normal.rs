//! Log-normal distribution.

use std::any::Any;
use std::f64::consts::SQRT_2;

use bd_core::tensor::{map2, map3, IntoTensor, Tensor};
use bd_core::Result;
use statrs::function::erf::{erf, erf_inv};

use crate::constraint::Constraint;
use crate::distribution::{check_log_prob_shape, Distribution};
use crate::normal::{Normal, LN_SQRT_2PI};
use crate::transformed::TransformedDistribution;
use crate::transforms::{ExpTransform, Transform};

/// Log-normal distribution: `exp` of a [`Normal`] with the same
/// parameters.
///
/// Sampling rides the transformed machinery (Normal base + exp
/// transform); moments and the cdf/icdf pair use the closed forms.
pub struct LogNormal {
    inner: TransformedDistribution,
    loc: Tensor,
    scale: Tensor,
}

impl LogNormal {
    /// Create a log-normal distribution; `loc`/`scale` parameterize the
    /// underlying normal.
    pub fn new(loc: impl IntoTensor, scale: impl IntoTensor) -> Result<Self> {
        let base = Normal::new(loc, scale)?;
        let loc = base.loc().clone();
        let scale = base.scale().clone();
        let inner =
            TransformedDistribution::new(base, vec![Transform::cached(ExpTransform)])?;
        Ok(Self { inner, loc, scale })
    }

    /// Location of the underlying normal.
    pub fn loc(&self) -> &Tensor {
        &self.loc
    }

    /// Scale of the underlying normal.
    pub fn scale(&self) -> &Tensor {
        &self.scale
    }
}

impl Distribution for LogNormal {
    fn batch_shape(&self) -> &[usize] {
        self.inner.batch_shape()
    }

    fn support(&self) -> Constraint {
        Constraint::Positive
    }

    fn arg_constraints(&self) -> Vec<(&'static str, Constraint)> {
        vec![("loc", Constraint::Real), ("scale", Constraint::Positive)]
    }

    fn has_rsample(&self) -> bool {
        true
    }

    fn rsample(&self, sample_shape: &[usize]) -> Result<Tensor> {
        self.inner.rsample(sample_shape)
    }

    fn log_prob(&self, value: &Tensor) -> Result<Tensor> {
        check_log_prob_shape(value, self.inner.batch_shape(), &[])?;
        map3(value, &self.loc, &self.scale, |x, m, s| {
            if x <= 0.0 {
                return f64::NEG_INFINITY;
            }
            let z = (x.ln() - m) / s;
            -0.5 * z * z - s.ln() - LN_SQRT_2PI - x.ln()
        })
    }

    fn cdf(&self, value: &Tensor) -> Result<Tensor> {
        check_log_prob_shape(value, self.inner.batch_shape(), &[])?;
        map3(value, &self.loc, &self.scale, |x, m, s| {
            if x <= 0.0 {
                0.0
            } else {
                0.5 * (1.0 + erf((x.ln() - m) / (s * SQRT_2)))
            }
        })
    }

    fn icdf(&self, value: &Tensor) -> Result<Tensor> {
        map3(value, &self.loc, &self.scale, |p, m, s| {
            (m + s * SQRT_2 * erf_inv(2.0 * p - 1.0)).exp()
        })
    }

    fn entropy(&self) -> Result<Tensor> {
        map2(&self.loc, &self.scale, |m, s| m + 0.5 + LN_SQRT_2PI + s.ln())
    }

    fn mean(&self) -> Result<Tensor> {
        map2(&self.loc, &self.scale, |m, s| (m + 0.5 * s * s).exp())
    }

    fn variance(&self) -> Result<Tensor> {
        map2(&self.loc, &self.scale, |m, s| {
            (s * s).exp_m1() * (2.0 * m + s * s).exp()
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
