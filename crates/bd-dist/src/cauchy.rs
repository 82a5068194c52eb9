//! Cauchy distribution.

use std::any::Any;
use std::f64::consts::PI;

use bd_core::tensor::{broadcast_all, map1, map3, IntoTensor, Tensor};
use bd_core::Result;
use rand::Rng;

use crate::constraint::Constraint;
use crate::distribution::{
    check_log_prob_shape, draw_elementwise, validate_params, Distribution,
};

/// Cauchy distribution with location `loc` and scale `scale`.
///
/// Mean and variance do not exist; [`Distribution::mean`] is `NaN` and
/// [`Distribution::variance`] is `inf`, matching the convention of the
/// rest of the heavy-tailed families here.
#[derive(Debug, Clone)]
pub struct Cauchy {
    loc: Tensor,
    scale: Tensor,
    batch_shape: Vec<usize>,
}

impl Cauchy {
    /// Create a Cauchy distribution, validating `scale > 0`.
    pub fn new(loc: impl IntoTensor, scale: impl IntoTensor) -> Result<Self> {
        let mut ts = broadcast_all(&[&loc.into_tensor(), &scale.into_tensor()])?;
        let scale = ts.pop().expect("two tensors");
        let loc = ts.pop().expect("two tensors");
        validate_params(&[
            ("loc", &loc, &Constraint::Real),
            ("scale", &scale, &Constraint::Positive),
        ])?;
        let batch_shape = loc.shape().to_vec();
        Ok(Self { loc, scale, batch_shape })
    }
}

impl Distribution for Cauchy {
    fn batch_shape(&self) -> &[usize] {
        &self.batch_shape
    }

    fn support(&self) -> Constraint {
        Constraint::Real
    }

    fn arg_constraints(&self) -> Vec<(&'static str, Constraint)> {
        vec![("loc", Constraint::Real), ("scale", Constraint::Positive)]
    }

    fn has_rsample(&self) -> bool {
        true
    }

    fn rsample(&self, sample_shape: &[usize]) -> Result<Tensor> {
        // loc + scale * standard Cauchy noise (inverse-CDF of a uniform)
        draw_elementwise(sample_shape, &self.batch_shape, &[&self.loc, &self.scale], |rng, p| {
            let u: f64 = rng.gen();
            p[0] + p[1] * (PI * (u - 0.5)).tan()
        })
    }

    fn log_prob(&self, value: &Tensor) -> Result<Tensor> {
        check_log_prob_shape(value, &self.batch_shape, &[])?;
        map3(value, &self.loc, &self.scale, |x, m, s| {
            let z = (x - m) / s;
            -PI.ln() - s.ln() - (z * z).ln_1p()
        })
    }

    fn cdf(&self, value: &Tensor) -> Result<Tensor> {
        check_log_prob_shape(value, &self.batch_shape, &[])?;
        map3(value, &self.loc, &self.scale, |x, m, s| {
            ((x - m) / s).atan() / PI + 0.5
        })
    }

    fn icdf(&self, value: &Tensor) -> Result<Tensor> {
        map3(value, &self.loc, &self.scale, |p, m, s| {
            m + s * (PI * (p - 0.5)).tan()
        })
    }

    fn entropy(&self) -> Result<Tensor> {
        Ok(map1(&self.scale, |s| (4.0 * PI * s).ln()))
    }

    fn mean(&self) -> Result<Tensor> {
        Ok(map1(&self.loc, |_| f64::NAN))
    }

    fn variance(&self) -> Result<Tensor> {
        Ok(map1(&self.loc, |_| f64::INFINITY))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
