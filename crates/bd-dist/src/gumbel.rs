//! Gumbel (type-I extreme value) distribution.

use std::any::Any;
use std::f64::consts::PI;

use bd_core::tensor::{broadcast_all, map1, map2, map3, IntoTensor, Tensor};
use bd_core::Result;
use rand::Rng;

use crate::constraint::Constraint;
use crate::distribution::{
    check_log_prob_shape, draw_elementwise, validate_params, Distribution,
};
use crate::math::EULER_GAMMA;

/// Gumbel distribution with location `loc` and scale `scale`.
#[derive(Debug, Clone)]
pub struct Gumbel {
    loc: Tensor,
    scale: Tensor,
    batch_shape: Vec<usize>,
}

impl Gumbel {
    /// Create a Gumbel distribution, validating `scale > 0`.
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

    /// Location parameter.
    pub fn loc(&self) -> &Tensor {
        &self.loc
    }

    /// Scale parameter.
    pub fn scale(&self) -> &Tensor {
        &self.scale
    }
}

impl Distribution for Gumbel {
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
        // loc - scale * ln(-ln U)
        draw_elementwise(sample_shape, &self.batch_shape, &[&self.loc, &self.scale], |rng, p| {
            let u: f64 = rng.gen_range(f64::MIN_POSITIVE..1.0);
            p[0] - p[1] * (-u.ln()).ln()
        })
    }

    fn log_prob(&self, value: &Tensor) -> Result<Tensor> {
        check_log_prob_shape(value, &self.batch_shape, &[])?;
        map3(value, &self.loc, &self.scale, |x, m, s| {
            let z = (x - m) / s;
            -z - (-z).exp() - s.ln()
        })
    }

    fn cdf(&self, value: &Tensor) -> Result<Tensor> {
        check_log_prob_shape(value, &self.batch_shape, &[])?;
        map3(value, &self.loc, &self.scale, |x, m, s| {
            (-(-(x - m) / s).exp()).exp()
        })
    }

    fn icdf(&self, value: &Tensor) -> Result<Tensor> {
        map3(value, &self.loc, &self.scale, |p, m, s| {
            m - s * (-p.ln()).ln()
        })
    }

    fn entropy(&self) -> Result<Tensor> {
        Ok(map1(&self.scale, |s| s.ln() + 1.0 + EULER_GAMMA))
    }

    fn mean(&self) -> Result<Tensor> {
        map2(&self.loc, &self.scale, |m, s| m + s * EULER_GAMMA)
    }

    fn variance(&self) -> Result<Tensor> {
        Ok(map1(&self.scale, |s| PI * PI / 6.0 * s * s))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
