//! Normal (Gaussian) distribution.

use std::any::Any;
use std::f64::consts::SQRT_2;

use bd_ad::Dual;
use bd_core::tensor::{broadcast_all, map1, map2, map3, IntoTensor, Tensor};
use bd_core::Result;
use rand_distr::{Distribution as RandDistribution, StandardNormal};
use statrs::function::erf::{erf, erf_inv};

use crate::constraint::Constraint;
use crate::distribution::{
    check_log_prob_shape, draw_elementwise, validate_params, Distribution,
};
use crate::exp_family::ExponentialFamily;

/// `ln(sqrt(2π))`.
pub(crate) const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_7;

/// Normal distribution parameterized by `loc` (mean) and `scale`
/// (standard deviation).
#[derive(Debug, Clone)]
pub struct Normal {
    loc: Tensor,
    scale: Tensor,
    batch_shape: Vec<usize>,
}

impl Normal {
    /// Create a Normal distribution, validating `scale > 0`.
    pub fn new(loc: impl IntoTensor, scale: impl IntoTensor) -> Result<Self> {
        let d = Self::new_unchecked(loc, scale)?;
        validate_params(&[
            ("loc", &d.loc, &Constraint::Real),
            ("scale", &d.scale, &Constraint::Positive),
        ])?;
        Ok(d)
    }

    /// Create without parameter validation (shapes are still broadcast).
    pub fn new_unchecked(loc: impl IntoTensor, scale: impl IntoTensor) -> Result<Self> {
        let mut ts = broadcast_all(&[&loc.into_tensor(), &scale.into_tensor()])?;
        let scale = ts.pop().expect("two tensors");
        let loc = ts.pop().expect("two tensors");
        let batch_shape = loc.shape().to_vec();
        Ok(Self { loc, scale, batch_shape })
    }

    /// Location parameter, broadcast to `batch_shape`.
    pub fn loc(&self) -> &Tensor {
        &self.loc
    }

    /// Scale parameter, broadcast to `batch_shape`.
    pub fn scale(&self) -> &Tensor {
        &self.scale
    }
}

impl Distribution for Normal {
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
        // loc + scale * standard normal noise
        draw_elementwise(sample_shape, &self.batch_shape, &[&self.loc, &self.scale], |rng, p| {
            let z: f64 = StandardNormal.sample(rng);
            p[0] + p[1] * z
        })
    }

    fn log_prob(&self, value: &Tensor) -> Result<Tensor> {
        check_log_prob_shape(value, &self.batch_shape, &[])?;
        map3(value, &self.loc, &self.scale, |x, m, s| {
            let z = (x - m) / s;
            -0.5 * z * z - s.ln() - LN_SQRT_2PI
        })
    }

    fn cdf(&self, value: &Tensor) -> Result<Tensor> {
        check_log_prob_shape(value, &self.batch_shape, &[])?;
        map3(value, &self.loc, &self.scale, |x, m, s| {
            0.5 * (1.0 + erf((x - m) / (s * SQRT_2)))
        })
    }

    fn icdf(&self, value: &Tensor) -> Result<Tensor> {
        map3(value, &self.loc, &self.scale, |p, m, s| {
            m + s * SQRT_2 * erf_inv(2.0 * p - 1.0)
        })
    }

    fn entropy(&self) -> Result<Tensor> {
        Ok(map1(&self.scale, |s| 0.5 + LN_SQRT_2PI + s.ln()))
    }

    fn mean(&self) -> Result<Tensor> {
        Ok(self.loc.clone())
    }

    fn variance(&self) -> Result<Tensor> {
        Ok(map1(&self.scale, |s| s * s))
    }

    fn stddev(&self) -> Result<Tensor> {
        Ok(self.scale.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_exp_family(&self) -> Option<&dyn ExponentialFamily> {
        Some(self)
    }
}

impl ExponentialFamily for Normal {
    fn natural_params(&self) -> Vec<Tensor> {
        let eta1 = map2(&self.loc, &self.scale, |m, s| m / (s * s))
            .expect("parameters share batch shape");
        let eta2 = map1(&self.scale, |s| -0.5 / (s * s));
        vec![eta1, eta2]
    }

    fn log_normalizer(&self, eta: &[Dual]) -> Dual {
        // A(η) = -η1²/(4 η2) + ½ ln(-π/η2)
        let (e1, e2) = (eta[0], eta[1]);
        -(e1 * e1) / (e2 * 4.0) + ((-Dual::constant(std::f64::consts::PI)) / e2).ln() * 0.5
    }
}
