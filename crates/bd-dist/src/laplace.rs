//! Laplace (double exponential) distribution.

use std::any::Any;

use bd_core::tensor::{broadcast_all, map1, map3, IntoTensor, Tensor};
use bd_core::Result;
use rand::Rng;

use crate::constraint::Constraint;
use crate::distribution::{
    check_log_prob_shape, draw_elementwise, validate_params, Distribution,
};

/// Laplace distribution with location `loc` and scale `scale`.
#[derive(Debug, Clone)]
pub struct Laplace {
    loc: Tensor,
    scale: Tensor,
    batch_shape: Vec<usize>,
}

impl Laplace {
    /// Create a Laplace distribution, validating `scale > 0`.
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

impl Distribution for Laplace {
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
        // Inverse CDF of a uniform on (-1/2, 1/2)
        draw_elementwise(sample_shape, &self.batch_shape, &[&self.loc, &self.scale], |rng, p| {
            let u: f64 = rng.gen::<f64>() - 0.5;
            p[0] - p[1] * u.signum() * (-2.0 * u.abs()).ln_1p()
        })
    }

    fn log_prob(&self, value: &Tensor) -> Result<Tensor> {
        check_log_prob_shape(value, &self.batch_shape, &[])?;
        map3(value, &self.loc, &self.scale, |x, m, s| {
            -(x - m).abs() / s - (2.0 * s).ln()
        })
    }

    fn cdf(&self, value: &Tensor) -> Result<Tensor> {
        check_log_prob_shape(value, &self.batch_shape, &[])?;
        map3(value, &self.loc, &self.scale, |x, m, s| {
            let z = (x - m) / s;
            if z <= 0.0 { 0.5 * z.exp() } else { 1.0 - 0.5 * (-z).exp() }
        })
    }

    fn icdf(&self, value: &Tensor) -> Result<Tensor> {
        map3(value, &self.loc, &self.scale, |p, m, s| {
            if p <= 0.5 {
                m + s * (2.0 * p).ln()
            } else {
                m - s * (2.0 * (1.0 - p)).ln()
            }
        })
    }

    fn entropy(&self) -> Result<Tensor> {
        Ok(map1(&self.scale, |s| 1.0 + (2.0 * s).ln()))
    }

    fn mean(&self) -> Result<Tensor> {
        Ok(self.loc.clone())
    }

    fn variance(&self) -> Result<Tensor> {
        Ok(map1(&self.scale, |s| 2.0 * s * s))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use bd_core::tensor::{item, IntoTensor};

    #[test]
    fn test_density_at_center() {
        let d = Laplace::new(2.0, 3.0).unwrap();
        assert_relative_eq!(
            item(&d.log_prob(&2.0.into_tensor()).unwrap()),
            -(6.0_f64.ln()),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_symmetry() {
        let d = Laplace::new(0.0, 1.5).unwrap();
        let a = item(&d.log_prob(&1.1.into_tensor()).unwrap());
        let b = item(&d.log_prob(&(-1.1).into_tensor()).unwrap());
        assert_relative_eq!(a, b, epsilon = 1e-12);
    }

    #[test]
    fn test_cdf_icdf_roundtrip_both_branches() {
        let d = Laplace::new(1.0, 0.8).unwrap();
        for x in [-2.0, 0.9, 1.0, 1.1, 4.0] {
            let p = d.cdf(&x.into_tensor()).unwrap();
            assert_relative_eq!(item(&d.icdf(&p).unwrap()), x, epsilon = 1e-9, max_relative = 1e-9);
        }
    }
}
