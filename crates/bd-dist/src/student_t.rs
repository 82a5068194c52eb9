//! Student-t distribution.

use std::any::Any;

use bd_core::tensor::{broadcast_all, map2, map3, IntoTensor, Tensor};
use bd_core::Result;
use ndarray::Zip;
use rand_distr::{Distribution as RandDistribution, StandardNormal};
use statrs::function::gamma::{digamma, ln_gamma};

use crate::constraint::Constraint;
use crate::distribution::{
    check_log_prob_shape, draw_elementwise, validate_params, Distribution,
};
use crate::math::standard_gamma;

/// Natural log of π.
const LN_PI: f64 = 1.144_729_885_849_400_2;

/// Student-t distribution with `df` degrees of freedom, location `loc`,
/// and scale `scale`.
#[derive(Debug, Clone)]
pub struct StudentT {
    df: Tensor,
    loc: Tensor,
    scale: Tensor,
    batch_shape: Vec<usize>,
}

impl StudentT {
    /// Create a Student-t distribution, validating `df > 0` and
    /// `scale > 0`.
    pub fn new(
        df: impl IntoTensor,
        loc: impl IntoTensor,
        scale: impl IntoTensor,
    ) -> Result<Self> {
        let mut ts = broadcast_all(&[
            &df.into_tensor(),
            &loc.into_tensor(),
            &scale.into_tensor(),
        ])?;
        let scale = ts.pop().expect("three tensors");
        let loc = ts.pop().expect("three tensors");
        let df = ts.pop().expect("three tensors");
        validate_params(&[
            ("df", &df, &Constraint::Positive),
            ("loc", &loc, &Constraint::Real),
            ("scale", &scale, &Constraint::Positive),
        ])?;
        let batch_shape = df.shape().to_vec();
        Ok(Self { df, loc, scale, batch_shape })
    }
}

impl Distribution for StudentT {
    fn batch_shape(&self) -> &[usize] {
        &self.batch_shape
    }

    fn support(&self) -> Constraint {
        Constraint::Real
    }

    fn arg_constraints(&self) -> Vec<(&'static str, Constraint)> {
        vec![
            ("df", Constraint::Positive),
            ("loc", Constraint::Real),
            ("scale", Constraint::Positive),
        ]
    }

    fn has_rsample(&self) -> bool {
        true
    }

    fn rsample(&self, sample_shape: &[usize]) -> Result<Tensor> {
        // normal / sqrt(chi2 / df)
        draw_elementwise(
            sample_shape,
            &self.batch_shape,
            &[&self.df, &self.loc, &self.scale],
            |rng, p| {
                let z: f64 = StandardNormal.sample(rng);
                let chi2 = 2.0 * standard_gamma(rng, 0.5 * p[0]);
                p[1] + p[2] * z * (p[0] / chi2).sqrt()
            },
        )
    }

    fn log_prob(&self, value: &Tensor) -> Result<Tensor> {
        check_log_prob_shape(value, &self.batch_shape, &[])?;
        let z = map3(value, &self.loc, &self.scale, |x, m, s| (x - m) / s)?;
        let per = map3(&z, &self.df, &self.scale, |z, nu, s| {
            let a = ln_gamma(0.5 * (nu + 1.0)) - ln_gamma(0.5 * nu);
            let b = -0.5 * (nu.ln() + LN_PI);
            let d = -0.5 * (nu + 1.0) * (z * z / nu).ln_1p();
            a + b - s.ln() + d
        })?;
        Ok(per)
    }

    fn entropy(&self) -> Result<Tensor> {
        map2(&self.df, &self.scale, |nu, s| {
            let half = 0.5 * nu;
            let lbeta = ln_gamma(half) + ln_gamma(0.5) - ln_gamma(half + 0.5);
            s.ln()
                + 0.5 * (nu + 1.0) * (digamma(half + 0.5) - digamma(half))
                + 0.5 * nu.ln()
                + lbeta
        })
    }

    fn mean(&self) -> Result<Tensor> {
        Ok(Zip::from(&self.df)
            .and(&self.loc)
            .map_collect(|&nu, &m| if nu > 1.0 { m } else { f64::NAN })
            .into_shared())
    }

    fn variance(&self) -> Result<Tensor> {
        Ok(Zip::from(&self.df)
            .and(&self.scale)
            .map_collect(|&nu, &s| {
                if nu > 2.0 {
                    s * s * nu / (nu - 2.0)
                } else if nu > 1.0 {
                    f64::INFINITY
                } else {
                    f64::NAN
                }
            })
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
    fn test_df_one_is_cauchy() {
        let t = StudentT::new(1.0, 0.0, 1.0).unwrap();
        let c = crate::cauchy::Cauchy::new(0.0, 1.0).unwrap();
        for x in [-2.0, 0.0, 0.7] {
            assert_relative_eq!(
                item(&t.log_prob(&x.into_tensor()).unwrap()),
                item(&c.log_prob(&x.into_tensor()).unwrap()),
                epsilon = 1e-10
            );
        }
    }

    #[test]
    fn test_symmetry_about_loc() {
        let t = StudentT::new(7.0, 2.0, 1.5).unwrap();
        let a = item(&t.log_prob(&3.3.into_tensor()).unwrap());
        let b = item(&t.log_prob(&0.7.into_tensor()).unwrap());
        assert_relative_eq!(a, b, epsilon = 1e-12);
    }

    #[test]
    fn test_moment_regimes() {
        let heavy = StudentT::new(0.5, 0.0, 1.0).unwrap();
        assert!(item(&heavy.mean().unwrap()).is_nan());
        let mid = StudentT::new(1.5, 0.0, 1.0).unwrap();
        assert_eq!(item(&mid.mean().unwrap()), 0.0);
        assert!(item(&mid.variance().unwrap()).is_infinite());
        let light = StudentT::new(5.0, 0.0, 2.0).unwrap();
        assert_relative_eq!(item(&light.variance().unwrap()), 4.0 * 5.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_large_df_approaches_normal_entropy() {
        let t = StudentT::new(1e6, 0.0, 1.0).unwrap();
        let n = crate::normal::Normal::new(0.0, 1.0).unwrap();
        let ht = item(&t.entropy().unwrap());
        let hn = item(&n.entropy().unwrap());
        assert!((ht - hn).abs() < 1e-4, "{} vs {}", ht, hn);
    }
}
