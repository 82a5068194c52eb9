//! Chi-squared distribution.

use std::any::Any;

use bd_ad::Dual;
use bd_core::tensor::{map1, IntoTensor, Tensor};
use bd_core::Result;

use crate::constraint::Constraint;
use crate::distribution::Distribution;
use crate::exp_family::ExponentialFamily;
use crate::gamma::Gamma;

/// Chi-squared distribution with `df` degrees of freedom.
///
/// A Gamma with shape `df/2` and rate `1/2`; everything delegates to the
/// inner [`Gamma`].
#[derive(Debug, Clone)]
pub struct Chi2 {
    df: Tensor,
    gamma: Gamma,
}

impl Chi2 {
    /// Create a chi-squared distribution, validating `df > 0`.
    pub fn new(df: impl IntoTensor) -> Result<Self> {
        let df = df.into_tensor();
        let gamma = Gamma::new(map1(&df, |d| 0.5 * d), 0.5)?;
        Ok(Self { df, gamma })
    }

    /// Degrees of freedom.
    pub fn df(&self) -> &Tensor {
        &self.df
    }

    pub(crate) fn as_gamma(&self) -> &Gamma {
        &self.gamma
    }
}

impl Distribution for Chi2 {
    fn batch_shape(&self) -> &[usize] {
        self.gamma.batch_shape()
    }

    fn support(&self) -> Constraint {
        Constraint::Positive
    }

    fn arg_constraints(&self) -> Vec<(&'static str, Constraint)> {
        vec![("df", Constraint::Positive)]
    }

    fn has_rsample(&self) -> bool {
        true
    }

    fn rsample(&self, sample_shape: &[usize]) -> Result<Tensor> {
        self.gamma.rsample(sample_shape)
    }

    fn log_prob(&self, value: &Tensor) -> Result<Tensor> {
        self.gamma.log_prob(value)
    }

    fn cdf(&self, value: &Tensor) -> Result<Tensor> {
        self.gamma.cdf(value)
    }

    fn entropy(&self) -> Result<Tensor> {
        self.gamma.entropy()
    }

    fn mean(&self) -> Result<Tensor> {
        self.gamma.mean()
    }

    fn variance(&self) -> Result<Tensor> {
        self.gamma.variance()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_exp_family(&self) -> Option<&dyn ExponentialFamily> {
        Some(self)
    }
}

impl ExponentialFamily for Chi2 {
    fn natural_params(&self) -> Vec<Tensor> {
        self.gamma.natural_params()
    }

    fn log_normalizer(&self, eta: &[Dual]) -> Dual {
        self.gamma.log_normalizer(eta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use bd_core::tensor::{item, IntoTensor};

    #[test]
    fn test_matches_gamma_half_df() {
        let c = Chi2::new(3.0).unwrap();
        let g = Gamma::new(1.5, 0.5).unwrap();
        let x = 2.2.into_tensor();
        assert_relative_eq!(
            item(&c.log_prob(&x).unwrap()),
            item(&g.log_prob(&x).unwrap()),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_moments() {
        let c = Chi2::new(4.0).unwrap();
        assert_relative_eq!(item(&c.mean().unwrap()), 4.0, epsilon = 1e-12);
        assert_relative_eq!(item(&c.variance().unwrap()), 8.0, epsilon = 1e-12);
    }

    #[test]
    fn test_invalid_df() {
        assert!(Chi2::new(0.0).is_err());
        assert!(Chi2::new(-1.0).is_err());
    }
}
