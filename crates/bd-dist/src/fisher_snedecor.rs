//! Fisher-Snedecor (F) distribution.

use std::any::Any;

use bd_core::tensor::{broadcast_all, map2, map3, IntoTensor, Tensor};
use bd_core::Result;
use statrs::function::gamma::ln_gamma;

use crate::constraint::Constraint;
use crate::distribution::{
    check_log_prob_shape, draw_elementwise, validate_params, Distribution,
};
use crate::math::standard_gamma;

/// F distribution with numerator/denominator degrees of freedom `df1`,
/// `df2`.
#[derive(Debug, Clone)]
pub struct FisherSnedecor {
    df1: Tensor,
    df2: Tensor,
    batch_shape: Vec<usize>,
}

impl FisherSnedecor {
    /// Create an F distribution, validating both dofs positive.
    pub fn new(df1: impl IntoTensor, df2: impl IntoTensor) -> Result<Self> {
        let mut ts = broadcast_all(&[&df1.into_tensor(), &df2.into_tensor()])?;
        let df2 = ts.pop().expect("two tensors");
        let df1 = ts.pop().expect("two tensors");
        validate_params(&[
            ("df1", &df1, &Constraint::Positive),
            ("df2", &df2, &Constraint::Positive),
        ])?;
        let batch_shape = df1.shape().to_vec();
        Ok(Self { df1, df2, batch_shape })
    }
}

impl Distribution for FisherSnedecor {
    fn batch_shape(&self) -> &[usize] {
        &self.batch_shape
    }

    fn support(&self) -> Constraint {
        Constraint::Positive
    }

    fn arg_constraints(&self) -> Vec<(&'static str, Constraint)> {
        vec![("df1", Constraint::Positive), ("df2", Constraint::Positive)]
    }

    fn has_rsample(&self) -> bool {
        true
    }

    fn rsample(&self, sample_shape: &[usize]) -> Result<Tensor> {
        // Ratio of two scaled chi-squared draws
        draw_elementwise(sample_shape, &self.batch_shape, &[&self.df1, &self.df2], |rng, p| {
            let x1 = 2.0 * standard_gamma(rng, 0.5 * p[0]) / p[0];
            let x2 = 2.0 * standard_gamma(rng, 0.5 * p[1]) / p[1];
            x1 / x2
        })
    }

    fn log_prob(&self, value: &Tensor) -> Result<Tensor> {
        check_log_prob_shape(value, &self.batch_shape, &[])?;
        map3(value, &self.df1, &self.df2, |x, d1, d2| {
            if x <= 0.0 {
                return f64::NEG_INFINITY;
            }
            let (h1, h2) = (0.5 * d1, 0.5 * d2);
            let lbeta = ln_gamma(h1) + ln_gamma(h2) - ln_gamma(h1 + h2);
            h1 * (d1 / d2).ln() + (h1 - 1.0) * x.ln()
                - (h1 + h2) * (d1 * x / d2).ln_1p()
                - lbeta
        })
    }

    fn mean(&self) -> Result<Tensor> {
        map2(&self.df1, &self.df2, |_, d2| {
            if d2 > 2.0 { d2 / (d2 - 2.0) } else { f64::NAN }
        })
    }

    fn variance(&self) -> Result<Tensor> {
        map2(&self.df1, &self.df2, |d1, d2| {
            if d2 > 4.0 {
                2.0 * d2 * d2 * (d1 + d2 - 2.0)
                    / (d1 * (d2 - 2.0) * (d2 - 2.0) * (d2 - 4.0))
            } else {
                f64::NAN
            }
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
