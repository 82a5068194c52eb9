//! Temperature-relaxed Bernoulli (binary Concrete) distribution.

use std::any::Any;

use bd_core::tensor::{broadcast_all, map3, IntoTensor, Tensor};
use bd_core::Result;
use rand::Rng;

use crate::constraint::Constraint;
use crate::distribution::{
    check_log_prob_shape, draw_elementwise, validate_params, Distribution,
};
use crate::math::softplus;
use crate::param::BinaryParam;
use crate::transformed::TransformedDistribution;
use crate::transforms::{SigmoidTransform, Transform};

/// Relaxed Bernoulli in logit space.
///
/// Draws are `(logits + logistic_noise) / temperature`; pushing through
/// a sigmoid yields the [`RelaxedBernoulli`] on the unit interval.
#[derive(Debug, Clone)]
pub struct LogitRelaxedBernoulli {
    temperature: Tensor,
    param: BinaryParam,
    batch_shape: Vec<usize>,
}

impl LogitRelaxedBernoulli {
    /// Construct from a temperature and success probabilities.
    pub fn from_probs(temperature: impl IntoTensor, probs: impl IntoTensor) -> Result<Self> {
        let mut ts = broadcast_all(&[&temperature.into_tensor(), &probs.into_tensor()])?;
        let probs = ts.pop().expect("two tensors");
        let temperature = ts.pop().expect("two tensors");
        validate_params(&[
            ("temperature", &temperature, &Constraint::Positive),
            ("probs", &probs, &Constraint::UnitInterval),
        ])?;
        let batch_shape = probs.shape().to_vec();
        Ok(Self { temperature, param: BinaryParam::Probs(probs), batch_shape })
    }

    /// Construct from a temperature and log-odds.
    pub fn from_logits(temperature: impl IntoTensor, logits: impl IntoTensor) -> Result<Self> {
        let mut ts = broadcast_all(&[&temperature.into_tensor(), &logits.into_tensor()])?;
        let logits = ts.pop().expect("two tensors");
        let temperature = ts.pop().expect("two tensors");
        validate_params(&[
            ("temperature", &temperature, &Constraint::Positive),
            ("logits", &logits, &Constraint::Real),
        ])?;
        let batch_shape = logits.shape().to_vec();
        Ok(Self { temperature, param: BinaryParam::Logits(logits), batch_shape })
    }

    /// Relaxation temperature.
    pub fn temperature(&self) -> &Tensor {
        &self.temperature
    }

    /// Log-odds (derived if constructed from probs).
    pub fn logits(&self) -> Tensor {
        self.param.logits()
    }
}

impl Distribution for LogitRelaxedBernoulli {
    fn batch_shape(&self) -> &[usize] {
        &self.batch_shape
    }

    fn support(&self) -> Constraint {
        Constraint::Real
    }

    fn arg_constraints(&self) -> Vec<(&'static str, Constraint)> {
        vec![
            ("temperature", Constraint::Positive),
            ("probs", Constraint::UnitInterval),
        ]
    }

    fn has_rsample(&self) -> bool {
        true
    }

    fn rsample(&self, sample_shape: &[usize]) -> Result<Tensor> {
        let logits = self.logits();
        draw_elementwise(
            sample_shape,
            &self.batch_shape,
            &[&logits, &self.temperature],
            |rng, p| {
                let u: f64 = rng.gen_range(f64::MIN_POSITIVE..1.0);
                let noise = u.ln() - (-u).ln_1p();
                (p[0] + noise) / p[1]
            },
        )
    }

    fn log_prob(&self, value: &Tensor) -> Result<Tensor> {
        check_log_prob_shape(value, &self.batch_shape, &[])?;
        let logits = self.logits();
        map3(value, &logits, &self.temperature, |x, l, t| {
            let diff = l - x * t;
            t.ln() + diff - 2.0 * softplus(diff)
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Relaxed Bernoulli on the open unit interval.
///
/// The sigmoid of a [`LogitRelaxedBernoulli`]; as the temperature
/// approaches zero, draws concentrate on `{0, 1}`.
pub struct RelaxedBernoulli {
    inner: TransformedDistribution,
    temperature: Tensor,
    probs: Tensor,
}

impl RelaxedBernoulli {
    /// Construct from a temperature and success probabilities.
    pub fn from_probs(temperature: impl IntoTensor, probs: impl IntoTensor) -> Result<Self> {
        let base = LogitRelaxedBernoulli::from_probs(temperature, probs)?;
        Self::wrap(base)
    }

    /// Construct from a temperature and log-odds.
    pub fn from_logits(temperature: impl IntoTensor, logits: impl IntoTensor) -> Result<Self> {
        let base = LogitRelaxedBernoulli::from_logits(temperature, logits)?;
        Self::wrap(base)
    }

    fn wrap(base: LogitRelaxedBernoulli) -> Result<Self> {
        let temperature = base.temperature().clone();
        let probs = base.param.probs();
        let inner =
            TransformedDistribution::new(base, vec![Transform::cached(SigmoidTransform)])?;
        Ok(Self { inner, temperature, probs })
    }

    /// Relaxation temperature.
    pub fn temperature(&self) -> &Tensor {
        &self.temperature
    }

    /// Success probabilities of the underlying Bernoulli.
    pub fn probs(&self) -> &Tensor {
        &self.probs
    }
}

impl Distribution for RelaxedBernoulli {
    fn batch_shape(&self) -> &[usize] {
        self.inner.batch_shape()
    }

    fn support(&self) -> Constraint {
        Constraint::UnitInterval
    }

    fn arg_constraints(&self) -> Vec<(&'static str, Constraint)> {
        vec![
            ("temperature", Constraint::Positive),
            ("probs", Constraint::UnitInterval),
        ]
    }

    fn has_rsample(&self) -> bool {
        true
    }

    fn rsample(&self, sample_shape: &[usize]) -> Result<Tensor> {
        self.inner.rsample(sample_shape)
    }

    fn log_prob(&self, value: &Tensor) -> Result<Tensor> {
        self.inner.log_prob(value)
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
    fn test_samples_live_in_unit_interval() {
        bd_core::rng::seed(59);
        let d = RelaxedBernoulli::from_probs(0.5, 0.4).unwrap();
        let s = d.rsample(&[200]).unwrap();
        assert!(s.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_low_temperature_concentrates_on_corners() {
        bd_core::rng::seed(61);
        let d = RelaxedBernoulli::from_probs(0.05, 0.7).unwrap();
        let s = d.rsample(&[500]).unwrap();
        let near_corner = s
            .iter()
            .filter(|&&v| !(0.05..=0.95).contains(&v))
            .count();
        assert!(near_corner > 450, "only {} corner draws", near_corner);
        // Fraction near 1 approximates the underlying probability.
        let ones = s.iter().filter(|&&v| v > 0.5).count() as f64 / 500.0;
        assert!((ones - 0.7).abs() < 0.1, "ones fraction {}", ones);
    }

    #[test]
    fn test_logit_space_density_is_normalized() {
        // Integrate the logit-space density numerically.
        let d = LogitRelaxedBernoulli::from_probs(0.66, 0.3).unwrap();
        let step = 0.01;
        let mut mass = 0.0;
        let mut x = -60.0;
        while x < 60.0 {
            mass += step * item(&d.log_prob(&x.into_tensor()).unwrap()).exp();
            x += step;
        }
        assert_relative_eq!(mass, 1.0, max_relative = 1e-3);
    }

    #[test]
    fn test_density_matches_sigmoid_change_of_variables() {
        let temperature = 0.8;
        let base = LogitRelaxedBernoulli::from_probs(temperature, 0.3).unwrap();
        let d = RelaxedBernoulli::from_probs(temperature, 0.3).unwrap();
        let y = 0.6_f64;
        let x = (y / (1.0 - y)).ln();
        // p_Y(y) = p_X(logit(y)) / (y (1-y))
        let expect =
            item(&base.log_prob(&x.into_tensor()).unwrap()) - y.ln() - (1.0 - y).ln();
        assert_relative_eq!(
            item(&d.log_prob(&y.into_tensor()).unwrap()),
            expect,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_invalid_temperature() {
        assert!(RelaxedBernoulli::from_probs(0.0, 0.5).is_err());
    }
}
