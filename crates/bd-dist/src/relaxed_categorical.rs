//! Temperature-relaxed categorical (Concrete) distribution.

use std::any::Any;

use bd_core::rng::with_rng;
use bd_core::tensor::{broadcast_shapes, broadcast_to, Tensor};
use bd_core::{Error, Result};
use ndarray::{ArrayD, IxDyn};
use rand::Rng;
use statrs::function::gamma::ln_gamma;

use bd_core::tensor::IntoTensor;

use crate::categorical::Categorical;
use crate::constraint::Constraint;
use crate::distribution::{check_log_prob_shape, extended_shape, Distribution};
use crate::math::logsumexp;
use crate::transformed::TransformedDistribution;
use crate::transforms::{ExpTransform, Transform};

/// Relaxed categorical in log space.
///
/// Draws are tempered Gumbel-softmax samples before exponentiation:
/// `x = (log_probs + gumbel_noise)/T`, renormalized in log space. The
/// exp of a draw lies on the simplex, which is what
/// [`RelaxedOneHotCategorical`] exposes.
pub struct ExpRelaxedCategorical {
    temperature: Tensor,
    inner: Categorical,
    event_shape: Vec<usize>,
}

impl ExpRelaxedCategorical {
    /// Construct from a temperature and unnormalized
    /// log-probabilities.
    pub fn from_logits(temperature: impl IntoTensor, logits: impl IntoTensor) -> Result<Self> {
        let inner = Categorical::from_logits(logits)?;
        Self::wrap(temperature.into_tensor(), inner)
    }

    /// Construct from a temperature and per-category weights.
    pub fn from_probs(temperature: impl IntoTensor, probs: impl IntoTensor) -> Result<Self> {
        let inner = Categorical::from_probs(probs)?;
        Self::wrap(temperature.into_tensor(), inner)
    }

    fn wrap(temperature: Tensor, inner: Categorical) -> Result<Self> {
        if temperature.iter().any(|&t| !(t > 0.0) || !t.is_finite()) {
            return Err(Error::Validation(
                "relaxation temperature must be finite and positive".into(),
            ));
        }
        let bshape = broadcast_shapes(temperature.shape(), inner.batch_shape())?;
        if bshape != inner.batch_shape() {
            return Err(Error::Validation(
                "temperature must broadcast within the categorical batch shape".into(),
            ));
        }
        let temperature = broadcast_to(&temperature, &bshape)?;
        let event_shape = vec![inner.num_events()];
        Ok(Self { temperature, inner, event_shape })
    }

    /// Relaxation temperature, broadcast to `batch_shape`.
    pub fn temperature(&self) -> &Tensor {
        &self.temperature
    }

    fn k(&self) -> usize {
        self.event_shape[0]
    }
}

impl Distribution for ExpRelaxedCategorical {
    fn batch_shape(&self) -> &[usize] {
        self.inner.batch_shape()
    }

    fn event_shape(&self) -> &[usize] {
        &self.event_shape
    }

    fn support(&self) -> Constraint {
        Constraint::Real
    }

    fn arg_constraints(&self) -> Vec<(&'static str, Constraint)> {
        vec![
            ("temperature", Constraint::Positive),
            ("probs", Constraint::Simplex),
        ]
    }

    fn has_rsample(&self) -> bool {
        true
    }

    fn rsample(&self, sample_shape: &[usize]) -> Result<Tensor> {
        let k = self.k();
        let n_batch: usize = self.batch_shape().iter().product();
        let reps: usize = sample_shape.iter().product();
        let lp = self.inner.log_probs()?;
        let lp: Vec<f64> = lp.iter().cloned().collect();
        let temp: Vec<f64> = self.temperature.iter().cloned().collect();
        let mut out = Vec::with_capacity(reps * n_batch * k);
        with_rng(|rng| {
            for _ in 0..reps {
                for b in 0..n_batch {
                    let t = temp[b];
                    let row = &lp[b * k..(b + 1) * k];
                    let z: Vec<f64> = row
                        .iter()
                        .map(|&l| {
                            let u: f64 = rng.gen_range(f64::MIN_POSITIVE..1.0);
                            let g = -(-u.ln()).ln();
                            (l + g) / t
                        })
                        .collect();
                    let lse = logsumexp(&z);
                    out.extend(z.iter().map(|v| v - lse));
                }
            }
        });
        let shape = extended_shape(sample_shape, self.batch_shape(), &self.event_shape);
        Ok(ArrayD::from_shape_vec(IxDyn(&shape), out)
            .map_err(|e| Error::Computation(e.to_string()))?
            .into_shared())
    }

    fn log_prob(&self, value: &Tensor) -> Result<Tensor> {
        let lead = check_log_prob_shape(value, self.batch_shape(), &self.event_shape)?;
        let k = self.k();
        let kf = k as f64;
        let mut full = lead.clone();
        full.push(k);
        let value = broadcast_to(value, &full)?;
        let lp = broadcast_to(&self.inner.log_probs()?, &full)?;
        let temp = broadcast_to(&self.temperature, &lead)?;
        let n: usize = lead.iter().product();
        let value = value
            .to_owned()
            .into_shape((n, k))
            .map_err(|e| Error::Computation(e.to_string()))?;
        let lp = lp
            .to_owned()
            .into_shape((n, k))
            .map_err(|e| Error::Computation(e.to_string()))?;
        let temp: Vec<f64> = temp.iter().cloned().collect();
        let out: Vec<f64> = (0..n)
            .map(|i| {
                let t = temp[i];
                let score: Vec<f64> = (0..k)
                    .map(|j| lp[[i, j]] - t * value[[i, j]])
                    .collect();
                let lse = logsumexp(&score);
                let total: f64 = score.iter().map(|s| s - lse).sum();
                total + ln_gamma(kf) + (kf - 1.0) * t.ln()
            })
            .collect();
        Ok(ArrayD::from_shape_vec(IxDyn(&lead), out)
            .map_err(|e| Error::Computation(e.to_string()))?
            .into_shared())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Relaxed one-hot categorical on the simplex.
///
/// The exp of an [`ExpRelaxedCategorical`] draw; reparameterized via
/// Gumbel-softmax noise, so gradients flow through sampling.
pub struct RelaxedOneHotCategorical {
    inner: TransformedDistribution,
    temperature: Tensor,
}

impl RelaxedOneHotCategorical {
    /// Construct from a temperature and unnormalized
    /// log-probabilities.
    pub fn from_logits(temperature: impl IntoTensor, logits: impl IntoTensor) -> Result<Self> {
        let base = ExpRelaxedCategorical::from_logits(temperature, logits)?;
        Self::wrap(base)
    }

    /// Construct from a temperature and per-category weights.
    pub fn from_probs(temperature: impl IntoTensor, probs: impl IntoTensor) -> Result<Self> {
        let base = ExpRelaxedCategorical::from_probs(temperature, probs)?;
        Self::wrap(base)
    }

    fn wrap(base: ExpRelaxedCategorical) -> Result<Self> {
        let temperature = base.temperature().clone();
        let inner = TransformedDistribution::new(base, vec![Transform::new(ExpTransform)])?;
        Ok(Self { inner, temperature })
    }

    /// Relaxation temperature.
    pub fn temperature(&self) -> &Tensor {
        &self.temperature
    }
}

impl Distribution for RelaxedOneHotCategorical {
    fn batch_shape(&self) -> &[usize] {
        self.inner.batch_shape()
    }

    fn event_shape(&self) -> &[usize] {
        self.inner.event_shape()
    }

    fn support(&self) -> Constraint {
        Constraint::Simplex
    }

    fn arg_constraints(&self) -> Vec<(&'static str, Constraint)> {
        vec![
            ("temperature", Constraint::Positive),
            ("probs", Constraint::Simplex),
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

    #[test]
    fn test_samples_lie_on_simplex() {
        bd_core::rng::seed(67);
        let d = RelaxedOneHotCategorical::from_probs(0.7, vec![0.2, 0.3, 0.5]).unwrap();
        let s = d.rsample(&[40]).unwrap();
        assert_eq!(s.shape(), &[40, 3]);
        assert!(Constraint::Simplex.is_valid(&s).unwrap());
    }

    #[test]
    fn test_low_temperature_approaches_one_hot() {
        bd_core::rng::seed(71);
        let d = RelaxedOneHotCategorical::from_probs(0.02, vec![0.1, 0.8, 0.1]).unwrap();
        let s = d.rsample(&[300]).unwrap();
        let mut hot_counts = [0usize; 3];
        for row in 0..300 {
            let mut hot = 0;
            for j in 1..3 {
                if s[[row, j]] > s[[row, hot]] {
                    hot = j;
                }
            }
            assert!(s[[row, hot]] > 0.9, "not near one-hot");
            hot_counts[hot] += 1;
        }
        assert!(hot_counts[1] > 180, "middle category count {}", hot_counts[1]);
    }

    #[test]
    fn test_log_space_and_simplex_densities_are_consistent() {
        use approx::assert_relative_eq;
        use bd_core::tensor::item;
        let base = ExpRelaxedCategorical::from_probs(0.5, vec![0.4, 0.6]).unwrap();
        let d = RelaxedOneHotCategorical::from_probs(0.5, vec![0.4, 0.6]).unwrap();
        let y = vec![0.3, 0.7].into_tensor();
        let x = bd_core::tensor::map1(&y, f64::ln);
        // p_Y(y) = p_X(ln y) * |d ln y / dy| = p_X(ln y) / prod(y)
        let expect = item(&base.log_prob(&x).unwrap()) - 0.3_f64.ln() - 0.7_f64.ln();
        assert_relative_eq!(item(&d.log_prob(&y).unwrap()), expect, epsilon = 1e-9);
    }

    #[test]
    fn test_temperature_must_fit_batch() {
        // A temperature axis larger than the batch cannot be absorbed.
        let r = ExpRelaxedCategorical::from_probs(
            vec![0.5, 0.6, 0.7],
            vec![0.5, 0.5],
        );
        assert!(r.is_err());
    }
}
