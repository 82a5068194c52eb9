//! The distribution abstraction.
//!
//! A distribution owns broadcast, validated parameters and exposes the
//! sampling/density surface over `sample_shape + batch_shape +
//! event_shape` tensors. Families with a valid reparameterization
//! implement [`Distribution::rsample`] and get [`Distribution::sample`]
//! for free; purely discrete families implement `sample` directly.

use std::any::Any;

use bd_core::rng::with_rng;
use bd_core::tensor::{broadcast_shapes, map1, Tensor};
use bd_core::{Error, Result};
use ndarray::{ArrayD, IxDyn};
use rand::rngs::StdRng;

use crate::constraint::Constraint;
use crate::exp_family::ExponentialFamily;

/// A parameterized probability distribution over batched tensors.
pub trait Distribution: Send + Sync + 'static {
    /// Dimensions over which draws are independent but not identically
    /// distributed.
    fn batch_shape(&self) -> &[usize];

    /// Dimensions of a single atomic draw, evaluated jointly by
    /// [`Distribution::log_prob`].
    fn event_shape(&self) -> &[usize] {
        &[]
    }

    /// The constraint satisfied by sample values.
    fn support(&self) -> Constraint;

    /// Constraint declared for each constructor parameter.
    fn arg_constraints(&self) -> Vec<(&'static str, Constraint)>;

    /// Whether [`Distribution::rsample`] is available.
    fn has_rsample(&self) -> bool {
        false
    }

    /// Draw without preserving a differentiation path.
    ///
    /// Returns shape `sample_shape + batch_shape + event_shape`.
    fn sample(&self, sample_shape: &[usize]) -> Result<Tensor> {
        self.rsample(sample_shape)
    }

    /// Reparameterized draw: a deterministic function of the parameters
    /// and parameter-free noise.
    fn rsample(&self, _sample_shape: &[usize]) -> Result<Tensor> {
        Err(Error::NotImplemented(
            "rsample for this distribution".into(),
        ))
    }

    /// Log-density (or log-mass) of `value`, evaluated per event.
    fn log_prob(&self, value: &Tensor) -> Result<Tensor>;

    /// Cumulative distribution function.
    fn cdf(&self, _value: &Tensor) -> Result<Tensor> {
        Err(Error::NotImplemented("cdf for this distribution".into()))
    }

    /// Inverse cumulative distribution function.
    fn icdf(&self, _value: &Tensor) -> Result<Tensor> {
        Err(Error::NotImplemented("icdf for this distribution".into()))
    }

    /// Differential (or discrete) entropy in nats, batched over
    /// `batch_shape`.
    fn entropy(&self) -> Result<Tensor> {
        Err(Error::NotImplemented(
            "entropy for this distribution".into(),
        ))
    }

    /// All values of a finite support, stacked along a new leading axis.
    fn enumerate_support(&self) -> Result<Tensor> {
        Err(Error::NotImplemented(
            "enumerate_support for this distribution".into(),
        ))
    }

    /// Mean of the distribution (`NaN` where undefined).
    fn mean(&self) -> Result<Tensor> {
        Err(Error::NotImplemented("mean for this distribution".into()))
    }

    /// Variance of the distribution (`inf`/`NaN` where divergent or
    /// undefined).
    fn variance(&self) -> Result<Tensor> {
        Err(Error::NotImplemented(
            "variance for this distribution".into(),
        ))
    }

    /// Standard deviation.
    fn stddev(&self) -> Result<Tensor> {
        Ok(map1(&self.variance()?, f64::sqrt))
    }

    /// Downcasting hook for the KL-divergence registry.
    fn as_any(&self) -> &dyn Any;

    /// Exponential-family view, if this family is a member.
    fn as_exp_family(&self) -> Option<&dyn ExponentialFamily> {
        None
    }
}

/// `sample_shape + batch_shape + event_shape`.
pub(crate) fn extended_shape(
    sample_shape: &[usize],
    batch_shape: &[usize],
    event_shape: &[usize],
) -> Vec<usize> {
    let mut shape = sample_shape.to_vec();
    shape.extend_from_slice(batch_shape);
    shape.extend_from_slice(event_shape);
    shape
}

/// Validate a `log_prob` operand against the distribution's shapes.
///
/// The trailing `event_shape.len()` axes must match `event_shape`
/// *exactly*; the leading remainder must broadcast against
/// `batch_shape`. Returns the broadcast batch shape of the result.
pub(crate) fn check_log_prob_shape(
    value: &Tensor,
    batch_shape: &[usize],
    event_shape: &[usize],
) -> Result<Vec<usize>> {
    let ev = event_shape.len();
    if value.ndim() < ev {
        return Err(Error::Validation(format!(
            "value shape {:?} has fewer axes than event shape {:?}",
            value.shape(),
            event_shape
        )));
    }
    let (lead, tail) = value.shape().split_at(value.ndim() - ev);
    if tail != event_shape {
        return Err(Error::Validation(format!(
            "value event shape {:?} must match distribution event shape {:?} exactly",
            tail, event_shape
        )));
    }
    broadcast_shapes(lead, batch_shape)
}

/// Draw one value per element from batch-broadcast parameters.
///
/// `params` must all already have `batch_shape` (constructors broadcast
/// them). `f` receives the per-element parameter values, in order, once
/// per drawn element; elements are drawn in row-major order, repeated
/// `prod(sample_shape)` times, from the global RNG stream.
pub(crate) fn draw_elementwise(
    sample_shape: &[usize],
    batch_shape: &[usize],
    params: &[&Tensor],
    mut f: impl FnMut(&mut StdRng, &[f64]) -> f64,
) -> Result<Tensor> {
    let n_batch: usize = batch_shape.iter().product();
    let reps: usize = sample_shape.iter().product();
    let cols: Vec<Vec<f64>> = params.iter().map(|p| p.iter().cloned().collect()).collect();
    let mut args = vec![0.0; cols.len()];
    let mut out = Vec::with_capacity(reps * n_batch);
    with_rng(|rng| {
        for _ in 0..reps {
            for i in 0..n_batch {
                for (a, c) in args.iter_mut().zip(&cols) {
                    *a = c[i];
                }
                out.push(f(rng, &args));
            }
        }
    });
    let shape = extended_shape(sample_shape, batch_shape, &[]);
    Ok(ArrayD::from_shape_vec(IxDyn(&shape), out)
        .map_err(|e| Error::Computation(e.to_string()))?
        .into_shared())
}

/// Validate broadcast parameters against their constraints.
///
/// [`Constraint::Dependent`] entries are skipped; everything else must
/// hold for every element, or construction fails.
pub(crate) fn validate_params(params: &[(&str, &Tensor, &Constraint)]) -> Result<()> {
    for (name, value, constraint) in params {
        if matches!(constraint, Constraint::Dependent) {
            continue;
        }
        if !constraint.is_valid(value)? {
            return Err(Error::Validation(format!(
                "parameter `{}` violates constraint {:?}",
                name, constraint
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bd_core::tensor::IntoTensor;

    #[test]
    fn test_extended_shape_concatenates() {
        assert_eq!(extended_shape(&[2], &[3], &[4]), vec![2, 3, 4]);
        assert_eq!(extended_shape(&[], &[], &[]), Vec::<usize>::new());
    }

    #[test]
    fn test_check_log_prob_shape_event_exactness() {
        let v = ndarray::ArrayD::<f64>::zeros(IxDyn(&[5, 3])).into_shared();
        // Event (3,) matches exactly; lead (5,) broadcasts against batch ().
        assert_eq!(check_log_prob_shape(&v, &[], &[3]).unwrap(), vec![5]);
        // Event mismatch is an error even though (5, 3) broadcasts to (5, 6).
        assert!(check_log_prob_shape(&v, &[], &[6]).is_err());
        assert!(check_log_prob_shape(&v, &[], &[1]).is_err());
    }

    #[test]
    fn test_check_log_prob_shape_batch_broadcast() {
        let v = ndarray::ArrayD::<f64>::zeros(IxDyn(&[7, 1])).into_shared();
        assert_eq!(check_log_prob_shape(&v, &[4], &[]).unwrap(), vec![7, 4]);
        let bad = vec![0.0; 3].into_tensor();
        assert!(check_log_prob_shape(&bad, &[4], &[]).is_err());
    }
}
