//! Distributions derived by pushing a base distribution through
//! transforms.

use std::any::Any;
use std::sync::Arc;

use bd_core::tensor::{map2, sum_trailing, Tensor};
use bd_core::{Error, Result};

use crate::constraint::Constraint;
use crate::distribution::Distribution;
use crate::transforms::Transform;

/// A base distribution pushed through an ordered list of transforms.
///
/// Sampling applies the transforms forward; `log_prob` walks them
/// backward, accumulating inverse-Jacobian terms at each intermediate
/// point. Trailing batch axes of the base are absorbed into the event
/// when a transform's `event_dim` exceeds the base's.
pub struct TransformedDistribution {
    base: Arc<dyn Distribution>,
    transforms: Vec<Transform>,
    batch_shape: Vec<usize>,
    event_shape: Vec<usize>,
}

impl TransformedDistribution {
    /// Compose `base` with `transforms` (applied in order).
    pub fn new(base: impl Distribution, transforms: Vec<Transform>) -> Result<Self> {
        Self::from_arc(Arc::new(base), transforms)
    }

    /// As [`TransformedDistribution::new`], sharing an existing base.
    pub fn from_arc(
        base: Arc<dyn Distribution>,
        transforms: Vec<Transform>,
    ) -> Result<Self> {
        let mut full: Vec<usize> = base.batch_shape().to_vec();
        full.extend_from_slice(base.event_shape());
        let event_dim = transforms
            .iter()
            .map(|t| t.event_dim())
            .max()
            .unwrap_or(0)
            .max(base.event_shape().len());
        if event_dim > full.len() {
            return Err(Error::Validation(format!(
                "transform event_dim {} exceeds base dimensionality {:?}",
                event_dim,
                full
            )));
        }
        let batch_shape = full[..full.len() - event_dim].to_vec();
        let event_shape = full[full.len() - event_dim..].to_vec();
        Ok(Self { base, transforms, batch_shape, event_shape })
    }

    /// The transform chain.
    pub fn transforms(&self) -> &[Transform] {
        &self.transforms
    }

    /// The base distribution.
    pub fn base(&self) -> &dyn Distribution {
        self.base.as_ref()
    }
}

impl Distribution for TransformedDistribution {
    fn batch_shape(&self) -> &[usize] {
        &self.batch_shape
    }

    fn event_shape(&self) -> &[usize] {
        &self.event_shape
    }

    fn support(&self) -> Constraint {
        match self.transforms.last() {
            Some(t) => t.codomain(),
            None => self.base.support(),
        }
    }

    fn arg_constraints(&self) -> Vec<(&'static str, Constraint)> {
        Vec::new()
    }

    fn has_rsample(&self) -> bool {
        self.base.has_rsample()
    }

    fn sample(&self, sample_shape: &[usize]) -> Result<Tensor> {
        let mut x = self.base.sample(sample_shape)?;
        for t in &self.transforms {
            x = t.forward(&x)?;
        }
        Ok(x)
    }

    fn rsample(&self, sample_shape: &[usize]) -> Result<Tensor> {
        let mut x = self.base.rsample(sample_shape)?;
        for t in &self.transforms {
            x = t.forward(&x)?;
        }
        Ok(x)
    }

    fn log_prob(&self, value: &Tensor) -> Result<Tensor> {
        let event_dim = self.event_shape.len();
        let mut acc: Option<Tensor> = None;
        let mut y = value.clone();
        for t in self.transforms.iter().rev() {
            let x = t.inverse(&y)?;
            let term = t.log_abs_det_jacobian(&x, &y)?;
            let term = sum_trailing(&term, event_dim - t.event_dim());
            acc = Some(match acc {
                None => term,
                Some(a) => map2(&a, &term, |u, v| u + v)?,
            });
            y = x;
        }
        let base_lp = sum_trailing(
            &self.base.log_prob(&y)?,
            event_dim - self.base.event_shape().len(),
        );
        match acc {
            None => Ok(base_lp),
            Some(a) => map2(&base_lp, &a, |lp, j| lp - j),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
