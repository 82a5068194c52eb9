//! Dual probs/logits parameterization for discrete families.
//!
//! Exactly the representation supplied at construction is stored; the
//! other one is derived on read by pure conversion functions and never
//! written back. Operations that do not need the derived representation
//! (e.g. `sample` on a probs-parameterized Bernoulli) never compute it.

use bd_core::tensor::{map1, map_rows, Tensor};
use bd_core::Result;

use crate::math::{log_softmax_slice, prob_to_logit, sigmoid, softmax_slice};

/// Probability-or-logits storage for scalar-event (binary/count)
/// families.
#[derive(Debug, Clone)]
pub(crate) enum BinaryParam {
    Probs(Tensor),
    Logits(Tensor),
}

impl BinaryParam {
    pub(crate) fn is_probs(&self) -> bool {
        matches!(self, BinaryParam::Probs(_))
    }

    /// Success probabilities, derived if logits were supplied.
    pub(crate) fn probs(&self) -> Tensor {
        match self {
            BinaryParam::Probs(t) => t.clone(),
            BinaryParam::Logits(t) => map1(t, sigmoid),
        }
    }

    /// Log-odds, derived (with boundary clamping) if probs were
    /// supplied.
    pub(crate) fn logits(&self) -> Tensor {
        match self {
            BinaryParam::Probs(t) => map1(t, prob_to_logit),
            BinaryParam::Logits(t) => t.clone(),
        }
    }
}

/// Probability-or-logits storage for families with a category axis.
///
/// `Probs` rows are normalized at construction; `Logits` rows are kept
/// as supplied and normalized where used.
#[derive(Debug, Clone)]
pub(crate) enum CategoricalParam {
    Probs(Tensor),
    Logits(Tensor),
}

impl CategoricalParam {
    pub(crate) fn stored(&self) -> &Tensor {
        match self {
            CategoricalParam::Probs(t) | CategoricalParam::Logits(t) => t,
        }
    }

    pub(crate) fn is_probs(&self) -> bool {
        matches!(self, CategoricalParam::Probs(_))
    }

    fn num_categories(&self) -> usize {
        let s = self.stored().shape();
        s[s.len() - 1]
    }

    /// Per-category probabilities along the last axis.
    pub(crate) fn probs(&self) -> Result<Tensor> {
        match self {
            CategoricalParam::Probs(t) => Ok(t.clone()),
            CategoricalParam::Logits(t) => {
                map_rows(t, self.num_categories(), |row, out| {
                    out.copy_from_slice(&softmax_slice(row))
                })
            }
        }
    }

    /// Normalized per-category log-probabilities along the last axis.
    ///
    /// A zero probability keeps its exact `-inf` log.
    pub(crate) fn log_probs(&self) -> Result<Tensor> {
        match self {
            CategoricalParam::Probs(t) => Ok(map1(t, f64::ln)),
            CategoricalParam::Logits(t) => {
                map_rows(t, self.num_categories(), |row, out| {
                    out.copy_from_slice(&log_softmax_slice(row))
                })
            }
        }
    }
}
