//! # bd-ad
//!
//! Forward-mode automatic differentiation primitives for batchdist.
//!
//! The exponential-family machinery in `bd-dist` derives entropies and
//! Kullback-Leibler divergences from the *gradient* of each family's
//! log-normalizer rather than from hand-coded per-family formulas. Those
//! gradients are computed here, with [`dual::Dual`] numbers: one tangent
//! seed per natural-parameter component.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dual;

pub use dual::Dual;
