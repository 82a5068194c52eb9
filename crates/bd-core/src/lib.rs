//! Foundation crate for batchdist.
//!
//! This crate hosts the pieces every other crate builds on:
//! - the [`Error`]/[`Result`] types
//! - the batched [`tensor::Tensor`] alias and its broadcasting algebra
//! - the process-global, snapshot/restore-able RNG stream ([`rng`])

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod rng;
pub mod tensor;

pub use error::{Error, Result};
