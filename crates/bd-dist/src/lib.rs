//! Probability distributions over batched arrays.
//!
//! This crate hosts the distribution toolkit for batchdist:
//! - the [`Distribution`] abstraction and ~24 concrete families
//! - transforms/bijectors with composition, Jacobians, and memo caching
//! - constraints and the constraint-to-transform registries
//! - Kullback-Leibler divergence with type-pair dispatch and a generic
//!   exponential-family fallback
//!
//! Shapes follow the `sample_shape + batch_shape + event_shape`
//! convention throughout; all array parameters broadcast against each
//! other at construction time.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod constraint;
pub mod distribution;
pub mod exp_family;
pub mod kl;
pub mod math;
mod param;
pub mod registry;
pub mod transformed;
pub mod transforms;

pub mod bernoulli;
pub mod beta;
pub mod binomial;
pub mod categorical;
pub mod cauchy;
pub mod chi2;
pub mod dirichlet;
pub mod exponential;
pub mod fisher_snedecor;
pub mod gamma;
pub mod geometric;
pub mod gumbel;
pub mod laplace;
pub mod log_normal;
pub mod multinomial;
pub mod normal;
pub mod one_hot_categorical;
pub mod pareto;
pub mod poisson;
pub mod relaxed_bernoulli;
pub mod relaxed_categorical;
pub mod student_t;
pub mod uniform;

pub use bd_core::tensor::{IntoTensor, Tensor};
pub use bd_core::{Error, Result};

pub use constraint::Constraint;
pub use distribution::Distribution;
pub use exp_family::{ef_entropy, ef_kl, ExponentialFamily};
pub use kl::kl_divergence;
pub use registry::{biject_to, transform_to};
pub use transformed::TransformedDistribution;
pub use transforms::{identity_transform, Bijector, Transform};

pub use bernoulli::Bernoulli;
pub use beta::Beta;
pub use binomial::Binomial;
pub use categorical::Categorical;
pub use cauchy::Cauchy;
pub use chi2::Chi2;
pub use dirichlet::Dirichlet;
pub use exponential::Exponential;
pub use fisher_snedecor::FisherSnedecor;
pub use gamma::Gamma;
pub use geometric::Geometric;
pub use gumbel::Gumbel;
pub use laplace::Laplace;
pub use log_normal::LogNormal;
pub use multinomial::Multinomial;
pub use normal::Normal;
pub use one_hot_categorical::OneHotCategorical;
pub use pareto::Pareto;
pub use poisson::Poisson;
pub use relaxed_bernoulli::{LogitRelaxedBernoulli, RelaxedBernoulli};
pub use relaxed_categorical::{ExpRelaxedCategorical, RelaxedOneHotCategorical};
pub use student_t::StudentT;
pub use uniform::Uniform;
