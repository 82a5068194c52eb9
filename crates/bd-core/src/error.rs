//! Error types for batchdist.

use thiserror::Error;

/// batchdist error type.
#[derive(Error, Debug)]
pub enum Error {
    /// A parameter failed its declared constraint, or shapes are not
    /// broadcast-compatible.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A numeric computation could not be carried out.
    #[error("Computation error: {0}")]
    Computation(String),

    /// Capability absent for this family, transform, or type pair.
    #[error("Not implemented: {0}")]
    NotImplemented(String),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
