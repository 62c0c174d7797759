//! Errors reported by the integrator and the event sampler.

use thiserror::Error;

/// The error type of this crate.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// A configuration value is out of its allowed range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The integrand declared zero dimensions.
    #[error("the integrand must have at least one dimension")]
    ZeroDimension,
    /// The integrand dimension differs from the one the object was built for.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    /// Every cell of the maxima table has a vanishing maximum, there is nothing to sample.
    #[error("the global maximum of the integrand vanishes, no event can be generated")]
    VanishingMaximum,
}

/// A specialised `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Checks that the integrand dimension matches `expected`.
pub(crate) fn check_dim(expected: usize, found: usize) -> Result<()> {
    if found == 0 {
        return Err(Error::ZeroDimension);
    }
    if expected != found {
        return Err(Error::DimensionMismatch { expected, found });
    }
    Ok(())
}
