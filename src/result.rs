//! Errors raised by the Gaussian process and its optimizers
use thiserror::Error;

use crate::process::gaussian::kernel::{CovGradError, KernelError};

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, GpError>;

/// An error when building, training or querying a
/// [`GaussianProcess`](crate::process::gaussian::GaussianProcess)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GpError {
    /// The covariance specification, the hyperparameter vector or another
    /// setting is invalid
    #[error("configuration error: {0}")]
    Configuration(#[from] KernelError),
    /// Input or target shapes are inconsistent. The failing operation had no
    /// effect.
    #[error("dimension mismatch in {context}: expected {expected}, given {given}")]
    DimensionMismatch {
        /// Operation that rejected its input
        context: &'static str,
        /// Length the operation required
        expected: usize,
        /// Length it received
        given: usize,
    },
    /// The kernel matrix could not be factorized, even with jitter
    #[error("numerical failure: {0}")]
    NumericalFailure(String),
    /// A covariance gradient tensor was malformed
    #[error(transparent)]
    CovGrad(#[from] CovGradError),
}

impl GpError {
    pub(crate) fn dimension_mismatch(
        context: &'static str,
        expected: usize,
        given: usize,
    ) -> Self {
        Self::DimensionMismatch {
            context,
            expected,
            given,
        }
    }
}
