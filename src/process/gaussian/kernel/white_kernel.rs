use super::{expect_parameters, positive, Kernel, KernelError};
use nalgebra::{dvector, DVector};
use std::fmt;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

/// White Noise Kernel
///
/// Adds `σn²` to the self-covariance of a pattern. Two distinct patterns
/// never covary through this kernel, even if their coordinates coincide.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct WhiteKernel {
    /// Standard deviation of the noise
    noise_std: f64,
}

impl WhiteKernel {
    /// Create a new WhiteKernel with the given noise standard deviation
    pub fn new(noise_std: f64) -> Result<Self, KernelError> {
        Ok(Self {
            noise_std: positive("noise_std", noise_std)?,
        })
    }

    /// Create a new WhiteKernel without check the parameters
    #[must_use]
    pub fn new_unchecked(noise_std: f64) -> Self {
        Self { noise_std }
    }

    /// Noise variance `σn²`
    #[must_use]
    pub fn noise_level(&self) -> f64 {
        self.noise_std * self.noise_std
    }
}

impl Default for WhiteKernel {
    fn default() -> Self {
        Self { noise_std: 1.0 }
    }
}

impl fmt::Display for WhiteKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CovNoise")
    }
}

impl Kernel for WhiteKernel {
    fn n_parameters(&self) -> usize {
        1
    }

    fn covariance(&self, _x1: &[f64], _x2: &[f64]) -> f64 {
        0.0
    }

    fn variance(&self, _x: &[f64]) -> f64 {
        self.noise_level()
    }

    fn parameters(&self) -> DVector<f64> {
        dvector![self.noise_std.ln()]
    }

    fn reparameterize(&self, params: &[f64]) -> Result<Self, KernelError> {
        expect_parameters(params, 1)?;
        Ok(Self::new_unchecked(params[0].exp()))
    }

    fn gradient_into(&self, _x1: &[f64], _x2: &[f64], grad: &mut [f64]) {
        grad[0] = 0.0;
    }

    fn variance_gradient_into(&self, _x: &[f64], grad: &mut [f64]) {
        grad[0] = 2.0 * self.noise_level();
    }
}
