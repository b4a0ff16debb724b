use super::{Kernel, KernelError};
use nalgebra::DVector;
use std::fmt;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

/// Restrict a kernel to one coordinate of the input
///
/// The wrapped kernel sees one-dimensional patterns `[x[dim]]` and owns all
/// of the hyperparameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct InputDimFilter<K: Kernel> {
    dim: usize,
    kernel: K,
}

impl<K: Kernel> InputDimFilter<K> {
    /// Apply `kernel` to coordinate `dim` of `input_dim`-dimensional inputs
    pub fn new(
        input_dim: usize,
        dim: usize,
        kernel: K,
    ) -> Result<Self, KernelError> {
        if dim < input_dim {
            Ok(Self { dim, kernel })
        } else {
            Err(KernelError::InvalidDimension { dim, input_dim })
        }
    }

    /// Selected coordinate
    #[must_use]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Wrapped kernel
    pub fn inner(&self) -> &K {
        &self.kernel
    }

    fn select<'a>(&self, x: &'a [f64]) -> &'a [f64] {
        &x[self.dim..=self.dim]
    }
}

impl<K: Kernel> fmt::Display for InputDimFilter<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InputDimFilter({}/{})", self.dim, self.kernel)
    }
}

impl<K: Kernel> Kernel for InputDimFilter<K> {
    fn n_parameters(&self) -> usize {
        self.kernel.n_parameters()
    }

    fn parameters(&self) -> DVector<f64> {
        self.kernel.parameters()
    }

    fn reparameterize(&self, params: &[f64]) -> Result<Self, KernelError> {
        Ok(Self {
            dim: self.dim,
            kernel: self.kernel.reparameterize(params)?,
        })
    }

    fn covariance(&self, x1: &[f64], x2: &[f64]) -> f64 {
        self.kernel.covariance(self.select(x1), self.select(x2))
    }

    fn variance(&self, x: &[f64]) -> f64 {
        self.kernel.variance(self.select(x))
    }

    fn gradient_into(&self, x1: &[f64], x2: &[f64], grad: &mut [f64]) {
        self.kernel
            .gradient_into(self.select(x1), self.select(x2), grad);
    }

    fn variance_gradient_into(&self, x: &[f64], grad: &mut [f64]) {
        self.kernel.variance_gradient_into(self.select(x), grad);
    }
}
