use super::{dot, expect_parameters, positive, Kernel, KernelError};
use nalgebra::{dvector, DVector};
use std::fmt;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

/// Linear kernel with a bias and a single scale
///
/// ```math
///     k(a, b) = (1 + a · b) / t²
/// ```
///
/// Log-space parameter order is `[ln t]`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct LinearKernel {
    scale: f64,
}

impl LinearKernel {
    /// Create a new linear kernel with the scale `t`
    pub fn new(scale: f64) -> Result<Self, KernelError> {
        Ok(Self {
            scale: positive("scale", scale)?,
        })
    }

    /// Create a new `LinearKernel` without checking parameters
    #[must_use]
    pub fn new_unchecked(scale: f64) -> Self {
        Self { scale }
    }
}

impl Default for LinearKernel {
    fn default() -> Self {
        Self { scale: 1.0 }
    }
}

impl fmt::Display for LinearKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CovLinearone")
    }
}

impl Kernel for LinearKernel {
    fn n_parameters(&self) -> usize {
        1
    }

    fn covariance(&self, x1: &[f64], x2: &[f64]) -> f64 {
        (1.0 + dot(x1, x2)) / (self.scale * self.scale)
    }

    fn parameters(&self) -> DVector<f64> {
        dvector![self.scale.ln()]
    }

    fn reparameterize(&self, params: &[f64]) -> Result<Self, KernelError> {
        expect_parameters(params, 1)?;
        Ok(Self::new_unchecked(params[0].exp()))
    }

    fn gradient_into(&self, x1: &[f64], x2: &[f64], grad: &mut [f64]) {
        grad[0] = -2.0 * self.covariance(x1, x2);
    }
}

/// Linear kernel with one relevance scale per input dimension
///
/// ```math
///     k(a, b) = Σ_i a_i b_i / ℓ_i²
/// ```
///
/// Log-space parameter order is `[ln ℓ_1, .., ln ℓ_d]`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct LinearArdKernel {
    length_scale: DVector<f64>,
}

impl LinearArdKernel {
    /// Create a new linear ARD kernel
    pub fn new(length_scale: DVector<f64>) -> Result<Self, KernelError> {
        for l in length_scale.iter() {
            positive("length_scale", *l)?;
        }
        Ok(Self { length_scale })
    }

    /// Create a new `LinearArdKernel` without checking parameters
    #[must_use]
    pub fn new_unchecked(length_scale: DVector<f64>) -> Self {
        Self { length_scale }
    }

    /// Unit scales on `input_dim` dimensions
    #[must_use]
    pub fn with_dim(input_dim: usize) -> Self {
        Self {
            length_scale: DVector::repeat(input_dim, 1.0),
        }
    }
}

impl fmt::Display for LinearArdKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CovLinearard")
    }
}

impl Kernel for LinearArdKernel {
    fn n_parameters(&self) -> usize {
        self.length_scale.len()
    }

    fn covariance(&self, x1: &[f64], x2: &[f64]) -> f64 {
        itertools::izip!(x1, x2, self.length_scale.iter())
            .map(|(a, b, l)| a * b / (l * l))
            .sum()
    }

    fn parameters(&self) -> DVector<f64> {
        self.length_scale.map(f64::ln)
    }

    fn reparameterize(&self, params: &[f64]) -> Result<Self, KernelError> {
        expect_parameters(params, self.n_parameters())?;
        Ok(Self::new_unchecked(DVector::from_iterator(
            params.len(),
            params.iter().map(|p| p.exp()),
        )))
    }

    fn gradient_into(&self, x1: &[f64], x2: &[f64], grad: &mut [f64]) {
        for (g, a, b, l) in
            itertools::izip!(grad.iter_mut(), x1, x2, self.length_scale.iter())
        {
            *g = -2.0 * a * b / (l * l);
        }
    }
}
