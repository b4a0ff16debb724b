use super::{e2_norm, expect_parameters, positive, Kernel, KernelError};
use nalgebra::{dvector, DVector};
use std::fmt;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

/// Isotropic squared-exponential (RBF) kernel
/// The distance metric here is L2 (Euclidean).
///
/// ```math
///     K(\mathbf{x}, \mathbf{x'}) = \sigma_f^2 \exp\left(-\frac{\|\mathbf{x} - \mathbf{x'}\|^2}{2\ell^2}\right)
/// ```
///
/// # Parameters
/// * `length_scale` - Length scale, `ℓ`.
/// * `signal_std` - Signal standard deviation, `σf`.
///
/// Log-space parameter order is `[ln ℓ, ln σf]`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct RBFKernel {
    length_scale: f64,
    signal_std: f64,
}

impl RBFKernel {
    /// Create a new rbf kernel with the given length scale and signal
    /// standard deviation
    pub fn new(length_scale: f64, signal_std: f64) -> Result<Self, KernelError> {
        Ok(Self {
            length_scale: positive("length_scale", length_scale)?,
            signal_std: positive("signal_std", signal_std)?,
        })
    }

    /// Create a new `RBFKernel` without checking parameters
    #[must_use]
    pub fn new_unchecked(length_scale: f64, signal_std: f64) -> Self {
        Self {
            length_scale,
            signal_std,
        }
    }

    /// Length scale
    #[must_use]
    pub fn length_scale(&self) -> f64 {
        self.length_scale
    }

    /// Signal standard deviation
    #[must_use]
    pub fn signal_std(&self) -> f64 {
        self.signal_std
    }
}

impl Default for RBFKernel {
    fn default() -> Self {
        Self {
            length_scale: 1.0,
            signal_std: 1.0,
        }
    }
}

impl fmt::Display for RBFKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CovSEiso")
    }
}

impl Kernel for RBFKernel {
    fn n_parameters(&self) -> usize {
        2
    }

    fn covariance(&self, x1: &[f64], x2: &[f64]) -> f64 {
        let d2 = e2_norm(x1, x2, self.length_scale);
        self.signal_std.powi(2) * (-0.5 * d2).exp()
    }

    fn variance(&self, _x: &[f64]) -> f64 {
        self.signal_std.powi(2)
    }

    fn parameters(&self) -> DVector<f64> {
        dvector![self.length_scale.ln(), self.signal_std.ln()]
    }

    fn reparameterize(&self, params: &[f64]) -> Result<Self, KernelError> {
        expect_parameters(params, 2)?;
        Ok(Self::new_unchecked(params[0].exp(), params[1].exp()))
    }

    fn gradient_into(&self, x1: &[f64], x2: &[f64], grad: &mut [f64]) {
        let d2 = e2_norm(x1, x2, self.length_scale);
        let k = self.signal_std.powi(2) * (-0.5 * d2).exp();
        grad[0] = k * d2;
        grad[1] = 2.0 * k;
    }

    fn variance_gradient_into(&self, _x: &[f64], grad: &mut [f64]) {
        grad[0] = 0.0;
        grad[1] = 2.0 * self.signal_std.powi(2);
    }
}
