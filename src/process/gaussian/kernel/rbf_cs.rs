use super::{e2_norm, expect_parameters, positive, Kernel, KernelError};
use nalgebra::{dvector, DVector};
use std::fmt;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

/// Distance beyond which [`CompactRBFKernel`] vanishes unless told otherwise
pub const DEFAULT_SUPPORT: f64 = 0.8;

/// Squared exponential kernel tapered to compact support
///
/// ```math
///     k(a, b) = max(0, 1 - r / θ)³ σf² exp(-r² / 2ℓ²),  r = ‖a - b‖
/// ```
///
/// Points further apart than the support radius `θ` are uncorrelated, so
/// covariance matrices over spread out inputs are sparse. `θ` is fixed and
/// not a hyperparameter.
///
/// Log-space parameter order is `[ln ℓ, ln σf]`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct CompactRBFKernel {
    length_scale: f64,
    signal_std: f64,
    support: f64,
}

impl CompactRBFKernel {
    /// Create a new compactly supported rbf kernel
    pub fn new(
        length_scale: f64,
        signal_std: f64,
        support: f64,
    ) -> Result<Self, KernelError> {
        Ok(Self {
            length_scale: positive("length_scale", length_scale)?,
            signal_std: positive("signal_std", signal_std)?,
            support: positive("support", support)?,
        })
    }

    /// Create a new `CompactRBFKernel` without checking parameters
    #[must_use]
    pub fn new_unchecked(length_scale: f64, signal_std: f64, support: f64) -> Self {
        Self {
            length_scale,
            signal_std,
            support,
        }
    }

    /// Support radius
    #[must_use]
    pub fn support(&self) -> f64 {
        self.support
    }

    /// Taper `max(0, 1 - r / θ)³` and scaled squared distance `r² / ℓ²`
    fn taper(&self, x1: &[f64], x2: &[f64]) -> (f64, f64) {
        let r = e2_norm(x1, x2, 1.0).sqrt();
        let q = (1.0 - r / self.support).max(0.0).powi(3);
        (q, (r / self.length_scale).powi(2))
    }
}

impl Default for CompactRBFKernel {
    fn default() -> Self {
        Self {
            length_scale: 1.0,
            signal_std: 1.0,
            support: DEFAULT_SUPPORT,
        }
    }
}

impl fmt::Display for CompactRBFKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CovRBFCS")
    }
}

impl Kernel for CompactRBFKernel {
    fn n_parameters(&self) -> usize {
        2
    }

    fn covariance(&self, x1: &[f64], x2: &[f64]) -> f64 {
        let (q, d2) = self.taper(x1, x2);
        q * self.signal_std.powi(2) * (-0.5 * d2).exp()
    }

    fn variance(&self, _x: &[f64]) -> f64 {
        self.signal_std.powi(2)
    }

    fn parameters(&self) -> DVector<f64> {
        dvector![self.length_scale.ln(), self.signal_std.ln()]
    }

    fn reparameterize(&self, params: &[f64]) -> Result<Self, KernelError> {
        expect_parameters(params, 2)?;
        Ok(Self::new_unchecked(
            params[0].exp(),
            params[1].exp(),
            self.support,
        ))
    }

    fn gradient_into(&self, x1: &[f64], x2: &[f64], grad: &mut [f64]) {
        let (q, d2) = self.taper(x1, x2);
        let k = q * self.signal_std.powi(2) * (-0.5 * d2).exp();
        grad[0] = k * d2;
        grad[1] = 2.0 * k;
    }

    fn variance_gradient_into(&self, _x: &[f64], grad: &mut [f64]) {
        grad[0] = 0.0;
        grad[1] = 2.0 * self.signal_std.powi(2);
    }
}
