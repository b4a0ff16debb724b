use super::{e2_norm, expect_parameters, positive, Kernel, KernelError};
use nalgebra::{dvector, DVector};
use std::fmt;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

/// Rational Quadratic Kernel
///
/// ```math
///     k(a, b) = σf² (1 + |a - b|² / (2 α ℓ²))^{-α}
/// ```
///
/// # Parameters
/// `scale` -- Length scale
/// `signal_std` -- Signal standard deviation
/// `mixture` -- Mixture Scale
///
/// Log-space parameter order is `[ln ℓ, ln σf, ln α]`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct RationalQuadratic {
    scale: f64,
    signal_std: f64,
    mixture: f64,
}

impl RationalQuadratic {
    /// Create a new RationalQuadratic kernel
    pub fn new(
        scale: f64,
        signal_std: f64,
        mixture: f64,
    ) -> Result<Self, KernelError> {
        Ok(Self {
            scale: positive("scale", scale)?,
            signal_std: positive("signal_std", signal_std)?,
            mixture: positive("mixture", mixture)?,
        })
    }

    /// Create a new RationalQuadratic without checking values
    #[must_use]
    pub fn new_unchecked(scale: f64, signal_std: f64, mixture: f64) -> Self {
        Self {
            scale,
            signal_std,
            mixture,
        }
    }

    // squared distance over ℓ² and the base 1 + d2 / (2α)
    fn base(&self, x1: &[f64], x2: &[f64]) -> (f64, f64) {
        let d2 = e2_norm(x1, x2, self.scale);
        (d2, 1.0 + d2 / (2.0 * self.mixture))
    }
}

impl Default for RationalQuadratic {
    fn default() -> Self {
        Self {
            scale: 1.0,
            signal_std: 1.0,
            mixture: 1.0,
        }
    }
}

impl fmt::Display for RationalQuadratic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CovRQiso")
    }
}

impl Kernel for RationalQuadratic {
    fn n_parameters(&self) -> usize {
        3
    }

    fn covariance(&self, x1: &[f64], x2: &[f64]) -> f64 {
        let (_, base) = self.base(x1, x2);
        self.signal_std.powi(2) * base.powf(-self.mixture)
    }

    fn variance(&self, _x: &[f64]) -> f64 {
        self.signal_std.powi(2)
    }

    fn parameters(&self) -> DVector<f64> {
        dvector![self.scale.ln(), self.signal_std.ln(), self.mixture.ln()]
    }

    fn reparameterize(&self, params: &[f64]) -> Result<Self, KernelError> {
        expect_parameters(params, 3)?;
        Ok(Self::new_unchecked(
            params[0].exp(),
            params[1].exp(),
            params[2].exp(),
        ))
    }

    fn gradient_into(&self, x1: &[f64], x2: &[f64], grad: &mut [f64]) {
        let (d2, base) = self.base(x1, x2);
        let k = self.signal_std.powi(2) * base.powf(-self.mixture);
        grad[0] = k * d2 / base;
        grad[1] = 2.0 * k;
        grad[2] = k * base.ln().mul_add(-self.mixture, d2 / (2.0 * base));
    }

    fn variance_gradient_into(&self, _x: &[f64], grad: &mut [f64]) {
        grad[0] = 0.0;
        grad[1] = 2.0 * self.signal_std.powi(2);
        grad[2] = 0.0;
    }
}
