use super::{e2_norm, expect_parameters, positive, Kernel, KernelError};
use crate::consts::SQRT_3;
use nalgebra::{dvector, DVector};
use std::f64::consts::PI;
use std::fmt;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

/// Periodic Matérn 3/2 kernel
///
/// ```math
///   k(a, b) = σf² (1 + z) e^{-z}, \quad z = \sqrt{3} |\sin(π ‖a - b‖ / p)| / ℓ
/// ```
///
/// Log-space parameter order is `[ln ℓ, ln σf, ln p]`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct PeriodicMatern3Kernel {
    length_scale: f64,
    signal_std: f64,
    periodicity: f64,
}

impl PeriodicMatern3Kernel {
    /// Create a new `PeriodicMatern3Kernel`
    pub fn new(
        length_scale: f64,
        signal_std: f64,
        periodicity: f64,
    ) -> Result<Self, KernelError> {
        Ok(Self {
            length_scale: positive("length_scale", length_scale)?,
            signal_std: positive("signal_std", signal_std)?,
            periodicity: positive("periodicity", periodicity)?,
        })
    }

    /// Create a new `PeriodicMatern3Kernel` without checking values
    #[must_use]
    pub fn new_unchecked(
        length_scale: f64,
        signal_std: f64,
        periodicity: f64,
    ) -> Self {
        Self {
            length_scale,
            signal_std,
            periodicity,
        }
    }

    /// Phase `π d / p` and `z`
    fn phase(&self, x1: &[f64], x2: &[f64]) -> (f64, f64) {
        let u = PI * e2_norm(x1, x2, 1.0).sqrt() / self.periodicity;
        (u, SQRT_3 * u.sin().abs() / self.length_scale)
    }
}

impl Default for PeriodicMatern3Kernel {
    fn default() -> Self {
        Self {
            length_scale: 1.0,
            signal_std: 1.0,
            periodicity: 1.0,
        }
    }
}

impl fmt::Display for PeriodicMatern3Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CovPeriodicMatern3iso")
    }
}

impl Kernel for PeriodicMatern3Kernel {
    fn n_parameters(&self) -> usize {
        3
    }

    fn covariance(&self, x1: &[f64], x2: &[f64]) -> f64 {
        let (_, z) = self.phase(x1, x2);
        self.signal_std.powi(2) * (1.0 + z) * (-z).exp()
    }

    fn variance(&self, _x: &[f64]) -> f64 {
        self.signal_std.powi(2)
    }

    fn parameters(&self) -> DVector<f64> {
        dvector![
            self.length_scale.ln(),
            self.signal_std.ln(),
            self.periodicity.ln()
        ]
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
        let (u, z) = self.phase(x1, x2);
        let s2 = self.signal_std.powi(2);
        let e = (-z).exp();
        let l = self.length_scale;
        grad[0] = s2 * z * z * e;
        grad[1] = 2.0 * s2 * (1.0 + z) * e;
        // dk/dz = -σf² z e^{-z}; z·sign(sin u) = √3 sin(u) / ℓ
        grad[2] = 3.0 * s2 * e * u.sin() * u.cos() * u / (l * l);
    }

    fn variance_gradient_into(&self, _x: &[f64], grad: &mut [f64]) {
        grad[0] = 0.0;
        grad[1] = 2.0 * self.signal_std.powi(2);
        grad[2] = 0.0;
    }
}
