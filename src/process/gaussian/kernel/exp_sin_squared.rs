use super::{e2_norm, expect_parameters, positive, Kernel, KernelError};
use nalgebra::{dvector, DVector};
use std::f64::consts::PI;
use std::fmt;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

/// Exp Sine^2 Kernel
/// k(x_i, x_j) = σf² exp(-2 (sin(π / periodicity * d(x_i, x_j)) / length_scale) ^ 2)
///
/// Log-space parameter order is `[ln length_scale, ln σf, ln periodicity]`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct ExpSineSquaredKernel {
    length_scale: f64,
    signal_std: f64,
    periodicity: f64,
}

impl ExpSineSquaredKernel {
    /// Create a new `ExpSineSquaredKernel`
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

    /// Create a new `ExpSineSquaredKernel` without checking values
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

    /// Phase `π d / p` and `sin(phase) / ℓ`
    fn phase(&self, x1: &[f64], x2: &[f64]) -> (f64, f64) {
        let u = PI * e2_norm(x1, x2, 1.0).sqrt() / self.periodicity;
        (u, u.sin() / self.length_scale)
    }
}

impl Default for ExpSineSquaredKernel {
    fn default() -> Self {
        Self {
            length_scale: 1.0,
            signal_std: 1.0,
            periodicity: 1.0,
        }
    }
}

impl fmt::Display for ExpSineSquaredKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CovPeriodic")
    }
}

impl Kernel for ExpSineSquaredKernel {
    fn n_parameters(&self) -> usize {
        3
    }

    fn covariance(&self, x1: &[f64], x2: &[f64]) -> f64 {
        let (_, s) = self.phase(x1, x2);
        self.signal_std.powi(2) * (-2.0 * s * s).exp()
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
        let (u, s) = self.phase(x1, x2);
        let k = self.signal_std.powi(2) * (-2.0 * s * s).exp();
        grad[0] = 4.0 * k * s * s;
        grad[1] = 2.0 * k;
        grad[2] = 4.0 * k * s * u.cos() * u / self.length_scale;
    }

    fn variance_gradient_into(&self, _x: &[f64], grad: &mut [f64]) {
        grad[0] = 0.0;
        grad[1] = 2.0 * self.signal_std.powi(2);
        grad[2] = 0.0;
    }
}
