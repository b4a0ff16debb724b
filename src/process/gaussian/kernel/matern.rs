use super::{e2_norm, expect_parameters, positive, Kernel, KernelError};
use crate::consts::{SQRT_3, SQRT_5};
use nalgebra::{dvector, DVector};
use std::fmt;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

/// Isotropic Matérn kernel with `ν = 3/2`
///
/// ```math
///   K(\mathbf{x}, \mathbf{x'}) = \sigma_f^2 (1 + z) e^{-z}, \quad z = \frac{\sqrt{3} \|\mathbf{x} - \mathbf{x'}\|}{\ell}
/// ```
///
/// Log-space parameter order is `[ln ℓ, ln σf]`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct Matern3Kernel {
    length_scale: f64,
    signal_std: f64,
}

/// Isotropic Matérn kernel with `ν = 5/2`
///
/// ```math
///   K(\mathbf{x}, \mathbf{x'}) = \sigma_f^2 (1 + z + z^2 / 3) e^{-z}, \quad z = \frac{\sqrt{5} \|\mathbf{x} - \mathbf{x'}\|}{\ell}
/// ```
///
/// Log-space parameter order is `[ln ℓ, ln σf]`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct Matern5Kernel {
    length_scale: f64,
    signal_std: f64,
}

macro_rules! impl_matern {
    ($type: ty, $name: literal, $sqrt_nu2: expr, $shape: expr, $dshape: expr) => {
        impl $type {
            /// Create a new Matérn kernel with the given length scale and
            /// signal standard deviation
            pub fn new(
                length_scale: f64,
                signal_std: f64,
            ) -> Result<Self, KernelError> {
                Ok(Self {
                    length_scale: positive("length_scale", length_scale)?,
                    signal_std: positive("signal_std", signal_std)?,
                })
            }

            /// Create a new Matérn kernel without checking the parameters
            #[must_use]
            pub fn new_unchecked(length_scale: f64, signal_std: f64) -> Self {
                Self {
                    length_scale,
                    signal_std,
                }
            }

            fn z(&self, x1: &[f64], x2: &[f64]) -> f64 {
                $sqrt_nu2 * e2_norm(x1, x2, self.length_scale).sqrt()
            }
        }

        impl Default for $type {
            fn default() -> Self {
                Self {
                    length_scale: 1.0,
                    signal_std: 1.0,
                }
            }
        }

        impl fmt::Display for $type {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, $name)
            }
        }

        impl Kernel for $type {
            fn n_parameters(&self) -> usize {
                2
            }

            fn covariance(&self, x1: &[f64], x2: &[f64]) -> f64 {
                let z = self.z(x1, x2);
                self.signal_std.powi(2) * $shape(z) * (-z).exp()
            }

            fn variance(&self, _x: &[f64]) -> f64 {
                self.signal_std.powi(2)
            }

            fn parameters(&self) -> DVector<f64> {
                dvector![self.length_scale.ln(), self.signal_std.ln()]
            }

            fn reparameterize(
                &self,
                params: &[f64],
            ) -> Result<Self, KernelError> {
                expect_parameters(params, 2)?;
                Ok(Self::new_unchecked(params[0].exp(), params[1].exp()))
            }

            fn gradient_into(&self, x1: &[f64], x2: &[f64], grad: &mut [f64]) {
                let z = self.z(x1, x2);
                let s2 = self.signal_std.powi(2);
                let e = (-z).exp();
                grad[0] = s2 * $dshape(z) * e;
                grad[1] = 2.0 * s2 * $shape(z) * e;
            }

            fn variance_gradient_into(&self, _x: &[f64], grad: &mut [f64]) {
                grad[0] = 0.0;
                grad[1] = 2.0 * self.signal_std.powi(2);
            }
        }
    };
}

// d/d(ln ℓ) of shape(z)·e^{-z} is dshape(z)·e^{-z} since dz/d(ln ℓ) = -z
impl_matern!(
    Matern3Kernel,
    "CovMatern3iso",
    SQRT_3,
    |z: f64| 1.0 + z,
    |z: f64| z * z
);
impl_matern!(
    Matern5Kernel,
    "CovMatern5iso",
    SQRT_5,
    |z: f64| 1.0 + z + z * z / 3.0,
    |z: f64| z * z * (1.0 + z) / 3.0
);
