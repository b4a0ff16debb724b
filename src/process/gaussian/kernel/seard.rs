use super::{e2_norm_ard, expect_parameters, positive, Kernel, KernelError};
use nalgebra::DVector;
use std::fmt;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

/// Squared Exponential function with automatic relevance determination
/// (`SEard`) kernel
///
/// ```math
///     k(a, b) = σf² exp(-0.5 * (a - b)' * M * (a - b))
/// ```
///
/// # Parameters
/// * `M` - Diagonal with one inverse squared length scale per dimension.
/// * `σf` - Signal standard deviation.
///
/// Log-space parameter order is `[ln ℓ_1, .., ln ℓ_d, ln σf]`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct SEardKernel {
    length_scale: DVector<f64>,
    signal_std: f64,
}

impl SEardKernel {
    /// Create a new seard kernel with the given length scales
    pub fn new(
        length_scale: DVector<f64>,
        signal_std: f64,
    ) -> Result<Self, KernelError> {
        for l in length_scale.iter() {
            positive("length_scale", *l)?;
        }
        Ok(Self {
            length_scale,
            signal_std: positive("signal_std", signal_std)?,
        })
    }

    /// Unit length scales on `input_dim` dimensions and unit signal
    #[must_use]
    pub fn with_dim(input_dim: usize) -> Self {
        Self {
            length_scale: DVector::repeat(input_dim, 1.0),
            signal_std: 1.0,
        }
    }

    /// Create a new `SEardKernel` without checking parameters
    #[must_use]
    pub fn new_unchecked(length_scale: DVector<f64>, signal_std: f64) -> Self {
        Self {
            length_scale,
            signal_std,
        }
    }

    /// Number of input dimensions
    #[must_use]
    pub fn input_dim(&self) -> usize {
        self.length_scale.len()
    }
}

impl fmt::Display for SEardKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CovSEard")
    }
}

impl Kernel for SEardKernel {
    fn n_parameters(&self) -> usize {
        self.length_scale.len() + 1
    }

    fn covariance(&self, x1: &[f64], x2: &[f64]) -> f64 {
        let d2 = e2_norm_ard(x1, x2, self.length_scale.as_slice());
        self.signal_std.powi(2) * (-0.5 * d2).exp()
    }

    fn variance(&self, _x: &[f64]) -> f64 {
        self.signal_std.powi(2)
    }

    fn parameters(&self) -> DVector<f64> {
        DVector::from_iterator(
            self.n_parameters(),
            self.length_scale
                .iter()
                .chain(std::iter::once(&self.signal_std))
                .map(|x| x.ln()),
        )
    }

    fn reparameterize(&self, params: &[f64]) -> Result<Self, KernelError> {
        expect_parameters(params, self.n_parameters())?;
        let d = self.length_scale.len();
        let length_scale =
            DVector::from_iterator(d, params[..d].iter().map(|x| x.exp()));
        Ok(Self::new_unchecked(length_scale, params[d].exp()))
    }

    fn gradient_into(&self, x1: &[f64], x2: &[f64], grad: &mut [f64]) {
        let k = self.covariance(x1, x2);
        let d = self.length_scale.len();
        for (i, g) in grad[..d].iter_mut().enumerate() {
            let t = (x1[i] - x2[i]) / self.length_scale[i];
            *g = k * t * t;
        }
        grad[d] = 2.0 * k;
    }

    fn variance_gradient_into(&self, _x: &[f64], grad: &mut [f64]) {
        let d = self.length_scale.len();
        grad[..d].iter_mut().for_each(|g| *g = 0.0);
        grad[d] = 2.0 * self.signal_std.powi(2);
    }
}
