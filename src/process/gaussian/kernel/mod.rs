//! Covariance functions for Gaussian processes
//!
//! Every kernel keeps its hyperparameters in natural units but exposes them
//! in log-space through [`Kernel::parameters`] and
//! [`Kernel::reparameterize`], so an optimizer can move freely over the
//! reals while length-scales and variances stay positive.
use nalgebra::{DMatrix, DVector};
use std::fmt;
use thiserror::Error;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

mod covgrad;
pub use covgrad::*;

mod misc;
pub use self::misc::*;

mod ops;
pub use self::ops::*;

mod rbf;
pub use self::rbf::*;
mod seard;
pub use self::seard::*;
mod white_kernel;
pub use self::white_kernel::*;
mod linear;
pub use self::linear::*;
mod matern;
pub use self::matern::*;
mod rational_quadratic;
pub use self::rational_quadratic::*;
mod exp_sin_squared;
pub use self::exp_sin_squared::*;
mod periodic_matern;
pub use self::periodic_matern::*;
mod rbf_cs;
pub use self::rbf_cs::*;
mod filter;
pub use self::filter::*;

mod cov_function;
pub use self::cov_function::*;

/// Kernel Function
///
/// Points are passed as slices of length `input_dim`. The pairwise methods
/// are the primitives; the matrix methods are built on top of them.
pub trait Kernel:
    fmt::Debug + fmt::Display + Clone + PartialEq + Send + Sync
{
    /// Number of hyperparameters of this kernel
    fn n_parameters(&self) -> usize;

    /// Return the corresponding parameter vector
    /// The parameters here are in a log-scale
    fn parameters(&self) -> DVector<f64>;

    /// Create a new kernel of the same shape from the provided parameters.
    /// The parameters here are in a log-scale
    fn reparameterize(&self, params: &[f64]) -> Result<Self, KernelError>;

    /// Takes a sequence of parameters and consumes only the ones it needs
    /// to create itself.
    /// The parameters here are in a log-scale
    fn consume_parameters<'p>(
        &self,
        params: &'p [f64],
    ) -> Result<(Self, &'p [f64]), KernelError> {
        let n = self.n_parameters();
        if params.len() < n {
            return Err(KernelError::MissingParameters(n - params.len()));
        }
        let (cur, next) = params.split_at(n);
        Ok((self.reparameterize(cur)?, next))
    }

    /// Covariance between two distinct patterns
    fn covariance(&self, x1: &[f64], x2: &[f64]) -> f64;

    /// Covariance of a pattern with itself
    fn variance(&self, x: &[f64]) -> f64 {
        self.covariance(x, x)
    }

    /// Write the log-space gradient of `covariance(x1, x2)` into `grad`,
    /// which has length `n_parameters()`.
    fn gradient_into(&self, x1: &[f64], x2: &[f64], grad: &mut [f64]);

    /// Write the log-space gradient of `variance(x)` into `grad`
    fn variance_gradient_into(&self, x: &[f64], grad: &mut [f64]) {
        self.gradient_into(x, x, grad);
    }

    /// Log-space gradient of `covariance(x1, x2)`
    fn gradient(&self, x1: &[f64], x2: &[f64]) -> DVector<f64> {
        let mut grad = DVector::zeros(self.n_parameters());
        self.gradient_into(x1, x2, grad.as_mut_slice());
        grad
    }

    /// Log-space gradient of `variance(x)`
    fn variance_gradient(&self, x: &[f64]) -> DVector<f64> {
        let mut grad = DVector::zeros(self.n_parameters());
        self.variance_gradient_into(x, grad.as_mut_slice());
        grad
    }

    /// Returns the cross-covariance matrix between two sets of patterns
    fn covariance_matrix(&self, x1: &[&[f64]], x2: &[&[f64]]) -> DMatrix<f64> {
        DMatrix::from_fn(x1.len(), x2.len(), |i, j| {
            self.covariance(x1[i], x2[j])
        })
    }

    /// Returns the diagnal of the kernel(x, x)
    fn diag(&self, x: &[&[f64]]) -> DVector<f64> {
        DVector::from_iterator(x.len(), x.iter().map(|xi| self.variance(xi)))
    }

    /// Kernel matrix of a training set, variances on the diagonal
    fn autocovariance(&self, x: &[&[f64]]) -> DMatrix<f64> {
        let n = x.len();
        let mut cov = DMatrix::zeros(n, n);
        for i in 0..n {
            for j in 0..i {
                let k = self.covariance(x[i], x[j]);
                cov[(i, j)] = k;
                cov[(j, i)] = k;
            }
            cov[(i, i)] = self.variance(x[i]);
        }
        cov
    }

    /// Covariance and Gradient with the log-scaled hyper-parameters
    fn covariance_with_gradient(&self, x: &[&[f64]]) -> (DMatrix<f64>, CovGrad) {
        let n = x.len();
        let m = self.n_parameters();
        let mut cov = DMatrix::zeros(n, n);
        let mut grad = CovGrad::zeros(n, m);
        let mut g = vec![0.0; m];

        for i in 0..n {
            for j in 0..i {
                let k = self.covariance(x[i], x[j]);
                cov[(i, j)] = k;
                cov[(j, i)] = k;

                self.gradient_into(x[i], x[j], &mut g);
                for (p, &dk) in g.iter().enumerate() {
                    grad[(i, j, p)] = dk;
                    grad[(j, i, p)] = dk;
                }
            }
            cov[(i, i)] = self.variance(x[i]);
            self.variance_gradient_into(x[i], &mut g);
            for (p, &dk) in g.iter().enumerate() {
                grad[(i, i, p)] = dk;
            }
        }
        (cov, grad)
    }
}

/// Errors from Kernel construction
#[derive(Error, Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub enum KernelError {
    /// Parameter Out of Bounds
    #[error("parameter {name} is out of bounds ({}, {}), given: {given}", bounds.0, bounds.1)]
    ParameterOutOfBounds {
        /// Name of parameter
        name: String,
        /// Value given
        given: f64,
        /// Lower and upper bounds on value
        bounds: (f64, f64),
    },
    /// Too many parameters provided
    #[error("{0} extra parameters provided to kernel")]
    ExtraneousParameters(usize),
    /// Too few parameters provided
    #[error("missing {0} parameters")]
    MissingParameters(usize),
    /// Kernel name is not registered
    #[error("unknown covariance function: {0}")]
    UnknownKernel(String),
    /// The covariance specification could not be parsed
    #[error("cannot parse covariance specification `{spec}`: {reason}")]
    Syntax {
        /// Specification given
        spec: String,
        /// What went wrong
        reason: String,
    },
    /// Inputs need at least one dimension
    #[error("input dimension must be positive")]
    ZeroInputDimension,
    /// Input dimension filter points outside of the input
    #[error("input dimension {dim} is out of range for {input_dim} inputs")]
    InvalidDimension {
        /// Selected input dimension
        dim: usize,
        /// Input dimensionality
        input_dim: usize,
    },
}

pub(crate) fn positive(name: &str, value: f64) -> Result<f64, KernelError> {
    if value > 0.0 {
        Ok(value)
    } else {
        Err(KernelError::ParameterOutOfBounds {
            name: name.to_string(),
            given: value,
            bounds: (0.0, f64::INFINITY),
        })
    }
}

/// Check that exactly `n` finite log-space parameters were given.
///
/// Any finite value is accepted; `exp` of a very negative one underflows to
/// zero.
pub(crate) fn expect_parameters(
    params: &[f64],
    n: usize,
) -> Result<(), KernelError> {
    use std::cmp::Ordering;
    match params.len().cmp(&n) {
        Ordering::Equal => {}
        Ordering::Greater => {
            return Err(KernelError::ExtraneousParameters(params.len() - n))
        }
        Ordering::Less => {
            return Err(KernelError::MissingParameters(n - params.len()))
        }
    }
    match params.iter().find(|p| !p.is_finite()) {
        Some(&given) => Err(KernelError::ParameterOutOfBounds {
            name: "log parameter".to_string(),
            given,
            bounds: (f64::NEG_INFINITY, f64::INFINITY),
        }),
        None => Ok(()),
    }
}

macro_rules! impl_mul_add {
    ($type: ty) => {
        impl<B> std::ops::Mul<B> for $type
        where
            B: Kernel,
        {
            type Output = ProductKernel<$type, B>;

            fn mul(self, rhs: B) -> Self::Output {
                ProductKernel::new(self, rhs)
            }
        }

        impl<B> std::ops::Add<B> for $type
        where
            B: Kernel,
        {
            type Output = AddKernel<$type, B>;

            fn add(self, rhs: B) -> Self::Output {
                AddKernel::new(self, rhs)
            }
        }
    };
}

impl_mul_add!(RBFKernel);
impl_mul_add!(SEardKernel);
impl_mul_add!(WhiteKernel);
impl_mul_add!(LinearKernel);
impl_mul_add!(LinearArdKernel);
impl_mul_add!(Matern3Kernel);
impl_mul_add!(Matern5Kernel);
impl_mul_add!(RationalQuadratic);
impl_mul_add!(ExpSineSquaredKernel);
impl_mul_add!(PeriodicMatern3Kernel);
impl_mul_add!(CompactRBFKernel);

#[cfg(test)]
pub(crate) mod test_utils {
    use super::Kernel;

    /// Compare the analytic gradient of `kernel` with central differences of
    /// its covariance at the given parameters.
    pub fn check_gradient<K: Kernel>(
        kernel: &K,
        params: &[f64],
        x1: &[f64],
        x2: &[f64],
        tol: f64,
    ) {
        let kernel = kernel.reparameterize(params).unwrap();
        let grad = kernel.gradient(x1, x2);
        let var_grad = kernel.variance_gradient(x1);
        let e = 1E-6;

        for i in 0..params.len() {
            let mut lo = params.to_vec();
            let mut hi = params.to_vec();
            lo[i] -= e;
            hi[i] += e;
            let k_lo = kernel.reparameterize(&lo).unwrap();
            let k_hi = kernel.reparameterize(&hi).unwrap();

            let fd = (k_hi.covariance(x1, x2) - k_lo.covariance(x1, x2))
                / (2.0 * e);
            assert::close(grad[i], fd, tol);

            let fd_var = (k_hi.variance(x1) - k_lo.variance(x1)) / (2.0 * e);
            assert::close(var_grad[i], fd_var, tol);
        }
    }
}
