//! Exact Gaussian process regression
//!
//! A [`GaussianProcess`](process::gaussian::GaussianProcess) keeps its
//! training patterns and a Cholesky factorization of the kernel matrix,
//! extending the factor row by row as patterns arrive. Covariance functions
//! are built in code by combining kernels with `+` and `*`, or parsed from
//! strings like `"CovSum(CovSEiso, CovNoise)"`. Hyperparameters live in log
//! space and can be fit with the optimizers in [`optim`].
//!
//! # Example
//!
//! ```
//! use gpr::prelude::*;
//! use nalgebra::DMatrix;
//!
//! let mut gp = GaussianProcess::from_spec(1, "CovSum(CovSEiso, CovNoise)").unwrap();
//! gp.set_hyperparameters(&[0.0, 0.0, -2.0]).unwrap();
//!
//! for x in [-2.0_f64, -1.0, 0.0, 1.0, 2.0] {
//!     gp.add(&[x], x.sin()).unwrap();
//! }
//!
//! let pred = gp.predict(&DMatrix::from_row_slice(1, 1, &[0.5]), true).unwrap();
//! assert!((pred[(0, 0)] - 0.5_f64.sin()).abs() < 0.1);
//! assert!(pred[(0, 1)] > 0.0);
//! ```
#[cfg(doctest)]
doc_comment::doctest!("../README.md");

pub mod consts;
pub mod optim;
pub mod prelude;
pub mod process;
pub mod result;
