#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use nalgebra::{DMatrix, DVector};
use std::fmt;
use std::ops::{Index, IndexMut};
use thiserror::Error;

/// Gradient of a covariance matrix with respect to each log-hyperparameter.
///
/// Slice `k` holds `dK / dθ_k`, an `n x n` matrix.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct CovGrad {
    n: usize,
    slices: Vec<DMatrix<f64>>,
}

impl fmt::Display for CovGrad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.slices.iter().try_for_each(|s| write!(f, "{s}"))
    }
}

impl CovGrad {
    /// Create a new cov-grad with given slices
    pub fn new(slices: &[DMatrix<f64>]) -> Result<Self, CovGradError> {
        let Some(first) = slices.first() else {
            return Err(CovGradError::Empty);
        };

        let shapes: Vec<(usize, usize)> =
            slices.iter().map(nalgebra::Matrix::shape).collect();
        let square = first.is_square();
        if square && shapes.iter().all(|s| *s == shapes[0]) {
            Ok(Self {
                n: first.nrows(),
                slices: slices.to_vec(),
            })
        } else {
            Err(CovGradError::ShapeMismatch(shapes))
        }
    }

    /// Create a new cov-grad with all zeros
    #[must_use]
    pub fn zeros(n: usize, m: usize) -> Self {
        Self {
            n,
            slices: (0..m).map(|_| DMatrix::zeros(n, n)).collect(),
        }
    }

    /// Create a new `CovGrad` from a sequence of row slices
    pub fn from_row_slices(
        n: usize,
        m: usize,
        slice: &[f64],
    ) -> Result<Self, CovGradError> {
        if n * n * m == slice.len() {
            let slices = slice
                .chunks_exact(n * n)
                .map(|chunk| DMatrix::from_row_slice(n, n, chunk))
                .collect();
            Ok(Self { n, slices })
        } else {
            Err(CovGradError::ImproperSize(n * n * m, slice.len()))
        }
    }

    /// Number of hyperparameters (slices)
    #[must_use]
    pub fn n_parameters(&self) -> usize {
        self.slices.len()
    }

    /// Side length of every slice
    #[must_use]
    pub fn size(&self) -> usize {
        self.n
    }

    /// Iterate over the slices
    pub fn iter(&self) -> impl Iterator<Item = &DMatrix<f64>> {
        self.slices.iter()
    }

    /// Element-wise product of `weights` with each slice, summed.
    ///
    /// Entry `k` of the output is `Σ_ij weights_ij * dK_k,ij`.
    pub fn contract(
        &self,
        weights: &DMatrix<f64>,
    ) -> Result<DVector<f64>, CovGradError> {
        if weights.shape() != (self.n, self.n) {
            return Err(CovGradError::ShapeMismatch(vec![
                (self.n, self.n),
                weights.shape(),
            ]));
        }
        Ok(DVector::from_iterator(
            self.slices.len(),
            self.slices.iter().map(|s| s.dot(weights)),
        ))
    }

    /// Check if this is relatively eq to another gradient
    #[must_use]
    pub fn relative_eq(&self, other: &CovGrad, rel: f64, abs: f64) -> bool {
        self.slices.len() == other.slices.len()
            && self
                .slices
                .iter()
                .zip(other.slices.iter())
                .all(|(a, b)| a.relative_eq(b, rel, abs))
    }
}

impl Index<usize> for CovGrad {
    type Output = DMatrix<f64>;

    fn index(&self, k: usize) -> &Self::Output {
        &self.slices[k]
    }
}

impl IndexMut<usize> for CovGrad {
    fn index_mut(&mut self, k: usize) -> &mut Self::Output {
        &mut self.slices[k]
    }
}

impl Index<(usize, usize, usize)> for CovGrad {
    type Output = f64;

    fn index(&self, (i, j, k): (usize, usize, usize)) -> &Self::Output {
        &self.slices[k][(i, j)]
    }
}

impl IndexMut<(usize, usize, usize)> for CovGrad {
    fn index_mut(
        &mut self,
        (i, j, k): (usize, usize, usize),
    ) -> &mut Self::Output {
        &mut self.slices[k][(i, j)]
    }
}

/// Error from constructing a `CovGrad`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub enum CovGradError {
    /// The shapes of the slices do not match or are not square
    #[error("covariance gradient shape mismatch: shapes {0:?}")]
    ShapeMismatch(Vec<(usize, usize)>),
    /// A `CovGrad` cannot be built from nothing
    #[error("cannot create an empty covariance gradient")]
    Empty,
    /// Improper number of points to construct a `CovGrad`
    #[error("cannot create covariance gradient: expected {0} values, given {1}")]
    ImproperSize(usize, usize),
}
