use nalgebra::{DMatrix, DVector};

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use crate::result::{GpError, Result};

/// Ordered training patterns `(x, y)` sharing one input dimension
///
/// Inputs are stored row-major in one flat buffer, so a pattern is a
/// contiguous `&[f64]` of length `input_dim`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct SampleSet {
    input_dim: usize,
    inputs: Vec<f64>,
    targets: Vec<f64>,
}

impl SampleSet {
    /// Create an empty set for `input_dim`-dimensional inputs
    #[must_use]
    pub fn new(input_dim: usize) -> Self {
        Self {
            input_dim,
            inputs: Vec::new(),
            targets: Vec::new(),
        }
    }

    /// Append one pattern
    pub fn add(&mut self, x: &[f64], y: f64) -> Result<()> {
        if x.len() != self.input_dim {
            return Err(GpError::dimension_mismatch(
                "SampleSet::add",
                self.input_dim,
                x.len(),
            ));
        }
        self.inputs.extend_from_slice(x);
        self.targets.push(y);
        Ok(())
    }

    /// Append the rows of `xs` with targets `ys`, in order.
    ///
    /// Shapes are checked before anything is stored.
    pub fn add_batch(
        &mut self,
        xs: &DMatrix<f64>,
        ys: &DVector<f64>,
    ) -> Result<()> {
        if xs.ncols() != self.input_dim {
            return Err(GpError::dimension_mismatch(
                "SampleSet::add_batch (columns)",
                self.input_dim,
                xs.ncols(),
            ));
        }
        if xs.nrows() != ys.len() {
            return Err(GpError::dimension_mismatch(
                "SampleSet::add_batch (targets)",
                xs.nrows(),
                ys.len(),
            ));
        }

        self.inputs.reserve(xs.len());
        for row in xs.row_iter() {
            self.inputs.extend(row.iter());
        }
        self.targets.extend(ys.iter());
        Ok(())
    }

    /// Remove every pattern, keeping the input dimension
    pub fn clear(&mut self) {
        self.inputs.clear();
        self.targets.clear();
    }

    /// Number of patterns
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// True if there are no patterns
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Input dimension
    #[must_use]
    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    /// Input of pattern `i`
    #[must_use]
    pub fn x(&self, i: usize) -> &[f64] {
        let start = i * self.input_dim;
        &self.inputs[start..start + self.input_dim]
    }

    /// Target of pattern `i`
    #[must_use]
    pub fn y(&self, i: usize) -> f64 {
        self.targets[i]
    }

    /// All inputs as slices, in insertion order
    #[must_use]
    pub fn rows(&self) -> Vec<&[f64]> {
        if self.input_dim == 0 {
            return vec![&[][..]; self.len()];
        }
        self.inputs.chunks_exact(self.input_dim).collect()
    }

    /// All targets in insertion order
    #[must_use]
    pub fn targets(&self) -> DVector<f64> {
        DVector::from_column_slice(&self.targets)
    }

    /// Replace every target.
    pub fn set_targets(&mut self, ys: &[f64]) -> Result<()> {
        if ys.len() != self.len() {
            return Err(GpError::dimension_mismatch(
                "SampleSet::set_targets",
                self.len(),
                ys.len(),
            ));
        }
        self.targets.copy_from_slice(ys);
        Ok(())
    }

    /// Inputs as an `n x input_dim` matrix
    #[must_use]
    pub fn to_matrix(&self) -> DMatrix<f64> {
        DMatrix::from_row_slice(self.len(), self.input_dim, &self.inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_read_back() {
        let mut s = SampleSet::new(2);
        s.add(&[1.0, 2.0], 3.0).unwrap();
        s.add(&[4.0, 5.0], 6.0).unwrap();
        assert_eq!(s.len(), 2);
        assert_eq!(s.x(1), &[4.0, 5.0]);
        assert::close(s.y(0), 3.0, 1E-12);
        assert_eq!(s.rows(), vec![&[1.0, 2.0][..], &[4.0, 5.0][..]]);
        assert_eq!(
            s.to_matrix(),
            DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 4.0, 5.0])
        );
    }

    #[test]
    fn add_rejects_wrong_length() {
        let mut s = SampleSet::new(2);
        assert_eq!(
            s.add(&[1.0], 0.0),
            Err(GpError::dimension_mismatch("SampleSet::add", 2, 1))
        );
        assert!(s.is_empty());
    }

    #[test]
    fn batch_keeps_row_order() {
        let mut s = SampleSet::new(2);
        let xs = DMatrix::from_row_slice(3, 2, &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        let ys = DVector::from_column_slice(&[1.0, 2.0, 3.0]);
        s.add_batch(&xs, &ys).unwrap();
        assert_eq!(s.x(2), &[4.0, 5.0]);
        assert_eq!(s.targets(), ys);
    }

    #[test]
    fn bad_batch_leaves_set_unchanged() {
        let mut s = SampleSet::new(2);
        s.add(&[0.0, 0.0], 1.0).unwrap();

        let xs = DMatrix::zeros(3, 2);
        let ys = DVector::zeros(2);
        assert!(matches!(
            s.add_batch(&xs, &ys),
            Err(GpError::DimensionMismatch { .. })
        ));

        let xs = DMatrix::zeros(2, 3);
        assert!(s.add_batch(&xs, &ys).is_err());
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn clear_keeps_dimension() {
        let mut s = SampleSet::new(3);
        s.add(&[0.0, 0.0, 0.0], 1.0).unwrap();
        s.clear();
        assert!(s.is_empty());
        assert_eq!(s.input_dim(), 3);
        s.add(&[1.0, 1.0, 1.0], 1.0).unwrap();
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn set_targets_checks_length() {
        let mut s = SampleSet::new(1);
        s.add(&[0.0], 1.0).unwrap();
        s.add(&[1.0], 2.0).unwrap();
        assert!(s.set_targets(&[1.0]).is_err());
        s.set_targets(&[5.0, 6.0]).unwrap();
        assert::close(s.y(1), 6.0, 1E-12);
    }
}
