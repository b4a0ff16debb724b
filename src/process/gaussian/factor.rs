//! Lower Cholesky factor of the training kernel matrix
use log::{debug, log, Level};
use nalgebra::linalg::Cholesky;
use nalgebra::{DMatrix, DVector};

use super::GaussianProcessParams;
use crate::result::{GpError, Result};

/// `K + jitter·I = L Lᵀ` for the first `size()` training patterns
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Factor {
    l: DMatrix<f64>,
    jitter: f64,
}

impl Factor {
    /// Empty factor
    pub fn empty() -> Self {
        Self {
            l: DMatrix::zeros(0, 0),
            jitter: 0.0,
        }
    }

    /// Factorize `k` from scratch, adding growing jitter to the diagonal
    /// until the decomposition succeeds.
    pub fn compute(k: &DMatrix<f64>, params: &GaussianProcessParams) -> Result<Self> {
        let n = k.nrows();
        let mut jitter = 0.0;

        for attempt in 0..=params.max_jitter_attempts {
            let mut kj = k.clone();
            if jitter > 0.0 {
                kj.set_diagonal(&(k.diagonal().add_scalar(jitter)));
            }

            if let Some(l) = Cholesky::new(kj).map(Cholesky::unpack) {
                if l.diagonal().iter().all(|d| d.is_finite() && *d > 0.0) {
                    if jitter > 0.0 {
                        log!(
                            jitter_level(jitter, params),
                            "kernel matrix ({n}x{n}) needed jitter {jitter:e} after {attempt} attempts"
                        );
                    }
                    return Ok(Self { l, jitter });
                }
            }

            jitter = if jitter > 0.0 {
                jitter * params.jitter_factor
            } else {
                params.initial_jitter
            };
            debug!("cholesky failed, retrying with jitter {jitter:e}");
        }

        Err(GpError::NumericalFailure(format!(
            "kernel matrix ({n}x{n}) is not positive definite after {} jitter attempts",
            params.max_jitter_attempts
        )))
    }

    /// Append one pattern given its covariance with the factored patterns
    /// and its self-covariance.
    ///
    /// Returns `false`, leaving the factor untouched, if the new pivot is
    /// not positive.
    pub fn extend(&mut self, k_cross: &DVector<f64>, k_self: f64) -> bool {
        let n = self.size();
        debug_assert_eq!(k_cross.len(), n);

        let Some(l_row) = self.l.solve_lower_triangular(k_cross) else {
            return false;
        };
        let pivot = k_self + self.jitter - l_row.norm_squared();
        if !(pivot.is_finite() && pivot > 0.0) {
            debug!("incremental cholesky pivot {pivot:e} rejected at row {n}");
            return false;
        }

        let l = std::mem::replace(&mut self.l, DMatrix::zeros(0, 0));
        let mut l = l.resize(n + 1, n + 1, 0.0);
        for (j, v) in l_row.iter().enumerate() {
            l[(n, j)] = *v;
        }
        l[(n, n)] = pivot.sqrt();
        self.l = l;
        true
    }

    /// Number of factored patterns
    pub fn size(&self) -> usize {
        self.l.nrows()
    }

    /// Diagonal jitter the factor was computed with
    pub fn jitter(&self) -> f64 {
        self.jitter
    }

    /// Lower triangular factor
    pub fn l(&self) -> &DMatrix<f64> {
        &self.l
    }

    /// `L⁻¹ b` by forward substitution
    pub fn solve_lower(&self, b: &DVector<f64>) -> Result<DVector<f64>> {
        self.l
            .solve_lower_triangular(b)
            .ok_or_else(|| singular(self.size()))
    }

    /// `K⁻¹ y` with one forward and one backward substitution
    pub fn solve(&self, y: &DVector<f64>) -> Result<DVector<f64>> {
        let z = self.solve_lower(y)?;
        self.l
            .tr_solve_lower_triangular(&z)
            .ok_or_else(|| singular(self.size()))
    }

    /// `Σ ln L_ii`, that is half of `ln |K|`
    pub fn half_ln_det(&self) -> f64 {
        self.l.diagonal().iter().map(|d| d.ln()).sum()
    }

    /// `tr(K⁻¹ A)` for a symmetric `A`, as the trace of `L⁻¹ A L⁻ᵀ`
    pub fn trace_solve(&self, a: &DMatrix<f64>) -> Result<f64> {
        let n = self.size();
        let m = self.l.solve_lower_triangular(a).ok_or_else(|| singular(n))?;
        let s = self
            .l
            .solve_lower_triangular(&m.transpose())
            .ok_or_else(|| singular(n))?;
        Ok(s.trace())
    }
}

/// The first jitter is routine for near-singular matrices; anything larger
/// is worth a warning.
fn jitter_level(jitter: f64, params: &GaussianProcessParams) -> Level {
    if jitter > params.initial_jitter {
        Level::Warn
    } else {
        Level::Debug
    }
}

fn singular(n: usize) -> GpError {
    GpError::NumericalFailure(format!("cholesky factor of size {n} is singular"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spd() -> DMatrix<f64> {
        DMatrix::from_row_slice(
            3,
            3,
            &[4.0, 2.0, 0.6, 2.0, 5.0, 1.0, 0.6, 1.0, 3.0],
        )
    }

    #[test]
    fn compute_reconstructs_matrix() {
        let k = spd();
        let f = Factor::compute(&k, &GaussianProcessParams::default()).unwrap();
        let rebuilt = f.l() * f.l().transpose();
        assert!(rebuilt.relative_eq(&k, 1E-12, 1E-12));
        assert_eq!(f.jitter(), 0.0);
    }

    #[test]
    fn extend_matches_full_factorization() {
        let k = spd();
        let params = GaussianProcessParams::default();
        let full = Factor::compute(&k, &params).unwrap();

        let mut inc = Factor::empty();
        for i in 0..3 {
            let cross = DVector::from_iterator(i, (0..i).map(|j| k[(i, j)]));
            assert!(inc.extend(&cross, k[(i, i)]));
        }
        assert!(inc.l().relative_eq(full.l(), 1E-12, 1E-12));
    }

    #[test]
    fn extend_rejects_non_positive_pivot() {
        let mut f = Factor::empty();
        assert!(f.extend(&DVector::zeros(0), 1.0));
        assert!(!f.extend(&DVector::from_element(1, 1.0), 1.0));
        assert_eq!(f.size(), 1);
    }

    #[test]
    fn singular_matrix_gets_jitter() {
        let k = DMatrix::from_element(3, 3, 1.0);
        let f = Factor::compute(&k, &GaussianProcessParams::default()).unwrap();
        assert!(f.jitter() > 0.0);
    }

    #[test]
    fn only_grown_jitter_warns() {
        let params = GaussianProcessParams::default();
        assert_eq!(jitter_level(params.initial_jitter, &params), Level::Debug);
        assert_eq!(
            jitter_level(params.initial_jitter * params.jitter_factor, &params),
            Level::Warn
        );
    }

    #[test]
    fn indefinite_matrix_fails() {
        let k = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, -1.0]);
        let res = Factor::compute(&k, &GaussianProcessParams::default());
        assert!(matches!(res, Err(GpError::NumericalFailure(_))));
    }

    #[test]
    fn solve_and_trace_agree_with_inverse() {
        let k = spd();
        let f = Factor::compute(&k, &GaussianProcessParams::default()).unwrap();
        let y = DVector::from_column_slice(&[1.0, -2.0, 0.5]);
        let alpha = f.solve(&y).unwrap();
        assert!((&k * &alpha).relative_eq(&y, 1E-10, 1E-10));

        let inv = k.clone().try_inverse().unwrap();
        let a = DMatrix::from_row_slice(
            3,
            3,
            &[1.0, -0.5, 2.0, -0.5, 0.0, 0.3, 2.0, 0.3, -1.0],
        );
        assert::close(f.trace_solve(&a).unwrap(), (&inv * &a).trace(), 1E-10);
        assert::close(f.trace_solve(&k).unwrap(), 3.0, 1E-10);
        assert::close(f.half_ln_det(), 0.5 * k.determinant().ln(), 1E-10);
    }
}
