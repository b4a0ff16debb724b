use nalgebra::{DMatrix, DVector};

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use super::GaussianProcess;
use crate::process::gaussian::kernel::{CovFunction, Kernel};
use crate::result::{GpError, Result};

/// Everything needed to rebuild a trained [`GaussianProcess`]
///
/// Restoring replays the training patterns in order and then the
/// hyperparameters, so the rebuilt factorization matches the snapshotted one.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct GpState {
    /// Covariance specification, e.g. `CovSum(CovSEiso, CovNoise)`
    pub covariance: String,
    /// Input dimension
    pub input_dim: usize,
    /// Log-space hyperparameters
    pub hyperparameters: Vec<f64>,
    /// Training inputs, one row per pattern
    pub inputs: Vec<Vec<f64>>,
    /// Training targets
    pub targets: Vec<f64>,
}

impl<K: Kernel> GaussianProcess<K> {
    /// Snapshot of the specification, hyperparameters and training set
    #[must_use]
    pub fn to_state(&self) -> GpState {
        GpState {
            covariance: self.kernel.to_string(),
            input_dim: self.input_dim(),
            hyperparameters: self.hyperparameters().iter().copied().collect(),
            inputs: self.samples.rows().into_iter().map(<[f64]>::to_vec).collect(),
            targets: self.samples.targets().iter().copied().collect(),
        }
    }
}

impl GaussianProcess<CovFunction> {
    /// Rebuild a process from a [`GpState`]
    pub fn from_state(state: &GpState) -> Result<Self> {
        let mut gp = Self::from_spec(state.input_dim, &state.covariance)?;

        let n = state.inputs.len();
        if state.targets.len() != n {
            return Err(GpError::dimension_mismatch(
                "GaussianProcess::from_state (targets)",
                n,
                state.targets.len(),
            ));
        }
        if let Some(row) = state.inputs.iter().find(|r| r.len() != state.input_dim) {
            return Err(GpError::dimension_mismatch(
                "GaussianProcess::from_state (inputs)",
                state.input_dim,
                row.len(),
            ));
        }

        let xs = DMatrix::from_row_iterator(
            n,
            state.input_dim,
            state.inputs.iter().flatten().copied(),
        );
        let ys = DVector::from_column_slice(&state.targets);
        gp.add_batch(&xs, &ys)?;
        gp.set_hyperparameters(&state.hyperparameters)?;
        Ok(gp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trained() -> GaussianProcess {
        let mut gp =
            GaussianProcess::from_spec(2, "CovSum(CovSEiso, CovNoise)").unwrap();
        gp.set_hyperparameters(&[0.1, 0.2, -2.0]).unwrap();
        gp.add(&[0.0, 0.0], 0.0).unwrap();
        gp.add(&[1.0, 0.5], 0.7).unwrap();
        gp.add(&[0.3, 1.0], 0.4).unwrap();
        gp
    }

    #[test]
    fn state_round_trip() {
        let mut gp = trained();
        let state = gp.to_state();
        assert_eq!(state.covariance, "CovSum(CovSEiso, CovNoise)");
        assert_eq!(state.inputs[1], vec![1.0, 0.5]);

        let mut restored = GaussianProcess::from_state(&state).unwrap();
        let again = restored.to_state();
        assert_eq!(again.covariance, state.covariance);
        assert_eq!(again.inputs, state.inputs);
        assert_eq!(again.targets, state.targets);
        for (a, b) in again.hyperparameters.iter().zip(&state.hyperparameters) {
            assert::close(*a, *b, 1E-12);
        }
        assert::close(
            restored.log_likelihood().unwrap(),
            gp.log_likelihood().unwrap(),
            1E-12,
        );

        let xs = DMatrix::from_row_slice(2, 2, &[0.5, 0.5, -1.0, 2.0]);
        let a = gp.predict(&xs, true).unwrap();
        let b = restored.predict(&xs, true).unwrap();
        assert!(a.relative_eq(&b, 1E-12, 1E-12));
    }

    #[test]
    fn ragged_state_is_rejected() {
        let mut state = trained().to_state();
        state.inputs[2].push(1.0);
        assert!(matches!(
            GaussianProcess::from_state(&state),
            Err(GpError::DimensionMismatch { .. })
        ));

        let mut state = trained().to_state();
        state.hyperparameters.pop();
        assert!(matches!(
            GaussianProcess::from_state(&state),
            Err(GpError::Configuration(_))
        ));
    }

    #[cfg(feature = "serde1")]
    #[test]
    fn state_serde_json() {
        let state = trained().to_state();
        let json = serde_json::to_string(&state).unwrap();
        let back: GpState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
