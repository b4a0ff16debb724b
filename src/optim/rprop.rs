//! Resilient backpropagation (iRprop) ascent
use nalgebra::DVector;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use super::{report, Maximizer, Optimum};
use crate::process::RandomProcess;
use crate::result::{GpError, Result};

/// What to do with a parameter whose gradient changed sign
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub enum SignChange {
    /// Treat the gradient as zero for this step
    #[default]
    Skip,
    /// Undo the previous step of that parameter
    Backtrack,
}

/// RProp Parameters
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct RPropParams {
    /// Stop once every step size is below this
    pub eps_stop: f64,
    /// Initial step size
    pub delta0: f64,
    /// Smallest step size
    pub delta_min: f64,
    /// Largest step size
    pub delta_max: f64,
    /// Shrink factor on a sign change
    pub eta_minus: f64,
    /// Growth factor while the sign holds
    pub eta_plus: f64,
    /// Handling of sign changes
    pub sign_change: SignChange,
}

impl Default for RPropParams {
    fn default() -> Self {
        Self {
            eps_stop: 1E-5,
            delta0: 0.1,
            delta_min: 1E-6,
            delta_max: 50.0,
            eta_minus: 0.5,
            eta_plus: 1.2,
            sign_change: SignChange::Skip,
        }
    }
}

impl RPropParams {
    /// Set the stopping threshold on the step sizes
    #[must_use]
    pub fn with_eps_stop(self, eps_stop: f64) -> Self {
        Self { eps_stop, ..self }
    }

    /// Set the initial step size
    #[must_use]
    pub fn with_delta0(self, delta0: f64) -> Self {
        Self { delta0, ..self }
    }

    /// Set the step size bounds
    #[must_use]
    pub fn with_delta_bounds(self, delta_min: f64, delta_max: f64) -> Self {
        Self {
            delta_min,
            delta_max,
            ..self
        }
    }

    /// Set the shrink and growth factors
    #[must_use]
    pub fn with_etas(self, eta_minus: f64, eta_plus: f64) -> Self {
        Self {
            eta_minus,
            eta_plus,
            ..self
        }
    }

    /// Set the sign change handling
    #[must_use]
    pub fn with_sign_change(self, sign_change: SignChange) -> Self {
        Self {
            sign_change,
            ..self
        }
    }
}

/// Gradient-sign ascent with per-parameter adaptive steps
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RProp {
    params: RPropParams,
}

impl RProp {
    /// Create a new optimizer with the given parameters
    #[must_use]
    pub fn new(params: RPropParams) -> Self {
        Self { params }
    }

    /// Optimizer parameters
    pub fn params(&self) -> &RPropParams {
        &self.params
    }
}

fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Put the best parameters seen back into `process` before reporting `err`
fn restore<P: RandomProcess>(
    process: &mut P,
    best: &DVector<f64>,
    err: GpError,
) -> GpError {
    match process.set_parameters(best.as_slice()) {
        Ok(()) => err,
        Err(restore_err) => restore_err,
    }
}

impl Maximizer for RProp {
    fn maximize<P: RandomProcess>(
        &self,
        process: &mut P,
        max_iterations: usize,
        verbose: bool,
    ) -> Result<Optimum> {
        let p = &self.params;
        let n = process.n_parameters();
        let mut theta = process.parameters();
        let mut delta = DVector::from_element(n, p.delta0);
        let mut grad_old = DVector::zeros(n);
        let mut step_old: DVector<f64> = DVector::zeros(n);

        let mut best_theta = theta.clone();
        let mut best_ln_m = f64::NEG_INFINITY;
        let mut converged = false;
        let mut iterations = 0;

        while iterations < max_iterations {
            let (ln_m, mut grad) = match process.ln_m_with_gradient() {
                Ok(res) => res,
                Err(err) => return Err(restore(process, &best_theta, err)),
            };
            report(verbose, "rprop", iterations, ln_m);
            if ln_m > best_ln_m {
                best_ln_m = ln_m;
                best_theta.copy_from(&theta);
            }

            if delta.amax() < p.eps_stop {
                converged = true;
                break;
            }
            iterations += 1;

            for j in 0..n {
                let change = grad_old[j] * grad[j];
                if change > 0.0 {
                    delta[j] = (delta[j] * p.eta_plus).min(p.delta_max);
                } else if change < 0.0 {
                    delta[j] = (delta[j] * p.eta_minus).max(p.delta_min);
                    if p.sign_change == SignChange::Backtrack {
                        theta[j] -= step_old[j];
                    }
                    grad[j] = 0.0;
                }
                step_old[j] = sign(grad[j]) * delta[j];
                theta[j] += step_old[j];
            }
            grad_old = grad;
            if let Err(err) = process.set_parameters(theta.as_slice()) {
                return Err(restore(process, &best_theta, err));
            }
        }

        // the last step has not been scored yet
        if !converged {
            let ln_m = match process.ln_m() {
                Ok(ln_m) => ln_m,
                Err(err) => return Err(restore(process, &best_theta, err)),
            };
            if ln_m > best_ln_m {
                best_ln_m = ln_m;
                best_theta.copy_from(&theta);
            }
        }

        process.set_parameters(best_theta.as_slice())?;
        Ok(Optimum {
            hyperparameters: best_theta,
            log_likelihood: best_ln_m,
            iterations,
            converged,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Concave quadratic with its maximum at `center`
    struct Bowl {
        theta: DVector<f64>,
        center: DVector<f64>,
    }

    impl RandomProcess for Bowl {
        fn n_parameters(&self) -> usize {
            self.theta.len()
        }

        fn parameters(&self) -> DVector<f64> {
            self.theta.clone()
        }

        fn set_parameters(&mut self, parameters: &[f64]) -> Result<()> {
            self.theta.copy_from_slice(parameters);
            Ok(())
        }

        fn ln_m(&mut self) -> Result<f64> {
            Ok(-(&self.theta - &self.center).norm_squared())
        }

        fn ln_m_gradient(&mut self) -> Result<DVector<f64>> {
            Ok((&self.center - &self.theta) * 2.0)
        }
    }

    fn bowl() -> Bowl {
        Bowl {
            theta: DVector::zeros(2),
            center: DVector::from_column_slice(&[1.5, -0.7]),
        }
    }

    #[test]
    fn rprop_finds_bowl_center() {
        let mut b = bowl();
        let opt = RProp::default().maximize(&mut b, 500, false).unwrap();
        assert!(opt.converged);
        assert::close(b.theta[0], 1.5, 1E-4);
        assert::close(b.theta[1], -0.7, 1E-4);
        assert_eq!(b.theta, opt.hyperparameters);
    }

    #[test]
    fn rprop_backtrack_finds_bowl_center() {
        let mut b = bowl();
        let rprop = RProp::new(
            RPropParams::default().with_sign_change(SignChange::Backtrack),
        );
        let opt = rprop.maximize(&mut b, 500, false).unwrap();
        assert!(opt.log_likelihood > -1E-6);
    }

    #[test]
    fn rprop_respects_iteration_budget() {
        let mut b = bowl();
        let opt = RProp::default().maximize(&mut b, 3, false).unwrap();
        assert_eq!(opt.iterations, 3);
        assert!(!opt.converged);
        assert!(opt.log_likelihood > -(1.5_f64.powi(2) + 0.7_f64.powi(2)));
    }

    /// Refuses parameters past a wall at θ₀ = 0.25
    struct Fenced {
        bowl: Bowl,
    }

    impl RandomProcess for Fenced {
        fn n_parameters(&self) -> usize {
            self.bowl.n_parameters()
        }

        fn parameters(&self) -> DVector<f64> {
            self.bowl.parameters()
        }

        fn set_parameters(&mut self, parameters: &[f64]) -> Result<()> {
            if parameters[0] > 0.25 {
                return Err(GpError::NumericalFailure("fenced".into()));
            }
            self.bowl.set_parameters(parameters)
        }

        fn ln_m(&mut self) -> Result<f64> {
            self.bowl.ln_m()
        }

        fn ln_m_gradient(&mut self) -> Result<DVector<f64>> {
            self.bowl.ln_m_gradient()
        }
    }

    #[test]
    fn rprop_restores_best_point_on_error() {
        let mut f = Fenced { bowl: bowl() };
        let res = RProp::default().maximize(&mut f, 100, false);
        assert!(matches!(res, Err(GpError::NumericalFailure(_))));
        // the wall is hit at 0.1 + 0.12 + 0.144 > 0.25; the last accepted
        // point is the best one
        assert::close(f.bowl.theta[0], 0.22, 1E-12);
        assert::close(f.bowl.theta[1], -0.22, 1E-12);
    }

    #[test]
    fn zero_iterations_keeps_parameters() {
        let mut b = bowl();
        let opt = RProp::default().maximize(&mut b, 0, false).unwrap();
        assert_eq!(opt.iterations, 0);
        assert_eq!(b.theta, DVector::zeros(2));
    }
}
