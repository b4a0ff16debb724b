//! Random processes whose hyperparameters can be fit by maximizing the log
//! marginal likelihood
use nalgebra::DVector;

use crate::optim::{Maximizer, Optimum};
use crate::result::Result;

pub mod gaussian;

/// A process with a differentiable log marginal likelihood over a vector of
/// (log-space) hyperparameters
pub trait RandomProcess {
    /// Number of hyperparameters
    fn n_parameters(&self) -> usize;

    /// Get the parameters
    fn parameters(&self) -> DVector<f64>;

    /// Set with the given parameters
    fn set_parameters(&mut self, parameters: &[f64]) -> Result<()>;

    /// Compute the log marginal likelihood
    fn ln_m(&mut self) -> Result<f64>;

    /// Gradient of the log marginal likelihood with respect to the
    /// parameters
    fn ln_m_gradient(&mut self) -> Result<DVector<f64>>;

    /// Log marginal likelihood and its gradient at the current parameters
    fn ln_m_with_gradient(&mut self) -> Result<(f64, DVector<f64>)> {
        let ln_m = self.ln_m()?;
        let grad = self.ln_m_gradient()?;
        Ok((ln_m, grad))
    }

    /// Log marginal likelihood and gradient at `parameters`, which become
    /// the current parameters.
    fn ln_m_with_parameters(
        &mut self,
        parameters: &[f64],
    ) -> Result<(f64, DVector<f64>)> {
        self.set_parameters(parameters)?;
        self.ln_m_with_gradient()
    }
}

/// Random Process which can be optimized to reach a maximum likelihood estimate.
pub trait RandomProcessMle: RandomProcess
where
    Self: Sized,
{
    /// Run `optimizer` on this process, leaving the best parameters found in
    /// place.
    fn optimize<M: Maximizer>(
        &mut self,
        optimizer: &M,
        max_iterations: usize,
        verbose: bool,
    ) -> Result<Optimum> {
        optimizer.maximize(self, max_iterations, verbose)
    }
}

impl<P: RandomProcess> RandomProcessMle for P {}
