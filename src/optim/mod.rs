//! Hyperparameter optimizers that maximize the log marginal likelihood of a
//! [`RandomProcess`]

use log::{debug, info};
use nalgebra::DVector;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use crate::process::RandomProcess;
use crate::result::Result;

mod cg;
pub use cg::{CgParams, ConjugateGradient};

mod line_search;

mod rprop;
pub use rprop::{RProp, RPropParams, SignChange};

/// Drives a process's hyperparameters towards a (local) maximum of its log
/// marginal likelihood
pub trait Maximizer {
    /// Optimize `process` in place for at most `max_iterations` iterations.
    ///
    /// On return the process holds the best hyperparameters found. Running
    /// out of iterations is not an error.
    fn maximize<P: RandomProcess>(
        &self,
        process: &mut P,
        max_iterations: usize,
        verbose: bool,
    ) -> Result<Optimum>;
}

/// Outcome of an optimization run
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct Optimum {
    /// Best log-space hyperparameters, left in the process
    pub hyperparameters: DVector<f64>,
    /// Log marginal likelihood at `hyperparameters`
    pub log_likelihood: f64,
    /// Iterations used
    pub iterations: usize,
    /// Whether a stopping tolerance was met before the iteration budget ran
    /// out
    pub converged: bool,
}

pub(crate) fn report(verbose: bool, name: &str, iteration: usize, ln_m: f64) {
    if verbose {
        info!("{name} iteration {iteration}: log likelihood {ln_m}");
    } else {
        debug!("{name} iteration {iteration}: log likelihood {ln_m}");
    }
}
