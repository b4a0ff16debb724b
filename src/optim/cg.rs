//! Polak-Ribière conjugate gradient ascent with a bracketing line search
//!
//! Internally the negative log likelihood is minimized. Each line search
//! first extrapolates until the Wolfe-Powell conditions bracket a minimum,
//! then interpolates inside the bracket.
use log::debug;
use nalgebra::DVector;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use super::line_search::{cubic_extrapolation, cubic_interpolation, quad_interpolation};
use super::{report, Maximizer, Optimum};
use crate::process::RandomProcess;
use crate::result::Result;

/// Conjugate Gradient Parameters
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct CgParams {
    /// Stop when the gradient norm falls below this
    pub tolerance: f64,
    /// Function evaluations allowed per line search
    pub max_evaluations: usize,
    /// Largest allowed ratio of new to initial slope magnitude
    pub sig: f64,
    /// Smallest fraction of the expected decrease that is accepted
    pub rho: f64,
    /// Keep this fraction of the bracket away from its ends
    pub int: f64,
    /// Largest extrapolation relative to the current step
    pub ext: f64,
    /// Largest growth of the initial step between line searches
    pub ratio: f64,
}

impl Default for CgParams {
    fn default() -> Self {
        Self {
            tolerance: 1E-6,
            max_evaluations: 20,
            sig: 0.1,
            rho: 0.05,
            int: 0.1,
            ext: 3.0,
            ratio: 10.0,
        }
    }
}

impl CgParams {
    /// Set the gradient norm tolerance
    #[must_use]
    pub fn with_tolerance(self, tolerance: f64) -> Self {
        Self { tolerance, ..self }
    }

    /// Set the evaluation budget of a single line search
    #[must_use]
    pub fn with_max_evaluations(self, max_evaluations: usize) -> Self {
        Self {
            max_evaluations,
            ..self
        }
    }

    /// Set the Wolfe-Powell constants. Requires `0 < rho < sig < 1`.
    #[must_use]
    pub fn with_wolfe(self, sig: f64, rho: f64) -> Self {
        Self { sig, rho, ..self }
    }
}

/// Conjugate gradient optimizer
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConjugateGradient {
    params: CgParams,
}

impl ConjugateGradient {
    /// Create a new optimizer with the given parameters
    #[must_use]
    pub fn new(params: CgParams) -> Self {
        Self { params }
    }

    /// Optimizer parameters
    pub fn params(&self) -> &CgParams {
        &self.params
    }
}

/// Point on the line `x0 + t s` with objective `f` and directional slope `d`
#[derive(Clone, Copy, Debug)]
struct Probe {
    t: f64,
    f: f64,
    d: f64,
}

/// Negative log likelihood and its gradient at `x`, or `None` if the
/// process cannot be evaluated there.
fn evaluate<P: RandomProcess>(
    process: &mut P,
    x: &DVector<f64>,
) -> Option<(f64, DVector<f64>)> {
    match process.ln_m_with_parameters(x.as_slice()) {
        Ok((ln_m, grad)) if ln_m.is_finite() && grad.iter().all(|g| g.is_finite()) => {
            Some((-ln_m, -grad))
        }
        Ok(_) => None,
        Err(err) => {
            debug!("cg evaluation failed: {err}");
            None
        }
    }
}

impl Maximizer for ConjugateGradient {
    fn maximize<P: RandomProcess>(
        &self,
        process: &mut P,
        max_iterations: usize,
        verbose: bool,
    ) -> Result<Optimum> {
        let p = &self.params;
        let n_params = process.n_parameters().max(1);

        let mut x = process.parameters();
        let (ln_m, grad) = process.ln_m_with_gradient()?;
        let mut f0 = -ln_m;
        let mut df0 = -grad;
        report(verbose, "cg", 0, ln_m);

        let mut s = -&df0;
        let mut d0 = -s.dot(&s);
        let mut x3 = 1.0 / (1.0 - d0);

        let mut ls_failed = false;
        let mut converged = false;
        let mut since_restart = 0;
        let mut iterations = 0;

        // the bracket's far end persists between interpolation steps
        let mut p4 = Probe { t: 0.0, f: 0.0, d: 0.0 };

        while iterations < max_iterations {
            if df0.norm() < p.tolerance {
                converged = true;
                break;
            }
            iterations += 1;

            let mut best_x = x.clone();
            let mut best_f = f0;
            let mut best_df = df0.clone();
            let mut budget = p.max_evaluations;

            let mut p2;
            let mut p3;
            let mut df3;

            // extrapolation
            loop {
                p2 = Probe { t: 0.0, f: f0, d: d0 };
                p3 = Probe { t: x3, f: f0, d: d0 };
                df3 = df0.clone();

                let mut success = false;
                while !success && budget > 0 {
                    budget -= 1;
                    let xt = &x + &s * p3.t;
                    if let Some((f, df)) = evaluate(process, &xt) {
                        p3.f = f;
                        df3 = df;
                        success = true;
                    } else {
                        p3.t = (p2.t + p3.t) / 2.0;
                    }
                }

                if success && p3.f < best_f {
                    best_x = &x + &s * p3.t;
                    best_f = p3.f;
                    best_df = df3.clone();
                }

                p3.d = df3.dot(&s);
                if p3.d > p.sig * d0 || p3.f > f0 + p3.t * p.rho * d0 || budget == 0 {
                    break;
                }

                let p1 = p2;
                p2 = p3;
                let ext = cubic_extrapolation(p1.t, p1.f, p1.d, p2.t, p2.f, p2.d);
                x3 = match ext {
                    Some(t) if t <= p2.t * p.ext => {
                        t.max(p2.t + p.int * (p2.t - p1.t))
                    }
                    _ => p.ext * p2.t,
                };
            }

            // interpolation
            while (p3.d.abs() > -p.sig * d0 || p3.f > f0 + p3.t * p.rho * d0)
                && budget > 0
            {
                if p3.d > 0.0 || p3.f > f0 + p3.t * p.rho * d0 {
                    p4 = p3;
                } else {
                    p2 = p3;
                }

                let t = if p4.f > f0 {
                    quad_interpolation(p2.t, p2.f, p2.d, p4.t, p4.f)
                } else {
                    cubic_interpolation(p2.t, p2.f, p2.d, p4.t, p4.f, p4.d)
                }
                .unwrap_or((p2.t + p4.t) / 2.0);
                let t = t
                    .min(p4.t - p.int * (p4.t - p2.t))
                    .max(p2.t + p.int * (p4.t - p2.t));

                budget -= 1;
                let xt = &x + &s * t;
                p3.t = t;
                match evaluate(process, &xt) {
                    Some((f, df)) => {
                        p3.f = f;
                        p3.d = df.dot(&s);
                        df3 = df;
                        if p3.f < best_f {
                            best_x = xt;
                            best_f = p3.f;
                            best_df = df3.clone();
                        }
                    }
                    None => {
                        p3.f = f64::INFINITY;
                        p3.d = f64::INFINITY;
                    }
                }
            }

            if p3.d.abs() < -p.sig * d0 && p3.f < f0 + p3.t * p.rho * d0 {
                // line search succeeded
                x += &s * p3.t;
                f0 = p3.f;
                since_restart += 1;

                let beta = (df3.dot(&df3) - df0.dot(&df3)) / df0.dot(&df0);
                s = &s * beta - &df3;
                df0 = df3;
                let d_prev = d0;
                d0 = df0.dot(&s);
                if d0 > 0.0 || since_restart >= n_params {
                    debug!("cg restarting along the gradient");
                    s = -&df0;
                    d0 = -s.dot(&s);
                    since_restart = 0;
                }
                x3 = p3.t * p.ratio.min(d_prev / (d0 - f64::MIN_POSITIVE));
                ls_failed = false;
            } else {
                // restore best point so far
                x = best_x;
                f0 = best_f;
                df0 = best_df;

                if ls_failed {
                    debug!("cg line search failed twice in a row");
                    converged = true;
                    report(verbose, "cg", iterations, -f0);
                    break;
                }
                s = -&df0;
                d0 = -s.dot(&s);
                x3 = 1.0 / (1.0 - d0);
                since_restart = 0;
                ls_failed = true;
            }
            report(verbose, "cg", iterations, -f0);
        }

        process.set_parameters(x.as_slice())?;
        Ok(Optimum {
            hyperparameters: x,
            log_likelihood: -f0,
            iterations,
            converged,
        })
    }
}
