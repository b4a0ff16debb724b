//! Gaussian Processes

use log::{debug, warn};
use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rand_distr::StandardNormal;
use rayon::prelude::*;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use crate::consts::HALF_LN_2PI;
use crate::process::RandomProcess;
use crate::result::{GpError, Result};

pub mod kernel;
use kernel::{CovFunction, Kernel, KernelError};

mod factor;
use factor::Factor;

mod sample_set;
pub use sample_set::SampleSet;

mod state;
pub use state::GpState;

/// Parameters for running GaussianProcess
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct GaussianProcessParams {
    /// Extend the Cholesky factor row by row when patterns are appended
    pub incremental: bool,
    /// First jitter added to the diagonal when factorization fails
    pub initial_jitter: f64,
    /// Growth of the jitter between attempts
    pub jitter_factor: f64,
    /// Number of jittered attempts before giving up
    pub max_jitter_attempts: usize,
}

impl GaussianProcessParams {
    /// Toggle incremental factor updates
    #[must_use]
    pub fn with_incremental(self, incremental: bool) -> Self {
        Self {
            incremental,
            ..self
        }
    }

    /// Set the first jitter tried
    #[must_use]
    pub fn with_initial_jitter(self, initial_jitter: f64) -> Self {
        Self {
            initial_jitter,
            ..self
        }
    }

    /// Set the jitter growth factor
    #[must_use]
    pub fn with_jitter_factor(self, jitter_factor: f64) -> Self {
        Self {
            jitter_factor,
            ..self
        }
    }

    /// Set the maximum number of jittered attempts
    #[must_use]
    pub fn with_max_jitter_attempts(self, max_jitter_attempts: usize) -> Self {
        Self {
            max_jitter_attempts,
            ..self
        }
    }
}

impl Default for GaussianProcessParams {
    fn default() -> Self {
        Self {
            incremental: true,
            initial_jitter: 1E-10,
            jitter_factor: 10.0,
            max_jitter_attempts: 6,
        }
    }
}

/// Whether the Cholesky factor and `α = K⁻¹y` match the current samples and
/// hyperparameters
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FactorState {
    /// Needs a (possibly incremental) refactorization before the next query
    Stale,
    /// Ready for queries
    Valid,
}

/// Exact Gaussian process regression
///
/// Owns the training set and the covariance function. The Cholesky factor
/// of the kernel matrix is refreshed lazily by any query that needs it.
#[derive(Clone, Debug)]
pub struct GaussianProcess<K = CovFunction>
where
    K: Kernel,
{
    /// Covariance Kernel
    kernel: K,
    /// Training patterns
    samples: SampleSet,
    /// Given parameters
    params: GaussianProcessParams,
    /// Cholesky factor of K for a prefix of the samples
    factor: Option<Factor>,
    /// Dual coefficients of training data in kernel space.
    alpha: Option<DVector<f64>>,
}

impl GaussianProcess<CovFunction> {
    /// Create a process from a covariance specification string such as
    /// `"CovSum(CovSEiso, CovNoise)"`. All hyperparameters start at zero.
    ///
    /// # Example
    ///
    /// ```
    /// use gpr::process::gaussian::GaussianProcess;
    ///
    /// let gp = GaussianProcess::from_spec(2, "CovSum(CovSEiso, CovNoise)").unwrap();
    /// assert_eq!(gp.n_parameters(), 3);
    /// assert_eq!(gp.size(), 0);
    /// ```
    pub fn from_spec(input_dim: usize, spec: &str) -> Result<Self> {
        let kernel = CovFunction::parse(input_dim, spec)?;
        Self::new(input_dim, kernel)
    }
}

impl<K> GaussianProcess<K>
where
    K: Kernel,
{
    /// Create an empty process over `input_dim`-dimensional inputs
    pub fn new(input_dim: usize, kernel: K) -> Result<Self> {
        if input_dim == 0 {
            return Err(KernelError::ZeroInputDimension.into());
        }
        Ok(Self {
            kernel,
            samples: SampleSet::new(input_dim),
            params: GaussianProcessParams::default(),
            factor: Some(Factor::empty()),
            alpha: None,
        })
    }

    /// Replace the factorization parameters
    #[must_use]
    pub fn with_params(self, params: GaussianProcessParams) -> Self {
        Self {
            params,
            factor: None,
            alpha: None,
            ..self
        }
    }

    /// Factorization parameters
    pub fn params(&self) -> &GaussianProcessParams {
        &self.params
    }

    /// Return the kernel being used in this GP
    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    /// Training patterns in insertion order
    pub fn samples(&self) -> &SampleSet {
        &self.samples
    }

    /// Number of training patterns
    pub fn size(&self) -> usize {
        self.samples.len()
    }

    /// Input dimension
    pub fn input_dim(&self) -> usize {
        self.samples.input_dim()
    }

    /// Number of hyperparameters
    pub fn n_parameters(&self) -> usize {
        self.kernel.n_parameters()
    }

    /// Log-space hyperparameters
    pub fn hyperparameters(&self) -> DVector<f64> {
        self.kernel.parameters()
    }

    /// Replace the log-space hyperparameters. The vector length must match
    /// [`n_parameters`](Self::n_parameters).
    pub fn set_hyperparameters(&mut self, params: &[f64]) -> Result<()> {
        self.kernel = self.kernel.reparameterize(params)?;
        self.invalidate();
        Ok(())
    }

    /// Append one training pattern
    pub fn add(&mut self, x: &[f64], y: f64) -> Result<()> {
        self.samples.add(x, y)?;
        self.patterns_appended();
        Ok(())
    }

    /// Append the rows of `xs` with targets `ys`
    pub fn add_batch(
        &mut self,
        xs: &DMatrix<f64>,
        ys: &DVector<f64>,
    ) -> Result<()> {
        self.samples.add_batch(xs, ys)?;
        self.patterns_appended();
        Ok(())
    }

    /// Replace all targets, keeping the inputs. The Cholesky factor stays
    /// valid.
    pub fn set_targets(&mut self, ys: &[f64]) -> Result<()> {
        self.samples.set_targets(ys)?;
        self.alpha = None;
        Ok(())
    }

    /// Remove every training pattern
    pub fn clear(&mut self) {
        self.samples.clear();
        self.alpha = None;
        self.factor = self.params.incremental.then(Factor::empty);
    }

    /// Current state of the factorization
    pub fn state(&self) -> FactorState {
        match (&self.factor, &self.alpha) {
            (Some(f), Some(_)) if f.size() == self.samples.len() => {
                FactorState::Valid
            }
            _ => FactorState::Stale,
        }
    }

    fn invalidate(&mut self) {
        self.factor = None;
        self.alpha = None;
    }

    fn patterns_appended(&mut self) {
        self.alpha = None;
        if !self.params.incremental {
            self.factor = None;
        }
    }

    /// Bring the Cholesky factor and `α` up to date
    pub fn compute(&mut self) -> Result<()> {
        if self.state() == FactorState::Valid {
            return Ok(());
        }

        let n = self.samples.len();
        let rows = self.samples.rows();

        let extended = match self.factor.as_mut() {
            Some(factor) if factor.size() <= n => {
                let start = factor.size();
                let ok = (start..n).all(|i| {
                    let cross = DVector::from_iterator(
                        i,
                        rows[..i].iter().map(|xj| self.kernel.covariance(rows[i], xj)),
                    );
                    factor.extend(&cross, self.kernel.variance(rows[i]))
                });
                if ok && start < n {
                    debug!("extended cholesky factor from {start} to {n} rows");
                }
                ok
            }
            _ => false,
        };

        if !extended {
            debug!("full cholesky factorization of {n} patterns");
            let k = self.kernel.autocovariance(&rows);
            self.factor = Some(Factor::compute(&k, &self.params)?);
        }

        let factor = self
            .factor
            .as_ref()
            .ok_or_else(|| GpError::NumericalFailure("missing factor".into()))?;
        self.alpha = Some(factor.solve(&self.samples.targets())?);
        Ok(())
    }

    fn factorization(&mut self) -> Result<(&Factor, &DVector<f64>)> {
        self.compute()?;
        match (&self.factor, &self.alpha) {
            (Some(f), Some(a)) => Ok((f, a)),
            _ => Err(GpError::NumericalFailure(
                "factorization is not available".into(),
            )),
        }
    }

    /// Predictive mean (and variance) at each row of `xs`.
    ///
    /// `xs` is `m x input_dim`; the output is `m x 1`, or `m x 2` with the
    /// variance in the second column when `want_variance` is set.
    pub fn predict(
        &mut self,
        xs: &DMatrix<f64>,
        want_variance: bool,
    ) -> Result<DMatrix<f64>> {
        let d = self.input_dim();
        if xs.ncols() != d {
            return Err(GpError::dimension_mismatch(
                "GaussianProcess::predict",
                d,
                xs.ncols(),
            ));
        }

        if !self.samples.is_empty() {
            self.compute()?;
        }

        let xt = xs.transpose();
        let queries: Vec<&[f64]> = xt.as_slice().chunks_exact(d).collect();
        let this = &*self;
        let preds = queries
            .par_iter()
            .map(|x| this.predict_with_factor(x, want_variance))
            .collect::<Result<Vec<(f64, f64)>>>()?;

        let ncols = if want_variance { 2 } else { 1 };
        Ok(DMatrix::from_fn(preds.len(), ncols, |i, j| {
            if j == 0 {
                preds[i].0
            } else {
                preds[i].1
            }
        }))
    }

    /// Predictive mean and variance at a single pattern
    pub fn predict_point(&mut self, x: &[f64]) -> Result<(f64, f64)> {
        if x.len() != self.input_dim() {
            return Err(GpError::dimension_mismatch(
                "GaussianProcess::predict_point",
                self.input_dim(),
                x.len(),
            ));
        }
        if !self.samples.is_empty() {
            self.compute()?;
        }
        self.predict_with_factor(x, true)
    }

    // requires a valid factor unless there are no samples
    fn predict_with_factor(
        &self,
        x: &[f64],
        want_variance: bool,
    ) -> Result<(f64, f64)> {
        let prior = self.kernel.variance(x);
        let (factor, alpha) = match (&self.factor, &self.alpha) {
            (Some(f), Some(a)) if !self.samples.is_empty() => (f, a),
            _ => return Ok((0.0, if want_variance { prior } else { 0.0 })),
        };

        let rows = self.samples.rows();
        let k_star = DVector::from_iterator(
            rows.len(),
            rows.iter().map(|xi| self.kernel.covariance(x, xi)),
        );
        let mean = k_star.dot(alpha);
        if !want_variance {
            return Ok((mean, 0.0));
        }

        let v = factor.solve_lower(&k_star)?;
        let var = prior - v.norm_squared();
        if var < 0.0 {
            warn!("clamping negative predictive variance {var:e} to zero");
            Ok((mean, 0.0))
        } else {
            Ok((mean, var))
        }
    }

    /// Log marginal likelihood of the targets
    ///
    /// ```math
    /// -½ yᵀα - Σ ln L_ii - (n/2) ln 2π
    /// ```
    ///
    /// Zero when there are no samples.
    pub fn log_likelihood(&mut self) -> Result<f64> {
        let n = self.samples.len();
        if n == 0 {
            return Ok(0.0);
        }
        let y = self.samples.targets();
        let (factor, alpha) = self.factorization()?;
        Ok(-0.5 * y.dot(alpha) - factor.half_ln_det() - n as f64 * HALF_LN_2PI)
    }

    /// Gradient of the log marginal likelihood with respect to the log-space
    /// hyperparameters, zero when there are no samples.
    pub fn log_likelihood_gradient(&mut self) -> Result<DVector<f64>> {
        let p = self.n_parameters();
        if self.samples.is_empty() {
            return Ok(DVector::zeros(p));
        }
        self.compute()?;

        let rows = self.samples.rows();
        let (_, k_grad) = self.kernel.covariance_with_gradient(&rows);
        let (factor, alpha) = match (&self.factor, &self.alpha) {
            (Some(f), Some(a)) => (f, a),
            _ => {
                return Err(GpError::NumericalFailure(
                    "factorization is not available".into(),
                ))
            }
        };

        // GPML Equation 5.9, with tr(K⁻¹ ∂K) from triangular solves
        let fit = k_grad.contract(&(alpha * alpha.transpose()))?;
        let trace = k_grad
            .iter()
            .map(|dk| factor.trace_solve(dk))
            .collect::<Result<Vec<f64>>>()?;
        Ok((fit - DVector::from_vec(trace)) * 0.5)
    }

    /// Draw one sample of the prior at the rows of `xs`
    pub fn draw_prior_sample<R: Rng>(
        &self,
        xs: &DMatrix<f64>,
        rng: &mut R,
    ) -> Result<DVector<f64>> {
        if xs.ncols() != self.input_dim() {
            return Err(GpError::dimension_mismatch(
                "GaussianProcess::draw_prior_sample",
                self.input_dim(),
                xs.ncols(),
            ));
        }
        draw_prior_sample(&self.kernel, xs, &self.params, rng)
    }
}

/// One draw from the zero-mean prior with covariance `kernel` at the rows of
/// `xs`
pub fn draw_prior_sample<K: Kernel, R: Rng>(
    kernel: &K,
    xs: &DMatrix<f64>,
    params: &GaussianProcessParams,
    rng: &mut R,
) -> Result<DVector<f64>> {
    let n = xs.nrows();
    let xt = xs.transpose();
    let rows: Vec<&[f64]> = if xs.ncols() == 0 {
        vec![&[][..]; n]
    } else {
        xt.as_slice().chunks_exact(xs.ncols()).collect()
    };
    let factor = Factor::compute(&kernel.autocovariance(&rows), params)?;
    let z: DVector<f64> =
        DVector::from_iterator(n, (0..n).map(|_| rng.sample(StandardNormal)));
    Ok(factor.l() * z)
}

impl<K: Kernel> RandomProcess for GaussianProcess<K> {
    fn n_parameters(&self) -> usize {
        self.kernel.n_parameters()
    }

    fn parameters(&self) -> DVector<f64> {
        self.hyperparameters()
    }

    fn set_parameters(&mut self, parameters: &[f64]) -> Result<()> {
        self.set_hyperparameters(parameters)
    }

    fn ln_m(&mut self) -> Result<f64> {
        self.log_likelihood()
    }

    fn ln_m_gradient(&mut self) -> Result<DVector<f64>> {
        self.log_likelihood_gradient()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::gaussian::kernel::{RBFKernel, WhiteKernel};
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256Plus;

    fn arange(start: f64, stop: f64, step_size: f64) -> DMatrix<f64> {
        let size = ((stop - start) / step_size).floor() as usize;
        let it = (0..size).map(|i| start + (i as f64) * step_size);
        DMatrix::from_iterator(size, 1, it)
    }

    fn sin_gp() -> GaussianProcess<RBFKernel> {
        let x_train: DMatrix<f64> =
            DMatrix::from_column_slice(5, 1, &[-4.0, -3.0, -2.0, -1.0, 1.0]);
        let y_train: DVector<f64> = x_train.map(|x| x.sin()).column(0).into();

        let mut gp = GaussianProcess::new(1, RBFKernel::default()).unwrap();
        gp.add_batch(&x_train, &y_train).unwrap();
        gp
    }

    #[test]
    fn simple() {
        let mut gp = sin_gp();
        let xs: DMatrix<f64> = arange(-5.0, 5.0, 1.0);
        let pred = gp.predict(&xs, true).unwrap();

        let expected_mean: DVector<f64> = DVector::from_column_slice(&[
            0.61409752,
            0.7568025,
            -0.14112001,
            -0.90929743,
            -0.84147098,
            0.08533365,
            0.84147098,
            0.5639856,
            0.12742202,
            0.01047683,
        ]);
        let mean: DVector<f64> = pred.column(0).into();
        assert!(mean.relative_eq(&expected_mean, 1E-6, 1E-6));

        // training points are interpolated exactly
        for i in [1, 2, 3, 4, 6] {
            assert::close(pred[(i, 1)], 0.0, 1E-6);
        }
        assert::close(pred[(0, 1)], 5.09625632e-01, 1E-6);
        assert!(pred.column(1).iter().all(|v| *v >= 0.0));
    }

    #[test]
    fn log_likelihood_matches_dense_formula() {
        let mut gp = sin_gp();
        let rows = gp.samples().rows();
        let k = gp.kernel().autocovariance(&rows);
        let y = gp.samples().targets();
        let k_inv = k.clone().try_inverse().unwrap();
        let expected = -0.5 * y.dot(&(&k_inv * &y))
            - 0.5 * k.determinant().ln()
            - 5.0 * HALF_LN_2PI;
        assert::close(gp.log_likelihood().unwrap(), expected, 1E-6);
    }

    #[test]
    fn log_likelihood_gradient_matches_dense_formula() {
        let mut gp = sin_gp();
        gp.set_hyperparameters(&[0.3, -0.2]).unwrap();
        let rows = gp.samples().rows();
        let (k, k_grad) = gp.kernel().covariance_with_gradient(&rows);
        let y = gp.samples().targets();
        let k_inv = k.try_inverse().unwrap();
        let alpha = &k_inv * &y;
        let w = &alpha * alpha.transpose() - &k_inv;
        let grad = gp.log_likelihood_gradient().unwrap();
        for (p, dk) in k_grad.iter().enumerate() {
            assert::close(grad[p], 0.5 * (&w * dk).trace(), 1E-6);
        }
    }

    #[test]
    fn empty_process() {
        let mut gp = GaussianProcess::new(
            2,
            RBFKernel::new(1.0, 2.0).unwrap() + WhiteKernel::new(0.1).unwrap(),
        )
        .unwrap();
        assert_eq!(gp.log_likelihood().unwrap(), 0.0);
        assert_eq!(gp.log_likelihood_gradient().unwrap(), DVector::zeros(3));

        let (mean, var) = gp.predict_point(&[0.3, 0.4]).unwrap();
        assert_eq!(mean, 0.0);
        assert::close(var, 4.01, 1E-12);
    }

    #[test]
    fn state_transitions() {
        let mut gp = sin_gp();
        assert_eq!(gp.state(), FactorState::Stale);
        gp.compute().unwrap();
        assert_eq!(gp.state(), FactorState::Valid);

        gp.add(&[2.0], 2.0_f64.sin()).unwrap();
        assert_eq!(gp.state(), FactorState::Stale);
        gp.log_likelihood().unwrap();
        assert_eq!(gp.state(), FactorState::Valid);

        gp.set_hyperparameters(&[0.1, 0.0]).unwrap();
        assert_eq!(gp.state(), FactorState::Stale);
        gp.predict_point(&[0.0]).unwrap();
        assert_eq!(gp.state(), FactorState::Valid);

        gp.set_targets(&[0.0; 6]).unwrap();
        assert_eq!(gp.state(), FactorState::Stale);
        let (mean, _) = gp.predict_point(&[0.5]).unwrap();
        assert::close(mean, 0.0, 1E-12);

        gp.clear();
        assert_eq!(gp.size(), 0);
        assert_eq!(gp.input_dim(), 1);
    }

    #[test]
    fn zero_input_dim_is_rejected() {
        assert_eq!(
            GaussianProcess::new(0, RBFKernel::default()).err(),
            Some(GpError::Configuration(KernelError::ZeroInputDimension))
        );
        assert_eq!(
            GaussianProcess::from_spec(0, "CovSEiso").err(),
            Some(GpError::Configuration(KernelError::ZeroInputDimension))
        );
    }

    #[test]
    fn hyperparameter_length_is_checked() {
        let mut gp = sin_gp();
        assert!(matches!(
            gp.set_hyperparameters(&[0.0]),
            Err(GpError::Configuration(_))
        ));
        assert_eq!(gp.hyperparameters(), DVector::zeros(2));
    }

    #[test]
    fn any_finite_log_hyperparameter_is_accepted() {
        let mut gp =
            GaussianProcess::from_spec(1, "CovSum(CovSEiso, CovNoise)").unwrap();
        gp.add_batch(
            &DMatrix::from_column_slice(3, 1, &[-1.0, 0.0, 1.5]),
            &DVector::from_column_slice(&[0.3, -0.2, 0.8]),
        )
        .unwrap();

        // the noise variance underflows to zero
        gp.set_hyperparameters(&[0.0, 0.0, -800.0]).unwrap();
        assert!(gp.log_likelihood().unwrap().is_finite());
        let (mean, var) = gp.predict_point(&[0.0]).unwrap();
        assert::close(mean, -0.2, 1E-8);
        assert::close(var, 0.0, 1E-8);

        assert!(matches!(
            gp.set_hyperparameters(&[0.0, f64::NAN, 0.0]),
            Err(GpError::Configuration(_))
        ));
    }

    #[test]
    fn predict_checks_columns() {
        let mut gp = sin_gp();
        let xs = DMatrix::zeros(3, 2);
        assert!(matches!(
            gp.predict(&xs, false),
            Err(GpError::DimensionMismatch { .. })
        ));
        let out = gp.predict(&DMatrix::zeros(3, 1), false).unwrap();
        assert_eq!(out.shape(), (3, 1));
    }

    #[test]
    fn prior_sample_has_requested_size() {
        let mut rng = Xoshiro256Plus::seed_from_u64(0x1234);
        let gp = GaussianProcess::new(
            1,
            RBFKernel::default() + WhiteKernel::new(0.1).unwrap(),
        )
        .unwrap();
        let xs = arange(0.0, 3.0, 0.5);
        let draw = gp.draw_prior_sample(&xs, &mut rng).unwrap();
        assert_eq!(draw.len(), 6);
        assert!(draw.iter().all(|v| v.is_finite()));
    }
}
