//! Exact GP regression with MAP-fitted hyperparameters.
//!
//! The model is `y = c + f(x) + ε`, `f ~ GP(0, s · Matérn52_l)`,
//! `ε ~ N(0, σ²)`, fitted on standardized targets. Hyperparameters
//! (`log l`, `log s`, `log σ²`, `c`) maximize the exact log marginal
//! likelihood plus Gamma log priors, using bounded L-BFGS with analytic
//! gradients.

use nalgebra::linalg::Cholesky;
use nalgebra::{DMatrix, DVector, Dyn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::kernel;
use super::{JointPosterior, Posterior};
use crate::error::{Error, Result};
use crate::optim::lbfgs::{LbfgsConfig, Termination, minimize};
use crate::types::Precision;

/// Default number of L-BFGS iterations per fit.
const DEFAULT_MAX_ITER: usize = 200;

/// Standardized-target std below which the target is treated as constant.
const MIN_STD: f64 = 1e-8;

/// Cholesky attempts, multiplying the jitter by 10 each time.
const MAX_JITTER_TRIES: usize = 4;

/// Gamma(shape, rate) priors on lengthscale, outputscale and noise.
const LENGTHSCALE_PRIOR: (f64, f64) = (3.0, 6.0);
const OUTPUTSCALE_PRIOR: (f64, f64) = (2.0, 0.15);
const NOISE_PRIOR: (f64, f64) = (1.1, 0.05);

/// Box for the optimized parameters (log-space, except the mean).
const LOG_LENGTHSCALE_BOUNDS: (f64, f64) = (-4.605_170_185_988_091, 4.605_170_185_988_091);
const LOG_OUTPUTSCALE_BOUNDS: (f64, f64) = (-6.907_755_278_982_137, 4.605_170_185_988_091);
const LOG_NOISE_BOUNDS: (f64, f64) = (-9.210_340_371_976_182, 0.0);
const MEAN_BOUNDS: (f64, f64) = (-10.0, 10.0);

const LN_2PI: f64 = 1.837_877_066_409_345_5;

// ---------------------------------------------------------------------------
// Hyperparameters
// ---------------------------------------------------------------------------

/// Fitted GP hyperparameters, reusable as the next fit's starting point.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GpHyperparameters {
    /// Natural log of the ARD lengthscales, one per input dimension.
    pub log_lengthscales: Vec<f64>,
    /// Natural log of the kernel outputscale.
    pub log_outputscale: f64,
    /// Natural log of the observation noise variance.
    pub log_noise: f64,
    /// Constant mean, in standardized target units.
    pub mean: f64,
}

impl GpHyperparameters {
    /// Default starting point for a `dim`-dimensional fit:
    /// lengthscales 0.5, outputscale 1, noise 1e-2, mean 0.
    #[must_use]
    pub fn initial(dim: usize) -> Self {
        Self {
            log_lengthscales: vec![0.5_f64.ln(); dim],
            log_outputscale: 0.0,
            log_noise: 1e-2_f64.ln(),
            mean: 0.0,
        }
    }

    /// Input dimension.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.log_lengthscales.len()
    }

    /// Lengthscales on the natural scale.
    #[must_use]
    pub fn lengthscales(&self) -> Vec<f64> {
        self.log_lengthscales.iter().map(|v| v.exp()).collect()
    }

    /// Outputscale on the natural scale.
    #[must_use]
    pub fn outputscale(&self) -> f64 {
        self.log_outputscale.exp()
    }

    /// Noise variance on the natural scale.
    #[must_use]
    pub fn noise(&self) -> f64 {
        self.log_noise.exp()
    }

    fn is_finite(&self) -> bool {
        self.log_lengthscales.iter().all(|v| v.is_finite())
            && self.log_outputscale.is_finite()
            && self.log_noise.is_finite()
            && self.mean.is_finite()
    }

    /// Flatten to `[log l.., log s, log σ², c]`.
    fn to_vec(&self) -> Vec<f64> {
        let mut theta = self.log_lengthscales.clone();
        theta.extend([self.log_outputscale, self.log_noise, self.mean]);
        theta
    }

    fn from_slice(theta: &[f64]) -> Self {
        let d = theta.len() - 3;
        Self {
            log_lengthscales: theta[..d].to_vec(),
            log_outputscale: theta[d],
            log_noise: theta[d + 1],
            mean: theta[d + 2],
        }
    }

    fn bounds(dim: usize) -> Vec<(f64, f64)> {
        let mut bounds = vec![LOG_LENGTHSCALE_BOUNDS; dim];
        bounds.extend([LOG_OUTPUTSCALE_BOUNDS, LOG_NOISE_BOUNDS, MEAN_BOUNDS]);
        bounds
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Options for [`GpSurrogate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GpConfig {
    max_iter: usize,
    precision: Precision,
}

impl GpConfig {
    /// Defaults: 200 L-BFGS iterations, [`Precision::Double`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_iter: DEFAULT_MAX_ITER,
            precision: Precision::Double,
        }
    }

    /// Maximum L-BFGS iterations per fit.
    #[must_use]
    pub fn max_iter(mut self, n: usize) -> Self {
        self.max_iter = n;
        self
    }

    /// Precision that sets the initial Cholesky jitter.
    #[must_use]
    pub fn precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }
}

impl Default for GpConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Fitting
// ---------------------------------------------------------------------------

/// Fits exact GPs from scratch on a full dataset.
#[derive(Clone, Debug, Default)]
pub struct GpSurrogate {
    config: GpConfig,
}

impl GpSurrogate {
    /// Create a surrogate with the given fit options.
    #[must_use]
    pub fn new(config: GpConfig) -> Self {
        Self { config }
    }

    /// The fit options.
    #[must_use]
    pub fn config(&self) -> &GpConfig {
        &self.config
    }

    /// Fit a GP to unit-cube inputs `x_unit` and raw scores `y`.
    ///
    /// `warm_start` is a hint: it is ignored when its dimension does not
    /// match the data, and a failed warm-started fit is retried once from
    /// [`GpHyperparameters::initial`].
    ///
    /// # Errors
    ///
    /// - [`Error::DimensionMismatch`] if `x_unit` and `y` disagree in
    ///   length or the points have different dimensions.
    /// - [`Error::NumericalInstability`] if the data are empty, the kernel
    ///   matrix cannot be factorized even after jitter escalation, or the
    ///   objective is not finite at the starting hyperparameters.
    pub fn fit(
        &self,
        x_unit: &[Vec<f64>],
        y: &[f64],
        warm_start: Option<&GpHyperparameters>,
    ) -> Result<FittedGp> {
        let d = validate(x_unit, y)?;
        let (y_mean, y_std) = standardization(y);
        let y_standardized = DVector::from_iterator(y.len(), y.iter().map(|v| (v - y_mean) / y_std));

        let hint = warm_start.filter(|h| {
            let usable = h.dim() == d && h.is_finite();
            if !usable {
                trace_debug!(hint_dim = h.dim(), data_dim = d, "discarding warm-start hint");
            }
            usable
        });

        let (hyper, cholesky, jitter) =
            with_cold_retry(hint, d, |start| self.fit_from(x_unit, &y_standardized, start))?;
        let residual = y_standardized.add_scalar(-hyper.mean);
        let alpha = cholesky.solve(&residual);
        trace_debug!(
            n = y.len(),
            outputscale = hyper.outputscale(),
            noise = hyper.noise(),
            jitter,
            "GP fitted"
        );

        Ok(FittedGp {
            x_train: x_unit.to_vec(),
            lengthscales: hyper.lengthscales(),
            outputscale: hyper.outputscale(),
            hyper,
            cholesky,
            alpha,
            y_mean,
            y_std,
        })
    }

    /// One MAP optimization from `start`, followed by the final
    /// factorization at the optimum.
    fn fit_from(
        &self,
        x: &[Vec<f64>],
        y: &DVector<f64>,
        start: GpHyperparameters,
    ) -> Result<(GpHyperparameters, Cholesky<f64, Dyn>, f64)> {
        let jitter = self.config.precision.initial_jitter();
        let bounds = GpHyperparameters::bounds(start.dim());
        let lbfgs = LbfgsConfig {
            max_iter: self.config.max_iter,
            ..LbfgsConfig::default()
        };

        let outcome = minimize(
            |theta| {
                neg_log_posterior(x, y, theta, jitter)
                    .unwrap_or_else(|| (f64::INFINITY, vec![0.0; theta.len()]))
            },
            &start.to_vec(),
            &bounds,
            &lbfgs,
        );
        if !outcome.is_finite() {
            return Err(Error::NumericalInstability(
                "marginal likelihood is not finite at the starting hyperparameters".into(),
            ));
        }
        if outcome.termination == Termination::MaxIter {
            trace_debug!(iterations = outcome.iterations, "GP fit hit the iteration cap");
        }

        let hyper = GpHyperparameters::from_slice(&outcome.x);
        let k_f = kernel::gram(x, &hyper.lengthscales(), hyper.outputscale());
        let (cholesky, used) = factorize(&k_f, hyper.noise(), jitter).ok_or_else(|| {
            Error::NumericalInstability(format!(
                "kernel matrix is not positive definite (n = {}, noise = {:.3e})",
                x.len(),
                hyper.noise()
            ))
        })?;
        Ok((hyper, cholesky, used))
    }
}

/// Run `attempt` from the warm-start hint and, if that fails, once more
/// from [`GpHyperparameters::initial`]. Without a hint only the default
/// start runs.
#[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
fn with_cold_retry<T>(
    hint: Option<&GpHyperparameters>,
    dim: usize,
    mut attempt: impl FnMut(GpHyperparameters) -> Result<T>,
) -> Result<T> {
    if let Some(hint) = hint {
        match attempt(hint.clone()) {
            Ok(fitted) => return Ok(fitted),
            Err(e) => {
                trace_debug!(error = %e, "warm-started fit failed, retrying from defaults");
            }
        }
    }
    attempt(GpHyperparameters::initial(dim))
}

fn validate(x: &[Vec<f64>], y: &[f64]) -> Result<usize> {
    if x.len() != y.len() {
        return Err(Error::DimensionMismatch {
            expected: x.len(),
            got: y.len(),
        });
    }
    let Some(first) = x.first() else {
        return Err(Error::NumericalInstability(
            "cannot fit a GP without observations".into(),
        ));
    };
    let d = first.len();
    if let Some(bad) = x.iter().find(|p| p.len() != d) {
        return Err(Error::DimensionMismatch {
            expected: d,
            got: bad.len(),
        });
    }
    Ok(d)
}

/// Mean and std (`n - 1` denominator) used to standardize targets.
#[allow(clippy::cast_precision_loss)]
fn standardization(y: &[f64]) -> (f64, f64) {
    let n = y.len() as f64;
    let mean = y.iter().sum::<f64>() / n;
    if y.len() < 2 {
        return (mean, 1.0);
    }
    let var = y.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std = var.sqrt();
    if std.is_finite() && std >= MIN_STD {
        (mean, std)
    } else {
        (mean, 1.0)
    }
}

/// Cholesky of `k_f + (noise + jitter) I`, escalating the jitter tenfold
/// on failure. Returns the factor and the jitter that worked.
fn factorize(k_f: &DMatrix<f64>, noise: f64, initial_jitter: f64) -> Option<(Cholesky<f64, Dyn>, f64)> {
    let n = k_f.nrows();
    let mut jitter = initial_jitter;
    for _ in 0..MAX_JITTER_TRIES {
        let k = k_f + DMatrix::identity(n, n) * (noise + jitter);
        if let Some(chol) = Cholesky::new(k) {
            return Some((chol, jitter));
        }
        jitter *= 10.0;
    }
    None
}

/// Unnormalized Gamma log density and its derivative with respect to
/// `log v`.
fn gamma_log_prior(v: f64, (shape, rate): (f64, f64)) -> (f64, f64) {
    ((shape - 1.0) * v.ln() - rate * v, (shape - 1.0) - rate * v)
}

/// Negative log posterior divided by `n`, with its gradient.
///
/// `None` when the kernel matrix cannot be factorized or a value is not
/// finite.
#[allow(clippy::cast_precision_loss)]
fn neg_log_posterior(
    x: &[Vec<f64>],
    y: &DVector<f64>,
    theta: &[f64],
    jitter: f64,
) -> Option<(f64, Vec<f64>)> {
    let hyper = GpHyperparameters::from_slice(theta);
    let d = hyper.dim();
    let n = y.len();
    let lengthscales = hyper.lengthscales();
    let outputscale = hyper.outputscale();
    let noise = hyper.noise();

    let k_f = kernel::gram(x, &lengthscales, outputscale);
    let (chol, _) = factorize(&k_f, noise, jitter)?;
    let residual = y.add_scalar(-hyper.mean);
    let alpha = chol.solve(&residual);

    let log_det = 2.0 * chol.l_dirty().diagonal().iter().map(|v| v.ln()).sum::<f64>();
    let log_lik = -0.5 * residual.dot(&alpha) - 0.5 * log_det - 0.5 * n as f64 * LN_2PI;

    // W = αα^T - K^{-1}; ∂L/∂θ = ½ tr(W ∂K/∂θ)
    let w = &alpha * alpha.transpose() - chol.inverse();

    let mut grad = vec![0.0; theta.len()];
    let mut log_prior = 0.0;

    let ls_grad = kernel::lengthscale_grad(x, &lengthscales, outputscale, &w);
    for (i, (&l, g)) in lengthscales.iter().zip(ls_grad).enumerate() {
        let (p, dp) = gamma_log_prior(l, LENGTHSCALE_PRIOR);
        log_prior += p;
        grad[i] = 0.5 * g + dp;
    }

    let (p, dp) = gamma_log_prior(outputscale, OUTPUTSCALE_PRIOR);
    log_prior += p;
    grad[d] = 0.5 * w.component_mul(&k_f).sum() + dp;

    let (p, dp) = gamma_log_prior(noise, NOISE_PRIOR);
    log_prior += p;
    grad[d + 1] = 0.5 * noise * w.trace() + dp;

    grad[d + 2] = alpha.sum();

    let scale = -1.0 / n as f64;
    let value = scale * (log_lik + log_prior);
    for g in &mut grad {
        *g *= scale;
    }

    (value.is_finite() && grad.iter().all(|g| g.is_finite())).then_some((value, grad))
}

// ---------------------------------------------------------------------------
// Fitted model
// ---------------------------------------------------------------------------

/// A GP conditioned on its training data.
///
/// Posterior queries return values in the original score scale.
#[derive(Clone, Debug)]
pub struct FittedGp {
    x_train: Vec<Vec<f64>>,
    hyper: GpHyperparameters,
    lengthscales: Vec<f64>,
    outputscale: f64,
    cholesky: Cholesky<f64, Dyn>,
    alpha: DVector<f64>,
    y_mean: f64,
    y_std: f64,
}

impl FittedGp {
    /// The fitted hyperparameters, usable as the next fit's warm start.
    #[must_use]
    pub fn hyperparameters(&self) -> &GpHyperparameters {
        &self.hyper
    }

    /// Number of training points.
    #[must_use]
    pub fn n_train(&self) -> usize {
        self.x_train.len()
    }

    /// Posterior mean and standard deviation of `f` at a single point.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if `x` has the wrong length.
    pub fn predict(&self, x: &[f64]) -> Result<(f64, f64)> {
        let post = self.posterior(&[x.to_vec()])?;
        Ok((post.mean[0], post.covariance[(0, 0)].max(0.0).sqrt()))
    }
}

impl Posterior for FittedGp {
    fn dim(&self) -> usize {
        self.lengthscales.len()
    }

    fn posterior(&self, x: &[Vec<f64>]) -> Result<JointPosterior> {
        let d = self.dim();
        if let Some(bad) = x.iter().find(|p| p.len() != d) {
            return Err(Error::DimensionMismatch {
                expected: d,
                got: bad.len(),
            });
        }

        let k_star = kernel::cross(x, &self.x_train, &self.lengthscales, self.outputscale);
        let mean = (&k_star * &self.alpha).add_scalar(self.hyper.mean);

        let v = self.cholesky.solve(&k_star.transpose());
        let cov = kernel::gram(x, &self.lengthscales, self.outputscale) - &k_star * v;
        let cov = (&cov + cov.transpose()) * 0.5;

        Ok(JointPosterior {
            mean: mean * self.y_std + DVector::from_element(x.len(), self.y_mean),
            covariance: cov * (self.y_std * self.y_std),
        })
    }
}
