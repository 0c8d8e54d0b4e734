//! Monte Carlo batch Expected Improvement.

use nalgebra::linalg::Cholesky;
use nalgebra::DMatrix;

use super::sampler::normal_base_samples;
use crate::error::{Error, Result};
use crate::surrogate::Posterior;
use crate::types::Precision;

/// Cholesky attempts on the joint posterior covariance.
const MAX_JITTER_TRIES: usize = 8;

/// `qEI(X) = mean_s max_j max(f_s(x_j) - best_f, 0)`.
///
/// Samples are `f_s = mu + L z_s` where `L` is the Cholesky factor of the
/// joint posterior covariance and `z_s` are fixed quasi-Monte-Carlo
/// standard-normal base samples, so the surface is deterministic in `X`.
pub struct QExpectedImprovement<P> {
    model: P,
    best_f: f64,
    batch_size: usize,
    base_samples: DMatrix<f64>,
    precision: Precision,
}

impl<P: Posterior> QExpectedImprovement<P> {
    /// Build the acquisition for batches of `batch_size` points, with
    /// `mc_samples` base samples drawn from `seed`.
    pub fn new(
        model: P,
        best_f: f64,
        batch_size: usize,
        mc_samples: usize,
        seed: u64,
        precision: Precision,
    ) -> Self {
        Self {
            model,
            best_f,
            batch_size,
            base_samples: normal_base_samples(mc_samples, batch_size, seed),
            precision,
        }
    }

    /// The incumbent value improvements are measured against.
    pub fn best_f(&self) -> f64 {
        self.best_f
    }

    /// Number of points per batch.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Dimension of a single point.
    pub fn dim(&self) -> usize {
        self.model.dim()
    }

    /// Value of the acquisition at `batch`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if `batch` does not hold
    /// `batch_size` points of the model's dimension, and
    /// [`Error::OptimizationFailure`] if the posterior covariance cannot be
    /// factorized.
    #[allow(clippy::cast_precision_loss)]
    pub fn evaluate(&self, batch: &[Vec<f64>]) -> Result<f64> {
        if batch.len() != self.batch_size {
            return Err(Error::DimensionMismatch {
                expected: self.batch_size,
                got: batch.len(),
            });
        }
        let post = self.model.posterior(batch)?;
        if post.mean.iter().any(|v| !v.is_finite()) {
            return Err(Error::OptimizationFailure("posterior mean is not finite".into()));
        }
        let l = self.cholesky_factor(&post.covariance).ok_or_else(|| {
            Error::OptimizationFailure("posterior covariance is not positive definite".into())
        })?;

        let samples = &l * &self.base_samples;
        let n_samples = samples.ncols();
        if n_samples == 0 {
            return Ok(0.0);
        }
        let total: f64 = samples
            .column_iter()
            .map(|col| {
                col.iter()
                    .zip(post.mean.iter())
                    .map(|(z, mu)| mu + z - self.best_f)
                    .fold(0.0_f64, f64::max)
            })
            .sum();
        Ok(total / n_samples as f64)
    }

    /// Value at a flattened `q·d` vector; `NaN` on any failure.
    pub(crate) fn evaluate_flat(&self, flat: &[f64]) -> f64 {
        let d = self.dim();
        if d == 0 {
            return f64::NAN;
        }
        let batch: Vec<Vec<f64>> = flat.chunks(d).map(<[f64]>::to_vec).collect();
        self.evaluate(&batch).unwrap_or(f64::NAN)
    }

    /// Lower Cholesky factor, with jitter relative to the mean variance.
    fn cholesky_factor(&self, cov: &DMatrix<f64>) -> Option<DMatrix<f64>> {
        let q = cov.nrows();
        let mut cov = cov.clone();
        for i in 0..q {
            cov[(i, i)] = cov[(i, i)].max(0.0);
        }
        #[allow(clippy::cast_precision_loss)]
        let scale = cov.trace() / q.max(1) as f64;
        if !scale.is_finite() {
            return None;
        }
        if scale <= 0.0 {
            return Some(DMatrix::zeros(q, q));
        }
        let mut jitter = self.precision.initial_jitter() * scale;
        for _ in 0..MAX_JITTER_TRIES {
            let attempt = &cov + DMatrix::identity(q, q) * jitter;
            if let Some(chol) = Cholesky::new(attempt) {
                return Some(chol.unpack());
            }
            jitter *= 10.0;
        }
        None
    }
}
