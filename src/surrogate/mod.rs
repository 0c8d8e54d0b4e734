//! Gaussian-process surrogate of the objective.
//!
//! [`GpSurrogate::fit`] returns a [`FittedGp`], which answers joint
//! posterior queries over batches of unit-cube points through the
//! [`Posterior`] trait. The acquisition function only depends on that
//! trait.

mod gp;
mod kernel;

use nalgebra::{DMatrix, DVector};

pub use gp::{FittedGp, GpConfig, GpHyperparameters, GpSurrogate};

use crate::error::Result;

/// Joint Gaussian posterior over a batch of points.
#[derive(Clone, Debug)]
pub struct JointPosterior {
    /// Posterior mean, one entry per point.
    pub mean: DVector<f64>,
    /// Posterior covariance, `q x q` for a batch of `q` points.
    pub covariance: DMatrix<f64>,
}

impl JointPosterior {
    /// Number of points in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mean.len()
    }

    /// Returns `true` for an empty batch.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }
}

/// A model that yields a joint posterior over latent function values.
pub trait Posterior {
    /// Input dimension.
    fn dim(&self) -> usize;

    /// Joint posterior of the noiseless function at every point of `x`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`](crate::Error::DimensionMismatch)
    /// if a point has the wrong length.
    fn posterior(&self, x: &[Vec<f64>]) -> Result<JointPosterior>;
}

impl<T: Posterior + ?Sized> Posterior for &T {
    fn dim(&self) -> usize {
        (**self).dim()
    }

    fn posterior(&self, x: &[Vec<f64>]) -> Result<JointPosterior> {
        (**self).posterior(x)
    }
}
