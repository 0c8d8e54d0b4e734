//! The [`Objective`] trait defines what gets optimized.
//!
//! An objective scores a batch of points of its own domain. The controller
//! treats it as an opaque, expensive black box: it is called once for the
//! random initial batch and once per iteration.
//!
//! [`LatentObjective`] is the decode → classify → reward pipeline over the
//! frozen MNIST networks. [`FnObjective`] wraps a plain closure, which is
//! handy for synthetic benchmarks:
//!
//! ```
//! use latent_bo::objective::{FnObjective, Objective};
//!
//! let sphere = FnObjective::new(2, |z: &[f64]| -z.iter().map(|v| v * v).sum::<f64>());
//! assert_eq!(sphere.evaluate(&[vec![1.0, 2.0]]).unwrap(), vec![-5.0]);
//! assert!(sphere.evaluate(&[]).unwrap().is_empty());
//! ```

use std::path::Path;

use crate::error::{Error, Result};
use crate::network::cnn::CNN_WEIGHTS_FILE;
use crate::network::vae::VAE_WEIGHTS_FILE;
use crate::network::{Classifier, Image, LatentDecoder, MnistCnn, VaeDecoder, pretrained_dir};
use crate::scoring::ScoringOracle;
use crate::types::Precision;

/// A batch black-box objective to be maximized.
pub trait Objective {
    /// Dimension of the points the objective accepts.
    fn dim(&self) -> usize;

    /// Score every point of `batch`, in order.
    ///
    /// An empty batch yields an empty vector.
    ///
    /// # Errors
    ///
    /// Implementations report failures as [`Error::Objective`] or
    /// [`Error::DimensionMismatch`].
    fn evaluate(&self, batch: &[Vec<f64>]) -> Result<Vec<f64>>;
}

impl<T: Objective + ?Sized> Objective for &T {
    fn dim(&self) -> usize {
        (**self).dim()
    }

    fn evaluate(&self, batch: &[Vec<f64>]) -> Result<Vec<f64>> {
        (**self).evaluate(batch)
    }
}

/// A pointwise closure lifted to a batch [`Objective`].
pub struct FnObjective<F> {
    dim: usize,
    f: F,
}

impl<F: Fn(&[f64]) -> f64> FnObjective<F> {
    /// Wrap `f`, which accepts `dim`-dimensional points.
    pub fn new(dim: usize, f: F) -> Self {
        Self { dim, f }
    }
}

impl<F: Fn(&[f64]) -> f64> Objective for FnObjective<F> {
    fn dim(&self) -> usize {
        self.dim
    }

    fn evaluate(&self, batch: &[Vec<f64>]) -> Result<Vec<f64>> {
        batch
            .iter()
            .map(|z| {
                check_dim(self.dim, z)?;
                Ok((self.f)(z))
            })
            .collect()
    }
}

/// Decode → score pipeline over frozen networks.
///
/// Each latent vector is decoded to an image, the classifier's predictive
/// distribution over labels is computed, and the expected reward under that
/// distribution is the score. Deterministic for fixed weights.
pub struct LatentObjective<D, C> {
    decoder: D,
    oracle: ScoringOracle<C>,
}

impl<D: LatentDecoder, C: Classifier> LatentObjective<D, C> {
    /// Compose a decoder and a scoring oracle.
    pub fn new(decoder: D, oracle: ScoringOracle<C>) -> Self {
        Self { decoder, oracle }
    }

    /// Decode a latent vector without scoring it.
    ///
    /// # Errors
    ///
    /// Propagates decoder failures.
    pub fn decode(&self, z: &[f64]) -> Result<Image> {
        self.decoder.decode(z)
    }

    /// The decoder.
    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    /// The scoring oracle.
    pub fn oracle(&self) -> &ScoringOracle<C> {
        &self.oracle
    }
}

impl LatentObjective<VaeDecoder, MnistCnn> {
    /// Load both networks from `dir` (`mnist_vae.safetensors`,
    /// `mnist_cnn.safetensors`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if either file is missing or
    /// malformed.
    pub fn from_dir(dir: impl AsRef<Path>, precision: Precision) -> Result<Self> {
        let dir = dir.as_ref();
        let decoder = VaeDecoder::open(dir.join(VAE_WEIGHTS_FILE), precision)?;
        let classifier = MnistCnn::open(dir.join(CNN_WEIGHTS_FILE), precision)?;
        trace_info!(dir = %dir.display(), ?precision, "pretrained networks loaded");
        Ok(Self::new(decoder, ScoringOracle::new(classifier)))
    }

    /// Load both networks from the directory resolved by
    /// [`pretrained_dir`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the directory cannot be resolved
    /// or the weights cannot be loaded.
    pub fn from_pretrained(precision: Precision) -> Result<Self> {
        Self::from_dir(pretrained_dir()?, precision)
    }
}

impl<D: LatentDecoder, C: Classifier> Objective for LatentObjective<D, C> {
    fn dim(&self) -> usize {
        self.decoder.latent_dim()
    }

    fn evaluate(&self, batch: &[Vec<f64>]) -> Result<Vec<f64>> {
        batch
            .iter()
            .map(|z| {
                check_dim(self.dim(), z)?;
                let image = self.decoder.decode(z)?;
                self.oracle.score(&image)
            })
            .collect()
    }
}

fn check_dim(expected: usize, z: &[f64]) -> Result<()> {
    if z.len() == expected {
        Ok(())
    } else {
        Err(Error::DimensionMismatch {
            expected,
            got: z.len(),
        })
    }
}
