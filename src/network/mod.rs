//! Frozen networks behind the objective.
//!
//! Both networks are pure functions of their input once loaded: there is no
//! training, no dropout and no sampling at inference time. They are modelled
//! as two small capabilities, [`LatentDecoder`] and [`Classifier`], so the
//! objective can be assembled from any implementation (the pretrained MNIST
//! models in [`cnn`] and [`vae`], or test doubles).

pub mod cnn;
mod layers;
pub mod locator;
pub mod vae;
pub mod weights;

use crate::error::Result;

/// Side length of an MNIST image.
pub const IMAGE_SIDE: usize = 28;
/// Number of pixels of an MNIST image.
pub const IMAGE_PIXELS: usize = IMAGE_SIDE * IMAGE_SIDE;

/// A single-channel 28×28 image with intensities in `[0, 1]`, row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    pixels: Vec<f64>,
}

impl Image {
    /// Wraps row-major pixels.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`](crate::Error::DimensionMismatch)
    /// unless exactly [`IMAGE_PIXELS`] values are given.
    pub fn new(pixels: Vec<f64>) -> Result<Self> {
        if pixels.len() == IMAGE_PIXELS {
            Ok(Self { pixels })
        } else {
            Err(crate::Error::DimensionMismatch {
                expected: IMAGE_PIXELS,
                got: pixels.len(),
            })
        }
    }

    /// Row-major pixel intensities.
    #[must_use]
    pub fn pixels(&self) -> &[f64] {
        &self.pixels
    }

    /// Pixel at row `y`, column `x`.
    #[must_use]
    pub fn get(&self, y: usize, x: usize) -> f64 {
        self.pixels[y * IMAGE_SIDE + x]
    }
}

/// Maps a latent vector to an image.
pub trait LatentDecoder {
    /// Dimension of the latent space.
    fn latent_dim(&self) -> usize;

    /// Decode one latent vector.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`](crate::Error::DimensionMismatch)
    /// if `z` does not have [`latent_dim`](Self::latent_dim) entries.
    fn decode(&self, z: &[f64]) -> Result<Image>;
}

/// Maps an image to log-probabilities over a fixed label set.
pub trait Classifier {
    /// Number of labels.
    fn n_labels(&self) -> usize;

    /// Log-probabilities, one per label.
    ///
    /// # Errors
    ///
    /// Implementations may fail on malformed input.
    fn log_probs(&self, image: &Image) -> Result<Vec<f64>>;
}

impl<T: LatentDecoder + ?Sized> LatentDecoder for Box<T> {
    fn latent_dim(&self) -> usize {
        (**self).latent_dim()
    }

    fn decode(&self, z: &[f64]) -> Result<Image> {
        (**self).decode(z)
    }
}

impl<T: Classifier + ?Sized> Classifier for Box<T> {
    fn n_labels(&self) -> usize {
        (**self).n_labels()
    }

    fn log_probs(&self, image: &Image) -> Result<Vec<f64>> {
        (**self).log_probs(image)
    }
}

pub use cnn::MnistCnn;
pub use locator::{PRETRAINED_ENV, locate_pretrained, pretrained_dir};
pub use vae::{Vae, VaeDecoder};
pub use weights::WeightStore;
