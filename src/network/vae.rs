//! The frozen MNIST variational autoencoder.
//!
//! Only the decoder is needed by the objective:
//! `z (20) → linear(20→400) → ReLU → linear(400→784) → sigmoid`.
//! When the file also carries the encoder (`fc1`, `fc21`, `fc22`),
//! [`Vae::encode`] maps an image to the mean and log-variance of its
//! approximate posterior.

use std::path::Path;

use super::layers::{Linear, relu_inplace, sigmoid};
use super::weights::WeightStore;
use super::{IMAGE_PIXELS, Image, LatentDecoder};
use crate::error::{Error, Result};
use crate::types::Precision;

/// File name of the autoencoder weights inside the pretrained directory.
pub const VAE_WEIGHTS_FILE: &str = "mnist_vae.safetensors";

/// Latent dimension of the MNIST autoencoder.
pub const LATENT_DIM: usize = 20;
const HIDDEN: usize = 400;

/// Deterministic decoder half of the autoencoder.
#[derive(Clone, Debug)]
pub struct VaeDecoder {
    fc3: Linear,
    fc4: Linear,
    precision: Precision,
}

impl VaeDecoder {
    /// Load the decoder from a safetensors file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the file is unreadable or a
    /// decoder tensor is missing or mis-shaped.
    pub fn open(path: impl AsRef<Path>, precision: Precision) -> Result<Self> {
        let store = WeightStore::open(path, precision)?;
        Self::from_store(&store, precision)
    }

    /// Build the decoder from already-loaded weights.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if a decoder tensor is missing or
    /// mis-shaped.
    pub fn from_store(store: &WeightStore, precision: Precision) -> Result<Self> {
        Ok(Self {
            fc3: Linear::load(store, "fc3", LATENT_DIM, HIDDEN)?,
            fc4: Linear::load(store, "fc4", HIDDEN, IMAGE_PIXELS)?,
            precision,
        })
    }
}

impl LatentDecoder for VaeDecoder {
    fn latent_dim(&self) -> usize {
        LATENT_DIM
    }

    fn decode(&self, z: &[f64]) -> Result<Image> {
        if z.len() != LATENT_DIM {
            return Err(Error::DimensionMismatch {
                expected: LATENT_DIM,
                got: z.len(),
            });
        }
        let p = self.precision;
        let z: Vec<f64> = z.iter().map(|&v| p.round(v)).collect();
        let mut h = self.fc3.forward(&z, p);
        relu_inplace(&mut h);
        let out = self.fc4.forward(&h, p);
        Image::new(out.into_iter().map(|v| p.round(sigmoid(v))).collect())
    }
}

/// Encoder half: image → `(mu, logvar)`.
#[derive(Clone, Debug)]
struct VaeEncoder {
    fc1: Linear,
    fc21: Linear,
    fc22: Linear,
}

/// The full autoencoder; the encoder is present only if the weights carry it.
#[derive(Clone, Debug)]
pub struct Vae {
    decoder: VaeDecoder,
    encoder: Option<VaeEncoder>,
}

impl Vae {
    /// Load the autoencoder from a safetensors file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the decoder cannot be built, or if
    /// the encoder is partially present or mis-shaped.
    pub fn open(path: impl AsRef<Path>, precision: Precision) -> Result<Self> {
        let store = WeightStore::open(path, precision)?;
        Self::from_store(&store, precision)
    }

    /// Build the autoencoder from already-loaded weights.
    ///
    /// # Errors
    ///
    /// Same as [`open`](Self::open).
    pub fn from_store(store: &WeightStore, precision: Precision) -> Result<Self> {
        let decoder = VaeDecoder::from_store(store, precision)?;
        let encoder = if store.has("fc1.weight") {
            Some(VaeEncoder {
                fc1: Linear::load(store, "fc1", IMAGE_PIXELS, HIDDEN)?,
                fc21: Linear::load(store, "fc21", HIDDEN, LATENT_DIM)?,
                fc22: Linear::load(store, "fc22", HIDDEN, LATENT_DIM)?,
            })
        } else {
            None
        };
        Ok(Self { decoder, encoder })
    }

    /// The decoder, for building an objective.
    #[must_use]
    pub fn decoder(&self) -> &VaeDecoder {
        &self.decoder
    }

    /// Returns `true` if encoder weights were loaded.
    #[must_use]
    pub fn has_encoder(&self) -> bool {
        self.encoder.is_some()
    }

    /// Mean and log-variance of the approximate posterior for `image`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the weights carried no encoder.
    pub fn encode(&self, image: &Image) -> Result<(Vec<f64>, Vec<f64>)> {
        let enc = self
            .encoder
            .as_ref()
            .ok_or_else(|| Error::config("autoencoder weights carry no encoder"))?;
        let p = self.decoder.precision;
        let mut h = enc.fc1.forward(image.pixels(), p);
        relu_inplace(&mut h);
        Ok((enc.fc21.forward(&h, p), enc.fc22.forward(&h, p)))
    }

    /// The posterior mean for `image`, a deterministic latent code.
    ///
    /// # Errors
    ///
    /// Same as [`encode`](Self::encode).
    pub fn encode_mean(&self, image: &Image) -> Result<Vec<f64>> {
        self.encode(image).map(|(mu, _)| mu)
    }
}

impl LatentDecoder for Vae {
    fn latent_dim(&self) -> usize {
        self.decoder.latent_dim()
    }

    fn decode(&self, z: &[f64]) -> Result<Image> {
        self.decoder.decode(z)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::network::weights::testing::encode;

    use super::{HIDDEN, IMAGE_PIXELS, LATENT_DIM};

    /// Decoder weights where `fc4` reads the first hidden unit, which in
    /// turn is `relu(z[0])`. Pixel `i` is `sigmoid(scale_i * relu(z0))`.
    pub(crate) fn decoder_bytes(with_encoder: bool) -> Vec<u8> {
        let mut fc3 = vec![0.0; HIDDEN * LATENT_DIM];
        fc3[0] = 1.0;
        let mut fc4 = vec![0.0; IMAGE_PIXELS * HIDDEN];
        for i in 0..IMAGE_PIXELS {
            #[allow(clippy::cast_precision_loss)]
            let scale = (i % 7) as f64 - 3.0;
            fc4[i * HIDDEN] = scale;
        }
        let mut tensors = vec![
            ("fc3.weight", vec![HIDDEN, LATENT_DIM], fc3),
            ("fc3.bias", vec![HIDDEN], vec![0.0; HIDDEN]),
            ("fc4.weight", vec![IMAGE_PIXELS, HIDDEN], fc4),
            ("fc4.bias", vec![IMAGE_PIXELS], vec![0.0; IMAGE_PIXELS]),
        ];
        if with_encoder {
            tensors.extend([
                ("fc1.weight", vec![HIDDEN, IMAGE_PIXELS], vec![0.0; HIDDEN * IMAGE_PIXELS]),
                ("fc1.bias", vec![HIDDEN], vec![1.0; HIDDEN]),
                ("fc21.weight", vec![LATENT_DIM, HIDDEN], vec![0.01; LATENT_DIM * HIDDEN]),
                ("fc21.bias", vec![LATENT_DIM], vec![0.0; LATENT_DIM]),
                ("fc22.weight", vec![LATENT_DIM, HIDDEN], vec![0.0; LATENT_DIM * HIDDEN]),
                ("fc22.bias", vec![LATENT_DIM], vec![-1.0; LATENT_DIM]),
            ]);
        }
        encode(&tensors)
    }
}
