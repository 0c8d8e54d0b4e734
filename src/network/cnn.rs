//! The frozen MNIST digit classifier.
//!
//! Architecture: conv(1→20, 5×5) → ReLU → maxpool 2 → conv(20→50, 5×5)
//! → ReLU → maxpool 2 → linear(800→500) → ReLU → linear(500→10)
//! → log-softmax.

use std::path::Path;

use super::layers::{Conv2d, FeatureMap, Linear, log_softmax, max_pool2d, relu_inplace};
use super::weights::WeightStore;
use super::{Classifier, IMAGE_SIDE, Image};
use crate::error::Result;
use crate::types::Precision;

/// File name of the classifier weights inside the pretrained directory.
pub const CNN_WEIGHTS_FILE: &str = "mnist_cnn.safetensors";

const N_LABELS: usize = 10;
const FLAT: usize = 4 * 4 * 50;

/// Convolutional MNIST classifier with frozen weights.
#[derive(Clone, Debug)]
pub struct MnistCnn {
    conv1: Conv2d,
    conv2: Conv2d,
    fc1: Linear,
    fc2: Linear,
    precision: Precision,
}

impl MnistCnn {
    /// Load the classifier from a safetensors file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`](crate::Error::Configuration) if the
    /// file is unreadable or any tensor is missing or mis-shaped.
    pub fn open(path: impl AsRef<Path>, precision: Precision) -> Result<Self> {
        let store = WeightStore::open(path, precision)?;
        Self::from_store(&store, precision)
    }

    /// Build the classifier from already-loaded weights.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`](crate::Error::Configuration) if any
    /// tensor is missing or mis-shaped.
    pub fn from_store(store: &WeightStore, precision: Precision) -> Result<Self> {
        Ok(Self {
            conv1: Conv2d::load(store, "conv1", 1, 20, 5)?,
            conv2: Conv2d::load(store, "conv2", 20, 50, 5)?,
            fc1: Linear::load(store, "fc1", FLAT, 500)?,
            fc2: Linear::load(store, "fc2", 500, N_LABELS)?,
            precision,
        })
    }
}

impl Classifier for MnistCnn {
    fn n_labels(&self) -> usize {
        N_LABELS
    }

    fn log_probs(&self, image: &Image) -> Result<Vec<f64>> {
        let p = self.precision;
        let input = FeatureMap {
            channels: 1,
            height: IMAGE_SIDE,
            width: IMAGE_SIDE,
            data: image.pixels().iter().map(|&v| p.round(v)).collect(),
        };

        let mut h = self.conv1.forward(&input, p);
        relu_inplace(&mut h.data);
        let h = max_pool2d(&h, 2);
        let mut h = self.conv2.forward(&h, p);
        relu_inplace(&mut h.data);
        let h = max_pool2d(&h, 2);

        debug_assert_eq!(h.data.len(), self.fc1.n_in());
        let mut h = self.fc1.forward(&h.data, p);
        relu_inplace(&mut h);
        let logits = self.fc2.forward(&h, p);
        Ok(log_softmax(&logits))
    }
}
