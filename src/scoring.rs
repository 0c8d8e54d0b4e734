//! Expected reward of a classifier's prediction.

use crate::error::{Error, Result};
use crate::network::{Classifier, Image};

/// Label the default reward is centred on.
pub const PREFERRED_LABEL: usize = 3;

/// Gaussian-shaped reward over digit labels:
/// `reward(label) = exp(-2 (label - center)^2)`.
#[derive(Clone, Debug, PartialEq)]
pub struct LabelReward {
    center: f64,
    width: f64,
}

impl LabelReward {
    /// Reward peaked at `center` with curvature `width`
    /// (`exp(-width (label - center)^2)`).
    #[must_use]
    pub fn new(center: f64, width: f64) -> Self {
        Self { center, width }
    }

    /// Reward for one label.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn reward(&self, label: usize) -> f64 {
        let d = label as f64 - self.center;
        (-self.width * d * d).exp()
    }

    /// Rewards for labels `0..n`.
    #[must_use]
    pub fn table(&self, n: usize) -> Vec<f64> {
        (0..n).map(|l| self.reward(l)).collect()
    }
}

impl Default for LabelReward {
    #[allow(clippy::cast_precision_loss)]
    fn default() -> Self {
        Self::new(PREFERRED_LABEL as f64, 2.0)
    }
}

/// Scores an image as the expected [`LabelReward`] under the classifier's
/// predictive distribution.
#[derive(Clone, Debug)]
pub struct ScoringOracle<C> {
    classifier: C,
    rewards: Vec<f64>,
}

impl<C: Classifier> ScoringOracle<C> {
    /// Oracle using the default reward (peaked at label 3).
    pub fn new(classifier: C) -> Self {
        Self::with_reward(classifier, &LabelReward::default())
    }

    /// Oracle using a custom reward.
    pub fn with_reward(classifier: C, reward: &LabelReward) -> Self {
        let rewards = reward.table(classifier.n_labels());
        Self {
            classifier,
            rewards,
        }
    }

    /// The wrapped classifier.
    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    /// Score one image.
    ///
    /// # Errors
    ///
    /// Propagates classifier failures.
    pub fn score(&self, image: &Image) -> Result<f64> {
        let log_probs = self.classifier.log_probs(image)?;
        let probs: Vec<f64> = log_probs.iter().map(|lp| lp.exp()).collect();
        self.expected_score(&probs)
    }

    /// Expected reward of a probability vector over labels.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if `probs` does not have one
    /// entry per label.
    pub fn expected_score(&self, probs: &[f64]) -> Result<f64> {
        if probs.len() != self.rewards.len() {
            return Err(Error::DimensionMismatch {
                expected: self.rewards.len(),
                got: probs.len(),
            });
        }
        Ok(probs.iter().zip(&self.rewards).map(|(p, r)| p * r).sum())
    }
}
