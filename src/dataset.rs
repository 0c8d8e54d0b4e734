//! Append-only storage of evaluated points and the best-value history.

use core::fmt::Write as _;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A single evaluated latent vector and its score.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Observation {
    /// The latent vector in the objective's own domain.
    pub latent: Vec<f64>,
    /// The observed score.
    pub score: f64,
}

/// Ordered, append-only sequence of [`Observation`]s.
///
/// Insertion order is evaluation order. Entries are never removed or
/// modified; the only mutation is [`append_batch`](Dataset::append_batch).
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Dataset {
    dim: usize,
    observations: Vec<Observation>,
}

impl Dataset {
    /// Creates an empty dataset for `dim`-dimensional latents.
    #[must_use]
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            observations: Vec::new(),
        }
    }

    /// Latent dimension.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of observations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Returns `true` if nothing has been observed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// All observations in evaluation order.
    #[must_use]
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Iterate over observations in evaluation order.
    pub fn iter(&self) -> impl Iterator<Item = &Observation> {
        self.observations.iter()
    }

    /// Latent vectors, in evaluation order.
    #[must_use]
    pub fn latents(&self) -> Vec<Vec<f64>> {
        self.observations.iter().map(|o| o.latent.clone()).collect()
    }

    /// Scores, in evaluation order.
    #[must_use]
    pub fn scores(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.score).collect()
    }

    /// Append a batch of evaluated points.
    ///
    /// The batch is validated as a whole before anything is appended, so a
    /// rejected batch leaves the dataset untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if the number of scores differs
    /// from the number of latents or a latent has the wrong dimension, and
    /// [`Error::Objective`] if a score is not finite.
    pub fn append_batch(&mut self, latents: Vec<Vec<f64>>, scores: &[f64]) -> Result<()> {
        if latents.len() != scores.len() {
            return Err(Error::DimensionMismatch {
                expected: latents.len(),
                got: scores.len(),
            });
        }
        if let Some(bad) = latents.iter().find(|z| z.len() != self.dim) {
            return Err(Error::DimensionMismatch {
                expected: self.dim,
                got: bad.len(),
            });
        }
        if let Some(bad) = scores.iter().find(|s| !s.is_finite()) {
            return Err(Error::Objective(format!("non-finite score {bad}")));
        }
        self.observations.extend(
            latents
                .into_iter()
                .zip(scores)
                .map(|(latent, &score)| Observation { latent, score }),
        );
        Ok(())
    }

    /// Index and value of the best score. Ties resolve to the earliest entry.
    #[must_use]
    pub fn best(&self) -> Option<(usize, f64)> {
        self.best_within(self.len())
    }

    /// The best observation. Ties resolve to the earliest entry.
    #[must_use]
    pub fn best_observation(&self) -> Option<&Observation> {
        self.best().map(|(i, _)| &self.observations[i])
    }

    /// Maximum score, if any.
    #[must_use]
    pub fn max_score(&self) -> Option<f64> {
        self.best().map(|(_, v)| v)
    }

    /// Stable argmax over the first `prefix_len` observations.
    ///
    /// Answers "what would have been recommended had the run stopped after
    /// `prefix_len` evaluations". A prefix longer than the dataset is
    /// clamped.
    #[must_use]
    pub fn best_within(&self, prefix_len: usize) -> Option<(usize, f64)> {
        let end = prefix_len.min(self.len());
        self.observations[..end]
            .iter()
            .enumerate()
            .fold(None, |best, (i, o)| match best {
                Some((_, v)) if o.score <= v => best,
                _ => Some((i, o.score)),
            })
    }

    /// Write the dataset as CSV.
    ///
    /// Columns: `index`, `score`, then `z0` .. `z{d-1}`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if writing fails.
    pub fn to_csv(&self, mut writer: impl std::io::Write) -> Result<()> {
        let mut header = String::from("index,score");
        for j in 0..self.dim {
            let _ = write!(header, ",z{j}");
        }
        writeln!(writer, "{header}")?;
        for (i, o) in self.observations.iter().enumerate() {
            let mut row = format!("{i},{}", o.score);
            for v in &o.latent {
                let _ = write!(row, ",{v}");
            }
            writeln!(writer, "{row}")?;
        }
        Ok(())
    }
}

/// Running maximum of the observed score, one entry per stage.
///
/// The first entry is the best of the random initial batch; each completed
/// iteration appends one more. Non-decreasing by construction.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BestObservedHistory {
    values: Vec<f64>,
}

impl BestObservedHistory {
    /// Creates an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the dataset's current best value.
    ///
    /// The pushed value is never below the previous entry.
    pub(crate) fn record(&mut self, best: f64) {
        let v = self.values.last().map_or(best, |&prev| prev.max(best));
        self.values.push(v);
    }

    /// Entries in stage order.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of recorded stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if no stage has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The most recent entry.
    #[must_use]
    pub fn last(&self) -> Option<f64> {
        self.values.last().copied()
    }

    /// Write the history as CSV with columns `stage,best`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if writing fails.
    pub fn to_csv(&self, mut writer: impl std::io::Write) -> Result<()> {
        writeln!(writer, "stage,best")?;
        for (i, v) in self.values.iter().enumerate() {
            writeln!(writer, "{i},{v}")?;
        }
        Ok(())
    }
}
