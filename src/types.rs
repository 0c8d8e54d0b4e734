//! Core types shared across the crate.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Floating-point precision used for numerical work.
///
/// Network forward passes round weights and activations to `f32` in
/// [`Single`](Precision::Single) mode. The surrogate and the acquisition
/// optimizer always compute in `f64` but pick their jitter and
/// finite-difference steps from the precision's machine epsilon.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Precision {
    /// 32-bit floats.
    Single,
    /// 64-bit floats.
    #[default]
    Double,
}

impl Precision {
    /// Machine epsilon of this precision.
    #[must_use]
    pub fn epsilon(self) -> f64 {
        match self {
            Self::Single => f64::from(f32::EPSILON),
            Self::Double => f64::EPSILON,
        }
    }

    /// Round `v` to this precision.
    #[must_use]
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    pub fn round(self, v: f64) -> f64 {
        match self {
            Self::Single => f64::from(v as f32),
            Self::Double => v,
        }
    }

    /// Diagonal jitter added before the first Cholesky attempt.
    #[must_use]
    pub fn initial_jitter(self) -> f64 {
        match self {
            Self::Single => 1e-6,
            Self::Double => 1e-8,
        }
    }
}

/// The lifecycle state of a Bayesian optimization run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RunState {
    /// No observations yet; the next step evaluates the random initial batch.
    Init,
    /// The model-guided loop is running.
    Iterating,
    /// All iterations completed.
    Done,
    /// A step failed; the data gathered so far stay readable.
    Failed,
}

impl RunState {
    /// Returns `true` once the run can no longer be stepped.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}
