#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![deny(unreachable_pub)]
#![deny(clippy::correctness)]
#![deny(clippy::suspicious)]
#![deny(clippy::style)]
#![deny(clippy::complexity)]
#![deny(clippy::perf)]
#![deny(clippy::pedantic)]
#![deny(clippy::std_instead_of_core)]

//! Batch Bayesian optimization over the latent space of a generative model.
//!
//! The flagship objective decodes a 20-dimensional latent vector with a
//! pretrained VAE, classifies the resulting MNIST-style image with a
//! pretrained CNN, and rewards images that look like a chosen digit. A
//! Gaussian-process surrogate and Monte Carlo batch Expected Improvement
//! (qEI) decide which latent vectors to try next, a few at a time.
//!
//! # Getting Started
//!
//! Any [`Objective`] can be optimized; a closure works too:
//!
//! ```
//! use latent_bo::prelude::*;
//!
//! let objective = FnObjective::new(2, |z: &[f64]| -(z[0] - 0.3).powi(2) - (z[1] + 0.2).powi(2));
//! let config = BoConfig::builder()
//!     .n_init(4)
//!     .batch_size(2)
//!     .n_batch(2)
//!     .num_restarts(2)
//!     .raw_samples(16)
//!     .mc_samples(64)
//!     .build()
//!     .unwrap();
//!
//! let mut bo = BoController::new(objective, Bounds::uniform(2, -1.0, 1.0).unwrap(), config).unwrap();
//! bo.run().unwrap();
//!
//! let best = bo.best().unwrap();
//! println!("best score {:.4} at {:?}", best.score, best.latent);
//! assert_eq!(bo.history().len(), 3);
//! ```
//!
//! The MNIST objective loads its weights from the directory named by
//! `PRETRAINED_LOCATION` (or `./pretrained_models`):
//!
//! ```no_run
//! use latent_bo::prelude::*;
//!
//! let objective = LatentObjective::from_pretrained(Precision::Double)?;
//! let bounds = Bounds::uniform(20, -6.0, 6.0)?;
//! let mut bo = BoController::new(objective, bounds, BoConfig::default())?;
//! bo.run()?;
//! # Ok::<(), latent_bo::Error>(())
//! ```
//!
//! # Core Concepts
//!
//! | Type | Role |
//! |------|------|
//! | [`BoController`](controller::BoController) | Run the loop: random init, then fit → acquire → evaluate → record. |
//! | [`Objective`] | Score a batch of points; [`LatentObjective`](objective::LatentObjective) is the decode → classify → reward pipeline. |
//! | [`Bounds`](domain::Bounds) | Box domain and its affine map to the unit cube. |
//! | [`GpSurrogate`](surrogate::GpSurrogate) | Exact GP with a Matérn 5/2 ARD kernel, MAP-fitted hyperparameters. |
//! | [`AcquisitionOptimizer`](acquisition::AcquisitionOptimizer) | Maximize qEI with quasi-random screening and L-BFGS refinement. |
//! | [`Dataset`](dataset::Dataset), [`BestObservedHistory`](dataset::BestObservedHistory) | Outputs of a run, exportable as CSV. |
//!
//! # Feature Flags
//!
//! | Flag | What it enables | Default |
//! |------|----------------|---------|
//! | `tracing` | Structured log events via [`tracing`](https://docs.rs/tracing) at key optimization points | on |
//! | `serde` | `Serialize`/`Deserialize` on the dataset, history, configuration and GP hyperparameters | off |

/// Emit a `tracing::info!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_info {
    ($($arg:tt)*) => { tracing::info!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_info {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::debug!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_debug {
    ($($arg:tt)*) => { tracing::debug!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_debug {
    ($($arg:tt)*) => {};
}

pub mod acquisition;
pub mod controller;
pub mod dataset;
pub mod domain;
mod error;
pub mod network;
pub mod objective;
mod optim;
mod rng_util;
pub mod scoring;
pub mod surrogate;
mod types;

pub use error::{Error, Result};
pub use objective::Objective;
pub use types::{Precision, RunState};

/// Convenient wildcard import for the most common types.
///
/// ```
/// use latent_bo::prelude::*;
/// ```
pub mod prelude {
    pub use crate::acquisition::{AcquisitionOptimizer, BatchSelection, QExpectedImprovement};
    pub use crate::controller::{BoConfig, BoConfigBuilder, BoController, IterationReport};
    pub use crate::dataset::{BestObservedHistory, Dataset, Observation};
    pub use crate::domain::Bounds;
    pub use crate::error::{Error, Result};
    pub use crate::network::{Classifier, Image, LatentDecoder, MnistCnn, Vae, VaeDecoder};
    pub use crate::objective::{FnObjective, LatentObjective, Objective};
    pub use crate::scoring::{LabelReward, ScoringOracle};
    pub use crate::surrogate::{FittedGp, GpConfig, GpHyperparameters, GpSurrogate, Posterior};
    pub use crate::types::{Precision, RunState};
}
