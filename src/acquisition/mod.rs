//! Batch acquisition: Monte Carlo qEI and its optimizer.
//!
//! [`QExpectedImprovement`] scores a batch of unit-cube points under a
//! [`Posterior`](crate::surrogate::Posterior).
//! [`AcquisitionOptimizer::select_batch`] screens quasi-random candidate
//! batches and refines the most promising ones with bounded L-BFGS.

mod optimizer;
mod qei;
mod sampler;

pub use optimizer::{AcquisitionOptimizer, BatchSelection};
pub use qei::QExpectedImprovement;

