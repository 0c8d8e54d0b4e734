//! The Bayesian optimization loop.
//!
//! [`BoController`] owns the objective, the [`Dataset`] and the
//! [`BestObservedHistory`] of a run and moves through
//! `Init → Iterating → Done`:
//!
//! 1. **Init**: `n_init` points drawn uniformly in the unit cube are mapped
//!    into the domain and evaluated.
//! 2. **Iterating** (`n_batch` times): fit the GP on every observation
//!    (warm-started from the previous fit), maximize qEI against the best
//!    score so far, map the batch back to the domain, evaluate, record.
//! 3. **Done**: the dataset and history are final.
//!
//! Any error aborts the run and leaves it [`Failed`](RunState::Failed)
//! with all data gathered so far intact.
//!
//! # Examples
//!
//! ```
//! use latent_bo::controller::{BoConfig, BoController};
//! use latent_bo::domain::Bounds;
//! use latent_bo::objective::FnObjective;
//!
//! let objective = FnObjective::new(2, |z: &[f64]| -(z[0] - 0.5).powi(2) - z[1] * z[1]);
//! let config = BoConfig::builder()
//!     .n_init(4)
//!     .batch_size(2)
//!     .n_batch(2)
//!     .num_restarts(2)
//!     .raw_samples(16)
//!     .mc_samples(64)
//!     .build()
//!     .unwrap();
//! let mut bo = BoController::new(objective, Bounds::uniform(2, -1.0, 1.0).unwrap(), config).unwrap();
//! bo.run().unwrap();
//!
//! assert_eq!(bo.dataset().len(), 8);
//! assert_eq!(bo.history().len(), 3);
//! ```

mod config;

pub use config::{BoConfig, BoConfigBuilder};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::acquisition::AcquisitionOptimizer;
use crate::dataset::{BestObservedHistory, Dataset, Observation};
use crate::domain::Bounds;
use crate::error::{Error, Result};
use crate::objective::Objective;
use crate::rng_util::unit_cube;
use crate::surrogate::{GpConfig, GpHyperparameters, GpSurrogate};
use crate::types::RunState;

/// Outcome of one [`BoController::step`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IterationReport {
    /// `0` for the initial batch, then `1..=n_batch`.
    pub iteration: usize,
    /// Points evaluated in this step.
    pub n_new: usize,
    /// Best score observed so far.
    pub best_value: f64,
    /// Best score within this step's batch.
    pub batch_max: f64,
    /// qEI of the chosen batch; `None` for the random initial batch.
    pub acquisition_value: Option<f64>,
}

/// Drives a batch Bayesian optimization run over an [`Objective`].
pub struct BoController<O> {
    objective: O,
    bounds: Bounds,
    config: BoConfig,
    surrogate: GpSurrogate,
    optimizer: AcquisitionOptimizer,
    dataset: Dataset,
    history: BestObservedHistory,
    warm_start: Option<GpHyperparameters>,
    state: RunState,
    iteration: usize,
}

impl<O: Objective> BoController<O> {
    /// Prepare a run of `objective` over `bounds`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfig`] if `config` is out of range or the domain
    ///   has no dimensions.
    /// - [`Error::DimensionMismatch`] if the objective and the bounds
    ///   disagree on the dimension.
    pub fn new(objective: O, bounds: Bounds, config: BoConfig) -> Result<Self> {
        config.validate()?;
        if bounds.dim() == 0 {
            return Err(Error::InvalidConfig("the domain has no dimensions".into()));
        }
        if objective.dim() != bounds.dim() {
            return Err(Error::DimensionMismatch {
                expected: bounds.dim(),
                got: objective.dim(),
            });
        }

        let surrogate = GpSurrogate::new(
            GpConfig::new()
                .max_iter(config.fit_max_iter())
                .precision(config.precision()),
        );
        let optimizer = AcquisitionOptimizer::new(
            config.num_restarts(),
            config.raw_samples(),
            config.mc_samples(),
            config.precision(),
        );

        Ok(Self {
            dataset: Dataset::new(bounds.dim()),
            history: BestObservedHistory::new(),
            objective,
            bounds,
            config,
            surrogate,
            optimizer,
            warm_start: None,
            state: RunState::Init,
            iteration: 0,
        })
    }

    /// Run one stage: the initial batch, or one model-guided iteration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RunFinished`] once the run is done or has failed.
    /// Any other error marks the run as failed and is returned as is.
    pub fn step(&mut self) -> Result<IterationReport> {
        match self.state {
            RunState::Init => self.guarded(Self::initialize),
            RunState::Iterating => self.guarded(Self::iterate),
            RunState::Done | RunState::Failed => Err(Error::RunFinished),
        }
    }

    /// Step until the run is done.
    ///
    /// # Errors
    ///
    /// Returns the first error of [`step`](Self::step).
    pub fn run(&mut self) -> Result<()> {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!(
            "bo_run",
            dim = self.bounds.dim(),
            n_init = self.config.n_init(),
            n_batch = self.config.n_batch(),
            batch_size = self.config.batch_size()
        )
        .entered();

        while self.state != RunState::Done {
            self.step()?;
        }
        Ok(())
    }

    /// All observations so far, in evaluation order.
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Best-so-far value after every stage.
    pub fn history(&self) -> &BestObservedHistory {
        &self.history
    }

    /// Current state of the run.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Hyperparameters of the last surrogate fit.
    pub fn warm_start(&self) -> Option<&GpHyperparameters> {
        self.warm_start.as_ref()
    }

    /// Completed model-guided iterations.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// The best observation; ties go to the earliest.
    pub fn best(&self) -> Option<&Observation> {
        self.dataset.best_observation()
    }

    /// The search domain.
    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// The run configuration.
    pub fn config(&self) -> &BoConfig {
        &self.config
    }

    /// The objective being optimized.
    pub fn objective(&self) -> &O {
        &self.objective
    }

    /// Consume the controller, keeping its outputs.
    pub fn into_parts(self) -> (Dataset, BestObservedHistory) {
        (self.dataset, self.history)
    }

    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    fn guarded(&mut self, stage: fn(&mut Self) -> Result<IterationReport>) -> Result<IterationReport> {
        let result = stage(self);
        if let Err(e) = &result {
            self.state = RunState::Failed;
            trace_info!(iteration = self.iteration, error = %e, "run failed");
        }
        result
    }

    fn initialize(&mut self) -> Result<IterationReport> {
        let mut rng = fastrand::Rng::with_seed(self.config.seed());
        let batch = unit_cube(&mut rng, self.config.n_init(), self.bounds.dim())
            .iter()
            .map(|u| self.bounds.unnormalize(u))
            .collect::<Result<Vec<_>>>()?;

        let report = self.evaluate_and_record(batch, 0, None)?;
        self.state = if self.config.n_batch() == 0 {
            RunState::Done
        } else {
            RunState::Iterating
        };
        Ok(report)
    }

    fn iterate(&mut self) -> Result<IterationReport> {
        let iteration = self.iteration + 1;

        let x_unit = self
            .dataset
            .iter()
            .map(|o| self.bounds.normalize(&o.latent))
            .collect::<Result<Vec<_>>>()?;
        let model = self
            .surrogate
            .fit(&x_unit, &self.dataset.scores(), self.warm_start.as_ref())?;

        let best_f = self
            .dataset
            .max_score()
            .ok_or_else(|| Error::NumericalInstability("no observations to model".into()))?;
        let selection = self.optimizer.select_batch(
            &model,
            best_f,
            self.config.batch_size(),
            iteration_seed(self.config.seed(), iteration),
        )?;
        let batch = selection
            .points
            .iter()
            .map(|u| self.bounds.unnormalize(u))
            .collect::<Result<Vec<_>>>()?;

        let report = self.evaluate_and_record(batch, iteration, Some(selection.value))?;
        self.warm_start = Some(model.hyperparameters().clone());
        self.iteration = iteration;
        if iteration == self.config.n_batch() {
            self.state = RunState::Done;
            trace_info!(best = report.best_value, "run finished");
        }
        Ok(report)
    }

    /// Evaluate a domain batch and fold it into the dataset and history.
    fn evaluate_and_record(
        &mut self,
        batch: Vec<Vec<f64>>,
        iteration: usize,
        acquisition_value: Option<f64>,
    ) -> Result<IterationReport> {
        self.bounds.check_contains(&batch)?;
        let scores = self.objective.evaluate(&batch)?;
        if scores.len() != batch.len() {
            return Err(Error::Objective(format!(
                "expected {} scores, got {}",
                batch.len(),
                scores.len()
            )));
        }

        let previous = self.dataset.max_score();
        let n_new = batch.len();
        let batch_max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        self.dataset.append_batch(batch, &scores)?;
        let best_value = self.dataset.max_score().unwrap_or(batch_max);
        self.history.record(best_value);

        trace_info!(
            iteration,
            n_new,
            batch_max,
            best = best_value,
            "batch evaluated"
        );
        if previous.is_none_or(|p| best_value > p) {
            trace_info!(best = best_value, "new best value found");
        }

        Ok(IterationReport {
            iteration,
            n_new,
            best_value,
            batch_max,
            acquisition_value,
        })
    }
}

/// Per-iteration seed for the acquisition's quasi-random draws.
fn iteration_seed(seed: u64, iteration: usize) -> u64 {
    seed ^ (iteration as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objective::FnObjective;

    fn small_config(n_batch: usize) -> BoConfig {
        BoConfig::builder()
            .n_init(3)
            .batch_size(2)
            .n_batch(n_batch)
            .num_restarts(2)
            .raw_samples(16)
            .mc_samples(64)
            .fit_max_iter(30)
            .build()
            .unwrap()
    }

    fn sphere() -> FnObjective<impl Fn(&[f64]) -> f64> {
        FnObjective::new(2, |z: &[f64]| -z.iter().map(|v| v * v).sum::<f64>())
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let err = BoController::new(sphere(), Bounds::unit(3), small_config(1));
        assert!(matches!(err, Err(Error::DimensionMismatch { expected: 3, got: 2 })));
    }

    #[test]
    fn zero_dimensional_domain_is_rejected() {
        let obj = FnObjective::new(0, |_: &[f64]| 0.0);
        let err = BoController::new(obj, Bounds::unit(0), small_config(1));
        assert!(matches!(err, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn init_report_has_no_acquisition_value() {
        let mut bo = BoController::new(sphere(), Bounds::unit(2), small_config(1)).unwrap();
        let report = bo.step().unwrap();
        assert_eq!(report.iteration, 0);
        assert_eq!(report.n_new, 3);
        assert!(report.acquisition_value.is_none());
        assert_eq!(bo.state(), RunState::Iterating);

        let report = bo.step().unwrap();
        assert_eq!(report.iteration, 1);
        assert!(report.acquisition_value.is_some());
        assert_eq!(bo.state(), RunState::Done);
        assert!(bo.warm_start().is_some());
    }

    #[test]
    fn zero_iterations_finish_after_init() {
        let mut bo = BoController::new(sphere(), Bounds::unit(2), small_config(0)).unwrap();
        bo.run().unwrap();
        assert_eq!(bo.state(), RunState::Done);
        assert_eq!(bo.dataset().len(), 3);
        assert!(matches!(bo.step(), Err(Error::RunFinished)));
    }

    #[test]
    fn iteration_seeds_differ() {
        assert_ne!(iteration_seed(1, 1), iteration_seed(1, 2));
        assert_eq!(iteration_seed(7, 3), iteration_seed(7, 3));
    }
}
