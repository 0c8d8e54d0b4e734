#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::Precision;

/// Settings of a Bayesian optimization run.
///
/// Build one with [`BoConfig::builder`]; [`BoConfig::default`] gives the
/// defaults listed there.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BoConfig {
    n_init: usize,
    batch_size: usize,
    n_batch: usize,
    num_restarts: usize,
    raw_samples: usize,
    mc_samples: usize,
    seed: u64,
    precision: Precision,
    fit_max_iter: usize,
}

impl BoConfig {
    /// Start building a configuration.
    #[must_use]
    pub fn builder() -> BoConfigBuilder {
        BoConfigBuilder::new()
    }

    /// Number of random points evaluated before the model-guided loop.
    #[must_use]
    pub fn n_init(&self) -> usize {
        self.n_init
    }

    /// Points proposed per iteration.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of model-guided iterations.
    #[must_use]
    pub fn n_batch(&self) -> usize {
        self.n_batch
    }

    /// Candidate batches refined by L-BFGS per iteration.
    #[must_use]
    pub fn num_restarts(&self) -> usize {
        self.num_restarts
    }

    /// Quasi-random candidate batches screened per iteration.
    #[must_use]
    pub fn raw_samples(&self) -> usize {
        self.raw_samples
    }

    /// Monte Carlo base samples of the acquisition.
    #[must_use]
    pub fn mc_samples(&self) -> usize {
        self.mc_samples
    }

    /// Seed of every random draw in the run.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Numerical precision of the networks and the numerics.
    #[must_use]
    pub fn precision(&self) -> Precision {
        self.precision
    }

    /// L-BFGS iterations per surrogate fit.
    #[must_use]
    pub fn fit_max_iter(&self) -> usize {
        self.fit_max_iter
    }

    /// Total number of observations a finished run holds.
    #[must_use]
    pub fn total_evaluations(&self) -> usize {
        self.n_init + self.n_batch * self.batch_size
    }

    /// Check every setting is in range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] naming the first offending setting.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("n_init", self.n_init),
            ("batch_size", self.batch_size),
            ("num_restarts", self.num_restarts),
            ("raw_samples", self.raw_samples),
            ("mc_samples", self.mc_samples),
            ("fit_max_iter", self.fit_max_iter),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(Error::InvalidConfig(format!("{name} must be at least 1")));
        }
        if self.raw_samples < self.num_restarts {
            return Err(Error::InvalidConfig(format!(
                "raw_samples ({}) must be at least num_restarts ({})",
                self.raw_samples, self.num_restarts
            )));
        }
        Ok(())
    }
}

impl Default for BoConfig {
    fn default() -> Self {
        Self {
            n_init: 5,
            batch_size: 3,
            n_batch: 25,
            num_restarts: 10,
            raw_samples: 256,
            mc_samples: 2048,
            seed: 1,
            precision: Precision::Double,
            fit_max_iter: 200,
        }
    }
}

/// A builder for [`BoConfig`].
///
/// # Defaults
///
/// | Setting | Default |
/// |---------|---------|
/// | `n_init` | 5 |
/// | `batch_size` | 3 |
/// | `n_batch` | 25 |
/// | `num_restarts` | 10 |
/// | `raw_samples` | 256 |
/// | `mc_samples` | 2048 |
/// | `seed` | 1 |
/// | `precision` | [`Precision::Double`] |
/// | `fit_max_iter` | 200 |
///
/// # Examples
///
/// ```
/// use latent_bo::controller::BoConfig;
///
/// let config = BoConfig::builder().n_init(4).batch_size(2).n_batch(3).build().unwrap();
/// assert_eq!(config.total_evaluations(), 10);
///
/// assert!(BoConfig::builder().batch_size(0).build().is_err());
/// ```
#[derive(Clone, Debug, Default)]
pub struct BoConfigBuilder {
    config: BoConfig,
}

impl BoConfigBuilder {
    /// Create a builder holding the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of random initial points.
    #[must_use]
    pub fn n_init(mut self, n: usize) -> Self {
        self.config.n_init = n;
        self
    }

    /// Set the number of points per iteration.
    #[must_use]
    pub fn batch_size(mut self, q: usize) -> Self {
        self.config.batch_size = q;
        self
    }

    /// Set the number of model-guided iterations.
    #[must_use]
    pub fn n_batch(mut self, n: usize) -> Self {
        self.config.n_batch = n;
        self
    }

    /// Set the number of L-BFGS restarts.
    #[must_use]
    pub fn num_restarts(mut self, n: usize) -> Self {
        self.config.num_restarts = n;
        self
    }

    /// Set the number of screened raw candidates.
    #[must_use]
    pub fn raw_samples(mut self, n: usize) -> Self {
        self.config.raw_samples = n;
        self
    }

    /// Set the number of Monte Carlo base samples.
    #[must_use]
    pub fn mc_samples(mut self, n: usize) -> Self {
        self.config.mc_samples = n;
        self
    }

    /// Set the run seed.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Set the numerical precision.
    #[must_use]
    pub fn precision(mut self, precision: Precision) -> Self {
        self.config.precision = precision;
        self
    }

    /// Set the L-BFGS iteration cap of each surrogate fit.
    #[must_use]
    pub fn fit_max_iter(mut self, n: usize) -> Self {
        self.config.fit_max_iter = n;
        self
    }

    /// Validate and return the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if a setting is out of range.
    pub fn build(self) -> Result<BoConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
