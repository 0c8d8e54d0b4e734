#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when pretrained weights cannot be located or loaded.
    ///
    /// Covers an unresolvable weights directory, missing files, missing
    /// tensors, and tensors with an unexpected shape or dtype.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Returned when fitting the surrogate model fails.
    ///
    /// The kernel matrix could not be factorized even with jitter, or the
    /// marginal likelihood became non-finite from every starting point.
    #[error("numerical instability: {0}")]
    NumericalInstability(String),

    /// Returned when the acquisition optimizer cannot produce a batch.
    #[error("acquisition optimization failed: {0}")]
    OptimizationFailure(String),

    /// Returned when a candidate lies outside the declared bounds after
    /// mapping it back from the unit cube.
    #[error(
        "domain violation: candidate {index} has z[{dim}] = {value} outside [{low}, {high}]"
    )]
    DomainViolation {
        /// Index of the offending candidate within its batch.
        index: usize,
        /// The offending dimension.
        dim: usize,
        /// The offending value.
        value: f64,
        /// Lower bound of that dimension.
        low: f64,
        /// Upper bound of that dimension.
        high: f64,
    },

    /// Returned when the lower bound is greater than the upper bound.
    #[error("invalid bounds: low ({low}) must be less than or equal to high ({high})")]
    InvalidBounds {
        /// The lower bound value.
        low: f64,
        /// The upper bound value.
        high: f64,
    },

    /// Returned when a vector does not have the expected dimension.
    #[error("dimension mismatch: expected {expected} values but got {got}")]
    DimensionMismatch {
        /// The expected number of dimensions.
        expected: usize,
        /// The actual number of dimensions.
        got: usize,
    },

    /// Returned when a run configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Returned when the objective fails or returns an unusable result.
    #[error("objective error: {0}")]
    Objective(String),

    /// Returned when stepping a run that has already finished or failed.
    #[error("run already finished")]
    RunFinished,

    /// Returned when writing an export fails.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = core::result::Result<T, Error>;

impl Error {
    /// Shorthand for [`Error::Configuration`].
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
