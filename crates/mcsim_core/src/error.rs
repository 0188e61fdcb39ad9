use thiserror::Error;

use crate::model::Family;

/// Boxed error returned by user models.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while configuring or running a simulation.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid {family} parameters: {reason}")]
    InvalidDistributionParams { family: Family, reason: String },

    #[error("unsupported distribution: {0}")]
    UnsupportedDistribution(String),

    #[error("no distribution could be fitted to the data: {0}")]
    NoFittableDistribution(String),

    #[error("invalid correlation matrix: {0}")]
    InvalidCorrelationMatrix(String),

    #[error("simulation requires at least one input variable")]
    NoInputVariables,

    #[error("input variable {0:?} is defined more than once")]
    DuplicateVariable(String),

    #[error("model evaluation failed in chunk {chunk}: {source}")]
    ModelEvaluation {
        chunk: usize,
        #[source]
        source: BoxError,
    },

    #[error("cannot summarize an empty result set")]
    EmptyResultSet,

    /// Engine or stopping-rule settings out of range: zero iterations,
    /// zero workers, or a zero check interval or window
    #[error("configuration error: {0}")]
    InvalidConfig(String),

    /// The worker pool could not be started
    #[error("failed to build worker pool: {0}")]
    WorkerPool(String),
}

impl SimError {
    pub(crate) fn invalid_params(family: Family, reason: impl Into<String>) -> Self {
        SimError::InvalidDistributionParams {
            family,
            reason: reason.into(),
        }
    }

    pub(crate) fn model(chunk: usize, source: impl Into<BoxError>) -> Self {
        SimError::ModelEvaluation {
            chunk,
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SimError>;
