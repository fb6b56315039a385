//! Error taxonomy shared by every stage of a benchmark run.
//!
//! Setup errors ([`BenchError::InvalidParameter`],
//! [`BenchError::EmbeddingUnavailable`], [`BenchError::IndexNotBuilt`])
//! abort the run. [`BenchError::AnswerFailed`] is scoped to one trial and
//! is absorbed by the trial runner. [`BenchError::NoSuccessfulTrials`] is
//! raised when a strategy has nothing left to aggregate.

use thiserror::Error;

use crate::llm::LlmError;

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("embedding model unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("vector index queried before it was built")]
    IndexNotBuilt,

    #[error("answer failed after {attempts} attempt(s): {last_error}")]
    AnswerFailed {
        attempts: u32,
        #[source]
        last_error: LlmError,
    },

    #[error("strategy '{strategy}' produced no successful trials out of {requested}")]
    NoSuccessfulTrials { strategy: String, requested: usize },
}

impl BenchError {
    /// True for the per-trial failure the runner records and skips.
    pub fn is_trial_failure(&self) -> bool {
        matches!(self, BenchError::AnswerFailed { .. })
    }
}

pub type Result<T> = std::result::Result<T, BenchError>;
