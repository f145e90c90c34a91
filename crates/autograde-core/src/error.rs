//! Error types shared across the autograde crates.
//!
//! `ProviderError` is defined here rather than in `autograde-providers` so the
//! pipeline can downcast provider failures and decide whether to retry without
//! string matching.

use thiserror::Error;

use crate::model::GradeLetter;

/// Errors that can occur when interacting with an evaluator provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The API returned a 429 rate limit response.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Authentication failed (invalid API key).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The requested model was not found.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The API returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),
}

impl ProviderError {
    /// Returns `true` if this error is permanent and should not be retried.
    pub fn is_permanent(&self) -> bool {
        match self {
            ProviderError::AuthenticationFailed(_) | ProviderError::ModelNotFound(_) => true,
            // Client errors other than rate limiting will fail the same way again.
            ProviderError::ApiError { status, .. } => (400..500).contains(status),
            _ => false,
        }
    }

    /// Returns the retry-after delay in milliseconds, if applicable.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            ProviderError::RateLimited { retry_after_ms } => Some(*retry_after_ms),
            _ => None,
        }
    }
}

/// Errors surfaced by the grading pipeline.
#[derive(Debug, Error)]
pub enum GradeError {
    /// No extraction strategy found a single question-answer pair.
    #[error("No question-answer pairs found in the document")]
    NoPairsFound,
}

/// Rejected grade threshold configurations.
#[derive(Debug, Error, PartialEq)]
pub enum ThresholdError {
    #[error("grade thresholds must not be empty")]
    Empty,

    #[error("N/A is reserved for ungradable documents and cannot have a threshold")]
    ReservedLetter,

    #[error("threshold for {letter} is {minimum}, expected a value between 0 and 100")]
    OutOfRange { letter: GradeLetter, minimum: f64 },

    #[error("grade {0} appears more than once")]
    DuplicateLetter(GradeLetter),

    #[error("two grades share the minimum {0}")]
    DuplicateMinimum(f64),

    #[error("lowest threshold is {0}, percentages below it would have no grade")]
    Uncovered(f64),
}
