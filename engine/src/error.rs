//! Error handling for the fare deal engine
//!
//! Fetch failures are retried and finally downgraded to "no results" by the
//! orchestrator, persistence failures degrade to in-memory state, and malformed
//! observations are dropped one at a time. Only an invalid job surfaces to the
//! caller of a search.

use shared::ValidationError;
use thiserror::Error;

/// Engine error types
#[derive(Error, Debug)]
pub enum EngineError {
    // Fetch errors
    #[error("Fare fetch failed: {0}")]
    Fetch(String),

    #[error("Fare fetch timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Fare source returned {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    // Persistence errors
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Input errors
    #[error("Malformed observation: {0}")]
    MalformedObservation(#[from] ValidationError),

    #[error("Invalid search job: {0}")]
    InvalidJob(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Search cancelled")]
    Cancelled,
}

impl EngineError {
    /// Whether another attempt at the same query could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Fetch(_) | EngineError::Timeout { .. } => true,
            EngineError::UpstreamStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<config::ConfigError> for EngineError {
    fn from(err: config::ConfigError) -> Self {
        EngineError::Configuration(err.to_string())
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
