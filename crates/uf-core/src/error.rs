//! Error types for the unfolding harness

use thiserror::Error;

/// Harness error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid or inconsistent run configuration. Fatal: aborts the run before any trial.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The algorithm under test failed for one trial (non-convergence, singular matrix, ...).
    #[error("Unfolding failure: {0}")]
    Unfolding(String),

    /// The algorithm under test exceeded its deadline.
    #[error("Unfolding timeout: {0}")]
    Timeout(String),

    /// Contract violation on a stateful object (e.g. accumulating into a finalized aggregator).
    #[error("State error: {0}")]
    State(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Computation error
    #[error("Computation error: {0}")]
    Computation(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
