//! Error types for the latency aggregation engine.

use thiserror::Error;

/// Result alias for aggregate store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// The aggregate store is unreachable or rejected a command.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis: {0}")]
    Redis(String),

    #[error("corrupt value at {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("commit interrupted: {0}")]
    Interrupted(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        Self::Redis(e.to_string())
    }
}

/// A client-supplied payload could not be accepted.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid settings: {0}")]
    Settings(String),

    #[error("invalid sample: {0}")]
    Sample(&'static str),
}

/// Anything an administrative operation can fail with.
#[derive(Debug, Error)]
pub enum LatencyError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}
