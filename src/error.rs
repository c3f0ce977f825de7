//! Error types for Warden.

use thiserror::Error;

/// Main error type for Warden operations.
#[derive(Error, Debug)]
pub enum LimitError {
    /// The key-value store could not be reached, timed out, or rejected a command
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// A stored value did not parse as the expected numeric shape
    #[error("Malformed state at {key}: {value:?}")]
    MalformedState { key: String, value: String },

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<redis::RedisError> for LimitError {
    fn from(err: redis::RedisError) -> Self {
        LimitError::StoreUnavailable(err.to_string())
    }
}

impl From<config::ConfigError> for LimitError {
    fn from(err: config::ConfigError) -> Self {
        LimitError::Config(err.to_string())
    }
}

/// Result type alias for Warden operations.
pub type Result<T> = std::result::Result<T, LimitError>;
