//! Fatal errors for a proxy ranking run
//!
//! Failures of individual probes are not errors; they are recorded as
//! [`ErrorKind`](crate::proxy::ErrorKind) values inside the results.

use thiserror::Error;

/// Result type for proxy ranking operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a run
#[derive(Debug, Error)]
pub enum Error {
    /// Timeout, concurrency or target list is unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Failed to parse TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// Snapshot serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// An evaluation task panicked or was cancelled by the runtime
    #[error("Evaluation worker failed: {0}")]
    Worker(String),
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Worker(err.to_string())
    }
}

impl From<tokio::sync::AcquireError> for Error {
    fn from(err: tokio::sync::AcquireError) -> Self {
        Error::Worker(err.to_string())
    }
}
