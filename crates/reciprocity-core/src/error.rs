//! Error types for the reciprocity matching engine.

use thiserror::Error;

/// Result type alias using the engine's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for matching, storage and notification operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Profile not found
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    /// Embedding generation failed
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Vector index query or write failed
    #[error("Vector index error: {0}")]
    VectorIndex(String),

    /// Match store or notification ledger operation failed
    #[error("Store error: {0}")]
    Store(String),

    /// Outbound notification delivery failed
    #[error("Notification error: {0}")]
    Notification(String),

    /// A bounded operation did not complete in time
    #[error("Timeout: {operation} exceeded {after_ms}ms")]
    Timeout { operation: String, after_ms: u64 },

    /// The run was cancelled before the work was done
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the failure is expected to clear up on a later cycle.
    ///
    /// Transient failures skip the affected user for the current run and
    /// leave its "needs matching" flag in place so the next sweep retries.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Database(_)
                | Error::VectorIndex(_)
                | Error::Store(_)
                | Error::Timeout { .. }
                | Error::Cancelled(_)
                | Error::Request(_)
                | Error::Notification(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout {
                operation: "http_request".to_string(),
                after_ms: 0,
            }
        } else {
            Error::Request(e.to_string())
        }
    }
}
