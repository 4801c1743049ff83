//! Storage-specific error types.
//!
//! All storage operations return [`StorageError`] on failure, which can be
//! matched to determine the underlying cause.

use thiserror::Error;

/// Errors that can occur in the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database operation failed (sqlx error).
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem error while preparing the database location.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error (e.g., injected failure, poisoned state).
    #[error("internal error: {0}")]
    Internal(String),

    /// Invalid data in database (e.g., out-of-range timestamp).
    #[error("invalid data: {0}")]
    InvalidData(String),
}
