//! Store error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while persisting or rehydrating the store
///
/// None of these invalidate in-memory state; they only mean a snapshot
/// did not reach (or could not be read from) session storage.
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O operation failed
    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Storage refused the write
    #[error("Storage quota exceeded for key {0}")]
    QuotaExceeded(String),

    /// Persisted snapshot was written by an incompatible version
    #[error("Unsupported snapshot version {0}")]
    UnsupportedVersion(u32),

    /// Storage lock was poisoned or not acquired in time
    #[error("Lock error: {0}")]
    Lock(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
