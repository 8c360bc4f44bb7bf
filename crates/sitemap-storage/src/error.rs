//! Storage layer error types.

use thiserror::Error;

/// Errors that can occur in the storage layer
#[derive(Error, Debug)]
pub enum StorageError {
    /// Filesystem operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Key escapes the store root or is otherwise unusable
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Backend rejected or failed the request
    #[error("Backend error: {0}")]
    Backend(String),
}
