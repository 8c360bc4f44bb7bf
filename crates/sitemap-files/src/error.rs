//! Error types for bounded files.

use sitemap_storage::StorageError;
use thiserror::Error;

use crate::bounded::FileState;

/// Errors that can occur while building, loading or persisting files
#[derive(Error, Debug)]
pub enum FileError {
    /// No capacity left at all; recoverable by rotating
    #[error("Sitemap already full: {filename}")]
    AlreadyFull { filename: String },

    /// The entry does not fit in the remaining capacity; recoverable by rotating
    #[error("Write would overflow {filename}: {byte_size} + {entry_bytes} bytes > {limit_bytes}")]
    WriteWouldOverflow {
        filename: String,
        byte_size: usize,
        entry_bytes: usize,
        limit_bytes: usize,
    },

    /// Operation not allowed in the file's current lifecycle state
    #[error("Cannot {op} {filename} in state {state}")]
    InvalidState {
        op: &'static str,
        filename: String,
        state: FileState,
    },

    /// Staging file IO failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Document is not well-formed or has the wrong shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// Blob store failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl FileError {
    /// Whether this error is cured by rotating to a fresh file.
    pub fn is_capacity(&self) -> bool {
        matches!(
            self,
            FileError::AlreadyFull { .. } | FileError::WriteWouldOverflow { .. }
        )
    }
}

impl From<roxmltree::Error> for FileError {
    fn from(err: roxmltree::Error) -> Self {
        FileError::Parse(err.to_string())
    }
}
