//! Error types for index merging, item writing and repair.

use sitemap_files::FileError;
use sitemap_storage::StorageError;
use sitemap_stream::StreamError;
use thiserror::Error;

/// Errors that can occur while materializing sitemap and index files
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Blob or state store failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Bounded file operation failed
    #[error("File error: {0}")]
    File(#[from] FileError),

    /// Emitting change messages failed
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    /// Input batch cannot be processed at all; the whole invocation fails
    #[error("Fatal batch error: {0}")]
    FatalBatch(String),

    /// JSON encoding/decoding errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for IndexingError {
    fn from(err: serde_json::Error) -> Self {
        IndexingError::Serialization(err.to_string())
    }
}
