//! Error types for the stream write pipeline.

use thiserror::Error;

/// Failure of a whole transport request.
///
/// Per-record failures are not errors; they are reported in
/// [`PutRecordsOutput`](crate::PutRecordsOutput).
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    /// Request could not be delivered or was rejected as a whole
    #[error("Transport request failed: {0}")]
    Request(String),

    /// Transport asked the caller to slow down
    #[error("Transport throttled: {0}")]
    Throttled(String),
}

/// Errors surfaced by the write pipeline
#[derive(Error, Debug)]
pub enum StreamError {
    /// Transport failed and was not retried
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Records still failing after every resubmission
    #[error("{failed} records still failing after {attempts} attempts")]
    RetriesExhausted { failed: usize, attempts: u32 },

    /// A single record exceeds the per-batch byte limit
    #[error("Record of {size} bytes exceeds batch limit of {limit} bytes")]
    RecordTooLarge { size: usize, limit: usize },

    /// Background task panicked or was cancelled
    #[error("Background task failed: {0}")]
    Background(String),

    /// Worker pool shut down
    #[error("Background writer closed")]
    Closed,
}
