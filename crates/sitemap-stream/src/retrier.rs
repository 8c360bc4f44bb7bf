//! Partial-failure resubmission.

use std::sync::Arc;

use async_trait::async_trait;
use backoff::{backoff::Backoff, ExponentialBackoff};
use tracing::{debug, error, warn};

use crate::background::BatchSink;
use crate::error::StreamError;
use crate::record::StreamRecord;
use crate::transport::{StreamTransport, TransportConfig};

/// Wraps a transport's batch submission with retry of failed records only.
pub struct Retrier {
    transport: Arc<dyn StreamTransport>,
    config: TransportConfig,
}

impl Retrier {
    pub fn new(transport: Arc<dyn StreamTransport>, config: TransportConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Submit `records`, resubmitting exactly the failed subset until all
    /// succeed or retries run out. Returns the number of attempts made.
    ///
    /// Resubmitted records keep their partition keys and relative order.
    pub async fn put_records(&self, records: Vec<StreamRecord>) -> Result<u32, StreamError> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut backoff = ExponentialBackoff {
            current_interval: self.config.initial_retry_interval,
            initial_interval: self.config.initial_retry_interval,
            max_elapsed_time: Some(self.config.max_retry_elapsed),
            ..Default::default()
        };

        let mut pending = records;
        let mut attempts = 0;

        loop {
            attempts += 1;
            debug!(attempt = attempts, records = pending.len(), "Submitting batch");

            pending = match self
                .transport
                .put_records(&self.config.stream_name, &pending)
                .await
            {
                Ok(output) => {
                    let failed = output.failed_subset(&pending);
                    if failed.is_empty() {
                        return Ok(attempts);
                    }
                    warn!(
                        attempt = attempts,
                        failed = failed.len(),
                        submitted = pending.len(),
                        "Partial batch failure"
                    );
                    failed
                }
                Err(e) => {
                    warn!(attempt = attempts, error = %e, "Batch request failed");
                    pending
                }
            };

            if attempts > self.config.max_retries {
                error!(failed = pending.len(), attempts, "Max retries exceeded");
                return Err(StreamError::RetriesExhausted {
                    failed: pending.len(),
                    attempts,
                });
            }

            match backoff.next_backoff() {
                Some(duration) => {
                    debug!(retry_in_ms = duration.as_millis(), "Retrying failed records");
                    tokio::time::sleep(duration).await;
                }
                None => {
                    error!(failed = pending.len(), attempts, "Backoff exhausted");
                    return Err(StreamError::RetriesExhausted {
                        failed: pending.len(),
                        attempts,
                    });
                }
            }
        }
    }
}

#[async_trait]
impl BatchSink for Retrier {
    async fn write_batch(&self, batch: Vec<StreamRecord>) -> Result<(), StreamError> {
        self.put_records(batch).await.map(|_| ())
    }
}
