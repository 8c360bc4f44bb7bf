//! Stream transport seam.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use sitemap_types::StreamSettings;

use crate::error::TransportError;
use crate::record::{PutRecordsOutput, StreamRecord};

/// Error code the in-memory transport reports for injected record failures.
pub const THROTTLED_CODE: &str = "ProvisionedThroughputExceededException";

/// Client configuration handed to the pipeline at construction.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub stream_name: String,
    /// Simultaneous in-flight requests
    pub max_connections: usize,
    /// Resubmissions of failed records before giving up
    pub max_retries: u32,
    /// Upper bound on time spent retrying one batch
    pub max_retry_elapsed: Duration,
    /// First retry delay; later delays grow exponentially
    pub initial_retry_interval: Duration,
}

impl TransportConfig {
    pub fn new(stream_name: impl Into<String>) -> Self {
        Self::from_settings(&StreamSettings {
            stream_name: stream_name.into(),
            ..StreamSettings::default()
        })
    }

    pub fn from_settings(settings: &StreamSettings) -> Self {
        Self {
            stream_name: settings.stream_name.clone(),
            max_connections: settings.concurrency,
            max_retries: settings.max_retries,
            max_retry_elapsed: Duration::from_secs(settings.max_retry_secs),
            initial_retry_interval: Duration::from_millis(100),
        }
    }

    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_retry_interval(mut self, interval: Duration) -> Self {
        self.initial_retry_interval = interval;
        self
    }
}

/// Batch submission primitive of a stream service.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Submit a batch. `Ok` may still carry per-record failures.
    async fn put_records(
        &self,
        stream_name: &str,
        records: &[StreamRecord],
    ) -> Result<PutRecordsOutput, TransportError>;
}

/// In-process transport with scripted failures and optional latency.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    delivered: Mutex<Vec<StreamRecord>>,
    requests: Mutex<Vec<usize>>,
    failing_keys: Mutex<HashMap<String, u32>>,
    failing_requests: Mutex<u32>,
    latency: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every request by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// The next `times` submissions of records with `partition_key` fail.
    pub fn fail_key(&self, partition_key: impl Into<String>, times: u32) {
        lock(&self.failing_keys).insert(partition_key.into(), times);
    }

    /// The next `times` requests fail as a whole.
    pub fn fail_requests(&self, times: u32) {
        *lock(&self.failing_requests) = times;
    }

    /// Records accepted so far, in acceptance order.
    pub fn delivered(&self) -> Vec<StreamRecord> {
        lock(&self.delivered).clone()
    }

    /// Size of every request received, in arrival order.
    pub fn request_sizes(&self) -> Vec<usize> {
        lock(&self.requests).clone()
    }

    /// Highest number of requests observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl StreamTransport for MemoryTransport {
    async fn put_records(
        &self,
        stream_name: &str,
        records: &[StreamRecord],
    ) -> Result<PutRecordsOutput, TransportError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let result = self.accept(records);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        debug!(stream = stream_name, records = records.len(), "Memory transport request");
        result
    }
}

impl MemoryTransport {
    fn accept(&self, records: &[StreamRecord]) -> Result<PutRecordsOutput, TransportError> {
        lock(&self.requests).push(records.len());

        {
            let mut failing = lock(&self.failing_requests);
            if *failing > 0 {
                *failing -= 1;
                return Err(TransportError::Request("injected request failure".to_string()));
            }
        }

        let mut failing_keys = lock(&self.failing_keys);
        let mut delivered = lock(&self.delivered);
        let error_codes = records
            .iter()
            .map(|record| match failing_keys.get_mut(&record.partition_key) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    Some(THROTTLED_CODE.to_string())
                }
                _ => {
                    delivered.push(record.clone());
                    None
                }
            })
            .collect();
        Ok(PutRecordsOutput { error_codes })
    }
}
