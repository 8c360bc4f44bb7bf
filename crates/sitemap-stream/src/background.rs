//! Bounded-concurrency background delivery of batches.
//!
//! [`BackgroundWriter::send`] returns once a batch is handed to a worker,
//! not once it is delivered. Outcomes are collected into a [`WriteReport`]
//! that callers poll with [`BackgroundWriter::take_errors`] or collect with
//! [`BackgroundWriter::drain`].

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, warn};

use crate::error::StreamError;
use crate::record::StreamRecord;

/// Destination for whole batches.
#[async_trait]
pub trait BatchSink: Send + Sync + 'static {
    async fn write_batch(&self, batch: Vec<StreamRecord>) -> Result<(), StreamError>;
}

/// Outcome of background deliveries.
#[derive(Debug, Default)]
pub struct WriteReport {
    pub batches_written: usize,
    pub records_written: usize,
    pub errors: Vec<StreamError>,
}

impl WriteReport {
    pub fn record_success(&mut self, records: usize) {
        self.batches_written += 1;
        self.records_written += records;
    }

    pub fn record_error(&mut self, error: StreamError) {
        self.errors.push(error);
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Runs batch deliveries on a bounded worker pool.
pub struct BackgroundWriter<S: BatchSink> {
    sink: Arc<S>,
    permits: Arc<Semaphore>,
    tasks: JoinSet<Result<usize, StreamError>>,
    report: WriteReport,
}

impl<S: BatchSink> BackgroundWriter<S> {
    /// `concurrency` is clamped to at least 1.
    pub fn new(sink: Arc<S>, concurrency: usize) -> Self {
        Self {
            sink,
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
            tasks: JoinSet::new(),
            report: WriteReport::default(),
        }
    }

    /// Queue a batch, waiting while every worker is busy.
    pub async fn send(&mut self, batch: Vec<StreamRecord>) -> Result<(), StreamError> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| StreamError::Closed)?;
        self.reap();

        let sink = Arc::clone(&self.sink);
        let records = batch.len();
        debug!(records, in_flight = self.tasks.len(), "Dispatching batch");
        self.tasks.spawn(async move {
            let _permit = permit;
            sink.write_batch(batch).await.map(|()| records)
        });
        Ok(())
    }

    /// Errors from finished deliveries, without waiting on running ones.
    pub fn take_errors(&mut self) -> Vec<StreamError> {
        self.reap();
        std::mem::take(&mut self.report.errors)
    }

    /// Deliveries queued but not yet finished.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for every queued delivery and return everything not yet taken.
    pub async fn drain(&mut self) -> WriteReport {
        while let Some(result) = self.tasks.join_next().await {
            self.record(result);
        }
        std::mem::take(&mut self.report)
    }

    fn reap(&mut self) {
        while let Some(result) = self.tasks.try_join_next() {
            self.record(result);
        }
    }

    fn record(&mut self, result: Result<Result<usize, StreamError>, JoinError>) {
        match result {
            Ok(Ok(records)) => self.report.record_success(records),
            Ok(Err(e)) => {
                warn!(error = %e, "Background batch failed");
                self.report.record_error(e);
            }
            Err(e) => {
                warn!(error = %e, "Background task aborted");
                self.report.record_error(StreamError::Background(e.to_string()));
            }
        }
    }
}
