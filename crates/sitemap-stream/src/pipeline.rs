//! Chunker, background writer and retrier composed over a stream transport.

use std::sync::Arc;

use tracing::info;

use sitemap_types::StreamSettings;

use crate::background::WriteReport;
use crate::chunker::{ChunkLimits, Chunker};
use crate::error::StreamError;
use crate::record::StreamRecord;
use crate::retrier::Retrier;
use crate::transport::{StreamTransport, TransportConfig};

/// Write path from discrete records to a stream transport.
///
/// Callers must [`drain`](WritePipeline::drain) before exiting; records
/// still buffered or in flight are otherwise lost.
pub struct WritePipeline {
    chunker: Chunker<Retrier>,
    stream_name: String,
}

impl WritePipeline {
    pub fn new(
        transport: Arc<dyn StreamTransport>,
        config: TransportConfig,
        limits: ChunkLimits,
    ) -> Self {
        let stream_name = config.stream_name.clone();
        let concurrency = config.max_connections;
        let retrier = Arc::new(Retrier::new(transport, config));
        Self {
            chunker: Chunker::new(retrier, limits, concurrency),
            stream_name,
        }
    }

    pub fn from_settings(transport: Arc<dyn StreamTransport>, settings: &StreamSettings) -> Self {
        Self::new(
            transport,
            TransportConfig::from_settings(settings),
            ChunkLimits::from_settings(settings),
        )
    }

    /// Queue one record. Waits while the pipeline is saturated.
    pub async fn enqueue(
        &mut self,
        partition_key: impl Into<String>,
        payload: Vec<u8>,
    ) -> Result<(), StreamError> {
        self.chunker
            .enqueue(StreamRecord::new(partition_key, payload))
            .await
    }

    /// Errors from batches that already finished. Poll this to notice
    /// failures before [`drain`](WritePipeline::drain).
    pub fn take_errors(&mut self) -> Vec<StreamError> {
        self.chunker.take_errors()
    }

    /// Flush everything and wait until every batch has been delivered or failed.
    pub async fn drain(&mut self) -> Result<WriteReport, StreamError> {
        let report = self.chunker.drain().await?;
        info!(
            stream = %self.stream_name,
            batches = report.batches_written,
            records = report.records_written,
            errors = report.errors.len(),
            "Write pipeline drained"
        );
        Ok(report)
    }

    pub fn flushes(&self) -> usize {
        self.chunker.flushes()
    }
}
