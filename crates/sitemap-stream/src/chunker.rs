//! Count and byte bounded batching in front of a [`BackgroundWriter`].

use std::sync::Arc;

use tracing::debug;

use sitemap_types::StreamSettings;

use crate::background::{BackgroundWriter, BatchSink, WriteReport};
use crate::error::StreamError;
use crate::record::StreamRecord;

/// Per-batch bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLimits {
    pub max_count: usize,
    /// Kept below the transport's hard per-request cap
    pub max_bytes: usize,
}

impl ChunkLimits {
    pub fn new(max_count: usize, max_bytes: usize) -> Self {
        Self {
            max_count: max_count.max(1),
            max_bytes: max_bytes.max(1),
        }
    }

    pub fn from_settings(settings: &StreamSettings) -> Self {
        Self::new(settings.max_batch_count, settings.max_batch_bytes)
    }
}

/// Accumulates records and hands full batches to a background writer.
pub struct Chunker<S: BatchSink> {
    writer: BackgroundWriter<S>,
    limits: ChunkLimits,
    buffer: Vec<StreamRecord>,
    buffer_bytes: usize,
    flushes: usize,
}

impl<S: BatchSink> Chunker<S> {
    pub fn new(sink: Arc<S>, limits: ChunkLimits, concurrency: usize) -> Self {
        Self {
            writer: BackgroundWriter::new(sink, concurrency),
            limits,
            buffer: Vec::new(),
            buffer_bytes: 0,
            flushes: 0,
        }
    }

    /// Add a record, first flushing the current batch if this record would
    /// push it past either bound. Waits while the worker pool is saturated.
    pub async fn enqueue(&mut self, record: StreamRecord) -> Result<(), StreamError> {
        let size = record.size();
        if size > self.limits.max_bytes {
            return Err(StreamError::RecordTooLarge {
                size,
                limit: self.limits.max_bytes,
            });
        }

        let over_count = self.buffer.len() + 1 > self.limits.max_count;
        let over_bytes = self.buffer_bytes + size > self.limits.max_bytes;
        if over_count || over_bytes {
            self.flush().await?;
        }

        self.buffer.push(record);
        self.buffer_bytes += size;
        Ok(())
    }

    /// Hand the buffered batch to the background writer.
    pub async fn flush(&mut self) -> Result<(), StreamError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.buffer);
        debug!(records = batch.len(), bytes = self.buffer_bytes, "Flushing batch");
        self.buffer_bytes = 0;
        self.flushes += 1;
        self.writer.send(batch).await
    }

    /// Flush what is buffered and wait for every in-flight batch.
    pub async fn drain(&mut self) -> Result<WriteReport, StreamError> {
        self.flush().await?;
        Ok(self.writer.drain().await)
    }

    /// Errors from batches that already finished.
    pub fn take_errors(&mut self) -> Vec<StreamError> {
        self.writer.take_errors()
    }

    /// Batches handed to the writer so far.
    pub fn flushes(&self) -> usize {
        self.flushes
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn buffered_bytes(&self) -> usize {
        self.buffer_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        batches: Mutex<Vec<Vec<StreamRecord>>>,
    }

    impl RecordingSink {
        fn batch_sizes(&self) -> Vec<usize> {
            self.batches.lock().unwrap().iter().map(Vec::len).collect()
        }
    }

    #[async_trait]
    impl BatchSink for RecordingSink {
        async fn write_batch(&self, batch: Vec<StreamRecord>) -> Result<(), StreamError> {
            self.batches.lock().unwrap().push(batch);
            Ok(())
        }
    }

    /// A record whose size is exactly `size` bytes.
    fn record(size: usize) -> StreamRecord {
        StreamRecord::new("k", vec![b'x'; size - 1])
    }

    #[tokio::test]
    async fn test_byte_limit_triggers_exactly_one_flush() {
        let sink = Arc::new(RecordingSink::default());
        let mut chunker = Chunker::new(Arc::clone(&sink), ChunkLimits::new(500, 100), 1);

        chunker.enqueue(record(40)).await.unwrap();
        chunker.enqueue(record(40)).await.unwrap();
        assert_eq!(chunker.flushes(), 0);

        chunker.enqueue(record(40)).await.unwrap();
        assert_eq!(chunker.flushes(), 1);
        assert_eq!(chunker.buffered(), 1);
        assert_eq!(chunker.buffered_bytes(), 40);

        let report = chunker.drain().await.unwrap();
        assert!(report.is_success());
        assert_eq!(sink.batch_sizes(), vec![2, 1]);
    }

    #[tokio::test]
    async fn test_exact_byte_fit_does_not_flush() {
        let sink = Arc::new(RecordingSink::default());
        let mut chunker = Chunker::new(Arc::clone(&sink), ChunkLimits::new(500, 100), 1);

        chunker.enqueue(record(60)).await.unwrap();
        chunker.enqueue(record(40)).await.unwrap();
        assert_eq!(chunker.flushes(), 0);
        chunker.drain().await.unwrap();
        assert_eq!(sink.batch_sizes(), vec![2]);
    }

    #[tokio::test]
    async fn test_count_limit() {
        let sink = Arc::new(RecordingSink::default());
        let mut chunker = Chunker::new(Arc::clone(&sink), ChunkLimits::new(3, 1 << 20), 2);

        for _ in 0..7 {
            chunker.enqueue(record(10)).await.unwrap();
        }
        let report = chunker.drain().await.unwrap();
        assert_eq!(report.records_written, 7);
        assert_eq!(report.batches_written, 3);

        let mut sizes = sink.batch_sizes();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![1, 3, 3]);
    }

    #[tokio::test]
    async fn test_oversized_record_rejected() {
        let sink = Arc::new(RecordingSink::default());
        let mut chunker = Chunker::new(sink, ChunkLimits::new(500, 100), 1);

        let err = chunker.enqueue(record(101)).await.unwrap_err();
        assert!(matches!(
            err,
            StreamError::RecordTooLarge {
                size: 101,
                limit: 100
            }
        ));
        assert_eq!(chunker.buffered(), 0);
    }

    #[tokio::test]
    async fn test_drain_on_empty_chunker() {
        let sink = Arc::new(RecordingSink::default());
        let mut chunker = Chunker::new(Arc::clone(&sink), ChunkLimits::new(10, 100), 1);
        let report = chunker.drain().await.unwrap();
        assert_eq!(report.batches_written, 0);
        assert!(sink.batch_sizes().is_empty());
    }
}
