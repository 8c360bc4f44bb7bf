//! Stream pipeline E2E tests.
//!
//! Connects the item writer to the index merger through a WritePipeline
//! over an in-memory transport, and checks batching backpressure.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;

use e2e_tests::{item_message, TestHarness};
use sitemap_indexing::IndexEventSink;
use sitemap_stream::{ChunkLimits, MemoryTransport, TransportConfig, WritePipeline};

fn config() -> TransportConfig {
    TransportConfig::new("sitemap-index")
        .with_max_connections(2)
        .with_initial_retry_interval(Duration::from_millis(1))
}

#[tokio::test]
async fn test_writer_to_merger_through_stream() {
    let harness = TestHarness::with_settings(|s| s.limit_count = 2);
    let transport = Arc::new(MemoryTransport::new());
    let mut pipeline = WritePipeline::new(transport.clone(), config(), ChunkLimits::new(2, 1 << 20));

    let items = (1..=5).map(|i| item_message("widget", i)).collect();
    let written = harness.writer().write_batch(items, &mut pipeline).await;
    pipeline.finish().await.unwrap();
    assert!(written.is_success());

    let delivered = transport.delivered();
    assert_eq!(delivered.len(), 3);
    assert!(delivered.iter().all(|r| r.partition_key == "widget"));

    let records: Vec<Vec<u8>> = delivered.into_iter().map(|r| r.payload).collect();
    let merged = harness.merger().handle_records(&records).await.unwrap();
    assert_eq!(merged.by_type["widget"].written, 3);
    assert_eq!(harness.index_entries("widget").len(), 3);
}

#[tokio::test]
async fn test_byte_limit_triggers_exactly_one_flush() {
    let transport = Arc::new(MemoryTransport::new());
    // Each record is 1 key byte + 39 payload bytes.
    let mut pipeline = WritePipeline::new(transport.clone(), config(), ChunkLimits::new(100, 100));

    pipeline.enqueue("k", vec![b'a'; 39]).await.unwrap();
    pipeline.enqueue("k", vec![b'b'; 39]).await.unwrap();
    assert_eq!(pipeline.flushes(), 0);

    pipeline.enqueue("k", vec![b'c'; 39]).await.unwrap();
    assert_eq!(pipeline.flushes(), 1);

    let report = pipeline.drain().await.unwrap();
    assert!(report.is_success());
    assert_eq!(report.records_written, 3);
    assert_eq!(transport.request_sizes(), vec![2, 1]);
}

#[tokio::test]
async fn test_partial_failures_are_retried() {
    let harness = TestHarness::new();
    let transport = Arc::new(MemoryTransport::new());
    transport.fail_key("image", 2);
    let mut pipeline = WritePipeline::new(transport.clone(), config(), ChunkLimits::new(10, 1 << 20));

    let items = vec![item_message("image", 1), item_message("video", 1)];
    harness.writer().write_batch(items, &mut pipeline).await;
    pipeline.finish().await.unwrap();

    let mut keys: Vec<String> = transport
        .delivered()
        .into_iter()
        .map(|r| r.partition_key)
        .collect();
    keys.sort();
    assert_eq!(keys, vec!["image", "video"]);
}
