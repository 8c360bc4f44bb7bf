//! Item writer E2E tests.
//!
//! Runs the write -> merge loop: the writer places items into rotating
//! sitemap files and announces them, the merger folds the announcements
//! into the index, and the next write resumes from what the index lists.

use std::collections::HashSet;

use pretty_assertions::assert_eq;

use e2e_tests::{item_message, sitemap_url, TestHarness};
use sitemap_indexing::CollectingSink;
use sitemap_storage::StateStore;
use sitemap_types::{FileStatus, IndexAction, ItemStatus};

#[tokio::test]
async fn test_rotation_produces_ceil_n_over_k_files() {
    let harness = TestHarness::with_settings(|s| s.limit_count = 3);
    let items = (1..=7).map(|i| item_message("widget", i)).collect();

    let (written, merged, emitted) = harness.write_and_merge(items).await;

    let result = &written.by_type["widget"];
    assert_eq!(result.written, 7);
    assert_eq!(
        result.files_written,
        vec!["widget-00001.xml", "widget-00002.xml", "widget-00003.xml"]
    );
    assert_eq!(emitted.len(), 3);
    assert!(emitted.iter().all(|m| m.action == IndexAction::Add));
    assert_eq!(merged.by_type["widget"].written, 3);

    let index = harness.index_entries("widget");
    let distinct: HashSet<&str> = index.iter().map(|e| e.filename()).collect();
    assert_eq!(distinct.len(), 3);
    for entry in &index {
        assert!(harness.sitemap_entries("widget", entry.filename()).len() <= 3);
    }
    assert_eq!(harness.sitemap_entries("widget", "widget-00003.xml").len(), 1);
    assert!(harness.staging_is_empty());
}

#[tokio::test]
async fn test_second_write_resumes_latest_file() {
    let harness = TestHarness::with_settings(|s| s.limit_count = 3);
    harness
        .write_and_merge((1..=2).map(|i| item_message("widget", i)).collect())
        .await;

    let (written, merged, emitted) = harness
        .write_and_merge((3..=5).map(|i| item_message("widget", i)).collect())
        .await;

    let result = &written.by_type["widget"];
    assert_eq!(result.resumed.as_deref(), Some("widget-00001.xml"));
    assert_eq!(result.files_written, vec!["widget-00001.xml", "widget-00002.xml"]);

    let actions: Vec<(IndexAction, String)> = emitted
        .iter()
        .map(|m| (m.action, m.index_item.url.clone()))
        .collect();
    assert_eq!(
        actions,
        vec![
            (IndexAction::Add, sitemap_url("widget", "widget-00002.xml")),
            (IndexAction::Update, sitemap_url("widget", "widget-00001.xml")),
        ]
    );
    assert!(emitted[1].index_item.lastmod.is_some());
    assert_eq!(merged.by_type["widget"].written, 2);

    let first: Vec<String> = harness
        .sitemap_entries("widget", "widget-00001.xml")
        .into_iter()
        .map(|e| e.url)
        .collect();
    assert_eq!(
        first,
        vec![
            "https://ex.com/widget/1",
            "https://ex.com/widget/2",
            "https://ex.com/widget/3"
        ]
    );

    let record = harness.state.get_item("widget", "3").await.unwrap().unwrap();
    assert_eq!(record.file_name, "widget-00001.xml");
    let record = harness.state.get_item("widget", "5").await.unwrap().unwrap();
    assert_eq!(record.file_name, "widget-00002.xml");
}

#[tokio::test]
async fn test_full_latest_file_starts_next_ordinal() {
    let harness = TestHarness::with_settings(|s| s.limit_count = 2);
    harness
        .write_and_merge((1..=2).map(|i| item_message("widget", i)).collect())
        .await;

    let (written, _, emitted) = harness
        .write_and_merge(vec![item_message("widget", 3)])
        .await;

    let result = &written.by_type["widget"];
    assert!(result.resumed.is_none());
    assert_eq!(result.files_written, vec!["widget-00002.xml"]);
    assert_eq!(emitted.len(), 1);
    assert_eq!(emitted[0].action, IndexAction::Add);
    assert_eq!(harness.index_entries("widget").len(), 2);
}

#[tokio::test]
async fn test_rewriting_written_items_is_a_no_op() {
    let harness = TestHarness::new();
    let items: Vec<_> = (1..=3).map(|i| item_message("widget", i)).collect();
    harness.write_and_merge(items.clone()).await;
    let before = harness.body(&harness.sitemap_key("widget", "widget-00001.xml"));

    let (written, merged, emitted) = harness.write_and_merge(items).await;

    let result = &written.by_type["widget"];
    assert_eq!(result.skipped, 3);
    assert_eq!(result.written, 0);
    assert!(result.files_written.is_empty());
    assert!(emitted.is_empty());
    assert!(merged.by_type.is_empty());
    assert_eq!(harness.body(&harness.sitemap_key("widget", "widget-00001.xml")), before);
}

#[tokio::test]
async fn test_duplicate_messages_in_batch_are_compacted() {
    let harness = TestHarness::new();
    let mut latest = item_message("widget", 1);
    latest.sitemap_item = latest.sitemap_item.with_lastmod("2024-05-01T00:00:00.000Z");

    let (written, _, _) = harness
        .write_and_merge(vec![item_message("widget", 1), item_message("widget", 2), latest])
        .await;

    assert_eq!(written.compacted, 1);
    let entries = harness.sitemap_entries("widget", "widget-00001.xml");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].lastmod.as_deref(), Some("2024-05-01T00:00:00.000Z"));
}

#[tokio::test]
async fn test_state_records_ownership() {
    let harness = TestHarness::with_settings(|s| s.limit_count = 2);
    harness
        .write_and_merge((1..=3).map(|i| item_message("widget", i)).collect())
        .await;

    let owned = harness
        .state
        .items_for_file("widget", "widget-00001.xml")
        .await
        .unwrap();
    let ids: Vec<&str> = owned.iter().map(|r| r.item_id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2"]);
    assert!(owned.iter().all(|r| r.item_status == ItemStatus::Written));

    let files = harness.state.file_records();
    let counts: Vec<(String, u64)> = files
        .iter()
        .map(|f| (f.file_name.clone(), f.count_written))
        .collect();
    assert_eq!(
        counts,
        vec![
            ("widget-00001.xml".to_string(), 2),
            ("widget-00002.xml".to_string(), 1)
        ]
    );
    assert!(files.iter().all(|f| f.file_status == FileStatus::Written));
}

#[tokio::test]
async fn test_sharded_type_uses_shard_root() {
    let harness = TestHarness::with_settings(|s| s.shard_id = Some(1));
    let (written, merged, _) = harness
        .write_and_merge(vec![item_message("image", 1)])
        .await;

    assert_eq!(written.by_type["image"].files_written, vec!["image-1-00001.xml"]);
    assert_eq!(
        merged.by_type["image"].last_filename.as_deref(),
        Some("image-1-00001.xml")
    );

    let (written, _, _) = harness
        .write_and_merge(vec![item_message("image", 2)])
        .await;
    assert_eq!(written.by_type["image"].resumed.as_deref(), Some("image-1-00001.xml"));
}

#[tokio::test]
async fn test_unmerged_write_keeps_owned_items() {
    let harness = TestHarness::with_settings(|s| s.limit_count = 2);
    let mut lost = CollectingSink::new();
    harness
        .writer()
        .write_batch((1..=2).map(|i| item_message("widget", i)).collect(), &mut lost)
        .await;
    assert!(harness.index_entries("widget").is_empty());

    let (written, merged, _) = harness
        .write_and_merge(vec![item_message("widget", 3)])
        .await;

    assert_eq!(written.by_type["widget"].files_written, vec!["widget-00002.xml"]);
    let urls = |file: &str| -> Vec<String> {
        harness
            .sitemap_entries("widget", file)
            .into_iter()
            .map(|e| e.url)
            .collect()
    };
    assert_eq!(
        urls("widget-00001.xml"),
        vec!["https://ex.com/widget/1", "https://ex.com/widget/2"]
    );
    assert_eq!(urls("widget-00002.xml"), vec!["https://ex.com/widget/3"]);

    for id in ["1", "2"] {
        let record = harness.state.get_item("widget", id).await.unwrap().unwrap();
        assert_eq!(record.file_name, "widget-00001.xml");
    }

    // The earlier file is announced again and reaches the index.
    assert_eq!(merged.by_type["widget"].written, 2);
    let indexed: Vec<String> = harness
        .index_entries("widget")
        .iter()
        .map(|e| e.filename().to_string())
        .collect();
    assert_eq!(indexed, vec!["widget-00001.xml", "widget-00002.xml"]);
}

#[tokio::test]
async fn test_changed_item_reaches_its_sitemap() {
    let harness = TestHarness::with_settings(|s| s.limit_count = 3);
    harness
        .write_and_merge((1..=2).map(|i| item_message("widget", i)).collect())
        .await;

    let mut changed = item_message("widget", 1);
    changed.sitemap_item = changed.sitemap_item.with_lastmod("2030-01-01T00:00:00.000Z");
    let (written, _, emitted) = harness.write_and_merge(vec![changed]).await;

    let result = &written.by_type["widget"];
    assert_eq!((result.updated, result.skipped, result.written), (1, 0, 0));
    assert_eq!(result.files_repaired, vec!["widget-00001.xml"]);

    let entries = harness.sitemap_entries("widget", "widget-00001.xml");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].lastmod.as_deref(), Some("2030-01-01T00:00:00.000Z"));

    assert_eq!(emitted.len(), 1);
    assert_eq!(emitted[0].action, IndexAction::Update);
    assert_eq!(emitted[0].index_item.url, sitemap_url("widget", "widget-00001.xml"));

    let record = harness.state.get_item("widget", "1").await.unwrap().unwrap();
    assert_eq!(record.item_status, ItemStatus::Written);
    assert!(harness.staging_is_empty());
}
