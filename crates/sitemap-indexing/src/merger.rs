//! Per-type index reconciliation.
//!
//! Each invocation takes a batch of index change messages, groups them by
//! type, and for every type rewrites the whole index:
//!
//! 1. Load the persisted index and discard the loaded container
//! 2. Upsert every add/update message by URL (last message wins)
//! 3. Write all entries, sorted by URL, into a fresh index and push it
//! 4. Derive and push one reduced copy per configured infix directory
//!
//! A failure inside one type is logged and counted; other types proceed.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use sitemap_files::{index_config, BoundedIndex, LoadedIndex};
use sitemap_storage::BlobStore;
use sitemap_types::{FileSettings, IndexAction, IndexChangeMessage, IndexEntry};

use crate::error::IndexingError;
use crate::result::{MergeReport, TypeResult};

/// Rewrites type indexes from batches of change messages.
pub struct IndexMerger {
    store: Arc<dyn BlobStore>,
    settings: FileSettings,
}

impl IndexMerger {
    pub fn new(store: Arc<dyn BlobStore>, settings: FileSettings) -> Self {
        Self { store, settings }
    }

    /// Process raw stream records.
    ///
    /// Any record that is not a change message fails the whole invocation
    /// with [`IndexingError::FatalBatch`] so the transport redelivers it.
    /// Duration and outcome are logged whether or not it succeeds.
    pub async fn handle_records(&self, records: &[Vec<u8>]) -> Result<MergeReport, IndexingError> {
        let started = Instant::now();

        let outcome = match parse_messages(records) {
            Ok(messages) => Ok(self.process_batch(messages).await),
            Err(e) => Err(e),
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Ok(report) => info!(
                duration_ms,
                records = records.len(),
                types = report.by_type.len(),
                failed_types = report.failed_types.len(),
                anomalies = report.anomalies,
                success = report.is_success(),
                "Merge invocation complete"
            ),
            Err(e) => error!(
                duration_ms,
                records = records.len(),
                error = %e,
                "Merge invocation failed"
            ),
        }
        outcome
    }

    /// Merge a batch of messages, isolating failures per type.
    pub async fn process_batch(&self, messages: Vec<IndexChangeMessage>) -> MergeReport {
        let mut report = MergeReport::new();

        let mut by_type: BTreeMap<String, Vec<IndexChangeMessage>> = BTreeMap::new();
        for message in messages {
            if !is_usable_type(&message.type_name) {
                warn!(type_name = %message.type_name, "Skipping message with unusable type");
                report.record_anomaly();
                continue;
            }
            by_type
                .entry(message.type_name.clone())
                .or_default()
                .push(message);
        }

        for (type_name, messages) in by_type {
            match self.merge_type(&type_name, messages).await {
                Ok(result) => report.add_result(type_name, result),
                Err(e) => {
                    error!(type_name = %type_name, error = %e, "Index merge failed");
                    report.record_failure(type_name, e);
                }
            }
        }

        report
    }

    /// Load-merge-sort-rewrite one type's index, then derive its infix copies.
    pub async fn merge_type(
        &self,
        type_name: &str,
        messages: Vec<IndexChangeMessage>,
    ) -> Result<TypeResult, IndexingError> {
        let config = index_config(&self.settings, type_name);

        let LoadedIndex {
            index: mut loaded,
            existed,
            items,
        } = BoundedIndex::load(self.store.as_ref(), config.clone()).await?;
        loaded.end()?;
        loaded.delete();

        let mut result = TypeResult {
            existed,
            existing: items.len(),
            ..TypeResult::new()
        };

        // BTreeMap keeps URLs in ordinal byte order.
        let mut by_url: BTreeMap<String, IndexEntry> =
            items.into_iter().map(|e| (e.url.clone(), e)).collect();

        for message in messages {
            match message.action {
                IndexAction::Add | IndexAction::Update => {
                    by_url.insert(message.index_item.url.clone(), message.index_item);
                    result.record_upsert();
                }
                IndexAction::Unknown => {
                    warn!(
                        type_name,
                        url = %message.index_item.url,
                        "Skipping message with unknown action"
                    );
                    result.record_anomaly();
                }
            }
        }

        let mut index = BoundedIndex::create(config)?;
        for entry in by_url.into_values() {
            index.write(entry)?;
        }
        index.end()?;
        index.push(self.store.as_ref()).await?;

        result.written = index.count();
        result.last_filename = index.last_filename().map(str::to_string);

        for infix in &self.settings.infix_dirs {
            match self.write_infix(&index, infix).await {
                Ok(()) => result.infixes_written += 1,
                Err(e) => {
                    warn!(type_name, infix = %infix, error = %e, "Infix index failed");
                    result.infix_errors += 1;
                }
            }
        }
        index.delete();

        info!(
            type_name,
            existed,
            existing = result.existing,
            written = result.written,
            upserts = result.upserts,
            anomalies = result.anomalies,
            "Merged index"
        );
        Ok(result)
    }

    async fn write_infix(&self, index: &BoundedIndex, infix: &str) -> Result<(), IndexingError> {
        let mut derived = index.derive_infix(infix)?;
        derived.end()?;
        derived.push(self.store.as_ref()).await?;
        debug!(key = %derived.key(), count = derived.count(), "Pushed infix index");
        derived.delete();
        Ok(())
    }
}

/// Decode every record, failing on the first that is not a change message.
pub fn parse_messages(records: &[Vec<u8>]) -> Result<Vec<IndexChangeMessage>, IndexingError> {
    records
        .iter()
        .enumerate()
        .map(|(i, bytes)| {
            IndexChangeMessage::from_bytes(bytes)
                .map_err(|e| IndexingError::FatalBatch(format!("record {i}: {e}")))
        })
        .collect()
}

/// Whether a type name can select an index file.
fn is_usable_type(type_name: &str) -> bool {
    !type_name.is_empty() && !type_name.contains('/')
}
