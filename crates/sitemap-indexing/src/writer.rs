//! Writes sitemap items into rotating sitemap files.
//!
//! Each invocation compacts its batch, then per type resumes the most
//! recent sitemap file (or rotates past it when full), writes every new
//! item, pushes the touched files and records ownership in the state store.
//! The most recent file is taken from both the index and the state store's
//! file records, so files whose announcement never reached the index are
//! never reused from the start. Items already owned by a file stay there:
//! a changed entry marks its owning file dirty and the file is rewritten
//! through [`FileRepairer`].
//!
//! New files are announced with `add` index messages, changed files that
//! the index already lists with `update`.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use futures::future::try_join_all;
use tracing::{debug, error, info, warn};

use sitemap_files::{
    filename_for, index_config, ordinal_from_filename, BoundedIndex, FileError, FileRotator,
    LoadedIndex, RotatorConfig, SitemapFile, WriteOutcome,
};
use sitemap_storage::{object_key, public_url, BlobStore, StateStore};
use sitemap_types::{
    now_lastmod, FileRecord, FileSettings, IndexAction, IndexChangeMessage, IndexEntry,
    ItemChangeMessage, ItemRecord, ItemStatus,
};

use crate::error::IndexingError;
use crate::repair::FileRepairer;
use crate::result::{ItemTypeResult, ItemWriteReport};
use crate::sink::IndexEventSink;

/// The file a rotation continued from, as it was when loaded.
#[derive(Debug, Clone)]
struct ResumedFile {
    filename: String,
    count: usize,
}

/// Sitemap files of one type known to the index or the state store.
#[derive(Debug, Default)]
struct KnownFiles {
    latest: Option<u32>,
    indexed: HashSet<String>,
    /// Recorded in the state store but not listed in the index
    unindexed: Vec<FileRecord>,
}

/// Places sitemap items into files and announces the files to the index stream.
pub struct ItemWriter {
    store: Arc<dyn BlobStore>,
    state: Arc<dyn StateStore>,
    settings: FileSettings,
}

impl ItemWriter {
    pub fn new(store: Arc<dyn BlobStore>, state: Arc<dyn StateStore>, settings: FileSettings) -> Self {
        Self {
            store,
            state,
            settings,
        }
    }

    /// Process raw stream records; a record that does not decode fails the
    /// whole invocation.
    pub async fn handle_records(
        &self,
        records: &[Vec<u8>],
        sink: &mut dyn IndexEventSink,
    ) -> Result<ItemWriteReport, IndexingError> {
        let started = Instant::now();

        let outcome = match parse_item_messages(records) {
            Ok(messages) => Ok(self.write_batch(messages, sink).await),
            Err(e) => Err(e),
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Ok(report) => info!(
                duration_ms,
                records = records.len(),
                written = report.total_written(),
                compacted = report.compacted,
                failed_types = report.failed_types.len(),
                "Item write invocation complete"
            ),
            Err(e) => error!(duration_ms, error = %e, "Item write invocation failed"),
        }
        outcome
    }

    /// Write a batch of item changes, isolating failures per type.
    pub async fn write_batch(
        &self,
        messages: Vec<ItemChangeMessage>,
        sink: &mut dyn IndexEventSink,
    ) -> ItemWriteReport {
        let mut report = ItemWriteReport::new();
        let received = messages.len();
        let by_type = compact(messages);
        report.compacted = received - by_type.values().map(Vec::len).sum::<usize>();

        for (type_name, items) in by_type {
            match self.write_type(&type_name, items, sink).await {
                Ok(result) => report.add_result(type_name, result),
                Err(e) => {
                    error!(type_name = %type_name, error = %e, "Item write failed");
                    report.record_failure(type_name, e);
                }
            }
        }
        report
    }

    async fn write_type(
        &self,
        type_name: &str,
        items: Vec<ItemChangeMessage>,
        sink: &mut dyn IndexEventSink,
    ) -> Result<ItemTypeResult, IndexingError> {
        let mut result = ItemTypeResult::new();
        let rotator_config = RotatorConfig::for_type(&self.settings, type_name);

        let known = self.known_files(type_name, &rotator_config).await?;
        let (mut rotator, resumed_from) = self.start_rotator(rotator_config, known.latest).await?;
        result.resumed = resumed_from.as_ref().map(|r| r.filename.clone());

        // Collects index entries for files opened during this invocation.
        let mut opened = BoundedIndex::create(
            index_config(&self.settings, type_name)
                .with_limits(usize::MAX, usize::MAX),
        )?;

        let mut finished: Vec<SitemapFile> = Vec::new();
        let mut assigned: Vec<ItemRecord> = Vec::new();
        let mut changed: Vec<ItemRecord> = Vec::new();

        for item in items {
            if let Some(mut record) = self.state.get_item(type_name, &item.item_id).await? {
                if record.item_status == ItemStatus::Written
                    && record.sitemap_item == item.sitemap_item
                {
                    debug!(type_name, item_id = %item.item_id, "Item already written");
                    result.record_skip();
                    continue;
                }
                if record.item_status != ItemStatus::Removed {
                    debug!(
                        type_name,
                        item_id = %item.item_id,
                        file = %record.file_name,
                        "Item changed in its owning file"
                    );
                    record.sitemap_item = item.sitemap_item;
                    record.item_status = ItemStatus::Towrite;
                    changed.push(record);
                    result.record_update();
                    continue;
                }
            }

            let outcome =
                rotator.write_or_rotate_and_write(&mut opened, item.sitemap_item.clone())?;
            if let WriteOutcome::Rotated(done) = outcome {
                finished.push(done);
            }
            let Some(current) = rotator.current() else {
                continue;
            };
            assigned.push(ItemRecord::new(
                type_name,
                item.item_id,
                current.filename(),
                item.sitemap_item,
                ItemStatus::Written,
            ));
            result.record_written();
        }

        if let Some(mut last) = rotator.take_current() {
            last.end()?;
            finished.push(last);
        }

        let now = now_lastmod();
        let mut resumed_touched = false;
        for mut file in finished {
            let filename = file.filename();
            let resumed = resumed_from.as_ref().filter(|r| r.filename == filename);
            if resumed.is_some_and(|r| r.count == file.count()) {
                debug!(file = %filename, "Resumed file unchanged, skipping push");
                file.delete();
                continue;
            }

            file.push(self.store.as_ref()).await?;
            self.record_file(type_name, &filename, file.count() as u64, &now)
                .await?;
            file.delete();

            resumed_touched |= resumed.is_some();
            result.files_written.push(filename);
        }

        try_join_all(assigned.into_iter().map(|r| self.state.put_item(r))).await?;

        let dirty: BTreeSet<String> = changed.iter().map(|r| r.file_name.clone()).collect();
        try_join_all(changed.into_iter().map(|r| self.state.put_item(r))).await?;
        for file_name in &dirty {
            self.mark_file_dirty(type_name, file_name, &now).await?;
        }
        let repairer =
            FileRepairer::new(self.store.clone(), self.state.clone(), self.settings.clone());
        for file_name in &dirty {
            repairer.repair_file(type_name, file_name).await?;
            result.files_repaired.push(file_name.clone());
        }

        // Announce every file this invocation created or changed, plus
        // recorded files the index never learned about.
        let mut announced: HashSet<String> = HashSet::new();
        for entry in opened.items() {
            announced.insert(entry.filename().to_string());
            sink.emit(IndexChangeMessage::new(type_name, IndexAction::Add, entry.clone()))
                .await?;
            result.messages_emitted += 1;
        }
        let mut changed_files: Vec<&str> = Vec::new();
        if resumed_touched {
            if let Some(resumed) = &resumed_from {
                changed_files.push(resumed.filename.as_str());
            }
        }
        changed_files.extend(dirty.iter().map(String::as_str));
        for file_name in changed_files {
            if !announced.insert(file_name.to_string()) {
                continue;
            }
            let action = if known.indexed.contains(file_name) {
                IndexAction::Update
            } else {
                IndexAction::Add
            };
            let entry = self.index_entry(rotator.config(), file_name, &now);
            sink.emit(IndexChangeMessage::new(type_name, action, entry)).await?;
            result.messages_emitted += 1;
        }
        for record in &known.unindexed {
            if !announced.insert(record.file_name.clone()) {
                continue;
            }
            debug!(type_name, file = %record.file_name, "Announcing file missing from the index");
            let entry = self.index_entry(
                rotator.config(),
                &record.file_name,
                &record.time_last_written_iso,
            );
            sink.emit(IndexChangeMessage::new(type_name, IndexAction::Add, entry))
                .await?;
            result.messages_emitted += 1;
        }
        opened.delete();

        info!(
            type_name,
            written = result.written,
            updated = result.updated,
            skipped = result.skipped,
            files = result.files_written.len(),
            repaired = result.files_repaired.len(),
            "Wrote sitemap items"
        );
        Ok(result)
    }

    /// Sitemap files of this type following the rotator's naming scheme,
    /// from the index and the state store's file records.
    async fn known_files(
        &self,
        type_name: &str,
        rotator_config: &RotatorConfig,
    ) -> Result<KnownFiles, IndexingError> {
        let LoadedIndex {
            mut index, items, ..
        } = BoundedIndex::load(self.store.as_ref(), index_config(&self.settings, type_name))
            .await?;
        index.end()?;
        index.delete();

        let scheme_ordinal = |name: &str| -> Option<u32> {
            let ordinal = ordinal_from_filename(name)?;
            let expected =
                filename_for(&rotator_config.filename_root, Some(ordinal), rotator_config.compress);
            (expected == name).then_some(ordinal)
        };

        let indexed: HashSet<String> = items
            .iter()
            .map(IndexEntry::filename)
            .filter_map(|name| scheme_ordinal(name).map(|_| name.to_string()))
            .collect();
        let unindexed: Vec<FileRecord> = self
            .state
            .files_for_type(type_name)
            .await?
            .into_iter()
            .filter(|r| {
                scheme_ordinal(r.file_name.as_str()).is_some() && !indexed.contains(&r.file_name)
            })
            .collect();
        if !unindexed.is_empty() {
            warn!(
                type_name,
                files = unindexed.len(),
                "State store lists sitemap files the index does not"
            );
        }

        let latest = indexed
            .iter()
            .map(String::as_str)
            .chain(unindexed.iter().map(|r| r.file_name.as_str()))
            .filter_map(scheme_ordinal)
            .max();
        Ok(KnownFiles {
            latest,
            indexed,
            unindexed,
        })
    }

    /// Build a rotator positioned after the latest file, resuming into that
    /// file when it still has room.
    async fn start_rotator(
        &self,
        config: RotatorConfig,
        latest: Option<u32>,
    ) -> Result<(FileRotator, Option<ResumedFile>), IndexingError> {
        let Some(ordinal) = latest else {
            return Ok((FileRotator::new(config), None));
        };

        let loaded = match SitemapFile::load(self.store.as_ref(), config.file_config(ordinal)).await {
            Ok(loaded) => loaded,
            Err(FileError::AlreadyFull { filename }) => {
                warn!(file = %filename, "Latest sitemap file is over its count limit");
                return Ok((FileRotator::resume(config, ordinal, None), None));
            }
            Err(e) => return Err(e.into()),
        };
        let mut file = loaded.file;
        if !loaded.existed {
            warn!(file = %file.filename(), "Latest sitemap file is missing, starting after it");
            file.delete();
            return Ok((FileRotator::resume(config, ordinal, None), None));
        }
        if file.is_full() {
            debug!(file = %file.filename(), "Latest sitemap file is full");
            file.delete();
            return Ok((FileRotator::resume(config, ordinal, None), None));
        }

        let resumed = ResumedFile {
            filename: file.filename(),
            count: file.count(),
        };
        debug!(file = %resumed.filename, count = resumed.count, "Resuming sitemap file");
        Ok((FileRotator::resume(config, ordinal, Some(file)), Some(resumed)))
    }

    fn index_entry(&self, config: &RotatorConfig, file_name: &str, lastmod: &str) -> IndexEntry {
        let key = object_key(&config.directory, file_name);
        IndexEntry::new(public_url(&self.settings.site_base_url, &key)).with_lastmod(lastmod)
    }

    async fn mark_file_dirty(
        &self,
        type_name: &str,
        file_name: &str,
        now: &str,
    ) -> Result<(), IndexingError> {
        let mut record = self
            .state
            .get_file(type_name, file_name)
            .await?
            .unwrap_or_else(|| FileRecord::new(type_name, file_name, now));
        record.mark_dirty();
        self.state.put_file(record).await?;
        Ok(())
    }

    async fn record_file(
        &self,
        type_name: &str,
        file_name: &str,
        count: u64,
        now: &str,
    ) -> Result<(), IndexingError> {
        let mut record = self
            .state
            .get_file(type_name, file_name)
            .await?
            .unwrap_or_else(|| FileRecord::new(type_name, file_name, now));
        record.mark_written(count, now);
        self.state.put_file(record).await?;
        Ok(())
    }
}

/// Collapse repeated messages for the same item to the last one, keeping
/// first-seen order, and group by type.
pub fn compact(messages: Vec<ItemChangeMessage>) -> BTreeMap<String, Vec<ItemChangeMessage>> {
    let mut grouped: BTreeMap<String, Vec<ItemChangeMessage>> = BTreeMap::new();
    let mut positions: HashMap<(String, String), usize> = HashMap::new();

    for message in messages {
        let key = (message.type_name.clone(), message.item_id.clone());
        let group = grouped.entry(message.type_name.clone()).or_default();
        match positions.get(&key) {
            Some(&i) => group[i] = message,
            None => {
                positions.insert(key, group.len());
                group.push(message);
            }
        }
    }
    grouped
}

/// Decode every record, failing on the first that is not an item message.
pub fn parse_item_messages(records: &[Vec<u8>]) -> Result<Vec<ItemChangeMessage>, IndexingError> {
    records
        .iter()
        .enumerate()
        .map(|(i, bytes)| {
            ItemChangeMessage::from_bytes(bytes)
                .map_err(|e| IndexingError::FatalBatch(format!("record {i}: {e}")))
        })
        .collect()
}
