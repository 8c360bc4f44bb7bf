//! Ownership repair of a single sitemap file.
//!
//! The state store decides which file owns an item. Repair rewrites a file
//! so that it holds exactly the live items the store assigns to it:
//! entries owned elsewhere are dropped, owned items missing from the file
//! are appended, and items marked `toremove` are dropped and marked
//! `removed`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info};

use sitemap_files::{BoundedFile, FileConfig, SitemapFile};
use sitemap_storage::{BlobStore, StateStore};
use sitemap_types::{now_lastmod, FileRecord, FileSettings, ItemRecord, ItemStatus, SitemapEntry};

use crate::error::IndexingError;
use crate::result::RepairResult;

/// Rewrites sitemap files to match the state store.
pub struct FileRepairer {
    store: Arc<dyn BlobStore>,
    state: Arc<dyn StateStore>,
    settings: FileSettings,
}

impl FileRepairer {
    pub fn new(store: Arc<dyn BlobStore>, state: Arc<dyn StateStore>, settings: FileSettings) -> Self {
        Self {
            store,
            state,
            settings,
        }
    }

    /// Repair `file_name` of `type_name`.
    ///
    /// The state store decides membership, so the rebuilt file may exceed
    /// the count limit and entries are written with the byte limit
    /// disregarded. Legacy oversized files are reproduced rather than split.
    pub async fn repair_file(
        &self,
        type_name: &str,
        file_name: &str,
    ) -> Result<RepairResult, IndexingError> {
        let config = FileConfig::for_filename(
            file_name,
            self.settings.sitemap_type_directory(type_name),
            self.settings.staging_path(),
        )?
        .with_limits(usize::MAX, self.settings.limit_bytes);

        let loaded = SitemapFile::load(self.store.as_ref(), config.clone()).await?;
        let mut stale = loaded.file;
        stale.end()?;
        stale.delete();

        let records = self.state.items_for_file(type_name, file_name).await?;
        let live: HashMap<&str, &ItemRecord> = records
            .iter()
            .filter(|r| r.item_status.is_live())
            .map(|r| (r.sitemap_item.url.as_str(), r))
            .collect();
        let to_remove: HashSet<&str> = records
            .iter()
            .filter(|r| r.item_status == ItemStatus::Toremove)
            .map(|r| r.sitemap_item.url.as_str())
            .collect();

        let mut result = RepairResult {
            file_name: file_name.to_string(),
            existed: loaded.existed,
            ..RepairResult::default()
        };

        let mut rebuilt: SitemapFile = BoundedFile::create(config)?;
        let mut kept: HashSet<&str> = HashSet::new();

        for entry in &loaded.items {
            let url = entry.url.as_str();
            if let Some(record) = live.get(url) {
                if kept.insert(record.sitemap_item.url.as_str()) {
                    rebuilt.write(record.sitemap_item.clone(), true)?;
                    result.kept += 1;
                } else {
                    result.duplicates += 1;
                }
            } else if to_remove.contains(url) {
                debug!(type_name, url, "Dropping item marked for removal");
                result.removed += 1;
            } else {
                debug!(type_name, url, "Dropping item not owned by this file");
                result.dropped_unowned += 1;
            }
        }

        let missing: Vec<SitemapEntry> = records
            .iter()
            .filter(|r| r.item_status.is_live() && !kept.contains(r.sitemap_item.url.as_str()))
            .map(|r| r.sitemap_item.clone())
            .collect();
        for entry in missing {
            rebuilt.write(entry, true)?;
            result.appended += 1;
        }

        rebuilt.end()?;
        rebuilt.push(self.store.as_ref()).await?;
        result.count = rebuilt.count();
        rebuilt.delete();

        let now = now_lastmod();
        for record in &records {
            let status = match record.item_status {
                ItemStatus::Towrite => ItemStatus::Written,
                ItemStatus::Toremove => ItemStatus::Removed,
                _ => continue,
            };
            let mut updated = record.clone();
            updated.item_status = status;
            self.state.put_item(updated).await?;
        }

        let mut file_record = self
            .state
            .get_file(type_name, file_name)
            .await?
            .unwrap_or_else(|| FileRecord::new(type_name, file_name, &now));
        file_record.mark_written(result.count as u64, &now);
        self.state.put_file(file_record).await?;

        info!(
            type_name,
            file = file_name,
            kept = result.kept,
            appended = result.appended,
            dropped = result.dropped_unowned,
            removed = result.removed,
            duplicates = result.duplicates,
            "Repaired sitemap file"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitemap_files::decode_entries;
    use sitemap_storage::{MemoryBlobStore, MemoryStateStore};
    use sitemap_types::FileStatus;
    use tempfile::TempDir;

    const FILE: &str = "widget-00001.xml";
    const KEY: &str = "sitemaps/widget/widget-00001.xml";

    fn entry(id: &str) -> SitemapEntry {
        SitemapEntry::new(format!("https://ex.com/widget/{id}"))
    }

    fn record(id: &str, file: &str, status: ItemStatus) -> ItemRecord {
        ItemRecord::new("widget", id, file, entry(id), status)
    }

    async fn seed_file(store: &MemoryBlobStore, temp: &TempDir, ids: &[&str]) {
        let config = FileConfig::for_filename(FILE, "sitemaps/widget", temp.path()).unwrap();
        let mut file = SitemapFile::create(config).unwrap();
        for id in ids {
            file.write(entry(id), false).unwrap();
        }
        file.end().unwrap();
        file.push(store).await.unwrap();
        file.delete();
    }

    fn repairer(
        temp: &TempDir,
        store: Arc<MemoryBlobStore>,
        state: Arc<MemoryStateStore>,
    ) -> FileRepairer {
        let settings = FileSettings {
            staging_dir: Some(temp.path().to_string_lossy().to_string()),
            ..FileSettings::default()
        };
        FileRepairer::new(store, state, settings)
    }

    #[tokio::test]
    async fn test_database_ownership_wins() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(MemoryBlobStore::new());
        seed_file(&store, &temp, &["1", "2", "3", "4"]).await;

        let state = Arc::new(MemoryStateStore::with_items(vec![
            record("1", FILE, ItemStatus::Written),
            record("2", "widget-00002.xml", ItemStatus::Written),
            record("3", FILE, ItemStatus::Toremove),
            record("5", FILE, ItemStatus::Towrite),
        ]));

        let result = repairer(&temp, store.clone(), state.clone())
            .repair_file("widget", FILE)
            .await
            .unwrap();

        assert!(result.existed);
        assert_eq!(result.kept, 1);
        assert_eq!(result.appended, 1);
        assert_eq!(result.removed, 1);
        assert_eq!(result.dropped_unowned, 2);
        assert_eq!(result.count, 2);

        let entries: Vec<SitemapEntry> = decode_entries(&store.object(KEY).unwrap().body).unwrap();
        assert_eq!(entries, vec![entry("1"), entry("5")]);

        let removed = state.get_item("widget", "3").await.unwrap().unwrap();
        assert_eq!(removed.item_status, ItemStatus::Removed);
        let appended = state.get_item("widget", "5").await.unwrap().unwrap();
        assert_eq!(appended.item_status, ItemStatus::Written);

        let file_record = state.get_file("widget", FILE).await.unwrap().unwrap();
        assert_eq!(file_record.file_status, FileStatus::Written);
        assert_eq!(file_record.count_written, 2);
    }

    #[tokio::test]
    async fn test_missing_file_is_rebuilt_from_records() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(MemoryBlobStore::new());
        let state = Arc::new(MemoryStateStore::with_items(vec![
            record("1", FILE, ItemStatus::Written),
            record("2", FILE, ItemStatus::Written),
        ]));

        let result = repairer(&temp, store.clone(), state)
            .repair_file("widget", FILE)
            .await
            .unwrap();

        assert!(!result.existed);
        assert_eq!(result.appended, 2);
        let entries: Vec<SitemapEntry> = decode_entries(&store.object(KEY).unwrap().body).unwrap();
        assert_eq!(entries, vec![entry("1"), entry("2")]);
    }

    #[tokio::test]
    async fn test_duplicate_entries_collapse() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(MemoryBlobStore::new());
        seed_file(&store, &temp, &["1", "1"]).await;
        let state = Arc::new(MemoryStateStore::with_items(vec![record(
            "1",
            FILE,
            ItemStatus::Written,
        )]));

        let result = repairer(&temp, store.clone(), state)
            .repair_file("widget", FILE)
            .await
            .unwrap();
        assert_eq!(result.kept, 1);
        assert_eq!(result.duplicates, 1);
        assert_eq!(result.dropped_unowned, 0);
        assert_eq!(result.count, 1);
    }

    #[tokio::test]
    async fn test_rejects_non_sitemap_filename() {
        let temp = TempDir::new().unwrap();
        let err = repairer(
            &temp,
            Arc::new(MemoryBlobStore::new()),
            Arc::new(MemoryStateStore::new()),
        )
        .repair_file("widget", "widget.txt")
        .await
        .unwrap_err();
        assert!(matches!(err, IndexingError::File(_)));
    }
}
