//! End-to-end test infrastructure for the sitemap writer.
//!
//! Provides a shared TestHarness wiring the item writer, index merger and
//! repairer to one in-memory blob store and state store.

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use sitemap_files::{decode_entries, index_config};
use sitemap_indexing::{
    CollectingSink, FileRepairer, IndexMerger, ItemWriteReport, ItemWriter, MergeReport,
};
use sitemap_storage::{object_key, public_url, MemoryBlobStore, MemoryStateStore};
use sitemap_types::{
    FileSettings, IndexAction, IndexChangeMessage, IndexEntry, ItemChangeMessage, SitemapEntry,
};

pub const SITE: &str = "https://ex.com";

/// Shared test harness for E2E tests.
pub struct TestHarness {
    /// Keeps the staging directory alive for the lifetime of the harness
    pub _temp_dir: TempDir,
    pub staging_dir: PathBuf,
    pub store: Arc<MemoryBlobStore>,
    pub state: Arc<MemoryStateStore>,
    pub settings: FileSettings,
}

impl TestHarness {
    /// Harness with default limits and no infixes.
    pub fn new() -> Self {
        Self::with_settings(|_| {})
    }

    /// Harness whose file settings are adjusted by `configure`.
    pub fn with_settings(configure: impl FnOnce(&mut FileSettings)) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let staging_dir = temp_dir.path().join("staging");

        let mut settings = FileSettings {
            site_base_url: SITE.to_string(),
            staging_dir: Some(staging_dir.to_string_lossy().to_string()),
            ..FileSettings::default()
        };
        configure(&mut settings);

        Self {
            _temp_dir: temp_dir,
            staging_dir,
            store: Arc::new(MemoryBlobStore::new()),
            state: Arc::new(MemoryStateStore::new()),
            settings,
        }
    }

    pub fn merger(&self) -> IndexMerger {
        IndexMerger::new(self.store.clone(), self.settings.clone())
    }

    pub fn writer(&self) -> ItemWriter {
        ItemWriter::new(self.store.clone(), self.state.clone(), self.settings.clone())
    }

    pub fn repairer(&self) -> FileRepairer {
        FileRepairer::new(self.store.clone(), self.state.clone(), self.settings.clone())
    }

    /// Write items, then merge the index messages the write produced.
    pub async fn write_and_merge(
        &self,
        messages: Vec<ItemChangeMessage>,
    ) -> (ItemWriteReport, MergeReport, Vec<IndexChangeMessage>) {
        let mut sink = CollectingSink::new();
        let written = self.writer().write_batch(messages, &mut sink).await;
        let emitted = sink.into_messages();
        let merged = self.merger().process_batch(emitted.clone()).await;
        (written, merged, emitted)
    }

    /// Blob key of a type's primary index.
    pub fn index_key(&self, type_name: &str) -> String {
        index_config(&self.settings, type_name).key()
    }

    /// Blob key of one of a type's sitemap files.
    pub fn sitemap_key(&self, type_name: &str, file_name: &str) -> String {
        object_key(&self.settings.sitemap_type_directory(type_name), file_name)
    }

    /// Raw bytes stored under `key`, if any.
    pub fn body(&self, key: &str) -> Option<Vec<u8>> {
        self.store.object(key).map(|o| o.body)
    }

    /// Entries of a type's primary index; empty when it does not exist.
    pub fn index_entries(&self, type_name: &str) -> Vec<IndexEntry> {
        self.body(&self.index_key(type_name))
            .map(|body| decode_entries(&body).expect("Stored index does not parse"))
            .unwrap_or_default()
    }

    /// Entries of one sitemap file; empty when it does not exist.
    pub fn sitemap_entries(&self, type_name: &str, file_name: &str) -> Vec<SitemapEntry> {
        self.body(&self.sitemap_key(type_name, file_name))
            .map(|body| decode_entries(&body).expect("Stored sitemap does not parse"))
            .unwrap_or_default()
    }

    /// Whether every staging artifact has been removed.
    pub fn staging_is_empty(&self) -> bool {
        match std::fs::read_dir(&self.staging_dir) {
            Ok(mut entries) => entries.next().is_none(),
            Err(_) => true,
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Public URL of a type's sitemap file under [`SITE`] with default directories.
pub fn sitemap_url(type_name: &str, file_name: &str) -> String {
    let settings = FileSettings::default();
    public_url(
        SITE,
        &object_key(&settings.sitemap_type_directory(type_name), file_name),
    )
}

/// An `add` message referencing a sitemap file.
pub fn add_message(type_name: &str, file_name: &str) -> IndexChangeMessage {
    IndexChangeMessage::new(
        type_name,
        IndexAction::Add,
        IndexEntry::new(sitemap_url(type_name, file_name)),
    )
}

/// An item change for `{SITE}/{type}/{id}`.
pub fn item_message(type_name: &str, id: usize) -> ItemChangeMessage {
    ItemChangeMessage::new(
        type_name,
        id.to_string(),
        SitemapEntry::new(format!("{SITE}/{type_name}/{id}")),
    )
}

/// Encode messages as raw stream records.
pub fn to_records(messages: &[IndexChangeMessage]) -> Vec<Vec<u8>> {
    messages
        .iter()
        .map(|m| serde_json::to_vec(m).expect("Failed to encode message"))
        .collect()
}
