//! Key-value state seam.
//!
//! Holds [`ItemRecord`] and [`FileRecord`] rows keyed by `(type, id)` and
//! `(type, file)`. The record's `file_name` is the owner of an item.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use sitemap_types::{FileRecord, ItemRecord};

use crate::error::StorageError;

/// Per-item and per-file records.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get_item(
        &self,
        type_name: &str,
        item_id: &str,
    ) -> Result<Option<ItemRecord>, StorageError>;

    /// Create or replace an item record.
    async fn put_item(&self, record: ItemRecord) -> Result<(), StorageError>;

    /// Every item record whose owner is `file_name`.
    async fn items_for_file(
        &self,
        type_name: &str,
        file_name: &str,
    ) -> Result<Vec<ItemRecord>, StorageError>;

    async fn get_file(
        &self,
        type_name: &str,
        file_name: &str,
    ) -> Result<Option<FileRecord>, StorageError>;

    /// Create or replace a file record.
    async fn put_file(&self, record: FileRecord) -> Result<(), StorageError>;

    /// Every file record of `type_name`.
    async fn files_for_type(&self, type_name: &str) -> Result<Vec<FileRecord>, StorageError>;
}

type Key = (String, String);

/// In-process state store.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    items: Mutex<BTreeMap<Key, ItemRecord>>,
    files: Mutex<BTreeMap<Key, FileRecord>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with item records.
    pub fn with_items(items: impl IntoIterator<Item = ItemRecord>) -> Self {
        let store = Self::new();
        {
            let mut map = store.items.lock().unwrap_or_else(|e| e.into_inner());
            for record in items {
                map.insert((record.type_name.clone(), record.item_id.clone()), record);
            }
        }
        store
    }

    /// Add file records to a seeded store.
    pub fn with_files(self, files: impl IntoIterator<Item = FileRecord>) -> Self {
        {
            let mut map = self.files.lock().unwrap_or_else(|e| e.into_inner());
            for record in files {
                map.insert((record.type_name.clone(), record.file_name.clone()), record);
            }
        }
        self
    }

    /// Number of item records.
    pub fn item_count(&self) -> usize {
        self.items.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// All item records, ordered by key.
    pub fn item_records(&self) -> Vec<ItemRecord> {
        self.items
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }

    /// All file records, ordered by key.
    pub fn file_records(&self) -> Vec<FileRecord> {
        self.files
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get_item(
        &self,
        type_name: &str,
        item_id: &str,
    ) -> Result<Option<ItemRecord>, StorageError> {
        let items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        Ok(items
            .get(&(type_name.to_string(), item_id.to_string()))
            .cloned())
    }

    async fn put_item(&self, record: ItemRecord) -> Result<(), StorageError> {
        let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        items.insert((record.type_name.clone(), record.item_id.clone()), record);
        Ok(())
    }

    async fn items_for_file(
        &self,
        type_name: &str,
        file_name: &str,
    ) -> Result<Vec<ItemRecord>, StorageError> {
        let items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        Ok(items
            .values()
            .filter(|r| r.type_name == type_name && r.is_owned_by(file_name))
            .cloned()
            .collect())
    }

    async fn get_file(
        &self,
        type_name: &str,
        file_name: &str,
    ) -> Result<Option<FileRecord>, StorageError> {
        let files = self.files.lock().unwrap_or_else(|e| e.into_inner());
        Ok(files
            .get(&(type_name.to_string(), file_name.to_string()))
            .cloned())
    }

    async fn put_file(&self, record: FileRecord) -> Result<(), StorageError> {
        let mut files = self.files.lock().unwrap_or_else(|e| e.into_inner());
        files.insert((record.type_name.clone(), record.file_name.clone()), record);
        Ok(())
    }

    async fn files_for_type(&self, type_name: &str) -> Result<Vec<FileRecord>, StorageError> {
        let files = self.files.lock().unwrap_or_else(|e| e.into_inner());
        Ok(files
            .values()
            .filter(|r| r.type_name == type_name)
            .cloned()
            .collect())
    }
}
