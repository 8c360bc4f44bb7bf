//! Key-value store record shapes.
//!
//! The store is authoritative for which file owns an item: an item's
//! `file_name` names the single sitemap file that may contain it. When blob
//! content disagrees, the record wins.

use serde::{Deserialize, Serialize};

use crate::entry::SitemapEntry;

/// Lifecycle of a sitemap file record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    /// Items were assigned but the blob was not rewritten yet
    Dirty,
    /// Blob content matches the records
    Written,
}

/// Lifecycle of an item record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Written,
    Towrite,
    Toremove,
    Removed,
}

impl ItemStatus {
    /// Whether the item belongs in its owning file.
    pub fn is_live(&self) -> bool {
        matches!(self, ItemStatus::Written | ItemStatus::Towrite)
    }
}

/// Per-file state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    #[serde(rename = "Type")]
    pub type_name: String,

    #[serde(rename = "FileName")]
    pub file_name: String,

    #[serde(rename = "FileStatus")]
    pub file_status: FileStatus,

    #[serde(rename = "CountWritten")]
    pub count_written: u64,

    #[serde(rename = "TimeFirstSeenISO")]
    pub time_first_seen_iso: String,

    #[serde(rename = "TimeLastWrittenISO")]
    pub time_last_written_iso: String,
}

impl FileRecord {
    /// Create a record for a file seen for the first time.
    pub fn new(type_name: impl Into<String>, file_name: impl Into<String>, now_iso: &str) -> Self {
        Self {
            type_name: type_name.into(),
            file_name: file_name.into(),
            file_status: FileStatus::Dirty,
            count_written: 0,
            time_first_seen_iso: now_iso.to_string(),
            time_last_written_iso: now_iso.to_string(),
        }
    }

    /// Record that the blob was rewritten with `count` items.
    pub fn mark_written(&mut self, count: u64, now_iso: &str) {
        self.file_status = FileStatus::Written;
        self.count_written = count;
        self.time_last_written_iso = now_iso.to_string();
    }

    /// Record that owned items changed and the blob needs a rewrite.
    pub fn mark_dirty(&mut self) {
        self.file_status = FileStatus::Dirty;
    }
}

/// Per-item state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    #[serde(rename = "Type")]
    pub type_name: String,

    #[serde(rename = "ItemID")]
    pub item_id: String,

    /// Owning sitemap file
    #[serde(rename = "FileName")]
    pub file_name: String,

    #[serde(rename = "SitemapItem")]
    pub sitemap_item: SitemapEntry,

    #[serde(rename = "ItemStatus")]
    pub item_status: ItemStatus,
}

impl ItemRecord {
    pub fn new(
        type_name: impl Into<String>,
        item_id: impl Into<String>,
        file_name: impl Into<String>,
        sitemap_item: SitemapEntry,
        item_status: ItemStatus,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            item_id: item_id.into(),
            file_name: file_name.into(),
            sitemap_item,
            item_status,
        }
    }

    /// Whether this record says `file_name` owns the item.
    pub fn is_owned_by(&self, file_name: &str) -> bool {
        self.file_name == file_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_record_field_names() {
        let record = FileRecord::new("widget", "widget-00001.xml", "2024-01-01T00:00:00.000Z");
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"Type\":\"widget\""));
        assert!(json.contains("\"FileStatus\":\"dirty\""));
        assert!(json.contains("\"TimeFirstSeenISO\""));
        assert!(json.contains("\"TimeLastWrittenISO\""));
    }

    #[test]
    fn test_file_record_mark_written() {
        let mut record = FileRecord::new("widget", "widget-00001.xml", "2024-01-01T00:00:00.000Z");
        record.mark_written(12, "2024-01-02T00:00:00.000Z");
        assert_eq!(record.file_status, FileStatus::Written);
        assert_eq!(record.count_written, 12);
        assert_eq!(record.time_first_seen_iso, "2024-01-01T00:00:00.000Z");
        assert_eq!(record.time_last_written_iso, "2024-01-02T00:00:00.000Z");
    }

    #[test]
    fn test_item_record_roundtrip() {
        let record = ItemRecord::new(
            "widget",
            "w-1",
            "widget-00001.xml",
            SitemapEntry::new("https://example.com/w/1"),
            ItemStatus::Towrite,
        );
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"ItemID\":\"w-1\""));
        assert!(json.contains("\"ItemStatus\":\"towrite\""));
        let decoded: ItemRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, record);
        assert!(decoded.is_owned_by("widget-00001.xml"));
        assert!(!decoded.is_owned_by("widget-00002.xml"));
    }

    #[test]
    fn test_item_status_liveness() {
        assert!(ItemStatus::Written.is_live());
        assert!(ItemStatus::Towrite.is_live());
        assert!(!ItemStatus::Toremove.is_live());
        assert!(!ItemStatus::Removed.is_live());
    }
}
