//! Per-type and per-invocation outcome reporting.

use std::collections::BTreeMap;

use serde::Serialize;

/// Outcome of merging one type's index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TypeResult {
    /// Messages received for this type
    pub messages: usize,
    /// Add/update messages applied
    pub upserts: usize,
    /// Messages skipped as anomalies
    pub anomalies: usize,
    /// Whether an index existed before this merge
    pub existed: bool,
    /// Entries in the index before the merge
    pub existing: usize,
    /// Entries in the rewritten index
    pub written: usize,
    /// Last filename in the rewritten index
    pub last_filename: Option<String>,
    /// Derivative indexes written
    pub infixes_written: usize,
    /// Derivative indexes that failed
    pub infix_errors: usize,
}

impl TypeResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_upsert(&mut self) {
        self.messages += 1;
        self.upserts += 1;
    }

    pub fn record_anomaly(&mut self) {
        self.messages += 1;
        self.anomalies += 1;
    }
}

/// Outcome of one merge invocation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MergeReport {
    /// Results of types that merged successfully
    pub by_type: BTreeMap<String, TypeResult>,
    /// Types whose merge failed, with the error message
    pub failed_types: BTreeMap<String, String>,
    /// Anomalies across the batch, including messages with no usable type
    pub anomalies: usize,
}

impl MergeReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_result(&mut self, type_name: impl Into<String>, result: TypeResult) {
        self.anomalies += result.anomalies;
        self.by_type.insert(type_name.into(), result);
    }

    pub fn record_failure(&mut self, type_name: impl Into<String>, error: impl ToString) {
        self.failed_types.insert(type_name.into(), error.to_string());
    }

    pub fn record_anomaly(&mut self) {
        self.anomalies += 1;
    }

    /// Whether every type merged.
    pub fn is_success(&self) -> bool {
        self.failed_types.is_empty()
    }

    /// Index entries written across all types.
    pub fn total_written(&self) -> usize {
        self.by_type.values().map(|r| r.written).sum()
    }
}

/// Outcome of writing one type's items into sitemap files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ItemTypeResult {
    /// Items written into a sitemap file
    pub written: usize,
    /// Items skipped because their record already holds the same entry
    pub skipped: usize,
    /// Known items whose entry changed, rewritten in their owning file
    pub updated: usize,
    /// Sitemap files pushed
    pub files_written: Vec<String>,
    /// Owning files rewritten to carry updated entries
    pub files_repaired: Vec<String>,
    /// File continued from a previous invocation, if any
    pub resumed: Option<String>,
    /// Index change messages emitted
    pub messages_emitted: usize,
}

impl ItemTypeResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_written(&mut self) {
        self.written += 1;
    }

    pub fn record_skip(&mut self) {
        self.skipped += 1;
    }

    pub fn record_update(&mut self) {
        self.updated += 1;
    }
}

/// Outcome of one item-writing invocation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ItemWriteReport {
    pub by_type: BTreeMap<String, ItemTypeResult>,
    pub failed_types: BTreeMap<String, String>,
    /// Messages collapsed into a later message for the same item
    pub compacted: usize,
}

impl ItemWriteReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_result(&mut self, type_name: impl Into<String>, result: ItemTypeResult) {
        self.by_type.insert(type_name.into(), result);
    }

    pub fn record_failure(&mut self, type_name: impl Into<String>, error: impl ToString) {
        self.failed_types.insert(type_name.into(), error.to_string());
    }

    pub fn is_success(&self) -> bool {
        self.failed_types.is_empty()
    }

    pub fn total_written(&self) -> usize {
        self.by_type.values().map(|r| r.written).sum()
    }
}

/// Outcome of repairing one sitemap file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairResult {
    pub file_name: String,
    /// Whether the file existed in the blob store
    pub existed: bool,
    /// Owned entries kept from the existing file
    pub kept: usize,
    /// Owned items missing from the file and appended
    pub appended: usize,
    /// Entries dropped because another file owns them, or no record does
    pub dropped_unowned: usize,
    /// Entries dropped because their record asked for removal
    pub removed: usize,
    /// Repeated copies of an owned entry
    pub duplicates: usize,
    /// Entries in the rewritten file
    pub count: usize,
}
