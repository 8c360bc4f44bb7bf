//! Change messages carried by the stream transport.
//!
//! Two streams exist: item changes (consumed by the sitemap writer) and
//! index changes (consumed by the index merger). Both are JSON encoded.

use serde::{Deserialize, Serialize};

use crate::entry::{IndexEntry, SitemapEntry};

/// Action carried by an index change message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexAction {
    /// A new sitemap file was created
    Add,
    /// An existing sitemap file was rewritten
    Update,
    /// Anything else a producer sent; counted and skipped by the merger
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for IndexAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexAction::Add => write!(f, "add"),
            IndexAction::Update => write!(f, "update"),
            IndexAction::Unknown => write!(f, "unknown"),
        }
    }
}

/// Request to add or refresh one entry of a type's index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexChangeMessage {
    /// Type namespace; selects the index file
    #[serde(rename = "type")]
    pub type_name: String,

    pub action: IndexAction,

    pub index_item: IndexEntry,
}

impl IndexChangeMessage {
    pub fn new(type_name: impl Into<String>, action: IndexAction, index_item: IndexEntry) -> Self {
        Self {
            type_name: type_name.into(),
            action,
            index_item,
        }
    }

    /// Serialize to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Request to place one item into its type's sitemap files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemChangeMessage {
    #[serde(rename = "type")]
    pub type_name: String,

    pub item_id: String,

    pub sitemap_item: SitemapEntry,
}

impl ItemChangeMessage {
    pub fn new(
        type_name: impl Into<String>,
        item_id: impl Into<String>,
        sitemap_item: SitemapEntry,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            item_id: item_id.into(),
            sitemap_item,
        }
    }

    /// Serialize to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
