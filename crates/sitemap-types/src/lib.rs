//! # sitemap-types
//!
//! Shared domain types for the sitemap writer.
//!
//! This crate defines the data structures every other crate agrees on:
//! - Entries: [`SitemapEntry`] (content URLs) and [`IndexEntry`] (references to sitemap files)
//! - Messages: change events carried by the stream transport
//! - Records: per-item and per-file state held in the key-value store
//! - Settings: layered configuration
//!
//! ## Usage
//!
//! ```rust
//! use sitemap_types::{IndexAction, IndexChangeMessage, IndexEntry};
//!
//! let msg = IndexChangeMessage::new(
//!     "widget",
//!     IndexAction::Add,
//!     IndexEntry::new("https://example.com/sitemaps/widget/widget-00001.xml"),
//! );
//! assert_eq!(msg.type_name, "widget");
//! ```

pub mod config;
pub mod entry;
pub mod error;
pub mod message;
pub mod record;

pub use config::{FileSettings, Settings, StreamSettings};
pub use entry::{
    now_lastmod, IndexEntry, SitemapEntry, SitemapImage, SitemapLink, SitemapNews,
    SitemapNewsPublication, SitemapVideo,
};
pub use error::SitemapError;
pub use message::{IndexAction, IndexChangeMessage, ItemChangeMessage};
pub use record::{FileRecord, FileStatus, ItemRecord, ItemStatus};
