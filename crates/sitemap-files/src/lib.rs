//! # sitemap-files
//!
//! Bounded sitemap and index files.
//!
//! - [`BoundedFile`]: append-only container with count and byte limits and
//!   an explicit `end` / `push` / `delete` lifecycle
//! - [`BoundedIndex`]: bounded file of [`IndexEntry`](sitemap_types::IndexEntry)
//!   references, with infix derivation
//! - [`FileRotator`]: first-fit writing across numbered files
//!
//! Files stage locally while being written and are uploaded whole to a
//! [`BlobStore`](sitemap_storage::BlobStore).

pub mod bounded;
pub mod error;
pub mod index;
pub mod rotator;
pub mod xml;

pub use bounded::{
    filename_for, items_from_file, ordinal_from_filename, BoundedFile, FileConfig, FileState,
    Loaded,
};
pub use error::FileError;
pub use index::{index_config, infix_url, BoundedIndex, LoadedIndex};
pub use rotator::{FileRotator, RotatorConfig, SitemapFile, WriteOutcome};
pub use xml::{decode_entries, XmlEntry};
