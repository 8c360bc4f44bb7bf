//! Storage layer for the sitemap writer.
//!
//! Two seams, both async traits:
//! - [`BlobStore`]: where finished sitemap and index files live
//! - [`StateStore`]: authoritative per-item and per-file records
//!
//! Production clients for object storage and the key-value table live
//! outside this workspace. The in-memory implementations back the tests;
//! [`FsBlobStore`] backs the CLI.

pub mod blob;
pub mod error;
pub mod keys;
pub mod state;

pub use blob::{BlobStore, FsBlobStore, MemoryBlobStore, ObjectMeta, StoredObject};
pub use error::StorageError;
pub use keys::{object_key, public_url};
pub use state::{MemoryStateStore, StateStore};
