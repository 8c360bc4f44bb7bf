//! # sitemap-indexing
//!
//! The three sitemap maintenance jobs:
//!
//! - [`ItemWriter`]: writes item changes into numbered sitemap files and
//!   emits one index change message per file it opens or touches
//! - [`IndexMerger`]: folds index change messages into each type's index
//!   and its infix copies
//! - [`FileRepairer`]: rewrites a sitemap file so it holds exactly the
//!   items the state store assigns to it
//!
//! Messages flow from the writer to the merger through an
//! [`IndexEventSink`], normally a [`WritePipeline`](sitemap_stream::WritePipeline).

pub mod error;
pub mod merger;
pub mod repair;
pub mod result;
pub mod sink;
pub mod writer;

pub use error::IndexingError;
pub use merger::{parse_messages, IndexMerger};
pub use repair::FileRepairer;
pub use result::{ItemTypeResult, ItemWriteReport, MergeReport, RepairResult, TypeResult};
pub use sink::{CollectingSink, IndexEventSink};
pub use writer::{compact, parse_item_messages, ItemWriter};
