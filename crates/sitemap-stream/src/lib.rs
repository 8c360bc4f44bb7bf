//! # sitemap-stream
//!
//! Moves discrete records into a stream transport under per-request count
//! and byte limits.
//!
//! ```text
//! enqueue -> Chunker -> BackgroundWriter -> Retrier -> StreamTransport
//! ```
//!
//! - [`Chunker`] cuts batches before they would cross either bound
//! - [`BackgroundWriter`] caps in-flight requests and collects outcomes
//! - [`Retrier`] resubmits only the records a transport reported as failed
//!
//! [`WritePipeline`] wires the three together.

pub mod background;
pub mod chunker;
pub mod error;
pub mod pipeline;
pub mod record;
pub mod retrier;
pub mod transport;

pub use background::{BackgroundWriter, BatchSink, WriteReport};
pub use chunker::{ChunkLimits, Chunker};
pub use error::{StreamError, TransportError};
pub use pipeline::WritePipeline;
pub use record::{PutRecordsOutput, StreamRecord};
pub use retrier::Retrier;
pub use transport::{MemoryTransport, StreamTransport, TransportConfig, THROTTLED_CODE};
