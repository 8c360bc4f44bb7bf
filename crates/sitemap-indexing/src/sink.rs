//! Destinations for index change messages.

use async_trait::async_trait;
use tracing::{debug, warn};

use sitemap_stream::WritePipeline;
use sitemap_types::IndexChangeMessage;

use crate::error::IndexingError;

/// Receives index change messages produced while writing sitemap files.
#[async_trait]
pub trait IndexEventSink: Send {
    async fn emit(&mut self, message: IndexChangeMessage) -> Result<(), IndexingError>;

    /// Wait until everything emitted so far is delivered.
    async fn finish(&mut self) -> Result<(), IndexingError>;
}

/// Messages go to the stream, partitioned by type so each type's events
/// stay ordered.
#[async_trait]
impl IndexEventSink for WritePipeline {
    async fn emit(&mut self, message: IndexChangeMessage) -> Result<(), IndexingError> {
        let payload = message.to_bytes()?;
        self.enqueue(message.type_name, payload).await?;

        if let Some(error) = self.take_errors().into_iter().next() {
            return Err(error.into());
        }
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), IndexingError> {
        let report = self.drain().await?;
        let mut errors = report.errors.into_iter();
        match errors.next() {
            Some(first) => {
                for other in errors {
                    warn!(error = %other, "Additional batch failure");
                }
                Err(first.into())
            }
            None => Ok(()),
        }
    }
}

/// Keeps messages in memory, e.g. to merge them in-process.
#[derive(Debug, Default)]
pub struct CollectingSink {
    messages: Vec<IndexChangeMessage>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[IndexChangeMessage] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<IndexChangeMessage> {
        self.messages
    }
}

#[async_trait]
impl IndexEventSink for CollectingSink {
    async fn emit(&mut self, message: IndexChangeMessage) -> Result<(), IndexingError> {
        debug!(type_name = %message.type_name, action = %message.action, "Collected index message");
        self.messages.push(message);
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), IndexingError> {
        Ok(())
    }
}
