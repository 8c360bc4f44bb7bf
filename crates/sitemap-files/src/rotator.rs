//! Multi-file rotation.
//!
//! [`FileRotator`] keeps exactly one sitemap file open. A write that does
//! not fit closes it, opens the next ordinal, registers the new file in the
//! index and writes there. Closed files are never revisited.

use std::path::PathBuf;

use tracing::{debug, info};

use sitemap_storage::public_url;
use sitemap_types::{now_lastmod, FileSettings, IndexEntry, SitemapEntry};

use crate::bounded::{BoundedFile, FileConfig};
use crate::error::FileError;
use crate::index::BoundedIndex;

pub type SitemapFile = BoundedFile<SitemapEntry>;

/// Naming, compression and limits for the files of one rotation sequence.
#[derive(Debug, Clone)]
pub struct RotatorConfig {
    pub filename_root: String,
    pub directory: String,
    pub site_base_url: String,
    pub compress: bool,
    pub limit_count: usize,
    pub limit_bytes: usize,
    pub staging_dir: PathBuf,
}

impl RotatorConfig {
    /// Sitemap rotation settings for one type.
    pub fn for_type(settings: &FileSettings, type_name: &str) -> Self {
        Self {
            filename_root: settings.sitemap_root(type_name),
            directory: settings.sitemap_type_directory(type_name),
            site_base_url: settings.site_base_url.clone(),
            compress: settings.compress,
            limit_count: settings.limit_count,
            limit_bytes: settings.limit_bytes,
            staging_dir: settings.staging_path(),
        }
    }

    pub fn with_limits(mut self, limit_count: usize, limit_bytes: usize) -> Self {
        self.limit_count = limit_count;
        self.limit_bytes = limit_bytes;
        self
    }

    /// File config for the given ordinal.
    pub fn file_config(&self, ordinal: u32) -> FileConfig {
        FileConfig::new(&self.filename_root, &self.directory, self.staging_dir.clone())
            .with_ordinal(ordinal)
            .with_compress(self.compress)
            .with_limits(self.limit_count, self.limit_bytes)
    }
}

/// What a rotating write did.
#[must_use]
#[derive(Debug)]
pub enum WriteOutcome {
    /// Entry landed in the file that was already current
    Written,
    /// The previous file was ended and handed back; the entry landed in a new file
    Rotated(SitemapFile),
}

/// Writes entries into a sequence of numbered sitemap files.
#[derive(Debug)]
pub struct FileRotator {
    config: RotatorConfig,
    count: u32,
    current: Option<SitemapFile>,
}

impl FileRotator {
    /// Start a fresh sequence; the first file gets ordinal 1.
    pub fn new(config: RotatorConfig) -> Self {
        Self::resume(config, 0, None)
    }

    /// Continue a sequence whose highest ordinal is `count`, optionally
    /// writing into an already open file first.
    pub fn resume(config: RotatorConfig, count: u32, current: Option<SitemapFile>) -> Self {
        Self {
            config,
            count,
            current,
        }
    }

    /// Write `entry`, rotating to a new file when the current one cannot
    /// take it.
    ///
    /// The write into a freshly rotated file disregards the byte limit: a
    /// single entry larger than the limit lands alone in its own file.
    pub fn write_or_rotate_and_write(
        &mut self,
        index: &mut BoundedIndex,
        entry: SitemapEntry,
    ) -> Result<WriteOutcome, FileError> {
        let mut current = match self.current.take() {
            Some(file) => file,
            None => self.open_next(index)?,
        };

        match current.write(entry.clone(), false) {
            Ok(()) => {
                self.current = Some(current);
                Ok(WriteOutcome::Written)
            }
            Err(e) if e.is_capacity() => {
                debug!(file = %current.filename(), error = %e, "Rotating sitemap file");
                current.end()?;
                let mut next = self.open_next(index)?;
                next.write(entry, true)?;
                self.current = Some(next);
                Ok(WriteOutcome::Rotated(current))
            }
            Err(e) => {
                self.current = Some(current);
                Err(e)
            }
        }
    }

    /// Highest ordinal opened so far.
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn current(&self) -> Option<&SitemapFile> {
        self.current.as_ref()
    }

    /// Hand back the open file, leaving the rotator empty.
    pub fn take_current(&mut self) -> Option<SitemapFile> {
        self.current.take()
    }

    pub fn config(&self) -> &RotatorConfig {
        &self.config
    }

    fn open_next(&mut self, index: &mut BoundedIndex) -> Result<SitemapFile, FileError> {
        self.count += 1;
        let file = BoundedFile::create(self.config.file_config(self.count))?;
        let url = public_url(&self.config.site_base_url, &file.key());
        index.write(IndexEntry::new(url).with_lastmod(now_lastmod()))?;
        info!(file = %file.filename(), ordinal = self.count, "Opened sitemap file");
        Ok(file)
    }
}
