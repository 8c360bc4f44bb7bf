//! Index files: bounded files whose entries reference sitemap files.

use sitemap_storage::BlobStore;
use sitemap_types::{FileSettings, IndexEntry};

use crate::bounded::{BoundedFile, FileConfig, FileState};
use crate::error::FileError;

/// Config of a type's primary index.
pub fn index_config(settings: &FileSettings, type_name: &str) -> FileConfig {
    FileConfig::new(
        settings.index_root(type_name),
        &settings.index_directory,
        settings.staging_path(),
    )
    .with_compress(settings.compress)
    .with_limits(settings.limit_count, settings.limit_bytes)
}

/// Result of loading an index from the blob store.
#[derive(Debug)]
pub struct LoadedIndex {
    pub index: BoundedIndex,
    pub existed: bool,
    pub items: Vec<IndexEntry>,
}

/// A [`BoundedFile`] of [`IndexEntry`] values.
#[derive(Debug)]
pub struct BoundedIndex {
    file: BoundedFile<IndexEntry>,
}

impl BoundedIndex {
    pub fn create(config: FileConfig) -> Result<Self, FileError> {
        Ok(Self {
            file: BoundedFile::create(config)?,
        })
    }

    /// Load an index; a missing object is an empty index with `existed = false`.
    pub async fn load(store: &dyn BlobStore, config: FileConfig) -> Result<LoadedIndex, FileError> {
        let loaded = BoundedFile::load(store, config).await?;
        Ok(LoadedIndex {
            index: Self { file: loaded.file },
            existed: loaded.existed,
            items: loaded.items,
        })
    }

    /// Append a reference to a sitemap file.
    pub fn write(&mut self, entry: IndexEntry) -> Result<(), FileError> {
        self.file.write(entry, false)
    }

    /// Filename of the most recently added entry.
    pub fn last_filename(&self) -> Option<&str> {
        self.file.items().last().map(IndexEntry::filename)
    }

    pub fn count(&self) -> usize {
        self.file.count()
    }

    pub fn items(&self) -> &[IndexEntry] {
        self.file.items()
    }

    pub fn state(&self) -> FileState {
        self.file.state()
    }

    pub fn config(&self) -> &FileConfig {
        self.file.config()
    }

    pub fn filename(&self) -> String {
        self.file.filename()
    }

    pub fn key(&self) -> String {
        self.file.key()
    }

    pub fn end(&mut self) -> Result<(), FileError> {
        self.file.end()
    }

    pub async fn push(&mut self, store: &dyn BlobStore) -> Result<(), FileError> {
        self.file.push(store).await
    }

    pub fn delete(&mut self) {
        self.file.delete()
    }

    pub fn contents(&self) -> Result<Vec<u8>, FileError> {
        self.file.contents()
    }

    /// Build the derivative index for `infix` from this index's entries.
    ///
    /// The result is open; the caller ends, pushes and deletes it.
    /// Derivative entries mirror the primary one-for-one, so only the count
    /// limit applies to them.
    pub fn derive_infix(&self, infix: &str) -> Result<BoundedIndex, FileError> {
        let mut config = self.file.config().clone();
        config.filename_root = format!("{}-{}", config.filename_root, infix);

        let mut derived = BoundedFile::create(config)?;
        for item in self.file.items() {
            let mut entry = IndexEntry::new(infix_url(&item.url, infix));
            entry.lastmod = item.lastmod.clone();
            derived.write(entry, true)?;
        }
        Ok(BoundedIndex { file: derived })
    }
}

/// Insert `/{infix}/` before the last path segment and prefix that segment
/// with `{infix}-`.
///
/// `https://ex.com/sitemaps/a/a-1.xml` with `de` becomes
/// `https://ex.com/sitemaps/a/de/de-a-1.xml`.
pub fn infix_url(url: &str, infix: &str) -> String {
    match url.rsplit_once('/') {
        Some((prefix, last)) => format!("{prefix}/{infix}/{infix}-{last}"),
        None => format!("{infix}/{infix}-{url}"),
    }
}
