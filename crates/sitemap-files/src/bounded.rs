//! Append-only, size and count bounded file.
//!
//! A [`BoundedFile`] streams serialized entries into a local staging file,
//! keeps the entries in memory for later reuse, and refuses writes that
//! would take it past its configured limits.
//!
//! ## Lifecycle
//!
//! ```text
//! Open -> Full -> Ended -> Persisted -> Deleted
//!   \______________/^          |            ^
//!                               \___________/   (delete is valid from any state)
//! ```
//!
//! Every instance must finish with [`BoundedFile::end`], optionally
//! [`BoundedFile::push`], and [`BoundedFile::delete`]; the drop impl only
//! removes leftover staging files.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use sitemap_storage::{object_key, BlobStore, ObjectMeta};
use sitemap_types::config::{DEFAULT_LIMIT_BYTES, DEFAULT_LIMIT_COUNT};

use crate::error::FileError;
use crate::xml::{decode_entries, gzip, skeleton_len, XmlEntry};

/// Lifecycle state of a bounded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    /// Accepting writes
    Open,
    /// No capacity left; `end` is the only useful call
    Full,
    /// Finalized and (if configured) compressed locally
    Ended,
    /// Uploaded to the blob store
    Persisted,
    /// Staging artifacts removed
    Deleted,
}

impl std::fmt::Display for FileState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileState::Open => write!(f, "open"),
            FileState::Full => write!(f, "full"),
            FileState::Ended => write!(f, "ended"),
            FileState::Persisted => write!(f, "persisted"),
            FileState::Deleted => write!(f, "deleted"),
        }
    }
}

/// `{root}[-NNNNN].xml[.gz]`
pub fn filename_for(filename_root: &str, ordinal: Option<u32>, compress: bool) -> String {
    let mut name = filename_root.to_string();
    if let Some(ordinal) = ordinal {
        name.push_str(&format!("-{ordinal:05}"));
    }
    name.push_str(".xml");
    if compress {
        name.push_str(".gz");
    }
    name
}

/// Parse the ordinal back out of a rotated filename.
///
/// Returns `None` for files without a 5-digit ordinal suffix.
pub fn ordinal_from_filename(filename: &str) -> Option<u32> {
    let stem = filename.strip_suffix(".gz").unwrap_or(filename);
    let stem = stem.strip_suffix(".xml")?;
    let (_, digits) = stem.rsplit_once('-')?;
    if digits.len() != 5 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Naming, location and limits for one bounded file.
#[derive(Debug, Clone)]
pub struct FileConfig {
    pub filename_root: String,
    /// Blob directory the file is persisted under
    pub directory: String,
    /// Rotation ordinal, `None` for unrotated files such as indexes
    pub ordinal: Option<u32>,
    pub compress: bool,
    pub limit_count: usize,
    /// Uncompressed byte limit
    pub limit_bytes: usize,
    pub staging_dir: PathBuf,
}

impl FileConfig {
    /// Create a config with protocol-default limits and no compression.
    pub fn new(
        filename_root: impl Into<String>,
        directory: impl Into<String>,
        staging_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            filename_root: filename_root.into(),
            directory: directory.into(),
            ordinal: None,
            compress: false,
            limit_count: DEFAULT_LIMIT_COUNT,
            limit_bytes: DEFAULT_LIMIT_BYTES,
            staging_dir: staging_dir.into(),
        }
    }

    /// Rebuild a config from an existing filename such as
    /// `image-1-00003.xml.gz`; the ordinal and compression follow the name.
    pub fn for_filename(
        filename: &str,
        directory: impl Into<String>,
        staging_dir: impl Into<PathBuf>,
    ) -> Result<Self, FileError> {
        let (stem, compress) = match filename.strip_suffix(".gz") {
            Some(stem) => (stem, true),
            None => (filename, false),
        };
        let stem = stem
            .strip_suffix(".xml")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| FileError::Parse(format!("not a sitemap filename: {filename}")))?;

        let mut config = match ordinal_from_filename(filename) {
            Some(ordinal) => {
                let root = &stem[..stem.len() - 6];
                Self::new(root, directory, staging_dir).with_ordinal(ordinal)
            }
            None => Self::new(stem, directory, staging_dir),
        };
        config.compress = compress;
        Ok(config)
    }

    pub fn with_ordinal(mut self, ordinal: u32) -> Self {
        self.ordinal = Some(ordinal);
        self
    }

    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub fn with_limits(mut self, limit_count: usize, limit_bytes: usize) -> Self {
        self.limit_count = limit_count;
        self.limit_bytes = limit_bytes;
        self
    }

    pub fn filename(&self) -> String {
        filename_for(&self.filename_root, self.ordinal, self.compress)
    }

    /// Blob key of the persisted file.
    pub fn key(&self) -> String {
        object_key(&self.directory, &self.filename())
    }
}

/// Result of loading a file from the blob store.
#[derive(Debug)]
pub struct Loaded<E: XmlEntry> {
    /// Fresh open container pre-filled with `items`
    pub file: BoundedFile<E>,
    /// Whether the object existed
    pub existed: bool,
    pub items: Vec<E>,
}

/// Size and count bounded container of XML entries.
#[derive(Debug)]
pub struct BoundedFile<E: XmlEntry> {
    config: FileConfig,
    state: FileState,
    count: usize,
    byte_size: usize,
    items: Vec<E>,
    staging_path: PathBuf,
    compressed_path: Option<PathBuf>,
    writer: Option<BufWriter<File>>,
}

impl<E: XmlEntry> BoundedFile<E> {
    /// Create an empty file and its staging artifact.
    pub fn create(config: FileConfig) -> Result<Self, FileError> {
        fs::create_dir_all(&config.staging_dir)?;
        let staging_path = config.staging_dir.join(format!(
            "{}-{}",
            ulid::Ulid::new(),
            filename_for(&config.filename_root, config.ordinal, false)
        ));
        let mut writer = BufWriter::new(File::create(&staging_path)?);
        writer.write_all(E::HEADER.as_bytes())?;

        debug!(file = %config.filename(), staging = %staging_path.display(), "Created bounded file");

        Ok(Self {
            config,
            state: FileState::Open,
            count: 0,
            byte_size: skeleton_len::<E>(),
            items: Vec::new(),
            staging_path,
            compressed_path: None,
            writer: Some(writer),
        })
    }

    /// Download and parse a file, returning a fresh open container holding
    /// its entries. A missing object yields an empty container and
    /// `existed = false`.
    ///
    /// Existing entries are re-written with the byte limit disregarded so
    /// that legacy oversized files are reproduced faithfully.
    pub async fn load(store: &dyn BlobStore, config: FileConfig) -> Result<Loaded<E>, FileError> {
        let key = config.key();
        let Some(body) = store.get(&key).await? else {
            debug!(key = %key, "No existing object");
            return Ok(Loaded {
                file: Self::create(config)?,
                existed: false,
                items: Vec::new(),
            });
        };

        let items = decode_entries::<E>(&body)?;
        let mut file = Self::create(config)?;
        for item in &items {
            file.write(item.clone(), true)?;
        }
        debug!(key = %key, count = items.len(), "Loaded existing object");

        Ok(Loaded {
            file,
            existed: true,
            items,
        })
    }

    /// Append an entry.
    ///
    /// Fails with [`FileError::AlreadyFull`] when no capacity is left and
    /// with [`FileError::WriteWouldOverflow`] when this entry does not fit.
    /// `disregard_byte_limit` skips the byte checks only; it exists to
    /// reproduce files that are already over the limit.
    pub fn write(&mut self, entry: E, disregard_byte_limit: bool) -> Result<(), FileError> {
        if !matches!(self.state, FileState::Open | FileState::Full) {
            return Err(self.invalid_state("write"));
        }

        if self.count >= self.config.limit_count
            || (!disregard_byte_limit && self.byte_size >= self.config.limit_bytes)
        {
            self.state = FileState::Full;
            return Err(FileError::AlreadyFull {
                filename: self.filename(),
            });
        }

        let xml = entry.to_xml();
        if !disregard_byte_limit && self.byte_size + xml.len() > self.config.limit_bytes {
            return Err(FileError::WriteWouldOverflow {
                filename: self.filename(),
                byte_size: self.byte_size,
                entry_bytes: xml.len(),
                limit_bytes: self.config.limit_bytes,
            });
        }

        let Some(writer) = self.writer.as_mut() else {
            return Err(self.invalid_state("write"));
        };
        writer.write_all(xml.as_bytes())?;

        self.count += 1;
        self.byte_size += xml.len();
        self.items.push(entry);

        if self.remaining_count() == 0 || self.remaining_bytes() == 0 {
            self.state = FileState::Full;
        }
        Ok(())
    }

    /// Finalize content: close the document and compress if configured.
    pub fn end(&mut self) -> Result<(), FileError> {
        match self.state {
            FileState::Open | FileState::Full => {}
            FileState::Ended | FileState::Persisted => return Ok(()),
            FileState::Deleted => return Err(self.invalid_state("end")),
        }

        if let Some(mut writer) = self.writer.take() {
            writer.write_all(E::FOOTER.as_bytes())?;
            writer.flush()?;
        }

        if self.config.compress {
            let plain = fs::read(&self.staging_path)?;
            let compressed_path = self.staging_path.with_extension("xml.gz");
            fs::write(&compressed_path, gzip(&plain)?)?;
            self.compressed_path = Some(compressed_path);
        }

        self.state = FileState::Ended;
        debug!(file = %self.filename(), count = self.count, bytes = self.byte_size, "Ended bounded file");
        Ok(())
    }

    /// Upload the finalized file. Calling it again after success is a no-op.
    pub async fn push(&mut self, store: &dyn BlobStore) -> Result<(), FileError> {
        match self.state {
            FileState::Ended => {}
            FileState::Persisted => {
                debug!(file = %self.filename(), "Already persisted, skipping push");
                return Ok(());
            }
            _ => return Err(self.invalid_state("push")),
        }

        let body = tokio::fs::read(self.final_path()).await?;
        let key = self.key();
        store
            .put(&key, body, ObjectMeta::xml(self.config.compress))
            .await?;

        self.state = FileState::Persisted;
        debug!(key = %key, store = store.name(), count = self.count, "Pushed bounded file");
        Ok(())
    }

    /// Remove local staging artifacts. Never fails on missing files.
    pub fn delete(&mut self) {
        self.writer = None;
        remove_quietly(&self.staging_path);
        if let Some(path) = self.compressed_path.take() {
            remove_quietly(&path);
        }
        self.state = FileState::Deleted;
    }

    /// Finalized bytes as they would be uploaded.
    pub fn contents(&self) -> Result<Vec<u8>, FileError> {
        if !matches!(self.state, FileState::Ended | FileState::Persisted) {
            return Err(self.invalid_state("read"));
        }
        Ok(fs::read(self.final_path())?)
    }

    pub fn config(&self) -> &FileConfig {
        &self.config
    }

    pub fn state(&self) -> FileState {
        self.state
    }

    pub fn filename(&self) -> String {
        self.config.filename()
    }

    pub fn key(&self) -> String {
        self.config.key()
    }

    pub fn ordinal(&self) -> Option<u32> {
        self.config.ordinal
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Uncompressed size including the document skeleton.
    pub fn byte_size(&self) -> usize {
        self.byte_size
    }

    pub fn items(&self) -> &[E] {
        &self.items
    }

    pub fn into_items(mut self) -> Vec<E> {
        std::mem::take(&mut self.items)
    }

    pub fn remaining_count(&self) -> usize {
        self.config.limit_count.saturating_sub(self.count)
    }

    pub fn remaining_bytes(&self) -> usize {
        self.config.limit_bytes.saturating_sub(self.byte_size)
    }

    /// Whether no further entry can be written.
    pub fn is_full(&self) -> bool {
        self.remaining_count() == 0 || self.remaining_bytes() == 0
    }

    fn final_path(&self) -> &Path {
        self.compressed_path.as_deref().unwrap_or(&self.staging_path)
    }

    fn invalid_state(&self, op: &'static str) -> FileError {
        FileError::InvalidState {
            op,
            filename: self.filename(),
            state: self.state,
        }
    }
}

impl<E: XmlEntry> Drop for BoundedFile<E> {
    fn drop(&mut self) {
        if self.state != FileState::Deleted {
            self.delete();
        }
    }
}

fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove staging file");
        }
    }
}

/// Parse a local file without any lifecycle or storage semantics.
///
/// Gzip is detected from the content, not the extension.
pub fn items_from_file<E: XmlEntry>(path: &Path) -> Result<Vec<E>, FileError> {
    let bytes = fs::read(path)?;
    decode_entries(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitemap_storage::MemoryBlobStore;
    use sitemap_types::{IndexEntry, SitemapEntry};
    use tempfile::TempDir;

    use crate::xml::{gunzip, is_gzip};

    fn config(temp: &TempDir) -> FileConfig {
        FileConfig::new("widget", "sitemaps/widget", temp.path())
    }

    fn entry(i: usize) -> SitemapEntry {
        SitemapEntry::new(format!("https://example.com/widget/{i}"))
    }

    #[test]
    fn test_filename_derivation() {
        assert_eq!(filename_for("widget", None, false), "widget.xml");
        assert_eq!(filename_for("widget", Some(1), false), "widget-00001.xml");
        assert_eq!(filename_for("image-1", Some(42), true), "image-1-00042.xml.gz");
    }

    #[test]
    fn test_ordinal_from_filename() {
        assert_eq!(ordinal_from_filename("image-1-00001.xml"), Some(1));
        assert_eq!(ordinal_from_filename("widget-00042.xml.gz"), Some(42));
        assert_eq!(ordinal_from_filename("widget-index.xml"), None);
        assert_eq!(ordinal_from_filename("widget-123.xml"), None);
        assert_eq!(ordinal_from_filename("widget-00001.txt"), None);
    }

    #[test]
    fn test_config_for_filename() {
        let cfg = FileConfig::for_filename("image-1-00003.xml.gz", "sitemaps/image", "/tmp").unwrap();
        assert_eq!(cfg.filename_root, "image-1");
        assert_eq!(cfg.ordinal, Some(3));
        assert!(cfg.compress);
        assert_eq!(cfg.filename(), "image-1-00003.xml.gz");

        let cfg = FileConfig::for_filename("widget-index.xml", "sitemaps", "/tmp").unwrap();
        assert_eq!(cfg.filename_root, "widget-index");
        assert_eq!(cfg.ordinal, None);
        assert!(!cfg.compress);

        assert!(FileConfig::for_filename("notes.txt", "sitemaps", "/tmp").is_err());
        assert!(FileConfig::for_filename(".xml", "sitemaps", "/tmp").is_err());
    }

    #[test]
    fn test_config_key() {
        let temp = TempDir::new().unwrap();
        let cfg = config(&temp).with_ordinal(3).with_compress(true);
        assert_eq!(cfg.key(), "sitemaps/widget/widget-00003.xml.gz");
    }

    #[test]
    fn test_write_tracks_count_and_bytes() {
        let temp = TempDir::new().unwrap();
        let mut file = BoundedFile::<SitemapEntry>::create(config(&temp)).unwrap();
        assert_eq!(file.state(), FileState::Open);
        assert_eq!(file.byte_size(), skeleton_len::<SitemapEntry>());

        file.write(entry(1), false).unwrap();
        file.write(entry(2), false).unwrap();

        assert_eq!(file.count(), 2);
        assert_eq!(
            file.byte_size(),
            skeleton_len::<SitemapEntry>() + entry(1).to_xml().len() + entry(2).to_xml().len()
        );
        assert_eq!(file.items().len(), 2);
        file.delete();
    }

    #[test]
    fn test_count_limit_marks_full() {
        let temp = TempDir::new().unwrap();
        let mut file =
            BoundedFile::<SitemapEntry>::create(config(&temp).with_limits(2, 1_000_000)).unwrap();
        file.write(entry(1), false).unwrap();
        file.write(entry(2), false).unwrap();
        assert_eq!(file.state(), FileState::Full);
        assert!(file.is_full());

        let err = file.write(entry(3), false).unwrap_err();
        assert!(matches!(err, FileError::AlreadyFull { .. }));
        assert_eq!(file.count(), 2);
        file.delete();
    }

    #[test]
    fn test_exact_byte_budget_succeeds() {
        let temp = TempDir::new().unwrap();
        let limit = skeleton_len::<SitemapEntry>() + entry(1).to_xml().len();
        let mut file =
            BoundedFile::<SitemapEntry>::create(config(&temp).with_limits(10, limit)).unwrap();

        file.write(entry(1), false).unwrap();
        assert_eq!(file.remaining_bytes(), 0);
        assert_eq!(file.state(), FileState::Full);
        assert!(matches!(
            file.write(entry(2), false),
            Err(FileError::AlreadyFull { .. })
        ));
        file.delete();
    }

    #[test]
    fn test_one_byte_over_overflows() {
        let temp = TempDir::new().unwrap();
        let limit = skeleton_len::<SitemapEntry>() + entry(1).to_xml().len() - 1;
        let mut file =
            BoundedFile::<SitemapEntry>::create(config(&temp).with_limits(10, limit)).unwrap();

        let err = file.write(entry(1), false).unwrap_err();
        assert!(matches!(err, FileError::WriteWouldOverflow { .. }));
        assert_eq!(file.count(), 0);
        assert_eq!(file.state(), FileState::Open);
        file.delete();
    }

    #[test]
    fn test_disregard_byte_limit_still_respects_count() {
        let temp = TempDir::new().unwrap();
        let mut file = BoundedFile::<SitemapEntry>::create(config(&temp).with_limits(2, 10)).unwrap();

        file.write(entry(1), true).unwrap();
        file.write(entry(2), true).unwrap();
        assert!(file.byte_size() > 10);
        assert!(matches!(
            file.write(entry(3), true),
            Err(FileError::AlreadyFull { .. })
        ));
        file.delete();
    }

    #[test]
    fn test_write_after_end_is_rejected() {
        let temp = TempDir::new().unwrap();
        let mut file = BoundedFile::<SitemapEntry>::create(config(&temp)).unwrap();
        file.end().unwrap();
        let err = file.write(entry(1), false).unwrap_err();
        assert!(matches!(
            err,
            FileError::InvalidState {
                op: "write",
                state: FileState::Ended,
                ..
            }
        ));
        file.delete();
    }

    #[test]
    fn test_end_produces_parseable_document() {
        let temp = TempDir::new().unwrap();
        let mut file = BoundedFile::<SitemapEntry>::create(config(&temp)).unwrap();
        file.write(entry(1), false).unwrap();
        file.end().unwrap();
        file.end().unwrap();

        let bytes = file.contents().unwrap();
        assert_eq!(bytes.len(), file.byte_size());
        let parsed: Vec<SitemapEntry> = decode_entries(&bytes).unwrap();
        assert_eq!(parsed, vec![entry(1)]);
        file.delete();
    }

    #[test]
    fn test_compressed_end() {
        let temp = TempDir::new().unwrap();
        let mut file =
            BoundedFile::<SitemapEntry>::create(config(&temp).with_compress(true)).unwrap();
        file.write(entry(1), false).unwrap();
        file.end().unwrap();

        let bytes = file.contents().unwrap();
        assert!(is_gzip(&bytes));
        assert_eq!(gunzip(&bytes).unwrap().len(), file.byte_size());
        file.delete();
    }

    #[test]
    fn test_delete_removes_staging_and_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let mut file =
            BoundedFile::<SitemapEntry>::create(config(&temp).with_compress(true)).unwrap();
        file.write(entry(1), false).unwrap();
        file.end().unwrap();
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 2);

        file.delete();
        file.delete();
        assert_eq!(file.state(), FileState::Deleted);
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_drop_removes_staging() {
        let temp = TempDir::new().unwrap();
        {
            let mut file = BoundedFile::<SitemapEntry>::create(config(&temp)).unwrap();
            file.write(entry(1), false).unwrap();
        }
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_push_requires_end_and_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let store = MemoryBlobStore::new();
        let mut file =
            BoundedFile::<SitemapEntry>::create(config(&temp).with_ordinal(1).with_compress(true))
                .unwrap();
        file.write(entry(1), false).unwrap();

        assert!(matches!(
            file.push(&store).await,
            Err(FileError::InvalidState { op: "push", .. })
        ));

        file.end().unwrap();
        file.push(&store).await.unwrap();
        file.push(&store).await.unwrap();
        assert_eq!(file.state(), FileState::Persisted);

        let object = store.object("sitemaps/widget/widget-00001.xml.gz").unwrap();
        assert_eq!(object.meta.content_encoding.as_deref(), Some("gzip"));
        assert_eq!(object.meta.content_type, "application/xml");
        file.delete();
    }

    #[tokio::test]
    async fn test_load_missing_object() {
        let temp = TempDir::new().unwrap();
        let store = MemoryBlobStore::new();
        let mut loaded = BoundedFile::<IndexEntry>::load(&store, config(&temp))
            .await
            .unwrap();
        assert!(!loaded.existed);
        assert!(loaded.items.is_empty());
        assert_eq!(loaded.file.count(), 0);
        loaded.file.delete();
    }

    #[tokio::test]
    async fn test_load_roundtrip_compressed() {
        let temp = TempDir::new().unwrap();
        let store = MemoryBlobStore::new();
        let cfg = config(&temp).with_ordinal(2).with_compress(true);

        let mut file = BoundedFile::<SitemapEntry>::create(cfg.clone()).unwrap();
        for i in 0..3 {
            file.write(entry(i), false).unwrap();
        }
        file.end().unwrap();
        file.push(&store).await.unwrap();
        file.delete();

        let mut loaded = BoundedFile::<SitemapEntry>::load(&store, cfg).await.unwrap();
        assert!(loaded.existed);
        assert_eq!(loaded.items, vec![entry(0), entry(1), entry(2)]);
        assert_eq!(loaded.file.count(), 3);
        assert_eq!(loaded.file.state(), FileState::Open);
        loaded.file.delete();
    }

    #[tokio::test]
    async fn test_load_reproduces_oversized_file() {
        let temp = TempDir::new().unwrap();
        let store = MemoryBlobStore::new();

        let mut big = BoundedFile::<SitemapEntry>::create(config(&temp).with_ordinal(1)).unwrap();
        for i in 0..5 {
            big.write(entry(i), false).unwrap();
        }
        big.end().unwrap();
        big.push(&store).await.unwrap();
        big.delete();

        let small = config(&temp).with_ordinal(1).with_limits(100, 64);
        let mut loaded = BoundedFile::<SitemapEntry>::load(&store, small).await.unwrap();
        assert_eq!(loaded.file.count(), 5);
        assert!(loaded.file.is_full());
        loaded.file.delete();
    }

    #[test]
    fn test_items_from_file() {
        let temp = TempDir::new().unwrap();
        let mut file =
            BoundedFile::<SitemapEntry>::create(config(&temp).with_compress(true)).unwrap();
        file.write(entry(7), false).unwrap();
        file.end().unwrap();

        let path = temp.path().join("copy.xml.gz");
        fs::write(&path, file.contents().unwrap()).unwrap();
        let items: Vec<SitemapEntry> = items_from_file(&path).unwrap();
        assert_eq!(items, vec![entry(7)]);
        file.delete();
    }
}
