//! Blob storage seam.
//!
//! Objects are whole files addressed by key. A missing object is
//! `Ok(None)`, never an error: callers treat it as "no prior state".

use std::collections::{BTreeMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use tracing::debug;

use crate::error::StorageError;

/// Content headers stored alongside an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub content_type: String,
    pub content_encoding: Option<String>,
}

impl ObjectMeta {
    /// Headers for an XML document, gzip encoded when `compressed`.
    pub fn xml(compressed: bool) -> Self {
        Self {
            content_type: "application/xml".to_string(),
            content_encoding: compressed.then(|| "gzip".to_string()),
        }
    }
}

/// Object as held by [`MemoryBlobStore`].
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub meta: ObjectMeta,
}

/// Whole-object blob storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch an object body, `None` if it does not exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Create or replace an object.
    async fn put(&self, key: &str, body: Vec<u8>, meta: ObjectMeta) -> Result<(), StorageError>;

    /// Name of this store for logging.
    fn name(&self) -> &str;
}

/// In-process store used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    objects: RwLock<BTreeMap<String, StoredObject>>,
    failing_prefixes: Mutex<HashSet<String>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `get` of a key starting with `prefix` fail.
    pub fn fail_reads_with_prefix(&self, prefix: impl Into<String>) {
        self.failing_prefixes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(prefix.into());
    }

    /// Snapshot of a stored object.
    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.objects
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_failing(&self, key: &str) -> bool {
        self.failing_prefixes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .any(|p| key.starts_with(p.as_str()))
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        if self.is_failing(key) {
            return Err(StorageError::Backend(format!("injected read failure for {key}")));
        }
        Ok(self.object(key).map(|o| o.body))
    }

    async fn put(&self, key: &str, body: Vec<u8>, meta: ObjectMeta) -> Result<(), StorageError> {
        debug!(key = key, bytes = body.len(), "Stored object in memory");
        self.objects
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), StoredObject { body, meta });
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Store rooted at a local directory; keys map to relative paths.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if key.is_empty() || escapes {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(body) => Ok(Some(body)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, body: Vec<u8>, meta: ObjectMeta) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &body).await?;
        debug!(
            path = %path.display(),
            bytes = body.len(),
            content_encoding = ?meta.content_encoding,
            "Stored object on disk"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "filesystem"
    }
}
