//! Configuration loading for the sitemap writer.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at `~/.config/sitemap-writer/config.toml`.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::SitemapError;

/// Sitemap protocol limit on URLs per file.
pub const DEFAULT_LIMIT_COUNT: usize = 50_000;

/// Sitemap protocol limit on uncompressed bytes per file.
pub const DEFAULT_LIMIT_BYTES: usize = 50 * 1024 * 1024;

/// Transport hard cap on records per batch request.
pub const DEFAULT_MAX_BATCH_COUNT: usize = 500;

/// 95% of the transport's 5 MiB per-request cap.
pub const DEFAULT_MAX_BATCH_BYTES: usize = 5 * 1024 * 1024 * 95 / 100;

/// Settings for bounded sitemap and index files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSettings {
    /// Public base URL; index entries are `{site_base_url}/{key}`
    #[serde(default = "default_site_base_url")]
    pub site_base_url: String,

    /// Blob directory holding per-type sitemap directories
    #[serde(default = "default_sitemap_directory")]
    pub sitemap_directory: String,

    /// Blob directory holding index files
    #[serde(default = "default_index_directory")]
    pub index_directory: String,

    /// Gzip files before upload
    #[serde(default)]
    pub compress: bool,

    #[serde(default = "default_limit_count")]
    pub limit_count: usize,

    /// Uncompressed byte limit
    #[serde(default = "default_limit_bytes")]
    pub limit_bytes: usize,

    /// Local staging directory (system temp dir when unset)
    #[serde(default)]
    pub staging_dir: Option<String>,

    /// Derivative index directories, e.g. `["de", "fr"]`
    #[serde(default)]
    pub infix_dirs: Vec<String>,

    /// Shard suffix for sitemap file names (`{type}-{shard}-NNNNN.xml`)
    #[serde(default)]
    pub shard_id: Option<u32>,
}

fn default_site_base_url() -> String {
    "https://www.example.com".to_string()
}

fn default_sitemap_directory() -> String {
    "sitemaps".to_string()
}

fn default_index_directory() -> String {
    "sitemaps".to_string()
}

fn default_limit_count() -> usize {
    DEFAULT_LIMIT_COUNT
}

fn default_limit_bytes() -> usize {
    DEFAULT_LIMIT_BYTES
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            site_base_url: default_site_base_url(),
            sitemap_directory: default_sitemap_directory(),
            index_directory: default_index_directory(),
            compress: false,
            limit_count: default_limit_count(),
            limit_bytes: default_limit_bytes(),
            staging_dir: None,
            infix_dirs: Vec::new(),
            shard_id: None,
        }
    }
}

impl FileSettings {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.limit_count == 0 {
            return Err("limit_count must be > 0".to_string());
        }
        if self.limit_bytes == 0 {
            return Err("limit_bytes must be > 0".to_string());
        }
        if self.site_base_url.ends_with('/') {
            return Err(format!(
                "site_base_url must not end with '/', got {}",
                self.site_base_url
            ));
        }
        if let Some(bad) = self
            .infix_dirs
            .iter()
            .find(|d| d.is_empty() || d.contains('/'))
        {
            return Err(format!("invalid infix directory: {bad:?}"));
        }
        Ok(())
    }

    /// Resolved staging directory.
    pub fn staging_path(&self) -> PathBuf {
        self.staging_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir)
    }

    /// Filename root for a type's sitemap files.
    pub fn sitemap_root(&self, type_name: &str) -> String {
        match self.shard_id {
            Some(shard) => format!("{type_name}-{shard}"),
            None => type_name.to_string(),
        }
    }

    /// Blob directory for a type's sitemap files.
    pub fn sitemap_type_directory(&self, type_name: &str) -> String {
        format!("{}/{}", self.sitemap_directory, type_name)
    }

    /// Filename root for a type's primary index.
    pub fn index_root(&self, type_name: &str) -> String {
        format!("{type_name}-index")
    }
}

/// Settings for the stream write pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSettings {
    /// Stream receiving index change messages
    #[serde(default = "default_stream_name")]
    pub stream_name: String,

    #[serde(default = "default_max_batch_count")]
    pub max_batch_count: usize,

    #[serde(default = "default_max_batch_bytes")]
    pub max_batch_bytes: usize,

    /// Simultaneous in-flight batch requests
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Resubmissions of failed records before giving up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Upper bound on total retry time per batch
    #[serde(default = "default_max_retry_secs")]
    pub max_retry_secs: u64,
}

fn default_stream_name() -> String {
    "sitemap-index".to_string()
}

fn default_max_batch_count() -> usize {
    DEFAULT_MAX_BATCH_COUNT
}

fn default_max_batch_bytes() -> usize {
    DEFAULT_MAX_BATCH_BYTES
}

fn default_concurrency() -> usize {
    4
}

fn default_max_retries() -> u32 {
    5
}

fn default_max_retry_secs() -> u64 {
    60
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            stream_name: default_stream_name(),
            max_batch_count: default_max_batch_count(),
            max_batch_bytes: default_max_batch_bytes(),
            concurrency: default_concurrency(),
            max_retries: default_max_retries(),
            max_retry_secs: default_max_retry_secs(),
        }
    }
}

impl StreamSettings {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_batch_count == 0 {
            return Err("max_batch_count must be > 0".to_string());
        }
        if self.max_batch_bytes == 0 {
            return Err("max_batch_bytes must be > 0".to_string());
        }
        if self.concurrency == 0 {
            return Err("concurrency must be >= 1".to_string());
        }
        Ok(())
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Root directory of the filesystem blob store
    #[serde(default = "default_blob_root")]
    pub blob_root: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub files: FileSettings,

    #[serde(default)]
    pub stream: StreamSettings,
}

fn default_blob_root() -> String {
    ProjectDirs::from("", "", "sitemap-writer")
        .map(|p| p.data_local_dir().join("blobs"))
        .unwrap_or_else(|| PathBuf::from("./blobs"))
        .to_string_lossy()
        .to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            blob_root: default_blob_root(),
            log_level: default_log_level(),
            files: FileSettings::default(),
            stream: StreamSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/sitemap-writer/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (SITEMAP_*, nested keys separated by `__`)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, SitemapError> {
        let config_dir = ProjectDirs::from("", "", "sitemap-writer")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let environment = Environment::with_prefix("SITEMAP")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true);

        Self::load_layered(&config_dir.join("config"), cli_config_path, environment)
    }

    fn load_layered(
        default_config_path: &Path,
        cli_config_path: Option<&str>,
        environment: Environment,
    ) -> Result<Self, SitemapError> {
        let mut builder = Config::builder()
            .set_default("blob_root", default_blob_root())
            .map_err(|e| SitemapError::Config(e.to_string()))?
            .set_default("log_level", default_log_level())
            .map_err(|e| SitemapError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Format: SITEMAP_LOG_LEVEL, SITEMAP_FILES__COMPRESS, SITEMAP_STREAM__CONCURRENCY
        builder = builder.add_source(environment);

        let config = builder
            .build()
            .map_err(|e| SitemapError::Config(e.to_string()))?;

        let settings: Settings = config
            .try_deserialize()
            .map_err(|e| SitemapError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), SitemapError> {
        self.files.validate().map_err(SitemapError::Config)?;
        self.stream.validate().map_err(SitemapError::Config)?;
        Ok(())
    }
}
