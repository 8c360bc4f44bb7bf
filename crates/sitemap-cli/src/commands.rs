//! Command implementations for the sitemap CLI.
//!
//! Every command loads layered settings, applies CLI overrides, and runs
//! against a filesystem blob store rooted at `blob_root`. Reports are
//! printed to stdout as JSON; logs go to stderr.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use sitemap_files::{items_from_file, FileError};
use sitemap_indexing::{
    CollectingSink, FileRepairer, IndexMerger, ItemWriteReport, ItemWriter, MergeReport,
};
use sitemap_storage::{FsBlobStore, MemoryStateStore};
use sitemap_types::{FileRecord, IndexEntry, ItemRecord, Settings, SitemapEntry};

/// Load configuration and initialize logging.
pub fn init(config_path: Option<&str>, log_level_override: Option<&str>) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;
    if let Some(log_level) = log_level_override {
        settings.log_level = log_level.to_string();
    }

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!(
        blob_root = %settings.blob_root,
        site = %settings.files.site_base_url,
        compress = settings.files.compress,
        "Configuration loaded"
    );
    Ok(settings)
}

/// Merge index change messages from a JSON lines file.
pub async fn run_merge(settings: &Settings, input: &Path) -> Result<()> {
    let records = read_lines(input)?;
    let store = Arc::new(FsBlobStore::new(&settings.blob_root));
    let merger = IndexMerger::new(store, settings.files.clone());

    let report = merger.handle_records(&records).await?;
    print_json(&report)?;
    if !report.is_success() {
        anyhow::bail!("{} type(s) failed to merge", report.failed_types.len());
    }
    Ok(())
}

/// Item and file records kept between invocations.
#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    #[serde(default)]
    pub items: Vec<ItemRecord>,
    #[serde(default)]
    pub files: Vec<FileRecord>,
}

impl StateSnapshot {
    pub fn capture(store: &MemoryStateStore) -> Self {
        Self {
            items: store.item_records(),
            files: store.file_records(),
        }
    }

    pub fn into_store(self) -> MemoryStateStore {
        MemoryStateStore::with_items(self.items).with_files(self.files)
    }
}

#[derive(Debug, Serialize)]
struct WriteSummary {
    items: ItemWriteReport,
    index: MergeReport,
}

/// Write item change messages into sitemap files and merge the index
/// messages they produce.
pub async fn run_write(settings: &Settings, input: &Path, state_path: Option<&Path>) -> Result<()> {
    let records = read_lines(input)?;
    let store = Arc::new(FsBlobStore::new(&settings.blob_root));
    let state = Arc::new(match state_path {
        Some(path) if path.exists() => read_state(path)?.into_store(),
        _ => MemoryStateStore::new(),
    });

    let writer = ItemWriter::new(store.clone(), state.clone(), settings.files.clone());
    let mut sink = CollectingSink::new();
    let items = writer.handle_records(&records, &mut sink).await?;

    let merger = IndexMerger::new(store, settings.files.clone());
    let index = merger.process_batch(sink.into_messages()).await;

    if let Some(path) = state_path {
        write_state(path, &StateSnapshot::capture(&state))?;
    }

    let success = items.is_success() && index.is_success();
    print_json(&WriteSummary { items, index })?;
    if !success {
        anyhow::bail!("Some types failed; see report");
    }
    Ok(())
}

/// Print the entries of a sitemap or index file, one JSON object per line.
pub fn run_inspect(path: &Path) -> Result<()> {
    match items_from_file::<SitemapEntry>(path) {
        Ok(entries) => print_lines(&entries),
        Err(FileError::Parse(reason)) => {
            warn!(path = %path.display(), reason = %reason, "Not a sitemap, trying index");
            let entries = items_from_file::<IndexEntry>(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            print_lines(&entries)
        }
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

/// Repair one sitemap file against the item records in `state_path`.
pub async fn run_repair(
    settings: &Settings,
    type_name: &str,
    file_name: &str,
    state_path: &Path,
) -> Result<()> {
    let store = Arc::new(FsBlobStore::new(&settings.blob_root));
    let state = Arc::new(read_state(state_path)?.into_store());
    let repairer = FileRepairer::new(store, state.clone(), settings.files.clone());

    let result = repairer.repair_file(type_name, file_name).await?;
    write_state(state_path, &StateSnapshot::capture(&state))?;
    print_json(&result)
}

/// Non-empty lines of a JSON lines file, as raw records.
pub fn read_lines(path: &Path) -> Result<Vec<Vec<u8>>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.as_bytes().to_vec())
        .collect())
}

pub fn read_state(path: &Path) -> Result<StateSnapshot> {
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid state records in {}", path.display()))
}

pub fn write_state(path: &Path, snapshot: &StateSnapshot) -> Result<()> {
    let json = serde_json::to_string_pretty(snapshot)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_lines<T: Serialize>(entries: &[T]) -> Result<()> {
    for entry in entries {
        println!("{}", serde_json::to_string(entry)?);
    }
    Ok(())
}
