//! CLI argument parsing for the sitemap writer.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Sitemap Writer
///
/// Maintains sitemap files and per-type sitemap indexes in a blob store.
#[derive(Parser, Debug)]
#[command(name = "sitemap-cli")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/sitemap-writer/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Merge index change messages into the type indexes
    Merge {
        /// JSON lines file, one index change message per line
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Write sitemap items into sitemap files, then merge the resulting
    /// index messages
    Write {
        /// JSON lines file, one item change message per line
        #[arg(short, long)]
        input: PathBuf,

        /// JSON file of item and file records, read before and saved after the run
        #[arg(short, long)]
        state: Option<PathBuf>,
    },

    /// Print the entries of a local sitemap or index file
    Inspect {
        /// Sitemap or index file, optionally gzipped
        path: PathBuf,
    },

    /// Rewrite a sitemap file to hold exactly the items its records assign to it
    Repair {
        /// Item type
        #[arg(short = 't', long = "type")]
        type_name: String,

        /// Sitemap filename, e.g. widget-00003.xml
        #[arg(short, long)]
        file: String,

        /// JSON file of item and file records, saved back after the repair
        #[arg(short, long)]
        state: PathBuf,
    },
}
