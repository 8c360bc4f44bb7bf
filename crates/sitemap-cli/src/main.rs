//! Sitemap Writer CLI
//!
//! Maintains numbered sitemap files and per-type sitemap indexes.
//!
//! # Usage
//!
//! ```bash
//! sitemap-cli merge --input index-messages.jsonl
//! sitemap-cli write --input item-messages.jsonl [--state records.json]
//! sitemap-cli inspect sitemaps/widget/widget-00001.xml.gz
//! sitemap-cli repair --type widget --file widget-00001.xml --state records.json
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/sitemap-writer/config.toml)
//! 3. Environment variables (SITEMAP_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use sitemap_cli::{init, run_inspect, run_merge, run_repair, run_write, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Merge { input } => {
            let settings = init(cli.config.as_deref(), cli.log_level.as_deref())?;
            run_merge(&settings, &input).await?;
        }
        Commands::Write { input, state } => {
            let settings = init(cli.config.as_deref(), cli.log_level.as_deref())?;
            run_write(&settings, &input, state.as_deref()).await?;
        }
        Commands::Inspect { path } => {
            init(cli.config.as_deref(), cli.log_level.as_deref())?;
            run_inspect(&path)?;
        }
        Commands::Repair {
            type_name,
            file,
            state,
        } => {
            let settings = init(cli.config.as_deref(), cli.log_level.as_deref())?;
            run_repair(&settings, &type_name, &file, &state).await?;
        }
    }

    Ok(())
}
