//! Sitemap CLI library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (merge, write, inspect, repair)

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands};
pub use commands::{
    init, read_lines, read_state, run_inspect, run_merge, run_repair, run_write, write_state,
    StateSnapshot,
};
