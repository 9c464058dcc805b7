//! CLI argument definitions using clap
//!
//! Commands:
//! - graphbatch replay --config <path> --script <path> [--verbose]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// graphbatch - depth-ordered write batching diagnostics
#[derive(Parser, Debug)]
#[command(name = "graphbatch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log per-request TRACE events (all logging goes to stderr)
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay a JSON-lines write script and print the executed statements
    Replay {
        /// Path to configuration file
        #[arg(long, default_value = "./graphbatch.json")]
        config: PathBuf,

        /// Path to the JSON-lines script
        #[arg(long)]
        script: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
