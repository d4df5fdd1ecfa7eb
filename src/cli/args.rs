//! CLI argument definitions using clap
//!
//! Commands:
//! - docjoin run --plan <path> --data <dir> [--config <path>]
//! - docjoin explain --plan <path> --data <dir> [--config <path>]
//! - docjoin check --plan <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// docjoin - composite-key joins over a document store
#[derive(Parser, Debug)]
#[command(name = "docjoin")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute a join plan and print the enriched records
    Run {
        /// Path to the plan file
        #[arg(long)]
        plan: PathBuf,

        /// Directory of `<collection>.json` files
        #[arg(long)]
        data: PathBuf,

        /// Path to engine configuration
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the lookups the first stage would issue
    Explain {
        /// Path to the plan file
        #[arg(long)]
        plan: PathBuf,

        /// Directory of `<collection>.json` files
        #[arg(long)]
        data: PathBuf,

        /// Path to engine configuration
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate a plan without touching any data
    Check {
        /// Path to the plan file
        #[arg(long)]
        plan: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
