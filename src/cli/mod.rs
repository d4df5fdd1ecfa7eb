//! CLI module for docjoin
//!
//! Provides a command-line interface for:
//! - run: Execute a join plan against a data directory
//! - explain: Show the compiled lookups of the first stage
//! - check: Validate a plan

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{check, explain, run, run_command, run_plan, PlanFile};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_response};
