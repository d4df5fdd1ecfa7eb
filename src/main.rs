//! docjoin CLI entry point
//!
//! Parses arguments and delegates everything to the CLI module. Errors are
//! printed to stderr and end the process with a non-zero exit code.

use docjoin::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
