//! Application entry point.
//!
//! Parses command-line arguments and delegates execution to
//! [`runner::run`].

use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::fmt;
use tsugite::{cli::Cli, runner};

fn main() -> ExitCode {
    let cli = Cli::parse_with_default();
    let max_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::ERROR
    };
    fmt().with_max_level(max_level).init();
    match runner::run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let chain = format!("{err:#}");
            tracing::error!(error = %chain, "build driver failed");
            ExitCode::FAILURE
        }
    }
}
