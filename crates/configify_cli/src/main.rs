//! Configify CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments (reported by clap)
//! - 3: Manifest error
//! - 4: Template or layer error

use std::process::ExitCode;

use clap::Parser;
use configify_templates::ConfigifyError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::Cli;

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const MANIFEST_ERROR: u8 = 3;
    pub const TEMPLATE_ERROR: u8 = 4;
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries only the generated output.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(cli.verbose, cli.quiet)));
    let log_result = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    if log_result.is_err() {
        // Logging already initialized, continue
    }

    match commands::generate::execute(cli.generate) {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(categorize_error(&e))
        }
    }
}

fn default_directives(verbose: bool, quiet: bool) -> &'static str {
    if quiet {
        "error"
    } else if verbose {
        "configify_cli=debug,configify_templates=debug,warn"
    } else {
        "configify_cli=info,configify_templates=info,warn"
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    match e.downcast_ref::<ConfigifyError>() {
        Some(err) if err.is_manifest_error() => ExitCodes::MANIFEST_ERROR,
        Some(ConfigifyError::Io(_)) => ExitCodes::GENERAL_ERROR,
        Some(_) => ExitCodes::TEMPLATE_ERROR,
        None => ExitCodes::GENERAL_ERROR,
    }
}
