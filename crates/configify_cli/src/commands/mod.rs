//! CLI command definitions.
//!
//! Configify has a single workflow, so the generate arguments are flattened
//! into the top-level command.

use clap::Parser;

pub mod generate;

/// Configify - templated output from templated, layered parameters
#[derive(Parser, Debug)]
#[command(name = "configify")]
#[command(version, about = "Templated output from templated, layered parameters")]
#[command(long_about = r#"
Configify reads a manifest (Configifile by default) naming an output template
and an ordered list of parameter layers, then prints the rendered template.

PIPELINE:
  layers    → each layer is rendered against the params loaded so far,
              parsed as YAML and merged on top (last layer wins per key)
  resolve   → values under `$`-prefixed keys are rendered as templates
  render    → the manifest template is rendered with the final params

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Manifest error
  4 - Template or layer error
"#)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(flatten)]
    pub generate: generate::GenerateArgs,
}
