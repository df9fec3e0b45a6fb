//! Generate command - Render a manifest to stdout or a file.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde_yaml::{Mapping, Value};
use tracing::info;

use configify_templates::{GenerateOptions, Generator};

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Manifest file, or a directory containing a Configifile
    #[arg(env = "CONFIGIFY_MANIFEST")]
    pub path: Option<PathBuf>,

    /// Directory template files and layer globs are resolved against
    #[arg(long, env = "CONFIGIFY_ROOT", default_value = ".")]
    pub root: PathBuf,

    /// Set a parameter before any layer is loaded (value is parsed as YAML)
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_param)]
    pub set: Vec<(String, Value)>,

    /// Fail on undefined template variables
    #[arg(long, env = "CONFIGIFY_STRICT")]
    pub strict: bool,

    /// Keep each layer's raw values under the `_files` parameter
    #[arg(long)]
    pub provenance: bool,

    /// Print the resolved parameters as YAML instead of rendering the template
    #[arg(long)]
    pub dump_params: bool,

    /// Write the output to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn execute(args: GenerateArgs) -> Result<()> {
    if !args.root.is_dir() {
        anyhow::bail!("Template root is not a directory: {:?}", args.root);
    }

    let seed: Mapping = args
        .set
        .into_iter()
        .map(|(key, value)| (Value::String(key), value))
        .collect();

    let options = GenerateOptions::new()
        .with_template_root(&args.root)
        .with_params(seed)
        .provenance(args.provenance)
        .strict_undefined(args.strict);

    let generator = Generator::open_with(args.path.as_deref(), options)?;
    info!("Using manifest {:?}", generator.manifest_path());

    let output = if args.dump_params {
        let params = generator.load_params()?;
        serde_yaml::to_string(&params).context("Failed to serialize parameters")?
    } else {
        generator.generate()?
    };

    match args.output {
        Some(path) => {
            fs::write(&path, &output)
                .with_context(|| format!("Failed to write output to {:?}", path))?;
            info!("Wrote {} bytes to {:?}", output.len(), path);
        }
        None if output.ends_with('\n') => print!("{}", output),
        None => println!("{}", output),
    }

    Ok(())
}

/// Parse a `KEY=VALUE` pair. Values that are not valid YAML are kept as text.
fn parse_param(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))?;

    if key.is_empty() {
        return Err(format!("empty key in '{}'", raw));
    }

    let value = serde_yaml::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}
