//! Manifest definitions.
//!
//! A manifest (`Configifile` by default) names the output template and the
//! ordered parameter layers that feed it:
//!
//! ```yaml
//! template: nginx.conf.j2
//! params:
//!   - params/base.yaml
//!   - params/{{ env }}.yaml
//!   - params/overrides/*.yaml
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_yaml::Value;
use tracing::debug;

use crate::error::{ConfigifyError, ConfigifyResult};

/// File name looked up when no manifest path, or a directory, is given.
pub const DEFAULT_MANIFEST_NAME: &str = "Configifile";

/// One layer specifier or an ordered list of them.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum LayerSpecs {
    One(String),
    Many(Vec<String>),
}

impl LayerSpecs {
    /// Specifiers in evaluation order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let specs: &[String] = match self {
            LayerSpecs::One(spec) => std::slice::from_ref(spec),
            LayerSpecs::Many(specs) => specs,
        };
        specs.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        match self {
            LayerSpecs::One(_) => 1,
            LayerSpecs::Many(specs) => specs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LayerSpecs {
    fn default() -> Self {
        LayerSpecs::Many(Vec::new())
    }
}

/// Parsed manifest.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Manifest {
    /// Output template name (file or inline source).
    pub template: String,
    /// Parameter layers.
    pub params: LayerSpecs,
}

const REQUIRED_FIELDS: [&str; 2] = ["template", "params"];

impl Manifest {
    /// Resolve the manifest path: default name in the working directory when
    /// absent, default name inside a given directory.
    pub fn resolve_path(path: Option<&Path>) -> PathBuf {
        match path {
            None => Path::new(".").join(DEFAULT_MANIFEST_NAME),
            Some(p) if p.is_dir() => p.join(DEFAULT_MANIFEST_NAME),
            Some(p) => p.to_path_buf(),
        }
    }

    /// Read and parse a manifest file.
    pub fn load(path: &Path) -> ConfigifyResult<Self> {
        debug!("Loading manifest from {:?}", path);

        let content = fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ConfigifyError::ManifestNotFound(path.to_path_buf()),
            _ => ConfigifyError::Io(e),
        })?;

        Self::parse(path, &content)
    }

    /// Parse manifest text. `path` is only used for error context.
    pub fn parse(path: &Path, content: &str) -> ConfigifyResult<Self> {
        let parse_error = |source: serde_yaml::Error| ConfigifyError::ManifestParse {
            path: path.to_path_buf(),
            source,
        };
        let mut value: Value = serde_yaml::from_str(content).map_err(parse_error)?;
        value.apply_merge().map_err(parse_error)?;

        let Value::Mapping(fields) = &value else {
            return Err(ConfigifyError::InvalidManifest {
                path: path.to_path_buf(),
                message: format!("expected a mapping, found {}", value_kind(&value)),
            });
        };

        for field in REQUIRED_FIELDS {
            if fields.get(field).map_or(true, Value::is_null) {
                return Err(ConfigifyError::MissingManifestField {
                    path: path.to_path_buf(),
                    field,
                });
            }
        }

        serde_yaml::from_value(value).map_err(parse_error)
    }
}

/// Human readable name of a value's kind.
pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
