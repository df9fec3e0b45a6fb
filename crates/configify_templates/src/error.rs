//! Error types for parameter loading and rendering.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for configify operations.
pub type ConfigifyResult<T> = Result<T, ConfigifyError>;

/// Errors that can occur while resolving a manifest into output.
///
/// Every variant is fatal for the run: nothing is rendered once one of these
/// has been raised.
#[derive(Error, Debug)]
pub enum ConfigifyError {
    #[error("Manifest not found: {}", .0.display())]
    ManifestNotFound(PathBuf),

    #[error("Failed to parse manifest {}: {source}", path.display())]
    ManifestParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid manifest {}: {message}", path.display())]
    InvalidManifest { path: PathBuf, message: String },

    #[error("Manifest {} is missing required field '{field}'", path.display())]
    MissingManifestField { path: PathBuf, field: &'static str },

    #[error("Layer template not found: {0}")]
    LayerTemplateNotFound(String),

    #[error("Failed to read layer {}: {source}", path.display())]
    LayerRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse layer {specifier}: {source}")]
    LayerParse {
        specifier: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Layer {specifier} must be a mapping, found {found}")]
    LayerNotAMapping {
        specifier: String,
        found: &'static str,
    },

    #[error("Invalid glob pattern {pattern}: {source}")]
    InvalidGlob {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("Template rendering failed for {template}: {source}")]
    TemplateRender {
        template: String,
        #[source]
        source: minijinja::Error,
    },

    #[error("Rendering output template {template} failed: {source}")]
    FinalRender {
        template: String,
        #[source]
        source: minijinja::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigifyError {
    pub(crate) fn render(template: &str, source: minijinja::Error) -> Self {
        Self::TemplateRender {
            template: short_name(template),
            source,
        }
    }

    /// Whether the failure happened before any layer was loaded.
    pub fn is_manifest_error(&self) -> bool {
        matches!(
            self,
            Self::ManifestNotFound(_)
                | Self::ManifestParse { .. }
                | Self::InvalidManifest { .. }
                | Self::MissingManifestField { .. }
        )
    }
}

const MAX_NAME_LEN: usize = 48;

/// Shorten a template name for messages. Inline sources can be whole documents.
pub(crate) fn short_name(name: &str) -> String {
    let first_line = name.lines().next().unwrap_or("");
    let truncated = first_line.chars().count() > MAX_NAME_LEN || first_line.len() < name.len();

    if truncated {
        let head: String = first_line.chars().take(MAX_NAME_LEN).collect();
        format!("'{}...'", head)
    } else {
        format!("'{}'", name)
    }
}
