//! Manifest driven output generation.
//!
//! A run goes through three phases, strictly in order:
//!
//! 1. every layer named by the manifest is rendered against the parameters
//!    accumulated so far and merged on top of them,
//! 2. marked (`$`-prefixed) values are resolved once over the merged mapping,
//! 3. the manifest template is rendered against the resolved mapping.
//!
//! Any failure aborts the run; there is no partial output.

use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};
use tracing::{debug, info};

use crate::error::{short_name, ConfigifyError, ConfigifyResult};
use crate::loader::LayerLoader;
use crate::manifest::Manifest;
use crate::renderer::{RenderOptions, TemplateRenderer};
use crate::resolver::TemplateResolver;

/// Options for a generation run.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Directory template files and layer globs are resolved against.
    pub template_root: PathBuf,
    /// Parameters present before the first layer is loaded.
    pub params: Mapping,
    /// Whether to keep each layer's raw contribution under `_files`.
    pub provenance: bool,
    /// Whether undefined template variables are errors.
    pub strict_undefined: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            template_root: PathBuf::from("."),
            params: Mapping::new(),
            provenance: false,
            strict_undefined: false,
        }
    }
}

impl GenerateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.template_root = root.into();
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(Value::String(key.into()), value.into());
        self
    }

    pub fn with_params(mut self, params: Mapping) -> Self {
        self.params.extend(params);
        self
    }

    pub fn provenance(mut self, provenance: bool) -> Self {
        self.provenance = provenance;
        self
    }

    pub fn strict_undefined(mut self, strict: bool) -> Self {
        self.strict_undefined = strict;
        self
    }
}

/// Resolves a manifest into rendered output.
pub struct Generator {
    manifest_path: PathBuf,
    manifest: Manifest,
    options: GenerateOptions,
    renderer: TemplateRenderer,
}

impl Generator {
    /// Open a manifest with default options.
    ///
    /// `path` may be a manifest file, a directory holding `Configifile`, or
    /// `None` for `./Configifile`.
    pub fn open(path: Option<&Path>) -> ConfigifyResult<Self> {
        Self::open_with(path, GenerateOptions::default())
    }

    /// Open a manifest with explicit options. The manifest is read once, here.
    pub fn open_with(path: Option<&Path>, options: GenerateOptions) -> ConfigifyResult<Self> {
        let manifest_path = Manifest::resolve_path(path);
        let manifest = Manifest::load(&manifest_path)?;
        Ok(Self::from_manifest(manifest_path, manifest, options))
    }

    /// Build a generator around an already parsed manifest.
    pub fn from_manifest(
        manifest_path: impl Into<PathBuf>,
        manifest: Manifest,
        options: GenerateOptions,
    ) -> Self {
        let renderer = TemplateRenderer::with_options(
            &options.template_root,
            RenderOptions::new().strict_undefined(options.strict_undefined),
        );

        Self {
            manifest_path: manifest_path.into(),
            manifest,
            options,
            renderer,
        }
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// Load every layer and resolve marked values.
    pub fn load_params(&self) -> ConfigifyResult<Mapping> {
        let mut params = self.options.params.clone();
        let loader = LayerLoader::new(&self.renderer).with_provenance(self.options.provenance);

        for specifier in self.manifest.params.iter() {
            let loaded = loader.load(specifier, &mut params)?;
            debug!("Layer specifier {:?} merged {} file(s)", specifier, loaded);
        }

        let resolved = TemplateResolver::new(&self.renderer).resolve(&mut params)?;
        info!(
            "Loaded {} parameter(s), {} templated",
            params.len(),
            resolved
        );

        Ok(params)
    }

    /// Run all phases and return the rendered output.
    pub fn generate(&self) -> ConfigifyResult<String> {
        info!("Generating from {:?}", self.manifest_path);

        let params = self.load_params()?;
        self.render_output(&params)
    }

    /// Render the manifest template against already resolved parameters.
    pub fn render_output(&self, params: &Mapping) -> ConfigifyResult<String> {
        let template = &self.manifest.template;

        self.renderer
            .render(template, params)
            .map_err(|err| match err {
                ConfigifyError::TemplateRender { source, .. } => ConfigifyError::FinalRender {
                    template: short_name(template),
                    source,
                },
                other => other,
            })
    }
}
