//! Parameter layer loading.

use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};
use tracing::{debug, info};

use crate::error::{ConfigifyError, ConfigifyResult};
use crate::manifest::value_kind;
use crate::renderer::TemplateRenderer;

/// Reserved top-level key holding each layer's raw contribution.
pub const PROVENANCE_KEY: &str = "_files";

const GLOB_CHARS: [char; 3] = ['*', '?', '['];

/// Loads parameter layers into an accumulating mapping.
pub struct LayerLoader<'a> {
    renderer: &'a TemplateRenderer,
    provenance: bool,
}

impl<'a> LayerLoader<'a> {
    /// Create a new layer loader.
    pub fn new(renderer: &'a TemplateRenderer) -> Self {
        Self {
            renderer,
            provenance: false,
        }
    }

    /// Record every layer's parsed mapping under [`PROVENANCE_KEY`].
    pub fn with_provenance(mut self, provenance: bool) -> Self {
        self.provenance = provenance;
        self
    }

    /// Load one layer specifier into `params`, returning the number of
    /// files merged.
    ///
    /// The specifier may itself be a template (rendered against `params`
    /// first) and may be a glob pattern. A glob without matches loads nothing.
    pub fn load(&self, specifier: &str, params: &mut Mapping) -> ConfigifyResult<usize> {
        let specifier = if is_templated(specifier) {
            let rendered = self.renderer.render_str(specifier, params)?;
            debug!("Layer specifier {:?} rendered to {:?}", specifier, rendered);
            rendered
        } else {
            specifier.to_string()
        };

        if !specifier.contains(GLOB_CHARS) {
            let path = self
                .renderer
                .find_file(&specifier)
                .ok_or_else(|| ConfigifyError::LayerTemplateNotFound(specifier.clone()))?;
            self.load_file(&path, params)?;
            return Ok(1);
        }

        let paths = self.expand(&specifier)?;
        if paths.is_empty() {
            debug!("Glob {:?} matched no layers", specifier);
        }
        for path in &paths {
            self.load_file(path, params)?;
        }

        Ok(paths.len())
    }

    /// Expand a glob pattern relative to the renderer root, in lexicographic
    /// order, keeping regular files only. Hidden files only match a pattern
    /// that spells out the leading dot.
    pub fn expand(&self, pattern: &str) -> ConfigifyResult<Vec<PathBuf>> {
        let root = glob::Pattern::escape(&self.renderer.root().to_string_lossy());
        let full = Path::new(&root).join(pattern);
        let full = full.to_string_lossy();

        let options = glob::MatchOptions {
            require_literal_leading_dot: true,
            ..Default::default()
        };
        let entries =
            glob::glob_with(&full, options).map_err(|source| ConfigifyError::InvalidGlob {
                pattern: pattern.to_string(),
                source,
            })?;

        // Unreadable entries are skipped, like non-matches.
        let mut paths: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .filter(|p| p.is_file())
            .collect();
        paths.sort();

        Ok(paths)
    }

    /// Render, parse and merge a single layer file.
    fn load_file(&self, path: &Path, params: &mut Mapping) -> ConfigifyResult<()> {
        let name = self.display_name(path);
        debug!("Loading layer {}", name);

        let source = fs::read_to_string(path).map_err(|source| ConfigifyError::LayerRead {
            path: path.to_path_buf(),
            source,
        })?;
        let rendered = self.renderer.render_named_str(&name, &source, params)?;

        let layer = parse_layer(&name, &rendered)?;
        info!("Loaded layer {} ({} keys)", name, layer.len());

        if self.provenance {
            record_provenance(params, &name, layer.clone());
        }
        merge(params, layer);

        Ok(())
    }

    fn display_name(&self, path: &Path) -> String {
        path.strip_prefix(self.renderer.root())
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned()
    }
}

/// Parse rendered layer text. An empty document is an empty layer and `<<`
/// merge keys are applied.
fn parse_layer(specifier: &str, text: &str) -> ConfigifyResult<Mapping> {
    let parse_error = |source: serde_yaml::Error| ConfigifyError::LayerParse {
        specifier: specifier.to_string(),
        source,
    };
    let mut value: Value = serde_yaml::from_str(text).map_err(parse_error)?;
    value.apply_merge().map_err(parse_error)?;

    match value {
        Value::Mapping(layer) => Ok(layer),
        Value::Null => Ok(Mapping::new()),
        other => Err(ConfigifyError::LayerNotAMapping {
            specifier: specifier.to_string(),
            found: value_kind(&other),
        }),
    }
}

/// Shallow merge: each top-level key of `layer` replaces the previous value.
pub fn merge(params: &mut Mapping, layer: Mapping) {
    for (key, value) in layer {
        params.insert(key, value);
    }
}

fn record_provenance(params: &mut Mapping, name: &str, layer: Mapping) {
    let files = params
        .entry(Value::from(PROVENANCE_KEY))
        .or_insert_with(|| Value::Mapping(Mapping::new()));

    if !matches!(files, Value::Mapping(_)) {
        *files = Value::Mapping(Mapping::new());
    }
    if let Value::Mapping(files) = files {
        files.insert(Value::from(name), Value::Mapping(layer));
    }
}

fn is_templated(specifier: &str) -> bool {
    specifier.contains("{{") || specifier.contains("{%")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn mapping(yaml: &str) -> Mapping {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_merge_is_shallow_last_wins() {
        let mut params = mapping("a: 1\nb: 2\nnested: {x: 1, y: 2}");
        merge(&mut params, mapping("b: 3\nc: 4\nnested: {z: 3}"));

        assert_eq!(params, mapping("a: 1\nb: 3\nnested: {z: 3}\nc: 4"));
    }

    #[test]
    fn test_load_renders_against_current_params() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("layer.yaml"), "greeting: hello {{ name }}\n").unwrap();
        let renderer = TemplateRenderer::new(temp.path());
        let loader = LayerLoader::new(&renderer);

        let mut params = mapping("name: Sam");
        assert_eq!(loader.load("layer.yaml", &mut params).unwrap(), 1);
        assert_eq!(params, mapping("name: Sam\ngreeting: hello Sam"));
    }

    #[test]
    fn test_missing_layer_file() {
        let temp = tempdir().unwrap();
        let renderer = TemplateRenderer::new(temp.path());
        let loader = LayerLoader::new(&renderer);

        let err = loader.load("missing.yaml", &mut Mapping::new()).unwrap_err();
        assert!(matches!(err, ConfigifyError::LayerTemplateNotFound(s) if s == "missing.yaml"));
    }

    #[test]
    fn test_layer_must_be_mapping() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("list.yaml"), "- a\n- b\n").unwrap();
        let renderer = TemplateRenderer::new(temp.path());
        let loader = LayerLoader::new(&renderer);

        let err = loader.load("list.yaml", &mut Mapping::new()).unwrap_err();
        assert!(matches!(
            err,
            ConfigifyError::LayerNotAMapping { found: "a sequence", .. }
        ));
    }

    #[test]
    fn test_layer_parse_error() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("bad.yaml"), "a: [1, 2\n").unwrap();
        let renderer = TemplateRenderer::new(temp.path());
        let loader = LayerLoader::new(&renderer);

        let err = loader.load("bad.yaml", &mut Mapping::new()).unwrap_err();
        assert!(matches!(err, ConfigifyError::LayerParse { .. }));
    }

    #[test]
    fn test_merge_keys_are_applied() {
        let temp = tempdir().unwrap();
        fs::write(
            temp.path().join("web.yaml"),
            "base: &base {port: 80, tls: false}\nweb:\n  <<: *base\n  host: x\n  tls: true\n",
        )
        .unwrap();
        let renderer = TemplateRenderer::new(temp.path());
        let loader = LayerLoader::new(&renderer);

        let mut params = Mapping::new();
        loader.load("web.yaml", &mut params).unwrap();
        assert_eq!(
            params.get("web"),
            Some(&Value::Mapping(mapping("port: 80\ntls: true\nhost: x")))
        );
    }

    #[test]
    fn test_empty_layer() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("empty.yaml"), "# nothing yet\n").unwrap();
        let renderer = TemplateRenderer::new(temp.path());
        let loader = LayerLoader::new(&renderer);

        let mut params = mapping("a: 1");
        loader.load("empty.yaml", &mut params).unwrap();
        assert_eq!(params, mapping("a: 1"));
    }

    #[test]
    fn test_glob_loads_in_lexicographic_order() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("conf.d");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("20-b.yaml"), "value: b\nb: true\n").unwrap();
        fs::write(dir.join("10-a.yaml"), "value: a\na: true\n").unwrap();
        fs::write(dir.join("notes.txt"), "value: ignored\n").unwrap();
        let renderer = TemplateRenderer::new(temp.path());
        let loader = LayerLoader::new(&renderer);

        let mut params = Mapping::new();
        assert_eq!(loader.load("conf.d/*.yaml", &mut params).unwrap(), 2);
        assert_eq!(params, mapping("value: b\na: true\nb: true"));
    }

    #[test]
    fn test_glob_skips_hidden_files() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("conf.d");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("10-a.yaml"), "value: a\n").unwrap();
        fs::write(dir.join(".z-backup.yaml"), "value: stale\n").unwrap();
        let renderer = TemplateRenderer::new(temp.path());
        let loader = LayerLoader::new(&renderer);

        let mut params = Mapping::new();
        assert_eq!(loader.load("conf.d/*.yaml", &mut params).unwrap(), 1);
        assert_eq!(params, mapping("value: a"));

        assert_eq!(loader.load("conf.d/.*.yaml", &mut params).unwrap(), 1);
        assert_eq!(params, mapping("value: stale"));
    }

    #[test]
    fn test_glob_without_matches_is_noop() {
        let temp = tempdir().unwrap();
        let renderer = TemplateRenderer::new(temp.path());
        let loader = LayerLoader::new(&renderer);

        let mut params = mapping("a: 1");
        assert_eq!(loader.load("nothing/*.yaml", &mut params).unwrap(), 0);
        assert_eq!(params, mapping("a: 1"));
    }

    #[test]
    fn test_invalid_glob() {
        let temp = tempdir().unwrap();
        let renderer = TemplateRenderer::new(temp.path());
        let loader = LayerLoader::new(&renderer);

        let err = loader.load("conf.d/***.yaml", &mut Mapping::new()).unwrap_err();
        assert!(matches!(err, ConfigifyError::InvalidGlob { .. }));
    }

    #[test]
    fn test_templated_specifier() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("config.prod.yaml"), "replicas: 3\n").unwrap();
        let renderer = TemplateRenderer::new(temp.path());
        let loader = LayerLoader::new(&renderer);

        let mut params = mapping("env: prod");
        loader.load("config.{{ env }}.yaml", &mut params).unwrap();
        assert_eq!(params, mapping("env: prod\nreplicas: 3"));
    }

    #[test]
    fn test_provenance_record() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.yaml"), "a: 1\n").unwrap();
        fs::write(temp.path().join("b.yaml"), "a: 2\n").unwrap();
        let renderer = TemplateRenderer::new(temp.path());
        let loader = LayerLoader::new(&renderer).with_provenance(true);

        let mut params = Mapping::new();
        loader.load("a.yaml", &mut params).unwrap();
        loader.load("b.yaml", &mut params).unwrap();

        assert_eq!(params.get("a"), Some(&Value::from(2)));
        assert_eq!(
            params.get(PROVENANCE_KEY),
            Some(&Value::Mapping(mapping("a.yaml: {a: 1}\nb.yaml: {a: 2}")))
        );
    }
}
