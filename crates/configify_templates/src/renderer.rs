//! Jinja template rendering.
//!
//! Template names are resolved in two steps: a file under the renderer root
//! wins, otherwise the name itself is used as inline template source. This
//! lets one `render` call serve both "render this file" and "render this
//! string".

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use minijinja::value::{Kwargs, Value};
use minijinja::{AutoEscape, Environment, Error, ErrorKind, State, UndefinedBehavior};
use serde_yaml::Mapping;
use tracing::debug;

use crate::error::{ConfigifyError, ConfigifyResult};

/// Rendering behaviour switches.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Fail on undefined variables instead of rendering them as empty.
    pub strict_undefined: bool,
    /// Keep the trailing newline of template sources.
    pub keep_trailing_newline: bool,
}

impl RenderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strict_undefined(mut self, strict: bool) -> Self {
        self.strict_undefined = strict;
        self
    }

    pub fn keep_trailing_newline(mut self, keep: bool) -> Self {
        self.keep_trailing_newline = keep;
        self
    }
}

/// Template renderer backed by a MiniJinja environment.
pub struct TemplateRenderer {
    env: Environment<'static>,
    root: PathBuf,
}

impl TemplateRenderer {
    /// Create a renderer resolving template files relative to `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_options(root, RenderOptions::default())
    }

    /// Create a renderer with explicit options.
    pub fn with_options(root: impl Into<PathBuf>, options: RenderOptions) -> Self {
        let root = root.into();
        let mut env = Environment::new();

        env.set_loader(choice_loader(root.clone()));
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.set_keep_trailing_newline(options.keep_trailing_newline);
        if options.strict_undefined {
            env.set_undefined_behavior(UndefinedBehavior::Strict);
        }

        env.add_filter("inline_tpl", inline_tpl);
        env.add_filter("yaml", yaml);
        env.add_filter("json", json);

        Self { env, root }
    }

    /// Directory template files and globs are resolved against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Look up a template name as a file only, without the inline fallback.
    pub fn find_file(&self, name: &str) -> Option<PathBuf> {
        let path = self.root.join(name);
        path.is_file().then_some(path)
    }

    /// Render a template by name against `params`.
    pub fn render(&self, name: &str, params: &Mapping) -> ConfigifyResult<String> {
        let template = self
            .env
            .get_template(name)
            .map_err(|e| ConfigifyError::render(name, e))?;

        template
            .render(Value::from_serialize(params))
            .map_err(|e| ConfigifyError::render(name, e))
    }

    /// Render `source` as inline template text, bypassing name resolution.
    pub fn render_str(&self, source: &str, params: &Mapping) -> ConfigifyResult<String> {
        self.render_named_str(source, source, params)
    }

    /// Render already loaded template text under the given name.
    pub fn render_named_str(
        &self,
        name: &str,
        source: &str,
        params: &Mapping,
    ) -> ConfigifyResult<String> {
        self.env
            .render_named_str(name, source, Value::from_serialize(params))
            .map_err(|e| ConfigifyError::render(name, e))
    }
}

/// File lookup under `root`, falling back to the name as the source itself.
fn choice_loader(
    root: PathBuf,
) -> impl Fn(&str) -> Result<Option<String>, Error> + Send + Sync + 'static {
    move |name: &str| {
        let path = root.join(name);
        if !path.is_file() {
            return Ok(Some(name.to_string()));
        }

        debug!("Loading template file {:?}", path);
        fs::read_to_string(&path).map(Some).map_err(|err| {
            Error::new(
                ErrorKind::InvalidOperation,
                format!("could not read template file {}", path.display()),
            )
            .with_source(err)
        })
    }
}

/// Render another template with the calling context plus keyword arguments.
///
/// `{{ "part.tpl" | inline_tpl(title="x") }}`
fn inline_tpl(state: &State, name: String, kwargs: Kwargs) -> Result<String, Error> {
    let mut ctx = BTreeMap::new();

    for var in state.known_variables() {
        if let Some(value) = state.lookup(&var) {
            ctx.insert(var.into_owned(), value);
        }
    }
    for key in kwargs.args() {
        ctx.insert(key.to_string(), kwargs.get::<Value>(key)?);
    }

    state.env().get_template(&name)?.render(ctx)
}

fn yaml(value: Value) -> Result<String, Error> {
    serde_yaml::to_string(&value).map_err(|err| {
        Error::new(ErrorKind::InvalidOperation, "cannot serialize value to YAML").with_source(err)
    })
}

fn json(value: Value) -> Result<String, Error> {
    serde_json::to_string_pretty(&value).map_err(|err| {
        Error::new(ErrorKind::InvalidOperation, "cannot serialize value to JSON").with_source(err)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn params(yaml: &str) -> Mapping {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_inline_fallback() {
        let temp = tempdir().unwrap();
        let renderer = TemplateRenderer::new(temp.path());

        let rendered = renderer
            .render("Hi {{ name }}", &params("name: Sam"))
            .unwrap();
        assert_eq!(rendered, "Hi Sam");
    }

    #[test]
    fn test_file_lookup_wins() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("hello.tpl"), "Hi {{ name }}\n").unwrap();
        let renderer = TemplateRenderer::new(temp.path());

        let rendered = renderer.render("hello.tpl", &params("name: Sam")).unwrap();
        assert_eq!(rendered, "Hi Sam");
        assert!(renderer.find_file("hello.tpl").is_some());
        assert!(renderer.find_file("missing.tpl").is_none());
    }

    #[test]
    fn test_inline_tpl_merges_kwargs() {
        let temp = tempdir().unwrap();
        fs::write(
            temp.path().join("greeting.tpl"),
            "Hello {{ who }} from {{ place }}",
        )
        .unwrap();
        let renderer = TemplateRenderer::new(temp.path());

        let rendered = renderer
            .render(
                "{{ 'greeting.tpl' | inline_tpl(who='Bob') }}",
                &params("who: Al\nplace: Oz"),
            )
            .unwrap();
        assert_eq!(rendered, "Hello Bob from Oz");
    }

    #[test]
    fn test_yaml_filter() {
        let temp = tempdir().unwrap();
        let renderer = TemplateRenderer::new(temp.path());

        let rendered = renderer
            .render("{{ items | yaml }}", &params("items: [1, 2]"))
            .unwrap();
        assert_eq!(rendered, "- 1\n- 2\n");
    }

    #[test]
    fn test_json_filter() {
        let temp = tempdir().unwrap();
        let renderer = TemplateRenderer::new(temp.path());

        let rendered = renderer
            .render("{{ port | json }}", &params("port: 8080"))
            .unwrap();
        assert_eq!(rendered, "8080");
    }

    #[test]
    fn test_undefined_behaviour() {
        let temp = tempdir().unwrap();
        let empty = Mapping::new();

        let lenient = TemplateRenderer::new(temp.path());
        assert_eq!(lenient.render("[{{ missing }}]", &empty).unwrap(), "[]");

        let options = RenderOptions::new().strict_undefined(true);
        let strict = TemplateRenderer::with_options(temp.path(), options);
        let err = strict.render("[{{ missing }}]", &empty).unwrap_err();
        assert!(matches!(err, ConfigifyError::TemplateRender { .. }));
    }

    #[test]
    fn test_no_html_escaping() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("page.html"), "{{ body }}").unwrap();
        let renderer = TemplateRenderer::new(temp.path());

        let rendered = renderer.render("page.html", &params("body: '<b>'")).unwrap();
        assert_eq!(rendered, "<b>");
    }
}
