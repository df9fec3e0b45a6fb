//! Resolution of marked template values inside the parameter tree.
//!
//! Any mapping key starting with [`MARKER`] marks the scalar stored under it
//! as a template name. The resolver renders that template against the full
//! parameter mapping and stores the output in place of the name; the key is
//! kept as is. The marker only applies to the value directly under the key:
//! a marked key holding a mapping or sequence is walked like any other
//! container.
//!
//! Every template renders against the mapping as it was before the pass, not
//! against the mapping being rewritten: a value resolved earlier in the pass
//! is still seen by later templates as its unrendered template name.

use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::error::{ConfigifyError, ConfigifyResult};
use crate::loader::PROVENANCE_KEY;
use crate::renderer::TemplateRenderer;

/// Key prefix marking a templated value.
pub const MARKER: char = '$';

/// Position under which a node was reached.
#[derive(Debug, Clone, Copy)]
enum Context<'k> {
    Key(&'k Value),
    Index(usize),
}

impl Context<'_> {
    fn is_marked(&self) -> bool {
        matches!(self, Context::Key(Value::String(key)) if key.starts_with(MARKER))
    }

    fn label(&self) -> String {
        match self {
            Context::Key(Value::String(key)) => key.clone(),
            Context::Key(key) => format!("{:?}", key),
            Context::Index(idx) => format!("[{}]", idx),
        }
    }
}

/// Renders marked values of a parameter tree in place.
pub struct TemplateResolver<'a> {
    renderer: &'a TemplateRenderer,
}

impl<'a> TemplateResolver<'a> {
    /// Create a new template resolver.
    pub fn new(renderer: &'a TemplateRenderer) -> Self {
        Self { renderer }
    }

    /// Resolve every marked value in `params`, returning how many were rendered.
    ///
    /// Templates see a snapshot of `params` taken before this pass, so the
    /// outcome does not depend on key order. A marked value never sees the
    /// rendered output of another marked value, only its template name. The
    /// provenance record is left untouched.
    pub fn resolve(&self, params: &mut Mapping) -> ConfigifyResult<usize> {
        let snapshot = params.clone();
        let mut rendered = 0;

        for (key, value) in params.iter_mut() {
            if key.as_str() == Some(PROVENANCE_KEY) {
                continue;
            }
            self.resolve_node(&snapshot, Context::Key(key), value, &mut rendered)?;
        }

        debug!("Resolved {} templated parameter values", rendered);
        Ok(rendered)
    }

    fn resolve_node(
        &self,
        params: &Mapping,
        context: Context<'_>,
        node: &mut Value,
        rendered: &mut usize,
    ) -> ConfigifyResult<()> {
        match node {
            Value::Mapping(mapping) => {
                for (key, value) in mapping.iter_mut() {
                    self.resolve_node(params, Context::Key(key), value, rendered)?;
                }
            }
            Value::Sequence(items) => {
                for (idx, item) in items.iter_mut().enumerate() {
                    self.resolve_node(params, Context::Index(idx), item, rendered)?;
                }
            }
            Value::Tagged(tagged) => {
                self.resolve_node(params, context, &mut tagged.value, rendered)?;
            }
            Value::String(name) if context.is_marked() => {
                debug!("Rendering templated value under {:?}", context);
                *name = self.render_marked(name, params, context)?;
                *rendered += 1;
            }
            Value::Number(_) | Value::Bool(_) if context.is_marked() => {
                let name = scalar_text(node);
                *node = Value::String(self.render_marked(&name, params, context)?);
                *rendered += 1;
            }
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {}
        }

        Ok(())
    }

    /// Render a marked value, naming its key in render errors.
    fn render_marked(
        &self,
        name: &str,
        params: &Mapping,
        context: Context<'_>,
    ) -> ConfigifyResult<String> {
        self.renderer
            .render(name, params)
            .map_err(|err| match err {
                ConfigifyError::TemplateRender { template, source } => {
                    ConfigifyError::TemplateRender {
                        template: format!("{} ({})", context.label(), template),
                        source,
                    }
                }
                other => other,
            })
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        _ => String::new(),
    }
}
