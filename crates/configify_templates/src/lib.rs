//! # configify_templates
//!
//! Templated output from templated, layered parameters.
//!
//! A manifest names an output template and an ordered list of parameter
//! layers. Each layer is a YAML file that is itself rendered as a Jinja
//! template against the parameters loaded before it, so later layers can
//! build on earlier ones:
//!
//! - Layer specifiers may be templates (`params/{{ env }}.yaml`) or globs
//!   (`params/conf.d/*.yaml`, loaded in lexicographic order)
//! - Layers merge shallowly, the last layer wins per top-level key
//! - Values under `$`-prefixed keys name templates that are rendered once all
//!   layers are merged
//! - Template names resolve to files first and fall back to inline source
//!
//! ## Example
//!
//! ```rust,no_run
//! use configify_templates::{GenerateOptions, Generator};
//! use std::path::Path;
//!
//! let options = GenerateOptions::new()
//!     .with_template_root("deploy")
//!     .with_param("env", "prod");
//!
//! let generator = Generator::open_with(Some(Path::new("deploy")), options).unwrap();
//! println!("{}", generator.generate().unwrap());
//! ```

pub mod error;
pub mod generator;
pub mod loader;
pub mod manifest;
pub mod renderer;
pub mod resolver;

pub use error::{ConfigifyError, ConfigifyResult};
pub use generator::{GenerateOptions, Generator};
pub use loader::{merge, LayerLoader, PROVENANCE_KEY};
pub use manifest::{LayerSpecs, Manifest, DEFAULT_MANIFEST_NAME};
pub use renderer::{RenderOptions, TemplateRenderer};
pub use resolver::{TemplateResolver, MARKER};
