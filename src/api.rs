//! Public pure-function API (§6 "External interfaces"): parse a template
//! once, then render it any number of times against different data,
//! complement, options, or dictionaries. No I/O, no CLI concerns — mirrors
//! the teacher's `src/api.rs` shape (pure functions over structured input,
//! structured output, testable without a process boundary).

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::adapter::TranslationDictionary;
use crate::dependency::{self, DependencyGraph};
use crate::error::TemplateError;
use crate::parser::{self, Tag};
use crate::renderer::{self, RenderOptions, RenderReport};
use crate::value::Value;

/// A template parsed once (§4.1-§4.3): its tags in order of appearance, the
/// dependency graph over them (already checked for cycles), and the raw
/// source bytes the renderer needs to reconstruct text around tags.
#[derive(Debug, Clone)]
pub struct ParsedTemplate {
    source: String,
    tags: Vec<Tag>,
    dependencies: DependencyGraph,
}

impl ParsedTemplate {
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn dependencies(&self) -> &DependencyGraph {
        &self.dependencies
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// A cache key for (this template, `options`, `data`) (§5.1): a
    /// `std::hash::Hasher` digest over the raw template bytes, the options,
    /// and a stable serialization of `data`. Not cryptographic — a caller
    /// needing tamper resistance should hash the rendered bytes instead.
    pub fn fingerprint(&self, options: &RenderOptions, data: &Value) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.source.hash(&mut hasher);
        options.hash(&mut hasher);
        let canonical = serde_json::to_vec(&serde_json::to_value(data).unwrap_or(serde_json::Value::Null))
            .unwrap_or_default();
        canonical.hash(&mut hasher);
        hasher.finish()
    }
}

/// Parses `template` into a [`ParsedTemplate`]: tokenizes and parses each
/// tag body (§4.1, §4.2), then builds and checks the tag dependency graph
/// (§4.3). Returns the fatal `TemplateError` variants (`SYNTAX_ERROR`,
/// `CIRCULAR_DEPENDENCY`) rather than panicking.
pub fn parse_template(template: &str) -> Result<ParsedTemplate, TemplateError> {
    let tags = parser::parse(template)?;
    let dependencies = dependency::analyze(&tags)?;
    Ok(ParsedTemplate {
        source: template.to_string(),
        tags,
        dependencies,
    })
}

/// Renders a parsed template against a data tree (§4.4-§4.6), returning the
/// output bytes and a structured report. `complement` backs `c.`-prefixed
/// tags, `options_data` backs `o.`-prefixed tags, `dictionary` backs
/// `t(key)` tags; all three default to an empty root / key-as-fallback when
/// absent.
pub fn render(
    parsed: &ParsedTemplate,
    data: &Value,
    complement: Option<&Value>,
    options_data: Option<&Value>,
    dictionary: Option<&dyn TranslationDictionary>,
    options: &RenderOptions,
) -> Result<(String, RenderReport), TemplateError> {
    renderer::render(&parsed.source, &parsed.tags, data, complement, options_data, dictionary, options)
}
