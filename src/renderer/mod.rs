//! Renderer (§4.6): the three-stage substitution pass — iteration expansion,
//! scalar substitution, aggregation substitution — that turns a parsed
//! template plus a resolution context into output bytes and a report.
//!
//! Grounded on the teacher's `assembler/document_assembly.rs` (multi-pass
//! reassembly from parsed pieces) and `parser/detokenizer.rs` (reconstituting
//! text from spans).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::adapter::TranslationDictionary;
use crate::error::{Diagnostic, TemplateError};
use crate::parser::{Marker, Tag, TagId, TagKind};
use crate::resolver::{self, ResolutionContext};
use crate::value::Value;

/// Render-time configuration (§5.1): consulted by the translation tag
/// (`locale`, `default_locale`) and by the formatter-chain error policy
/// (`strict`, promoting `UNKNOWN_FORMATTER`/`INVALID_PARAMETERS` to fatal
/// per §7).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RenderOptions {
    pub locale: Option<String>,
    pub strict: bool,
    pub default_locale: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            locale: None,
            strict: false,
            default_locale: "en".to_string(),
        }
    }
}

/// Per-tag resolution outcome recorded in a [`RenderReport`] (§4.6 "Output
/// metadata").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagStatus {
    Resolved,
    ResolutionError,
}

/// The structured report a render always produces alongside its output
/// bytes (§4.6 "Output metadata", §7 "the renderer never aborts after
/// resolution").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderReport {
    pub total_bytes: usize,
    pub line_count: usize,
    pub tag_statuses: HashMap<TagId, TagStatus>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Renders `tags` (already parsed from `template`) against a resolution
/// context, returning the output bytes and report.
///
/// `dictionary` backs `t(key)` tags; `None` means every translation tag
/// falls through to its key (§6 "Translation dictionary interface").
pub fn render(
    template: &str,
    tags: &[Tag],
    root: &Value,
    complement: Option<&Value>,
    options_data: Option<&Value>,
    dictionary: Option<&dyn TranslationDictionary>,
    options: &RenderOptions,
) -> Result<(String, RenderReport), TemplateError> {
    let ctx = ResolutionContext::new(root, complement, options_data);
    let mut diagnostics = Vec::new();
    let mut tag_statuses = HashMap::new();

    let text = expand_iterations(template, tags, &ctx, options, &mut diagnostics, &mut tag_statuses)?;
    let text = substitute_scalars(text, tags, &ctx, dictionary, options, &mut diagnostics, &mut tag_statuses)?;
    let text = substitute_aggregations(text, tags, &ctx, options, &mut diagnostics, &mut tag_statuses)?;

    let line_count = text.split('\n').count();
    let report = RenderReport {
        total_bytes: text.len(),
        line_count,
        tag_statuses,
        diagnostics,
    };
    Ok((text, report))
}

/// Stage 1 (§4.6): lines carrying an iteration-marked tag are duplicated
/// once per element of their shared base array; empty arrays delete the
/// line. Lines without iteration tags pass through unchanged.
///
/// Byte offsets from the original parse are only valid against this stage's
/// *input*, so iteration substitution works by splicing each affected
/// line's byte range directly, before any stage has a chance to shift
/// offsets elsewhere in the document. Every other tag on a duplicated line
/// (scalar, aggregation, a different iteration tag already substituted in
/// this same pass) rides along in the duplicated text untouched, to be
/// picked up by stage 2/3's textual pass.
fn expand_iterations(
    template: &str,
    tags: &[Tag],
    ctx: &ResolutionContext,
    options: &RenderOptions,
    diagnostics: &mut Vec<Diagnostic>,
    tag_statuses: &mut HashMap<TagId, TagStatus>,
) -> Result<String, TemplateError> {
    let lines = split_lines(template);
    let mut out_lines: Vec<String> = Vec::with_capacity(lines.len());

    for line in &lines {
        let iteration_tags: Vec<&Tag> = tags
            .iter()
            .filter(|t| t.is_iteration() && t.byte_start >= line.start && t.byte_end <= line.end)
            .collect();

        if iteration_tags.is_empty() {
            out_lines.push(line.text.to_string());
            continue;
        }

        let primary_signature = base_signature(iteration_tags[0]);
        let mismatched: Vec<TagId> = iteration_tags
            .iter()
            .skip(1)
            .filter(|t| base_signature(t) != primary_signature)
            .map(|t| t.id)
            .collect();
        if !mismatched.is_empty() {
            let mut tag_ids = vec![iteration_tags[0].id];
            tag_ids.extend(mismatched);
            let diag = Diagnostic::MixedIterationSources { tag_ids };
            diag.log();
            diagnostics.push(diag);
        }

        let plan = resolver::iteration_plan(iteration_tags[0], ctx);
        let Some(plan) = plan else {
            // The primary tag's own base array failed to resolve; record it
            // and drop the line, matching an empty-array expansion.
            tag_statuses.insert(iteration_tags[0].id, TagStatus::ResolutionError);
            continue;
        };

        let row_count = plan.elements.len();
        for row in 0..row_count {
            let mut row_text = line.text.to_string();
            for tag in &iteration_tags {
                let own_plan;
                let row_plan = if tag.id == iteration_tags[0].id {
                    &plan
                } else {
                    own_plan = resolver::iteration_plan(tag, ctx);
                    match &own_plan {
                        Some(p) => p,
                        None => {
                            tag_statuses.insert(tag.id, TagStatus::ResolutionError);
                            continue;
                        }
                    }
                };

                let mut diags = Vec::new();
                let value = resolver::resolve_iteration_row(tag, row_plan, row, ctx, options.strict, &mut diags)?;
                let status = if diags.is_empty() { TagStatus::Resolved } else { TagStatus::ResolutionError };
                diagnostics.append(&mut diags);
                tag_statuses.insert(tag.id, status);
                row_text = row_text.replace(tag_text(template, tag), &value.stringify());
            }
            out_lines.push(row_text);
        }
    }

    Ok(out_lines.join("\n"))
}

/// Stage 2 (§4.6): every non-iteration, non-aggregation tag's raw textual
/// span is replaced with its resolved value. Post stage-1, byte offsets
/// from the original parse are stale (lines were duplicated or dropped), so
/// this stage replaces by the tag's literal text rather than by offset —
/// safe because resolution is a pure function of path and data: identical
/// raw tag text occurring more than once always resolves to the same
/// output, whether that's two independent uses of `{d.name}` or the
/// post-duplication copies iteration just produced.
fn substitute_scalars(
    text: String,
    tags: &[Tag],
    ctx: &ResolutionContext,
    dictionary: Option<&dyn TranslationDictionary>,
    options: &RenderOptions,
    diagnostics: &mut Vec<Diagnostic>,
    tag_statuses: &mut HashMap<TagId, TagStatus>,
) -> Result<String, TemplateError> {
    let mut text = text;
    for tag in tags {
        if tag.is_iteration() || tag.is_aggregation() {
            continue;
        }
        let raw = format!("{{{}}}", tag.raw_body);
        let before = diagnostics.len();
        let value = base_value(tag, ctx, dictionary, options, diagnostics)?;
        let status = if diagnostics.len() > before { TagStatus::ResolutionError } else { TagStatus::Resolved };
        tag_statuses.insert(tag.id, status);
        text = text.replace(&raw, &value.stringify());
    }
    Ok(text)
}

/// Stage 3 (§4.6): aggregation tags substitute last, so their numeric
/// result isn't disturbed by stage 1's line duplication.
fn substitute_aggregations(
    text: String,
    tags: &[Tag],
    ctx: &ResolutionContext,
    options: &RenderOptions,
    diagnostics: &mut Vec<Diagnostic>,
    tag_statuses: &mut HashMap<TagId, TagStatus>,
) -> Result<String, TemplateError> {
    let mut text = text;
    for tag in tags {
        if !tag.is_aggregation() {
            continue;
        }
        let raw = format!("{{{}}}", tag.raw_body);
        if !text.contains(&raw) {
            continue;
        }
        let mut diags = Vec::new();
        let value = resolver::resolve_aggregation(tag, ctx, options.strict, &mut diags)?;
        let status = if diags.is_empty() { TagStatus::Resolved } else { TagStatus::ResolutionError };
        diagnostics.append(&mut diags);
        tag_statuses.insert(tag.id, status);
        text = text.replace(&raw, &value.stringify());
    }
    Ok(text)
}

/// Resolves a non-iteration, non-aggregation tag's base value through its
/// formatter chain, dispatching on kind: `Data`/`Complement`/`Option` walk a
/// path via [`resolver::resolve_scalar`]; `Translation` looks up its key in
/// `dictionary`; `Alias` resolves to its own name (§9 "Open questions" —
/// no cross-tag-reference semantics is named for `#alias`, so its value is
/// the alias name itself, a string constant like any other base value, run
/// through its formatter chain the same as a path-resolved one).
fn base_value(
    tag: &Tag,
    ctx: &ResolutionContext,
    dictionary: Option<&dyn TranslationDictionary>,
    options: &RenderOptions,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<Value, TemplateError> {
    match &tag.kind {
        TagKind::Data(_) | TagKind::Complement(_) | TagKind::Option(_) => {
            resolver::resolve_scalar(tag, ctx, options.strict, diagnostics)
        }
        TagKind::Translation(key) => {
            let resolved = match dictionary {
                Some(dict) => crate::adapter::resolve_translation(
                    dict,
                    key,
                    options.locale.as_deref(),
                    &options.default_locale,
                ),
                None => key.clone(),
            };
            resolver::resolve_with_value(tag, Value::Str(resolved), ctx, options.strict, diagnostics)
        }
        TagKind::Alias(name) => {
            resolver::resolve_with_value(tag, Value::Str(name.clone()), ctx, options.strict, diagnostics)
        }
    }
}

/// A line's text plus its byte range in the original template, used to
/// group iteration tags by the line they appear on.
struct Line<'a> {
    text: &'a str,
    start: usize,
    end: usize,
}

/// Splits `template` into lines on `\n`, tracking each line's byte range
/// (newline excluded) so tags can be matched to the line they fall in.
fn split_lines(template: &str) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    let mut start = 0;
    for segment in template.split('\n') {
        let end = start + segment.len();
        lines.push(Line { text: segment, start, end });
        start = end + 1;
    }
    lines
}

/// The literal `{...}` text of a tag, as it appears in the original
/// template.
fn tag_text<'a>(template: &'a str, tag: &Tag) -> &'a str {
    &template[tag.byte_start..tag.byte_end]
}

/// A syntactic fingerprint of an iteration tag's base array (§4.6 "the base
/// path of the first iteration tag on that line"): the tag's kind plus its
/// path up to and including the marker-bearing segment, stringified.
/// Two tags sharing this signature are considered to iterate the same
/// array; divergence raises `MIXED_ITERATION_SOURCES`.
fn base_signature(tag: &Tag) -> Option<String> {
    let path = tag.path()?;
    let marker_idx = path.iter().position(|s| {
        matches!(s.marker, Some(Marker::Iteration) | Some(Marker::IterationOffset(_)))
    })?;
    let kind = match &tag.kind {
        TagKind::Data(_) => "d",
        TagKind::Complement(_) => "c",
        TagKind::Option(_) => "o",
        TagKind::Translation(_) | TagKind::Alias(_) => return None,
    };
    let mut sig = String::from(kind);
    for seg in &path[..=marker_idx] {
        sig.push('.');
        sig.push_str(&seg.name);
        if let Some(filter) = &seg.filter {
            sig.push_str(&format!("{filter:?}"));
        }
    }
    Some(sig)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::MapTranslationDictionary;
    use crate::parser::parse;
    use serde_json::json;

    fn data(json: serde_json::Value) -> Value {
        Value::from(json)
    }

    fn render_simple(template: &str, root: serde_json::Value) -> String {
        let tags = parse(template).unwrap();
        let root = data(root);
        let options = RenderOptions::default();
        let (text, _report) = render(template, &tags, &root, None, None, None, &options).unwrap();
        text
    }

    #[test]
    fn scalar_chain_scenario() {
        let out = render_simple("Hello {d.name:upperCase}!", json!({"name": "world"}));
        assert_eq!(out, "Hello WORLD!");
    }

    #[test]
    fn iteration_scenario() {
        let out = render_simple(
            "{d.items[i].name} x {d.items[i].qty}",
            json!({"items": [{"name": "A", "qty": 2}, {"name": "B", "qty": 3}]}),
        );
        assert_eq!(out, "A x 2\nB x 3");
    }

    #[test]
    fn aggregation_with_per_element_cross_reference_scenario() {
        let out = render_simple(
            "Total: {d.items[].qty:mul(.price):aggSum():round(2)}",
            json!({"items": [
                {"qty": 10, "price": 125},
                {"qty": 1, "price": 299.99},
                {"qty": 12, "price": 50},
            ]}),
        );
        assert_eq!(out, "Total: 2149.99");
    }

    #[test]
    fn filtering_and_aggregation_scenario() {
        let out = render_simple(
            "VIPs: {d.customers[totalSpent>1000][].name:aggCount()}",
            json!({"customers": [
                {"name": "A", "totalSpent": 2500},
                {"name": "B", "totalSpent": 750},
                {"name": "C", "totalSpent": 1200},
            ]}),
        );
        assert_eq!(out, "VIPs: 2");
    }

    #[test]
    fn iteration_with_empty_array_deletes_the_line() {
        let out = render_simple("Items:\n{d.items[i].name}\nDone.", json!({"items": []}));
        assert_eq!(out, "Items:\nDone.");
    }

    #[test]
    fn conditional_chain_scenario() {
        let on = render_simple("{d.status:eq('active'):ifTrue('ON','OFF')}", json!({"status": "active"}));
        let off = render_simple("{d.status:eq('active'):ifTrue('ON','OFF')}", json!({"status": "idle"}));
        assert_eq!(on, "ON");
        assert_eq!(off, "OFF");
    }

    #[test]
    fn template_with_no_tags_passes_through_unchanged() {
        let out = render_simple("just plain text, no tags here", json!({}));
        assert_eq!(out, "just plain text, no tags here");
    }

    #[test]
    fn missing_path_substitutes_empty_string_and_records_a_diagnostic() {
        let template = "Hi {d.missing}!";
        let tags = parse(template).unwrap();
        let root = data(json!({}));
        let options = RenderOptions::default();
        let (text, report) = render(template, &tags, &root, None, None, None, &options).unwrap();
        assert_eq!(text, "Hi !");
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.tag_statuses.get(&tags[0].id), Some(&TagStatus::ResolutionError));
    }

    #[test]
    fn translation_tag_falls_back_through_dictionary_then_key() {
        let mut dict = MapTranslationDictionary::new();
        dict.insert("en", "greeting", "Hello");
        let template = "{t(greeting)}, {d.name}!";
        let tags = parse(template).unwrap();
        let root = data(json!({"name": "Ada"}));
        let options = RenderOptions {
            locale: Some("fr".to_string()),
            strict: false,
            default_locale: "en".to_string(),
        };
        let (text, _report) = render(template, &tags, &root, None, None, Some(&dict), &options).unwrap();
        assert_eq!(text, "Hello, Ada!");
    }

    #[test]
    fn alias_tag_resolves_to_its_own_name() {
        let out = render_simple("{#sectionOne}", json!({}));
        assert_eq!(out, "sectionOne");
    }

    #[test]
    fn mixed_iteration_sources_on_one_line_warns_and_uses_the_first_array() {
        let template = "{d.a[i].x} {d.b[i].y}";
        let tags = parse(template).unwrap();
        let root = data(json!({"a": [{"x": 1}, {"x": 2}], "b": [{"y": "only"}]}));
        let options = RenderOptions::default();
        let (text, report) = render(template, &tags, &root, None, None, None, &options).unwrap();
        assert_eq!(text, "1 only\n2 ");
        assert!(report.diagnostics.iter().any(|d| matches!(d, Diagnostic::MixedIterationSources { .. })));
    }
}
