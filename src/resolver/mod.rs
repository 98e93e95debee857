//! Data resolver (§4.4): path evaluation against a data tree, bracket
//! semantics (positional index, filter, iteration, aggregation), and
//! formatter chain execution against resolved values and dynamic arguments.
//!
//! Grounded on the teacher's `ast/query` tree-walking (descend by name,
//! return `None` on a missing key), generalized to this grammar's array
//! operators — filter, iteration, aggregation — which the teacher's markup
//! tree never needed.

use std::cmp::Ordering;

use crate::error::{Diagnostic, TemplateError};
use crate::formatters;
use crate::parser::{Arg, FilterOp, Marker, Path, Predicate, Scope, Tag, TagId, TagKind};
use crate::value::{loose_cmp, loose_eq, Value};

static NULL: Value = Value::Null;

/// The three data roots a dynamic path or tag kind may walk from (§3
/// "Resolution context"), plus an `options` root for `o.`-prefixed tags.
/// `options` has no counterpart named in §3's resolution context — the spec
/// defines an `option` tag *kind* (§3, §4.2) but never says what tree it
/// resolves against. We model it as its own root, parallel to `complement`,
/// rather than overload `RenderOptions` (§5.1, which carries render
/// *configuration* — locale, strict — not template data).
pub struct ResolutionContext<'a, 'b> {
    pub current: &'b Value,
    pub root: &'a Value,
    pub complement: Option<&'a Value>,
    pub options: Option<&'a Value>,
}

impl<'a> ResolutionContext<'a, 'a> {
    pub fn new(root: &'a Value, complement: Option<&'a Value>, options: Option<&'a Value>) -> Self {
        Self { current: root, root, complement, options }
    }
}

impl<'a, 'b> ResolutionContext<'a, 'b> {
    /// Rebinds `currentData` to a value whose lifetime is independent of
    /// the root data tree's — every per-element/per-row value computed
    /// during formatter chain application is a short-lived local, not a
    /// borrow out of the original tree.
    fn with_current<'c>(&self, current: &'c Value) -> ResolutionContext<'a, 'c> {
        ResolutionContext { current, root: self.root, complement: self.complement, options: self.options }
    }

    fn kind_root(&self, kind: &TagKind) -> &'a Value {
        match kind {
            TagKind::Complement(_) => self.complement.unwrap_or(&NULL),
            TagKind::Option(_) => self.options.unwrap_or(&NULL),
            _ => self.root,
        }
    }
}

/// The outcome of walking a path against a value (§4.4).
#[derive(Debug, Clone)]
pub enum Resolved<'a> {
    Value(&'a Value),
    Undefined,
    /// An `[i]`/`[i±N]` marker was hit; `rest` is the post-bracket property
    /// path the renderer applies per row, `offset` the relative shift.
    Iteration { elements: Vec<&'a Value>, rest: Path, offset: i64 },
    /// A `[]` marker (or a bare filter with no marker — see module docs
    /// below) was hit; `rest` is the post-bracket property path applied per
    /// element before aggregation.
    Aggregation { elements: Vec<&'a Value>, rest: Path },
}

/// Walks `path` against `start`, applying each segment's name descent and
/// then its filter/marker (§4.4). A segment carrying only a filter and no
/// marker is treated as an implicit aggregation over the filtered array —
/// the grammar (§6) allows a bracket to be a bare `filter_expr`, but the
/// component design never describes a *scalar* use for a filtered
/// collection, and the one scenario that exercises bare brackets (§8
/// scenario 4) pairs a filter with an explicit `[]`. Implicit aggregation is
/// the only reading under which a bare filter still produces something a
/// tag can render.
pub fn resolve_path<'a>(start: &'a Value, path: &Path) -> Resolved<'a> {
    let mut current = start;
    for (i, seg) in path.iter().enumerate() {
        let next = match current {
            Value::Map(m) => m.get(&seg.name),
            _ => None,
        };
        let Some(next) = next else {
            return Resolved::Undefined;
        };
        current = next;

        if seg.filter.is_none() && seg.marker.is_none() {
            continue;
        }

        let Value::Array(items) = current else {
            return Resolved::Undefined;
        };
        let mut filtered: Vec<&Value> = items.iter().collect();
        if let Some(preds) = &seg.filter {
            filtered.retain(|v| preds.iter().all(|p| evaluate_predicate(v, p)));
        }
        let rest: Path = path[i + 1..].to_vec();

        match seg.marker {
            None | Some(Marker::Aggregation) => return Resolved::Aggregation { elements: filtered, rest },
            Some(Marker::Iteration) => return Resolved::Iteration { elements: filtered, rest, offset: 0 },
            Some(Marker::IterationOffset(n)) => return Resolved::Iteration { elements: filtered, rest, offset: n },
            Some(Marker::Positional(n)) => match positional_index(&filtered, n) {
                Some(v) => current = v,
                None => return Resolved::Undefined,
            },
        }
    }
    Resolved::Value(current)
}

/// Resolves a signed positional index, negative counting from the end (§6).
fn positional_index<'a>(items: &[&'a Value], n: i64) -> Option<&'a Value> {
    let len = items.len() as i64;
    let idx = if n < 0 { len + n } else { n };
    if idx < 0 || idx >= len {
        None
    } else {
        Some(items[idx as usize])
    }
}

/// Evaluates one bracket's AND-ed predicates against an array element
/// (§4.4). A predicate against a non-map element (no such property) is
/// simply false, not an error — only filtering against a non-array is a
/// resolution error, raised one level up in [`resolve_path`].
fn evaluate_predicate(value: &Value, predicate: &Predicate) -> bool {
    let Some(field) = value.get(&predicate.property) else {
        return false;
    };
    match predicate.op {
        FilterOp::Eq => loose_eq(field, &predicate.literal),
        FilterOp::Ne => !loose_eq(field, &predicate.literal),
        FilterOp::Gt => loose_cmp(field, &predicate.literal) == Some(Ordering::Greater),
        FilterOp::Lt => loose_cmp(field, &predicate.literal) == Some(Ordering::Less),
        FilterOp::Gte => matches!(loose_cmp(field, &predicate.literal), Some(Ordering::Greater) | Some(Ordering::Equal)),
        FilterOp::Lte => matches!(loose_cmp(field, &predicate.literal), Some(Ordering::Less) | Some(Ordering::Equal)),
        FilterOp::Contains => contains_ci(field, &predicate.literal),
        FilterOp::StartsWith => starts_with_ci(field, &predicate.literal),
        FilterOp::EndsWith => ends_with_ci(field, &predicate.literal),
        FilterOp::In => in_op(field, &predicate.literal),
    }
}

fn contains_ci(a: &Value, b: &Value) -> bool {
    a.stringify().to_lowercase().contains(&b.stringify().to_lowercase())
}
fn starts_with_ci(a: &Value, b: &Value) -> bool {
    a.stringify().to_lowercase().starts_with(&b.stringify().to_lowercase())
}
fn ends_with_ci(a: &Value, b: &Value) -> bool {
    a.stringify().to_lowercase().ends_with(&b.stringify().to_lowercase())
}

/// `in` accepts either a literal list, or a string split on commas (§4.4).
fn in_op(field: &Value, literal: &Value) -> bool {
    match literal {
        Value::Array(items) => items.iter().any(|item| loose_eq(field, item)),
        Value::Str(s) => s.split(',').any(|part| loose_eq(field, &Value::Str(part.trim().to_string()))),
        other => loose_eq(field, other),
    }
}

fn stringify_path(path: &Path) -> String {
    path.iter().map(|s| s.name.as_str()).collect::<Vec<_>>().join(".")
}

fn resolution_error(tag_id: TagId, path: &Path, message: &str, diagnostics: &mut Vec<Diagnostic>) {
    let diag = Diagnostic::TagResolutionError {
        tag_id,
        path: stringify_path(path),
        message: message.to_string(),
    };
    diag.log();
    diagnostics.push(diag);
}

/// Resolves a scalar tag (no iteration/aggregation marker anywhere in its
/// path): walks the path, then applies the full formatter chain with
/// `currentData` fixed to the resolved value for the whole chain (§4.4
/// "Scalar resolution").
pub fn resolve_scalar(
    tag: &Tag,
    ctx: &ResolutionContext,
    strict: bool,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<Value, TemplateError> {
    let path = tag.path().expect("scalar resolution requires a path-bearing tag kind");
    let root = ctx.kind_root(&tag.kind);
    let value = match resolve_path(root, path) {
        Resolved::Value(v) => v.clone(),
        Resolved::Undefined => {
            resolution_error(tag.id, path, "path did not resolve to a value", diagnostics);
            Value::Null
        }
        Resolved::Iteration { .. } | Resolved::Aggregation { .. } => {
            resolution_error(tag.id, path, "path carries an array marker but the tag was resolved as scalar", diagnostics);
            Value::Null
        }
    };
    resolve_with_value(tag, value, ctx, strict, diagnostics)
}

/// Applies a tag's formatter chain to an already-known base value, with
/// `currentData` fixed to that value for the whole chain (§4.4 "Scalar
/// resolution"). `resolve_scalar` delegates here after walking its path;
/// the renderer calls this directly for `Translation`/`Alias` tags, whose
/// base value comes from a translation lookup or the tag's own name rather
/// than a path walk.
pub fn resolve_with_value(
    tag: &Tag,
    value: Value,
    ctx: &ResolutionContext,
    strict: bool,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<Value, TemplateError> {
    let row_ctx = ctx.with_current(&value);
    apply_formatter_chain(value.clone(), &tag.formatters, &row_ctx, strict, diagnostics, tag.id)
}

/// Resolves an aggregation tag (§4.4 "Aggregation"): evaluates the base
/// array, applies the pre-aggregation formatters per element with
/// `currentData = element`, reduces, then applies the post-aggregation
/// formatters to the scalar result.
pub fn resolve_aggregation(
    tag: &Tag,
    ctx: &ResolutionContext,
    strict: bool,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<Value, TemplateError> {
    let path = tag.path().expect("aggregation resolution requires a path-bearing tag kind");
    let root = ctx.kind_root(&tag.kind);
    let (elements, rest) = match resolve_path(root, path) {
        Resolved::Aggregation { elements, rest } => (elements, rest),
        Resolved::Undefined => {
            resolution_error(tag.id, path, "base array did not resolve", diagnostics);
            return Ok(Value::Null);
        }
        Resolved::Value(_) | Resolved::Iteration { .. } => {
            resolution_error(tag.id, path, "path does not carry an aggregation marker", diagnostics);
            return Ok(Value::Null);
        }
    };

    let split = tag.formatters.iter().position(|f| {
        formatters::lookup(&f.name)
            .map(|d| d.category == formatters::Category::Aggregation)
            .unwrap_or(false)
    });
    let Some(split) = split else {
        resolution_error(tag.id, path, "aggregation tag has no aggregation formatter in its chain", diagnostics);
        return Ok(Value::Null);
    };
    let reducer_name = tag.formatters[split].name.clone();
    let pre = &tag.formatters[..split];
    let post = &tag.formatters[split + 1..];

    let mut processed = Vec::with_capacity(elements.len());
    for element in &elements {
        let el_value = if rest.is_empty() {
            (*element).clone()
        } else {
            match resolve_path(element, &rest) {
                Resolved::Value(v) => v.clone(),
                _ => Value::Null,
            }
        };
        let el_ctx = ctx.with_current(element);
        let applied = apply_formatter_chain(el_value.clone(), pre, &el_ctx, strict, diagnostics, tag.id)?;
        processed.push(applied);
    }

    let aggregated = if reducer_name == "aggCount" {
        Value::Int(processed.len() as i64)
    } else {
        let nums: Vec<f64> = processed.iter().map(Value::as_f64).collect();
        formatters::reduce_aggregation(&reducer_name, &nums)
    };

    let mut allowed_post = Vec::with_capacity(post.len());
    for call in post {
        if post_aggregation_formatter_allowed(tag.id, call, strict, diagnostics)? {
            allowed_post.push(call.clone());
        }
    }

    let agg_ctx = ctx.with_current(&aggregated);
    apply_formatter_chain(aggregated.clone(), &allowed_post, &agg_ctx, strict, diagnostics, tag.id)
}

/// Post-aggregation formatters run against the scalar reduction, not an
/// array or a piped-in string (§4.4: "String-only and array-only formatters
/// must not appear post-aggregation"). Rejects (strict) or flags with a
/// diagnostic (non-strict) any `Text`- or `Aggregation`-category formatter
/// found there; other categories (`Number`, `Conditional`, `Math`,
/// `Utility`) operate on the scalar result and are unrestricted.
fn post_aggregation_formatter_allowed(
    tag_id: TagId,
    call: &crate::parser::FormatterCall,
    strict: bool,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<bool, TemplateError> {
    let Some(def) = formatters::lookup(&call.name) else {
        return Ok(true);
    };
    if !matches!(def.category, formatters::Category::Text | formatters::Category::Aggregation) {
        return Ok(true);
    }
    let message = format!(
        "'{}' is a {:?}-category formatter and cannot run post-aggregation on a scalar reduction",
        call.name, def.category
    );
    if strict {
        return Err(TemplateError::InvalidParameters { tag_id, formatter: call.name.clone(), message });
    }
    let diag = Diagnostic::InvalidParametersSkipped { tag_id, formatter: call.name.clone(), message };
    diag.log();
    diagnostics.push(diag);
    Ok(false)
}

/// The resolved shape of an iteration tag's base array (§4.4 "Iteration
/// resolution"), handed to the renderer to drive per-row expansion.
pub struct IterationPlan<'a> {
    pub elements: Vec<&'a Value>,
    pub rest: Path,
    pub offset: i64,
}

/// Resolves an iteration tag's base array and post-bracket path, without
/// producing row values yet — row expansion is the renderer's job (§4.6
/// stage 1), since it must coordinate every iteration tag sharing a line.
pub fn iteration_plan<'a, 'b>(tag: &Tag, ctx: &ResolutionContext<'a, 'b>) -> Option<IterationPlan<'a>> {
    let path = tag.path()?;
    let root = ctx.kind_root(&tag.kind);
    match resolve_path(root, path) {
        Resolved::Iteration { elements, rest, offset } => Some(IterationPlan { elements, rest, offset }),
        _ => None,
    }
}

/// Resolves one tag's value for iteration row `row_index`: applies the
/// tag's relative offset, the post-bracket property path, and the full
/// formatter chain with `currentData` set to the selected element.
pub fn resolve_iteration_row(
    tag: &Tag,
    plan: &IterationPlan,
    row_index: usize,
    ctx: &ResolutionContext,
    strict: bool,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<Value, TemplateError> {
    let target = row_index as i64 + plan.offset;
    if target < 0 || target as usize >= plan.elements.len() {
        if let Some(path) = tag.path() {
            resolution_error(tag.id, path, "iteration offset is out of range for this row", diagnostics);
        }
        return Ok(Value::Null);
    }
    let element = plan.elements[target as usize];
    let el_value = if plan.rest.is_empty() {
        element.clone()
    } else {
        match resolve_path(element, &plan.rest) {
            Resolved::Value(v) => v.clone(),
            _ => Value::Null,
        }
    };
    let row_ctx = ctx.with_current(element);
    apply_formatter_chain(el_value.clone(), &tag.formatters, &row_ctx, strict, diagnostics, tag.id)
}

/// Applies a formatter chain left-to-right (§4.5): resolves each call's
/// arguments against `ctx`, looks the formatter up, validates arity, and
/// executes, accumulating non-fatal skips as diagnostics unless `strict`.
pub fn apply_formatter_chain(
    mut value: Value,
    chain: &[crate::parser::FormatterCall],
    ctx: &ResolutionContext,
    strict: bool,
    diagnostics: &mut Vec<Diagnostic>,
    tag_id: TagId,
) -> Result<Value, TemplateError> {
    for call in chain {
        let Some(def) = formatters::lookup(&call.name) else {
            if strict {
                return Err(TemplateError::UnknownFormatter { tag_id, name: call.name.clone() });
            }
            let diag = Diagnostic::UnknownFormatterSkipped { tag_id, name: call.name.clone() };
            diag.log();
            diagnostics.push(diag);
            continue;
        };

        if let Err(message) = formatters::validate_arity(def, &call.args) {
            if strict {
                return Err(TemplateError::InvalidParameters { tag_id, formatter: call.name.clone(), message });
            }
            let diag = Diagnostic::InvalidParametersSkipped { tag_id, formatter: call.name.clone(), message };
            diag.log();
            diagnostics.push(diag);
            continue;
        }

        let args: Vec<Value> = call.args.iter().map(|a| resolve_arg(a, ctx)).collect();
        match formatters::execute(def, &value, &args) {
            Ok(next) => value = next,
            Err(message) => {
                if strict {
                    return Err(TemplateError::InvalidParameters { tag_id, formatter: call.name.clone(), message });
                }
                let diag = Diagnostic::InvalidParametersSkipped { tag_id, formatter: call.name.clone(), message };
                diag.log();
                diagnostics.push(diag);
            }
        }
    }
    Ok(value)
}

/// Resolves one formatter argument against the resolution context (§3
/// "Resolution context"): constants pass through; dynamic arguments walk
/// their path from the scope they name, defaulting to `null` when the path
/// doesn't resolve to a plain value (an unresolved dynamic argument is not
/// itself a resolution error — only the tag's own path is tracked that way).
fn resolve_arg(arg: &Arg, ctx: &ResolutionContext) -> Value {
    match arg {
        Arg::Constant(v) => v.clone(),
        Arg::Dynamic(scope, path) => {
            let root = match scope {
                Scope::CurrentData => ctx.current,
                Scope::RootData => ctx.root,
                Scope::Complement => ctx.complement.unwrap_or(&NULL),
            };
            match resolve_path(root, path) {
                Resolved::Value(v) => v.clone(),
                _ => Value::Null,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use serde_json::json;

    fn data(json: serde_json::Value) -> Value {
        Value::from(json)
    }

    #[test]
    fn resolves_a_plain_scalar_path() {
        let tags = parse("{d.name}").unwrap();
        let root = data(json!({"name": "world"}));
        let ctx = ResolutionContext::new(&root, None, None);
        let mut diags = Vec::new();
        let v = resolve_scalar(&tags[0], &ctx, false, &mut diags).unwrap();
        assert_eq!(v, Value::Str("world".into()));
        assert!(diags.is_empty());
    }

    #[test]
    fn missing_path_reports_a_diagnostic_and_resolves_null() {
        let tags = parse("{d.missing}").unwrap();
        let root = data(json!({}));
        let ctx = ResolutionContext::new(&root, None, None);
        let mut diags = Vec::new();
        let v = resolve_scalar(&tags[0], &ctx, false, &mut diags).unwrap();
        assert_eq!(v, Value::Null);
        assert_eq!(diags.len(), 1);
        assert!(matches!(diags[0], Diagnostic::TagResolutionError { .. }));
    }

    #[test]
    fn scalar_chain_applies_formatters_in_order() {
        let tags = parse("{d.name:upperCase}").unwrap();
        let root = data(json!({"name": "world"}));
        let ctx = ResolutionContext::new(&root, None, None);
        let mut diags = Vec::new();
        let v = resolve_scalar(&tags[0], &ctx, false, &mut diags).unwrap();
        assert_eq!(v, Value::Str("WORLD".into()));
    }

    #[test]
    fn aggregation_applies_per_element_formatter_then_reduces() {
        let tags = parse("{d.items[].qty:mul(.price):aggSum():round(2)}").unwrap();
        let root = data(json!({"items": [
            {"qty": 10, "price": 125},
            {"qty": 1, "price": 299.99},
            {"qty": 12, "price": 50},
        ]}));
        let ctx = ResolutionContext::new(&root, None, None);
        let mut diags = Vec::new();
        let v = resolve_aggregation(&tags[0], &ctx, false, &mut diags).unwrap();
        assert_eq!(v, Value::Float(2149.99));
    }

    #[test]
    fn filter_then_aggregate_counts_matching_elements() {
        let tags = parse("{d.customers[totalSpent>1000][].name:aggCount()}").unwrap();
        let root = data(json!({"customers": [
            {"name": "A", "totalSpent": 2500},
            {"name": "B", "totalSpent": 750},
            {"name": "C", "totalSpent": 1200},
        ]}));
        let ctx = ResolutionContext::new(&root, None, None);
        let mut diags = Vec::new();
        let v = resolve_aggregation(&tags[0], &ctx, false, &mut diags).unwrap();
        assert_eq!(v, Value::Int(2));
    }

    #[test]
    fn iteration_plan_yields_elements_and_post_bracket_path() {
        let tags = parse("{d.items[i].name}").unwrap();
        let root = data(json!({"items": [{"name": "A"}, {"name": "B"}]}));
        let ctx = ResolutionContext::new(&root, None, None);
        let plan = iteration_plan(&tags[0], &ctx).unwrap();
        assert_eq!(plan.elements.len(), 2);
        assert_eq!(plan.rest.len(), 1);

        let mut diags = Vec::new();
        let row0 = resolve_iteration_row(&tags[0], &plan, 0, &ctx, false, &mut diags).unwrap();
        let row1 = resolve_iteration_row(&tags[0], &plan, 1, &ctx, false, &mut diags).unwrap();
        assert_eq!(row0, Value::Str("A".into()));
        assert_eq!(row1, Value::Str("B".into()));
    }

    #[test]
    fn positional_index_supports_negative_counting_from_the_end() {
        let tags = parse("{d.items[-1].name}").unwrap();
        let root = data(json!({"items": [{"name": "A"}, {"name": "B"}]}));
        let ctx = ResolutionContext::new(&root, None, None);
        let mut diags = Vec::new();
        let v = resolve_scalar(&tags[0], &ctx, false, &mut diags).unwrap();
        assert_eq!(v, Value::Str("B".into()));
    }

    #[test]
    fn in_filter_splits_a_string_argument_on_commas() {
        let tags = parse("{d.items[tier in 'gold,silver'][].name:aggCount()}").unwrap();
        let root = data(json!({"items": [
            {"name": "A", "tier": "gold"},
            {"name": "B", "tier": "bronze"},
            {"name": "C", "tier": "silver"},
        ]}));
        let ctx = ResolutionContext::new(&root, None, None);
        let mut diags = Vec::new();
        let v = resolve_aggregation(&tags[0], &ctx, false, &mut diags).unwrap();
        assert_eq!(v, Value::Int(2));
    }

    #[test]
    fn post_aggregation_text_formatter_is_skipped_with_a_diagnostic_non_strict() {
        let tags = parse("{d.items[].qty:aggSum():upperCase}").unwrap();
        let root = data(json!({"items": [{"qty": 1}, {"qty": 2}]}));
        let ctx = ResolutionContext::new(&root, None, None);
        let mut diags = Vec::new();
        let v = resolve_aggregation(&tags[0], &ctx, false, &mut diags).unwrap();
        assert_eq!(v, Value::Float(3.0));
        assert_eq!(diags.len(), 1);
        assert!(matches!(diags[0], Diagnostic::InvalidParametersSkipped { .. }));
    }

    #[test]
    fn post_aggregation_text_formatter_is_rejected_in_strict_mode() {
        let tags = parse("{d.items[].qty:aggSum():upperCase}").unwrap();
        let root = data(json!({"items": [{"qty": 1}, {"qty": 2}]}));
        let ctx = ResolutionContext::new(&root, None, None);
        let mut diags = Vec::new();
        let err = resolve_aggregation(&tags[0], &ctx, true, &mut diags).unwrap_err();
        assert!(matches!(err, TemplateError::InvalidParameters { .. }));
    }

    #[test]
    fn complement_scope_resolves_against_the_complement_root() {
        let tags = parse("{c.footer}").unwrap();
        let root = data(json!({}));
        let complement = data(json!({"footer": "page 1"}));
        let ctx = ResolutionContext::new(&root, Some(&complement), None);
        let mut diags = Vec::new();
        let v = resolve_scalar(&tags[0], &ctx, false, &mut diags).unwrap();
        assert_eq!(v, Value::Str("page 1".into()));
    }
}
