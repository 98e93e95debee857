//! Expression parser (§4.2): turns one tag body into a typed `Tag` AST.

mod literal;
mod splitting;

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::TemplateError;
use crate::tokenizer::{self, TagSpan};
use crate::value::Value;

pub use literal::parse_constant;
pub use splitting::{find_top_level, split_top_level};

/// Stable identifier for a parsed tag, assigned in order of appearance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TagId(pub usize);

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One property accessor, with its optional filter and/or marker (§3
/// "Path"). A segment may carry AND-ed filter predicates *and* a marker in
/// the same set of bracket groups — e.g. `customers[totalSpent>1000][]`
/// filters, then aggregates, the same array (§8 scenario 4).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Segment {
    pub name: String,
    /// AND-ed predicates narrowing the array at this segment, from one or
    /// more `[prop op literal]` bracket groups.
    pub filter: Option<Vec<Predicate>>,
    /// What to do with the (possibly filtered) array at this segment.
    pub marker: Option<Marker>,
}

/// A dot-separated sequence of `Segment`s.
pub type Path = Vec<Segment>;

/// A segment's non-filter bracket: what it asks the resolver to do with the
/// array at that point in the path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Marker {
    /// `[]` — aggregate the whole array.
    Aggregation,
    /// `[i]` — request one rendered copy per element.
    Iteration,
    /// `[i+N]` / `[i-N]` — iteration relative to the current row.
    IterationOffset(i64),
    /// `[N]` / `[-N]` — a fixed array index.
    Positional(i64),
}

/// One `(property, operator, literal)` filter triple.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub property: String,
    pub op: FilterOp,
    pub literal: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
    Contains,
    StartsWith,
    EndsWith,
    In,
}

/// Which root a dynamic formatter argument's path walks from (§3
/// "Resolution context").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    CurrentData,
    RootData,
    Complement,
}

/// A formatter argument: either fixed at parse time, or resolved per
/// invocation against live data.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Constant(Value),
    Dynamic(Scope, Path),
}

/// One formatter call in a tag's chain.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatterCall {
    pub name: String,
    pub args: Vec<Arg>,
}

/// A tag's kind, discriminated by its body's prefix (§4.2 "Kind
/// discrimination").
#[derive(Debug, Clone, PartialEq)]
pub enum TagKind {
    Data(Path),
    Complement(Path),
    Translation(String),
    Alias(String),
    Option(Path),
}

/// A fully parsed tag (§3 "Tag").
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub id: TagId,
    pub kind: TagKind,
    pub formatters: Vec<FormatterCall>,
    pub byte_start: usize,
    pub byte_end: usize,
    pub raw_body: String,
}

impl Tag {
    /// Whether this tag's path carries an `[i]`/`[i±N]` iteration marker on
    /// its last bracketed segment, making it an iteration tag for the
    /// renderer (§4.6 stage 1).
    pub fn is_iteration(&self) -> bool {
        self.path()
            .map(|p| {
                p.iter().any(|s| {
                    matches!(
                        s.marker,
                        Some(Marker::Iteration) | Some(Marker::IterationOffset(_))
                    )
                })
            })
            .unwrap_or(false)
    }

    /// Whether this tag's path carries a `[]` aggregation marker anywhere
    /// (§4.4 "Aggregation").
    pub fn is_aggregation(&self) -> bool {
        self.path()
            .map(|p| p.iter().any(|s| matches!(s.marker, Some(Marker::Aggregation))))
            .unwrap_or(false)
    }

    /// The tag's own path, for kinds that carry one.
    pub fn path(&self) -> Option<&Path> {
        match &self.kind {
            TagKind::Data(p) | TagKind::Complement(p) | TagKind::Option(p) => Some(p),
            TagKind::Translation(_) | TagKind::Alias(_) => None,
        }
    }
}

static IDENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());
static SIGNED_INT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?\d+$").unwrap());
static ITERATION_OFFSET_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^i([+-]\d+)$").unwrap());

/// Tokenizes and parses every tag in `template`, assigning each a `TagId`
/// in order of appearance.
pub fn parse(template: &str) -> Result<Vec<Tag>, TemplateError> {
    let spans = tokenizer::tokenize(template)?;
    spans
        .into_iter()
        .enumerate()
        .map(|(i, span)| parse_tag(TagId(i), span))
        .collect()
}

fn parse_tag(id: TagId, span: TagSpan) -> Result<Tag, TemplateError> {
    let body = span.raw_body.trim();
    if body.is_empty() {
        return Err(TemplateError::Syntax {
            byte_offset: span.byte_start,
            message: "empty tag body".to_string(),
        });
    }

    let parts = split_top_level(body, ':');
    let head = parts[0].as_str();
    let formatter_parts = &parts[1..];

    let kind = parse_kind(head, span.byte_start)?;
    let formatters = formatter_parts
        .iter()
        .map(|p| parse_formatter(p, span.byte_start))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Tag {
        id,
        kind,
        formatters,
        byte_start: span.byte_start,
        byte_end: span.byte_end,
        raw_body: span.raw_body,
    })
}

fn parse_kind(head: &str, byte_offset: usize) -> Result<TagKind, TemplateError> {
    if let Some(rest) = head.strip_prefix('#') {
        let name = rest.trim();
        if name.is_empty() {
            return Err(TemplateError::Syntax {
                byte_offset,
                message: "alias tag has an empty name".to_string(),
            });
        }
        return Ok(TagKind::Alias(name.to_string()));
    }
    if let Some(rest) = head.strip_prefix("t(") {
        let key = rest.strip_suffix(')').ok_or_else(|| TemplateError::Syntax {
            byte_offset,
            message: "unterminated 't(' translation tag".to_string(),
        })?;
        if key.is_empty() {
            return Err(TemplateError::Syntax {
                byte_offset,
                message: "translation tag has an empty key".to_string(),
            });
        }
        return Ok(TagKind::Translation(key.to_string()));
    }
    if let Some(rest) = head.strip_prefix("d.") {
        return Ok(TagKind::Data(parse_path(rest, byte_offset)?));
    }
    if let Some(rest) = head.strip_prefix("c.") {
        return Ok(TagKind::Complement(parse_path(rest, byte_offset)?));
    }
    if let Some(rest) = head.strip_prefix("o.") {
        return Ok(TagKind::Option(parse_path(rest, byte_offset)?));
    }
    // No recognized prefix: defaults to a data path (§4.2).
    Ok(TagKind::Data(parse_path(head, byte_offset)?))
}

/// Parses a dot-separated path, splitting at depth zero so brackets (which
/// may themselves contain `.` inside a filter literal) stay intact.
pub(crate) fn parse_path(s: &str, byte_offset: usize) -> Result<Path, TemplateError> {
    if s.is_empty() {
        return Err(TemplateError::Syntax {
            byte_offset,
            message: "empty path".to_string(),
        });
    }
    split_top_level(s, '.')
        .into_iter()
        .map(|seg| parse_segment(&seg, byte_offset))
        .collect()
}

fn parse_segment(s: &str, byte_offset: usize) -> Result<Segment, TemplateError> {
    let Some(bracket_start) = s.find('[') else {
        if s.is_empty() {
            return Err(TemplateError::Syntax {
                byte_offset,
                message: "empty path segment".to_string(),
            });
        }
        return Ok(Segment {
            name: s.to_string(),
            ..Segment::default()
        });
    };

    let name = s[..bracket_start].to_string();
    let groups = split_bracket_groups(&s[bracket_start..], byte_offset)?;
    if groups.is_empty() {
        return Err(TemplateError::Syntax {
            byte_offset,
            message: format!("malformed bracket on segment '{s}'"),
        });
    }

    let mut marker: Option<Marker> = None;
    let mut predicates: Vec<Predicate> = Vec::new();

    for group in &groups {
        let candidate = if group.is_empty() {
            Some(Marker::Aggregation)
        } else if group == "i" {
            Some(Marker::Iteration)
        } else if let Some(caps) = ITERATION_OFFSET_RE.captures(group) {
            let offset: i64 = caps[1].parse().map_err(|_| TemplateError::Syntax {
                byte_offset,
                message: format!("malformed iteration offset '{group}'"),
            })?;
            Some(Marker::IterationOffset(offset))
        } else if SIGNED_INT_RE.is_match(group) {
            let n: i64 = group.parse().map_err(|_| TemplateError::Syntax {
                byte_offset,
                message: format!("malformed positional index '{group}'"),
            })?;
            Some(Marker::Positional(n))
        } else {
            None
        };

        match candidate {
            Some(m) => {
                if marker.is_some() {
                    return Err(TemplateError::Syntax {
                        byte_offset,
                        message: format!("segment '{s}' carries more than one marker bracket"),
                    });
                }
                marker = Some(m);
            }
            None => predicates.extend(parse_filter_group(group, byte_offset)?),
        }
    }

    Ok(Segment {
        name,
        filter: if predicates.is_empty() { None } else { Some(predicates) },
        marker,
    })
}

/// Splits `s` (which starts with `[`) into the raw contents of each
/// consecutive `[...]` group, e.g. `"[a=1][b=2]"` -> `["a=1", "b=2"]`.
fn split_bracket_groups(s: &str, byte_offset: usize) -> Result<Vec<String>, TemplateError> {
    let mut groups = Vec::new();
    let mut rest = s;
    while let Some(stripped) = rest.strip_prefix('[') {
        let mut depth = 1i32;
        let mut quote: Option<char> = None;
        let mut end = None;
        for (idx, ch) in stripped.char_indices() {
            if let Some(q) = quote {
                if ch == q {
                    quote = None;
                }
                continue;
            }
            match ch {
                '\'' | '"' => quote = Some(ch),
                '[' => depth += 1,
                ']' => {
                    depth -= 1;
                    if depth == 0 {
                        end = Some(idx);
                        break;
                    }
                }
                _ => {}
            }
        }
        let end = end.ok_or_else(|| TemplateError::Syntax {
            byte_offset,
            message: "unterminated '[' in path segment".to_string(),
        })?;
        groups.push(stripped[..end].to_string());
        rest = &stripped[end + 1..];
    }
    if !rest.is_empty() {
        return Err(TemplateError::Syntax {
            byte_offset,
            message: format!("unexpected trailing content after brackets: '{rest}'"),
        });
    }
    Ok(groups)
}

const WORD_OPS: &[(&str, FilterOp)] = &[
    ("startsWith", FilterOp::StartsWith),
    ("endsWith", FilterOp::EndsWith),
    ("contains", FilterOp::Contains),
    ("in", FilterOp::In),
];

/// Parses one `[...]` group's contents into its AND-joined predicates:
/// either `and`-separated within the group, or a single predicate.
fn parse_filter_group(content: &str, byte_offset: usize) -> Result<Vec<Predicate>, TemplateError> {
    split_on_and(content)
        .into_iter()
        .map(|p| parse_predicate(&p, byte_offset))
        .collect()
}

fn split_on_and(s: &str) -> Vec<String> {
    // " and " only splits outside quotes.
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let chars: Vec<char> = s.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        if let Some(q) = quote {
            current.push(ch);
            if ch == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        if ch == '\'' || ch == '"' {
            quote = Some(ch);
            current.push(ch);
            i += 1;
            continue;
        }
        if chars[i..].starts_with(&[' ', 'a', 'n', 'd', ' ']) {
            pieces.push(current.trim().to_string());
            current = String::new();
            i += 5;
            continue;
        }
        current.push(ch);
        i += 1;
    }
    pieces.push(current.trim().to_string());
    pieces
}

fn parse_predicate(s: &str, byte_offset: usize) -> Result<Predicate, TemplateError> {
    for (word, op) in WORD_OPS {
        let pattern = format!(" {word} ");
        if let Some(idx) = find_outside_quotes(s, &pattern) {
            let property = s[..idx].trim().to_string();
            let literal_src = s[idx + pattern.len()..].trim();
            return Ok(Predicate {
                property,
                op: *op,
                literal: parse_constant(literal_src),
            });
        }
    }

    const SYMBOL_OPS: &[(&str, FilterOp)] = &[
        ("==", FilterOp::Eq),
        ("!=", FilterOp::Ne),
        (">=", FilterOp::Gte),
        ("<=", FilterOp::Lte),
        ("=", FilterOp::Eq),
        (">", FilterOp::Gt),
        ("<", FilterOp::Lt),
    ];
    let mut best: Option<(usize, &str, FilterOp)> = None;
    for (sym, op) in SYMBOL_OPS {
        if let Some(idx) = find_outside_quotes(s, sym) {
            if best.map(|(b_idx, b_sym, _)| idx < b_idx || (idx == b_idx && sym.len() > b_sym.len())).unwrap_or(true) {
                best = Some((idx, sym, *op));
            }
        }
    }
    if let Some((idx, sym, op)) = best {
        let property = s[..idx].trim().to_string();
        let literal_src = s[idx + sym.len()..].trim();
        return Ok(Predicate {
            property,
            op,
            literal: parse_constant(literal_src),
        });
    }

    Err(TemplateError::Syntax {
        byte_offset,
        message: format!("malformed filter predicate '{s}'"),
    })
}

fn find_outside_quotes(s: &str, needle: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let ch = s[i..].chars().next().unwrap();
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            i += ch.len_utf8();
            continue;
        }
        if ch == '\'' || ch == '"' {
            quote = Some(ch);
            i += ch.len_utf8();
            continue;
        }
        if s[i..].starts_with(needle) {
            return Some(i);
        }
        i += ch.len_utf8();
    }
    None
}

fn parse_formatter(s: &str, byte_offset: usize) -> Result<FormatterCall, TemplateError> {
    if s.is_empty() {
        return Err(TemplateError::Syntax {
            byte_offset,
            message: "empty formatter in chain".to_string(),
        });
    }
    let Some(paren) = find_top_level(s, '(') else {
        if !IDENT_RE.is_match(s) {
            return Err(TemplateError::Syntax {
                byte_offset,
                message: format!("malformed formatter name '{s}'"),
            });
        }
        return Ok(FormatterCall {
            name: s.to_string(),
            args: Vec::new(),
        });
    };
    let name = s[..paren].to_string();
    if !IDENT_RE.is_match(&name) {
        return Err(TemplateError::Syntax {
            byte_offset,
            message: format!("malformed formatter name '{name}'"),
        });
    }
    let rest = &s[paren..];
    let inner = rest
        .strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .ok_or_else(|| TemplateError::Syntax {
            byte_offset,
            message: format!("unbalanced parentheses in formatter '{s}'"),
        })?;

    let args = if inner.trim().is_empty() {
        Vec::new()
    } else {
        split_top_level(inner, ',')
            .into_iter()
            .map(|a| parse_arg(&a, byte_offset))
            .collect::<Result<Vec<_>, _>>()?
    };

    Ok(FormatterCall { name, args })
}

fn parse_arg(s: &str, byte_offset: usize) -> Result<Arg, TemplateError> {
    let trimmed = s.trim();
    if let Some(rest) = trimmed.strip_prefix("d.") {
        return Ok(Arg::Dynamic(Scope::RootData, parse_path(rest, byte_offset)?));
    }
    if let Some(rest) = trimmed.strip_prefix("c.") {
        return Ok(Arg::Dynamic(Scope::Complement, parse_path(rest, byte_offset)?));
    }
    if let Some(rest) = trimmed.strip_prefix('.') {
        return Ok(Arg::Dynamic(Scope::CurrentData, parse_path(rest, byte_offset)?));
    }
    Ok(Arg::Constant(parse_constant(trimmed)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(template: &str) -> Tag {
        let mut tags = parse(template).unwrap();
        assert_eq!(tags.len(), 1);
        tags.remove(0)
    }

    #[test]
    fn parses_plain_data_path() {
        let tag = single("{d.name}");
        assert_eq!(
            tag.kind,
            TagKind::Data(vec![Segment {
                name: "name".into(),
                ..Segment::default()
            }])
        );
    }

    #[test]
    fn defaults_to_data_kind_without_prefix() {
        let tag = single("{name}");
        assert!(matches!(tag.kind, TagKind::Data(_)));
    }

    #[test]
    fn parses_complement_and_option_and_alias_and_translation() {
        assert!(matches!(single("{c.foo}").kind, TagKind::Complement(_)));
        assert!(matches!(single("{o.foo}").kind, TagKind::Option(_)));
        assert_eq!(single("{# my-alias}").kind, TagKind::Alias("my-alias".into()));
        assert_eq!(single("{t(greeting)}").kind, TagKind::Translation("greeting".into()));
    }

    #[test]
    fn parses_iteration_marker() {
        let tag = single("{d.items[i].name}");
        let path = tag.path().unwrap();
        assert_eq!(path[0].marker, Some(Marker::Iteration));
        assert!(tag.is_iteration());
    }

    #[test]
    fn parses_iteration_offset() {
        let tag = single("{d.items[i+1].name}");
        let path = tag.path().unwrap();
        assert_eq!(path[0].marker, Some(Marker::IterationOffset(1)));
    }

    #[test]
    fn parses_aggregation_marker() {
        let tag = single("{d.items[].price}");
        assert!(tag.is_aggregation());
    }

    #[test]
    fn parses_positional_index() {
        let tag = single("{d.items[0].name}");
        let path = tag.path().unwrap();
        assert_eq!(path[0].marker, Some(Marker::Positional(0)));
    }

    #[test]
    fn parses_single_filter_predicate() {
        let tag = single("{d.customers[totalSpent>1000].name}");
        let path = tag.path().unwrap();
        let preds = path[0].filter.as_ref().expect("expected a filter");
        assert_eq!(preds.len(), 1);
        assert_eq!(preds[0].property, "totalSpent");
        assert_eq!(preds[0].op, FilterOp::Gt);
        assert_eq!(preds[0].literal, Value::Int(1000));
    }

    #[test]
    fn parses_multiple_bracket_groups_as_and() {
        let tag = single("{d.items[a=1][b=2].name}");
        let path = tag.path().unwrap();
        assert_eq!(path[0].filter.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn parses_filter_and_aggregation_on_the_same_segment() {
        let tag = single("{d.customers[totalSpent>1000][].name:aggCount()}");
        let path = tag.path().unwrap();
        assert_eq!(path[0].filter.as_ref().unwrap().len(), 1);
        assert_eq!(path[0].marker, Some(Marker::Aggregation));
        assert!(tag.is_aggregation());
    }

    #[test]
    fn parses_word_operator_predicates() {
        let tag = single("{d.items[name contains 'foo'].price}");
        let path = tag.path().unwrap();
        let preds = path[0].filter.as_ref().expect("expected a filter");
        assert_eq!(preds[0].op, FilterOp::Contains);
        assert_eq!(preds[0].literal, Value::Str("foo".into()));
    }

    #[test]
    fn parses_formatter_chain_with_mixed_args() {
        let tag = single("{d.items[].qty:mul(.price):aggSum():round(2)}");
        assert_eq!(tag.formatters.len(), 3);
        assert_eq!(tag.formatters[0].name, "mul");
        assert_eq!(
            tag.formatters[0].args[0],
            Arg::Dynamic(
                Scope::CurrentData,
                vec![Segment { name: "price".into(), ..Segment::default() }]
            )
        );
        assert_eq!(tag.formatters[2].name, "round");
        assert_eq!(tag.formatters[2].args[0], Arg::Constant(Value::Int(2)));
    }

    #[test]
    fn empty_path_is_a_syntax_error() {
        assert!(parse("{d.}").is_err());
    }

    #[test]
    fn unknown_prefix_with_invalid_continuation_errors() {
        assert!(parse("{t(unterminated}").is_err());
    }
}
