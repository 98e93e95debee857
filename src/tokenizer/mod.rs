//! Tag span tokenizer (§4.1).
//!
//! Scans a template's character stream and yields every top-level `{…}`
//! span as a byte-offset range plus its raw body (the text between the
//! braces, exclusive). Braces inside quoted strings don't terminate a span;
//! nesting is not supported, matching the spec's contract.

use crate::error::TemplateError;

/// One `{…}` span found in the template.
#[derive(Debug, Clone, PartialEq)]
pub struct TagSpan {
    /// Byte offset of the opening `{`.
    pub byte_start: usize,
    /// Byte offset one past the closing `}`.
    pub byte_end: usize,
    /// The text between the braces, exclusive.
    pub raw_body: String,
}

/// Scans `template` for top-level tag spans, in order of appearance.
pub fn tokenize(template: &str) -> Result<Vec<TagSpan>, TemplateError> {
    let bytes = template.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0usize;

    while i < bytes.len() {
        if bytes[i] == b'{' {
            let start = i;
            let (end, body) = scan_span(template, start)?;
            spans.push(TagSpan {
                byte_start: start,
                byte_end: end,
                raw_body: body,
            });
            i = end;
        } else {
            i += next_char_len(template, i);
        }
    }

    Ok(spans)
}

/// Scans one span starting at the `{` found at `start`. Returns the byte
/// offset just past the matching `}` and the body text between the braces.
fn scan_span(template: &str, start: usize) -> Result<(usize, String), TemplateError> {
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut body_start = None;
    let mut i = start;
    let bytes = template.as_bytes();

    while i < bytes.len() {
        let ch = template[i..].chars().next().unwrap();
        let len = ch.len_utf8();

        if let Some(q) = quote {
            if ch == '\\' {
                // Skip the escaped character too, so `\"` doesn't end the quote.
                i += len;
                if i < bytes.len() {
                    i += next_char_len(template, i);
                }
                continue;
            }
            if ch == q {
                quote = None;
            }
            i += len;
            continue;
        }

        match ch {
            '\'' | '"' => {
                quote = Some(ch);
            }
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return Err(TemplateError::Syntax {
                        byte_offset: start,
                        message: "unbalanced parenthesis in tag".to_string(),
                    });
                }
            }
            '{' => {
                if i == start {
                    body_start = Some(i + len);
                } else {
                    return Err(TemplateError::Syntax {
                        byte_offset: start,
                        message: "nested '{' is not supported".to_string(),
                    });
                }
            }
            '}' => {
                let body_start = body_start.ok_or_else(|| TemplateError::Syntax {
                    byte_offset: start,
                    message: "internal tokenizer error: missing body start".to_string(),
                })?;
                if depth != 0 {
                    return Err(TemplateError::Syntax {
                        byte_offset: start,
                        message: "unbalanced parenthesis in tag".to_string(),
                    });
                }
                let body = template[body_start..i].to_string();
                return Ok((i + len, body));
            }
            _ => {}
        }
        i += len;
    }

    if quote.is_some() {
        return Err(TemplateError::Syntax {
            byte_offset: start,
            message: "unterminated quote in tag".to_string(),
        });
    }
    Err(TemplateError::Syntax {
        byte_offset: start,
        message: "unterminated tag: missing closing '}'".to_string(),
    })
}

fn next_char_len(s: &str, at: usize) -> usize {
    s[at..].chars().next().map(char::len_utf8).unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_a_single_tag() {
        let spans = tokenize("Hello {d.name}!").unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].raw_body, "d.name");
        assert_eq!(&"Hello {d.name}!"[spans[0].byte_start..spans[0].byte_end], "{d.name}");
    }

    #[test]
    fn finds_multiple_tags_in_order() {
        let spans = tokenize("{d.a} and {d.b}").unwrap();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].raw_body, "d.a");
        assert_eq!(spans[1].raw_body, "d.b");
    }

    #[test]
    fn brace_inside_quotes_does_not_terminate_span() {
        let spans = tokenize(r#"{d.x:replace('{', 'y')}"#).unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].raw_body, "d.x:replace('{', 'y')");
    }

    #[test]
    fn no_tags_means_no_spans() {
        assert!(tokenize("plain text, no tags here").unwrap().is_empty());
    }

    #[test]
    fn unterminated_tag_is_a_syntax_error() {
        let err = tokenize("Hello {d.name").unwrap_err();
        assert!(matches!(err, TemplateError::Syntax { .. }));
    }

    #[test]
    fn unterminated_quote_is_a_syntax_error() {
        let err = tokenize("{d.x:replace('a, 'b')}").unwrap_err();
        assert!(matches!(err, TemplateError::Syntax { .. }));
    }

    #[test]
    fn nested_brace_is_a_syntax_error() {
        let err = tokenize("{d.a{d.b}}").unwrap_err();
        assert!(matches!(err, TemplateError::Syntax { .. }));
    }

    #[test]
    fn unicode_bytes_preserve_offsets() {
        let template = "caf\u{e9} {d.x}";
        let spans = tokenize(template).unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(&template[spans[0].byte_start..spans[0].byte_end], "{d.x}");
    }
}
