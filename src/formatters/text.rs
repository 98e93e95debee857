//! Text formatters (§4.5): case conversion, trimming, substring, replace.

use super::{Category, FormatterDef};
use crate::value::Value;

pub fn upper_case() -> FormatterDef {
    FormatterDef {
        name: "upperCase",
        category: Category::Text,
        min_args: 0,
        max_args: Some(0),
        execute: |v, _| Ok(Value::Str(v.stringify().to_uppercase())),
    }
}

pub fn lower_case() -> FormatterDef {
    FormatterDef {
        name: "lowerCase",
        category: Category::Text,
        min_args: 0,
        max_args: Some(0),
        execute: |v, _| Ok(Value::Str(v.stringify().to_lowercase())),
    }
}

/// Capitalizes only the first character; the rest of the string is
/// untouched (§9 open question: the source has a second, word-per-word
/// implementation, rejected here in favor of this one).
pub fn uc_first() -> FormatterDef {
    FormatterDef {
        name: "ucFirst",
        category: Category::Text,
        min_args: 0,
        max_args: Some(0),
        execute: |v, _| {
            let s = v.stringify();
            let mut chars = s.chars();
            let out = match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            };
            Ok(Value::Str(out))
        },
    }
}

pub fn trim() -> FormatterDef {
    FormatterDef {
        name: "trim",
        category: Category::Text,
        min_args: 0,
        max_args: Some(0),
        execute: |v, _| Ok(Value::Str(v.stringify().trim().to_string())),
    }
}

/// `substr(start[, length])`, code-point (char) indexed. A negative `start`
/// counts from the end of the string, matching the positional path index
/// convention used elsewhere in the grammar (§6).
pub fn substr() -> FormatterDef {
    FormatterDef {
        name: "substr",
        category: Category::Text,
        min_args: 1,
        max_args: Some(2),
        execute: |v, args| {
            let chars: Vec<char> = v.stringify().chars().collect();
            let len = chars.len() as i64;
            let raw_start = args[0].as_f64() as i64;
            let start = if raw_start < 0 { (len + raw_start).max(0) } else { raw_start.min(len) };
            let take = args
                .get(1)
                .map(|a| a.as_f64() as i64)
                .map(|n| n.max(0))
                .unwrap_or(len - start);
            let end = (start + take).min(len).max(start);
            Ok(Value::Str(chars[start as usize..end as usize].iter().collect()))
        },
    }
}

/// Literal (non-regex) replacement (§9 open question: the source has a regex
/// path and a literal path; this crate documents literal semantics as the
/// one it implements).
pub fn replace() -> FormatterDef {
    FormatterDef {
        name: "replace",
        category: Category::Text,
        min_args: 2,
        max_args: Some(2),
        execute: |v, args| {
            let search = args[0].stringify();
            let repl = args[1].stringify();
            Ok(Value::Str(v.stringify().replace(&search, &repl)))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uc_first_only_capitalizes_first_character() {
        let def = uc_first();
        let out = (def.execute)(&Value::Str("hello world".into()), &[]).unwrap();
        assert_eq!(out, Value::Str("Hello world".into()));
    }

    #[test]
    fn substr_takes_a_code_point_range() {
        let def = substr();
        let out = (def.execute)(&Value::Str("caf\u{e9} latte".into()), &[Value::Int(0), Value::Int(4)]).unwrap();
        assert_eq!(out, Value::Str("caf\u{e9}".into()));
    }

    #[test]
    fn replace_is_literal_not_regex() {
        let def = replace();
        let out = (def.execute)(&Value::Str("a.b.c".into()), &[Value::Str(".".into()), Value::Str("-".into())]).unwrap();
        assert_eq!(out, Value::Str("a-b-c".into()));
    }
}
