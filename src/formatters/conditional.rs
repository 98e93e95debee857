//! Comparison and conditional formatters (§4.5).

use super::{Category, FormatterDef};
use crate::value::{loose_cmp, loose_eq, Value};
use std::cmp::Ordering;

pub fn eq() -> FormatterDef {
    FormatterDef {
        name: "eq",
        category: Category::Conditional,
        min_args: 1,
        max_args: Some(1),
        execute: |v, args| Ok(Value::Bool(loose_eq(v, &args[0]))),
    }
}
pub fn ne() -> FormatterDef {
    FormatterDef {
        name: "ne",
        category: Category::Conditional,
        min_args: 1,
        max_args: Some(1),
        execute: |v, args| Ok(Value::Bool(!loose_eq(v, &args[0]))),
    }
}
pub fn gt() -> FormatterDef {
    FormatterDef {
        name: "gt",
        category: Category::Conditional,
        min_args: 1,
        max_args: Some(1),
        execute: gt_exec,
    }
}
pub fn lt() -> FormatterDef {
    FormatterDef {
        name: "lt",
        category: Category::Conditional,
        min_args: 1,
        max_args: Some(1),
        execute: lt_exec,
    }
}
pub fn gte() -> FormatterDef {
    FormatterDef {
        name: "gte",
        category: Category::Conditional,
        min_args: 1,
        max_args: Some(1),
        execute: gte_exec,
    }
}
pub fn lte() -> FormatterDef {
    FormatterDef {
        name: "lte",
        category: Category::Conditional,
        min_args: 1,
        max_args: Some(1),
        execute: lte_exec,
    }
}

fn gt_exec(v: &Value, args: &[Value]) -> Result<Value, String> {
    Ok(Value::Bool(loose_cmp(v, &args[0]) == Some(Ordering::Greater)))
}
fn lt_exec(v: &Value, args: &[Value]) -> Result<Value, String> {
    Ok(Value::Bool(loose_cmp(v, &args[0]) == Some(Ordering::Less)))
}
fn gte_exec(v: &Value, args: &[Value]) -> Result<Value, String> {
    Ok(Value::Bool(matches!(
        loose_cmp(v, &args[0]),
        Some(Ordering::Greater) | Some(Ordering::Equal)
    )))
}
fn lte_exec(v: &Value, args: &[Value]) -> Result<Value, String> {
    Ok(Value::Bool(matches!(
        loose_cmp(v, &args[0]),
        Some(Ordering::Less) | Some(Ordering::Equal)
    )))
}

/// `ifTrue(a[, b])`: the *piped-in* value's truthiness selects `a` or `b`
/// (or empty string if `b` is absent), not the truthiness of `a` itself.
pub fn if_true() -> FormatterDef {
    FormatterDef {
        name: "ifTrue",
        category: Category::Conditional,
        min_args: 1,
        max_args: Some(2),
        execute: |v, args| {
            if v.is_truthy() {
                Ok(args[0].clone())
            } else {
                Ok(args.get(1).cloned().unwrap_or(Value::Str(String::new())))
            }
        },
    }
}

/// `ifEmpty(x)`: substitutes `x` when the piped-in value is null or an empty
/// string (§3 "empty/undefined" per [`Value::is_empty_ish`]).
pub fn if_empty() -> FormatterDef {
    FormatterDef {
        name: "ifEmpty",
        category: Category::Conditional,
        min_args: 1,
        max_args: Some(1),
        execute: |v, args| {
            if v.is_empty_ish() {
                Ok(args[0].clone())
            } else {
                Ok(v.clone())
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eq_coerces_numeric_strings() {
        let def = eq();
        let out = (def.execute)(&Value::Int(5), &[Value::Str("5".into())]).unwrap();
        assert_eq!(out, Value::Bool(true));
    }

    #[test]
    fn if_true_checks_the_piped_value_not_the_branches() {
        let def = if_true();
        let out = (def.execute)(&Value::Bool(true), &[Value::Str("ON".into()), Value::Str("OFF".into())]).unwrap();
        assert_eq!(out, Value::Str("ON".into()));
        let out = (def.execute)(&Value::Bool(false), &[Value::Str("ON".into()), Value::Str("OFF".into())]).unwrap();
        assert_eq!(out, Value::Str("OFF".into()));
    }

    #[test]
    fn if_empty_only_triggers_on_null_or_empty_string() {
        let def = if_empty();
        let out = (def.execute)(&Value::Null, &[Value::Str("fallback".into())]).unwrap();
        assert_eq!(out, Value::Str("fallback".into()));
        let out = (def.execute)(&Value::Int(0), &[Value::Str("fallback".into())]).unwrap();
        assert_eq!(out, Value::Int(0));
    }
}
