//! Aggregation formatters (§4.4, §4.5). These name the reduction applied to
//! an aggregation tag's per-element values; the resolver finds the first
//! aggregation-category formatter in a chain and calls [`reduce`] directly
//! rather than going through [`super::execute`], since the reduction needs
//! the whole element set rather than one piped-in value. `execute` is still
//! provided so the registry can validate/describe these formatters, and so
//! one applied directly to an array value (outside an aggregation bracket)
//! behaves sensibly rather than panicking.

use super::{Category, FormatterDef};
use crate::value::Value;

/// Reduces already-coerced numeric values per the named aggregation. Called
/// by the resolver with the per-element, formatter-applied values of an
/// aggregation tag (§4.4). `aggCount` counts *elements*, not numeric values,
/// and is never resolved through this path (the resolver counts directly);
/// it is accepted here too for `execute`'s benefit.
pub fn reduce(name: &str, values: &[f64]) -> Value {
    match name {
        "aggSum" => Value::Float(values.iter().sum()),
        "aggAvg" => Value::Float(if values.is_empty() {
            0.0
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        }),
        "aggCount" => Value::Int(values.len() as i64),
        "aggMin" => Value::Float(if values.is_empty() {
            0.0
        } else {
            values.iter().cloned().fold(f64::INFINITY, f64::min)
        }),
        "aggMax" => Value::Float(if values.is_empty() {
            0.0
        } else {
            values.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
        }),
        other => unreachable!("'{other}' is not an aggregation formatter"),
    }
}

pub fn agg_sum() -> FormatterDef {
    FormatterDef {
        name: "aggSum",
        category: Category::Aggregation,
        min_args: 0,
        max_args: Some(0),
        execute: |v, _| array_reduce(v, "aggSum"),
    }
}
pub fn agg_avg() -> FormatterDef {
    FormatterDef {
        name: "aggAvg",
        category: Category::Aggregation,
        min_args: 0,
        max_args: Some(0),
        execute: |v, _| array_reduce(v, "aggAvg"),
    }
}
pub fn agg_count() -> FormatterDef {
    FormatterDef {
        name: "aggCount",
        category: Category::Aggregation,
        min_args: 0,
        max_args: Some(0),
        execute: |v, _| array_reduce(v, "aggCount"),
    }
}
pub fn agg_min() -> FormatterDef {
    FormatterDef {
        name: "aggMin",
        category: Category::Aggregation,
        min_args: 0,
        max_args: Some(0),
        execute: |v, _| array_reduce(v, "aggMin"),
    }
}
pub fn agg_max() -> FormatterDef {
    FormatterDef {
        name: "aggMax",
        category: Category::Aggregation,
        min_args: 0,
        max_args: Some(0),
        execute: |v, _| array_reduce(v, "aggMax"),
    }
}

fn array_reduce(v: &Value, name: &str) -> Result<Value, String> {
    let items = v
        .as_array()
        .ok_or_else(|| format!("'{name}' requires an array input"))?;
    let values: Vec<f64> = items.iter().map(Value::as_f64).collect();
    Ok(reduce(name, &values))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agg_sum_adds_numeric_elements() {
        assert_eq!(reduce("aggSum", &[1.0, 2.0, 3.0]), Value::Float(6.0));
    }

    #[test]
    fn agg_min_max_are_zero_for_empty_arrays() {
        assert_eq!(reduce("aggMin", &[]), Value::Float(0.0));
        assert_eq!(reduce("aggMax", &[]), Value::Float(0.0));
    }

    #[test]
    fn direct_execute_requires_an_array() {
        let def = agg_sum();
        assert!((def.execute)(&Value::Int(1), &[]).is_err());
        let out = (def.execute)(&Value::Array(vec![Value::Int(1), Value::Int(2)]), &[]).unwrap();
        assert_eq!(out, Value::Float(3.0));
    }
}
