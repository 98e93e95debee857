//! The runtime value universe the resolver and formatters operate over.
//!
//! A single tagged union covers everything user data can be: `Null`, `Bool`,
//! two numeric cases (`Int`/`Float`, kept distinct so aggregation and
//! formatting can tell "3" from "3.0"), `Str`, `Array`, and `Map`.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The runtime value universe. See module docs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<Value>),
    Map(HashMap<String, Value>),
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Truthiness used by `ifTrue` and filter boolean coercions: `null`,
    /// `false`, `0`, `0.0`, and `""` are falsy; everything else (including
    /// empty arrays/maps) is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Array(_) | Value::Map(_) => true,
        }
    }

    /// `null`/`undefined`-shaped emptiness used by `ifEmpty`: null or an
    /// empty string. Arrays and maps are not considered "empty" here since
    /// the spec only names null/undefined/empty-string as the trigger.
    pub fn is_empty_ish(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Str(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Numeric coercion for arithmetic and aggregation. Non-numeric,
    /// non-numeric-convertible values coerce to 0.0 per §4.4.
    pub fn as_f64(&self) -> f64 {
        match self {
            Value::Int(i) => *i as f64,
            Value::Float(f) => *f,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Str(s) => s.trim().parse::<f64>().unwrap_or(0.0),
            _ => 0.0,
        }
    }

    /// Whether this value can participate in numeric comparison/coercion
    /// without falling back to the 0.0 default (used by the `eq`/`gt`/...
    /// formatters and filter predicates to decide numeric vs. string
    /// comparison mode).
    pub fn is_numeric_convertible(&self) -> bool {
        match self {
            Value::Int(_) | Value::Float(_) => true,
            Value::Str(s) => s.trim().parse::<f64>().is_ok(),
            _ => false,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(m) => m.get(key),
            _ => None,
        }
    }

    /// Canonical stringification used by scalar/aggregation substitution
    /// (§4.6): numbers in canonical decimal form, booleans as `true`/`false`,
    /// `null`/`undefined` as the empty string.
    pub fn stringify(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format_canonical_float(*f),
            Value::Str(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(Value::stringify)
                .collect::<Vec<_>>()
                .join(", "),
            Value::Map(_) => String::new(),
        }
    }
}

/// Renders a float without a trailing `.0` for whole numbers, and without
/// spurious floating-point noise, matching the "canonical decimal form" the
/// spec calls for.
fn format_canonical_float(f: f64) -> String {
    if f.is_infinite() {
        return if f > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if f.is_nan() {
        return "NaN".to_string();
    }
    if f.fract() == 0.0 && f.abs() < 1e15 {
        return format!("{}", f as i64);
    }
    let mut s = format!("{f}");
    if !s.contains('.') && !s.contains('e') {
        s.push_str(".0");
    }
    s
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.stringify())
    }
}

/// Equality used by filter predicates and comparison formatters (§4.4):
/// numeric coercion when both sides are numeric-convertible, otherwise exact
/// string comparison on the canonical stringified form.
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    if a.is_numeric_convertible() && b.is_numeric_convertible() {
        a.as_f64() == b.as_f64()
    } else {
        a.stringify() == b.stringify()
    }
}

/// Ordering used by `gt`/`lt`/`gte`/`lte`, numeric-coerced the same way as
/// [`loose_eq`].
pub fn loose_cmp(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    if a.is_numeric_convertible() && b.is_numeric_convertible() {
        a.as_f64().partial_cmp(&b.as_f64())
    } else {
        Some(a.stringify().cmp(&b.stringify()))
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}
