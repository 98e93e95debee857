//! Formatter registry (§4.5): named pure functions with arity metadata,
//! looked up by name and executed by the resolver against an already-resolved
//! `Value` and its already-resolved argument list.
//!
//! Grounded on the teacher's `processing_stages` registry: a
//! `once_cell::sync::Lazy<HashMap<&'static str, _>>` built once and read-only
//! thereafter, so concurrent renders share it without locking.

mod aggregation;
mod conditional;
mod number;
mod text;

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::parser::Arg;
use crate::value::Value;

pub use aggregation::reduce as reduce_aggregation;

/// Which family a formatter belongs to (§4.5). Used by the resolver to find
/// the aggregation formatter in a chain and split it into its per-element and
/// post-aggregation halves (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Text,
    Number,
    Conditional,
    Math,
    Aggregation,
    Utility,
}

/// One registered formatter: its name, category, argument arity, and pure
/// execution function. `execute` receives the piped-in value and the
/// already-resolved argument list (dynamic arguments have already been
/// evaluated against the resolution context by the caller).
pub struct FormatterDef {
    pub name: &'static str,
    pub category: Category,
    pub min_args: usize,
    pub max_args: Option<usize>,
    pub execute: fn(&Value, &[Value]) -> Result<Value, String>,
}

static REGISTRY: Lazy<HashMap<&'static str, FormatterDef>> = Lazy::new(|| {
    let defs = [
        text::upper_case(),
        text::lower_case(),
        text::uc_first(),
        text::trim(),
        text::substr(),
        text::replace(),
        number::round(),
        number::add(),
        number::sub(),
        number::mul(),
        number::div(),
        conditional::eq(),
        conditional::ne(),
        conditional::gt(),
        conditional::lt(),
        conditional::gte(),
        conditional::lte(),
        conditional::if_true(),
        conditional::if_empty(),
        aggregation::agg_sum(),
        aggregation::agg_avg(),
        aggregation::agg_count(),
        aggregation::agg_min(),
        aggregation::agg_max(),
    ];
    defs.into_iter().map(|d| (d.name, d)).collect()
});

/// Looks up a formatter by name. `None` means `UNKNOWN_FORMATTER` (§7).
pub fn lookup(name: &str) -> Option<&'static FormatterDef> {
    REGISTRY.get(name)
}

/// Validates a formatter call's argument *count* against the registry's
/// arity metadata. Dynamic arguments skip type validation (their runtime
/// type is unknown until resolution, per §4.5); only arity is checked here,
/// for both constant and dynamic arguments alike.
pub fn validate_arity(def: &FormatterDef, args: &[Arg]) -> Result<(), String> {
    let count = args.len();
    if count < def.min_args {
        return Err(format!(
            "'{}' requires at least {} argument(s), got {}",
            def.name, def.min_args, count
        ));
    }
    if let Some(max) = def.max_args {
        if count > max {
            return Err(format!(
                "'{}' accepts at most {} argument(s), got {}",
                def.name, max, count
            ));
        }
    }
    Ok(())
}

/// Executes one formatter call's already-resolved arguments against `value`.
pub fn execute(def: &FormatterDef, value: &Value, args: &[Value]) -> Result<Value, String> {
    (def.execute)(value, args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_contains_every_required_builtin() {
        for name in [
            "upperCase", "lowerCase", "ucFirst", "trim", "substr", "replace", "round", "add",
            "sub", "mul", "div", "eq", "ne", "gt", "lt", "gte", "lte", "ifTrue", "ifEmpty",
            "aggSum", "aggAvg", "aggCount", "aggMin", "aggMax",
        ] {
            assert!(lookup(name).is_some(), "missing formatter '{name}'");
        }
    }

    #[test]
    fn unknown_formatter_is_absent() {
        assert!(lookup("doesNotExist").is_none());
    }
}
