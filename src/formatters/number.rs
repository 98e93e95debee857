//! Numeric formatters (§4.5): rounding and the four arithmetic operators.

use super::{Category, FormatterDef};
use crate::value::Value;

/// Half-up rounding (ties round away from zero) to `10^decimals`.
pub fn round() -> FormatterDef {
    FormatterDef {
        name: "round",
        category: Category::Number,
        min_args: 0,
        max_args: Some(1),
        execute: |v, args| {
            let decimals = args.first().map(|a| a.as_f64() as i32).unwrap_or(0);
            let factor = 10f64.powi(decimals);
            let scaled = v.as_f64() * factor;
            Ok(Value::Float(round_half_up(scaled) / factor))
        },
    }
}

fn round_half_up(x: f64) -> f64 {
    if x >= 0.0 {
        (x + 0.5).floor()
    } else {
        (x - 0.5).ceil()
    }
}

/// `div` by zero follows plain IEEE-754 float division (±Infinity, or NaN
/// for 0/0), matching [`crate::value::Value::stringify`]'s existing handling
/// of those cases rather than introducing a separate error path.
pub fn add() -> FormatterDef {
    FormatterDef {
        name: "add",
        category: Category::Math,
        min_args: 1,
        max_args: Some(1),
        execute: add_exec,
    }
}
pub fn sub() -> FormatterDef {
    FormatterDef {
        name: "sub",
        category: Category::Math,
        min_args: 1,
        max_args: Some(1),
        execute: sub_exec,
    }
}
pub fn mul() -> FormatterDef {
    FormatterDef {
        name: "mul",
        category: Category::Math,
        min_args: 1,
        max_args: Some(1),
        execute: mul_exec,
    }
}
pub fn div() -> FormatterDef {
    FormatterDef {
        name: "div",
        category: Category::Math,
        min_args: 1,
        max_args: Some(1),
        execute: div_exec,
    }
}

fn add_exec(v: &Value, args: &[Value]) -> Result<Value, String> {
    Ok(Value::Float(v.as_f64() + args[0].as_f64()))
}
fn sub_exec(v: &Value, args: &[Value]) -> Result<Value, String> {
    Ok(Value::Float(v.as_f64() - args[0].as_f64()))
}
fn mul_exec(v: &Value, args: &[Value]) -> Result<Value, String> {
    Ok(Value::Float(v.as_f64() * args[0].as_f64()))
}
fn div_exec(v: &Value, args: &[Value]) -> Result<Value, String> {
    Ok(Value::Float(v.as_f64() / args[0].as_f64()))
}
