//! Default runtime helpers that compiled programs reach through the builtin
//! table (`hashSize`, `isDefined`, `noTags`, ...).

use crate::error::{RuntimeError, RuntimeResult};
use crate::value::Value;

pub fn hash_size(value: &Value) -> usize {
    match value {
        Value::Hash(map) => map.len(),
        Value::Object(obj) => obj.fields.len(),
        Value::Array(items) => items.len(),
        _ => 0,
    }
}

pub fn is_defined(value: &Value) -> bool {
    !value.is_null_object()
}

pub fn hash_to_bool(value: &Value) -> bool {
    hash_size(value) != 0
}

pub fn no_tags(s: &str) -> String {
    s.replace('<', "&lt;").replace('>', "&gt;")
}

/// Inclusive range; empty when `n1 > n2`.
pub fn make_range(n1: i64, n2: i64) -> Vec<Value> {
    (n1..=n2).map(Value::Int).collect()
}

/// Reversed copy; the input is left untouched.
pub fn reverse_array(items: &[Value]) -> Vec<Value> {
    items.iter().rev().cloned().collect()
}

pub fn reverse_string(s: &str) -> String {
    s.chars().rev().collect()
}

pub(crate) fn ensure_arity(args: &[Value], expected: usize, name: &'static str) -> RuntimeResult<()> {
    if args.len() != expected {
        return Err(RuntimeError::builtin(
            name,
            format!("expects {expected} argument(s), got {}", args.len()),
        ));
    }
    Ok(())
}

pub(crate) fn expect_int(value: &Value, name: &'static str) -> RuntimeResult<i64> {
    value
        .as_int()
        .ok_or_else(|| RuntimeError::builtin(name, format!("expected int, got {}", value.kind())))
}

pub(crate) fn expect_array<'a>(value: &'a Value, name: &'static str) -> RuntimeResult<&'a [Value]> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(RuntimeError::builtin(
            name,
            format!("expected array, got {}", other.kind()),
        )),
    }
}
