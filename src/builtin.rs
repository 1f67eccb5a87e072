use std::collections::HashMap;
use std::fmt;

use crate::error::{RuntimeError, RuntimeResult};
use crate::stdlib::{self, ensure_arity, expect_array, expect_int};
use crate::value::Value;

pub type BuiltinFn = fn(&[Value]) -> RuntimeResult<Value>;

/// Host-provided primitives, reachable from compiled programs independently
/// of any layer.
#[derive(Clone, Default)]
pub struct Builtins {
    fns: HashMap<String, BuiltinFn>,
}

impl Builtins {
    pub fn new() -> Self {
        Self::default()
    }

    /// The default runtime library.
    pub fn standard() -> Self {
        let mut fns: HashMap<String, BuiltinFn> = HashMap::new();
        fns.insert("hashSize".into(), builtin_hash_size as BuiltinFn);
        fns.insert("isDefined".into(), builtin_is_defined as BuiltinFn);
        fns.insert("hashToBool".into(), builtin_hash_to_bool as BuiltinFn);
        fns.insert("noTags".into(), builtin_no_tags as BuiltinFn);
        fns.insert("makeRange".into(), builtin_make_range as BuiltinFn);
        fns.insert("reverseArray".into(), builtin_reverse_array as BuiltinFn);
        fns.insert("reverseString".into(), builtin_reverse_string as BuiltinFn);
        Self { fns }
    }

    pub fn get(&self, name: &str) -> Option<BuiltinFn> {
        self.fns.get(name).copied()
    }

    pub fn register(&mut self, name: impl Into<String>, func: BuiltinFn) -> Option<BuiltinFn> {
        self.fns.insert(name.into(), func)
    }

    pub fn call(&self, name: &str, args: &[Value]) -> RuntimeResult<Value> {
        let func = self
            .get(name)
            .ok_or_else(|| RuntimeError::UnknownFunction(name.to_string()))?;
        func(args)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fns.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fns.is_empty()
    }
}

impl fmt::Debug for Builtins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("Builtins").field("fns", &names).finish()
    }
}

fn builtin_hash_size(args: &[Value]) -> RuntimeResult<Value> {
    ensure_arity(args, 1, "hashSize")?;
    Ok(Value::Int(stdlib::hash_size(&args[0]) as i64))
}

fn builtin_is_defined(args: &[Value]) -> RuntimeResult<Value> {
    ensure_arity(args, 1, "isDefined")?;
    Ok(Value::Bool(stdlib::is_defined(&args[0])))
}

fn builtin_hash_to_bool(args: &[Value]) -> RuntimeResult<Value> {
    ensure_arity(args, 1, "hashToBool")?;
    Ok(Value::Bool(stdlib::hash_to_bool(&args[0])))
}

fn builtin_no_tags(args: &[Value]) -> RuntimeResult<Value> {
    ensure_arity(args, 1, "noTags")?;
    Ok(Value::Str(stdlib::no_tags(&args[0].to_string())))
}

fn builtin_make_range(args: &[Value]) -> RuntimeResult<Value> {
    ensure_arity(args, 2, "makeRange")?;
    let from = expect_int(&args[0], "makeRange")?;
    let to = expect_int(&args[1], "makeRange")?;
    Ok(Value::Array(stdlib::make_range(from, to)))
}

fn builtin_reverse_array(args: &[Value]) -> RuntimeResult<Value> {
    ensure_arity(args, 1, "reverseArray")?;
    let items = expect_array(&args[0], "reverseArray")?;
    Ok(Value::Array(stdlib::reverse_array(items)))
}

fn builtin_reverse_string(args: &[Value]) -> RuntimeResult<Value> {
    ensure_arity(args, 1, "reverseString")?;
    Ok(Value::Str(stdlib::reverse_string(&args[0].to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_table_exposes_runtime_helpers() {
        let builtins = Builtins::standard();
        for name in [
            "hashSize",
            "isDefined",
            "hashToBool",
            "noTags",
            "makeRange",
            "reverseArray",
            "reverseString",
        ] {
            assert!(builtins.get(name).is_some(), "missing {name}");
        }
        assert_eq!(builtins.len(), 7);
        assert!(Builtins::new().is_empty());
    }

    #[test]
    fn call_dispatches_by_name() {
        let builtins = Builtins::standard();
        let out = builtins
            .call("makeRange", &[Value::Int(1), Value::Int(2)])
            .expect("makeRange");
        assert_eq!(out, Value::Array(vec![Value::Int(1), Value::Int(2)]));
        let out = builtins
            .call("noTags", &[Value::str("<i>")])
            .expect("noTags");
        assert_eq!(out, Value::str("&lt;i&gt;"));
    }

    #[test]
    fn arity_and_type_errors_name_the_builtin() {
        let builtins = Builtins::standard();
        let err = builtins.call("hashSize", &[]).unwrap_err();
        assert!(err.to_string().starts_with("hashSize:"), "{err}");
        let err = builtins
            .call("makeRange", &[Value::str("a"), Value::Int(2)])
            .unwrap_err();
        assert!(err.to_string().contains("expected int"), "{err}");
    }

    #[test]
    fn unknown_builtin_is_reported() {
        let err = Builtins::new().call("nope", &[]).unwrap_err();
        assert_eq!(err, RuntimeError::UnknownFunction("nope".into()));
    }

    #[test]
    fn register_replaces_existing_entry() {
        fn always_one(_args: &[Value]) -> RuntimeResult<Value> {
            Ok(Value::Int(1))
        }
        let mut builtins = Builtins::standard();
        assert!(builtins.register("hashSize", always_one).is_some());
        assert_eq!(builtins.call("hashSize", &[]).expect("replaced"), Value::Int(1));
    }
}
