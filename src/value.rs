use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number};

/// Field name carrying an object's dynamic class when values cross the JSON
/// boundary.
pub const TYPE_TAG: &str = ".type";
/// Field name marking an object as the null instance of its class.
pub const NULL_TAG: &str = ".isnull";

#[derive(Clone, Debug, PartialEq, Default)]
pub enum Value {
    #[default]
    Undef,
    Bool(bool),
    Int(i64),
    Str(String),
    Array(Vec<Value>),
    Hash(BTreeMap<String, Value>),
    Object(Object),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Object {
    pub class: String,
    pub is_null: bool,
    pub fields: BTreeMap<String, Value>,
}

impl Object {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            is_null: false,
            fields: BTreeMap::new(),
        }
    }

    pub fn null(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            is_null: true,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    /// Dynamic class of an object receiver; `None` for every other value.
    pub fn type_tag(&self) -> Option<&str> {
        match self {
            Value::Object(obj) => Some(obj.class.as_str()),
            _ => None,
        }
    }

    /// Receivers that cannot take a method call: absent values and
    /// null-tagged objects.
    pub fn is_null_object(&self) -> bool {
        match self {
            Value::Undef => true,
            Value::Object(obj) => obj.is_null,
            _ => false,
        }
    }

    pub fn is_undef(&self) -> bool {
        matches!(self, Value::Undef)
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undef => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Str(s) => !s.is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::Hash(map) => !map.is_empty(),
            Value::Object(obj) => !obj.is_null,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Undef => "undef",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Hash(_) => "hash",
            Value::Object(_) => "object",
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Undef => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::Number(Number::from(*i)),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Hash(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Value::Object(obj) => {
                let mut out: Map<String, serde_json::Value> = obj
                    .fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect();
                out.insert(TYPE_TAG.to_string(), serde_json::Value::String(obj.class.clone()));
                if obj.is_null {
                    out.insert(NULL_TAG.to_string(), serde_json::Value::Bool(true));
                }
                serde_json::Value::Object(out)
            }
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Undef,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Int(
                n.as_i64()
                    .or_else(|| n.as_f64().map(|f| f as i64))
                    .unwrap_or_default(),
            ),
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(mut map) => match map.remove(TYPE_TAG) {
                Some(serde_json::Value::String(class)) => {
                    let is_null = map
                        .remove(NULL_TAG)
                        .map(|flag| Value::from(flag).is_truthy())
                        .unwrap_or(false);
                    Value::Object(Object {
                        class,
                        is_null,
                        fields: map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
                    })
                }
                other => {
                    if let Some(tag) = other {
                        map.insert(TYPE_TAG.to_string(), tag);
                    }
                    Value::Hash(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
                }
            },
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Object> for Value {
    fn from(obj: Object) -> Self {
        Value::Object(obj)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undef => Ok(()),
            Value::Bool(b) => write!(f, "{}", if *b { "1" } else { "" }),
            Value::Int(i) => write!(f, "{i}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Array(items) => write!(f, "<array len={}>", items.len()),
            Value::Hash(map) => write!(f, "<hash len={}>", map.len()),
            Value::Object(obj) if obj.is_null => write!(f, "<null {}>", obj.class),
            Value::Object(obj) => write!(f, "<object {}>", obj.class),
        }
    }
}
