//! Dynamic Argument Values
//!
//! Tool-call arguments arrive as untyped JSON produced by a model. Rather than
//! inspecting `serde_json::Value` at every coercion site, arguments are
//! converted once into `ArgValue`, an explicit tagged union whose variants the
//! validator matches exhaustively.
//!
//! `Unsigned` only ever holds values above `i64::MAX`; everything that fits a
//! signed 64-bit integer is stored as `Integer`. This keeps the overflow case
//! visible to the validator instead of silently truncating it.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Argument mapping keyed by argument name.
///
/// Ordered so that validation reports and rendered messages are deterministic.
pub type ArgMap = BTreeMap<String, ArgValue>;

/// A dynamically-typed argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Null,
    Bool(bool),
    Integer(i64),
    /// An unsigned integer that does not fit in `i64`.
    Unsigned(u64),
    Float(f64),
    String(String),
    Array(Vec<ArgValue>),
    Object(ArgMap),
}

impl ArgValue {
    /// JSON-schema style name of this value's type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            ArgValue::Null => "null",
            ArgValue::Bool(_) => "boolean",
            ArgValue::Integer(_) | ArgValue::Unsigned(_) => "integer",
            ArgValue::Float(_) => "number",
            ArgValue::String(_) => "string",
            ArgValue::Array(_) => "array",
            ArgValue::Object(_) => "object",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ArgValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ArgValue::Integer(i) => Some(*i as f64),
            ArgValue::Unsigned(u) => Some(*u as f64),
            ArgValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ArgValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[ArgValue]> {
        match self {
            ArgValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ArgMap> {
        match self {
            ArgValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ArgValue::Null)
    }

    /// Convert back into a `serde_json::Value`.
    ///
    /// Non-finite floats have no JSON representation and become `null`.
    pub fn to_json(&self) -> Value {
        match self {
            ArgValue::Null => Value::Null,
            ArgValue::Bool(b) => Value::Bool(*b),
            ArgValue::Integer(i) => Value::from(*i),
            ArgValue::Unsigned(u) => Value::from(*u),
            ArgValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ArgValue::String(s) => Value::String(s.clone()),
            ArgValue::Array(items) => Value::Array(items.iter().map(ArgValue::to_json).collect()),
            ArgValue::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for ArgValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => ArgValue::Null,
            Value::Bool(b) => ArgValue::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    ArgValue::Integer(i)
                } else if let Some(u) = n.as_u64() {
                    ArgValue::Unsigned(u)
                } else {
                    ArgValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => ArgValue::String(s),
            Value::Array(items) => ArgValue::Array(items.into_iter().map(ArgValue::from).collect()),
            Value::Object(map) => {
                ArgValue::Object(map.into_iter().map(|(k, v)| (k, ArgValue::from(v))).collect())
            }
        }
    }
}

impl From<&ArgValue> for Value {
    fn from(value: &ArgValue) -> Self {
        value.to_json()
    }
}

impl From<&str> for ArgValue {
    fn from(s: &str) -> Self {
        ArgValue::String(s.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(s: String) -> Self {
        ArgValue::String(s)
    }
}

impl From<i64> for ArgValue {
    fn from(i: i64) -> Self {
        ArgValue::Integer(i)
    }
}

impl From<u64> for ArgValue {
    fn from(u: u64) -> Self {
        match i64::try_from(u) {
            Ok(i) => ArgValue::Integer(i),
            Err(_) => ArgValue::Unsigned(u),
        }
    }
}

impl From<f64> for ArgValue {
    fn from(f: f64) -> Self {
        ArgValue::Float(f)
    }
}

impl From<bool> for ArgValue {
    fn from(b: bool) -> Self {
        ArgValue::Bool(b)
    }
}

impl From<Vec<ArgValue>> for ArgValue {
    fn from(items: Vec<ArgValue>) -> Self {
        ArgValue::Array(items)
    }
}

impl From<ArgMap> for ArgValue {
    fn from(map: ArgMap) -> Self {
        ArgValue::Object(map)
    }
}

/// Renders the value the way it should appear inside prose sent back to a
/// model: scalars bare, composites as compact JSON.
impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Null => write!(f, "null"),
            ArgValue::Bool(b) => write!(f, "{}", b),
            ArgValue::Integer(i) => write!(f, "{}", i),
            ArgValue::Unsigned(u) => write!(f, "{}", u),
            ArgValue::Float(x) => write!(f, "{}", x),
            ArgValue::String(s) => write!(f, "{}", s),
            ArgValue::Array(_) | ArgValue::Object(_) => write!(f, "{}", self.to_json()),
        }
    }
}

impl Serialize for ArgValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ArgValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(ArgValue::from)
    }
}

/// Convert a JSON object into an argument mapping. Returns `None` for any
/// other JSON shape.
pub fn args_from_json(value: Value) -> Option<ArgMap> {
    match ArgValue::from(value) {
        ArgValue::Object(map) => Some(map),
        _ => None,
    }
}

/// Convert an argument mapping into a JSON object.
pub fn args_to_json(args: &ArgMap) -> Value {
    Value::Object(args.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
}
