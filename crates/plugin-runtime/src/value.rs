//! Typed results of scripts executed in the content surface.
//!
//! The surface reports results as JSON text. [`parse_script_result`] decodes
//! that text into a [`ScriptValue`]: `null`/`undefined` become `Null`, whole
//! numbers that fit in an `i32` become `Int`, other numbers `Float`, JSON
//! strings are unescaped, containers recurse, and anything that is not JSON is
//! kept verbatim as a string.

use std::{collections::BTreeMap, fmt};

use serde::Serialize;
use serde_json::{Number, Value};

/// A decoded script result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ScriptValue {
    /// `null` or `undefined`.
    Null,
    /// Boolean.
    Bool(bool),
    /// Whole number in `i32` range.
    Int(i32),
    /// Any other number.
    Float(f64),
    /// String.
    String(String),
    /// Array.
    List(Vec<Self>),
    /// Object, keys sorted.
    Map(BTreeMap<String, Self>),
}

/// Decode the raw result text returned by the content surface.
pub fn parse_script_result(raw: &str) -> ScriptValue {
    let text = raw.trim();
    if text.is_empty() || text == "undefined" {
        return ScriptValue::Null;
    }
    match serde_json::from_str::<Value>(text) {
        Ok(v) => ScriptValue::from(v),
        Err(_) => ScriptValue::String(raw.to_string()),
    }
}

/// Numbers that are whole and fit in `i32` become `Int`.
fn from_number(n: &Number) -> ScriptValue {
    if let Some(i) = n.as_i64()
        && let Ok(small) = i32::try_from(i)
    {
        return ScriptValue::Int(small);
    }
    ScriptValue::Float(n.as_f64().unwrap_or(f64::NAN))
}

impl From<Value> for ScriptValue {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => from_number(&n),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect()),
        }
    }
}

impl ScriptValue {
    /// Whether this is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Convert back into a JSON value.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl fmt::Display for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            other => write!(f, "{}", other.to_json()),
        }
    }
}
