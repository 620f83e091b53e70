//! Conversions between Rhai values and JSON.

use rhai::{
    Dynamic,
    serde::{from_dynamic, to_dynamic},
};
use serde::Serialize;
use serde_json::Value;

/// Convert any serializable value into a `Dynamic`, falling back to `()`.
pub fn dynamic_of<T: Serialize>(value: &T) -> Dynamic {
    to_dynamic(value).unwrap_or(Dynamic::UNIT)
}

/// Convert a `Dynamic` into JSON. Values with no JSON form become their
/// display string.
pub fn json_of(value: &Dynamic) -> Value {
    if value.is_unit() {
        return Value::Null;
    }
    from_dynamic::<Value>(value).unwrap_or_else(|_| Value::String(value.to_string()))
}

/// `Some(dynamic)` becomes a Rhai value; `None` becomes `()`.
pub fn optional<T: Serialize>(value: Option<T>) -> Dynamic {
    value.map_or(Dynamic::UNIT, |v| dynamic_of(&v))
}

#[cfg(test)]
mod tests {
    use rhai::{Array, Map};
    use serde_json::json;

    use super::*;

    #[test]
    fn json_to_dynamic_and_back() {
        let v = json!({"a": 1, "b": [true, "x", 1.5], "c": null});
        let d = dynamic_of(&v);
        assert!(d.is_map());
        let map = d.clone().cast::<Map>();
        assert_eq!(map["a"].as_int().ok(), Some(1));
        assert_eq!(map["b"].clone().cast::<Array>().len(), 3);
        assert_eq!(json_of(&d), v);
    }

    #[test]
    fn unit_is_null() {
        assert_eq!(json_of(&Dynamic::UNIT), Value::Null);
        assert!(optional::<i64>(None).is_unit());
        assert_eq!(optional(Some(3_i64)).as_int().ok(), Some(3));
    }
}
