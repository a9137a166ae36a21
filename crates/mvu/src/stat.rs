//! Stat-data helpers.
//!
//! A `ValueWithDescription` leaf pairs a value with a human-readable note and
//! comes in two spellings:
//!
//! - pair form: `[value, "description"]`
//! - record form: `{"value": value, "description": "description"}`
//!
//! In both, `value` is a primitive. A pair whose first element is a string
//! reads as a plain two-item list (`["剑", "盾"]`), so the pair form needs a
//! non-string value.

use serde_json::Value;

fn is_primitive(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

/// Check whether `value` is a `ValueWithDescription` leaf in either form.
pub fn is_value_with_description(value: &Value) -> bool {
    match value {
        Value::Array(pair) => {
            pair.len() == 2 && is_primitive(&pair[0]) && !pair[0].is_string() && pair[1].is_string()
        }
        Value::Object(map) => {
            map.len() == 2
                && map.get("value").is_some_and(is_primitive)
                && map.get("description").is_some_and(Value::is_string)
        }
        _ => false,
    }
}

/// Mutable slot of the value part of a `ValueWithDescription` leaf.
pub fn described_value_mut(value: &mut Value) -> Option<&mut Value> {
    if !is_value_with_description(value) {
        return None;
    }
    match value {
        Value::Array(pair) => pair.first_mut(),
        Value::Object(map) => map.get_mut("value"),
        _ => None,
    }
}

/// Parse a string as a number the way a lenient reader would (`" 42 "`, `"1.5"`).
pub fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

/// Round to `digits` significant digits.
pub fn round_significant(n: f64, digits: usize) -> f64 {
    if n == 0.0 || !n.is_finite() || digits == 0 {
        return n;
    }
    format!("{:.*e}", digits.saturating_sub(1), n)
        .parse()
        .unwrap_or(n)
}
