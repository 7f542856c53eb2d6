//! Numeric normalization for counter values on the wire.
//!
//! Depending on which backend produced an event, a counter value may arrive
//! as a plain JSON number, a numeric string, or a MongoDB extended-JSON
//! wrapper such as `{"$numberInt": "3"}`. All of them are normalized to a
//! `u64` once, at the ingestion boundary, so downstream logic never sees more
//! than one numeric type.

use serde_json::Value;

/// Normalize a wire value to a counter.
///
/// Precedence order: plain number, numeric string, extended-number wrapper
/// object. Anything unrecognized (or negative, or non-finite) is absent —
/// callers fall back to the previous known value, never to zero.
pub fn normalize_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                return Some(u);
            }
            let f = n.as_f64()?;
            if f.is_finite() && f >= 0.0 {
                Some(f as u64)
            } else {
                None
            }
        }
        Value::String(s) => parse_numeric_str(s),
        Value::Object(map) => {
            for key in ["$numberInt", "$numberLong"] {
                if let Some(Value::String(s)) = map.get(key) {
                    return parse_numeric_str(s);
                }
            }
            None
        }
        _ => None,
    }
}

fn parse_numeric_str(s: &str) -> Option<u64> {
    let trimmed = s.trim();
    if let Ok(u) = trimmed.parse::<u64>() {
        return Some(u);
    }
    // tolerate float-formatted strings ("3.0")
    let f: f64 = trimmed.parse().ok()?;
    if f.is_finite() && f >= 0.0 {
        Some(f as u64)
    } else {
        None
    }
}
