//! Row keys and their hashes for change-log entries.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ripple_core::{Row, Value};
use serde_json::{Map, Number, Value as JsonValue};
use xxhash_rust::xxh3::xxh3_128;

/// Length of every [`row_key_hash`] output.
pub const ROW_KEY_HASH_LEN: usize = 22;

/// Converts a cell value to JSON.
///
/// JSON cells are parsed back into documents; a cell that does not parse is
/// kept as a string. Non-finite floats become null.
pub fn value_to_json(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Boolean(b) => JsonValue::Bool(*b),
        Value::Int64(i) => JsonValue::Number((*i).into()),
        Value::Float64(f) => Number::from_f64(*f).map_or(JsonValue::Null, JsonValue::Number),
        Value::String(s) => JsonValue::String(s.clone()),
        Value::Json(s) => {
            serde_json::from_str(s).unwrap_or_else(|_| JsonValue::String(s.clone()))
        }
        Value::Array(items) => JsonValue::Array(items.iter().map(value_to_json).collect()),
    }
}

/// Converts a whole row to a JSON object.
pub fn row_to_json(row: &Row) -> JsonValue {
    JsonValue::Object(
        row.iter()
            .map(|(c, v)| (c.clone(), value_to_json(v)))
            .collect::<Map<String, JsonValue>>(),
    )
}

/// The key columns of `row` as a JSON object with sorted keys.
pub fn row_key(row: &Row, key_columns: &[String]) -> JsonValue {
    JsonValue::Object(
        key_columns
            .iter()
            .map(|c| (c.clone(), value_to_json(row.get(c))))
            .collect::<Map<String, JsonValue>>(),
    )
}

/// Hashes a row key: xxh3-128 over its canonical JSON, base64 URL-safe
/// without padding.
pub fn row_key_hash(key: &JsonValue) -> String {
    // serde_json's Map sorts keys, so equal keys serialize identically.
    let canonical = key.to_string();
    URL_SAFE_NO_PAD.encode(xxh3_128(canonical.as_bytes()).to_be_bytes())
}
