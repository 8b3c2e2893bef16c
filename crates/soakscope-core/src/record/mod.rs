//! Loosely-typed telemetry records and tolerant field access.
//!
//! Soak logs are written by several concurrent writers and by more than one
//! version of the runtime, so every field is optional. The accessors here
//! never fail: a missing, `null` or wrongly-typed field degrades to the
//! caller's default.

mod loader;

use serde_json::{Map, Value};

pub use loader::{
    LoadStats, LoadedRecords, discover_rotated, load_ndjson, load_rotated, load_summary_object,
};

/// One parsed log line: a JSON object.
pub type Record = Map<String, Value>;

/// Reads a label field.
///
/// Strings are returned as-is, other non-null values as their compact JSON
/// text, and a missing or `null` field as `default`.
#[must_use]
pub fn label(record: &Record, key: &str, default: &str) -> String {
    match record.get(key) {
        None | Some(Value::Null) => default.to_string(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

/// Reads an optional label field (`None` when missing or `null`).
#[must_use]
pub fn opt_label(record: &Record, key: &str) -> Option<String> {
    match record.get(key) {
        None | Some(Value::Null) => None,
        Some(_) => Some(label(record, key, "")),
    }
}

/// Reads an integer field.
///
/// Accepts integers, floats (truncated toward zero) and numeric strings.
/// Anything else reads as `0`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn integer(record: &Record, key: &str) -> i64 {
    match record.get(key) {
        Some(Value::Number(number)) => number
            .as_i64()
            .or_else(|| number.as_u64().map(|n| i64::try_from(n).unwrap_or(i64::MAX)))
            .or_else(|| number.as_f64().map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Some(Value::String(text)) => {
            let text = text.trim();
            text.parse::<i64>()
                .ok()
                .or_else(|| text.parse::<f64>().ok().map(|f| f.trunc() as i64))
                .unwrap_or(0)
        },
        _ => 0,
    }
}

/// Reads a boolean field; only JSON booleans count.
#[must_use]
pub fn boolean(record: &Record, key: &str) -> Option<bool> {
    record.get(key).and_then(Value::as_bool)
}

/// Reads a nested object field.
#[must_use]
pub fn object<'a>(record: &'a Record, key: &str) -> Option<&'a Record> {
    record.get(key).and_then(Value::as_object)
}

/// Clamps a possibly-negative reading into a high-water mark domain.
#[must_use]
pub fn non_negative(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}
