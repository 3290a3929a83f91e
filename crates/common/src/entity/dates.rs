//! Wire-date normalization.
//!
//! The ledger and the state blobs carry timestamps as epoch
//! milliseconds, sometimes as a number and sometimes as a string. The
//! merge step rewrites every field literally named `createdAt` or
//! `updatedAt` — including the ones nested in version and reaction
//! entries — into RFC 3339 so the typed prototypes deserialize straight
//! into [`chrono::DateTime`].

use chrono::{DateTime, Utc};
use serde_json::Value;

const DATE_FIELDS: &[&str] = &["createdAt", "updatedAt"];

/// Parse a wire timestamp (epoch milliseconds, string or number).
pub fn parse_wire_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let millis = match value {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    DateTime::<Utc>::from_timestamp_millis(millis)
}

/// Convert epoch seconds (block timestamps) to a structured date.
pub fn from_epoch_seconds(seconds: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(seconds, 0)
}

/// Rewrite wire timestamps into RFC 3339 strings, in place.
///
/// Walks the whole document so per-version and per-reaction timestamps
/// are covered by the same rule as the top-level lineage fields. Fields
/// that already hold a non-numeric string (e.g. an earlier
/// normalization pass) are left untouched.
pub fn normalize_wire_dates(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, field) in map.iter_mut() {
                if DATE_FIELDS.contains(&key.as_str()) {
                    if let Some(parsed) = parse_wire_timestamp(field) {
                        *field = Value::String(parsed.to_rfc3339());
                    }
                } else {
                    normalize_wire_dates(field);
                }
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                normalize_wire_dates(item);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalizes_top_level_and_nested_dates() {
        let mut state = json!({
            "name": "morning notes",
            "createdAt": "1672531200000",
            "updatedAt": 1672617600000i64,
            "versions": [{
                "message": "hello",
                "createdAt": "1672531200000",
                "reactions": [{ "reaction": ":up:", "createdAt": 1672531260000i64 }]
            }]
        });
        normalize_wire_dates(&mut state);

        assert_eq!(
            state["createdAt"].as_str().unwrap(),
            "2023-01-01T00:00:00+00:00"
        );
        assert_eq!(
            state["updatedAt"].as_str().unwrap(),
            "2023-01-02T00:00:00+00:00"
        );
        assert_eq!(
            state["versions"][0]["createdAt"].as_str().unwrap(),
            "2023-01-01T00:00:00+00:00"
        );
        assert_eq!(
            state["versions"][0]["reactions"][0]["createdAt"]
                .as_str()
                .unwrap(),
            "2023-01-01T00:01:00+00:00"
        );
        // non-date fields untouched
        assert_eq!(state["name"].as_str().unwrap(), "morning notes");
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let mut state = json!({ "createdAt": "1672531200000" });
        normalize_wire_dates(&mut state);
        let once = state.clone();
        normalize_wire_dates(&mut state);
        assert_eq!(state, once);
    }

    #[test]
    fn test_non_numeric_strings_left_alone() {
        let mut state = json!({ "createdAt": "not a timestamp" });
        normalize_wire_dates(&mut state);
        assert_eq!(state["createdAt"].as_str().unwrap(), "not a timestamp");
    }
}
