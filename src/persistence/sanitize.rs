//! Turns form state into the payload the backend accepts.
//!
//! Empty values are omitted rather than sent, because the backend applies
//! partial-update semantics and would otherwise read an empty value as an
//! instruction to reset the stored one.

use serde_json::Value;

use super::Payload;
use crate::fields::OTHER_SENTINEL;
use crate::form::FormState;

/// Wire payload for the current state: values converted to JSON (dates as
/// `YYYY-MM-DD`) and then sanitized.
///
/// A field whose "Other" box is still waiting for text never sends the
/// marker; only its predefined members go out.
pub fn build_payload(state: &FormState) -> Payload {
    let wire: Payload = state
        .values()
        .iter()
        .map(|(key, value)| {
            let json = value.to_json();
            if state.is_pending_custom(key) {
                tracing::debug!(field = %key, "omitting pending Other marker from payload");
                (key.clone(), strip_marker(json))
            } else {
                (key.clone(), json)
            }
        })
        .collect();
    sanitize_payload(wire)
}

fn strip_marker(value: Value) -> Value {
    match value {
        Value::String(text) if text == OTHER_SENTINEL => Value::Null,
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .filter(|item| item.as_str() != Some(OTHER_SENTINEL))
                .collect(),
        ),
        other => other,
    }
}

/// Drops top-level nulls and empty strings, empty arrays, and nested objects
/// in which no key carries a value. Everything else passes through as-is, so
/// sanitizing twice gives the same payload.
pub fn sanitize_payload(payload: Payload) -> Payload {
    payload
        .into_iter()
        .filter(|(_, value)| keep_top_level(value))
        .collect()
}

fn keep_top_level(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => map.values().any(carries_value),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

fn carries_value(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(text) => !text.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => map.values().any(carries_value),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{FieldMap, FieldValue};
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn drops_empty_top_level_values() {
        let state = FormState::new()
            .with("name", "Payroll")
            .with("acronym", "")
            .with("website", FieldValue::Null)
            .with("business_domains", FieldValue::List(vec![]))
            .with("is_critical", false)
            .with("user_count", 0i64);
        let payload = build_payload(&state);
        assert_eq!(
            Value::Object(payload),
            json!({"name": "Payroll", "is_critical": false, "user_count": 0})
        );
    }

    #[test]
    fn all_empty_nested_objects_are_not_sent() {
        let mut policy = FieldMap::new();
        policy.insert("frequency".into(), FieldValue::Null);
        policy.insert("retention_days".into(), FieldValue::text(""));
        let state = FormState::new().with("backup_policy", FieldValue::Object(policy.clone()));
        assert!(build_payload(&state).is_empty());

        policy.insert("frequency".into(), FieldValue::text("daily"));
        let state = FormState::new().with("backup_policy", FieldValue::Object(policy));
        let payload = build_payload(&state);
        assert_eq!(
            payload.get("backup_policy"),
            Some(&json!({"frequency": "daily", "retention_days": ""}))
        );
    }

    #[test]
    fn pending_marker_is_never_sent() {
        let mut state = FormState::new()
            .with("business_domains", FieldValue::text_list(["finance", OTHER_SENTINEL]))
            .with("target_users", FieldValue::text_list([OTHER_SENTINEL]))
            .with("owner_organization", FieldValue::text(OTHER_SENTINEL));
        state.set_pending_custom("business_domains", true);
        state.set_pending_custom("target_users", true);

        let payload = build_payload(&state);
        assert_eq!(payload.get("business_domains"), Some(&json!(["finance"])));
        assert!(!payload.contains_key("target_users"));
        // Not pending: a stored value that happens to equal the marker text.
        assert_eq!(payload.get("owner_organization"), Some(&json!(OTHER_SENTINEL)));
    }

    #[test]
    fn dates_use_calendar_format() {
        let date = NaiveDate::from_ymd_opt(2023, 11, 2).expect("valid date");
        let payload = build_payload(&FormState::new().with("go_live_date", date));
        assert_eq!(payload.get("go_live_date"), Some(&json!("2023-11-02")));
    }

    #[test]
    fn sanitizing_twice_is_stable() {
        let raw = json!({
            "name": "CRM",
            "notes": "",
            "tags": [],
            "owner": null,
            "backup_policy": {"frequency": null},
            "contact": {"email": "a@b.c", "phone": ""},
            "integrations": [{"source_system": "", "target_system": "X"}]
        });
        let Value::Object(map) = raw else {
            panic!("object literal");
        };
        let once = sanitize_payload(map);
        let twice = sanitize_payload(once.clone());
        assert_eq!(once, twice);
        assert_eq!(
            Value::Object(once),
            json!({
                "name": "CRM",
                "contact": {"email": "a@b.c", "phone": ""},
                "integrations": [{"source_system": "", "target_system": "X"}]
            })
        );
    }
}
