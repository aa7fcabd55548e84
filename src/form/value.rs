use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::NaiveDate;
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// Calendar-date format used on the wire and when echoing dates back.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub type FieldMap = BTreeMap<String, FieldValue>;

/// Value held by a single form field.
///
/// `Null` means the field was asked and left empty. A field that was never
/// asked is simply absent from [`FormState`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Decimal(f64),
    Text(String),
    Date(NaiveDate),
    List(Vec<FieldValue>),
    Object(FieldMap),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    pub fn text_list<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldValue::List(values.into_iter().map(|v| FieldValue::Text(v.into())).collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// True when the value carries nothing a user typed or picked.
    /// Whitespace-only text counts as blank; `false` and `0` do not.
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Text(text) => text.trim().is_empty(),
            FieldValue::List(items) => items.is_empty(),
            FieldValue::Object(map) => map.values().all(FieldValue::is_blank),
            FieldValue::Bool(_)
            | FieldValue::Integer(_)
            | FieldValue::Decimal(_)
            | FieldValue::Date(_) => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(flag) => Some(*flag),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(n) => Some(*n as f64),
            FieldValue::Decimal(n) => Some(*n),
            _ => None,
        }
    }

    /// Text members of a list value; non-text members are skipped.
    pub fn text_items(&self) -> Vec<&str> {
        match self {
            FieldValue::List(items) => items.iter().filter_map(FieldValue::as_text).collect(),
            FieldValue::Text(text) => vec![text.as_str()],
            _ => Vec::new(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Bool(flag) => Value::Bool(*flag),
            FieldValue::Integer(n) => Value::Number((*n).into()),
            FieldValue::Decimal(n) => Number::from_f64(*n).map(Value::Number).unwrap_or(Value::Null),
            FieldValue::Text(text) => Value::String(text.clone()),
            FieldValue::Date(date) => Value::String(date.format(DATE_FORMAT).to_string()),
            FieldValue::List(items) => Value::Array(items.iter().map(FieldValue::to_json).collect()),
            FieldValue::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }

    /// Untyped conversion: strings stay text. Use
    /// [`crate::form::FormSchema::coerce_json`] when the field kind is known.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(flag) => FieldValue::Bool(flag),
            Value::Number(n) => match n.as_i64() {
                Some(int) => FieldValue::Integer(int),
                None => n.as_f64().map(FieldValue::Decimal).unwrap_or(FieldValue::Null),
            },
            Value::String(text) => FieldValue::Text(text),
            Value::Array(items) => {
                FieldValue::List(items.into_iter().map(FieldValue::from_json).collect())
            }
            Value::Object(map) => FieldValue::Object(
                map.into_iter()
                    .map(|(key, value)| (key, FieldValue::from_json(value)))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "[empty]"),
            FieldValue::Bool(flag) => write!(f, "{}", if *flag { "yes" } else { "no" }),
            FieldValue::Integer(n) => write!(f, "{}", n),
            FieldValue::Decimal(n) => write!(f, "{}", n),
            FieldValue::Text(text) => write!(f, "{}", text),
            FieldValue::Date(date) => write!(f, "{}", date.format(DATE_FORMAT)),
            FieldValue::List(items) => {
                let rendered: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
            FieldValue::Object(_) => write!(f, "{}", self.to_json()),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(FieldValue::from_json)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Decimal(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        FieldValue::Date(value)
    }
}

impl From<Option<String>> for FieldValue {
    fn from(value: Option<String>) -> Self {
        value.map(FieldValue::Text).unwrap_or(FieldValue::Null)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(values: Vec<String>) -> Self {
        FieldValue::text_list(values)
    }
}

/// Snapshot of everything the user has entered so far.
///
/// Rule predicates and conditions receive this snapshot explicitly, so
/// cross-field rules always see the whole form and never a shared global.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormState {
    values: FieldMap,
    pending_custom: BTreeSet<String>,
}

impl FormState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        self.values.insert(field.into(), value.into());
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.set(field, value);
        self
    }

    pub fn remove(&mut self, field: &str) -> Option<FieldValue> {
        self.pending_custom.remove(field);
        self.values.remove(field)
    }

    pub fn values(&self) -> &FieldMap {
        &self.values
    }

    /// True when the field holds `Bool(true)`.
    pub fn is_true(&self, field: &str) -> bool {
        matches!(self.values.get(field), Some(FieldValue::Bool(true)))
    }

    /// True when "Other" is selected for `field` but no text was entered.
    pub fn is_pending_custom(&self, field: &str) -> bool {
        self.pending_custom.contains(field)
    }

    pub fn set_pending_custom(&mut self, field: &str, pending: bool) {
        if pending {
            self.pending_custom.insert(field.to_string());
        } else {
            self.pending_custom.remove(field);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blank_detection_follows_nesting() {
        assert!(FieldValue::Null.is_blank());
        assert!(FieldValue::text("   ").is_blank());
        assert!(FieldValue::List(vec![]).is_blank());
        assert!(!FieldValue::Bool(false).is_blank());

        let mut nested = FieldMap::new();
        nested.insert("frequency".into(), FieldValue::Null);
        nested.insert("retention_days".into(), FieldValue::text(""));
        assert!(FieldValue::Object(nested.clone()).is_blank());
        nested.insert("retention_days".into(), FieldValue::Integer(30));
        assert!(!FieldValue::Object(nested).is_blank());
    }

    #[test]
    fn dates_serialize_as_calendar_dates() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).expect("valid date");
        let value = FieldValue::Date(date);
        assert_eq!(serde_json::to_value(&value).expect("serialize"), json!("2024-03-05"));
    }

    #[test]
    fn json_numbers_keep_integer_precision() {
        assert_eq!(FieldValue::from_json(json!(42)), FieldValue::Integer(42));
        assert_eq!(FieldValue::from_json(json!(1.5)), FieldValue::Decimal(1.5));
    }

    #[test]
    fn absent_and_null_are_distinct() {
        let state = FormState::new().with("name", FieldValue::Null);
        assert!(state.contains("name"));
        assert!(!state.contains("acronym"));
    }
}
