//! Declarative description of the survey: fields, their kinds, and the tabs
//! that partition them.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

use super::condition::Condition;
use super::value::{FieldMap, FieldValue, FormState, DATE_FORMAT};
use crate::errors::WizardError;

const ACCEPTED_DATE_FORMATS: &[&str] = &[DATE_FORMAT, "%d/%m/%Y", "%d.%m.%Y", "%Y/%m/%d"];

/// Supported data kinds for form fields.
#[derive(Debug, Clone)]
pub enum FieldKind {
    Text,
    LongText,
    Email,
    Url,
    Integer,
    Decimal,
    Date,
    Boolean,
    /// One value from `options`, or free text when `allow_other` is set.
    Choice {
        options: &'static [&'static str],
        allow_other: bool,
    },
    /// Any subset of `options`, plus one free-text entry when `allow_other` is set.
    MultiChoice {
        options: &'static [&'static str],
        allow_other: bool,
    },
    /// Nested object made of its own sub-fields.
    Group(Vec<FieldSpec>),
    /// List of structured sub-records edited with a record editor.
    Records,
}

impl FieldKind {
    pub fn is_option_with_other(&self) -> bool {
        matches!(
            self,
            FieldKind::Choice {
                allow_other: true,
                ..
            } | FieldKind::MultiChoice {
                allow_other: true,
                ..
            }
        )
    }
}

/// Declarative description of a single form field.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub help: Option<&'static str>,
    pub visible_when: Option<Condition>,
}

impl FieldSpec {
    pub fn new(key: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self {
            key,
            label,
            kind,
            help: None,
            visible_when: None,
        }
    }

    pub fn with_help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }

    /// Only show (and validate) the field while `condition` holds.
    pub fn visible_when(mut self, condition: Condition) -> Self {
        self.visible_when = Some(condition);
        self
    }

    pub fn is_visible(&self, state: &FormState) -> bool {
        self.visible_when
            .as_ref()
            .map(|condition| condition.evaluate(state))
            .unwrap_or(true)
    }
}

/// One navigable section of the wizard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabSpec {
    pub key: &'static str,
    pub label: &'static str,
    pub ordinal: u32,
    /// Member fields in declared order; validation walks them in this order.
    pub fields: Vec<&'static str>,
}

impl TabSpec {
    pub fn new(key: &'static str, label: &'static str, ordinal: u32, fields: &[&'static str]) -> Self {
        Self {
            key,
            label,
            ordinal,
            fields: fields.to_vec(),
        }
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.iter().any(|f| *f == field)
    }
}

/// Full survey layout. Construction enforces that every field belongs to
/// exactly one tab and that tab keys and ordinals are unique.
#[derive(Debug, Clone)]
pub struct FormSchema {
    name: &'static str,
    tabs: Vec<TabSpec>,
    fields: Vec<FieldSpec>,
    field_index: HashMap<&'static str, usize>,
    field_tab: HashMap<&'static str, usize>,
}

impl FormSchema {
    pub fn new(
        name: &'static str,
        mut tabs: Vec<TabSpec>,
        fields: Vec<FieldSpec>,
    ) -> Result<Self, WizardError> {
        if tabs.is_empty() {
            return Err(WizardError::InvalidSchema("a form needs at least one tab".into()));
        }
        tabs.sort_by_key(|tab| tab.ordinal);

        let mut field_index = HashMap::new();
        for (idx, field) in fields.iter().enumerate() {
            if field_index.insert(field.key, idx).is_some() {
                return Err(WizardError::InvalidSchema(format!(
                    "field `{}` is declared twice",
                    field.key
                )));
            }
        }

        let mut tab_keys = HashSet::new();
        let mut ordinals = HashSet::new();
        let mut field_tab = HashMap::new();
        for (tab_idx, tab) in tabs.iter().enumerate() {
            if !tab_keys.insert(tab.key) {
                return Err(WizardError::InvalidSchema(format!(
                    "tab `{}` is declared twice",
                    tab.key
                )));
            }
            if !ordinals.insert(tab.ordinal) {
                return Err(WizardError::InvalidSchema(format!(
                    "tabs share ordinal {}",
                    tab.ordinal
                )));
            }
            for field in &tab.fields {
                if !field_index.contains_key(field) {
                    return Err(WizardError::InvalidSchema(format!(
                        "tab `{}` lists unknown field `{}`",
                        tab.key, field
                    )));
                }
                if let Some(previous) = field_tab.insert(*field, tab_idx) {
                    return Err(WizardError::InvalidSchema(format!(
                        "field `{}` belongs to tabs `{}` and `{}`",
                        field, tabs[previous].key, tab.key
                    )));
                }
            }
        }

        if let Some(orphan) = fields.iter().find(|f| !field_tab.contains_key(f.key)) {
            return Err(WizardError::InvalidSchema(format!(
                "field `{}` is not part of any tab",
                orphan.key
            )));
        }

        Ok(Self {
            name,
            tabs,
            fields,
            field_index,
            field_tab,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Tabs in ascending ordinal order.
    pub fn tabs(&self) -> &[TabSpec] {
        &self.tabs
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn tab(&self, key: &str) -> Option<&TabSpec> {
        self.tabs.iter().find(|tab| tab.key == key)
    }

    /// Position of the tab in ordinal order.
    pub fn tab_position(&self, key: &str) -> Option<usize> {
        self.tabs.iter().position(|tab| tab.key == key)
    }

    pub fn field(&self, key: &str) -> Option<&FieldSpec> {
        self.field_index.get(key).map(|idx| &self.fields[*idx])
    }

    pub fn tab_of(&self, field: &str) -> Option<&TabSpec> {
        self.field_tab.get(field).map(|idx| &self.tabs[*idx])
    }

    /// A field is visible when it exists and its `visible_when` holds.
    pub fn is_visible(&self, field: &str, state: &FormState) -> bool {
        self.field(field)
            .map(|spec| spec.is_visible(state))
            .unwrap_or(false)
    }

    /// State for a freshly opened create-mode wizard: every field asked, none answered.
    pub fn blank_state(&self) -> FormState {
        let mut state = FormState::new();
        for field in &self.fields {
            state.set(field.key, FieldValue::Null);
        }
        state
    }

    /// Converts a stored JSON value into the typed value for `field`.
    /// Values that do not fit the kind are kept untyped rather than dropped.
    pub fn coerce_json(&self, field: &str, value: Value) -> FieldValue {
        match self.field(field) {
            Some(spec) => coerce_for_kind(&spec.kind, value),
            None => FieldValue::from_json(value),
        }
    }

    /// Parses raw text typed by the user for `field`. Empty input clears the field.
    pub fn parse_input(&self, field: &str, raw: &str) -> Result<FieldValue, WizardError> {
        let spec = self
            .field(field)
            .ok_or_else(|| WizardError::UnknownField(field.to_string()))?;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(FieldValue::Null);
        }
        let invalid = |message: &str| WizardError::InvalidValue {
            field: field.to_string(),
            message: message.to_string(),
        };
        match &spec.kind {
            FieldKind::Integer => trimmed
                .parse::<i64>()
                .map(FieldValue::Integer)
                .map_err(|_| invalid("Enter a whole number (e.g., 42)")),
            FieldKind::Decimal => trimmed
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .map(FieldValue::Decimal)
                .ok_or_else(|| invalid("Enter a numeric value")),
            FieldKind::Date => parse_date(trimmed)
                .map(FieldValue::Date)
                .ok_or_else(|| invalid("Use YYYY-MM-DD format")),
            FieldKind::Boolean => parse_bool(trimmed)
                .map(FieldValue::Bool)
                .ok_or_else(|| invalid("Enter yes/no, true/false, or 1/0")),
            FieldKind::MultiChoice { .. } => Ok(FieldValue::text_list(
                trimmed
                    .split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty()),
            )),
            FieldKind::Group(_) | FieldKind::Records => {
                let value: Value = serde_json::from_str(trimmed)
                    .map_err(|err| invalid(&format!("Enter JSON ({})", err)))?;
                Ok(coerce_for_kind(&spec.kind, value))
            }
            FieldKind::Text
            | FieldKind::LongText
            | FieldKind::Email
            | FieldKind::Url
            | FieldKind::Choice { .. } => Ok(FieldValue::text(trimmed)),
        }
    }
}

fn coerce_for_kind(kind: &FieldKind, value: Value) -> FieldValue {
    match (kind, value) {
        (_, Value::Null) => FieldValue::Null,
        (FieldKind::Date, Value::String(raw)) => parse_date(&raw)
            .map(FieldValue::Date)
            .unwrap_or(FieldValue::Text(raw)),
        (FieldKind::Boolean, Value::String(raw)) => parse_bool(&raw)
            .map(FieldValue::Bool)
            .unwrap_or(FieldValue::Text(raw)),
        (FieldKind::Decimal, Value::Number(n)) => n
            .as_f64()
            .map(FieldValue::Decimal)
            .unwrap_or(FieldValue::Null),
        (FieldKind::Integer, Value::String(raw)) => raw
            .trim()
            .parse::<i64>()
            .map(FieldValue::Integer)
            .unwrap_or(FieldValue::Text(raw)),
        (FieldKind::Group(sub_fields), Value::Object(map)) => {
            let mut nested = FieldMap::new();
            for (key, value) in map {
                let coerced = match sub_fields.iter().find(|spec| spec.key == key) {
                    Some(spec) => coerce_for_kind(&spec.kind, value),
                    None => FieldValue::from_json(value),
                };
                nested.insert(key, coerced);
            }
            FieldValue::Object(nested)
        }
        (_, other) => FieldValue::from_json(other),
    }
}

/// Accepts calendar dates in a few common layouts and full timestamps.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    for format in ACCEPTED_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date);
        }
    }
    if let Ok(stamp) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(stamp.date_naive());
    }
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|stamp| stamp.date())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "y" | "yes" | "true" | "1" => Some(true),
        "n" | "no" | "false" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_tab_schema() -> Result<FormSchema, WizardError> {
        FormSchema::new(
            "test",
            vec![
                TabSpec::new("2", "Second", 2, &["launched"]),
                TabSpec::new("1", "First", 1, &["name"]),
            ],
            vec![
                FieldSpec::new("name", "Name", FieldKind::Text),
                FieldSpec::new("launched", "Launched", FieldKind::Date),
            ],
        )
    }

    #[test]
    fn tabs_are_ordered_by_ordinal() {
        let schema = two_tab_schema().expect("valid schema");
        let keys: Vec<_> = schema.tabs().iter().map(|t| t.key).collect();
        assert_eq!(keys, vec!["1", "2"]);
        assert_eq!(schema.tab_of("launched").map(|t| t.key), Some("2"));
    }

    #[test]
    fn field_in_two_tabs_is_rejected() {
        let result = FormSchema::new(
            "bad",
            vec![
                TabSpec::new("1", "First", 1, &["name"]),
                TabSpec::new("2", "Second", 2, &["name"]),
            ],
            vec![FieldSpec::new("name", "Name", FieldKind::Text)],
        );
        assert!(matches!(result, Err(WizardError::InvalidSchema(_))));
    }

    #[test]
    fn orphan_field_is_rejected() {
        let result = FormSchema::new(
            "bad",
            vec![TabSpec::new("1", "First", 1, &["name"])],
            vec![
                FieldSpec::new("name", "Name", FieldKind::Text),
                FieldSpec::new("extra", "Extra", FieldKind::Text),
            ],
        );
        assert!(matches!(result, Err(WizardError::InvalidSchema(_))));
    }

    #[test]
    fn date_input_accepts_several_layouts() {
        let schema = two_tab_schema().expect("valid schema");
        let expected = FieldValue::Date(NaiveDate::from_ymd_opt(2024, 3, 5).expect("date"));
        for raw in ["2024-03-05", "05/03/2024", "2024-03-05T10:15:00Z"] {
            assert_eq!(schema.parse_input("launched", raw).expect("parse"), expected);
        }
        assert!(schema.parse_input("launched", "March").is_err());
        assert_eq!(
            schema.parse_input("launched", "  ").expect("parse"),
            FieldValue::Null
        );
    }
}
