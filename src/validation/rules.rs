//! Declarative rule registry: field name → rules → predicates.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::form::{Condition, FieldValue, FormState};

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern compiles"));
static URL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://[^\s/$.?#][^\s]*$").expect("url pattern compiles"));

/// Result of evaluating one predicate, one rule, or one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid,
    Invalid(String),
}

impl ValidationOutcome {
    pub fn invalid(message: impl Into<String>) -> Self {
        ValidationOutcome::Invalid(message.into())
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid)
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            ValidationOutcome::Valid => None,
            ValidationOutcome::Invalid(message) => Some(message.as_str()),
        }
    }
}

type PredicateCallback = dyn Fn(Option<&FieldValue>, &FormState) -> ValidationOutcome + Send + Sync;
type SharedPredicateCallback = Arc<PredicateCallback>;

/// Built-in validation predicates.
///
/// Everything except `Required` passes on blank values, so optional fields
/// are only checked once the user fills them in.
#[derive(Clone)]
pub enum Predicate {
    Required,
    Email,
    Url,
    MaxLength(usize),
    MinItems(usize),
    IntegerRange { min: i64, max: i64 },
    NonNegative,
    Pattern { regex: Regex, message: &'static str },
    OneOf(&'static [&'static str]),
    /// Receives the field value and the full form state.
    Custom(SharedPredicateCallback),
}

impl Predicate {
    pub fn custom(
        callback: impl Fn(Option<&FieldValue>, &FormState) -> ValidationOutcome + Send + Sync + 'static,
    ) -> Self {
        Predicate::Custom(Arc::new(callback))
    }

    pub fn evaluate(&self, value: Option<&FieldValue>, state: &FormState) -> ValidationOutcome {
        let blank = value.map(FieldValue::is_blank).unwrap_or(true);
        if let Predicate::Required = self {
            return if blank {
                ValidationOutcome::invalid("This field is required")
            } else {
                ValidationOutcome::Valid
            };
        }
        if let Predicate::Custom(callback) = self {
            return callback(value, state);
        }
        let Some(value) = value.filter(|_| !blank) else {
            return ValidationOutcome::Valid;
        };

        match self {
            Predicate::Email => check_text(value, |text| EMAIL_PATTERN.is_match(text.trim()), || {
                "Enter a valid email address".to_string()
            }),
            Predicate::Url => check_text(value, |text| URL_PATTERN.is_match(text.trim()), || {
                "Enter a valid URL starting with http:// or https://".to_string()
            }),
            Predicate::MaxLength(max) => check_text(
                value,
                |text| text.chars().count() <= *max,
                || format!("Use at most {} characters", max),
            ),
            Predicate::MinItems(min) => match value {
                FieldValue::List(items) if items.len() < *min => {
                    ValidationOutcome::invalid(format!("Select at least {} option(s)", min))
                }
                _ => ValidationOutcome::Valid,
            },
            Predicate::IntegerRange { min, max } => match value {
                FieldValue::Integer(n) if n < min || n > max => ValidationOutcome::invalid(format!(
                    "Enter a value between {} and {}",
                    min, max
                )),
                FieldValue::Integer(_) => ValidationOutcome::Valid,
                _ => ValidationOutcome::invalid("Enter a whole number (e.g., 42)"),
            },
            Predicate::NonNegative => match value.as_f64() {
                Some(n) if n < 0.0 => ValidationOutcome::invalid("Value must be zero or positive"),
                Some(_) => ValidationOutcome::Valid,
                None => ValidationOutcome::invalid("Enter a numeric value"),
            },
            Predicate::Pattern { regex, message } => {
                check_text(value, |text| regex.is_match(text), || message.to_string())
            }
            Predicate::OneOf(options) => {
                let items = value.text_items();
                if !items.is_empty() && items.iter().all(|item| options.contains(item)) {
                    ValidationOutcome::Valid
                } else {
                    ValidationOutcome::invalid(format!(
                        "Value must be one of: {}",
                        options.join(", ")
                    ))
                }
            }
            Predicate::Required | Predicate::Custom(_) => ValidationOutcome::Valid,
        }
    }
}

fn check_text(
    value: &FieldValue,
    accept: impl Fn(&str) -> bool,
    message: impl Fn() -> String,
) -> ValidationOutcome {
    match value.as_text() {
        Some(text) if accept(text) => ValidationOutcome::Valid,
        _ => ValidationOutcome::Invalid(message()),
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Required => write!(f, "Required"),
            Predicate::Email => write!(f, "Email"),
            Predicate::Url => write!(f, "Url"),
            Predicate::MaxLength(max) => write!(f, "MaxLength({})", max),
            Predicate::MinItems(min) => write!(f, "MinItems({})", min),
            Predicate::IntegerRange { min, max } => write!(f, "IntegerRange({}..={})", min, max),
            Predicate::NonNegative => write!(f, "NonNegative"),
            Predicate::Pattern { regex, .. } => write!(f, "Pattern({})", regex.as_str()),
            Predicate::OneOf(options) => write!(f, "OneOf({:?})", options),
            Predicate::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// One or more predicates attached to a field, optionally gated by a
/// condition over the whole form.
#[derive(Debug, Clone)]
pub struct FieldRule {
    pub field_name: &'static str,
    pub predicates: Vec<Predicate>,
    pub applies_when: Option<Condition>,
}

impl FieldRule {
    pub fn new(field_name: &'static str) -> Self {
        Self {
            field_name,
            predicates: Vec::new(),
            applies_when: None,
        }
    }

    pub fn with(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.applies_when = Some(condition);
        self
    }

    pub fn applies(&self, state: &FormState) -> bool {
        self.applies_when
            .as_ref()
            .map(|condition| condition.evaluate(state))
            .unwrap_or(true)
    }

    /// First failing predicate wins.
    pub fn evaluate(&self, value: Option<&FieldValue>, state: &FormState) -> ValidationOutcome {
        self.predicates
            .iter()
            .map(|predicate| predicate.evaluate(value, state))
            .find(|outcome| !outcome.is_valid())
            .unwrap_or(ValidationOutcome::Valid)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    rules: HashMap<&'static str, Vec<FieldRule>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, rule: FieldRule) -> &mut Self {
        self.rules.entry(rule.field_name).or_default().push(rule);
        self
    }

    pub fn with_rule(mut self, rule: FieldRule) -> Self {
        self.add(rule);
        self
    }

    pub fn required(self, field: &'static str) -> Self {
        self.with_rule(FieldRule::new(field).with(Predicate::Required))
    }

    pub fn required_when(self, field: &'static str, condition: Condition) -> Self {
        self.with_rule(FieldRule::new(field).with(Predicate::Required).when(condition))
    }

    pub fn rules_for(&self, field: &str) -> &[FieldRule] {
        self.rules.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_rules(&self, field: &str) -> bool {
        self.rules.contains_key(field)
    }

    /// Evaluates every applicable rule for `field`. Fields without rules, or
    /// whose rules are all gated off, are valid.
    pub fn evaluate(&self, field: &str, state: &FormState) -> ValidationOutcome {
        let value = state.get(field);
        self.rules_for(field)
            .iter()
            .filter(|rule| rule.applies(state))
            .map(|rule| rule.evaluate(value, state))
            .find(|outcome| !outcome.is_valid())
            .unwrap_or(ValidationOutcome::Valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_distinguishes_blank_from_false() {
        let state = FormState::new();
        assert!(!Predicate::Required.evaluate(Some(&FieldValue::Null), &state).is_valid());
        assert!(!Predicate::Required.evaluate(None, &state).is_valid());
        assert!(Predicate::Required
            .evaluate(Some(&FieldValue::Bool(false)), &state)
            .is_valid());
    }

    #[test]
    fn format_predicates_skip_blank_values() {
        let state = FormState::new();
        assert!(Predicate::Email.evaluate(Some(&FieldValue::Null), &state).is_valid());
        assert!(!Predicate::Email
            .evaluate(Some(&FieldValue::text("not-an-email")), &state)
            .is_valid());
        assert!(Predicate::Email
            .evaluate(Some(&FieldValue::text("ops@example.org")), &state)
            .is_valid());
    }

    #[test]
    fn conditional_rule_only_applies_when_flag_is_set() {
        let registry = RuleRegistry::new()
            .required_when("criticality_notes", Condition::IsTrue("is_critical"));
        let mut state = FormState::new()
            .with("is_critical", false)
            .with("criticality_notes", FieldValue::Null);
        assert!(registry.evaluate("criticality_notes", &state).is_valid());

        state.set("is_critical", true);
        assert_eq!(
            registry.evaluate("criticality_notes", &state),
            ValidationOutcome::invalid("This field is required")
        );
    }

    #[test]
    fn custom_predicate_sees_other_fields() {
        let registry = RuleRegistry::new().with_rule(FieldRule::new("end").with(
            Predicate::custom(|value, state| match (value, state.get("start")) {
                (Some(FieldValue::Integer(end)), Some(FieldValue::Integer(start))) if end < start => {
                    ValidationOutcome::invalid("End must not precede start")
                }
                _ => ValidationOutcome::Valid,
            }),
        ));
        let state = FormState::new().with("start", 10i64).with("end", 5i64);
        assert!(!registry.evaluate("end", &state).is_valid());
    }

    #[test]
    fn integer_range_reports_bounds() {
        let state = FormState::new();
        let predicate = Predicate::IntegerRange { min: 1, max: 5 };
        assert_eq!(
            predicate.evaluate(Some(&FieldValue::Integer(9)), &state),
            ValidationOutcome::invalid("Enter a value between 1 and 5")
        );
    }
}
