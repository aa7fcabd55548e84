use std::collections::BTreeMap;
use std::sync::Arc;

use super::rules::{RuleRegistry, ValidationOutcome};
use crate::errors::WizardError;
use crate::form::{FormSchema, FormState, TabSpec};

pub const PENDING_CUSTOM_MESSAGE: &str = "Specify a value for \"Other\"";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Outcome of validating a single tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabValidationResult {
    pub tab_key: String,
    pub is_valid: bool,
    /// Failing fields in the tab's declared order; the first one receives focus.
    pub error_fields: Vec<String>,
    pub error_count: usize,
    pub errors: Vec<FieldError>,
}

impl TabValidationResult {
    pub fn first_error_field(&self) -> Option<&str> {
        self.error_fields.first().map(String::as_str)
    }
}

/// Outcome of validating every tab, used before the final submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllTabsValidation {
    pub is_valid: bool,
    /// Invalid tab keys in ascending ordinal order.
    pub invalid_tabs: Vec<String>,
    pub error_count: usize,
    pub tab_errors: BTreeMap<String, Vec<String>>,
    pub results: Vec<TabValidationResult>,
}

impl AllTabsValidation {
    pub fn first_invalid(&self) -> Option<&TabValidationResult> {
        self.results.iter().find(|result| !result.is_valid)
    }
}

/// Evaluates the rule registry against form state, one tab or all tabs at a time.
#[derive(Debug, Clone)]
pub struct TabValidator {
    schema: Arc<FormSchema>,
    rules: Arc<RuleRegistry>,
}

impl TabValidator {
    pub fn new(schema: Arc<FormSchema>, rules: Arc<RuleRegistry>) -> Self {
        Self { schema, rules }
    }

    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    pub fn rules(&self) -> &RuleRegistry {
        &self.rules
    }

    /// Fields that were never asked (absent from the state) or are hidden by
    /// their visibility condition are not applicable and always pass.
    pub fn validate_field(&self, field: &str, state: &FormState) -> ValidationOutcome {
        if !state.contains(field) || !self.schema.is_visible(field, state) {
            return ValidationOutcome::Valid;
        }
        if state.is_pending_custom(field) {
            return ValidationOutcome::invalid(PENDING_CUSTOM_MESSAGE);
        }
        self.rules.evaluate(field, state)
    }

    pub fn validate_tab(
        &self,
        state: &FormState,
        tab_key: &str,
    ) -> Result<TabValidationResult, WizardError> {
        let tab = self
            .schema
            .tab(tab_key)
            .ok_or_else(|| WizardError::UnknownTab(tab_key.to_string()))?;
        Ok(self.validate_tab_spec(state, tab))
    }

    pub fn validate_all_tabs(&self, state: &FormState) -> AllTabsValidation {
        let results: Vec<TabValidationResult> = self
            .schema
            .tabs()
            .iter()
            .map(|tab| self.validate_tab_spec(state, tab))
            .collect();

        let invalid_tabs = results
            .iter()
            .filter(|result| !result.is_valid)
            .map(|result| result.tab_key.clone())
            .collect::<Vec<_>>();
        let tab_errors = results
            .iter()
            .filter(|result| !result.is_valid)
            .map(|result| (result.tab_key.clone(), result.error_fields.clone()))
            .collect();
        let error_count = results.iter().map(|result| result.error_count).sum();

        tracing::debug!(
            invalid_tabs = ?invalid_tabs,
            error_count,
            "validated all tabs"
        );

        AllTabsValidation {
            is_valid: invalid_tabs.is_empty(),
            invalid_tabs,
            error_count,
            tab_errors,
            results,
        }
    }

    pub fn validate_tab_spec(&self, state: &FormState, tab: &TabSpec) -> TabValidationResult {
        let errors: Vec<FieldError> = tab
            .fields
            .iter()
            .filter_map(|field| match self.validate_field(field, state) {
                ValidationOutcome::Valid => None,
                ValidationOutcome::Invalid(message) => Some(FieldError {
                    field: field.to_string(),
                    message,
                }),
            })
            .collect();

        TabValidationResult {
            tab_key: tab.key.to_string(),
            is_valid: errors.is_empty(),
            error_fields: errors.iter().map(|error| error.field.clone()).collect(),
            error_count: errors.len(),
            errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{Condition, FieldKind, FieldSpec, FieldValue, TabSpec};

    fn validator() -> TabValidator {
        let schema = FormSchema::new(
            "test",
            vec![
                TabSpec::new("1", "General", 1, &["name", "description"]),
                TabSpec::new("2", "Data", 2, &["has_personal_data", "personal_data_categories"]),
            ],
            vec![
                FieldSpec::new("name", "Name", FieldKind::Text),
                FieldSpec::new("description", "Description", FieldKind::LongText),
                FieldSpec::new("has_personal_data", "Personal data", FieldKind::Boolean),
                FieldSpec::new(
                    "personal_data_categories",
                    "Categories",
                    FieldKind::MultiChoice {
                        options: &["contact", "health"],
                        allow_other: true,
                    },
                )
                .visible_when(Condition::IsTrue("has_personal_data")),
            ],
        )
        .expect("valid schema");
        let rules = RuleRegistry::new()
            .required("name")
            .required("description")
            .required_when("personal_data_categories", Condition::IsTrue("has_personal_data"));
        TabValidator::new(Arc::new(schema), Arc::new(rules))
    }

    #[test]
    fn errors_follow_declared_field_order() {
        let validator = validator();
        let state = FormState::new()
            .with("description", FieldValue::Null)
            .with("name", FieldValue::Null);
        let result = validator.validate_tab(&state, "1").expect("tab exists");
        assert!(!result.is_valid);
        assert_eq!(result.error_fields, vec!["name", "description"]);
        assert_eq!(result.error_count, 2);
    }

    #[test]
    fn absent_fields_never_fail() {
        let validator = validator();
        let result = validator
            .validate_tab(&FormState::new(), "1")
            .expect("tab exists");
        assert!(result.is_valid);
    }

    #[test]
    fn hidden_fields_never_fail() {
        let validator = validator();
        let mut state = FormState::new()
            .with("has_personal_data", false)
            .with("personal_data_categories", FieldValue::Null);
        assert!(validator.validate_tab(&state, "2").expect("tab").is_valid);

        state.set("has_personal_data", true);
        let result = validator.validate_tab(&state, "2").expect("tab");
        assert_eq!(result.error_fields, vec!["personal_data_categories"]);
    }

    #[test]
    fn pending_other_text_is_a_structural_error() {
        let validator = validator();
        let mut state = FormState::new()
            .with("has_personal_data", true)
            .with("personal_data_categories", FieldValue::text_list(["other"]));
        state.set_pending_custom("personal_data_categories", true);
        assert_eq!(
            validator.validate_field("personal_data_categories", &state),
            ValidationOutcome::invalid(PENDING_CUSTOM_MESSAGE)
        );
    }

    #[test]
    fn unknown_tab_is_an_error() {
        let validator = validator();
        assert!(matches!(
            validator.validate_tab(&FormState::new(), "99"),
            Err(WizardError::UnknownTab(_))
        ));
    }

    #[test]
    fn all_tabs_lists_invalid_tabs_in_ordinal_order() {
        let validator = validator();
        let state = FormState::new()
            .with("name", FieldValue::Null)
            .with("description", "text")
            .with("has_personal_data", true)
            .with("personal_data_categories", FieldValue::List(vec![]));
        let all = validator.validate_all_tabs(&state);
        assert!(!all.is_valid);
        assert_eq!(all.invalid_tabs, vec!["1", "2"]);
        assert_eq!(all.error_count, 2);
        assert_eq!(all.tab_errors.get("2"), Some(&vec!["personal_data_categories".to_string()]));
    }
}
