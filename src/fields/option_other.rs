//! "Pick from the list, or type your own" fields.
//!
//! The UI shows the predefined options plus an `Other` marker. Picking the
//! marker reveals a free-text box whose content takes the marker's place in
//! the externally visible value. The marker itself is never a business value.

use serde::{Deserialize, Serialize};

use crate::errors::WizardError;
use crate::form::FieldValue;

pub const OTHER_SENTINEL: &str = "other";

/// Logical value of a single-select field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionChoice {
    Predefined(String),
    Custom(String),
}

impl OptionChoice {
    pub fn as_str(&self) -> &str {
        match self {
            OptionChoice::Predefined(value) | OptionChoice::Custom(value) => value,
        }
    }
}

/// Logical value of a multi-select field: predefined picks plus at most one
/// custom entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiChoice {
    pub selected: Vec<String>,
    pub custom: Option<String>,
}

/// Local state of a single-select "option with Other" field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleSelectWithOther {
    field: String,
    options: Vec<String>,
    sentinel: String,
    selected: Option<String>,
    custom_text: String,
}

impl SingleSelectWithOther {
    pub fn new(field: impl Into<String>, options: &[&str]) -> Self {
        Self {
            field: field.into(),
            options: options.iter().map(|o| o.to_string()).collect(),
            sentinel: OTHER_SENTINEL.to_string(),
            selected: None,
            custom_text: String::new(),
        }
    }

    pub fn with_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.sentinel = sentinel.into();
        self
    }

    /// Options as displayed, the `Other` marker last.
    pub fn display_options(&self) -> Vec<&str> {
        self.options
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.sentinel.as_str()))
            .collect()
    }

    /// Reconciles local state with a value supplied from outside (initial
    /// record, reset, programmatic change).
    pub fn set_external(&mut self, value: Option<&str>) {
        // Blank means unset; anything else is matched exactly as given.
        match value.filter(|v| !v.trim().is_empty()) {
            None => {
                self.selected = None;
                self.custom_text.clear();
            }
            Some(v) if v == self.sentinel => {
                self.selected = Some(self.sentinel.clone());
                self.custom_text.clear();
            }
            Some(v) if self.options.iter().any(|o| o == v) => {
                self.selected = Some(v.to_string());
                self.custom_text.clear();
            }
            Some(v) => {
                self.selected = Some(self.sentinel.clone());
                self.custom_text = v.to_string();
            }
        }
    }

    /// User picked an entry in the option control. Returns the new external value.
    pub fn select(&mut self, option: &str) -> Result<Option<String>, WizardError> {
        if option == self.sentinel {
            if self.selected.as_deref() != Some(self.sentinel.as_str()) {
                self.custom_text.clear();
            }
            self.selected = Some(self.sentinel.clone());
        } else if self.options.iter().any(|o| o == option) {
            self.selected = Some(option.to_string());
            self.custom_text.clear();
        } else {
            return Err(WizardError::UnknownOption {
                field: self.field.clone(),
                option: option.to_string(),
            });
        }
        Ok(self.value())
    }

    /// User typed into the free-text box. Returns the new external value.
    pub fn enter_text(&mut self, text: &str) -> Option<String> {
        self.selected = Some(self.sentinel.clone());
        self.custom_text = text.to_string();
        self.value()
    }

    pub fn clear(&mut self) -> Option<String> {
        self.set_external(None);
        None
    }

    /// Externally visible value. Never the sentinel: `None` while `Other` is
    /// picked without text.
    pub fn value(&self) -> Option<String> {
        match self.selected.as_deref() {
            Some(selected) if selected == self.sentinel => {
                Some(self.custom_text.clone()).filter(|text| !text.trim().is_empty())
            }
            Some(selected) => Some(selected.to_string()),
            None => None,
        }
    }

    pub fn field_value(&self) -> FieldValue {
        self.value().map(FieldValue::Text).unwrap_or(FieldValue::Null)
    }

    pub fn choice(&self) -> Option<OptionChoice> {
        let value = self.value()?;
        if self.is_other_selected() {
            Some(OptionChoice::Custom(value))
        } else {
            Some(OptionChoice::Predefined(value))
        }
    }

    /// Option highlighted in the control, possibly the sentinel.
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn is_other_selected(&self) -> bool {
        self.selected.as_deref() == Some(self.sentinel.as_str())
    }

    pub fn shows_text_box(&self) -> bool {
        self.is_other_selected()
    }

    pub fn custom_text(&self) -> &str {
        &self.custom_text
    }

    /// `Other` picked but nothing typed yet.
    pub fn is_pending(&self) -> bool {
        self.is_other_selected() && self.custom_text.trim().is_empty()
    }
}

/// Local state of a multi-select "options with Other" field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiSelectWithOther {
    field: String,
    options: Vec<String>,
    sentinel: String,
    checked: Vec<String>,
    custom_text: String,
}

impl MultiSelectWithOther {
    pub fn new(field: impl Into<String>, options: &[&str]) -> Self {
        Self {
            field: field.into(),
            options: options.iter().map(|o| o.to_string()).collect(),
            sentinel: OTHER_SENTINEL.to_string(),
            checked: Vec::new(),
            custom_text: String::new(),
        }
    }

    pub fn with_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.sentinel = sentinel.into();
        self
    }

    pub fn display_options(&self) -> Vec<&str> {
        self.options
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.sentinel.as_str()))
            .collect()
    }

    fn is_known(&self, member: &str) -> bool {
        member == self.sentinel || self.options.iter().any(|o| o == member)
    }

    /// Splits an incoming value into known options and free text. When free
    /// text is present the sentinel is forced into the checked set, so a
    /// redisplayed value keeps its text box open even if the caller left the
    /// sentinel out.
    pub fn set_external(&mut self, members: &[String]) {
        let mut checked: Vec<String> = Vec::new();
        let mut unknown: Vec<&str> = Vec::new();
        for member in members {
            if self.is_known(member) {
                if !checked.contains(member) {
                    checked.push(member.clone());
                }
            } else if !member.trim().is_empty() {
                unknown.push(member.as_str());
            }
        }
        if unknown.len() > 1 {
            tracing::warn!(
                field = %self.field,
                count = unknown.len(),
                "multiple free-text entries merged into one"
            );
        }
        self.custom_text = unknown.join(", ");
        if !self.custom_text.is_empty() && !checked.contains(&self.sentinel) {
            checked.push(self.sentinel.clone());
        }
        self.checked = checked;
    }

    /// The predefined-options control changed. Returns the new external value.
    pub fn set_checked(&mut self, checked: &[String]) -> Result<Vec<String>, WizardError> {
        if let Some(unknown) = checked.iter().find(|member| !self.is_known(member)) {
            return Err(WizardError::UnknownOption {
                field: self.field.clone(),
                option: unknown.clone(),
            });
        }
        let mut deduped: Vec<String> = Vec::new();
        for member in checked {
            if !deduped.contains(member) {
                deduped.push(member.clone());
            }
        }
        if !deduped.contains(&self.sentinel) {
            self.custom_text.clear();
        }
        self.checked = deduped;
        Ok(self.value())
    }

    /// Toggles one option, as a checkbox click would.
    pub fn toggle(&mut self, option: &str) -> Result<Vec<String>, WizardError> {
        let mut next = self.checked.clone();
        if let Some(pos) = next.iter().position(|member| member == option) {
            next.remove(pos);
        } else {
            next.push(option.to_string());
        }
        self.set_checked(&next)
    }

    /// User typed into the free-text box. Checks the sentinel if needed.
    pub fn enter_text(&mut self, text: &str) -> Vec<String> {
        if !self.checked.contains(&self.sentinel) {
            self.checked.push(self.sentinel.clone());
        }
        self.custom_text = text.to_string();
        self.value()
    }

    /// Externally visible value: the checked set, with the sentinel replaced
    /// by the free text once there is any.
    pub fn value(&self) -> Vec<String> {
        if !self.has_custom_text() {
            return self.checked.clone();
        }
        let mut value: Vec<String> = self
            .checked
            .iter()
            .filter(|member| **member != self.sentinel)
            .cloned()
            .collect();
        value.push(self.custom_text.clone());
        value
    }

    pub fn field_value(&self) -> FieldValue {
        FieldValue::text_list(self.value())
    }

    pub fn choice(&self) -> MultiChoice {
        MultiChoice {
            selected: self
                .checked
                .iter()
                .filter(|member| **member != self.sentinel)
                .cloned()
                .collect(),
            custom: Some(self.custom_text.clone()).filter(|_| self.has_custom_text()),
        }
    }

    /// Checked entries as the control shows them, sentinel included.
    pub fn checked(&self) -> &[String] {
        &self.checked
    }

    pub fn custom_text(&self) -> &str {
        &self.custom_text
    }

    pub fn shows_text_box(&self) -> bool {
        self.checked.contains(&self.sentinel)
    }

    pub fn is_pending(&self) -> bool {
        self.shows_text_box() && !self.has_custom_text()
    }

    fn has_custom_text(&self) -> bool {
        self.shows_text_box() && !self.custom_text.trim().is_empty()
    }
}

/// An option-with-Other field of either arity, as held by the wizard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionField {
    Single(SingleSelectWithOther),
    Multi(MultiSelectWithOther),
}

impl OptionField {
    /// Reconciles with a raw form value.
    pub fn sync_from(&mut self, value: &FieldValue) {
        match self {
            OptionField::Single(single) => single.set_external(value.as_text()),
            OptionField::Multi(multi) => {
                let members: Vec<String> =
                    value.text_items().into_iter().map(str::to_string).collect();
                multi.set_external(&members);
            }
        }
    }

    pub fn field_value(&self) -> FieldValue {
        match self {
            OptionField::Single(single) => single.field_value(),
            OptionField::Multi(multi) => multi.field_value(),
        }
    }

    pub fn is_pending(&self) -> bool {
        match self {
            OptionField::Single(single) => single.is_pending(),
            OptionField::Multi(multi) => multi.is_pending(),
        }
    }

    pub fn display_options(&self) -> Vec<&str> {
        match self {
            OptionField::Single(single) => single.display_options(),
            OptionField::Multi(multi) => multi.display_options(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> SingleSelectWithOther {
        SingleSelectWithOther::new("owner", &["ministry", "agency"])
    }

    fn methods() -> MultiSelectWithOther {
        MultiSelectWithOther::new("methods", &["x", "y"])
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn single_free_text_round_trips() {
        let mut field = owner();
        field.set_external(Some("Regional office"));
        assert_eq!(field.value().as_deref(), Some("Regional office"));
        assert!(field.shows_text_box());
        assert_eq!(field.selected(), Some(OTHER_SENTINEL));
        assert_eq!(
            field.choice(),
            Some(OptionChoice::Custom("Regional office".into()))
        );
    }

    #[test]
    fn single_sentinel_emits_none_until_text() {
        let mut field = owner();
        assert_eq!(field.select(OTHER_SENTINEL).expect("known option"), None);
        assert!(field.is_pending());
        assert_eq!(field.enter_text("Shared service").as_deref(), Some("Shared service"));
        assert_eq!(field.enter_text(""), None);
    }

    #[test]
    fn single_sentinel_external_value_shows_empty_box() {
        let mut field = owner();
        field.set_external(Some(OTHER_SENTINEL));
        assert!(field.shows_text_box());
        assert_eq!(field.custom_text(), "");
        assert_eq!(field.value(), None);
    }

    #[test]
    fn single_predefined_hides_box() {
        let mut field = owner();
        field.enter_text("custom");
        assert_eq!(
            field.select("agency").expect("known option").as_deref(),
            Some("agency")
        );
        assert!(!field.shows_text_box());
        assert_eq!(field.custom_text(), "");
        assert!(field.select("unknown").is_err());
    }

    #[test]
    fn multi_forces_sentinel_when_text_present() {
        let mut field = methods();
        field.set_external(&strings(&["x", "custom text"]));
        assert_eq!(field.checked(), strings(&["x", OTHER_SENTINEL]).as_slice());
        assert_eq!(field.custom_text(), "custom text");
        assert_eq!(field.value(), strings(&["x", "custom text"]));
    }

    #[test]
    fn multi_newly_checked_sentinel_without_text_emits_checked_set() {
        let mut field = methods();
        let emitted = field
            .set_checked(&strings(&["y", OTHER_SENTINEL]))
            .expect("known options");
        assert_eq!(emitted, strings(&["y", OTHER_SENTINEL]));
        assert!(field.is_pending());

        let emitted = field.enter_text("webhooks");
        assert_eq!(emitted, strings(&["y", "webhooks"]));
        assert!(!field.is_pending());
    }

    #[test]
    fn multi_unchecking_sentinel_clears_text() {
        let mut field = methods();
        field.set_external(&strings(&["custom"]));
        let emitted = field.set_checked(&strings(&["x"])).expect("known options");
        assert_eq!(emitted, strings(&["x"]));
        assert_eq!(field.custom_text(), "");
        assert!(!field.shows_text_box());
    }

    #[test]
    fn multi_choice_is_tagged() {
        let mut field = methods();
        field.set_external(&strings(&["y", "legacy bus"]));
        assert_eq!(
            field.choice(),
            MultiChoice {
                selected: strings(&["y"]),
                custom: Some("legacy bus".into()),
            }
        );
    }

    #[test]
    fn multi_toggle_flips_membership() {
        let mut field = methods();
        assert_eq!(field.toggle("x").expect("known"), strings(&["x"]));
        assert_eq!(field.toggle("x").expect("known"), Vec::<String>::new());
        assert!(field.toggle("z").is_err());
    }
}
