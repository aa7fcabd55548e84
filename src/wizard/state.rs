//! Bookkeeping and outcome types exposed by [`super::FormWizard`].

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::ApiError;
use crate::persistence::{DraftRequest, RecordId};
use crate::validation::{AllTabsValidation, FieldError, TabValidationResult};

/// Per-tab save bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TabSaveState {
    pub is_dirty: bool,
    pub is_saved: bool,
    pub last_saved_at: Option<DateTime<Utc>>,
}

impl TabSaveState {
    /// Changes were made that no save has persisted yet.
    pub fn needs_confirmation(&self) -> bool {
        self.is_dirty && !self.is_saved
    }

    pub(crate) fn mark_changed(&mut self) {
        self.is_dirty = true;
        self.is_saved = false;
    }

    pub(crate) fn mark_saved(&mut self, at: DateTime<Utc>) {
        self.is_dirty = false;
        self.is_saved = true;
        self.last_saved_at = Some(at);
    }
}

/// Everything a progress indicator needs about one tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabStatus {
    pub key: String,
    pub label: String,
    pub ordinal: u32,
    pub is_current: bool,
    /// `None` until the tab has been validated at least once.
    pub is_valid: Option<bool>,
    pub save: TabSaveState,
}

/// Why a forward transition or a save was refused on the client side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationBlock {
    pub tab_key: String,
    pub tab_label: String,
    pub error_count: usize,
    pub focus_field: Option<String>,
    pub errors: Vec<FieldError>,
}

impl ValidationBlock {
    pub(crate) fn from_result(label: &str, result: TabValidationResult) -> Self {
        Self {
            focus_field: result.first_error_field().map(str::to_string),
            tab_key: result.tab_key,
            tab_label: label.to_string(),
            error_count: result.error_count,
            errors: result.errors,
        }
    }

    /// Count-and-tab-name summary shown to the user.
    pub fn message(&self) -> String {
        let noun = if self.error_count == 1 { "error" } else { "errors" };
        format!(
            "Please fix {} {} in \"{}\" before continuing",
            self.error_count, noun, self.tab_label
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    Navigated { from: String, to: String },
    Blocked(ValidationBlock),
    /// The current tab has unsaved changes; answer with
    /// [`super::FormWizard::resolve_confirmation`].
    ConfirmationRequired { pending_tab: String },
    /// The confirmation prompt was dismissed.
    Stayed,
    /// Save-then-continue could not save; the wizard stays put.
    SaveFailed { error: ApiError, messages: Vec<String> },
}

impl NavigationOutcome {
    pub fn is_navigated(&self) -> bool {
        matches!(self, NavigationOutcome::Navigated { .. })
    }
}

/// Answers to the unsaved-changes prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Stay,
    ContinueWithoutSaving,
    SaveThenContinue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved {
        tab_key: String,
        record_id: RecordId,
        /// Tab made current after the save, if any.
        advanced_to: Option<String>,
    },
    Blocked(ValidationBlock),
    Failed {
        tab_key: String,
        error: ApiError,
        messages: Vec<String>,
    },
    /// A completion for a save this wizard no longer waits for.
    Ignored,
}

impl SaveOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, SaveOutcome::Saved { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Finalized { record_id: RecordId },
    /// Client-side validation failed; the wizard moved to the first invalid tab.
    Invalid {
        validation: AllTabsValidation,
        tab_key: String,
        focus_field: Option<String>,
    },
    /// The server refused the final save.
    Rejected {
        error: ApiError,
        messages: Vec<String>,
        tab_key: String,
        focus_field: Option<String>,
    },
}

/// What to do once a save started with [`super::FormWizard::begin_save`] succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterSave {
    Stay,
    Advance,
    NavigateTo(usize),
}

/// Handle for a save whose network call the host performs itself.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveTicket {
    pub(crate) session: Uuid,
    pub(crate) tab: usize,
    pub(crate) generation: u64,
    pub(crate) after: AfterSave,
    pub request: DraftRequest,
}

impl SaveTicket {
    pub fn session(&self) -> Uuid {
        self.session
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn after(&self) -> AfterSave {
        self.after
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BeginSave {
    Started(SaveTicket),
    Blocked(ValidationBlock),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_after_save_needs_confirmation_again() {
        let mut state = TabSaveState::default();
        assert!(!state.needs_confirmation());
        state.mark_changed();
        assert!(state.needs_confirmation());
        state.mark_saved(DateTime::<Utc>::UNIX_EPOCH);
        assert!(!state.needs_confirmation());
        state.mark_changed();
        assert!(state.needs_confirmation());
        assert!(state.last_saved_at.is_some());
    }

    #[test]
    fn block_message_names_tab_and_count() {
        let block = ValidationBlock {
            tab_key: "1".into(),
            tab_label: "General".into(),
            error_count: 2,
            focus_field: Some("name".into()),
            errors: Vec::new(),
        };
        assert_eq!(
            block.message(),
            "Please fix 2 errors in \"General\" before continuing"
        );
    }
}
