use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::debounce::Debouncer;
use super::state::{
    AfterSave, BeginSave, NavigationOutcome, Resolution, SaveOutcome, SaveTicket, SubmitOutcome,
    TabSaveState, TabStatus, ValidationBlock,
};
use crate::config::WizardConfig;
use crate::errors::{ApiError, WizardError};
use crate::fields::{MultiSelectWithOther, OptionField, SingleSelectWithOther};
use crate::form::{FieldKind, FieldValue, FormSchema, FormState, TabSpec};
use crate::persistence::{DraftBackend, DraftGateway, DraftStatus, RecordId, ServerRecord};
use crate::utils::{Clock, SystemClock};
use crate::validation::{RuleRegistry, TabValidationResult, TabValidator};

#[derive(Debug, Clone, Copy)]
struct InFlight {
    tab: usize,
    generation: u64,
    edited: bool,
}

/// Tab and save state machine for one survey session.
///
/// Every action takes `&mut self`, so actions are applied one at a time.
/// Network calls either run inline (`save_current_tab`, `save_and_continue`,
/// `submit`) or are left to the host through `begin_save`/`complete_save`.
pub struct FormWizard<B: DraftBackend, C: Clock = SystemClock> {
    session: Uuid,
    validator: TabValidator,
    gateway: DraftGateway<B>,
    clock: C,
    state: FormState,
    current: usize,
    save_states: Vec<TabSaveState>,
    validity: Vec<Option<bool>>,
    navigable: Option<bool>,
    pending_tab: Option<usize>,
    focus: Option<String>,
    debouncer: Debouncer,
    in_flight: Option<InFlight>,
    save_generation: u64,
    options: BTreeMap<&'static str, OptionField>,
}

impl<B: DraftBackend> FormWizard<B, SystemClock> {
    /// Create-mode wizard starting on the first tab with nothing saved.
    pub fn new(
        schema: Arc<FormSchema>,
        rules: Arc<RuleRegistry>,
        backend: B,
        config: &WizardConfig,
    ) -> Self {
        Self::with_clock(schema, rules, backend, config, SystemClock)
    }

    /// Edit-mode wizard pre-populated from a stored record.
    pub fn edit(
        schema: Arc<FormSchema>,
        rules: Arc<RuleRegistry>,
        backend: B,
        config: &WizardConfig,
        existing: &ServerRecord,
    ) -> Self {
        Self::edit_with_clock(schema, rules, backend, config, existing, SystemClock)
    }
}

impl<B: DraftBackend, C: Clock> FormWizard<B, C> {
    pub fn with_clock(
        schema: Arc<FormSchema>,
        rules: Arc<RuleRegistry>,
        backend: B,
        config: &WizardConfig,
        clock: C,
    ) -> Self {
        Self::build(
            schema,
            rules,
            DraftGateway::new(backend),
            FormState::new(),
            config,
            clock,
        )
    }

    pub fn edit_with_clock(
        schema: Arc<FormSchema>,
        rules: Arc<RuleRegistry>,
        backend: B,
        config: &WizardConfig,
        existing: &ServerRecord,
        clock: C,
    ) -> Self {
        let mut state = FormState::new();
        for (key, value) in &existing.fields {
            if schema.field(key).is_some() {
                state.set(key.clone(), schema.coerce_json(key, value.clone()));
            }
        }
        tracing::info!(id = %existing.id, fields = state.values().len(), "opening record for editing");
        let gateway = DraftGateway::resume_record(backend, existing);
        Self::build(schema, rules, gateway, state, config, clock)
    }

    fn build(
        schema: Arc<FormSchema>,
        rules: Arc<RuleRegistry>,
        gateway: DraftGateway<B>,
        state: FormState,
        config: &WizardConfig,
        clock: C,
    ) -> Self {
        let tab_count = schema.tabs().len();
        let options = schema
            .fields()
            .iter()
            .filter_map(|spec| match &spec.kind {
                FieldKind::Choice {
                    options,
                    allow_other: true,
                } => Some((
                    spec.key,
                    OptionField::Single(SingleSelectWithOther::new(spec.key, options)),
                )),
                FieldKind::MultiChoice {
                    options,
                    allow_other: true,
                } => Some((
                    spec.key,
                    OptionField::Multi(MultiSelectWithOther::new(spec.key, options)),
                )),
                _ => None,
            })
            .collect();

        let mut wizard = Self {
            session: Uuid::new_v4(),
            validator: TabValidator::new(schema, rules),
            gateway,
            clock,
            state,
            current: 0,
            save_states: vec![TabSaveState::default(); tab_count],
            validity: vec![None; tab_count],
            navigable: None,
            pending_tab: None,
            focus: None,
            debouncer: Debouncer::new(config.clone().validated().debounce()),
            in_flight: None,
            save_generation: 0,
            options,
        };
        wizard.sync_option_fields();
        wizard.ask_current_tab();
        tracing::debug!(session = %wizard.session, tabs = tab_count, "wizard started");
        wizard
    }

    pub fn session_id(&self) -> Uuid {
        self.session
    }

    pub fn schema(&self) -> &FormSchema {
        self.validator.schema()
    }

    pub fn validator(&self) -> &TabValidator {
        &self.validator
    }

    pub fn state(&self) -> &FormState {
        &self.state
    }

    pub fn gateway(&self) -> &DraftGateway<B> {
        &self.gateway
    }

    pub fn current_tab(&self) -> &TabSpec {
        &self.schema().tabs()[self.current]
    }

    pub fn pending_tab(&self) -> Option<&TabSpec> {
        self.pending_tab.map(|index| &self.schema().tabs()[index])
    }

    pub fn focus_field(&self) -> Option<&str> {
        self.focus.as_deref()
    }

    pub fn is_saving(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn draft_status(&self) -> DraftStatus {
        self.gateway.status()
    }

    pub fn draft_id(&self) -> Option<RecordId> {
        self.gateway.draft_id()
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self.gateway.status(), DraftStatus::Finalized(_))
    }

    /// Result of the last debounced validation of the current tab.
    pub fn is_navigable_forward(&self) -> Option<bool> {
        self.navigable
    }

    pub fn validation_deadline(&self) -> Option<DateTime<Utc>> {
        self.debouncer.deadline()
    }

    pub fn save_state(&self, tab_key: &str) -> Option<&TabSaveState> {
        self.schema()
            .tab_position(tab_key)
            .map(|index| &self.save_states[index])
    }

    pub fn option_field(&self, field: &str) -> Option<&OptionField> {
        self.options.get(field)
    }

    pub fn tab_statuses(&self) -> Vec<TabStatus> {
        self.schema()
            .tabs()
            .iter()
            .enumerate()
            .map(|(index, tab)| TabStatus {
                key: tab.key.to_string(),
                label: tab.label.to_string(),
                ordinal: tab.ordinal,
                is_current: index == self.current,
                is_valid: self.validity[index],
                save: self.save_states[index],
            })
            .collect()
    }

    /// Stores a typed value. Option-with-Other fields are reconciled first,
    /// so free text given here lands in the text box.
    pub fn set_field(
        &mut self,
        field: &str,
        value: impl Into<FieldValue>,
    ) -> Result<(), WizardError> {
        let key = self.field_key(field)?;
        let mut value = value.into();
        if let Some(option) = self.options.get_mut(key) {
            option.sync_from(&value);
            value = option.field_value();
            self.state.set_pending_custom(key, option.is_pending());
        }
        self.state.set(key, value);
        self.after_change(key);
        Ok(())
    }

    /// Parses raw user input for `field` and stores it.
    pub fn set_input(&mut self, field: &str, raw: &str) -> Result<(), WizardError> {
        let value = self.schema().parse_input(field, raw)?;
        self.set_field(field, value)
    }

    pub fn clear_field(&mut self, field: &str) -> Result<(), WizardError> {
        self.set_field(field, FieldValue::Null)
    }

    /// A pick in a single-select control, the `Other` marker included.
    pub fn select_option(&mut self, field: &str, option: &str) -> Result<(), WizardError> {
        let key = self.field_key(field)?;
        let value = match self.options.get_mut(key) {
            Some(OptionField::Single(single)) => {
                let value = single.select(option)?;
                self.state.set_pending_custom(key, single.is_pending());
                value.map(FieldValue::Text).unwrap_or(FieldValue::Null)
            }
            Some(OptionField::Multi(multi)) => {
                let value = multi.toggle(option)?;
                self.state.set_pending_custom(key, multi.is_pending());
                FieldValue::text_list(value)
            }
            None => return self.select_plain_choice(key, option),
        };
        self.state.set(key, value);
        self.after_change(key);
        Ok(())
    }

    fn select_plain_choice(&mut self, key: &'static str, option: &str) -> Result<(), WizardError> {
        let known = match self.schema().field(key).map(|spec| &spec.kind) {
            Some(FieldKind::Choice { options, .. }) => options.contains(&option),
            _ => return Err(WizardError::NotAnOptionField(key.to_string())),
        };
        if !known {
            return Err(WizardError::UnknownOption {
                field: key.to_string(),
                option: option.to_string(),
            });
        }
        self.state.set(key, option);
        self.after_change(key);
        Ok(())
    }

    /// Text typed into the free-text box of an option-with-Other field.
    pub fn enter_other_text(&mut self, field: &str, text: &str) -> Result<(), WizardError> {
        let key = self.field_key(field)?;
        let option = self
            .options
            .get_mut(key)
            .ok_or_else(|| WizardError::NotAnOptionField(key.to_string()))?;
        let value = match option {
            OptionField::Single(single) => single
                .enter_text(text)
                .map(FieldValue::Text)
                .unwrap_or(FieldValue::Null),
            OptionField::Multi(multi) => FieldValue::text_list(multi.enter_text(text)),
        };
        self.state.set_pending_custom(key, option.is_pending());
        self.state.set(key, value);
        self.after_change(key);
        Ok(())
    }

    /// Replaces the checked set of a multi-select.
    pub fn set_checked(&mut self, field: &str, checked: &[String]) -> Result<(), WizardError> {
        let key = self.field_key(field)?;
        let value = match self.options.get_mut(key) {
            Some(OptionField::Multi(multi)) => {
                let value = multi.set_checked(checked)?;
                self.state.set_pending_custom(key, multi.is_pending());
                FieldValue::text_list(value)
            }
            Some(OptionField::Single(_)) => {
                return Err(WizardError::InvalidValue {
                    field: key.to_string(),
                    message: "accepts a single option".into(),
                })
            }
            None => {
                let options = match self.schema().field(key).map(|spec| &spec.kind) {
                    Some(FieldKind::MultiChoice { options, .. }) => *options,
                    _ => return Err(WizardError::NotAnOptionField(key.to_string())),
                };
                if let Some(unknown) = checked.iter().find(|c| !options.contains(&c.as_str())) {
                    return Err(WizardError::UnknownOption {
                        field: key.to_string(),
                        option: unknown.clone(),
                    });
                }
                FieldValue::text_list(checked.iter().cloned())
            }
        };
        self.state.set(key, value);
        self.after_change(key);
        Ok(())
    }

    fn field_key(&self, field: &str) -> Result<&'static str, WizardError> {
        self.schema()
            .field(field)
            .map(|spec| spec.key)
            .ok_or_else(|| WizardError::UnknownField(field.to_string()))
    }

    /// Bookkeeping after `field` changed: its own tab becomes dirty and
    /// loses its cached validity, wherever the edit came from.
    fn after_change(&mut self, field: &str) {
        let owner = self
            .schema()
            .tab_of(field)
            .and_then(|tab| self.schema().tab_position(tab.key))
            .unwrap_or(self.current);
        self.save_states[owner].mark_changed();
        self.validity[owner] = None;
        if let Some(in_flight) = self.in_flight.as_mut() {
            if in_flight.tab == owner {
                in_flight.edited = true;
            }
        }
        let generation = self.debouncer.schedule(self.clock.now());
        tracing::debug!(
            field,
            tab = self.schema().tabs()[owner].key,
            current = self.current_tab().key,
            generation,
            "field changed"
        );
    }

    /// Runs the scheduled validation pass once its quiet period is over.
    pub fn poll(&mut self) -> Option<TabValidationResult> {
        if !self.debouncer.fire_if_due(self.clock.now()) {
            return None;
        }
        let result = self.validate_current();
        self.navigable = Some(result.is_valid);
        tracing::debug!(
            tab = %result.tab_key,
            valid = result.is_valid,
            errors = result.error_count,
            "debounced validation"
        );
        Some(result)
    }

    /// Validates the current tab now and records the outcome.
    pub fn validate_current(&mut self) -> TabValidationResult {
        let tab = &self.schema().tabs()[self.current];
        let result = self.validator.validate_tab_spec(&self.state, tab);
        self.validity[self.current] = Some(result.is_valid);
        result
    }

    pub fn request_navigation(&mut self, tab_key: &str) -> Result<NavigationOutcome, WizardError> {
        if self.in_flight.is_some() {
            return Err(WizardError::SaveInFlight);
        }
        let target = self
            .schema()
            .tab_position(tab_key)
            .ok_or_else(|| WizardError::UnknownTab(tab_key.to_string()))?;
        self.pending_tab = None;

        let tabs = self.schema().tabs();
        if tabs[target].ordinal < tabs[self.current].ordinal {
            return Ok(self.navigate_to(target));
        }

        let result = self.validate_current();
        self.navigable = Some(result.is_valid);
        if !result.is_valid {
            return Ok(NavigationOutcome::Blocked(self.block(result)));
        }
        if self.save_states[self.current].needs_confirmation() {
            self.pending_tab = Some(target);
            tracing::info!(
                from = self.current_tab().key,
                to = tab_key,
                "unsaved changes, asking before leaving"
            );
            return Ok(NavigationOutcome::ConfirmationRequired {
                pending_tab: tab_key.to_string(),
            });
        }
        Ok(self.navigate_to(target))
    }

    /// Moves to the tab after the current one, if there is one.
    pub fn request_next(&mut self) -> Result<Option<NavigationOutcome>, WizardError> {
        match self.schema().tabs().get(self.current + 1) {
            Some(next) => {
                let key = next.key;
                self.request_navigation(key).map(Some)
            }
            None => Ok(None),
        }
    }

    pub fn resolve_confirmation(
        &mut self,
        resolution: Resolution,
    ) -> Result<NavigationOutcome, WizardError> {
        let target = self.pending_tab.ok_or(WizardError::NoPendingNavigation)?;
        match resolution {
            Resolution::Stay => {
                self.pending_tab = None;
                Ok(NavigationOutcome::Stayed)
            }
            Resolution::ContinueWithoutSaving => {
                self.pending_tab = None;
                Ok(self.navigate_to(target))
            }
            Resolution::SaveThenContinue => {
                match self.save_inline(AfterSave::NavigateTo(target))? {
                    SaveOutcome::Saved { tab_key, .. } => {
                        let to = self.current_tab().key.to_string();
                        Ok(NavigationOutcome::Navigated { from: tab_key, to })
                    }
                    SaveOutcome::Blocked(block) => {
                        self.pending_tab = None;
                        Ok(NavigationOutcome::Blocked(block))
                    }
                    SaveOutcome::Failed { error, messages, .. } => {
                        self.pending_tab = None;
                        Ok(NavigationOutcome::SaveFailed { error, messages })
                    }
                    SaveOutcome::Ignored => {
                        self.pending_tab = None;
                        Ok(NavigationOutcome::Stayed)
                    }
                }
            }
        }
    }

    fn navigate_to(&mut self, target: usize) -> NavigationOutcome {
        let from = self.current_tab().key.to_string();
        self.current = target;
        self.pending_tab = None;
        self.focus = None;
        self.navigable = None;
        self.debouncer.cancel();
        self.ask_current_tab();
        let to = self.current_tab().key.to_string();
        tracing::info!(%from, %to, "navigated");
        NavigationOutcome::Navigated { from, to }
    }

    /// Fields of the current tab count as asked from now on.
    fn ask_current_tab(&mut self) {
        let fields = self.schema().tabs()[self.current].fields.clone();
        for field in fields {
            if !self.state.contains(field) {
                self.state.set(field, FieldValue::Null);
            }
        }
    }

    fn block(&mut self, result: TabValidationResult) -> ValidationBlock {
        let label = self.schema().tabs()[self.current].label;
        let block = ValidationBlock::from_result(label, result);
        self.focus = block.focus_field.clone();
        tracing::warn!(
            tab = %block.tab_key,
            errors = block.error_count,
            focus = ?block.focus_field,
            "transition blocked by validation"
        );
        block
    }

    pub fn save_current_tab(&mut self) -> Result<SaveOutcome, WizardError> {
        self.save_inline(AfterSave::Stay)
    }

    /// Saves, then advances one tab only if the save succeeded.
    pub fn save_and_continue(&mut self) -> Result<SaveOutcome, WizardError> {
        self.save_inline(AfterSave::Advance)
    }

    fn save_inline(&mut self, after: AfterSave) -> Result<SaveOutcome, WizardError> {
        let ticket = match self.begin_save_with(after)? {
            BeginSave::Started(ticket) => ticket,
            BeginSave::Blocked(block) => return Ok(SaveOutcome::Blocked(block)),
        };
        let result = self.gateway.execute(&ticket.request);
        Ok(self.complete_save(ticket, result))
    }

    /// Validates the current tab and plans its save without sending it.
    /// The host sends `ticket.request` and hands the result to
    /// [`Self::complete_save`].
    pub fn begin_save(&mut self) -> Result<BeginSave, WizardError> {
        self.begin_save_with(AfterSave::Stay)
    }

    pub fn begin_save_with(&mut self, after: AfterSave) -> Result<BeginSave, WizardError> {
        if self.in_flight.is_some() {
            return Err(WizardError::SaveInFlight);
        }
        let result = self.validate_current();
        if !result.is_valid {
            return Ok(BeginSave::Blocked(self.block(result)));
        }
        self.save_generation += 1;
        let request = self.gateway.plan(&self.state, false);
        self.in_flight = Some(InFlight {
            tab: self.current,
            generation: self.save_generation,
            edited: false,
        });
        tracing::info!(
            tab = self.current_tab().key,
            generation = self.save_generation,
            create = request.target().is_none(),
            "saving tab"
        );
        Ok(BeginSave::Started(SaveTicket {
            session: self.session,
            tab: self.current,
            generation: self.save_generation,
            after,
            request,
        }))
    }

    /// Applies the result of a save started with [`Self::begin_save`].
    /// Tickets from another session or an earlier save are ignored.
    pub fn complete_save(
        &mut self,
        ticket: SaveTicket,
        result: Result<ServerRecord, ApiError>,
    ) -> SaveOutcome {
        let in_flight = match self.in_flight {
            Some(in_flight)
                if ticket.session == self.session
                    && in_flight.generation == ticket.generation
                    && in_flight.tab == ticket.tab =>
            {
                in_flight
            }
            _ => {
                tracing::warn!(
                    generation = ticket.generation,
                    "ignoring completion of a stale save"
                );
                return SaveOutcome::Ignored;
            }
        };
        self.in_flight = None;
        let tab_key = self.schema().tabs()[ticket.tab].key.to_string();

        match result {
            Ok(record) => {
                self.gateway.record_success(&ticket.request, &record);
                let now = self.clock.now();
                let save = &mut self.save_states[ticket.tab];
                save.mark_saved(now);
                if in_flight.edited {
                    save.mark_changed();
                }
                tracing::info!(tab = %tab_key, id = %record.id, "tab saved");

                let advanced_to = match ticket.after {
                    AfterSave::Stay => None,
                    AfterSave::Advance if ticket.tab + 1 < self.schema().tabs().len() => {
                        self.navigate_to(ticket.tab + 1);
                        Some(self.current_tab().key.to_string())
                    }
                    AfterSave::Advance => None,
                    AfterSave::NavigateTo(target) => {
                        self.navigate_to(target);
                        Some(self.current_tab().key.to_string())
                    }
                };
                SaveOutcome::Saved {
                    tab_key,
                    record_id: record.id,
                    advanced_to,
                }
            }
            Err(error) => {
                let messages = error.user_messages();
                tracing::warn!(tab = %tab_key, %error, "save failed");
                SaveOutcome::Failed {
                    tab_key,
                    error,
                    messages,
                }
            }
        }
    }

    /// Validates every tab and, when all pass, sends the whole record with
    /// the draft flag cleared.
    pub fn submit(&mut self) -> Result<SubmitOutcome, WizardError> {
        if self.in_flight.is_some() {
            return Err(WizardError::SaveInFlight);
        }
        self.ask_all_fields();
        let validation = self.validator.validate_all_tabs(&self.state);
        for result in &validation.results {
            if let Some(index) = self.schema().tab_position(&result.tab_key) {
                self.validity[index] = Some(result.is_valid);
            }
        }

        if let Some(first) = validation.first_invalid() {
            let tab_key = first.tab_key.clone();
            let focus_field = first.first_error_field().map(str::to_string);
            if let Some(index) = self.schema().tab_position(&tab_key) {
                if index != self.current {
                    self.navigate_to(index);
                }
            }
            self.focus = focus_field.clone();
            tracing::warn!(
                invalid_tabs = ?validation.invalid_tabs,
                errors = validation.error_count,
                "submit blocked by validation"
            );
            return Ok(SubmitOutcome::Invalid {
                validation,
                tab_key,
                focus_field,
            });
        }

        match self.gateway.finalize(&self.state) {
            Ok(record) => {
                let now = self.clock.now();
                for save in &mut self.save_states {
                    save.mark_saved(now);
                }
                tracing::info!(id = %record.id, "record finalized");
                Ok(SubmitOutcome::Finalized {
                    record_id: record.id,
                })
            }
            Err(error) => {
                let messages = error.user_messages();
                if let Some(index) = self.earliest_tab_rejected(&error) {
                    if index != self.current {
                        self.navigate_to(index);
                    }
                    let focus = self.first_rejected_field_in_current(&error);
                    self.focus = focus;
                }
                tracing::warn!(%error, "final submit rejected");
                Ok(SubmitOutcome::Rejected {
                    error,
                    messages,
                    tab_key: self.current_tab().key.to_string(),
                    focus_field: self.focus.clone(),
                })
            }
        }
    }

    fn ask_all_fields(&mut self) {
        let keys: Vec<&'static str> = self.schema().fields().iter().map(|spec| spec.key).collect();
        for key in keys {
            if !self.state.contains(key) {
                self.state.set(key, FieldValue::Null);
            }
        }
    }

    fn earliest_tab_rejected(&self, error: &ApiError) -> Option<usize> {
        error
            .rejected_fields()
            .into_iter()
            .filter_map(|field| {
                let root = field.split('.').next().unwrap_or(field);
                self.schema()
                    .tab_of(root)
                    .and_then(|tab| self.schema().tab_position(tab.key))
            })
            .min()
    }

    fn first_rejected_field_in_current(&self, error: &ApiError) -> Option<String> {
        let rejected: Vec<&str> = error
            .rejected_fields()
            .into_iter()
            .map(|field| field.split('.').next().unwrap_or(field))
            .collect();
        self.current_tab()
            .fields
            .iter()
            .find(|field| rejected.contains(field))
            .map(|field| field.to_string())
    }

    fn sync_option_fields(&mut self) {
        for (key, option) in self.options.iter_mut() {
            if let Some(value) = self.state.get(key) {
                option.sync_from(value);
                self.state.set_pending_custom(key, option.is_pending());
            }
        }
    }
}
