use std::{fs, io, path::Path, path::PathBuf, sync::Arc};

use strsim::levenshtein;
use thiserror::Error;

use crate::cli::output;
use crate::config::ConfigManager;
use crate::errors::{RecordEditorError, WizardError};
use crate::fields::{OptionField, RecordListEditor};
use crate::form::{catalog_rules, catalog_schema, FieldValue, IntegrationConnection};
use crate::persistence::{DraftBackend, DraftStatus, HttpBackend, MemoryBackend, ServerRecord};
use crate::wizard::{
    FormWizard, NavigationOutcome, Resolution, SaveOutcome, SubmitOutcome, ValidationBlock,
};

const INTEGRATIONS_FIELD: &str = "integrations";

/// Command name, usage, and one-line description.
const COMMANDS: &[(&str, &str, &str)] = &[
    ("status", "status", "Show every tab with its validity and save state"),
    ("fields", "fields", "List the fields of the current tab"),
    ("tab", "tab <key>", "Go to another tab"),
    ("next", "next", "Go to the following tab"),
    ("set", "set <field> <value>", "Set a field from text"),
    ("clear", "clear <field>", "Empty a field"),
    ("pick", "pick <field> <option>", "Pick an option (toggles on multi-selects)"),
    ("other", "other <field> <text>", "Type into the \"Other\" box of a field"),
    ("check", "check <field> <a,b,...>", "Replace the checked options of a multi-select"),
    ("validate", "validate", "Validate the current tab"),
    ("save", "save", "Save the current tab as a draft"),
    ("save-next", "save-next", "Save, then move to the next tab"),
    ("submit", "submit", "Validate every tab and submit the record"),
    ("confirm", "confirm stay|discard|save", "Answer the unsaved-changes prompt"),
    (
        "record",
        "record list|add|edit <n>|set <field> <value>|save|cancel|delete <n>",
        "Edit the integration links",
    ),
    ("help", "help", "Show this list"),
    ("exit", "exit", "Leave the shell"),
];

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    #[error(transparent)]
    Wizard(#[from] WizardError),
    #[error(transparent)]
    Readline(#[from] rustyline::error::ReadlineError),
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{0}")]
    InvalidArguments(String),
    #[error("Unknown command `{0}`")]
    UnknownCommand(String),
    #[error(transparent)]
    Wizard(#[from] WizardError),
    #[error(transparent)]
    Records(#[from] RecordEditorError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopControl {
    Continue,
    Exit,
}

/// Command-line flags accepted by `catalog_wizard_cli`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellOptions {
    pub offline: bool,
    pub server: Option<String>,
    pub config_path: Option<PathBuf>,
    pub load: Option<PathBuf>,
    pub plain: bool,
    pub quiet: bool,
}

impl ShellOptions {
    pub fn from_args<I>(args: I) -> Result<Self, CliError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut options = Self::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--offline" => options.offline = true,
                "--plain" => options.plain = true,
                "--quiet" => options.quiet = true,
                "--server" => options.server = Some(required_value(&mut args, "--server")?),
                "--config" => {
                    options.config_path = Some(required_value(&mut args, "--config")?.into())
                }
                "--load" => options.load = Some(required_value(&mut args, "--load")?.into()),
                other => {
                    return Err(CliError::Usage(format!(
                        "unknown argument `{}`\n{}",
                        other,
                        usage()
                    )))
                }
            }
        }
        Ok(options)
    }
}

fn required_value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String, CliError> {
    args.next()
        .ok_or_else(|| CliError::Usage(format!("{} expects a value\n{}", flag, usage())))
}

pub fn usage() -> &'static str {
    "usage: catalog_wizard_cli [--offline] [--server <url>] [--config <path>] [--load <record.json>] [--plain] [--quiet]"
}

/// One survey session driven by text commands.
pub struct Session {
    wizard: FormWizard<Box<dyn DraftBackend>>,
    integrations: Option<RecordListEditor<IntegrationConnection>>,
}

impl Session {
    pub fn start(options: &ShellOptions) -> Result<Self, CliError> {
        let manager = match &options.config_path {
            Some(path) => ConfigManager::with_path(path),
            None => ConfigManager::new(),
        };
        let mut config = manager.load()?;
        if let Some(url) = &options.server {
            config = config.with_api_base_url(url.as_str()).validated();
        }

        let existing = match &options.load {
            Some(path) => Some(read_record(path)?),
            None => None,
        };

        let backend: Box<dyn DraftBackend> = if options.offline {
            let memory = MemoryBackend::default();
            if let Some(record) = &existing {
                memory.insert(record.id, record.fields.clone());
            }
            output::info("Offline mode: drafts are kept in memory for this session.");
            Box::new(memory)
        } else {
            tracing::info!(url = %config.api_base_url, "using remote backend");
            Box::new(HttpBackend::new(&config)?)
        };

        let schema = Arc::new(catalog_schema()?);
        let rules = Arc::new(catalog_rules());
        let wizard = match &existing {
            Some(record) => {
                output::info(format!("Editing record #{}.", record.id));
                FormWizard::edit(schema, rules, backend, &config, record)
            }
            None => FormWizard::new(schema, rules, backend, &config),
        };

        Ok(Self {
            wizard,
            integrations: None,
        })
    }

    pub fn wizard(&self) -> &FormWizard<Box<dyn DraftBackend>> {
        &self.wizard
    }

    /// Command names offered by tab completion.
    pub(crate) fn command_names(&self) -> Vec<&'static str> {
        COMMANDS.iter().map(|(name, _, _)| *name).collect()
    }

    /// Field keys offered as the first argument of field commands.
    pub(crate) fn field_keys(&self) -> Vec<&'static str> {
        self.wizard.schema().fields().iter().map(|spec| spec.key).collect()
    }

    pub fn prompt(&self) -> String {
        let tab = self.wizard.current_tab();
        let marker = if self.wizard.pending_tab().is_some() { "?" } else { "" };
        format!("tab {}{}> ", tab.key, marker)
    }

    pub(crate) fn dispatch(&mut self, command: &str, args: &[&str]) -> Result<LoopControl, CommandError> {
        match command {
            "status" => self.cmd_status(),
            "fields" => self.cmd_fields(),
            "tab" => {
                let key = expect_arg(args, 0, "tab <key>")?;
                let outcome = self.wizard.request_navigation(key)?;
                self.report_navigation(outcome);
            }
            "next" => match self.wizard.request_next()? {
                Some(outcome) => self.report_navigation(outcome),
                None => output::info("Already on the last tab."),
            },
            "set" => {
                let field = expect_arg(args, 0, "set <field> <value>")?;
                let raw = rest(args, 1);
                self.wizard.set_input(field, &raw)?;
                output::info(format!("{} updated.", field));
            }
            "clear" => {
                let field = expect_arg(args, 0, "clear <field>")?;
                self.wizard.clear_field(field)?;
                output::info(format!("{} cleared.", field));
            }
            "pick" => {
                let field = expect_arg(args, 0, "pick <field> <option>")?;
                let option = expect_arg(args, 1, "pick <field> <option>")?;
                self.wizard.select_option(field, option)?;
                self.report_option(field);
            }
            "other" => {
                let field = expect_arg(args, 0, "other <field> <text>")?;
                self.wizard.enter_other_text(field, &rest(args, 1))?;
                self.report_option(field);
            }
            "check" => {
                let field = expect_arg(args, 0, "check <field> <a,b,...>")?;
                let checked: Vec<String> = rest(args, 1)
                    .split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect();
                self.wizard.set_checked(field, &checked)?;
                self.report_option(field);
            }
            "validate" => {
                let result = self.wizard.validate_current();
                if result.is_valid {
                    output::success(format!("Tab {} is complete.", result.tab_key));
                } else {
                    let label = self.wizard.current_tab().label;
                    self.report_block(&ValidationBlock::from_result(label, result));
                }
            }
            "save" => {
                let outcome = self.wizard.save_current_tab()?;
                self.report_save(outcome);
            }
            "save-next" => {
                let outcome = self.wizard.save_and_continue()?;
                self.report_save(outcome);
            }
            "submit" => {
                let outcome = self.wizard.submit()?;
                self.report_submit(outcome);
            }
            "confirm" => {
                let resolution = match expect_arg(args, 0, "confirm stay|discard|save")? {
                    "stay" => Resolution::Stay,
                    "discard" => Resolution::ContinueWithoutSaving,
                    "save" => Resolution::SaveThenContinue,
                    other => {
                        return Err(CommandError::InvalidArguments(format!(
                            "`{}` is not an answer; use stay, discard or save",
                            other
                        )))
                    }
                };
                let outcome = self.wizard.resolve_confirmation(resolution)?;
                self.report_navigation(outcome);
            }
            "record" => self.cmd_record(args)?,
            "help" => {
                output::section("Commands");
                for (_, usage, description) in COMMANDS {
                    println!("  {:<28} {}", usage, description);
                }
            }
            "exit" | "quit" => return Ok(LoopControl::Exit),
            other => return Err(CommandError::UnknownCommand(other.to_string())),
        }
        Ok(LoopControl::Continue)
    }

    pub(crate) fn report_error(&self, err: CommandError) {
        match err {
            CommandError::UnknownCommand(command) => {
                output::error(format!("Unknown command `{}`.", command));
                if let Some(best) = suggest(&command) {
                    output::info(format!("Suggestion: `{}`?", best));
                }
            }
            CommandError::InvalidArguments(message) => {
                output::error(message);
                output::info("Use `help` for usage details.");
            }
            other => output::error(other),
        }
    }

    fn cmd_status(&self) {
        output::section("Tabs");
        for status in self.wizard.tab_statuses() {
            let marker = if status.is_current { ">" } else { " " };
            let validity = match status.is_valid {
                Some(true) => "valid",
                Some(false) => "invalid",
                None => "-",
            };
            let save = if status.save.is_saved && !status.save.is_dirty {
                "saved"
            } else if status.save.is_dirty {
                "unsaved changes"
            } else {
                "untouched"
            };
            println!(
                "{} {}. {:<22} {:<8} {}",
                marker, status.key, status.label, validity, save
            );
        }
        match self.wizard.draft_status() {
            DraftStatus::Unsaved => println!("Draft: not saved yet"),
            DraftStatus::Draft(id) => println!("Draft: #{}", id),
            DraftStatus::Finalized(id) => println!("Submitted: #{}", id),
        }
        if let Some(focus) = self.wizard.focus_field() {
            println!("Focus: {}", focus);
        }
    }

    fn cmd_fields(&self) {
        let tab = self.wizard.current_tab();
        output::section(format!("{}. {}", tab.key, tab.label));
        let schema = self.wizard.schema();
        let state = self.wizard.state();
        for key in &tab.fields {
            let Some(spec) = schema.field(key) else {
                continue;
            };
            if !spec.is_visible(state) {
                println!("  {:<26} (hidden)", spec.key);
                continue;
            }
            let value = state
                .get(key)
                .map(ToString::to_string)
                .unwrap_or_else(|| FieldValue::Null.to_string());
            println!("  {:<26} {}", spec.key, value);
            if let Some(option) = self.wizard.option_field(key) {
                output::detail(format!("options: {}", option.display_options().join(", ")));
            }
            if let Some(help) = spec.help {
                output::detail(help);
            }
        }
    }

    fn cmd_record(&mut self, args: &[&str]) -> Result<(), CommandError> {
        const USAGE: &str = "record list|add|edit <n>|set <field> <value>|save|cancel|delete <n>";
        let action = expect_arg(args, 0, USAGE)?;
        match action {
            "list" => {
                let editor = self.integrations()?;
                if editor.is_empty() {
                    println!("No integration links.");
                }
                for (index, link) in editor.records().iter().enumerate() {
                    println!(
                        "  {}. {} -> {} ({})",
                        index + 1,
                        link.source_system,
                        link.target_system,
                        link.frequency
                    );
                }
            }
            "add" => {
                self.integrations()?.start_add()?;
                output::info("New integration link opened. Use `record set` then `record save`.");
            }
            "edit" => {
                let index = parse_position(expect_arg(args, 1, "record edit <n>")?)?;
                self.integrations()?.start_edit(index)?;
                output::info(format!("Editing integration link {}.", index + 1));
            }
            "set" => {
                let field = expect_arg(args, 1, "record set <field> <value>")?;
                let raw = rest(args, 2);
                let draft = self
                    .integrations()?
                    .draft_mut()
                    .ok_or(RecordEditorError::NoActiveEditor)?;
                draft.set_field(field, &raw)?;
            }
            "save" => {
                let index = self.integrations()?.save()?;
                self.store_integrations()?;
                output::success(format!("Integration link {} saved.", index + 1));
            }
            "cancel" => {
                self.integrations()?.cancel();
                output::info("Edit discarded.");
            }
            "delete" => {
                let index = parse_position(expect_arg(args, 1, "record delete <n>")?)?;
                self.integrations()?.delete(index)?;
                self.store_integrations()?;
                output::success(format!("Integration link {} deleted.", index + 1));
            }
            other => {
                return Err(CommandError::InvalidArguments(format!(
                    "unknown record action `{}`; expected {}",
                    other, USAGE
                )))
            }
        }
        Ok(())
    }

    /// The list editor, rebuilt from the form state unless a record is open.
    fn integrations(&mut self) -> Result<&mut RecordListEditor<IntegrationConnection>, CommandError> {
        let stale = self
            .integrations
            .as_ref()
            .map(|editor| !editor.is_editing())
            .unwrap_or(true);
        if stale {
            let editor =
                RecordListEditor::from_field_value(self.wizard.state().get(INTEGRATIONS_FIELD))?;
            self.integrations = Some(editor);
        }
        self.integrations
            .as_mut()
            .ok_or(CommandError::Records(RecordEditorError::NoActiveEditor))
    }

    /// Writes the editor's committed list back into the form.
    fn store_integrations(&mut self) -> Result<(), CommandError> {
        let Some(editor) = self.integrations.as_ref() else {
            return Ok(());
        };
        let value = editor.to_field_value()?;
        self.wizard.set_field(INTEGRATIONS_FIELD, value)?;
        Ok(())
    }

    fn report_option(&self, field: &str) {
        let pending = self
            .wizard
            .option_field(field)
            .map(OptionField::is_pending)
            .unwrap_or(false);
        if pending {
            output::info(format!("Type the value with `other {} <text>`.", field));
            return;
        }
        let value = self
            .wizard
            .state()
            .get(field)
            .map(ToString::to_string)
            .unwrap_or_default();
        output::info(format!("{} = {}", field, value));
    }

    fn report_block(&self, block: &ValidationBlock) {
        output::warning(block.message());
        for error in &block.errors {
            output::detail(format!("{}: {}", error.field, error.message));
        }
    }

    fn report_navigation(&self, outcome: NavigationOutcome) {
        match outcome {
            NavigationOutcome::Navigated { to, .. } => self.report_current_tab(&to),
            NavigationOutcome::Blocked(block) => self.report_block(&block),
            NavigationOutcome::ConfirmationRequired { pending_tab } => output::warning(format!(
                "Tab {} has unsaved changes. Answer `confirm save`, `confirm discard` or `confirm stay` before moving to tab {}.",
                self.wizard.current_tab().key,
                pending_tab
            )),
            NavigationOutcome::Stayed => {
                output::info(format!("Staying on tab {}.", self.wizard.current_tab().key))
            }
            NavigationOutcome::SaveFailed { messages, .. } => {
                for message in messages {
                    output::error(message);
                }
            }
        }
    }

    fn report_current_tab(&self, key: &str) {
        let label = self
            .wizard
            .schema()
            .tab(key)
            .map(|tab| tab.label)
            .unwrap_or_default();
        output::success(format!("Now on tab {}: {}", key, label));
    }

    fn report_save(&self, outcome: SaveOutcome) {
        match outcome {
            SaveOutcome::Saved {
                tab_key,
                record_id,
                advanced_to,
            } => {
                output::success(format!("Tab {} saved to draft #{}.", tab_key, record_id));
                if let Some(to) = advanced_to {
                    self.report_current_tab(&to);
                }
            }
            SaveOutcome::Blocked(block) => self.report_block(&block),
            SaveOutcome::Failed { messages, .. } => {
                for message in messages {
                    output::error(message);
                }
            }
            SaveOutcome::Ignored => {}
        }
    }

    fn report_submit(&self, outcome: SubmitOutcome) {
        match outcome {
            SubmitOutcome::Finalized { record_id } => {
                output::success(format!("Record #{} submitted.", record_id));
            }
            SubmitOutcome::Invalid {
                validation,
                tab_key,
                focus_field,
            } => {
                output::warning(format!(
                    "Submit blocked: {} error(s) in tab(s) {}.",
                    validation.error_count,
                    validation.invalid_tabs.join(", ")
                ));
                for result in validation.results.iter().filter(|r| !r.is_valid) {
                    for error in &result.errors {
                        output::detail(format!("{}/{}: {}", result.tab_key, error.field, error.message));
                    }
                }
                self.report_current_tab(&tab_key);
                if let Some(field) = focus_field {
                    output::info(format!("Start with `{}`.", field));
                }
            }
            SubmitOutcome::Rejected {
                messages, tab_key, ..
            } => {
                for message in messages {
                    output::error(message);
                }
                output::info(format!("Still on tab {}.", tab_key));
            }
        }
    }
}

fn read_record(path: &Path) -> Result<ServerRecord, CliError> {
    let data = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

fn expect_arg<'a>(args: &[&'a str], index: usize, usage: &str) -> Result<&'a str, CommandError> {
    args.get(index)
        .copied()
        .ok_or_else(|| CommandError::InvalidArguments(format!("usage: {}", usage)))
}

fn rest(args: &[&str], from: usize) -> String {
    args.get(from..).map(|tail| tail.join(" ")).unwrap_or_default()
}

/// One-based position typed by the user to a list index.
fn parse_position(raw: &str) -> Result<usize, CommandError> {
    match raw.parse::<usize>() {
        Ok(position) if position >= 1 => Ok(position - 1),
        _ => Err(CommandError::InvalidArguments(format!(
            "`{}` is not a position (1, 2, ...)",
            raw
        ))),
    }
}

fn suggest(input: &str) -> Option<&'static str> {
    COMMANDS
        .iter()
        .map(|(name, _, _)| (levenshtein(name, input), *name))
        .filter(|(distance, _)| *distance <= 3)
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, name)| name)
}
