use std::fmt;
use std::io::{self, BufRead, IsTerminal};

use rustyline::{
    completion::{Completer, Pair},
    error::ReadlineError,
    highlight::Highlighter,
    hint::Hinter,
    history::DefaultHistory,
    validate::Validator,
    Context as ReadlineContext, Editor, Helper,
};
use shell_words::split;

use crate::cli::output::{self, OutputPreferences};
use crate::cli::session::{CliError, LoopControl, Session, ShellOptions};

/// Commands whose first argument is a field key.
const FIELD_COMMANDS: &[&str] = &["set", "clear", "pick", "other", "check"];

/// Entry point of `catalog_wizard_cli`: parses flags, then reads commands
/// until `exit` or end of input.
///
/// A terminal gets a line editor with history and completion. Piped input,
/// or `CATALOG_WIZARD_CLI_SCRIPT` in the environment, runs as a script.
pub fn run_cli() -> Result<(), CliError> {
    let options = ShellOptions::from_args(std::env::args().skip(1))?;
    output::set_preferences(OutputPreferences {
        plain_mode: options.plain,
        quiet_mode: options.quiet,
    });

    let mut session = Session::start(&options)?;
    let scripted =
        std::env::var_os("CATALOG_WIZARD_CLI_SCRIPT").is_some() || !io::stdin().is_terminal();
    if scripted {
        run_script(&mut session)
    } else {
        run_interactive(&mut session)
    }
}

fn run_interactive(session: &mut Session) -> Result<(), CliError> {
    let mut editor = Editor::<CommandHelper, DefaultHistory>::new()?;
    editor.set_helper(Some(CommandHelper::new(
        session.command_names(),
        session.field_keys(),
    )));
    output::info("Type `help` to list commands, Tab to complete.");

    loop {
        match editor.readline(&session.prompt()) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                editor.add_history_entry(trimmed).ok();
                if handle_line(session, trimmed) == LoopControl::Exit {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => {
                output::info("Line discarded. Type `exit` or press Ctrl-D to leave.");
            }
            Err(ReadlineError::Eof) => {
                output::info("Exiting shell.");
                break;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn run_script(session: &mut Session) -> Result<(), CliError> {
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        if handle_line(session, &line?) == LoopControl::Exit {
            break;
        }
    }
    Ok(())
}

fn handle_line(session: &mut Session, line: &str) -> LoopControl {
    let tokens = match parse_command_line(line) {
        Ok(tokens) => tokens,
        Err(err) => {
            output::warning(err);
            return LoopControl::Continue;
        }
    };
    let Some(raw) = tokens.first() else {
        return LoopControl::Continue;
    };
    if raw.starts_with('#') {
        return LoopControl::Continue;
    }

    let command = raw.to_lowercase();
    let args: Vec<&str> = tokens.iter().skip(1).map(String::as_str).collect();
    tracing::debug!(%command, args = args.len(), "dispatching command");
    match session.dispatch(&command, &args) {
        Ok(control) => control,
        Err(err) => {
            session.report_error(err);
            LoopControl::Continue
        }
    }
}

pub(crate) fn parse_command_line(input: &str) -> Result<Vec<String>, ParseError> {
    split(input).map_err(|err| ParseError {
        message: err.to_string(),
    })
}

#[derive(Debug)]
pub(crate) struct ParseError {
    message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Completes command names on the first word and field keys after
/// field commands.
struct CommandHelper {
    commands: Vec<String>,
    fields: Vec<String>,
}

impl CommandHelper {
    fn new(commands: Vec<&'static str>, fields: Vec<&'static str>) -> Self {
        let sorted = |names: Vec<&'static str>| {
            let mut names: Vec<String> = names.into_iter().map(str::to_string).collect();
            names.sort();
            names.dedup();
            names
        };
        Self {
            commands: sorted(commands),
            fields: sorted(fields),
        }
    }

    fn candidates(&self, line: &str, pos: usize) -> (usize, Vec<String>) {
        let prefix = &line[..pos];
        let start = prefix
            .rfind(char::is_whitespace)
            .map(|idx| idx + 1)
            .unwrap_or(0);
        let needle = prefix[start..].to_ascii_lowercase();
        let previous: Vec<&str> = prefix[..start].split_whitespace().collect();

        let pool = match previous.as_slice() {
            [] => &self.commands,
            [command] if FIELD_COMMANDS.contains(&command.to_ascii_lowercase().as_str()) => {
                &self.fields
            }
            _ => return (start, Vec::new()),
        };
        let matches = pool
            .iter()
            .filter(|name| name.starts_with(&needle))
            .cloned()
            .collect();
        (start, matches)
    }
}

impl Helper for CommandHelper {}

impl Completer for CommandHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &ReadlineContext<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let (start, names) = self.candidates(line, pos);
        let pairs = names
            .into_iter()
            .map(|name| Pair {
                display: name.clone(),
                replacement: name,
            })
            .collect();
        Ok((start, pairs))
    }
}

impl Hinter for CommandHelper {
    type Hint = String;
}

impl Highlighter for CommandHelper {}

impl Validator for CommandHelper {}
