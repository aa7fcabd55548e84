//! Line-oriented shell driving a survey session from stdin.

pub mod output;
pub mod session;
mod shell;

pub use session::{CliError, CommandError, Session, ShellOptions};
pub use shell::run_cli;
