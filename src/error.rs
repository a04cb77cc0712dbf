use crate::command::{ExitCode, NOT_FOUND, SYNTAX_ERROR};
use crate::external::LaunchError;
use crate::lexer::LexingError;
use thiserror::Error;

/// Failures that abort a single command and decide its status.
///
/// None of them stop the shell itself.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("syntax error: {0}")]
    Syntax(#[from] LexingError),
    #[error("{0}: command not found")]
    CommandNotFound(String),
    #[error(transparent)]
    Launch(#[from] LaunchError),
}

impl ShellError {
    /// New last status for the failed command; `None` keeps the previous one.
    pub fn status(&self) -> Option<ExitCode> {
        match self {
            ShellError::Syntax(_) => Some(SYNTAX_ERROR),
            ShellError::CommandNotFound(_) => Some(NOT_FOUND),
            ShellError::Launch(err) => err.status(),
        }
    }
}
