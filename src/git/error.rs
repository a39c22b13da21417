//! Git error types and formatting

use crate::styling::{ERROR_EMOJI, HINT_EMOJI};
use color_print::cformat;

#[derive(Debug)]
pub enum GitError {
    /// A git command exited non-zero. Carries the full argv, exit code and
    /// captured stderr so callers can surface git's own words verbatim.
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
    /// The git binary could not be spawned or its output not collected.
    Io(String),
    /// Output from git could not be parsed
    ParseError(String),
    /// The working directory is not inside a git work tree
    NotARepository,
    /// HEAD is detached; flows refuse to operate
    DetachedHead,
}

impl GitError {
    /// Shorthand for a command failure with no captured process context.
    pub fn message(msg: impl Into<String>) -> Self {
        GitError::Io(msg.into())
    }
}

impl std::fmt::Display for GitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GitError::CommandFailed {
                command,
                code,
                stderr,
            } => {
                let code_str = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
                write!(
                    f,
                    "{}",
                    cformat!("{ERROR_EMOJI} <red>git {command} failed (exit {code_str})</>")
                )?;
                let trimmed = stderr.trim();
                if !trimmed.is_empty() {
                    write!(f, "\n{}", crate::styling::format_with_gutter(trimmed))?;
                }
                Ok(())
            }
            GitError::Io(msg) => {
                write!(f, "{}", cformat!("{ERROR_EMOJI} <red>{msg}</>"))
            }
            GitError::ParseError(msg) => {
                write!(f, "{}", cformat!("{ERROR_EMOJI} <red>{msg}</>"))
            }
            GitError::NotARepository => {
                write!(
                    f,
                    "{}",
                    cformat!(
                        "{ERROR_EMOJI} <red>This operation is only available in git repositories</>"
                    )
                )
            }
            GitError::DetachedHead => {
                write!(
                    f,
                    "{}\n\n{}",
                    cformat!("{ERROR_EMOJI} <red>Not on a branch (detached HEAD)</>"),
                    cformat!("{HINT_EMOJI} <dim>Check out a branch and try again</>")
                )
            }
        }
    }
}

impl std::error::Error for GitError {}

impl From<std::io::Error> for GitError {
    fn from(e: std::io::Error) -> Self {
        GitError::Io(e.to_string())
    }
}
