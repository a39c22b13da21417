//! Child-process execution of git commands.
//!
//! One rule everywhere: arguments are argv arrays, never shell strings, and
//! every call runs with the repository path as its working directory.

use std::process::Command;

use super::{GitError, Repository};

/// Captured result of a git invocation.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// stderr if non-empty, else stdout - git spreads errors across both.
    pub fn error_text(&self) -> &str {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        }
    }
}

impl Repository {
    /// Run a git command, capturing exit code and both streams.
    ///
    /// A non-zero exit is NOT an error at this level; callers that treat it
    /// as one use [`Repository::run_checked`]. Only a spawn/IO failure
    /// produces `Err`.
    pub fn run(&self, args: &[&str]) -> Result<CommandOutput, GitError> {
        log::debug!("$ git {}", args.join(" "));

        let output = Command::new("git")
            .args(args)
            .current_dir(self.path())
            .output()
            .map_err(|e| GitError::Io(format!("failed to run git: {e}")))?;

        let result = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !result.success() {
            log::debug!("  ! exit {:?}: {}", result.code, result.error_text());
        }

        Ok(result)
    }

    /// Run a git command, raising a structured error on non-zero exit.
    ///
    /// The error carries the full argv, exit code and captured streams so
    /// git's own message reaches the user verbatim.
    pub fn run_checked(&self, args: &[&str]) -> Result<String, GitError> {
        let output = self.run(args)?;
        if output.success() {
            Ok(output.stdout)
        } else {
            Err(GitError::CommandFailed {
                command: args.join(" "),
                code: output.code,
                stderr: output.error_text().to_string(),
            })
        }
    }

    /// Run a git command and return whether it exited 0.
    ///
    /// For commands that use exit codes as boolean results, like
    /// `git rev-parse --verify` or `git merge-base --is-ancestor`.
    pub fn run_ok(&self, args: &[&str]) -> Result<bool, GitError> {
        Ok(self.run(args)?.success())
    }

    /// Run a git command and return raw stdout bytes.
    ///
    /// Needed for `git show :N:<path>` where the blob may be binary.
    pub fn run_bytes(&self, args: &[&str]) -> Result<Vec<u8>, GitError> {
        log::debug!("$ git {}", args.join(" "));

        let output = Command::new("git")
            .args(args)
            .current_dir(self.path())
            .output()
            .map_err(|e| GitError::Io(format!("failed to run git: {e}")))?;

        if !output.status.success() {
            return Err(GitError::CommandFailed {
                command: args.join(" "),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output.stdout)
    }
}
