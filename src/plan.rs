//! Operation plans: ordered, previewable sequences of atomic git steps.
//!
//! Flows compile intent into a plan, show it to the user (mode permitting),
//! then execute the steps strictly in order. A step is either a list of git
//! argv arrays (treated as one logical step) or a callback for work that
//! cannot be expressed as plain commands (stash-pop with conflict handling,
//! branch bootstrap). Execution stops at the first failure; already-executed
//! steps are not rolled back here - compensation is the flow engine's job.

use crate::git::Repository;
use crate::styling::{ERROR_EMOJI, WARNING_EMOJI};
use crate::ui::{HostUi, LogStyle, PreviewStep};
use color_print::cformat;

/// Why a plan did not run to completion.
#[derive(Debug)]
pub enum PlanError {
    /// Preview declined or confirmation refused.
    Cancelled,
    /// A step failed; execution stopped there.
    StepFailed { description: String, detail: String },
}

impl std::fmt::Display for PlanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanError::Cancelled => {
                write!(f, "{}", cformat!("{WARNING_EMOJI} <yellow>Operation cancelled by user</>"))
            }
            PlanError::StepFailed { description, detail } => {
                write!(
                    f,
                    "{}",
                    cformat!("{ERROR_EMOJI} <red>Step failed: {description}</>")
                )?;
                if !detail.trim().is_empty() {
                    write!(f, "\n{}", crate::styling::format_with_gutter(detail.trim()))?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for PlanError {}

/// Callback form of a step. Receives the host UI for progress reporting.
pub type StepCallback<'a> = Box<dyn FnMut(&dyn HostUi) -> anyhow::Result<()> + Send + 'a>;

/// A single atomic step of a plan.
pub struct Operation<'a> {
    pub description: String,
    /// Argv arrays executed in sequence as one logical step. Empty when a
    /// callback is bound.
    pub commands: Vec<Vec<String>>,
    /// True for anything that rewrites history, force-pushes, discards work
    /// or deletes refs.
    pub destructive: bool,
    callback: Option<StepCallback<'a>>,
    pub executed: bool,
    pub success: bool,
}

impl Operation<'_> {
    /// Readable `git a && git b` rendering for previews.
    pub fn command_preview(&self) -> Option<String> {
        if self.callback.is_some() || self.commands.is_empty() {
            return None;
        }
        Some(
            self.commands
                .iter()
                .map(|argv| format!("$ git {}", argv.join(" ")))
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }
}

/// Ordered collection of operations with preview, confirm, dry-run and
/// execute semantics.
pub struct OperationPlan<'a> {
    repo: &'a Repository,
    operations: Vec<Operation<'a>>,
    pub show_preview: bool,
    pub dry_run: bool,
    /// Render each step's argv in previews (`show_git_commands` setting).
    pub show_commands: bool,
}

impl<'a> OperationPlan<'a> {
    pub fn new(repo: &'a Repository, show_preview: bool, dry_run: bool) -> Self {
        Self {
            repo,
            operations: Vec::new(),
            show_preview,
            dry_run,
            show_commands: true,
        }
    }

    /// Quick variant: no preview, `confirm` always passes. Used in expert
    /// and headless modes.
    pub fn quick(repo: &'a Repository) -> Self {
        Self::new(repo, false, false)
    }

    /// Append a command step. Each element of `commands` is one argv array
    /// (without the leading `git`).
    pub fn add(&mut self, description: impl Into<String>, commands: &[&[&str]], destructive: bool) {
        self.operations.push(Operation {
            description: description.into(),
            commands: commands
                .iter()
                .map(|argv| argv.iter().map(|s| s.to_string()).collect())
                .collect(),
            destructive,
            callback: None,
            executed: false,
            success: false,
        });
    }

    /// Append a callback step; the callback replaces commands entirely.
    pub fn add_callback(
        &mut self,
        description: impl Into<String>,
        destructive: bool,
        callback: StepCallback<'a>,
    ) {
        self.operations.push(Operation {
            description: description.into(),
            commands: Vec::new(),
            destructive,
            callback: Some(callback),
            executed: false,
            success: false,
        });
    }

    pub fn has_destructive(&self) -> bool {
        self.operations.iter().any(|op| op.destructive)
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn clear(&mut self) {
        self.operations.clear();
    }

    fn preview_steps(&self) -> Vec<PreviewStep> {
        self.operations
            .iter()
            .enumerate()
            .map(|(i, op)| PreviewStep {
                index: i + 1,
                description: op.description.clone(),
                command: if self.show_commands {
                    op.command_preview()
                } else {
                    None
                },
                destructive: op.destructive,
            })
            .collect()
    }

    /// Show the preview and ask to proceed. Returns true immediately when
    /// previews are disabled or the plan is empty.
    pub fn confirm(&self, ui: &dyn HostUi) -> bool {
        if !self.show_preview || self.operations.is_empty() {
            return true;
        }
        ui.show_preview(&self.preview_steps(), self.dry_run)
    }

    /// Execute all steps in declared order, stopping at the first failure.
    ///
    /// In dry-run mode each step is rendered as "would execute" and nothing
    /// touches git.
    pub fn execute(&mut self, ui: &dyn HostUi, show_progress: bool) -> Result<(), PlanError> {
        if self.operations.is_empty() {
            return Ok(());
        }

        if self.dry_run {
            ui.log(LogStyle::Yellow, "🔍 Dry-run - simulating operations:");
            let total = self.operations.len();
            for (i, op) in self.operations.iter().enumerate() {
                ui.log(
                    LogStyle::Cyan,
                    &format!("[{}/{total}] Would execute: {}", i + 1, op.description),
                );
                if let Some(preview) = op.command_preview() {
                    ui.log(LogStyle::Dim, &format!("   {preview}"));
                }
            }
            ui.log(LogStyle::Green, "✓ Dry-run completed (nothing was executed)");
            return Ok(());
        }

        let total = self.operations.len();
        if show_progress {
            ui.log(LogStyle::Cyan, &format!("Executing {total} operation(s)..."));
        }

        for i in 0..total {
            if show_progress {
                let description = self.operations[i].description.clone();
                ui.log(LogStyle::Cyan, &format!("[{}/{total}] {description}", i + 1));
            }

            let result = Self::execute_step(self.repo, &mut self.operations[i], ui);
            self.operations[i].executed = true;
            self.operations[i].success = result.is_ok();

            if let Err(detail) = result {
                ui.log(LogStyle::Red, "✗ Operation failed. Stopping execution.");
                return Err(PlanError::StepFailed {
                    description: self.operations[i].description.clone(),
                    detail,
                });
            }

            if show_progress {
                ui.log(LogStyle::Green, "✓ Completed");
            }
        }

        Ok(())
    }

    /// Show preview, confirm, then execute.
    pub fn execute_with_confirmation(
        &mut self,
        ui: &dyn HostUi,
        show_progress: bool,
    ) -> Result<(), PlanError> {
        if !self.confirm(ui) {
            return Err(PlanError::Cancelled);
        }
        self.execute(ui, show_progress)
    }

    fn execute_step(
        repo: &Repository,
        op: &mut Operation<'_>,
        ui: &dyn HostUi,
    ) -> Result<(), String> {
        if let Some(callback) = op.callback.as_mut() {
            return callback(ui).map_err(|e| e.to_string());
        }

        for argv in &op.commands {
            let args: Vec<&str> = argv.iter().map(String::as_str).collect();
            let output = repo.run(&args).map_err(|e| e.to_string())?;
            if !output.success() {
                return Err(output.error_text().to_string());
            }
            let stdout = output.stdout.trim();
            if !stdout.is_empty() {
                ui.log(LogStyle::Dim, stdout);
            }
        }
        Ok(())
    }
}
