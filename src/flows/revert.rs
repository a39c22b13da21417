//! The *Revert Commit* flow.
//!
//! Restricted to the user's own dev branch or `main`. On `main` only the
//! non-destructive *revert* method is offered; *reset* rewrites history and
//! force-pushes only after explicit confirmation.

use super::{FlowEngine, FlowError, commit};
use crate::git::CommitInfo;
use crate::ui::LogStyle;

/// How many recent commits the picker offers.
const COMMIT_PICKER_DEPTH: usize = 10;

/// How a commit is undone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum RevertMethod {
    /// Restore the commit's tree as a new commit; history is preserved.
    Revert,
    /// `git reset --hard`; commits after the target leave history.
    Reset,
}

pub(super) fn run(engine: &mut FlowEngine<'_>) -> Result<(), FlowError> {
    let ui = engine.ui;

    let current_branch = engine.repo.require_branch()?;
    let user_branch = engine.user_branch();

    if current_branch != "main" && current_branch != user_branch {
        return Err(FlowError::PreconditionFailed(format!(
            "You can only revert commits on your own branch ({user_branch}) or main branch."
        )));
    }

    // Method selection: main is shared, so only the safe method is offered
    let method = if current_branch == "main" {
        ui.log(
            LogStyle::Cyan,
            "Main branch detected - only revert method available (safer for shared branch)",
        );
        RevertMethod::Revert
    } else {
        let options = vec![
            "Revert (keep history)".to_string(),
            "Reset (remove from history)".to_string(),
            "Back".to_string(),
        ];
        match ui.show_menu(
            &format!("Branch: {current_branch} - Select revert method"),
            &options,
            Some(0),
        ) {
            Some(0) => RevertMethod::Revert,
            Some(1) => RevertMethod::Reset,
            _ => return Err(FlowError::UserCancel),
        }
    };

    // Commit picker
    let commits = engine.repo.recent_commits(COMMIT_PICKER_DEPTH)?;
    if commits.is_empty() {
        ui.log(LogStyle::Yellow, "No commits found to revert.");
        return Ok(());
    }

    let mut options: Vec<String> = commits.iter().map(format_commit_option).collect();
    options.push("Back".to_string());
    let choice = ui.show_menu(
        &format!("Select commit to revert ({method})"),
        &options,
        None,
    );
    let selected = match choice {
        Some(index) if index < commits.len() => &commits[index],
        _ => return Err(FlowError::UserCancel),
    };

    show_preview(engine, selected, method)?;

    if !ui.confirm(&format!("Do you want to proceed with this {method}?")) {
        return Err(FlowError::UserCancel);
    }

    if engine.is_dry_run() {
        ui.log(
            LogStyle::Cyan,
            &format!("[dry-run] Would {method} to commit {}", short(&selected.sha)),
        );
        return Ok(());
    }

    let result = match method {
        RevertMethod::Revert => execute_revert(engine, selected, &current_branch),
        RevertMethod::Reset => execute_reset(engine, selected, &current_branch),
    };

    if result.is_err() {
        // Idempotent cleanup: a no-op when nothing is in progress
        let _ = engine.repo.run(&["revert", "--abort"]);
        let _ = engine.repo.run(&["reset"]);
    }
    result
}

fn format_commit_option(commit: &CommitInfo) -> String {
    // Subjects are arbitrary UTF-8 (emoji prefixes are common); truncate on
    // char boundaries, never byte offsets
    let subject = if commit.subject.chars().count() > 60 {
        let truncated: String = commit.subject.chars().take(60).collect();
        format!("{truncated}...")
    } else {
        commit.subject.clone()
    };
    format!(
        "{} - {} - {}\n    {subject}",
        short(&commit.sha),
        commit.author,
        commit.date
    )
}

fn show_preview(
    engine: &FlowEngine<'_>,
    commit: &CommitInfo,
    method: RevertMethod,
) -> Result<(), FlowError> {
    let ui = engine.ui;
    let current = engine.repo.short_head_sha()?;

    ui.log(LogStyle::Cyan, "Revert Preview");
    ui.log(LogStyle::White, &format!("  Target Commit: {}", short(&commit.sha)));
    ui.log(LogStyle::White, &format!("  Author:        {}", commit.author));
    ui.log(LogStyle::White, &format!("  Date:          {}", commit.date));
    ui.log(LogStyle::White, &format!("  Message:       {}", commit.subject));
    ui.log(LogStyle::White, &format!("  Method:        {}", method.to_string().to_uppercase()));

    match method {
        RevertMethod::Revert => {
            ui.log(
                LogStyle::White,
                "  Result:        Code will be restored to this commit's exact state",
            );
            ui.log(
                LogStyle::White,
                "  History:       All commits remain in history (non-destructive)",
            );
            ui.log(
                LogStyle::White,
                &format!("  Current Code:  From {current} → To {}", short(&commit.sha)),
            );

            // Which files change if we restore that state
            if let Ok(diff) = engine
                .repo
                .run_checked(&["diff", "--name-status", &commit.sha, "HEAD"])
            {
                let lines: Vec<&str> = diff.lines().filter(|l| !l.trim().is_empty()).collect();
                if lines.is_empty() {
                    ui.log(
                        LogStyle::Yellow,
                        "No differences detected - code is already at target state",
                    );
                } else {
                    ui.log(LogStyle::Cyan, "Files that will be restored to target state:");
                    for line in lines.iter().take(10) {
                        let status = match line.chars().next() {
                            Some('M') => "Modified",
                            Some('A') => "Added",
                            Some('D') => "Deleted",
                            _ => "Changed",
                        };
                        let name = line.get(2..).unwrap_or("").trim();
                        ui.log(LogStyle::White, &format!("  {status}: {name}"));
                    }
                    if lines.len() > 10 {
                        ui.log(LogStyle::Yellow, &format!("  ... and {} more files", lines.len() - 10));
                    }
                }
            }
        }
        RevertMethod::Reset => {
            ui.log(
                LogStyle::White,
                "  Result:        Repository will be reset to this commit",
            );
            ui.log(
                LogStyle::White,
                "  History:       Commits after this will be removed from history",
            );
        }
    }
    Ok(())
}

/// Restore the target commit's tree as a new commit; push only when the
/// original commit was already on the remote.
fn execute_revert(
    engine: &FlowEngine<'_>,
    commit: &CommitInfo,
    branch: &str,
) -> Result<(), FlowError> {
    let ui = engine.ui;
    let repo = &engine.repo;

    let remote_exists = repo.commit_in_remote(&commit.sha);
    ui.log(
        LogStyle::Cyan,
        &format!("Executing revert for commit {}...", short(&commit.sha)),
    );

    ui.log(LogStyle::Cyan, "Restoring code state from selected commit...");
    repo.run_checked(&["checkout", &commit.sha, "--", "."])?;

    ui.log(LogStyle::Cyan, "Staging restored files...");
    repo.run_checked(&["add", "."])?;

    if !repo.has_changes()? {
        ui.log(LogStyle::Yellow, "No changes detected - code is already at selected state");
        return Ok(());
    }

    let message = format!(
        "Revert to: {}\n\nThis restores the complete state from commit {}.",
        commit.subject,
        short(&commit.sha)
    );
    ui.log(LogStyle::Cyan, "Creating revert commit...");
    commit::commit_with_message(repo, &message)?;

    ui.log(
        LogStyle::Green,
        "Revert completed successfully - code restored to selected commit state",
    );

    if !remote_exists {
        ui.log(LogStyle::Green, "Revert completed (commit was only local)");
        return Ok(());
    }

    ui.log(LogStyle::Cyan, "Pushing revert changes...");
    let output = repo.run(&["push", "origin", branch])?;
    if !output.success() {
        return Err(FlowError::PushRejected(crate::git::analyze_push_error(
            output.error_text(),
            branch,
        )));
    }
    ui.log(LogStyle::Green, "Revert changes pushed successfully");
    Ok(())
}

/// Hard-reset to the target; force-push only with explicit confirmation.
fn execute_reset(
    engine: &FlowEngine<'_>,
    commit: &CommitInfo,
    branch: &str,
) -> Result<(), FlowError> {
    let ui = engine.ui;
    let repo = &engine.repo;

    let remote_exists = repo.commit_in_remote(&commit.sha);
    ui.log(LogStyle::Cyan, "Resetting to previous commit...");
    repo.run_checked(&["reset", "--hard", &commit.sha])?;

    if !remote_exists {
        ui.log(LogStyle::Green, "Reset completed (commit was only local)");
        return Ok(());
    }

    ui.log(LogStyle::Yellow, "Commit exists in remote - force push required");
    if !engine.confirm_destructive(
        "Force push the reset branch?",
        "This will force push and rewrite remote history.",
    ) {
        ui.log(LogStyle::Yellow, "Reset completed locally only (remote unchanged)");
        return Ok(());
    }

    ui.log(LogStyle::Cyan, "Force pushing changes...");
    let output = repo.run(&["push", "--force", "origin", branch])?;
    if !output.success() {
        return Err(FlowError::PushRejected(crate::git::analyze_push_error(
            output.error_text(),
            branch,
        )));
    }
    ui.log(LogStyle::Green, "Reset completed and force pushed");
    Ok(())
}

fn short(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_display() {
        assert_eq!(RevertMethod::Revert.to_string(), "revert");
        assert_eq!(RevertMethod::Reset.to_string(), "reset");
    }

    #[test]
    fn test_format_commit_option_truncates_subject() {
        let commit = CommitInfo {
            sha: "0123456789abcdef".into(),
            author: "Alice".into(),
            date: "2025-06-01".into(),
            subject: "x".repeat(80),
        };
        let option = format_commit_option(&commit);
        assert!(option.starts_with("0123456"));
        assert!(option.contains("..."));
        assert!(option.contains("Alice"));
    }

    #[test]
    fn test_format_commit_option_truncates_on_char_boundaries() {
        // A multi-byte codepoint straddling the cut must not panic
        let commit = CommitInfo {
            sha: "0123456789abcdef".into(),
            author: "Alice".into(),
            date: "2025-06-01".into(),
            subject: "🐛".repeat(70),
        };
        let option = format_commit_option(&commit);
        assert!(option.ends_with("..."));
        assert_eq!(option.chars().filter(|c| *c == '🐛').count(), 60);

        // Exactly at the limit: no truncation
        let short_subject = CommitInfo {
            subject: "🐛".repeat(60),
            ..commit
        };
        let option = format_commit_option(&short_subject);
        assert!(!option.ends_with("..."));
    }
}
