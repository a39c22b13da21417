//! Divergence resolution: rebase, merge, or force-push under explicit
//! user intent.

use crate::git::{Divergence, GitError, Repository, is_protected};
use crate::ui::{HostUi, LogStyle};

/// How to reconcile a local branch with its remote counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ResolutionMethod {
    /// `git pull --rebase origin <branch>` - local commits replayed on top.
    Rebase,
    /// `git pull --no-rebase origin <branch>` - merge commit keeps both
    /// histories.
    Merge,
    /// `git push --force-with-lease origin <branch>` - remote is
    /// overwritten unless it moved since the last fetch.
    ForcePush,
}

/// Render a divergence for the user: counts plus a bounded commit list
/// per side.
pub fn report_divergence(ui: &dyn HostUi, divergence: &Divergence) {
    ui.log(LogStyle::Yellow, "⚠️ Your branch has diverged from remote!");
    ui.log(
        LogStyle::White,
        &format!("   Local: {} commit(s) ahead", divergence.ahead),
    );
    ui.log(
        LogStyle::White,
        &format!("   Remote: {} commit(s) behind", divergence.behind),
    );

    if !divergence.local_commits.is_empty() {
        ui.log(LogStyle::Cyan, "   Your local commits:");
        for commit in &divergence.local_commits {
            let sha = commit.sha.get(..7).unwrap_or(&commit.sha);
            ui.log(LogStyle::White, &format!("     • {sha} {}", commit.subject));
        }
        if divergence.ahead > divergence.local_commits.len() {
            ui.log(
                LogStyle::Dim,
                &format!("     ... and {} more", divergence.ahead - divergence.local_commits.len()),
            );
        }
    }
    if !divergence.remote_commits.is_empty() {
        ui.log(LogStyle::Cyan, "   Remote commits (not in local):");
        for commit in &divergence.remote_commits {
            let sha = commit.sha.get(..7).unwrap_or(&commit.sha);
            ui.log(LogStyle::White, &format!("     • {sha} {}", commit.subject));
        }
        if divergence.behind > divergence.remote_commits.len() {
            ui.log(
                LogStyle::Dim,
                &format!(
                    "     ... and {} more",
                    divergence.behind - divergence.remote_commits.len()
                ),
            );
        }
    }
}

/// Apply a resolution method to `branch`.
///
/// Returns `Ok(false)` when the operation hit conflicts: the rebase/merge is
/// left in progress for the caller to resolve, never aborted here.
pub fn resolve(
    repo: &Repository,
    ui: &dyn HostUi,
    branch: &str,
    method: ResolutionMethod,
) -> Result<bool, GitError> {
    match method {
        ResolutionMethod::Rebase => {
            ui.log(LogStyle::Cyan, "Pulling with rebase...");
            let output = repo.run(&["pull", "--rebase", "origin", branch])?;
            if !output.success() {
                if mentions_conflict(output.error_text()) {
                    ui.log(LogStyle::Yellow, "⚠️ Rebase conflicts detected!");
                    ui.log(LogStyle::White, "Resolve conflicts in the marked files, then:");
                    ui.log(LogStyle::White, "  1. Edit files to resolve conflicts");
                    ui.log(LogStyle::White, "  2. git add <resolved-files>");
                    ui.log(LogStyle::White, "  3. git rebase --continue");
                    ui.log(LogStyle::White, "Or abort with: git rebase --abort");
                } else {
                    ui.log(
                        LogStyle::Red,
                        &format!("Rebase failed: {}", output.error_text()),
                    );
                }
                return Ok(false);
            }
            ui.log(LogStyle::Green, "✓ Rebase successful");
            Ok(true)
        }
        ResolutionMethod::Merge => {
            ui.log(LogStyle::Cyan, "Pulling with merge...");
            let output = repo.run(&["pull", "--no-rebase", "origin", branch])?;
            if !output.success() {
                if mentions_conflict(output.error_text()) {
                    ui.log(LogStyle::Yellow, "⚠️ Merge conflicts detected!");
                    ui.log(LogStyle::White, "Resolve conflicts in the marked files, then:");
                    ui.log(LogStyle::White, "  1. Edit files to resolve conflicts");
                    ui.log(LogStyle::White, "  2. git add <resolved-files>");
                    ui.log(LogStyle::White, "  3. git commit");
                    ui.log(LogStyle::White, "Or abort with: git merge --abort");
                } else {
                    ui.log(
                        LogStyle::Red,
                        &format!("Merge failed: {}", output.error_text()),
                    );
                }
                return Ok(false);
            }
            ui.log(LogStyle::Green, "✓ Merge successful");
            Ok(true)
        }
        ResolutionMethod::ForcePush => {
            ui.log(LogStyle::Yellow, "⚠️ Force pushing (this overwrites remote!)...");
            let output = repo.run(&["push", "--force-with-lease", "origin", branch])?;
            if !output.success() {
                // No conflicts possible; rejection means the remote advanced
                ui.log(
                    LogStyle::Red,
                    &format!("Force push failed: {}", output.error_text()),
                );
                return Ok(false);
            }
            ui.log(LogStyle::Green, "✓ Force push successful");
            Ok(true)
        }
    }
}

/// `git reset --hard origin/<branch>` - remote is the source of truth.
///
/// Only valid for protected branches carrying non-committed local drift;
/// always destructive, the caller must have confirmed.
pub fn reset_to_remote(repo: &Repository, ui: &dyn HostUi, branch: &str) -> Result<(), GitError> {
    debug_assert!(is_protected(branch));
    ui.log(
        LogStyle::Yellow,
        &format!("⚠ Local {branch} diverged from remote - resetting to remote version"),
    );
    repo.run_checked(&["reset", "--hard", &format!("origin/{branch}")])?;
    ui.log(LogStyle::Green, &format!("✓ {branch} reset to origin/{branch}"));
    Ok(())
}

fn mentions_conflict(text: &str) -> bool {
    text.to_lowercase().contains("conflict")
}
