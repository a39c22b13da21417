//! The *Commit + Push* and *Switch + Commit* flows.
//!
//! The ordering contract when the target branch differs from the current
//! one: stash local modifications, sync the target branch with its remote,
//! then pop the stash - in exactly that order, so the user's changes land
//! on top of an up-to-date branch. A commit is never created while any
//! path still carries conflict markers.

use std::path::PathBuf;

use super::{FlowEngine, FlowError};
use crate::divergence::{self, ResolutionMethod};
use crate::git::{Repository, analyze_push_error, is_protected};
use crate::ui::{HostUi, LogStyle};

/// Caller-supplied inputs for the commit flow.
#[derive(Debug, Clone, Default)]
pub struct CommitOptions {
    /// Commit message (`-c`).
    pub message: Option<String>,
    /// File whose contents become the message verbatim (`-F`).
    pub message_file: Option<PathBuf>,
    /// Target branch; `None` resolves to the user's dev branch or a menu.
    pub target_branch: Option<String>,
    /// Conventional-commit type chosen in a front-end menu, if any.
    pub explicit_type: Option<String>,
}

pub(super) fn run(engine: &mut FlowEngine<'_>, options: CommitOptions) -> Result<(), FlowError> {
    let ui = engine.ui;

    // Phase 1: analyze state
    ui.log(LogStyle::Cyan, "Analyzing repository state...");
    let state = engine.repo.working_tree_state()?;
    let current_branch = state
        .current_branch
        .clone()
        .ok_or(crate::git::GitError::DetachedHead)?;
    let user_branch = engine.user_branch();

    ui.log(LogStyle::White, &format!("Current branch: {current_branch}"));
    ui.log(LogStyle::White, &format!("Your branch: {user_branch}"));
    ui.log(
        LogStyle::White,
        &format!("Changes: {}", if state.has_changes { "✓" } else { "✗" }),
    );

    // Phase 2: conflicts block everything else
    let resolver = engine.conflict_resolver();
    if resolver.has_conflicts()? {
        ui.log(LogStyle::Yellow, "⚠️  Conflicts detected!");
        if engine.policy().auto_resolve_conflicts {
            ui.log(LogStyle::Cyan, "Auto-resolving conflicts...");
        }
        if !resolver.resolve(None)? {
            return Err(FlowError::ConflictPending {
                guidance: "Resolve the conflicted files, 'git add' them, and run the commit again."
                    .into(),
            });
        }
    }

    // Phase 3: pick the target branch
    let target_branch = match &options.target_branch {
        Some(target) => {
            if is_protected(target) {
                ui.log(
                    LogStyle::Yellow,
                    &format!("⚠ Committing directly to protected branch {target}"),
                );
            }
            target.clone()
        }
        None if current_branch == user_branch => current_branch.clone(),
        None if engine.policy().auto_switch_branches => user_branch.clone(),
        None => {
            let menu_options = vec![
                format!("Switch to my branch ({user_branch})"),
                format!("Continue in current branch ({current_branch})"),
                "Cancel".to_string(),
            ];
            let choice = ui.show_menu(
                &format!("You're in {current_branch}, but should commit to {user_branch}"),
                &menu_options,
                Some(0),
            );
            match choice {
                Some(0) => user_branch.clone(),
                Some(1) => current_branch.clone(),
                _ => return Err(FlowError::UserCancel),
            }
        }
    };

    // Phase 4: stash → switch → sync → pop
    let switched_from = if target_branch != current_branch {
        engine.check_cancelled()?;
        if engine.is_dry_run() {
            ui.log(
                LogStyle::Cyan,
                &format!("[dry-run] Would switch from {current_branch} to {target_branch}"),
            );
            None
        } else {
            switch_with_sync(engine, &current_branch, &target_branch, state.has_changes)?;
            Some(current_branch.clone())
        }
    } else {
        None
    };

    // Phase 5: re-probe; the switch may have consumed the changes
    if !engine.is_dry_run() && !engine.repo.has_changes()? {
        ui.log(LogStyle::Yellow, "No changes to commit");
        return Ok(());
    }

    // Phase 6: the commit message
    let commit_message = resolve_message(engine, &options)?;

    // Phase 7: version bump
    if engine.settings().auto_version_bump && !engine.is_dry_run() {
        let explicit = options.explicit_type.clone();
        engine
            .version_bumper()?
            .apply(&commit_message, explicit.as_deref(), ui);
    }

    if engine.is_dry_run() {
        ui.log(
            LogStyle::Cyan,
            &format!("[dry-run] Would stage, commit and push to {target_branch}"),
        );
        ui.log(LogStyle::Dim, &format!("   message: {}", first_line(&commit_message)));
        return Ok(());
    }

    // Phase 8: final conflict gate - a commit is never created over
    // unresolved conflict markers
    let resolver = engine.conflict_resolver();
    if resolver.has_conflicts()? {
        ui.log(LogStyle::Red, "✗ Unresolved conflicts detected!");
        ui.log(LogStyle::Yellow, "Cannot commit with conflict markers in files");
        if !resolver.resolve(None)? {
            return Err(FlowError::ConflictPending {
                guidance: "Edit the conflicted files, remove the <<<<<<< ======= >>>>>>> markers, \
                           'git add' them and run the commit again."
                    .into(),
            });
        }
        ui.log(LogStyle::Green, "✓ Conflicts resolved, continuing...");
    }

    // Phase 9: stage and commit locally, before any remote sync
    ui.log(LogStyle::Cyan, "Staging and committing changes...");
    engine.repo.run_checked(&["add", "-A"])?;
    match commit_with_message(&engine.repo, &commit_message)? {
        CommitOutcome::NothingToCommit => {
            ui.log(LogStyle::Yellow, "⚠ No changes to commit");
            return Ok(());
        }
        CommitOutcome::Created => {
            ui.log(LogStyle::Green, "✓ Changes committed locally");
        }
    }

    // Phase 10: divergence check and sync, then push
    engine.check_cancelled()?;
    sync_and_push(engine, &target_branch)?;

    ui.log(
        LogStyle::Green,
        &format!("✓ Successfully committed and pushed to {target_branch}!"),
    );

    // Phase 11: back to the original branch, kept in sync as a courtesy -
    // failures here are warnings, never fatal
    if let Some(original) = switched_from {
        return_and_sync(engine, &original, &target_branch);
    }

    Ok(())
}

/// Stash-if-dirty, checkout the target (creating it as needed), sync it
/// with its remote, then pop the stash.
fn switch_with_sync(
    engine: &FlowEngine<'_>,
    original_branch: &str,
    target_branch: &str,
    has_changes: bool,
) -> Result<(), FlowError> {
    let ui = engine.ui;
    let repo = &engine.repo;

    ui.log(LogStyle::Cyan, "Preparing branch switch...");
    ui.log(
        LogStyle::Dim,
        &format!("    From: {original_branch} → To: {target_branch}"),
    );

    // Step 1: stash
    let mut stashed = false;
    if has_changes {
        ui.log(LogStyle::Cyan, "Stashing local changes...");
        stashed = repo.stash_push(&format!("auto-stash-commit-to-{target_branch}"))?;
        if stashed {
            ui.log(LogStyle::Green, "✓ Changes stashed");
        }
    }

    // Helper: undo the switch attempt, leaving the user where they started
    let bail_back = |message: String| -> FlowError {
        ui.log(LogStyle::Yellow, &format!("Returning to {original_branch}..."));
        let _ = repo.run(&["checkout", original_branch]);
        if stashed {
            let _ = repo.stash_pop();
            ui.log(LogStyle::Yellow, "Restored stashed changes");
        }
        FlowError::PreconditionFailed(message)
    };

    // Step 2: switch
    ui.log(LogStyle::Cyan, &format!("Switching to branch {target_branch}..."));
    if let Err(e) = engine.ensure_branch_exists(target_branch) {
        return Err(bail_back(format!("Failed to switch to branch {target_branch}: {e}")));
    }
    ui.log(LogStyle::Green, &format!("✓ Switched to {target_branch}"));

    // Step 3: sync the target with its remote BEFORE restoring the stash
    ui.log(LogStyle::Cyan, &format!("Syncing {target_branch} with remote..."));
    let divergence = repo.divergence(target_branch)?;

    if divergence.behind > 0 || divergence.diverged {
        ui.log(
            LogStyle::Cyan,
            &format!("Pulling {} commit(s) from remote...", divergence.behind),
        );
        let rebased = repo.run(&["pull", "--rebase", "origin", target_branch])?.success();
        if rebased {
            ui.log(LogStyle::Green, "✓ Synced with remote");
        } else {
            let _ = repo.run(&["rebase", "--abort"]);
            ui.log(LogStyle::Yellow, "⚠ Rebase failed, trying merge...");

            let merged = repo
                .run(&["pull", "--no-rebase", "origin", target_branch])?
                .success();
            if merged {
                ui.log(LogStyle::Green, "✓ Merged with remote");
            } else if is_protected(target_branch) {
                // Protected branches: the remote is the source of truth,
                // but throwing local commits away needs explicit consent
                let _ = repo.run(&["merge", "--abort"]);
                if engine.confirm_destructive(
                    &format!("Reset {target_branch} to origin/{target_branch}?"),
                    "Local commits on the protected branch will be discarded.",
                ) {
                    divergence::reset_to_remote(repo, ui, target_branch)?;
                } else {
                    return Err(bail_back(format!(
                        "Failed to sync {target_branch} with remote"
                    )));
                }
            } else {
                let _ = repo.run(&["merge", "--abort"]);
                return Err(bail_back(format!(
                    "Failed to sync {target_branch} with remote - please sync manually first"
                )));
            }
        }
    } else {
        ui.log(LogStyle::Green, "✓ Already in sync with remote");
    }

    // Step 4: restore the stash on top of the up-to-date branch
    if stashed {
        engine.restore_stash()?;
    }

    Ok(())
}

fn resolve_message(
    engine: &FlowEngine<'_>,
    options: &CommitOptions,
) -> Result<String, FlowError> {
    if let Some(path) = &options.message_file {
        let message = std::fs::read_to_string(path).map_err(|_| {
            FlowError::PreconditionFailed(format!(
                "Commit message file not found: {}",
                path.display()
            ))
        })?;
        if message.trim().is_empty() {
            return Err(FlowError::PreconditionFailed(
                "Commit message file is empty.".into(),
            ));
        }
        engine.ui.log(
            LogStyle::Cyan,
            &format!("Using commit message from file: {}", path.display()),
        );
        return Ok(message.trim_end().to_string());
    }

    if let Some(message) = &options.message {
        if message.trim().is_empty() {
            return Err(FlowError::PreconditionFailed(
                "Commit message cannot be empty.".into(),
            ));
        }
        return Ok(message.clone());
    }

    match engine.ui.ask_input("Commit message", None) {
        Some(message) if !message.trim().is_empty() => Ok(message),
        _ => Err(FlowError::PreconditionFailed(
            "Commit message cannot be empty.".into(),
        )),
    }
}

pub(super) enum CommitOutcome {
    Created,
    NothingToCommit,
}

/// Create the commit. Messages containing a newline go through a temp file
/// and `-F` so the subject/body split survives verbatim.
pub(super) fn commit_with_message(
    repo: &Repository,
    message: &str,
) -> Result<CommitOutcome, FlowError> {
    let output = if message.contains('\n') {
        let file = tempfile::NamedTempFile::new()
            .map_err(|e| FlowError::Unexpected(format!("could not create temp file: {e}")))?;
        std::fs::write(file.path(), message)
            .map_err(|e| FlowError::Unexpected(format!("could not write temp file: {e}")))?;
        let path = file.path().to_string_lossy().into_owned();
        repo.run(&["commit", "-F", &path])?
    } else {
        repo.run(&["commit", "-m", message])?
    };

    if output.success() {
        return Ok(CommitOutcome::Created);
    }
    if output.error_text().to_lowercase().contains("nothing to commit") {
        return Ok(CommitOutcome::NothingToCommit);
    }
    Err(FlowError::Git(crate::git::GitError::CommandFailed {
        command: "commit".into(),
        code: output.code,
        stderr: output.error_text().to_string(),
    }))
}

/// Divergence-aware push of the current branch.
pub(super) fn sync_and_push(engine: &FlowEngine<'_>, branch: &str) -> Result<(), FlowError> {
    let ui = engine.ui;
    let repo = &engine.repo;

    ui.log(LogStyle::Cyan, "Checking remote status...");
    let divergence = repo.divergence(branch)?;

    if divergence.diverged {
        divergence::report_divergence(ui, &divergence);

        let options = vec![
            "📥 Pull with rebase (RECOMMENDED - clean history)".to_string(),
            "🔀 Pull with merge (keeps both histories)".to_string(),
            "⚠️ Force push (DANGEROUS - overwrites remote!)".to_string(),
            "❌ Cancel and resolve manually".to_string(),
        ];
        let choice = ui.show_menu("How do you want to resolve this divergence?", &options, Some(0));

        let method = match choice {
            Some(0) => ResolutionMethod::Rebase,
            Some(1) => ResolutionMethod::Merge,
            Some(2) => ResolutionMethod::ForcePush,
            _ => {
                ui.log(LogStyle::Yellow, "Operation cancelled");
                ui.log(LogStyle::White, "Your commit is saved locally. To complete:");
                ui.log(LogStyle::White, &format!("  1. git pull --rebase origin {branch}"));
                ui.log(LogStyle::White, "  2. Resolve any conflicts");
                ui.log(LogStyle::White, &format!("  3. git push origin {branch}"));
                return Err(FlowError::DivergencePending {
                    branch: branch.to_string(),
                });
            }
        };

        if method == ResolutionMethod::ForcePush
            && !engine.confirm_destructive(
                &format!("Force push {branch}?"),
                "The remote branch will be overwritten with your local history.",
            )
        {
            return Err(FlowError::DivergencePending {
                branch: branch.to_string(),
            });
        }

        if !divergence::resolve(repo, ui, branch, method)? {
            // Rebase/merge left in progress for the user to finish
            return Err(FlowError::ConflictPending {
                guidance: format!(
                    "Finish the in-progress sync of {branch} (resolve conflicts, then \
                     'git rebase --continue' or 'git commit'), and push."
                ),
            });
        }

        if method == ResolutionMethod::ForcePush {
            return Ok(()); // force-with-lease already updated the remote
        }
    } else if divergence.behind > 0 {
        ui.log(
            LogStyle::Cyan,
            &format!("Your branch is {} commit(s) behind remote", divergence.behind),
        );
        let pull_now = engine.policy().auto_pull
            || ui.confirm(&format!(
                "Pull {} commit(s) from remote before pushing?",
                divergence.behind
            ));
        if pull_now {
            if !divergence::resolve(repo, ui, branch, ResolutionMethod::Rebase)? {
                ui.log(LogStyle::Yellow, "Pull failed, trying merge...");
                if !divergence::resolve(repo, ui, branch, ResolutionMethod::Merge)? {
                    return Err(FlowError::ConflictPending {
                        guidance: format!(
                            "Could not sync with origin/{branch}; resolve the in-progress \
                             operation and push manually."
                        ),
                    });
                }
            }
        }
    }

    push_branch(repo, ui, branch)
}

/// `git push -u origin <branch>` with the shared error diagnosis.
pub(super) fn push_branch(
    repo: &Repository,
    ui: &dyn HostUi,
    branch: &str,
) -> Result<(), FlowError> {
    ui.log(LogStyle::Cyan, "Pushing to remote...");
    let output = repo.run(&["push", "-u", "origin", branch])?;
    if output.success() {
        ui.log(LogStyle::Green, &format!("✓ Pushed to origin/{branch}"));
        return Ok(());
    }

    let error_output = output.error_text().to_string();
    ui.log(LogStyle::Red, &format!("Error: {error_output}"));
    Err(FlowError::PushRejected(analyze_push_error(&error_output, branch)))
}

/// After a switched commit: go back and merge the target in, so the dev
/// branch stays current. Best-effort only.
fn return_and_sync(engine: &FlowEngine<'_>, original: &str, target: &str) {
    let ui = engine.ui;
    let repo = &engine.repo;

    ui.log(LogStyle::Cyan, &format!("Returning to {original}..."));
    if !repo.run(&["checkout", original]).map(|o| o.success()).unwrap_or(false) {
        ui.log(
            LogStyle::Yellow,
            &format!("⚠ Could not return to {original} - still on {target}"),
        );
        return;
    }
    ui.log(LogStyle::Green, &format!("✓ Returned to {original}"));

    ui.log(LogStyle::Cyan, &format!("Syncing {original} with {target}..."));
    let merged = repo
        .run(&["merge", "--no-edit", target])
        .map(|o| o.success())
        .unwrap_or(false);
    if !merged {
        ui.log(
            LogStyle::Yellow,
            &format!("⚠ Could not auto-sync {original} - you can sync later with Pull"),
        );
        let _ = repo.run(&["merge", "--abort"]);
        return;
    }
    ui.log(LogStyle::Green, &format!("✓ {original} is now in sync with {target}"));

    let pushed = repo
        .run(&["push", "-u", "origin", original])
        .map(|o| o.success())
        .unwrap_or(false);
    if pushed {
        ui.log(LogStyle::Green, &format!("✓ {original} pushed to remote"));
    } else {
        ui.log(
            LogStyle::Yellow,
            &format!("⚠ Could not push {original} - you can push later"),
        );
    }
}

fn first_line(message: &str) -> &str {
    message.lines().next().unwrap_or("")
}
