//! Maintenance operations: undo, branch cleanup, forge housekeeping, and
//! pull-request creation with optional auto-merge.

use super::{FlowEngine, FlowError};
use crate::forge::MergeReadiness;
use crate::ui::LogStyle;

/// `git reset HEAD~1` - the last commit's changes come back to the
/// working tree.
pub(super) fn undo_last_commit(engine: &mut FlowEngine<'_>) -> Result<(), FlowError> {
    let ui = engine.ui;
    ui.log(LogStyle::Cyan, "Undoing last commit...");
    if engine.is_dry_run() {
        ui.log(LogStyle::Cyan, "[dry-run] Would run: git reset HEAD~1");
        return Ok(());
    }
    engine.repo.run_checked(&["reset", "HEAD~1"])?;
    ui.log(LogStyle::Green, "✓ Last commit undone successfully");
    ui.log(LogStyle::White, "Your changes are now in the working directory");
    Ok(())
}

/// Delete local and remote branches outside the protected set: `main`,
/// `master`, `dev`, and the newest `dev-*` branch.
pub(super) fn cleanup_old_branches(engine: &mut FlowEngine<'_>) -> Result<(), FlowError> {
    let ui = engine.ui;
    let repo = &engine.repo;

    ui.log(LogStyle::Cyan, "Getting branch list...");
    if engine.is_dry_run() {
        ui.log(LogStyle::Cyan, "[dry-run] Would prune merged dev branches");
        return Ok(());
    }
    repo.run_checked(&["fetch", "--all", "--prune"])?;

    let local: Vec<String> = repo
        .run_checked(&["branch", "--format=%(refname:short)"])?
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_owned)
        .collect();
    let remote: Vec<String> = repo
        .run_checked(&["branch", "-r", "--format=%(refname:short)"])?
        .lines()
        .filter_map(|l| l.trim().strip_prefix("origin/"))
        .filter(|l| !l.is_empty() && *l != "HEAD")
        .map(str::to_owned)
        .collect();

    let mut keep: Vec<String> = vec!["main".into(), "master".into(), "dev".into()];
    // The newest dev-* branch stays; name order matches recency for the
    // date-stamped scheme
    let mut dev_branches: Vec<&String> = local
        .iter()
        .chain(remote.iter())
        .filter(|b| b.starts_with("dev-"))
        .collect();
    dev_branches.sort();
    if let Some(newest) = dev_branches.last() {
        keep.push((*newest).clone());
        if dev_branches.len() > 1 {
            ui.log(
                LogStyle::Yellow,
                &format!("Keeping only the most recent dev branch: {newest}"),
            );
        }
    }

    let doomed_local: Vec<&String> = local.iter().filter(|b| !keep.contains(*b)).collect();
    let doomed_remote: Vec<&String> = remote.iter().filter(|b| !keep.contains(*b)).collect();

    if doomed_local.is_empty() && doomed_remote.is_empty() {
        ui.log(LogStyle::Green, "No branches to clean up.");
        return Ok(());
    }

    if !engine.confirm_destructive(
        "Delete old branches?",
        &format!(
            "{} local and {} remote branch(es) will be deleted.",
            doomed_local.len(),
            doomed_remote.len()
        ),
    ) {
        return Err(FlowError::UserCancel);
    }

    for branch in doomed_local {
        ui.log(LogStyle::Yellow, &format!("Removing local branch: {branch}"));
        // Can't delete the branch we're standing on
        if repo.current_branch()?.as_deref() == Some(branch.as_str()) {
            let fallback = if local.iter().any(|b| b == "main") { "main" } else { "master" };
            repo.run_checked(&["checkout", fallback])?;
        }
        if let Err(e) = repo.run_checked(&["branch", "-D", branch]) {
            ui.log(LogStyle::Red, &format!("Error removing local branch {branch}: {e}"));
        }
    }

    for branch in doomed_remote {
        ui.log(LogStyle::Yellow, &format!("Removing remote branch: {branch}"));
        if let Err(e) = repo.run_checked(&["push", "origin", "--delete", branch]) {
            ui.log(LogStyle::Red, &format!("Error removing remote branch {branch}: {e}"));
        }
    }

    ui.log(LogStyle::Green, "Branch cleanup completed successfully!");
    Ok(())
}

pub(super) fn clean_workflow_runs(
    engine: &mut FlowEngine<'_>,
    status: &str,
) -> Result<usize, FlowError> {
    if engine.is_dry_run() {
        engine
            .ui
            .log(LogStyle::Cyan, "[dry-run] Would delete workflow runs");
        return Ok(0);
    }
    let repo_name = engine.repo.owner_slash_name()?;
    let client = engine.forge_client()?;
    Ok(client.clean_workflow_runs(&repo_name, status, engine.ui)?)
}

pub(super) fn clean_all_tags(engine: &mut FlowEngine<'_>) -> Result<usize, FlowError> {
    if engine.is_dry_run() {
        engine.ui.log(LogStyle::Cyan, "[dry-run] Would delete tags");
        return Ok(0);
    }
    let repo_name = engine.repo.owner_slash_name()?;
    if !engine.confirm_destructive(
        "Delete ALL tags?",
        &format!("Every tag in {repo_name} will be removed."),
    ) {
        return Err(FlowError::UserCancel);
    }
    let client = engine.forge_client()?;
    Ok(client.clean_all_tags(&repo_name, engine.ui)?)
}

/// Create a PR from `source` into `target` and, when asked, merge it once
/// the forge reports it mergeable. Returns the PR URL; on any merge
/// problem the PR is left open for manual resolution.
pub(super) fn create_pull_request(
    engine: &mut FlowEngine<'_>,
    source: &str,
    target: &str,
    auto_merge: bool,
) -> Result<String, FlowError> {
    let ui = engine.ui;
    let repo_name = engine.repo.owner_slash_name()?;

    if engine.is_dry_run() {
        ui.log(
            LogStyle::Cyan,
            &format!("[dry-run] Would create PR {source} → {target}"),
        );
        return Ok(String::new());
    }

    ui.log(
        LogStyle::Cyan,
        &format!("Creating pull request: {source} → {target}"),
    );

    // Reconcile the source branch with the target first, so the PR opens
    // mergeable whenever possible
    if auto_merge && !sync_source_with_target(engine, source, target)? {
        ui.log(
            LogStyle::Yellow,
            "Warning: could not resolve conflicts automatically, creating PR anyway...",
        );
    }

    let client = engine.forge_client()?;
    let pr = client.create_pull_request(
        &repo_name,
        source,
        target,
        &format!("Merge {source} into {target}"),
        "Automated PR created by pkgflow.",
    )?;
    ui.log(
        LogStyle::Green,
        &format!("Pull request created successfully: {}", pr.html_url),
    );

    if !auto_merge {
        return Ok(pr.html_url);
    }

    ui.log(LogStyle::Cyan, "Starting auto-merge process...");
    engine.check_cancelled()?;
    match client.wait_for_mergeable(&repo_name, pr.number, ui)? {
        MergeReadiness::Ready => {
            let sha = client.merge_pull_request(
                &repo_name,
                pr.number,
                &format!("Auto-merge: {source} → {target}"),
                "Automated merge performed by pkgflow.",
            )?;
            ui.log(LogStyle::Green, "AUTO-MERGE COMPLETED SUCCESSFULLY!");
            if !sha.is_empty() {
                let short_sha = sha.get(..7).unwrap_or(&sha);
                ui.log(LogStyle::Green, &format!("Merge SHA: {short_sha}"));
            }
        }
        MergeReadiness::Dirty => {
            ui.log(LogStyle::Red, "PR has conflicts");
            ui.log(LogStyle::Yellow, "PR created but must be merged manually");
            ui.log(LogStyle::White, &pr.html_url);
        }
        MergeReadiness::Timeout { last_state } => {
            ui.log(
                LogStyle::Yellow,
                &format!("PR not ready for merge (state: {last_state})"),
            );
            ui.log(LogStyle::Yellow, "PR created but must be merged manually");
            ui.log(LogStyle::White, &pr.html_url);
        }
    }

    Ok(pr.html_url)
}

/// Bring `source` up to date with `target` before opening a PR: merge
/// `origin/<target>` into the source branch, escalating from a plain merge
/// to `-Xours`, then push. Preserves uncommitted work in a stash and
/// returns to the original branch.
fn sync_source_with_target(
    engine: &FlowEngine<'_>,
    source: &str,
    target: &str,
) -> Result<bool, FlowError> {
    let ui = engine.ui;
    let repo = &engine.repo;

    ui.log(LogStyle::Cyan, "Resolving possible conflicts before merge...");

    let original_branch = repo.current_branch()?;
    let stashed = if repo.has_changes()? {
        ui.log(LogStyle::Cyan, "Backing up local changes...");
        repo.stash_push("auto-backup-before-conflict-resolution")?
    } else {
        false
    };

    let restore = |success: bool| -> Result<bool, FlowError> {
        if let Some(branch) = &original_branch
            && branch != source
        {
            let _ = repo.run(&["checkout", branch]);
        }
        if stashed {
            ui.log(LogStyle::Cyan, "Restoring local changes...");
            let _ = repo.stash_pop();
        }
        Ok(success)
    };

    let sync: Result<bool, FlowError> = (|| {
        ui.log(LogStyle::Cyan, "Updating remote references...");
        repo.run_checked(&["fetch", "--all"])?;

        ui.log(LogStyle::Cyan, &format!("Switching to branch {source}..."));
        repo.run_checked(&["checkout", source])?;
        repo.run_checked(&["pull", "origin", source])?;

        ui.log(LogStyle::Cyan, &format!("Merging {target} into {source}..."));
        let target_ref = format!("origin/{target}");
        if repo.run(&["merge", "--no-edit", &target_ref])?.success() {
            ui.log(LogStyle::Green, "Merge completed without conflicts!");
        } else {
            ui.log(LogStyle::Yellow, "Conflicts detected, resolving automatically...");
            let _ = repo.run(&["merge", "--abort"]);
            // Favor the source branch: its changes are the point of the PR
            let merged = repo
                .run(&["merge", "--strategy-option=ours", "--no-edit", &target_ref])?
                .success();
            if !merged {
                let _ = repo.run(&["merge", "--abort"]);
                ui.log(LogStyle::Red, "Could not resolve conflicts automatically");
                return Ok(false);
            }
        }

        ui.log(LogStyle::Cyan, "Pushing resolved branch...");
        repo.run_checked(&["push", "origin", source])?;
        Ok(true)
    })();

    match sync {
        Ok(success) => restore(success),
        Err(e) => {
            let _ = restore(false);
            Err(e)
        }
    }
}
