//! The *Pull Latest* flow.
//!
//! Syncs the user's dev branch with the most recent code, stashing local
//! work across any branch switch and handing post-pull conflicts to the
//! resolver.

use super::{FlowEngine, FlowError, ensure_branch_on, restore_stash_on};
use crate::git::DEFAULT_BRANCH_FILTER;
use crate::ui::LogStyle;

pub(super) fn run(engine: &mut FlowEngine<'_>) -> Result<(), FlowError> {
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
        &format!("Local changes: {}", if state.has_changes { "✓" } else { "✗" }),
    );

    // Phase 2: choose the branch to pull into
    let target_branch = if current_branch == user_branch {
        current_branch.clone()
    } else if engine.policy().auto_switch_branches {
        ui.log(LogStyle::Cyan, "Auto-switching to your branch...");
        user_branch.clone()
    } else {
        let options = vec![
            "Switch to my branch and pull there".to_string(),
            "Pull to current branch".to_string(),
            "Cancel".to_string(),
        ];
        let choice = ui.show_menu(
            &format!("You're in {current_branch}, but your branch is {user_branch}"),
            &options,
            Some(0),
        );
        match choice {
            Some(0) => user_branch.clone(),
            Some(1) => current_branch.clone(),
            _ => return Err(FlowError::UserCancel),
        }
    };

    let mut plan = engine.new_plan();

    // Phase 3: stash → switch → pop, as plan steps
    if target_branch != current_branch {
        engine.check_cancelled()?;

        if state.has_changes {
            let stash_message = format!("auto-stash-pull-to-{target_branch}");
            plan.add(
                "Stash local changes",
                &[&["stash", "push", "-u", "-m", &stash_message]],
                false,
            );
        }
        {
            let repo = engine.repo.clone();
            let branch = target_branch.clone();
            plan.add_callback(
                format!("Switch to your branch: {target_branch}"),
                false,
                Box::new(move |ui| ensure_branch_on(&repo, ui, &branch)),
            );
        }
        if state.has_changes {
            let repo = engine.repo.clone();
            let strategy = engine.settings.conflict_strategy;
            plan.add_callback(
                "Restore local changes",
                false,
                Box::new(move |ui| restore_stash_on(&repo, ui, strategy)),
            );
        }
    }

    // Phase 4: fetch, then decide between plain pull and cross-branch merge
    if engine.settings().auto_fetch {
        plan.add(
            "Fetch latest from remote",
            &[&["fetch", "--all", "--prune"]],
            false,
        );
    }

    engine.check_cancelled()?;
    ui.log(LogStyle::Cyan, "Finding most recent code...");
    if !engine.is_dry_run() {
        // Refresh remote refs so the recency comparison sees the remote;
        // failure is informational, the local view still works
        let _ = engine.repo.run(&["fetch", "--all"]);
    }
    let most_recent = engine.repo.most_recent_branch(DEFAULT_BRANCH_FILTER)?;
    ui.log(LogStyle::White, &format!("Most recent branch: {most_recent}"));

    if most_recent == target_branch {
        // A pull with nothing to pull is dropped from the plan entirely, so
        // a repeat run with no remote change plans zero operations. The
        // probe fetches and compares against HEAD, so it only applies when
        // not switching and not simulating.
        let divergence = if engine.is_dry_run() || target_branch != current_branch {
            crate::git::Divergence {
                behind: 1,
                ..Default::default()
            }
        } else {
            engine.repo.divergence(&target_branch)?
        };
        if divergence.remote_exists && divergence.behind == 0 {
            ui.log(
                LogStyle::Dim,
                &format!("{target_branch} is already up to date with its remote"),
            );
        } else {
            plan.add(
                format!("Pull from remote {target_branch}"),
                &[&["pull", "--no-edit", "origin", &target_branch]],
                false,
            );
        }
    } else {
        let merge_ref = format!("origin/{most_recent}");
        let merge_allowed = engine.policy().auto_merge
            || ui.confirm(&format!("Merge {most_recent} into your branch?"));
        if merge_allowed {
            plan.add(
                format!("Merge {most_recent} into {target_branch}"),
                &[&["merge", "--no-edit", &merge_ref]],
                false,
            );
        } else {
            ui.log(LogStyle::Yellow, "Skipping merge");
        }
    }

    // Phase 5: execute. An empty plan means a second run had nothing left
    // to do - report and stop.
    if plan.is_empty() {
        ui.log(LogStyle::Green, "✓ Already up to date");
        return Ok(());
    }
    engine.check_cancelled()?;
    plan.execute_with_confirmation(ui, true)?;

    if engine.is_dry_run() {
        return Ok(());
    }

    // Phase 6: post-pull conflicts go to the resolver with branch labels
    let resolver = engine.conflict_resolver();
    if resolver.has_conflicts()? {
        ui.log(LogStyle::Yellow, "⚠️  Conflicts detected after pull");
        if !resolver.resolve(Some((&target_branch, &most_recent)))? {
            return Err(FlowError::ConflictPending {
                guidance: "Fix the conflicted files, 'git add' them, and finish the merge with \
                           'git commit' (or abort with 'git merge --abort')."
                    .into(),
            });
        }
        ui.log(LogStyle::Green, "✓ Conflicts resolved");
    }

    // Phase 7: summary
    if let Ok(latest) = engine.repo.run_checked(&["log", "-1", "--oneline"]) {
        ui.log(LogStyle::Green, "✓ Successfully updated to latest code");
        ui.log(LogStyle::Dim, &format!("Latest commit: {}", latest.trim()));
    } else {
        ui.log(LogStyle::Green, "✓ Pull completed");
    }

    Ok(())
}
