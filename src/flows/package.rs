//! The *Commit + Generate Package* flow.
//!
//! Commits outstanding work, lands it on the branch the repo type builds
//! from (the user's dev branch for testing, `main` for stable/extra), and
//! dispatches the CI workflow - only after the local push has succeeded.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use super::{CommitOptions, FlowEngine, FlowError, commit};
use crate::forge::{DispatchRequest, RepoType};
use crate::git::GitError;
use crate::ui::LogStyle;

static PKGNAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"pkgname\s*=\s*['"]?([^'"\n]+)['"]?"#).expect("static regex"));

/// Caller-supplied inputs for the build flow.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub commit_message: Option<String>,
    /// Open a tmate debug session in the workflow run.
    pub tmate: bool,
}

pub(super) fn run(
    engine: &mut FlowEngine<'_>,
    repo_type: RepoType,
    options: BuildOptions,
) -> Result<(), FlowError> {
    if repo_type == RepoType::Aur {
        return Err(FlowError::PreconditionFailed(
            "AUR packages are built with the dedicated AUR flow.".into(),
        ));
    }
    let ui = engine.ui;

    if !engine.settings().package_features_enabled {
        return Err(FlowError::PreconditionFailed(
            "Package features are disabled. Enable 'package_features_enabled' in the settings file."
                .into(),
        ));
    }

    if engine.is_dry_run() {
        ui.log(LogStyle::Yellow, "🔍 Dry-run - package generation simulation:");
        ui.log(LogStyle::Cyan, "Would perform:");
        ui.log(LogStyle::Cyan, "  1. Commit changes (if any)");
        ui.log(
            LogStyle::Cyan,
            &format!("  2. Merge to main (if {repo_type} = stable/extra)"),
        );
        ui.log(LogStyle::Cyan, "  3. Trigger the build workflow");
        ui.log(LogStyle::Cyan, &format!("     - Package type: {repo_type}"));
        ui.log(
            LogStyle::Cyan,
            &format!("     - TMATE: {}", if options.tmate { "enabled" } else { "disabled" }),
        );
        ui.log(LogStyle::Green, "✓ Dry-run completed (no workflow triggered)");
        return Ok(());
    }

    // Phase 1: recover from any interrupted operation before planning
    cleanup_interrupted_state(engine)?;

    // Phase 2: make sure the shared dev branch exists
    ensure_dev_branch(engine)?;

    // Phase 3: refresh remote refs
    ui.log(LogStyle::Cyan, "Fetching latest updates from remote...");
    if !engine.repo.run(&["fetch", "--all"])?.success() {
        ui.log(
            LogStyle::Yellow,
            "Warning: failed to fetch latest changes, continuing with local code.",
        );
    }

    // Phase 4: commit outstanding work to the user's dev branch
    engine.check_cancelled()?;
    let user_branch = engine.user_branch();
    if engine.repo.has_changes()? {
        ui.log(LogStyle::Cyan, "STEP 1: Commit Changes");
        commit::run(
            engine,
            CommitOptions {
                message: options.commit_message.clone(),
                target_branch: Some(user_branch.clone()),
                ..Default::default()
            },
        )?;
        ui.log(LogStyle::Green, "✓ Commit completed successfully");
    } else {
        ui.log(LogStyle::Cyan, "No changes to commit, proceeding with package generation");
    }

    // Phase 5: land the build branch
    let source_branch = engine.repo.require_branch()?;
    let working_branch = if repo_type.builds_from_main() {
        if source_branch != "main" {
            ui.log(LogStyle::Cyan, "STEP 2: Merge to Main");
            let proceed = engine.policy().auto_merge
                || ui.confirm(&format!(
                    "Merge {source_branch} to main for {repo_type} package?"
                ));
            if !proceed {
                ui.log(LogStyle::Yellow, "Cancelled merge to main");
                return Err(FlowError::UserCancel);
            }
            merge_to_main(engine, &source_branch)?;
            ui.log(LogStyle::Green, "✓ Successfully merged to main");
        }
        "main".to_string()
    } else {
        user_branch.clone()
    };

    // Phase 6: the package being built
    let package_name = read_package_name(&engine.repo.repo_root()?)?;

    // Phase 7: the branch reference the workflow builds from
    let workflow_branch =
        compute_workflow_branch(engine, repo_type, &working_branch, &source_branch)?;

    // Phase 8: summary and final gate
    let organization = engine.organization();
    let workflow_repo = engine.settings().workflow_repository_for(&organization);
    let source_repo = engine.repo.owner_slash_name()?;

    ui.log(LogStyle::Cyan, "STEP 3: Package Build Summary");
    ui.log(LogStyle::White, &format!("  Organization:    {organization}"));
    ui.log(LogStyle::White, &format!("  Package Name:    {package_name}"));
    ui.log(LogStyle::White, &format!("  Repository Type: {repo_type}"));
    ui.log(LogStyle::White, &format!("  Workflow Branch: {workflow_branch}"));
    ui.log(LogStyle::White, &format!("  Repository:      {source_repo}"));
    ui.log(
        LogStyle::White,
        &format!("  TMATE Debug:     {}", if options.tmate { "✓" } else { "✗" }),
    );

    if (engine.policy().confirm_destructive || engine.policy().show_preview)
        && !ui.confirm("🚀 Trigger package build on GitHub Actions?")
    {
        ui.log(LogStyle::Red, "Package build cancelled");
        return Err(FlowError::UserCancel);
    }

    // Phase 9: dispatch - the local pushes above have already succeeded
    engine.check_cancelled()?;
    ui.log(LogStyle::Cyan, "STEP 4: Triggering build workflow");

    let request = DispatchRequest {
        workflow_repo: workflow_repo.clone(),
        package_name,
        repo_type,
        workflow_branch,
        source_repo,
        new_branch: (repo_type == RepoType::Testing).then(|| user_branch.clone()),
        tmate: options.tmate,
    };

    let client = engine.forge_client()?;
    client.dispatch(&request, &engine.settings().github_base_url)?;

    ui.log(LogStyle::Green, "✓ Package build triggered successfully!");
    ui.log(
        LogStyle::Cyan,
        &format!(
            "Monitor build at: {}/{workflow_repo}/actions",
            engine.settings().github_base_url
        ),
    );

    Ok(())
}

/// Abort any interrupted merge and reset to a known-clean state, keeping
/// the user's uncommitted work in a stash across the reset.
fn cleanup_interrupted_state(engine: &FlowEngine<'_>) -> Result<(), FlowError> {
    let ui = engine.ui;
    let repo = &engine.repo;

    ui.log(LogStyle::Cyan, "Checking and resolving any existing conflicts...");
    let has_conflicts = !repo.conflict_files()?.is_empty();
    let merge_in_progress = repo.in_progress_operation()?.is_some();

    if !has_conflicts && !merge_in_progress {
        ui.log(LogStyle::Green, "Repository is already in clean state.");
        return Ok(());
    }

    if !engine.confirm_destructive(
        "Clean up interrupted git state?",
        "An earlier merge was left unfinished. It will be aborted and the working tree reset \
         to HEAD; your uncommitted changes are stashed and restored afterwards.",
    ) {
        return Err(FlowError::UserCancel);
    }

    ui.log(LogStyle::Yellow, "Conflicts detected. Performing automatic cleanup...");
    engine.abort_in_progress();

    let stashed = repo.stash_push("auto-backup-before-cleanup").unwrap_or(false);

    repo.run_checked(&["reset", "--hard", "HEAD"])?;
    ui.log(LogStyle::Green, "Repository cleaned to stable state.");

    if stashed {
        ui.log(LogStyle::Cyan, "Restoring your local changes...");
        engine.restore_stash()?;
    }
    Ok(())
}

/// Bootstrap: when neither a local nor a remote `dev` branch exists, create
/// one from `main` and push it, preserving any dirty state in a stash.
fn ensure_dev_branch(engine: &FlowEngine<'_>) -> Result<(), FlowError> {
    let ui = engine.ui;
    let repo = &engine.repo;

    if repo.branch_exists("dev")? {
        return Ok(());
    }

    ui.log(LogStyle::Yellow, "Dev branch doesn't exist. Creating it now...");

    let stashed = if repo.has_changes()? {
        ui.log(LogStyle::Cyan, "Stashing local changes temporarily...");
        repo.stash_push("auto-stash-dev-bootstrap")?
    } else {
        false
    };

    let original_branch = repo.current_branch()?;

    let result: Result<(), GitError> = (|| {
        if original_branch.as_deref() != Some("main") {
            repo.run_checked(&["checkout", "main"])?;
        }
        repo.run_checked(&["checkout", "-b", "dev"])?;
        repo.run_checked(&["push", "-u", "origin", "dev"])?;
        if let Some(branch) = &original_branch
            && branch != "main"
            && branch != "dev"
        {
            repo.run_checked(&["checkout", branch])?;
        }
        Ok(())
    })();

    if let Err(e) = result {
        // Best effort back to where we were; the stash is restored below
        if let Some(branch) = &original_branch {
            let _ = repo.run(&["checkout", branch]);
        }
        if stashed {
            let _ = repo.stash_pop();
        }
        return Err(FlowError::Git(e));
    }

    if stashed {
        engine.restore_stash()?;
    }
    ui.log(LogStyle::Green, "Dev branch created successfully!");
    Ok(())
}

/// Land `source_branch` on `main`: plain merge, then `-Xtheirs`, then - with
/// explicit consent - a hard reset of `main` to the source branch.
fn merge_to_main(engine: &FlowEngine<'_>, source_branch: &str) -> Result<(), FlowError> {
    let ui = engine.ui;
    let repo = &engine.repo;

    repo.run_checked(&["fetch", "origin", "main"])?;
    repo.run_checked(&["checkout", "main"])?;
    // Start from the remote's view of main; everything local is already
    // committed and pushed at this point
    repo.run_checked(&["reset", "--hard", "origin/main"])?;

    let merged = repo.run(&["merge", "--no-edit", source_branch])?.success();
    if !merged {
        ui.log(LogStyle::Yellow, "Merge conflict, using automatic resolution...");
        let _ = repo.run(&["merge", "--abort"]);

        let merged_theirs = repo
            .run(&["merge", "--strategy-option=theirs", "--no-edit", source_branch])?
            .success();
        if !merged_theirs {
            let _ = repo.run(&["merge", "--abort"]);
            ui.log(LogStyle::Yellow, "Using force merge strategy...");
            if !engine.confirm_destructive(
                &format!("Reset main to {source_branch}?"),
                "Merging failed twice. This replaces main's history with the source branch; \
                 anything on main that is not in the source branch is discarded.",
            ) {
                return Err(FlowError::UserCancel);
            }
            repo.run_checked(&["reset", "--hard", source_branch])?;
        }
    }

    if engine.policy().confirm_destructive && !ui.confirm("Push merged main to remote?") {
        return Err(FlowError::UserCancel);
    }

    commit::push_branch(repo, ui, "main")
}

/// Invariant: testing builds always reference the user's dev branch;
/// stable/extra reference `main` iff it carries the latest source commit,
/// else the source branch with an explicit warning.
fn compute_workflow_branch(
    engine: &FlowEngine<'_>,
    repo_type: RepoType,
    working_branch: &str,
    source_branch: &str,
) -> Result<String, FlowError> {
    let ui = engine.ui;
    let repo = &engine.repo;

    if repo_type == RepoType::Testing {
        ui.log(
            LogStyle::Green,
            &format!("Testing package: workflow will use branch {working_branch}"),
        );
        return Ok(working_branch.to_string());
    }

    let current = repo.require_branch()?;
    if current != "main" {
        ui.log(
            LogStyle::Yellow,
            &format!("Stable/Extra package: not on main, workflow will use {current}"),
        );
        ui.log(
            LogStyle::Yellow,
            &format!("⚠️  Warning: package will be built from {current} instead of main"),
        );
        return Ok(current);
    }

    if source_branch == "main" {
        ui.log(LogStyle::Green, "Stable/Extra package: workflow will use main");
        return Ok("main".to_string());
    }

    let main_sha = repo.head_sha()?;
    let source_sha = repo.rev_parse(&format!("origin/{source_branch}"))?;
    match source_sha {
        Some(sha) if sha == main_sha => {
            ui.log(
                LogStyle::Green,
                "Stable/Extra package: main is up-to-date, workflow will use main",
            );
            Ok("main".to_string())
        }
        Some(_) => {
            ui.log(
                LogStyle::Yellow,
                &format!("Stable/Extra package: main not up-to-date, workflow will use {source_branch}"),
            );
            ui.log(
                LogStyle::Yellow,
                &format!("⚠️  Warning: package will be built from {source_branch} instead of main"),
            );
            Ok(source_branch.to_string())
        }
        None => {
            ui.log(
                LogStyle::Yellow,
                "Could not verify branch status, using current: main",
            );
            Ok("main".to_string())
        }
    }
}

/// Package name from the first PKGBUILD found under `root`.
pub(super) fn read_package_name(root: &Path) -> Result<String, FlowError> {
    let pkgbuild = find_pkgbuild(root).ok_or_else(|| {
        FlowError::PreconditionFailed("PKGBUILD file not found in the repository.".into())
    })?;

    let content = std::fs::read_to_string(&pkgbuild).map_err(|e| {
        FlowError::PreconditionFailed(format!("Could not read {}: {e}", pkgbuild.display()))
    })?;

    parse_package_name(&content).ok_or_else(|| {
        FlowError::PreconditionFailed("Package name not found in PKGBUILD.".into())
    })
}

fn find_pkgbuild(root: &Path) -> Option<PathBuf> {
    let walker = ignore::WalkBuilder::new(root)
        .standard_filters(false)
        .hidden(false)
        .sort_by_file_name(std::ffi::OsStr::cmp)
        .filter_entry(|entry| entry.file_name() != ".git")
        .build();

    for entry in walker.flatten() {
        if entry.file_type().is_some_and(|t| t.is_file()) && entry.file_name() == "PKGBUILD" {
            return Some(entry.into_path());
        }
    }
    None
}

/// First `pkgname=` assignment wins.
pub(super) fn parse_package_name(pkgbuild: &str) -> Option<String> {
    PKGNAME_PATTERN
        .captures(pkgbuild)
        .map(|caps| caps[1].trim().to_string())
        .filter(|name| !name.is_empty())
}
