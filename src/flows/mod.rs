//! The flow engine: named, sequential state machines over git and the
//! forge.
//!
//! Each flow is a planner that compiles intent into an [`OperationPlan`]
//! (or a short sequence of plans), previews it per the active policy,
//! executes it, and invokes the conflict/divergence resolvers when a step
//! leaves the tree in one of those states. Probe results are never reused
//! across a step that could have mutated state - flows re-probe at phase
//! boundaries.

mod aur;
mod commit;
mod error;
mod housekeeping;
mod package;
mod pull;
mod revert;

pub use commit::CommitOptions;
pub use error::FlowError;
pub use package::BuildOptions;
pub use revert::RevertMethod;

use once_cell::sync::OnceCell;

use crate::config::Settings;
use crate::conflict::ConflictResolver;
use crate::forge::ForgeClient;
use crate::git::{GitError, Repository, dev_branch_for};
use crate::plan::OperationPlan;
use crate::policy::ModePolicy;
use crate::token::TokenStore;
use crate::ui::{HostUi, LogStyle};
use crate::version_bump::VersionBumper;
use crate::worker::CancelFlag;

/// Drives every flow against one repository.
pub struct FlowEngine<'a> {
    repo: Repository,
    settings: Settings,
    policy: ModePolicy,
    ui: &'a dyn HostUi,
    dry_run: bool,
    cancel: CancelFlag,
    username: OnceCell<String>,
    bumper: Option<VersionBumper>,
}

impl<'a> FlowEngine<'a> {
    /// Build an engine for the repository containing the current directory.
    pub fn for_current_dir(settings: Settings, ui: &'a dyn HostUi) -> Result<Self, FlowError> {
        let repo = Repository::discover()?;
        Ok(Self::new(repo, settings, ui))
    }

    pub fn new(repo: Repository, settings: Settings, ui: &'a dyn HostUi) -> Self {
        let mut policy = ModePolicy::for_mode(settings.operation_mode)
            .with_confirm_destructive(settings.confirm_destructive);
        // Settings refine the mode table: auto_switch_branch=false forces
        // the branch prompt even in automated modes; auto_pull=true enables
        // pre-push sync even in safe mode
        policy.auto_switch_branches = policy.auto_switch_branches && settings.auto_switch_branch;
        policy.auto_pull = policy.auto_pull || settings.auto_pull;
        Self {
            repo,
            settings,
            policy,
            ui,
            dry_run: false,
            cancel: CancelFlag::new(),
            username: OnceCell::new(),
            bumper: None,
        }
    }

    /// Run every plan in simulation; no git mutation, no HTTP.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Replace the derived policy (hosts with their own preview surface).
    pub fn with_policy(mut self, policy: ModePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Pin the forge username instead of discovering it. Hosts that already
    /// authenticated the user pass it through here.
    pub fn with_username(self, username: impl Into<String>) -> Self {
        let _ = self.username.set(username.into());
        self
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn policy(&self) -> ModePolicy {
        self.policy
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Cooperative cancellation flag; the host keeps a clone.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Checked at every suspension point.
    pub(crate) fn check_cancelled(&self) -> Result<(), FlowError> {
        if self.cancel.is_cancelled() {
            self.ui.log(LogStyle::Yellow, "Cancellation requested - stopping");
            Err(FlowError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub(crate) fn new_plan(&self) -> OperationPlan<'_> {
        let mut plan = OperationPlan::new(&self.repo, self.policy.show_preview, self.dry_run);
        plan.show_commands = self.settings.show_git_commands || self.policy.show_preview;
        plan
    }

    pub(crate) fn conflict_resolver(&self) -> ConflictResolver<'_> {
        ConflictResolver::new(&self.repo, self.ui, self.settings.conflict_strategy)
    }

    /// The effective forge organization for this repository.
    pub(crate) fn organization(&self) -> String {
        let owner = self.repo.owner_slash_name().unwrap_or_default();
        self.settings.organization_or(&owner).to_string()
    }

    /// Authenticated forge client, or setup-required.
    pub(crate) fn forge_client(&self) -> Result<ForgeClient, FlowError> {
        let store = TokenStore::default_store()
            .map_err(|e| FlowError::PreconditionFailed(e.to_string()))?;
        Ok(ForgeClient::from_store(&store, &self.organization())?)
    }

    /// GitHub username for the dev-branch naming scheme.
    ///
    /// Discovery order: forge `/user` with the stored token, then
    /// `git config github.user`, then a noreply commit email, then
    /// `"unknown"`.
    pub(crate) fn github_username(&self) -> String {
        self.username
            .get_or_init(|| {
                if let Ok(client) = self.forge_client()
                    && let Ok(login) = client.authenticated_user()
                    && !login.is_empty()
                {
                    return login;
                }
                if let Ok(Some(user)) = self.repo.configured_github_user() {
                    return user;
                }
                if let Ok(Some(user)) = self.repo.noreply_email_user() {
                    return user;
                }
                "unknown".to_string()
            })
            .clone()
    }

    /// The user's personal dev branch (`dev-<username>`).
    pub(crate) fn user_branch(&self) -> String {
        dev_branch_for(&self.github_username())
    }

    pub(crate) fn version_bumper(&mut self) -> Result<&mut VersionBumper, FlowError> {
        if self.bumper.is_none() {
            let root = self.repo.repo_root()?;
            self.bumper = Some(VersionBumper::new(root));
        }
        Ok(self.bumper.as_mut().expect("just initialized"))
    }

    /// Checkout `branch`, creating it as needed: from `origin/<branch>`
    /// when only the remote exists, fresh from HEAD when neither does.
    pub(crate) fn ensure_branch_exists(&self, branch: &str) -> Result<(), GitError> {
        ensure_branch_on(&self.repo, self.ui, branch)
            .map_err(|e| GitError::Io(e.to_string()))
    }

    /// Abort any in-flight merge/rebase. Always safe to call; a no-op when
    /// nothing is in progress.
    pub(crate) fn abort_in_progress(&self) {
        let _ = self.repo.run(&["merge", "--abort"]);
        let _ = self.repo.run(&["rebase", "--abort"]);
    }

    /// Pop the stash created earlier in a flow. On conflicts the resolver
    /// gets a chance; if it gives up the stash entry is retained and the
    /// user told how to recover - it is never dropped silently.
    pub(crate) fn restore_stash(&self) -> Result<(), FlowError> {
        self.ui.log(LogStyle::Cyan, "Restoring stashed changes...");
        let output = self.repo.stash_pop()?;
        if output.success() {
            self.ui.log(LogStyle::Green, "✓ Changes restored successfully");
            return Ok(());
        }

        let resolver = self.conflict_resolver();
        if resolver.has_conflicts()? {
            self.ui
                .log(LogStyle::Yellow, "⚠️  Conflicts while restoring changes");
            if resolver.resolve(None)? {
                return Ok(());
            }
            return Err(FlowError::ConflictPending {
                guidance: "Resolve the conflicted files, run 'git add <file>', then retry. \
                           Your changes are also retained in the stash ('git stash list')."
                    .into(),
            });
        }

        Err(FlowError::ConflictPending {
            guidance: "Could not restore your changes automatically. \
                       They are retained in the stash; see 'git stash list'."
                .into(),
        })
    }

    /// Destructive-step gate: true when the flow may proceed.
    pub(crate) fn confirm_destructive(&self, title: &str, message: &str) -> bool {
        if !self.policy.confirm_destructive {
            return true;
        }
        if self.ui.capabilities().headless {
            // No confirmation channel: destructive work is refused outright
            return false;
        }
        self.ui.show_confirmation(title, message, true)
    }

    // ------------------------------------------------------------------
    // Flow entry points (implementations live in the sibling modules)
    // ------------------------------------------------------------------

    /// *Pull Latest*: sync the user's dev branch with the newest code.
    pub fn pull_latest(&mut self) -> Result<(), FlowError> {
        pull::run(self)
    }

    /// *Commit + Push* (switching branches first when asked to).
    pub fn commit_and_push(&mut self, options: CommitOptions) -> Result<(), FlowError> {
        commit::run(self, options)
    }

    /// *Commit + Generate Package*: commit, merge per repo type, dispatch.
    pub fn commit_and_build(
        &mut self,
        repo_type: crate::forge::RepoType,
        options: BuildOptions,
    ) -> Result<(), FlowError> {
        package::run(self, repo_type, options)
    }

    /// *AUR Build*: dispatch a build of an AUR package; no local branch.
    pub fn aur_build(&mut self, package_name: &str, tmate: bool) -> Result<(), FlowError> {
        aur::run(self, package_name, tmate)
    }

    /// *Revert Commit*: restore or reset to an earlier commit.
    pub fn revert_commit(&mut self) -> Result<(), FlowError> {
        revert::run(self)
    }

    /// Undo the last commit, keeping its changes in the working tree.
    pub fn undo_last_commit(&mut self) -> Result<(), FlowError> {
        housekeeping::undo_last_commit(self)
    }

    /// Delete branches outside the protected set.
    pub fn cleanup_old_branches(&mut self) -> Result<(), FlowError> {
        housekeeping::cleanup_old_branches(self)
    }

    /// Delete CI runs with the given status.
    pub fn clean_workflow_runs(&mut self, status: &str) -> Result<usize, FlowError> {
        housekeeping::clean_workflow_runs(self, status)
    }

    /// Delete every tag in the repository.
    pub fn clean_all_tags(&mut self) -> Result<usize, FlowError> {
        housekeeping::clean_all_tags(self)
    }

    /// Create a PR from `source` into `target`, optionally auto-merging.
    pub fn create_pull_request(
        &mut self,
        source: &str,
        target: &str,
        auto_merge: bool,
    ) -> Result<String, FlowError> {
        housekeeping::create_pull_request(self, source, target, auto_merge)
    }
}

/// Checkout `branch` on `repo`, creating it as needed. Free-function form
/// so plan callbacks (which own a cloned [`Repository`]) can reuse it.
pub(crate) fn ensure_branch_on(
    repo: &Repository,
    ui: &dyn HostUi,
    branch: &str,
) -> anyhow::Result<()> {
    let local = repo.branch_exists_local(branch)?;
    let remote = repo.branch_exists_remote(branch)?;

    if remote && !local {
        ui.log(
            LogStyle::Cyan,
            &format!("Creating local branch from remote: {branch}"),
        );
        repo.run_checked(&["checkout", "-b", branch, &format!("origin/{branch}")])?;
    } else if local || remote {
        repo.run_checked(&["checkout", branch])?;
    } else {
        ui.log(LogStyle::Cyan, &format!("Creating new branch: {branch}"));
        repo.run_checked(&["checkout", "-b", branch])?;
    }
    Ok(())
}

/// Pop the newest stash entry, routing conflicts through the resolver.
/// Free-function form for plan callbacks. Fails without dropping the
/// stash entry.
pub(crate) fn restore_stash_on(
    repo: &Repository,
    ui: &dyn HostUi,
    strategy: crate::conflict::ConflictStrategy,
) -> anyhow::Result<()> {
    let output = repo.stash_pop()?;
    if output.success() {
        return Ok(());
    }

    let resolver = ConflictResolver::new(repo, ui, strategy);
    if resolver.has_conflicts()? {
        ui.log(LogStyle::Yellow, "⚠️  Conflicts while restoring changes");
        if resolver.resolve(None)? {
            return Ok(());
        }
        anyhow::bail!(
            "Conflicts while restoring stashed changes; resolve them manually \
             (your changes are retained, see 'git stash list')"
        );
    }
    anyhow::bail!("Could not restore stashed changes; see 'git stash list'")
}
