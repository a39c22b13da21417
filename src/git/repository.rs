//! Repository context and read-only probe queries.

use std::path::{Path, PathBuf};

use super::parse;
use super::{
    BranchInfo, BranchInventory, CommitInfo, ConflictStages, Divergence, GitError,
    InProgressOperation, WorkingTreeState,
};

/// How many commits to list per side when reporting a divergence.
const DIVERGENCE_LOG_LIMIT: usize = 5;

/// Repository context for git operations.
///
/// Encapsulates the working directory every child git process runs in.
///
/// # Examples
///
/// ```no_run
/// use pkgflow::git::Repository;
///
/// let repo = Repository::discover()?;
/// let state = repo.working_tree_state()?;
/// # Ok::<(), pkgflow::git::GitError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Repository {
    path: PathBuf,
}

impl Repository {
    /// Create a repository context at the specified path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create a repository context for the current directory.
    pub fn current() -> Self {
        Self::at(".")
    }

    /// Resolve the current directory to a context rooted at the repository
    /// top-level, so every subsequent command runs with `cwd = repo root`.
    pub fn discover() -> Result<Self, GitError> {
        let probe = Self::current();
        if !probe.is_repository() {
            return Err(GitError::NotARepository);
        }
        Ok(Self::at(probe.repo_root()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True iff `git rev-parse --is-inside-work-tree` succeeds.
    pub fn is_repository(&self) -> bool {
        self.run(&["rev-parse", "--is-inside-work-tree"])
            .map(|o| o.success())
            .unwrap_or(false)
    }

    /// Top-level directory of the working tree.
    pub fn repo_root(&self) -> Result<PathBuf, GitError> {
        let stdout = self.run_checked(&["rev-parse", "--show-toplevel"])?;
        Ok(PathBuf::from(stdout.trim()))
    }

    /// The git directory (where MERGE_HEAD and rebase state live).
    pub fn git_dir(&self) -> Result<PathBuf, GitError> {
        let stdout = self.run_checked(&["rev-parse", "--git-dir"])?;
        let dir = PathBuf::from(stdout.trim());
        if dir.is_absolute() {
            Ok(dir)
        } else {
            Ok(self.path.join(dir))
        }
    }

    /// Current branch name, or `None` in detached HEAD state.
    pub fn current_branch(&self) -> Result<Option<String>, GitError> {
        let stdout = self.run_checked(&["branch", "--show-current"])?;
        let branch = stdout.trim();
        if branch.is_empty() {
            Ok(None) // Detached HEAD
        } else {
            Ok(Some(branch.to_string()))
        }
    }

    /// Current branch name, erroring on detached HEAD.
    pub fn require_branch(&self) -> Result<String, GitError> {
        self.current_branch()?.ok_or(GitError::DetachedHead)
    }

    /// `owner/name` parsed from the origin URL.
    pub fn owner_slash_name(&self) -> Result<String, GitError> {
        let url = self.run_checked(&["config", "--get", "remote.origin.url"])?;
        parse::parse_owner_name(url.trim()).ok_or_else(|| {
            GitError::ParseError(format!(
                "Could not determine owner/name from origin URL: {}",
                url.trim()
            ))
        })
    }

    /// True iff the working tree has uncommitted changes.
    pub fn has_changes(&self) -> Result<bool, GitError> {
        let stdout = self.run_checked(&["status", "--porcelain"])?;
        Ok(!stdout.trim().is_empty())
    }

    /// Number of paths reported by `git status --porcelain`.
    pub fn changed_file_count(&self) -> Result<usize, GitError> {
        let stdout = self.run_checked(&["status", "--porcelain"])?;
        Ok(stdout.lines().filter(|l| !l.trim().is_empty()).count())
    }

    /// Capture a [`WorkingTreeState`] snapshot.
    pub fn working_tree_state(&self) -> Result<WorkingTreeState, GitError> {
        let current_branch = self.current_branch()?;
        let stdout = self.run_checked(&["status", "--porcelain"])?;
        let changed_file_count = stdout.lines().filter(|l| !l.trim().is_empty()).count();
        Ok(WorkingTreeState {
            current_branch,
            has_changes: changed_file_count > 0,
            changed_file_count,
        })
    }

    pub fn branch_exists_local(&self, branch: &str) -> Result<bool, GitError> {
        self.run_ok(&[
            "rev-parse",
            "--verify",
            "--quiet",
            &format!("refs/heads/{branch}"),
        ])
    }

    pub fn branch_exists_remote(&self, branch: &str) -> Result<bool, GitError> {
        self.run_ok(&[
            "rev-parse",
            "--verify",
            "--quiet",
            &format!("refs/remotes/origin/{branch}"),
        ])
    }

    /// True iff the branch exists locally or as `origin/<branch>`.
    pub fn branch_exists(&self, branch: &str) -> Result<bool, GitError> {
        Ok(self.branch_exists_local(branch)? || self.branch_exists_remote(branch)?)
    }

    /// SHA of a refspec, or `None` if it does not resolve.
    pub fn rev_parse(&self, refspec: &str) -> Result<Option<String>, GitError> {
        let output = self.run(&["rev-parse", "--verify", "--quiet", refspec])?;
        if output.success() {
            Ok(Some(output.stdout.trim().to_string()))
        } else {
            Ok(None)
        }
    }

    pub fn head_sha(&self) -> Result<String, GitError> {
        Ok(self.run_checked(&["rev-parse", "HEAD"])?.trim().to_string())
    }

    pub fn short_head_sha(&self) -> Result<String, GitError> {
        Ok(self
            .run_checked(&["rev-parse", "--short", "HEAD"])?
            .trim()
            .to_string())
    }

    /// Subject line of a commit.
    pub fn commit_subject(&self, refspec: &str) -> Result<String, GitError> {
        Ok(self
            .run_checked(&["log", "-1", "--pretty=format:%s", refspec])?
            .trim()
            .to_string())
    }

    /// Committer timestamp of a ref, seconds since epoch.
    pub fn commit_timestamp(&self, refspec: &str) -> Result<i64, GitError> {
        let stdout = self.run_checked(&["log", "-1", "--format=%ct", refspec])?;
        stdout
            .trim()
            .parse()
            .map_err(|e| GitError::ParseError(format!("Failed to parse timestamp: {e}")))
    }

    /// Timestamp of a branch tip, preferring `origin/<branch>` over the
    /// local ref; 0 when neither resolves.
    pub fn branch_last_commit_epoch(&self, branch: &str) -> i64 {
        for refspec in [format!("origin/{branch}"), branch.to_string()] {
            if let Ok(epoch) = self.commit_timestamp(&refspec) {
                return epoch;
            }
        }
        0
    }

    /// The most recent commits on HEAD, newest first.
    pub fn recent_commits(&self, count: usize) -> Result<Vec<CommitInfo>, GitError> {
        let limit = format!("-{count}");
        let stdout = self.run_checked(&[
            "log",
            &limit,
            "--pretty=format:%H|%an|%ad|%s",
            "--date=short",
        ])?;
        Ok(parse::parse_commit_log(&stdout))
    }

    /// True iff the commit is reachable from any remote-tracking branch.
    pub fn commit_in_remote(&self, sha: &str) -> bool {
        // Assume remote if undetermined: forces the safer confirmation path
        match self.run(&["branch", "-r", "--contains", sha]) {
            Ok(output) => output.success() && !output.stdout.trim().is_empty(),
            Err(_) => true,
        }
    }

    /// Compute ahead/behind against `origin/<branch>`, fetching first.
    ///
    /// Commit summaries are populated only when the branch has diverged,
    /// bounded to a handful of entries per side.
    pub fn divergence(&self, branch: &str) -> Result<Divergence, GitError> {
        // Refresh the remote ref first; failure here is informational only
        let _ = self.run(&["fetch", "origin", branch]);

        let mut divergence = Divergence {
            branch: branch.to_string(),
            ..Default::default()
        };

        if self.rev_parse(&format!("origin/{branch}"))?.is_none() {
            // No remote counterpart: not diverged, just needs a first push
            divergence.ahead = 1;
            return Ok(divergence);
        }
        divergence.remote_exists = true;

        let ahead_range = format!("origin/{branch}..HEAD");
        let behind_range = format!("HEAD..origin/{branch}");

        divergence.ahead = parse::parse_count(&self.run_checked(&[
            "rev-list",
            "--count",
            &ahead_range,
        ])?)?;
        divergence.behind = parse::parse_count(&self.run_checked(&[
            "rev-list",
            "--count",
            &behind_range,
        ])?)?;
        divergence.diverged = divergence.ahead > 0 && divergence.behind > 0;

        if divergence.diverged {
            let limit = format!("-{DIVERGENCE_LOG_LIMIT}");
            let local = self.run_checked(&["log", "--oneline", &limit, &ahead_range])?;
            let remote = self.run_checked(&["log", "--oneline", &limit, &behind_range])?;
            divergence.local_commits = parse::parse_oneline_log(&local);
            divergence.remote_commits = parse::parse_oneline_log(&remote);
        }

        Ok(divergence)
    }

    /// Paths with unresolved conflicts (`diff --filter=U`).
    pub fn conflict_files(&self) -> Result<Vec<String>, GitError> {
        let stdout = self.run_checked(&["diff", "--name-only", "--diff-filter=U"])?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_owned)
            .collect())
    }

    /// Which index stages exist for a conflicted path.
    pub fn conflict_stages(&self, path: &str) -> Result<ConflictStages, GitError> {
        let stdout = self.run_checked(&["ls-files", "-u", "--", path])?;
        Ok(parse::parse_stages(&stdout))
    }

    /// Raw blob bytes for one conflict stage (`git show :N:<path>`).
    pub fn show_stage(&self, stage: u8, path: &str) -> Result<Vec<u8>, GitError> {
        self.run_bytes(&["show", &format!(":{stage}:{path}")])
    }

    /// Build the branch inventory restricted to names matching `filters`.
    ///
    /// A filter entry ending in `*` matches by prefix, anything else exactly.
    pub fn branch_inventory(&self, filters: &[&str]) -> Result<BranchInventory, GitError> {
        let stdout = self.run_checked(&[
            "for-each-ref",
            "--format=%(refname:short)|%(committerdate:unix)",
            "refs/heads",
            "refs/remotes/origin",
        ])?;

        let mut by_name: std::collections::BTreeMap<String, BranchInfo> = Default::default();
        for (refname, epoch) in parse::parse_ref_epochs(&stdout) {
            let (name, is_remote) = match refname.strip_prefix("origin/") {
                Some(rest) => (rest.to_string(), true),
                None => (refname, false),
            };
            if name == "HEAD" || !parse::matches_filter(&name, filters) {
                continue;
            }
            let entry = by_name.entry(name.clone()).or_insert(BranchInfo {
                name,
                is_local: false,
                is_remote: false,
                last_commit_epoch: 0,
            });
            if is_remote {
                entry.is_remote = true;
            } else {
                entry.is_local = true;
            }
            entry.last_commit_epoch = entry.last_commit_epoch.max(epoch);
        }

        Ok(BranchInventory::from_raw(by_name.into_values().collect()))
    }

    /// Among branches matching `filters`, the one with the highest committer
    /// timestamp. Falls back to `dev` on an empty inventory (fresh repos).
    pub fn most_recent_branch(&self, filters: &[&str]) -> Result<String, GitError> {
        let inventory = self.branch_inventory(filters)?;
        Ok(inventory
            .most_recent()
            .map(|b| b.name.clone())
            .unwrap_or_else(|| "dev".to_string()))
    }

    /// Operation left in progress by a previous interrupted run, if any.
    pub fn in_progress_operation(&self) -> Result<Option<InProgressOperation>, GitError> {
        let git_dir = self.git_dir()?;
        if git_dir.join("MERGE_HEAD").exists() {
            return Ok(Some(InProgressOperation::Merge));
        }
        if git_dir.join("rebase-merge").exists() || git_dir.join("rebase-apply").exists() {
            return Ok(Some(InProgressOperation::Rebase));
        }
        if git_dir.join("CHERRY_PICK_HEAD").exists() {
            return Ok(Some(InProgressOperation::CherryPick));
        }
        if git_dir.join("REVERT_HEAD").exists() {
            return Ok(Some(InProgressOperation::Revert));
        }
        Ok(None)
    }

    /// Get a git config value. Returns `None` if the key doesn't exist.
    pub fn config_get(&self, key: &str) -> Result<Option<String>, GitError> {
        let output = self.run(&["config", key])?;
        if output.success() {
            let value = output.stdout.trim();
            Ok((!value.is_empty()).then(|| value.to_string()))
        } else {
            Ok(None)
        }
    }

    pub fn config_set(&self, key: &str, value: &str) -> Result<(), GitError> {
        self.run_checked(&["config", key, value])?;
        Ok(())
    }

    /// GitHub username from `git config github.user`, if configured.
    pub fn configured_github_user(&self) -> Result<Option<String>, GitError> {
        self.config_get("github.user")
    }

    /// GitHub username extracted from a `*@users.noreply.github.com` email.
    pub fn noreply_email_user(&self) -> Result<Option<String>, GitError> {
        let Some(email) = self.config_get("user.email")? else {
            return Ok(None);
        };
        Ok(parse::parse_noreply_username(&email))
    }

    /// Stash the working tree (including untracked files) under `message`.
    ///
    /// Returns false when there was nothing to stash.
    pub fn stash_push(&self, message: &str) -> Result<bool, GitError> {
        let output = self.run(&["stash", "push", "-u", "-m", message])?;
        if !output.success() {
            return Err(GitError::CommandFailed {
                command: format!("stash push -u -m {message}"),
                code: output.code,
                stderr: output.error_text().to_string(),
            });
        }
        Ok(!output.stdout.contains("No local changes to save"))
    }

    /// Pop the newest stash entry. Non-zero exit (conflicts) is returned to
    /// the caller as output, never raised - the stash must not be dropped.
    pub fn stash_pop(&self) -> Result<super::CommandOutput, GitError> {
        self.run(&["stash", "pop"])
    }
}
