//! Git introspection and execution.
//!
//! Everything here delegates to a child `git` process - pkgflow never reads
//! or writes git's object storage itself. [`Repository`] carries the probe
//! queries (read-only) and the checked execution surface (mutating commands,
//! argv arrays only, always run from the repository root).

mod diagnose;
mod error;
mod exec;
mod parse;
mod repository;

pub use diagnose::{PushDiagnosis, PushErrorKind, analyze_push_error};
pub use error::GitError;
pub use exec::CommandOutput;
pub use repository::Repository;

/// Branch names pkgflow treats as protected regardless of server-side
/// configuration. Destructive operations against these always prompt.
pub const PROTECTED_BRANCHES: &[&str] = &["main", "master"];

/// Default branch filter for [`Repository::most_recent_branch`].
pub const DEFAULT_BRANCH_FILTER: &[&str] = &["main", "master", "dev", "dev-*"];

/// Whether a branch name is treated as protected.
pub fn is_protected(branch: &str) -> bool {
    PROTECTED_BRANCHES.contains(&branch)
}

/// Snapshot of the working tree, captured at flow phase boundaries.
///
/// Short-lived by design: flows re-probe after any step that could have
/// mutated state (branch switches, stash operations).
#[derive(Debug, Clone, PartialEq)]
pub struct WorkingTreeState {
    /// Current branch name; `None` in detached HEAD state.
    pub current_branch: Option<String>,
    /// True iff `git status --porcelain` is non-empty.
    pub has_changes: bool,
    pub changed_file_count: usize,
}

/// One branch in the [`BranchInventory`].
#[derive(Debug, Clone, PartialEq)]
pub struct BranchInfo {
    pub name: String,
    pub is_local: bool,
    pub is_remote: bool,
    /// Committer timestamp of the branch tip, seconds since epoch.
    pub last_commit_epoch: i64,
}

/// Branch graph snapshot, ordered by committer timestamp descending.
///
/// The ordering defines the *most recent branch*; ties break by name
/// ascending. Recomputed on demand, never cached across flow phases.
#[derive(Debug, Clone, Default)]
pub struct BranchInventory {
    branches: Vec<BranchInfo>,
}

impl BranchInventory {
    pub(crate) fn from_raw(mut branches: Vec<BranchInfo>) -> Self {
        branches.sort_by(|a, b| {
            b.last_commit_epoch
                .cmp(&a.last_commit_epoch)
                .then_with(|| a.name.cmp(&b.name))
        });
        Self { branches }
    }

    pub fn branches(&self) -> &[BranchInfo] {
        &self.branches
    }

    pub fn get(&self, name: &str) -> Option<&BranchInfo> {
        self.branches.iter().find(|b| b.name == name)
    }

    /// The branch with the highest committer timestamp, if any.
    pub fn most_recent(&self) -> Option<&BranchInfo> {
        self.branches.first()
    }
}

/// A `(sha, subject)` pair from `git log --oneline`.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitSummary {
    pub sha: String,
    pub subject: String,
}

/// Richer commit record used by the revert flow's commit picker.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitInfo {
    pub sha: String,
    pub author: String,
    pub date: String,
    pub subject: String,
}

/// Relationship between a local branch and its `origin/` counterpart.
#[derive(Debug, Clone, Default)]
pub struct Divergence {
    pub branch: String,
    /// Local commits not on the remote.
    pub ahead: usize,
    /// Remote commits not in the local branch.
    pub behind: usize,
    /// `ahead > 0 && behind > 0`.
    pub diverged: bool,
    /// False when `origin/<branch>` does not exist; `ahead` is then at
    /// least 1 (the branch needs a first push).
    pub remote_exists: bool,
    /// Populated only when diverged, capped at a handful of entries.
    pub local_commits: Vec<CommitSummary>,
    pub remote_commits: Vec<CommitSummary>,
}

/// Which conflict stages `git ls-files -u` reports for a path.
///
/// Stage 1 (base) is informational only; resolution considers stages 2
/// (ours) and 3 (theirs). Base content remains reachable through
/// [`Repository::show_stage`] for three-way inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConflictStages {
    pub base: bool,
    pub ours: bool,
    pub theirs: bool,
}

impl ConflictStages {
    pub fn kind(&self) -> ConflictKind {
        match (self.ours, self.theirs) {
            (true, false) => ConflictKind::DeletedByThem,
            (false, true) => ConflictKind::DeletedByUs,
            // Both present - or neither, which ls-files never reports for an
            // unmerged path; treat it as content to stay resolvable.
            _ => ConflictKind::Content,
        }
    }
}

/// Classification of a conflicted path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// Both sides modified the file (stages 2 and 3 present).
    Content,
    /// Our side deleted the file; only stage 3 remains.
    DeletedByUs,
    /// Their side deleted the file; only stage 2 remains.
    DeletedByThem,
}

/// Worktree operation state read from the git directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InProgressOperation {
    Merge,
    Rebase,
    CherryPick,
    Revert,
}

/// The user's personal dev branch name for a given username.
pub fn dev_branch_for(username: &str) -> String {
    format!("dev-{username}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inventory_orders_by_epoch_desc() {
        let inv = BranchInventory::from_raw(vec![
            BranchInfo {
                name: "main".into(),
                is_local: true,
                is_remote: true,
                last_commit_epoch: 100,
            },
            BranchInfo {
                name: "dev-alice".into(),
                is_local: true,
                is_remote: false,
                last_commit_epoch: 300,
            },
            BranchInfo {
                name: "dev".into(),
                is_local: false,
                is_remote: true,
                last_commit_epoch: 200,
            },
        ]);

        let names: Vec<_> = inv.branches().iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["dev-alice", "dev", "main"]);
        assert_eq!(inv.most_recent().unwrap().name, "dev-alice");
    }

    #[test]
    fn test_inventory_ties_break_by_name() {
        let inv = BranchInventory::from_raw(vec![
            BranchInfo {
                name: "dev-bob".into(),
                is_local: true,
                is_remote: false,
                last_commit_epoch: 100,
            },
            BranchInfo {
                name: "dev-alice".into(),
                is_local: true,
                is_remote: false,
                last_commit_epoch: 100,
            },
        ]);
        assert_eq!(inv.most_recent().unwrap().name, "dev-alice");
    }

    #[test]
    fn test_conflict_kind_classification() {
        let content = ConflictStages {
            base: true,
            ours: true,
            theirs: true,
        };
        assert_eq!(content.kind(), ConflictKind::Content);

        let deleted_by_us = ConflictStages {
            base: true,
            ours: false,
            theirs: true,
        };
        assert_eq!(deleted_by_us.kind(), ConflictKind::DeletedByUs);

        let deleted_by_them = ConflictStages {
            base: true,
            ours: true,
            theirs: false,
        };
        assert_eq!(deleted_by_them.kind(), ConflictKind::DeletedByThem);
    }

    #[test]
    fn test_protected_branches() {
        assert!(is_protected("main"));
        assert!(is_protected("master"));
        assert!(!is_protected("dev-alice"));
    }

    #[test]
    fn test_dev_branch_name() {
        assert_eq!(dev_branch_for("alice"), "dev-alice");
    }
}
