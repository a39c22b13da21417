//! End-to-end flow tests against real repositories with a bare origin.

mod common;

use common::{ScriptedUi, TestRepo};
use pkgflow::config::Settings;
use pkgflow::flows::{CommitOptions, FlowEngine, FlowError};
use pkgflow::policy::OperationMode;
use pkgflow::ui::HeadlessUi;

fn expert_settings() -> Settings {
    Settings {
        operation_mode: OperationMode::Expert,
        auto_fetch: false,
        ..Settings::default()
    }
}

#[test]
fn clean_commit_to_dev_branch_pushes_and_bumps_version() {
    let repo = TestRepo::with_origin();
    repo.write("app.cfg", "APP_VERSION = \"1.0.0\"\n");
    repo.commit_all("add version file");
    repo.git(&["push", "-q", "origin", "main"]);

    repo.git(&["checkout", "-q", "-b", "dev-alice"]);
    repo.git(&["push", "-q", "-u", "origin", "dev-alice"]);
    repo.write("README.md", "# test repo\n\nfixed typo\n");

    let ui = HeadlessUi::new(true);
    let mut engine = FlowEngine::new(repo.repo.clone(), expert_settings(), &ui)
        .with_username("alice");
    engine
        .commit_and_push(CommitOptions {
            message: Some("fix: typo".into()),
            ..Default::default()
        })
        .unwrap();

    // The commit landed on the remote dev branch
    assert_eq!(repo.origin_subject("dev-alice"), "fix: typo");
    // Patch-level bump came along in the same commit
    assert!(repo.read("app.cfg").contains("1.0.1"));
    assert!(!repo.repo.has_changes().unwrap());
}

#[test]
fn commit_on_main_switches_stashes_and_returns() {
    let repo = TestRepo::with_origin();

    // Dirty on main; the flow must carry the change to dev-alice
    repo.write("work.txt", "uncommitted work\n");

    let ui = HeadlessUi::new(true);
    let mut engine = FlowEngine::new(repo.repo.clone(), expert_settings(), &ui)
        .with_username("alice");
    engine
        .commit_and_push(CommitOptions {
            message: Some("feat: carried across branches".into()),
            ..Default::default()
        })
        .unwrap();

    // Pushed to the dev branch, with the stashed file in the commit
    assert_eq!(repo.origin_subject("dev-alice"), "feat: carried across branches");
    let files = repo
        .origin()
        .run_checked(&["ls-tree", "--name-only", "dev-alice"])
        .unwrap();
    assert!(files.contains("work.txt"));

    // Back on the original branch, kept in sync as a courtesy
    assert_eq!(repo.current_branch(), "main");
    assert_eq!(repo.read("work.txt"), "uncommitted work\n");
    // Stash fully consumed, nothing retained silently
    assert!(repo.git(&["stash", "list"]).trim().is_empty());
}

#[test]
fn commit_with_multiline_message_preserves_body() {
    let repo = TestRepo::with_origin();
    repo.git(&["checkout", "-q", "-b", "dev-alice"]);
    repo.git(&["push", "-q", "-u", "origin", "dev-alice"]);
    repo.write("a.txt", "x\n");

    let message = "feat: subject line\n\nBody line one.\nBody line two.";
    let ui = HeadlessUi::new(true);
    let mut engine = FlowEngine::new(repo.repo.clone(), expert_settings(), &ui)
        .with_username("alice");
    engine
        .commit_and_push(CommitOptions {
            message: Some(message.into()),
            ..Default::default()
        })
        .unwrap();

    let full = repo.git(&["log", "-1", "--pretty=format:%B"]);
    assert!(full.starts_with("feat: subject line"));
    assert!(full.contains("Body line two."));
}

#[test]
fn commit_with_nothing_to_commit_succeeds_quietly() {
    let repo = TestRepo::with_origin();
    repo.git(&["checkout", "-q", "-b", "dev-alice"]);

    let ui = HeadlessUi::new(true);
    let mut engine = FlowEngine::new(repo.repo.clone(), expert_settings(), &ui)
        .with_username("alice");
    engine
        .commit_and_push(CommitOptions {
            message: Some("fix: nothing".into()),
            ..Default::default()
        })
        .unwrap();

    assert!(ui.transcript().contains("No changes to commit"));
}

#[test]
fn diverged_branch_resolves_with_rebase_and_pushes_both() {
    let repo = TestRepo::with_origin();
    repo.git(&["checkout", "-q", "-b", "dev-alice"]);
    repo.git(&["push", "-q", "-u", "origin", "dev-alice"]);

    // Remote advances from another clone
    let other = repo.clone_origin("other");
    other.run_checked(&["checkout", "-q", "dev-alice"]).unwrap();
    std::fs::write(other.path().join("remote.txt"), "remote\n").unwrap();
    other.run_checked(&["add", "-A"]).unwrap();
    other
        .run_checked(&["commit", "-q", "-m", "remote: concurrent work"])
        .unwrap();
    other.run_checked(&["push", "-q", "origin", "dev-alice"]).unwrap();

    // Local advances independently, then commits more via the flow
    repo.write("local.txt", "local\n");
    repo.commit_all("local: earlier work");
    repo.write("new.txt", "new\n");

    // Menu default is rebase (recommended)
    let ui = HeadlessUi::new(true);
    let mut engine = FlowEngine::new(repo.repo.clone(), expert_settings(), &ui)
        .with_username("alice");
    engine
        .commit_and_push(CommitOptions {
            message: Some("fix: after divergence".into()),
            ..Default::default()
        })
        .unwrap();

    let subjects = repo
        .origin()
        .run_checked(&["log", "--pretty=format:%s", "dev-alice"])
        .unwrap();
    assert!(subjects.contains("remote: concurrent work"));
    assert!(subjects.contains("local: earlier work"));
    assert!(subjects.contains("fix: after divergence"));
}

#[test]
fn divergence_cancel_leaves_commit_local() {
    let repo = TestRepo::with_origin();
    repo.git(&["checkout", "-q", "-b", "dev-alice"]);
    repo.git(&["push", "-q", "-u", "origin", "dev-alice"]);

    let other = repo.clone_origin("other");
    other.run_checked(&["checkout", "-q", "dev-alice"]).unwrap();
    std::fs::write(other.path().join("remote.txt"), "remote\n").unwrap();
    other.run_checked(&["add", "-A"]).unwrap();
    other.run_checked(&["commit", "-q", "-m", "remote work"]).unwrap();
    other.run_checked(&["push", "-q", "origin", "dev-alice"]).unwrap();

    repo.write("local.txt", "local\n");
    repo.commit_all("local work");
    repo.write("new.txt", "new\n");

    // Cancel at the divergence menu
    let ui = ScriptedUi::new(true);
    ui.queue_menu(None);
    let mut engine = FlowEngine::new(repo.repo.clone(), expert_settings(), &ui)
        .with_username("alice");
    let err = engine
        .commit_and_push(CommitOptions {
            message: Some("fix: stays local".into()),
            ..Default::default()
        })
        .unwrap_err();

    assert!(matches!(err, FlowError::DivergencePending { .. }));
    // The commit exists locally, the remote was never touched
    assert_eq!(
        repo.git(&["log", "-1", "--pretty=format:%s"]).trim(),
        "fix: stays local"
    );
    assert_eq!(repo.origin_subject("dev-alice"), "remote work");
}

#[test]
fn pull_latest_twice_is_idempotent() {
    let repo = TestRepo::with_origin();
    repo.git(&["checkout", "-q", "-b", "dev-alice"]);
    repo.git(&["push", "-q", "-u", "origin", "dev-alice"]);

    let ui = HeadlessUi::new(true);
    let mut engine = FlowEngine::new(repo.repo.clone(), expert_settings(), &ui)
        .with_username("alice");
    engine.pull_latest().unwrap();

    // No remote change since: the second run plans nothing
    let ui2 = HeadlessUi::new(true);
    let mut engine2 = FlowEngine::new(repo.repo.clone(), expert_settings(), &ui2)
        .with_username("alice");
    engine2.pull_latest().unwrap();
    assert!(ui2.transcript().contains("Already up to date"));
}

#[test]
fn pull_latest_fetches_remote_work() {
    let repo = TestRepo::with_origin();
    repo.git(&["checkout", "-q", "-b", "dev-alice"]);
    repo.git(&["push", "-q", "-u", "origin", "dev-alice"]);

    let other = repo.clone_origin("other");
    other.run_checked(&["checkout", "-q", "dev-alice"]).unwrap();
    std::fs::write(other.path().join("upstream.txt"), "upstream\n").unwrap();
    other.run_checked(&["add", "-A"]).unwrap();
    other.run_checked(&["commit", "-q", "-m", "upstream work"]).unwrap();
    other.run_checked(&["push", "-q", "origin", "dev-alice"]).unwrap();

    let ui = HeadlessUi::new(true);
    let mut engine = FlowEngine::new(repo.repo.clone(), expert_settings(), &ui)
        .with_username("alice");
    engine.pull_latest().unwrap();

    assert!(repo.path().join("upstream.txt").exists());
    assert_eq!(repo.git(&["log", "-1", "--pretty=format:%s"]).trim(), "upstream work");
}

#[test]
fn dry_run_commit_changes_nothing() {
    let repo = TestRepo::with_origin();
    repo.git(&["checkout", "-q", "-b", "dev-alice"]);
    repo.write("w.txt", "pending\n");
    let head_before = repo.head_sha();

    let ui = HeadlessUi::new(true);
    let mut engine = FlowEngine::new(repo.repo.clone(), expert_settings(), &ui)
        .with_username("alice")
        .with_dry_run(true);
    engine
        .commit_and_push(CommitOptions {
            message: Some("fix: never happens".into()),
            ..Default::default()
        })
        .unwrap();

    assert_eq!(repo.head_sha(), head_before);
    assert!(repo.repo.has_changes().unwrap());
    assert!(repo.git(&["stash", "list"]).trim().is_empty());
}

#[test]
fn empty_commit_message_is_a_precondition_failure() {
    let repo = TestRepo::with_origin();
    repo.git(&["checkout", "-q", "-b", "dev-alice"]);
    repo.write("w.txt", "pending\n");

    let ui = HeadlessUi::new(true);
    let mut engine = FlowEngine::new(repo.repo.clone(), expert_settings(), &ui)
        .with_username("alice");
    let err = engine
        .commit_and_push(CommitOptions {
            message: Some("   ".into()),
            ..Default::default()
        })
        .unwrap_err();
    assert!(matches!(err, FlowError::PreconditionFailed(_)));
}

#[test]
fn revert_with_reset_removes_commit_locally() {
    let repo = TestRepo::new();
    repo.write("first.txt", "one\n");
    repo.commit_all("first change");
    let keep_sha = repo.head_sha();
    repo.write("second.txt", "two\n");
    repo.commit_all("second change");

    // Stay on the user's own branch so reset is offered
    repo.git(&["checkout", "-q", "-b", "dev-alice"]);

    // Method menu → Reset, commit picker → second entry (the commit to
    // reset back to), then confirm
    let ui = ScriptedUi::new(true);
    ui.queue_menu(Some(1));
    ui.queue_menu(Some(1));
    ui.queue_confirm(true);

    let mut engine = FlowEngine::new(repo.repo.clone(), expert_settings(), &ui)
        .with_username("alice");
    engine.revert_commit().unwrap();

    assert_eq!(repo.head_sha(), keep_sha);
    assert!(!repo.path().join("second.txt").exists());
}

#[test]
fn revert_on_foreign_branch_is_refused() {
    let repo = TestRepo::new();
    repo.git(&["checkout", "-q", "-b", "feature/other"]);

    let ui = HeadlessUi::new(true);
    let mut engine = FlowEngine::new(repo.repo.clone(), expert_settings(), &ui)
        .with_username("alice");
    let err = engine.revert_commit().unwrap_err();
    assert!(matches!(err, FlowError::PreconditionFailed(_)));
}

#[test]
fn undo_last_commit_keeps_changes_in_tree() {
    let repo = TestRepo::new();
    repo.write("u.txt", "undo me\n");
    repo.commit_all("to be undone");

    let ui = HeadlessUi::new(true);
    let mut engine = FlowEngine::new(repo.repo.clone(), expert_settings(), &ui)
        .with_username("alice");
    engine.undo_last_commit().unwrap();

    assert_eq!(
        repo.git(&["log", "-1", "--pretty=format:%s"]).trim(),
        "initial commit"
    );
    assert!(repo.repo.has_changes().unwrap());
    assert!(repo.path().join("u.txt").exists());
}

#[test]
fn package_build_requires_feature_flag() {
    let repo = TestRepo::with_origin();
    let ui = HeadlessUi::new(true);
    let mut engine = FlowEngine::new(repo.repo.clone(), expert_settings(), &ui)
        .with_username("alice");
    let err = engine
        .commit_and_build(pkgflow::forge::RepoType::Testing, Default::default())
        .unwrap_err();
    assert!(matches!(err, FlowError::PreconditionFailed(_)));
}

#[test]
fn aur_build_requires_feature_flag() {
    let repo = TestRepo::with_origin();
    let ui = HeadlessUi::new(true);
    let mut engine = FlowEngine::new(repo.repo.clone(), expert_settings(), &ui)
        .with_username("alice");
    let err = engine.aur_build("showtime", false).unwrap_err();
    assert!(matches!(err, FlowError::PreconditionFailed(_)));
}

#[test]
fn safe_mode_plan_is_gated_on_preview_approval() {
    let repo = TestRepo::with_origin();
    repo.git(&["checkout", "-q", "-b", "dev-alice"]);
    repo.git(&["push", "-q", "-u", "origin", "dev-alice"]);

    // Remote moves ahead so the pull plan is non-empty
    let other = repo.clone_origin("other");
    other.run_checked(&["checkout", "-q", "dev-alice"]).unwrap();
    std::fs::write(other.path().join("r.txt"), "r\n").unwrap();
    other.run_checked(&["add", "-A"]).unwrap();
    other.run_checked(&["commit", "-q", "-m", "remote"]).unwrap();
    other.run_checked(&["push", "-q", "origin", "dev-alice"]).unwrap();

    let settings = Settings {
        operation_mode: OperationMode::Safe,
        auto_fetch: false,
        ..Settings::default()
    };

    // Safe mode + declined preview: nothing may execute
    let ui = HeadlessUi::new(false);
    let mut engine = FlowEngine::new(repo.repo.clone(), settings, &ui).with_username("alice");
    let err = engine.pull_latest().unwrap_err();
    assert!(matches!(err, FlowError::UserCancel));
    assert!(!repo.path().join("r.txt").exists());
}

#[test]
fn cleanup_old_branches_keeps_protected_set() {
    let repo = TestRepo::with_origin();
    repo.git(&["branch", "dev"]);
    repo.git(&["branch", "dev-alice"]);
    repo.git(&["branch", "dev-bob"]);
    repo.git(&["branch", "stray-branch"]);

    let ui = HeadlessUi::new(true);
    // Expert mode: no destructive confirmation required
    let mut engine = FlowEngine::new(repo.repo.clone(), expert_settings(), &ui)
        .with_username("alice");
    engine.cleanup_old_branches().unwrap();

    let branches = repo.git(&["branch", "--format=%(refname:short)"]);
    let names: Vec<&str> = branches.lines().map(str::trim).collect();
    assert!(names.contains(&"main"));
    assert!(names.contains(&"dev"));
    // Only the lexically newest dev-* survives
    assert!(names.contains(&"dev-bob"));
    assert!(!names.contains(&"dev-alice"));
    assert!(!names.contains(&"stray-branch"));
}
