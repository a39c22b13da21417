//! Integration tests for conflict resolution strategies on real merges.

mod common;

use common::TestRepo;
use pkgflow::conflict::{ConflictResolver, ConflictStrategy, Side};
use pkgflow::ui::HeadlessUi;

/// Open a merge conflict in `shared.txt`: "main version" (ours) vs
/// "feature version" (theirs).
fn make_content_conflict(repo: &TestRepo) {
    repo.write("shared.txt", "base\n");
    repo.commit_all("add shared");

    repo.git(&["checkout", "-q", "-b", "feature"]);
    repo.write("shared.txt", "feature version\n");
    repo.commit_all("feature edit");

    repo.git(&["checkout", "-q", "main"]);
    repo.write("shared.txt", "main version\n");
    repo.commit_all("main edit");

    let output = repo.repo.run(&["merge", "feature"]).unwrap();
    assert!(!output.success());
}

#[test]
fn auto_ours_keeps_our_version_and_clears_conflicts() {
    let repo = TestRepo::new();
    make_content_conflict(&repo);

    let ui = HeadlessUi::new(true);
    let resolver = ConflictResolver::new(&repo.repo, &ui, ConflictStrategy::AutoOurs);
    assert!(resolver.has_conflicts().unwrap());
    assert!(resolver.resolve(None).unwrap());

    assert!(repo.repo.conflict_files().unwrap().is_empty());
    assert_eq!(repo.read("shared.txt"), "main version\n");
}

#[test]
fn auto_theirs_takes_remote_version_and_clears_conflicts() {
    let repo = TestRepo::new();
    make_content_conflict(&repo);

    let ui = HeadlessUi::new(true);
    let resolver = ConflictResolver::new(&repo.repo, &ui, ConflictStrategy::AutoTheirs);
    assert!(resolver.resolve(None).unwrap());

    assert!(repo.repo.conflict_files().unwrap().is_empty());
    assert_eq!(repo.read("shared.txt"), "feature version\n");
}

#[test]
fn manual_strategy_reports_and_leaves_tree_untouched() {
    let repo = TestRepo::new();
    make_content_conflict(&repo);

    let ui = HeadlessUi::new(true);
    let resolver = ConflictResolver::new(&repo.repo, &ui, ConflictStrategy::Manual);
    assert!(!resolver.resolve(None).unwrap());

    // Conflict still present; the file still carries markers
    assert!(!repo.repo.conflict_files().unwrap().is_empty());
    assert!(repo.read("shared.txt").contains("<<<<<<<"));
    assert!(ui.transcript().contains("Manual conflict resolution needed"));
}

#[test]
fn no_conflicts_resolves_trivially() {
    let repo = TestRepo::new();
    let ui = HeadlessUi::new(true);
    let resolver = ConflictResolver::new(&repo.repo, &ui, ConflictStrategy::Interactive);
    assert!(!resolver.has_conflicts().unwrap());
    assert!(resolver.resolve(None).unwrap());
}

#[test]
fn picking_deleted_side_removes_the_file() {
    let repo = TestRepo::new();
    repo.write("doomed.txt", "content\n");
    repo.commit_all("add doomed");

    // Their side deletes, ours modifies: taking theirs must `git rm`, not
    // checkout
    repo.git(&["checkout", "-q", "-b", "deleter"]);
    repo.git(&["rm", "-q", "doomed.txt"]);
    repo.commit_all("delete doomed");

    repo.git(&["checkout", "-q", "main"]);
    repo.write("doomed.txt", "modified\n");
    repo.commit_all("modify doomed");

    assert!(!repo.repo.run(&["merge", "deleter"]).unwrap().success());

    let ui = HeadlessUi::new(true);
    let resolver = ConflictResolver::new(&repo.repo, &ui, ConflictStrategy::AutoTheirs);
    assert!(resolver.resolve(None).unwrap());

    assert!(repo.repo.conflict_files().unwrap().is_empty());
    assert!(!repo.path().join("doomed.txt").exists());
}

#[test]
fn keeping_surviving_side_of_modify_delete() {
    let repo = TestRepo::new();
    repo.write("doomed.txt", "content\n");
    repo.commit_all("add doomed");

    repo.git(&["checkout", "-q", "-b", "deleter"]);
    repo.git(&["rm", "-q", "doomed.txt"]);
    repo.commit_all("delete doomed");

    repo.git(&["checkout", "-q", "main"]);
    repo.write("doomed.txt", "modified\n");
    repo.commit_all("modify doomed");

    assert!(!repo.repo.run(&["merge", "deleter"]).unwrap().success());

    let ui = HeadlessUi::new(true);
    let resolver = ConflictResolver::new(&repo.repo, &ui, ConflictStrategy::AutoOurs);
    assert!(resolver.resolve(None).unwrap());

    assert!(repo.repo.conflict_files().unwrap().is_empty());
    assert_eq!(repo.read("doomed.txt"), "modified\n");
}

#[test]
fn keep_both_produces_side_files_and_stages_theirs() {
    let repo = TestRepo::new();
    make_content_conflict(&repo);

    let ui = HeadlessUi::new(true);
    let resolver = ConflictResolver::new(&repo.repo, &ui, ConflictStrategy::Interactive);
    resolver.keep_both_versions("shared.txt").unwrap();

    assert_eq!(repo.read("shared.txt.ours"), "main version\n");
    assert_eq!(repo.read("shared.txt.theirs"), "feature version\n");
    // The path itself keeps theirs and is staged
    assert_eq!(repo.read("shared.txt"), "feature version\n");
    assert!(repo.repo.conflict_files().unwrap().is_empty());
}

#[test]
fn resolve_file_with_side_falls_back_cleanly() {
    let repo = TestRepo::new();
    make_content_conflict(&repo);

    let ui = HeadlessUi::new(true);
    let resolver = ConflictResolver::new(&repo.repo, &ui, ConflictStrategy::Interactive);
    resolver
        .resolve_file_with_side("shared.txt", Side::Theirs)
        .unwrap();

    assert!(repo.repo.conflict_files().unwrap().is_empty());
    assert_eq!(repo.read("shared.txt"), "feature version\n");
}

#[test]
fn auto_accept_newer_resolves_without_prompts() {
    let repo = TestRepo::new();
    repo.write("shared.txt", "base\n");
    repo.commit_all_at("add shared", 1_000_000);

    repo.git(&["checkout", "-q", "-b", "feature"]);
    repo.write("shared.txt", "feature version\n");
    repo.commit_all_at("feature edit", 3_000_000); // feature is newer

    repo.git(&["checkout", "-q", "main"]);
    repo.write("shared.txt", "main version\n");
    repo.commit_all_at("main edit", 2_000_000);

    assert!(!repo.repo.run(&["merge", "feature"]).unwrap().success());

    // Declines every prompt: only auto_accept_newer can resolve this
    let ui = HeadlessUi::new(false);
    let resolver = ConflictResolver::new(&repo.repo, &ui, ConflictStrategy::Interactive)
        .with_auto_accept_newer(true);
    assert!(resolver.resolve(Some(("main", "feature"))).unwrap());

    assert!(repo.repo.conflict_files().unwrap().is_empty());
    assert_eq!(repo.read("shared.txt"), "feature version\n");
}
