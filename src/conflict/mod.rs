//! Three-way conflict detection, classification and resolution.
//!
//! Four strategies: `interactive`, `auto-ours`, `auto-theirs`, `manual`.
//! Interactive mode grows an enhanced path when both branch names are known
//! (newer/older labels from commit timestamps, optional auto-accept-newer).
//!
//! Resolution never aborts an in-flight merge: an unresolved path simply
//! makes `resolve` return false and the working tree is left for manual
//! repair.

mod preview;

pub use preview::{BinaryAdvice, ConflictPreview, binary_advice, parse_conflict_markers};

use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::git::{ConflictKind, GitError, Repository};
use crate::ui::{HostUi, LogStyle};

/// Lines shown per side in conflict previews.
const PREVIEW_MAX_LINES: usize = 15;

/// Above this many conflicted `.mo` files, offer one bulk resolution.
const MO_BULK_THRESHOLD: usize = 3;

/// Default strategy for the resolver, selectable in settings.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ConflictStrategy {
    #[default]
    Interactive,
    AutoOurs,
    AutoTheirs,
    Manual,
}

/// Which side of a conflict to take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Ours,
    Theirs,
}

impl Side {
    fn checkout_flag(self) -> &'static str {
        match self {
            Side::Ours => "--ours",
            Side::Theirs => "--theirs",
        }
    }

    fn stage(self) -> u8 {
        match self {
            Side::Ours => 2,
            Side::Theirs => 3,
        }
    }
}

/// Conflict resolver bound to one repository and host UI.
pub struct ConflictResolver<'a> {
    repo: &'a Repository,
    ui: &'a dyn HostUi,
    strategy: ConflictStrategy,
    auto_accept_newer: bool,
}

impl<'a> ConflictResolver<'a> {
    pub fn new(repo: &'a Repository, ui: &'a dyn HostUi, strategy: ConflictStrategy) -> Self {
        Self {
            repo,
            ui,
            strategy,
            auto_accept_newer: false,
        }
    }

    /// In interactive mode, auto-pick the side whose branch has the larger
    /// last-commit timestamp instead of prompting per file.
    pub fn with_auto_accept_newer(mut self, enabled: bool) -> Self {
        self.auto_accept_newer = enabled;
        self
    }

    pub fn has_conflicts(&self) -> Result<bool, GitError> {
        Ok(!self.repo.conflict_files()?.is_empty())
    }

    /// Main entry point. Returns true when every conflicted path ended up
    /// staged or removed; false leaves the tree as-is for manual repair.
    ///
    /// When both branch names are known, the enhanced interactive path is
    /// used regardless of the configured strategy.
    pub fn resolve(&self, branches: Option<(&str, &str)>) -> Result<bool, GitError> {
        let conflict_files = self.repo.conflict_files()?;
        if conflict_files.is_empty() {
            return Ok(true);
        }

        self.ui.log(
            LogStyle::Yellow,
            &format!("⚠️  Detected {} file(s) with conflicts", conflict_files.len()),
        );
        for file in &conflict_files {
            self.ui.log(LogStyle::Yellow, &format!("   - {file}"));
        }

        if let Some((current, incoming)) = branches {
            return self.resolve_enhanced(conflict_files, current, incoming);
        }

        match self.strategy {
            ConflictStrategy::AutoOurs => self.resolve_all_with_side(&conflict_files, Side::Ours),
            ConflictStrategy::AutoTheirs => {
                self.resolve_all_with_side(&conflict_files, Side::Theirs)
            }
            ConflictStrategy::Interactive => self.resolve_interactive(conflict_files),
            ConflictStrategy::Manual => {
                self.report_manual_steps(&conflict_files);
                Ok(false)
            }
        }
    }

    /// Take one side for every conflicted path.
    fn resolve_all_with_side(&self, files: &[String], side: Side) -> Result<bool, GitError> {
        let action = match side {
            Side::Ours => "keeping our changes",
            Side::Theirs => "accepting remote changes",
        };
        self.ui
            .log(LogStyle::Cyan, &format!("Resolving conflicts: {action}..."));

        for file in files {
            self.resolve_file_with_side(file, side)?;
        }

        self.ui.log(LogStyle::Green, "✓ Conflicts resolved");
        Ok(true)
    }

    /// Resolve a single path to one side and stage it.
    ///
    /// Modify/delete conflicts where the chosen side is the deleted one turn
    /// into `git rm -f`. Content conflicts try `git checkout --ours/--theirs`
    /// and fall back to extracting the stage blob with `git show :N:<path>`.
    pub fn resolve_file_with_side(&self, file: &str, side: Side) -> Result<(), GitError> {
        let kind = self.repo.conflict_stages(file)?.kind();

        let chosen_side_deleted = matches!(
            (side, kind),
            (Side::Ours, ConflictKind::DeletedByUs) | (Side::Theirs, ConflictKind::DeletedByThem)
        );
        if chosen_side_deleted {
            self.ui.log(
                LogStyle::Dim,
                &format!("  Removing {file} (deleted on the chosen side)"),
            );
            self.repo.run_checked(&["rm", "-f", "--", file])?;
            return Ok(());
        }

        let checked_out = self
            .repo
            .run_ok(&["checkout", side.checkout_flag(), "--", file])?;
        if !checked_out {
            // Sparse or renamed paths can defeat checkout; take the stage
            // blob from the index instead
            self.ui.log(
                LogStyle::Yellow,
                &format!("⚠ Could not checkout {}, extracting from index...", file),
            );
            let bytes = self.repo.show_stage(side.stage(), file)?;
            let absolute = self.repo.path().join(file);
            std::fs::write(&absolute, bytes)
                .map_err(|e| GitError::Io(format!("failed to write {file}: {e}")))?;
        }

        self.repo.run_checked(&["add", "--", file])?;
        Ok(())
    }

    /// Copy both sides to `<path>.ours` / `<path>.theirs`; the path itself
    /// keeps the theirs content and is staged.
    pub fn keep_both_versions(&self, file: &str) -> Result<(), GitError> {
        let absolute = self.repo.path().join(file);

        self.repo.run_checked(&["checkout", "--ours", "--", file])?;
        std::fs::copy(&absolute, absolute.with_extension(extended_ext(&absolute, "ours")))
            .map_err(|e| GitError::Io(format!("failed to copy {file}: {e}")))?;

        self.repo.run_checked(&["checkout", "--theirs", "--", file])?;
        std::fs::copy(&absolute, absolute.with_extension(extended_ext(&absolute, "theirs")))
            .map_err(|e| GitError::Io(format!("failed to copy {file}: {e}")))?;

        self.repo.run_checked(&["add", "--", file])?;

        self.ui.log(LogStyle::Cyan, "Created files:");
        self.ui
            .log(LogStyle::Cyan, &format!("  - {file}.ours (our version)"));
        self.ui
            .log(LogStyle::Cyan, &format!("  - {file}.theirs (remote version)"));
        self.ui
            .log(LogStyle::Cyan, &format!("  - {file} (using remote version)"));
        Ok(())
    }

    /// If more than [`MO_BULK_THRESHOLD`] conflicted paths are compiled
    /// translations, offer a single confirmation to take theirs for all of
    /// them. Returns the remaining (non-`.mo`) files.
    fn offer_mo_bulk_resolution(&self, files: Vec<String>) -> Result<Vec<String>, GitError> {
        let (mo_files, other_files): (Vec<String>, Vec<String>) =
            files.into_iter().partition(|f| f.to_lowercase().ends_with(".mo"));

        if mo_files.len() <= MO_BULK_THRESHOLD {
            let mut all = mo_files;
            all.extend(other_files);
            return Ok(all);
        }

        self.ui.log(
            LogStyle::Cyan,
            &format!("Detected {} .mo files (compiled translations)", mo_files.len()),
        );
        self.ui.log(
            LogStyle::Dim,
            ".mo files are auto-generated and should be taken from remote",
        );

        if !self.ui.confirm(&format!(
            "Accept REMOTE version for all {} .mo files?",
            mo_files.len()
        )) {
            let mut all = mo_files;
            all.extend(other_files);
            return Ok(all);
        }

        self.ui
            .log(LogStyle::Cyan, "Accepting remote version for all .mo files...");
        for mo_file in &mo_files {
            match self.resolve_file_with_side(mo_file, Side::Theirs) {
                Ok(()) => self.ui.log(LogStyle::Dim, &format!("  ✓ {mo_file}")),
                Err(_) => self.ui.log(LogStyle::Yellow, &format!("  ⚠ Failed: {mo_file}")),
            }
        }
        self.ui
            .log(LogStyle::Green, &format!("✓ Resolved {} .mo files", mo_files.len()));

        Ok(other_files)
    }

    /// Ask per file which side to keep.
    fn resolve_interactive(&self, files: Vec<String>) -> Result<bool, GitError> {
        self.ui.log(LogStyle::Cyan, "Interactive conflict resolution...");
        let files = self.offer_mo_bulk_resolution(files)?;

        for file in &files {
            self.show_file_preview(file, None)?;

            let options = vec![
                "Keep our version".to_string(),
                "Accept remote version".to_string(),
                "Keep both (create .ours and .theirs files)".to_string(),
                "Edit manually (abort and fix)".to_string(),
            ];
            let Some(choice) = self
                .ui
                .show_menu(&format!("How to resolve: {file}"), &options, Some(0))
            else {
                return Ok(false); // User cancelled
            };

            match choice {
                0 => {
                    self.resolve_file_with_side(file, Side::Ours)?;
                    self.ui
                        .log(LogStyle::Green, &format!("✓ Kept our version of {file}"));
                }
                1 => {
                    self.resolve_file_with_side(file, Side::Theirs)?;
                    self.ui
                        .log(LogStyle::Green, &format!("✓ Accepted remote version of {file}"));
                }
                2 => {
                    self.keep_both_versions(file)?;
                    self.ui
                        .log(LogStyle::Green, &format!("✓ Created both versions of {file}"));
                }
                _ => {
                    self.report_manual_steps(&[file.clone()]);
                    return Ok(false);
                }
            }
        }

        self.ui.log(LogStyle::Green, "✓ All conflicts resolved!");
        Ok(true)
    }

    /// Enhanced interactive resolution when both branch names are known:
    /// labels the sides newer/older by commit timestamp and defaults the
    /// per-file choice to the newer one.
    fn resolve_enhanced(
        &self,
        files: Vec<String>,
        current_branch: &str,
        incoming_branch: &str,
    ) -> Result<bool, GitError> {
        let current_epoch = self.repo.branch_last_commit_epoch(current_branch);
        let incoming_epoch = self.repo.branch_last_commit_epoch(incoming_branch);
        let current_is_newer = current_epoch >= incoming_epoch;

        let (newer_branch, newer_epoch, older_branch, older_epoch) = if current_is_newer {
            (current_branch, current_epoch, incoming_branch, incoming_epoch)
        } else {
            (incoming_branch, incoming_epoch, current_branch, current_epoch)
        };

        self.ui.log(LogStyle::Yellow, "⚠️  MERGE CONFLICTS DETECTED");
        self.ui.log(LogStyle::Cyan, "Branch comparison:");
        self.ui.log(
            LogStyle::Green,
            &format!("  ✓ {newer_branch} - {} [NEWER]", format_epoch(newer_epoch)),
        );
        self.ui.log(
            LogStyle::Dim,
            &format!("  ✗ {older_branch} - {} [older]", format_epoch(older_epoch)),
        );
        self.ui
            .log(LogStyle::White, &format!("Conflicted files: {}", files.len()));

        let newer_side = if current_is_newer { Side::Ours } else { Side::Theirs };

        if self.auto_accept_newer {
            self.ui.log(
                LogStyle::Cyan,
                &format!("⚙️  Auto-resolution enabled: using code from {newer_branch} (newer branch)"),
            );
            for file in &files {
                self.resolve_file_with_side(file, newer_side)?;
            }
            self.ui.log(
                LogStyle::Green,
                &format!("✓ All conflicts auto-resolved using the {newer_branch} version"),
            );
            return Ok(true);
        }

        let files = self.offer_mo_bulk_resolution(files)?;
        let total = files.len();

        for (idx, file) in files.iter().enumerate() {
            self.ui
                .log(LogStyle::White, &format!("File {}/{total}: {file}", idx + 1));
            self.show_file_preview(file, Some((current_branch, current_is_newer)))?;

            let options = vec![
                format!("Use {newer_branch} version [NEWER] - Recommended"),
                format!("Use {older_branch} version [older]"),
                "Skip - I'll edit manually".to_string(),
            ];
            let choice = self
                .ui
                .show_menu(&format!("Choose version for: {file}"), &options, Some(0));

            match choice {
                Some(0) => self.resolve_file_with_side(file, newer_side)?,
                Some(1) => self.resolve_file_with_side(
                    file,
                    match newer_side {
                        Side::Ours => Side::Theirs,
                        Side::Theirs => Side::Ours,
                    },
                )?,
                _ => {
                    self.ui.log(
                        LogStyle::Yellow,
                        &format!("⚠️  Skipping {file} - you'll need to edit it manually"),
                    );
                    continue;
                }
            }
            self.ui.log(LogStyle::Green, &format!("✓ Resolved: {file}"));
        }

        // Skipped files keep the tree conflicted; report and fail the pass
        let remaining = self.repo.conflict_files()?;
        if !remaining.is_empty() {
            self.ui
                .log(LogStyle::Yellow, "⚠️  Some files still have unresolved conflicts:");
            for file in &remaining {
                self.ui.log(LogStyle::Yellow, &format!("  • {file}"));
            }
            self.ui.log(
                LogStyle::White,
                "Please resolve them manually and run 'git add <file>'",
            );
            return Ok(false);
        }

        self.ui.log(LogStyle::Green, "✓ All conflicts resolved successfully!");
        Ok(true)
    }

    /// Render a marker preview for a text file, or a recommendation for
    /// known-binary extensions.
    fn show_file_preview(
        &self,
        file: &str,
        branch_context: Option<(&str, bool)>,
    ) -> Result<(), GitError> {
        if let Some(advice) = binary_advice(file) {
            self.ui
                .log(LogStyle::Yellow, &format!("Binary file, no text preview: {file}"));
            let recommendation = match advice {
                BinaryAdvice::GeneratedArtifact => {
                    "→ Accept REMOTE version (generated artifact, rebuilt from source)"
                }
                BinaryAdvice::Image => "→ Check which version you want to keep (image)",
                BinaryAdvice::Opaque => "→ Usually accept the REMOTE version",
            };
            self.ui.log(LogStyle::White, recommendation);
            return Ok(());
        }

        let absolute = self.repo.path().join(file);
        let content = match std::fs::read_to_string(&absolute) {
            Ok(content) => content,
            Err(e) => {
                self.ui
                    .log(LogStyle::Yellow, &format!("Could not preview {file}: {e}"));
                return Ok(());
            }
        };

        let preview = parse_conflict_markers(&content, PREVIEW_MAX_LINES);
        if preview.conflict_count == 0 {
            return Ok(());
        }

        self.ui.log(
            LogStyle::Yellow,
            &format!(
                "Found {} conflict(s) starting at line {}",
                preview.conflict_count,
                preview.first_conflict_line.unwrap_or(0)
            ),
        );

        let (ours_label, theirs_label) = match branch_context {
            Some((current, current_is_newer)) => (
                format!(
                    "{current} (YOUR branch, {})",
                    if current_is_newer { "NEWER" } else { "older" }
                ),
                format!("incoming ({})", if current_is_newer { "older" } else { "NEWER" }),
            ),
            None => ("your branch".to_string(), "incoming".to_string()),
        };

        self.ui.log(LogStyle::Cyan, &format!("╔═══ {ours_label}"));
        for line in &preview.ours {
            self.ui.log(LogStyle::Cyan, &format!("║ {line}"));
        }
        if preview.truncated_ours > 0 {
            self.ui
                .log(LogStyle::Cyan, &format!("║ ... ({} more lines)", preview.truncated_ours));
        }
        self.ui.log(LogStyle::Yellow, "╠═══ VS ═══");
        self.ui.log(LogStyle::Green, &format!("╠═══ {theirs_label}"));
        for line in &preview.theirs {
            self.ui.log(LogStyle::Green, &format!("║ {line}"));
        }
        if preview.truncated_theirs > 0 {
            self.ui
                .log(LogStyle::Green, &format!("║ ... ({} more lines)", preview.truncated_theirs));
        }
        self.ui.log(LogStyle::White, "╚═══");

        Ok(())
    }

    fn report_manual_steps(&self, files: &[String]) {
        self.ui.log(LogStyle::Yellow, "Manual conflict resolution needed");
        self.ui.log(LogStyle::Yellow, "Conflicted files:");
        for file in files {
            self.ui.log(LogStyle::Yellow, &format!("  - {file}"));
        }
        self.ui.log(LogStyle::Cyan, "Steps to resolve:");
        self.ui
            .log(LogStyle::Cyan, "1. Edit the files above and fix conflicts");
        self.ui.log(LogStyle::Cyan, "2. Run: git add <file>");
        self.ui.log(LogStyle::Cyan, "3. Run this command again");
    }
}

fn format_epoch(epoch: i64) -> String {
    DateTime::from_timestamp(epoch, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// `path.txt` + `ours` → `txt.ours`, so `Path::with_extension` yields
/// `path.txt.ours`.
fn extended_ext(path: &std::path::Path, suffix: &str) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{ext}.{suffix}"),
        None => suffix.to_string(),
    }
}
