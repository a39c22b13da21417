//! Semantic version bump derived from commit metadata.
//!
//! Scans the working tree for a single-line `APP_VERSION = "x.y.z"`
//! assignment and rewrites it according to the conventional-commit type of
//! the message being committed. At most one assignment in the tree is ever
//! modified.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ui::{HostUi, LogStyle};

/// Files larger than this are skipped during the scan.
const MAX_FILE_SIZE: u64 = 1_000_000;

/// Directories that never hold the version constant.
const IGNORE_DIRS: &[&str] = &[
    ".git",
    "__pycache__",
    "node_modules",
    "vendor",
    "venv",
    ".venv",
    "env",
    "target",
    "build",
    "dist",
    ".idea",
    ".vscode",
];

/// Extensions the scan looks inside (plus extensionless files).
const ALLOWED_EXTENSIONS: &[&str] = &[
    "rs", "py", "cfg", "conf", "ini", "json", "toml", "yaml", "yml", "txt", "sh", "bash", "zsh",
    "fish",
];

static HEADER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    // First line after leading punctuation: type(scope)!: subject
    Regex::new(r"^(?P<type>[a-zA-Z]+)(?:\([^)]*\))?(?P<breaking>!?):").expect("static regex")
});

static VERSION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    // The regex crate has no backreferences; spell out both quote styles
    Regex::new(r#"(APP_VERSION\s*=\s*)(?:"(\d+\.\d+\.\d+)"|'(\d+\.\d+\.\d+)')"#)
        .expect("static regex")
});

/// Parsed conventional-commit metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommitMetadata {
    pub commit_type: Option<String>,
    pub breaking_change: bool,
}

/// Parse `type(scope)!:` from the first line and `BREAKING CHANGE` from the
/// body. An explicit type (from a front-end type menu) wins over the parse.
pub fn extract_commit_metadata(message: &str, explicit_type: Option<&str>) -> CommitMetadata {
    let mut metadata = CommitMetadata {
        commit_type: explicit_type
            .filter(|t| *t != "custom")
            .map(|t| t.to_lowercase()),
        breaking_change: false,
    };

    let message = message.trim();
    if message.is_empty() {
        return metadata;
    }

    let first_line = message.lines().next().unwrap_or("").trim();
    // Emoji or punctuation prefixes (🐛 fix: ...) are skipped before parsing
    let cleaned: String = first_line
        .chars()
        .skip_while(|c| !c.is_ascii_alphanumeric())
        .collect();

    if let Some(caps) = HEADER_PATTERN.captures(&cleaned) {
        if metadata.commit_type.is_none() {
            metadata.commit_type = Some(caps["type"].to_lowercase());
        }
        if !caps["breaking"].is_empty() {
            metadata.breaking_change = true;
        }
    }
    if !metadata.breaking_change && message.to_uppercase().contains("BREAKING CHANGE") {
        metadata.breaking_change = true;
    }

    metadata
}

/// Which semver component a commit bumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum BumpLevel {
    Major,
    Minor,
    Patch,
}

/// Map commit metadata to a bump level; `None` means no bump.
pub fn infer_bump_level(metadata: &CommitMetadata) -> Option<BumpLevel> {
    if metadata.breaking_change {
        return Some(BumpLevel::Major);
    }
    let commit_type = metadata.commit_type.as_deref()?;
    match commit_type {
        "feat" => Some(BumpLevel::Minor),
        "fix" | "perf" | "docs" | "style" | "refactor" | "test" | "build" | "ci" | "chore" => {
            Some(BumpLevel::Patch)
        }
        _ => None,
    }
}

fn bump_semver(current: &str, level: BumpLevel) -> Option<String> {
    let mut parts = current.split('.');
    let major: u64 = parts.next()?.parse().ok()?;
    let minor: u64 = parts.next()?.parse().ok()?;
    let patch: u64 = parts.next()?.parse().ok()?;

    Some(match level {
        BumpLevel::Major => format!("{}.0.0", major + 1),
        BumpLevel::Minor => format!("{major}.{}.0", minor + 1),
        BumpLevel::Patch => format!("{major}.{minor}.{}", patch + 1),
    })
}

/// Result of a successful bump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BumpResult {
    pub old_version: String,
    pub new_version: String,
    pub level: BumpLevel,
    pub path: PathBuf,
}

/// Scans for and rewrites the `APP_VERSION` assignment.
///
/// Caches the hit path so subsequent calls skip the walk.
pub struct VersionBumper {
    repo_root: PathBuf,
    cached_path: Option<PathBuf>,
    warning_shown: bool,
}

impl VersionBumper {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
            cached_path: None,
            warning_shown: false,
        }
    }

    /// Bump `APP_VERSION` according to the commit message semantics.
    ///
    /// Returns `None` when the message implies no bump, the constant is not
    /// found, or the rewrite fails (reported as a warning, never fatal).
    pub fn apply(
        &mut self,
        commit_message: &str,
        explicit_type: Option<&str>,
        ui: &dyn HostUi,
    ) -> Option<BumpResult> {
        let metadata = extract_commit_metadata(commit_message, explicit_type);
        let level = infer_bump_level(&metadata)?;

        let Some((path, content, start, old_version)) = self.locate_assignment() else {
            if !self.warning_shown {
                ui.log(
                    LogStyle::Yellow,
                    "APP_VERSION constant not found. Skipping automatic version bump.",
                );
                self.warning_shown = true;
            }
            return None;
        };

        let new_version = bump_semver(&old_version, level)?;
        if new_version == old_version {
            return None;
        }

        // Rewrite only the version digits; prefix and quotes stay untouched
        let matched = &content[start..];
        let caps = VERSION_PATTERN.captures(matched)?;
        let whole = caps.get(0)?;
        let replacement = whole.as_str().replace(&old_version, &new_version);
        let mut updated = content.clone();
        updated.replace_range(start + whole.start()..start + whole.end(), &replacement);

        if let Err(e) = std::fs::write(&path, updated) {
            ui.log(
                LogStyle::Yellow,
                &format!("Could not update APP_VERSION ({}): {e}", path.display()),
            );
            return None;
        }

        let relative = path.strip_prefix(&self.repo_root).unwrap_or(&path);
        ui.log(
            LogStyle::Green,
            &format!(
                "APP_VERSION bumped from {old_version} to {new_version} ({level} bump) in {}",
                relative.display()
            ),
        );

        Some(BumpResult {
            old_version,
            new_version,
            level,
            path,
        })
    }

    /// Find the file and byte offset of the assignment. Checks the cached
    /// path first, then walks the tree in deterministic order.
    fn locate_assignment(&mut self) -> Option<(PathBuf, String, usize, String)> {
        if let Some(cached) = self.cached_path.clone() {
            if let Some(hit) = check_file(&cached) {
                return Some(hit);
            }
            self.cached_path = None;
        }

        let walker = ignore::WalkBuilder::new(&self.repo_root)
            .standard_filters(false)
            .hidden(false)
            .sort_by_file_name(std::ffi::OsStr::cmp)
            .filter_entry(|entry| {
                let name = entry.file_name().to_string_lossy();
                !(entry.file_type().is_some_and(|t| t.is_dir())
                    && IGNORE_DIRS.contains(&name.as_ref()))
            })
            .build();

        for entry in walker.flatten() {
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let path = entry.path();
            if !extension_allowed(path) {
                continue;
            }
            if entry.metadata().map(|m| m.len() > MAX_FILE_SIZE).unwrap_or(true) {
                continue;
            }
            if let Some(hit) = check_file(path) {
                self.cached_path = Some(hit.0.clone());
                return Some(hit);
            }
        }

        None
    }
}

fn extension_allowed(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => ALLOWED_EXTENSIONS.contains(&ext.to_lowercase().as_str()),
        None => true,
    }
}

/// Scan one file for a live assignment; returns (path, content, match
/// offset, version).
fn check_file(path: &Path) -> Option<(PathBuf, String, usize, String)> {
    let content = std::fs::read_to_string(path).ok()?;

    for caps in VERSION_PATTERN.captures_iter(&content) {
        let whole = caps.get(0)?;
        let version = caps.get(2).or_else(|| caps.get(3))?.as_str().to_string();

        let line_start = content[..whole.start()].rfind('\n').map_or(0, |p| p + 1);
        let prefix = &content[line_start..whole.start()];
        let stripped = prefix.trim_start();

        // Comment lines don't count
        if stripped.starts_with('#')
            || stripped.starts_with("//")
            || stripped.starts_with(';')
            || stripped.starts_with("/*")
        {
            continue;
        }
        // A quote immediately before the match means we're inside a string
        // literal; heuristic, matching what the scan can know without an AST
        let trimmed_prefix = prefix.trim_end();
        if trimmed_prefix.ends_with('\'') || trimmed_prefix.ends_with('"') {
            continue;
        }

        return Some((path.to_path_buf(), content.clone(), whole.start(), version));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::HeadlessUi;
    use rstest::rstest;

    #[rstest]
    #[case("fix: typo", Some("fix"), false)]
    #[case("feat(ui): add button", Some("feat"), false)]
    #[case("feat!: drop old API", Some("feat"), true)]
    #[case("🐛 fix: emoji prefix", Some("fix"), false)]
    #[case("chore: deps\n\nBREAKING CHANGE: config format", Some("chore"), true)]
    #[case("just a message", None, false)]
    #[case("", None, false)]
    fn test_extract_metadata(
        #[case] message: &str,
        #[case] commit_type: Option<&str>,
        #[case] breaking: bool,
    ) {
        let metadata = extract_commit_metadata(message, None);
        assert_eq!(metadata.commit_type.as_deref(), commit_type);
        assert_eq!(metadata.breaking_change, breaking);
    }

    #[test]
    fn test_explicit_type_wins() {
        let metadata = extract_commit_metadata("whatever text", Some("feat"));
        assert_eq!(metadata.commit_type.as_deref(), Some("feat"));
        // "custom" is the front-end's "no type chosen" sentinel
        let metadata = extract_commit_metadata("fix: real", Some("custom"));
        assert_eq!(metadata.commit_type.as_deref(), Some("fix"));
    }

    #[rstest]
    #[case(Some("feat"), false, Some(BumpLevel::Minor))]
    #[case(Some("fix"), false, Some(BumpLevel::Patch))]
    #[case(Some("chore"), false, Some(BumpLevel::Patch))]
    #[case(Some("feat"), true, Some(BumpLevel::Major))]
    #[case(None, true, Some(BumpLevel::Major))]
    #[case(Some("wip"), false, None)]
    #[case(None, false, None)]
    fn test_infer_bump_level(
        #[case] commit_type: Option<&str>,
        #[case] breaking: bool,
        #[case] expected: Option<BumpLevel>,
    ) {
        let metadata = CommitMetadata {
            commit_type: commit_type.map(str::to_owned),
            breaking_change: breaking,
        };
        assert_eq!(infer_bump_level(&metadata), expected);
    }

    #[test]
    fn test_bump_semver() {
        assert_eq!(bump_semver("1.2.3", BumpLevel::Major).unwrap(), "2.0.0");
        assert_eq!(bump_semver("1.2.3", BumpLevel::Minor).unwrap(), "1.3.0");
        assert_eq!(bump_semver("1.2.3", BumpLevel::Patch).unwrap(), "1.2.4");
        assert_eq!(bump_semver("not.a.version", BumpLevel::Patch), None);
    }

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_apply_rewrites_single_assignment() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "app.py", "APP_VERSION = \"1.2.3\"\nprint(APP_VERSION)\n");

        let mut bumper = VersionBumper::new(dir.path());
        let ui = HeadlessUi::new(true);
        let result = bumper.apply("fix: typo", None, &ui).expect("bump applied");

        assert_eq!(result.old_version, "1.2.3");
        assert_eq!(result.new_version, "1.2.4");
        assert_eq!(result.level, BumpLevel::Patch);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("APP_VERSION = \"1.2.4\""));
    }

    #[test]
    fn test_apply_skips_comments_and_strings() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "config.sh",
            "# APP_VERSION = \"9.9.9\"\nmsg=\"APP_VERSION = '8.8.8'\"\nAPP_VERSION = '1.0.0'\n",
        );

        let mut bumper = VersionBumper::new(dir.path());
        let ui = HeadlessUi::new(true);
        let result = bumper.apply("feat: thing", None, &ui).unwrap();
        assert_eq!(result.old_version, "1.0.0");
        assert_eq!(result.new_version, "1.1.0");

        let content = std::fs::read_to_string(dir.path().join("config.sh")).unwrap();
        assert!(content.contains("# APP_VERSION = \"9.9.9\""));
        assert!(content.contains("'8.8.8'"));
        assert!(content.contains("APP_VERSION = '1.1.0'"));
    }

    #[test]
    fn test_apply_modifies_at_most_one_file() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.py", "APP_VERSION = \"1.0.0\"\n");
        write(dir.path(), "b.py", "APP_VERSION = \"2.0.0\"\n");

        let mut bumper = VersionBumper::new(dir.path());
        let ui = HeadlessUi::new(true);
        bumper.apply("fix: x", None, &ui).unwrap();

        let a = std::fs::read_to_string(dir.path().join("a.py")).unwrap();
        let b = std::fs::read_to_string(dir.path().join("b.py")).unwrap();
        let changed = [a.contains("1.0.1"), b.contains("2.0.1")];
        assert_eq!(changed.iter().filter(|c| **c).count(), 1, "exactly one rewrite");
    }

    #[test]
    fn test_no_bump_for_unknown_type() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.py", "APP_VERSION = \"1.0.0\"\n");
        let mut bumper = VersionBumper::new(dir.path());
        let ui = HeadlessUi::new(true);
        assert!(bumper.apply("wip: experimenting", None, &ui).is_none());
    }

    #[test]
    fn test_missing_constant_warns_once() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.py", "print('no version here')\n");
        let mut bumper = VersionBumper::new(dir.path());
        let ui = HeadlessUi::new(true);
        assert!(bumper.apply("fix: a", None, &ui).is_none());
        assert!(bumper.apply("fix: b", None, &ui).is_none());
        let transcript = ui.transcript();
        assert_eq!(transcript.matches("APP_VERSION constant not found").count(), 1);
    }

    #[test]
    fn test_cache_survives_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.py", "APP_VERSION = \"1.0.0\"\n");
        let mut bumper = VersionBumper::new(dir.path());
        let ui = HeadlessUi::new(true);
        bumper.apply("fix: one", None, &ui).unwrap();
        let second = bumper.apply("feat: two", None, &ui).unwrap();
        assert_eq!(second.old_version, "1.0.1");
        assert_eq!(second.new_version, "1.1.0");
    }

    #[test]
    fn test_ignored_directories_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("node_modules")).unwrap();
        write(
            &dir.path().join("node_modules"),
            "pkg.py",
            "APP_VERSION = \"9.0.0\"\n",
        );
        let mut bumper = VersionBumper::new(dir.path());
        let ui = HeadlessUi::new(true);
        assert!(bumper.apply("fix: a", None, &ui).is_none());
    }
}
