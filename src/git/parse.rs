//! Parsers for git plumbing output.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{CommitInfo, CommitSummary, ConflictStages, GitError};

static NOREPLY_EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:\d+\+)?([^@]+)@users\.noreply\.github\.com$").expect("static regex")
});

/// Extract `owner/name` from an origin URL.
///
/// Handles the common shapes:
/// - `https://github.com/owner/name.git`
/// - `git@github.com:owner/name.git`
/// - `ssh://git@github.com/owner/name`
pub(crate) fn parse_owner_name(url: &str) -> Option<String> {
    let url = url.trim().trim_end_matches('/');
    let url = url.strip_suffix(".git").unwrap_or(url);

    static OWNER_NAME: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"[:/]([^/:]+/[^/:]+)$").expect("static regex"));

    OWNER_NAME
        .captures(url)
        .map(|caps| caps[1].to_string())
        .filter(|repo| !repo.starts_with('/') && !repo.ends_with('/'))
}

/// Parse the output of `git rev-list --count`.
pub(crate) fn parse_count(output: &str) -> Result<usize, GitError> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    trimmed
        .parse()
        .map_err(|e| GitError::ParseError(format!("Failed to parse commit count: {e}")))
}

/// Parse `git log --oneline` into `(sha, subject)` pairs.
pub(crate) fn parse_oneline_log(output: &str) -> Vec<CommitSummary> {
    output
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|line| {
            let (sha, subject) = line.split_once(' ').unwrap_or((line, ""));
            CommitSummary {
                sha: sha.to_string(),
                subject: subject.to_string(),
            }
        })
        .collect()
}

/// Parse `git log --pretty=format:%H|%an|%ad|%s --date=short`.
pub(crate) fn parse_commit_log(output: &str) -> Vec<CommitInfo> {
    output
        .lines()
        .filter_map(|line| {
            let mut parts = line.splitn(4, '|');
            Some(CommitInfo {
                sha: parts.next()?.to_string(),
                author: parts.next()?.to_string(),
                date: parts.next()?.to_string(),
                subject: parts.next().unwrap_or("").to_string(),
            })
        })
        .collect()
}

/// Parse `git ls-files -u` output into the set of present stages.
///
/// Each line is `<mode> <sha> <stage>\t<path>`.
pub(crate) fn parse_stages(output: &str) -> ConflictStages {
    let mut stages = ConflictStages::default();
    for line in output.lines() {
        let meta = line.split('\t').next().unwrap_or("");
        let Some(stage) = meta.split_whitespace().nth(2) else {
            continue;
        };
        match stage {
            "1" => stages.base = true,
            "2" => stages.ours = true,
            "3" => stages.theirs = true,
            _ => {}
        }
    }
    stages
}

/// Parse `for-each-ref --format=%(refname:short)|%(committerdate:unix)`.
pub(crate) fn parse_ref_epochs(output: &str) -> Vec<(String, i64)> {
    output
        .lines()
        .filter_map(|line| {
            let (name, epoch) = line.split_once('|')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), epoch.trim().parse().unwrap_or(0)))
        })
        .collect()
}

/// Branch-name filter: entries ending in `*` match by prefix, others exactly.
pub(crate) fn matches_filter(name: &str, filters: &[&str]) -> bool {
    filters.iter().any(|f| match f.strip_suffix('*') {
        Some(prefix) => name.starts_with(prefix),
        None => name == *f,
    })
}

/// Username from a `*@users.noreply.github.com` email, if it is one.
pub(crate) fn parse_noreply_username(email: &str) -> Option<String> {
    NOREPLY_EMAIL
        .captures(email.trim())
        .map(|caps| caps[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_owner_name_https() {
        assert_eq!(
            parse_owner_name("https://github.com/big-comm/calamares"),
            Some("big-comm/calamares".to_string())
        );
        assert_eq!(
            parse_owner_name("https://github.com/big-comm/calamares.git"),
            Some("big-comm/calamares".to_string())
        );
    }

    #[test]
    fn test_parse_owner_name_ssh() {
        assert_eq!(
            parse_owner_name("git@github.com:big-comm/calamares.git"),
            Some("big-comm/calamares".to_string())
        );
        assert_eq!(
            parse_owner_name("ssh://git@github.com/big-comm/calamares"),
            Some("big-comm/calamares".to_string())
        );
    }

    #[test]
    fn test_parse_owner_name_trailing_slash() {
        assert_eq!(
            parse_owner_name("https://github.com/owner/name/"),
            Some("owner/name".to_string())
        );
    }

    #[test]
    fn test_parse_owner_name_rejects_bare_host() {
        assert_eq!(parse_owner_name("https://github.com"), None);
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("3\n").unwrap(), 3);
        assert_eq!(parse_count("").unwrap(), 0);
        assert!(parse_count("abc").is_err());
    }

    #[test]
    fn test_parse_oneline_log() {
        let output = "abc1234 fix: typo\ndef5678 feat: new widget\n";
        let commits = parse_oneline_log(output);
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].sha, "abc1234");
        assert_eq!(commits[0].subject, "fix: typo");
        assert_eq!(commits[1].subject, "feat: new widget");
    }

    #[test]
    fn test_parse_oneline_log_subject_missing() {
        let commits = parse_oneline_log("abc1234\n");
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].subject, "");
    }

    #[test]
    fn test_parse_commit_log() {
        let output = "\
deadbeef|Alice|2025-06-01|fix: typo in README
cafebabe|Bob|2025-05-30|feat(ui): add button|with|pipes";
        let commits = parse_commit_log(output);
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].author, "Alice");
        assert_eq!(commits[0].date, "2025-06-01");
        // Subject keeps embedded pipes intact
        assert_eq!(commits[1].subject, "feat(ui): add button|with|pipes");
    }

    #[test]
    fn test_parse_stages_content_conflict() {
        let output = "\
100644 1111111111111111111111111111111111111111 1\tsrc/main.rs
100644 2222222222222222222222222222222222222222 2\tsrc/main.rs
100644 3333333333333333333333333333333333333333 3\tsrc/main.rs";
        let stages = parse_stages(output);
        assert!(stages.base && stages.ours && stages.theirs);
        assert_eq!(stages.kind(), crate::git::ConflictKind::Content);
    }

    #[test]
    fn test_parse_stages_modify_delete() {
        // Only "theirs" present: our side deleted the file
        let output = "\
100644 1111111111111111111111111111111111111111 1\tdata.mo
100644 3333333333333333333333333333333333333333 3\tdata.mo";
        let stages = parse_stages(output);
        assert!(!stages.ours);
        assert!(stages.theirs);
        assert_eq!(stages.kind(), crate::git::ConflictKind::DeletedByUs);
    }

    #[test]
    fn test_parse_stages_path_with_spaces() {
        let output = "100644 1111111111111111111111111111111111111111 2\tdocs/my file.txt";
        let stages = parse_stages(output);
        assert!(stages.ours);
        assert!(!stages.theirs);
    }

    #[test]
    fn test_parse_ref_epochs() {
        let output = "main|100\norigin/dev-alice|300\n";
        let refs = parse_ref_epochs(output);
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0], ("main".to_string(), 100));
        assert_eq!(refs[1], ("origin/dev-alice".to_string(), 300));
    }

    #[test]
    fn test_matches_filter() {
        let filters = ["main", "master", "dev", "dev-*"];
        assert!(matches_filter("main", &filters));
        assert!(matches_filter("dev", &filters));
        assert!(matches_filter("dev-alice", &filters));
        assert!(!matches_filter("feature/x", &filters));
        assert!(!matches_filter("develop", &filters));
    }

    #[test]
    fn test_parse_noreply_username() {
        assert_eq!(
            parse_noreply_username("12345+alice@users.noreply.github.com"),
            Some("alice".to_string())
        );
        assert_eq!(
            parse_noreply_username("bob@users.noreply.github.com"),
            Some("bob".to_string())
        );
        assert_eq!(parse_noreply_username("carol@example.com"), None);
    }
}
