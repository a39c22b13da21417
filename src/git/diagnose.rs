//! Push-error diagnostics.
//!
//! Maps substrings of `git push` stderr to a diagnosis plus a remediation
//! list. Shared by the commit flows and the forge client so both report the
//! same guidance for the same failure.

/// Broad classification of a push failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushErrorKind {
    Authentication,
    NonFastForward,
    ProtectedBranch,
    Network,
    RepositoryNotFound,
    BadRefspec,
    Unknown,
}

/// Diagnosis and remediation for a failed push.
#[derive(Debug, Clone)]
pub struct PushDiagnosis {
    pub kind: PushErrorKind,
    pub diagnosis: String,
    pub solutions: Vec<String>,
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Analyze `git push` stderr and return a diagnosis with suggested fixes.
pub fn analyze_push_error(error_output: &str, branch: &str) -> PushDiagnosis {
    let error_lower = error_output.to_lowercase();

    if contains_any(
        &error_lower,
        &[
            "authentication",
            "permission denied",
            "403",
            "401",
            "could not read username",
        ],
    ) {
        return PushDiagnosis {
            kind: PushErrorKind::Authentication,
            diagnosis: "Authentication failed - credentials may be expired or invalid".into(),
            solutions: vec![
                "Run 'gh auth login' to authenticate with GitHub CLI".into(),
                "Check if your SSH key is added: ssh -T git@github.com".into(),
                "Generate a new Personal Access Token and store it with 'pkgflow token set'"
                    .into(),
            ],
        };
    }

    if contains_any(
        &error_lower,
        &["non-fast-forward", "updates were rejected", "fetch first"],
    ) {
        return PushDiagnosis {
            kind: PushErrorKind::NonFastForward,
            diagnosis: "Remote branch has changes you don't have locally".into(),
            solutions: vec![
                "Run 'pkgflow pull' first to get remote changes".into(),
                format!("Or run: git pull --rebase origin {branch}"),
                "Then try pushing again".into(),
            ],
        };
    }

    if contains_any(
        &error_lower,
        &["protected branch", "required status", "review required"],
    ) {
        return PushDiagnosis {
            kind: PushErrorKind::ProtectedBranch,
            diagnosis: "This branch has protection rules - direct push is not allowed".into(),
            solutions: vec![
                "Push to a development branch instead (e.g., dev-yourname)".into(),
                "Create a Pull Request to merge your changes".into(),
                "Ask a maintainer to temporarily disable branch protection".into(),
            ],
        };
    }

    if contains_any(
        &error_lower,
        &["could not resolve", "network", "connection refused", "timed out"],
    ) {
        return PushDiagnosis {
            kind: PushErrorKind::Network,
            diagnosis: "Network error - cannot reach remote server".into(),
            solutions: vec![
                "Check your internet connection".into(),
                "Try again in a few moments".into(),
                "Check if GitHub/remote is accessible".into(),
            ],
        };
    }

    if contains_any(&error_lower, &["repository not found", "does not exist"]) {
        return PushDiagnosis {
            kind: PushErrorKind::RepositoryNotFound,
            diagnosis: "Remote repository not found or you don't have access".into(),
            solutions: vec![
                "Verify the remote URL: git remote -v".into(),
                "Check if you have write access to the repository".into(),
                "Request access from the repository owner".into(),
            ],
        };
    }

    if error_lower.contains("src refspec") && error_lower.contains("does not match any") {
        return PushDiagnosis {
            kind: PushErrorKind::BadRefspec,
            diagnosis: "Local branch configuration issue".into(),
            solutions: vec![
                format!("Try: git push --set-upstream origin {branch}"),
                "Or verify you have commits on this branch".into(),
            ],
        };
    }

    // stderr is arbitrary UTF-8 (remote banners, unicode branch names);
    // cap on char boundaries, never byte offsets
    let snippet: String = error_output.trim().chars().take(200).collect();
    PushDiagnosis {
        kind: PushErrorKind::Unknown,
        diagnosis: format!("Push failed with error: {snippet}"),
        solutions: vec![
            "Check the error message above for details".into(),
            "Try running 'git push' in a terminal to see full output".into(),
            "Check GitHub status: https://githubstatus.com".into(),
        ],
    }
}
