//! Dispatch payloads for the forge's `repository_dispatch` endpoint.

use serde_json::{Value, json};

/// Which package repository a build targets.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    clap::ValueEnum,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub enum RepoType {
    Testing,
    Stable,
    Extra,
    Aur,
}

impl RepoType {
    /// Testing builds run from the user's dev branch; stable and extra
    /// build from `main` when it carries the latest source commit.
    pub fn builds_from_main(self) -> bool {
        matches!(self, RepoType::Stable | RepoType::Extra)
    }
}

/// Everything the dispatch endpoint needs for one build.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    /// `owner/name` of the repository whose workflows receive the dispatch.
    pub workflow_repo: String,
    /// Package name from the local PKGBUILD (or the AUR package name).
    pub package_name: String,
    pub repo_type: RepoType,
    /// Branch reference the workflow builds from; computed by the flow
    /// engine (dev branch for testing, `main` or the source branch for
    /// stable/extra).
    pub workflow_branch: String,
    /// `owner/name` of the package repository itself. Empty for AUR.
    pub source_repo: String,
    /// Dev branch to advertise alongside `workflow_branch` when they
    /// differ (testing builds only).
    pub new_branch: Option<String>,
    /// Open a tmate debug session in the workflow run.
    pub tmate: bool,
}

impl DispatchRequest {
    pub fn for_aur(workflow_repo: String, package_name: String, tmate: bool) -> Self {
        Self {
            workflow_repo,
            package_name,
            repo_type: RepoType::Aur,
            workflow_branch: String::new(),
            source_repo: String::new(),
            new_branch: None,
            tmate,
        }
    }

    pub fn is_aur(&self) -> bool {
        self.repo_type == RepoType::Aur
    }

    /// Wire `event_type`: AUR dispatches are keyed by package, package
    /// builds share one event.
    pub fn event_type(&self) -> String {
        if self.is_aur() {
            format!("aur-{}", self.package_name)
        } else {
            "package-build".to_string()
        }
    }

    /// Clone URL for an AUR package.
    pub fn aur_url(&self) -> String {
        format!("https://aur.archlinux.org/{}.git", self.package_name)
    }

    /// The JSON body for `POST /repos/<workflow_repo>/dispatches`.
    pub fn body(&self, github_base_url: &str) -> Value {
        if self.is_aur() {
            json!({
                "event_type": self.event_type(),
                "client_payload": {
                    "package_name": self.package_name,
                    "aur_url": self.aur_url(),
                    "branch_type": "aur",
                    "build_env": "aur",
                    "tmate": self.tmate,
                }
            })
        } else {
            let mut payload = json!({
                "package_name": self.package_name,
                "branch": self.workflow_branch,
                "branch_type": self.repo_type.to_string(),
                "build_env": "normal",
                "url": format!("{github_base_url}/{}", self.source_repo),
                "tmate": self.tmate,
            });
            // Advertised only when it adds information beyond `branch`
            if let Some(new_branch) = &self.new_branch
                && *new_branch != self.workflow_branch
            {
                payload["new_branch"] = json!(new_branch);
            }
            json!({
                "event_type": self.event_type(),
                "client_payload": payload,
            })
        }
    }
}
