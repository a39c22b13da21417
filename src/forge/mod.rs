//! HTTP client for the forge (GitHub-shaped) API.
//!
//! Stateless wrapper over the handful of endpoints the flows need: workflow
//! dispatch, pull-request create/merge with a mergeability poll, workflow-run
//! and tag housekeeping, and ref management. Idempotent reads are retried
//! once on network failure; writes surface immediately.

mod payload;

pub use payload::{DispatchRequest, RepoType};

use std::time::Duration;

use color_print::cformat;
use serde::Deserialize;

use crate::styling::{ERROR_EMOJI, HINT_EMOJI, WARNING_EMOJI};
use crate::token::TokenStore;
use crate::ui::{HostUi, LogStyle};

/// Poll cadence while waiting for a PR to become mergeable.
const MERGEABILITY_POLL_INTERVAL: Duration = Duration::from_secs(2);
const MERGEABILITY_MAX_ATTEMPTS: usize = 30;

const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Errors from forge interactions.
#[derive(Debug)]
pub enum ForgeError {
    /// No token is stored for the organization; the host should prompt for
    /// one and re-drive the flow.
    SetupRequired { organization: String },
    /// 401/403 - token present but rejected.
    Auth { status: u16, message: String },
    /// Any other non-success status.
    Status { status: u16, message: String },
    /// Transport-level failure (DNS, timeout, TLS).
    Network(String),
}

impl std::fmt::Display for ForgeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ForgeError::SetupRequired { organization } => write!(
                f,
                "{}\n\n{}",
                cformat!("{WARNING_EMOJI} <yellow>No forge token configured for <bold>{organization}</></>"),
                cformat!("{HINT_EMOJI} <dim>Store one with 'pkgflow token set'</>")
            ),
            ForgeError::Auth { status, message } => write!(
                f,
                "{}",
                cformat!("{ERROR_EMOJI} <red>Forge authentication failed ({status}): {message}</>")
            ),
            ForgeError::Status { status, message } => write!(
                f,
                "{}",
                cformat!("{ERROR_EMOJI} <red>Forge request failed ({status}): {message}</>")
            ),
            ForgeError::Network(message) => write!(
                f,
                "{}",
                cformat!("{ERROR_EMOJI} <red>Network error talking to the forge: {message}</>")
            ),
        }
    }
}

impl std::error::Error for ForgeError {}

impl From<reqwest::Error> for ForgeError {
    fn from(e: reqwest::Error) -> Self {
        ForgeError::Network(e.to_string())
    }
}

/// Outcome of the pre-merge mergeability poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeReadiness {
    Ready,
    /// `mergeable_state == "dirty"`: the PR has conflicts.
    Dirty,
    /// Still `unknown`/`checking` after the full poll budget.
    Timeout { last_state: String },
}

/// A created pull request.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub html_url: String,
}

#[derive(Debug, Deserialize)]
struct PullRequestStatus {
    mergeable: Option<bool>,
    mergeable_state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MergeResponse {
    sha: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WorkflowRun {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct WorkflowRunsResponse {
    workflow_runs: Vec<WorkflowRun>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

#[derive(Debug, Deserialize)]
struct BranchResponse {
    commit: BranchCommit,
}

#[derive(Debug, Deserialize)]
struct BranchCommit {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    login: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Authenticated client. Instances are interchangeable and hold no state
/// beyond the token.
#[derive(Debug)]
pub struct ForgeClient {
    http: reqwest::blocking::Client,
    token: String,
    api_base: String,
}

impl ForgeClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            http: reqwest::blocking::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            token: token.into(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Point at a different API root (enterprise installs, tests).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Build a client from the token store, signalling setup-required when
    /// no token exists for the organization.
    pub fn from_store(store: &TokenStore, organization: &str) -> Result<Self, ForgeError> {
        match store.get_token(organization) {
            Some(token) if !token.is_empty() => Ok(Self::new(token)),
            _ => Err(ForgeError::SetupRequired {
                organization: organization.to_string(),
            }),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_base)
    }

    fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<reqwest::blocking::Response, ForgeError> {
        let mut builder = self
            .http
            .request(method, self.url(path))
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github.v3+json")
            .header("User-Agent", "pkgflow");
        if let Some(body) = body {
            builder = builder.json(body);
        }
        Ok(builder.send()?)
    }

    /// GET with one retry on transport failure (reads are idempotent).
    fn get(&self, path: &str) -> Result<reqwest::blocking::Response, ForgeError> {
        match self.request(reqwest::Method::GET, path, None) {
            Ok(response) => Ok(response),
            Err(ForgeError::Network(first)) => {
                log::debug!("retrying GET {path} after network error: {first}");
                self.request(reqwest::Method::GET, path, None)
            }
            Err(other) => Err(other),
        }
    }

    fn classify_failure(response: reqwest::blocking::Response) -> ForgeError {
        let status = response.status().as_u16();
        let message = response
            .json::<ErrorBody>()
            .ok()
            .and_then(|b| b.message)
            .unwrap_or_else(|| "unknown error".to_string());
        if status == 401 || status == 403 {
            ForgeError::Auth { status, message }
        } else {
            ForgeError::Status { status, message }
        }
    }

    fn expect_status(
        response: reqwest::blocking::Response,
        accepted: &[u16],
    ) -> Result<reqwest::blocking::Response, ForgeError> {
        if accepted.contains(&response.status().as_u16()) {
            Ok(response)
        } else {
            Err(Self::classify_failure(response))
        }
    }

    /// `GET /user` - login of the token's owner.
    pub fn authenticated_user(&self) -> Result<String, ForgeError> {
        let response = Self::expect_status(self.get("/user")?, &[200])?;
        Ok(response.json::<UserResponse>()?.login)
    }

    /// `POST /repos/<workflow_repo>/dispatches`. Success is 204.
    pub fn dispatch(
        &self,
        request: &DispatchRequest,
        github_base_url: &str,
    ) -> Result<(), ForgeError> {
        let path = format!("/repos/{}/dispatches", request.workflow_repo);
        let body = request.body(github_base_url);
        log::debug!("dispatching {} to {}", request.event_type(), request.workflow_repo);
        let response = self.request(reqwest::Method::POST, &path, Some(&body))?;
        Self::expect_status(response, &[204])?;
        Ok(())
    }

    /// Head SHA of a branch, or `None` when the branch does not exist.
    pub fn branch_sha(&self, repo: &str, branch: &str) -> Result<Option<String>, ForgeError> {
        let response = self.get(&format!("/repos/{repo}/branches/{branch}"))?;
        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        let response = Self::expect_status(response, &[200])?;
        Ok(Some(response.json::<BranchResponse>()?.commit.sha))
    }

    /// Create `refs/heads/<branch>` at `sha`.
    pub fn create_branch_ref(&self, repo: &str, branch: &str, sha: &str) -> Result<(), ForgeError> {
        let body = serde_json::json!({
            "ref": format!("refs/heads/{branch}"),
            "sha": sha,
        });
        let response =
            self.request(reqwest::Method::POST, &format!("/repos/{repo}/git/refs"), Some(&body))?;
        Self::expect_status(response, &[200, 201])?;
        Ok(())
    }

    /// Create `refs/tags/<tag>` at `sha`.
    pub fn create_tag_ref(&self, repo: &str, tag: &str, sha: &str) -> Result<(), ForgeError> {
        let body = serde_json::json!({
            "ref": format!("refs/tags/{tag}"),
            "sha": sha,
        });
        let response =
            self.request(reqwest::Method::POST, &format!("/repos/{repo}/git/refs"), Some(&body))?;
        Self::expect_status(response, &[200, 201])?;
        Ok(())
    }

    /// `POST /repos/<repo>/pulls`. Success is 200/201.
    pub fn create_pull_request(
        &self,
        repo: &str,
        head: &str,
        base: &str,
        title: &str,
        body_text: &str,
    ) -> Result<PullRequest, ForgeError> {
        let body = serde_json::json!({
            "title": title,
            "body": body_text,
            "head": head,
            "base": base,
        });
        let response =
            self.request(reqwest::Method::POST, &format!("/repos/{repo}/pulls"), Some(&body))?;
        let response = Self::expect_status(response, &[200, 201])?;
        Ok(response.json()?)
    }

    /// Poll until the PR reports `mergeable == true && state == "clean"`, a
    /// conflict (`dirty`), or the attempt budget runs out.
    pub fn wait_for_mergeable(
        &self,
        repo: &str,
        number: u64,
        ui: &dyn HostUi,
    ) -> Result<MergeReadiness, ForgeError> {
        ui.log(LogStyle::Cyan, "Waiting for PR to be ready for merge...");
        let mut last_state = "unknown".to_string();

        for attempt in 1..=MERGEABILITY_MAX_ATTEMPTS {
            let response =
                Self::expect_status(self.get(&format!("/repos/{repo}/pulls/{number}"))?, &[200])?;
            let status: PullRequestStatus = response.json()?;

            let state = status.mergeable_state.unwrap_or_else(|| "unknown".to_string());
            ui.log(
                LogStyle::Dim,
                &format!(
                    "Attempt {attempt}/{MERGEABILITY_MAX_ATTEMPTS}: mergeable={:?}, state={state}",
                    status.mergeable
                ),
            );

            match (status.mergeable, state.as_str()) {
                (Some(true), "clean") => {
                    ui.log(LogStyle::Green, "PR ready for merge!");
                    return Ok(MergeReadiness::Ready);
                }
                (Some(false), "dirty") => {
                    ui.log(LogStyle::Red, "PR has conflicts");
                    return Ok(MergeReadiness::Dirty);
                }
                (_, "unknown" | "checking") => {
                    last_state = state;
                    if attempt < MERGEABILITY_MAX_ATTEMPTS {
                        std::thread::sleep(MERGEABILITY_POLL_INTERVAL);
                    }
                }
                (_, other) => {
                    return Ok(MergeReadiness::Timeout {
                        last_state: other.to_string(),
                    });
                }
            }
        }

        ui.log(LogStyle::Yellow, "Timeout waiting for PR to be ready");
        Ok(MergeReadiness::Timeout { last_state })
    }

    /// `PUT /repos/<repo>/pulls/<n>/merge`. Success is 200; returns the
    /// merge commit SHA.
    pub fn merge_pull_request(
        &self,
        repo: &str,
        number: u64,
        commit_title: &str,
        commit_message: &str,
    ) -> Result<String, ForgeError> {
        let body = serde_json::json!({
            "commit_title": commit_title,
            "commit_message": commit_message,
            "merge_method": "merge",
        });
        let response = self.request(
            reqwest::Method::PUT,
            &format!("/repos/{repo}/pulls/{number}/merge"),
            Some(&body),
        )?;
        let response = Self::expect_status(response, &[200])?;
        let merged: MergeResponse = response.json()?;
        Ok(merged.sha.unwrap_or_default())
    }

    /// IDs of workflow runs with the given status.
    pub fn workflow_runs(&self, repo: &str, status: &str) -> Result<Vec<u64>, ForgeError> {
        let response = Self::expect_status(
            self.get(&format!("/repos/{repo}/actions/runs?status={status}"))?,
            &[200],
        )?;
        let runs: WorkflowRunsResponse = response.json()?;
        Ok(runs.workflow_runs.into_iter().map(|r| r.id).collect())
    }

    pub fn delete_workflow_run(&self, repo: &str, run_id: u64) -> Result<(), ForgeError> {
        let response = self.request(
            reqwest::Method::DELETE,
            &format!("/repos/{repo}/actions/runs/{run_id}"),
            None,
        )?;
        Self::expect_status(response, &[200, 204])?;
        Ok(())
    }

    /// Delete every run with the given status; returns how many went away.
    pub fn clean_workflow_runs(
        &self,
        repo: &str,
        status: &str,
        ui: &dyn HostUi,
    ) -> Result<usize, ForgeError> {
        ui.log(
            LogStyle::Cyan,
            &format!("Cleaning workflow runs with '{status}' status..."),
        );
        let runs = self.workflow_runs(repo, status)?;
        if runs.is_empty() {
            ui.log(LogStyle::Yellow, &format!("No runs with '{status}' status found."));
            return Ok(0);
        }

        let mut deleted = 0;
        for run_id in runs {
            ui.log(LogStyle::Yellow, &format!("Deleting run {run_id}..."));
            match self.delete_workflow_run(repo, run_id) {
                Ok(()) => deleted += 1,
                Err(e) => ui.log(LogStyle::Red, &format!("Error deleting run {run_id}: {e}")),
            }
        }
        ui.log(
            LogStyle::Green,
            &format!("Deleted {deleted} workflow run(s) with '{status}' status."),
        );
        Ok(deleted)
    }

    pub fn tags(&self, repo: &str) -> Result<Vec<String>, ForgeError> {
        let response = Self::expect_status(self.get(&format!("/repos/{repo}/tags"))?, &[200])?;
        let tags: Vec<TagEntry> = response.json()?;
        Ok(tags.into_iter().map(|t| t.name).collect())
    }

    /// Tags are removed by deleting their refs.
    pub fn delete_tag(&self, repo: &str, tag: &str) -> Result<(), ForgeError> {
        let response = self.request(
            reqwest::Method::DELETE,
            &format!("/repos/{repo}/git/refs/tags/{tag}"),
            None,
        )?;
        Self::expect_status(response, &[200, 204])?;
        Ok(())
    }

    /// Delete every tag in the repository; returns how many went away.
    pub fn clean_all_tags(&self, repo: &str, ui: &dyn HostUi) -> Result<usize, ForgeError> {
        ui.log(LogStyle::Cyan, "Getting tag list...");
        let tags = self.tags(repo)?;
        if tags.is_empty() {
            ui.log(LogStyle::Yellow, "No tags found.");
            return Ok(0);
        }

        let mut deleted = 0;
        for tag in tags {
            ui.log(LogStyle::Yellow, &format!("Deleting tag {tag}..."));
            match self.delete_tag(repo, &tag) {
                Ok(()) => deleted += 1,
                Err(e) => ui.log(LogStyle::Red, &format!("Error deleting tag {tag}: {e}")),
            }
        }
        ui.log(LogStyle::Green, &format!("Deleted {deleted} tag(s)."));
        Ok(deleted)
    }
}
