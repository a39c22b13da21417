//! Per-organization forge token storage.
//!
//! On-disk format, one entry per line:
//!
//! ```text
//! big-comm=ghp_token    # token for one organization
//! ghp_token             # default token (no org prefix)
//! # comments and blank lines are ignored
//! ```
//!
//! The file lives at `~/.config/pkgflow/github_token` with permissions 0600.
//! A legacy `~/.GITHUB_TOKEN` is migrated once: copied, chmodded, removed.

use std::path::{Path, PathBuf};

use crate::config::APP_DIR;

const TOKEN_FILE: &str = "github_token";
const LEGACY_TOKEN_FILE: &str = ".GITHUB_TOKEN";

/// Reads and writes the token file.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
    legacy_path: Option<PathBuf>,
}

impl TokenStore {
    /// Store at the default XDG path with legacy-file migration enabled.
    pub fn default_store() -> anyhow::Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Ok(Self {
            path: config_dir.join(APP_DIR).join(TOKEN_FILE),
            legacy_path: home::home_dir().map(|h| h.join(LEGACY_TOKEN_FILE)),
        })
    }

    /// Store at an explicit path (tests, unusual setups). No migration.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            legacy_path: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// One-time migration: copy the legacy home-directory token file to the
    /// new path, restrict permissions, and remove the original.
    pub fn migrate_if_needed(&self) {
        let Some(legacy) = &self.legacy_path else {
            return;
        };
        if self.path.exists() || !legacy.exists() {
            return;
        }
        let Some(parent) = self.path.parent() else {
            return;
        };
        if std::fs::create_dir_all(parent).is_err() {
            return;
        }
        if std::fs::copy(legacy, &self.path).is_ok() {
            restrict_permissions(&self.path);
            let _ = std::fs::remove_file(legacy);
        }
    }

    /// All `(org, token)` pairs. Bare tokens come back with org `default`.
    pub fn read_all(&self) -> Vec<(String, String)> {
        self.migrate_if_needed();
        let Ok(content) = std::fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| match line.split_once('=') {
                Some((org, token)) => (org.trim().to_string(), token.trim().to_string()),
                None => ("default".to_string(), line.to_string()),
            })
            .collect()
    }

    /// Overwrite the token file with `entries` and enforce 0600.
    pub fn write_all(&self, entries: &[(String, String)]) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut content = String::new();
        for (org, token) in entries {
            if org == "default" {
                content.push_str(token);
            } else {
                content.push_str(&format!("{org}={token}"));
            }
            content.push('\n');
        }
        std::fs::write(&self.path, content)?;
        restrict_permissions(&self.path);
        Ok(())
    }

    /// Token for `organization`, falling back to the first default entry.
    pub fn get_token(&self, organization: &str) -> Option<String> {
        let mut default = None;
        for (org, token) in self.read_all() {
            if org.eq_ignore_ascii_case(organization) {
                return Some(token);
            }
            if org == "default" && default.is_none() {
                default = Some(token);
            }
        }
        default
    }

    /// Add or replace the token for `organization`. An empty organization
    /// targets the default entry.
    pub fn upsert(&self, organization: &str, token: &str) -> anyhow::Result<()> {
        let key = if organization.is_empty() {
            "default"
        } else {
            organization
        };
        let mut entries: Vec<(String, String)> = self
            .read_all()
            .into_iter()
            .filter(|(org, _)| !org.eq_ignore_ascii_case(key))
            .collect();
        entries.push((key.to_string(), token.to_string()));
        self.write_all(&entries)
    }

    /// Remove the entry for `organization`.
    pub fn delete(&self, organization: &str) -> anyhow::Result<()> {
        let entries: Vec<(String, String)> = self
            .read_all()
            .into_iter()
            .filter(|(org, _)| !org.eq_ignore_ascii_case(organization))
            .collect();
        self.write_all(&entries)
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) {}
