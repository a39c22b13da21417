//! User settings, stored as JSON at `~/.config/pkgflow/config.json`.
//!
//! Unknown keys are preserved across load/save cycles so older and newer
//! versions of the tool can share one file. Missing keys fall back to
//! defaults. A one-time migration picks up the settings file of the
//! predecessor tool if the new path does not exist yet.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::conflict::ConflictStrategy;
use crate::policy::OperationMode;

/// Application directory name under the XDG config root.
pub const APP_DIR: &str = "pkgflow";

/// Settings-file name inside [`APP_DIR`].
const CONFIG_FILE: &str = "config.json";

/// Predecessor tool's settings file, migrated once if present.
const LEGACY_CONFIG: &str = "build-package/settings.json";

fn default_true() -> bool {
    true
}

fn default_github_base() -> String {
    "https://github.com".to_string()
}

/// Persistent user settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub operation_mode: OperationMode,

    #[serde(default)]
    pub conflict_strategy: ConflictStrategy,

    /// Whether pull flows prepend a fetch step.
    #[serde(default = "default_true")]
    pub auto_fetch: bool,

    /// Whether commit flows switch to the user branch silently.
    #[serde(default = "default_true")]
    pub auto_switch_branch: bool,

    /// Whether commit flows pull before committing.
    #[serde(default)]
    pub auto_pull: bool,

    /// Whether the version bumper runs on commit.
    #[serde(default = "default_true")]
    pub auto_version_bump: bool,

    /// Whether each plan step's argv is rendered in previews.
    #[serde(default)]
    pub show_git_commands: bool,

    /// Override for destructive-step gating; `None` follows the mode table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirm_destructive: Option<bool>,

    #[serde(default)]
    pub package_features_enabled: bool,

    #[serde(default)]
    pub aur_features_enabled: bool,

    /// Forge organization; empty means "detect from the origin URL".
    #[serde(default)]
    pub organization_name: String,

    /// Repository whose workflows receive dispatches; empty means
    /// `<organization>/build-package`.
    #[serde(default)]
    pub workflow_repository: String,

    #[serde(default = "default_github_base")]
    pub github_base_url: String,

    /// Keys this version doesn't know about, preserved verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            operation_mode: OperationMode::default(),
            conflict_strategy: ConflictStrategy::default(),
            auto_fetch: true,
            auto_switch_branch: true,
            auto_pull: false,
            auto_version_bump: true,
            show_git_commands: false,
            confirm_destructive: None,
            package_features_enabled: false,
            aur_features_enabled: false,
            organization_name: String::new(),
            workflow_repository: String::new(),
            github_base_url: default_github_base(),
            extra: serde_json::Map::new(),
        }
    }
}

impl Settings {
    /// Default config file path.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load settings from the default path, falling back to defaults when
    /// the file is missing. A malformed file is an error, not a silent
    /// reset - the user's settings must never be clobbered by accident.
    pub fn load() -> anyhow::Result<Self> {
        let Some(path) = Self::default_path() else {
            return Ok(Self::default());
        };
        Self::migrate_legacy(&path);
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Malformed settings file {}: {e}", path.display()))?;
        Ok(settings)
    }

    /// Save to the default path, creating the directory as needed.
    pub fn save(&self) -> anyhow::Result<()> {
        let Some(path) = Self::default_path() else {
            anyhow::bail!("Could not determine config directory");
        };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json + "\n")?;
        Ok(())
    }

    /// Copy the predecessor tool's settings into place, once.
    fn migrate_legacy(new_path: &Path) {
        if new_path.exists() {
            return;
        }
        let Some(legacy) = dirs::config_dir().map(|d| d.join(LEGACY_CONFIG)) else {
            return;
        };
        if !legacy.exists() {
            return;
        }
        if let Some(parent) = new_path.parent()
            && std::fs::create_dir_all(parent).is_ok()
        {
            let _ = std::fs::copy(&legacy, new_path);
        }
    }

    /// Effective forge organization: the configured one, or the owner half
    /// of `owner/name`.
    pub fn organization_or<'a>(&'a self, owner_slash_name: &'a str) -> &'a str {
        if !self.organization_name.is_empty() {
            &self.organization_name
        } else {
            owner_slash_name.split('/').next().unwrap_or("")
        }
    }

    /// Repository whose workflows receive dispatch calls.
    pub fn workflow_repository_for(&self, organization: &str) -> String {
        if !self.workflow_repository.is_empty() {
            self.workflow_repository.clone()
        } else {
            format!("{organization}/build-package")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.operation_mode, OperationMode::Safe);
        assert!(settings.auto_fetch);
        assert!(settings.auto_version_bump);
        assert!(!settings.auto_pull);
        assert!(!settings.show_git_commands);
        assert_eq!(settings.confirm_destructive, None);
        assert!(!settings.package_features_enabled);
        assert_eq!(settings.github_base_url, "https://github.com");
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(settings.operation_mode, OperationMode::Safe);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(Settings::load_from(&path).is_err());
    }

    #[test]
    fn test_partial_file_keeps_defaults_for_missing_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"operation_mode": "expert"}"#).unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.operation_mode, OperationMode::Expert);
        assert!(settings.auto_fetch);
    }

    #[test]
    fn test_unknown_keys_survive_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"operation_mode": "quick", "future_feature": {"nested": true}}"#,
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        settings.save_to(&path).unwrap();

        let reread = std::fs::read_to_string(&path).unwrap();
        assert!(reread.contains("future_feature"));
        assert!(reread.contains("nested"));
        let reloaded = Settings::load_from(&path).unwrap();
        assert_eq!(reloaded.operation_mode, OperationMode::Quick);
    }

    #[test]
    fn test_organization_fallback() {
        let mut settings = Settings::default();
        assert_eq!(settings.organization_or("big-comm/calamares"), "big-comm");
        settings.organization_name = "biglinux".into();
        assert_eq!(settings.organization_or("big-comm/calamares"), "biglinux");
    }

    #[test]
    fn test_workflow_repository_fallback() {
        let mut settings = Settings::default();
        assert_eq!(
            settings.workflow_repository_for("big-comm"),
            "big-comm/build-package"
        );
        settings.workflow_repository = "biglinux/workflows".into();
        assert_eq!(settings.workflow_repository_for("big-comm"), "biglinux/workflows");
    }
}
