//! The *AUR Build* flow.
//!
//! AUR builds never touch a local branch: the workflow clones the package
//! straight from aur.archlinux.org, so the flow is a validated dispatch.

use super::{FlowEngine, FlowError};
use crate::forge::DispatchRequest;
use crate::ui::LogStyle;

pub(super) fn run(
    engine: &mut FlowEngine<'_>,
    package_name: &str,
    tmate: bool,
) -> Result<(), FlowError> {
    let ui = engine.ui;

    if !engine.settings().aur_features_enabled {
        return Err(FlowError::PreconditionFailed(
            "AUR features are disabled. Enable 'aur_features_enabled' in the settings file."
                .into(),
        ));
    }

    let package_name = normalize_aur_name(package_name);
    if package_name.is_empty() {
        return Err(FlowError::PreconditionFailed(
            "AUR package name cannot be empty.".into(),
        ));
    }

    let organization = engine.organization();
    let workflow_repo = engine.settings().workflow_repository_for(&organization);
    let request = DispatchRequest::for_aur(workflow_repo.clone(), package_name.clone(), tmate);

    ui.log(LogStyle::Cyan, "AUR - Summary of Choices");
    ui.log(LogStyle::White, &format!("  Package AUR Name: {package_name}"));
    ui.log(LogStyle::White, &format!("  Url:              {}", request.aur_url()));
    ui.log(
        LogStyle::White,
        &format!("  TMATE Debug:      {}", if tmate { "✓" } else { "✗" }),
    );

    if engine.is_dry_run() {
        ui.log(LogStyle::Green, "✓ Dry-run completed (no workflow triggered)");
        return Ok(());
    }

    if engine.policy().show_preview && !ui.confirm("🚀 Trigger AUR package build?") {
        return Err(FlowError::UserCancel);
    }

    engine.check_cancelled()?;
    ui.log(LogStyle::Cyan, "Starting AUR package build...");

    let client = engine.forge_client()?;
    client.dispatch(&request, &engine.settings().github_base_url)?;

    ui.log(LogStyle::Green, "✓ AUR build triggered successfully!");
    ui.log(
        LogStyle::Cyan,
        &format!(
            "Monitor build at: {}/{workflow_repo}/actions",
            engine.settings().github_base_url
        ),
    );
    Ok(())
}

/// Users paste names as `aur-foo` or `aur/foo`; the workflow wants `foo`.
pub(super) fn normalize_aur_name(name: &str) -> String {
    let mut name = name.trim();
    loop {
        let stripped = name
            .strip_prefix("aur-")
            .or_else(|| name.strip_prefix("aur/"))
            .unwrap_or(name);
        if stripped == name {
            break;
        }
        name = stripped;
    }
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_aur_name() {
        assert_eq!(normalize_aur_name("showtime"), "showtime");
        assert_eq!(normalize_aur_name("aur-showtime"), "showtime");
        assert_eq!(normalize_aur_name("aur/showtime"), "showtime");
        assert_eq!(normalize_aur_name("  aur-showtime "), "showtime");
        assert_eq!(normalize_aur_name(""), "");
    }
}
