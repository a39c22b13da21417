//! Operation modes and the automation policy derived from them.

use serde::{Deserialize, Serialize};

/// How much automation the user asked for.
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
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OperationMode {
    /// More control: previews on, nothing automatic.
    #[default]
    Safe,
    /// Fast automation, destructive steps still confirmed.
    Quick,
    /// Maximum automation, no previews, no destructive confirmation.
    Expert,
}

/// Boolean table consumed by the flow engine and conflict resolver.
///
/// Immutable once derived; host overrides produce a new value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModePolicy {
    pub auto_resolve_conflicts: bool,
    pub auto_switch_branches: bool,
    pub auto_merge: bool,
    pub auto_pull: bool,
    pub confirm_destructive: bool,
    pub show_preview: bool,
}

impl ModePolicy {
    /// The policy table for an operation mode.
    pub fn for_mode(mode: OperationMode) -> Self {
        match mode {
            OperationMode::Safe => Self {
                auto_resolve_conflicts: false,
                auto_switch_branches: false,
                auto_merge: false,
                auto_pull: false,
                confirm_destructive: true,
                show_preview: true,
            },
            OperationMode::Quick => Self {
                auto_resolve_conflicts: true,
                auto_switch_branches: true,
                auto_merge: true,
                auto_pull: true,
                confirm_destructive: true,
                show_preview: false,
            },
            OperationMode::Expert => Self {
                auto_resolve_conflicts: true,
                auto_switch_branches: true,
                auto_merge: true,
                auto_pull: true,
                confirm_destructive: false,
                show_preview: false,
            },
        }
    }

    /// Apply the `confirm_destructive` settings-file override, if set.
    pub fn with_confirm_destructive(mut self, confirm: Option<bool>) -> Self {
        if let Some(confirm) = confirm {
            self.confirm_destructive = confirm;
        }
        self
    }

    /// Overrides for hosts with their own preview surface (a GUI): branch
    /// switching must not block on terminal menus, and the CLI preview is
    /// suppressed in favor of the host's.
    pub fn with_host_preview(mut self) -> Self {
        self.auto_switch_branches = true;
        self.auto_pull = true;
        self.show_preview = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(OperationMode::Safe, false, false, false, false, true, true)]
    #[case(OperationMode::Quick, true, true, true, true, true, false)]
    #[case(OperationMode::Expert, true, true, true, true, false, false)]
    fn test_policy_table(
        #[case] mode: OperationMode,
        #[case] auto_resolve_conflicts: bool,
        #[case] auto_switch_branches: bool,
        #[case] auto_merge: bool,
        #[case] auto_pull: bool,
        #[case] confirm_destructive: bool,
        #[case] show_preview: bool,
    ) {
        let policy = ModePolicy::for_mode(mode);
        assert_eq!(policy.auto_resolve_conflicts, auto_resolve_conflicts);
        assert_eq!(policy.auto_switch_branches, auto_switch_branches);
        assert_eq!(policy.auto_merge, auto_merge);
        assert_eq!(policy.auto_pull, auto_pull);
        assert_eq!(policy.confirm_destructive, confirm_destructive);
        assert_eq!(policy.show_preview, show_preview);
    }

    #[test]
    fn test_mode_round_trips_through_strings() {
        for mode in [OperationMode::Safe, OperationMode::Quick, OperationMode::Expert] {
            let text = mode.to_string();
            let parsed: OperationMode = text.parse().unwrap();
            assert_eq!(parsed, mode);
        }
        assert_eq!("expert".parse::<OperationMode>().unwrap(), OperationMode::Expert);
    }

    #[test]
    fn test_confirm_destructive_override() {
        let policy = ModePolicy::for_mode(OperationMode::Expert).with_confirm_destructive(Some(true));
        assert!(policy.confirm_destructive);

        let unchanged = ModePolicy::for_mode(OperationMode::Safe).with_confirm_destructive(None);
        assert!(unchanged.confirm_destructive);
    }

    #[test]
    fn test_host_preview_override() {
        let policy = ModePolicy::for_mode(OperationMode::Safe).with_host_preview();
        assert!(policy.auto_switch_branches);
        assert!(!policy.show_preview);
        // Conflict handling stays mode-governed
        assert!(!policy.auto_resolve_conflicts);
    }
}
