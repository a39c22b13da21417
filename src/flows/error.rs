//! Flow-level error taxonomy.
//!
//! Every failure a flow can surface falls into exactly one of these kinds.
//! Conflict and divergence states are values here, not exceptions: the
//! engine turns them terminal only after its resolvers give up.

use color_print::cformat;

use crate::forge::ForgeError;
use crate::git::{GitError, PushDiagnosis};
use crate::plan::PlanError;
use crate::styling::{ERROR_EMOJI, HINT_EMOJI, WARNING_EMOJI};

#[derive(Debug)]
pub enum FlowError {
    /// Preview declined, confirmation refused, menu cancelled. Purely
    /// informational; no compensation beyond what already ran.
    UserCancel,
    /// The flow cannot start: not a repo, detached HEAD, PKGBUILD missing,
    /// token missing. No state was changed.
    PreconditionFailed(String),
    /// A git command failed; compensation already ran before this
    /// surfaced.
    Git(GitError),
    /// Unresolved conflicts remain after the resolver gave up. Carries
    /// recovery guidance.
    ConflictPending { guidance: String },
    /// The user declined every divergence resolution; local work is safe.
    DivergencePending { branch: String },
    /// A push was rejected; carries the shared diagnosis.
    PushRejected(PushDiagnosis),
    /// Forge (HTTP) failure, including setup-required and auth errors.
    Forge(ForgeError),
    /// Cooperative cancellation was observed at a suspension point.
    Cancelled,
    /// Anything else.
    Unexpected(String),
}

impl FlowError {
    /// Exit code the CLI maps this error to.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

impl std::fmt::Display for FlowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlowError::UserCancel => {
                write!(f, "{}", cformat!("{WARNING_EMOJI} <yellow>Operation cancelled by user</>"))
            }
            FlowError::PreconditionFailed(msg) => {
                write!(f, "{}", cformat!("{ERROR_EMOJI} <red>{msg}</>"))
            }
            FlowError::Git(e) => write!(f, "{e}"),
            FlowError::ConflictPending { guidance } => {
                write!(
                    f,
                    "{}\n{}",
                    cformat!("{ERROR_EMOJI} <red>Unresolved conflicts remain</>"),
                    cformat!("{HINT_EMOJI} <dim>{guidance}</>")
                )
            }
            FlowError::DivergencePending { branch } => {
                write!(
                    f,
                    "{}\n{}",
                    cformat!(
                        "{WARNING_EMOJI} <yellow>Branch <bold>{branch}</> is still diverged from its remote</>"
                    ),
                    cformat!(
                        "{HINT_EMOJI} <dim>Your commit is saved locally. Finish with: git pull --rebase origin {branch}, resolve any conflicts, then git push origin {branch}</>"
                    )
                )
            }
            FlowError::PushRejected(diagnosis) => {
                writeln!(f, "{}", cformat!("{ERROR_EMOJI} <red>Push failed!</>"))?;
                writeln!(f, "{}", cformat!("<yellow>═══ Diagnosis ═══</>"))?;
                writeln!(f, "{}", diagnosis.diagnosis)?;
                writeln!(f, "{}", cformat!("<yellow>═══ Suggested Solutions ═══</>"))?;
                for solution in &diagnosis.solutions {
                    writeln!(f, "  • {solution}")?;
                }
                Ok(())
            }
            FlowError::Forge(e) => write!(f, "{e}"),
            FlowError::Cancelled => {
                write!(f, "{}", cformat!("{WARNING_EMOJI} <yellow>Operation cancelled</>"))
            }
            FlowError::Unexpected(msg) => {
                write!(f, "{}", cformat!("{ERROR_EMOJI} <red>Unexpected error: {msg}</>"))
            }
        }
    }
}

impl std::error::Error for FlowError {}

impl From<GitError> for FlowError {
    fn from(e: GitError) -> Self {
        match e {
            GitError::NotARepository => {
                FlowError::PreconditionFailed("This operation is only available in git repositories".into())
            }
            GitError::DetachedHead => {
                FlowError::PreconditionFailed("Not on a branch (detached HEAD)".into())
            }
            other => FlowError::Git(other),
        }
    }
}

impl From<ForgeError> for FlowError {
    fn from(e: ForgeError) -> Self {
        FlowError::Forge(e)
    }
}

impl From<PlanError> for FlowError {
    fn from(e: PlanError) -> Self {
        match e {
            PlanError::Cancelled => FlowError::UserCancel,
            PlanError::StepFailed { description, detail } => FlowError::Git(GitError::Io(format!(
                "Step failed: {description}: {detail}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precondition_mapping() {
        assert!(matches!(
            FlowError::from(GitError::NotARepository),
            FlowError::PreconditionFailed(_)
        ));
        assert!(matches!(
            FlowError::from(GitError::DetachedHead),
            FlowError::PreconditionFailed(_)
        ));
        assert!(matches!(
            FlowError::from(GitError::ParseError("x".into())),
            FlowError::Git(_)
        ));
    }

    #[test]
    fn test_plan_cancel_maps_to_user_cancel() {
        assert!(matches!(
            FlowError::from(PlanError::Cancelled),
            FlowError::UserCancel
        ));
    }

    #[test]
    fn test_divergence_pending_mentions_recovery() {
        let err = FlowError::DivergencePending {
            branch: "dev-alice".into(),
        };
        let text = err.to_string();
        assert!(text.contains("git pull --rebase origin dev-alice"));
    }
}
