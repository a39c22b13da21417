//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use pkgflow::conflict::ConflictStrategy;
use pkgflow::forge::RepoType;
use pkgflow::policy::OperationMode;

#[derive(Debug, Parser)]
#[command(
    name = "pkgflow",
    version,
    about = "Git-workflow orchestrator for package maintainers",
    long_about = "Turns developer intent (\"commit my changes\", \"build a testing package\") \
                  into an ordered, auditable sequence of git operations and CI dispatch calls, \
                  preserving uncommitted work across every branch transition."
)]
pub struct Cli {
    /// Operation mode for this run (overrides the settings file)
    #[arg(long, global = true, value_enum)]
    pub mode: Option<OperationMode>,

    /// Simulate: preview every plan without touching git or the network
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Conflict strategy for this run (overrides the settings file)
    #[arg(long, global = true, value_enum)]
    pub conflict_strategy: Option<ConflictStrategy>,

    /// Enable debug logging (or set RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Sync your dev branch with the most recent code
    Pull,

    /// Commit and push the working tree
    Commit {
        /// Commit message
        #[arg(short = 'c', long = "message", value_name = "TEXT")]
        message: Option<String>,

        /// Read the commit message verbatim from a file
        #[arg(short = 'F', long = "file", value_name = "PATH", conflicts_with = "message")]
        file: Option<PathBuf>,

        /// Target branch (defaults to your dev branch, prompting if unsure)
        #[arg(long)]
        branch: Option<String>,
    },

    /// Commit, land the build branch, and trigger a package build
    Build {
        /// Repository the package targets
        #[arg(value_enum)]
        repo_type: RepoType,

        /// Commit message for outstanding changes
        #[arg(short = 'c', long = "message", value_name = "TEXT")]
        message: Option<String>,

        /// Open a tmate debug session in the workflow run
        #[arg(long)]
        tmate: bool,
    },

    /// Trigger a build of an AUR package (no local branch involved)
    Aur {
        /// AUR package name (aur- / aur/ prefixes are stripped)
        package: String,

        /// Open a tmate debug session in the workflow run
        #[arg(long)]
        tmate: bool,
    },

    /// Revert or reset to an earlier commit
    Revert,

    /// Undo the last commit, keeping its changes in the working tree
    Undo,

    /// Create a pull request, optionally auto-merging it
    Pr {
        /// Source branch
        source: String,

        /// Target branch
        #[arg(long, default_value = "main")]
        target: String,

        /// Merge automatically once the forge reports the PR mergeable
        #[arg(long)]
        merge: bool,
    },

    /// Repository and forge housekeeping
    Clean {
        #[command(subcommand)]
        what: CleanCommand,
    },

    /// Manage stored forge tokens
    Token {
        #[command(subcommand)]
        action: TokenCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum CleanCommand {
    /// Delete branches outside main/master/dev and the newest dev-*
    Branches,
    /// Delete CI workflow runs with the given status
    Runs {
        /// Run status to delete (e.g. success, failure)
        status: String,
    },
    /// Delete every tag in the repository
    Tags,
}

#[derive(Debug, Subcommand)]
pub enum TokenCommand {
    /// Store a token (prompts for the value)
    Set {
        /// Organization the token belongs to; omit for the default token
        organization: Option<String>,
    },
    /// List stored token entries (values are not shown)
    List,
    /// Remove the token for an organization
    Delete { organization: String },
}
