use std::process;

use anstyle::Style;
use anyhow::Context;
use clap::Parser;

use pkgflow::config::Settings;
use pkgflow::flows::{BuildOptions, CommitOptions, FlowEngine, FlowError};
use pkgflow::forge::RepoType;
use pkgflow::styling::{eprintln, println};
use pkgflow::token::TokenStore;
use pkgflow::ui::{HostUi, TerminalUi};

mod cli;

use cli::{CleanCommand, Cli, Commands, TokenCommand};

fn main() {
    let cli = Cli::parse();

    // Debug logging: --verbose or RUST_LOG; commands echo as `$ git …`
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if cli.verbose { "debug" } else { "off" }),
    )
    .format(|buf, record| {
        use std::io::Write;
        let msg = record.args().to_string();
        let dim = Style::new().dimmed();
        if let Some(rest) = msg.strip_prefix("$ ") {
            let bold = Style::new().bold();
            writeln!(buf, "{dim}${dim:#} {bold}{rest}{bold:#}")
        } else if msg.starts_with("  ! ") {
            use anstyle::{AnsiColor, Color};
            let red = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Red)));
            writeln!(buf, "{red}{msg}{red:#}")
        } else {
            writeln!(buf, "{dim}{msg}{dim:#}")
        }
    })
    .init();

    if let Err(e) = run(cli) {
        // Flow errors render their own styling; print and map to exit code 1
        eprintln!("{e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let ui = TerminalUi::new();

    // Token management needs no repository
    if let Commands::Token { action } = &cli.command {
        return handle_token(action, &ui);
    }

    let mut settings = Settings::load().context("Failed to load settings")?;
    if let Some(mode) = cli.mode {
        settings.operation_mode = mode;
    }
    if let Some(strategy) = cli.conflict_strategy {
        settings.conflict_strategy = strategy;
    }

    let mut engine = FlowEngine::for_current_dir(settings, &ui)?.with_dry_run(cli.dry_run);

    let result: Result<(), FlowError> = match cli.command {
        Commands::Pull => engine.pull_latest(),
        Commands::Commit { message, file, branch } => engine.commit_and_push(CommitOptions {
            message,
            message_file: file,
            target_branch: branch,
            explicit_type: None,
        }),
        Commands::Build { repo_type, message, tmate } => {
            if repo_type == RepoType::Aur {
                anyhow::bail!("AUR packages are built with 'pkgflow aur <package>'");
            }
            engine.commit_and_build(
                repo_type,
                BuildOptions {
                    commit_message: message,
                    tmate,
                },
            )
        }
        Commands::Aur { package, tmate } => engine.aur_build(&package, tmate),
        Commands::Revert => engine.revert_commit(),
        Commands::Undo => engine.undo_last_commit(),
        Commands::Pr { source, target, merge } => engine
            .create_pull_request(&source, &target, merge)
            .map(|url| {
                if !url.is_empty() {
                    println!("{url}");
                }
            }),
        Commands::Clean { what } => match what {
            CleanCommand::Branches => engine.cleanup_old_branches(),
            CleanCommand::Runs { status } => engine.clean_workflow_runs(&status).map(|_| ()),
            CleanCommand::Tags => engine.clean_all_tags().map(|_| ()),
        },
        Commands::Token { .. } => unreachable!("handled above"),
    };

    result.map_err(Into::into)
}

fn handle_token(action: &TokenCommand, ui: &TerminalUi) -> anyhow::Result<()> {
    let store = TokenStore::default_store()?;
    match action {
        TokenCommand::Set { organization } => {
            let org = organization.clone().unwrap_or_default();
            let label = if org.is_empty() { "default".to_string() } else { org.clone() };
            let Some(token) = ui.ask_input(&format!("Token for {label}"), None) else {
                anyhow::bail!("No token provided");
            };
            if token.trim().is_empty() {
                anyhow::bail!("No token provided");
            }
            store.upsert(&org, token.trim())?;
            eprintln!(
                "{}",
                pkgflow::styling::success_message(format!("Token stored for {label}"))
            );
        }
        TokenCommand::List => {
            let entries = store.read_all();
            if entries.is_empty() {
                eprintln!("{}", pkgflow::styling::info_message("No tokens stored"));
            }
            for (org, _token) in entries {
                println!("{org}");
            }
        }
        TokenCommand::Delete { organization } => {
            store.delete(organization)?;
            eprintln!(
                "{}",
                pkgflow::styling::success_message(format!("Token removed for {organization}"))
            );
        }
    }
    Ok(())
}
