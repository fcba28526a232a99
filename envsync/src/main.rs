//! Idempotent environment reconciliation for Laravel-style projects.
//!
//! Converges `.env` files and `composer.json` scripts to a declared state,
//! then runs the framework and package-manager follow-ups.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;

use envsync::check::check_drift;
use envsync::core::types::{RunOutcome, RunStatus};
use envsync::exit_codes;
use envsync::fix_composer::run_fix_composer;
use envsync::guard::InvocationGuard;
use envsync::io::config::load_config;
use envsync::io::init::{InitOptions, init_config};
use envsync::io::paths::default_config_path;
use envsync::io::tools::SystemToolRunner;
use envsync::logging;
use envsync::report::Report;
use envsync::setup_db::run_setup_db;

#[derive(Parser)]
#[command(
    name = "envsync",
    version,
    about = "Converge .env files and composer.json scripts, then refresh tooling"
)]
struct Cli {
    /// Project root (defaults to the current directory).
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    /// Config file (defaults to `<root>/envsync.toml`; missing means built-in defaults).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Switch env files to database drivers and write the setup scripts.
    #[command(name = "setup-db", alias = "setup:db")]
    SetupDb,
    /// Restore the dev script and refresh PHP and Node dependencies.
    #[command(name = "fix-composer", alias = "fix:composer")]
    FixComposer,
    /// Report drift from the `setup-db` state without writing anything.
    Check,
    /// Write the default `envsync.toml`.
    Init {
        /// Overwrite an existing config file.
        #[arg(short, long)]
        force: bool,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::FAILED);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let root = match cli.root {
        Some(root) => root,
        None => std::env::current_dir().context("resolve current directory")?,
    };
    let config_path = cli
        .config
        .unwrap_or_else(|| default_config_path(&root));
    debug!(root = %root.display(), config = %config_path.display(), "resolved paths");

    match cli.command {
        Command::SetupDb => cmd_setup_db(&root, &config_path),
        Command::FixComposer => cmd_fix_composer(&root, &config_path),
        Command::Check => cmd_check(&root, &config_path),
        Command::Init { force } => {
            let path = init_config(&config_path, &InitOptions { force })?;
            println!("wrote {}", path.display());
            Ok(exit_codes::OK)
        }
    }
}

fn cmd_setup_db(root: &Path, config_path: &Path) -> Result<i32> {
    let cfg = load_config(config_path)?;
    let tools = SystemToolRunner::from_config(&cfg.tools);
    let outcome = run_setup_db(
        root,
        &cfg,
        &InvocationGuard::new(),
        &tools,
        &mut Report::echoing(),
    );
    Ok(exit_code(&outcome))
}

fn cmd_fix_composer(root: &Path, config_path: &Path) -> Result<i32> {
    let cfg = load_config(config_path)?;
    let tools = SystemToolRunner::from_config(&cfg.tools);
    let outcome = run_fix_composer(
        root,
        &cfg,
        &InvocationGuard::new(),
        &tools,
        &mut Report::echoing(),
    );
    Ok(exit_code(&outcome))
}

fn cmd_check(root: &Path, config_path: &Path) -> Result<i32> {
    let cfg = load_config(config_path)?;
    let drift = check_drift(root, &cfg, &mut Report::echoing());
    if drift.is_empty() {
        return Ok(exit_codes::OK);
    }
    Ok(exit_codes::DRIFT)
}

fn exit_code(outcome: &RunOutcome) -> i32 {
    match outcome.status {
        RunStatus::Completed | RunStatus::UpToDate | RunStatus::Skipped => exit_codes::OK,
        RunStatus::Failed => exit_codes::FAILED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_setup_db_with_colon_alias() {
        let cli = Cli::parse_from(["envsync", "setup:db"]);
        assert!(matches!(cli.command, Command::SetupDb));
        let cli = Cli::parse_from(["envsync", "setup-db"]);
        assert!(matches!(cli.command, Command::SetupDb));
    }

    #[test]
    fn parse_fix_composer_with_root() {
        let cli = Cli::parse_from(["envsync", "fix:composer", "--root", "/srv/app"]);
        assert!(matches!(cli.command, Command::FixComposer));
        assert_eq!(cli.root, Some(PathBuf::from("/srv/app")));
        assert!(cli.config.is_none());
    }

    #[test]
    fn parse_init_force() {
        let cli = Cli::parse_from(["envsync", "init", "--force"]);
        assert!(matches!(cli.command, Command::Init { force: true }));
    }

    #[test]
    fn failed_run_maps_to_failed_exit_code() {
        let outcome = RunOutcome::failed(Vec::new(), Vec::new());
        assert_eq!(exit_code(&outcome), exit_codes::FAILED);
        assert_eq!(exit_code(&RunOutcome::skipped("setup:db")), exit_codes::OK);
        assert_eq!(exit_code(&RunOutcome::up_to_date()), exit_codes::OK);
    }
}
