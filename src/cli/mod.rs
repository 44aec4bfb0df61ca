//! CLI module for pkgbridge
//!
//! One subcommand per package operation. Events from the bridge are shown by
//! one of two presenters:
//! - interactive: progress on stdout, questions and the password via prompts
//! - `--machine`: one JSON object per line on stdout, commands on stdin

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pkgbridge_core::{
    format_error_for_cli, EventBus, Operation, OperationResult, SecretStore, TransactionBridge,
};
use tracing::{info, warn};

use crate::settings::AppConfig;

pub mod interactive;
pub mod machine;

/// How long a presenter may keep rendering after the result is in
const PRESENTER_GRACE: Duration = Duration::from_secs(5);

/// Pkgbridge CLI
#[derive(Parser, Debug)]
#[command(name = "pkgbridge")]
#[command(about = "Run package transactions through an elevated worker")]
#[command(version)]
pub struct Cli {
    /// Extra configuration file, applied over the defaults
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Emit JSON lines and read answers from stdin instead of prompting
    #[arg(long, global = true)]
    pub machine: bool,

    /// Worker executable (overrides worker.path)
    #[arg(long, global = true, value_name = "PATH")]
    pub worker: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Refresh the package databases
    Sync,
    /// Install packages
    Install {
        #[arg(required = true)]
        packages: Vec<String>,
    },
    /// Remove packages
    Remove {
        #[arg(required = true)]
        packages: Vec<String>,
    },
    /// Update specific packages
    Update {
        #[arg(required = true)]
        packages: Vec<String>,
    },
    /// Update every installed package
    Upgrade,
    /// Install a package file from disk
    InstallLocal {
        /// Path to the package file
        path: PathBuf,
    },
    /// Remove packages no longer required by anything
    RemoveOrphans,
    /// List available updates (no elevation needed)
    CheckUpdates,
}

impl Commands {
    /// The bridge operation this command runs
    pub fn operation(self) -> Operation {
        match self {
            Commands::Sync => Operation::SyncDatabases,
            Commands::Install { packages } => Operation::InstallPackages(packages),
            Commands::Remove { packages } => Operation::RemovePackages(packages),
            Commands::Update { packages } => Operation::UpdatePackages(packages),
            Commands::Upgrade => Operation::UpgradeSystem,
            Commands::InstallLocal { path } => Operation::InstallLocalPackage(path),
            Commands::RemoveOrphans => Operation::RemoveOrphans,
            Commands::CheckUpdates => Operation::CheckUpdates,
        }
    }
}

/// Run the CLI command
pub async fn run(cli: Cli, mut config: AppConfig) -> Result<ExitCode> {
    let Some(command) = cli.command else {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        cmd.print_help()?;
        println!();
        return Ok(ExitCode::SUCCESS);
    };

    if let Some(worker) = cli.worker {
        config.worker.path = worker;
    }

    let events = EventBus::default();
    let secrets = SecretStore::new(Arc::new(config.probe()), config.secret_store_config())
        .with_event_bus(events.clone());
    let bridge = Arc::new(
        TransactionBridge::new(config.bridge_config(), Arc::new(secrets), events)
            .context("Failed to set up the transaction bridge")?,
    );

    // Subscribe before the operation starts so no event is missed.
    let rx = bridge.subscribe();
    let presenter = if cli.machine {
        tokio::spawn(machine::run(bridge.clone(), rx))
    } else {
        tokio::spawn(interactive::run(bridge.clone(), rx, config.defaults))
    };

    let operation = command.operation();
    info!(operation = %operation, "Running operation");
    let result = bridge.run(operation).await;

    if tokio::time::timeout(PRESENTER_GRACE, presenter).await.is_err() {
        warn!("Presenter did not finish; some output may be missing");
    }

    if cli.machine {
        machine::print_result(&result)?;
    } else {
        report(&result);
    }
    Ok(exit_code(&result))
}

fn report(result: &OperationResult) {
    if result.success {
        println!("✅ Done");
    } else {
        eprintln!("❌ {}", format_error_for_cli(result));
    }
}

/// Process exit code for a result: the worker's own code, or 1 when it has
/// none that fits.
pub fn exit_code(result: &OperationResult) -> ExitCode {
    if result.success {
        return ExitCode::SUCCESS;
    }
    match u8::try_from(result.exit_code) {
        Ok(code) if code != 0 => ExitCode::from(code),
        _ => ExitCode::FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_operations() {
        let cli = Cli::parse_from(["pkgbridge", "install", "foo", "bar"]);
        assert_eq!(
            cli.command.map(Commands::operation),
            Some(Operation::InstallPackages(vec!["foo".into(), "bar".into()]))
        );

        let cli = Cli::parse_from(["pkgbridge", "--machine", "install-local", "/tmp/foo.pkg.tar.zst"]);
        assert!(cli.machine);
        assert_eq!(
            cli.command.map(Commands::operation),
            Some(Operation::InstallLocalPackage("/tmp/foo.pkg.tar.zst".into()))
        );

        let cli = Cli::parse_from(["pkgbridge", "check-updates", "--worker", "/opt/w"]);
        assert_eq!(cli.worker.as_deref(), Some("/opt/w"));
        assert_eq!(cli.command, Some(Commands::CheckUpdates));
    }

    #[test]
    fn test_install_requires_packages() {
        assert!(Cli::try_parse_from(["pkgbridge", "install"]).is_err());
        assert!(Cli::try_parse_from(["pkgbridge", "remove"]).is_err());
    }

    #[test]
    fn test_exit_code_mapping() {
        let mut result = OperationResult {
            success: true,
            output: String::new(),
            error: String::new(),
            exit_code: 0,
            failure: None,
        };
        assert_eq!(exit_code(&result), ExitCode::SUCCESS);

        result.success = false;
        result.exit_code = 3;
        assert_eq!(exit_code(&result), ExitCode::from(3));

        result.exit_code = -1;
        assert_eq!(exit_code(&result), ExitCode::FAILURE);

        // Failed despite a zero exit (e.g. interrupted question)
        result.exit_code = 0;
        assert_eq!(exit_code(&result), ExitCode::FAILURE);
    }
}
