//! Pkgbridge - Privileged package transaction bridge
//!
//! CLI entry point.

#![forbid(unsafe_code)]

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;
mod settings;

/// Time left to blocking stdin readers and prompts once the result is in
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

fn main() -> Result<ExitCode> {
    let _ = dotenvy::dotenv();

    let cli = cli::Cli::parse();
    let config = settings::load_config(cli.config.as_deref())?;
    let _log_guard = init_tracing(&config.logging);

    info!("Starting pkgbridge v{}", env!("CARGO_PKG_VERSION"));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;
    let result = runtime.block_on(cli::run(cli, config));
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result
}

/// Logs go to stderr (stdout carries progress and machine output), plus an
/// optional daily-rolling JSON file.
fn init_tracing(logging: &settings::LoggingSettings) -> Option<WorkerGuard> {
    let (file_layer, guard) = match &logging.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "pkgbridge.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().json().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pkgbridge=info,pkgbridge_core=info".into()),
        )
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    guard
}
