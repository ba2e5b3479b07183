//! lightschool - terminal host for the offline lesson client.
//!
//! Plays the part of the browser runtime: it fires the cache lifecycle
//! events (install, activate, fetch) and drives the lesson viewer, quiz and
//! tutor, with every request passing through the offline cache.

mod cli;
mod commands;

use std::io;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use lightschool_core::cache::{DiskStorage, OfflineCacheManager};
use lightschool_core::config::Config;
use lightschool_core::net::HttpFetcher;

use cli::{Cli, Commands};

/// Log file name prefix inside `--log-dir`
const LOG_FILE_PREFIX: &str = "lightschool.log";

/// Initialize the tracing subscriber for logging.
///
/// The returned guard must be held until exit so buffered file logs flush.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load()?;
    config.apply_env()?;
    if let Some(ref origin) = cli.origin {
        config.origin = origin.clone();
    }
    if let Some(ref generation) = cli.generation {
        config.generation = generation
            .parse()
            .with_context(|| format!("Invalid generation: {}", generation))?;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_dir.as_deref());

    let config = load_config(&cli)?;
    info!(origin = %config.origin, generation = %config.generation, "lightschool starting");

    if let Commands::Config { init } = cli.command {
        return commands::show_config(&config, init);
    }

    let stores_dir = config.stores_dir()?;
    let storage = DiskStorage::new(stores_dir.clone())
        .await
        .with_context(|| format!("Failed to open cache at {}", stores_dir.display()))?;
    let fetcher = HttpFetcher::new(config.request_timeout())?;
    let manager = Arc::new(OfflineCacheManager::new(
        Arc::new(storage),
        Arc::new(fetcher),
        config.routes.clone(),
    ));

    match cli.command {
        Commands::Install => commands::install(&manager, &config).await,
        Commands::Activate => commands::activate(&manager, &config).await,
        Commands::Upgrade => {
            commands::install(&manager, &config).await?;
            commands::activate(&manager, &config).await
        }
        Commands::Fetch { path, accept } => {
            commands::resume(&manager).await?;
            commands::fetch(&manager, &config, &path, accept.as_deref()).await
        }
        Commands::Status => {
            commands::resume(&manager).await?;
            commands::status(&manager).await
        }
        Commands::Lesson {
            subject,
            grade,
            unit,
            locale,
        } => {
            commands::resume(&manager).await?;
            let locale = locale.unwrap_or_else(|| config.locale.clone());
            commands::lesson(manager, &config, &subject, grade, &unit, &locale).await
        }
        Commands::Quiz {
            subject,
            grade,
            unit,
            locale,
            no_save,
        } => {
            commands::resume(&manager).await?;
            let locale = locale.unwrap_or_else(|| config.locale.clone());
            commands::quiz(manager, &config, &subject, grade, &unit, &locale, !no_save).await
        }
        Commands::Tutor {
            subject,
            grade,
            locale,
            message,
        } => {
            commands::resume(&manager).await?;
            let locale = locale.unwrap_or_else(|| config.locale.clone());
            commands::tutor(manager, &config, subject, grade, locale, message.join(" ")).await
        }
        Commands::Config { .. } => Ok(()),
    }
}
