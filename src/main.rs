mod backend;
mod cli;
mod error;
mod logging;
mod report;

use crate::cli::{Cli, Command};
use crate::error::{ErrorKind, Result};
use clap::Parser;
use exn::ResultExt;
use futures::TryStreamExt;
use mediamig_config::Config;
use mediamig_convert::Transforms;
use mediamig_migrate::audit::audit;
use mediamig_migrate::engine::{Context, MigrationEvent, migrate};
use mediamig_migrate::{estimate, list_subfolders};
use mediamig_storage::BackendHandle;
use mediamig_storage::backend::RemoteStore;
use std::pin::pin;
use std::process::ExitCode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn print(lines: Vec<String>) {
    for line in lines {
        println!("{line}");
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match Config::load(cli.config.as_deref(), &cli.overrides()).or_raise(|| ErrorKind::Config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e:?}");
            return ExitCode::FAILURE;
        },
    };
    logging::init(&config.log_level, cli.verbose);

    match run(cli.command, &config).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e:?}");
            ExitCode::FAILURE
        },
    }
}

async fn run(command: Command, config: &Config) -> Result<ExitCode> {
    let store = backend::open(config)?;
    match command {
        Command::Folders { path } => folders(&store, &path).await,
        Command::Estimate { source } => estimate_folder(&store, config, &source).await,
        Command::Migrate { source, dest, .. } => {
            let destination = dest.unwrap_or_else(|| config.destination_for(&source));
            migrate_folder(&store, config, &source, &destination).await
        },
        Command::Audit { source, dest } => {
            let destination = dest.unwrap_or_else(|| config.destination_for(&source));
            audit_folder(&store, config, &source, &destination).await
        },
    }
}

async fn folders(store: &BackendHandle, path: &str) -> Result<ExitCode> {
    let folders = list_subfolders(store, path).await.or_raise(|| ErrorKind::Listing)?;
    if folders.is_empty() {
        println!("No subfolders in {}", if path.is_empty() { "/" } else { path });
    }
    print(folders);
    Ok(ExitCode::SUCCESS)
}

async fn estimate_folder(store: &BackendHandle, config: &Config, source: &str) -> Result<ExitCode> {
    let entries = store.list_all(source).await.or_raise(|| ErrorKind::Listing)?;
    let report = estimate(&entries, &config.policy(), &config.factors()).or_raise(|| ErrorKind::Listing)?;
    print(report::estimate(&report));
    Ok(ExitCode::SUCCESS)
}

/// Cancel `token` on Ctrl-C. In-flight items still finish.
fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; finishing in-flight items");
            token.cancel();
        }
    });
}

async fn migrate_folder(store: &BackendHandle, config: &Config, source: &str, destination: &str) -> Result<ExitCode> {
    let ctx = Context {
        policy: config.policy(),
        factors: config.factors(),
        transforms: Transforms::default(),
        jpeg_quality: config.jpeg_quality,
        concurrency: config.concurrency,
        cancel: CancellationToken::new(),
    };
    cancel_on_interrupt(ctx.cancel.clone());

    let mut events = pin!(migrate(store, &ctx, source, destination));
    while let Some(event) = events.try_next().await.or_raise(|| ErrorKind::Migration)? {
        match event {
            MigrationEvent::Started { source, destination } => {
                let mode = if config.dry_run { " (dry run)" } else { "" };
                println!("Migrating {source} -> {destination}{mode}");
            },
            MigrationEvent::Planned { estimate, .. } => {
                print(report::estimate(&estimate));
                if config.start_delay_secs > 0 {
                    println!("Starting in {}s, press Ctrl-C to abort", config.start_delay_secs);
                    tokio::select! {
                        () = tokio::time::sleep(Duration::from_secs(config.start_delay_secs)) => {},
                        () = ctx.cancel.cancelled() => {
                            println!("Aborted before anything was written");
                            return Ok(ExitCode::FAILURE);
                        },
                    }
                }
            },
            MigrationEvent::ItemFinished { finished, total, item, outcome, elapsed, remaining, .. } => {
                println!("{}", report::progress(finished, total, &item, &outcome, elapsed, remaining));
            },
            MigrationEvent::Finished(report) => {
                print(report::migration(&report));
                return Ok(if report.is_success() { ExitCode::SUCCESS } else { ExitCode::FAILURE });
            },
        }
    }
    Ok(ExitCode::FAILURE)
}

async fn audit_folder(store: &BackendHandle, config: &Config, source: &str, destination: &str) -> Result<ExitCode> {
    println!("Auditing {source} -> {destination}");
    let report = audit(store, source, destination, &config.policy()).await.or_raise(|| ErrorKind::Audit)?;
    print(report::audit(&report));
    Ok(if report.is_clean() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
