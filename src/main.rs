//! Scheduled PostgreSQL + images backup tool
//!
//! Dumps the configured database with pg_dump, copies the image directory,
//! and keeps only the most recent backups of each kind.

// dumpkeeper/src/main.rs
mod backup;
mod config;
mod errors;
mod utils;

use anyhow::{Context, Result};
use config::BackupConfig;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_CONFIG_PATH: &str = "config.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Backup,
    Prune,
    List,
}

#[derive(Debug, PartialEq, Eq)]
struct CliArgs {
    operation: Operation,
    config_path: PathBuf,
}

/// Main entry point for the backup tool
#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dumpkeeper=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run_app().await {
        Ok(_) => {
            println!("✅ Operation completed successfully.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_app() -> Result<()> {
    let args = parse_args(env::args().skip(1))?;
    let backup_config = BackupConfig::load_from_json(&args.config_path).context(format!(
        "Failed to load configuration from {}",
        args.config_path.display()
    ))?;

    match args.operation {
        Operation::Backup => {
            println!("🚀 Starting backup of {}...", backup_config.database.name);
            let report = backup::run_backup_flow(&backup_config)
                .await
                .context("Backup process failed")?;
            println!("Database backup: {}", report.db_backup_path.display());
            println!("Images backup: {}", report.images_backup_path.display());
        }
        Operation::Prune => {
            println!("🧹 Pruning old backups in {}...", backup_config.backup_dir.display());
            backup::run_prune_flow(&backup_config).context("Prune process failed")?;
        }
        Operation::List => {
            backup::run_list_flow(&backup_config)?;
        }
    }
    Ok(())
}

/// Accepts `[backup|prune|list] [--config <path>]`; the operation defaults to
/// `backup` so a scheduler can invoke the binary bare.
fn parse_args(args: impl IntoIterator<Item = String>) -> Result<CliArgs> {
    let mut operation = None;
    let mut config_path = PathBuf::from(DEFAULT_CONFIG_PATH);
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.trim() {
            "--config" | "-c" => {
                let value = args.next().context("--config requires a path")?;
                config_path = PathBuf::from(value);
            }
            choice @ ("backup" | "prune" | "list") if operation.is_none() => {
                operation = Some(match choice {
                    "prune" => Operation::Prune,
                    "list" => Operation::List,
                    _ => Operation::Backup,
                });
            }
            other => {
                anyhow::bail!(
                    "Unexpected argument '{}'. Usage: dumpkeeper [backup|prune|list] [--config <path>]",
                    other
                );
            }
        }
    }

    Ok(CliArgs {
        operation: operation.unwrap_or(Operation::Backup),
        config_path,
    })
}
