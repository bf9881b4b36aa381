mod logic;
pub(crate) mod db_dump;
pub(crate) mod images;
pub(crate) mod retention;
pub(crate) mod run;

use anyhow::{Context, Result};
use chrono::Local;

use crate::config::BackupConfig;
use crate::utils::{AuditLog, SystemRunner};

pub use logic::RunReport;

/// Public entry point for a scheduled backup run.
pub async fn run_backup_flow(backup_config: &BackupConfig) -> Result<RunReport> {
    let started_at = Local::now().naive_local();
    let report = logic::perform_backup_orchestration(backup_config, &SystemRunner, started_at).await?;
    Ok(report)
}

/// Applies the retention policy without taking a new backup.
pub fn run_prune_flow(backup_config: &BackupConfig) -> Result<()> {
    let log = AuditLog::new(&backup_config.log_file);
    let (dumps, images) = logic::perform_prune(backup_config, &log);
    let failed = dumps.failed.len() + images.failed.len();
    if failed > 0 {
        anyhow::bail!("{} old backups could not be deleted; see {}", failed, log.path().display());
    }
    Ok(())
}

/// Prints the current backups, newest first, marking those the retention
/// policy keeps.
pub fn run_list_flow(backup_config: &BackupConfig) -> Result<()> {
    let (dumps, images) = logic::list_backups(backup_config).with_context(|| {
        format!(
            "Failed to list backups in {}",
            backup_config.backup_dir.display()
        )
    })?;

    for (title, entries) in [("Database backups", dumps), ("Images backups", images)] {
        println!("{} ({}):", title, entries.len());
        for (position, path) in entries.iter().enumerate() {
            let marker = if position < backup_config.retention_count { "keep " } else { "prune" };
            println!("  [{}] {}", marker, path.display());
        }
    }
    Ok(())
}
