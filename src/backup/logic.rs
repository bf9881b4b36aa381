// dumpkeeper/src/backup/logic.rs
use chrono::NaiveDateTime;
use std::fs;
use std::path::PathBuf;

use super::db_dump;
use super::images::{self, ImagesOutcome};
use super::retention::{self, ArtifactPattern, PruneReport};
use super::run::BackupRun;
use crate::config::BackupConfig;
use crate::errors::{BackupError, Result};
use crate::utils::{AuditLog, CommandRunner};

/// What a completed run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub db_backup_path: PathBuf,
    pub images_backup_path: PathBuf,
    pub images: ImagesOutcome,
    pub pruned_dumps: PruneReport,
    pub pruned_images: PruneReport,
}

/// Runs one backup cycle:
/// 1. Ensures the backup directory exists (fatal on failure).
/// 2. Locates pg_dump (fatal if missing).
/// 3. Dumps the database (fatal on non-zero exit).
/// 4. Copies the images directory if present (warnings only).
/// 5. Prunes database dumps, then image copies, beyond the retention count.
/// 6. Logs a completion summary.
///
/// Every artifact name comes from the single stamp derived from `started_at`.
/// A fatal error is written to the audit log before it is returned.
pub async fn perform_backup_orchestration<R: CommandRunner>(
    backup_config: &BackupConfig,
    runner: &R,
    started_at: NaiveDateTime,
) -> Result<RunReport> {
    let run = BackupRun::new(backup_config, started_at);
    let log = AuditLog::new(run.log_path());

    match run_steps(backup_config, runner, &run, &log).await {
        Ok(report) => Ok(report),
        Err(e) => {
            let log = match &e {
                BackupError::BackupDirCreate { .. } => fallback_log(backup_config).unwrap_or(log),
                _ => log,
            };
            log.error(format!("Backup aborted: {}", e));
            Err(e)
        }
    }
}

/// A log file inside a backup directory that could not be created is
/// unwritable, so the failure goes next to that directory instead.
fn fallback_log(backup_config: &BackupConfig) -> Option<AuditLog> {
    if !backup_config.log_file.starts_with(&backup_config.backup_dir) {
        return None;
    }
    let parent = backup_config.backup_dir.parent()?;
    let name = backup_config.log_file.file_name()?;
    Some(AuditLog::new(parent.join(name)))
}

async fn run_steps<R: CommandRunner>(
    backup_config: &BackupConfig,
    runner: &R,
    run: &BackupRun,
    log: &AuditLog,
) -> Result<RunReport> {
    fs::create_dir_all(&backup_config.backup_dir).map_err(|source| {
        BackupError::BackupDirCreate {
            path: backup_config.backup_dir.clone(),
            source,
        }
    })?;
    log.info(format!(
        "Backup run {} started in {}",
        run.stamp(),
        backup_config.backup_dir.display()
    ));

    let pg_dump_path = db_dump::locate_pg_dump(backup_config)?;
    db_dump::dump_database(
        runner,
        &pg_dump_path,
        &backup_config.database,
        run.db_backup_path(),
        log,
    )
    .await?;

    let images = images::backup_images(runner, backup_config, run, log).await;

    let pruned_dumps = retention::prune_artifacts(
        &backup_config.backup_dir,
        &ArtifactPattern::database_dumps(&backup_config.database.name, &backup_config.dump_extension),
        backup_config.retention_count,
        Some(run.db_backup_path()),
        log,
    );
    let pruned_images = retention::prune_artifacts(
        &backup_config.backup_dir,
        &ArtifactPattern::images_backups(),
        backup_config.retention_count,
        Some(run.images_backup_path()),
        log,
    );

    // The images path is reported even when the images step was skipped.
    log.info(format!(
        "Backup completed. Database backup: {}, Images backup: {}",
        run.db_backup_path().display(),
        run.images_backup_path().display()
    ));

    Ok(RunReport {
        db_backup_path: run.db_backup_path().to_path_buf(),
        images_backup_path: run.images_backup_path().to_path_buf(),
        images,
        pruned_dumps,
        pruned_images,
    })
}

/// Applies the retention policy to the existing artifacts without taking a
/// new backup. Returns the database dump report and the images report.
pub fn perform_prune(backup_config: &BackupConfig, log: &AuditLog) -> (PruneReport, PruneReport) {
    log.info(format!(
        "Pruning backups in {} (keeping {})",
        backup_config.backup_dir.display(),
        backup_config.retention_count
    ));

    let dumps = retention::prune_artifacts(
        &backup_config.backup_dir,
        &ArtifactPattern::database_dumps(&backup_config.database.name, &backup_config.dump_extension),
        backup_config.retention_count,
        None,
        log,
    );
    let images = retention::prune_artifacts(
        &backup_config.backup_dir,
        &ArtifactPattern::images_backups(),
        backup_config.retention_count,
        None,
        log,
    );

    log.info(format!(
        "Prune completed: {} database backups and {} images backups deleted",
        dumps.deleted.len(),
        images.deleted.len()
    ));
    (dumps, images)
}

/// Current artifacts, newest first: database dumps, then image directories.
pub fn list_backups(backup_config: &BackupConfig) -> std::io::Result<(Vec<PathBuf>, Vec<PathBuf>)> {
    let dumps = retention::list_artifacts(
        &backup_config.backup_dir,
        &ArtifactPattern::database_dumps(&backup_config.database.name, &backup_config.dump_extension),
    )?;
    let images = retention::list_artifacts(&backup_config.backup_dir, &ArtifactPattern::images_backups())?;
    Ok((dumps, images))
}
