// dumpkeeper/src/backup/run.rs
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};

use crate::config::BackupConfig;

/// Minute resolution, zero padded, most significant field first. Name order
/// of stamps is chronological order, which retention pruning depends on.
pub const RUN_STAMP_FORMAT: &str = "%Y-%m-%d_%H%M";
pub const IMAGES_BACKUP_PREFIX: &str = "images_";

pub fn format_run_stamp(at: NaiveDateTime) -> String {
    at.format(RUN_STAMP_FORMAT).to_string()
}

pub fn db_backup_file_name(db_name: &str, stamp: &str, extension: &str) -> String {
    format!("{}_{}.{}", db_name, stamp, extension)
}

pub fn images_backup_dir_name(stamp: &str) -> String {
    format!("{}{}", IMAGES_BACKUP_PREFIX, stamp)
}

/// Identity of one backup execution. The stamp is computed once and every
/// artifact path of the run is derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRun {
    stamp: String,
    db_backup_path: PathBuf,
    images_backup_path: PathBuf,
    log_path: PathBuf,
}

impl BackupRun {
    pub fn new(config: &BackupConfig, started_at: NaiveDateTime) -> Self {
        let stamp = format_run_stamp(started_at);
        let db_backup_path = config.backup_dir.join(db_backup_file_name(
            &config.database.name,
            &stamp,
            &config.dump_extension,
        ));
        let images_backup_path = config.backup_dir.join(images_backup_dir_name(&stamp));

        BackupRun {
            stamp,
            db_backup_path,
            images_backup_path,
            log_path: config.log_file.clone(),
        }
    }

    pub fn stamp(&self) -> &str {
        &self.stamp
    }

    pub fn db_backup_path(&self) -> &Path {
        &self.db_backup_path
    }

    pub fn images_backup_path(&self) -> &Path {
        &self.images_backup_path
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }
}
