use std::path::PathBuf;
use thiserror::Error;

/// Conditions that stop a backup run. Anything not listed here is logged
/// as a warning and the run carries on.
#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Failed to create backup directory {path}: {source}")]
    BackupDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Dump utility not found: {0}")]
    DumpToolMissing(String),

    #[error("Failed to start dump utility {program}: {source}")]
    DumpSpawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Database dump failed with exit code {code}")]
    DumpFailed { code: i32 },
}

pub type Result<T> = std::result::Result<T, BackupError>;
