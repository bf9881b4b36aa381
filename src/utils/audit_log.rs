// dumpkeeper/src/utils/audit_log.rs
use chrono::{Local, NaiveDateTime};
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warning,
    Error,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Formats one audit line: `[YYYY-MM-DD HH:MM:SS] LEVEL: message`.
pub fn format_line(at: NaiveDateTime, level: Level, message: &str) -> String {
    format!("[{}] {}: {}\n", at.format(LOG_TIMESTAMP_FORMAT), level, message)
}

/// Append-only plain text log of a backup run.
///
/// The file is opened in append mode for every record and never truncated.
/// Every record is also emitted through `tracing`. Write failures are
/// reported there and never interrupt the caller.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        AuditLog { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.record(Level::Info, message.as_ref());
    }

    pub fn warning(&self, message: impl AsRef<str>) {
        self.record(Level::Warning, message.as_ref());
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.record(Level::Error, message.as_ref());
    }

    pub fn record(&self, level: Level, message: &str) {
        match level {
            Level::Info => tracing::info!("{}", message),
            Level::Warning => tracing::warn!("{}", message),
            Level::Error => tracing::error!("{}", message),
        }

        let line = format_line(Local::now().naive_local(), level, message);
        if let Err(e) = self.append(&line) {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Could not write to audit log"
            );
        }
    }

    fn append(&self, line: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())
    }
}
