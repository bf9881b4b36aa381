// dumpkeeper/src/backup/retention.rs
use std::fs;
use std::path::{Path, PathBuf};

use super::run::IMAGES_BACKUP_PREFIX;
use crate::utils::AuditLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// Naming pattern of one kind of backup artifact, `<prefix>*<suffix>`,
/// matched against entries directly under the backup directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPattern {
    prefix: String,
    suffix: String,
    kind: EntryKind,
    label: &'static str,
}

impl ArtifactPattern {
    pub fn database_dumps(db_name: &str, extension: &str) -> Self {
        ArtifactPattern {
            prefix: format!("{}_", db_name),
            suffix: format!(".{}", extension),
            kind: EntryKind::File,
            label: "database backup",
        }
    }

    pub fn images_backups() -> Self {
        ArtifactPattern {
            prefix: IMAGES_BACKUP_PREFIX.to_string(),
            suffix: String::new(),
            kind: EntryKind::Directory,
            label: "images backup",
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn matches(&self, name: &str) -> bool {
        name.len() > self.prefix.len() + self.suffix.len()
            && name.starts_with(&self.prefix)
            && name.ends_with(&self.suffix)
    }

    fn matches_kind(&self, file_type: fs::FileType) -> bool {
        match self.kind {
            EntryKind::File => file_type.is_file(),
            EntryKind::Directory => file_type.is_dir(),
        }
    }
}

impl std::fmt::Display for ArtifactPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}*{}", self.prefix, self.suffix)
    }
}

/// Lists the artifacts matching `pattern`, newest first (name descending).
pub fn list_artifacts(backup_dir: &Path, pattern: &ArtifactPattern) -> std::io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(backup_dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if !pattern.matches_kind(file_type) {
            continue;
        }
        let name = entry.file_name();
        match name.to_str() {
            Some(name) if pattern.matches(name) => found.push(entry.path()),
            _ => {}
        }
    }
    found.sort_by(|a, b| b.file_name().cmp(&a.file_name()));
    Ok(found)
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PruneReport {
    pub kept: Vec<PathBuf>,
    pub deleted: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

/// Keeps the `retention_count` newest artifacts and deletes the rest.
///
/// Deletion is best effort: failures are logged and the remaining entries are
/// still processed. `protect` is never deleted, even when it falls outside the
/// newest `retention_count` names.
pub fn prune_artifacts(
    backup_dir: &Path,
    pattern: &ArtifactPattern,
    retention_count: usize,
    protect: Option<&Path>,
    log: &AuditLog,
) -> PruneReport {
    prune_artifacts_with(backup_dir, pattern, retention_count, protect, log, remove_artifact)
}

fn remove_artifact(path: &Path, kind: EntryKind) -> std::io::Result<()> {
    match kind {
        EntryKind::File => fs::remove_file(path),
        EntryKind::Directory => fs::remove_dir_all(path),
    }
}

/// `prune_artifacts` with the removal operation supplied by the caller.
pub fn prune_artifacts_with(
    backup_dir: &Path,
    pattern: &ArtifactPattern,
    retention_count: usize,
    protect: Option<&Path>,
    log: &AuditLog,
    remove: impl Fn(&Path, EntryKind) -> std::io::Result<()>,
) -> PruneReport {
    let mut report = PruneReport::default();

    let artifacts = match list_artifacts(backup_dir, pattern) {
        Ok(artifacts) => artifacts,
        Err(e) => {
            log.warning(format!(
                "Could not list {} files matching {} in {}: {}",
                pattern.label(),
                pattern,
                backup_dir.display(),
                e
            ));
            return report;
        }
    };

    for (position, path) in artifacts.into_iter().enumerate() {
        if position < retention_count {
            report.kept.push(path);
            continue;
        }
        if protect == Some(path.as_path()) {
            log.info(format!(
                "Keeping {} from the current run: {}",
                pattern.label(),
                path.display()
            ));
            report.kept.push(path);
            continue;
        }

        match remove(&path, pattern.kind) {
            Ok(()) => {
                log.info(format!("Deleted old {}: {}", pattern.label(), path.display()));
                report.deleted.push(path);
            }
            Err(e) => {
                log.warning(format!(
                    "Failed to delete old {} {}: {}",
                    pattern.label(),
                    path.display(),
                    e
                ));
                report.failed.push(path);
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(paths: &[PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_database_pattern() {
        let pattern = ArtifactPattern::database_dumps("mydb", "backup");
        assert!(pattern.matches("mydb_2024-01-01_0000.backup"));
        assert!(!pattern.matches("mydb_.backup"));
        assert!(!pattern.matches("otherdb_2024-01-01_0000.backup"));
        assert!(!pattern.matches("mydb_2024-01-01_0000.backup.tmp"));
        assert!(!pattern.matches("mydb2024-01-01_0000.backup"));
        assert_eq!(pattern.to_string(), "mydb_*.backup");
    }

    #[test]
    fn test_images_pattern() {
        let pattern = ArtifactPattern::images_backups();
        assert!(pattern.matches("images_2024-01-01_0000"));
        assert!(!pattern.matches("images_"));
        assert!(!pattern.matches("thumbnails_2024-01-01_0000"));
    }

    #[test]
    fn test_list_filters_kind_and_sorts_newest_first() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        for name in [
            "mydb_2024-01-02_0000.backup",
            "mydb_2024-01-10_0000.backup",
            "mydb_2023-12-31_2359.backup",
            "backup_log.txt",
        ] {
            fs::write(dir.path().join(name), b"x")?;
        }
        // A directory with a matching name is not a dump file.
        fs::create_dir(dir.path().join("mydb_2025-01-01_0000.backup"))?;
        fs::create_dir(dir.path().join("images_2024-01-02_0000"))?;

        let dumps = list_artifacts(dir.path(), &ArtifactPattern::database_dumps("mydb", "backup"))?;
        assert_eq!(
            names(&dumps),
            vec![
                "mydb_2024-01-10_0000.backup",
                "mydb_2024-01-02_0000.backup",
                "mydb_2023-12-31_2359.backup",
            ]
        );

        let images = list_artifacts(dir.path(), &ArtifactPattern::images_backups())?;
        assert_eq!(names(&images), vec!["images_2024-01-02_0000"]);
        Ok(())
    }

    #[test]
    fn test_prune_keeps_newest() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        for day in 1..=5 {
            fs::write(dir.path().join(format!("mydb_2024-01-0{}_0000.backup", day)), b"x")?;
        }
        let log = AuditLog::new(dir.path().join("backup_log.txt"));

        let report = prune_artifacts(
            dir.path(),
            &ArtifactPattern::database_dumps("mydb", "backup"),
            3,
            None,
            &log,
        );

        assert_eq!(
            names(&report.kept),
            vec![
                "mydb_2024-01-05_0000.backup",
                "mydb_2024-01-04_0000.backup",
                "mydb_2024-01-03_0000.backup",
            ]
        );
        assert_eq!(
            names(&report.deleted),
            vec!["mydb_2024-01-02_0000.backup", "mydb_2024-01-01_0000.backup"]
        );
        assert!(report.failed.is_empty());
        assert!(!dir.path().join("mydb_2024-01-01_0000.backup").exists());

        let content = fs::read_to_string(log.path())?;
        assert_eq!(content.matches("INFO: Deleted old database backup").count(), 2);
        Ok(())
    }

    #[test]
    fn test_prune_below_retention_deletes_nothing() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        fs::create_dir(dir.path().join("images_2024-01-01_0000"))?;
        fs::create_dir(dir.path().join("images_2024-01-02_0000"))?;
        let log = AuditLog::new(dir.path().join("backup_log.txt"));

        let report = prune_artifacts(dir.path(), &ArtifactPattern::images_backups(), 3, None, &log);
        assert_eq!(report.kept.len(), 2);
        assert!(report.deleted.is_empty());
        Ok(())
    }

    #[test]
    fn test_prune_removes_directories_recursively() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        for day in 1..=3 {
            let images = dir.path().join(format!("images_2024-01-0{}_0000", day));
            fs::create_dir_all(images.join("nested"))?;
            fs::write(images.join("nested").join("photo.jpg"), b"jpg")?;
        }
        let log = AuditLog::new(dir.path().join("backup_log.txt"));

        let report = prune_artifacts(dir.path(), &ArtifactPattern::images_backups(), 1, None, &log);
        assert_eq!(names(&report.kept), vec!["images_2024-01-03_0000"]);
        assert_eq!(report.deleted.len(), 2);
        assert!(!dir.path().join("images_2024-01-01_0000").exists());
        Ok(())
    }

    #[test]
    fn test_failed_deletion_does_not_stop_pruning() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        for day in 1..=5 {
            fs::write(dir.path().join(format!("mydb_2024-01-0{}_0000.backup", day)), b"x")?;
        }
        let log = AuditLog::new(dir.path().join("backup_log.txt"));
        let locked = dir.path().join("mydb_2024-01-03_0000.backup");

        let report = prune_artifacts_with(
            dir.path(),
            &ArtifactPattern::database_dumps("mydb", "backup"),
            2,
            None,
            &log,
            |path, kind| {
                if path == locked.as_path() {
                    Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "file is locked"))
                } else {
                    remove_artifact(path, kind)
                }
            },
        );

        assert_eq!(names(&report.failed), vec!["mydb_2024-01-03_0000.backup"]);
        assert_eq!(
            names(&report.deleted),
            vec!["mydb_2024-01-02_0000.backup", "mydb_2024-01-01_0000.backup"]
        );
        assert!(locked.exists());
        assert!(!dir.path().join("mydb_2024-01-01_0000.backup").exists());

        let content = fs::read_to_string(log.path())?;
        assert!(content.contains(&format!(
            "WARNING: Failed to delete old database backup {}: file is locked",
            locked.display()
        )));
        assert_eq!(content.matches("INFO: Deleted old database backup").count(), 2);
        Ok(())
    }

    #[test]
    fn test_protected_artifact_survives() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        for name in [
            "mydb_9999-12-31_2359.backup",
            "mydb_2024-01-05_0000.backup",
            "mydb_2024-01-04_0000.backup",
        ] {
            fs::write(dir.path().join(name), b"x")?;
        }
        let current = dir.path().join("mydb_2024-01-05_0000.backup");
        let log = AuditLog::new(dir.path().join("backup_log.txt"));

        let report = prune_artifacts(
            dir.path(),
            &ArtifactPattern::database_dumps("mydb", "backup"),
            1,
            Some(&current),
            &log,
        );

        assert!(current.exists());
        assert_eq!(
            names(&report.kept),
            vec!["mydb_9999-12-31_2359.backup", "mydb_2024-01-05_0000.backup"]
        );
        assert_eq!(names(&report.deleted), vec!["mydb_2024-01-04_0000.backup"]);
        Ok(())
    }

    #[test]
    fn test_missing_backup_dir_is_a_warning() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let log = AuditLog::new(dir.path().join("backup_log.txt"));

        let report = prune_artifacts(
            &dir.path().join("absent"),
            &ArtifactPattern::images_backups(),
            3,
            None,
            &log,
        );
        assert_eq!(report, PruneReport::default());
        assert!(fs::read_to_string(log.path())?.contains("WARNING: Could not list images backup"));
        Ok(())
    }
}
