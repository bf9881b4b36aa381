// dumpkeeper/src/backup/images.rs
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::run::BackupRun;
use crate::config::{BackupConfig, CopyCommand};
use crate::utils::{AuditLog, CommandRunner, ExternalCommand};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImagesOutcome {
    /// The source directory does not exist; nothing was created.
    SourceMissing,
    Completed,
    /// The step ran but something went wrong. Earlier backups are untouched.
    CompletedWithWarnings(String),
}

#[derive(Debug, Default)]
pub struct CopyReport {
    pub files_copied: usize,
    pub failures: Vec<(PathBuf, String)>,
}

/// Recursively copies the contents of `source_dir` into `dest_dir`,
/// overwriting existing files. Symlinks are followed. Entries that fail are
/// recorded and the walk continues.
pub fn copy_tree(source_dir: &Path, dest_dir: &Path) -> CopyReport {
    let mut report = CopyReport::default();

    for entry in WalkDir::new(source_dir).min_depth(1).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().unwrap_or(source_dir).to_path_buf();
                report.failures.push((path, e.to_string()));
                continue;
            }
        };
        let path = entry.path();
        let name = match path.strip_prefix(source_dir) {
            Ok(name) => name,
            Err(e) => {
                report.failures.push((path.to_path_buf(), e.to_string()));
                continue;
            }
        };
        let target = dest_dir.join(name);

        // Walk order is pre-order, so a file's parent directory already exists.
        let result = if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
        } else {
            fs::copy(path, &target).map(|_| report.files_copied += 1)
        };
        if let Err(e) = result {
            report.failures.push((path.to_path_buf(), e.to_string()));
        }
    }

    report
}

fn build_copy_command(copy: &CopyCommand, source_dir: &Path, dest_dir: &Path) -> ExternalCommand {
    ExternalCommand::new(&copy.program)
        .arg(source_dir)
        .arg(dest_dir)
        .args(&copy.args)
        .quiet()
}

/// Copies the images directory into this run's `images_<stamp>` directory.
/// Never fails the run: problems come back as warnings.
pub async fn backup_images<R: CommandRunner>(
    runner: &R,
    backup_config: &BackupConfig,
    run: &BackupRun,
    log: &AuditLog,
) -> ImagesOutcome {
    let source_dir = &backup_config.images_source_dir;
    let dest_dir = run.images_backup_path();

    if !source_dir.is_dir() {
        log.info(format!(
            "Images source directory not found, skipping images backup: {}",
            source_dir.display()
        ));
        return ImagesOutcome::SourceMissing;
    }

    log.info(format!(
        "Starting images backup from {} to {}",
        source_dir.display(),
        dest_dir.display()
    ));

    if let Err(e) = fs::create_dir_all(dest_dir) {
        let message = format!(
            "Failed to create images backup directory {}: {}",
            dest_dir.display(),
            e
        );
        log.warning(&message);
        return ImagesOutcome::CompletedWithWarnings(message);
    }

    match &backup_config.images_copy_command {
        None => {
            let report = copy_tree(source_dir, dest_dir);
            if report.failures.is_empty() {
                log.info(format!(
                    "Images backup successful: {} files copied to {}",
                    report.files_copied,
                    dest_dir.display()
                ));
                return ImagesOutcome::Completed;
            }
            for (path, error) in &report.failures {
                tracing::warn!(path = %path.display(), %error, "Image copy entry failed");
            }
            let message = format!(
                "Images backup finished with {} failed entries ({} files copied)",
                report.failures.len(),
                report.files_copied
            );
            log.warning(&message);
            ImagesOutcome::CompletedWithWarnings(message)
        }
        Some(copy) => {
            let cmd = build_copy_command(copy, source_dir, dest_dir);
            match runner.run(&cmd).await {
                Ok(0) => {
                    log.info(format!("Images backup successful: {}", dest_dir.display()));
                    ImagesOutcome::Completed
                }
                Ok(code) => {
                    let message = format!("Images copy exited with code {}", code);
                    log.warning(&message);
                    ImagesOutcome::CompletedWithWarnings(message)
                }
                Err(e) => {
                    let message = format!(
                        "Failed to start images copy command {}: {}",
                        copy.program.display(),
                        e
                    );
                    log.warning(&message);
                    ImagesOutcome::CompletedWithWarnings(message)
                }
            }
        }
    }
}
