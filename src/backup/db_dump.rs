// dumpkeeper/src/backup/db_dump.rs
use std::path::{Path, PathBuf};
use which::which;

use crate::config::{BackupConfig, DatabaseConfig};
use crate::errors::{BackupError, Result};
use crate::utils::{AuditLog, CommandRunner, ExternalCommand};

const PG_DUMP: &str = "pg_dump";

/// Resolves the pg_dump executable: inside `pg_bin_dir` when configured,
/// otherwise from `PATH`.
pub fn locate_pg_dump(backup_config: &BackupConfig) -> Result<PathBuf> {
    match &backup_config.pg_bin_dir {
        Some(bin_dir) => {
            let candidate = bin_dir.join(format!("{}{}", PG_DUMP, std::env::consts::EXE_SUFFIX));
            if candidate.is_file() {
                Ok(candidate)
            } else {
                Err(BackupError::DumpToolMissing(format!(
                    "{} does not exist",
                    candidate.display()
                )))
            }
        }
        None => which(PG_DUMP).map_err(|e| {
            BackupError::DumpToolMissing(format!("{} not found in PATH: {}", PG_DUMP, e))
        }),
    }
}

/// Custom-format (compressed) archive of a single database, blobs included.
/// The password travels in `PGPASSWORD`, never on the command line.
pub fn build_dump_command(pg_dump_path: &Path, database: &DatabaseConfig, output: &Path) -> ExternalCommand {
    let cmd = ExternalCommand::new(pg_dump_path)
        .args(["-h", database.host.as_str()])
        .args(["-p".to_string(), database.port.to_string()])
        .args(["-U", database.user.as_str()])
        .args(["-F", "c", "-b", "-f"])
        .arg(output)
        .arg(&database.name);

    match &database.password {
        Some(password) => cmd.env("PGPASSWORD", password.as_str()),
        None => cmd,
    }
}

/// Runs pg_dump once. Any outcome other than exit code 0 is fatal for the run.
pub async fn dump_database<R: CommandRunner>(
    runner: &R,
    pg_dump_path: &Path,
    database: &DatabaseConfig,
    output: &Path,
    log: &AuditLog,
) -> Result<()> {
    log.info(format!(
        "Starting database backup of {} to {}",
        database.name,
        output.display()
    ));

    let cmd = build_dump_command(pg_dump_path, database, output);
    tracing::debug!(command = %cmd.display(), "Invoking pg_dump");

    let code = runner
        .run(&cmd)
        .await
        .map_err(|source| BackupError::DumpSpawn {
            program: pg_dump_path.to_path_buf(),
            source,
        })?;

    if code != 0 {
        return Err(BackupError::DumpFailed { code });
    }

    log.info(format!("Database backup successful: {}", output.display()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    fn database(password: Option<&str>) -> DatabaseConfig {
        DatabaseConfig {
            name: "inventory".to_string(),
            user: "postgres".to_string(),
            password: password.map(str::to_string),
            host: "db.local".to_string(),
            port: 5433,
        }
    }

    #[test]
    fn test_build_dump_command_arguments() {
        let cmd = build_dump_command(
            Path::new("/opt/pg/bin/pg_dump"),
            &database(Some("s3cret")),
            Path::new("/backups/inventory_2024-01-05_0000.backup"),
        );

        let expected: Vec<OsString> = [
            "-h", "db.local", "-p", "5433", "-U", "postgres", "-F", "c", "-b", "-f",
            "/backups/inventory_2024-01-05_0000.backup", "inventory",
        ]
        .into_iter()
        .map(OsString::from)
        .collect();

        assert_eq!(cmd.program, PathBuf::from("/opt/pg/bin/pg_dump"));
        assert_eq!(cmd.args, expected);
        assert_eq!(cmd.envs, vec![("PGPASSWORD".to_string(), "s3cret".to_string())]);
        assert!(!cmd.display().contains("s3cret"));
    }

    #[test]
    fn test_build_dump_command_without_password() {
        let cmd = build_dump_command(Path::new("pg_dump"), &database(None), Path::new("out.backup"));
        assert!(cmd.envs.is_empty());
    }
}
