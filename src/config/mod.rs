// dumpkeeper/src/config/mod.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use percent_encoding::percent_decode_str;
use url::Url;

pub const DEFAULT_RETENTION_COUNT: usize = 3;
pub const DEFAULT_DUMP_EXTENSION: &str = "backup";
pub const DEFAULT_LOG_FILE_NAME: &str = "backup_log.txt";
pub const DEFAULT_IMAGES_SOURCE_DIR: &str = "resource/images";
const DEFAULT_DB_HOST: &str = "localhost";
const DEFAULT_DB_PORT: u16 = 5432;

// Structs for deserializing config.json
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JsonDatabaseConfig {
    pub name: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonCopyCommand {
    pub program: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawJsonConfig {
    pub database: Option<JsonDatabaseConfig>,
    pub database_url: Option<String>,
    pub backup_dir: Option<PathBuf>,
    pub images_source_dir: Option<PathBuf>,
    pub pg_bin_dir: Option<PathBuf>,
    pub retention_count: Option<usize>,
    pub dump_extension: Option<String>,
    pub log_file: Option<PathBuf>,
    pub images_copy_command: Option<JsonCopyCommand>,
}

// Application's internal configuration structs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub name: String,
    pub user: String,
    pub password: Option<String>,
    pub host: String,
    pub port: u16,
}

/// External program used instead of the built-in image copy.
/// Invoked as `<program> <source> <destination> <args...>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct BackupConfig {
    pub database: DatabaseConfig,
    pub backup_dir: PathBuf,
    pub images_source_dir: PathBuf,
    /// Directory holding `pg_dump`. `None` searches `PATH`.
    pub pg_bin_dir: Option<PathBuf>,
    pub retention_count: usize,
    pub dump_extension: String,
    pub log_file: PathBuf,
    pub images_copy_command: Option<CopyCommand>,
}

impl BackupConfig {
    /// Reads `config_path` and resolves it against the process environment.
    /// Relative paths in the file are taken relative to the file's directory.
    pub fn load_from_json(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;
        let raw_json_config: RawJsonConfig = serde_json::from_str(&config_content)
            .with_context(|| {
                format!(
                    "Failed to parse JSON from config file at {}",
                    config_path.display()
                )
            })?;

        let root = config_root(config_path)?;
        load_backup_config_from_json(&raw_json_config, &root, |key| std::env::var(key).ok())
    }
}

fn config_root(config_path: &Path) -> Result<PathBuf> {
    let parent = config_path.parent().unwrap_or_else(|| Path::new(""));
    if parent.is_absolute() {
        return Ok(parent.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    Ok(cwd.join(parent))
}

fn resolve_path(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Builds the immutable backup configuration.
///
/// `root` must be absolute; every relative path is joined onto it.
/// `env_lookup` supplies the `DB_*` fallbacks for database settings.
pub fn load_backup_config_from_json(
    raw_config: &RawJsonConfig,
    root: &Path,
    env_lookup: impl Fn(&str) -> Option<String>,
) -> Result<BackupConfig> {
    let database = resolve_database(raw_config, &env_lookup)?;

    let backup_dir = raw_config
        .backup_dir
        .as_ref()
        .context("backup_dir must be set in config.json")?;
    if backup_dir.as_os_str().is_empty() {
        anyhow::bail!("backup_dir cannot be empty in config.json.");
    }
    let backup_dir = resolve_path(root, backup_dir);

    let images_source_dir = resolve_path(
        root,
        raw_config
            .images_source_dir
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_IMAGES_SOURCE_DIR)),
    );

    let retention_count = raw_config.retention_count.unwrap_or(DEFAULT_RETENTION_COUNT);
    if retention_count == 0 {
        anyhow::bail!("retention_count must be at least 1; 0 would delete the backup just taken");
    }

    let dump_extension = validate_extension(
        raw_config
            .dump_extension
            .as_deref()
            .unwrap_or(DEFAULT_DUMP_EXTENSION),
    )?;

    let log_file = match &raw_config.log_file {
        Some(path) => resolve_path(root, path),
        None => backup_dir.join(DEFAULT_LOG_FILE_NAME),
    };

    let images_copy_command = raw_config.images_copy_command.as_ref().map(|cmd| CopyCommand {
        program: cmd.program.clone(),
        args: cmd.args.clone(),
    });

    Ok(BackupConfig {
        database,
        backup_dir,
        images_source_dir,
        pg_bin_dir: raw_config.pg_bin_dir.as_ref().map(|p| resolve_path(root, p)),
        retention_count,
        dump_extension,
        log_file,
        images_copy_command,
    })
}

/// Explicit `database` fields win over `database_url`, which wins over `DB_*`.
fn resolve_database(
    raw_config: &RawJsonConfig,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Result<DatabaseConfig> {
    let explicit = raw_config.database.clone().unwrap_or_default();
    let from_url = match &raw_config.database_url {
        Some(url) => parse_database_url(url)?,
        None => JsonDatabaseConfig::default(),
    };
    let non_empty = |v: String| if v.trim().is_empty() { None } else { Some(v) };

    let name = explicit
        .name
        .or(from_url.name)
        .or_else(|| env_lookup("DB_NAME"))
        .and_then(non_empty)
        .context("Database name must be set via database.name, database_url or DB_NAME")?;
    validate_database_name(&name)?;

    let user = explicit
        .user
        .or(from_url.user)
        .or_else(|| env_lookup("DB_USER"))
        .and_then(non_empty)
        .context("Database user must be set via database.user, database_url or DB_USER")?;

    let password = explicit
        .password
        .or(from_url.password)
        .or_else(|| env_lookup("DB_PASSWORD"))
        .and_then(non_empty);

    let host = explicit
        .host
        .or(from_url.host)
        .or_else(|| env_lookup("DB_HOST"))
        .and_then(non_empty)
        .unwrap_or_else(|| DEFAULT_DB_HOST.to_string());

    let port = match explicit.port.or(from_url.port) {
        Some(port) => port,
        None => match env_lookup("DB_PORT").and_then(non_empty) {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .with_context(|| format!("DB_PORT is not a valid port number: {}", raw))?,
            None => DEFAULT_DB_PORT,
        },
    };

    Ok(DatabaseConfig {
        name,
        user,
        password,
        host,
        port,
    })
}

fn parse_database_url(database_url: &str) -> Result<JsonDatabaseConfig> {
    let parsed = Url::parse(database_url)
        .with_context(|| format!("Invalid database_url format: {}", database_url))?;

    // Url hands back the user info and path still percent-encoded.
    let name = decode_url_part(parsed.path().trim_start_matches('/'), "database name")?;
    let user = decode_url_part(parsed.username(), "user")?;
    let password = parsed
        .password()
        .map(|p| decode_url_part(p, "password"))
        .transpose()?;

    Ok(JsonDatabaseConfig {
        name: (!name.is_empty()).then_some(name),
        user: (!user.is_empty()).then_some(user),
        password,
        host: parsed.host_str().map(str::to_string),
        port: parsed.port(),
    })
}

fn decode_url_part(raw: &str, what: &str) -> Result<String> {
    let decoded = percent_decode_str(raw)
        .decode_utf8()
        .with_context(|| format!("database_url {} is not valid UTF-8 once decoded", what))?;
    Ok(decoded.into_owned())
}

// The name ends up in backup file names and in the retention pattern.
fn validate_database_name(name: &str) -> Result<()> {
    if name.contains(|c: char| !c.is_alphanumeric() && c != '_' && c != '-') {
        anyhow::bail!("Invalid character in database name: {:?}", name);
    }
    Ok(())
}

fn validate_extension(ext: &str) -> Result<String> {
    let ext = ext.trim().trim_start_matches('.');
    if ext.is_empty() || ext.contains(|c: char| c == '.' || c == '/' || c == '\\') {
        anyhow::bail!("dump_extension must be a single non-empty suffix, got {:?}", ext);
    }
    Ok(ext.to_string())
}
