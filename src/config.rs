//! Configuration loading for the CLI.
//!
//! Values come from command-line flags, then the config file, then defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use acquirer_core::db::{DEFAULT_BUSY_TIMEOUT_MS, DEFAULT_MAX_CONNECTIONS, DatabaseOptions};
use acquirer_core::download::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use acquirer_core::library::DEFAULT_SCRATCH_DIR;
use acquirer_core::pipeline::InsertFailurePolicy;

/// Library directory used when neither the CLI nor the file names one.
pub const DEFAULT_LIBRARY_DIR: &str = "library";

/// Catalog database filename inside the library directory.
pub const DEFAULT_DATABASE_FILE: &str = "catalog.db";

/// Values read from the config file. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Managed library root.
    pub library_dir: Option<PathBuf>,
    /// Scratch area for copies and downloads.
    pub scratch_dir: Option<PathBuf>,
    /// Catalog database file.
    pub database_path: Option<PathBuf>,
    pub connect_timeout_secs: Option<u64>,
    pub read_timeout_secs: Option<u64>,
    /// Database pool max connections (1..=64).
    pub db_max_connections: Option<u32>,
    /// Database busy timeout in milliseconds.
    pub db_busy_timeout_ms: Option<u32>,
    /// Keep library files whose catalog insert failed.
    pub retain_on_insert_failure: Option<bool>,
}

impl FileConfig {
    /// Validates config values against runtime constraints.
    pub fn validate(&self) -> Result<()> {
        validate_range("connect_timeout_secs", self.connect_timeout_secs, 1..=300)?;
        validate_range("read_timeout_secs", self.read_timeout_secs, 1..=3600)?;
        validate_range(
            "db_max_connections",
            self.db_max_connections.map(u64::from),
            1..=64,
        )?;
        validate_range(
            "db_busy_timeout_ms",
            self.db_busy_timeout_ms.map(u64::from),
            0..=120_000,
        )?;
        Ok(())
    }
}

fn validate_range(
    field: &str,
    value: Option<u64>,
    range: std::ops::RangeInclusive<u64>,
) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !range.contains(&value) {
        bail!(
            "Invalid config value for `{field}`: {value}. Expected range: {}..={}",
            range.start(),
            range.end()
        );
    }
    Ok(())
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
    /// Indicates whether configuration was loaded from disk.
    pub loaded_from_file: bool,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/acquirer/config.toml`
/// 2. `$HOME/.config/acquirer/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("acquirer")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("acquirer")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads `explicit` if given (it must exist), else the default path if present.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        let config = load_file_config(path)?;
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config: Some(config),
            loaded_from_file: true,
        });
    }

    let path = resolve_default_config_path();
    let Some(path_ref) = path.as_deref() else {
        return Ok(LoadedConfig {
            path,
            config: None,
            loaded_from_file: false,
        });
    };

    if !path_ref.exists() {
        return Ok(LoadedConfig {
            path,
            config: None,
            loaded_from_file: false,
        });
    }

    let config = load_file_config(path_ref)?;
    Ok(LoadedConfig {
        path,
        config: Some(config),
        loaded_from_file: true,
    })
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!(
                "Invalid config syntax on line {}: expected key = value",
                line_index + 1
            );
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let invalid = || format!("Invalid `{key}` value on line {}", line_index + 1);

        match key {
            "library_dir" => {
                cfg.library_dir = Some(PathBuf::from(
                    parse_string_literal(value).with_context(invalid)?,
                ));
            }
            "scratch_dir" => {
                cfg.scratch_dir = Some(PathBuf::from(
                    parse_string_literal(value).with_context(invalid)?,
                ));
            }
            "database_path" => {
                cfg.database_path = Some(PathBuf::from(
                    parse_string_literal(value).with_context(invalid)?,
                ));
            }
            "connect_timeout_secs" => {
                cfg.connect_timeout_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "read_timeout_secs" => {
                cfg.read_timeout_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "db_max_connections" => {
                cfg.db_max_connections = Some(parse_integer_u32(value).with_context(invalid)?);
            }
            "db_busy_timeout_ms" => {
                cfg.db_busy_timeout_ms = Some(parse_integer_u32(value).with_context(invalid)?);
            }
            "retain_on_insert_failure" => {
                cfg.retain_on_insert_failure = Some(parse_boolean(value).with_context(invalid)?);
            }
            unknown => {
                bail!(
                    "Unknown configuration key: '{}' on line {}",
                    unknown,
                    line_index + 1
                );
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_integer_u32(raw_value: &str) -> Result<u32> {
    let value = parse_integer_u64(raw_value)?;
    u32::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u32"))
}

fn parse_boolean(raw_value: &str) -> Result<bool> {
    match raw_value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => bail!("Expected 'true' or 'false'"),
    }
}

/// Fully resolved runtime settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub library_dir: PathBuf,
    pub scratch_dir: PathBuf,
    pub database_path: PathBuf,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub database: DatabaseOptions,
    pub insert_failure_policy: InsertFailurePolicy,
}

impl Settings {
    /// Merges the CLI library override, the file config and defaults.
    ///
    /// Scratch and database locations default to paths inside whichever
    /// library directory wins.
    #[must_use]
    pub fn resolve(library_dir_flag: Option<PathBuf>, file: Option<&FileConfig>) -> Self {
        let file = file.cloned().unwrap_or_default();
        let library_dir = library_dir_flag
            .or(file.library_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LIBRARY_DIR));
        let scratch_dir = file
            .scratch_dir
            .unwrap_or_else(|| library_dir.join(DEFAULT_SCRATCH_DIR));
        let database_path = file
            .database_path
            .unwrap_or_else(|| library_dir.join(DEFAULT_DATABASE_FILE));
        let insert_failure_policy = if file.retain_on_insert_failure.unwrap_or(false) {
            InsertFailurePolicy::Retain
        } else {
            InsertFailurePolicy::Delete
        };

        Self {
            library_dir,
            scratch_dir,
            database_path,
            connect_timeout_secs: file.connect_timeout_secs.unwrap_or(CONNECT_TIMEOUT_SECS),
            read_timeout_secs: file.read_timeout_secs.unwrap_or(READ_TIMEOUT_SECS),
            database: DatabaseOptions {
                max_connections: file.db_max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS),
                busy_timeout_ms: file.db_busy_timeout_ms.unwrap_or(DEFAULT_BUSY_TIMEOUT_MS),
            },
            insert_failure_policy,
        }
    }
}
