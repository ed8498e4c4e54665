//! Bootstrap configuration for HMS services
//!
//! Settings are resolved in priority order:
//! 1. Command-line arguments (clap also folds in `HMS_INGEST_*` environment variables)
//! 2. TOML configuration file
//! 3. Built-in defaults
//!
//! The TOML file is read from `--config` when given, otherwise from
//! `<config_dir>/hms/ingest.toml` if that file exists. A missing default file is
//! not an error; a missing explicit file is.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Path to SQLite database file
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Interface to bind the HTTP listener on
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest accepted request body in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Accepted bearer tokens
    #[serde(default)]
    pub auth: AuthConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Bearer token configuration
///
/// An empty token list disables authentication entirely.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub tokens: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            bind_address: default_bind_address(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
            auth: AuthConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5780
}

fn default_max_body_bytes() -> usize {
    // Spreadsheet uploads of a few thousand incidents run to several megabytes
    50 * 1024 * 1024
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Command-line (and environment) overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub database_path: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub max_body_bytes: Option<usize>,
    pub auth_tokens: Option<Vec<String>>,
    pub log_level: Option<String>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: PathBuf,
    pub bind_address: String,
    pub port: u16,
    pub max_body_bytes: usize,
    pub auth_tokens: Vec<String>,
    pub log_level: String,
}

impl Config {
    /// Resolve configuration from overrides, TOML file and defaults
    pub fn resolve(overrides: ConfigOverrides) -> Result<Self> {
        let toml_config = match &overrides.config_path {
            Some(path) => load_toml_config(path)?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => load_toml_config(&path)?,
                None => TomlConfig::default(),
            },
        };

        Ok(Self::merge(overrides, toml_config))
    }

    /// Apply overrides on top of an already-loaded TOML config
    pub fn merge(overrides: ConfigOverrides, toml_config: TomlConfig) -> Self {
        let database_path = overrides
            .database_path
            .or(toml_config.database_path)
            .unwrap_or_else(default_database_path);

        let auth_tokens: Vec<String> = overrides
            .auth_tokens
            .unwrap_or(toml_config.auth.tokens)
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        Self {
            database_path,
            bind_address: overrides.bind_address.unwrap_or(toml_config.bind_address),
            port: overrides.port.unwrap_or(toml_config.port),
            max_body_bytes: overrides.max_body_bytes.unwrap_or(toml_config.max_body_bytes),
            auth_tokens,
            log_level: overrides.log_level.unwrap_or(toml_config.logging.level),
        }
    }
}

/// Load and parse a TOML configuration file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config file {}: {}", path.display(), e)))?;

    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse TOML {}: {}", path.display(), e)))?;

    info!("Loaded TOML configuration from {}", path.display());
    Ok(config)
}

/// Platform default config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("hms").join("ingest.toml"))
}

/// Platform default database location
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("hms"))
        .unwrap_or_else(|| PathBuf::from("./hms_data"))
        .join("ingest.db")
}
