//! Restarter configuration - connection parameters and check constants
//!
//! Each struct implements `Default` with the values from [`super::defaults`],
//! so an empty TOML file (or none at all) yields a working local setup.

use super::defaults;
use chrono::Duration;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one restarter deployment.
///
/// Load with `Config::load()` which searches:
/// 1. An explicit path (`--config` / `$BGW_RESTARTER_CONFIG`)
/// 2. `./bgw_restarter.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Target database connection
    #[serde(default)]
    pub postgres: PostgresConfig,

    /// Staleness check parameters
    #[serde(default)]
    pub check: CheckConfig,
}

impl Config {
    /// Load configuration using the standard search order.
    ///
    /// An explicitly named file that cannot be read or parsed is an error;
    /// the implicit local file and the defaults are fallbacks.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit_path {
            let config = Self::load_from_file(path)?;
            info!(path = %path.display(), "Loaded config from explicit path");
            return Ok(config);
        }

        let local = PathBuf::from(defaults::LOCAL_CONFIG_FILE);
        if local.exists() {
            let config = Self::load_from_file(&local)?;
            info!(path = %local.display(), "Loaded config from working directory");
            return Ok(config);
        }

        info!("No config file found, using built-in defaults");
        Ok(Self::default())
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::from("<inline>"), e))
    }

    /// Apply CLI / environment overrides on top of file values.
    #[must_use]
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        let pg = &mut self.postgres;
        if let Some(v) = overrides.host {
            pg.host = v;
        }
        if let Some(v) = overrides.port {
            pg.port = v;
        }
        if let Some(v) = overrides.database {
            pg.database = v;
        }
        if let Some(v) = overrides.user {
            pg.user = v;
        }
        if let Some(v) = overrides.password {
            pg.password = v;
        }
        if let Some(v) = overrides.max_connections {
            pg.max_connections = v;
        }
        if let Some(v) = overrides.acquire_timeout_secs {
            pg.acquire_timeout_secs = v;
        }

        let check = &mut self.check;
        if let Some(v) = overrides.staleness_window_hours {
            check.staleness_window_hours = v;
        }
        if let Some(v) = overrides.proc_name {
            check.proc_name = v;
        }
        if let Some(v) = overrides.restart_statement {
            check.restart_statement = v;
        }
        self
    }

    /// Validate all fields, collecting every problem into one error.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.postgres.host.trim().is_empty() {
            errors.push("postgres.host must not be empty".to_string());
        }
        if self.postgres.port == 0 {
            errors.push("postgres.port must be non-zero".to_string());
        }
        if self.postgres.database.trim().is_empty() {
            errors.push("postgres.database must not be empty".to_string());
        }
        if self.postgres.user.trim().is_empty() {
            errors.push("postgres.user must not be empty".to_string());
        }
        if self.postgres.max_connections == 0 {
            errors.push("postgres.max_connections must be at least 1".to_string());
        }
        if self.check.staleness_window_hours == 0 {
            errors.push("check.staleness_window_hours must be at least 1".to_string());
        }
        if self.check.proc_name.trim().is_empty() {
            errors.push("check.proc_name must not be empty".to_string());
        }
        if self.check.restart_statement.trim().is_empty() {
            errors.push("check.restart_statement must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Overrides
// ============================================================================

/// Per-field overrides, typically filled from CLI flags and environment
/// variables. `None` keeps the file / default value.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub max_connections: Option<u32>,
    pub acquire_timeout_secs: Option<u64>,
    pub staleness_window_hours: Option<u64>,
    pub proc_name: Option<String>,
    pub restart_statement: Option<String>,
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Config parse error ({}): {}", .0.display(), .1)]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("Config validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}

// ============================================================================
// PostgreSQL
// ============================================================================

/// Connection parameters for the TimescaleDB instance under watch.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    /// Pool size bound
    pub max_connections: u32,
    /// Wait for a pooled slot in seconds; 0 waits until cancelled.
    /// Establishing connectivity is never retried regardless.
    pub acquire_timeout_secs: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: defaults::POSTGRES_HOST.to_string(),
            port: defaults::POSTGRES_PORT,
            database: defaults::POSTGRES_DB.to_string(),
            user: defaults::POSTGRES_USER.to_string(),
            password: String::new(),
            max_connections: defaults::POSTGRES_MAX_CONNECTIONS,
            acquire_timeout_secs: defaults::POSTGRES_ACQUIRE_TIMEOUT_SECS,
        }
    }
}

// Hand-written so the password never reaches a log line.
impl std::fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout_secs", &self.acquire_timeout_secs)
            .finish()
    }
}

// ============================================================================
// Check
// ============================================================================

/// What to look at and what to do about it.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    /// Window after which a past `next_start` counts as stalled (hours)
    pub staleness_window_hours: u64,

    /// `proc_name` of the job in `timescaledb_information.jobs`
    pub proc_name: String,

    /// Statement executed to restart the background worker pool
    pub restart_statement: String,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            staleness_window_hours: defaults::STALENESS_WINDOW_HOURS,
            proc_name: defaults::JOB_PROC_NAME.to_string(),
            restart_statement: defaults::RESTART_STATEMENT.to_string(),
        }
    }
}

impl CheckConfig {
    /// Staleness window as a `chrono::Duration`.
    pub fn staleness_window(&self) -> Duration {
        i64::try_from(self.staleness_window_hours)
            .ok()
            .and_then(Duration::try_hours)
            .unwrap_or(Duration::MAX)
    }
}
