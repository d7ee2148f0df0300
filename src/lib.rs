//! timescale-bgw-restarter: TimescaleDB background worker watchdog
//!
//! Detects a stalled TimescaleDB background worker pool by looking at the
//! next scheduled run of the continuous aggregate refresh policy, and
//! restarts the workers when that run lies too far in the past.
//!
//! ## Architecture
//!
//! - **config**: TOML / environment / CLI configuration
//! - **db**: PostgreSQL connection pool
//! - **background**: the staleness check and restart decision
//! - **worker**: one complete run, from connect to disconnect

pub mod background;
pub mod config;
pub mod db;
pub mod error;
pub mod worker;

pub use background::{CheckReport, HealAction, HealthStatus, JobCatalog, SelfHealer};
pub use config::{CheckConfig, Config, ConfigError, ConfigOverrides, PostgresConfig};
pub use error::{ErrorKind, RestartError};
