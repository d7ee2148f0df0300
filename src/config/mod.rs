//! Restarter Configuration Module
//!
//! Connection parameters for the watched TimescaleDB instance and the
//! constants that drive the staleness check, loaded from TOML files.
//!
//! ## Loading Order
//!
//! 1. `--config` flag or `BGW_RESTARTER_CONFIG` environment variable
//! 2. `bgw_restarter.toml` in the current working directory
//! 3. Built-in defaults (see [`defaults`])
//!
//! CLI flags and environment variables (`POSTGRES_HOST`, `POSTGRES_PW`, ...)
//! are applied on top via [`Config::with_overrides`].

mod restarter_config;
pub mod defaults;

pub use restarter_config::*;
