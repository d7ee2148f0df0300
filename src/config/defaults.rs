//! Built-in default constants.
//!
//! Every value here can be overridden from the TOML file, the environment,
//! or the command line. Grouped by subsystem for easy discovery.

// ============================================================================
// PostgreSQL
// ============================================================================

/// Default PostgreSQL host.
pub const POSTGRES_HOST: &str = "localhost";

/// Default PostgreSQL port.
pub const POSTGRES_PORT: u16 = 5432;

/// Default database name.
pub const POSTGRES_DB: &str = "postgres";

/// Default database user.
pub const POSTGRES_USER: &str = "postgres";

/// Upper bound on simultaneous pooled connections. A single run only ever
/// holds one of them.
pub const POSTGRES_MAX_CONNECTIONS: u32 = 10;

/// Pool slot acquire timeout (seconds). 0 means no timeout: acquisition
/// waits until a slot is free or the run is cancelled.
pub const POSTGRES_ACQUIRE_TIMEOUT_SECS: u64 = 0;

// ============================================================================
// Staleness check
// ============================================================================

/// How far in the past a job's `next_start` may lie before the background
/// worker pool is considered stalled (hours).
pub const STALENESS_WINDOW_HOURS: u64 = 12;

/// Procedure name of the continuous aggregate refresh policy job whose
/// schedule is used as the health signal.
pub const JOB_PROC_NAME: &str = "policy_refresh_continuous_aggregate";

/// Administrative statement that restarts TimescaleDB's background workers.
///
/// TimescaleDB 2.12 moved internal functions to `_timescaledb_functions`;
/// override this on newer installations.
pub const RESTART_STATEMENT: &str = "SELECT _timescaledb_internal.restart_background_workers();";

// ============================================================================
// Config file discovery
// ============================================================================

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "BGW_RESTARTER_CONFIG";

/// Config file picked up from the working directory when no explicit path
/// is given.
pub const LOCAL_CONFIG_FILE: &str = "bgw_restarter.toml";
