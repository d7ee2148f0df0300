//! Database connection pool

use crate::config::PostgresConfig;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, Connection, PgPool};
use std::time::Duration;
use tracing::info;

/// Stand-in for "no timeout": sqlx needs a finite deadline. Waiting for a
/// pooled slot then only ends early through the caller's cancellation token.
const UNBOUNDED_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Acquire timeout for a configured number of seconds, 0 meaning none.
pub const fn acquire_timeout(secs: u64) -> Duration {
    if secs == 0 {
        UNBOUNDED_ACQUIRE_TIMEOUT
    } else {
        Duration::from_secs(secs)
    }
}

/// Build connect options field by field, so credentials never pass through
/// a URL string.
pub fn connect_options(config: &PostgresConfig) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .database(&config.database)
        .username(&config.user)
        .password(&config.password)
        .application_name("timescale-bgw-restarter")
}

/// Create a PostgreSQL connection pool.
///
/// Makes one direct connection attempt first, so an unreachable server or
/// bad credentials fail immediately. sqlx's pool would keep retrying a
/// refused connection until the acquire timeout, which is unbounded by
/// default. The pool itself is built lazily; its acquire timeout only
/// bounds waiting for a slot.
pub async fn create_pool(config: &PostgresConfig) -> Result<PgPool, sqlx::Error> {
    let options = connect_options(config);

    let first = options.connect().await?;
    first.close().await?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(acquire_timeout(config.acquire_timeout_secs))
        .connect_lazy_with(options);

    info!(
        host = %config.host,
        port = config.port,
        database = %config.database,
        "Connected to PostgreSQL"
    );
    Ok(pool)
}
