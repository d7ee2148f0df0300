//! One restarter run: connect, check, remediate, disconnect.

use crate::background::{CheckReport, SelfHealer};
use crate::background::self_healer::cancellable;
use crate::config::{CheckConfig, Config};
use crate::db;
use crate::error::RestartError;
use chrono::Utc;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Run a single staleness check against the configured database.
///
/// Holds at most one pooled connection. The pool is closed on every exit
/// path, including errors and cancellation.
pub async fn run(cancel: &CancellationToken, config: &Config) -> Result<CheckReport, RestartError> {
    let pool = cancellable(cancel, db::create_pool(&config.postgres))
        .await?
        .map_err(RestartError::Connect)?;

    let result = check(&pool, &config.check, cancel).await;

    pool.close().await;
    debug!("Connection pool closed");
    result
}

async fn check(
    pool: &PgPool,
    check: &CheckConfig,
    cancel: &CancellationToken,
) -> Result<CheckReport, RestartError> {
    let mut conn = cancellable(cancel, pool.acquire())
        .await?
        .map_err(RestartError::Connect)?;

    let healer = SelfHealer::new(check.clone());
    healer.run_once(&mut *conn, Utc::now(), cancel).await
}
