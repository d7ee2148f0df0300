//! Self-Healer — background worker staleness check with automatic restart
//!
//! TimescaleDB runs continuous aggregate refresh policies from its own pool
//! of background workers. When that pool stalls, jobs stop being
//! rescheduled and their `next_start` drifts into the past while the server
//! itself keeps answering queries. One check cycle:
//!
//! - reads the earliest pending `next_start` of the refresh policy job
//! - compares it against `now - staleness window`
//! - restarts the background workers if it lies at or before that border

use crate::config::CheckConfig;
use crate::error::RestartError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use sqlx::PgConnection;
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Earliest scheduled run of a job, skipping disabled (`-infinity`) entries.
/// `infinity` is excluded too: it has no `DateTime<Utc>` representation.
const NEXT_START_QUERY: &str = "SELECT next_start FROM timescaledb_information.jobs \
     WHERE proc_name = $1 AND next_start != '-infinity' AND next_start != 'infinity' \
     ORDER BY next_start ASC LIMIT 1";

/// Health of the background worker pool as judged by one job schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Next run lies after the staleness border
    Healthy,
    /// Next run lies at or before the border; the pool is not rescheduling jobs
    Stalled,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "HEALTHY"),
            HealthStatus::Stalled => write!(f, "STALLED"),
        }
    }
}

/// Action taken in response to a health status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealAction {
    NoActionNeeded,
    WorkersRestarted,
}

impl std::fmt::Display for HealAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealAction::NoActionNeeded => write!(f, "no action needed"),
            HealAction::WorkersRestarted => write!(f, "background workers restarted"),
        }
    }
}

/// Outcome of a completed check cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    /// Earliest pending run of the watched job
    pub next_start: DateTime<Utc>,
    /// `now - staleness window` at the time of the check
    pub border: DateTime<Utc>,
    pub status: HealthStatus,
    pub action: HealAction,
}

/// Access to TimescaleDB's job scheduler.
///
/// Implemented for a live `PgConnection`; tests substitute an in-memory
/// catalog.
#[async_trait]
pub trait JobCatalog: Send {
    /// Earliest `next_start` among jobs running `proc_name`, or `None` if
    /// no such job is scheduled.
    async fn next_start(&mut self, proc_name: &str) -> Result<Option<DateTime<Utc>>, sqlx::Error>;

    /// Execute the statement that restarts the background worker pool.
    async fn restart_background_workers(&mut self, statement: &str) -> Result<(), sqlx::Error>;
}

#[async_trait]
impl JobCatalog for PgConnection {
    async fn next_start(&mut self, proc_name: &str) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
        sqlx::query_scalar::<_, DateTime<Utc>>(NEXT_START_QUERY)
            .bind(proc_name)
            .fetch_optional(&mut *self)
            .await
    }

    async fn restart_background_workers(&mut self, statement: &str) -> Result<(), sqlx::Error> {
        sqlx::query(statement).execute(&mut *self).await?;
        Ok(())
    }
}

/// Instant a job's next run must lie after for the pool to count as healthy.
pub fn staleness_border(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    now.checked_sub_signed(window)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Classify a job schedule against the staleness border.
pub fn assess(next_start: DateTime<Utc>, border: DateTime<Utc>) -> HealthStatus {
    if next_start > border {
        HealthStatus::Healthy
    } else {
        HealthStatus::Stalled
    }
}

/// Runs the staleness check and restarts the background workers when needed
#[derive(Debug, Clone)]
pub struct SelfHealer {
    config: CheckConfig,
}

impl SelfHealer {
    pub fn new(config: CheckConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CheckConfig {
        &self.config
    }

    /// Run one check cycle against `catalog`.
    ///
    /// `now` is the single time reference for this cycle. Issues at most one
    /// restart. Returns `Cancelled` as soon as `cancel` fires while a catalog
    /// call is in flight.
    pub async fn run_once<C>(
        &self,
        catalog: &mut C,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<CheckReport, RestartError>
    where
        C: JobCatalog + ?Sized,
    {
        let proc_name = self.config.proc_name.as_str();

        let next_start = cancellable(cancel, catalog.next_start(proc_name))
            .await?
            .map_err(RestartError::Query)?
            .ok_or_else(|| RestartError::NoScheduledJob {
                proc_name: proc_name.to_string(),
            })?;

        let border = staleness_border(now, self.config.staleness_window());
        let status = assess(next_start, border);

        if status == HealthStatus::Healthy {
            info!(
                next_start = %rfc3339(next_start),
                border = %rfc3339(border),
                "Next job schedule is after border time, not performing any action"
            );
            return Ok(CheckReport {
                next_start,
                border,
                status,
                action: HealAction::NoActionNeeded,
            });
        }

        warn!(
            next_start = %rfc3339(next_start),
            border = %rfc3339(border),
            "Next job schedule is at or before border time, restarting background workers"
        );
        cancellable(
            cancel,
            catalog.restart_background_workers(&self.config.restart_statement),
        )
        .await?
        .map_err(RestartError::Remediation)?;

        Ok(CheckReport {
            next_start,
            border,
            status,
            action: HealAction::WorkersRestarted,
        })
    }
}

/// Race `fut` against the cancellation token, preferring cancellation.
pub(crate) async fn cancellable<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, RestartError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(RestartError::Cancelled),
        out = fut => Ok(out),
    }
}

fn rfc3339(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}
