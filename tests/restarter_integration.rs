//! Restarter Integration Tests
//!
//! Drives the public API end to end with an in-memory job catalog standing in
//! for `timescaledb_information.jobs`, plus config loading from real files.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::io::Write;
use timescale_bgw_restarter::{
    CheckConfig, Config, ConfigError, ConfigOverrides, ErrorKind, HealAction, HealthStatus,
    JobCatalog, RestartError, SelfHealer,
};
use tokio_util::sync::CancellationToken;

// ============================================================================
// In-memory scheduler
// ============================================================================

/// A miniature jobs table: (proc_name, next_start) rows, `None` meaning
/// the `-infinity` sentinel of a disabled job.
#[derive(Default)]
struct JobsTable {
    rows: Vec<(String, Option<DateTime<Utc>>)>,
    restart_error: Option<String>,
    restarts: usize,
}

impl JobsTable {
    fn with_jobs(rows: &[(&str, Option<DateTime<Utc>>)]) -> Self {
        Self {
            rows: rows.iter().map(|(p, t)| ((*p).to_string(), *t)).collect(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl JobCatalog for JobsTable {
    async fn next_start(&mut self, proc_name: &str) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
        Ok(self
            .rows
            .iter()
            .filter(|(p, _)| p == proc_name)
            .filter_map(|(_, t)| *t)
            .min())
    }

    async fn restart_background_workers(&mut self, _statement: &str) -> Result<(), sqlx::Error> {
        self.restarts += 1;
        match &self.restart_error {
            Some(msg) => Err(sqlx::Error::Protocol(msg.clone())),
            None => Ok(()),
        }
    }
}

const REFRESH: &str = "policy_refresh_continuous_aggregate";

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 10, 8, 30, 0)
        .single()
        .unwrap_or_default()
}

fn healer() -> SelfHealer {
    SelfHealer::new(CheckConfig::default())
}

// ============================================================================
// Decision procedure
// ============================================================================

#[tokio::test]
async fn scenario_a_one_hour_behind_is_healthy() {
    let mut jobs = JobsTable::with_jobs(&[(REFRESH, Some(now() - Duration::hours(1)))]);
    let report = healer()
        .run_once(&mut jobs, now(), &CancellationToken::new())
        .await
        .expect("healthy run succeeds");

    assert_eq!(report.status, HealthStatus::Healthy);
    assert_eq!(report.action, HealAction::NoActionNeeded);
    assert_eq!(report.border, now() - Duration::hours(12));
    assert_eq!(jobs.restarts, 0);
}

#[tokio::test]
async fn scenario_b_thirteen_hours_behind_restarts() {
    let mut jobs = JobsTable::with_jobs(&[(REFRESH, Some(now() - Duration::hours(13)))]);
    let report = healer()
        .run_once(&mut jobs, now(), &CancellationToken::new())
        .await
        .expect("restart succeeds");

    assert_eq!(report.status, HealthStatus::Stalled);
    assert_eq!(report.action, HealAction::WorkersRestarted);
    assert_eq!(jobs.restarts, 1);
}

#[tokio::test]
async fn scenario_c_only_disabled_jobs_is_an_error() {
    let mut jobs = JobsTable::with_jobs(&[
        (REFRESH, None),
        (REFRESH, None),
        ("policy_retention", Some(now() - Duration::days(3))),
    ]);
    let err = healer()
        .run_once(&mut jobs, now(), &CancellationToken::new())
        .await
        .expect_err("no schedulable refresh job");

    assert!(matches!(err, RestartError::NoScheduledJob { ref proc_name } if proc_name == REFRESH));
    assert_eq!(jobs.restarts, 0);
}

#[tokio::test]
async fn scenario_d_restart_failure_is_distinct() {
    let mut jobs = JobsTable::with_jobs(&[(REFRESH, Some(now() - Duration::hours(13)))]);
    jobs.restart_error = Some("must be superuser".to_string());

    let err = healer()
        .run_once(&mut jobs, now(), &CancellationToken::new())
        .await
        .expect_err("restart rejected");

    assert_eq!(err.kind(), ErrorKind::Remediation);
    assert_ne!(err.kind(), ErrorKind::Query);
    assert_ne!(err.kind(), ErrorKind::Connectivity);
    let cause = std::error::Error::source(&err).expect("database cause preserved");
    assert!(cause.to_string().contains("must be superuser"));
}

#[tokio::test]
async fn earliest_schedule_among_many_jobs_decides() {
    // One refresh job is stuck far in the past, the other is fine.
    let mut jobs = JobsTable::with_jobs(&[
        (REFRESH, Some(now() + Duration::minutes(10))),
        (REFRESH, Some(now() - Duration::days(2))),
        (REFRESH, None),
    ]);
    let report = healer()
        .run_once(&mut jobs, now(), &CancellationToken::new())
        .await
        .expect("restart succeeds");

    assert_eq!(report.next_start, now() - Duration::days(2));
    assert_eq!(report.action, HealAction::WorkersRestarted);
}

#[tokio::test]
async fn repeated_healthy_runs_never_restart() {
    let mut jobs = JobsTable::with_jobs(&[(REFRESH, Some(now() + Duration::minutes(30)))]);
    let cancel = CancellationToken::new();

    for _ in 0..2 {
        let report = healer()
            .run_once(&mut jobs, now(), &cancel)
            .await
            .expect("healthy run succeeds");
        assert_eq!(report.action, HealAction::NoActionNeeded);
    }
    assert_eq!(jobs.restarts, 0);
}

#[tokio::test]
async fn repeated_stale_runs_restart_each_time() {
    let mut jobs = JobsTable::with_jobs(&[(REFRESH, Some(now() - Duration::hours(20)))]);
    let cancel = CancellationToken::new();

    for _ in 0..2 {
        healer()
            .run_once(&mut jobs, now(), &cancel)
            .await
            .expect("restart succeeds");
    }
    assert_eq!(jobs.restarts, 2);
}

#[tokio::test]
async fn boundary_sweep_around_the_border() {
    let cancel = CancellationToken::new();
    for (offset_minutes, expect_restart) in [
        (-11 * 60, false),
        (-12 * 60 + 1, false),
        (-12 * 60, true),
        (-12 * 60 - 1, true),
        (-30 * 24 * 60, true),
    ] {
        let mut jobs =
            JobsTable::with_jobs(&[(REFRESH, Some(now() + Duration::minutes(offset_minutes)))]);
        healer()
            .run_once(&mut jobs, now(), &cancel)
            .await
            .expect("run succeeds");
        assert_eq!(
            jobs.restarts == 1,
            expect_restart,
            "offset {offset_minutes} min"
        );
    }
}

// ============================================================================
// Configuration files
// ============================================================================

#[test]
fn explicit_config_file_is_loaded_and_overridden() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    write!(
        file,
        r#"
[postgres]
host = "timescale.db.svc"
port = 5433
database = "senergy"
user = "bgw"
password = "from-file"

[check]
staleness_window_hours = 6
restart_statement = "SELECT _timescaledb_functions.restart_background_workers();"
"#
    )
    .expect("write config");

    let config = Config::load(Some(file.path()))
        .expect("config loads")
        .with_overrides(ConfigOverrides {
            password: Some("from-env".to_string()),
            ..Default::default()
        });

    assert!(config.validate().is_ok());
    assert_eq!(config.postgres.host, "timescale.db.svc");
    assert_eq!(config.postgres.port, 5433);
    assert_eq!(config.postgres.password, "from-env");
    assert_eq!(config.check.staleness_window(), Duration::hours(6));
    assert_eq!(config.check.proc_name, REFRESH);
}

#[test]
fn missing_explicit_config_file_is_an_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let err = Config::load(Some(&dir.path().join("absent.toml"))).expect_err("must fail");
    assert!(matches!(err, ConfigError::Io(..)));
}
