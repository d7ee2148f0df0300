//! timescale-bgw-restarter - TimescaleDB background worker watchdog
//!
//! Runs one staleness check and exits. Meant to be triggered periodically
//! by cron or a Kubernetes CronJob.
//!
//! # Usage
//!
//! ```bash
//! # Defaults, overridden from the environment
//! POSTGRES_HOST=tsdb POSTGRES_PW=secret ./timescale-bgw-restarter
//!
//! # Explicit config file, give up after 5 minutes
//! ./timescale-bgw-restarter --config /etc/bgw_restarter.toml --timeout-secs 300
//! ```
//!
//! # Environment Variables
//!
//! | Variable                   | Description                                  |
//! |----------------------------|----------------------------------------------|
//! | `BGW_RESTARTER_CONFIG`     | Path to TOML config file                     |
//! | `POSTGRES_HOST`            | Database host                                |
//! | `POSTGRES_PORT`            | Database port                                |
//! | `POSTGRES_DB`              | Database name                                |
//! | `POSTGRES_USER`            | Database user                                |
//! | `POSTGRES_PW`              | Database password                            |
//! | `POSTGRES_MAX_CONNECTIONS` | Pool size bound (default: 10)                |
//! | `POSTGRES_ACQUIRE_TIMEOUT_SECS` | Pool slot wait in seconds (default: 0 = none) |
//! | `STALENESS_WINDOW_HOURS`   | Staleness window (default: 12)               |
//! | `JOB_PROC_NAME`            | Job used as health signal                    |
//! | `RESTART_STATEMENT`        | Statement restarting the background workers  |
//! | `BGW_RESTARTER_TIMEOUT_SECS` | Cancel the run after this many seconds     |
//! | `RUST_LOG`                 | Logging level (default: info)                |

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use timescale_bgw_restarter::{worker, Config, ConfigOverrides, HealAction};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "timescale-bgw-restarter")]
#[command(about = "Restarts TimescaleDB background workers when refresh jobs stall")]
#[command(version)]
struct CliArgs {
    /// Path to a TOML config file
    #[arg(long, env = "BGW_RESTARTER_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Database host
    #[arg(long, env = "POSTGRES_HOST")]
    postgres_host: Option<String>,

    /// Database port
    #[arg(long, env = "POSTGRES_PORT")]
    postgres_port: Option<u16>,

    /// Database name
    #[arg(long, env = "POSTGRES_DB")]
    postgres_db: Option<String>,

    /// Database user
    #[arg(long, env = "POSTGRES_USER")]
    postgres_user: Option<String>,

    /// Database password
    #[arg(long, env = "POSTGRES_PW", hide_env_values = true)]
    postgres_pw: Option<String>,

    /// Maximum pooled connections
    #[arg(long, env = "POSTGRES_MAX_CONNECTIONS")]
    postgres_max_connections: Option<u32>,

    /// Seconds to wait for a pooled connection slot (0 = wait until cancelled)
    #[arg(long, env = "POSTGRES_ACQUIRE_TIMEOUT_SECS")]
    postgres_acquire_timeout_secs: Option<u64>,

    /// Hours a job's next run may lie in the past before restarting workers
    #[arg(long, env = "STALENESS_WINDOW_HOURS")]
    staleness_window_hours: Option<u64>,

    /// Procedure name of the job used as the health signal
    #[arg(long, env = "JOB_PROC_NAME")]
    job_proc_name: Option<String>,

    /// Statement that restarts the background workers
    #[arg(long, env = "RESTART_STATEMENT")]
    restart_statement: Option<String>,

    /// Cancel the run after this many seconds
    #[arg(long, env = "BGW_RESTARTER_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

impl CliArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            host: self.postgres_host.clone(),
            port: self.postgres_port,
            database: self.postgres_db.clone(),
            user: self.postgres_user.clone(),
            password: self.postgres_pw.clone(),
            max_connections: self.postgres_max_connections,
            acquire_timeout_secs: self.postgres_acquire_timeout_secs,
            staleness_window_hours: self.staleness_window_hours,
            proc_name: self.job_proc_name.clone(),
            restart_statement: self.restart_statement.clone(),
        }
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let args = CliArgs::parse();
    init_tracing(args.log_json);

    let config = Config::load(args.config.as_deref())
        .context("Failed to load configuration")?
        .with_overrides(args.overrides());
    config.validate()?;

    info!(
        host = %config.postgres.host,
        port = config.postgres.port,
        database = %config.postgres.database,
        proc_name = %config.check.proc_name,
        window_hours = config.check.staleness_window_hours,
        "Starting background worker check"
    );

    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, cancelling run");
        shutdown_token.cancel();
    });

    if let Some(secs) = args.timeout_secs {
        let deadline_token = cancel_token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            warn!(timeout_secs = secs, "Run deadline reached, cancelling");
            deadline_token.cancel();
        });
    }

    let report = worker::run(&cancel_token, &config)
        .await
        .context("Background worker check failed")?;

    info!(
        status = %report.status,
        action = %report.action,
        restarted = report.action == HealAction::WorkersRestarted,
        "Check complete"
    );
    Ok(())
}
