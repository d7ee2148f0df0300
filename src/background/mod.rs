//! Background services — TimescaleDB background worker health
//!
//! A single check cycle per invocation. Scheduling the cycles is left to
//! an external trigger (cron, Kubernetes CronJob).

pub mod self_healer;

pub use self_healer::{
    assess, staleness_border, CheckReport, HealAction, HealthStatus, JobCatalog, SelfHealer,
};
