//! Error taxonomy for one restarter run.

use thiserror::Error;

/// Why a run failed. Every variant carrying a database error keeps it as
/// the source.
#[derive(Debug, Error)]
pub enum RestartError {
    #[error("Connection failed")]
    Connect(#[source] sqlx::Error),

    #[error("Job schedule query failed")]
    Query(#[source] sqlx::Error),

    #[error("No scheduled job found for procedure '{proc_name}'")]
    NoScheduledJob { proc_name: String },

    #[error("Background worker restart failed")]
    Remediation(#[source] sqlx::Error),

    #[error("Run cancelled")]
    Cancelled,
}

/// Coarse grouping of [`RestartError`] for callers that only care about
/// which step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Pool or connection could not be established
    Connectivity,
    /// Scheduler metadata query failed or returned nothing
    Query,
    /// The restart statement was rejected
    Remediation,
    /// The cancellation token fired
    Cancelled,
}

impl RestartError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Connect(_) => ErrorKind::Connectivity,
            Self::Query(_) | Self::NoScheduledJob { .. } => ErrorKind::Query,
            Self::Remediation(_) => ErrorKind::Remediation,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connectivity => write!(f, "connectivity"),
            Self::Query => write!(f, "query"),
            Self::Remediation => write!(f, "remediation"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}
