//! Job error types.

use riskctl_broker::BrokerError;
use riskctl_core::CoreError;
use riskctl_persistence::PersistenceError;
use riskctl_risk::RiskError;
use thiserror::Error;

/// Failure of one user's evaluation or one operator operation.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Risk error: {0}")]
    Risk(#[from] RiskError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("Broker call {call} timed out after {after_ms}ms")]
    Timeout { call: &'static str, after_ms: u64 },

    #[error("Unknown user: {0}")]
    UnknownUser(String),

    #[error("User {0} is already being processed")]
    UserBusy(String),

    #[error("Heartbeat failed: {0}")]
    Heartbeat(String),
}

impl JobError {
    /// Code recorded in failure audit entries.
    pub fn code(&self) -> &str {
        match self {
            Self::Broker(e) => e.code(),
            Self::Risk(RiskError::InvalidInput(_)) => "INVALID_INPUT",
            Self::Risk(RiskError::InvalidConfiguration(_)) => "INVALID_CONFIGURATION",
            Self::Persistence(_) => "PERSISTENCE",
            Self::Core(_) => "CORE",
            Self::Timeout { .. } => "TIMEOUT",
            Self::UnknownUser(_) => "UNKNOWN_USER",
            Self::UserBusy(_) => "USER_BUSY",
            Self::Heartbeat(_) => "HEARTBEAT",
        }
    }

    /// Transient failures are retried by the next poll.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Broker(e) => e.is_transient(),
            Self::Timeout { .. } => true,
            _ => false,
        }
    }
}

pub type JobResult<T> = Result<T, JobError>;
