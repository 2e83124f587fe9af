//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Core error: {0}")]
    Core(#[from] riskctl_core::CoreError),

    #[error("Broker error: {0}")]
    Broker(#[from] riskctl_broker::BrokerError),

    #[error("Risk error: {0}")]
    Risk(#[from] riskctl_risk::RiskError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] riskctl_persistence::PersistenceError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] riskctl_scheduler::SchedulerError),

    #[error("Job error: {0}")]
    Job(#[from] riskctl_jobs::JobError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] riskctl_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
