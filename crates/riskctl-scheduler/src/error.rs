//! Scheduler error types.

use thiserror::Error;

/// Errors raised while configuring or starting the scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("max_instances must be at least 1 for job {0}")]
    InvalidMaxInstances(String),

    #[error("job already registered: {0}")]
    DuplicateJob(String),

    #[error("scheduler already started")]
    AlreadyStarted,

    #[error("invalid trigger: {0}")]
    InvalidTrigger(String),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
