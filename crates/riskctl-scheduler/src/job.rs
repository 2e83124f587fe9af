//! Scheduled job trait.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future type for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Outcome of one job instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobReport {
    /// The job ran over its users.
    Completed {
        users: usize,
        actions: usize,
        failures: usize,
    },
    /// The job decided there was nothing to do (e.g. outside the trading window).
    Skipped { reason: String },
}

impl JobReport {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    /// Metric label for this outcome.
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::Skipped { .. } => "skipped",
        }
    }
}

/// A unit of periodic work.
///
/// `run` returns `Err` only when the whole instance failed (e.g. the user
/// list could not be read); per-user failures are reported in
/// `JobReport::Completed::failures`.
pub trait ScheduledJob: Send + Sync {
    fn name(&self) -> &str;

    fn run(&self) -> BoxFuture<'_, anyhow::Result<JobReport>>;
}

/// Arc wrapper for ScheduledJob trait objects.
pub type DynScheduledJob = Arc<dyn ScheduledJob>;
