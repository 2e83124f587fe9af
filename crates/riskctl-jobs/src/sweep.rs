//! Per-user fan-out inside one job instance.

use std::future::Future;

use futures_util::stream::{self, StreamExt};
use riskctl_core::UserAccount;
use riskctl_scheduler::JobReport;
use riskctl_telemetry::Metrics;
use tracing::{debug, error};

use crate::context::JobContext;
use crate::error::JobResult;
use crate::guard::JobKind;

/// Totals for one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub users: usize,
    pub actions: usize,
    pub failures: usize,
    /// Users skipped because another instance of the job held them.
    pub busy: usize,
}

impl SweepSummary {
    pub fn into_report(self) -> JobReport {
        JobReport::Completed {
            users: self.users,
            actions: self.actions,
            failures: self.failures,
        }
    }
}

enum UserOutcome {
    Done(usize),
    Failed,
    Busy,
}

/// Run `per_user` for every user with bounded concurrency.
///
/// Each user is claimed in the in-flight registry first. An error for
/// one user is logged and counted; the remaining users still run.
/// `per_user` returns the number of actions taken.
pub async fn sweep_users<F, Fut>(
    ctx: &JobContext,
    kind: JobKind,
    users: Vec<UserAccount>,
    per_user: F,
) -> SweepSummary
where
    F: Fn(UserAccount) -> Fut,
    Fut: Future<Output = JobResult<usize>>,
{
    let total = users.len();
    let per_user = &per_user;

    let outcomes: Vec<UserOutcome> = stream::iter(users)
        .map(|user| async move {
            let Some(_guard) = ctx.in_flight.try_acquire(kind, user.id) else {
                debug!(job = %kind, user = %user.username, "User already being processed, skipping");
                Metrics::user_busy(kind.as_str());
                return UserOutcome::Busy;
            };

            let username = user.username.clone();
            match per_user(user).await {
                Ok(actions) => UserOutcome::Done(actions),
                Err(e) => {
                    error!(job = %kind, user = %username, code = e.code(), error = %e, "User evaluation failed");
                    Metrics::user_failed(kind.as_str());
                    UserOutcome::Failed
                }
            }
        })
        .buffer_unordered(ctx.fan_out.max(1))
        .collect()
        .await;

    let mut summary = SweepSummary {
        users: total,
        ..SweepSummary::default()
    };
    for outcome in outcomes {
        match outcome {
            UserOutcome::Done(n) => summary.actions += n,
            UserOutcome::Failed => summary.failures += 1,
            UserOutcome::Busy => summary.busy += 1,
        }
    }
    debug!(
        job = %kind,
        users = summary.users,
        actions = summary.actions,
        failures = summary.failures,
        busy = summary.busy,
        "Sweep finished"
    );
    summary
}
