//! Quick-exit monitor: flatten positions whose stop-loss was cancelled.

use riskctl_core::{Capability, EnforcementAction, UserAccount};
use riskctl_risk::detect_quick_exit;
use riskctl_scheduler::{BoxFuture, JobReport, ScheduledJob};
use tracing::{debug, info};

use crate::context::JobContext;
use crate::error::JobResult;
use crate::executor::execute_order_action;
use crate::guard::JobKind;
use crate::sweep::sweep_users;

pub struct QuickExitMonitor {
    ctx: JobContext,
}

impl QuickExitMonitor {
    pub const NAME: &'static str = "quick_exit";

    pub fn new(ctx: JobContext) -> Self {
        Self { ctx }
    }

    pub async fn run_once(&self) -> JobResult<JobReport> {
        if !self.ctx.calendar.is_trading_window(self.ctx.now()) {
            debug!(job = Self::NAME, "Outside trading window");
            return Ok(JobReport::skipped("outside trading window"));
        }

        let users = self.ctx.accounts.eligible_users(Capability::QuickExit)?;
        let summary = sweep_users(&self.ctx, JobKind::QuickExit, users, |user| async move {
            let action = self.evaluate_user(&user).await?;
            Ok(usize::from(!action.is_no_action()))
        })
        .await;
        Ok(summary.into_report())
    }

    /// Market-sell when the latest order is a cancelled STOP_LOSS SELL.
    pub async fn evaluate_user(&self, user: &UserAccount) -> JobResult<EnforcementAction> {
        let snapshot = self.ctx.list_orders(user).await?;
        let action = detect_quick_exit(&snapshot);
        if action.is_no_action() {
            debug!(user = %user.username, "No cancelled stop-loss to act on");
            return Ok(action);
        }

        info!(user = %user.username, action = %action, "Cancelled stop-loss detected");
        execute_order_action(&self.ctx, user, &action).await?;
        Ok(action)
    }
}

impl ScheduledJob for QuickExitMonitor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(&self) -> BoxFuture<'_, anyhow::Result<JobReport>> {
        Box::pin(async move { Ok(self.run_once().await?) })
    }
}
