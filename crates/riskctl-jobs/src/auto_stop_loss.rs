//! Auto stop-loss monitor: protect every freshly traded BUY.
//!
//! A new STOP_LOSS SELL is placed for each detected BUY even when
//! pending SELL orders already exist; protection stacks rather than
//! replaces.

use riskctl_core::{Capability, EnforcementAction, UserAccount};
use riskctl_risk::detect_stop_loss;
use riskctl_scheduler::{BoxFuture, JobReport, ScheduledJob};
use tracing::{debug, info};

use crate::context::JobContext;
use crate::error::JobResult;
use crate::executor::execute_order_action;
use crate::guard::JobKind;
use crate::sweep::sweep_users;

pub struct AutoStopLossMonitor {
    ctx: JobContext,
}

impl AutoStopLossMonitor {
    pub const NAME: &'static str = "auto_stop_loss";

    pub fn new(ctx: JobContext) -> Self {
        Self { ctx }
    }

    pub async fn run_once(&self) -> JobResult<JobReport> {
        if !self.ctx.calendar.is_trading_window(self.ctx.now()) {
            debug!(job = Self::NAME, "Outside trading window");
            return Ok(JobReport::skipped("outside trading window"));
        }

        let users = self.ctx.accounts.eligible_users(Capability::AutoStopLoss)?;
        let summary = sweep_users(&self.ctx, JobKind::AutoStopLoss, users, |user| async move {
            let action = self.evaluate_user(&user).await?;
            Ok(usize::from(!action.is_no_action()))
        })
        .await;
        Ok(summary.into_report())
    }

    pub async fn evaluate_user(&self, user: &UserAccount) -> JobResult<EnforcementAction> {
        let Some(thresholds) = self.ctx.accounts.thresholds_for(user.id)? else {
            debug!(user = %user.username, "No control thresholds, skipping");
            return Ok(EnforcementAction::NoAction);
        };

        let snapshot = self.ctx.list_orders(user).await?;
        let action = detect_stop_loss(&snapshot, &thresholds, &self.ctx.stop_loss)?;
        if action.is_no_action() {
            debug!(user = %user.username, "No recent traded BUY");
            return Ok(action);
        }

        info!(
            user = %user.username,
            action = %action,
            mode = %thresholds.stop_loss_mode,
            parameter = %thresholds.stop_loss_parameter,
            pending_sells = snapshot.pending_sell_orders().count(),
            "Placing stop-loss"
        );
        execute_order_action(&self.ctx, user, &action).await?;
        Ok(action)
    }
}

impl ScheduledJob for AutoStopLossMonitor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(&self) -> BoxFuture<'_, anyhow::Result<JobReport>> {
        Box::pin(async move { Ok(self.run_once().await?) })
    }
}
