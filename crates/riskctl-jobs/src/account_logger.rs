//! Periodic account-state logger.
//!
//! Tracks each active user's traded-order count. On a change the new
//! count is stored; on an even count, or at the session-open minute, a
//! `DailySnapshotRecord` is written and the user's daily goal is updated.

use riskctl_core::{Capability, DailySnapshotRecord, FlagUpdate, UserAccount};
use riskctl_scheduler::{BoxFuture, JobReport, ScheduledJob};
use riskctl_telemetry::Metrics;
use tracing::{debug, info};

use crate::context::JobContext;
use crate::error::JobResult;
use crate::guard::JobKind;
use crate::sweep::sweep_users;

pub struct AccountLogger {
    ctx: JobContext,
}

impl AccountLogger {
    pub const NAME: &'static str = "account_logger";

    pub fn new(ctx: JobContext) -> Self {
        Self { ctx }
    }

    pub async fn run_once(&self) -> JobResult<JobReport> {
        let users = self.ctx.accounts.eligible_users(Capability::AccountLogging)?;
        let summary = sweep_users(&self.ctx, JobKind::AccountLogger, users, |user| async move {
            let record = self.log_user(&user).await?;
            Ok(usize::from(record.is_some()))
        })
        .await;
        Ok(summary.into_report())
    }

    /// Returns the snapshot written for this user, if any.
    pub async fn log_user(&self, user: &UserAccount) -> JobResult<Option<DailySnapshotRecord>> {
        let snapshot = self.ctx.list_orders(user).await?;
        let order_count = snapshot.traded_count();

        if order_count == user.last_observed_order_count {
            debug!(user = %user.username, order_count, "Order count unchanged");
            return Ok(None);
        }

        self.ctx
            .accounts
            .update_flags(user.id, &FlagUpdate::order_count(order_count))?;
        info!(
            user = %user.username,
            previous = user.last_observed_order_count,
            order_count,
            "Order count changed"
        );

        let now = self.ctx.now();
        let session_open = self.ctx.calendar.is_session_open_minute(now);
        let even_count = order_count > 0 && order_count % 2 == 0;
        if !(even_count || session_open) {
            return Ok(None);
        }

        let delay = self.ctx.accounting.settle_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let funds = self.ctx.fund_limits(user).await?;
        let positions = self.ctx.list_positions(user).await?;

        let realized_pnl = positions.realized_total();
        let expenses = self.ctx.accounting.expense(order_count);
        let actual_profit = realized_pnl - expenses;

        let now = self.ctx.now();
        let record = DailySnapshotRecord {
            user_id: user.id,
            username: user.username.clone(),
            created_at: now,
            opening_balance: funds.opening_balance,
            closing_balance: funds.available_balance,
            order_count,
            realized_pnl,
            expenses,
            actual_profit,
            day_open: self.ctx.calendar.is_open_hour(now) || session_open,
            day_close: self.ctx.calendar.is_close_hour(now),
        };
        self.ctx.audit.record_daily_snapshot(record.clone())?;
        Metrics::record_written("daily_snapshot");

        let date = self.ctx.calendar.local_date(now);
        match self
            .ctx
            .audit
            .record_goal_progress(user.id, date, actual_profit)?
        {
            Some(goal) => info!(
                user = %user.username,
                progress = %goal.progress,
                target = %goal.target,
                achieved = goal.achieved,
                "Daily goal updated"
            ),
            None => debug!(user = %user.username, %date, "No daily goal for user"),
        }

        info!(
            user = %user.username,
            order_count,
            %realized_pnl,
            %actual_profit,
            "Daily snapshot recorded"
        );
        Ok(Some(record))
    }
}

impl ScheduledJob for AccountLogger {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(&self) -> BoxFuture<'_, anyhow::Result<JobReport>> {
        Box::pin(async move { Ok(self.run_once().await?) })
    }
}
