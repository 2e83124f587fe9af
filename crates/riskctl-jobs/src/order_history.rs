//! End-of-session order history.

use riskctl_core::{Capability, OrderHistoryRecord, UserAccount};
use riskctl_scheduler::{BoxFuture, JobReport, ScheduledJob};
use riskctl_telemetry::Metrics;
use tracing::{debug, info};

use crate::context::JobContext;
use crate::error::JobResult;
use crate::guard::JobKind;
use crate::sweep::sweep_users;

/// Writes one `OrderHistoryRecord` per active user with orders today.
pub struct OrderHistoryJob {
    ctx: JobContext,
}

impl OrderHistoryJob {
    pub const NAME: &'static str = "order_history";

    pub fn new(ctx: JobContext) -> Self {
        Self { ctx }
    }

    pub async fn run_once(&self) -> JobResult<JobReport> {
        let users = self.ctx.accounts.eligible_users(Capability::AccountLogging)?;
        let summary = sweep_users(&self.ctx, JobKind::OrderHistory, users, |user| async move {
            let record = self.record_user(&user).await?;
            Ok(usize::from(record.is_some()))
        })
        .await;
        Ok(summary.into_report())
    }

    /// Order count here is every order in the book, not just traded ones.
    pub async fn record_user(&self, user: &UserAccount) -> JobResult<Option<OrderHistoryRecord>> {
        let snapshot = self.ctx.list_orders(user).await?;
        if snapshot.is_empty() {
            debug!(user = %user.username, "No orders today");
            return Ok(None);
        }
        let order_count = u32::try_from(snapshot.len()).unwrap_or(u32::MAX);

        let funds = self.ctx.fund_limits(user).await?;
        let positions = self.ctx.list_positions(user).await?;
        let expense = self.ctx.accounting.expense(order_count);
        let profit_loss = positions.realized_total() - expense;

        let record = OrderHistoryRecord {
            user_id: user.id,
            username: user.username.clone(),
            date: self.ctx.calendar.local_date(self.ctx.now()),
            order_data: snapshot.raw,
            order_count,
            profit_loss,
            sod_balance: funds.opening_balance,
            eod_balance: funds.withdrawable_balance,
            expense,
        };
        self.ctx.audit.record_order_history(record.clone())?;
        Metrics::record_written("order_history");

        info!(user = %user.username, order_count, %profit_loss, "Order history recorded");
        Ok(Some(record))
    }
}

impl ScheduledJob for OrderHistoryJob {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(&self) -> BoxFuture<'_, anyhow::Result<JobReport>> {
        Box::pin(async move { Ok(self.run_once().await?) })
    }
}
