//! Order-count monitor: kill-switch tiers and P&L caps.

use riskctl_core::{Capability, EnforcementAction, UserAccount};
use riskctl_risk::ControlPolicy;
use riskctl_scheduler::{BoxFuture, JobReport, ScheduledJob};
use tracing::{debug, info, warn};

use crate::context::JobContext;
use crate::error::JobResult;
use crate::executor::activate_kill_switch;
use crate::guard::JobKind;
use crate::sweep::sweep_users;

/// Polls each trading user's order book and escalates kill-switch tiers.
pub struct OrderCountMonitor {
    ctx: JobContext,
}

impl OrderCountMonitor {
    pub const NAME: &'static str = "order_count";

    pub fn new(ctx: JobContext) -> Self {
        Self { ctx }
    }

    pub async fn run_once(&self) -> JobResult<JobReport> {
        let now = self.ctx.now();
        if !self.ctx.calendar.is_trading_window(now) {
            debug!(job = Self::NAME, "Outside trading window");
            return Ok(JobReport::skipped("outside trading window"));
        }

        let users = self.ctx.accounts.eligible_users(Capability::OrderCount)?;
        if users.is_empty() {
            debug!(job = Self::NAME, "No eligible users");
        }

        let summary = sweep_users(&self.ctx, JobKind::OrderCount, users, |user| async move {
            let action = self.evaluate_user(&user).await?;
            Ok(usize::from(!action.is_no_action()))
        })
        .await;
        Ok(summary.into_report())
    }

    /// Evaluate one user and carry out the resulting transition.
    ///
    /// Returns the decided action. The tier state is re-read from the
    /// repository after the broker poll so the decision uses the latest
    /// flags, and the transition is written conditionally on that state.
    pub async fn evaluate_user(&self, user: &UserAccount) -> JobResult<EnforcementAction> {
        let snapshot = self.ctx.list_orders(user).await?;
        let traded = snapshot.traded_count();

        let Some(thresholds) = self.ctx.accounts.thresholds_for(user.id)? else {
            debug!(user = %user.username, "No control thresholds, skipping");
            return Ok(EnforcementAction::NoAction);
        };
        let policy = ControlPolicy::new(&thresholds)?;

        let account = self.ctx.accounts.get_user_account(user.id)?;
        let state = account.tier_state();

        let mut action = policy.evaluate_order_count(traded, state);
        if action.is_no_action() && thresholds.pnl_caps_enforced() {
            let positions = self.ctx.list_positions(&account).await?;
            let realized = positions.realized_total();
            action = policy.evaluate_pnl(realized, state);
            if let (false, Some(breach)) = (action.is_no_action(), policy.pnl_breach(realized)) {
                warn!(
                    user = %account.username,
                    %realized,
                    %breach,
                    "P&L cap breached"
                );
            }
        }

        match &action {
            EnforcementAction::ActivateKillSwitch { tier } => {
                info!(
                    user = %account.username,
                    traded,
                    state = %state,
                    tier = tier.as_str(),
                    "Tier transition"
                );
                activate_kill_switch(&self.ctx, &account, *tier, traded, state).await?;
            }
            _ if traded > 0 => {
                info!(user = %account.username, traded, state = %state, "No tier transition");
            }
            _ => {
                debug!(user = %account.username, "No traded orders");
            }
        }

        Ok(action)
    }
}

impl ScheduledJob for OrderCountMonitor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(&self) -> BoxFuture<'_, anyhow::Result<JobReport>> {
        Box::pin(async move { Ok(self.run_once().await?) })
    }
}
