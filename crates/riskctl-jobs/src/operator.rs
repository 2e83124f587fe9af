//! Manual operator operations.
//!
//! These are invoked on demand rather than scheduled, but go through the
//! same executor and audit trail as the monitors.

use riskctl_core::{EnforcementAction, KillSwitchTier, TierState, UserAccount};
use riskctl_risk::plan_flatten;
use tracing::{error, info};

use crate::context::JobContext;
use crate::error::{JobError, JobResult};
use crate::executor::{activate_kill_switch, execute_order_action};
use crate::guard::JobKind;

/// Outcome of `flatten_user`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlattenReport {
    pub actions: Vec<EnforcementAction>,
    pub succeeded: usize,
    pub failed: usize,
}

fn find_user(ctx: &JobContext, username: &str) -> JobResult<UserAccount> {
    ctx.accounts
        .find_by_username(username)?
        .ok_or_else(|| JobError::UnknownUser(username.to_string()))
}

/// Cancel every pending SELL order of `username`, then market-sell the
/// latest traded BUY.
///
/// Individual call failures are audited and counted; the remaining
/// actions still run.
pub async fn flatten_user(ctx: &JobContext, username: &str) -> JobResult<FlattenReport> {
    let user = find_user(ctx, username)?;
    let Some(_guard) = ctx.in_flight.try_acquire(JobKind::Operator, user.id) else {
        return Err(JobError::UserBusy(username.to_string()));
    };

    let snapshot = ctx.list_orders(&user).await?;
    let actions = plan_flatten(&snapshot);
    info!(user = %username, actions = actions.len(), "Flattening user");

    let mut report = FlattenReport::default();
    for action in &actions {
        match execute_order_action(ctx, &user, action).await {
            Ok(true) => report.succeeded += 1,
            Ok(false) => report.failed += 1,
            Err(e) => {
                error!(user = %username, action = %action, error = %e, "Flatten step failed");
                report.failed += 1;
            }
        }
    }
    report.actions = actions;
    Ok(report)
}

/// Escalate `username` one kill-switch tier: `Normal -> Tier1 -> Tier2`.
///
/// A user already at Tier2 is left untouched. Returns the tier state
/// after the call.
pub async fn manual_kill_switch(ctx: &JobContext, username: &str) -> JobResult<TierState> {
    let user = find_user(ctx, username)?;
    let state = user.tier_state();
    let tier = match state {
        TierState::Normal => KillSwitchTier::Tier1,
        TierState::Tier1Activated => KillSwitchTier::Tier2,
        TierState::Tier2Activated => {
            info!(user = %username, "Already at tier2, nothing to do");
            return Ok(state);
        }
    };

    activate_kill_switch(ctx, &user, tier, user.last_observed_order_count, state).await?;
    Ok(ctx.accounts.get_user_account(user.id)?.tier_state())
}
