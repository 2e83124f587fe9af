//! Carry out enforcement actions against the broker.
//!
//! Every attempt leaves an audit trail:
//! - kill switch: the response body, or a failure entry
//! - orders: the raw response, plus a failure entry when the broker
//!   reported `status: failure`, or a failure entry alone on error

use riskctl_broker::{OrderRequest, OrderResult};
use riskctl_core::{
    AuditLogEntry, EnforcementAction, FlagUpdate, KillSwitchTier, TierState, UserAccount,
};
use riskctl_telemetry::Metrics;
use tracing::{error, info, warn};

use crate::context::JobContext;
use crate::error::JobResult;

/// Activate the broker kill switch and record `tier` locally.
///
/// The local flags are only written if the user is still in `expected`,
/// so two racing evaluations cannot both advance the tier. The broker
/// response is audited before the flag write, so a storage failure still
/// leaves a record of the activation. Returns whether the local state was
/// advanced.
pub async fn activate_kill_switch(
    ctx: &JobContext,
    user: &UserAccount,
    tier: KillSwitchTier,
    order_count: u32,
    expected: TierState,
) -> JobResult<bool> {
    let tier_label = tier.as_str();
    let response = ctx
        .call(
            "activate_kill_switch",
            ctx.broker.activate_kill_switch(&user.credentials),
        )
        .await;

    let body = match response {
        Ok(body) => body,
        Err(e) => {
            Metrics::kill_switch(tier_label, false);
            error!(
                user = %user.username,
                tier = tier_label,
                order_count,
                code = e.code(),
                error = %e,
                "Kill switch activation failed, flags unchanged"
            );
            ctx.record_action(AuditLogEntry::failure(
                user.id,
                &user.username,
                "kill_switch",
                e.code(),
                &e.to_string(),
                ctx.now(),
            ))?;
            return Err(e);
        }
    };

    // The broker call already happened; audit it before touching local state.
    Metrics::kill_switch(tier_label, true);
    ctx.record_action(AuditLogEntry::new(
        user.id,
        &user.username,
        "kill_switch",
        body,
        order_count,
        ctx.now(),
    ))?;
    let advanced = ctx
        .accounts
        .update_flags_if(user.id, expected, &FlagUpdate::activate(tier))?;

    if advanced {
        info!(
            user = %user.username,
            tier = tier_label,
            order_count,
            "Kill switch activated"
        );
    } else {
        warn!(
            user = %user.username,
            tier = tier_label,
            expected = %expected,
            "Kill switch activated but tier state moved on, flags not rewritten"
        );
    }
    Ok(advanced)
}

/// Place or cancel the order an action calls for.
///
/// Returns `Ok(true)` when the broker accepted it, `Ok(false)` when it
/// reported a failure (already audited), and `Err` when the call itself
/// failed. `NoAction` and kill-switch actions are ignored here.
pub async fn execute_order_action(
    ctx: &JobContext,
    user: &UserAccount,
    action: &EnforcementAction,
) -> JobResult<bool> {
    let kind = action.kind();
    let (result, quantity) = match action {
        EnforcementAction::PlaceStopLoss {
            security_id,
            exchange_segment,
            quantity,
            price,
            trigger_price,
        } => {
            let request = OrderRequest::stop_loss_sell(
                security_id.as_str(),
                exchange_segment.as_str(),
                *quantity,
                *price,
                *trigger_price,
            );
            let result = ctx
                .call("place_order", ctx.broker.place_order(&user.credentials, request))
                .await;
            (result, *quantity)
        }
        EnforcementAction::ClosePosition {
            security_id,
            exchange_segment,
            quantity,
        } => {
            let request =
                OrderRequest::market_sell(security_id.as_str(), exchange_segment.as_str(), *quantity);
            let result = ctx
                .call("place_order", ctx.broker.place_order(&user.credentials, request))
                .await;
            (result, *quantity)
        }
        EnforcementAction::CancelPendingOrder { order_id } => {
            let result = ctx
                .call(
                    "cancel_order",
                    ctx.broker.cancel_order(&user.credentials, order_id),
                )
                .await;
            (result, 0)
        }
        EnforcementAction::NoAction | EnforcementAction::ActivateKillSwitch { .. } => {
            return Ok(false);
        }
    };

    match result {
        Ok(result) => record_order_result(ctx, user, action, result, quantity),
        Err(e) => {
            Metrics::protective_order(kind, false);
            error!(
                user = %user.username,
                action = %action,
                code = e.code(),
                error = %e,
                "Order call failed"
            );
            ctx.record_action(AuditLogEntry::failure(
                user.id,
                &user.username,
                kind,
                e.code(),
                &e.to_string(),
                ctx.now(),
            ))?;
            Err(e)
        }
    }
}

fn record_order_result(
    ctx: &JobContext,
    user: &UserAccount,
    action: &EnforcementAction,
    result: OrderResult,
    quantity: u32,
) -> JobResult<bool> {
    let kind = action.kind();
    let success = result.is_success();
    Metrics::protective_order(kind, success);

    ctx.record_action(AuditLogEntry::new(
        user.id,
        &user.username,
        kind,
        result.raw,
        quantity,
        ctx.now(),
    ))?;

    if success {
        info!(
            user = %user.username,
            action = %action,
            order_id = result.order_id.as_deref().unwrap_or_default(),
            "Order accepted"
        );
        return Ok(true);
    }

    let code = result.error_code.as_deref().unwrap_or("UNKNOWN");
    let message = result.error_message.as_deref().unwrap_or("Unknown error");
    error!(
        user = %user.username,
        action = %action,
        code,
        message,
        "Broker rejected order"
    );
    ctx.record_action(AuditLogEntry::failure(
        user.id,
        &user.username,
        kind,
        code,
        message,
        ctx.now(),
    ))?;
    Ok(false)
}
