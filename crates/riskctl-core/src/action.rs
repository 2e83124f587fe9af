//! Enforcement decisions.

use crate::account::KillSwitchTier;
use crate::decimal::Price;
use serde::Serialize;
use std::fmt;

/// Decision produced by one policy evaluation. Never persisted, only logged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum EnforcementAction {
    NoAction,
    ActivateKillSwitch {
        tier: KillSwitchTier,
    },
    /// STOP_LOSS SELL protecting a traded BUY.
    PlaceStopLoss {
        security_id: String,
        exchange_segment: String,
        quantity: u32,
        price: Price,
        trigger_price: Price,
    },
    /// MARKET SELL flattening an unprotected position.
    ClosePosition {
        security_id: String,
        exchange_segment: String,
        quantity: u32,
    },
    CancelPendingOrder {
        order_id: String,
    },
}

impl EnforcementAction {
    #[inline]
    pub fn is_no_action(&self) -> bool {
        matches!(self, Self::NoAction)
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoAction => "no_action",
            Self::ActivateKillSwitch { .. } => "kill_switch",
            Self::PlaceStopLoss { .. } => "stop_loss",
            Self::ClosePosition { .. } => "close_position",
            Self::CancelPendingOrder { .. } => "cancel_order",
        }
    }
}

impl fmt::Display for EnforcementAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoAction => write!(f, "no-action"),
            Self::ActivateKillSwitch { tier } => write!(f, "activate-kill-switch({tier})"),
            Self::PlaceStopLoss {
                security_id,
                quantity,
                price,
                trigger_price,
                ..
            } => write!(
                f,
                "place-stop-loss({security_id} x{quantity} @ {price}, trigger {trigger_price})"
            ),
            Self::ClosePosition {
                security_id,
                quantity,
                ..
            } => write!(f, "close-position({security_id} x{quantity})"),
            Self::CancelPendingOrder { order_id } => write!(f, "cancel-order({order_id})"),
        }
    }
}
