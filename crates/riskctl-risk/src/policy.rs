//! Order-count kill-switch state machine and P&L caps.
//!
//! States per user per session: `Normal -> Tier1Activated -> Tier2Activated`.
//! The policy only ever moves forward; the session-open reset is the
//! single way back to `Normal`.

use crate::error::{RiskError, RiskResult};
use riskctl_core::{ControlThresholds, EnforcementAction, KillSwitchTier, TierState};
use rust_decimal::Decimal;
use std::fmt;

/// Which P&L cap was crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PnlBreach {
    MaxLoss,
    MaxProfit,
}

impl fmt::Display for PnlBreach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaxLoss => write!(f, "max_loss"),
            Self::MaxProfit => write!(f, "max_profit"),
        }
    }
}

/// Policy bound to one user's validated thresholds.
#[derive(Debug, Clone)]
pub struct ControlPolicy {
    thresholds: ControlThresholds,
}

impl ControlPolicy {
    /// Validate and bind `thresholds`.
    ///
    /// With order-count enforcement on, tier1 must not exceed tier2.
    /// Enabled P&L caps must not be negative.
    pub fn new(thresholds: &ControlThresholds) -> RiskResult<Self> {
        if thresholds.order_count_enforced
            && thresholds.order_limit_tier1 > thresholds.order_limit_tier2
        {
            return Err(RiskError::InvalidConfiguration(format!(
                "order limit tier1 ({}) exceeds tier2 ({})",
                thresholds.order_limit_tier1, thresholds.order_limit_tier2
            )));
        }
        if thresholds.max_loss_enforced && thresholds.max_loss_limit.is_sign_negative() {
            return Err(RiskError::InvalidConfiguration(format!(
                "max loss limit must not be negative, got {}",
                thresholds.max_loss_limit
            )));
        }
        if thresholds.max_profit_enforced && thresholds.max_profit_limit.is_sign_negative() {
            return Err(RiskError::InvalidConfiguration(format!(
                "max profit limit must not be negative, got {}",
                thresholds.max_profit_limit
            )));
        }

        Ok(Self {
            thresholds: thresholds.clone(),
        })
    }

    #[inline]
    pub fn thresholds(&self) -> &ControlThresholds {
        &self.thresholds
    }

    /// Evaluate the traded-order count against the tier limits.
    ///
    /// - `t1 <= count < t2` with no tier active -> Tier1
    /// - `count >= t2` with only tier1 active -> Tier2
    /// - anything else -> `NoAction`
    ///
    /// A count that jumps past `t2` while still `Normal` yields `NoAction`:
    /// tier2 is only reachable through tier1.
    #[must_use]
    pub fn evaluate_order_count(&self, traded_count: u32, state: TierState) -> EnforcementAction {
        if !self.thresholds.order_count_enforced || traded_count == 0 {
            return EnforcementAction::NoAction;
        }

        let t1 = self.thresholds.order_limit_tier1;
        let t2 = self.thresholds.order_limit_tier2;

        match state {
            TierState::Normal if traded_count >= t1 && traded_count < t2 => {
                EnforcementAction::ActivateKillSwitch {
                    tier: KillSwitchTier::Tier1,
                }
            }
            TierState::Tier1Activated if traded_count >= t2 => {
                EnforcementAction::ActivateKillSwitch {
                    tier: KillSwitchTier::Tier2,
                }
            }
            _ => EnforcementAction::NoAction,
        }
    }

    /// Which enabled P&L cap, if any, `realized_pnl` has crossed.
    ///
    /// A cap of zero is treated as unset.
    #[must_use]
    pub fn pnl_breach(&self, realized_pnl: Decimal) -> Option<PnlBreach> {
        let t = &self.thresholds;
        if t.max_loss_enforced && t.max_loss_limit > Decimal::ZERO && realized_pnl <= -t.max_loss_limit
        {
            return Some(PnlBreach::MaxLoss);
        }
        if t.max_profit_enforced
            && t.max_profit_limit > Decimal::ZERO
            && realized_pnl >= t.max_profit_limit
        {
            return Some(PnlBreach::MaxProfit);
        }
        None
    }

    /// Escalate straight to Tier2 on a P&L cap breach unless already there.
    #[must_use]
    pub fn evaluate_pnl(&self, realized_pnl: Decimal, state: TierState) -> EnforcementAction {
        if state.tier2_active() {
            return EnforcementAction::NoAction;
        }
        match self.pnl_breach(realized_pnl) {
            Some(_) => EnforcementAction::ActivateKillSwitch {
                tier: KillSwitchTier::Tier2,
            },
            None => EnforcementAction::NoAction,
        }
    }
}
