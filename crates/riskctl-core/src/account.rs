//! User accounts, per-user control thresholds and flag updates.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

// ============================================================================
// Identity
// ============================================================================

/// Stable user identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Broker API credentials.
///
/// The access token is wiped from memory on drop and never printed.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct BrokerCredentials {
    pub client_id: String,
    pub access_token: String,
}

impl BrokerCredentials {
    pub fn new(client_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            access_token: access_token.into(),
        }
    }

    /// Both fields are present.
    pub fn is_complete(&self) -> bool {
        !self.client_id.is_empty() && !self.access_token.is_empty()
    }
}

impl fmt::Debug for BrokerCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerCredentials")
            .field("client_id", &self.client_id)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

// ============================================================================
// Kill-switch tiers
// ============================================================================

/// Kill-switch tier that can be activated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KillSwitchTier {
    Tier1,
    Tier2,
}

impl KillSwitchTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tier1 => "tier1",
            Self::Tier2 => "tier2",
        }
    }
}

impl fmt::Display for KillSwitchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-session kill-switch state derived from the two tier flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TierState {
    #[default]
    Normal,
    Tier1Activated,
    Tier2Activated,
}

impl TierState {
    /// Derive the state from raw flags. Tier2 wins even if tier1 is unset.
    pub fn from_flags(tier1: bool, tier2: bool) -> Self {
        match (tier1, tier2) {
            (_, true) => Self::Tier2Activated,
            (true, false) => Self::Tier1Activated,
            (false, false) => Self::Normal,
        }
    }

    #[inline]
    pub fn tier1_active(&self) -> bool {
        !matches!(self, Self::Normal)
    }

    #[inline]
    pub fn tier2_active(&self) -> bool {
        matches!(self, Self::Tier2Activated)
    }
}

impl fmt::Display for TierState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::Tier1Activated => write!(f, "tier1"),
            Self::Tier2Activated => write!(f, "tier2"),
        }
    }
}

// ============================================================================
// UserAccount
// ============================================================================

/// Capability a job requires before it touches a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// `active AND trading_enabled`.
    OrderCount,
    /// `active AND trading_enabled AND quick_exit_enabled`.
    QuickExit,
    /// `active AND trading_enabled AND auto_stop_loss_enabled`.
    AutoStopLoss,
    /// `active`.
    AccountLogging,
}

/// A monitored user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub credentials: BrokerCredentials,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default = "default_true")]
    pub trading_enabled: bool,
    #[serde(default)]
    pub auto_stop_loss_enabled: bool,
    #[serde(default)]
    pub quick_exit_enabled: bool,
    /// Elevated operator privilege; cleared at session open.
    #[serde(default)]
    pub elevated: bool,
    #[serde(default)]
    pub last_observed_order_count: u32,
    #[serde(default)]
    pub tier1_activated: bool,
    #[serde(default)]
    pub tier2_activated: bool,
}

fn default_true() -> bool {
    true
}

impl UserAccount {
    pub fn new(id: u64, username: impl Into<String>, credentials: BrokerCredentials) -> Self {
        Self {
            id: UserId(id),
            username: username.into(),
            credentials,
            active: true,
            trading_enabled: true,
            auto_stop_loss_enabled: false,
            quick_exit_enabled: false,
            elevated: false,
            last_observed_order_count: 0,
            tier1_activated: false,
            tier2_activated: false,
        }
    }

    #[inline]
    pub fn tier_state(&self) -> TierState {
        TierState::from_flags(self.tier1_activated, self.tier2_activated)
    }

    /// Whether this user is eligible for a job requiring `capability`.
    pub fn has_capability(&self, capability: Capability) -> bool {
        match capability {
            Capability::AccountLogging => self.active,
            Capability::OrderCount => self.active && self.trading_enabled,
            Capability::QuickExit => {
                self.active && self.trading_enabled && self.quick_exit_enabled
            }
            Capability::AutoStopLoss => {
                self.active && self.trading_enabled && self.auto_stop_loss_enabled
            }
        }
    }
}

// ============================================================================
// FlagUpdate
// ============================================================================

/// Partial update of a user's mutable flags. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagUpdate {
    pub trading_enabled: Option<bool>,
    pub tier1_activated: Option<bool>,
    pub tier2_activated: Option<bool>,
    pub last_observed_order_count: Option<u32>,
    pub elevated: Option<bool>,
}

impl FlagUpdate {
    /// Flags set by a successful activation of `tier`.
    ///
    /// Tier2 also sets tier1 and disables trading.
    pub fn activate(tier: KillSwitchTier) -> Self {
        match tier {
            KillSwitchTier::Tier1 => Self {
                tier1_activated: Some(true),
                ..Self::default()
            },
            KillSwitchTier::Tier2 => Self {
                tier1_activated: Some(true),
                tier2_activated: Some(true),
                trading_enabled: Some(false),
                ..Self::default()
            },
        }
    }

    /// Flags applied to every active user at session open.
    pub fn session_reset() -> Self {
        Self {
            trading_enabled: Some(true),
            tier1_activated: Some(false),
            tier2_activated: Some(false),
            last_observed_order_count: Some(0),
            elevated: Some(false),
        }
    }

    pub fn order_count(count: u32) -> Self {
        Self {
            last_observed_order_count: Some(count),
            ..Self::default()
        }
    }

    pub fn elevated(value: bool) -> Self {
        Self {
            elevated: Some(value),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply to `account` in place.
    pub fn apply(&self, account: &mut UserAccount) {
        if let Some(v) = self.trading_enabled {
            account.trading_enabled = v;
        }
        if let Some(v) = self.tier1_activated {
            account.tier1_activated = v;
        }
        if let Some(v) = self.tier2_activated {
            account.tier2_activated = v;
        }
        if let Some(v) = self.last_observed_order_count {
            account.last_observed_order_count = v;
        }
        if let Some(v) = self.elevated {
            account.elevated = v;
        }
    }
}

// ============================================================================
// ControlThresholds
// ============================================================================

/// Per-user risk configuration, at most one per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlThresholds {
    pub user_id: UserId,
    #[serde(default)]
    pub order_limit_tier1: u32,
    #[serde(default)]
    pub order_limit_tier2: u32,
    /// Value `order_limit_tier2` is reset to at session open.
    #[serde(default)]
    pub default_order_limit_tier2: u32,
    #[serde(default)]
    pub max_loss_limit: Decimal,
    #[serde(default)]
    pub max_profit_limit: Decimal,
    #[serde(default)]
    pub order_count_enforced: bool,
    #[serde(default)]
    pub max_loss_enforced: bool,
    #[serde(default)]
    pub max_profit_enforced: bool,
    /// `percentage`, `points` or `price`. Validated by the stop-loss calculator.
    #[serde(default = "default_stop_loss_mode")]
    pub stop_loss_mode: String,
    #[serde(default)]
    pub stop_loss_parameter: Decimal,
}

fn default_stop_loss_mode() -> String {
    "percentage".to_string()
}

impl ControlThresholds {
    pub fn new(user_id: UserId, order_limit_tier1: u32, order_limit_tier2: u32) -> Self {
        Self {
            user_id,
            order_limit_tier1,
            order_limit_tier2,
            default_order_limit_tier2: order_limit_tier2,
            max_loss_limit: Decimal::ZERO,
            max_profit_limit: Decimal::ZERO,
            order_count_enforced: true,
            max_loss_enforced: false,
            max_profit_enforced: false,
            stop_loss_mode: default_stop_loss_mode(),
            stop_loss_parameter: Decimal::ZERO,
        }
    }

    /// Any P&L cap is switched on.
    pub fn pnl_caps_enforced(&self) -> bool {
        self.max_loss_enforced || self.max_profit_enforced
    }
}
