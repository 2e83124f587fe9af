//! Append-only records written by the enforcement jobs.

use crate::account::UserId;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// One action attempt. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub user_id: UserId,
    pub username: String,
    pub created_at: DateTime<Utc>,
    /// Kind of action attempted (`kill_switch`, `stop_loss`, ...).
    pub action: String,
    /// Raw broker response, or `{error_code, error_message}` on failure.
    pub log: serde_json::Value,
    pub order_count: u32,
}

impl AuditLogEntry {
    pub fn new(
        user_id: UserId,
        username: impl Into<String>,
        action: impl Into<String>,
        log: serde_json::Value,
        order_count: u32,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            username: username.into(),
            created_at,
            action: action.into(),
            log,
            order_count,
        }
    }

    /// Entry carrying a structured failure instead of a broker payload.
    pub fn failure(
        user_id: UserId,
        username: impl Into<String>,
        action: impl Into<String>,
        error_code: &str,
        error_message: &str,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self::new(
            user_id,
            username,
            action,
            json!({
                "error_code": error_code,
                "error_message": error_message,
            }),
            0,
            created_at,
        )
    }

    pub fn is_failure(&self) -> bool {
        self.log.get("error_code").is_some()
    }
}

/// Periodic account rollup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySnapshotRecord {
    pub user_id: UserId,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub opening_balance: Decimal,
    pub closing_balance: Decimal,
    pub order_count: u32,
    /// Sum of realized P&L before expenses.
    pub realized_pnl: Decimal,
    pub expenses: Decimal,
    /// `realized_pnl - expenses`.
    pub actual_profit: Decimal,
    pub day_open: bool,
    pub day_close: bool,
}

/// End-of-session order history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderHistoryRecord {
    pub user_id: UserId,
    pub username: String,
    pub date: NaiveDate,
    pub order_data: serde_json::Value,
    pub order_count: u32,
    pub profit_loss: Decimal,
    pub sod_balance: Decimal,
    pub eod_balance: Decimal,
    pub expense: Decimal,
}

/// Daily profit goal tracked for a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalProgress {
    pub user_id: UserId,
    pub date: NaiveDate,
    pub target: Decimal,
    pub progress: Decimal,
    pub achieved: bool,
}

impl GoalProgress {
    pub fn new(user_id: UserId, date: NaiveDate, target: Decimal) -> Self {
        Self {
            user_id,
            date,
            target,
            progress: Decimal::ZERO,
            achieved: false,
        }
    }

    /// Record `actual_profit`. Once achieved, a goal stays achieved.
    pub fn update(&mut self, actual_profit: Decimal) {
        self.progress = actual_profit;
        if self.target <= actual_profit {
            self.achieved = true;
        }
    }
}
