//! Core domain types for the riskctl enforcement engine.
//!
//! This crate provides the types shared by every other crate:
//! - `Price`: precision-safe price type with tick alignment
//! - `Order`, `OrderSnapshot`, `PositionSnapshot`, `FundSnapshot`: broker state per poll
//! - `UserAccount`, `ControlThresholds`, `FlagUpdate`: per-user configuration and flags
//! - `EnforcementAction`: the decision produced by the control policy
//! - `AuditLogEntry`, `DailySnapshotRecord`, `OrderHistoryRecord`: append-only records
//! - `SessionCalendar`: exchange-timezone trading window

pub mod account;
pub mod action;
pub mod decimal;
pub mod error;
pub mod order;
pub mod position;
pub mod records;
pub mod session;

pub use account::{
    BrokerCredentials, Capability, ControlThresholds, FlagUpdate, KillSwitchTier, TierState,
    UserAccount, UserId,
};
pub use action::EnforcementAction;
pub use decimal::Price;
pub use error::{CoreError, Result};
pub use order::{Order, OrderSnapshot, OrderStatus, OrderType, ProductType, TransactionType};
pub use position::{FundSnapshot, Position, PositionSnapshot, PositionType};
pub use records::{AuditLogEntry, DailySnapshotRecord, GoalProgress, OrderHistoryRecord};
pub use session::{SessionCalendar, SessionConfig};
