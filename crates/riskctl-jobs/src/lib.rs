//! Enforcement jobs for riskctl.
//!
//! Scheduled monitors, each polling the broker per eligible user:
//! - `OrderCountMonitor`: kill-switch tiers and P&L caps
//! - `QuickExitMonitor`: flatten when a stop-loss was cancelled
//! - `AutoStopLossMonitor`: protect every traded BUY
//! - `AccountLogger`: order-count tracking, daily snapshots, goal progress
//!
//! Calendar jobs: `SessionOpenReset`, `SessionCloseRestore`, `OrderHistoryJob`.
//! Operator operations: `flatten_user`, `manual_kill_switch`.

pub mod account_logger;
pub mod auto_stop_loss;
pub mod clock;
pub mod context;
pub mod error;
pub mod executor;
pub mod guard;
pub mod heartbeat;
pub mod operator;
pub mod order_count;
pub mod order_history;
pub mod quick_exit;
pub mod session;
pub mod sweep;

pub use account_logger::AccountLogger;
pub use auto_stop_loss::AutoStopLossMonitor;
pub use clock::{Clock, DynClock, FixedClock, SystemClock};
pub use context::{AccountingConfig, JobContext, DEFAULT_CALL_TIMEOUT, DEFAULT_FAN_OUT};
pub use error::{JobError, JobResult};
pub use executor::{activate_kill_switch, execute_order_action};
pub use guard::{InFlightGuard, InFlightRegistry, JobKind};
pub use heartbeat::HeartbeatJob;
pub use operator::{flatten_user, manual_kill_switch, FlattenReport};
pub use order_count::OrderCountMonitor;
pub use order_history::OrderHistoryJob;
pub use quick_exit::QuickExitMonitor;
pub use session::{SessionCloseRestore, SessionOpenReset};
pub use sweep::{sweep_users, SweepSummary};
