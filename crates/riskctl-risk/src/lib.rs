//! Risk policy for riskctl.
//!
//! Pure decision functions, no I/O:
//! - `ControlPolicy`: order-count kill-switch tiers and P&L caps
//! - `StopLossCalculator`: protective stop and trigger prices
//! - Order-book detectors for quick exit, auto stop-loss and manual flattening

pub mod detect;
pub mod error;
pub mod policy;
pub mod stop_loss;

pub use detect::{detect_quick_exit, detect_stop_loss, plan_flatten};
pub use error::{RiskError, RiskResult};
pub use policy::{ControlPolicy, PnlBreach};
pub use stop_loss::{StopLossCalculator, StopLossConfig, StopLossLevels, StopLossMode};
