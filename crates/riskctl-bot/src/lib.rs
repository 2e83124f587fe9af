//! Risk-control enforcement service.
//!
//! Wires the broker gateway, account store and audit log into the job
//! scheduler and runs it until shutdown:
//! - Kill-switch tiers and P&L caps
//! - Quick exit and auto stop-loss
//! - Account snapshots and order history
//! - Session open/close resets

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::{AppConfig, JobSettings, JobsConfig};
pub use error::{AppError, AppResult};
