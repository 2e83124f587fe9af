//! Account state and audit persistence for riskctl.
//!
//! - `AccountRepository`: per-user flags, counters and control thresholds
//! - `AuditSink`: append-only action log, daily snapshots, order history
//!   and daily goal progress
//!
//! `AccountStore` keeps accounts in memory with an optional JSON file
//! behind it. `JsonLinesAuditLog` writes one JSON Lines file per record
//! kind per day; `MemoryAuditLog` keeps everything in memory for tests.

pub mod audit;
pub mod error;
pub mod repository;
pub mod store;
pub mod writer;

pub use audit::{AuditSink, DynAuditSink, JsonLinesAuditLog, MemoryAuditLog};
pub use error::{PersistenceError, PersistenceResult};
pub use repository::{AccountRepository, DynAccountRepository};
pub use store::{AccountStore, StoreSnapshot};
pub use writer::JsonLinesWriter;
