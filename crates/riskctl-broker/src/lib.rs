//! Broker gateway for riskctl.
//!
//! - `BrokerGateway`: dyn-compatible async trait over the broker REST API
//! - `DhanClient`: reqwest implementation with per-call timeout
//! - `parse`: lenient snapshot parsing at the gateway boundary
//! - `MockBroker`: recording in-memory gateway for tests

pub mod client;
pub mod error;
pub mod gateway;
pub mod mock;
pub mod parse;

pub use client::{DhanClient, DhanClientConfig};
pub use error::{BrokerError, BrokerResult};
pub use gateway::{
    BoxFuture, BrokerGateway, DynBrokerGateway, OrderRequest, OrderResult, OrderResultStatus,
};
pub use mock::{BrokerCall, CallKind, MockBroker, MockFailure};
