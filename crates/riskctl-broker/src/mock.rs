//! Recording in-memory broker for tests.
//!
//! Snapshots are keyed by client id. Every call is recorded; failures
//! and latency can be injected per call kind.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use riskctl_core::{BrokerCredentials, FundSnapshot, OrderSnapshot, PositionSnapshot};
use serde_json::{json, Value};

use crate::error::{BrokerError, BrokerResult};
use crate::gateway::{BoxFuture, BrokerGateway, OrderRequest, OrderResult};

/// One recorded gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerCall {
    ListOrders { client_id: String },
    ListPositions { client_id: String },
    FundLimits { client_id: String },
    PlaceOrder { client_id: String, request: OrderRequest },
    CancelOrder { client_id: String, order_id: String },
    ActivateKillSwitch { client_id: String },
}

/// Call kinds that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    ListOrders,
    ListPositions,
    FundLimits,
    PlaceOrder,
    CancelOrder,
    ActivateKillSwitch,
}

/// Injected failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockFailure {
    /// `Err(BrokerError::Transient)`.
    Transient,
    /// `Err(BrokerError::Rejected)` for snapshot and kill-switch calls,
    /// a failure `OrderResult` for place/cancel.
    Rejected { code: String, message: String },
}

impl MockFailure {
    pub fn rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            code: code.into(),
            message: message.into(),
        }
    }

    fn into_error(self) -> BrokerError {
        match self {
            Self::Transient => BrokerError::Transient("mock timeout".to_string()),
            Self::Rejected { code, message } => BrokerError::Rejected {
                status: 400,
                code,
                message,
            },
        }
    }
}

/// Mock broker gateway.
#[derive(Debug, Default)]
pub struct MockBroker {
    orders: Mutex<HashMap<String, OrderSnapshot>>,
    positions: Mutex<HashMap<String, PositionSnapshot>>,
    funds: Mutex<HashMap<String, FundSnapshot>>,
    failures: Mutex<HashMap<CallKind, MockFailure>>,
    calls: Mutex<Vec<BrokerCall>>,
    latency: Mutex<Option<Duration>>,
    next_order_id: AtomicU64,
}

impl MockBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_orders(&self, client_id: &str, snapshot: OrderSnapshot) {
        self.orders.lock().insert(client_id.to_string(), snapshot);
    }

    pub fn set_positions(&self, client_id: &str, snapshot: PositionSnapshot) {
        self.positions.lock().insert(client_id.to_string(), snapshot);
    }

    pub fn set_funds(&self, client_id: &str, snapshot: FundSnapshot) {
        self.funds.lock().insert(client_id.to_string(), snapshot);
    }

    /// Make every `kind` call fail until cleared.
    pub fn fail(&self, kind: CallKind, failure: MockFailure) {
        self.failures.lock().insert(kind, failure);
    }

    pub fn clear_failure(&self, kind: CallKind) {
        self.failures.lock().remove(&kind);
    }

    /// Delay applied to every call.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    pub fn calls(&self) -> Vec<BrokerCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn kill_switch_calls(&self, client_id: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, BrokerCall::ActivateKillSwitch { client_id: id } if id == client_id))
            .count()
    }

    pub fn placed_orders(&self, client_id: &str) -> Vec<OrderRequest> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                BrokerCall::PlaceOrder { client_id: id, request } if id == client_id => {
                    Some(request.clone())
                }
                _ => None,
            })
            .collect()
    }

    pub fn cancelled_orders(&self, client_id: &str) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                BrokerCall::CancelOrder { client_id: id, order_id } if id == client_id => {
                    Some(order_id.clone())
                }
                _ => None,
            })
            .collect()
    }

    /// Record the call, wait out the latency, and return the injected failure.
    async fn enter(&self, call: BrokerCall, kind: CallKind) -> Option<MockFailure> {
        self.calls.lock().push(call);
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        self.failures.lock().get(&kind).cloned()
    }

    fn order_result(&self, failure: Option<MockFailure>, status: &str) -> BrokerResult<OrderResult> {
        match failure {
            None => {
                let id = self.next_order_id.fetch_add(1, Ordering::SeqCst) + 1;
                let order_id = format!("mock-{id}");
                let data = json!({ "orderId": order_id, "orderStatus": status });
                Ok(OrderResult::success(order_id, status, data))
            }
            Some(MockFailure::Rejected { code, message }) => {
                Ok(OrderResult::failure(code, message, Value::Null))
            }
            Some(failure) => Err(failure.into_error()),
        }
    }
}

impl BrokerGateway for MockBroker {
    fn list_orders<'a>(
        &'a self,
        creds: &'a BrokerCredentials,
    ) -> BoxFuture<'a, BrokerResult<OrderSnapshot>> {
        Box::pin(async move {
            let call = BrokerCall::ListOrders {
                client_id: creds.client_id.clone(),
            };
            if let Some(failure) = self.enter(call, CallKind::ListOrders).await {
                return Err(failure.into_error());
            }
            Ok(self
                .orders
                .lock()
                .get(&creds.client_id)
                .cloned()
                .unwrap_or_default())
        })
    }

    fn list_positions<'a>(
        &'a self,
        creds: &'a BrokerCredentials,
    ) -> BoxFuture<'a, BrokerResult<PositionSnapshot>> {
        Box::pin(async move {
            let call = BrokerCall::ListPositions {
                client_id: creds.client_id.clone(),
            };
            if let Some(failure) = self.enter(call, CallKind::ListPositions).await {
                return Err(failure.into_error());
            }
            Ok(self
                .positions
                .lock()
                .get(&creds.client_id)
                .cloned()
                .unwrap_or_default())
        })
    }

    fn fund_limits<'a>(
        &'a self,
        creds: &'a BrokerCredentials,
    ) -> BoxFuture<'a, BrokerResult<FundSnapshot>> {
        Box::pin(async move {
            let call = BrokerCall::FundLimits {
                client_id: creds.client_id.clone(),
            };
            if let Some(failure) = self.enter(call, CallKind::FundLimits).await {
                return Err(failure.into_error());
            }
            Ok(self
                .funds
                .lock()
                .get(&creds.client_id)
                .cloned()
                .unwrap_or_default())
        })
    }

    fn place_order<'a>(
        &'a self,
        creds: &'a BrokerCredentials,
        request: OrderRequest,
    ) -> BoxFuture<'a, BrokerResult<OrderResult>> {
        Box::pin(async move {
            let call = BrokerCall::PlaceOrder {
                client_id: creds.client_id.clone(),
                request,
            };
            let failure = self.enter(call, CallKind::PlaceOrder).await;
            self.order_result(failure, "PENDING")
        })
    }

    fn cancel_order<'a>(
        &'a self,
        creds: &'a BrokerCredentials,
        order_id: &'a str,
    ) -> BoxFuture<'a, BrokerResult<OrderResult>> {
        Box::pin(async move {
            let call = BrokerCall::CancelOrder {
                client_id: creds.client_id.clone(),
                order_id: order_id.to_string(),
            };
            let failure = self.enter(call, CallKind::CancelOrder).await;
            self.order_result(failure, "CANCELLED")
        })
    }

    fn activate_kill_switch<'a>(
        &'a self,
        creds: &'a BrokerCredentials,
    ) -> BoxFuture<'a, BrokerResult<Value>> {
        Box::pin(async move {
            let call = BrokerCall::ActivateKillSwitch {
                client_id: creds.client_id.clone(),
            };
            if let Some(failure) = self.enter(call, CallKind::ActivateKillSwitch).await {
                return Err(failure.into_error());
            }
            Ok(json!({
                "dhanClientId": creds.client_id,
                "killSwitchStatus": "Kill Switch has been successfully activated",
            }))
        })
    }
}
