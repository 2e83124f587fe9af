//! Broker gateway trait and order request/result types.

use std::pin::Pin;
use std::sync::Arc;

use riskctl_core::{
    BrokerCredentials, FundSnapshot, OrderSnapshot, OrderType, PositionSnapshot, Price,
    ProductType, TransactionType,
};
use serde_json::{json, Value};

use crate::error::BrokerResult;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

// ============================================================================
// OrderRequest
// ============================================================================

/// Order to place on behalf of a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRequest {
    pub security_id: String,
    pub exchange_segment: String,
    pub transaction_type: TransactionType,
    pub order_type: OrderType,
    pub product_type: ProductType,
    pub quantity: u32,
    pub price: Price,
    pub trigger_price: Option<Price>,
}

impl OrderRequest {
    /// Intraday MARKET SELL at price 0.
    pub fn market_sell(
        security_id: impl Into<String>,
        exchange_segment: impl Into<String>,
        quantity: u32,
    ) -> Self {
        Self {
            security_id: security_id.into(),
            exchange_segment: exchange_segment.into(),
            transaction_type: TransactionType::Sell,
            order_type: OrderType::Market,
            product_type: ProductType::Intraday,
            quantity,
            price: Price::ZERO,
            trigger_price: None,
        }
    }

    /// Intraday STOP_LOSS SELL.
    pub fn stop_loss_sell(
        security_id: impl Into<String>,
        exchange_segment: impl Into<String>,
        quantity: u32,
        price: Price,
        trigger_price: Price,
    ) -> Self {
        Self {
            security_id: security_id.into(),
            exchange_segment: exchange_segment.into(),
            transaction_type: TransactionType::Sell,
            order_type: OrderType::StopLoss,
            product_type: ProductType::Intraday,
            quantity,
            price,
            trigger_price: Some(trigger_price),
        }
    }

    /// Broker JSON body for `client_id`.
    pub fn to_wire(&self, client_id: &str) -> Value {
        let mut body = json!({
            "dhanClientId": client_id,
            "transactionType": self.transaction_type.as_wire(),
            "exchangeSegment": self.exchange_segment,
            "productType": self.product_type.as_wire(),
            "orderType": self.order_type.as_wire(),
            "validity": "DAY",
            "securityId": self.security_id,
            "quantity": self.quantity,
            "price": self.price.inner().to_string(),
        });
        if let Some(trigger) = self.trigger_price {
            body["triggerPrice"] = Value::String(trigger.inner().to_string());
        }
        body
    }
}

// ============================================================================
// OrderResult
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderResultStatus {
    Success,
    Failure,
}

/// Outcome of a place or cancel call.
///
/// A broker-side rejection is a `Failure` result, not an `Err`, so the
/// caller can audit both the raw payload and the parsed failure.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderResult {
    pub status: OrderResultStatus,
    pub order_id: Option<String>,
    pub order_status: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    /// `{"status", "remarks", "data"}` envelope as recorded in the audit log.
    pub raw: Value,
}

impl OrderResult {
    pub fn success(order_id: impl Into<String>, order_status: impl Into<String>, data: Value) -> Self {
        let order_id = order_id.into();
        let order_status = order_status.into();
        Self {
            status: OrderResultStatus::Success,
            raw: json!({
                "status": "success",
                "remarks": "",
                "data": data,
            }),
            order_id: Some(order_id),
            order_status: Some(order_status),
            error_code: None,
            error_message: None,
        }
    }

    pub fn failure(code: impl Into<String>, message: impl Into<String>, data: Value) -> Self {
        let code = code.into();
        let message = message.into();
        Self {
            status: OrderResultStatus::Failure,
            raw: json!({
                "status": "failure",
                "remarks": {
                    "error_code": code,
                    "error_message": message,
                },
                "data": data,
            }),
            order_id: None,
            order_status: None,
            error_code: Some(code),
            error_message: Some(message),
        }
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        self.status == OrderResultStatus::Success
    }
}

// ============================================================================
// BrokerGateway
// ============================================================================

/// Remote trading API, consumed as black-box calls.
///
/// Snapshot calls return an empty snapshot for a well-formed but
/// shapeless body; only transport, status and JSON failures are errors.
pub trait BrokerGateway: Send + Sync {
    fn list_orders<'a>(
        &'a self,
        creds: &'a BrokerCredentials,
    ) -> BoxFuture<'a, BrokerResult<OrderSnapshot>>;

    fn list_positions<'a>(
        &'a self,
        creds: &'a BrokerCredentials,
    ) -> BoxFuture<'a, BrokerResult<PositionSnapshot>>;

    fn fund_limits<'a>(
        &'a self,
        creds: &'a BrokerCredentials,
    ) -> BoxFuture<'a, BrokerResult<FundSnapshot>>;

    fn place_order<'a>(
        &'a self,
        creds: &'a BrokerCredentials,
        request: OrderRequest,
    ) -> BoxFuture<'a, BrokerResult<OrderResult>>;

    fn cancel_order<'a>(
        &'a self,
        creds: &'a BrokerCredentials,
        order_id: &'a str,
    ) -> BoxFuture<'a, BrokerResult<OrderResult>>;

    /// Activate the account-wide kill switch. Ok carries the response body.
    fn activate_kill_switch<'a>(
        &'a self,
        creds: &'a BrokerCredentials,
    ) -> BoxFuture<'a, BrokerResult<Value>>;
}

/// Arc wrapper for BrokerGateway trait objects.
pub type DynBrokerGateway = Arc<dyn BrokerGateway>;
