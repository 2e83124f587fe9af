//! Lenient parsing of broker payloads.
//!
//! Accepts either a bare payload or a `{"data": ...}` envelope. Missing
//! or mistyped fields fall back to defaults; a body of the wrong shape
//! becomes an empty snapshot rather than an error.

use std::str::FromStr;

use riskctl_core::{
    FundSnapshot, Order, OrderSnapshot, OrderStatus, OrderType, Position, PositionSnapshot,
    PositionType, Price, ProductType, TransactionType,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::gateway::OrderResult;

/// Records of a list payload.
fn data_array(value: &Value) -> &[Value] {
    match value {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("data") {
            Some(Value::Array(items)) => items,
            _ => &[],
        },
        _ => &[],
    }
}

/// Object of a single-record payload.
fn data_object(value: &Value) -> Option<&serde_json::Map<String, Value>> {
    let map = value.as_object()?;
    match map.get("data") {
        Some(Value::Object(inner)) => Some(inner),
        Some(_) => None,
        None => Some(map),
    }
}

fn str_field(item: &Value, key: &str) -> String {
    match item.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn opt_str_field(item: &Value, key: &str) -> Option<String> {
    match item.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    let s = s.trim();
    Decimal::from_str(s)
        .ok()
        .or_else(|| Decimal::from_scientific(s).ok())
}

/// Number or numeric string, else zero.
pub fn decimal_value(value: Option<&Value>) -> Decimal {
    match value {
        Some(Value::Number(n)) => parse_decimal(&n.to_string()).unwrap_or_default(),
        Some(Value::String(s)) => parse_decimal(s).unwrap_or_default(),
        _ => Decimal::ZERO,
    }
}

fn decimal_field(item: &Value, key: &str) -> Decimal {
    decimal_value(item.get(key))
}

/// Non-negative integer; fractional values truncate, anything else is zero.
fn u32_field(item: &Value, key: &str) -> u32 {
    decimal_field(item, key).trunc().to_u32().unwrap_or(0)
}

fn i64_field(item: &Value, key: &str) -> i64 {
    decimal_field(item, key).trunc().to_i64().unwrap_or(0)
}

// ============================================================================
// Snapshots
// ============================================================================

pub fn parse_order(item: &Value) -> Order {
    Order {
        order_id: str_field(item, "orderId"),
        status: OrderStatus::from_wire(&str_field(item, "orderStatus")),
        transaction_type: TransactionType::from_wire(&str_field(item, "transactionType")),
        order_type: OrderType::from_wire(&str_field(item, "orderType")),
        product_type: ProductType::from_wire(&str_field(item, "productType")),
        security_id: str_field(item, "securityId"),
        trading_symbol: str_field(item, "tradingSymbol"),
        exchange_segment: str_field(item, "exchangeSegment"),
        quantity: u32_field(item, "quantity"),
        price: Price::new(decimal_field(item, "price")),
        trigger_price: Price::new(decimal_field(item, "triggerPrice")),
        create_time: opt_str_field(item, "createTime"),
        update_time: opt_str_field(item, "updateTime"),
    }
}

/// Order book, newest first as delivered.
pub fn parse_orders(value: Value) -> OrderSnapshot {
    let orders = data_array(&value)
        .iter()
        .filter(|item| item.is_object())
        .map(parse_order)
        .collect();
    OrderSnapshot::new(orders, value)
}

pub fn parse_position(item: &Value) -> Position {
    Position {
        security_id: str_field(item, "securityId"),
        trading_symbol: str_field(item, "tradingSymbol"),
        exchange_segment: str_field(item, "exchangeSegment"),
        position_type: PositionType::from_wire(&str_field(item, "positionType")),
        net_qty: i64_field(item, "netQty"),
        realized_profit: decimal_field(item, "realizedProfit"),
        unrealized_profit: decimal_field(item, "unrealizedProfit"),
    }
}

pub fn parse_positions(value: Value) -> PositionSnapshot {
    let positions = data_array(&value)
        .iter()
        .filter(|item| item.is_object())
        .map(parse_position)
        .collect();
    PositionSnapshot::new(positions, value)
}

/// Fund limits. The broker spells the available balance `availabelBalance`.
pub fn parse_funds(value: Value) -> FundSnapshot {
    let (opening, available, withdrawable) = match data_object(&value) {
        Some(map) => (
            decimal_value(map.get("sodLimit")),
            decimal_value(map.get("availabelBalance").or_else(|| map.get("availableBalance"))),
            decimal_value(map.get("withdrawableBalance")),
        ),
        None => (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
    };

    FundSnapshot {
        opening_balance: opening,
        available_balance: available,
        withdrawable_balance: withdrawable,
        raw: value,
    }
}

// ============================================================================
// Order results and error bodies
// ============================================================================

/// `(errorCode, errorMessage)` from an error body, in either naming style.
pub fn parse_error_body(value: &Value) -> (String, String) {
    let source = value.get("remarks").filter(|r| r.is_object()).unwrap_or(value);
    let code = ["errorCode", "error_code"]
        .iter()
        .map(|k| str_field(source, k))
        .find(|s| !s.is_empty())
        .unwrap_or_else(|| "UNKNOWN".to_string());
    let message = ["errorMessage", "error_message", "message"]
        .iter()
        .map(|k| str_field(source, k))
        .find(|s| !s.is_empty())
        .unwrap_or_default();
    (code, message)
}

/// Successful place/cancel body.
///
/// A body that itself reports `status: failure` is turned into a failure result.
pub fn parse_order_result(value: Value) -> OrderResult {
    if value.get("status").and_then(Value::as_str) == Some("failure") {
        let (code, message) = parse_error_body(&value);
        return OrderResult::failure(code, message, value);
    }

    let (order_id, order_status) = match data_object(&value) {
        Some(map) => {
            let inner = Value::Object(map.clone());
            (str_field(&inner, "orderId"), str_field(&inner, "orderStatus"))
        }
        None => (String::new(), String::new()),
    };
    OrderResult::success(order_id, order_status, value)
}
