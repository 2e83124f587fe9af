//! Broker order types and the per-poll order snapshot.
//!
//! Wire strings follow the broker's upper-case convention (`TRADED`,
//! `STOP_LOSS`, ...). Unrecognised values map to `Unknown` so a single
//! unexpected field never rejects the whole snapshot.

use crate::decimal::Price;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order lifecycle status as reported by the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Transit,
    PartTraded,
    Traded,
    Cancelled,
    Rejected,
    Expired,
    Unknown,
}

impl OrderStatus {
    pub fn from_wire(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Self::Pending,
            "TRANSIT" => Self::Transit,
            "PART_TRADED" => Self::PartTraded,
            "TRADED" => Self::Traded,
            "CANCELLED" => Self::Cancelled,
            "REJECTED" => Self::Rejected,
            "EXPIRED" => Self::Expired,
            _ => Self::Unknown,
        }
    }

    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Transit => "TRANSIT",
            Self::PartTraded => "PART_TRADED",
            Self::Traded => "TRADED",
            Self::Cancelled => "CANCELLED",
            Self::Rejected => "REJECTED",
            Self::Expired => "EXPIRED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Buy,
    Sell,
    Unknown,
}

impl TransactionType {
    pub fn from_wire(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Self::Buy,
            "SELL" => Self::Sell,
            _ => Self::Unknown,
        }
    }

    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Limit,
    Market,
    StopLoss,
    StopLossMarket,
    Unknown,
}

impl OrderType {
    pub fn from_wire(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "LIMIT" => Self::Limit,
            "MARKET" => Self::Market,
            "STOP_LOSS" => Self::StopLoss,
            "STOP_LOSS_MARKET" => Self::StopLossMarket,
            _ => Self::Unknown,
        }
    }

    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::Limit => "LIMIT",
            Self::Market => "MARKET",
            Self::StopLoss => "STOP_LOSS",
            Self::StopLossMarket => "STOP_LOSS_MARKET",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Product type. Protective orders are always intraday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductType {
    #[default]
    Intraday,
    Cnc,
    Margin,
    Unknown,
}

impl ProductType {
    pub fn from_wire(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "INTRADAY" => Self::Intraday,
            "CNC" => Self::Cnc,
            "MARGIN" => Self::Margin,
            _ => Self::Unknown,
        }
    }

    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::Intraday => "INTRADAY",
            Self::Cnc => "CNC",
            Self::Margin => "MARGIN",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// One order from the broker's order book.
///
/// Absent fields default to empty strings, zero quantity and zero price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub status: OrderStatus,
    pub transaction_type: TransactionType,
    pub order_type: OrderType,
    pub product_type: ProductType,
    pub security_id: String,
    pub trading_symbol: String,
    pub exchange_segment: String,
    pub quantity: u32,
    pub price: Price,
    pub trigger_price: Price,
    pub create_time: Option<String>,
    pub update_time: Option<String>,
}

impl Order {
    #[inline]
    pub fn is_traded(&self) -> bool {
        self.status == OrderStatus::Traded
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.status == OrderStatus::Pending
    }

    #[inline]
    pub fn is_buy(&self) -> bool {
        self.transaction_type == TransactionType::Buy
    }

    #[inline]
    pub fn is_sell(&self) -> bool {
        self.transaction_type == TransactionType::Sell
    }

    /// A stop-loss SELL that the broker (or the user) cancelled.
    pub fn is_cancelled_stop_loss_sell(&self) -> bool {
        self.order_type == OrderType::StopLoss
            && self.status == OrderStatus::Cancelled
            && self.is_sell()
    }
}

/// Order book fetched in one poll, newest first.
///
/// `raw` keeps the broker payload for audit and order-history records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderSnapshot {
    pub orders: Vec<Order>,
    pub raw: serde_json::Value,
}

impl OrderSnapshot {
    pub fn new(orders: Vec<Order>, raw: serde_json::Value) -> Self {
        Self { orders, raw }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Total number of orders of any status.
    #[inline]
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// Number of orders with status TRADED.
    pub fn traded_count(&self) -> u32 {
        self.orders.iter().filter(|o| o.is_traded()).count() as u32
    }

    /// Most recent order.
    pub fn latest(&self) -> Option<&Order> {
        self.orders.first()
    }

    /// Most recent BUY with status TRADED.
    pub fn latest_traded_buy(&self) -> Option<&Order> {
        self.orders.iter().find(|o| o.is_buy() && o.is_traded())
    }

    /// Ids of every PENDING order.
    pub fn pending_order_ids(&self) -> Vec<String> {
        self.orders
            .iter()
            .filter(|o| o.is_pending())
            .map(|o| o.order_id.clone())
            .collect()
    }

    /// PENDING SELL orders.
    pub fn pending_sell_orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter().filter(|o| o.is_pending() && o.is_sell())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order(
        id: &str,
        status: OrderStatus,
        side: TransactionType,
        order_type: OrderType,
    ) -> Order {
        Order {
            order_id: id.to_string(),
            status,
            transaction_type: side,
            order_type,
            product_type: ProductType::Intraday,
            security_id: "1333".to_string(),
            trading_symbol: "HDFCBANK".to_string(),
            exchange_segment: "NSE_EQ".to_string(),
            quantity: 10,
            price: Price::new(dec!(100)),
            trigger_price: Price::ZERO,
            create_time: None,
            update_time: None,
        }
    }

    #[test]
    fn test_wire_parsing_is_case_insensitive() {
        assert_eq!(OrderStatus::from_wire("traded"), OrderStatus::Traded);
        assert_eq!(OrderStatus::from_wire("PART_TRADED"), OrderStatus::PartTraded);
        assert_eq!(OrderStatus::from_wire("weird"), OrderStatus::Unknown);
        assert_eq!(TransactionType::from_wire(" Sell "), TransactionType::Sell);
        assert_eq!(OrderType::from_wire("STOP_LOSS"), OrderType::StopLoss);
        assert_eq!(ProductType::from_wire("cnc"), ProductType::Cnc);
    }

    #[test]
    fn test_snapshot_helpers() {
        let snapshot = OrderSnapshot::new(
            vec![
                order("4", OrderStatus::Pending, TransactionType::Sell, OrderType::StopLoss),
                order("3", OrderStatus::Traded, TransactionType::Buy, OrderType::Market),
                order("2", OrderStatus::Cancelled, TransactionType::Buy, OrderType::Limit),
                order("1", OrderStatus::Traded, TransactionType::Sell, OrderType::Market),
            ],
            serde_json::Value::Null,
        );

        assert_eq!(snapshot.len(), 4);
        assert_eq!(snapshot.traded_count(), 2);
        assert_eq!(snapshot.latest().map(|o| o.order_id.as_str()), Some("4"));
        assert_eq!(
            snapshot.latest_traded_buy().map(|o| o.order_id.as_str()),
            Some("3")
        );
        assert_eq!(snapshot.pending_order_ids(), vec!["4".to_string()]);
        assert_eq!(snapshot.pending_sell_orders().count(), 1);
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = OrderSnapshot::empty();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.traded_count(), 0);
        assert!(snapshot.latest().is_none());
    }

    #[test]
    fn test_cancelled_stop_loss_sell() {
        let o = order("9", OrderStatus::Cancelled, TransactionType::Sell, OrderType::StopLoss);
        assert!(o.is_cancelled_stop_loss_sell());

        let o = order("9", OrderStatus::Cancelled, TransactionType::Sell, OrderType::Limit);
        assert!(!o.is_cancelled_stop_loss_sell());
    }
}
