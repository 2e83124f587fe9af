//! Position and fund snapshots.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Position direction as reported by the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionType {
    Long,
    Short,
    #[default]
    Closed,
}

impl PositionType {
    pub fn from_wire(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "LONG" => Self::Long,
            "SHORT" => Self::Short,
            _ => Self::Closed,
        }
    }
}

/// One open or closed position for the trading day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub security_id: String,
    pub trading_symbol: String,
    pub exchange_segment: String,
    pub position_type: PositionType,
    /// Signed net quantity (negative when short).
    pub net_qty: i64,
    pub realized_profit: Decimal,
    pub unrealized_profit: Decimal,
}

impl Position {
    #[inline]
    pub fn is_open(&self) -> bool {
        self.net_qty != 0
    }
}

/// Positions fetched in one poll.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionSnapshot {
    pub positions: Vec<Position>,
    pub raw: serde_json::Value,
}

impl PositionSnapshot {
    pub fn new(positions: Vec<Position>, raw: serde_json::Value) -> Self {
        Self { positions, raw }
    }

    /// Sum of realized P&L across every position.
    pub fn realized_total(&self) -> Decimal {
        self.positions.iter().map(|p| p.realized_profit).sum()
    }

    pub fn open_positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.iter().filter(|p| p.is_open())
    }
}

/// Fund limits at poll time. Absent balances read as zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FundSnapshot {
    /// Start-of-day limit.
    pub opening_balance: Decimal,
    pub available_balance: Decimal,
    pub withdrawable_balance: Decimal,
    pub raw: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn position(symbol: &str, net_qty: i64, realized: Decimal) -> Position {
        Position {
            security_id: "11536".to_string(),
            trading_symbol: symbol.to_string(),
            exchange_segment: "NSE_EQ".to_string(),
            position_type: if net_qty > 0 {
                PositionType::Long
            } else {
                PositionType::Closed
            },
            net_qty,
            realized_profit: realized,
            unrealized_profit: Decimal::ZERO,
        }
    }

    #[test]
    fn test_realized_total() {
        let snapshot = PositionSnapshot::new(
            vec![
                position("TCS", 0, dec!(250.50)),
                position("INFY", 5, dec!(-100.25)),
            ],
            serde_json::Value::Null,
        );

        assert_eq!(snapshot.realized_total(), dec!(150.25));
        assert_eq!(snapshot.open_positions().count(), 1);
    }

    #[test]
    fn test_empty_realized_total_is_zero() {
        assert_eq!(PositionSnapshot::default().realized_total(), Decimal::ZERO);
    }
}
