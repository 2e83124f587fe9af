//! Order-book detectors.
//!
//! Each detector inspects a single snapshot and returns the protective
//! action(s) it calls for. An empty snapshot always yields `NoAction`.

use crate::error::RiskResult;
use crate::stop_loss::StopLossCalculator;
use riskctl_core::{ControlThresholds, EnforcementAction, OrderSnapshot};

/// Most recent order is a cancelled STOP_LOSS SELL while trades exist:
/// flatten with a market SELL of the same security and quantity.
#[must_use]
pub fn detect_quick_exit(snapshot: &OrderSnapshot) -> EnforcementAction {
    let Some(latest) = snapshot.latest() else {
        return EnforcementAction::NoAction;
    };
    if !latest.is_cancelled_stop_loss_sell()
        || snapshot.traded_count() == 0
        || latest.quantity == 0
    {
        return EnforcementAction::NoAction;
    }

    EnforcementAction::ClosePosition {
        security_id: latest.security_id.clone(),
        exchange_segment: latest.exchange_segment.clone(),
        quantity: latest.quantity,
    }
}

/// Most recent order is a traded BUY: protect it with a STOP_LOSS SELL.
///
/// Existing pending SELL orders do not suppress the new order.
pub fn detect_stop_loss(
    snapshot: &OrderSnapshot,
    thresholds: &ControlThresholds,
    calculator: &StopLossCalculator,
) -> RiskResult<EnforcementAction> {
    let Some(latest) = snapshot.latest() else {
        return Ok(EnforcementAction::NoAction);
    };
    if !(latest.is_buy() && latest.is_traded()) {
        return Ok(EnforcementAction::NoAction);
    }

    let levels = calculator.calculate_str(
        latest.price,
        thresholds.stop_loss_parameter,
        &thresholds.stop_loss_mode,
        latest.quantity,
    )?;

    Ok(EnforcementAction::PlaceStopLoss {
        security_id: latest.security_id.clone(),
        exchange_segment: latest.exchange_segment.clone(),
        quantity: latest.quantity,
        price: levels.stop_price,
        trigger_price: levels.trigger_price,
    })
}

/// Operator flatten: cancel every pending SELL, then market-sell the
/// latest traded BUY.
#[must_use]
pub fn plan_flatten(snapshot: &OrderSnapshot) -> Vec<EnforcementAction> {
    let mut actions: Vec<EnforcementAction> = snapshot
        .pending_sell_orders()
        .map(|o| EnforcementAction::CancelPendingOrder {
            order_id: o.order_id.clone(),
        })
        .collect();

    if let Some(buy) = snapshot.latest_traded_buy() {
        if buy.quantity > 0 {
            actions.push(EnforcementAction::ClosePosition {
                security_id: buy.security_id.clone(),
                exchange_segment: buy.exchange_segment.clone(),
                quantity: buy.quantity,
            });
        }
    }

    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RiskError;
    use crate::stop_loss::StopLossConfig;
    use riskctl_core::{
        Order, OrderStatus, OrderType, Price, ProductType, TransactionType, UserId,
    };
    use rust_decimal_macros::dec;

    fn order(
        id: &str,
        status: OrderStatus,
        side: TransactionType,
        order_type: OrderType,
        qty: u32,
    ) -> Order {
        Order {
            order_id: id.to_string(),
            status,
            transaction_type: side,
            order_type,
            product_type: ProductType::Intraday,
            security_id: "52175".to_string(),
            trading_symbol: "NIFTY-MAR2026-22500-CE".to_string(),
            exchange_segment: "NSE_FNO".to_string(),
            quantity: qty,
            price: Price::new(dec!(100.00)),
            trigger_price: Price::ZERO,
            create_time: None,
            update_time: None,
        }
    }

    fn snapshot(orders: Vec<Order>) -> OrderSnapshot {
        OrderSnapshot::new(orders, serde_json::Value::Null)
    }

    fn calculator() -> StopLossCalculator {
        StopLossCalculator::new(&StopLossConfig::default()).unwrap()
    }

    fn thresholds(mode: &str, parameter: rust_decimal::Decimal) -> ControlThresholds {
        let mut t = ControlThresholds::new(UserId(1), 5, 10);
        t.stop_loss_mode = mode.to_string();
        t.stop_loss_parameter = parameter;
        t
    }

    #[test]
    fn test_quick_exit_on_cancelled_stop_loss() {
        let snap = snapshot(vec![
            order("3", OrderStatus::Cancelled, TransactionType::Sell, OrderType::StopLoss, 50),
            order("2", OrderStatus::Traded, TransactionType::Buy, OrderType::Market, 50),
        ]);

        assert_eq!(
            detect_quick_exit(&snap),
            EnforcementAction::ClosePosition {
                security_id: "52175".to_string(),
                exchange_segment: "NSE_FNO".to_string(),
                quantity: 50,
            }
        );
    }

    #[test]
    fn test_quick_exit_ignores_other_latest_orders() {
        let snap = snapshot(vec![
            order("3", OrderStatus::Pending, TransactionType::Sell, OrderType::StopLoss, 50),
            order("2", OrderStatus::Traded, TransactionType::Buy, OrderType::Market, 50),
        ]);
        assert_eq!(detect_quick_exit(&snap), EnforcementAction::NoAction);

        // No trades at all
        let snap = snapshot(vec![order(
            "1",
            OrderStatus::Cancelled,
            TransactionType::Sell,
            OrderType::StopLoss,
            50,
        )]);
        assert_eq!(detect_quick_exit(&snap), EnforcementAction::NoAction);
    }

    #[test]
    fn test_empty_snapshot_is_no_action() {
        let snap = OrderSnapshot::empty();
        assert_eq!(detect_quick_exit(&snap), EnforcementAction::NoAction);
        assert_eq!(
            detect_stop_loss(&snap, &thresholds("percentage", dec!(2)), &calculator()).unwrap(),
            EnforcementAction::NoAction
        );
        assert!(plan_flatten(&snap).is_empty());
    }

    #[test]
    fn test_stop_loss_for_latest_traded_buy() {
        let snap = snapshot(vec![order(
            "7",
            OrderStatus::Traded,
            TransactionType::Buy,
            OrderType::Market,
            10,
        )]);

        let action =
            detect_stop_loss(&snap, &thresholds("percentage", dec!(2)), &calculator()).unwrap();
        assert_eq!(
            action,
            EnforcementAction::PlaceStopLoss {
                security_id: "52175".to_string(),
                exchange_segment: "NSE_FNO".to_string(),
                quantity: 10,
                price: Price::new(dec!(98.00)),
                trigger_price: Price::new(dec!(99.00)),
            }
        );
    }

    #[test]
    fn test_stop_loss_stacks_over_pending_sell() {
        let snap = snapshot(vec![
            order("8", OrderStatus::Traded, TransactionType::Buy, OrderType::Market, 10),
            order("7", OrderStatus::Pending, TransactionType::Sell, OrderType::StopLoss, 10),
        ]);

        let action =
            detect_stop_loss(&snap, &thresholds("points", dec!(3)), &calculator()).unwrap();
        assert!(matches!(action, EnforcementAction::PlaceStopLoss { .. }));
    }

    #[test]
    fn test_stop_loss_propagates_calculator_errors() {
        let snap = snapshot(vec![order(
            "7",
            OrderStatus::Traded,
            TransactionType::Buy,
            OrderType::Market,
            0,
        )]);

        let result = detect_stop_loss(&snap, &thresholds("price", dec!(50)), &calculator());
        assert!(matches!(result, Err(RiskError::InvalidInput(_))));

        let result = detect_stop_loss(&snap, &thresholds("bogus", dec!(50)), &calculator());
        assert!(matches!(result, Err(RiskError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_flatten_cancels_pending_sells_then_closes() {
        let snap = snapshot(vec![
            order("5", OrderStatus::Pending, TransactionType::Sell, OrderType::StopLoss, 25),
            order("4", OrderStatus::Pending, TransactionType::Buy, OrderType::Limit, 25),
            order("3", OrderStatus::Traded, TransactionType::Buy, OrderType::Market, 25),
            order("2", OrderStatus::Pending, TransactionType::Sell, OrderType::Limit, 25),
        ]);

        let actions = plan_flatten(&snap);
        assert_eq!(
            actions,
            vec![
                EnforcementAction::CancelPendingOrder {
                    order_id: "5".to_string()
                },
                EnforcementAction::CancelPendingOrder {
                    order_id: "2".to_string()
                },
                EnforcementAction::ClosePosition {
                    security_id: "52175".to_string(),
                    exchange_segment: "NSE_FNO".to_string(),
                    quantity: 25,
                },
            ]
        );
    }
}
