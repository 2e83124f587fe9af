//! Shared fixtures: a mock broker, in-memory stores and a fixed clock
//! wired into one `JobContext`.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Asia::Kolkata;
use riskctl_broker::parse::{parse_orders, parse_positions};
use riskctl_broker::MockBroker;
use riskctl_core::{
    BrokerCredentials, ControlThresholds, FundSnapshot, OrderSnapshot, PositionSnapshot,
    SessionCalendar, SessionConfig, UserAccount, UserId,
};
use riskctl_jobs::{AccountingConfig, FixedClock, JobContext};
use riskctl_persistence::{AccountRepository, AccountStore, MemoryAuditLog};
use riskctl_risk::{StopLossCalculator, StopLossConfig};
use rust_decimal_macros::dec;
use serde_json::{json, Value};

/// Exchange-local time as UTC.
pub fn ist(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Kolkata
        .with_ymd_and_hms(y, m, d, h, min, 0)
        .unwrap()
        .with_timezone(&Utc)
}

/// Monday 2026-03-02, 10:15 IST: inside the trading window.
pub fn market_hours() -> DateTime<Utc> {
    ist(2026, 3, 2, 10, 15)
}

pub struct Harness {
    pub broker: Arc<MockBroker>,
    pub store: Arc<AccountStore>,
    pub audit: Arc<MemoryAuditLog>,
    pub clock: Arc<FixedClock>,
    pub ctx: JobContext,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(Arc::new(AccountStore::in_memory()))
    }

    pub fn with_store(store: Arc<AccountStore>) -> Self {
        let broker = Arc::new(MockBroker::new());
        let audit = Arc::new(MemoryAuditLog::new());
        let clock = Arc::new(FixedClock::new(market_hours()));

        let calendar = SessionCalendar::new(SessionConfig::default()).unwrap();
        let stop_loss = StopLossCalculator::new(&StopLossConfig::default()).unwrap();
        let ctx = JobContext::new(
            broker.clone(),
            store.clone(),
            audit.clone(),
            calendar,
            stop_loss,
        )
        .with_accounting(AccountingConfig {
            brokerage_per_order: dec!(20),
            settle_delay_ms: 0,
        })
        .with_clock(clock.clone());

        Self {
            broker,
            store,
            audit,
            clock,
            ctx,
        }
    }

    /// Active trading user with every capability enabled.
    pub fn add_user(&self, id: u64, username: &str) -> UserAccount {
        let mut user = UserAccount::new(id, username, credentials(id));
        user.quick_exit_enabled = true;
        user.auto_stop_loss_enabled = true;
        self.store.upsert_user(user.clone()).unwrap();
        user
    }

    pub fn set_thresholds(&self, thresholds: ControlThresholds) {
        self.store.upsert_thresholds(thresholds).unwrap();
    }

    pub fn account(&self, id: u64) -> UserAccount {
        self.store.get_user_account(UserId(id)).unwrap()
    }

    pub fn set_orders(&self, id: u64, snapshot: OrderSnapshot) {
        self.broker.set_orders(&client_id(id), snapshot);
    }

    pub fn set_positions(&self, id: u64, snapshot: PositionSnapshot) {
        self.broker.set_positions(&client_id(id), snapshot);
    }

    pub fn set_funds(&self, id: u64, snapshot: FundSnapshot) {
        self.broker.set_funds(&client_id(id), snapshot);
    }
}

pub fn client_id(id: u64) -> String {
    format!("100{id}")
}

pub fn credentials(id: u64) -> BrokerCredentials {
    BrokerCredentials::new(client_id(id), format!("token-{id}"))
}

/// One broker order-book entry.
pub fn order(id: &str, status: &str, side: &str, order_type: &str, qty: u32, price: &str) -> Value {
    json!({
        "orderId": id,
        "orderStatus": status,
        "transactionType": side,
        "orderType": order_type,
        "productType": "INTRADAY",
        "securityId": "1333",
        "tradingSymbol": "HDFCBANK",
        "exchangeSegment": "NSE_EQ",
        "quantity": qty,
        "price": price,
    })
}

/// Newest-first order book in the broker envelope.
pub fn orders(items: Vec<Value>) -> OrderSnapshot {
    parse_orders(json!({ "status": "success", "data": items }))
}

/// `n` traded LIMIT BUY orders.
pub fn traded_buys(n: usize) -> OrderSnapshot {
    orders(
        (0..n)
            .map(|i| order(&format!("b{i}"), "TRADED", "BUY", "LIMIT", 10, "100.00"))
            .collect(),
    )
}

pub fn positions_with_realized(realized: &[&str]) -> PositionSnapshot {
    let items: Vec<Value> = realized
        .iter()
        .enumerate()
        .map(|(i, pnl)| {
            json!({
                "securityId": format!("{}", 1000 + i),
                "positionType": "CLOSED",
                "netQty": 0,
                "realizedProfit": pnl,
            })
        })
        .collect();
    parse_positions(json!({ "data": items }))
}

pub fn funds(opening: &str, available: &str, withdrawable: &str) -> FundSnapshot {
    FundSnapshot {
        opening_balance: opening.parse().unwrap(),
        available_balance: available.parse().unwrap(),
        withdrawable_balance: withdrawable.parse().unwrap(),
        raw: Value::Null,
    }
}
