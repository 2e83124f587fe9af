//! Shared collaborators for every job.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use riskctl_broker::{BrokerResult, DynBrokerGateway};
use riskctl_core::{
    AuditLogEntry, FundSnapshot, OrderSnapshot, PositionSnapshot, SessionCalendar, UserAccount,
};
use riskctl_persistence::{DynAccountRepository, DynAuditSink};
use riskctl_risk::StopLossCalculator;
use riskctl_telemetry::Metrics;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::clock::{DynClock, SystemClock};
use crate::error::{JobError, JobResult};
use crate::guard::InFlightRegistry;

/// Default number of users evaluated concurrently in one instance.
pub const DEFAULT_FAN_OUT: usize = 8;

/// Default per-call broker timeout.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

fn default_brokerage_per_order() -> Decimal {
    Decimal::ZERO
}

fn default_settle_delay_ms() -> u64 {
    10_000
}

/// Expense and snapshot timing used by the account logger and order history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountingConfig {
    /// Flat brokerage charged per order.
    #[serde(default = "default_brokerage_per_order")]
    pub brokerage_per_order: Decimal,
    /// Pause before reading funds after an order-count change.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

impl Default for AccountingConfig {
    fn default() -> Self {
        Self {
            brokerage_per_order: default_brokerage_per_order(),
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

impl AccountingConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// `order_count * brokerage_per_order`.
    pub fn expense(&self, order_count: u32) -> Decimal {
        Decimal::from(order_count) * self.brokerage_per_order
    }
}

/// Everything a job needs, cheap to clone.
#[derive(Clone)]
pub struct JobContext {
    pub broker: DynBrokerGateway,
    pub accounts: DynAccountRepository,
    pub audit: DynAuditSink,
    pub calendar: Arc<SessionCalendar>,
    pub stop_loss: Arc<StopLossCalculator>,
    pub accounting: AccountingConfig,
    pub in_flight: InFlightRegistry,
    pub fan_out: usize,
    pub call_timeout: Duration,
    pub clock: DynClock,
}

impl JobContext {
    pub fn new(
        broker: DynBrokerGateway,
        accounts: DynAccountRepository,
        audit: DynAuditSink,
        calendar: SessionCalendar,
        stop_loss: StopLossCalculator,
    ) -> Self {
        Self {
            broker,
            accounts,
            audit,
            calendar: Arc::new(calendar),
            stop_loss: Arc::new(stop_loss),
            accounting: AccountingConfig::default(),
            in_flight: InFlightRegistry::new(),
            fan_out: DEFAULT_FAN_OUT,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_accounting(mut self, accounting: AccountingConfig) -> Self {
        self.accounting = accounting;
        self
    }

    #[must_use]
    pub fn with_fan_out(mut self, fan_out: usize) -> Self {
        self.fan_out = fan_out.max(1);
        self
    }

    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: DynClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ========================================================================
    // Broker calls with timeout
    // ========================================================================

    /// Run one broker call under `call_timeout`, counting failures.
    pub async fn call<T>(
        &self,
        call: &'static str,
        fut: impl Future<Output = BrokerResult<T>>,
    ) -> JobResult<T> {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                Metrics::broker_error(e.kind());
                Err(e.into())
            }
            Err(_) => {
                Metrics::broker_error("timeout");
                warn!(call, timeout_ms = self.call_timeout.as_millis() as u64, "Broker call timed out");
                Err(JobError::Timeout {
                    call,
                    after_ms: self.call_timeout.as_millis() as u64,
                })
            }
        }
    }

    pub async fn list_orders(&self, user: &UserAccount) -> JobResult<OrderSnapshot> {
        self.call("list_orders", self.broker.list_orders(&user.credentials))
            .await
    }

    pub async fn list_positions(&self, user: &UserAccount) -> JobResult<PositionSnapshot> {
        self.call("list_positions", self.broker.list_positions(&user.credentials))
            .await
    }

    pub async fn fund_limits(&self, user: &UserAccount) -> JobResult<FundSnapshot> {
        self.call("fund_limits", self.broker.fund_limits(&user.credentials))
            .await
    }

    /// Append one audit entry.
    pub fn record_action(&self, entry: AuditLogEntry) -> JobResult<()> {
        self.audit.record_action(entry)?;
        Metrics::record_written("action");
        Ok(())
    }
}
