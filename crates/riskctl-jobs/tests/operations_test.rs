//! Account logging, session jobs, operator commands and scheduled runs.

mod integration;
use integration::common::*;

use std::sync::Arc;
use std::time::Duration;

use riskctl_core::{ControlThresholds, EnforcementAction, GoalProgress, TierState, UserId};
use riskctl_jobs::{
    flatten_user, manual_kill_switch, AccountLogger, JobError, OrderCountMonitor,
    OrderHistoryJob, SessionCloseRestore, SessionOpenReset,
};
use riskctl_persistence::AccountRepository;
use riskctl_scheduler::{JobReport, Scheduler, Trigger};
use rust_decimal_macros::dec;
use serde_json::json;

// ============================================================================
// Account logger
// ============================================================================

#[tokio::test]
async fn test_account_logger_stores_odd_count_without_snapshot() {
    let h = Harness::new();
    h.add_user(1, "alice");
    h.set_orders(1, traded_buys(3));

    let record = AccountLogger::new(h.ctx.clone())
        .log_user(&h.account(1))
        .await
        .unwrap();

    assert!(record.is_none());
    assert_eq!(h.account(1).last_observed_order_count, 3);
    assert!(h.audit.snapshots().is_empty());
}

#[tokio::test]
async fn test_account_logger_writes_snapshot_on_even_count() {
    let h = Harness::new();
    h.add_user(1, "alice");
    let today = h.ctx.calendar.local_date(market_hours());
    h.audit.set_goal(GoalProgress::new(UserId(1), today, dec!(300)));

    h.set_orders(1, traded_buys(4));
    h.set_positions(1, positions_with_realized(&["500", "-100"]));
    h.set_funds(1, funds("100000", "99500.50", "99000"));

    let record = AccountLogger::new(h.ctx.clone())
        .log_user(&h.account(1))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(record.order_count, 4);
    assert_eq!(record.realized_pnl, dec!(400));
    assert_eq!(record.expenses, dec!(80));
    assert_eq!(record.actual_profit, dec!(320));
    assert_eq!(record.opening_balance, dec!(100000));
    assert_eq!(record.closing_balance, dec!(99500.50));
    assert!(!record.day_open);
    assert!(!record.day_close);
    assert_eq!(h.audit.snapshots(), vec![record]);

    let goal = h.audit.goal(UserId(1), today).unwrap();
    assert_eq!(goal.progress, dec!(320));
    assert!(goal.achieved);
}

#[tokio::test]
async fn test_account_logger_unchanged_count_writes_nothing() {
    let h = Harness::new();
    h.add_user(1, "alice");
    h.set_orders(1, traded_buys(4));
    let logger = AccountLogger::new(h.ctx.clone());

    logger.log_user(&h.account(1)).await.unwrap();
    let second = logger.log_user(&h.account(1)).await.unwrap();

    assert!(second.is_none());
    assert_eq!(h.audit.snapshots().len(), 1);
}

#[tokio::test]
async fn test_account_logger_session_open_minute_marks_day_open() {
    let h = Harness::new();
    h.add_user(1, "alice");
    h.clock.set(ist(2026, 3, 2, 9, 0));
    h.set_orders(1, traded_buys(1));

    let record = AccountLogger::new(h.ctx.clone())
        .log_user(&h.account(1))
        .await
        .unwrap()
        .unwrap();

    assert!(record.day_open);
    assert_eq!(record.order_count, 1);
}

#[tokio::test]
async fn test_account_logger_marks_day_close_in_close_hour() {
    let h = Harness::new();
    h.add_user(1, "alice");
    h.clock.set(ist(2026, 3, 2, 15, 20));
    h.set_orders(1, traded_buys(2));

    let record = AccountLogger::new(h.ctx.clone())
        .log_user(&h.account(1))
        .await
        .unwrap()
        .unwrap();

    assert!(record.day_close);
    assert!(!record.day_open);
}

#[tokio::test]
async fn test_account_logger_runs_for_users_with_trading_disabled() {
    let h = Harness::new();
    let mut user = h.add_user(1, "alice");
    user.trading_enabled = false;
    h.store.upsert_user(user).unwrap();
    h.set_orders(1, traded_buys(2));

    let report = AccountLogger::new(h.ctx.clone()).run_once().await.unwrap();

    assert_eq!(
        report,
        JobReport::Completed {
            users: 1,
            actions: 1,
            failures: 0
        }
    );
}

// ============================================================================
// Order history
// ============================================================================

#[tokio::test]
async fn test_order_history_counts_every_order() {
    let h = Harness::new();
    h.add_user(1, "alice");
    h.set_orders(
        1,
        orders(vec![
            order("s1", "CANCELLED", "SELL", "STOP_LOSS", 10, "98.00"),
            order("s2", "REJECTED", "SELL", "MARKET", 10, "0"),
            order("b1", "TRADED", "BUY", "LIMIT", 10, "100.00"),
        ]),
    );
    h.set_positions(1, positions_with_realized(&["250"]));
    h.set_funds(1, funds("50000", "49000", "48500"));

    let record = OrderHistoryJob::new(h.ctx.clone())
        .record_user(&h.account(1))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(record.order_count, 3);
    assert_eq!(record.expense, dec!(60));
    assert_eq!(record.profit_loss, dec!(190));
    assert_eq!(record.sod_balance, dec!(50000));
    assert_eq!(record.eod_balance, dec!(48500));
    assert_eq!(record.order_data["data"][0]["orderId"], json!("s1"));
    assert_eq!(h.audit.order_history().len(), 1);
}

#[tokio::test]
async fn test_order_history_skips_empty_book() {
    let h = Harness::new();
    h.add_user(1, "alice");
    h.set_orders(1, orders(vec![]));

    let report = OrderHistoryJob::new(h.ctx.clone()).run_once().await.unwrap();

    assert!(matches!(report, JobReport::Completed { users: 1, actions: 0, .. }));
    assert!(h.audit.order_history().is_empty());
}

// ============================================================================
// Session jobs
// ============================================================================

#[tokio::test]
async fn test_session_open_reset_after_tier2() {
    let h = Harness::new();
    h.add_user(1, "alice");
    let mut thresholds = ControlThresholds::new(UserId(1), 5, 10);
    thresholds.default_order_limit_tier2 = 8;
    h.set_thresholds(thresholds);

    let monitor = OrderCountMonitor::new(h.ctx.clone());
    h.set_orders(1, traded_buys(6));
    monitor.run_once().await.unwrap();
    h.set_orders(1, traded_buys(11));
    monitor.run_once().await.unwrap();
    assert_eq!(h.account(1).tier_state(), TierState::Tier2Activated);

    SessionOpenReset::new(h.store.clone()).run_once().unwrap();

    let account = h.account(1);
    assert_eq!(account.tier_state(), TierState::Normal);
    assert!(account.trading_enabled);
    assert_eq!(account.last_observed_order_count, 0);
    let thresholds = h.store.thresholds_for(UserId(1)).unwrap().unwrap();
    assert_eq!(thresholds.order_limit_tier2, 8);
}

#[tokio::test]
async fn test_session_close_restores_dev_admin() {
    let h = Harness::new();
    let mut admin = h.add_user(9, "devadmin");
    admin.elevated = false;
    h.store.upsert_user(admin).unwrap();

    let report = SessionCloseRestore::new(h.store.clone(), Some("devadmin".to_string()))
        .run_once()
        .unwrap();

    assert_eq!(report.outcome(), "completed");
    assert!(h.account(9).elevated);
}

// ============================================================================
// Operator commands
// ============================================================================

#[tokio::test]
async fn test_flatten_cancels_pending_sells_and_closes_buy() {
    let h = Harness::new();
    h.add_user(1, "alice");
    h.set_orders(
        1,
        orders(vec![
            order("s2", "PENDING", "SELL", "STOP_LOSS", 10, "97.00"),
            order("s1", "PENDING", "SELL", "LIMIT", 10, "105.00"),
            order("b1", "TRADED", "BUY", "LIMIT", 10, "100.00"),
        ]),
    );

    let report = flatten_user(&h.ctx, "alice").await.unwrap();

    assert_eq!(report.actions.len(), 3);
    assert!(matches!(
        report.actions[2],
        EnforcementAction::ClosePosition { quantity: 10, .. }
    ));
    assert_eq!(report.succeeded, 3);
    assert_eq!(report.failed, 0);
    assert_eq!(
        h.broker.cancelled_orders(&client_id(1)),
        vec!["s2".to_string(), "s1".to_string()]
    );
    assert_eq!(h.broker.placed_orders(&client_id(1)).len(), 1);
    assert_eq!(h.audit.actions_for(UserId(1)).len(), 3);
}

#[tokio::test]
async fn test_flatten_unknown_user() {
    let h = Harness::new();

    let err = flatten_user(&h.ctx, "nobody").await.unwrap_err();

    assert!(matches!(err, JobError::UnknownUser(_)));
    assert_eq!(err.code(), "UNKNOWN_USER");
    assert!(h.broker.calls().is_empty());
}

#[tokio::test]
async fn test_manual_kill_switch_escalates_one_tier_per_call() {
    let h = Harness::new();
    h.add_user(1, "alice");

    assert_eq!(
        manual_kill_switch(&h.ctx, "alice").await.unwrap(),
        TierState::Tier1Activated
    );
    assert_eq!(
        manual_kill_switch(&h.ctx, "alice").await.unwrap(),
        TierState::Tier2Activated
    );
    assert_eq!(
        manual_kill_switch(&h.ctx, "alice").await.unwrap(),
        TierState::Tier2Activated
    );

    assert_eq!(h.broker.kill_switch_calls(&client_id(1)), 2);
    assert!(!h.account(1).trading_enabled);
}

// ============================================================================
// Scheduled runs
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_overlapping_instances_activate_kill_switch_once() {
    let h = Harness::new();
    h.add_user(1, "alice");
    h.set_thresholds(ControlThresholds::new(UserId(1), 5, 10));
    h.set_orders(1, traded_buys(6));
    h.broker.set_latency(Duration::from_millis(30));

    let mut scheduler = Scheduler::new();
    scheduler
        .register_job(
            Arc::new(OrderCountMonitor::new(h.ctx.clone())),
            Trigger::Interval(Duration::from_millis(10)),
            3,
        )
        .unwrap();
    scheduler.start().unwrap();

    tokio::time::sleep(Duration::from_millis(250)).await;
    let report = scheduler.shutdown(true, Duration::from_secs(2)).await;

    assert!(report.completed_cleanly);
    let stats = scheduler.stats(OrderCountMonitor::NAME).unwrap();
    assert!(stats.started >= 2);
    assert_eq!(stats.failed, 0);
    assert_eq!(h.broker.kill_switch_calls(&client_id(1)), 1);
    assert_eq!(h.account(1).tier_state(), TierState::Tier1Activated);
}
