//! Audit sinks.
//!
//! The audit log is the single source of truth for operators: every
//! action attempt, successful or not, lands here.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::Mutex;
use riskctl_core::{AuditLogEntry, DailySnapshotRecord, GoalProgress, OrderHistoryRecord, UserId};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::error::PersistenceResult;
use crate::writer::JsonLinesWriter;

/// Append-only audit interface.
pub trait AuditSink: Send + Sync {
    fn record_action(&self, entry: AuditLogEntry) -> PersistenceResult<()>;

    fn record_daily_snapshot(&self, record: DailySnapshotRecord) -> PersistenceResult<()>;

    fn record_order_history(&self, record: OrderHistoryRecord) -> PersistenceResult<()>;

    /// Update the user's goal for `date` if one exists.
    ///
    /// Returns the updated goal, or `None` when no goal is tracked.
    fn record_goal_progress(
        &self,
        user_id: UserId,
        date: NaiveDate,
        actual_profit: Decimal,
    ) -> PersistenceResult<Option<GoalProgress>>;
}

/// Arc wrapper for AuditSink trait objects.
pub type DynAuditSink = Arc<dyn AuditSink>;

type GoalMap = HashMap<(UserId, NaiveDate), GoalProgress>;

fn update_goal(
    goals: &Mutex<GoalMap>,
    user_id: UserId,
    date: NaiveDate,
    actual_profit: Decimal,
) -> Option<GoalProgress> {
    let mut goals = goals.lock();
    let goal = goals.get_mut(&(user_id, date))?;
    goal.update(actual_profit);
    Some(goal.clone())
}

// ============================================================================
// MemoryAuditLog
// ============================================================================

/// In-memory audit sink.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    actions: Mutex<Vec<AuditLogEntry>>,
    snapshots: Mutex<Vec<DailySnapshotRecord>>,
    history: Mutex<Vec<OrderHistoryRecord>>,
    goals: Mutex<GoalMap>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_goal(&self, goal: GoalProgress) {
        self.goals.lock().insert((goal.user_id, goal.date), goal);
    }

    pub fn goal(&self, user_id: UserId, date: NaiveDate) -> Option<GoalProgress> {
        self.goals.lock().get(&(user_id, date)).cloned()
    }

    pub fn actions(&self) -> Vec<AuditLogEntry> {
        self.actions.lock().clone()
    }

    pub fn actions_for(&self, user_id: UserId) -> Vec<AuditLogEntry> {
        self.actions
            .lock()
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn snapshots(&self) -> Vec<DailySnapshotRecord> {
        self.snapshots.lock().clone()
    }

    pub fn order_history(&self) -> Vec<OrderHistoryRecord> {
        self.history.lock().clone()
    }
}

impl AuditSink for MemoryAuditLog {
    fn record_action(&self, entry: AuditLogEntry) -> PersistenceResult<()> {
        self.actions.lock().push(entry);
        Ok(())
    }

    fn record_daily_snapshot(&self, record: DailySnapshotRecord) -> PersistenceResult<()> {
        self.snapshots.lock().push(record);
        Ok(())
    }

    fn record_order_history(&self, record: OrderHistoryRecord) -> PersistenceResult<()> {
        self.history.lock().push(record);
        Ok(())
    }

    fn record_goal_progress(
        &self,
        user_id: UserId,
        date: NaiveDate,
        actual_profit: Decimal,
    ) -> PersistenceResult<Option<GoalProgress>> {
        Ok(update_goal(&self.goals, user_id, date, actual_profit))
    }
}

// ============================================================================
// JsonLinesAuditLog
// ============================================================================

/// File-backed audit sink: one daily JSON Lines file per record kind.
///
/// Goals are read from `goals.json` in the audit directory at open;
/// every goal update is appended to the `goal_progress` files.
pub struct JsonLinesAuditLog {
    actions: Mutex<JsonLinesWriter>,
    snapshots: Mutex<JsonLinesWriter>,
    history: Mutex<JsonLinesWriter>,
    goal_log: Mutex<JsonLinesWriter>,
    goals: Mutex<GoalMap>,
}

impl JsonLinesAuditLog {
    pub fn open(base_dir: impl AsRef<Path>) -> PersistenceResult<Self> {
        let base_dir = base_dir.as_ref();
        let goals_path = base_dir.join("goals.json");

        let mut goals = GoalMap::new();
        if goals_path.exists() {
            let text = std::fs::read_to_string(&goals_path)?;
            let list: Vec<GoalProgress> = serde_json::from_str(&text)?;
            for goal in list {
                goals.insert((goal.user_id, goal.date), goal);
            }
            info!(path = %goals_path.display(), goals = goals.len(), "Loaded daily goals");
        }

        Ok(Self {
            actions: Mutex::new(JsonLinesWriter::new(base_dir, "actions")?),
            snapshots: Mutex::new(JsonLinesWriter::new(base_dir, "daily_snapshots")?),
            history: Mutex::new(JsonLinesWriter::new(base_dir, "order_history")?),
            goal_log: Mutex::new(JsonLinesWriter::new(base_dir, "goal_progress")?),
            goals: Mutex::new(goals),
        })
    }

    pub fn set_goal(&self, goal: GoalProgress) {
        self.goals.lock().insert((goal.user_id, goal.date), goal);
    }
}

impl AuditSink for JsonLinesAuditLog {
    fn record_action(&self, entry: AuditLogEntry) -> PersistenceResult<()> {
        let date = entry.created_at.date_naive();
        self.actions.lock().append(date, &entry)
    }

    fn record_daily_snapshot(&self, record: DailySnapshotRecord) -> PersistenceResult<()> {
        let date = record.created_at.date_naive();
        self.snapshots.lock().append(date, &record)
    }

    fn record_order_history(&self, record: OrderHistoryRecord) -> PersistenceResult<()> {
        self.history.lock().append(record.date, &record)
    }

    fn record_goal_progress(
        &self,
        user_id: UserId,
        date: NaiveDate,
        actual_profit: Decimal,
    ) -> PersistenceResult<Option<GoalProgress>> {
        let Some(goal) = update_goal(&self.goals, user_id, date, actual_profit) else {
            debug!(user_id = %user_id, %date, "No daily goal tracked");
            return Ok(None);
        };
        self.goal_log.lock().append(date, &goal)?;
        Ok(Some(goal))
    }
}
