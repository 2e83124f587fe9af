//! Session-boundary jobs.

use riskctl_core::FlagUpdate;
use riskctl_persistence::DynAccountRepository;
use riskctl_scheduler::{BoxFuture, JobReport, ScheduledJob};
use tracing::{info, warn};

use crate::error::JobResult;

/// Session open: every active user back to `Normal` with trading
/// enabled, order count zeroed and elevation cleared; every tier2 limit
/// back to its default.
pub struct SessionOpenReset {
    accounts: DynAccountRepository,
}

impl SessionOpenReset {
    pub const NAME: &'static str = "session_open_reset";

    pub fn new(accounts: DynAccountRepository) -> Self {
        Self { accounts }
    }

    pub fn run_once(&self) -> JobResult<JobReport> {
        let users = self.accounts.reset_all_active_users()?;
        let limits = self.accounts.reset_tier2_limits()?;
        info!(users, limits, "Session-open reset complete");
        Ok(JobReport::Completed {
            users,
            actions: users + limits,
            failures: 0,
        })
    }
}

impl ScheduledJob for SessionOpenReset {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(&self) -> BoxFuture<'_, anyhow::Result<JobReport>> {
        Box::pin(async move { Ok(self.run_once()?) })
    }
}

/// Session close: restore the elevated flag of the configured operator.
pub struct SessionCloseRestore {
    accounts: DynAccountRepository,
    dev_admin: Option<String>,
}

impl SessionCloseRestore {
    pub const NAME: &'static str = "session_close_restore";

    pub fn new(accounts: DynAccountRepository, dev_admin: Option<String>) -> Self {
        Self {
            accounts,
            dev_admin: dev_admin.filter(|name| !name.trim().is_empty()),
        }
    }

    pub fn run_once(&self) -> JobResult<JobReport> {
        let Some(username) = self.dev_admin.as_deref() else {
            warn!("Dev admin username not configured, nothing to restore");
            return Ok(JobReport::skipped("dev admin not configured"));
        };
        let Some(user) = self.accounts.find_by_username(username)? else {
            warn!(user = %username, "Dev admin user not found");
            return Ok(JobReport::skipped("dev admin not found"));
        };

        self.accounts
            .update_flags(user.id, &FlagUpdate::elevated(true))?;
        info!(user = %username, "Restored elevated privileges");
        Ok(JobReport::Completed {
            users: 1,
            actions: 1,
            failures: 0,
        })
    }
}

impl ScheduledJob for SessionCloseRestore {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(&self) -> BoxFuture<'_, anyhow::Result<JobReport>> {
        Box::pin(async move { Ok(self.run_once()?) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riskctl_core::{BrokerCredentials, ControlThresholds, TierState, UserAccount, UserId};
    use riskctl_persistence::{AccountRepository, AccountStore};
    use std::sync::Arc;

    fn store_with(users: Vec<UserAccount>) -> Arc<AccountStore> {
        let store = Arc::new(AccountStore::in_memory());
        for u in users {
            store.upsert_user(u).unwrap();
        }
        store
    }

    fn user(id: u64, name: &str) -> UserAccount {
        UserAccount::new(id, name, BrokerCredentials::new(format!("c{id}"), "t"))
    }

    #[test]
    fn test_session_open_reset() {
        let mut killed = user(1, "alice");
        killed.tier1_activated = true;
        killed.tier2_activated = true;
        killed.trading_enabled = false;
        killed.last_observed_order_count = 7;
        killed.elevated = true;
        let mut inactive = user(2, "bob");
        inactive.active = false;
        inactive.tier1_activated = true;
        let store = store_with(vec![killed, inactive]);

        let mut t = ControlThresholds::new(UserId(1), 5, 10);
        t.order_limit_tier2 = 20;
        store.upsert_thresholds(t).unwrap();

        let report = SessionOpenReset::new(store.clone()).run_once().unwrap();
        assert!(matches!(report, JobReport::Completed { users: 1, .. }));

        let alice = store.get_user_account(UserId(1)).unwrap();
        assert_eq!(alice.tier_state(), TierState::Normal);
        assert!(alice.trading_enabled);
        assert_eq!(alice.last_observed_order_count, 0);
        assert!(!alice.elevated);
        assert_eq!(
            store.thresholds_for(UserId(1)).unwrap().unwrap().order_limit_tier2,
            10
        );

        // Inactive users are left alone.
        let bob = store.get_user_account(UserId(2)).unwrap();
        assert!(bob.tier1_activated);
    }

    #[test]
    fn test_session_close_restores_dev_admin() {
        let store = store_with(vec![user(1, "ops"), user(2, "trader")]);
        let job = SessionCloseRestore::new(store.clone(), Some("ops".to_string()));

        let report = job.run_once().unwrap();
        assert_eq!(report.outcome(), "completed");
        assert!(store.get_user_account(UserId(1)).unwrap().elevated);
        assert!(!store.get_user_account(UserId(2)).unwrap().elevated);
    }

    #[test]
    fn test_session_close_without_dev_admin_is_noop() {
        let store = store_with(vec![user(1, "ops")]);

        let unset = SessionCloseRestore::new(store.clone(), Some("  ".to_string()));
        assert_eq!(unset.run_once().unwrap().outcome(), "skipped");

        let missing = SessionCloseRestore::new(store.clone(), Some("ghost".to_string()));
        assert_eq!(missing.run_once().unwrap().outcome(), "skipped");

        assert!(!store.get_user_account(UserId(1)).unwrap().elevated);
    }
}
