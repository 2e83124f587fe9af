//! In-memory account store with optional JSON file persistence.
//!
//! Every mutation is applied to a copy of the state, written to the file
//! through a temp file and rename, and only then swapped in under the
//! write lock. A failed write leaves the in-memory state unchanged.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use riskctl_core::{Capability, ControlThresholds, FlagUpdate, TierState, UserAccount, UserId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{PersistenceError, PersistenceResult};
use crate::repository::AccountRepository;

/// On-disk layout of the account file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub users: Vec<UserAccount>,
    #[serde(default)]
    pub thresholds: Vec<ControlThresholds>,
}

#[derive(Debug, Clone, Default)]
struct StoreState {
    users: BTreeMap<UserId, UserAccount>,
    thresholds: BTreeMap<UserId, ControlThresholds>,
}

impl StoreState {
    fn from_snapshot(snapshot: StoreSnapshot) -> PersistenceResult<Self> {
        let mut state = Self::default();
        for user in snapshot.users {
            state.users.insert(user.id, user);
        }
        for t in snapshot.thresholds {
            if state.thresholds.contains_key(&t.user_id) {
                return Err(PersistenceError::DuplicateThresholds(t.user_id));
            }
            state.thresholds.insert(t.user_id, t);
        }
        Ok(state)
    }

    fn to_snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            users: self.users.values().cloned().collect(),
            thresholds: self.thresholds.values().cloned().collect(),
        }
    }
}

/// Account repository backed by memory and, optionally, a JSON file.
#[derive(Debug)]
pub struct AccountStore {
    state: RwLock<StoreState>,
    path: Option<PathBuf>,
}

impl Default for AccountStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl AccountStore {
    pub fn in_memory() -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            path: None,
        }
    }

    /// Load from `path`; a missing file starts an empty store at that path.
    pub fn open(path: impl AsRef<Path>) -> PersistenceResult<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let text = fs::read_to_string(&path)?;
            let snapshot: StoreSnapshot = serde_json::from_str(&text)?;
            info!(
                path = %path.display(),
                users = snapshot.users.len(),
                thresholds = snapshot.thresholds.len(),
                "Loaded account store"
            );
            StoreState::from_snapshot(snapshot)?
        } else {
            info!(path = %path.display(), "Account file not found, starting empty");
            StoreState::default()
        };

        Ok(Self {
            state: RwLock::new(state),
            path: Some(path),
        })
    }

    /// Insert or replace a user record.
    pub fn upsert_user(&self, user: UserAccount) -> PersistenceResult<()> {
        self.commit(|state| {
            state.users.insert(user.id, user);
            Ok(())
        })
    }

    /// Insert or replace the single thresholds record of a user.
    pub fn upsert_thresholds(&self, thresholds: ControlThresholds) -> PersistenceResult<()> {
        self.commit(|state| {
            state.thresholds.insert(thresholds.user_id, thresholds);
            Ok(())
        })
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.state.read().to_snapshot()
    }

    /// Apply `mutate` to a copy of the state, persist the copy, then
    /// publish it. Nothing is published if either step fails.
    fn commit<T>(
        &self,
        mutate: impl FnOnce(&mut StoreState) -> PersistenceResult<T>,
    ) -> PersistenceResult<T> {
        let mut state = self.state.write();
        let mut next = state.clone();
        let out = mutate(&mut next)?;
        self.persist(&next)?;
        *state = next;
        Ok(out)
    }

    fn persist(&self, state: &StoreState) -> PersistenceResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(&state.to_snapshot())?;
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        debug!(path = %path.display(), "Persisted account store");
        Ok(())
    }
}

impl AccountRepository for AccountStore {
    fn eligible_users(&self, capability: Capability) -> PersistenceResult<Vec<UserAccount>> {
        Ok(self
            .state
            .read()
            .users
            .values()
            .filter(|u| u.has_capability(capability))
            .cloned()
            .collect())
    }

    fn get_user_account(&self, id: UserId) -> PersistenceResult<UserAccount> {
        self.state
            .read()
            .users
            .get(&id)
            .cloned()
            .ok_or(PersistenceError::UserNotFound(id))
    }

    fn find_by_username(&self, username: &str) -> PersistenceResult<Option<UserAccount>> {
        Ok(self
            .state
            .read()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    fn thresholds_for(&self, id: UserId) -> PersistenceResult<Option<ControlThresholds>> {
        Ok(self.state.read().thresholds.get(&id).cloned())
    }

    fn update_flags(&self, id: UserId, update: &FlagUpdate) -> PersistenceResult<UserAccount> {
        self.commit(|state| {
            let user = state
                .users
                .get_mut(&id)
                .ok_or(PersistenceError::UserNotFound(id))?;
            update.apply(user);
            Ok(user.clone())
        })
    }

    fn update_flags_if(
        &self,
        id: UserId,
        expected: TierState,
        update: &FlagUpdate,
    ) -> PersistenceResult<bool> {
        let mut state = self.state.write();
        let current = state
            .users
            .get(&id)
            .ok_or(PersistenceError::UserNotFound(id))?;
        if current.tier_state() != expected {
            debug!(
                user = %current.username,
                expected = %expected,
                actual = %current.tier_state(),
                "Conditional flag update skipped"
            );
            return Ok(false);
        }

        let mut next = state.clone();
        if let Some(user) = next.users.get_mut(&id) {
            update.apply(user);
        }
        self.persist(&next)?;
        *state = next;
        Ok(true)
    }

    fn reset_all_active_users(&self) -> PersistenceResult<usize> {
        let reset = FlagUpdate::session_reset();
        self.commit(|state| {
            let mut count = 0;
            for user in state.users.values_mut().filter(|u| u.active) {
                reset.apply(user);
                count += 1;
            }
            Ok(count)
        })
    }

    fn reset_tier2_limits(&self) -> PersistenceResult<usize> {
        self.commit(|state| {
            let mut count = 0;
            for t in state.thresholds.values_mut() {
                t.order_limit_tier2 = t.default_order_limit_tier2;
                count += 1;
            }
            Ok(count)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riskctl_core::{BrokerCredentials, KillSwitchTier};
    use tempfile::TempDir;

    fn user(id: u64, name: &str) -> UserAccount {
        UserAccount::new(id, name, BrokerCredentials::new(format!("c{id}"), "token"))
    }

    #[test]
    fn test_eligible_users_filters_by_capability() {
        let store = AccountStore::in_memory();
        let mut a = user(1, "alice");
        a.quick_exit_enabled = true;
        let mut b = user(2, "bob");
        b.trading_enabled = false;
        let mut c = user(3, "carol");
        c.active = false;
        for u in [a, b, c] {
            store.upsert_user(u).unwrap();
        }

        let ids = |cap| -> Vec<u64> {
            store
                .eligible_users(cap)
                .unwrap()
                .into_iter()
                .map(|u| u.id.0)
                .collect()
        };
        assert_eq!(ids(Capability::OrderCount), vec![1]);
        assert_eq!(ids(Capability::QuickExit), vec![1]);
        assert_eq!(ids(Capability::AutoStopLoss), Vec::<u64>::new());
        assert_eq!(ids(Capability::AccountLogging), vec![1, 2]);
    }

    #[test]
    fn test_update_flags_if_rejects_stale_state() {
        let store = AccountStore::in_memory();
        store.upsert_user(user(1, "alice")).unwrap();
        let tier1 = FlagUpdate::activate(KillSwitchTier::Tier1);

        assert!(store.update_flags_if(UserId(1), TierState::Normal, &tier1).unwrap());
        // A second instance that read Normal earlier loses the race.
        assert!(!store.update_flags_if(UserId(1), TierState::Normal, &tier1).unwrap());

        let tier2 = FlagUpdate::activate(KillSwitchTier::Tier2);
        assert!(store
            .update_flags_if(UserId(1), TierState::Tier1Activated, &tier2)
            .unwrap());

        let account = store.get_user_account(UserId(1)).unwrap();
        assert_eq!(account.tier_state(), TierState::Tier2Activated);
        assert!(!account.trading_enabled);
    }

    #[test]
    fn test_unknown_user() {
        let store = AccountStore::in_memory();
        assert!(matches!(
            store.get_user_account(UserId(9)),
            Err(PersistenceError::UserNotFound(UserId(9)))
        ));
        assert!(store.update_flags(UserId(9), &FlagUpdate::order_count(1)).is_err());
        assert!(store.find_by_username("nobody").unwrap().is_none());
    }

    #[test]
    fn test_session_reset_and_tier2_limits() {
        let store = AccountStore::in_memory();
        let mut u = user(1, "alice");
        u.tier1_activated = true;
        u.tier2_activated = true;
        u.trading_enabled = false;
        u.last_observed_order_count = 7;
        store.upsert_user(u).unwrap();

        let mut t = ControlThresholds::new(UserId(1), 5, 10);
        t.order_limit_tier2 = 14;
        store.upsert_thresholds(t).unwrap();

        assert_eq!(store.reset_all_active_users().unwrap(), 1);
        assert_eq!(store.reset_tier2_limits().unwrap(), 1);

        let account = store.get_user_account(UserId(1)).unwrap();
        assert_eq!(account.tier_state(), TierState::Normal);
        assert!(account.trading_enabled);
        assert_eq!(account.last_observed_order_count, 0);

        let t = store.thresholds_for(UserId(1)).unwrap().unwrap();
        assert_eq!(t.order_limit_tier2, 10);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state/accounts.json");

        {
            let store = AccountStore::open(&path).unwrap();
            store.upsert_user(user(1, "alice")).unwrap();
            store
                .upsert_thresholds(ControlThresholds::new(UserId(1), 3, 6))
                .unwrap();
            store
                .update_flags(UserId(1), &FlagUpdate::order_count(4))
                .unwrap();
        }

        let store = AccountStore::open(&path).unwrap();
        let account = store.find_by_username("alice").unwrap().unwrap();
        assert_eq!(account.last_observed_order_count, 4);
        assert_eq!(account.credentials.client_id, "c1");
        assert!(store.thresholds_for(UserId(1)).unwrap().is_some());
    }

    #[test]
    fn test_failed_write_leaves_memory_unchanged() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("data");
        let store = AccountStore::open(data.join("accounts.json")).unwrap();
        store.upsert_user(user(1, "alice")).unwrap();
        store
            .upsert_thresholds(ControlThresholds::new(UserId(1), 3, 6))
            .unwrap();

        // A plain file where the data directory was makes every write fail.
        fs::remove_dir_all(&data).unwrap();
        fs::write(&data, "not a directory").unwrap();

        let tier1 = FlagUpdate::activate(KillSwitchTier::Tier1);
        assert!(store
            .update_flags_if(UserId(1), TierState::Normal, &tier1)
            .is_err());
        assert!(store.update_flags(UserId(1), &FlagUpdate::order_count(4)).is_err());
        assert!(store.reset_tier2_limits().is_err());
        assert!(store.upsert_user(user(2, "bob")).is_err());

        let account = store.get_user_account(UserId(1)).unwrap();
        assert_eq!(account.tier_state(), TierState::Normal);
        assert!(account.trading_enabled);
        assert_eq!(account.last_observed_order_count, 0);
        assert!(store.find_by_username("bob").unwrap().is_none());

        // Once the directory is back the same update goes through.
        fs::remove_file(&data).unwrap();
        assert!(store
            .update_flags_if(UserId(1), TierState::Normal, &tier1)
            .unwrap());
        let reloaded = AccountStore::open(data.join("accounts.json")).unwrap();
        assert_eq!(
            reloaded.get_user_account(UserId(1)).unwrap().tier_state(),
            TierState::Tier1Activated
        );
    }

    #[test]
    fn test_duplicate_thresholds_rejected_on_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("accounts.json");
        let snapshot = StoreSnapshot {
            users: vec![user(1, "alice")],
            thresholds: vec![
                ControlThresholds::new(UserId(1), 3, 6),
                ControlThresholds::new(UserId(1), 4, 8),
            ],
        };
        fs::write(&path, serde_json::to_string(&snapshot).unwrap()).unwrap();

        assert!(matches!(
            AccountStore::open(&path),
            Err(PersistenceError::DuplicateThresholds(UserId(1)))
        ));
    }
}
