//! Account repository interface.

use std::sync::Arc;

use riskctl_core::{Capability, ControlThresholds, FlagUpdate, TierState, UserAccount, UserId};

use crate::error::PersistenceResult;

/// Per-user flags, counters and thresholds.
///
/// Every write is a narrow update of one user record. `update_flags_if`
/// is the strongly-consistent read-then-write used for tier transitions.
pub trait AccountRepository: Send + Sync {
    /// Users eligible for a job requiring `capability`, ordered by id.
    fn eligible_users(&self, capability: Capability) -> PersistenceResult<Vec<UserAccount>>;

    fn get_user_account(&self, id: UserId) -> PersistenceResult<UserAccount>;

    fn find_by_username(&self, username: &str) -> PersistenceResult<Option<UserAccount>>;

    fn thresholds_for(&self, id: UserId) -> PersistenceResult<Option<ControlThresholds>>;

    /// Apply `update` unconditionally and return the new record.
    fn update_flags(&self, id: UserId, update: &FlagUpdate) -> PersistenceResult<UserAccount>;

    /// Apply `update` only if the user's tier state still equals `expected`.
    ///
    /// Returns `false` without writing when the state moved on.
    fn update_flags_if(
        &self,
        id: UserId,
        expected: TierState,
        update: &FlagUpdate,
    ) -> PersistenceResult<bool>;

    /// Session-open reset of every active user. Returns the number reset.
    fn reset_all_active_users(&self) -> PersistenceResult<usize>;

    /// Restore every tier2 limit to its default. Returns the number of records reset.
    fn reset_tier2_limits(&self) -> PersistenceResult<usize>;
}

/// Arc wrapper for AccountRepository trait objects.
pub type DynAccountRepository = Arc<dyn AccountRepository>;
