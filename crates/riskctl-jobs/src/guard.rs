//! Per-user in-flight guard.
//!
//! Overlapping instances of one job must not act on the same user at
//! the same time (two instances seeing the same fresh BUY would place
//! two stop-losses). The first instance to claim `(job, user)` wins;
//! the claim is released when its guard drops.

use std::fmt;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use riskctl_core::UserId;

/// Which job holds a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    OrderCount,
    QuickExit,
    AutoStopLoss,
    AccountLogger,
    OrderHistory,
    Operator,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrderCount => "order_count",
            Self::QuickExit => "quick_exit",
            Self::AutoStopLoss => "auto_stop_loss",
            Self::AccountLogger => "account_logger",
            Self::OrderHistory => "order_history",
            Self::Operator => "operator",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type Claims = DashMap<(JobKind, UserId), ()>;

/// Shared set of `(job, user)` claims.
#[derive(Debug, Clone, Default)]
pub struct InFlightRegistry {
    claims: Arc<Claims>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `user` for `kind`, or `None` if another instance holds it.
    #[must_use]
    pub fn try_acquire(&self, kind: JobKind, user: UserId) -> Option<InFlightGuard> {
        match self.claims.entry((kind, user)) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(());
                Some(InFlightGuard {
                    claims: Arc::clone(&self.claims),
                    key: (kind, user),
                })
            }
        }
    }

    pub fn is_held(&self, kind: JobKind, user: UserId) -> bool {
        self.claims.contains_key(&(kind, user))
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}

/// Releases the claim on drop.
#[derive(Debug)]
pub struct InFlightGuard {
    claims: Arc<Claims>,
    key: (JobKind, UserId),
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.claims.remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_is_exclusive_per_job_and_user() {
        let registry = InFlightRegistry::new();
        let guard = registry.try_acquire(JobKind::AutoStopLoss, UserId(1));
        assert!(guard.is_some());
        assert!(registry
            .try_acquire(JobKind::AutoStopLoss, UserId(1))
            .is_none());

        // Other users and other jobs are unaffected.
        assert!(registry
            .try_acquire(JobKind::AutoStopLoss, UserId(2))
            .is_some());
        assert!(registry.try_acquire(JobKind::QuickExit, UserId(1)).is_some());
    }

    #[test]
    fn test_claim_released_on_drop() {
        let registry = InFlightRegistry::new();
        {
            let _guard = registry.try_acquire(JobKind::OrderCount, UserId(7)).unwrap();
            assert!(registry.is_held(JobKind::OrderCount, UserId(7)));
        }
        assert!(!registry.is_held(JobKind::OrderCount, UserId(7)));
        assert!(registry.is_empty());
    }
}
