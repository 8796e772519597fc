//! Per-user exclusivity for balance-affecting operations.
//!
//! SQLite has no row-level locks, so the read-check-write sequence of each
//! operation is serialized in-process: every user id maps to its own async
//! mutex, and an operation locks all users it touches before opening its
//! database transaction. Ids are always locked in ascending order, which keeps
//! two opposite-direction transfers (A to B and B to A) from deadlocking.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Table of per-user mutexes shared by every clone of a [`crate::core::balance::Ledger`].
///
/// Entries are never pruned, so the table holds one small mutex per user ever
/// locked and grows with the registered user base, not with traffic.
#[derive(Clone, Debug, Default)]
pub struct UserLocks {
    inner: Arc<DashMap<i64, Arc<Mutex<()>>>>,
}

/// Exclusive hold on a set of users, released on drop.
#[derive(Debug)]
pub struct UserGuard {
    user_ids: Vec<i64>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl UserGuard {
    /// Users held by this guard, in lock order.
    #[must_use]
    pub fn user_ids(&self) -> &[i64] {
        &self.user_ids
    }
}

impl UserLocks {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks every user in `user_ids`, waiting for any holder to finish.
    ///
    /// Duplicates are collapsed and locks are taken in ascending id order
    /// regardless of the order given.
    pub async fn acquire(&self, user_ids: &[i64]) -> UserGuard {
        let mut ordered = user_ids.to_vec();
        ordered.sort_unstable();
        ordered.dedup();

        let mut guards = Vec::with_capacity(ordered.len());
        for user_id in &ordered {
            // The map entry must not be held across the await below
            let mutex = Arc::clone(self.inner.entry(*user_id).or_default().value());
            guards.push(mutex.lock_owned().await);
        }
        debug!(user_ids = ?ordered, "Acquired user locks");

        UserGuard {
            user_ids: ordered,
            _guards: guards,
        }
    }

    /// Number of users that have ever been locked.
    #[must_use]
    pub fn tracked_users(&self) -> usize {
        self.inner.len()
    }
}
