//! Advisory fetch lock shared through the store
//!
//! The lock is a cooperative hint, not an atomic primitive: two instances can
//! both observe "no lock" in a narrow window and both fetch. That costs a
//! duplicate network call, never corruption, since the final cache write is
//! last-write-wins.

use crate::core::store::{FETCH_LOCK_KEY, SharedStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A lock older than this is abandoned and may be overridden.
pub const LOCK_TIMEOUT: Duration = Duration::from_secs(30);

pub enum LockAttempt {
    Acquired(FetchLock),
    HeldElsewhere,
}

/// Holds the advisory lock for the duration of a fetch attempt.
///
/// Dropping the guard removes the lock entry, so release happens on every
/// exit path of the owning scope.
pub struct FetchLock {
    store: Arc<dyn SharedStore>,
}

impl FetchLock {
    pub fn try_acquire(store: &Arc<dyn SharedStore>, now_ms: i64) -> LockAttempt {
        if let Some(raw) = store.get(FETCH_LOCK_KEY) {
            match raw.parse::<i64>() {
                Ok(acquired_at) if now_ms - acquired_at < LOCK_TIMEOUT.as_millis() as i64 => {
                    debug!("Another instance holds the fetch lock");
                    return LockAttempt::HeldElsewhere;
                }
                Ok(acquired_at) => {
                    debug!(
                        "Overriding abandoned fetch lock from {} ms ago",
                        now_ms - acquired_at
                    );
                }
                Err(e) => debug!("Discarding unparseable fetch lock value: {}", e),
            }
        }

        store.set(FETCH_LOCK_KEY, &now_ms.to_string());
        LockAttempt::Acquired(FetchLock {
            store: Arc::clone(store),
        })
    }
}

impl Drop for FetchLock {
    fn drop(&mut self) {
        self.store.remove(FETCH_LOCK_KEY);
        debug!("Released fetch lock");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::price::now_ms;
    use crate::store::MemoryStore;

    fn store() -> Arc<dyn SharedStore> {
        Arc::new(MemoryStore::new())
    }

    #[test]
    fn test_acquire_when_absent() {
        let store = store();
        let now = now_ms();

        let attempt = FetchLock::try_acquire(&store, now);
        assert!(matches!(attempt, LockAttempt::Acquired(_)));
        assert_eq!(store.get(FETCH_LOCK_KEY), Some(now.to_string()));
    }

    #[test]
    fn test_fresh_lock_is_respected() {
        let store = store();
        let now = now_ms();
        store.set(FETCH_LOCK_KEY, &(now - 1_000).to_string());

        let attempt = FetchLock::try_acquire(&store, now);
        assert!(matches!(attempt, LockAttempt::HeldElsewhere));
        // The foreign lock entry is left untouched
        assert_eq!(store.get(FETCH_LOCK_KEY), Some((now - 1_000).to_string()));
    }

    #[test]
    fn test_abandoned_lock_is_overridden() {
        let store = store();
        let now = now_ms();
        let stale = now - LOCK_TIMEOUT.as_millis() as i64 - 1;
        store.set(FETCH_LOCK_KEY, &stale.to_string());

        let attempt = FetchLock::try_acquire(&store, now);
        assert!(matches!(attempt, LockAttempt::Acquired(_)));
        assert_eq!(store.get(FETCH_LOCK_KEY), Some(now.to_string()));
    }

    #[test]
    fn test_unparseable_lock_is_overridden() {
        let store = store();
        let now = now_ms();
        store.set(FETCH_LOCK_KEY, "not-a-timestamp");

        let attempt = FetchLock::try_acquire(&store, now);
        assert!(matches!(attempt, LockAttempt::Acquired(_)));
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let store = store();

        let attempt = FetchLock::try_acquire(&store, now_ms());
        let LockAttempt::Acquired(guard) = attempt else {
            panic!("expected to acquire");
        };
        assert!(store.get(FETCH_LOCK_KEY).is_some());

        drop(guard);
        assert!(store.get(FETCH_LOCK_KEY).is_none());
    }
}
