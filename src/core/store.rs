//! Shared persistent store abstraction
//!
//! Every execution context that shares a profile (multiple CLI runs, tests)
//! sees the same cache entry, lock entry and update notification through
//! this interface. Values are read and written as whole strings, never
//! partially mutated.

/// Cached snapshot, JSON `{price, timestamp, version}`.
pub const PRICE_CACHE_KEY: &str = "btc_price_cache";
/// Change notification for other instances, JSON `{price, timestamp}`.
pub const PRICE_UPDATE_KEY: &str = "btc_price_update";
/// Advisory fetch lock, epoch-millis string.
pub const FETCH_LOCK_KEY: &str = "btc_fetch_lock";

/// String key-value store shared across instances.
///
/// Implementations are infallible at this boundary: internal errors degrade
/// to a miss or a dropped write and are logged, matching the recovery rules
/// for corrupt or unavailable storage.
pub trait SharedStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}
