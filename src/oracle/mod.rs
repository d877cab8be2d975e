//! Price oracle: rate acquisition, caching and cross-instance locking

pub mod lock;

pub use lock::{FetchLock, LOCK_TIMEOUT, LockAttempt};

use crate::core::price::{PriceSnapshot, RateFeed, now_ms};
use crate::core::store::{PRICE_CACHE_KEY, PRICE_UPDATE_KEY, SharedStore};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// How often a foreign lock is re-checked before giving up on this cycle.
pub const LOCK_RETRY_BUDGET: u32 = 3;
pub const LOCK_RETRY_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A usable rate was adopted, from cache, primary or fallback.
    Updated,
    /// Nothing usable could be acquired; the previous snapshot stands.
    Unchanged,
}

pub struct PriceOracle {
    store: Arc<dyn SharedStore>,
    primary: Arc<dyn RateFeed>,
    fallback: Arc<dyn RateFeed>,
    refresh_interval: Duration,
    current: Option<PriceSnapshot>,
}

impl PriceOracle {
    pub fn new(
        store: Arc<dyn SharedStore>,
        primary: Arc<dyn RateFeed>,
        fallback: Arc<dyn RateFeed>,
        refresh_interval: Duration,
    ) -> Self {
        Self {
            store,
            primary,
            fallback,
            refresh_interval,
            current: None,
        }
    }

    /// Last known good snapshot, possibly stale. Never blocks.
    pub fn current_price(&self) -> Option<PriceSnapshot> {
        self.current
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Takes effect on the next refresh cycle.
    pub fn set_refresh_interval(&mut self, interval: Duration) {
        self.refresh_interval = interval;
    }

    /// Acquire a usable rate: cache first, then the network behind the
    /// advisory lock, then the fallback feed.
    pub async fn refresh(&mut self) -> RefreshOutcome {
        let now = now_ms();
        if let Some(snap) = self.load_cached() {
            if !snap.is_stale(now, self.refresh_interval) {
                debug!("Adopting fresh cached BTC price: {}", snap.price);
                self.current = Some(snap);
                return RefreshOutcome::Updated;
            }
            // Keep a stale snapshot as last-known-good while we try for a
            // fresher one; callers may still render with it.
            if self.current.is_none() {
                self.current = Some(snap);
            }
        }

        let mut retries_left = LOCK_RETRY_BUDGET;
        let guard = loop {
            match FetchLock::try_acquire(&self.store, now_ms()) {
                LockAttempt::Acquired(guard) => break guard,
                LockAttempt::HeldElsewhere => {
                    if retries_left == 0 {
                        debug!("Fetch lock never cleared; keeping previous snapshot");
                        return RefreshOutcome::Unchanged;
                    }
                    retries_left -= 1;
                    // Another instance is fetching. Wait for its cache write
                    // instead of issuing a request of our own.
                    tokio::time::sleep(LOCK_RETRY_DELAY).await;
                    let now = now_ms();
                    if let Some(snap) = self.load_cached() {
                        if !snap.is_stale(now, self.refresh_interval) {
                            debug!("Adopting BTC price fetched by another instance");
                            self.current = Some(snap);
                            return RefreshOutcome::Updated;
                        }
                    }
                }
            }
        };

        let outcome = self.fetch_and_adopt().await;
        drop(guard);
        outcome
    }

    /// Cached snapshot, or `None` after discarding a corrupt entry.
    fn load_cached(&self) -> Option<PriceSnapshot> {
        let raw = self.store.get(PRICE_CACHE_KEY)?;
        match serde_json::from_str::<PriceSnapshot>(&raw) {
            Ok(snap) if snap.price.is_finite() && snap.price > 0.0 => Some(snap),
            Ok(snap) => {
                warn!("Discarding cached snapshot with invalid price: {}", snap.price);
                self.store.remove(PRICE_CACHE_KEY);
                None
            }
            Err(e) => {
                warn!("Discarding corrupt price cache entry: {}", e);
                self.store.remove(PRICE_CACHE_KEY);
                None
            }
        }
    }

    async fn fetch_and_adopt(&mut self) -> RefreshOutcome {
        match self.primary.fetch_rate().await {
            Ok(rate) => {
                let snap = PriceSnapshot::new(rate, now_ms());
                self.persist(&snap);
                debug!("Updated BTC price from primary feed: {}", rate);
                self.current = Some(snap);
                RefreshOutcome::Updated
            }
            Err(e) => {
                warn!("Primary feed failed: {:#}. Trying fallback", e);
                self.fetch_fallback().await
            }
        }
    }

    async fn fetch_fallback(&mut self) -> RefreshOutcome {
        match self.fallback.fetch_rate().await {
            Ok(rate) => {
                // Lower confidence than the primary feed: adopted for
                // rendering but not persisted as an authoritative cache entry.
                debug!("Using fallback feed price: {}", rate);
                self.current = Some(PriceSnapshot::new(rate, now_ms()));
                RefreshOutcome::Updated
            }
            Err(e) => {
                warn!("Fallback feed failed: {:#}. Keeping previous snapshot", e);
                RefreshOutcome::Unchanged
            }
        }
    }

    fn persist(&self, snap: &PriceSnapshot) {
        match serde_json::to_string(snap) {
            Ok(payload) => self.store.set(PRICE_CACHE_KEY, &payload),
            Err(e) => warn!("Failed to serialize price snapshot: {}", e),
        }
        let update = json!({ "price": snap.price, "timestamp": snap.timestamp });
        self.store.set(PRICE_UPDATE_KEY, &update.to_string());
    }
}
