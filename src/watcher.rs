//! Content mutation watching
//!
//! Client-side re-renders land as bursts of node insertions and removals.
//! The watcher coalesces each burst into a single re-conversion request
//! after a short settle delay, keeping the control flow a linear task queue
//! instead of one pass per mutation record.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::debug;

pub const DEBOUNCE_DELAY: Duration = Duration::from_millis(100);

/// Debounces document mutation notifications for the lifetime of the page.
pub struct ContentWatcher {
    tx: mpsc::UnboundedSender<()>,
}

impl ContentWatcher {
    /// Spawn the debounce task. `on_settle` runs once per coalesced burst.
    /// The task ends when the watcher and all observer handles drop.
    pub fn spawn<F>(on_settle: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        tokio::spawn(async move {
            while rx.recv().await.is_some() {
                // Trailing-edge debounce: absorb everything arriving within
                // the window before firing.
                loop {
                    tokio::select! {
                        _ = sleep(DEBOUNCE_DELAY) => break,
                        more = rx.recv() => {
                            if more.is_none() {
                                return;
                            }
                        }
                    }
                }
                debug!("Content settled; requesting re-conversion");
                on_settle();
            }
        });
        Self { tx }
    }

    /// Handle suitable for registration as a document mutation observer.
    pub fn observer(&self) -> Box<dyn Fn() + Send + Sync> {
        let tx = self.tx.clone();
        Box::new(move || {
            let _ = tx.send(());
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_burst_coalesces_into_one_pass() {
        let passes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&passes);
        let watcher = ContentWatcher::spawn(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let observer = watcher.observer();
        for _ in 0..5 {
            observer();
        }

        sleep(DEBOUNCE_DELAY * 3).await;
        assert_eq!(passes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_bursts_fire_separately() {
        let passes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&passes);
        let watcher = ContentWatcher::spawn(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let observer = watcher.observer();
        observer();
        sleep(DEBOUNCE_DELAY * 3).await;
        assert_eq!(passes.load(Ordering::SeqCst), 1);

        observer();
        observer();
        sleep(DEBOUNCE_DELAY * 3).await;
        assert_eq!(passes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiet_watcher_never_fires() {
        let passes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&passes);
        let _watcher = ContentWatcher::spawn(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        sleep(Duration::from_secs(5)).await;
        assert_eq!(passes.load(Ordering::SeqCst), 0);
    }
}
