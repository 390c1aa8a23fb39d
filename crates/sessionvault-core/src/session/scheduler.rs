//! Periodic keep-alive re-save.
//!
//! Saving refreshes `lastValidation`, so a running process keeps its security
//! metadata inside the staleness window. The first tick fires one interval
//! after start; failures are logged and the schedule continues.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::store::SessionStore;

/// Shortest accepted tick period; shorter intervals are raised to it.
const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Background task that calls [`SessionStore::refresh`] on a fixed interval.
pub struct ValidationScheduler {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ValidationScheduler {
    /// Start ticking every `interval` against `store`.
    pub fn start(store: SessionStore, interval: Duration) -> Self {
        let interval = interval.max(MIN_INTERVAL);
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_secs = interval.as_secs(), "Validation scheduler started");

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        match store.refresh().await {
                            Ok(true) => debug!("Periodic session validation saved"),
                            Ok(false) => debug!("No active session; skipping periodic validation"),
                            Err(e) => warn!(error = %e, "Periodic session validation failed"),
                        }
                    }
                }
            }
            info!("Validation scheduler stopped");
        });

        Self {
            cancel,
            handle: Some(handle),
        }
    }

    /// Signal the task to stop without waiting for it.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop and wait for an in-flight tick to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for ValidationScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::session::testing::{ScriptStripper, service_with};
    use crate::storage::memory::MemoryKeyValueStore;

    const FIVE_MINUTES: Duration = Duration::from_secs(300);

    async fn started() -> (SessionStore, Arc<MemoryKeyValueStore>) {
        let backing = Arc::new(MemoryKeyValueStore::new());
        let store = SessionStore::spawn(service_with(backing.clone(), Arc::new(ScriptStripper)), 8);
        store.initialize().await;
        (store, backing)
    }

    fn access_count(store: &SessionStore) -> u64 {
        store.security_metadata().map(|m| m.access_count).unwrap_or(0)
    }

    /// Let spawned tasks run until `store` reaches `expected` saves.
    async fn wait_for_count(store: &SessionStore, expected: u64) {
        for _ in 0..100 {
            if access_count(store) >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_refresh_the_session() {
        let (store, _backing) = started().await;
        assert_eq!(access_count(&store), 1);

        let scheduler = ValidationScheduler::start(store.clone(), FIVE_MINUTES);
        tokio::time::sleep(FIVE_MINUTES + Duration::from_secs(1)).await;
        wait_for_count(&store, 2).await;
        assert_eq!(access_count(&store), 2);

        tokio::time::sleep(FIVE_MINUTES).await;
        wait_for_count(&store, 3).await;
        assert_eq!(access_count(&store), 3);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_tick_before_first_interval() {
        let (store, _backing) = started().await;
        let scheduler = ValidationScheduler::start(store.clone(), FIVE_MINUTES);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(access_count(&store), 1);
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_tick_does_not_stop_schedule() {
        let (store, backing) = started().await;
        let scheduler = ValidationScheduler::start(store.clone(), FIVE_MINUTES);

        backing.set_fail_writes(true);
        tokio::time::sleep(FIVE_MINUTES + Duration::from_secs(1)).await;
        assert!(scheduler.is_running());

        backing.set_fail_writes(false);
        tokio::time::sleep(FIVE_MINUTES).await;
        wait_for_count(&store, 2).await;
        assert_eq!(access_count(&store), 2);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_is_clamped() {
        let (store, _backing) = started().await;
        let scheduler = ValidationScheduler::start(store.clone(), Duration::ZERO);

        tokio::time::sleep(MIN_INTERVAL + Duration::from_millis(500)).await;
        wait_for_count(&store, 2).await;
        assert!(scheduler.is_running());
        assert!(access_count(&store) >= 2);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_prevents_further_ticks() {
        let (store, _backing) = started().await;
        let scheduler = ValidationScheduler::start(store.clone(), FIVE_MINUTES);
        scheduler.stop();
        tokio::time::sleep(FIVE_MINUTES * 3).await;
        assert_eq!(access_count(&store), 1);
        assert!(!scheduler.is_running());
    }
}
