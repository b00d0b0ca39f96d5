use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::core::tracker::UsageTracker;

/// Drives a tracker on two cadences: fetches on `fetch_interval` and
/// pacing recomputation on `pace_interval`.
pub struct Poller {
    tracker: Arc<UsageTracker>,
    fetch_interval: Duration,
    pace_interval: Duration,
}

impl Poller {
    pub fn new(tracker: Arc<UsageTracker>, fetch_interval: Duration, pace_interval: Duration) -> Self {
        Self {
            tracker,
            fetch_interval,
            pace_interval,
        }
    }

    /// Run until `shutdown` flips to true. The first fetch happens right away.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut fetch_tick = tokio::time::interval(self.fetch_interval);
        fetch_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Start one full period in so the pace tick doesn't race the first fetch.
        let mut pace_tick = tokio::time::interval_at(
            tokio::time::Instant::now() + self.pace_interval,
            self.pace_interval,
        );
        pace_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            "Polling every {:?}, pacing every {:?}",
            self.fetch_interval,
            self.pace_interval
        );

        loop {
            tokio::select! {
                _ = fetch_tick.tick() => {
                    self.tracker.refresh();
                }
                _ = pace_tick.tick() => {
                    self.tracker.recompute_expected();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("Poller stopping");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::FetchError;
    use crate::core::models::usage::UsageSnapshot;
    use crate::core::notifier::Notifier;
    use crate::core::source::UsageSource;
    use crate::core::state::StateStore;
    use crate::core::tracker::TrackerEvent;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::broadcast::error::TryRecvError;

    #[derive(Default)]
    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl UsageSource for CountingSource {
        async fn resolve_org_id(&self) -> Result<String, FetchError> {
            Ok("org".to_string())
        }

        async fn fetch_usage(&self, _org_id: &str) -> Result<UsageSnapshot, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(UsageSnapshot::default())
        }
    }

    struct SilentNotifier;

    #[async_trait]
    impl Notifier for SilentNotifier {
        async fn notify(&self, _target: &str, _message: &str) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn poller_fetches_and_recomputes_until_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(CountingSource::default());
        let tracker = UsageTracker::new(
            source.clone(),
            Arc::new(SilentNotifier),
            StateStore::new(dir.path().join("state.json")),
            "msg",
        );
        let mut events = tracker.subscribe();
        let (tx, rx) = watch::channel(false);

        let poller = Poller::new(
            tracker,
            Duration::from_millis(50),
            Duration::from_millis(30),
        );
        let handle = tokio::spawn(poller.run(rx));

        tokio::time::sleep(Duration::from_millis(180)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert!(source.calls.load(Ordering::SeqCst) >= 2);
        let mut recomputed = 0;
        loop {
            match events.try_recv() {
                Ok(TrackerEvent::PaceRecomputed(_)) => recomputed += 1,
                Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        assert!(recomputed >= 1);
    }
}
