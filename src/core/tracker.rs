//! The usage tracker: applies fetched snapshots, keeps pacing baselines
//! fresh, and decides when the reset notification goes out.
//!
//! All mutable state sits behind one lock that is never held across an
//! `.await`. Fetches are serialized with an in-flight flag; presentation
//! code observes the tracker through [`TrackerEvent`]s.

use chrono::{DateTime, Local, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::core::error::FetchError;
use crate::core::formatter::{format_reset_local, format_updated_at};
use crate::core::models::usage::{UsageSnapshot, UsageWindow, WindowKind, Windows};
use crate::core::notifier::Notifier;
use crate::core::pace::{classify_pace, Pace};
use crate::core::source::UsageSource;
use crate::core::state::{StateStore, TrackerState};

const EVENT_CAPACITY: usize = 16;

/// Per-window values handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowView {
    pub kind: WindowKind,
    pub percent_used: f64,
    pub reset_at: Option<DateTime<Utc>>,
    pub reset_at_local: Option<String>,
    pub expected_percent: Option<f64>,
    pub pace: Pace,
}

impl From<&UsageWindow> for WindowView {
    fn from(window: &UsageWindow) -> Self {
        Self {
            kind: window.kind,
            percent_used: window.percent_used,
            reset_at: window.reset_at,
            reset_at_local: window
                .reset_at
                .as_ref()
                .map(|r| format_reset_local(window.kind, r)),
            expected_percent: window.expected_percent,
            pace: classify_pace(window.percent_used, window.expected_percent),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackerView {
    pub session: WindowView,
    pub weekly: WindowView,
    /// "Updated at HH:MM" or the last error message
    pub status: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    FetchStarted,
    UsageUpdated(TrackerView),
    PaceRecomputed(TrackerView),
    FetchFailed { message: String },
}

/// Whether snapshots run the notification rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerMode {
    /// Rollover detection, scheduling and delivery.
    Full,
    /// Windows and pacing only; notification state is left untouched.
    ObserveOnly,
}

struct PendingNotification {
    reset_at: DateTime<Utc>,
    handle: JoinHandle<()>,
}

struct Inner {
    state: TrackerState,
    windows: Windows,
    status: String,
    pending: Option<PendingNotification>,
}

impl Inner {
    fn view(&self) -> TrackerView {
        TrackerView {
            session: WindowView::from(&self.windows.session),
            weekly: WindowView::from(&self.windows.weekly),
            status: self.status.clone(),
        }
    }
}

/// Clears the in-flight flag when dropped, so an aborted or failed fetch
/// never blocks later refreshes.
struct FetchPermit<'a>(&'a AtomicBool);

impl<'a> FetchPermit<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for FetchPermit<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct UsageTracker {
    source: Arc<dyn UsageSource>,
    notifier: Arc<dyn Notifier>,
    store: StateStore,
    message: String,
    mode: TrackerMode,
    inner: Mutex<Inner>,
    in_flight: AtomicBool,
    events: broadcast::Sender<TrackerEvent>,
}

impl UsageTracker {
    /// Build a tracker, loading persisted state from `store`.
    pub fn new(
        source: Arc<dyn UsageSource>,
        notifier: Arc<dyn Notifier>,
        store: StateStore,
        message: impl Into<String>,
    ) -> Arc<Self> {
        Self::with_mode(source, notifier, store, message, TrackerMode::Full)
    }

    pub fn with_mode(
        source: Arc<dyn UsageSource>,
        notifier: Arc<dyn Notifier>,
        store: StateStore,
        message: impl Into<String>,
        mode: TrackerMode,
    ) -> Arc<Self> {
        let state = store.load();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self {
            source,
            notifier,
            store,
            message: message.into(),
            mode,
            inner: Mutex::new(Inner {
                state,
                windows: Windows::default(),
                status: "Loading…".to_string(),
                pending: None,
            }),
            in_flight: AtomicBool::new(false),
            events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.events.subscribe()
    }

    pub fn view(&self) -> TrackerView {
        self.inner.lock().view()
    }

    pub fn state(&self) -> TrackerState {
        self.inner.lock().state.clone()
    }

    /// Reset timestamp of the window a notification is waiting on, if any.
    pub fn pending_notification(&self) -> Option<DateTime<Utc>> {
        self.inner
            .lock()
            .pending
            .as_ref()
            .filter(|p| !p.handle.is_finished())
            .map(|p| p.reset_at)
    }

    /// Start a background fetch. Returns `false` when one is already running.
    pub fn refresh(self: &Arc<Self>) -> bool {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Refresh skipped: fetch already in flight");
            return false;
        }
        let tracker = Arc::clone(self);
        tokio::spawn(async move {
            // Takes over the flag set above.
            let _permit = FetchPermit(&tracker.in_flight);
            // Failures are already reported through the event channel.
            let _ = tracker.fetch_cycle().await;
        });
        true
    }

    /// Fetch and apply in the caller's task. `None` when a fetch is already
    /// running.
    pub async fn refresh_and_wait(&self) -> Option<Result<TrackerView, FetchError>> {
        let Some(_permit) = FetchPermit::acquire(&self.in_flight) else {
            tracing::debug!("Refresh skipped: fetch already in flight");
            return None;
        };
        Some(self.fetch_cycle().await)
    }

    async fn fetch_cycle(&self) -> Result<TrackerView, FetchError> {
        self.inner.lock().status = "Refreshing…".to_string();
        self.emit(TrackerEvent::FetchStarted);

        match self.fetch_snapshot().await {
            Ok(snapshot) => Ok(self.apply_usage_snapshot(snapshot)),
            Err(err) => {
                tracing::warn!("Usage fetch failed: {}", err);
                let message = err.status_message();
                self.inner.lock().status = message.clone();
                self.emit(TrackerEvent::FetchFailed { message });
                Err(err)
            }
        }
    }

    async fn fetch_snapshot(&self) -> Result<UsageSnapshot, FetchError> {
        let cached = self.inner.lock().state.org_id.clone();
        let org_id = match cached {
            Some(id) => id,
            None => {
                let id = self.source.resolve_org_id().await?;
                tracing::info!("Resolved organization {}", id);
                let mut inner = self.inner.lock();
                inner.state.org_id = Some(id.clone());
                self.persist(&inner.state);
                id
            }
        };
        self.source.fetch_usage(&org_id).await
    }

    /// Must be called from within a tokio runtime: notifications are
    /// delivered on spawned tasks.
    pub fn apply_usage_snapshot(&self, snapshot: UsageSnapshot) -> TrackerView {
        self.apply_usage_snapshot_at(snapshot, Utc::now())
    }

    /// Store a snapshot, re-derive pacing, and run the notification rules
    /// as of `now`. In [`TrackerMode::Full`] this spawns tasks, so it needs
    /// a tokio runtime.
    pub fn apply_usage_snapshot_at(&self, snapshot: UsageSnapshot, now: DateTime<Utc>) -> TrackerView {
        let view = {
            let mut inner = self.inner.lock();
            inner.windows.update(&snapshot, now);

            if self.mode == TrackerMode::Full {
                self.run_notification_rules(&mut inner, &snapshot, now);
            }

            inner.status = format_updated_at(&now.with_timezone(&Local));
            inner.view()
        };

        tracing::info!(
            "Usage updated: session {:.0}%, weekly {:.0}%",
            view.session.percent_used,
            view.weekly.percent_used
        );
        self.emit(TrackerEvent::UsageUpdated(view.clone()));
        view
    }

    fn run_notification_rules(&self, inner: &mut Inner, snapshot: &UsageSnapshot, now: DateTime<Utc>) {
        let decision = inner.state.observe_session(
            snapshot.session_percent,
            snapshot.session_reset_at,
            now,
        );
        if decision.state_changed {
            self.persist(&inner.state);
        }

        // Set when the previous window's scheduled notice is already due,
        // so it covers this rollover.
        let mut stale_delivering = false;
        if decision.window_changed {
            if let Some(stale) = inner.pending.take() {
                if stale.reset_at > now {
                    tracing::info!(
                        "Session window changed, cancelling notification for {}",
                        stale.reset_at
                    );
                    stale.handle.abort();
                } else {
                    stale_delivering = true;
                }
            }
        }

        let target = inner.state.notification_target.clone();
        if decision.fire_reset_now {
            if stale_delivering {
                tracing::debug!("Rollover already announced by the scheduled notification");
            } else {
                tracing::info!("Session window rolled over, sending notification");
                self.spawn_delivery(target.clone(), None);
            }
        }

        if let (Some(delay), Some(reset_at)) = (decision.schedule_in, snapshot.session_reset_at) {
            tracing::info!(
                "Session usage at {:.0}%, notification scheduled for {}",
                snapshot.session_percent,
                reset_at
            );
            let handle = self.spawn_delivery(target, Some(delay.to_std().unwrap_or_default()));
            inner.pending = Some(PendingNotification { reset_at, handle });
        }
    }

    pub fn recompute_expected(&self) -> TrackerView {
        self.recompute_expected_at(Utc::now())
    }

    /// Re-derive pacing baselines from stored reset times only.
    pub fn recompute_expected_at(&self, now: DateTime<Utc>) -> TrackerView {
        let view = {
            let mut inner = self.inner.lock();
            inner.windows.recompute_expected(now);
            inner.view()
        };
        self.emit(TrackerEvent::PaceRecomputed(view.clone()));
        view
    }

    fn spawn_delivery(
        &self,
        target: Option<String>,
        delay: Option<std::time::Duration>,
    ) -> JoinHandle<()> {
        let notifier = Arc::clone(&self.notifier);
        let message = self.message.clone();
        tokio::spawn(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let Some(target) = target else {
                tracing::warn!("No notification target set, skipping notification");
                return;
            };
            match notifier.notify(&target, &message).await {
                Ok(()) => tracing::info!("Notification sent to {}", target),
                Err(e) => tracing::warn!("Notification to {} failed: {:#}", target, e),
            }
        })
    }

    fn persist(&self, state: &TrackerState) {
        if let Err(e) = self.store.save(state) {
            tracing::warn!("Failed to persist tracker state: {:#}", e);
        }
    }

    fn emit(&self, event: TrackerEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
