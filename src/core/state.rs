use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Session usage below this right after a rollover triggers the
/// "quota available again" notification.
pub const ROLLOVER_LOW_USAGE_PERCENT: f64 = 10.0;
/// Session usage at or above this schedules a notification for the reset.
pub const EXHAUSTION_PERCENT: f64 = 95.0;

/// Scalar state that survives restarts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackerState {
    #[serde(default)]
    pub org_id: Option<String>,
    #[serde(default)]
    pub notified_for_current_window: bool,
    #[serde(default)]
    pub last_seen_reset_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notification_target: Option<String>,
}

/// What the tracker has to do after observing a session window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionDecision {
    /// A rollover was seen with near-zero usage; notify right away.
    pub fire_reset_now: bool,
    /// The session window differs from the last one seen.
    pub window_changed: bool,
    /// Deliver the reset notification after this delay.
    pub schedule_in: Option<Duration>,
    /// The state must be persisted.
    pub state_changed: bool,
}

impl TrackerState {
    /// Apply one session observation: rollover detection, then exhaustion
    /// scheduling. The flag check-and-set happens here, so callers holding
    /// the state lock get the one-notification-per-window guarantee.
    pub fn observe_session(
        &mut self,
        percent: f64,
        reset_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> SessionDecision {
        let mut decision = SessionDecision::default();

        // A reset time disappearing counts too: the endpoint reports none
        // once a window has lapsed and no new one has started.
        if self.last_seen_reset_at != reset_at {
            decision.window_changed = true;
            decision.fire_reset_now =
                self.last_seen_reset_at.is_some() && percent < ROLLOVER_LOW_USAGE_PERCENT;
            self.last_seen_reset_at = reset_at;
            self.notified_for_current_window = false;
            decision.state_changed = true;
        }

        if percent >= EXHAUSTION_PERCENT && !self.notified_for_current_window {
            if let Some(reset_at) = reset_at {
                self.notified_for_current_window = true;
                decision.state_changed = true;
                let delay = reset_at - now;
                if delay > Duration::zero() {
                    decision.schedule_in = Some(delay);
                }
            }
        }

        decision
    }
}

/// Default state file location, respecting XDG_STATE_HOME.
pub fn default_state_path() -> PathBuf {
    let base = std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("~"))
                .join(".local")
                .join("state")
        });
    base.join("quotawatch").join("state.json")
}

/// Reads and writes the [`TrackerState`] file.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the state, treating a missing or unreadable file as empty.
    pub fn load(&self) -> TrackerState {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return TrackerState::default(),
            Err(e) => {
                tracing::warn!("Failed to read state file {}: {}", self.path.display(), e);
                return TrackerState::default();
            }
        };
        match serde_json::from_str(&content) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(
                    "Ignoring corrupt state file {}: {}",
                    self.path.display(),
                    e
                );
                TrackerState::default()
            }
        }
    }

    /// Overwrite the state file with `state`.
    pub fn save(&self, state: &TrackerState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create state directory: {}", parent.display())
            })?;
        }
        let json = serde_json::to_string_pretty(state).context("Failed to serialize state")?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write state to {}", self.path.display()))?;
        Ok(())
    }
}
