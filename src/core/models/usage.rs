use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::core::pace;

/// The two quota categories reported by claude.ai.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowKind {
    Session,
    Weekly,
}

impl WindowKind {
    /// Fixed length of the quota window.
    pub fn duration(&self) -> Duration {
        match self {
            Self::Session => Duration::hours(5),
            Self::Weekly => Duration::days(7),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Session => "Session",
            Self::Weekly => "Weekly",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageWindow {
    pub kind: WindowKind,
    /// Percentage of the quota used (0.0 - 100.0)
    pub percent_used: f64,
    /// When the window resets
    pub reset_at: Option<DateTime<Utc>>,
    /// Usage expected at this point if consumption were linear over the window
    pub expected_percent: Option<f64>,
}

impl UsageWindow {
    pub fn empty(kind: WindowKind) -> Self {
        Self {
            kind,
            percent_used: 0.0,
            reset_at: None,
            expected_percent: None,
        }
    }

    /// Overwrite the reported values and re-derive the pacing baseline.
    pub fn set(&mut self, percent_used: f64, reset_at: Option<DateTime<Utc>>, now: DateTime<Utc>) {
        self.percent_used = percent_used;
        self.reset_at = reset_at;
        self.recompute_expected(now);
    }

    pub fn recompute_expected(&mut self, now: DateTime<Utc>) {
        self.expected_percent = self
            .reset_at
            .map(|reset_at| pace::expected_percent(reset_at, self.kind.duration(), now));
    }
}

/// One fetch worth of usage data, already normalized to percentages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    #[serde(default)]
    pub session_percent: f64,
    #[serde(default)]
    pub session_reset_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub weekly_percent: f64,
    #[serde(default)]
    pub weekly_reset_at: Option<DateTime<Utc>>,
}

/// Last-known session and weekly windows.
#[derive(Debug, Clone, PartialEq)]
pub struct Windows {
    pub session: UsageWindow,
    pub weekly: UsageWindow,
}

impl Default for Windows {
    fn default() -> Self {
        Self {
            session: UsageWindow::empty(WindowKind::Session),
            weekly: UsageWindow::empty(WindowKind::Weekly),
        }
    }
}

impl Windows {
    pub fn update(&mut self, snapshot: &UsageSnapshot, now: DateTime<Utc>) {
        self.session
            .set(snapshot.session_percent, snapshot.session_reset_at, now);
        self.weekly
            .set(snapshot.weekly_percent, snapshot.weekly_reset_at, now);
    }

    pub fn recompute_expected(&mut self, now: DateTime<Utc>) {
        self.session.recompute_expected(now);
        self.weekly.recompute_expected(now);
    }
}
