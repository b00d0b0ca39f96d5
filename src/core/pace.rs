use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

const PACE_TOLERANCE: f64 = 5.0;
const ABSOLUTE_CRITICAL: f64 = 90.0;
const ABSOLUTE_WARNING: f64 = 70.0;

/// How a window's consumption compares to its linear pace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pace {
    Nominal,
    Warning,
    Critical,
}

impl std::fmt::Display for Pace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nominal => write!(f, "on pace"),
            Self::Warning => write!(f, "behind pace"),
            Self::Critical => write!(f, "ahead of pace"),
        }
    }
}

/// Percentage of the window elapsed at `now`, clamped to [0, 100].
///
/// The window is assumed to have started exactly `duration` before
/// `reset_at`.
pub fn expected_percent(reset_at: DateTime<Utc>, duration: Duration, now: DateTime<Utc>) -> f64 {
    let total_ms = duration.num_milliseconds();
    if total_ms <= 0 {
        return 100.0;
    }
    let started_at = reset_at - duration;
    let elapsed_ms = (now - started_at).num_milliseconds();
    (elapsed_ms as f64 / total_ms as f64 * 100.0).clamp(0.0, 100.0)
}

/// Classify usage against its pacing baseline.
///
/// Without a baseline, fixed thresholds apply. With one, being more than
/// five points ahead is critical and more than five points behind is a
/// warning.
pub fn classify_pace(percent_used: f64, expected_percent: Option<f64>) -> Pace {
    match expected_percent {
        None => {
            if percent_used >= ABSOLUTE_CRITICAL {
                Pace::Critical
            } else if percent_used >= ABSOLUTE_WARNING {
                Pace::Warning
            } else {
                Pace::Nominal
            }
        }
        Some(expected) => {
            let diff = percent_used - expected;
            if diff > PACE_TOLERANCE {
                Pace::Critical
            } else if diff < -PACE_TOLERANCE {
                Pace::Warning
            } else {
                Pace::Nominal
            }
        }
    }
}
