use chrono::{DateTime, Local, TimeZone, Utc};
use std::fmt::Display;

use crate::core::models::usage::WindowKind;

/// Returns "{used}%" rounded to the nearest integer.
pub fn format_percent(used_percent: f64) -> String {
    format!("{:.0}%", used_percent.clamp(0.0, 100.0))
}

/// Reset time in the caller's zone: "HH:MM" for the session window,
/// "dd/mm HH:MM" for the weekly one.
pub fn format_reset_time<Tz>(kind: WindowKind, resets_at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    match kind {
        WindowKind::Session => resets_at.format("%H:%M").to_string(),
        WindowKind::Weekly => resets_at.format("%d/%m %H:%M").to_string(),
    }
}

pub fn format_reset_local(kind: WindowKind, resets_at: &DateTime<Utc>) -> String {
    format_reset_time(kind, &resets_at.with_timezone(&Local))
}

/// Returns "Resets in Xh Ym" relative to `now`. If past, returns "Resets now".
/// If more than 24 hours away, includes days.
pub fn format_reset_countdown(resets_at: &DateTime<Utc>, now: DateTime<Utc>) -> String {
    let total_seconds = (*resets_at - now).num_seconds();

    if total_seconds <= 0 {
        return "Resets now".to_string();
    }

    let total_minutes = total_seconds / 60;
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;

    if hours >= 24 {
        let days = hours / 24;
        let remaining_hours = hours % 24;
        if remaining_hours == 0 {
            format!("Resets in {}d", days)
        } else {
            format!("Resets in {}d {}h", days, remaining_hours)
        }
    } else if hours > 0 {
        format!("Resets in {}h {}m", hours, minutes)
    } else {
        format!("Resets in {}m", total_minutes.max(1))
    }
}

/// Returns "[████░░░░░░░░]" where █ = used portion, ░ = remaining portion,
/// with a "|" marker at the expected pace position when known.
pub fn format_usage_bar(used_percent: f64, expected_percent: Option<f64>, width: usize) -> String {
    let used_percent = used_percent.clamp(0.0, 100.0);
    let used_blocks = ((used_percent / 100.0) * width as f64).round() as usize;

    let mut cells: Vec<char> = (0..width)
        .map(|i| if i < used_blocks { '█' } else { '░' })
        .collect();

    if let Some(expected) = expected_percent {
        let pos = ((expected.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
        if width > 0 {
            cells[pos.min(width - 1)] = '|';
        }
    }

    format!("[{}]", cells.into_iter().collect::<String>())
}

/// Status line shown after a successful refresh.
pub fn format_updated_at<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    format!("Updated at {}", at.format("%H:%M"))
}
