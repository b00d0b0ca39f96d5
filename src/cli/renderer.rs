use chrono::{DateTime, Utc};
use colored::{control, ColoredString, Colorize};

use crate::core::formatter::{format_percent, format_reset_countdown, format_usage_bar};
use crate::core::pace::Pace;
use crate::core::tracker::{TrackerView, WindowView};

const BAR_WIDTH: usize = 20;

/// Render the tracker view as a colored (or plain) block.
///
/// Layout:
/// ```text
///  Claude usage
///   Session  42% [████████|░░░░░░░░░░░] on pace (expected 40%)
///            Resets 14:05, in 2h 15m
///   Weekly   61% [████████████░░░|░░░░] ahead of pace (expected 48%)
///            Resets 05/01 17:00, in 3d 4h
///   Updated at 11:50
/// ```
pub fn render_view(view: &TrackerView, now: DateTime<Utc>, use_color: bool) -> String {
    control::set_override(use_color);

    let mut lines: Vec<String> = Vec::new();
    lines.push(" Claude usage".bold().to_string());

    render_window(&mut lines, &view.session, now);
    render_window(&mut lines, &view.weekly, now);

    lines.push(format!("  {}", view.status.dimmed()));
    lines.join("\n")
}

/// One-line failure notice printed by `once` when the fetch fails.
pub fn render_failure(message: &str, use_color: bool) -> String {
    control::set_override(use_color);
    format!("  {}", message.red())
}

fn render_window(lines: &mut Vec<String>, window: &WindowView, now: DateTime<Utc>) {
    let percent_str = format!("{:>4}", format_percent(window.percent_used));
    let bar_str = format_usage_bar(window.percent_used, window.expected_percent, BAR_WIDTH);

    let pace_str = match window.expected_percent {
        Some(expected) => format!("{} (expected {})", window.pace, format_percent(expected)),
        None => String::new(),
    };

    let padded_label = format!("{:<7}", window.kind.label());
    lines.push(
        format!(
            "  {} {} {} {}",
            padded_label.cyan(),
            color_by_pace(window.pace, &percent_str),
            color_by_pace(window.pace, &bar_str),
            pace_str.dimmed()
        )
        .trim_end()
        .to_string(),
    );

    if let (Some(local), Some(reset_at)) = (&window.reset_at_local, &window.reset_at) {
        let countdown = format_reset_countdown(reset_at, now);
        let reset_line = format!(
            "Resets {}, {}",
            local,
            countdown.trim_start_matches("Resets ")
        );
        // Align under the percent column.
        lines.push(format!("           {}", reset_line.dimmed()));
    }
}

fn color_by_pace(pace: Pace, text: &str) -> ColoredString {
    match pace {
        Pace::Nominal => text.green(),
        Pace::Warning => text.yellow(),
        Pace::Critical => text.red(),
    }
}
