pub mod config_cmd;
pub mod once_cmd;
pub mod output;
pub mod renderer;
pub mod state_cmd;
pub mod watch_cmd;

use anyhow::Result;
use std::sync::Arc;

use crate::core::config::AppConfig;
use crate::core::notifier::CommandNotifier;
use crate::core::source::ClaudeWebSource;
use crate::core::state::StateStore;
use crate::core::tracker::{TrackerMode, UsageTracker};

/// Wire the claude.ai source and command notifier into a tracker.
pub fn build_tracker(
    config: &AppConfig,
    store: StateStore,
    mode: TrackerMode,
) -> Result<Arc<UsageTracker>> {
    let issues = config.validate();
    if !issues.is_empty() {
        anyhow::bail!(
            "Invalid config at {}:\n  - {}",
            AppConfig::config_path().display(),
            issues.join("\n  - ")
        );
    }
    let source = ClaudeWebSource::from_config(config)?;
    let notifier = CommandNotifier::from_config(&config.notify);
    Ok(UsageTracker::with_mode(
        Arc::new(source),
        Arc::new(notifier),
        store,
        config.notify.message.clone(),
        mode,
    ))
}
