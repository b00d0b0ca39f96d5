use anyhow::Result;

use crate::cli::output::{OutputFormat, OutputOptions};
use crate::core::state::{StateStore, TrackerState};

// These edit the state file directly; stop any running `qw watch` first or
// its next write will overwrite the change.

pub fn show(store: &StateStore, opts: &OutputOptions) -> Result<()> {
    let state = store.load();
    match opts.format {
        OutputFormat::Json => {
            let json = if opts.pretty {
                serde_json::to_string_pretty(&state)?
            } else {
                serde_json::to_string(&state)?
            };
            println!("{}", json);
        }
        OutputFormat::Text => println!("{}", describe(store, &state)),
    }
    Ok(())
}

/// Forget the notification bookkeeping, keeping the cached organization and
/// the target address.
pub fn reset(store: &StateStore) -> Result<()> {
    let mut state = store.load();
    state.notified_for_current_window = false;
    state.last_seen_reset_at = None;
    store.save(&state)?;
    println!("Notification state reset in {}", store.path().display());
    Ok(())
}

pub fn set_target(store: &StateStore, address: &str) -> Result<()> {
    let address = address.trim();
    if address.is_empty() {
        anyhow::bail!("Notification target must not be empty");
    }
    let mut state = store.load();
    state.notification_target = Some(address.to_string());
    store.save(&state)?;
    println!("Notification target set to {}", address);
    Ok(())
}

pub fn clear_target(store: &StateStore) -> Result<()> {
    let mut state = store.load();
    state.notification_target = None;
    store.save(&state)?;
    println!("Notification target cleared");
    Ok(())
}

pub fn clear_org(store: &StateStore) -> Result<()> {
    let mut state = store.load();
    state.org_id = None;
    store.save(&state)?;
    println!("Cached organization cleared; it will be resolved on the next fetch");
    Ok(())
}

fn describe(store: &StateStore, state: &TrackerState) -> String {
    let or_unset = |v: Option<String>| v.unwrap_or_else(|| "(unset)".to_string());
    [
        format!("State file      {}", store.path().display()),
        format!("Organization    {}", or_unset(state.org_id.clone())),
        format!("Target          {}", or_unset(state.notification_target.clone())),
        format!(
            "Last reset seen {}",
            or_unset(state.last_seen_reset_at.map(|r| r.to_rfc3339()))
        ),
        format!(
            "Notified        {}",
            if state.notified_for_current_window { "yes" } else { "no" }
        ),
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn store_with(state: &TrackerState) -> (tempfile::TempDir, StateStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        store.save(state).unwrap();
        (dir, store)
    }

    fn full_state() -> TrackerState {
        TrackerState {
            org_id: Some("org-1".into()),
            notified_for_current_window: true,
            last_seen_reset_at: Some(Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()),
            notification_target: Some("+15550100".into()),
        }
    }

    #[test]
    fn reset_keeps_org_and_target() {
        let (_dir, store) = store_with(&full_state());
        reset(&store).unwrap();
        let state = store.load();
        assert!(!state.notified_for_current_window);
        assert!(state.last_seen_reset_at.is_none());
        assert_eq!(state.org_id.as_deref(), Some("org-1"));
        assert_eq!(state.notification_target.as_deref(), Some("+15550100"));
    }

    #[test]
    fn set_target_trims_and_persists() {
        let (_dir, store) = store_with(&TrackerState::default());
        set_target(&store, "  +15550199 ").unwrap();
        assert_eq!(store.load().notification_target.as_deref(), Some("+15550199"));
    }

    #[test]
    fn set_target_rejects_blank() {
        let (_dir, store) = store_with(&TrackerState::default());
        assert!(set_target(&store, "   ").is_err());
    }

    #[test]
    fn clear_org_and_target() {
        let (_dir, store) = store_with(&full_state());
        clear_org(&store).unwrap();
        clear_target(&store).unwrap();
        let state = store.load();
        assert!(state.org_id.is_none());
        assert!(state.notification_target.is_none());
        assert!(state.notified_for_current_window);
    }

    #[test]
    fn describe_lists_unset_fields() {
        let (_dir, store) = store_with(&TrackerState::default());
        let text = describe(&store, &store.load());
        assert!(text.contains("Organization    (unset)"));
        assert!(text.contains("Notified        no"));
    }
}
