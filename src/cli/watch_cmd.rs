use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;

use crate::cli::build_tracker;
use crate::cli::output::{OutputFormat, OutputOptions};
use crate::cli::renderer;
use crate::core::config::AppConfig;
use crate::core::poller::Poller;
use crate::core::state::StateStore;
use crate::core::tracker::{TrackerEvent, TrackerMode, TrackerView};

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// One line of `--json` watch output.
#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum EventLine<'a> {
    UsageUpdated { view: &'a TrackerView },
    PaceRecomputed { view: &'a TrackerView },
    FetchFailed { message: &'a str },
}

/// Poll until Ctrl-C, rendering every tracker event.
pub async fn run(config: &AppConfig, store: StateStore, opts: &OutputOptions) -> Result<()> {
    let tracker = build_tracker(config, store, TrackerMode::Full)?;
    let mut events = tracker.subscribe();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller = Poller::new(
        tracker.clone(),
        config.poll.fetch_interval(),
        config.poll.pace_interval(),
    );
    let poller_handle = tokio::spawn(poller.run(shutdown_rx));

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => print_event(&event, &tracker.view(), opts)?,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("Display lagged behind by {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            _ = &mut ctrl_c => {
                tracing::info!("Interrupted");
                break;
            }
        }
    }

    let _ = shutdown_tx.send(true);
    poller_handle.await?;
    Ok(())
}

fn print_event(event: &TrackerEvent, current: &TrackerView, opts: &OutputOptions) -> Result<()> {
    match opts.format {
        OutputFormat::Text => match event {
            TrackerEvent::UsageUpdated(view) | TrackerEvent::PaceRecomputed(view) => {
                if opts.use_color {
                    print!("{}", CLEAR_SCREEN);
                }
                println!("{}\n", renderer::render_view(view, Utc::now(), opts.use_color));
            }
            TrackerEvent::FetchFailed { .. } => {
                // Keep the last good values on screen with the error as status.
                if opts.use_color {
                    print!("{}", CLEAR_SCREEN);
                }
                println!("{}\n", renderer::render_view(current, Utc::now(), opts.use_color));
            }
            TrackerEvent::FetchStarted => {}
        },
        OutputFormat::Json => {
            let line = match event {
                TrackerEvent::UsageUpdated(view) => EventLine::UsageUpdated { view },
                TrackerEvent::PaceRecomputed(view) => EventLine::PaceRecomputed { view },
                TrackerEvent::FetchFailed { message } => EventLine::FetchFailed { message },
                TrackerEvent::FetchStarted => return Ok(()),
            };
            println!("{}", serde_json::to_string(&line)?);
        }
    }
    Ok(())
}
