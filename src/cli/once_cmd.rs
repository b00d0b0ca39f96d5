use anyhow::Result;
use chrono::Utc;

use crate::cli::build_tracker;
use crate::cli::output::{OutputFormat, OutputOptions};
use crate::cli::renderer;
use crate::core::config::AppConfig;
use crate::core::state::StateStore;
use crate::core::tracker::TrackerMode;

/// Fetch once and print the view. Notification state is left to `watch`,
/// since nothing here would stay alive to deliver a scheduled message.
pub async fn run(config: &AppConfig, store: StateStore, opts: &OutputOptions) -> Result<()> {
    let tracker = build_tracker(config, store, TrackerMode::ObserveOnly)?;

    let result = match tracker.refresh_and_wait().await {
        Some(result) => result,
        None => anyhow::bail!("A fetch is already in progress"),
    };

    let view = match result {
        Ok(view) => view,
        Err(e) => {
            let message = e.status_message();
            match opts.format {
                OutputFormat::Text => {
                    eprintln!("{}", renderer::render_failure(&message, opts.use_color))
                }
                OutputFormat::Json => println!("{}", serde_json::json!({ "error": message })),
            }
            tracing::debug!("Fetch error detail: {}", e);
            std::process::exit(1);
        }
    };

    match opts.format {
        OutputFormat::Text => {
            println!("{}", renderer::render_view(&view, Utc::now(), opts.use_color));
        }
        OutputFormat::Json => {
            let json = if opts.pretty {
                serde_json::to_string_pretty(&view)?
            } else {
                serde_json::to_string(&view)?
            };
            println!("{}", json);
        }
    }

    Ok(())
}
