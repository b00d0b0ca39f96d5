mod cli;
mod core;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::core::config::AppConfig;
use crate::core::state::{default_state_path, StateStore};

#[derive(Parser)]
#[command(name = "qw", about = "Claude quota pacing monitor", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Output format
    #[arg(short, long, global = true)]
    format: Option<String>,

    /// Shorthand for --format json
    #[arg(short = 'j', long = "json", global = true)]
    json: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    /// Verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// State file path (default: $XDG_STATE_HOME/quotawatch/state.json)
    #[arg(long, global = true)]
    state: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll usage continuously and send reset notifications
    Watch,
    /// Fetch usage once and print it
    Once,
    /// Inspect or edit persisted state
    State {
        #[command(subcommand)]
        action: StateAction,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum StateAction {
    /// Print the persisted state
    Show,
    /// Clear the notification flags for the current window
    Reset,
    /// Set the address notifications are sent to
    SetTarget {
        /// Address passed to the notification command
        address: String,
    },
    /// Remove the notification address
    ClearTarget,
    /// Forget the cached organization identifier
    ClearOrg,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Generate default config file
    Init,
    /// Validate config file
    Check,
    /// Print the effective configuration
    Show,
}

fn setup_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("qw=debug")
        } else {
            EnvFilter::new("qw=info")
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("{}, using defaults", e);
            AppConfig::default()
        }
    };

    let output_opts = cli::output::OutputOptions {
        format: cli::output::OutputFormat::resolve(
            cli.json,
            cli.format.as_deref(),
            &config.settings.default_format,
        ),
        pretty: cli.pretty,
        use_color: cli::output::detect_color(!cli.no_color, &config.settings.color),
    };

    let store = StateStore::new(cli.state.unwrap_or_else(default_state_path));

    match cli.command {
        None | Some(Commands::Watch) => cli::watch_cmd::run(&config, store, &output_opts).await?,
        Some(Commands::Once) => cli::once_cmd::run(&config, store, &output_opts).await?,
        Some(Commands::State { action }) => match action {
            StateAction::Show => cli::state_cmd::show(&store, &output_opts)?,
            StateAction::Reset => cli::state_cmd::reset(&store)?,
            StateAction::SetTarget { address } => cli::state_cmd::set_target(&store, &address)?,
            StateAction::ClearTarget => cli::state_cmd::clear_target(&store)?,
            StateAction::ClearOrg => cli::state_cmd::clear_org(&store)?,
        },
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init => cli::config_cmd::init(&output_opts)?,
            ConfigAction::Check => cli::config_cmd::check(&output_opts)?,
            ConfigAction::Show => cli::config_cmd::show(&output_opts)?,
        },
    }

    Ok(())
}
