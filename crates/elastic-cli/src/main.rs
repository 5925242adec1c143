use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use elastic_core::ElasticConfig;

mod commands;

#[derive(Parser)]
#[command(name = "elastic-bounce")]
#[command(author, version, about = "Replay touch gestures against the elastic bounce engine")]
struct Cli {
    /// Config file to use instead of ~/.config/elastic-bounce/config.toml
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON gesture script frame by frame
    Simulate {
        /// Path to the gesture script
        script: PathBuf,
        /// Pace frames at the configured interval instead of printing at once
        #[arg(long)]
        realtime: bool,
        /// Print the full report as JSON
        #[arg(long, conflicts_with = "realtime")]
        json: bool,
    },
    /// Compute the scale produced by a single drag
    Stretch {
        /// Drag distance in pixels (negative drags upward)
        #[arg(short = 'd', long, allow_hyphen_values = true)]
        distance: f64,
        /// Container height in pixels
        #[arg(long)]
        height: Option<f64>,
        /// Override the configured resistance
        #[arg(long)]
        resistance: Option<f64>,
        /// Override the configured maximum stretch
        #[arg(long)]
        max_stretch: Option<f64>,
    },
    /// Inspect or create the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the config file location
    Path,
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => ElasticConfig::load_from(path)?,
        None => ElasticConfig::load()?,
    };

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.general.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Commands::Simulate {
            script,
            realtime,
            json,
        } => commands::simulate::run(&config, &script, realtime, json).await,
        Commands::Stretch {
            distance,
            height,
            resistance,
            max_stretch,
        } => commands::stretch::run(&config, distance, height, resistance, max_stretch),
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show(&config),
            ConfigAction::Path => commands::config::path(),
            ConfigAction::Init { force } => commands::config::init(force),
        },
    }
}
