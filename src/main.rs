//! Tipster CLI entry point.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tipster::cli::{commands, Cli, Commands};
use tipster::config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_path = cli
        .config
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(Settings::default_config_path);
    let settings = Settings::load_from(Some(&config_path))?;

    // Initialize logging; -v flags override general.log_level
    let log_level = match cli.verbose {
        0 => settings.general.log_level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| format!("tipster={},tower_http={}", log_level, log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    std::fs::create_dir_all(settings.data_dir())?;

    // Execute command
    match &cli.command {
        Commands::Serve { host, port } => {
            commands::run_serve(host.clone(), *port, settings).await?;
        }

        Commands::Analyze { url, user } => {
            commands::run_analyze(url, user, settings).await?;
        }

        Commands::AnalyzeChannel { channel_id, user } => {
            commands::run_analyze_channel(channel_id, user, settings).await?;
        }

        Commands::History { email } => {
            commands::run_history(email, settings).await?;
        }

        Commands::User { action } => {
            commands::run_user(action, settings).await?;
        }

        Commands::Videos { channel_id } => {
            commands::run_videos(channel_id, settings).await?;
        }

        Commands::Stocks { action } => {
            commands::run_stocks(action, settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(action, settings, config_path)?;
        }
    }

    Ok(())
}
