//! Speakeasy CLI entry point.

use anyhow::Result;
use clap::Parser;
use speakeasy::cli::{commands, Cli, Commands};
use speakeasy::config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let settings = match &cli.config {
        Some(path) => Settings::load_from(Some(&std::path::PathBuf::from(path)))?,
        None => Settings::load()?,
    };

    // Initialize logging: -v flags win, then RUST_LOG, then the config file
    let log_level = match cli.verbose {
        0 => settings.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = if cli.verbose == 0 {
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("speakeasy={}", log_level))
    } else {
        format!("speakeasy={}", log_level)
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    std::fs::create_dir_all(settings.temp_dir())?;

    // Execute command
    match &cli.command {
        Commands::Analyze {
            video,
            audio,
            transcript,
            duration,
            purpose,
            output,
        } => {
            commands::run_analyze(
                video,
                audio,
                transcript,
                *duration,
                purpose,
                output.clone(),
                settings,
            )
            .await?;
        }

        Commands::Serve { host, port } => {
            commands::run_serve(host, *port, settings).await?;
        }

        Commands::Doctor => {
            commands::run_doctor(&settings)?;
        }

        Commands::Config { action } => {
            commands::run_config(action, &settings)?;
        }
    }

    Ok(())
}
