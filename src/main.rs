//! Lekt CLI entry point.

use anyhow::Result;
use clap::Parser;
use lekt::cli::{commands, Cli, Commands};
use lekt::config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let settings = match &cli.config {
        Some(path) => Settings::load_from(Some(&std::path::PathBuf::from(path)))?,
        None => Settings::load()?,
    };

    // Initialize logging; -v flags win over the configured level
    let log_level = match cli.verbose {
        0 => settings.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("lekt={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    // Ensure data directory exists
    std::fs::create_dir_all(settings.data_dir())?;

    // Execute command
    match &cli.command {
        Commands::Doctor => {
            commands::run_doctor(&settings)?;
        }

        Commands::Class { action } => {
            commands::run_class(action, settings).await?;
        }

        Commands::Session { action } => {
            commands::run_session(action, settings).await?;
        }

        Commands::Summarize {
            class_id,
            session_id,
            regenerate,
        } => {
            commands::run_summarize(class_id, session_id, *regenerate, settings).await?;
        }

        Commands::Ask {
            class_id,
            session_id,
            question,
        } => {
            commands::run_ask(class_id, session_id, question, settings).await?;
        }

        Commands::AskAll { class_id, question } => {
            commands::run_ask_all(class_id, question, settings).await?;
        }

        Commands::AskClasses { question, classes } => {
            commands::run_ask_classes(classes, question, settings).await?;
        }

        Commands::Settings { action } => {
            commands::run_settings(action, &settings)?;
        }

        Commands::Serve { host, port } => {
            commands::run_serve(host.clone(), *port, settings).await?;
        }
    }

    Ok(())
}
