//! Gymmando CLI entry point.

use anyhow::Result;
use clap::Parser;
use gymmando::cli::{commands, AppContext, Cli, Commands};
use gymmando::config::Settings;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_path = match &cli.config {
        Some(path) => Settings::expand_path(path),
        None => Settings::default_config_path(),
    };
    let mut settings = Settings::load_from(Some(&config_path))?;

    // Initialize logging; stdout is reserved for answers
    let log_level = match cli.verbose {
        0 => settings.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("gymmando={}", log_level)),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    if settings.general.load_dotenv {
        match dotenvy::dotenv() {
            Ok(path) => debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e.into()),
        }
    }

    if let Some(backend) = cli.backend {
        if backend != settings.chat.backend {
            // A model name for one backend means nothing to another
            settings.chat.model.clear();
        }
        settings.chat.backend = backend;
    }
    if let Some(model) = &cli.model {
        settings.chat.model = model.clone();
    }

    let ctx = AppContext::new(settings, config_path)?;

    // Execute command
    match &cli.command {
        Commands::Ask { provider, query } => {
            commands::run_ask(provider, query, &ctx).await?;
        }

        Commands::Chat { provider } => {
            commands::run_chat(provider, &ctx).await?;
        }

        Commands::Tools { provider } => {
            commands::run_tools(provider, &ctx).await?;
        }

        Commands::Providers => {
            commands::run_providers(&ctx)?;
        }

        Commands::Ping => {
            commands::run_ping(&ctx).await?;
        }

        Commands::Doctor => {
            commands::run_doctor(&ctx)?;
        }

        Commands::Config { action } => {
            commands::run_config(action, &ctx)?;
        }
    }

    Ok(())
}
