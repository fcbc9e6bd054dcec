//! subtask-suggest - HTTP Server Entry Point
//!
//! Starts the HTTP server that exposes the subtask suggestion API.

use subtask_suggest::{api, config::Config};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "subtask_suggest=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Loaded configuration: provider={}, model={}, ai_enabled={}",
        config.provider,
        config.model,
        config.ai_enabled()
    );

    api::serve(config).await?;

    Ok(())
}
