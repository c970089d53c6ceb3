/// vidshare - content-sharing backend
///
/// Accounts with rotating sessions, owned videos, comments, tweets and
/// playlists, plus race-safe likes and subscriptions.

mod account;
mod api;
mod auth;
mod config;
mod content;
mod context;
mod db;
mod error;
mod listing;
mod metrics;
mod rate_limit;
mod relationship;
mod server;

use anyhow::Context;
use config::ServerConfig;
use context::AppContext;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = ServerConfig::from_env().context("failed to load configuration")?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_new(&config.logging.level)
                .unwrap_or_else(|_| "vidshare=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("vidshare v{}", config.service.version);

    // Create application context
    let ctx = AppContext::new(config)
        .await
        .context("failed to initialise application context")?;

    // Start server
    server::serve(ctx).await?;

    Ok(())
}
