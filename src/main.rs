use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use listing_watch::config::Config;
use listing_watch::database::Database;
use listing_watch::fetcher::build_fetcher;
use listing_watch::monitor::{Monitor, MonitorSettings};
use listing_watch::notifier::build_notifier;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting listing watch monitor");

    let config = Config::from_env()?;
    let database = Arc::new(Database::new(&config.database_url, config.max_sites).await?);
    let fetcher = build_fetcher(&config)?;
    let notifier = build_notifier(config.telegram_token.as_deref())?;

    let monitor = Monitor::new(
        database.clone(),
        database,
        fetcher,
        notifier,
        MonitorSettings::from(&config),
    );

    // First cycle runs immediately, then every POLL_INTERVAL_SECS
    monitor.run().await;

    Ok(())
}
