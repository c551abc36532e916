//! Wacast - Campaign dispatch service entry point

use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use wacast_common::config::Config;
use wacast_core::{CampaignManager, CloudApiClient, DispatchWorker, QueueManager, WebhookReconciler};
use wacast_storage::db::DatabasePool;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    info!("Starting Wacast dispatch service...");

    // Load configuration
    let config = Config::load()?;

    // Initialize database
    let db_pool = DatabasePool::new(&config.database).await?;

    // Run migrations
    db_pool.migrate().await?;

    // Provider client
    let provider = Arc::new(CloudApiClient::new(&config.provider)?);

    // Campaign manager: aggregate refresh and completion checking,
    // shared by both update paths
    let campaign_manager = Arc::new(CampaignManager::new(
        db_pool.clone(),
        config.worker.max_retries,
    ));

    // Dispatch worker and webhook reconciler
    let dispatch_worker = Arc::new(DispatchWorker::new(
        db_pool.clone(),
        provider,
        campaign_manager.clone(),
        config.worker.max_retries,
        config.worker.retry_base_secs,
    ));
    let reconciler = Arc::new(WebhookReconciler::new(
        db_pool.clone(),
        campaign_manager.clone(),
    ));

    // Queue processor
    let queue_manager = Arc::new(QueueManager::new(
        db_pool,
        dispatch_worker,
        reconciler,
        config.worker.clone(),
    ));

    let queue_handle = {
        let queue_manager = queue_manager.clone();
        tokio::spawn(async move {
            queue_manager.run().await;
        })
    };

    info!("Wacast dispatch service started");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    queue_handle.abort();

    info!("Wacast dispatch service shutdown complete");

    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,wacast=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_level(true))
        .with(filter)
        .init();
}
