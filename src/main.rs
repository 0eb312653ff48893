use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quake_quick_alert::config::AppConfig;
use quake_quick_alert::credentials::{
    AssertionSigner, CredentialManager, MemoryCredentialStore, TokenApiClient,
};
use quake_quick_alert::dedup::{DedupGate, MemoryMarkerStore};
use quake_quick_alert::dispatch::{Dispatcher, PassthroughAddressResolver, PushClient};
use quake_quick_alert::feed::FeedClient;
use quake_quick_alert::pipeline::{PipelineConfig, QuakePipeline};
use quake_quick_alert::scheduler::PollScheduler;
use quake_quick_alert::subscribers::{MemorySubscriberStore, RecipientResolver};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quake_quick_alert=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;

    // External collaborators, composed explicitly at the entry point.
    let feed = FeedClient::new(&config.feed)?;

    let marker_store = Arc::new(MemoryMarkerStore::new());
    let gate = DedupGate::new(marker_store, config.gate.clone());

    let subscriber_store = Arc::new(match &config.subscribers_file {
        Some(path) => MemorySubscriberStore::from_json_file(path)?,
        None => {
            tracing::warn!("SUBSCRIBERS_FILE not set, starting with no subscribers");
            MemorySubscriberStore::default()
        }
    });
    let resolver = RecipientResolver::new(subscriber_store, config.gate.severity_floor);

    let private_key = std::fs::read(&config.credentials.private_key_path)?;
    let signer = AssertionSigner::new(&config.credentials, &private_key)?;
    let credentials = Arc::new(CredentialManager::new(
        vec![signer],
        Arc::new(TokenApiClient::new(&config.credentials)?),
        Arc::new(MemoryCredentialStore::new()),
        config.credentials.token_ttl,
    ));

    let dispatcher = Dispatcher::new(
        credentials,
        Arc::new(PassthroughAddressResolver),
        Arc::new(PushClient::new(&config.push)?),
        config.dispatch.clone(),
    );

    let pipeline = Arc::new(QuakePipeline::new(
        feed,
        gate,
        resolver,
        dispatcher,
        PipelineConfig {
            feed_code: config.feed.code,
            feed_limit: config.feed.limit,
            feed_offset: config.feed.offset,
        },
    ));

    let scheduler = PollScheduler::new(pipeline, config.scheduler.clone());
    let cancel = CancellationToken::new();

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            shutdown.cancel();
        }
    });

    scheduler.run(cancel).await;
    Ok(())
}
