use anyhow::{Context, Result};
use kr_realty_backend::api::{router, AppState};
use kr_realty_backend::config::Config;
use kr_realty_backend::ingestion::pipeline::FeedService;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("Starting realty feed API server");

    let config = Config::from_env()?;
    let service = Arc::new(FeedService::from_config(&config)?);
    info!("Batch policy: {:?}", config.pipeline.batch_policy);

    let app = router(AppState::new(service));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("Server running on http://{}", config.bind_addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
