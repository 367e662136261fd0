mod config;
mod errors;
mod models;
mod provider;
mod routes;
mod scoring;
mod state;
mod tasks;

use anyhow::Result;
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::routes::build_router;
use crate::state::AppState;
use crate::tasks::TaskManager;

const RETENTION_SWEEP_INTERVAL_SECS: u64 = 60;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails fast on malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Scoring API v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Providers configured: openai={}, gemini={}",
        config.openai_api_key.is_some(),
        config.gemini_api_key.is_some()
    );

    // Initialize the task manager and its retention sweeper
    let tasks = TaskManager::new(config.credentials(), config.scoring_options());
    tasks.spawn_retention_sweeper(
        Duration::from_secs(config.task_ttl_secs),
        Duration::from_secs(RETENTION_SWEEP_INTERVAL_SECS),
    );
    info!(
        "Task manager initialized (batch_size={}, concurrency={}, ttl={}s)",
        config.batch_size, config.max_concurrent_batches, config.task_ttl_secs
    );

    // Build app state
    let state = AppState { tasks };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
