/// Server setup and initialization
///
/// Starts the workflow engine, builds the Axum router around it and runs the
/// HTTP server until Ctrl-C, then shuts the engine down.

use crate::{
    api::{create_webhook_routes, create_workflow_routes, AppState},
    config::Config,
    runtime::WorkflowEngine,
};
use anyhow::{Context, Result};
use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Build the application router around a running engine
pub fn create_app(engine: Arc<WorkflowEngine>) -> Router {
    let state = AppState { engine };

    Router::new()
        // Health check endpoint
        .route("/healthz", get(health_check))
        // Workflow, job and queue API
        .merge(create_workflow_routes())
        // Inbound webhook calls
        .merge(create_webhook_routes())
        .with_state(state)
}

/// Start the engine and serve HTTP on the configured address
pub async fn start_server(config: Config) -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("RUNWAY_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    tracing::info!("Starting Runway server...");

    let engine = Arc::new(
        WorkflowEngine::start(&config)
            .await
            .context("Failed to start workflow engine")?,
    );
    let app = create_app(Arc::clone(&engine));

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {bind_addr}"))?;

    tracing::info!("Server listening on http://{}", bind_addr);

    let served = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // Drain the engine even if the server loop failed
    engine.shutdown().await.context("Failed to shut down workflow engine")?;
    served?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("❌ Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("🛑 Shutdown signal received");
}

async fn health_check() -> &'static str {
    "ok"
}
