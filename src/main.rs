/// Runway: queue-backed workflow execution engine
///
/// Main entry point. Reads configuration from the environment and serves:
/// - Workflow, job and queue API at /api/*
/// - Inbound webhooks at /webhook/{webhookId}
/// - Health check at /healthz

use runway::{config::Config, server::start_server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to 0.0.0.0:3004 and data/runway.db, overridable via RUNWAY_* variables
    let config = Config::default();

    start_server(config).await
}
