// status-gateway-rs/src/main.rs
// Status gateway: resilient aggregation of the processing service's status,
// progress, statistics and logs for the UI.

use std::sync::Arc;

use anyhow::Context;
use config_rs::GatewayConfig;
use status_gateway::{logging, router, AppState, Upstream, UpstreamClient, RetryingUpstream, START_TIME};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GatewayConfig::from_env().context("Failed to load gateway configuration")?;
    logging::init_logging(&config.logging)?;

    let _ = *START_TIME;

    let client = UpstreamClient::new(config.upstream_url.clone())?;
    let upstream: Arc<dyn Upstream> = if config.retry.max_retries > 0 {
        tracing::info!(
            max_retries = config.retry.max_retries,
            initial_backoff_ms = config.retry.initial_backoff.as_millis() as u64,
            "Upstream retries enabled"
        );
        Arc::new(RetryingUpstream::new(client, config.retry.clone()))
    } else {
        Arc::new(client)
    };

    if !config.admin_guard_enabled() {
        tracing::warn!("No admin identities configured; administrative routes are unguarded");
    }

    let app = router(AppState::from_config(upstream, &config));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;

    tracing::info!(
        addr = %config.bind_addr,
        upstream = %config.upstream_url,
        health_timeout_ms = config.timeouts.health.as_millis() as u64,
        polling_timeout_ms = config.timeouts.polling.as_millis() as u64,
        trigger_timeout_ms = config.timeouts.trigger.as_millis() as u64,
        "Status gateway listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Status gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
