//! `vany` binary.

use anyhow::{Context, Result};
use tracing::{error, info};
use vany_runtime::{router, AppState, RuntimeConfig, VanyRuntime};
use vany_telemetry::{init_telemetry, TelemetryConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let telemetry =
        init_telemetry(TelemetryConfig::from_env()).context("Failed to initialize telemetry")?;

    let config = RuntimeConfig::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    info!(?config, "Starting vany");

    let runtime = VanyRuntime::start(&config).context("Failed to start nodes")?;
    let app = router(AppState::from_runtime(&runtime, telemetry.metrics()));

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    info!(addr = %config.listen_addr, "Listening. Press Ctrl+C to stop.");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tokio::task::spawn_blocking(move || runtime.shutdown())
        .await
        .context("Shutdown task panicked")?
        .context("Shutdown failed")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl+C");
    }
    info!("Shutdown signal received");
}
