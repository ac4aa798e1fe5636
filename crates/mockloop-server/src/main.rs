//! MockLoop code execution server.

use anyhow::{Context, Result};
use clap::Parser;
use log::LevelFilter;
use mockloop_server::{build_router, shutdown_signal, AppState, ServerConfig};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::parse();

    let log_level_filter = config.log_level.parse().unwrap_or(LevelFilter::Info);
    env_logger::Builder::new()
        .filter_level(log_level_filter)
        .init();

    log::info!("Starting {} ({})", config.app_name, config.environment);
    let settings = config.execution_settings();
    log::info!(
        "Sandbox: interpreter={} timeout={}s scratch_dir={} max_concurrent={}",
        settings.interpreter.display(),
        config.timeout_secs,
        settings.scratch_dir.display(),
        settings
            .max_concurrent
            .map_or_else(|| "unbounded".to_string(), |n| n.to_string())
    );
    if settings.max_concurrent.is_none() {
        log::warn!("no limit on concurrent sandboxed processes; set MOCKLOOP_MAX_CONCURRENT to bound it");
    }

    let state = AppState::from_config(&config);
    let router = build_router(state, &config.frontend_origins);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;
    log::info!("Listening on http://{}", config.bind_addr);
    log::info!("Health check: http://{}/health", config.bind_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    log::info!("{} shutdown complete", config.app_name);
    Ok(())
}
