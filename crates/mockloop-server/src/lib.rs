//! HTTP surface of the MockLoop code execution service.
//!
//! Routes:
//! - `POST /api/code/execute`: run a snippet plus test cases in a sandboxed process
//! - `POST /api/code/validate`: parse-only syntax check
//! - `GET /health`: liveness and deployment labels

pub mod config;
pub mod error;
pub mod routes;

pub use config::ServerConfig;
pub use error::ApiError;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use mockloop_exec::Executor;
use tower_http::trace::TraceLayer;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub executor: Arc<Executor>,
    pub app_name: Arc<str>,
    pub environment: Arc<str>,
}

impl AppState {
    pub fn new(executor: Executor, app_name: &str, environment: &str) -> Self {
        Self {
            executor: Arc::new(executor),
            app_name: Arc::from(app_name),
            environment: Arc::from(environment),
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(
            Executor::new(config.execution_settings()),
            &config.app_name,
            &config.environment,
        )
    }
}

/// The code-execution route group, mounted under `/api/code`.
pub fn code_routes() -> Router<AppState> {
    Router::new()
        .route("/execute", post(routes::execute_code))
        .route("/validate", post(routes::validate_code))
}

/// Build the full router with tracing and CORS for `frontend_origins`.
pub fn build_router(state: AppState, frontend_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(routes::healthcheck))
        .nest("/api/code", code_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(config::cors_layer(frontend_origins))
}

/// Resolves when the process receives Ctrl-C.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("failed to install Ctrl-C handler: {e}");
        std::future::pending::<()>().await;
    }
    log::info!("shutdown signal received");
}
