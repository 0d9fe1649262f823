//! Application setup and server lifecycle.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header::CONTENT_TYPE, Method},
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::server::routes::{health_handler, status_handler, upload_handler};
use crate::upstream::OcrClient;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RelayConfig>,
    pub client: Arc<OcrClient>,
}

impl AppState {
    pub fn new(config: RelayConfig) -> Result<Self, RelayError> {
        let client = OcrClient::new(&config)?;
        Ok(Self {
            config: Arc::new(config),
            client: Arc::new(client),
        })
    }
}

/// Build the axum router for the relay.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE]);

    // Multipart bodies count the whole form, not just the file part.
    let body_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);

    Router::new()
        .route("/api/upload", post(upload_handler))
        .route("/api/status", get(status_handler))
        .route("/health", get(health_handler))
        .layer(body_limit)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `config.bind_addr` and serve until Ctrl-C.
pub async fn serve(config: RelayConfig) -> Result<(), RelayError> {
    let addr = config.bind_addr;
    let state = AppState::new(config)?;
    let app = build_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| RelayError::Internal(format!("Failed to bind {addr}: {e}")))?;
    let local = listener
        .local_addr()
        .map_err(|e| RelayError::Internal(e.to_string()))?;
    info!("Relay listening on http://{}", local);
    info!("Upload:  POST http://{}/api/upload", local);
    info!("Status:  GET  http://{}/api/status?job_id=…", local);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| RelayError::Internal(format!("Server error: {e}")))?;

    info!("Relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
