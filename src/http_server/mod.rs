//! HTTP server module

mod auth;
mod deliveries;
mod error;
mod feed;
mod signals;
mod status;

use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json, Router, middleware,
    response::IntoResponse,
    routing::{get, post},
};
pub use error::ApiError;
use serde_json::json;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::{
    config::AppConfig,
    context::AppMetrics,
    engine::{
        dispatcher::DispatchFanOut, feed::FeedQueryService, read_tracker::ReadTracker,
        signal_processor::SignalProcessor,
    },
    persistence::StateRepository,
};

/// Errors that prevent the server from starting or keep it from serving.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The configured listen address does not parse.
    #[error("Invalid server.listen_address '{0}'")]
    InvalidAddress(String),

    /// Binding or serving failed.
    #[error("Server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct ApiState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Repository for direct reads such as delivery counts.
    pub repo: Arc<dyn StateRepository>,
    /// Counters reported by `/status`.
    pub app_metrics: AppMetrics,
    /// Subscriber feed queries.
    pub feed: Arc<FeedQueryService>,
    /// Mark-read requests.
    pub read_tracker: Arc<ReadTracker>,
    /// Pushed signals go through the same pipeline as polled ones.
    pub processor: Arc<SignalProcessor>,
    /// Delivery callbacks.
    pub dispatcher: Arc<DispatchFanOut>,
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Builds the router. Write and operator endpoints sit behind the bearer key
/// check.
pub fn router(state: ApiState) -> Router {
    let protected = Router::new()
        .route("/signals", post(signals::ingest_signal))
        .route("/deliveries/confirm", post(deliveries::confirm_delivery))
        .route("/alerts/{id}/deliveries", get(deliveries::alert_deliveries))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::auth));

    Router::new()
        .route("/health", get(health))
        .route("/status", get(status::status))
        .route("/subscribers/{id}/feed", get(feed::get_feed))
        .route("/subscribers/{id}/alerts/{alert_id}/read", post(feed::mark_read))
        .merge(protected)
        .with_state(state)
}

/// Runs the HTTP server until `cancellation_token` is cancelled.
pub async fn run_server_from_config(
    state: ApiState,
    cancellation_token: CancellationToken,
) -> Result<(), ServerError> {
    let listen_address = state.config.server.listen_address.clone();
    let addr: SocketAddr =
        listen_address.parse().map_err(|_| ServerError::InvalidAddress(listen_address.clone()))?;

    if state.config.server.api_key.is_none() {
        tracing::warn!("No API key configured. Write endpoints will reject every request.");
    }

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "HTTP server listening.");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(cancellation_token.cancelled_owned())
        .await?;
    tracing::info!("HTTP server stopped.");
    Ok(())
}
