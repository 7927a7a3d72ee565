//! Represents the `/status` endpoint handler and response structure.
//! Provides application status and metrics.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;

use super::{ApiError, ApiState};
use crate::models::DeliveryState;

/// Represents the response from the `/status` endpoint.
#[derive(Debug, Serialize, Clone)]
pub struct StatusResponse {
    /// The version of the application.
    pub version: String,
    /// The uptime of the application in seconds.
    pub uptime_secs: u64,
    /// Signals that passed validation.
    pub signals_processed: u64,
    /// Alerts stored, including superseding ones.
    pub alerts_created: u64,
    /// Signals dropped inside a cooldown window.
    pub suppressed_signals: u64,
    /// Alerts replaced by a higher severity.
    pub superseded_alerts: u64,
    /// Dedup decisions that lost a race twice.
    pub contention_anomalies: u64,
    /// Attempts in the `failed` state, across restarts.
    pub failed_deliveries: u64,
    /// Attempts that failed terminally since startup.
    pub failed_deliveries_since_start: u64,
    /// Attempts still pending, whether never tried or awaiting a retry.
    pub retry_queue_depth: u64,
}

/// Retrieves application status and metrics.
pub async fn status(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let failed_deliveries = state.repo.count_attempts(DeliveryState::Failed).await?;
    let retry_queue_depth = state.repo.count_attempts(DeliveryState::Pending).await?;
    let metrics = state.app_metrics.snapshot().await;
    let response = StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: metrics.start_time.elapsed().as_secs(),
        signals_processed: metrics.signals_processed,
        alerts_created: metrics.alerts_created,
        suppressed_signals: metrics.suppressed_signals,
        superseded_alerts: metrics.superseded_alerts,
        contention_anomalies: metrics.contention_anomalies,
        failed_deliveries,
        failed_deliveries_since_start: metrics.failed_deliveries,
        retry_queue_depth,
    };
    Ok((StatusCode::OK, Json(response)))
}
