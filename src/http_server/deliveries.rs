//! Delivery confirmation callbacks from channel gateways, and per-alert
//! delivery reports for operators.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;

use super::{ApiError, ApiState};
use crate::models::{Channel, DeliveryKey};

/// Body of `POST /deliveries/confirm`.
#[derive(Debug, Deserialize)]
pub struct ConfirmDeliveryRequest {
    /// Alert the notification was sent for.
    pub alert_id: i64,
    /// Recipient of the notification.
    pub subscriber_id: String,
    /// Channel the gateway delivered on.
    pub channel: Channel,
}

/// Promotes a sent attempt to delivered.
pub async fn confirm_delivery(
    State(state): State<ApiState>,
    Json(payload): Json<ConfirmDeliveryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let key = DeliveryKey::new(payload.alert_id, payload.subscriber_id, payload.channel);
    let attempt = state.dispatcher.confirm_delivery(&key).await?;
    Ok((StatusCode::OK, Json(attempt)))
}

/// Delivery counts and rates for one alert.
pub async fn alert_deliveries(
    State(state): State<ApiState>,
    Path(alert_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let report = state.dispatcher.delivery_report(alert_id).await?;
    Ok((StatusCode::OK, Json(report)))
}
