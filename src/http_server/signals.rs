//! Push ingestion of hazard signals.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};

use super::{ApiError, ApiState};
use crate::{engine::signal_processor::SignalOutcome, models::HazardSignal};

/// Runs a pushed signal through the pipeline. Returns `201` when an alert was
/// created and `200` when the signal was suppressed.
pub async fn ingest_signal(
    State(state): State<ApiState>,
    Json(signal): Json<HazardSignal>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.processor.process(&signal).await?;
    let status = match outcome {
        SignalOutcome::Suppressed { .. } => StatusCode::OK,
        SignalOutcome::Created { .. } | SignalOutcome::Superseded { .. } => StatusCode::CREATED,
    };
    Ok((status, Json(outcome)))
}
