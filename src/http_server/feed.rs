//! Handlers for the subscriber-facing feed endpoints.

use std::str::FromStr;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};

use super::{ApiError, ApiState};
use crate::{
    engine::feed::{FeedOutcome, FeedPage, FeedQuery},
    models::Severity,
};

/// Query string of `GET /subscribers/{id}/feed`.
#[derive(Debug, Default, Deserialize)]
pub struct FeedParams {
    /// Minimum severity to include, by name.
    pub severity: Option<String>,
    /// Opaque cursor from a previous page.
    pub cursor: Option<String>,
    /// Page size, clamped to the service maximum.
    pub limit: Option<u32>,
}

impl FeedParams {
    fn into_query(self) -> Result<FeedQuery, ApiError> {
        let severity = self
            .severity
            .as_deref()
            .map(Severity::from_str)
            .transpose()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        Ok(FeedQuery { severity, cursor: self.cursor, limit: self.limit })
    }
}

/// Feed page plus a flag telling the client the data could not be refreshed.
#[derive(Debug, Serialize)]
struct FeedResponse {
    #[serde(flatten)]
    page: FeedPage,
    stale: bool,
}

/// Returns one page of the subscriber's feed. When storage is unavailable the
/// page is empty and marked stale.
pub async fn get_feed(
    State(state): State<ApiState>,
    Path(subscriber_id): Path<String>,
    Query(params): Query<FeedParams>,
) -> Result<impl IntoResponse, ApiError> {
    let query = params.into_query()?;
    let response = match state.feed.fetch(&subscriber_id, &query).await? {
        FeedOutcome::Fresh(page) => FeedResponse { page, stale: false },
        FeedOutcome::Degraded => FeedResponse {
            page: FeedPage { items: Vec::new(), unread_count: 0, next_cursor: None },
            stale: true,
        },
    };
    Ok((StatusCode::OK, Json(response)))
}

/// Marks an alert read for the subscriber.
pub async fn mark_read(
    State(state): State<ApiState>,
    Path((subscriber_id, alert_id)): Path<(String, i64)>,
) -> Result<impl IntoResponse, ApiError> {
    let read_state = state.read_tracker.mark_read(&subscriber_id, alert_id).await?;
    Ok((StatusCode::OK, Json(read_state)))
}
