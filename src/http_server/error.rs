//! Defines the custom `ApiError` type for the HTTP server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

use crate::{
    engine::{
        dispatcher::DispatchError, feed::FeedError, read_tracker::ReadError,
        signal_processor::SignalError,
    },
    persistence::PersistenceError,
};

/// A custom error type for the API that can be converted into an HTTP response.
#[derive(Debug)]
pub enum ApiError {
    /// Represents an unauthorized request.
    Unauthorized,

    /// A malformed request parameter.
    BadRequest(String),

    /// Represents a resource that could not be found.
    NotFound(String),

    /// Represents a validation error for an unprocessable entity.
    UnprocessableEntity(String),

    /// The request conflicts with the current state of the resource.
    Conflict(String),

    /// Storage is unavailable; the caller may retry.
    ServiceUnavailable(String),

    /// Represents a generic internal server error.
    InternalServerError(String),
}

impl From<PersistenceError> for ApiError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::NotFound(_) => ApiError::NotFound("Resource not found".to_string()),
            _ => ApiError::ServiceUnavailable(err.to_string()),
        }
    }
}

impl From<SignalError> for ApiError {
    fn from(err: SignalError) -> Self {
        match err {
            SignalError::Invalid(_) | SignalError::UnknownRegion(_) =>
                ApiError::UnprocessableEntity(err.to_string()),
            SignalError::StoreUnavailable(e) => ApiError::ServiceUnavailable(e.to_string()),
            SignalError::Contention(_) => ApiError::Conflict(err.to_string()),
            SignalError::Template(e) => ApiError::InternalServerError(e.to_string()),
        }
    }
}

impl From<ReadError> for ApiError {
    fn from(err: ReadError) -> Self {
        match err {
            ReadError::Store(e) => e.into(),
            ReadError::UnknownSubscriber(_)
            | ReadError::UnknownAlert(_)
            | ReadError::NotRelevant { .. } => ApiError::NotFound(err.to_string()),
        }
    }
}

impl From<FeedError> for ApiError {
    fn from(err: FeedError) -> Self {
        match err {
            FeedError::UnknownSubscriber(_) => ApiError::NotFound(err.to_string()),
            FeedError::InvalidCursor(_) => ApiError::BadRequest(err.to_string()),
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Store(e) => e.into(),
            DispatchError::AlertNotFound(_) | DispatchError::AttemptNotFound(_) =>
                ApiError::NotFound(err.to_string()),
            DispatchError::InvalidTransition { .. } => ApiError::Conflict(err.to_string()),
        }
    }
}

/// Implements the conversion from `ApiError` into an `axum` response.
///
/// This is the central point for mapping internal application errors to
/// user-facing HTTP responses.
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match self {
            ApiError::Unauthorized =>
                (StatusCode::UNAUTHORIZED, json!({ "error": "Unauthorized" })),
            ApiError::InternalServerError(err) => {
                tracing::error!("Internal server error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "An internal server error occurred" }),
                )
            }
            ApiError::ServiceUnavailable(err) => {
                tracing::warn!("Storage unavailable: {}", err);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    json!({ "error": "Storage is temporarily unavailable" }),
                )
            }
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, json!({ "error": message })),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, json!({ "error": message })),
            ApiError::UnprocessableEntity(message) =>
                (StatusCode::UNPROCESSABLE_ENTITY, json!({ "error": message })),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, json!({ "error": message })),
        };

        (status, Json(body)).into_response()
    }
}
