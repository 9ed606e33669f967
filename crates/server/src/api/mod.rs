//! Read API handlers and their error mapping.

mod health;
mod repos;

pub use health::*;
pub use repos::*;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use gitfleet_ingest::IngestError;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Error returned by handlers, rendered as `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<IngestError> for ApiError {
    fn from(e: IngestError) -> Self {
        let status = match &e {
            IngestError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            IngestError::Unavailable | IngestError::RateLimitBudgetExhausted { .. } => StatusCode::BAD_GATEWAY,
            IngestError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            IngestError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() && status != StatusCode::BAD_GATEWAY {
            error!(error = %e, "request failed");
        }
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse { error: self.message })).into_response()
    }
}
