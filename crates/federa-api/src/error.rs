//! OAuth-style JSON error bodies

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use federa_core::BrokerError;

/// `{ "error": ..., "error_description": ... }`
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,
    pub error: String,
    pub error_description: String,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
            error_description: description.into(),
        }
    }

    pub fn invalid_request(description: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", description)
    }

    pub fn not_found(description: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", description)
    }

    pub fn invalid_token(description: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "invalid_token", description)
    }
}

impl From<BrokerError> for ApiError {
    fn from(e: BrokerError) -> Self {
        let status = match &e {
            BrokerError::Validation { .. }
            | BrokerError::Resolution { .. }
            | BrokerError::LogoutState { .. } => StatusCode::BAD_REQUEST,
            BrokerError::NotFound { .. } => StatusCode::NOT_FOUND,
            BrokerError::Conflict { .. } => StatusCode::CONFLICT,
            BrokerError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            BrokerError::Configuration { .. }
            | BrokerError::Database { .. }
            | BrokerError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Server-side details stay in the logs
        let description = if status.is_server_error() {
            "The server could not complete the request".to_string()
        } else {
            e.to_string()
        };

        Self::new(status, e.code(), description)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(error = %self.error, "Request failed");
        }
        (self.status, Json(self)).into_response()
    }
}
