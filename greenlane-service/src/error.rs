use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::handlers::PrettyJson;

/// Body returned for every failed request.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetails {
    /// Machine readable error code, e.g. `INVALID_BODY`
    pub code: String,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum GreenlaneServiceError {
    #[error("Invalid request body: {message}")]
    InvalidBody { message: String, endpoint: String },

    #[error("Not found: {endpoint}")]
    NotFound { endpoint: String },

    #[error("Internal server error: {message}")]
    InternalError { message: String, endpoint: String },
}

impl GreenlaneServiceError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidBody { .. } => "INVALID_BODY",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::InternalError { .. } => "INTERNAL_ERROR",
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::InvalidBody { message, .. } | Self::InternalError { message, .. } => {
                message.clone()
            }
            Self::NotFound { .. } => "Not found".to_string(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidBody { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn endpoint(&self) -> &str {
        match self {
            Self::InvalidBody { endpoint, .. }
            | Self::NotFound { endpoint }
            | Self::InternalError { endpoint, .. } => endpoint,
        }
    }
}

impl IntoResponse for GreenlaneServiceError {
    fn into_response(self) -> Response {
        if self.status_code().is_server_error() {
            tracing::error!(
                target = "greenlane-service",
                event = "error_occurred",
                endpoint = self.endpoint(),
                error = %self,
            );
        } else {
            tracing::debug!(
                target = "greenlane-service",
                event = "request_rejected",
                endpoint = self.endpoint(),
                error = %self,
            );
        }
        let error_response = ErrorResponse {
            error: ErrorDetails {
                code: self.error_code().to_string(),
                message: self.client_message(),
            },
        };
        (self.status_code(), PrettyJson(error_response)).into_response()
    }
}
