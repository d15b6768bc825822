pub mod analyze;
pub mod health;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use tracing::error;

/// JSON response body rendered with two-space indentation.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrettyJson<T>(pub T);

impl<T: Serialize> IntoResponse for PrettyJson<T> {
    fn into_response(self) -> Response {
        match serde_json::to_vec_pretty(&self.0) {
            Ok(bytes) => (
                [(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                )],
                bytes,
            )
                .into_response(),
            Err(e) => {
                error!(
                    target = "greenlane-service",
                    event = "serialization_error",
                    error = %e,
                    "Failed to serialize response body"
                );
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

/// Answers `OPTIONS` requests on any path with an empty JSON object.
pub async fn preflight() -> impl IntoResponse {
    PrettyJson(json!({}))
}
