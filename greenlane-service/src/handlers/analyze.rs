use std::sync::Arc;

use axum::{body::Bytes, extract::State};
use greenlane_analyzer::{AnalysisRequest, ScoreResult};
use serde::Deserialize;
use tracing::instrument;
use utoipa::ToSchema;

use crate::{error::GreenlaneServiceError, handlers::PrettyJson, server::AppState};

pub const ANALYZE_PATH: &str = "/analyze";

/// Body of an analysis request. Only `productTitle` is required.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub product_title: Option<String>,
    pub brand: Option<String>,
    pub materials: Option<String>,
    pub description: Option<String>,
}

impl TryFrom<AnalyzeRequest> for AnalysisRequest {
    type Error = GreenlaneServiceError;

    fn try_from(body: AnalyzeRequest) -> Result<Self, Self::Error> {
        let request = Self::new(body.product_title.unwrap_or_default()).map_err(|e| {
            GreenlaneServiceError::InvalidBody {
                message: e.to_string(),
                endpoint: ANALYZE_PATH.to_string(),
            }
        })?;
        Ok(request
            .with_brand(body.brand.unwrap_or_default())
            .with_materials(body.materials.unwrap_or_default())
            .with_description(body.description.unwrap_or_default()))
    }
}

fn parse_body(body: &[u8]) -> Result<AnalysisRequest, GreenlaneServiceError> {
    let body: AnalyzeRequest = serde_json::from_slice(body).map_err(|e| {
        let message = if e.is_data() {
            format!("Invalid request: {e}")
        } else {
            "Invalid JSON".to_string()
        };
        GreenlaneServiceError::InvalidBody {
            message,
            endpoint: ANALYZE_PATH.to_string(),
        }
    })?;
    AnalysisRequest::try_from(body)
}

/// Scores a product for sustainability.
///
/// The analysis runs on the blocking pool; the decode loop is synchronous and
/// would otherwise stall the runtime for its whole duration.
#[utoipa::path(
    post,
    path = "/analyze",
    tag = "analyze",
    request_body = AnalyzeRequest,
    responses(
        (status = 200, description = "Sustainability score", body = ScoreResult),
        (status = 400, description = "Malformed body or missing productTitle", body = crate::error::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::error::ErrorResponse)
    )
)]
#[instrument(level = "info", skip_all, fields(endpoint = ANALYZE_PATH))]
pub async fn analyze_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<PrettyJson<ScoreResult>, GreenlaneServiceError> {
    let request = parse_body(&body)?;
    let analyzer = Arc::clone(&state.analyzer);
    let result = tokio::task::spawn_blocking(move || analyzer.analyze(&request))
        .await
        .map_err(|e| GreenlaneServiceError::InternalError {
            message: format!("Analysis task failed: {e}"),
            endpoint: ANALYZE_PATH.to_string(),
        })?;
    Ok(PrettyJson(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_title_is_rejected() {
        let error = parse_body(b"{}").unwrap_err();
        assert!(matches!(
            error,
            GreenlaneServiceError::InvalidBody { ref message, .. } if message == "productTitle is required"
        ));
    }

    #[test]
    fn test_null_fields_are_treated_as_absent() {
        let request =
            parse_body(br#"{"productTitle": "Cork Mat", "brand": null, "materials": "cork"}"#)
                .unwrap();
        assert_eq!(request.title(), "Cork Mat");
        assert_eq!(request.brand(), "");
        assert_eq!(request.materials(), "cork");
    }

    #[test]
    fn test_syntax_and_type_errors_are_distinguished() {
        let syntax = parse_body(b"{not json").unwrap_err();
        assert!(matches!(
            syntax,
            GreenlaneServiceError::InvalidBody { ref message, .. } if message == "Invalid JSON"
        ));
        let typed = parse_body(br#"{"productTitle": 42}"#).unwrap_err();
        assert!(matches!(
            typed,
            GreenlaneServiceError::InvalidBody { ref message, .. } if message.starts_with("Invalid request")
        ));
    }
}
