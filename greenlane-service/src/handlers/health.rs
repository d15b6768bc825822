use axum::{extract::State, response::IntoResponse};
use greenlane_analyzer::EngineStatus;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{handlers::PrettyJson, server::AppState};

pub const HEALTH_PATH: &str = "/health";
pub const STATUS_PATH: &str = "/status";

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always `ok` while the process serves requests
    pub status: String,
    pub engine: String,
    pub model: String,
    pub can_infer: bool,
    pub docker: bool,
}

/// Liveness probe with a summary of the engine state.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let analyzer = &state.analyzer;
    PrettyJson(HealthResponse {
        status: "ok".to_string(),
        engine: analyzer.config().engine_name.clone(),
        model: analyzer.config().model_name.clone(),
        can_infer: analyzer.can_infer(),
        docker: analyzer.docker(),
    })
}

/// Detailed engine state and inference counters.
#[utoipa::path(
    get,
    path = "/status",
    tag = "health",
    responses(
        (status = 200, description = "Engine status", body = EngineStatus)
    )
)]
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    PrettyJson(state.analyzer.status())
}
