use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use greenlane_analyzer::{EngineStatus, ScoreResult, SustainabilityAnalyzer};
use tokio::{net::TcpListener, sync::watch::Receiver};
use tower::ServiceBuilder;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{info, instrument};
use utoipa::OpenApi;

use crate::{
    error::{ErrorDetails, ErrorResponse, GreenlaneServiceError},
    handlers::{
        analyze::{__path_analyze_handler, analyze_handler, AnalyzeRequest, ANALYZE_PATH},
        health::{
            __path_health, __path_status, health, status, HealthResponse, HEALTH_PATH, STATUS_PATH,
        },
        preflight,
    },
};

pub const OPENAPI_PATH: &str = "/api-docs/openapi.json";

/// OpenAPI documentation for the analyzer endpoints
#[derive(OpenApi)]
#[openapi(
    paths(health, status, analyze_handler),
    components(schemas(
        AnalyzeRequest,
        ScoreResult,
        HealthResponse,
        EngineStatus,
        ErrorResponse,
        ErrorDetails
    )),
    tags(
        (name = "health", description = "Health and status endpoints"),
        (name = "analyze", description = "Sustainability analysis endpoint")
    )
)]
pub struct OpenApiDoc;

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    /// The analyzer owns the engine, tokenizer and inference counters.
    pub analyzer: Arc<SustainabilityAnalyzer>,
}

/// Creates the router serving the analyzer API.
///
/// # API Endpoints
///
/// * `GET /health` - Liveness and engine summary
/// * `GET /status` - Engine state and inference counters
/// * `POST /analyze` - Score a product
/// * `GET /api-docs/openapi.json` - OpenAPI document
///
/// Every response carries permissive CORS headers and `OPTIONS` on any path
/// answers `{}`. Unknown paths, and known paths called with the wrong method,
/// return a `NOT_FOUND` error body.
pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route(HEALTH_PATH, get(health).options(preflight))
        .route(STATUS_PATH, get(status).options(preflight))
        .route(ANALYZE_PATH, post(analyze_handler).options(preflight))
        .route(OPENAPI_PATH, get(openapi_json))
        .fallback(fallback)
        .method_not_allowed_fallback(fallback)
        .with_state(app_state)
        .layer(
            ServiceBuilder::new()
                .layer(SetResponseHeaderLayer::overriding(
                    header::ACCESS_CONTROL_ALLOW_ORIGIN,
                    HeaderValue::from_static("*"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::ACCESS_CONTROL_ALLOW_METHODS,
                    HeaderValue::from_static("GET, POST, OPTIONS"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::ACCESS_CONTROL_ALLOW_HEADERS,
                    HeaderValue::from_static("Content-Type"),
                ))
                .into_inner(),
        )
}

/// Starts the HTTP server and runs it until the shutdown signal flips.
///
/// # Errors
///
/// Returns an error if the server fails while serving connections.
#[instrument(level = "info", skip_all)]
pub async fn run_server(
    app_state: AppState,
    tcp_listener: TcpListener,
    mut shutdown_receiver: Receiver<bool>,
) -> anyhow::Result<()> {
    let app = create_router(app_state);
    let server = axum::serve(tcp_listener, app.into_make_service()).with_graceful_shutdown(
        async move {
            // A dropped sender also ends the server
            let _ = shutdown_receiver.changed().await;
            info!(
                target = "greenlane-service",
                event = "server_shutdown",
                "Shutting down server..."
            );
        },
    );
    server.await?;
    Ok(())
}

async fn openapi_json() -> impl IntoResponse {
    Json(OpenApiDoc::openapi())
}

async fn fallback(method: Method, uri: axum::http::Uri) -> Response {
    if method == Method::OPTIONS {
        return preflight().await.into_response();
    }
    GreenlaneServiceError::NotFound {
        endpoint: uri.path().to_string(),
    }
    .into_response()
}
