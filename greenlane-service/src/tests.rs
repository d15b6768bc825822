mod server {
    use std::{path::PathBuf, sync::Arc};

    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use greenlane_analyzer::{
        engine::EngineError,
        testing::{test_tokenizer, ScriptedEngine},
        AnalyzerConfig, SustainabilityAnalyzer,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::server::{create_router, AppState};

    fn config() -> AnalyzerConfig {
        AnalyzerConfig::new("/nonexistent/model.gguf", "/nonexistent/tokenizer.json")
    }

    fn router_without_engine() -> Router {
        let analyzer = SustainabilityAnalyzer::new(
            config(),
            Err(EngineError::ArtifactNotFound(PathBuf::from(
                "/nonexistent/model.gguf",
            ))),
            Box::new(test_tokenizer()),
        );
        create_router(AppState {
            analyzer: Arc::new(analyzer),
        })
    }

    fn router_with_engine(engine: ScriptedEngine) -> Router {
        let analyzer =
            SustainabilityAnalyzer::new(config(), Ok(Box::new(engine)), Box::new(test_tokenizer()));
        create_router(AppState {
            analyzer: Arc::new(analyzer),
        })
    }

    async fn send(router: Router, method: Method, uri: &str, body: Body) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap();
        (status, value)
    }

    async fn analyze(router: Router, body: Value) -> (StatusCode, Value) {
        send(router, Method::POST, "/analyze", Body::from(body.to_string())).await
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(router_without_engine(), Method::GET, "/health", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["engine"], "greenlane-llama");
        assert_eq!(body["canInfer"], false);
        assert_eq!(body["docker"], false);
    }

    #[tokio::test]
    async fn test_status_counts_analyses() {
        let router = router_without_engine();
        let (_, before) = send(router.clone(), Method::GET, "/status", Body::empty()).await;
        assert_eq!(before["modelLoaded"], false);
        assert_eq!(before["tokenizerBackend"], "byte");
        assert_eq!(before["totalInferences"], 0);
        assert!(before["modelLoadError"]
            .as_str()
            .is_some_and(|e| e.starts_with("Model not found")));

        analyze(router.clone(), json!({"productTitle": "Hemp Tote"})).await;
        let (status, after) = send(router, Method::GET, "/status", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(after["totalInferences"], 1);
        assert!(after["modelSizeGB"].is_number());
    }

    #[tokio::test]
    async fn test_keyword_analysis_without_engine() {
        let (status, body) = analyze(
            router_without_engine(),
            json!({"productTitle": "Bamboo Reusable Water Bottle"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["greenScore"].as_u64().unwrap() > 50);
        assert_eq!(body["usedLLM"], false);
        assert_eq!(body["localAnalysis"], true);
        assert_eq!(body["modelLoaded"], false);
        assert_eq!(body["engine"], "greenlane-llama-keyword");
        assert!(body.get("llmRawOutput").is_none());
        assert!(!body["recommendation"].as_str().unwrap().is_empty());
        assert!(body["inferenceMs"].is_number());
    }

    #[tokio::test]
    async fn test_concerning_materials() {
        let (status, body) = analyze(
            router_without_engine(),
            json!({
                "productTitle": "Party Cups",
                "materials": "Plastic Disposable Single-Use Vinyl"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["greenScore"].as_u64().unwrap() < 50);
        let negatives = body["negatives"].to_string().to_lowercase();
        assert!(negatives.contains("plastic") || negatives.contains("single-use"));
    }

    #[tokio::test]
    async fn test_missing_title_is_rejected() {
        let (status, body) = analyze(router_without_engine(), json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_BODY");
        assert_eq!(body["error"]["message"], "productTitle is required");
    }

    #[tokio::test]
    async fn test_blank_title_is_rejected() {
        let (status, _) = analyze(router_without_engine(), json!({"productTitle": "   "})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_json_is_rejected() {
        let (status, body) = send(
            router_without_engine(),
            Method::POST,
            "/analyze",
            Body::from("{\"productTitle\": "),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "Invalid JSON");
    }

    #[tokio::test]
    async fn test_wrongly_typed_field_is_rejected() {
        let (status, body) = analyze(
            router_without_engine(),
            json!({"productTitle": "Mug", "materials": ["ceramic"]}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_BODY");
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let (status, body) = send(router_without_engine(), Method::GET, "/nope", Body::empty()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_options_returns_empty_object_with_cors_headers() {
        for uri in ["/analyze", "/anything"] {
            let request = Request::builder()
                .method(Method::OPTIONS)
                .uri(uri)
                .body(Body::empty())
                .unwrap();
            let response = router_without_engine().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(
                response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
                "*"
            );
            assert_eq!(
                response.headers()[header::ACCESS_CONTROL_ALLOW_METHODS],
                "GET, POST, OPTIONS"
            );
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let body: Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(body, json!({}));
        }
    }

    #[tokio::test]
    async fn test_responses_are_pretty_printed() {
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = router_without_engine().oneshot(request).await.unwrap();
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.starts_with("{\n  \"status\": \"ok\""));
    }

    #[tokio::test]
    async fn test_engine_failure_falls_back_to_keyword_scoring() {
        let engine = ScriptedEngine::new(" 8 out of 10").fail_after_calls(3);
        let (status, body) = analyze(
            router_with_engine(engine),
            json!({"productTitle": "Bamboo Reusable Water Bottle"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["modelLoaded"], true);
        assert_eq!(body["usedLLM"], false);
        assert_eq!(body["engine"], "greenlane-llama-hybrid");
    }

    #[tokio::test]
    async fn test_engine_failure_while_decoding_falls_back() {
        let generation = config().generation_config();
        let prompt_budget = generation.prompt_budget(generation.max_context_len);
        let engine = ScriptedEngine::new(" 8 out of 10").fail_after_calls(prompt_budget + 5);
        let (status, body) = analyze(
            router_with_engine(engine),
            json!({"productTitle": "Bamboo Reusable Water Bottle"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["usedLLM"], false);
        assert_eq!(body["engine"], "greenlane-llama-hybrid");
        assert!(body.get("llmRawOutput").is_none());
    }

    #[tokio::test]
    async fn test_wrong_method_on_known_path_is_not_found() {
        for (method, uri) in [
            (Method::GET, "/analyze"),
            (Method::POST, "/health"),
            (Method::POST, "/status"),
        ] {
            let (status, body) = send(router_without_engine(), method, uri, Body::empty()).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(body["error"]["code"], "NOT_FOUND");
            assert_eq!(body["error"]["message"], "Not found");
        }
    }

    #[tokio::test]
    async fn test_generated_text_is_blended() {
        let engine = ScriptedEngine::new(" 8 out of 10. Made from recycled bamboo.");
        let (status, body) = analyze(
            router_with_engine(engine),
            json!({"productTitle": "Bamboo Reusable Water Bottle", "brand": "Ecoflow"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["usedLLM"], true);
        assert_eq!(body["engine"], "greenlane-llama-inference");
        assert!(body["llmRawOutput"]
            .as_str()
            .is_some_and(|raw| raw.contains("8 out of 10")));
        let score = body["greenScore"].as_u64().unwrap();
        assert!(score <= 100);
    }

    #[tokio::test]
    async fn test_openapi_document_is_served() {
        let (status, body) = send(
            router_without_engine(),
            Method::GET,
            "/api-docs/openapi.json",
            Body::empty(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"]["/analyze"]["post"].is_object());
        assert!(body["paths"]["/health"]["get"].is_object());
    }
}
