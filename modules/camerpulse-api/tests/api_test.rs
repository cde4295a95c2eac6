//! Router tests: real handlers over the pipeline mocks, driven with `oneshot`.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use ai_client::AiError;
use camerpulse_api::{build_router, AppState};
use camerpulse_common::SignalCategory;
use camerpulse_pipeline::testing::{
    enabled_settings, poll_json, signal, MockGenerationStore, MockTextGenerator,
};
use camerpulse_pipeline::PollGenerator;

fn app(store: MockGenerationStore, model: MockTextGenerator) -> Router {
    build_router(Arc::new(AppState {
        generator: PollGenerator::new(Arc::new(store), Arc::new(model)),
    }))
}

async fn send(app: Router, method: Method, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn ready_store() -> MockGenerationStore {
    MockGenerationStore::new()
        .with_settings(enabled_settings())
        .with_signal(signal(SignalCategory::Complaint, "Unpaid teacher salaries", 0.88))
}

#[tokio::test]
async fn health_returns_ok() {
    let response = app(MockGenerationStore::new(), MockTextGenerator::new())
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn disabled_generation_returns_message() {
    let (status, body) = send(
        app(MockGenerationStore::new(), MockTextGenerator::new()),
        Method::POST,
        "/api/polls/generate",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Autonomous poll generation is disabled");
}

#[tokio::test]
async fn no_signal_returns_message() {
    let store = MockGenerationStore::new().with_settings(enabled_settings());
    let (status, body) = send(
        app(store, MockTextGenerator::new()),
        Method::GET,
        "/api/polls/generate",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "No trending topics found above threshold");
}

#[tokio::test]
async fn successful_generation_returns_poll_and_metadata() {
    let model = MockTextGenerator::new().with_response(poll_json(
        "Should teachers' salary arrears be paid before the new school year?",
        &["Yes", "No", "Only partially"],
        "Arrears complaints surged",
    ));

    let (status, body) = send(app(ready_store(), model), Method::POST, "/api/polls/generate").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["poll"]["options"].as_array().unwrap().len(), 3);
    assert_eq!(body["metadata"]["category"], "complaint");
    assert_eq!(body["metadata"]["style"], "card");
    assert_eq!(body["metadata"]["auto_published"], false);
    assert_eq!(body["metadata"]["trigger_topic"], "Unpaid teacher salaries");
    let confidence = body["metadata"]["confidence_score"].as_f64().unwrap();
    assert!((0.5..=0.9).contains(&confidence));
}

#[tokio::test]
async fn upstream_failure_returns_500_with_status() {
    let model = MockTextGenerator::new().with_error(AiError::Api {
        status: 503,
        message: "Service Unavailable".into(),
    });

    let (status, body) = send(app(ready_store(), model), Method::POST, "/api/polls/generate").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Upstream generation failed");
    assert!(body["details"].as_str().unwrap().contains("503"));
}

#[tokio::test]
async fn malformed_response_returns_500() {
    let model = MockTextGenerator::new().with_response("not json at all");

    let (status, body) = send(app(ready_store(), model), Method::POST, "/api/polls/generate").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Malformed generation response");
}

#[tokio::test]
async fn quota_reports_remaining() {
    let store = MockGenerationStore::new()
        .with_settings(enabled_settings())
        .with_past_generation(chrono::Utc::now() - chrono::Duration::days(1));

    let (status, body) = send(
        app(store, MockTextGenerator::new()),
        Method::GET,
        "/api/polls/quota",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["used"], 1);
    assert_eq!(body["max_per_week"], 2);
    assert_eq!(body["window_days"], 7);
    assert_eq!(body["remaining"], 1);
}

#[tokio::test]
async fn generation_log_starts_empty() {
    let (status, body) = send(
        app(MockGenerationStore::new(), MockTextGenerator::new()),
        Method::GET,
        "/api/polls/generation-log?limit=5",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["records"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn preflight_is_answered_with_cors_headers() {
    let response = app(MockGenerationStore::new(), MockTextGenerator::new())
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/api/polls/generate")
                .header(header::ORIGIN, "https://camerpulse.example")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}
