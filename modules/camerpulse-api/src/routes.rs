use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use camerpulse_pipeline::PollGenerator;

use crate::envelope::{error_envelope, run_envelope};

const DEFAULT_LOG_LIMIT: u32 = 20;

pub struct AppState {
    pub generator: PollGenerator,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/polls/generate", get(generate).post(generate))
        .route("/api/polls/generation-log", get(generation_log))
        .route("/api/polls/quota", get(quota))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        // method + path + status + latency only
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }),
        )
}

async fn health() -> &'static str {
    "ok"
}

async fn generate(State(state): State<Arc<AppState>>) -> Response {
    let result = state.generator.run().await;
    let (status, body) = run_envelope(&result);
    (status, Json(body)).into_response()
}

#[derive(Deserialize)]
pub struct LogQuery {
    limit: Option<u32>,
}

async fn generation_log(
    State(state): State<Arc<AppState>>,
    Query(q): Query<LogQuery>,
) -> Response {
    let limit = q.limit.unwrap_or(DEFAULT_LOG_LIMIT);
    match state.generator.generation_log(limit).await {
        Ok(records) => Json(json!({ "records": records })).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read generation log");
            let (status, body) = error_envelope(&e);
            (status, Json(body)).into_response()
        }
    }
}

async fn quota(State(state): State<Arc<AppState>>) -> Response {
    match state.generator.quota_status().await {
        Ok(q) => Json(json!({
            "used": q.used,
            "max_per_week": q.max_per_week,
            "window_days": q.window_days,
            "remaining": q.remaining(),
        }))
        .into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to compute quota status");
            let (status, body) = error_envelope(&e);
            (status, Json(body)).into_response()
        }
    }
}
