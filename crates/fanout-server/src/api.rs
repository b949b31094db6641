//! Ingress and admin endpoints.
//!
//! The facade is a thin adapter: decode JSON, validate, call the core, encode
//! the result. It holds no routing state of its own. Errors surfaced here are
//! client-input errors (400) and capacity rejections (503); a batch that was
//! accepted can afterwards only be observed through the metrics endpoint.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use fanout_core::error::PoolError;
use fanout_core::{AnalyzerPool, DispatchEngine, LogBatch};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DispatchEngine>,
    pub pool: Arc<AnalyzerPool>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/logs", post(ingest_batch))
        .route("/api/v1/analyzers", post(register_analyzer))
        .route("/api/v1/analyzers/{id}", delete(deregister_analyzer))
        .route("/api/v1/metrics", get(get_metrics))
        .route("/health", get(health))
        .fallback(not_found)
        .with_state(state)
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({ "status": "error", "message": message })),
    )
        .into_response()
}

async fn ingest_batch(
    State(state): State<AppState>,
    payload: Result<Json<LogBatch>, JsonRejection>,
) -> Response {
    let Json(mut batch) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            debug!("API | Rejected log batch: {rejection}");
            return error_response(StatusCode::BAD_REQUEST, "Invalid request body");
        }
    };

    batch.received_at = Some(Utc::now());

    if state.engine.enqueue(batch) {
        (
            StatusCode::ACCEPTED,
            Json(json!({
                "status": "accepted",
                "message": "Log batch queued for processing"
            })),
        )
            .into_response()
    } else {
        error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Server is at capacity, try again later",
        )
    }
}

#[derive(Debug, Deserialize)]
struct RegisterAnalyzerRequest {
    id: String,
    url: String,
    weight: f64,
}

async fn register_analyzer(
    State(state): State<AppState>,
    payload: Result<Json<RegisterAnalyzerRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            debug!("API | Rejected analyzer registration: {rejection}");
            return error_response(StatusCode::BAD_REQUEST, "Invalid request body");
        }
    };

    if request.id.is_empty()
        || request.url.is_empty()
        || !request.weight.is_finite()
        || request.weight <= 0.0
    {
        return error_response(StatusCode::BAD_REQUEST, "Invalid analyzer configuration");
    }

    match state
        .pool
        .register(&request.id, &request.url, request.weight)
    {
        Ok(()) => (
            StatusCode::CREATED,
            Json(json!({
                "status": "created",
                "message": "Analyzer added successfully"
            })),
        )
            .into_response(),
        Err(PoolError::DuplicateAnalyzer(id)) => error_response(
            StatusCode::BAD_REQUEST,
            &format!("Analyzer {id:?} is already registered"),
        ),
    }
}

async fn deregister_analyzer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    state.pool.deregister(&id);
    (
        StatusCode::OK,
        Json(json!({
            "status": "deleted",
            "message": "Analyzer removed successfully"
        })),
    )
        .into_response()
}

async fn get_metrics(State(state): State<AppState>) -> Response {
    Json(state.engine.snapshot()).into_response()
}

async fn health() -> Response {
    Json(json!({ "status": "healthy" })).into_response()
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not Found").into_response()
}
