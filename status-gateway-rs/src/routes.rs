//! HTTP handlers

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, rejection::QueryRejection, Query, State},
    http::{HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;

use crate::admin::AdminIdentity;
use crate::model::AggregatedResponse;
use crate::upstream::{EndpointClass, UpstreamCall};
use crate::validation::{
    bounded_count, parse_json_object, validate_content_type, ApiValidationError, JSON_CONTENT_TYPE,
};
use crate::{AppState, SERVICE_NAME, START_TIME};

type SharedState = Arc<AppState>;

const ENDPOINTS: &[&str] = &[
    "GET /health",
    "GET /api/status",
    "GET /api/health/upstream",
    "GET /api/progress",
    "GET /api/stats?limit=N",
    "GET /api/logs?tail=N",
    "GET /api/overview",
    "POST /api/process/start",
];

#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub uptime_seconds: u64,
}

async fn aggregate(state: &AppState, calls: Vec<UpstreamCall>) -> Response {
    state.aggregator.aggregate(calls).await.into_response()
}

fn query_params(query: Result<Query<HashMap<String, String>>, QueryRejection>) -> Result<HashMap<String, String>, ApiValidationError> {
    query
        .map(|Query(params)| params)
        .map_err(|rejection| ApiValidationError::InvalidFormat(rejection.body_text()))
}

/// GET /
pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ENDPOINTS,
    }))
}

/// GET /health - liveness of the gateway itself, never touches the upstream
pub async fn liveness() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "ok",
        service: SERVICE_NAME,
        uptime_seconds: START_TIME.elapsed().as_secs(),
    })
}

/// GET /api/status - polled by the UI
pub async fn status(State(state): State<SharedState>) -> Response {
    let calls = vec![state.endpoints.health(EndpointClass::Polling)];
    aggregate(&state, calls).await
}

/// GET /api/health/upstream - definitive reachability check
pub async fn upstream_health(State(state): State<SharedState>) -> Response {
    let calls = vec![state.endpoints.health(EndpointClass::HealthCheck)];
    aggregate(&state, calls).await
}

pub async fn progress(State(state): State<SharedState>) -> Response {
    let calls = vec![state.endpoints.progress()];
    aggregate(&state, calls).await
}

pub async fn stats(
    State(state): State<SharedState>,
    query: Result<Query<HashMap<String, String>>, QueryRejection>,
) -> Result<Response, ApiValidationError> {
    let limit = bounded_count(&query_params(query)?, "limit")?;
    Ok(aggregate(&state, vec![state.endpoints.stats(limit)]).await)
}

pub async fn logs(
    State(state): State<SharedState>,
    query: Result<Query<HashMap<String, String>>, QueryRejection>,
) -> Result<Response, ApiValidationError> {
    let tail = bounded_count(&query_params(query)?, "tail")?;
    Ok(aggregate(&state, vec![state.endpoints.logs(tail)]).await)
}

/// GET /api/overview - health and progress in one round trip
pub async fn overview(State(state): State<SharedState>) -> Response {
    let calls = vec![state.endpoints.health(EndpointClass::Polling), state.endpoints.progress()];
    aggregate(&state, calls).await
}

/// POST /api/process/start
///
/// An empty body is forwarded as `{}`; a non-empty one must be a JSON object
/// sent as `application/json`.
pub async fn process_start(
    State(state): State<SharedState>,
    identity: Option<Extension<AdminIdentity>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, ApiValidationError> {
    if matches!(body, Ok(ref bytes) if !bytes.is_empty()) {
        validate_content_type(&headers, JSON_CONTENT_TYPE)?;
    }
    let body = parse_json_object(body)?;

    if let Some(Extension(AdminIdentity(ref identity))) = identity {
        tracing::info!(identity = %identity, "Processing start requested");
    } else {
        tracing::info!("Processing start requested");
    }

    Ok(aggregate(&state, vec![state.endpoints.process_start(body)]).await)
}

pub async fn not_found(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(AggregatedResponse::failure(format!("No route for {}", uri.path()))),
    )
}
