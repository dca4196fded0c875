//! Status gateway
//!
//! Sits between UI clients and a single upstream processing service. Each
//! caller request fans out to one or more upstream calls with bounded time
//! budgets, and the results are merged into one `AggregatedResponse` whose
//! shape never depends on whether the upstream succeeded.
//!
//! Request flow: `routes` -> `Aggregator` -> `Upstream` -> `classify` ->
//! `normalize` -> `decide` -> merge.

pub mod admin;
pub mod aggregate;
pub mod classifier;
pub mod error;
pub mod logging;
pub mod model;
pub mod normalize;
pub mod policy;
pub mod resilience;
pub mod routes;
pub mod upstream;
pub mod validation;

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::Request,
    middleware,
    routing::{get, post},
    Router,
};
use config_rs::GatewayConfig;
use once_cell::sync::Lazy;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

pub use admin::AdminGuard;
pub use aggregate::{Aggregated, Aggregator};
pub use error::{GatewayError, Result};
pub use model::{AggregatedResponse, ComponentState, ResponseStatus};
pub use resilience::RetryingUpstream;
pub use upstream::{CallOutcome, Endpoints, Upstream, UpstreamCall, UpstreamClient};

pub const SERVICE_NAME: &str = "status-gateway";

pub static START_TIME: Lazy<Instant> = Lazy::new(Instant::now);

/// Shared, read-only request state
#[derive(Clone)]
pub struct AppState {
    pub aggregator: Aggregator,
    pub endpoints: Endpoints,
    pub admin: AdminGuard,
}

impl AppState {
    pub fn new(upstream: Arc<dyn Upstream>, endpoints: Endpoints, admin: AdminGuard) -> Self {
        Self {
            aggregator: Aggregator::new(upstream),
            endpoints,
            admin,
        }
    }

    pub fn from_config(upstream: Arc<dyn Upstream>, config: &GatewayConfig) -> Self {
        Self::new(
            upstream,
            Endpoints::new(config.timeouts.clone()),
            AdminGuard::new(config.admin_identities.clone()),
        )
    }
}

/// Build the gateway router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace = TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
        tracing::info_span!(
            "request",
            request_id = %Uuid::new_v4(),
            method = %req.method(),
            path = %req.uri().path(),
        )
    });

    let admin_routes = Router::new()
        .route("/api/process/start", post(routes::process_start))
        .route_layer(middleware::from_fn_with_state(state.admin.clone(), admin::require_admin));

    Router::new()
        .route("/", get(routes::root))
        .route("/health", get(routes::liveness))
        .route("/api/status", get(routes::status))
        .route("/api/health/upstream", get(routes::upstream_health))
        .route("/api/progress", get(routes::progress))
        .route("/api/stats", get(routes::stats))
        .route("/api/logs", get(routes::logs))
        .route("/api/overview", get(routes::overview))
        .merge(admin_routes)
        .fallback(routes::not_found)
        .layer(DefaultBodyLimit::max(validation::MAX_PAYLOAD_SIZE))
        .layer(trace)
        .layer(cors)
        .with_state(Arc::new(state))
}
