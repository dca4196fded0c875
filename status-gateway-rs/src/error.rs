//! Gateway error types
//!
//! Upstream failures are never errors here: they are `CallOutcome` values and
//! get absorbed by the degradation policy. What remains are startup problems
//! and defects in the gateway itself.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::model::AggregatedResponse;

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// A fragment that the normalizer guarantees was not produced. Indicates a bug.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Invalid configuration or client construction failure
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl GatewayError {
    pub fn invariant(message: impl Into<String>) -> Self {
        GatewayError::InvariantViolation(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        GatewayError::Configuration(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl From<config_rs::ConfigError> for GatewayError {
    fn from(err: config_rs::ConfigError) -> Self {
        GatewayError::Configuration(err.to_string())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        if let GatewayError::InvariantViolation(ref message) = self {
            tracing::error!(violation = %message, "Aggregation invariant violated");
        } else {
            tracing::error!(error = %self, "Gateway request failed");
        }

        let body = AggregatedResponse::failure("Internal gateway error");
        (self.status_code(), Json(body)).into_response()
    }
}
