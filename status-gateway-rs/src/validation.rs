//! Request validation for the gateway's own surface
//!
//! Query parameters and trigger bodies are parsed by hand so every rejection
//! is a shaped JSON error instead of axum's plain-text rejection.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{Map, Value};

/// Maximum trigger body size (1 MiB)
pub const MAX_PAYLOAD_SIZE: usize = 1024 * 1024;

pub const DEFAULT_LIMIT: usize = 50;
pub const MAX_LIMIT: usize = 500;

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Error response for validation failures
#[derive(Debug, serde::Serialize)]
pub struct ValidationErrorResponse {
    pub error: String,
    pub code: u16,
    pub details: Option<Vec<String>>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiValidationError {
    #[error("Invalid request format: {0}")]
    InvalidFormat(String),

    #[error("Content type must be {0}")]
    ContentType(String),

    #[error("Request payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Invalid query parameter '{name}': {message}")]
    InvalidParameter { name: String, message: String },
}

impl ApiValidationError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidFormat(_) | Self::InvalidParameter { .. } => StatusCode::BAD_REQUEST,
            Self::ContentType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    fn details(&self) -> Option<Vec<String>> {
        match self {
            Self::InvalidParameter { name, .. } => Some(vec![format!(
                "'{}' must be an integer between 1 and {}",
                name, MAX_LIMIT
            )]),
            Self::PayloadTooLarge(_) => Some(vec![format!("maximum body size is {} bytes", MAX_PAYLOAD_SIZE)]),
            _ => None,
        }
    }

    pub fn to_response(&self) -> (StatusCode, Json<ValidationErrorResponse>) {
        let status = self.status_code();
        (
            status,
            Json(ValidationErrorResponse {
                error: self.to_string(),
                code: status.as_u16(),
                details: self.details(),
            }),
        )
    }
}

impl IntoResponse for ApiValidationError {
    fn into_response(self) -> Response {
        tracing::debug!(error = %self, "Rejected request");
        self.to_response().into_response()
    }
}

/// Validate the Content-Type header
pub fn validate_content_type(headers: &HeaderMap, expected: &str) -> Result<(), ApiValidationError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if !content_type.trim_start().to_ascii_lowercase().starts_with(expected) {
        return Err(ApiValidationError::ContentType(format!(
            "'{}', got '{}'",
            expected, content_type
        )));
    }

    Ok(())
}

/// Read a bounded count parameter (`limit`, `tail`).
///
/// Absent means `DEFAULT_LIMIT`; out-of-range values are clamped to
/// `1..=MAX_LIMIT`; anything that is not an integer is rejected.
pub fn bounded_count(params: &HashMap<String, String>, name: &str) -> Result<usize, ApiValidationError> {
    let raw = match params.get(name).map(|v| v.trim()) {
        None | Some("") => return Ok(DEFAULT_LIMIT),
        Some(raw) => raw,
    };

    match raw.parse::<i64>() {
        Ok(value) => Ok(value.clamp(1, MAX_LIMIT as i64) as usize),
        // Integers too wide for i64 still clamp
        Err(_) if is_integer_literal(raw) => Ok(if raw.starts_with('-') { 1 } else { MAX_LIMIT }),
        Err(_) => Err(ApiValidationError::InvalidParameter {
            name: name.to_string(),
            message: format!("'{}' is not an integer", raw),
        }),
    }
}

fn is_integer_literal(raw: &str) -> bool {
    let digits = raw.strip_prefix(['+', '-']).unwrap_or(raw);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Parse a trigger body into a JSON object. An empty body is `{}`.
pub fn parse_json_object(body: Result<Bytes, BytesRejection>) -> Result<Value, ApiValidationError> {
    let body = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiValidationError::PayloadTooLarge(rejection.body_text())
        } else {
            ApiValidationError::InvalidFormat(rejection.body_text())
        }
    })?;

    if body.len() > MAX_PAYLOAD_SIZE {
        return Err(ApiValidationError::PayloadTooLarge(format!(
            "{} bytes exceeds {} bytes",
            body.len(),
            MAX_PAYLOAD_SIZE
        )));
    }

    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }

    match serde_json::from_slice::<Value>(&body) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(_) => Err(ApiValidationError::InvalidFormat("body must be a JSON object".to_string())),
        Err(e) => Err(ApiValidationError::InvalidFormat(format!("Invalid JSON: {}", e))),
    }
}
