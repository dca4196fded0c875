//! Administrative allow-list
//!
//! Authentication happens in the proxy in front of the gateway, which forwards
//! the caller's identity in `X-Admin-Identity`. Routes behind this middleware
//! only accept listed identities. An empty allow-list disables the guard.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

pub static ADMIN_IDENTITY_HEADER: HeaderName = HeaderName::from_static("x-admin-identity");

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminErrorResponse {
    pub error: String,
    pub code: u16,
}

/// Identity accepted by the guard, stored in request extensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminIdentity(pub String);

#[derive(Debug, Clone, Default)]
pub struct AdminGuard {
    identities: Arc<Vec<String>>,
}

impl AdminGuard {
    pub fn new(identities: Vec<String>) -> Self {
        Self {
            identities: Arc::new(identities),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.identities.is_empty()
    }

    pub fn allows(&self, identity: &str) -> bool {
        self.identities
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(identity.trim()))
    }
}

fn forbidden(message: &str) -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(AdminErrorResponse {
            error: message.to_string(),
            code: StatusCode::FORBIDDEN.as_u16(),
        }),
    )
        .into_response()
}

pub async fn require_admin(State(guard): State<AdminGuard>, mut req: Request<Body>, next: Next) -> Response {
    if !guard.is_enabled() {
        return next.run(req).await;
    }

    let identity = req
        .headers()
        .get(&ADMIN_IDENTITY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());

    match identity {
        Some(identity) if guard.allows(&identity) => {
            req.extensions_mut().insert(AdminIdentity(identity));
            next.run(req).await
        }
        Some(identity) => {
            tracing::warn!(identity = %identity, path = %req.uri().path(), "Admin identity not allowed");
            forbidden("Identity is not allowed to perform this action")
        }
        None => {
            tracing::warn!(path = %req.uri().path(), "Admin route called without identity");
            forbidden("Missing administrative identity")
        }
    }
}
