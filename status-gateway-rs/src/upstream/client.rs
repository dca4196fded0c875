//! reqwest-backed upstream client

use async_trait::async_trait;
use reqwest::{header, Client};

use super::{CallOutcome, Upstream, UpstreamCall};
use crate::error::{GatewayError, Result};

const USER_AGENT: &str = concat!("status-gateway/", env!("CARGO_PKG_VERSION"));

/// Bad Gateway, for transport failures after the connection was accepted
const HOP_FAILURE_STATUS: u16 = 502;

/// Issues one call per descriptor against a fixed base URL.
///
/// The time budget comes from the descriptor: the request is raced against a
/// timer and dropped (cancelled) when the timer wins. No logging, caching or
/// retries happen here.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: Client,
    base_url: String,
}

impl UpstreamClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| GatewayError::configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self::with_client(http, base_url))
    }

    fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, endpoint: &str) -> String {
        if endpoint.starts_with('/') {
            format!("{}{}", self.base_url, endpoint)
        } else {
            format!("{}/{}", self.base_url, endpoint)
        }
    }

    async fn execute(&self, call: &UpstreamCall) -> CallOutcome {
        let mut request = self
            .http
            .request(call.method.as_reqwest(), self.url_for(&call.endpoint))
            .header(header::ACCEPT, call.accept.as_str());

        if !call.query.is_empty() {
            request = request.query(&call.query);
        }
        if let Some(ref body) = call.body {
            request = request.json(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) if err.is_timeout() => return CallOutcome::Timeout { budget: call.timeout },
            Err(err) if err.is_connect() || err.is_builder() => {
                return CallOutcome::ConnectionRefused {
                    message: err.to_string(),
                }
            }
            // Connection accepted, then dropped without a reply: a failed hop,
            // reported the way a reverse proxy would
            Err(_) => {
                return CallOutcome::UpstreamError {
                    status: HOP_FAILURE_STATUS,
                    raw_body: String::new(),
                }
            }
        };

        let status = response.status().as_u16();
        let succeeded = (200..300).contains(&status);
        let raw_body = match response.text().await {
            Ok(text) => text,
            // The status line already arrived; a truncated error body stays an error
            Err(_) if !succeeded => String::new(),
            Err(err) if err.is_timeout() => return CallOutcome::Timeout { budget: call.timeout },
            Err(err) => {
                return CallOutcome::Malformed {
                    status,
                    raw_body: String::new(),
                    message: format!("failed to read response body: {}", err),
                }
            }
        };

        if !succeeded {
            return CallOutcome::UpstreamError { status, raw_body };
        }

        // 204 and friends carry no body; treat as an empty object
        if raw_body.trim().is_empty() {
            return CallOutcome::Success {
                status,
                payload: serde_json::Value::Object(Default::default()),
            };
        }

        match serde_json::from_str(&raw_body) {
            Ok(payload) => CallOutcome::Success { status, payload },
            Err(err) => CallOutcome::Malformed {
                status,
                raw_body,
                message: err.to_string(),
            },
        }
    }
}

#[async_trait]
impl Upstream for UpstreamClient {
    async fn call(&self, call: &UpstreamCall) -> CallOutcome {
        match tokio::time::timeout(call.timeout, self.execute(call)).await {
            Ok(outcome) => outcome,
            Err(_elapsed) => CallOutcome::Timeout { budget: call.timeout },
        }
    }
}
