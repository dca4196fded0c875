//! Upstream calls
//!
//! - `UpstreamCall`: descriptor of one outbound request
//! - `CallOutcome`: typed result of a call. Every failure mode is a variant.
//! - `Upstream`: the seam the aggregator calls through
//! - `UpstreamClient`: reqwest implementation with an enforced time budget

pub mod client;
pub mod descriptor;

pub use client::UpstreamClient;
pub use descriptor::{CallMethod, EndpointClass, Endpoints, TargetSchema, UpstreamCall};

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

/// Result of a single upstream call
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    /// 2xx with a parseable JSON body
    Success { status: u16, payload: Value },

    /// The time budget elapsed before the call resolved
    Timeout { budget: Duration },

    /// The connection could not be established
    ConnectionRefused { message: String },

    /// The upstream answered with a non-success status
    UpstreamError { status: u16, raw_body: String },

    /// 2xx whose body is not valid JSON
    Malformed { status: u16, raw_body: String, message: String },

    /// Gateway/tunnel-class status from the intermediary hop.
    /// Only produced by `classifier::classify`.
    Tunnel { status: u16, raw_body: String, hint: String },
}

impl CallOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CallOutcome::Success { .. })
    }

    /// Upstream HTTP status, when the upstream (or the hop in front of it) answered
    pub fn status(&self) -> Option<u16> {
        match self {
            CallOutcome::Success { status, .. }
            | CallOutcome::UpstreamError { status, .. }
            | CallOutcome::Malformed { status, .. }
            | CallOutcome::Tunnel { status, .. } => Some(*status),
            CallOutcome::Timeout { .. } | CallOutcome::ConnectionRefused { .. } => None,
        }
    }

    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            CallOutcome::Success { .. } => "success",
            CallOutcome::Timeout { .. } => "timeout",
            CallOutcome::ConnectionRefused { .. } => "connection_refused",
            CallOutcome::UpstreamError { .. } => "upstream_error",
            CallOutcome::Malformed { .. } => "malformed",
            CallOutcome::Tunnel { .. } => "tunnel",
        }
    }
}

/// Anything that can resolve an `UpstreamCall`.
///
/// Implementations never fail: every failure is reported as a `CallOutcome`.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn call(&self, call: &UpstreamCall) -> CallOutcome;
}

#[async_trait]
impl<U: Upstream + ?Sized> Upstream for std::sync::Arc<U> {
    async fn call(&self, call: &UpstreamCall) -> CallOutcome {
        (**self).call(call).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::ScriptedUpstream;
    use std::sync::Arc;

    #[test]
    fn test_shared_upstream_forwards_calls() {
        let scripted = ScriptedUpstream::new().with("/health", ScriptedUpstream::ok(serde_json::json!({})));
        let shared: Arc<dyn Upstream> = Arc::new(scripted.clone());
        let call = Endpoints::default().health(EndpointClass::Polling);

        let outcome = tokio_test::block_on(shared.call(&call));

        assert!(outcome.is_success());
        assert_eq!(outcome.kind(), "success");
        assert_eq!(outcome.status(), Some(200));
        assert_eq!(scripted.calls(), vec![call]);
    }

    #[test]
    fn test_failures_carry_no_status() {
        let timeout = CallOutcome::Timeout { budget: Duration::from_secs(1) };
        assert_eq!(timeout.status(), None);
        assert_eq!(timeout.kind(), "timeout");
    }
}
