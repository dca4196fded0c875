//! Aggregator
//!
//! Fans a request's descriptors out concurrently, waits for every outcome
//! (all-settled), and merges the per-call decisions into one
//! `AggregatedResponse`. Merge order is descriptor position, never completion
//! order.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use futures_util::future::join_all;
use tracing::{debug, error, warn};

use crate::classifier::classify;
use crate::error::{GatewayError, Result};
use crate::model::{AggregatedResponse, OrderedMap, ResponseStatus};
use crate::normalize::normalize;
use crate::policy::{decide, Decision};
use crate::upstream::{CallOutcome, Upstream, UpstreamCall};

/// Final response of an aggregation: HTTP status plus envelope
#[derive(Debug, Clone)]
pub struct Aggregated {
    pub status_code: u16,
    pub response: AggregatedResponse,
}

impl Aggregated {
    /// Status written to the caller. Codes that forbid a body (1xx, 204, 205,
    /// 304) become 200 so the envelope is never stripped.
    pub fn http_status(&self) -> StatusCode {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_GATEWAY);
        if status.is_informational() || matches!(status.as_u16(), 204 | 205 | 304) {
            StatusCode::OK
        } else {
            status
        }
    }
}

impl IntoResponse for Aggregated {
    fn into_response(self) -> Response {
        (self.http_status(), Json(self.response)).into_response()
    }
}

#[derive(Clone)]
pub struct Aggregator {
    upstream: Arc<dyn Upstream>,
}

impl Aggregator {
    pub fn new(upstream: Arc<dyn Upstream>) -> Self {
        Self { upstream }
    }

    /// Resolve every descriptor and merge the results.
    ///
    /// Upstream failures never surface as `Err`; the only error is an
    /// `InvariantViolation` when no fragment could be produced.
    pub async fn aggregate(&self, calls: Vec<UpstreamCall>) -> Result<Aggregated> {
        let outcomes = join_all(calls.iter().map(|call| self.upstream.call(call))).await;

        let decisions = calls
            .iter()
            .zip(outcomes)
            .map(|(call, outcome)| resolve(call, outcome))
            .collect::<Result<Vec<_>>>();

        let merged = decisions.and_then(merge);
        if let Err(ref err) = merged {
            error!(descriptors = calls.len(), error = %err, "Aggregation failed");
        }
        merged
    }
}

fn resolve(call: &UpstreamCall, outcome: CallOutcome) -> Result<Decision> {
    let outcome = classify(outcome);
    debug!(
        endpoint = %call.endpoint,
        outcome = outcome.kind(),
        upstream_status = ?outcome.status(),
        "Upstream call resolved"
    );

    let fragment = normalize(&outcome, &call.schema);
    if let Some(key) = call.schema.payload_key() {
        if fragment.payload.as_ref().map(|(k, _)| k.as_str()) != Some(key) {
            return Err(GatewayError::invariant(format!(
                "normalizer produced no '{}' payload for {}",
                key, call.endpoint
            )));
        }
    }

    let decision = decide(&outcome, call.class, fragment);
    if decision.status != ResponseStatus::Ok {
        warn!(
            endpoint = %call.endpoint,
            status = ?decision.status,
            status_code = decision.status_code,
            error = ?decision.fragment.error,
            "Degraded upstream fragment"
        );
    }
    Ok(decision)
}

/// Merge decisions in descriptor order.
///
/// - components: the first descriptor reporting a component wins
/// - status: the worst status, except that mixed success and failure is `degraded`
/// - HTTP status: a single decision passes its code through; several yield
///   200 if any succeeded, otherwise the first code
pub fn merge(decisions: Vec<Decision>) -> Result<Aggregated> {
    let first_code = match decisions.first() {
        Some(first) => first.status_code,
        None => return Err(GatewayError::invariant("aggregation produced no fragments")),
    };

    let status_code = if decisions.len() > 1 && decisions.iter().any(Decision::is_success_code) {
        200
    } else {
        first_code
    };

    let mut status = decisions
        .iter()
        .fold(ResponseStatus::Ok, |acc, decision| acc.worst(decision.status));
    if status == ResponseStatus::Error && decisions.iter().any(|d| d.status != ResponseStatus::Error) {
        status = ResponseStatus::Degraded;
    }

    let mut components = OrderedMap::new();
    let mut data = OrderedMap::new();
    let mut hints: Vec<String> = Vec::new();
    let mut errors: Vec<String> = Vec::new();

    for decision in decisions {
        for (name, state) in decision.fragment.components {
            components.insert_if_absent(name, state);
        }
        if let Some((key, value)) = decision.fragment.payload {
            data.insert_if_absent(key, value);
        }
        if let Some(hint) = decision.hint {
            if !hints.contains(&hint) {
                hints.push(hint);
            }
        }
        if let Some(error) = decision.fragment.error {
            errors.push(error);
        }
    }

    let join = |parts: Vec<String>| (!parts.is_empty()).then(|| parts.join("; "));

    Ok(Aggregated {
        status_code,
        response: AggregatedResponse {
            status,
            components,
            data,
            hint: join(hints),
            error: join(errors),
            timestamp: Utc::now(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ComponentState;
    use crate::tests::ScriptedUpstream;
    use crate::upstream::{EndpointClass, Endpoints};
    use serde_json::json;
    use std::time::Duration;

    fn aggregator(upstream: ScriptedUpstream) -> Aggregator {
        Aggregator::new(Arc::new(upstream))
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_both_fragments() {
        let endpoints = Endpoints::default();
        let upstream = ScriptedUpstream::new()
            .with("/health", CallOutcome::Timeout { budget: Duration::from_secs(5) })
            .with("/progress", ScriptedUpstream::ok(json!({ "incoming": 3, "processed": 10 })));

        let aggregated = aggregator(upstream)
            .aggregate(vec![endpoints.health(EndpointClass::Polling), endpoints.progress()])
            .await
            .unwrap();

        assert_eq!(aggregated.status_code, 200);
        assert_eq!(aggregated.response.status, ResponseStatus::Degraded);
        assert_eq!(
            aggregated.response.components.get("flask"),
            Some(&ComponentState::Offline)
        );
        let progress = aggregated.response.data.get("progress").unwrap();
        assert_eq!(progress["incoming"], 3);
        assert_eq!(progress["processed"], 10);
        assert!(aggregated.response.hint.is_some());
    }

    #[tokio::test]
    async fn test_merge_follows_descriptor_order() {
        let endpoints = Endpoints::default();
        let upstream = ScriptedUpstream::new()
            .with_delay("/stats", Duration::from_millis(80), ScriptedUpstream::ok(json!([{ "id": 1 }])))
            .with("/logs", ScriptedUpstream::ok(json!(["line"])));

        let aggregated = aggregator(upstream)
            .aggregate(vec![endpoints.stats(10), endpoints.logs(10)])
            .await
            .unwrap();

        let keys: Vec<&str> = aggregated.response.data.keys().collect();
        assert_eq!(keys, vec!["stats", "logs"]);
        assert_eq!(aggregated.response.status, ResponseStatus::Ok);
    }

    #[tokio::test]
    async fn test_aggregation_is_idempotent() {
        let endpoints = Endpoints::default();
        let upstream = ScriptedUpstream::new()
            .with("/health", ScriptedUpstream::ok(json!({ "components": { "ollama": "up" } })))
            .with("/progress", CallOutcome::UpstreamError { status: 502, raw_body: String::new() });
        let aggregator = aggregator(upstream);

        let calls = || vec![endpoints.health(EndpointClass::Polling), endpoints.progress()];
        let first = aggregator.aggregate(calls()).await.unwrap();
        let second = aggregator.aggregate(calls()).await.unwrap();

        assert_eq!(first.status_code, second.status_code);
        assert!(first.response.eq_ignoring_timestamp(&second.response));
    }

    #[tokio::test]
    async fn test_empty_descriptor_set_is_invariant_violation() {
        let result = aggregator(ScriptedUpstream::new()).aggregate(Vec::new()).await;
        assert!(matches!(result, Err(GatewayError::InvariantViolation(_))));
    }

    #[tokio::test]
    async fn test_all_failed_uses_first_code() {
        let endpoints = Endpoints::default();
        let upstream = ScriptedUpstream::new()
            .with("/stats", CallOutcome::UpstreamError { status: 500, raw_body: "boom".into() })
            .with("/logs", CallOutcome::UpstreamError { status: 404, raw_body: String::new() });

        let aggregated = aggregator(upstream)
            .aggregate(vec![endpoints.stats(5), endpoints.logs(5)])
            .await
            .unwrap();

        assert_eq!(aggregated.status_code, 500);
        assert_eq!(aggregated.response.status, ResponseStatus::Error);
        let error = aggregated.response.error.unwrap();
        assert!(error.contains("500"));
        assert!(error.contains("404"));
        assert_eq!(aggregated.response.data.get("stats"), Some(&json!([])));
    }

    #[tokio::test]
    async fn test_mixed_success_and_error_is_degraded() {
        let endpoints = Endpoints::default();
        let upstream = ScriptedUpstream::new()
            .with("/health", ScriptedUpstream::ok(json!({})))
            .with("/progress", CallOutcome::UpstreamError { status: 500, raw_body: String::new() });

        let aggregated = aggregator(upstream)
            .aggregate(vec![endpoints.health(EndpointClass::Polling), endpoints.progress()])
            .await
            .unwrap();

        assert_eq!(aggregated.status_code, 200);
        assert_eq!(aggregated.response.status, ResponseStatus::Degraded);
    }

    #[tokio::test]
    async fn test_bodyless_upstream_codes_become_200() {
        let endpoints = Endpoints::default();
        let upstream = ScriptedUpstream::new().with(
            "/stats",
            CallOutcome::Success { status: 204, payload: json!({}) },
        );

        let aggregated = aggregator(upstream).aggregate(vec![endpoints.stats(5)]).await.unwrap();
        assert_eq!(aggregated.status_code, 204);

        let response = aggregated.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["stats"].is_array());

        for code in [100, 205, 304] {
            let aggregated = Aggregated { status_code: code, response: AggregatedResponse::failure("x") };
            assert_eq!(aggregated.http_status(), StatusCode::OK, "code {}", code);
        }
        let passthrough = Aggregated { status_code: 503, response: AggregatedResponse::failure("x") };
        assert_eq!(passthrough.http_status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_components_first_descriptor_wins() {
        let endpoints = Endpoints::default();
        let healthy = resolve(
            &endpoints.health(EndpointClass::Polling),
            ScriptedUpstream::ok(json!({ "ollama": "up" })),
        )
        .unwrap();
        let tunnel = resolve(
            &endpoints.health(EndpointClass::Polling),
            CallOutcome::UpstreamError { status: 530, raw_body: String::new() },
        )
        .unwrap();

        let aggregated = merge(vec![healthy, tunnel]).unwrap();
        assert_eq!(aggregated.response.components.get("ollama"), Some(&ComponentState::Ok));
        assert_eq!(aggregated.response.components.len(), 3);
    }
}
