//! Degradation policy
//!
//! Chooses the HTTP status and top-level status returned for an outcome.
//!
//! | outcome                  | polling            | health-check / trigger |
//! |--------------------------|--------------------|------------------------|
//! | success                  | upstream status    | upstream status        |
//! | timeout                  | 200, degraded      | 504, error             |
//! | connection refused       | 200, degraded      | 503, error             |
//! | pending-class error      | upstream status    | upstream status        |
//! | tunnel-class error       | 200, degraded      | 200, degraded          |
//! | other error / malformed  | upstream status    | upstream status        |
//!
//! Polling routes must not make the UI treat a blip as fatal; health-check
//! routes must surface unreachability.

use crate::classifier::is_pending_status;
use crate::model::{Fragment, ResponseStatus};
use crate::upstream::{CallOutcome, EndpointClass};

pub const TIMEOUT_POLLING_HINT: &str =
    "The processing service is slow to respond. Data will refresh on the next poll.";
pub const TIMEOUT_HEALTH_HINT: &str = "The processing service did not answer within its time budget.";
pub const REFUSED_HINT: &str = "Could not reach the processing service. Check that it is running \
     and that GATEWAY_UPSTREAM_URL points at it.";
pub const PENDING_HINT: &str = "The processing service accepted the request but is not ready yet.";
pub const MALFORMED_HINT: &str = "The processing service sent a response the gateway could not read.";

/// Policy result: what the caller receives for one descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub status_code: u16,
    pub status: ResponseStatus,
    pub hint: Option<String>,
    pub fragment: Fragment,
}

impl Decision {
    pub fn is_success_code(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Apply the policy table to a classified outcome and its normalized fragment
pub fn decide(outcome: &CallOutcome, class: EndpointClass, fragment: Fragment) -> Decision {
    let polling = class == EndpointClass::Polling;

    let (status_code, status, hint) = match outcome {
        CallOutcome::Success { status, .. } if is_pending_status(*status) => {
            (*status, ResponseStatus::Pending, None)
        }
        CallOutcome::Success { status, .. } => (*status, ResponseStatus::Ok, None),

        CallOutcome::Timeout { .. } if polling => {
            (200, ResponseStatus::Degraded, Some(TIMEOUT_POLLING_HINT.to_string()))
        }
        CallOutcome::Timeout { .. } => (504, ResponseStatus::Error, Some(TIMEOUT_HEALTH_HINT.to_string())),

        CallOutcome::ConnectionRefused { .. } if polling => {
            (200, ResponseStatus::Degraded, Some(REFUSED_HINT.to_string()))
        }
        CallOutcome::ConnectionRefused { .. } => (503, ResponseStatus::Error, Some(REFUSED_HINT.to_string())),

        CallOutcome::UpstreamError { status, .. } if is_pending_status(*status) => {
            (*status, ResponseStatus::Pending, Some(PENDING_HINT.to_string()))
        }

        CallOutcome::Tunnel { hint, .. } => (200, ResponseStatus::Degraded, Some(hint.clone())),

        CallOutcome::UpstreamError { status, .. } => (*status, ResponseStatus::Error, None),

        CallOutcome::Malformed { status, .. } => {
            (*status, ResponseStatus::Error, Some(MALFORMED_HINT.to_string()))
        }
    };

    Decision {
        status_code,
        status,
        hint,
        fragment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;
    use crate::model::ComponentState;
    use crate::normalize::normalize;
    use crate::upstream::TargetSchema;
    use serde_json::json;
    use std::time::Duration;

    fn run(outcome: CallOutcome, class: EndpointClass, schema: TargetSchema) -> Decision {
        let outcome = classify(outcome);
        let fragment = normalize(&outcome, &schema);
        decide(&outcome, class, fragment)
    }

    #[test]
    fn test_success_passes_status_through() {
        let decision = run(
            CallOutcome::Success { status: 200, payload: json!({ "incoming": 1 }) },
            EndpointClass::Polling,
            TargetSchema::Progress,
        );
        assert_eq!(decision.status_code, 200);
        assert_eq!(decision.status, ResponseStatus::Ok);
        assert!(decision.hint.is_none());
    }

    #[test]
    fn test_success_pending_class() {
        let decision = run(
            CallOutcome::Success { status: 202, payload: json!({ "job_id": "j1" }) },
            EndpointClass::Trigger,
            TargetSchema::ProcessStart,
        );
        assert_eq!(decision.status_code, 202);
        assert_eq!(decision.status, ResponseStatus::Pending);
    }

    #[test]
    fn test_timeout_split() {
        let timeout = || CallOutcome::Timeout { budget: Duration::from_secs(5) };

        let polling = run(timeout(), EndpointClass::Polling, TargetSchema::Progress);
        assert_eq!(polling.status_code, 200);
        assert_eq!(polling.status, ResponseStatus::Degraded);
        assert!(polling.fragment.error.is_some());
        assert!(polling.fragment.payload.is_some());

        let health = run(timeout(), EndpointClass::HealthCheck, TargetSchema::Health);
        assert_eq!(health.status_code, 504);
        assert_eq!(health.status, ResponseStatus::Error);

        let trigger = run(timeout(), EndpointClass::Trigger, TargetSchema::ProcessStart);
        assert_eq!(trigger.status_code, 504);
    }

    #[test]
    fn test_connection_refused_split() {
        let refused = || CallOutcome::ConnectionRefused { message: "refused".to_string() };

        let polling = run(refused(), EndpointClass::Polling, TargetSchema::Health);
        assert_eq!(polling.status_code, 200);
        assert_eq!(polling.status, ResponseStatus::Degraded);
        assert_eq!(polling.hint.as_deref(), Some(REFUSED_HINT));

        let health = run(refused(), EndpointClass::HealthCheck, TargetSchema::Health);
        assert_eq!(health.status_code, 503);
        assert_eq!(health.status, ResponseStatus::Error);
        assert_eq!(health.hint.as_deref(), Some(REFUSED_HINT));
    }

    #[test]
    fn test_pending_upstream_error() {
        let parsed = run(
            CallOutcome::UpstreamError { status: 409, raw_body: json!({ "status": "queued", "job_id": "j9" }).to_string() },
            EndpointClass::Trigger,
            TargetSchema::ProcessStart,
        );
        assert_eq!(parsed.status_code, 409);
        assert_eq!(parsed.status, ResponseStatus::Pending);
        assert_eq!(parsed.fragment.payload.unwrap().1["status"], "queued");

        let unparsed = run(
            CallOutcome::UpstreamError { status: 425, raw_body: "Too Early".to_string() },
            EndpointClass::Trigger,
            TargetSchema::ProcessStart,
        );
        assert_eq!(unparsed.status_code, 425);
        assert_eq!(unparsed.fragment.payload.unwrap().1["status"], "pending");
    }

    #[test]
    fn test_tunnel_status_is_200_unknown() {
        for class in [EndpointClass::HealthCheck, EndpointClass::Polling] {
            let decision = run(
                CallOutcome::UpstreamError { status: 502, raw_body: "Bad Gateway".to_string() },
                class,
                TargetSchema::Health,
            );
            assert_eq!(decision.status_code, 200);
            assert_eq!(decision.status, ResponseStatus::Degraded);
            assert!(decision.hint.unwrap().contains("502"));
            assert!(decision
                .fragment
                .components
                .iter()
                .all(|(_, state)| *state == ComponentState::Unknown));
        }
    }

    #[test]
    fn test_other_upstream_error_passes_through() {
        let decision = run(
            CallOutcome::UpstreamError { status: 500, raw_body: json!({ "error": "boom", "processed": 4 }).to_string() },
            EndpointClass::Polling,
            TargetSchema::Progress,
        );
        assert_eq!(decision.status_code, 500);
        assert_eq!(decision.status, ResponseStatus::Error);
        let (_, progress) = decision.fragment.payload.unwrap();
        assert_eq!(progress["processed"], 4);
        assert_eq!(progress["incoming"], 0);
    }

    #[test]
    fn test_malformed_is_handled_like_upstream_error() {
        let decision = run(
            CallOutcome::Malformed { status: 200, raw_body: "<html>".to_string(), message: "expected value".to_string() },
            EndpointClass::Polling,
            TargetSchema::Health,
        );
        assert_eq!(decision.status_code, 200);
        assert_eq!(decision.status, ResponseStatus::Error);
        assert_eq!(decision.fragment.components.get("flask"), Some(&ComponentState::Error));
    }
}
