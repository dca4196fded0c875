//! Tunnel-error classification and status-code classes
//!
//! The upstream is reached through a reverse tunnel. Statuses produced by that
//! hop say nothing about whether the backing service is up, so they are
//! relabelled before the degradation policy sees them.

use crate::upstream::CallOutcome;

/// Statuses emitted by the intermediary hop rather than the backing service:
/// 502/504 from the proxy, 520-527 and 530 from the tunnel edge.
pub fn is_tunnel_status(status: u16) -> bool {
    matches!(status, 502 | 504 | 520..=527 | 530)
}

/// Statuses meaning "accepted or busy, not ready yet"
pub fn is_pending_status(status: u16) -> bool {
    matches!(status, 202 | 409 | 423 | 425)
}

/// Relabel tunnel-class upstream errors as `CallOutcome::Tunnel`. Every other
/// outcome passes through untouched.
pub fn classify(outcome: CallOutcome) -> CallOutcome {
    match outcome {
        CallOutcome::UpstreamError { status, raw_body } if is_tunnel_status(status) => CallOutcome::Tunnel {
            status,
            raw_body,
            hint: tunnel_hint(status),
        },
        other => other,
    }
}

fn tunnel_hint(status: u16) -> String {
    format!(
        "The tunnel in front of the processing service returned HTTP {}. \
         This is usually transient; the service state will refresh on the next poll.",
        status
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn upstream_error(status: u16) -> CallOutcome {
        CallOutcome::UpstreamError {
            status,
            raw_body: "<html>Bad gateway</html>".to_string(),
        }
    }

    #[test]
    fn test_gateway_statuses_become_tunnel() {
        for status in [502, 504, 520, 524, 527, 530] {
            match classify(upstream_error(status)) {
                CallOutcome::Tunnel { status: s, raw_body, hint } => {
                    assert_eq!(s, status);
                    assert_eq!(raw_body, "<html>Bad gateway</html>");
                    assert!(hint.contains(&status.to_string()));
                }
                other => panic!("expected tunnel for {}, got {:?}", status, other),
            }
        }
    }

    #[test]
    fn test_other_outcomes_pass_through() {
        for status in [500, 503, 404, 528] {
            assert_eq!(classify(upstream_error(status)), upstream_error(status));
        }

        let timeout = CallOutcome::Timeout { budget: Duration::from_secs(5) };
        assert_eq!(classify(timeout.clone()), timeout);

        let success = CallOutcome::Success {
            status: 502,
            payload: serde_json::json!({}),
        };
        assert_eq!(classify(success.clone()), success);
    }

    #[test]
    fn test_pending_class() {
        assert!(is_pending_status(202));
        assert!(is_pending_status(425));
        assert!(!is_pending_status(200));
        assert!(!is_pending_status(500));
    }
}
