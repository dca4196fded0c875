//! Opt-in bounded retry for upstream calls
//!
//! Wraps any `Upstream`. Only reachability failures are retried, each attempt
//! gets the descriptor's full time budget, and trigger calls are never
//! repeated. With `max_retries = 0` the wrapper behaves like the inner client.

use std::time::Duration;

use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use config_rs::RetrySettings;
use tracing::{debug, warn};

use crate::upstream::{CallOutcome, EndpointClass, Upstream, UpstreamCall};

const MAX_BACKOFF_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct RetryingUpstream<U> {
    inner: U,
    settings: RetrySettings,
}

impl<U: Upstream> RetryingUpstream<U> {
    pub fn new(inner: U, settings: RetrySettings) -> Self {
        Self { inner, settings }
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.settings.initial_backoff)
            .with_max_interval(MAX_BACKOFF_INTERVAL.max(self.settings.initial_backoff))
            .with_multiplier(2.0)
            .with_randomization_factor(0.2)
            .with_max_elapsed_time(None)
            .build()
    }
}

fn is_retryable(outcome: &CallOutcome) -> bool {
    matches!(
        outcome,
        CallOutcome::Timeout { .. } | CallOutcome::ConnectionRefused { .. }
    )
}

#[async_trait]
impl<U: Upstream> Upstream for RetryingUpstream<U> {
    async fn call(&self, call: &UpstreamCall) -> CallOutcome {
        let mut outcome = self.inner.call(call).await;
        if call.class == EndpointClass::Trigger || self.settings.max_retries == 0 {
            return outcome;
        }

        let mut backoff = self.backoff();
        let mut attempts = 0;

        while is_retryable(&outcome) && attempts < self.settings.max_retries {
            let Some(delay) = backoff.next_backoff() else {
                break;
            };

            attempts += 1;
            warn!(
                endpoint = %call.endpoint,
                outcome = outcome.kind(),
                attempt = attempts,
                max_retries = self.settings.max_retries,
                delay_ms = delay.as_millis() as u64,
                "Retrying upstream call"
            );
            tokio::time::sleep(delay).await;
            outcome = self.inner.call(call).await;
        }

        if attempts > 0 {
            debug!(endpoint = %call.endpoint, attempts, outcome = outcome.kind(), "Retries finished");
        }
        outcome
    }
}
