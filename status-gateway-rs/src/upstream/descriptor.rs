//! Outbound call descriptors
//!
//! An `UpstreamCall` is built per request, never mutated, and dropped once
//! its outcome is resolved.

use std::time::Duration;

use config_rs::TimeoutConfig;
use serde_json::Value;

pub const HEALTH_ENDPOINT: &str = "/health";
pub const PROGRESS_ENDPOINT: &str = "/progress";
pub const STATS_ENDPOINT: &str = "/stats";
pub const LOGS_ENDPOINT: &str = "/logs";
pub const PROCESS_START_ENDPOINT: &str = "/process/start";

pub const ACCEPT_JSON: &str = "application/json";

/// How the caller of a gateway route interprets unreachability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointClass {
    /// "Tell me definitively whether the backend is reachable"
    HealthCheck,
    /// Polled by the UI. Transient failures must not look fatal.
    Polling,
    /// Starts upstream work. The caller must learn when it did not happen.
    Trigger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallMethod {
    Get,
    Post,
}

impl CallMethod {
    pub fn as_reqwest(self) -> reqwest::Method {
        match self {
            CallMethod::Get => reqwest::Method::GET,
            CallMethod::Post => reqwest::Method::POST,
        }
    }
}

/// Canonical shape the normalizer produces for a call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSchema {
    Health,
    Progress,
    Stats { limit: usize },
    Logs { tail: usize },
    ProcessStart,
}

impl TargetSchema {
    /// Key of the domain payload in the response. `Health` only reports components.
    pub fn payload_key(&self) -> Option<&'static str> {
        match self {
            TargetSchema::Health => None,
            TargetSchema::Progress => Some("progress"),
            TargetSchema::Stats { .. } => Some("stats"),
            TargetSchema::Logs { .. } => Some("logs"),
            TargetSchema::ProcessStart => Some("process"),
        }
    }
}

/// Descriptor of one outbound request
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamCall {
    pub endpoint: String,
    pub method: CallMethod,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub timeout: Duration,
    pub accept: String,
    pub class: EndpointClass,
    pub schema: TargetSchema,
}

impl UpstreamCall {
    pub fn get(endpoint: impl Into<String>, class: EndpointClass, schema: TargetSchema, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            method: CallMethod::Get,
            query: Vec::new(),
            body: None,
            timeout,
            accept: ACCEPT_JSON.to_string(),
            class,
            schema,
        }
    }

    pub fn post(
        endpoint: impl Into<String>,
        body: Value,
        class: EndpointClass,
        schema: TargetSchema,
        timeout: Duration,
    ) -> Self {
        Self {
            method: CallMethod::Post,
            body: Some(body),
            ..Self::get(endpoint, class, schema, timeout)
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }
}

/// Builds descriptors for the upstream operations with configured time budgets.
///
/// Budgets follow the endpoint (short for health pings, medium for data polls,
/// long for processing triggers); a per-endpoint override wins over the class budget.
#[derive(Debug, Clone, Default)]
pub struct Endpoints {
    timeouts: TimeoutConfig,
}

impl Endpoints {
    pub fn new(timeouts: TimeoutConfig) -> Self {
        Self { timeouts }
    }

    fn budget(&self, endpoint: &str, default: Duration) -> Duration {
        self.timeouts.override_for(endpoint).unwrap_or(default)
    }

    pub fn health(&self, class: EndpointClass) -> UpstreamCall {
        let timeout = self.budget(HEALTH_ENDPOINT, self.timeouts.health);
        UpstreamCall::get(HEALTH_ENDPOINT, class, TargetSchema::Health, timeout)
    }

    pub fn progress(&self) -> UpstreamCall {
        let timeout = self.budget(PROGRESS_ENDPOINT, self.timeouts.polling);
        UpstreamCall::get(PROGRESS_ENDPOINT, EndpointClass::Polling, TargetSchema::Progress, timeout)
    }

    pub fn stats(&self, limit: usize) -> UpstreamCall {
        let timeout = self.budget(STATS_ENDPOINT, self.timeouts.polling);
        UpstreamCall::get(STATS_ENDPOINT, EndpointClass::Polling, TargetSchema::Stats { limit }, timeout)
            .with_query("limit", limit)
    }

    pub fn logs(&self, tail: usize) -> UpstreamCall {
        let timeout = self.budget(LOGS_ENDPOINT, self.timeouts.polling);
        UpstreamCall::get(LOGS_ENDPOINT, EndpointClass::Polling, TargetSchema::Logs { tail }, timeout)
            .with_query("tail", tail)
    }

    pub fn process_start(&self, body: Value) -> UpstreamCall {
        let timeout = self.budget(PROCESS_START_ENDPOINT, self.timeouts.trigger);
        UpstreamCall::post(
            PROCESS_START_ENDPOINT,
            body,
            EndpointClass::Trigger,
            TargetSchema::ProcessStart,
            timeout,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_budgets_follow_endpoint_kind() {
        let endpoints = Endpoints::default();
        let defaults = TimeoutConfig::default();

        assert_eq!(endpoints.health(EndpointClass::Polling).timeout, defaults.health);
        assert_eq!(endpoints.health(EndpointClass::HealthCheck).timeout, defaults.health);
        assert_eq!(endpoints.progress().timeout, defaults.polling);
        assert_eq!(endpoints.process_start(json!({})).timeout, defaults.trigger);
    }

    #[test]
    fn test_override_wins() {
        let mut timeouts = TimeoutConfig::default();
        timeouts.overrides.insert("/logs".to_string(), Duration::from_secs(20));
        let endpoints = Endpoints::new(timeouts);

        assert_eq!(endpoints.logs(10).timeout, Duration::from_secs(20));
        assert_eq!(endpoints.stats(10).timeout, TimeoutConfig::default().polling);
    }

    #[test]
    fn test_descriptor_contents() {
        let endpoints = Endpoints::default();

        let stats = endpoints.stats(25);
        assert_eq!(stats.query, vec![("limit".to_string(), "25".to_string())]);
        assert_eq!(stats.schema, TargetSchema::Stats { limit: 25 });
        assert_eq!(stats.accept, ACCEPT_JSON);

        let start = endpoints.process_start(json!({ "folder": "incoming" }));
        assert_eq!(start.method, CallMethod::Post);
        assert_eq!(start.class, EndpointClass::Trigger);
        assert_eq!(start.body, Some(json!({ "folder": "incoming" })));
        assert_eq!(start.schema.payload_key(), Some("process"));
    }
}
