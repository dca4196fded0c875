//! Response normalizer
//!
//! Maps whatever the upstream sent (or failed to send) onto the canonical
//! schema for a descriptor. Field-name drift is handled by the alias tables
//! below: each canonical field lists the upstream paths it may come from, the
//! first present one wins. New upstream variants are added to the tables, not
//! to the code.

use std::borrow::Cow;

use serde_json::{json, Map, Value};

use crate::classifier::is_pending_status;
use crate::model::{ComponentState, Fragment, OrderedMap};
use crate::upstream::{CallOutcome, TargetSchema};

/// Canonical field -> upstream paths (dot separated for nesting)
pub type AliasTable = &'static [(&'static str, &'static [&'static str])];

pub const HEALTH_COMPONENTS: AliasTable = &[
    ("flask", &["components.flask", "flask", "flask_status", "services.flask"]),
    ("ollama", &["components.ollama", "ollama", "ollama_status", "services.ollama"]),
    (
        "supabase",
        &["components.supabase", "supabase", "components.storage", "storage", "database", "db_status"],
    ),
];

/// The component that answers the health call itself
pub const RESPONDER: &str = "flask";

pub const PROGRESS_COUNTERS: AliasTable = &[
    ("incoming", &["incoming", "queued", "files_queued", "pending"]),
    ("processed", &["processed", "files_processed", "done"]),
    ("library", &["library", "archived", "files_library"]),
    ("errors", &["errors", "errored", "files_errored", "failed"]),
    ("review", &["review", "needs_review", "files_review"]),
];

const PROGRESS_CONTAINERS: &[&str] = &["progress", "counts"];
const STATS_KEYS: &[&str] = &["stats", "records", "data", "items"];
const LOG_KEYS: &[&str] = &["logs", "lines", "entries"];
const LOG_LINE_KEYS: &[&str] = &["message", "line", "msg"];
const ERROR_MESSAGE_KEYS: &[&str] = &["error", "message", "detail"];

pub const PROCESS_FIELDS: AliasTable = &[
    ("job_id", &["job_id", "id", "task_id"]),
    ("status", &["status", "state"]),
    ("message", &["message", "detail", "msg"]),
];

const MAX_ERROR_EXCERPT: usize = 200;

/// Resolve a dot separated path. `null` counts as absent.
fn lookup<'a>(payload: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = payload;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    (!current.is_null()).then_some(current)
}

fn first_present<'a>(payload: &'a Value, aliases: &[&str]) -> Option<&'a Value> {
    aliases.iter().find_map(|alias| lookup(payload, alias))
}

fn aliases_for(table: AliasTable, field: &str) -> &'static [&'static str] {
    table
        .iter()
        .find(|(name, _)| *name == field)
        .map(|(_, aliases)| *aliases)
        .unwrap_or(&[])
}

/// Interpret an upstream status value (`"healthy"`, `true`, `{status: "up"}`, ...)
pub fn component_state(value: &Value) -> ComponentState {
    match value {
        Value::Bool(true) => ComponentState::Ok,
        Value::Bool(false) => ComponentState::Offline,
        Value::String(label) => state_from_label(label),
        Value::Object(map) => map
            .get("status")
            .or_else(|| map.get("state"))
            .map(component_state)
            .unwrap_or(ComponentState::Unknown),
        _ => ComponentState::Unknown,
    }
}

fn state_from_label(label: &str) -> ComponentState {
    match label.trim().to_ascii_lowercase().as_str() {
        "ok" | "healthy" | "up" | "online" | "connected" | "running" | "true" => ComponentState::Ok,
        "offline" | "down" | "disconnected" | "stopped" | "unreachable" | "false" => ComponentState::Offline,
        "error" | "failed" | "unhealthy" | "degraded" => ComponentState::Error,
        _ => ComponentState::Unknown,
    }
}

fn as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// State of the responding component when the payload does not say
fn responder_default(outcome: &CallOutcome) -> ComponentState {
    match outcome {
        CallOutcome::Success { .. } => ComponentState::Ok,
        CallOutcome::Timeout { .. } | CallOutcome::ConnectionRefused { .. } => ComponentState::Offline,
        CallOutcome::Tunnel { .. } => ComponentState::Unknown,
        CallOutcome::UpstreamError { status, .. } if is_pending_status(*status) => ComponentState::Unknown,
        CallOutcome::UpstreamError { .. } | CallOutcome::Malformed { .. } => ComponentState::Error,
    }
}

/// The payload to read fields from. Error bodies are used when they parse.
fn source_payload(outcome: &CallOutcome) -> Option<Cow<'_, Value>> {
    match outcome {
        CallOutcome::Success { payload, .. } => Some(Cow::Borrowed(payload)),
        CallOutcome::UpstreamError { raw_body, .. } | CallOutcome::Tunnel { raw_body, .. } => {
            serde_json::from_str::<Value>(raw_body).ok().map(Cow::Owned)
        }
        CallOutcome::Timeout { .. } | CallOutcome::ConnectionRefused { .. } | CallOutcome::Malformed { .. } => None,
    }
}

fn is_pending(outcome: &CallOutcome) -> bool {
    match outcome {
        CallOutcome::Success { status, .. } | CallOutcome::UpstreamError { status, .. } => is_pending_status(*status),
        _ => false,
    }
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() > MAX_ERROR_EXCERPT {
        format!("{}...", trimmed.chars().take(MAX_ERROR_EXCERPT).collect::<String>())
    } else {
        trimmed.to_string()
    }
}

fn diagnostic(outcome: &CallOutcome, source: Option<&Value>) -> Option<String> {
    match outcome {
        CallOutcome::Success { .. } => None,
        CallOutcome::Timeout { budget } => Some(format!(
            "Upstream request timed out after {}ms",
            budget.as_millis()
        )),
        CallOutcome::ConnectionRefused { message } => Some(format!("Could not connect to upstream: {}", message)),
        CallOutcome::UpstreamError { status, raw_body } => {
            let detail = source
                .and_then(|payload| first_present(payload, ERROR_MESSAGE_KEYS))
                .and_then(scalar_string)
                .unwrap_or_else(|| excerpt(raw_body));

            let prefix = if is_pending_status(*status) {
                format!("Upstream is not ready yet (HTTP {})", status)
            } else {
                format!("Upstream returned HTTP {}", status)
            };

            if detail.is_empty() {
                Some(prefix)
            } else {
                Some(format!("{}: {}", prefix, detail))
            }
        }
        CallOutcome::Malformed { status, message, .. } => Some(format!(
            "Upstream returned an unreadable payload (HTTP {}): {}",
            status, message
        )),
        CallOutcome::Tunnel { status, .. } => Some(format!("Tunnel returned HTTP {}", status)),
    }
}

fn health_components(source: Option<&Value>, responder: ComponentState) -> OrderedMap<ComponentState> {
    HEALTH_COMPONENTS
        .iter()
        .map(|(name, aliases)| {
            let found = source
                .and_then(|payload| first_present(payload, aliases))
                .map(component_state);

            let state = match found {
                Some(state) => state,
                None if *name == RESPONDER => responder,
                None => ComponentState::Unknown,
            };
            (name.to_string(), state)
        })
        .collect()
}

fn progress_payload(source: Option<&Value>) -> Value {
    let container = source.map(|payload| {
        PROGRESS_CONTAINERS
            .iter()
            .find_map(|key| payload.get(*key).filter(|v| v.is_object()))
            .unwrap_or(payload)
    });

    let mut counters = Map::new();
    for (name, aliases) in PROGRESS_COUNTERS {
        let count = container
            .and_then(|payload| {
                aliases
                    .iter()
                    .filter_map(|alias| lookup(payload, alias))
                    .find_map(as_count)
            })
            .unwrap_or(0);
        counters.insert(name.to_string(), Value::from(count));
    }
    Value::Object(counters)
}

fn records(source: Option<&Value>, keys: &[&str]) -> Vec<Value> {
    match source {
        Some(Value::Array(items)) => items.clone(),
        Some(payload) => keys
            .iter()
            .find_map(|key| lookup(payload, key).and_then(Value::as_array))
            .cloned()
            .unwrap_or_default(),
        None => Vec::new(),
    }
}

fn stats_payload(source: Option<&Value>, limit: usize) -> Value {
    let mut stats = records(source, STATS_KEYS);
    stats.truncate(limit);
    Value::Array(stats)
}

fn log_line(entry: &Value) -> Option<String> {
    match entry {
        Value::Null => None,
        Value::String(line) => Some(line.clone()),
        Value::Object(_) => Some(
            first_present(entry, LOG_LINE_KEYS)
                .and_then(scalar_string)
                .unwrap_or_else(|| entry.to_string()),
        ),
        other => Some(other.to_string()),
    }
}

fn logs_payload(source: Option<&Value>, tail: usize) -> Value {
    let lines: Vec<Value> = records(source, LOG_KEYS)
        .iter()
        .filter_map(log_line)
        .map(Value::String)
        .collect();

    let skip = lines.len().saturating_sub(tail);
    Value::Array(lines.into_iter().skip(skip).collect())
}

fn process_payload(source: Option<&Value>, pending: bool) -> Value {
    let field = |name: &str| {
        source
            .and_then(|payload| first_present(payload, aliases_for(PROCESS_FIELDS, name)))
            .and_then(scalar_string)
    };

    let default_status = if pending { "pending" } else { "unknown" };

    json!({
        "job_id": field("job_id"),
        "status": field("status").unwrap_or_else(|| default_status.to_string()),
        "message": field("message"),
    })
}

/// Normalize one outcome into the canonical fragment for `schema`.
///
/// Total over all outcomes: every canonical field is present in the result,
/// populated with defaults where the upstream gave nothing usable.
pub fn normalize(outcome: &CallOutcome, schema: &TargetSchema) -> Fragment {
    let source = source_payload(outcome);
    let source = source.as_deref();

    let components = match schema {
        TargetSchema::Health => {
            // Tunnel bodies come from the hop, not the service
            let component_source = if matches!(outcome, CallOutcome::Tunnel { .. }) {
                None
            } else {
                source
            };
            health_components(component_source, responder_default(outcome))
        }
        _ => OrderedMap::new(),
    };

    let payload = schema.payload_key().map(|key| {
        let value = match schema {
            TargetSchema::Health => Value::Null,
            TargetSchema::Progress => progress_payload(source),
            TargetSchema::Stats { limit } => stats_payload(source, *limit),
            TargetSchema::Logs { tail } => logs_payload(source, *tail),
            TargetSchema::ProcessStart => process_payload(source, is_pending(outcome)),
        };
        (key.to_string(), value)
    });

    Fragment {
        components,
        payload,
        error: diagnostic(outcome, source),
    }
}
