//! Canonical response types
//!
//! `AggregatedResponse` is the envelope every gateway route returns. Its field
//! set never depends on upstream outcomes: failures only change values.

use chrono::{DateTime, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Health label for one named component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentState {
    Ok,
    Offline,
    /// Cannot currently be determined. Distinct from `Offline`.
    #[default]
    Unknown,
    Error,
}

impl fmt::Display for ComponentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ComponentState::Ok => "ok",
            ComponentState::Offline => "offline",
            ComponentState::Unknown => "unknown",
            ComponentState::Error => "error",
        };
        f.write_str(label)
    }
}

/// Top-level status of an aggregated response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Ok,
    Pending,
    Degraded,
    Error,
}

impl ResponseStatus {
    fn severity(self) -> u8 {
        match self {
            ResponseStatus::Ok => 0,
            ResponseStatus::Pending => 1,
            ResponseStatus::Degraded => 2,
            ResponseStatus::Error => 3,
        }
    }

    /// The more severe of two statuses
    pub fn worst(self, other: ResponseStatus) -> ResponseStatus {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }
}

/// Insertion-ordered string map, serialized as a JSON object.
///
/// Keys keep the position of their first insertion so output ordering follows
/// descriptor order rather than completion order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OrderedMap<V> {
    entries: Vec<(String, V)>,
}

impl<V> OrderedMap<V> {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Insert or replace. A replaced key keeps its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Insert only if the key is not present yet
    pub fn insert_if_absent(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        if !self.contains_key(&key) {
            self.entries.push((key, value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V> FromIterator<(String, V)> for OrderedMap<V> {
    fn from_iter<I: IntoIterator<Item = (String, V)>>(iter: I) -> Self {
        let mut map = OrderedMap::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

impl<V> IntoIterator for OrderedMap<V> {
    type Item = (String, V);
    type IntoIter = std::vec::IntoIter<(String, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Normalized result of one upstream call, before policy decisions
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub components: OrderedMap<ComponentState>,
    /// Domain payload keyed by its canonical name (`progress`, `stats`, ...)
    pub payload: Option<(String, Value)>,
    /// Diagnostic message for non-success outcomes
    pub error: Option<String>,
}

/// The envelope returned to callers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedResponse {
    pub status: ResponseStatus,
    pub components: OrderedMap<ComponentState>,
    #[serde(flatten)]
    pub data: OrderedMap<Value>,
    pub hint: Option<String>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AggregatedResponse {
    /// Shaped body for a request that failed inside the gateway itself
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            components: OrderedMap::new(),
            data: OrderedMap::new(),
            hint: None,
            error: Some(message.into()),
            timestamp: Utc::now(),
        }
    }

    /// Field-for-field comparison that ignores `timestamp`
    pub fn eq_ignoring_timestamp(&self, other: &AggregatedResponse) -> bool {
        self.status == other.status
            && self.components == other.components
            && self.data == other.data
            && self.hint == other.hint
            && self.error == other.error
    }
}
