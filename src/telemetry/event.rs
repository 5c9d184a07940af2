use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Usage event names that also feed the session metrics
pub const REQUEST_EXECUTED: &str = "request_executed";
pub const PROJECT_CREATED: &str = "project_created";
pub const FOLDER_CREATED: &str = "folder_created";

/// Coerce a JSON value into event metadata. Objects are taken as is, `null`
/// becomes empty and anything else is wrapped under `"value"`.
pub fn metadata_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("value".into(), other);
            map
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Error,
    Usage,
    SessionStart,
    SessionEnd,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Error => "error",
            EventKind::Usage => "usage",
            EventKind::SessionStart => "session_start",
            EventKind::SessionEnd => "session_end",
        }
    }

    /// Session events skip the queue and the rate limiter
    pub fn is_session(&self) -> bool {
        matches!(self, EventKind::SessionStart | EventKind::SessionEnd)
    }

    pub fn title(&self) -> &'static str {
        match self {
            EventKind::Error => "Error Report",
            EventKind::Usage => "Usage Event",
            EventKind::SessionStart => "Session Started",
            EventKind::SessionEnd => "Session Ended",
        }
    }

    /// Embed color (decimal RGB)
    pub fn color(&self) -> u32 {
        match self {
            EventKind::Error => 15158332,
            EventKind::Usage => 3447003,
            EventKind::SessionStart => 3066993,
            EventKind::SessionEnd => 9807270,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Event {
    pub kind: EventKind,
    pub message: String,
    pub metadata: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Event {
            kind,
            message: message.into(),
            metadata: Map::new(),
            stack: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_stack(mut self, stack: Option<String>) -> Self {
        self.stack = stack.filter(|s| !s.is_empty());
        self
    }

    /// SHA-256 over `kind:message:metadata`. The timestamp is excluded so
    /// repeats of the same event collide.
    pub fn content_hash(&self) -> String {
        let metadata = serde_json::to_string(&self.metadata).unwrap_or_default();
        let data = format!("{}:{}:{}", self.kind.as_str(), self.message, metadata);
        format!("{:x}", Sha256::digest(data.as_bytes()))
    }
}

/// Counters for the current process
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Metrics {
    pub request_count: u64,
    pub project_count: u64,
    pub folder_count: u64,
    pub last_request_time: Option<DateTime<Utc>>,
    pub session_start: DateTime<Utc>,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics {
            request_count: 0,
            project_count: 0,
            folder_count: 0,
            last_request_time: None,
            session_start: Utc::now(),
        }
    }

    pub fn record(&mut self, usage: &str) {
        match usage {
            REQUEST_EXECUTED => {
                self.request_count += 1;
                self.last_request_time = Some(Utc::now());
            }
            PROJECT_CREATED => self.project_count += 1,
            FOLDER_CREATED => self.folder_count += 1,
            _ => {}
        }
    }

    /// Metadata attached to the session-end event
    pub fn session_summary(&self) -> Map<String, Value> {
        let duration = (Utc::now() - self.session_start).num_milliseconds() as f64 / 1000.0;
        let mut summary = Map::new();
        summary.insert("request_count".into(), self.request_count.into());
        summary.insert("project_count".into(), self.project_count.into());
        summary.insert("folder_count".into(), self.folder_count.into());
        summary.insert("session_duration".into(), duration.into());
        summary.insert(
            "last_request_time".into(),
            self.last_request_time
                .map(|t| Value::String(t.to_rfc3339()))
                .unwrap_or(Value::Null),
        );
        summary
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hash_ignores_timestamp_and_key_order() {
        let a = Event::new(EventKind::Usage, "request_executed")
            .with_metadata(metadata_map(json!({"status": 200, "request_id": 1})));
        let mut b = Event::new(EventKind::Usage, "request_executed")
            .with_metadata(metadata_map(json!({"request_id": 1, "status": 200})));
        b.timestamp = a.timestamp - chrono::Duration::minutes(5);

        assert_eq!(a.content_hash(), b.content_hash());
        assert_eq!(a.content_hash().len(), 64);
    }

    #[test]
    fn test_hash_distinguishes_kind_and_metadata() {
        let usage = Event::new(EventKind::Usage, "boom");
        let error = Event::new(EventKind::Error, "boom");
        assert_ne!(usage.content_hash(), error.content_hash());

        let other = Event::new(EventKind::Usage, "boom")
            .with_metadata(metadata_map(json!({"request_id": 2})));
        assert_ne!(usage.content_hash(), other.content_hash());
    }

    #[test]
    fn test_metadata_coercion() {
        assert!(metadata_map(Value::Null).is_empty());
        assert_eq!(metadata_map(json!(3))["value"], 3);
        assert_eq!(metadata_map(json!({"a": 1}))["a"], 1);
    }

    #[test]
    fn test_metrics_record() {
        let mut metrics = Metrics::new();
        metrics.record(REQUEST_EXECUTED);
        metrics.record(REQUEST_EXECUTED);
        metrics.record(PROJECT_CREATED);
        metrics.record("something_else");

        assert_eq!(metrics.request_count, 2);
        assert_eq!(metrics.project_count, 1);
        assert_eq!(metrics.folder_count, 0);
        assert!(metrics.last_request_time.is_some());

        let summary = metrics.session_summary();
        assert_eq!(summary["request_count"], 2);
        assert!(summary["session_duration"].is_number());
    }
}
