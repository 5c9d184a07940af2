use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

use super::actor::FlushLoop;
use super::event::{metadata_map, Event, EventKind, Metrics};
use super::payload;
use super::sink::{ReqwestWebhook, WebhookSink};
use crate::constants::TELEMETRY_RATE_WINDOW;
use crate::models::TelemetryConfig;
use crate::storage::Store;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Error and usage reporting to a webhook.
///
/// Queued events are drained by [`flush`](Telemetry::flush), normally from
/// the loop started with [`spawn_flush_loop`](Telemetry::spawn_flush_loop).
/// Session events are delivered straight away. Nothing here reports failure
/// to the caller.
pub struct Telemetry<S: WebhookSink = ReqwestWebhook> {
    store: Arc<dyn Store>,
    sink: S,
    /// Build-provided webhook, preferred over the stored override
    service_url: Option<String>,
    version: String,
    config: Mutex<Option<TelemetryConfig>>,
    queue: Mutex<Vec<Event>>,
    rate_limits: Mutex<HashMap<EventKind, Instant>>,
    metrics: Mutex<Metrics>,
}

impl<S: WebhookSink> Telemetry<S> {
    pub fn new(
        store: Arc<dyn Store>,
        sink: S,
        service_url: Option<String>,
        version: impl Into<String>,
    ) -> Self {
        Telemetry {
            store,
            sink,
            service_url: service_url.filter(|url| !url.is_empty()),
            version: version.into(),
            config: Mutex::new(None),
            queue: Mutex::new(Vec::new()),
            rate_limits: Mutex::new(HashMap::new()),
            metrics: Mutex::new(Metrics::new()),
        }
    }

    fn load_config(&self) -> Option<TelemetryConfig> {
        let mut cached = lock(&self.config);
        if cached.is_none() {
            match self.store.telemetry_config() {
                Ok(config) => *cached = Some(config),
                Err(e) => tracing::debug!(error = %e, "Failed to load telemetry config"),
            }
        }
        cached.clone()
    }

    /// Current settings; defaults when the store cannot be read
    pub fn config(&self) -> TelemetryConfig {
        self.load_config().unwrap_or_default()
    }

    pub fn update_config(&self, config: TelemetryConfig) {
        match self.store.update_telemetry_config(&config) {
            Ok(()) => *lock(&self.config) = Some(config),
            Err(e) => tracing::warn!(error = %e, "Failed to save telemetry config"),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        let mut config = self.config();
        config.enabled = enabled;
        self.update_config(config);
    }

    fn webhook_url(&self, config: &TelemetryConfig) -> Option<String> {
        self.service_url.clone().or_else(|| {
            (!config.webhook_url.is_empty()).then(|| config.webhook_url.clone())
        })
    }

    /// Enabled and a webhook is configured
    pub fn is_enabled(&self) -> bool {
        self.load_config()
            .is_some_and(|config| config.enabled && self.webhook_url(&config).is_some())
    }

    pub fn metrics(&self) -> Metrics {
        lock(&self.metrics).clone()
    }

    /// Events waiting for the next flush
    pub fn pending(&self) -> usize {
        lock(&self.queue).len()
    }

    fn enqueue(&self, event: Event) {
        lock(&self.queue).push(event);
    }

    pub fn report_error(&self, message: impl Into<String>, stack: Option<String>) {
        if !self.is_enabled() {
            return;
        }
        self.enqueue(Event::new(EventKind::Error, message).with_stack(stack));
    }

    /// Queue a usage event. Counters are updated even when reporting is off.
    pub fn report_usage(&self, name: &str, metadata: Value) {
        lock(&self.metrics).record(name);
        if !self.is_enabled() {
            return;
        }
        self.enqueue(Event::new(EventKind::Usage, name).with_metadata(metadata_map(metadata)));
    }

    pub async fn report_session_start(&self) {
        if !self.is_enabled() {
            return;
        }
        self.deliver(Event::new(EventKind::SessionStart, "session_start"))
            .await;
    }

    /// Sent immediately with the session summary
    pub async fn report_session_end(&self) {
        if !self.is_enabled() {
            return;
        }
        let summary = lock(&self.metrics).session_summary();
        self.deliver(Event::new(EventKind::SessionEnd, "session_end").with_metadata(summary))
            .await;
    }

    /// Drain the queue and attempt delivery of everything in it
    pub async fn flush(&self) {
        let events = std::mem::take(&mut *lock(&self.queue));
        if events.is_empty() {
            return;
        }
        tracing::debug!(count = events.len(), "Flushing telemetry events");
        for event in events {
            if !self.is_enabled() {
                return;
            }
            if event.kind.is_session() {
                continue;
            }
            if !self.take_rate_slot(event.kind) {
                tracing::debug!(kind = event.kind.as_str(), "Telemetry event rate limited");
                continue;
            }
            self.deliver(event).await;
        }
    }

    /// At most one queued delivery per kind per window
    fn take_rate_slot(&self, kind: EventKind) -> bool {
        let now = Instant::now();
        let mut limits = lock(&self.rate_limits);
        if let Some(last) = limits.get(&kind) {
            if now.duration_since(*last) < TELEMETRY_RATE_WINDOW {
                return false;
            }
        }
        limits.insert(kind, now);
        true
    }

    fn installation_id(&self) -> Option<String> {
        let mut config = self.load_config()?;
        if !config.installation_id.is_empty() {
            return Some(config.installation_id);
        }
        config.installation_id = uuid::Uuid::new_v4().to_string();
        let id = config.installation_id.clone();
        match self.store.update_telemetry_config(&config) {
            Ok(()) => {
                *lock(&self.config) = Some(config);
                Some(id)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to save installation id");
                None
            }
        }
    }

    /// Dedup, then post. A duplicate is dropped silently.
    async fn deliver(&self, event: Event) {
        let Some(url) = self.load_config().and_then(|config| self.webhook_url(&config)) else {
            return;
        };

        let hash = event.content_hash();
        match self.store.is_event_duplicated(&hash) {
            Ok(true) => {
                tracing::debug!(kind = event.kind.as_str(), "Skipping duplicate telemetry event");
                return;
            }
            Ok(false) => {}
            Err(e) => tracing::debug!(error = %e, "Dedup lookup failed"),
        }
        if let Err(e) = self.store.cache_event_hash(&hash) {
            tracing::debug!(error = %e, "Failed to cache event hash");
        }

        let Some(installation_id) = self.installation_id() else {
            return;
        };
        let body = payload::build(&event, &self.version, &installation_id);
        match self.sink.deliver(&url, &body).await {
            Ok(()) => tracing::debug!(kind = event.kind.as_str(), "Telemetry event delivered"),
            Err(e) => {
                tracing::warn!(kind = event.kind.as_str(), error = %e, "Telemetry delivery failed")
            }
        }
    }
}

impl<S: WebhookSink> Telemetry<S> {
    /// Start the periodic flush on the current runtime
    pub fn spawn_flush_loop(self: &Arc<Self>, period: Duration) -> FlushLoop {
        FlushLoop::spawn(Arc::clone(self), period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;
    use crate::telemetry::sink::DeliveryError;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Clone, Default)]
    struct RecordingSink {
        calls: Arc<Mutex<Vec<(String, Value)>>>,
        fail: Arc<AtomicBool>,
    }

    impl RecordingSink {
        fn count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn titles(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|(_, body)| body["embeds"][0]["title"].as_str().unwrap().to_string())
                .collect()
        }
    }

    impl WebhookSink for RecordingSink {
        async fn deliver(&self, url: &str, payload: &Value) -> Result<(), DeliveryError> {
            self.calls
                .lock()
                .unwrap()
                .push((url.to_string(), payload.clone()));
            if self.fail.load(Ordering::SeqCst) {
                return Err(DeliveryError::Status(500));
            }
            Ok(())
        }
    }

    const HOOK: &str = "https://hooks.example.test/abc";

    fn telemetry(
        service_url: Option<&str>,
    ) -> (Arc<Telemetry<RecordingSink>>, RecordingSink, Arc<Storage>) {
        let store = Arc::new(Storage::in_memory());
        let sink = RecordingSink::default();
        let telemetry = Telemetry::new(
            store.clone(),
            sink.clone(),
            service_url.map(String::from),
            "1.0.0",
        );
        (Arc::new(telemetry), sink, store)
    }

    #[tokio::test(start_paused = true)]
    async fn test_identical_events_are_delivered_once() {
        let (telemetry, sink, _) = telemetry(Some(HOOK));
        telemetry.report_error("database locked", None);
        telemetry.flush().await;

        // Past the rate window, so only dedup can stop the repeat
        tokio::time::advance(Duration::from_secs(7)).await;
        telemetry.report_error("database locked", None);
        telemetry.flush().await;

        assert_eq!(sink.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_is_rate_limited_per_kind() {
        let (telemetry, sink, _) = telemetry(Some(HOOK));
        for i in 0..20 {
            telemetry.report_usage("request_executed", json!({"request_id": i}));
        }
        telemetry.report_error("boom", None);
        telemetry.flush().await;
        assert_eq!(sink.titles(), vec!["Usage Event", "Error Report"]);
        assert_eq!(telemetry.pending(), 0);

        tokio::time::advance(Duration::from_secs(3)).await;
        telemetry.report_usage("request_executed", json!({"request_id": 100}));
        telemetry.flush().await;
        assert_eq!(sink.count(), 2);

        tokio::time::advance(Duration::from_secs(7)).await;
        telemetry.report_usage("request_executed", json!({"request_id": 101}));
        telemetry.flush().await;
        assert_eq!(sink.count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_events_skip_queue_and_rate_limit() {
        let (telemetry, sink, _) = telemetry(Some(HOOK));
        telemetry.report_usage("project_created", json!({"project_id": 1}));
        telemetry.flush().await;

        telemetry.report_session_start().await;
        telemetry.report_session_end().await;
        assert_eq!(
            sink.titles(),
            vec!["Usage Event", "Session Started", "Session Ended"]
        );

        let calls = sink.calls.lock().unwrap();
        let description = calls[2].1["embeds"][0]["description"].as_str().unwrap();
        assert!(description.contains("\"project_count\": 1"));
    }

    #[tokio::test]
    async fn test_disabled_sends_nothing_but_counts() {
        let (telemetry, sink, _) = telemetry(Some(HOOK));
        telemetry.set_enabled(false);
        assert!(!telemetry.is_enabled());

        telemetry.report_usage("request_executed", json!({"request_id": 1}));
        telemetry.report_error("boom", Some(String::from("trace")));
        telemetry.report_session_start().await;
        telemetry.flush().await;

        assert_eq!(sink.count(), 0);
        assert_eq!(telemetry.pending(), 0);
        assert_eq!(telemetry.metrics().request_count, 1);
    }

    #[tokio::test]
    async fn test_no_webhook_means_disabled() {
        let (telemetry, sink, _) = telemetry(None);
        assert!(!telemetry.is_enabled());
        telemetry.report_session_start().await;
        assert_eq!(sink.count(), 0);

        let mut config = telemetry.config();
        config.webhook_url = String::from("https://override.example.test/hook");
        telemetry.update_config(config);
        assert!(telemetry.is_enabled());

        telemetry.report_session_start().await;
        assert_eq!(sink.calls.lock().unwrap()[0].0, "https://override.example.test/hook");
    }

    #[tokio::test]
    async fn test_service_url_takes_precedence() {
        let (telemetry, sink, _) = telemetry(Some(HOOK));
        let mut config = telemetry.config();
        config.webhook_url = String::from("https://override.example.test/hook");
        telemetry.update_config(config);

        telemetry.report_session_start().await;
        assert_eq!(sink.calls.lock().unwrap()[0].0, HOOK);
    }

    #[tokio::test]
    async fn test_installation_id_is_generated_once() {
        let (telemetry, sink, store) = telemetry(Some(HOOK));
        telemetry.report_session_start().await;
        telemetry.report_session_end().await;

        let id = store.telemetry_config().unwrap().installation_id;
        assert_eq!(id.len(), 36);
        let short = format!("`{}`", &id[..8]);
        for (_, body) in sink.calls.lock().unwrap().iter() {
            assert_eq!(body["embeds"][0]["fields"][2]["value"], short.as_str());
        }
    }

    #[tokio::test]
    async fn test_unsaved_installation_id_drops_only_that_event() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Storage::open(dir.path()).unwrap());
        let sink = RecordingSink::default();
        let telemetry = Telemetry::new(
            store.clone(),
            sink.clone(),
            Some(HOOK.to_string()),
            "1.0.0",
        );

        // A directory in place of the store file makes every write fail
        let blocker = dir.path().join(crate::constants::STORE_FILE);
        std::fs::create_dir(&blocker).unwrap();
        telemetry.report_session_start().await;
        assert_eq!(sink.count(), 0);
        assert!(store.telemetry_config().unwrap().installation_id.is_empty());

        std::fs::remove_dir(&blocker).unwrap();
        telemetry.report_session_end().await;
        assert_eq!(sink.titles(), vec!["Session Ended"]);
        assert_eq!(store.telemetry_config().unwrap().installation_id.len(), 36);
    }

    #[tokio::test]
    async fn test_delivery_failure_is_swallowed() {
        let (telemetry, sink, _) = telemetry(Some(HOOK));
        sink.fail.store(true, Ordering::SeqCst);
        telemetry.report_error("boom", None);
        telemetry.flush().await;
        assert_eq!(sink.count(), 1);
        assert_eq!(telemetry.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_loop_ticks() {
        let (telemetry, sink, _) = telemetry(Some(HOOK));
        let flusher = telemetry.spawn_flush_loop(Duration::from_secs(30));
        telemetry.report_error("late", None);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(sink.count(), 0);
        tokio::time::sleep(Duration::from_secs(21)).await;
        assert_eq!(sink.count(), 1);

        flusher.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_flush_period_still_runs() {
        let (telemetry, sink, _) = telemetry(Some(HOOK));
        let flusher = telemetry.spawn_flush_loop(Duration::ZERO);
        telemetry.report_error("tight loop", None);

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(sink.count(), 1);
        assert_eq!(telemetry.pending(), 0);

        flusher.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_flushes_remaining_events() {
        let (telemetry, sink, _) = telemetry(Some(HOOK));
        let flusher = telemetry.spawn_flush_loop(Duration::from_secs(30));
        telemetry.report_usage("folder_created", json!({"folder_id": 3}));

        flusher.shutdown().await;
        assert_eq!(sink.count(), 1);
        assert_eq!(telemetry.pending(), 0);
    }
}
