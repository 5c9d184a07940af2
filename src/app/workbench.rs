use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use crate::config::AppConfig;
use crate::constants::APP_VERSION;
use crate::error::Result;
use crate::format::{parse_curl, RequestFormats};
use crate::models::{Folder, HistoryEntry, Outcome, Project, Request, TelemetryConfig};
use crate::network::Executor;
use crate::service::{RequestService, SettingsService};
use crate::storage::Store;
use crate::telemetry::event::{FOLDER_CREATED, PROJECT_CREATED, REQUEST_EXECUTED};
use crate::telemetry::{FlushLoop, ReqwestWebhook, Telemetry, WebhookSink};

/// Entry point for a presentation layer.
///
/// Wraps the services and reports usage and failures to telemetry the way
/// the UI bindings expect.
pub struct Workbench<S: WebhookSink = ReqwestWebhook> {
    store: Arc<dyn Store>,
    requests: RequestService,
    settings: SettingsService,
    telemetry: Arc<Telemetry<S>>,
    flush_interval: Duration,
    flusher: Option<FlushLoop>,
}

impl Workbench<ReqwestWebhook> {
    pub fn new(store: Arc<dyn Store>, config: &AppConfig) -> Self {
        Self::with_sink(
            store,
            ReqwestWebhook::new(),
            config.telemetry_webhook.clone(),
            config.flush_interval,
        )
    }
}

impl<S: WebhookSink> Workbench<S> {
    pub fn with_sink(
        store: Arc<dyn Store>,
        sink: S,
        webhook: Option<String>,
        flush_interval: Duration,
    ) -> Self {
        let settings = SettingsService::new(store.clone());
        let requests = RequestService::new(store.clone(), settings.clone(), Executor::new());
        let telemetry = Arc::new(Telemetry::new(store.clone(), sink, webhook, APP_VERSION));
        Workbench {
            store,
            requests,
            settings,
            telemetry,
            flush_interval,
            flusher: None,
        }
    }

    pub fn telemetry(&self) -> &Arc<Telemetry<S>> {
        &self.telemetry
    }

    /// Announce the session and start the background flush
    pub async fn startup(&mut self) {
        self.telemetry.report_session_start().await;
        if self.flusher.is_none() {
            self.flusher = Some(self.telemetry.spawn_flush_loop(self.flush_interval));
        }
        tracing::info!("Workbench started");
    }

    /// Final flush, then the session-end event
    pub async fn shutdown(&mut self) {
        match self.flusher.take() {
            Some(flusher) => flusher.shutdown().await,
            None => self.telemetry.flush().await,
        }
        self.telemetry.report_session_end().await;
        tracing::info!("Workbench stopped");
    }

    /// Pass a result through, reporting an error event on failure
    fn track<T>(&self, context: &str, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.telemetry.report_error(format!("{}: {}", context, e), None);
        }
        result
    }

    // Projects

    pub fn create_project(&self, name: &str, description: &str) -> Result<Project> {
        let project = self.track(
            "Failed to create project",
            self.store.create_project(Project::new(name, description)),
        )?;
        self.telemetry.report_usage(
            PROJECT_CREATED,
            json!({"project_id": project.id, "project_name": project.name}),
        );
        Ok(project)
    }

    pub fn list_projects(&self) -> Result<Vec<Project>> {
        self.track("Failed to list projects", self.store.list_projects())
    }

    pub fn get_project(&self, id: u64) -> Result<Project> {
        self.store.get_project(id)
    }

    pub fn update_project(&self, project: &Project) -> Result<()> {
        self.track("Failed to update project", self.store.update_project(project))
    }

    pub fn delete_project(&self, id: u64) -> Result<()> {
        self.track("Failed to delete project", self.store.delete_project(id))
    }

    // Folders

    pub fn create_folder(
        &self,
        project_id: u64,
        name: &str,
        parent_id: Option<u64>,
    ) -> Result<Folder> {
        let folder = self.track(
            "Failed to create folder",
            self.store.create_folder(Folder::new(project_id, name, parent_id)),
        )?;
        self.telemetry.report_usage(
            FOLDER_CREATED,
            json!({"folder_id": folder.id, "folder_name": folder.name, "project_id": project_id}),
        );
        Ok(folder)
    }

    pub fn list_folders(&self, project_id: u64) -> Result<Vec<Folder>> {
        self.store.list_folders(project_id)
    }

    pub fn update_folder(&self, folder: &Folder) -> Result<()> {
        self.track("Failed to update folder", self.store.update_folder(folder))
    }

    pub fn delete_folder(&self, id: u64) -> Result<()> {
        self.track("Failed to delete folder", self.store.delete_folder(id))
    }

    // Requests

    pub fn create_request(&self, request: Request) -> Result<Request> {
        self.track("Failed to create request", self.requests.create(request))
    }

    /// Import a cURL command into `project_id`
    pub fn import_curl(&self, project_id: u64, command: &str) -> Result<Request> {
        let mut request = parse_curl(command)?;
        request.project_id = project_id;
        self.create_request(request)
    }

    pub fn get_request(&self, id: u64) -> Result<Request> {
        self.requests.get(id)
    }

    pub fn list_requests(&self, project_id: u64) -> Result<Vec<Request>> {
        self.requests.list(project_id)
    }

    pub fn update_request(&self, request: &Request) -> Result<()> {
        self.track("Failed to update request", self.requests.update(request))
    }

    pub fn delete_request(&self, id: u64) -> Result<()> {
        self.track("Failed to delete request", self.requests.delete(id))
    }

    pub fn move_request(&self, id: u64, folder_id: Option<u64>, position: i64) -> Result<()> {
        self.track(
            "Failed to move request",
            self.requests.move_request(id, folder_id, position),
        )
    }

    pub async fn execute_request(&self, id: u64) -> Result<Outcome> {
        let outcome = self.track(
            "Failed to execute request",
            self.requests.execute_request(id).await,
        )?;
        self.telemetry.report_usage(
            REQUEST_EXECUTED,
            json!({"request_id": id, "status": outcome.status, "duration": outcome.duration_ms}),
        );
        Ok(outcome)
    }

    pub fn get_format(&self, id: u64, name: &str) -> Result<String> {
        self.requests.get_format(id, name)
    }

    pub fn formats(&self, id: u64) -> Result<RequestFormats> {
        self.requests.formats(id)
    }

    pub fn list_history(&self, request_id: u64) -> Result<Vec<HistoryEntry>> {
        self.requests.list_history(request_id)
    }

    pub fn delete_history_item(&self, request_id: u64, history_id: u64) -> Result<()> {
        self.requests.delete_history_item(request_id, history_id)
    }

    // Settings

    pub fn request_timeout_seconds(&self) -> u64 {
        self.settings.request_timeout_seconds()
    }

    pub fn set_request_timeout(&self, seconds: i64) -> Result<u64> {
        self.settings.set_request_timeout(seconds)
    }

    pub fn telemetry_config(&self) -> TelemetryConfig {
        self.telemetry.config()
    }

    pub fn update_telemetry_config(&self, config: TelemetryConfig) {
        self.telemetry.update_config(config);
    }

    pub fn set_telemetry_enabled(&self, enabled: bool) {
        self.telemetry.set_enabled(enabled);
    }
}
