use std::sync::Arc;

use super::SettingsService;
use crate::error::Result;
use crate::format::{self, RequestFormats};
use crate::models::{HistoryEntry, Outcome, Request};
use crate::network::Executor;
use crate::storage::Store;

/// Request CRUD, rendering and execution against the store
#[derive(Clone)]
pub struct RequestService {
    store: Arc<dyn Store>,
    settings: SettingsService,
    executor: Executor,
}

impl RequestService {
    pub fn new(store: Arc<dyn Store>, settings: SettingsService, executor: Executor) -> Self {
        RequestService {
            store,
            settings,
            executor,
        }
    }

    pub fn create(&self, request: Request) -> Result<Request> {
        self.store.create_request(request)
    }

    pub fn get(&self, id: u64) -> Result<Request> {
        self.store.get_request(id)
    }

    pub fn list(&self, project_id: u64) -> Result<Vec<Request>> {
        self.store.list_requests(project_id)
    }

    pub fn update(&self, request: &Request) -> Result<()> {
        self.store.update_request(request)
    }

    pub fn delete(&self, id: u64) -> Result<()> {
        self.store.delete_request(id)
    }

    pub fn move_request(&self, id: u64, folder_id: Option<u64>, position: i64) -> Result<()> {
        self.store.move_request(id, folder_id, position)
    }

    pub fn list_history(&self, request_id: u64) -> Result<Vec<HistoryEntry>> {
        self.store.list_history(request_id)
    }

    pub fn delete_history_item(&self, request_id: u64, history_id: u64) -> Result<()> {
        self.store.delete_history_item(request_id, history_id)
    }

    /// Render a stored request in the named format
    pub fn get_format(&self, id: u64, name: &str) -> Result<String> {
        let request = self.store.get_request(id)?;
        format::get_format(&request, name)
    }

    pub fn formats(&self, id: u64) -> Result<RequestFormats> {
        let request = self.store.get_request(id)?;
        Ok(format::all_formats(&request))
    }

    /// Execute a stored request and record the outcome in its history.
    ///
    /// Only an unknown id is an error; a failed history write is logged and
    /// the outcome is still returned.
    pub async fn execute_request(&self, id: u64) -> Result<Outcome> {
        let request = self.store.get_request(id)?;
        let outcome = self
            .executor
            .execute(&request, self.settings.request_timeout())
            .await;

        if let Err(e) = self.store.append_history(id, outcome.clone()) {
            tracing::warn!(id, error = %e, "Failed to save history");
        }
        Ok(outcome)
    }
}
