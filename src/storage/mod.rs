//! Persistence collaborator
//!
//! The engine only talks to [`Store`]; [`Storage`] is the bundled
//! implementation (in memory, optionally mirrored to a YAML file).

mod file;

pub use file::Storage;

use crate::error::Result;
use crate::models::{Folder, HistoryEntry, Outcome, Project, Request, TelemetryConfig};

/// CRUD over projects, folders, requests and history, plus the settings and
/// telemetry records. Implementations must be safe to share across tasks.
pub trait Store: Send + Sync {
    fn create_project(&self, project: Project) -> Result<Project>;
    fn list_projects(&self) -> Result<Vec<Project>>;
    fn get_project(&self, id: u64) -> Result<Project>;
    fn update_project(&self, project: &Project) -> Result<()>;
    /// Also removes the project's folders, requests and history
    fn delete_project(&self, id: u64) -> Result<()>;

    /// Assigns the next position among siblings under the same parent
    fn create_folder(&self, folder: Folder) -> Result<Folder>;
    fn list_folders(&self, project_id: u64) -> Result<Vec<Folder>>;
    fn update_folder(&self, folder: &Folder) -> Result<()>;
    /// Requests inside the folder move to the project root
    fn delete_folder(&self, id: u64) -> Result<()>;

    /// Assigns the next position among siblings under the same parent
    fn create_request(&self, request: Request) -> Result<Request>;
    fn get_request(&self, id: u64) -> Result<Request>;
    /// Ordered by position
    fn list_requests(&self, project_id: u64) -> Result<Vec<Request>>;
    fn update_request(&self, request: &Request) -> Result<()>;
    fn delete_request(&self, id: u64) -> Result<()>;
    fn move_request(&self, id: u64, folder_id: Option<u64>, position: i64) -> Result<()>;

    fn append_history(&self, request_id: u64, outcome: Outcome) -> Result<HistoryEntry>;
    /// At most [`HISTORY_LIMIT`](crate::constants::HISTORY_LIMIT) entries, newest first
    fn list_history(&self, request_id: u64) -> Result<Vec<HistoryEntry>>;
    /// Fails with `NotFound` unless the entry belongs to `request_id`
    fn delete_history_item(&self, request_id: u64, history_id: u64) -> Result<()>;

    fn get_setting(&self, key: &str) -> Result<Option<String>>;
    fn set_setting(&self, key: &str, value: &str) -> Result<()>;

    fn telemetry_config(&self) -> Result<TelemetryConfig>;
    fn update_telemetry_config(&self, config: &TelemetryConfig) -> Result<()>;
    /// Purges hashes older than one hour, then checks membership
    fn is_event_duplicated(&self, hash: &str) -> Result<bool>;
    fn cache_event_hash(&self, hash: &str) -> Result<()>;
}
