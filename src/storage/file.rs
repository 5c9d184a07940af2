use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::Store;
use crate::constants::{HISTORY_LIMIT, STORE_FILE, TELEMETRY_DEDUP_WINDOW_SECS};
use crate::error::{Error, Result};
use crate::models::{Folder, HistoryEntry, Outcome, Project, Request, TelemetryConfig};

/// Everything the store holds, serialized as one YAML document
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct Database {
    #[serde(default)]
    next_id: u64,
    #[serde(default)]
    projects: Vec<Project>,
    #[serde(default)]
    folders: Vec<Folder>,
    #[serde(default)]
    requests: Vec<Request>,
    #[serde(default)]
    history: Vec<HistoryEntry>,
    #[serde(default)]
    settings: BTreeMap<String, String>,
    #[serde(default)]
    telemetry: TelemetryConfig,
    #[serde(default)]
    event_cache: BTreeMap<String, DateTime<Utc>>,
}

impl Database {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn request_mut(&mut self, id: u64) -> Result<&mut Request> {
        self.requests
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(Error::not_found("request", id))
    }

    fn next_request_position(&self, project_id: u64, folder_id: Option<u64>) -> i64 {
        self.requests
            .iter()
            .filter(|r| r.project_id == project_id && r.folder_id == folder_id)
            .map(|r| r.position)
            .max()
            .map_or(0, |p| p + 1)
    }

    fn next_folder_position(&self, project_id: u64, parent_id: Option<u64>) -> i64 {
        self.folders
            .iter()
            .filter(|f| f.project_id == project_id && f.parent_id == parent_id)
            .map(|f| f.position)
            .max()
            .map_or(0, |p| p + 1)
    }

    /// Keep only the newest HISTORY_LIMIT entries for `request_id`
    fn prune_history(&mut self, request_id: u64) {
        let mut ids: Vec<(DateTime<Utc>, u64)> = self
            .history
            .iter()
            .filter(|h| h.request_id == request_id)
            .map(|h| (h.executed_at, h.id))
            .collect();
        if ids.len() <= HISTORY_LIMIT {
            return;
        }
        ids.sort_unstable_by(|a, b| b.cmp(a));
        let stale: Vec<u64> = ids[HISTORY_LIMIT..].iter().map(|(_, id)| *id).collect();
        self.history.retain(|h| !stale.contains(&h.id));
    }
}

/// In-memory store, optionally mirrored to `<dir>/store.yaml` after each write
pub struct Storage {
    db: Mutex<Database>,
    path: Option<PathBuf>,
}

impl Storage {
    /// Store that never touches disk
    pub fn in_memory() -> Self {
        Storage {
            db: Mutex::new(Database::default()),
            path: None,
        }
    }

    /// Open (or start) the store file inside `dir`
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let path = dir.as_ref().join(STORE_FILE);
        let db = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_yaml::from_str(&content)?
        } else {
            Database::default()
        };
        tracing::debug!(path = %path.display(), "Opened store");
        Ok(Storage {
            db: Mutex::new(db),
            path: Some(path),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read<T>(&self, f: impl FnOnce(&Database) -> Result<T>) -> Result<T> {
        f(&self.lock())
    }

    /// Apply `f` to a copy and commit it only once it has been persisted
    fn write<T>(&self, f: impl FnOnce(&mut Database) -> Result<T>) -> Result<T> {
        let mut db = self.lock();
        if self.path.is_none() {
            return f(&mut db);
        }
        let mut candidate = db.clone();
        let value = f(&mut candidate)?;
        self.persist(&candidate)?;
        *db = candidate;
        Ok(value)
    }

    fn persist(&self, db: &Database) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(dir) = path.parent() {
            if !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }
        let content = serde_yaml::to_string(db)?;
        fs::write(path, content)?;
        Ok(())
    }
}

impl Default for Storage {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl Store for Storage {
    fn create_project(&self, mut project: Project) -> Result<Project> {
        self.write(|db| {
            project.id = db.allocate_id();
            project.created_at = Utc::now();
            project.updated_at = project.created_at;
            db.projects.push(project.clone());
            Ok(project)
        })
    }

    fn list_projects(&self) -> Result<Vec<Project>> {
        self.read(|db| {
            let mut projects = db.projects.clone();
            projects.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            Ok(projects)
        })
    }

    fn get_project(&self, id: u64) -> Result<Project> {
        self.read(|db| {
            db.projects
                .iter()
                .find(|p| p.id == id)
                .cloned()
                .ok_or(Error::not_found("project", id))
        })
    }

    fn update_project(&self, project: &Project) -> Result<()> {
        self.write(|db| {
            let existing = db
                .projects
                .iter_mut()
                .find(|p| p.id == project.id)
                .ok_or(Error::not_found("project", project.id))?;
            existing.name = project.name.clone();
            existing.description = project.description.clone();
            existing.updated_at = Utc::now();
            Ok(())
        })
    }

    fn delete_project(&self, id: u64) -> Result<()> {
        self.write(|db| {
            let before = db.projects.len();
            db.projects.retain(|p| p.id != id);
            if db.projects.len() == before {
                return Err(Error::not_found("project", id));
            }
            let removed: Vec<u64> = db
                .requests
                .iter()
                .filter(|r| r.project_id == id)
                .map(|r| r.id)
                .collect();
            db.requests.retain(|r| r.project_id != id);
            db.folders.retain(|f| f.project_id != id);
            db.history.retain(|h| !removed.contains(&h.request_id));
            Ok(())
        })
    }

    fn create_folder(&self, mut folder: Folder) -> Result<Folder> {
        self.write(|db| {
            folder.id = db.allocate_id();
            folder.position = db.next_folder_position(folder.project_id, folder.parent_id);
            folder.created_at = Utc::now();
            folder.updated_at = folder.created_at;
            db.folders.push(folder.clone());
            Ok(folder)
        })
    }

    fn list_folders(&self, project_id: u64) -> Result<Vec<Folder>> {
        self.read(|db| {
            let mut folders: Vec<Folder> = db
                .folders
                .iter()
                .filter(|f| f.project_id == project_id)
                .cloned()
                .collect();
            folders.sort_by_key(|f| f.position);
            Ok(folders)
        })
    }

    fn update_folder(&self, folder: &Folder) -> Result<()> {
        self.write(|db| {
            let existing = db
                .folders
                .iter_mut()
                .find(|f| f.id == folder.id)
                .ok_or(Error::not_found("folder", folder.id))?;
            existing.name = folder.name.clone();
            existing.parent_id = folder.parent_id;
            existing.position = folder.position;
            existing.updated_at = Utc::now();
            Ok(())
        })
    }

    fn delete_folder(&self, id: u64) -> Result<()> {
        self.write(|db| {
            let before = db.folders.len();
            db.folders.retain(|f| f.id != id);
            if db.folders.len() == before {
                return Err(Error::not_found("folder", id));
            }
            for request in db.requests.iter_mut().filter(|r| r.folder_id == Some(id)) {
                request.folder_id = None;
            }
            Ok(())
        })
    }

    fn create_request(&self, mut request: Request) -> Result<Request> {
        self.write(|db| {
            request.id = db.allocate_id();
            request.position = db.next_request_position(request.project_id, request.folder_id);
            request.created_at = Utc::now();
            request.updated_at = request.created_at;
            db.requests.push(request.clone());
            Ok(request)
        })
    }

    fn get_request(&self, id: u64) -> Result<Request> {
        self.read(|db| {
            db.requests
                .iter()
                .find(|r| r.id == id)
                .cloned()
                .ok_or(Error::not_found("request", id))
        })
    }

    fn list_requests(&self, project_id: u64) -> Result<Vec<Request>> {
        self.read(|db| {
            let mut requests: Vec<Request> = db
                .requests
                .iter()
                .filter(|r| r.project_id == project_id)
                .cloned()
                .collect();
            requests.sort_by(|a, b| {
                a.position
                    .cmp(&b.position)
                    .then(b.created_at.cmp(&a.created_at))
            });
            Ok(requests)
        })
    }

    fn update_request(&self, request: &Request) -> Result<()> {
        self.write(|db| {
            let existing = db.request_mut(request.id)?;
            let created_at = existing.created_at;
            let project_id = existing.project_id;
            *existing = request.clone();
            existing.created_at = created_at;
            existing.project_id = project_id;
            existing.updated_at = Utc::now();
            Ok(())
        })
    }

    fn delete_request(&self, id: u64) -> Result<()> {
        self.write(|db| {
            let before = db.requests.len();
            db.requests.retain(|r| r.id != id);
            if db.requests.len() == before {
                return Err(Error::not_found("request", id));
            }
            db.history.retain(|h| h.request_id != id);
            Ok(())
        })
    }

    fn move_request(&self, id: u64, folder_id: Option<u64>, position: i64) -> Result<()> {
        self.write(|db| {
            let request = db.request_mut(id)?;
            request.folder_id = folder_id;
            request.position = position;
            request.updated_at = Utc::now();
            Ok(())
        })
    }

    fn append_history(&self, request_id: u64, outcome: Outcome) -> Result<HistoryEntry> {
        self.write(|db| {
            let entry = HistoryEntry {
                id: db.allocate_id(),
                request_id,
                outcome,
                executed_at: Utc::now(),
            };
            db.history.push(entry.clone());
            db.prune_history(request_id);
            Ok(entry)
        })
    }

    fn list_history(&self, request_id: u64) -> Result<Vec<HistoryEntry>> {
        self.read(|db| {
            let mut entries: Vec<HistoryEntry> = db
                .history
                .iter()
                .filter(|h| h.request_id == request_id)
                .cloned()
                .collect();
            entries.sort_by(|a, b| b.executed_at.cmp(&a.executed_at).then(b.id.cmp(&a.id)));
            entries.truncate(HISTORY_LIMIT);
            Ok(entries)
        })
    }

    fn delete_history_item(&self, request_id: u64, history_id: u64) -> Result<()> {
        self.write(|db| {
            let position = db
                .history
                .iter()
                .position(|h| h.id == history_id && h.request_id == request_id)
                .ok_or(Error::not_found("history item", history_id))?;
            db.history.remove(position);
            Ok(())
        })
    }

    fn get_setting(&self, key: &str) -> Result<Option<String>> {
        self.read(|db| Ok(db.settings.get(key).cloned()))
    }

    fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.write(|db| {
            db.settings.insert(key.to_string(), value.to_string());
            Ok(())
        })
    }

    fn telemetry_config(&self) -> Result<TelemetryConfig> {
        self.read(|db| Ok(db.telemetry.clone()))
    }

    fn update_telemetry_config(&self, config: &TelemetryConfig) -> Result<()> {
        self.write(|db| {
            db.telemetry = config.clone();
            Ok(())
        })
    }

    fn is_event_duplicated(&self, hash: &str) -> Result<bool> {
        self.write(|db| {
            let cutoff = Utc::now() - Duration::seconds(TELEMETRY_DEDUP_WINDOW_SECS);
            db.event_cache.retain(|_, seen| *seen >= cutoff);
            Ok(db.event_cache.contains_key(hash))
        })
    }

    fn cache_event_hash(&self, hash: &str) -> Result<()> {
        self.write(|db| {
            db.event_cache.insert(hash.to_string(), Utc::now());
            Ok(())
        })
    }
}
