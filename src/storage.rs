//! Local persistence for the task collection.
//!
//! # Directory Structure
//!
//! ```text
//! <data dir>/
//!   glasstask.toml        # Optional configuration
//!   tasks.json            # {"tasks":[...]}
//!   tasks.json.lock       # Advisory lock guarding writes
//! ```
//!
//! Export files share the data file's envelope plus an `exportedAt` stamp.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::lock::{self, FileLock, DEFAULT_LOCK_TIMEOUT_MS};
use crate::task::{self, Task, TaskEnvelope};

/// Name of the task data file inside the data directory
pub const TASKS_FILE: &str = "tasks.json";

/// Storage manager for the local task collection
#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path to the task data file
    pub fn tasks_file(&self) -> PathBuf {
        self.dir.join(TASKS_FILE)
    }

    /// Load the persisted collection.
    ///
    /// Returns `Ok(None)` when the file is missing or is not a valid
    /// `{"tasks":[...]}` envelope; a broken data file never prevents startup.
    /// Entries are normalized and duplicate ids after the first are dropped.
    pub fn load(&self) -> Result<Option<Vec<Task>>> {
        let path = self.tasks_file();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let value: Value = match serde_json::from_str(&content) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable task file");
                return Ok(None);
            }
        };
        let Some(entries) = value.get("tasks").and_then(Value::as_array) else {
            tracing::warn!(path = %path.display(), "ignoring task file without a tasks array");
            return Ok(None);
        };

        let now = Utc::now();
        let mut seen = HashSet::with_capacity(entries.len());
        let mut tasks = Vec::with_capacity(entries.len());
        for entry in entries {
            let task = task::normalize_at(entry, now);
            if seen.insert(task.id.clone()) {
                tasks.push(task);
            } else {
                tracing::warn!(id = %task.id, "dropping duplicate task id from task file");
            }
        }
        tracing::debug!(path = %path.display(), count = tasks.len(), "loaded tasks");
        Ok(Some(tasks))
    }

    /// Load the collection, treating a missing or broken file as empty.
    pub fn load_or_empty(&self) -> Result<Vec<Task>> {
        Ok(self.load()?.unwrap_or_default())
    }

    /// Persist the full collection atomically under the data file lock.
    pub fn save(&self, tasks: &[Task]) -> Result<()> {
        self.lock()?.save(tasks)
    }

    /// Take the data file lock for a read-modify-write cycle.
    ///
    /// Loads through the returned guard see every write made by other
    /// processes before the lock was granted, and no other writer can land
    /// until the guard is dropped.
    pub fn lock(&self) -> Result<LockedTasks<'_>> {
        let lock = FileLock::acquire(
            lock::lock_path_for(&self.tasks_file()),
            DEFAULT_LOCK_TIMEOUT_MS,
        )?;
        Ok(LockedTasks {
            store: self,
            _lock: lock,
        })
    }

    fn write(&self, tasks: &[Task]) -> Result<()> {
        let path = self.tasks_file();
        write_json(&path, &TaskEnvelope::new(tasks.to_vec()))?;
        tracing::debug!(path = %path.display(), count = tasks.len(), "saved tasks");
        Ok(())
    }
}

/// The task file held under its exclusive lock
pub struct LockedTasks<'a> {
    store: &'a LocalStore,
    _lock: FileLock,
}

impl LockedTasks<'_> {
    pub fn load(&self) -> Result<Option<Vec<Task>>> {
        self.store.load()
    }

    pub fn load_or_empty(&self) -> Result<Vec<Task>> {
        self.store.load_or_empty()
    }

    pub fn save(&self, tasks: &[Task]) -> Result<()> {
        self.store.write(tasks)
    }
}

/// Default export file name, e.g. `tasks-2024-06-10-08-30-00.json`
pub fn default_export_name(now: DateTime<Utc>) -> String {
    format!("tasks-{}.json", now.format("%Y-%m-%d-%H-%M-%S"))
}

/// Write an export file containing `tasks` stamped with `now`.
pub fn write_export(path: &Path, tasks: &[Task], now: DateTime<Utc>) -> Result<()> {
    write_json(path, &TaskEnvelope::exported(tasks.to_vec(), now))?;
    tracing::info!(path = %path.display(), count = tasks.len(), "exported tasks");
    Ok(())
}

/// Read an import file as raw JSON; shape checks happen in the import engine.
pub fn read_import(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| {
        Error::MalformedInput(format!("{} is not valid JSON: {e}", path.display()))
    })
}

/// Write pretty JSON atomically
pub fn write_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let mut json = serde_json::to_string_pretty(data)?;
    json.push('\n');
    lock::write_atomic(path, json.as_bytes())
}
