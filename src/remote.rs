//! Directory-backed remote store.
//!
//! # Directory Structure
//!
//! ```text
//! <remote dir>/
//!   users/
//!     <user>/
//!       collection.lock       # Held while a push rewrites the collection
//!       tasks/
//!         <id>.json           # One document per task
//! ```
//!
//! Any directory reachable by every device works as a remote: a network
//! share, a synced folder, or a local path in tests. Document file names are
//! the task id with bytes outside `[A-Za-z0-9._-]` percent-encoded; the `id`
//! field inside the document is authoritative.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc as std_mpsc;
use std::thread;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::lock::{FileLock, DEFAULT_LOCK_TIMEOUT_MS};
use crate::session::UserKey;
use crate::storage;
use crate::sync::{self, PushReport, RemoteStore, Subscription};
use crate::task::{self, Task};

/// Quiet period before a burst of file events becomes one snapshot
pub const DEFAULT_WATCH_DEBOUNCE_MS: u64 = 150;

const USERS_DIR: &str = "users";
const TASKS_DIR: &str = "tasks";
const LOCK_FILE: &str = "collection.lock";

/// Remote store keeping one JSON document per task under a shared directory
#[derive(Debug, Clone)]
pub struct DirRemoteStore {
    root: PathBuf,
    debounce: Duration,
}

struct StoredDoc {
    path: PathBuf,
    task: Task,
}

impl DirRemoteStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            debounce: Duration::from_millis(DEFAULT_WATCH_DEBOUNCE_MS),
        }
    }

    /// Override the subscription debounce window
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn user_dir(&self, user: &UserKey) -> PathBuf {
        self.root.join(USERS_DIR).join(user.as_str())
    }

    /// Directory holding the user's task documents
    pub fn tasks_dir(&self, user: &UserKey) -> PathBuf {
        self.user_dir(user).join(TASKS_DIR)
    }

    fn lock_path(&self, user: &UserKey) -> PathBuf {
        self.user_dir(user).join(LOCK_FILE)
    }

    fn ensure_root(&self) -> Result<()> {
        if self.root.is_dir() {
            Ok(())
        } else {
            Err(Error::Transport(format!(
                "remote store {} is not reachable",
                self.root.display()
            )))
        }
    }
}

#[async_trait]
impl RemoteStore for DirRemoteStore {
    async fn read_all(&self, user: &UserKey) -> Result<Vec<Task>> {
        let store = self.clone();
        let user = user.clone();
        blocking(move || {
            store.ensure_root()?;
            let docs = read_documents(&store.tasks_dir(&user))?;
            tracing::debug!(user = %user, count = docs.len(), "read remote collection");
            Ok(docs.into_iter().map(|doc| doc.task).collect())
        })
        .await
    }

    async fn replace_all(&self, user: &UserKey, tasks: &[Task]) -> Result<PushReport> {
        let store = self.clone();
        let user = user.clone();
        let tasks = tasks.to_vec();
        blocking(move || {
            store.ensure_root()?;
            let _lock = FileLock::acquire(store.lock_path(&user), DEFAULT_LOCK_TIMEOUT_MS)?;
            let dir = store.tasks_dir(&user);
            fs::create_dir_all(&dir)?;

            let existing = read_documents(&dir)?;
            let remote: Vec<Task> = existing.iter().map(|doc| doc.task.clone()).collect();
            let plan = sync::diff_for_push(&tasks, &remote);

            let mut paths_by_id: HashMap<&str, Vec<&Path>> = HashMap::new();
            for doc in &existing {
                paths_by_id
                    .entry(doc.task.id.as_str())
                    .or_default()
                    .push(doc.path.as_path());
            }

            for task in &plan.upserts {
                let path = dir.join(doc_file_name(&task.id));
                storage::write_json(&path, task)?;
                // Documents stored under a non-canonical name would shadow the write.
                for stale in paths_by_id.get(task.id.as_str()).into_iter().flatten() {
                    if *stale != path.as_path() {
                        remove_if_exists(stale)?;
                    }
                }
            }
            for id in &plan.deletes {
                for path in paths_by_id.get(id.as_str()).into_iter().flatten() {
                    remove_if_exists(path)?;
                }
            }

            tracing::info!(
                user = %user,
                upserted = plan.upserts.len(),
                deleted = plan.deletes.len(),
                "replaced remote collection"
            );
            Ok(PushReport {
                upserted: plan.upserts.len(),
                deleted: plan.deletes.len(),
            })
        })
        .await
    }

    async fn subscribe(&self, user: &UserKey) -> Result<Subscription> {
        self.ensure_root()?;
        let dir = self.tasks_dir(user);
        fs::create_dir_all(&dir)?;

        let (snapshot_tx, snapshot_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = std_mpsc::channel();
        let mut watcher: RecommendedWatcher =
            notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
                let _ = event_tx.send(res);
            })
        .map_err(|e| Error::Transport(format!("cannot watch {}: {e}", dir.display())))?;
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| Error::Transport(format!("cannot watch {}: {e}", dir.display())))?;

        let initial = read_documents(&dir)?;
        let _ = snapshot_tx.send(initial.into_iter().map(|doc| doc.task).collect());

        let debounce = self.debounce;
        let user = user.clone();
        thread::spawn(move || {
            let mut pending: Option<Instant> = None;
            loop {
                let timeout = pending
                    .map(|deadline| deadline.saturating_duration_since(Instant::now()))
                    .unwrap_or(Duration::from_secs(3600));
                match event_rx.recv_timeout(timeout) {
                    Ok(Ok(event)) => {
                        if !matches!(event.kind, EventKind::Access(_)) {
                            pending = Some(Instant::now() + debounce);
                        }
                    }
                    Ok(Err(err)) => {
                        tracing::warn!(user = %user, error = %err, "remote watch error");
                    }
                    Err(std_mpsc::RecvTimeoutError::Timeout) => {
                        if pending.take().is_none() {
                            continue;
                        }
                        match read_documents(&dir) {
                            Ok(docs) => {
                                tracing::debug!(user = %user, count = docs.len(), "remote snapshot");
                                let snapshot = docs.into_iter().map(|doc| doc.task).collect();
                                if snapshot_tx.send(snapshot).is_err() {
                                    break;
                                }
                            }
                            Err(err) => {
                                tracing::warn!(user = %user, error = %err, "remote snapshot read failed");
                            }
                        }
                    }
                    // Watcher dropped with the subscription.
                    Err(std_mpsc::RecvTimeoutError::Disconnected) => break,
                }
            }
            tracing::debug!(user = %user, "remote subscription closed");
        });

        Ok(Subscription::new(snapshot_rx, watcher))
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Transport(format!("remote store task failed: {e}")))?
}

/// Read and normalize every document in `dir`, ordered by file name.
/// A missing directory is an empty collection.
fn read_documents(dir: &Path) -> Result<Vec<StoredDoc>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some("json"))
        .collect();
    paths.sort();

    let now = Utc::now();
    let mut seen = HashSet::new();
    let mut docs = Vec::with_capacity(paths.len());
    for path in paths {
        let Some(mut value) = read_document(&path) else {
            continue;
        };
        if let (Some(fields), Some(stem)) = (
            value.as_object_mut(),
            path.file_stem().and_then(|stem| stem.to_str()),
        ) {
            let has_id = fields
                .get("id")
                .and_then(Value::as_str)
                .is_some_and(|id| !id.trim().is_empty());
            if !has_id {
                fields.insert("id".to_string(), Value::String(id_from_stem(stem)));
            }
        }

        let task = task::normalize_at(&value, now);
        if !seen.insert(task.id.clone()) {
            tracing::warn!(path = %path.display(), id = %task.id, "skipping duplicate remote document");
            continue;
        }
        docs.push(StoredDoc { path, task });
    }
    Ok(docs)
}

fn read_document(path: &Path) -> Option<Value> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "skipping unreadable remote document");
            return None;
        }
    };
    match serde_json::from_str::<Value>(&content) {
        Ok(value) if value.is_object() => Some(value),
        Ok(_) => {
            tracing::warn!(path = %path.display(), "skipping non-object remote document");
            None
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "skipping invalid remote document");
            None
        }
    }
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// File name for a task document
fn doc_file_name(id: &str) -> String {
    let mut name = String::with_capacity(id.len() + 5);
    for byte in id.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'_' | b'-') {
            name.push(byte as char);
        } else {
            name.push_str(&format!("%{byte:02X}"));
        }
    }
    name.push_str(".json");
    name
}

/// Inverse of [`doc_file_name`] for a file stem; malformed escapes stay literal.
fn id_from_stem(stem: &str) -> String {
    let bytes = stem.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                out.push((hi << 4) | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(byte: u8) -> Option<u8> {
    (byte as char).to_digit(16).map(|digit| digit as u8)
}
