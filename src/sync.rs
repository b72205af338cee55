//! Sync reconciler: last-write-wins merge between the local collection and a
//! remote copy keyed by the same task ids.
//!
//! The merge policy works per record:
//! - present only locally: kept (new or not yet pushed)
//! - present only remotely: adopted
//! - present on both sides: the greater `updated_at` wins, ties favor local
//!
//! Pushes are whole-collection overwrites. A local deletion is only visible as
//! absence, so every push deletes the remote ids missing locally.

use std::any::Any;
use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::session::UserKey;
use crate::task::Task;

/// Writes needed to make the remote collection equal the local one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushPlan {
    pub upserts: Vec<Task>,
    pub deletes: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PushReport {
    pub upserted: usize,
    pub deleted: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub tasks: Vec<Task>,
    pub adopted: usize,
    pub replaced: usize,
    pub pushed: PushReport,
}

/// Stream of remote collection snapshots. Dropping it unsubscribes.
pub struct Subscription {
    receiver: mpsc::UnboundedReceiver<Vec<Task>>,
    _guard: Box<dyn Any + Send>,
}

impl Subscription {
    /// Wrap a snapshot receiver; `guard` is kept alive for as long as the
    /// subscription and dropped with it.
    pub fn new(receiver: mpsc::UnboundedReceiver<Vec<Task>>, guard: impl Any + Send) -> Self {
        Self {
            receiver,
            _guard: Box::new(guard),
        }
    }

    /// Wait for the next snapshot; `None` once the remote side has stopped.
    pub async fn next(&mut self) -> Option<Vec<Task>> {
        self.receiver.recv().await
    }
}

/// Remote document store holding one collection per user.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Read every task document for `user`, normalized.
    async fn read_all(&self, user: &UserKey) -> Result<Vec<Task>>;

    /// Make the remote collection equal `tasks` (upserts plus deletes).
    async fn replace_all(&self, user: &UserKey, tasks: &[Task]) -> Result<PushReport>;

    /// Subscribe to snapshots of the collection, starting with the current one.
    async fn subscribe(&self, user: &UserKey) -> Result<Subscription>;
}

/// Merge a remote snapshot into the local collection.
///
/// Local order is preserved; remote-only tasks are appended in remote order.
/// Applying the same snapshot again yields the same result.
pub fn merge_remote(local: &[Task], remote: &[Task]) -> Vec<Task> {
    let mut remote_by_id: HashMap<&str, &Task> = HashMap::with_capacity(remote.len());
    for task in remote {
        remote_by_id.entry(task.id.as_str()).or_insert(task);
    }

    let mut seen: HashSet<&str> = HashSet::with_capacity(local.len() + remote.len());
    let mut merged = Vec::with_capacity(local.len() + remote.len());
    for task in local {
        if !seen.insert(task.id.as_str()) {
            continue;
        }
        match remote_by_id.get(task.id.as_str()) {
            Some(theirs) if theirs.updated_at > task.updated_at => merged.push((*theirs).clone()),
            _ => merged.push(task.clone()),
        }
    }
    for task in remote {
        if seen.insert(task.id.as_str()) {
            merged.push(task.clone());
        }
    }
    merged
}

/// Merge `remote` into `local` when `remote` was read while the local
/// collection was still `base`.
///
/// Tasks present in `base` but gone from `local` were deleted locally after
/// the remote copy was taken; they are not adopted back. With `base == local`
/// this is [`merge_remote`].
pub fn merge_remote_since(base: &[Task], local: &[Task], remote: &[Task]) -> Vec<Task> {
    let local_ids: HashSet<&str> = local.iter().map(|task| task.id.as_str()).collect();
    let deleted: HashSet<&str> = base
        .iter()
        .map(|task| task.id.as_str())
        .filter(|id| !local_ids.contains(id))
        .collect();
    if deleted.is_empty() {
        return merge_remote(local, remote);
    }
    let remote: Vec<Task> = remote
        .iter()
        .filter(|task| !deleted.contains(task.id.as_str()))
        .cloned()
        .collect();
    merge_remote(local, &remote)
}

/// Compute the full-collection push: every local task is upserted and every
/// remote id absent locally is deleted.
pub fn diff_for_push(local: &[Task], remote: &[Task]) -> PushPlan {
    let local_ids: HashSet<&str> = local.iter().map(|task| task.id.as_str()).collect();
    let mut deleted: HashSet<&str> = HashSet::new();
    let deletes = remote
        .iter()
        .map(|task| task.id.as_str())
        .filter(|id| !local_ids.contains(id) && deleted.insert(*id))
        .map(str::to_string)
        .collect();
    PushPlan {
        upserts: local.to_vec(),
        deletes,
    }
}

/// Drives pull/push/subscribe for one signed-in user.
pub struct Reconciler<R> {
    remote: R,
    user: UserKey,
}

impl<R: RemoteStore> Reconciler<R> {
    pub fn new(remote: R, user: UserKey) -> Self {
        Self { remote, user }
    }

    pub fn user(&self) -> &UserKey {
        &self.user
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Read the remote collection and merge it into `local`.
    pub async fn pull(&self, local: &[Task]) -> Result<Vec<Task>> {
        let remote = self.remote.read_all(&self.user).await?;
        tracing::debug!(user = %self.user, remote = remote.len(), "pulled remote tasks");
        Ok(merge_remote(local, &remote))
    }

    /// Overwrite the remote collection with `local`.
    pub async fn push(&self, local: &[Task]) -> Result<PushReport> {
        let report = self.remote.replace_all(&self.user, local).await?;
        tracing::debug!(
            user = %self.user,
            upserted = report.upserted,
            deleted = report.deleted,
            "pushed local tasks"
        );
        Ok(report)
    }

    /// Pull, merge, then push the merged collection back.
    pub async fn sync(&self, local: &[Task]) -> Result<SyncReport> {
        let remote = self.remote.read_all(&self.user).await?;
        let merged = merge_remote(local, &remote);

        let local_ids: HashSet<&str> = local.iter().map(|task| task.id.as_str()).collect();
        let adopted = merged
            .iter()
            .filter(|task| !local_ids.contains(task.id.as_str()))
            .count();
        let replaced = merged
            .iter()
            .filter(|task| local_ids.contains(task.id.as_str()) && !local.contains(task))
            .count();

        let pushed = self.push(&merged).await?;
        tracing::info!(user = %self.user, adopted, replaced, "sync complete");
        Ok(SyncReport {
            tasks: merged,
            adopted,
            replaced,
            pushed,
        })
    }

    pub async fn subscribe(&self) -> Result<Subscription> {
        self.remote.subscribe(&self.user).await
    }

    /// Merge a delivered snapshot against the then-current local collection.
    pub fn apply_snapshot(&self, local: &[Task], snapshot: &[Task]) -> Vec<Task> {
        merge_remote(local, snapshot)
    }
}
