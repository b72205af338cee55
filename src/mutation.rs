//! Mutation engine: applies user intents to a task collection.
//!
//! Every operation takes the current collection by reference and returns a
//! fresh collection, so a previously returned snapshot is never modified.
//! Unknown ids are reported as [`Outcome::Unchanged`], never as errors.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::task::{self, Priority, Status, Task, MAX_TAGS};

/// Validated payload of the task form for a new task.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub due_date: Option<NaiveDate>,
    pub priority: Priority,
    pub tags: Vec<String>,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Field changes for an existing task. `None` leaves a field untouched;
/// `due_date: Some(None)` clears the due date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<Option<NaiveDate>>,
    pub priority: Option<Priority>,
    pub status: Option<Status>,
    pub tags: Option<Vec<String>>,
}

impl TaskChanges {
    pub fn status(status: Status) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Result of an operation that may leave the collection as it was.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Changed(Vec<Task>),
    Unchanged,
}

impl Outcome {
    pub fn is_changed(&self) -> bool {
        matches!(self, Outcome::Changed(_))
    }

    pub fn changed(self) -> Option<Vec<Task>> {
        match self {
            Outcome::Changed(tasks) => Some(tasks),
            Outcome::Unchanged => None,
        }
    }
}

/// A newly created task together with the collection that contains it.
#[derive(Debug, Clone, PartialEq)]
pub struct Created {
    pub tasks: Vec<Task>,
    pub task: Task,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportReport {
    pub tasks: Vec<Task>,
    pub imported: usize,
    pub skipped: usize,
}

/// Create a task from a draft and prepend it to the collection.
pub fn create(tasks: &[Task], draft: TaskDraft, now: DateTime<Utc>) -> Result<Created> {
    let title = validate_title(&draft.title)?;
    let mut tags = draft.tags;
    tags.truncate(MAX_TAGS);

    let task = Task {
        id: fresh_id(tasks.iter().map(|t| t.id.as_str()).collect()),
        title,
        description: draft.description,
        due_date: draft.due_date,
        priority: draft.priority,
        status: Status::Open,
        tags,
        created_at: now,
        updated_at: now,
        completed_at: None,
        notes_by_user: None,
    };

    let mut next = Vec::with_capacity(tasks.len() + 1);
    next.push(task.clone());
    next.extend_from_slice(tasks);
    Ok(Created { tasks: next, task })
}

/// Merge `changes` onto the task with `id`, maintaining completion time.
pub fn update(tasks: &[Task], id: &str, changes: TaskChanges, now: DateTime<Utc>) -> Result<Outcome> {
    let mut changes = changes;
    if let Some(title) = changes.title.as_deref() {
        changes.title = Some(validate_title(title)?);
    }
    Ok(apply_changes(tasks, id, changes, now))
}

/// Remove the task with `id`. Confirmation is the caller's job.
pub fn delete(tasks: &[Task], id: &str) -> Outcome {
    if !tasks.iter().any(|task| task.id == id) {
        return Outcome::Unchanged;
    }
    Outcome::Changed(tasks.iter().filter(|task| task.id != id).cloned().collect())
}

pub fn toggle_status(tasks: &[Task], id: &str, done: bool, now: DateTime<Utc>) -> Outcome {
    let status = if done { Status::Done } else { Status::Open };
    apply_changes(tasks, id, TaskChanges::status(status), now)
}

/// Remove every completed task, preserving the order of the rest.
pub fn clear_completed(tasks: &[Task]) -> Outcome {
    if !tasks.iter().any(Task::is_done) {
        return Outcome::Unchanged;
    }
    Outcome::Changed(tasks.iter().filter(|task| !task.is_done()).cloned().collect())
}

/// Import tasks from an export envelope, prepending them in file order.
///
/// Entries that are not objects or have no string title are skipped. Ids that
/// collide with the collection (or an earlier imported entry) are replaced.
pub fn import(tasks: &[Task], envelope: &Value, now: DateTime<Utc>) -> Result<ImportReport> {
    let entries = envelope
        .get("tasks")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::MalformedInput("file missing tasks[]".to_string()))?;

    let mut taken: HashSet<String> = tasks.iter().map(|t| t.id.clone()).collect();
    let mut imported = Vec::new();
    let mut skipped = 0;

    for entry in entries {
        let has_title = entry.get("title").map(Value::is_string).unwrap_or(false);
        if !has_title {
            skipped += 1;
            tracing::debug!("skipping import entry without a title");
            continue;
        }

        let mut task = task::normalize_at(entry, now);
        task.updated_at = now.max(task.created_at);
        if task.is_done() {
            task.completed_at = task.completed_at.or(Some(now));
        }
        if taken.contains(&task.id) {
            let replacement = fresh_id(taken.iter().map(String::as_str).collect());
            tracing::debug!(old = %task.id, new = %replacement, "reassigning colliding import id");
            task.id = replacement;
        }
        taken.insert(task.id.clone());
        imported.push(task);
    }

    let count = imported.len();
    imported.extend_from_slice(tasks);
    Ok(ImportReport {
        tasks: imported,
        imported: count,
        skipped,
    })
}

fn apply_changes(tasks: &[Task], id: &str, changes: TaskChanges, now: DateTime<Utc>) -> Outcome {
    let Some(index) = tasks.iter().position(|task| task.id == id) else {
        return Outcome::Unchanged;
    };

    let prev = &tasks[index];
    let mut next = prev.clone();
    if let Some(title) = changes.title {
        next.title = title;
    }
    if let Some(description) = changes.description {
        next.description = description;
    }
    if let Some(due_date) = changes.due_date {
        next.due_date = due_date;
    }
    if let Some(priority) = changes.priority {
        next.priority = priority;
    }
    if let Some(status) = changes.status {
        next.status = status;
    }
    if let Some(mut tags) = changes.tags {
        tags.truncate(MAX_TAGS);
        next.tags = tags;
    }
    next.updated_at = now.max(prev.created_at);

    match (prev.status, next.status) {
        (Status::Open, Status::Done) => next.completed_at = Some(next.updated_at),
        (Status::Done, Status::Open) => next.completed_at = None,
        _ => {}
    }

    let mut out = tasks.to_vec();
    out[index] = next;
    Outcome::Changed(out)
}

fn validate_title(title: &str) -> Result<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(Error::validation("title", "Title is required"));
    }
    Ok(trimmed.to_string())
}

fn fresh_id(taken: HashSet<&str>) -> String {
    loop {
        let id = task::generate_id();
        if !taken.contains(id.as_str()) {
            return id;
        }
    }
}
