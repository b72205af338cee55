//! Task records for glasstask.
//!
//! Every task that enters the system from outside (the local data file, an
//! import file, or a remote document) passes through [`normalize`], which
//! substitutes safe defaults for missing or mistyped fields instead of failing.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Maximum number of tags carried by a task.
pub const MAX_TAGS: usize = 8;

/// Title substituted when an external record has none.
pub const UNTITLED: &str = "Untitled";

const DUE_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

    /// Sort rank: high=3, medium=2, low=1.
    pub fn rank(self) -> u8 {
        match self {
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    fn parse_exact(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == value)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_exact(&s.trim().to_ascii_lowercase()).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "unknown priority '{}' (expected low|medium|high)",
                s.trim()
            ))
        })
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Open,
    Done,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Open => "open",
            Status::Done => "done",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(Status::Open),
            "done" => Ok(Status::Done),
            other => Err(Error::InvalidArgument(format!(
                "unknown status '{other}' (expected open|done)"
            ))),
        }
    }
}

/// A single to-do item.
///
/// Field names serialize in camelCase so the data file, export files and
/// remote documents all share one shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub due_date: Option<NaiveDate>,
    pub priority: Priority,
    pub status: Status,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Free-form per-user notes carried by remote documents; never interpreted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes_by_user: Option<Map<String, Value>>,
}

impl Task {
    pub fn is_done(&self) -> bool {
        self.status == Status::Done
    }

    /// Text matched by free-text search: title, description and comma-joined tags.
    pub fn search_haystack(&self) -> String {
        format!("{}\n{}\n{}", self.title, self.description, self.tags.join(","))
    }
}

/// Envelope used by the data file and by export files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<DateTime<Utc>>,
    pub tasks: Vec<Task>,
}

impl TaskEnvelope {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self {
            exported_at: None,
            tasks,
        }
    }

    pub fn exported(tasks: Vec<Task>, now: DateTime<Utc>) -> Self {
        Self {
            exported_at: Some(now),
            tasks,
        }
    }
}

/// Generate a fresh task identifier.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Normalize an arbitrary JSON value into a valid [`Task`], stamping missing
/// timestamps with the current time.
pub fn normalize(raw: &Value) -> Task {
    normalize_at(raw, Utc::now())
}

/// Normalize an arbitrary JSON value into a valid [`Task`].
///
/// Never fails: every missing or invalid field is replaced by its default.
/// Idempotent, since the output of this function serializes back into a value
/// for which every field is already valid.
pub fn normalize_at(raw: &Value, now: DateTime<Utc>) -> Task {
    let empty = Map::new();
    let fields = raw.as_object().unwrap_or(&empty);

    let id = match non_blank_str(fields.get("id")) {
        Some(id) => id.to_string(),
        None => generate_id(),
    };
    let title = non_blank_str(fields.get("title"))
        .unwrap_or(UNTITLED)
        .to_string();
    let description = fields
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let due_date = fields.get("dueDate").and_then(parse_due_date);
    let priority = fields
        .get("priority")
        .and_then(Value::as_str)
        .and_then(Priority::parse_exact)
        .unwrap_or_default();
    let status = match fields.get("status").and_then(Value::as_str) {
        Some("done") => Status::Done,
        _ => Status::Open,
    };
    let tags = match fields.get("tags") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .take(MAX_TAGS)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };

    let created_at = fields
        .get("createdAt")
        .and_then(parse_timestamp)
        .unwrap_or(now);
    let updated_at = fields
        .get("updatedAt")
        .and_then(parse_timestamp)
        .unwrap_or(now)
        .max(created_at);
    let completed_at = match status {
        Status::Done => Some(
            fields
                .get("completedAt")
                .and_then(parse_timestamp)
                .unwrap_or(now),
        ),
        Status::Open => None,
    };
    let notes_by_user = match fields.get("notesByUser") {
        Some(Value::Object(notes)) => Some(notes.clone()),
        _ => None,
    };

    Task {
        id,
        title,
        description,
        due_date,
        priority,
        status,
        tags,
        created_at,
        updated_at,
        completed_at,
        notes_by_user,
    }
}

/// Parse the comma-separated tag input of the task form.
pub fn parse_tags(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .take(MAX_TAGS)
        .map(str::to_string)
        .collect()
}

/// Parse a `YYYY-MM-DD` due date given on the command line.
pub fn parse_due_arg(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), DUE_DATE_FORMAT).map_err(|err| {
        Error::InvalidArgument(format!(
            "invalid due date '{}' (expected YYYY-MM-DD): {err}",
            input.trim()
        ))
    })
}

fn non_blank_str(value: Option<&Value>) -> Option<&str> {
    let value = value?.as_str()?;
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

fn parse_due_date(value: &Value) -> Option<NaiveDate> {
    let raw = non_blank_str(Some(value))?.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, DUE_DATE_FORMAT) {
        return Some(date);
    }
    if let Ok(stamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(stamp.date_naive());
    }
    tracing::debug!(due_date = raw, "dropping unparseable due date");
    None
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let raw = non_blank_str(Some(value))?.trim();
    match DateTime::parse_from_rfc3339(raw) {
        Ok(stamp) => Some(stamp.with_timezone(&Utc)),
        Err(err) => {
            tracing::debug!(timestamp = raw, %err, "replacing unparseable timestamp");
            None
        }
    }
}
