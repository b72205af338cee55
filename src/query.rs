//! Query engine: derives the visible, ordered slice of a task collection.
//!
//! Everything here is a pure function of its inputs. "Today" is passed in by
//! the caller (the local calendar day) so results are reproducible.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::task::{Priority, Status, Task};

/// Number of days after today still covered by the `week` window.
pub const WEEK_WINDOW_DAYS: u64 = 7;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    #[default]
    All,
    Open,
    Done,
}

impl StatusFilter {
    fn matches(self, status: Status) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Open => status == Status::Open,
            StatusFilter::Done => status == Status::Done,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(StatusFilter::All),
            "open" => Ok(StatusFilter::Open),
            "done" => Ok(StatusFilter::Done),
            other => Err(Error::InvalidArgument(format!(
                "unknown status filter '{other}' (expected all|open|done)"
            ))),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityFilter {
    #[default]
    All,
    Only(Priority),
}

impl PriorityFilter {
    fn matches(self, priority: Priority) -> bool {
        match self {
            PriorityFilter::All => true,
            PriorityFilter::Only(wanted) => wanted == priority,
        }
    }
}

impl FromStr for PriorityFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(PriorityFilter::All);
        }
        s.parse::<Priority>().map(PriorityFilter::Only)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DueFilter {
    #[default]
    All,
    None,
    Today,
    Week,
    Overdue,
}

impl DueFilter {
    fn matches(self, due: Option<NaiveDate>, today: NaiveDate) -> bool {
        match (self, due) {
            (DueFilter::All, _) => true,
            (DueFilter::None, due) => due.is_none(),
            (_, None) => false,
            (DueFilter::Today, Some(date)) => date == today,
            (DueFilter::Week, Some(date)) => date >= today && date <= end_of_week(today),
            (DueFilter::Overdue, Some(date)) => date < today,
        }
    }
}

impl FromStr for DueFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(DueFilter::All),
            "none" => Ok(DueFilter::None),
            "today" => Ok(DueFilter::Today),
            "week" => Ok(DueFilter::Week),
            "overdue" => Ok(DueFilter::Overdue),
            other => Err(Error::InvalidArgument(format!(
                "unknown due filter '{other}' (expected all|none|today|week|overdue)"
            ))),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    DueDate,
    Priority,
    CreatedAt,
    Title,
}

impl SortField {
    pub fn as_str(self) -> &'static str {
        match self {
            SortField::DueDate => "due_date",
            SortField::Priority => "priority",
            SortField::CreatedAt => "created_at",
            SortField::Title => "title",
        }
    }

    fn compare(self, a: &Task, b: &Task) -> Ordering {
        match self {
            SortField::DueDate => due_sort_key(a).cmp(&due_sort_key(b)),
            SortField::Priority => a.priority.rank().cmp(&b.priority.rank()),
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "due_date" | "duedate" | "due" => Ok(SortField::DueDate),
            "priority" => Ok(SortField::Priority),
            "created_at" | "createdat" | "created" => Ok(SortField::CreatedAt),
            "title" => Ok(SortField::Title),
            other => Err(Error::InvalidArgument(format!(
                "unknown sort field '{other}' (expected due_date|priority|created_at|title)"
            ))),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortDirection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(Error::InvalidArgument(format!(
                "unknown sort direction '{other}' (expected asc|desc)"
            ))),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }
}

/// Filter, search and sort parameters for one view of the collection.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskQuery {
    pub status: StatusFilter,
    pub priority: PriorityFilter,
    pub due: DueFilter,
    pub search: String,
    pub sort: SortSpec,
}

/// Aggregate counts shown alongside the visible list.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaskCounts {
    pub total: usize,
    pub open: usize,
    pub done: usize,
}

impl fmt::Display for TaskCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} open • {} done • {} total",
            self.open, self.done, self.total
        )
    }
}

/// Where a due date falls relative to today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DueBucket {
    None,
    Overdue,
    Today,
    Upcoming,
    Later,
}

/// Whether a single task passes every filter of the query.
pub fn matches(task: &Task, query: &TaskQuery, today: NaiveDate) -> bool {
    if !query.status.matches(task.status) {
        return false;
    }
    if !query.priority.matches(task.priority) {
        return false;
    }
    if !query.due.matches(task.due_date, today) {
        return false;
    }
    let needle = query.search.trim().to_lowercase();
    needle.is_empty() || task.search_haystack().to_lowercase().contains(&needle)
}

/// Filter then sort the collection. The result is a subset of `tasks`.
pub fn visible_tasks(tasks: &[Task], query: &TaskQuery, today: NaiveDate) -> Vec<Task> {
    let mut visible: Vec<Task> = tasks
        .iter()
        .filter(|task| matches(task, query, today))
        .cloned()
        .collect();
    sort_tasks(&mut visible, query.sort);
    visible
}

/// Stable sort by the chosen field; equal keys keep their relative order in
/// both directions.
pub fn sort_tasks(tasks: &mut [Task], sort: SortSpec) {
    tasks.sort_by(|a, b| {
        let ordering = sort.field.compare(a, b);
        match sort.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
}

pub fn counts(tasks: &[Task]) -> TaskCounts {
    let done = tasks.iter().filter(|task| task.is_done()).count();
    TaskCounts {
        total: tasks.len(),
        open: tasks.len() - done,
        done,
    }
}

pub fn due_bucket(due: Option<NaiveDate>, today: NaiveDate) -> DueBucket {
    let Some(date) = due else {
        return DueBucket::None;
    };
    match date.cmp(&today) {
        Ordering::Less => DueBucket::Overdue,
        Ordering::Equal => DueBucket::Today,
        Ordering::Greater if date <= end_of_week(today) => DueBucket::Upcoming,
        Ordering::Greater => DueBucket::Later,
    }
}

/// Friendly due label, e.g. `Jun 12 (in 2d)`.
pub fn due_label(due: Option<NaiveDate>, today: NaiveDate) -> String {
    let Some(date) = due else {
        return "No due date".to_string();
    };
    let label = date.format("%b %-d").to_string();
    let days = (date - today).num_days();
    match days {
        d if d < 0 => format!("{label} (overdue)"),
        0 => format!("{label} (today)"),
        1 => format!("{label} (tomorrow)"),
        d if d <= WEEK_WINDOW_DAYS as i64 => format!("{label} (in {d}d)"),
        _ => label,
    }
}

fn end_of_week(today: NaiveDate) -> NaiveDate {
    today
        .checked_add_days(Days::new(WEEK_WINDOW_DAYS))
        .unwrap_or(NaiveDate::MAX)
}

// Tasks without a due date sort after every dated task.
fn due_sort_key(task: &Task) -> NaiveDate {
    task.due_date.unwrap_or(NaiveDate::MAX)
}
