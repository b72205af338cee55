//! gt task commands: add, edit, done/reopen, rm, clear, list, show.

use chrono::{NaiveDate, Utc};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::mutation::{self, Outcome, TaskChanges, TaskDraft};
use crate::output::{emit_success, HumanOutput};
use crate::query::{self, SortDirection, TaskCounts, TaskQuery};
use crate::task::{self, Priority, Task};

use super::context::{self, Context, GlobalOptions};

const SHORT_ID_LEN: usize = 8;

pub struct AddOptions {
    pub title: String,
    pub description: Option<String>,
    pub due: Option<String>,
    pub priority: String,
    pub tags: Option<String>,
}

pub struct EditOptions {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub due: Option<String>,
    pub no_due: bool,
    pub priority: Option<String>,
    pub tags: Option<String>,
}

pub struct ListOptions {
    pub status: String,
    pub priority: String,
    pub due: String,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub desc: bool,
    pub asc: bool,
}

#[derive(Serialize)]
struct MutationReport {
    id: Option<String>,
    changed: bool,
    pushed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    task: Option<Task>,
}

#[derive(Serialize)]
pub(super) struct ListReport {
    pub tasks: Vec<Task>,
    pub counts: TaskCounts,
    pub query: TaskQuery,
}

pub fn run_add(globals: &GlobalOptions, options: AddOptions) -> Result<()> {
    let ctx = Context::load(globals)?;
    let draft = TaskDraft {
        title: options.title,
        description: options
            .description
            .map(|d| d.trim().to_string())
            .unwrap_or_default(),
        due_date: options.due.as_deref().map(task::parse_due_arg).transpose()?,
        priority: options.priority.parse()?,
        tags: options.tags.as_deref().map(task::parse_tags).unwrap_or_default(),
    };
    let locked = ctx.lock_tasks()?;
    let tasks = locked.load_or_empty()?;
    let created = mutation::create(&tasks, draft, Utc::now())?;

    let mut human = HumanOutput::new(format!("Added: {}", created.task.title));
    human.push_summary("id", created.task.id.clone());
    let pushed = ctx.commit(locked, &created.tasks, &mut human)?;

    let report = MutationReport {
        id: Some(created.task.id.clone()),
        changed: true,
        pushed,
        task: Some(created.task),
    };
    emit_success(ctx.output, "add", &report, Some(&human))
}

pub fn run_edit(globals: &GlobalOptions, options: EditOptions) -> Result<()> {
    let due_date = if options.no_due {
        Some(None)
    } else {
        options
            .due
            .as_deref()
            .map(task::parse_due_arg)
            .transpose()?
            .map(Some)
    };
    let changes = TaskChanges {
        title: options.title,
        description: options.description.map(|d| d.trim().to_string()),
        due_date,
        priority: options
            .priority
            .as_deref()
            .map(|p| p.parse::<Priority>())
            .transpose()?,
        status: None,
        tags: options.tags.as_deref().map(task::parse_tags),
    };
    if changes.is_empty() {
        return Err(Error::InvalidArgument(
            "nothing to change; pass at least one field option".to_string(),
        ));
    }

    let ctx = Context::load(globals)?;
    mutate_one(&ctx, "edit", &options.id, "Updated", |tasks, id| {
        mutation::update(tasks, id, changes, Utc::now())
    })
}

pub fn run_set_status(globals: &GlobalOptions, id: &str, done: bool) -> Result<()> {
    let ctx = Context::load(globals)?;
    let (command, header) = if done {
        ("done", "Completed")
    } else {
        ("reopen", "Reopened")
    };
    mutate_one(&ctx, command, id, header, |tasks, id| {
        Ok(mutation::toggle_status(tasks, id, done, Utc::now()))
    })
}

pub fn run_rm(globals: &GlobalOptions, id: &str, yes: bool) -> Result<()> {
    let ctx = Context::load(globals)?;
    let tasks = ctx.load_tasks()?;
    if let Some(target) = context::resolve_id(&tasks, id)
        .and_then(|resolved| tasks.iter().find(|task| task.id == resolved))
    {
        if !context::confirm(&format!("Delete \"{}\"?", target.title), yes)? {
            return cancelled(&ctx, "rm");
        }
    }
    mutate_one(&ctx, "rm", id, "Deleted", |tasks, id| {
        Ok(mutation::delete(tasks, id))
    })
}

pub fn run_clear(globals: &GlobalOptions, yes: bool) -> Result<()> {
    let ctx = Context::load(globals)?;
    let tasks = ctx.load_tasks()?;
    let done = query::counts(&tasks).done;

    let mut human = HumanOutput::new("Clear completed");
    let mut report = MutationReport {
        id: None,
        changed: false,
        pushed: false,
        task: None,
    };
    if done == 0 {
        human.push_summary("removed", "0");
        return emit_success(ctx.output, "clear", &report, Some(&human));
    }
    if !context::confirm(&format!("Delete {done} completed task(s)?"), yes)? {
        return cancelled(&ctx, "clear");
    }

    let locked = ctx.lock_tasks()?;
    let current = locked.load_or_empty()?;
    let removed = query::counts(&current).done;
    match mutation::clear_completed(&current) {
        Outcome::Changed(next) => {
            human.push_summary("removed", removed.to_string());
            report.changed = true;
            report.pushed = ctx.commit(locked, &next, &mut human)?;
        }
        Outcome::Unchanged => human.push_summary("removed", "0"),
    }
    emit_success(ctx.output, "clear", &report, Some(&human))
}

pub fn run_list(globals: &GlobalOptions, options: ListOptions) -> Result<()> {
    let ctx = Context::load(globals)?;
    let tasks = ctx.load_tasks()?;

    let mut sort = ctx.config.list.sort_spec()?;
    if let Some(field) = options.sort.as_deref() {
        sort.field = field.parse()?;
    }
    if options.desc {
        sort.direction = SortDirection::Desc;
    } else if options.asc {
        sort.direction = SortDirection::Asc;
    }
    let query = TaskQuery {
        status: options.status.parse()?,
        priority: options.priority.parse()?,
        due: options.due.parse()?,
        search: options.search.unwrap_or_default(),
        sort,
    };

    let (report, human) = render_list(&tasks, query, context::today());
    emit_success(ctx.output, "list", &report, Some(&human))
}

pub fn run_show(globals: &GlobalOptions, id: &str) -> Result<()> {
    let ctx = Context::load(globals)?;
    let tasks = ctx.load_tasks()?;
    let found = context::resolve_id(&tasks, id)
        .and_then(|resolved| tasks.into_iter().find(|task| task.id == resolved));

    let Some(found) = found else {
        let mut human = HumanOutput::new("No task shown");
        human.push_warning(format!("no task matches '{id}'"));
        return emit_success(ctx.output, "show", &Option::<Task>::None, Some(&human));
    };

    let today = context::today();
    let mut human = HumanOutput::new(found.title.clone());
    human.push_summary("id", found.id.clone());
    human.push_summary("status", found.status.as_str());
    human.push_summary("priority", found.priority.as_str());
    human.push_summary("due", query::due_label(found.due_date, today));
    if !found.tags.is_empty() {
        human.push_summary("tags", found.tags.join(", "));
    }
    human.push_summary("created", found.created_at.to_rfc3339());
    human.push_summary("updated", found.updated_at.to_rfc3339());
    if let Some(completed) = found.completed_at {
        human.push_summary("completed", completed.to_rfc3339());
    }
    for line in found.description.lines() {
        human.push_detail(line);
    }
    emit_success(ctx.output, "show", &found, Some(&human))
}

/// Visible list plus counts, as printed by `list` and `watch`.
pub(super) fn render_list(
    tasks: &[Task],
    query: TaskQuery,
    today: NaiveDate,
) -> (ListReport, HumanOutput) {
    let visible = query::visible_tasks(tasks, &query, today);
    let counts = query::counts(tasks);

    let mut human = HumanOutput::new(counts.to_string());
    if tasks.is_empty() {
        human.push_next_step("gt add \"<title>\"");
    } else if visible.is_empty() {
        human.push_detail("No tasks match the current filters");
    }
    for task in &visible {
        human.push_detail(format_task_line(task, today));
    }

    let report = ListReport {
        tasks: visible,
        counts,
        query,
    };
    (report, human)
}

/// One-line summary: `[x] 1a2b3c4d Title · high · Jun 12 (in 2d) · #tag`
pub fn format_task_line(task: &Task, today: NaiveDate) -> String {
    let check = if task.is_done() { "[x]" } else { "[ ]" };
    let short_id: String = task.id.chars().take(SHORT_ID_LEN).collect();
    let mut line = format!("{check} {short_id} {} · {}", task.title, task.priority);
    if task.due_date.is_some() {
        line.push_str(" · ");
        line.push_str(&query::due_label(task.due_date, today));
    }
    if !task.tags.is_empty() {
        let tags: Vec<String> = task.tags.iter().map(|tag| format!("#{tag}")).collect();
        line.push_str(" · ");
        line.push_str(&tags.join(" "));
    }
    line
}

fn mutate_one<F>(ctx: &Context, command: &str, input: &str, header: &str, apply: F) -> Result<()>
where
    F: FnOnce(&[Task], &str) -> Result<Outcome>,
{
    let locked = ctx.lock_tasks()?;
    let tasks = locked.load_or_empty()?;
    let resolved = context::resolve_id(&tasks, input);
    let outcome = match resolved.as_deref() {
        Some(id) => apply(&tasks, id)?,
        None => Outcome::Unchanged,
    };

    let mut report = MutationReport {
        id: resolved.clone(),
        changed: false,
        pushed: false,
        task: None,
    };
    let human = match (outcome, resolved) {
        (Outcome::Changed(next), Some(id)) => {
            let task = next.iter().find(|task| task.id == id).cloned();
            let title = task
                .as_ref()
                .or_else(|| tasks.iter().find(|task| task.id == id))
                .map(|task| task.title.clone())
                .unwrap_or_default();
            let mut human = HumanOutput::new(format!("{header}: {title}"));
            human.push_summary("id", id);
            report.changed = true;
            report.pushed = ctx.commit(locked, &next, &mut human)?;
            report.task = task;
            human
        }
        (_, Some(id)) => {
            let mut human = HumanOutput::new("No changes");
            human.push_summary("id", id);
            human
        }
        (_, None) => {
            tracing::debug!(input, "no task matches id");
            let mut human = HumanOutput::new("No changes");
            human.push_warning(format!("no task matches '{input}'"));
            human
        }
    };
    emit_success(ctx.output, command, &report, Some(&human))
}

fn cancelled(ctx: &Context, command: &str) -> Result<()> {
    let report = MutationReport {
        id: None,
        changed: false,
        pushed: false,
        task: None,
    };
    emit_success(ctx.output, command, &report, Some(&HumanOutput::new("Cancelled")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn task_line_shows_state_priority_due_and_tags() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        let task = task::normalize(&json!({
            "id": "1a2b3c4d-rest",
            "title": "Buy milk",
            "priority": "high",
            "dueDate": "2024-06-12",
            "tags": ["home", "errand"],
            "status": "done"
        }));
        assert_eq!(
            format_task_line(&task, today),
            "[x] 1a2b3c4d Buy milk · high · Jun 12 (in 2d) · #home #errand"
        );
    }

    #[test]
    fn render_list_counts_all_tasks_but_shows_matches() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        let tasks: Vec<Task> = [("a", "open"), ("b", "done")]
            .iter()
            .map(|(id, status)| task::normalize(&json!({ "id": id, "title": id, "status": status })))
            .collect();
        let query = TaskQuery {
            status: "open".parse().unwrap(),
            ..TaskQuery::default()
        };
        let (report, human) = render_list(&tasks, query, today);
        assert_eq!(report.tasks.len(), 1);
        assert_eq!(report.counts.total, 2);
        assert!(crate::output::format_human(&human).starts_with("1 open • 1 done • 2 total"));
    }
}
