//! gt export / gt import

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;

use crate::error::Result;
use crate::mutation;
use crate::output::{emit_success, HumanOutput};
use crate::storage;

use super::context::{self, Context, GlobalOptions};

#[derive(Serialize)]
struct ExportReport {
    path: PathBuf,
    count: usize,
}

#[derive(Serialize)]
struct ImportSummary {
    imported: usize,
    skipped: usize,
    pushed: bool,
}

pub fn run_export(globals: &GlobalOptions, out: Option<PathBuf>) -> Result<()> {
    let ctx = Context::load(globals)?;
    let tasks = ctx.load_tasks()?;
    let now = Utc::now();
    let path = out.unwrap_or_else(|| PathBuf::from(storage::default_export_name(now)));

    storage::write_export(&path, &tasks, now)?;

    let mut human = HumanOutput::new(format!("Exported {} task(s)", tasks.len()));
    human.push_summary("file", path.display().to_string());
    let report = ExportReport {
        path,
        count: tasks.len(),
    };
    emit_success(ctx.output, "export", &report, Some(&human))
}

pub fn run_import(globals: &GlobalOptions, path: &Path, yes: bool) -> Result<()> {
    let ctx = Context::load(globals)?;
    let envelope = storage::read_import(path)?;
    let tasks = ctx.load_tasks()?;
    let report = mutation::import(&tasks, &envelope, Utc::now())?;

    let mut summary = ImportSummary {
        imported: report.imported,
        skipped: report.skipped,
        pushed: false,
    };
    let mut human = HumanOutput::new(format!("Imported {} task(s)", report.imported));
    if report.skipped > 0 {
        human.push_warning(format!("skipped {} invalid entries", report.skipped));
    }
    if report.imported == 0 {
        return emit_success(ctx.output, "import", &summary, Some(&human));
    }
    if !context::confirm(&format!("Import {} tasks?", report.imported), yes)? {
        let human = HumanOutput::new("Cancelled");
        summary.imported = 0;
        return emit_success(ctx.output, "import", &summary, Some(&human));
    }

    // Re-run against the collection as it is under the lock; it may have
    // changed while the prompt was open.
    let locked = ctx.lock_tasks()?;
    let current = locked.load_or_empty()?;
    let report = mutation::import(&current, &envelope, Utc::now())?;
    summary.imported = report.imported;
    summary.skipped = report.skipped;

    human.push_summary("file", path.display().to_string());
    summary.pushed = ctx.commit(locked, &report.tasks, &mut human)?;
    emit_success(ctx.output, "import", &summary, Some(&human))
}
