//! gt sync / gt watch

use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::debounce::Debouncer;
use crate::error::{Error, Result};
use crate::output::{emit_success, format_human, HumanOutput};
use crate::query::TaskQuery;
use crate::storage::LocalStore;
use crate::sync::{self, PushReport};
use crate::task::Task;

use super::context::{self, Context, GlobalOptions};
use super::task::render_list;

#[derive(Serialize)]
struct SyncSummary {
    user: String,
    total: usize,
    adopted: usize,
    replaced: usize,
    pushed: PushReport,
}

#[derive(Serialize)]
struct WatchSummary {
    user: String,
    snapshots: usize,
    total: usize,
}

pub fn run_sync(globals: &GlobalOptions) -> Result<()> {
    let ctx = Context::load(globals)?;
    let reconciler = ctx.reconciler("sync")?;
    let local = ctx.load_tasks()?;

    let report = context::block_on(reconciler.sync(&local))??;
    if report.tasks != local {
        // Local writes made while the remote round trip ran win over it.
        let locked = ctx.lock_tasks()?;
        let current = locked.load_or_empty()?;
        let merged = sync::merge_remote_since(&local, &current, &report.tasks);
        if merged != current {
            locked.save(&merged)?;
        }
    }

    let mut human = HumanOutput::new(format!("Synced as {}", reconciler.user()));
    human.push_summary("tasks", report.tasks.len().to_string());
    human.push_summary("adopted from remote", report.adopted.to_string());
    human.push_summary("replaced by newer remote", report.replaced.to_string());
    human.push_summary(
        "pushed",
        format!(
            "{} upserted, {} deleted",
            report.pushed.upserted, report.pushed.deleted
        ),
    );

    let summary = SyncSummary {
        user: reconciler.user().to_string(),
        total: report.tasks.len(),
        adopted: report.adopted,
        replaced: report.replaced,
        pushed: report.pushed,
    };
    emit_success(ctx.output, "sync", &summary, Some(&human))
}

/// A remote snapshot together with the local collection it was merged into
/// for display.
struct PendingSnapshot {
    base: Vec<Task>,
    snapshot: Vec<Task>,
}

/// Subscribe to the remote collection and merge every snapshot into the
/// local file. Persistence and search input are both debounced.
///
/// The local file stays the source of truth: each snapshot is merged into
/// the collection as currently stored, so edits made by other `gt`
/// invocations while watching are kept.
pub fn run_watch(globals: &GlobalOptions, once: bool) -> Result<()> {
    let ctx = Context::load(globals)?;
    let reconciler = ctx.reconciler("watch")?;
    let persist_window = Duration::from_millis(ctx.config.debounce.persist_ms);
    let search_window = Duration::from_millis(ctx.config.debounce.search_ms);
    let mut query = TaskQuery {
        sort: ctx.config.list.sort_spec()?,
        ..TaskQuery::default()
    };

    let snapshots = context::block_on(async {
        let mut subscription = reconciler.subscribe().await?;

        let store = ctx.store.clone();
        let persister = Debouncer::spawn(persist_window, move |pending: PendingSnapshot| {
            if let Err(err) = persist_snapshot(&store, &pending) {
                tracing::warn!(error = %err, "debounced save failed");
            }
        });

        let (search_tx, mut search_rx) = mpsc::unbounded_channel::<String>();
        let searcher = Debouncer::spawn(search_window, move |search: String| {
            let _ = search_tx.send(search);
        });

        let mut stdin = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = !once;
        let mut latest: Vec<Task> = Vec::new();
        let mut snapshots = 0usize;

        loop {
            tokio::select! {
                snapshot = subscription.next() => {
                    let Some(snapshot) = snapshot else { break };
                    snapshots += 1;
                    let base = ctx.load_tasks()?;
                    let merged = reconciler.apply_snapshot(&base, &snapshot);
                    tracing::debug!(total = merged.len(), "remote snapshot received");
                    persister.push(PendingSnapshot {
                        base,
                        snapshot: snapshot.clone(),
                    });
                    latest = snapshot;
                    if once {
                        break;
                    }
                    print_list(&ctx, &merged, &query);
                }
                Some(search) = search_rx.recv() => {
                    query.search = search;
                    let merged = reconciler.apply_snapshot(&ctx.load_tasks()?, &latest);
                    print_list(&ctx, &merged, &query);
                }
                line = stdin.next_line(), if stdin_open => match line {
                    Ok(Some(line)) => {
                        searcher.push(line.trim().to_string());
                    }
                    Ok(None) | Err(_) => stdin_open = false,
                },
                _ = tokio::signal::ctrl_c() => break,
            }
        }

        searcher.shutdown().await?;
        persister.shutdown().await?;
        Ok::<usize, Error>(snapshots)
    })??;

    let total = ctx.load_tasks()?.len();
    let mut human = HumanOutput::new(format!("Stopped watching as {}", reconciler.user()));
    human.push_summary("snapshots", snapshots.to_string());
    human.push_summary("tasks", total.to_string());
    let summary = WatchSummary {
        user: reconciler.user().to_string(),
        snapshots,
        total,
    };
    emit_success(ctx.output, "watch", &summary, Some(&human))
}

/// Merge `pending` into the stored collection under the task file lock.
fn persist_snapshot(store: &LocalStore, pending: &PendingSnapshot) -> Result<bool> {
    let locked = store.lock()?;
    let current = locked.load_or_empty()?;
    let merged = sync::merge_remote_since(&pending.base, &current, &pending.snapshot);
    if merged == current {
        return Ok(false);
    }
    locked.save(&merged)?;
    tracing::info!(total = merged.len(), "merged remote snapshot");
    Ok(true)
}

fn print_list(ctx: &Context, tasks: &[Task], query: &TaskQuery) {
    if ctx.output.quiet {
        return;
    }
    let (report, human) = render_list(tasks, query.clone(), context::today());
    if ctx.output.json {
        match serde_json::to_string(&report) {
            Ok(line) => println!("{line}"),
            Err(err) => tracing::warn!(error = %err, "cannot serialize list"),
        }
    } else {
        println!("{}\n", format_human(&human));
    }
}
