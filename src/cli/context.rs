//! Per-invocation state shared by gt commands.

use std::future::Future;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::time::Duration;

use chrono::{Local, NaiveDate};

use crate::config::{self, Config, CONFIG_FILE};
use crate::error::{Error, Result};
use crate::output::{HumanOutput, OutputOptions};
use crate::remote::DirRemoteStore;
use crate::session::{self, UserKey};
use crate::storage::{LocalStore, LockedTasks};
use crate::sync::Reconciler;
use crate::task::Task;

const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(200);

/// Options shared by every subcommand
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub remote_dir: Option<PathBuf>,
    pub user: Option<String>,
    pub json: bool,
    pub quiet: bool,
}

impl GlobalOptions {
    pub fn output(&self) -> OutputOptions {
        OutputOptions {
            json: self.json,
            quiet: self.quiet,
        }
    }
}

pub struct Context {
    pub config: Config,
    pub config_path: PathBuf,
    pub store: LocalStore,
    pub user: Option<UserKey>,
    pub remote_dir: Option<PathBuf>,
    pub output: OutputOptions,
}

impl Context {
    /// Resolve config, data directory and session for this invocation.
    pub fn load(globals: &GlobalOptions) -> Result<Self> {
        let config_path = match (&globals.config, &globals.data_dir) {
            (Some(path), _) => path.clone(),
            (None, Some(dir)) => dir.join(CONFIG_FILE),
            (None, None) => config::default_data_dir()?.join(CONFIG_FILE),
        };
        let config = Config::load_or_default(&config_path)?;

        let data_dir = match &globals.data_dir {
            Some(dir) => dir.clone(),
            None => config.data_dir()?,
        };
        let user = session::resolve_user_key(globals.user.as_deref(), &config)?;
        let remote_dir = globals
            .remote_dir
            .clone()
            .or_else(|| config.sync.remote_dir.clone());

        tracing::debug!(
            data_dir = %data_dir.display(),
            config = %config_path.display(),
            signed_in = user.is_some(),
            "resolved context"
        );

        Ok(Self {
            config,
            config_path,
            store: LocalStore::new(data_dir),
            user,
            remote_dir,
            output: globals.output(),
        })
    }

    /// Read the collection without locking; for commands that only display.
    pub fn load_tasks(&self) -> Result<Vec<Task>> {
        self.store.load_or_empty()
    }

    /// Lock the task file for a read-modify-write cycle ended by [`commit`].
    ///
    /// [`commit`]: Context::commit
    pub fn lock_tasks(&self) -> Result<LockedTasks<'_>> {
        self.store.lock()
    }

    /// Reconciler for the signed-in user, if sync is configured.
    pub fn try_reconciler(&self) -> Option<Reconciler<DirRemoteStore>> {
        let user = self.user.clone()?;
        let remote_dir = self.remote_dir.clone()?;
        Some(Reconciler::new(DirRemoteStore::new(remote_dir), user))
    }

    /// Reconciler for commands that cannot run without sync.
    pub fn reconciler(&self, command: &str) -> Result<Reconciler<DirRemoteStore>> {
        if self.user.is_none() {
            return Err(Error::NotSignedIn(format!("{command} needs a signed-in user")));
        }
        self.try_reconciler().ok_or_else(|| {
            Error::InvalidConfig(format!(
                "{command} needs sync.remote_dir or --remote-dir"
            ))
        })
    }

    /// Persist `tasks` under `locked`, release the lock, then push when
    /// auto-push applies.
    ///
    /// A failed push is reported as a warning: the local save already happened.
    pub fn commit(
        &self,
        locked: LockedTasks<'_>,
        tasks: &[Task],
        human: &mut HumanOutput,
    ) -> Result<bool> {
        locked.save(tasks)?;
        drop(locked);
        if !self.config.sync.auto_push {
            return Ok(false);
        }
        let Some(reconciler) = self.try_reconciler() else {
            return Ok(false);
        };

        match block_on(reconciler.push(tasks)).and_then(|pushed| pushed) {
            Ok(report) => {
                human.push_summary(
                    "pushed",
                    format!("{} upserted, {} deleted", report.upserted, report.deleted),
                );
                Ok(true)
            }
            Err(err) => {
                tracing::warn!(error = %err, "auto-push failed");
                human.push_warning(format!("push failed: {err}"));
                human.push_next_step("gt sync");
                Ok(false)
            }
        }
    }
}

/// Today's date in the local timezone; due dates are calendar dates.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Run a future to completion on a fresh runtime.
///
/// Shutdown does not wait for a blocked stdin reader left behind by `watch`.
pub fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let output = runtime.block_on(future);
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
    Ok(output)
}

/// Ask for confirmation on the terminal unless `yes` was given.
pub fn confirm(prompt: &str, yes: bool) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    let stdin = io::stdin();
    if !stdin.is_terminal() {
        return Err(Error::InvalidArgument(format!(
            "{prompt} Pass --yes to confirm non-interactively"
        )));
    }

    let mut stderr = io::stderr();
    write!(stderr, "{prompt} [y/N] ")?;
    stderr.flush()?;
    let mut answer = String::new();
    stdin.lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

/// Resolve a full id or unique id prefix against the collection.
pub fn resolve_id(tasks: &[Task], input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if let Some(task) = tasks.iter().find(|task| task.id == input) {
        return Some(task.id.clone());
    }
    let mut candidates = tasks.iter().filter(|task| task.id.starts_with(input));
    match (candidates.next(), candidates.next()) {
        (Some(task), None) => Some(task.id.clone()),
        _ => None,
    }
}
