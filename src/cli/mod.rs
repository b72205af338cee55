//! Command-line interface for glasstask
//!
//! This module defines the CLI structure using clap derive macros.
//! Command implementations live in submodules grouped by concern.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::error::Result;

mod config;
mod context;
mod sync;
mod task;
mod transfer;

pub use context::GlobalOptions;

/// gt - a task list with filters, sorting and last-write-wins sync
///
/// Tasks live in a local data file. When a user is signed in and a remote
/// directory is configured, every change is pushed to the remote collection
/// and `gt sync` / `gt watch` pull other devices' edits back in.
#[derive(Parser, Debug)]
#[command(name = "gt")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file (defaults to <data dir>/glasstask.toml)
    #[arg(long, global = true, env = "GLASSTASK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Data directory holding tasks.json
    #[arg(long, global = true, env = "GLASSTASK_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Remote store directory (overrides sync.remote_dir)
    #[arg(long, global = true, env = "GLASSTASK_REMOTE_DIR")]
    pub remote_dir: Option<PathBuf>,

    /// Signed-in user (overrides GLASSTASK_USER and sync.user)
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add a task
    Add {
        /// Task title
        title: String,

        #[arg(short, long)]
        description: Option<String>,

        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,

        /// Priority: low, medium, high
        #[arg(short, long, default_value = "medium")]
        priority: String,

        /// Comma-separated tags (at most 8)
        #[arg(short, long)]
        tags: Option<String>,
    },

    /// Edit fields of a task
    Edit {
        /// Task id or unique id prefix
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        /// Due date (YYYY-MM-DD)
        #[arg(long, conflicts_with = "no_due")]
        due: Option<String>,

        /// Clear the due date
        #[arg(long)]
        no_due: bool,

        /// Priority: low, medium, high
        #[arg(short, long)]
        priority: Option<String>,

        /// Comma-separated tags, replacing the current ones
        #[arg(short, long)]
        tags: Option<String>,
    },

    /// Mark a task done
    Done {
        /// Task id or unique id prefix
        id: String,
    },

    /// Mark a task open again
    Reopen {
        /// Task id or unique id prefix
        id: String,
    },

    /// Delete a task
    Rm {
        /// Task id or unique id prefix
        id: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Delete every completed task
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// List tasks matching filters
    List {
        /// Status filter: all, open, done
        #[arg(long, default_value = "all")]
        status: String,

        /// Priority filter: all, low, medium, high
        #[arg(long, default_value = "all")]
        priority: String,

        /// Due filter: all, none, today, week, overdue
        #[arg(long, default_value = "all")]
        due: String,

        /// Case-insensitive text search over title, description and tags
        #[arg(short, long)]
        search: Option<String>,

        /// Sort field: due_date, priority, created_at, title (default from config)
        #[arg(long)]
        sort: Option<String>,

        /// Sort descending
        #[arg(long, conflicts_with = "asc")]
        desc: bool,

        /// Sort ascending
        #[arg(long)]
        asc: bool,
    },

    /// Show one task in full
    Show {
        /// Task id or unique id prefix
        id: String,
    },

    /// Write all tasks to an export file
    Export {
        /// Output path (defaults to ./tasks-YYYY-MM-DD-HH-MM-SS.json)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Import tasks from an export file
    Import {
        /// Export file to read
        path: PathBuf,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Pull remote changes, merge, and push the result
    Sync,

    /// Follow remote changes and keep the local file up to date
    ///
    /// Lines typed on stdin become the search filter of the printed list.
    Watch {
        /// Apply the first remote snapshot and exit
        #[arg(long)]
        once: bool,
    },

    /// Configuration commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,
}

impl Cli {
    fn globals(&self) -> GlobalOptions {
        GlobalOptions {
            config: self.config.clone(),
            data_dir: self.data_dir.clone(),
            remote_dir: self.remote_dir.clone(),
            user: self.user.clone(),
            json: self.json,
            quiet: self.quiet,
        }
    }

    /// Run the selected command
    pub fn run(self) -> Result<()> {
        let globals = self.globals();
        match self.command {
            Commands::Add {
                title,
                description,
                due,
                priority,
                tags,
            } => task::run_add(
                &globals,
                task::AddOptions {
                    title,
                    description,
                    due,
                    priority,
                    tags,
                },
            ),
            Commands::Edit {
                id,
                title,
                description,
                due,
                no_due,
                priority,
                tags,
            } => task::run_edit(
                &globals,
                task::EditOptions {
                    id,
                    title,
                    description,
                    due,
                    no_due,
                    priority,
                    tags,
                },
            ),
            Commands::Done { id } => task::run_set_status(&globals, &id, true),
            Commands::Reopen { id } => task::run_set_status(&globals, &id, false),
            Commands::Rm { id, yes } => task::run_rm(&globals, &id, yes),
            Commands::Clear { yes } => task::run_clear(&globals, yes),
            Commands::List {
                status,
                priority,
                due,
                search,
                sort,
                desc,
                asc,
            } => task::run_list(
                &globals,
                task::ListOptions {
                    status,
                    priority,
                    due,
                    search,
                    sort,
                    desc,
                    asc,
                },
            ),
            Commands::Show { id } => task::run_show(&globals, &id),
            Commands::Export { out } => transfer::run_export(&globals, out),
            Commands::Import { path, yes } => transfer::run_import(&globals, &path, yes),
            Commands::Sync => sync::run_sync(&globals),
            Commands::Watch { once } => sync::run_watch(&globals, once),
            Commands::Config(ConfigCommands::Show) => config::run_show(&globals),
        }
    }
}
