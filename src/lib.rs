//! glasstask - Task List Library
//!
//! This library provides the core functionality for the gt CLI tool: a
//! single-user task list with filtering, sorting, and last-write-wins
//! synchronization against a remote per-user collection.
//!
//! # Core Concepts
//!
//! - **Tasks**: Records normalized from arbitrary JSON into a valid shape
//! - **Queries**: Status/priority/due filters, text search, and stable sorting
//! - **Mutations**: Pure create/update/toggle/delete/clear/import operations
//! - **Sync**: Per-record last-write-wins merge and full-collection push
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `config`: Configuration loading from `glasstask.toml`
//! - `debounce`: Trailing-edge debouncing for persistence and search
//! - `error`: Error types and result aliases
//! - `lock`: File locking and atomic writes
//! - `mutation`: Mutation engine
//! - `output`: Human and JSON output envelopes
//! - `query`: Query engine and due-date helpers
//! - `remote`: Directory-backed remote store with change subscription
//! - `session`: Signed-in user resolution
//! - `storage`: Local task file, export and import files
//! - `sync`: Merge, push planning, and the reconciler driver
//! - `task`: Task record model and normalization

pub mod cli;
pub mod config;
pub mod debounce;
pub mod error;
pub mod lock;
pub mod mutation;
pub mod output;
pub mod query;
pub mod remote;
pub mod session;
pub mod storage;
pub mod sync;
pub mod task;

pub use error::{Error, Result};
