//! Error types for glasstask
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (validation failure, bad args, malformed import, bad config)
//! - 4: Operation failed (I/O, transport, lock contention)
//!
//! Unknown task ids are not errors: the engines report them as
//! [`crate::mutation::Outcome::Unchanged`].

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the gt CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for glasstask operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Validation failed for {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not signed in: {0}")]
    NotSignedIn(String),

    // Operation failures (exit code 4)
    #[error("Remote store error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),
}

impl Error {
    /// Shorthand for a field-level validation failure.
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Error::Validation {
            field,
            message: message.into(),
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            // User errors
            Error::Validation { .. }
            | Error::MalformedInput(_)
            | Error::InvalidConfig(_)
            | Error::InvalidArgument(_)
            | Error::NotSignedIn(_) => exit_codes::USER_ERROR,

            // Operation failures
            Error::Transport(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::LockFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Structured details attached to JSON error output.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::Validation { field, .. } => Some(serde_json::json!({ "field": field })),
            Error::LockFailed(path) => {
                Some(serde_json::json!({ "path": path.to_string_lossy() }))
            }
            _ => None,
        }
    }
}

/// Result type alias for glasstask operations
pub type Result<T> = std::result::Result<T, Error>;
