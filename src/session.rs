//! Signed-in user resolution.
//!
//! User key resolution order:
//! 1) CLI --user (explicit)
//! 2) GLASSTASK_USER environment variable
//! 3) Config default (sync.user)
//! 4) Signed out
//!
//! A signed-out session still works against local storage; sync commands
//! require a user.

use std::fmt;

use serde::Serialize;

use crate::config::Config;
use crate::error::{Error, Result};

pub const USER_ENV: &str = "GLASSTASK_USER";

/// Identifier of the signed-in user; also the remote collection name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct UserKey(String);

impl UserKey {
    /// Validate a user key. Keys become directory names in the remote store,
    /// so only `[A-Za-z0-9._@-]` is accepted.
    pub fn parse(raw: &str) -> Result<Self> {
        let key = raw.trim();
        if key.is_empty() {
            return Err(Error::InvalidArgument("user key cannot be empty".to_string()));
        }
        if key == "." || key == ".." {
            return Err(Error::InvalidArgument(format!("invalid user key '{key}'")));
        }
        if let Some(bad) = key
            .chars()
            .find(|ch| !(ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '@' | '-')))
        {
            return Err(Error::InvalidArgument(format!(
                "invalid character '{bad}' in user key '{key}'"
            )));
        }
        Ok(Self(key.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolve the current user using CLI, environment, and config.
pub fn resolve_user_key(cli_user: Option<&str>, config: &Config) -> Result<Option<UserKey>> {
    let env_user = std::env::var(USER_ENV).ok();
    resolve_from(cli_user, env_user.as_deref(), config.sync.user.as_deref())
}

fn resolve_from(
    cli_user: Option<&str>,
    env_user: Option<&str>,
    config_user: Option<&str>,
) -> Result<Option<UserKey>> {
    [cli_user, env_user, config_user]
        .into_iter()
        .find_map(non_empty)
        .map(UserKey::parse)
        .transpose()
}

fn non_empty(input: Option<&str>) -> Option<&str> {
    input.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}
