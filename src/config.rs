//! Configuration loading and management
//!
//! Handles parsing of `glasstask.toml` configuration files.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::query::{SortDirection, SortField, SortSpec};

/// Config file name inside the data directory
pub const CONFIG_FILE: &str = "glasstask.toml";

const MAX_DEBOUNCE_MS: u64 = 10_000;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    /// Remote sync configuration
    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub debounce: DebounceConfig,

    /// Default list ordering
    #[serde(default)]
    pub list: ListConfig,
}

/// Local storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Data directory; platform data dir when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

/// Remote sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Remote store root; sync is disabled when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_dir: Option<PathBuf>,

    /// Default user key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Push after every mutation while signed in
    #[serde(default = "default_true")]
    pub auto_push: bool,
}

fn default_true() -> bool {
    true
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote_dir: None,
            user: None,
            auto_push: true,
        }
    }
}

/// Debounce windows in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebounceConfig {
    #[serde(default = "default_debounce_ms")]
    pub persist_ms: u64,

    #[serde(default = "default_debounce_ms")]
    pub search_ms: u64,
}

fn default_debounce_ms() -> u64 {
    150
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            persist_ms: default_debounce_ms(),
            search_ms: default_debounce_ms(),
        }
    }
}

/// List ordering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListConfig {
    #[serde(default = "default_sort")]
    pub sort: String,

    #[serde(default = "default_direction")]
    pub direction: String,
}

fn default_sort() -> String {
    SortField::DueDate.as_str().to_string()
}

fn default_direction() -> String {
    SortDirection::Asc.as_str().to_string()
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            sort: default_sort(),
            direction: default_direction(),
        }
    }
}

impl ListConfig {
    /// Default sort spec for `list`
    pub fn sort_spec(&self) -> Result<SortSpec> {
        let field: SortField = self
            .sort
            .parse()
            .map_err(|_| Error::InvalidConfig(format!("list.sort: unknown field '{}'", self.sort)))?;
        let direction: SortDirection = self.direction.parse().map_err(|_| {
            Error::InvalidConfig(format!(
                "list.direction: expected asc or desc, got '{}'",
                self.direction
            ))
        })?;
        Ok(SortSpec::new(field, direction))
    }
}

impl Config {
    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file, falling back to defaults when it does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Save config to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Data directory: configured value or the platform default
    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.storage.dir {
            Some(dir) => Ok(dir.clone()),
            None => default_data_dir(),
        }
    }

    fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("debounce.persist_ms", self.debounce.persist_ms),
            ("debounce.search_ms", self.debounce.search_ms),
        ] {
            if value == 0 || value > MAX_DEBOUNCE_MS {
                return Err(Error::InvalidConfig(format!(
                    "{field} must be between 1 and {MAX_DEBOUNCE_MS}, got {value}"
                )));
            }
        }

        if let Some(user) = &self.sync.user {
            if user.trim().is_empty() {
                return Err(Error::InvalidConfig(
                    "sync.user cannot be empty".to_string(),
                ));
            }
        }

        if let Some(dir) = &self.sync.remote_dir {
            if dir.as_os_str().is_empty() {
                return Err(Error::InvalidConfig(
                    "sync.remote_dir cannot be empty".to_string(),
                ));
            }
        }

        self.list.sort_spec()?;
        Ok(())
    }
}

/// Platform data directory for glasstask
pub fn default_data_dir() -> Result<PathBuf> {
    directories::ProjectDirs::from("", "", "glasstask")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| {
            Error::InvalidConfig(
                "could not determine a data directory; set storage.dir or --data-dir".to_string(),
            )
        })
}
