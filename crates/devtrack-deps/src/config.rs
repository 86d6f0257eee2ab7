//! Workspace configuration (`.devtrack/config.yaml`).

use crate::error::{ConfigError, Result};
use crate::id_generation::DEFAULT_EDGE_PREFIX;
use crate::storage::StorageBackend;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

/// Name of the workspace directory
pub const DEVTRACK_DIR_NAME: &str = ".devtrack";

/// Name of the configuration file
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Default name of the JSONL edge file
pub const JSONL_FILE_NAME: &str = "dependencies.jsonl";

/// Default name of the `SQLite` edge database
pub const SQLITE_FILE_NAME: &str = "dependencies.db";

/// Default name of the host's task export
pub const TASKS_FILE_NAME: &str = "tasks.jsonl";

/// Which store backs the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// `SQLite` database file
    #[default]
    Sqlite,

    /// JSONL file rewritten on every change
    Jsonl,

    /// Nothing persisted
    Memory,
}

impl BackendKind {
    /// Default data file name for this backend, if it has one.
    #[must_use]
    pub fn default_file_name(self) -> Option<&'static str> {
        match self {
            Self::Sqlite => Some(SQLITE_FILE_NAME),
            Self::Jsonl => Some(JSONL_FILE_NAME),
            Self::Memory => None,
        }
    }
}

/// Configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DevtrackConfig {
    /// Prefix for edge ids (e.g. "dep" for "dep-k3f9az")
    #[serde(rename = "edge-prefix", default = "default_prefix")]
    pub edge_prefix: String,

    /// Task export consulted for task existence and status
    #[serde(default = "default_tasks_file")]
    pub tasks_file: String,

    /// Storage configuration
    pub storage: StorageConfig,
}

/// Storage configuration section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageConfig {
    /// Backend type
    pub backend: BackendKind,

    /// Data file, relative to the workspace root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_file: Option<String>,
}

fn default_prefix() -> String {
    DEFAULT_EDGE_PREFIX.to_string()
}

fn default_tasks_file() -> String {
    format!("{DEVTRACK_DIR_NAME}/{TASKS_FILE_NAME}")
}

impl StorageConfig {
    /// Resolve the configured backend against the workspace `root`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidValue` if a file backend has an empty `data_file`.
    pub fn to_backend(&self, root: &Path) -> Result<StorageBackend> {
        let file = match (&self.data_file, self.backend.default_file_name()) {
            (Some(file), _) if file.trim().is_empty() => {
                return Err(ConfigError::InvalidValue {
                    field: "storage.data_file",
                    reason: "must not be empty".to_string(),
                }
                .into());
            }
            (Some(file), _) => Some(root.join(file)),
            (None, Some(name)) => Some(root.join(DEVTRACK_DIR_NAME).join(name)),
            (None, None) => None,
        };

        Ok(match (self.backend, file) {
            (BackendKind::Sqlite, Some(path)) => StorageBackend::Sqlite(path),
            (BackendKind::Jsonl, Some(path)) => StorageBackend::Jsonl(path),
            _ => StorageBackend::InMemory,
        })
    }
}

impl DevtrackConfig {
    /// Create a configuration for `backend` with the given id prefix.
    pub fn new(prefix: &str, backend: BackendKind) -> Self {
        Self {
            edge_prefix: prefix.to_string(),
            tasks_file: default_tasks_file(),
            storage: StorageConfig {
                backend,
                data_file: backend
                    .default_file_name()
                    .map(|name| format!("{DEVTRACK_DIR_NAME}/{name}")),
            },
        }
    }

    /// Load configuration from a file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).await?;
        let config: Self = serde_yaml::from_str(&content).map_err(ConfigError::from)?;
        if !crate::id_generation::is_valid_prefix(&config.edge_prefix) {
            return Err(ConfigError::InvalidValue {
                field: "edge-prefix",
                reason: format!("'{}' is not a valid id prefix", config.edge_prefix),
            }
            .into());
        }
        Ok(config)
    }

    /// Save configuration to a file
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).map_err(ConfigError::from)?;
        fs::write(path, content).await?;
        Ok(())
    }
}

impl Default for DevtrackConfig {
    fn default() -> Self {
        Self::new(DEFAULT_EDGE_PREFIX, BackendKind::default())
    }
}
