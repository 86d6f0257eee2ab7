//! Implementation of the `init` command.
//!
//! Creates the `.devtrack/` directory with a configuration file, an empty
//! data file for the chosen backend, an empty task export and a
//! `.gitignore`.

use crate::config::{BackendKind, CONFIG_FILE_NAME, DEVTRACK_DIR_NAME, DevtrackConfig};
use crate::error::{ConfigError, Result};
use crate::id_generation::{DEFAULT_EDGE_PREFIX, is_valid_prefix};
use crate::storage::{StorageBackend, SqliteStore};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Name of the gitignore file within `.devtrack`
pub const GITIGNORE_FILE_NAME: &str = ".gitignore";

/// Minimum prefix length
pub const MIN_PREFIX_LENGTH: usize = 2;

/// Maximum prefix length
pub const MAX_PREFIX_LENGTH: usize = 20;

/// Maximum directory depth to traverse when searching for the workspace root
pub const MAX_TRAVERSAL_DEPTH: usize = 256;

/// Result of the init command
#[derive(Debug)]
pub struct InitResult {
    /// Path to the created `.devtrack` directory
    pub devtrack_dir: PathBuf,
    /// Path to the created config file
    pub config_file: PathBuf,
    /// Path to the edge data file, if the backend has one
    pub data_file: Option<PathBuf>,
    /// Path to the (empty) task export
    pub tasks_file: PathBuf,
    /// The prefix used for edge ids
    pub prefix: String,
    /// The configured backend
    pub backend: BackendKind,
}

/// Validate an edge id prefix.
///
/// Expects pre-trimmed input.
///
/// # Errors
///
/// Returns `InvalidValue` if the prefix is too short, too long, or contains
/// anything other than lowercase letters, digits and inner hyphens.
pub fn validate_prefix(prefix: &str) -> Result<()> {
    let reason = if prefix.len() < MIN_PREFIX_LENGTH {
        format!("must be at least {MIN_PREFIX_LENGTH} characters")
    } else if prefix.len() > MAX_PREFIX_LENGTH {
        format!("cannot exceed {MAX_PREFIX_LENGTH} characters")
    } else if !is_valid_prefix(prefix) {
        "must contain only lowercase letters, digits and inner hyphens".to_string()
    } else {
        return Ok(());
    };

    Err(ConfigError::InvalidValue {
        field: "prefix",
        reason,
    }
    .into())
}

/// Initialize a workspace in `base_dir`.
///
/// # Errors
///
/// Returns an error if `.devtrack/` already exists, the prefix is invalid,
/// or a file cannot be created.
pub async fn init(
    base_dir: &Path,
    prefix: Option<&str>,
    backend: BackendKind,
) -> Result<InitResult> {
    let prefix = prefix.unwrap_or(DEFAULT_EDGE_PREFIX).trim();
    validate_prefix(prefix)?;

    let devtrack_dir = base_dir.join(DEVTRACK_DIR_NAME);
    if fs::try_exists(&devtrack_dir).await? {
        return Err(ConfigError::AlreadyInitialized(devtrack_dir).into());
    }
    fs::create_dir_all(&devtrack_dir).await?;

    let config = DevtrackConfig::new(prefix, backend);
    let config_file = devtrack_dir.join(CONFIG_FILE_NAME);
    config.save(&config_file).await?;

    let data_file = match config.storage.to_backend(base_dir)? {
        StorageBackend::Jsonl(path) => {
            fs::write(&path, "").await?;
            Some(path)
        }
        StorageBackend::Sqlite(path) => {
            // Opening applies the schema.
            SqliteStore::open(&path, prefix)?;
            Some(path)
        }
        StorageBackend::InMemory => None,
    };

    let tasks_file = base_dir.join(&config.tasks_file);
    fs::write(&tasks_file, "").await?;

    let gitignore = "\
# SQLite scratch files
*.db-wal
*.db-shm
# Interrupted atomic writes
*.tmp
";
    fs::write(devtrack_dir.join(GITIGNORE_FILE_NAME), gitignore).await?;

    tracing::info!(dir = %devtrack_dir.display(), ?backend, "Initialized devtrack workspace");

    Ok(InitResult {
        devtrack_dir,
        config_file,
        data_file,
        tasks_file,
        prefix: prefix.to_string(),
        backend,
    })
}

/// Find the workspace root by searching up from `start_dir`.
///
/// Returns the directory containing `.devtrack/`, or `None` if none is
/// found within [`MAX_TRAVERSAL_DEPTH`] levels.
pub fn find_devtrack_root(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir.to_path_buf();
    let mut depth = 0;

    loop {
        if current.join(DEVTRACK_DIR_NAME).is_dir() {
            return Some(current);
        }

        depth += 1;
        if depth > MAX_TRAVERSAL_DEPTH || !current.pop() {
            return None;
        }
    }
}
