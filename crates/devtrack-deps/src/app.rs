//! Application context for CLI command execution.
//!
//! [`App`] locates the workspace, loads its configuration, opens the edge
//! store and the task export, and wires them into a [`DependencyManager`].
//!
//! # Example
//!
//! ```no_run
//! use devtrack_deps::app::App;
//! use std::path::Path;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let app = App::from_directory(Path::new(".")).await?;
//!     let report = app.manager().verify().await?;
//!     println!("{} edges", report.edges);
//!     Ok(())
//! }
//! ```

use crate::commands::init::find_devtrack_root;
use crate::config::{CONFIG_FILE_NAME, DEVTRACK_DIR_NAME, DevtrackConfig};
use crate::error::{ConfigError, Result};
use crate::manager::DependencyManager;
use crate::storage::create_storage;
use crate::tasks::InMemoryTaskDirectory;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Application context for CLI operations.
pub struct App {
    manager: DependencyManager,
    tasks: Arc<InMemoryTaskDirectory>,
    devtrack_dir: PathBuf,
    config: DevtrackConfig,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("devtrack_dir", &self.devtrack_dir)
            .field("config", &self.config)
            .field("manager", &"<DependencyManager>")
            .finish()
    }
}

impl App {
    /// Create an App from `working_dir` or the nearest ancestor holding
    /// `.devtrack/`.
    ///
    /// # Errors
    ///
    /// Returns an error if no workspace is found, the configuration cannot
    /// be loaded, or the store cannot be opened.
    pub async fn from_directory(working_dir: &Path) -> Result<Self> {
        let root_dir = find_devtrack_root(working_dir)
            .ok_or_else(|| ConfigError::NotInitialized(working_dir.to_path_buf()))?;
        let devtrack_dir = root_dir.join(DEVTRACK_DIR_NAME);
        let config = DevtrackConfig::load(&devtrack_dir.join(CONFIG_FILE_NAME)).await?;

        let backend = config.storage.to_backend(&root_dir)?;
        tracing::debug!(?backend, "Opening dependency store");
        let store = create_storage(backend, &config.edge_prefix).await?;

        let (tasks, _warnings) =
            InMemoryTaskDirectory::load_from_jsonl(&root_dir.join(&config.tasks_file)).await?;
        let tasks = Arc::new(tasks);

        Ok(Self {
            manager: DependencyManager::new(store, tasks.clone()),
            tasks,
            devtrack_dir,
            config,
        })
    }

    /// The dependency manager.
    pub fn manager(&self) -> &DependencyManager {
        &self.manager
    }

    /// The task directory loaded from the export.
    pub fn tasks(&self) -> &InMemoryTaskDirectory {
        &self.tasks
    }

    /// Path to the `.devtrack` directory.
    pub fn devtrack_dir(&self) -> &Path {
        &self.devtrack_dir
    }

    /// Loaded configuration.
    pub fn config(&self) -> &DevtrackConfig {
        &self.config
    }

    /// Flush the store. Write-through backends make this a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub async fn save(&self) -> Result<()> {
        self.manager.store().save().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::init;
    use crate::config::BackendKind;
    use crate::domain::{DependencyType, TaskStatus};
    use crate::tasks::TaskRecord;
    use tempfile::TempDir;

    async fn write_tasks(root: &Path, ids: &[&str]) {
        let records: Vec<TaskRecord> = ids
            .iter()
            .map(|id| TaskRecord {
                id: (*id).into(),
                title: format!("Task {id}"),
                status: TaskStatus::NotStarted,
            })
            .collect();
        devtrack_jsonl::write_jsonl_atomic(root.join(".devtrack/tasks.jsonl"), &records)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn app_wires_store_and_tasks() {
        let temp = TempDir::new().unwrap();
        init::init(temp.path(), Some("team"), BackendKind::Sqlite).await.unwrap();
        write_tasks(temp.path(), &["t1", "t2"]).await;

        let app = App::from_directory(temp.path()).await.unwrap();
        assert_eq!(app.config().edge_prefix, "team");
        assert!(app.devtrack_dir().ends_with(".devtrack"));
        assert_eq!(app.tasks().len().await, 2);

        let edge = app
            .manager()
            .create("t1", "t2", DependencyType::Blocks)
            .await
            .unwrap();
        assert!(edge.id.as_str().starts_with("team-"));
        app.save().await.unwrap();

        let reopened = App::from_directory(temp.path()).await.unwrap();
        assert_eq!(reopened.manager().store().all_edges().await.unwrap(), vec![edge]);
    }

    #[tokio::test]
    async fn app_from_subdirectory() {
        let temp = TempDir::new().unwrap();
        init::init(temp.path(), None, BackendKind::Jsonl).await.unwrap();
        let sub = temp.path().join("src").join("lib");
        std::fs::create_dir_all(&sub).unwrap();

        let app = App::from_directory(&sub).await.unwrap();
        assert_eq!(app.config().edge_prefix, "dep");
    }

    #[tokio::test]
    async fn app_from_uninitialized_directory() {
        let temp = TempDir::new().unwrap();
        let err = App::from_directory(temp.path()).await.unwrap_err();
        assert!(err.to_string().contains("not a devtrack workspace"));
    }
}
