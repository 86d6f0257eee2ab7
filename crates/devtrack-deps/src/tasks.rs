//! Task collaborator interfaces.
//!
//! Tasks are owned by the host application. The dependency graph only asks
//! whether a task exists, what its status is, and (for display) its title.
//! The host tells the graph when a task goes away through
//! [`TaskDeletionHook`].

use crate::domain::{TaskId, TaskStatus, TaskSummary};
use crate::error::{Result, StorageError};
use async_trait::async_trait;
use devtrack_jsonl::{Warning, read_jsonl_resilient};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Read access to the host's tasks.
#[async_trait]
pub trait TaskLookup: Send + Sync {
    /// Title and status of a task, or `None` if it does not exist.
    async fn task_summary(&self, id: &TaskId) -> Result<Option<TaskSummary>>;

    /// Current status of a task, or `None` if it does not exist.
    async fn task_status(&self, id: &TaskId) -> Result<Option<TaskStatus>> {
        Ok(self.task_summary(id).await?.map(|summary| summary.status))
    }

    /// Whether the task exists.
    async fn task_exists(&self, id: &TaskId) -> Result<bool> {
        Ok(self.task_status(id).await?.is_some())
    }
}

/// Notification that a task was deleted by the host.
#[async_trait]
pub trait TaskDeletionHook: Send + Sync {
    /// Drop every dependency referencing `id`; returns how many were removed.
    async fn on_task_deleted(&self, id: &TaskId) -> Result<usize>;
}

/// One line of a `tasks.jsonl` export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Task identifier
    pub id: TaskId,

    /// Task title
    pub title: String,

    /// Current status
    pub status: TaskStatus,
}

/// In-process task directory.
///
/// Used in tests, by embedders without their own task store, and by the
/// CLI, which loads it from the host's `tasks.jsonl` export.
#[derive(Debug, Default)]
pub struct InMemoryTaskDirectory {
    tasks: RwLock<HashMap<TaskId, TaskRecord>>,
}

impl InMemoryTaskDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a directory from a JSONL export. A missing file loads as empty.
    ///
    /// Malformed lines are skipped and returned as warnings.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub async fn load_from_jsonl(path: &Path) -> Result<(Self, Vec<Warning>)> {
        if !tokio::fs::try_exists(path).await? {
            debug!(path = %path.display(), "No task file, starting empty");
            return Ok((Self::new(), Vec::new()));
        }

        let (records, warnings) = read_jsonl_resilient::<TaskRecord, _>(path)
            .await
            .map_err(StorageError::from)?;
        for warning in &warnings {
            warn!(%warning, "Skipped line in task file");
        }

        let tasks = records
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect();
        Ok((
            Self {
                tasks: RwLock::new(tasks),
            },
            warnings,
        ))
    }

    /// Add or replace a task.
    pub async fn insert(&self, id: impl Into<TaskId>, title: impl Into<String>, status: TaskStatus) {
        let id = id.into();
        let record = TaskRecord {
            id: id.clone(),
            title: title.into(),
            status,
        };
        self.tasks.write().await.insert(id, record);
    }

    /// Change a task's status. Returns `false` if the task is unknown.
    pub async fn set_status(&self, id: &TaskId, status: TaskStatus) -> bool {
        match self.tasks.write().await.get_mut(id) {
            Some(record) => {
                record.status = status;
                true
            }
            None => false,
        }
    }

    /// Forget a task. Returns `false` if it was unknown.
    ///
    /// This does not touch dependencies; call
    /// [`TaskDeletionHook::on_task_deleted`] for that.
    pub async fn remove(&self, id: &TaskId) -> bool {
        self.tasks.write().await.remove(id).is_some()
    }

    /// Number of known tasks.
    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    /// Whether no tasks are known.
    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }
}

#[async_trait]
impl TaskLookup for InMemoryTaskDirectory {
    async fn task_summary(&self, id: &TaskId) -> Result<Option<TaskSummary>> {
        Ok(self.tasks.read().await.get(id).map(|record| TaskSummary {
            id: record.id.clone(),
            title: record.title.clone(),
            status: record.status,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn lookups_follow_mutations() {
        let tasks = InMemoryTaskDirectory::new();
        let id = TaskId::new("t1");
        assert!(!tasks.task_exists(&id).await.unwrap());

        tasks.insert("t1", "Write parser", TaskStatus::NotStarted).await;
        assert!(tasks.task_exists(&id).await.unwrap());
        assert_eq!(tasks.task_status(&id).await.unwrap(), Some(TaskStatus::NotStarted));

        assert!(tasks.set_status(&id, TaskStatus::Completed).await);
        assert_eq!(
            tasks.task_summary(&id).await.unwrap().map(|s| s.status),
            Some(TaskStatus::Completed)
        );

        assert!(tasks.remove(&id).await);
        assert!(!tasks.set_status(&id, TaskStatus::Paused).await);
        assert!(tasks.is_empty().await);
    }

    #[tokio::test]
    async fn loads_export_skipping_bad_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.jsonl");
        tokio::fs::write(
            &path,
            concat!(
                r#"{"id":"t1","title":"Design schema","status":"completed"}"#,
                "\n",
                r#"{"id":"t2","title":"Broken","status":"someday"}"#,
                "\n",
                r#"{"id":"t3","title":"Ship it","status":"in_progress"}"#,
                "\n",
            ),
        )
        .await
        .unwrap();

        let (tasks, warnings) = InMemoryTaskDirectory::load_from_jsonl(&path).await.unwrap();
        assert_eq!(tasks.len().await, 2);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].line_number(), 2);
        assert_eq!(
            tasks.task_status(&TaskId::new("t3")).await.unwrap(),
            Some(TaskStatus::InProgress)
        );
    }

    #[tokio::test]
    async fn missing_export_is_empty() {
        let dir = TempDir::new().unwrap();
        let (tasks, warnings) =
            InMemoryTaskDirectory::load_from_jsonl(&dir.path().join("tasks.jsonl"))
                .await
                .unwrap();
        assert!(tasks.is_empty().await);
        assert!(warnings.is_empty());
    }
}
