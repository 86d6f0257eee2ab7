//! Shared fixtures for integration tests.

#![allow(dead_code)]

use devtrack_deps::domain::TaskStatus;
use devtrack_deps::manager::DependencyManager;
use devtrack_deps::storage::{StorageBackend, create_storage};
use devtrack_deps::tasks::InMemoryTaskDirectory;
use std::sync::Arc;
use tempfile::TempDir;

/// Which store a test runs against.
#[derive(Debug, Clone, Copy)]
pub enum Backend {
    Memory,
    Jsonl,
    Sqlite,
}

impl Backend {
    pub fn storage(self, dir: &TempDir) -> StorageBackend {
        match self {
            Self::Memory => StorageBackend::InMemory,
            Self::Jsonl => StorageBackend::Jsonl(dir.path().join("deps.jsonl")),
            Self::Sqlite => StorageBackend::Sqlite(dir.path().join("deps.db")),
        }
    }
}

/// A manager over a fresh store, with every id in `tasks` registered as
/// not started.
pub struct Fixture {
    pub manager: DependencyManager,
    pub tasks: Arc<InMemoryTaskDirectory>,
    pub dir: TempDir,
}

pub async fn fixture(backend: Backend, task_ids: &[&str]) -> Fixture {
    let dir = TempDir::new().unwrap();
    let tasks = Arc::new(InMemoryTaskDirectory::new());
    for id in task_ids {
        tasks
            .insert(*id, format!("Task {id}"), TaskStatus::NotStarted)
            .await;
    }
    let store = create_storage(backend.storage(&dir), "dep").await.unwrap();
    Fixture {
        manager: DependencyManager::new(store, tasks.clone()),
        tasks,
        dir,
    }
}
