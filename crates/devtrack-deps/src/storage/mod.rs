//! Storage abstraction for dependency edges.
//!
//! A [`DependencyStore`] persists edge rows and knows nothing about graph
//! semantics. Cycle and duplicate checks are supplied by the caller as an
//! [`EdgeGuard`], which the store runs inside its own atomic write section
//! so the check and the insert cannot be interleaved with another writer.
//!
//! Backends:
//!
//! - **In-memory**: `Arc<Mutex<_>>` with subject/object indexes
//! - **JSONL**: the in-memory store, written through to a JSONL file
//! - **SQLite**: a single-file relational store via `rusqlite`
//!
//! # Example
//!
//! ```no_run
//! use devtrack_deps::domain::{DependencyType, NewDependency};
//! use devtrack_deps::storage::{create_storage, StorageBackend};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let store = create_storage(StorageBackend::InMemory, "dep").await?;
//!     let edge = store
//!         .insert(NewDependency::new("t1", "t2", DependencyType::Blocks))
//!         .await?;
//!     println!("Created edge: {}", edge.id);
//!     Ok(())
//! }
//! ```

use crate::domain::{DependencyEdge, EdgeId, NewDependency, TaskId};
use crate::error::{Result, StorageError};
use crate::id_generation::IdGenerator;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::path::PathBuf;

pub mod in_memory;
pub mod jsonl;
pub mod sqlite;

pub use in_memory::InMemoryStore;
pub use jsonl::{JsonlBackedStore, LoadWarning};
pub use sqlite::SqliteStore;

/// Check run against the full edge set before an insert is committed.
pub trait EdgeGuard: Send + Sync {
    /// Return `Ok(())` to allow `proposed` to be inserted.
    ///
    /// # Errors
    ///
    /// Any error aborts the insert and is returned to the caller unchanged.
    fn check(&self, existing: &[DependencyEdge], proposed: &NewDependency) -> Result<()>;
}

/// Guard that accepts everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoGuard;

impl EdgeGuard for NoGuard {
    fn check(&self, _existing: &[DependencyEdge], _proposed: &NewDependency) -> Result<()> {
        Ok(())
    }
}

/// Durable storage of dependency edges.
///
/// Implementations must be `Send + Sync`; every method takes `&self` and
/// synchronizes internally. Listing methods return edges ordered by
/// `created_at`, then id.
///
/// # Errors
///
/// Rejections surface as `DuplicateEdge` / `DependencyNotFound`; backend
/// failures as `Error::Storage`.
#[async_trait]
pub trait DependencyStore: Send + Sync {
    /// Persist a new edge, assigning its id and timestamp.
    ///
    /// Stores reject an exact `(task_id, depends_on_task_id, dep_type)`
    /// duplicate with `DuplicateEdge` on their own.
    async fn insert(&self, new: NewDependency) -> Result<DependencyEdge> {
        self.insert_guarded(new, &NoGuard).await
    }

    /// Run `guard` against the current edge set and insert `new` if it
    /// passes, all within one atomic section.
    async fn insert_guarded(
        &self,
        new: NewDependency,
        guard: &dyn EdgeGuard,
    ) -> Result<DependencyEdge>;

    /// Delete an edge, returning it.
    ///
    /// # Errors
    ///
    /// Returns `DependencyNotFound` if no edge has this id.
    async fn remove(&self, id: &EdgeId) -> Result<DependencyEdge>;

    /// Look up an edge by id.
    async fn get(&self, id: &EdgeId) -> Result<Option<DependencyEdge>>;

    /// Edges whose subject (`task_id`) is `task`.
    async fn find_by_subject(&self, task: &TaskId) -> Result<Vec<DependencyEdge>>;

    /// Edges whose object (`depends_on_task_id`) is `task`.
    async fn find_by_object(&self, task: &TaskId) -> Result<Vec<DependencyEdge>>;

    /// Delete every edge referencing `task` on either side.
    ///
    /// Returns the number of edges removed.
    async fn remove_all_for_task(&self, task: &TaskId) -> Result<usize>;

    /// Snapshot of every stored edge.
    async fn all_edges(&self) -> Result<Vec<DependencyEdge>>;

    /// Flush state to durable storage. No-op for backends that write through.
    async fn save(&self) -> Result<()>;

    /// Discard in-memory state and re-read durable storage.
    async fn reload(&self) -> Result<()>;
}

/// Storage backend selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// Ephemeral, process-local storage
    InMemory,

    /// JSONL file, one edge per line
    Jsonl(PathBuf),

    /// SQLite database file
    Sqlite(PathBuf),
}

/// Create a store for `backend`, using `prefix` for new edge ids.
///
/// JSONL load warnings are logged and the store is returned anyway.
///
/// # Errors
///
/// Returns an error if the prefix is invalid or the backing file cannot be
/// opened.
pub async fn create_storage(
    backend: StorageBackend,
    prefix: &str,
) -> Result<Box<dyn DependencyStore>> {
    match backend {
        StorageBackend::InMemory => Ok(Box::new(InMemoryStore::new(prefix)?)),
        StorageBackend::Jsonl(path) => {
            let (store, warnings) = JsonlBackedStore::open(path, prefix).await?;
            for warning in &warnings {
                tracing::warn!(%warning, "JSONL load warning");
            }
            Ok(Box::new(store))
        }
        StorageBackend::Sqlite(path) => Ok(Box::new(SqliteStore::open(&path, prefix)?)),
    }
}

/// Creation timestamp for a new edge, strictly after `last` so that
/// listing order matches insertion order.
pub(crate) fn next_timestamp(last: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    match last {
        Some(last) if now <= last => last + Duration::microseconds(1),
        _ => now,
    }
}

/// Seed used when hashing a new edge id.
pub(crate) fn id_seed(new: &NewDependency) -> String {
    format!("{}|{}|{}", new.task_id, new.depends_on_task_id, new.dep_type)
}

/// Build the edge that `new` becomes when added to `existing`: a fresh id
/// and a `created_at` later than every existing edge.
pub(crate) fn mint_edge(
    ids: &IdGenerator,
    existing: &[DependencyEdge],
    new: NewDependency,
) -> Result<DependencyEdge> {
    let taken: HashSet<&str> = existing.iter().map(|e| e.id.as_str()).collect();
    let id = ids
        .generate(&id_seed(&new), existing.len(), |candidate| {
            taken.contains(candidate)
        })
        .map_err(StorageError::from)?;
    let created_at = next_timestamp(existing.iter().map(|e| e.created_at).max());
    Ok(DependencyEdge::from_new(EdgeId::new(id), new, created_at))
}
