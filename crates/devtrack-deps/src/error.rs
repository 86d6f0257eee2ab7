//! Error types for dependency graph operations.
//!
//! [`Error`] is the taxonomy callers match on. Infrastructure failures are
//! wrapped in [`StorageError`] so they stay distinguishable from rejected
//! requests such as cycles or duplicates.

use crate::domain::{DependencyType, EdgeId, TaskId};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The error type for dependency graph operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The request is malformed (self-loop, blank ids, unknown type).
    #[error("Invalid dependency: {0}")]
    Validation(String),

    /// An equivalent edge already exists.
    #[error("Dependency already exists: {task_id} {dep_type} {depends_on_task_id}")]
    DuplicateEdge {
        /// Subject of the rejected edge
        task_id: TaskId,
        /// Object of the rejected edge
        depends_on_task_id: TaskId,
        /// Label of the rejected edge
        dep_type: DependencyType,
    },

    /// Inserting the edge would close a precedence cycle.
    #[error("Circular dependency: {}", format_path(path))]
    CircularDependency {
        /// Closed cycle, first and last element equal
        path: Vec<TaskId>,
    },

    /// No edge with this id exists.
    #[error("Dependency not found: {0}")]
    DependencyNotFound(EdgeId),

    /// The task collaborator does not know this task.
    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    /// Backend failure.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// IO error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl Error {
    /// Whether this is one of the not-found variants.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::DependencyNotFound(_) | Self::TaskNotFound(_))
    }

    /// Whether this is an infrastructure failure rather than a rejected request.
    #[must_use]
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Io(_) | Self::Config(_))
    }
}

fn format_path(path: &[TaskId]) -> String {
    path.iter()
        .map(TaskId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Infrastructure failures from a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// SQLite failure.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// JSONL read or write failure.
    #[error("jsonl error: {0}")]
    Jsonl(#[from] devtrack_jsonl::Error),

    /// Edge could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Persisted data does not have the expected shape.
    #[error("invalid data in {}: {reason}", path.display())]
    InvalidFormat {
        /// Offending file
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },

    /// A lock guarding the backend was poisoned by a panicking writer.
    #[error("storage lock poisoned")]
    LockPoisoned,

    /// No unused edge id could be produced.
    #[error("id generation failed: {0}")]
    IdGeneration(#[from] crate::id_generation::IdGenerationError),
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(StorageError::Database(err))
    }
}

/// Errors loading or writing `.devtrack/config.yaml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No `.devtrack/` directory in this or any parent directory.
    #[error("not a devtrack workspace (run 'devtrack-deps init'): {}", .0.display())]
    NotInitialized(PathBuf),

    /// Workspace already has a `.devtrack/` directory.
    #[error("already initialized: {}", .0.display())]
    AlreadyInitialized(PathBuf),

    /// Config file could not be parsed or serialized.
    #[error("invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Config parsed but holds an unusable value.
    #[error("invalid {field}: {reason}")]
    InvalidValue {
        /// Offending key
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

/// A specialized Result type for dependency graph operations.
pub type Result<T> = std::result::Result<T, Error>;
