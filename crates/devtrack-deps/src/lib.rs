//! Task dependency graph for DevTrack.
//!
//! Stores `blocks` / `blocked-by` / `relates-to` edges between tasks owned
//! by a host application, keeps the precedence relation acyclic, and
//! answers blocking and readiness queries.
//!
//! The entry point is [`manager::DependencyManager`], built from a
//! [`storage::DependencyStore`] and a [`tasks::TaskLookup`]:
//!
//! ```no_run
//! use devtrack_deps::domain::{DependencyType, TaskId, TaskStatus};
//! use devtrack_deps::manager::DependencyManager;
//! use devtrack_deps::storage::{create_storage, StorageBackend};
//! use devtrack_deps::tasks::InMemoryTaskDirectory;
//! use std::sync::Arc;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let tasks = Arc::new(InMemoryTaskDirectory::new());
//!     tasks.insert("design", "Design schema", TaskStatus::Completed).await;
//!     tasks.insert("build", "Build importer", TaskStatus::NotStarted).await;
//!
//!     let store = create_storage(StorageBackend::InMemory, "dep").await?;
//!     let manager = DependencyManager::new(store, tasks);
//!     manager.create("build", "design", DependencyType::Blocks).await?;
//!
//!     assert!(!manager.has_blocking_dependencies(&TaskId::new("build")).await?);
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod domain;
pub mod error;
pub mod graph;
pub mod id_generation;
pub mod manager;
pub mod output;
pub mod query;
pub mod storage;
pub mod tasks;

pub use error::{Error, Result};
