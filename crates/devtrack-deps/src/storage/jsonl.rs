//! JSONL-backed dependency store.
//!
//! Wraps an [`InMemoryStore`] and rewrites the full edge set to a JSONL file
//! on every mutation, using a temp file plus rename so the file on disk is
//! always a complete snapshot. A mutation builds the next edge set from a
//! snapshot, writes it, and only then swaps it into memory. Readers never
//! see an edge that is not on disk, and a failed write changes nothing.

use super::{DependencyStore, EdgeGuard, InMemoryStore, mint_edge};
use crate::domain::{DependencyEdge, EdgeId, NewDependency, TaskId};
use crate::error::{Error, Result, StorageError};
use crate::graph::PrecedenceGraph;
use async_trait::async_trait;
use devtrack_jsonl::{Warning as JsonlWarning, read_jsonl_resilient, write_jsonl_atomic};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Non-fatal problems found while loading a JSONL edge file.
///
/// The offending record is skipped; everything else loads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadWarning {
    /// Line could not be parsed as an edge
    MalformedJson {
        /// 1-based line number in the file
        line_number: usize,
        /// Parser message
        error: String,
    },

    /// Edge parsed but breaks a structural rule (self-loop, blank id)
    InvalidEdge {
        /// Id of the skipped edge
        edge_id: EdgeId,
        /// Which rule it broke
        reason: String,
    },

    /// Same id or same relation as an earlier line
    DuplicateEdge {
        /// Id of the skipped edge
        edge_id: EdgeId,
    },

    /// Edge would close a precedence cycle with earlier lines
    CircularDependency {
        /// Id of the skipped edge
        edge_id: EdgeId,
        /// The cycle it would have closed
        path: Vec<TaskId>,
    },
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedJson { line_number, error } => {
                write!(f, "line {line_number}: malformed edge: {error}")
            }
            Self::InvalidEdge { edge_id, reason } => write!(f, "{edge_id}: {reason}"),
            Self::DuplicateEdge { edge_id } => write!(f, "{edge_id}: duplicate edge"),
            Self::CircularDependency { edge_id, path } => {
                let path: Vec<&str> = path.iter().map(TaskId::as_str).collect();
                write!(f, "{edge_id}: would close cycle {}", path.join(" -> "))
            }
        }
    }
}

/// Read edges from a JSONL file, skipping anything that would violate a
/// store invariant.
///
/// Records are accepted in file order; a later record that duplicates or
/// closes a cycle with earlier ones is the one dropped. A missing file
/// loads as empty.
///
/// # Errors
///
/// Returns an error only if the file exists but cannot be read.
pub async fn load_from_jsonl(path: &Path) -> Result<(Vec<DependencyEdge>, Vec<LoadWarning>)> {
    if !tokio::fs::try_exists(path).await? {
        return Ok((Vec::new(), Vec::new()));
    }

    let (parsed, jsonl_warnings) = read_jsonl_resilient::<DependencyEdge, _>(path)
        .await
        .map_err(StorageError::from)?;

    let mut warnings: Vec<LoadWarning> = jsonl_warnings
        .into_iter()
        .map(|w| match w {
            JsonlWarning::MalformedJson { line_number, error } => {
                LoadWarning::MalformedJson { line_number, error }
            }
            JsonlWarning::SkippedLine {
                line_number,
                reason,
            } => LoadWarning::MalformedJson {
                line_number,
                error: reason,
            },
        })
        .collect();

    let mut ids = HashSet::new();
    let mut relations = HashSet::new();
    let mut graph = PrecedenceGraph::default();
    let mut edges = Vec::with_capacity(parsed.len());

    for edge in parsed {
        let shape = NewDependency::new(
            edge.task_id.clone(),
            edge.depends_on_task_id.clone(),
            edge.dep_type,
        );
        if let Err(reason) = shape.validate() {
            warnings.push(LoadWarning::InvalidEdge {
                edge_id: edge.id,
                reason,
            });
            continue;
        }

        let key = edge.relation_key();
        if ids.contains(&edge.id) || relations.contains(&key) {
            warnings.push(LoadWarning::DuplicateEdge { edge_id: edge.id });
            continue;
        }

        if let Some(precedence) = edge.precedence() {
            if let Some(path) = graph.cycle_through(&precedence) {
                warnings.push(LoadWarning::CircularDependency {
                    edge_id: edge.id,
                    path,
                });
                continue;
            }
            graph.add(&precedence, edge.id.clone());
        }

        ids.insert(edge.id.clone());
        relations.insert(key);
        edges.push(edge);
    }

    Ok((edges, warnings))
}

/// Write `edges` to `path` atomically, one edge per line.
///
/// # Errors
///
/// Returns an error if the file cannot be written; the previous file is
/// left untouched in that case.
pub async fn save_to_jsonl(path: &Path, edges: &[DependencyEdge]) -> Result<()> {
    write_jsonl_atomic(path, edges)
        .await
        .map_err(StorageError::from)?;
    Ok(())
}

/// Dependency store persisted to a JSONL file.
#[derive(Debug)]
pub struct JsonlBackedStore {
    inner: InMemoryStore,
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlBackedStore {
    /// Open (or start) the edge file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix is invalid or the file exists but
    /// cannot be read.
    pub async fn open(
        path: impl Into<PathBuf>,
        prefix: &str,
    ) -> Result<(Self, Vec<LoadWarning>)> {
        let path = path.into();
        let (edges, warnings) = load_from_jsonl(&path).await?;
        info!(path = %path.display(), edges = edges.len(), "Loaded dependency file");

        let store = Self {
            inner: InMemoryStore::with_edges(prefix, edges)?,
            path,
            write_lock: Mutex::new(()),
        };
        Ok((store, warnings))
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `next` to the file, then make it the visible state.
    ///
    /// Caller holds `write_lock`.
    async fn publish(&self, next: Vec<DependencyEdge>) -> Result<()> {
        if let Err(e) = save_to_jsonl(&self.path, &next).await {
            warn!(path = %self.path.display(), error = %e, "Write failed, keeping last saved state");
            return Err(e);
        }
        self.inner.replace_all(next).await;
        Ok(())
    }
}

#[async_trait]
impl DependencyStore for JsonlBackedStore {
    async fn insert_guarded(
        &self,
        new: NewDependency,
        guard: &dyn EdgeGuard,
    ) -> Result<DependencyEdge> {
        new.validate().map_err(Error::Validation)?;

        let _write = self.write_lock.lock().await;
        let mut next = self.inner.all_edges().await?;
        guard.check(&next, &new)?;

        let exact = next.iter().any(|e| {
            e.task_id == new.task_id
                && e.depends_on_task_id == new.depends_on_task_id
                && e.dep_type == new.dep_type
        });
        if exact {
            return Err(Error::DuplicateEdge {
                task_id: new.task_id,
                depends_on_task_id: new.depends_on_task_id,
                dep_type: new.dep_type,
            });
        }

        let edge = mint_edge(self.inner.ids(), &next, new)?;
        next.push(edge.clone());
        self.publish(next).await?;

        info!(
            id = %edge.id,
            task = %edge.task_id,
            depends_on = %edge.depends_on_task_id,
            dep_type = %edge.dep_type,
            "Stored dependency"
        );
        Ok(edge)
    }

    async fn remove(&self, id: &EdgeId) -> Result<DependencyEdge> {
        let _write = self.write_lock.lock().await;
        let mut next = self.inner.all_edges().await?;
        let position = next
            .iter()
            .position(|e| &e.id == id)
            .ok_or_else(|| Error::DependencyNotFound(id.clone()))?;
        let edge = next.remove(position);
        self.publish(next).await?;

        info!(id = %id, "Removed dependency");
        Ok(edge)
    }

    async fn get(&self, id: &EdgeId) -> Result<Option<DependencyEdge>> {
        self.inner.get(id).await
    }

    async fn find_by_subject(&self, task: &TaskId) -> Result<Vec<DependencyEdge>> {
        self.inner.find_by_subject(task).await
    }

    async fn find_by_object(&self, task: &TaskId) -> Result<Vec<DependencyEdge>> {
        self.inner.find_by_object(task).await
    }

    async fn remove_all_for_task(&self, task: &TaskId) -> Result<usize> {
        let _write = self.write_lock.lock().await;
        let edges = self.inner.all_edges().await?;
        let before = edges.len();
        let next: Vec<DependencyEdge> = edges.into_iter().filter(|e| !e.mentions(task)).collect();
        let removed = before - next.len();
        if removed > 0 {
            self.publish(next).await?;
        }
        debug!(task = %task, removed, "Purged dependencies for task");
        Ok(removed)
    }

    async fn all_edges(&self) -> Result<Vec<DependencyEdge>> {
        self.inner.all_edges().await
    }

    async fn save(&self) -> Result<()> {
        let _write = self.write_lock.lock().await;
        let edges = self.inner.all_edges().await?;
        save_to_jsonl(&self.path, &edges).await
    }

    async fn reload(&self) -> Result<()> {
        let _write = self.write_lock.lock().await;
        let (edges, warnings) = load_from_jsonl(&self.path).await?;
        for warning in &warnings {
            warn!(%warning, "JSONL load warning");
        }
        self.inner.replace_all(edges).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DependencyType;
    use crate::graph::GraphValidator;
    use chrono::Utc;
    use tempfile::TempDir;

    fn edge(id: &str, task: &str, depends_on: &str, dep_type: DependencyType) -> DependencyEdge {
        DependencyEdge::from_new(
            EdgeId::new(id),
            NewDependency::new(task, depends_on, dep_type),
            Utc::now(),
        )
    }

    async fn write_lines(path: &Path, lines: &[String]) {
        tokio::fs::write(path, lines.join("\n")).await.unwrap();
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let (edges, warnings) = load_from_jsonl(&dir.path().join("deps.jsonl")).await.unwrap();
        assert!(edges.is_empty());
        assert!(warnings.is_empty());
    }

    #[tokio::test]
    async fn load_skips_invariant_violations() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("deps.jsonl");
        let lines = vec![
            serde_json::to_string(&edge("dep-1", "a", "b", DependencyType::Blocks)).unwrap(),
            "{not json".to_string(),
            serde_json::to_string(&edge("dep-2", "c", "c", DependencyType::Blocks)).unwrap(),
            serde_json::to_string(&edge("dep-3", "b", "a", DependencyType::BlockedBy)).unwrap(),
            serde_json::to_string(&edge("dep-4", "b", "a", DependencyType::Blocks)).unwrap(),
            serde_json::to_string(&edge("dep-5", "a", "c", DependencyType::RelatesTo)).unwrap(),
        ];
        write_lines(&path, &lines).await;

        let (edges, warnings) = load_from_jsonl(&path).await.unwrap();

        let kept: Vec<&str> = edges.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(kept, vec!["dep-1", "dep-5"]);
        assert_eq!(warnings.len(), 4);
        assert!(matches!(warnings[0], LoadWarning::MalformedJson { line_number: 2, .. }));
        assert!(matches!(warnings[1], LoadWarning::InvalidEdge { .. }));
        assert!(matches!(warnings[2], LoadWarning::DuplicateEdge { .. }));
        assert!(matches!(warnings[3], LoadWarning::CircularDependency { .. }));
    }

    #[tokio::test]
    async fn mutations_are_written_through() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("deps.jsonl");

        let (store, _) = JsonlBackedStore::open(&path, "dep").await.unwrap();
        let first = store
            .insert_guarded(NewDependency::new("a", "b", DependencyType::Blocks), &GraphValidator)
            .await
            .unwrap();
        let second = store
            .insert(NewDependency::new("a", "c", DependencyType::RelatesTo))
            .await
            .unwrap();
        store.remove(&second.id).await.unwrap();

        let (reopened, warnings) = JsonlBackedStore::open(&path, "dep").await.unwrap();
        assert!(warnings.is_empty());
        assert_eq!(reopened.all_edges().await.unwrap(), vec![first]);
    }

    #[tokio::test]
    async fn failed_write_rolls_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("deps.jsonl");

        let (store, _) = JsonlBackedStore::open(&path, "dep").await.unwrap();
        let err = store
            .insert(NewDependency::new("a", "b", DependencyType::Blocks))
            .await
            .unwrap_err();

        assert!(err.is_infrastructure());
        assert!(store.all_edges().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_writes_leave_memory_at_last_saved_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("deps.jsonl");
        let (store, _) = JsonlBackedStore::open(&path, "dep").await.unwrap();
        let saved = store
            .insert(NewDependency::new("a", "b", DependencyType::Blocks))
            .await
            .unwrap();

        // A directory can be neither replaced by a file nor read back.
        tokio::fs::remove_file(&path).await.unwrap();
        tokio::fs::create_dir(&path).await.unwrap();

        let insert = store
            .insert(NewDependency::new("b", "c", DependencyType::Blocks))
            .await;
        assert!(insert.unwrap_err().is_infrastructure());
        assert!(store.remove(&saved.id).await.unwrap_err().is_infrastructure());
        assert!(store.remove_all_for_task(&TaskId::new("a")).await.is_err());

        assert_eq!(store.all_edges().await.unwrap(), vec![saved.clone()]);
        assert!(store.find_by_subject(&TaskId::new("b")).await.unwrap().is_empty());
        assert_eq!(store.get(&saved.id).await.unwrap(), Some(saved));
    }

    #[tokio::test]
    async fn reload_picks_up_external_changes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("deps.jsonl");
        let (store, _) = JsonlBackedStore::open(&path, "dep").await.unwrap();

        let external = edge("dep-ext", "x", "y", DependencyType::Blocks);
        save_to_jsonl(&path, std::slice::from_ref(&external)).await.unwrap();

        store.reload().await.unwrap();
        assert_eq!(store.all_edges().await.unwrap(), vec![external]);
        assert_eq!(store.path(), path.as_path());
    }
}
