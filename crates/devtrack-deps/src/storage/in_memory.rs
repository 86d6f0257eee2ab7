//! In-memory dependency store.
//!
//! Edges live in a `HashMap` keyed by id, with per-task indexes for both
//! directions. All state sits behind one `tokio::sync::Mutex`, and the
//! guard passed to [`DependencyStore::insert_guarded`] runs while that lock
//! is held.

use super::{DependencyStore, EdgeGuard, id_seed, next_timestamp};
use crate::domain::{DependencyEdge, EdgeId, NewDependency, TaskId};
use crate::error::{Error, Result, StorageError};
use crate::id_generation::IdGenerator;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug, Default)]
struct Inner {
    edges: HashMap<EdgeId, DependencyEdge>,
    by_subject: HashMap<TaskId, Vec<EdgeId>>,
    by_object: HashMap<TaskId, Vec<EdgeId>>,
    last_created: Option<DateTime<Utc>>,
}

impl Inner {
    fn add(&mut self, edge: DependencyEdge) {
        self.by_subject
            .entry(edge.task_id.clone())
            .or_default()
            .push(edge.id.clone());
        self.by_object
            .entry(edge.depends_on_task_id.clone())
            .or_default()
            .push(edge.id.clone());
        if self.last_created.is_none_or(|last| edge.created_at > last) {
            self.last_created = Some(edge.created_at);
        }
        self.edges.insert(edge.id.clone(), edge);
    }

    fn take(&mut self, id: &EdgeId) -> Option<DependencyEdge> {
        let edge = self.edges.remove(id)?;
        unindex(&mut self.by_subject, &edge.task_id, id);
        unindex(&mut self.by_object, &edge.depends_on_task_id, id);
        Some(edge)
    }

    fn collect(&self, ids: Option<&Vec<EdgeId>>) -> Vec<DependencyEdge> {
        let mut edges: Vec<DependencyEdge> = ids
            .into_iter()
            .flatten()
            .filter_map(|id| self.edges.get(id).cloned())
            .collect();
        edges.sort_by(DependencyEdge::listing_order);
        edges
    }

    fn snapshot(&self) -> Vec<DependencyEdge> {
        let mut edges: Vec<DependencyEdge> = self.edges.values().cloned().collect();
        edges.sort_by(DependencyEdge::listing_order);
        edges
    }

    fn has_exact(&self, new: &NewDependency) -> bool {
        self.by_subject.get(&new.task_id).is_some_and(|ids| {
            ids.iter().filter_map(|id| self.edges.get(id)).any(|edge| {
                edge.depends_on_task_id == new.depends_on_task_id && edge.dep_type == new.dep_type
            })
        })
    }
}

fn unindex(index: &mut HashMap<TaskId, Vec<EdgeId>>, task: &TaskId, id: &EdgeId) {
    if let Some(ids) = index.get_mut(task) {
        ids.retain(|existing| existing != id);
        if ids.is_empty() {
            index.remove(task);
        }
    }
}

/// Process-local dependency store.
///
/// Cloning shares the underlying state.
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    inner: Arc<Mutex<Inner>>,
    ids: IdGenerator,
}

impl InMemoryStore {
    /// Create an empty store issuing ids with `prefix`.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix is not a valid id prefix.
    pub fn new(prefix: &str) -> Result<Self> {
        Ok(Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            ids: IdGenerator::new(prefix).map_err(StorageError::from)?,
        })
    }

    /// Create a store pre-populated with already validated edges.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix is not a valid id prefix.
    pub fn with_edges(prefix: &str, edges: Vec<DependencyEdge>) -> Result<Self> {
        let mut inner = Inner::default();
        for edge in edges {
            inner.add(edge);
        }
        Ok(Self {
            inner: Arc::new(Mutex::new(inner)),
            ids: IdGenerator::new(prefix).map_err(StorageError::from)?,
        })
    }

    /// Swap the whole edge set, used when reloading from durable storage.
    pub(crate) async fn replace_all(&self, edges: Vec<DependencyEdge>) {
        let mut fresh = Inner::default();
        for edge in edges {
            fresh.add(edge);
        }
        *self.inner.lock().await = fresh;
    }

    pub(crate) fn ids(&self) -> &IdGenerator {
        &self.ids
    }

    /// Number of stored edges.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.edges.len()
    }

    /// Whether the store holds no edges.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.edges.is_empty()
    }
}

#[async_trait]
impl DependencyStore for InMemoryStore {
    async fn insert_guarded(
        &self,
        new: NewDependency,
        guard: &dyn EdgeGuard,
    ) -> Result<DependencyEdge> {
        new.validate().map_err(Error::Validation)?;

        let mut inner = self.inner.lock().await;
        guard.check(&inner.snapshot(), &new)?;

        if inner.has_exact(&new) {
            return Err(Error::DuplicateEdge {
                task_id: new.task_id,
                depends_on_task_id: new.depends_on_task_id,
                dep_type: new.dep_type,
            });
        }

        let id = self
            .ids
            .generate(&id_seed(&new), inner.edges.len(), |candidate| {
                inner.edges.contains_key(&EdgeId::new(candidate))
            })
            .map_err(StorageError::from)?;
        let created_at = next_timestamp(inner.last_created);
        let edge = DependencyEdge::from_new(EdgeId::new(id), new, created_at);

        inner.add(edge.clone());
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
        let mut inner = self.inner.lock().await;
        let edge = inner
            .take(id)
            .ok_or_else(|| Error::DependencyNotFound(id.clone()))?;
        info!(id = %id, "Removed dependency");
        Ok(edge)
    }

    async fn get(&self, id: &EdgeId) -> Result<Option<DependencyEdge>> {
        Ok(self.inner.lock().await.edges.get(id).cloned())
    }

    async fn find_by_subject(&self, task: &TaskId) -> Result<Vec<DependencyEdge>> {
        let inner = self.inner.lock().await;
        Ok(inner.collect(inner.by_subject.get(task)))
    }

    async fn find_by_object(&self, task: &TaskId) -> Result<Vec<DependencyEdge>> {
        let inner = self.inner.lock().await;
        Ok(inner.collect(inner.by_object.get(task)))
    }

    async fn remove_all_for_task(&self, task: &TaskId) -> Result<usize> {
        let mut inner = self.inner.lock().await;
        let mut doomed: Vec<EdgeId> = inner.by_subject.get(task).cloned().unwrap_or_default();
        doomed.extend(inner.by_object.get(task).cloned().unwrap_or_default());

        let removed = doomed
            .iter()
            .filter(|id| inner.take(id).is_some())
            .count();
        debug!(task = %task, removed, "Purged dependencies for task");
        Ok(removed)
    }

    async fn all_edges(&self) -> Result<Vec<DependencyEdge>> {
        Ok(self.inner.lock().await.snapshot())
    }

    async fn save(&self) -> Result<()> {
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DependencyType;
    use crate::graph::GraphValidator;

    fn store() -> InMemoryStore {
        InMemoryStore::new("dep").unwrap()
    }

    #[tokio::test]
    async fn insert_indexes_both_directions() {
        let store = store();
        let edge = store
            .insert(NewDependency::new("t1", "t2", DependencyType::Blocks))
            .await
            .unwrap();

        assert_eq!(store.find_by_subject(&TaskId::new("t1")).await.unwrap(), vec![edge.clone()]);
        assert_eq!(store.find_by_object(&TaskId::new("t2")).await.unwrap(), vec![edge.clone()]);
        assert!(store.find_by_subject(&TaskId::new("t2")).await.unwrap().is_empty());
        assert_eq!(store.get(&edge.id).await.unwrap(), Some(edge));
    }

    #[tokio::test]
    async fn exact_duplicate_rejected_without_guard() {
        let store = store();
        let new = NewDependency::new("t1", "t2", DependencyType::RelatesTo);
        store.insert(new.clone()).await.unwrap();

        let err = store.insert(new).await.unwrap_err();
        assert!(matches!(err, Error::DuplicateEdge { .. }));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn self_loop_rejected_by_store() {
        let err = store()
            .insert(NewDependency::new("t1", "t1", DependencyType::Blocks))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn guard_failure_leaves_store_untouched() {
        let store = store();
        store
            .insert(NewDependency::new("a", "b", DependencyType::Blocks))
            .await
            .unwrap();

        let err = store
            .insert_guarded(NewDependency::new("b", "a", DependencyType::Blocks), &GraphValidator)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CircularDependency { .. }));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn listing_follows_insertion_order() {
        let store = store();
        let mut created = Vec::new();
        for target in ["b", "c", "d", "e"] {
            created.push(
                store
                    .insert(NewDependency::new("a", target, DependencyType::RelatesTo))
                    .await
                    .unwrap(),
            );
        }

        assert_eq!(store.find_by_subject(&TaskId::new("a")).await.unwrap(), created);
        assert_eq!(store.all_edges().await.unwrap(), created);
    }

    #[tokio::test]
    async fn remove_and_purge() {
        let store = store();
        let ab = store
            .insert(NewDependency::new("a", "b", DependencyType::Blocks))
            .await
            .unwrap();
        store
            .insert(NewDependency::new("c", "a", DependencyType::Blocks))
            .await
            .unwrap();
        store
            .insert(NewDependency::new("c", "d", DependencyType::RelatesTo))
            .await
            .unwrap();

        assert_eq!(store.remove(&ab.id).await.unwrap(), ab);
        assert!(matches!(
            store.remove(&ab.id).await,
            Err(Error::DependencyNotFound(_))
        ));

        assert_eq!(store.remove_all_for_task(&TaskId::new("a")).await.unwrap(), 1);
        assert_eq!(store.remove_all_for_task(&TaskId::new("a")).await.unwrap(), 0);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn replace_all_swaps_state() {
        let store = store();
        let edge = store
            .insert(NewDependency::new("a", "b", DependencyType::Blocks))
            .await
            .unwrap();

        store.replace_all(Vec::new()).await;
        assert!(store.is_empty().await);

        store.replace_all(vec![edge.clone()]).await;
        assert_eq!(store.get(&edge.id).await.unwrap(), Some(edge));
    }
}
