//! Read-only queries over the committed edge set.
//!
//! The engine borrows a store and a task collaborator and never writes, so
//! any number of queries may run alongside each other and alongside a
//! writer.

use crate::domain::{DependencyEdge, PrerequisiteNode, Role, TaskId, TaskState};
use crate::error::{Error, Result};
use crate::graph::PrecedenceGraph;
use crate::storage::DependencyStore;
use crate::tasks::TaskLookup;
use tracing::{debug, warn};

/// Blocking / blocked / related lookups for a single task.
pub struct DependencyQueryEngine<'a> {
    store: &'a dyn DependencyStore,
    tasks: &'a dyn TaskLookup,
}

impl<'a> DependencyQueryEngine<'a> {
    /// Create an engine over `store`, resolving statuses through `tasks`.
    pub fn new(store: &'a dyn DependencyStore, tasks: &'a dyn TaskLookup) -> Self {
        Self { store, tasks }
    }

    async fn ensure_task(&self, task: &TaskId) -> Result<()> {
        if self.tasks.task_exists(task).await? {
            Ok(())
        } else {
            Err(Error::TaskNotFound(task.clone()))
        }
    }

    /// Every edge mentioning `task`, oldest first.
    pub(crate) async fn edges_for(&self, task: &TaskId) -> Result<Vec<DependencyEdge>> {
        let mut edges = self.store.find_by_subject(task).await?;
        edges.extend(self.store.find_by_object(task).await?);
        edges.sort_by(DependencyEdge::listing_order);
        Ok(edges)
    }

    /// Counterparts of `task` playing `role`, with their current status.
    ///
    /// Counterparts the task collaborator no longer knows are skipped.
    async fn neighbours(&self, task: &TaskId, role: Role) -> Result<Vec<TaskState>> {
        self.ensure_task(task).await?;

        let mut result = Vec::new();
        for edge in self.edges_for(task).await? {
            if edge.counterpart_role(task) != Some(role) {
                continue;
            }
            let Some(other) = edge.counterpart(task) else {
                continue;
            };
            match self.tasks.task_status(other).await? {
                Some(status) => result.push(TaskState {
                    id: other.clone(),
                    status,
                }),
                None => warn!(
                    task = %task,
                    missing = %other,
                    edge = %edge.id,
                    "Dependency references unknown task, skipping"
                ),
            }
        }

        debug!(task = %task, %role, count = result.len(), "Resolved neighbours");
        Ok(result)
    }

    /// Immediate prerequisites of `task` with their status.
    ///
    /// # Errors
    ///
    /// Returns `TaskNotFound` if `task` is unknown.
    pub async fn blocking_tasks(&self, task: &TaskId) -> Result<Vec<TaskState>> {
        self.neighbours(task, Role::Prerequisite).await
    }

    /// Tasks for which `task` is an immediate prerequisite.
    ///
    /// # Errors
    ///
    /// Returns `TaskNotFound` if `task` is unknown.
    pub async fn blocked_tasks(&self, task: &TaskId) -> Result<Vec<TaskState>> {
        self.neighbours(task, Role::Dependent).await
    }

    /// Whether any immediate prerequisite of `task` is not yet completed.
    ///
    /// # Errors
    ///
    /// Returns `TaskNotFound` if `task` is unknown.
    pub async fn has_blocking_dependencies(&self, task: &TaskId) -> Result<bool> {
        Ok(self
            .blocking_tasks(task)
            .await?
            .iter()
            .any(|prerequisite| !prerequisite.status.is_completed()))
    }

    /// Tasks linked to `task` by `RelatesTo`, in either direction.
    ///
    /// # Errors
    ///
    /// Returns `TaskNotFound` if `task` is unknown.
    pub async fn related_tasks(&self, task: &TaskId) -> Result<Vec<TaskState>> {
        self.neighbours(task, Role::Related).await
    }

    /// Transitive prerequisites of `task`, breadth first, with depth.
    ///
    /// # Errors
    ///
    /// Returns `TaskNotFound` if `task` is unknown.
    pub async fn dependency_tree(
        &self,
        task: &TaskId,
        max_depth: Option<usize>,
    ) -> Result<Vec<PrerequisiteNode>> {
        self.ensure_task(task).await?;
        let edges = self.store.all_edges().await?;
        Ok(PrecedenceGraph::from_edges(&edges).prerequisites(task, max_depth))
    }
}
