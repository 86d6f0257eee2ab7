//! Public entry point for the dependency graph.
//!
//! [`DependencyManager`] owns an injected store and task collaborator.
//! Writes go through the store's guarded insert with a [`GraphValidator`],
//! so the duplicate and cycle checks see exactly the edge set the insert
//! lands in. Reads are delegated to [`DependencyQueryEngine`].

use crate::domain::{
    DependencyDetails, DependencyEdge, DependencyType, EdgeId, NewDependency, PrerequisiteNode,
    TaskId, TaskState,
};
use crate::error::{Error, Result};
use crate::graph::{GraphValidator, PrecedenceGraph};
use crate::query::DependencyQueryEngine;
use crate::storage::DependencyStore;
use crate::tasks::{TaskDeletionHook, TaskLookup};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of a whole-graph consistency check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    /// Number of stored edges
    pub edges: usize,

    /// Number of precedence relations among them
    pub precedence_edges: usize,

    /// Tasks taking part in a cycle, empty when the graph is acyclic
    pub cycle: Vec<TaskId>,

    /// Edges referencing tasks the collaborator does not know
    pub dangling: Vec<EdgeId>,
}

impl VerifyReport {
    /// Whether no problem was found.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.cycle.is_empty() && self.dangling.is_empty()
    }
}

/// Dependency graph facade.
pub struct DependencyManager {
    store: Box<dyn DependencyStore>,
    tasks: Arc<dyn TaskLookup>,
    validator: GraphValidator,
}

impl DependencyManager {
    /// Create a manager over an explicit store and task collaborator.
    pub fn new(store: Box<dyn DependencyStore>, tasks: Arc<dyn TaskLookup>) -> Self {
        Self {
            store,
            tasks,
            validator: GraphValidator::new(),
        }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &dyn DependencyStore {
        self.store.as_ref()
    }

    /// The task collaborator.
    #[must_use]
    pub fn tasks(&self) -> &dyn TaskLookup {
        self.tasks.as_ref()
    }

    fn queries(&self) -> DependencyQueryEngine<'_> {
        DependencyQueryEngine::new(self.store.as_ref(), self.tasks.as_ref())
    }

    async fn ensure_task(&self, task: &TaskId) -> Result<()> {
        if self.tasks.task_exists(task).await? {
            Ok(())
        } else {
            Err(Error::TaskNotFound(task.clone()))
        }
    }

    /// Create an edge `task_id --dep_type--> depends_on_task_id`.
    ///
    /// # Errors
    ///
    /// - `TaskNotFound` if either task is unknown
    /// - `Validation` for a self-loop
    /// - `DuplicateEdge` if an equivalent relation exists
    /// - `CircularDependency` if the edge would close a precedence cycle
    ///
    /// Task existence is checked before the insert and again after it. A
    /// task deleted in between gets `TaskNotFound` and the edge is removed.
    pub async fn create(
        &self,
        task_id: impl Into<TaskId>,
        depends_on_task_id: impl Into<TaskId>,
        dep_type: DependencyType,
    ) -> Result<DependencyEdge> {
        let new = NewDependency::new(task_id, depends_on_task_id, dep_type);
        new.validate().map_err(Error::Validation)?;
        self.ensure_task(&new.task_id).await?;
        self.ensure_task(&new.depends_on_task_id).await?;

        let edge = self.store.insert_guarded(new, &self.validator).await?;
        for task in [&edge.task_id, &edge.depends_on_task_id] {
            if !self.tasks.task_exists(task).await? {
                warn!(id = %edge.id, task = %task, "Task deleted during create, dropping edge");
                match self.store.remove(&edge.id).await {
                    Err(e) if !e.is_not_found() => return Err(e),
                    _ => return Err(Error::TaskNotFound(task.clone())),
                }
            }
        }
        info!(
            id = %edge.id,
            task = %edge.task_id,
            depends_on = %edge.depends_on_task_id,
            dep_type = %edge.dep_type,
            "Created dependency"
        );
        Ok(edge)
    }

    /// Delete an edge by id, returning it.
    ///
    /// # Errors
    ///
    /// Returns `DependencyNotFound` if no edge has this id.
    pub async fn delete(&self, id: &EdgeId) -> Result<DependencyEdge> {
        let edge = self.store.remove(id).await?;
        info!(id = %id, "Deleted dependency");
        Ok(edge)
    }

    /// Every edge mentioning `task`, on either side, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `TaskNotFound` if `task` is unknown.
    pub async fn list_for_task(&self, task: &TaskId) -> Result<Vec<DependencyEdge>> {
        self.ensure_task(task).await?;
        self.queries().edges_for(task).await
    }

    /// Like [`list_for_task`](Self::list_for_task), joined with the task on
    /// the other side of each edge and the role it plays.
    ///
    /// Edges whose counterpart is unknown to the collaborator are skipped.
    ///
    /// # Errors
    ///
    /// Returns `TaskNotFound` if `task` is unknown.
    pub async fn list_for_task_with_details(
        &self,
        task: &TaskId,
    ) -> Result<Vec<DependencyDetails>> {
        let mut details = Vec::new();
        for edge in self.list_for_task(task).await? {
            let (Some(other), Some(role)) = (edge.counterpart(task), edge.counterpart_role(task))
            else {
                continue;
            };
            match self.tasks.task_summary(other).await? {
                Some(counterpart) => details.push(DependencyDetails {
                    edge,
                    role,
                    counterpart,
                }),
                None => warn!(edge = %edge.id, missing = %other, "Counterpart task not found, skipping"),
            }
        }
        Ok(details)
    }

    /// Immediate prerequisites of `task`.
    ///
    /// # Errors
    ///
    /// Returns `TaskNotFound` if `task` is unknown.
    pub async fn blocking_tasks(&self, task: &TaskId) -> Result<Vec<TaskState>> {
        self.queries().blocking_tasks(task).await
    }

    /// Tasks waiting on `task`.
    ///
    /// # Errors
    ///
    /// Returns `TaskNotFound` if `task` is unknown.
    pub async fn blocked_tasks(&self, task: &TaskId) -> Result<Vec<TaskState>> {
        self.queries().blocked_tasks(task).await
    }

    /// Whether `task` has an unfinished prerequisite.
    ///
    /// # Errors
    ///
    /// Returns `TaskNotFound` if `task` is unknown.
    pub async fn has_blocking_dependencies(&self, task: &TaskId) -> Result<bool> {
        self.queries().has_blocking_dependencies(task).await
    }

    /// Tasks linked to `task` without ordering.
    ///
    /// # Errors
    ///
    /// Returns `TaskNotFound` if `task` is unknown.
    pub async fn related_tasks(&self, task: &TaskId) -> Result<Vec<TaskState>> {
        self.queries().related_tasks(task).await
    }

    /// Transitive prerequisites of `task`.
    ///
    /// # Errors
    ///
    /// Returns `TaskNotFound` if `task` is unknown.
    pub async fn dependency_tree(
        &self,
        task: &TaskId,
        max_depth: Option<usize>,
    ) -> Result<Vec<PrerequisiteNode>> {
        self.queries().dependency_tree(task, max_depth).await
    }

    /// Rebuild the precedence graph from the store and check it.
    ///
    /// # Errors
    ///
    /// Only infrastructure failures are errors; problems found are reported
    /// in the returned [`VerifyReport`].
    pub async fn verify(&self) -> Result<VerifyReport> {
        let edges = self.store.all_edges().await?;
        let graph = PrecedenceGraph::from_edges(&edges);

        let mut dangling = Vec::new();
        for edge in &edges {
            if !self.tasks.task_exists(&edge.task_id).await?
                || !self.tasks.task_exists(&edge.depends_on_task_id).await?
            {
                dangling.push(edge.id.clone());
            }
        }

        let report = VerifyReport {
            edges: edges.len(),
            precedence_edges: graph.relation_count(),
            cycle: graph.find_cycle().unwrap_or_default(),
            dangling,
        };
        if report.is_healthy() {
            info!(edges = report.edges, "Dependency graph verified");
        } else {
            warn!(
                cycle = report.cycle.len(),
                dangling = report.dangling.len(),
                "Dependency graph has problems"
            );
        }
        Ok(report)
    }
}

#[async_trait]
impl TaskDeletionHook for DependencyManager {
    async fn on_task_deleted(&self, id: &TaskId) -> Result<usize> {
        let removed = self.store.remove_all_for_task(id).await?;
        info!(task = %id, removed, "Purged dependencies of deleted task");
        Ok(removed)
    }
}
