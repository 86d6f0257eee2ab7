//! Domain types for the task dependency graph.
//!
//! Tasks are owned by the host application and only referenced here by
//! [`TaskId`]. The types in this module describe dependency edges between
//! them and the canonical precedence relation derived from those edges.
//!
//! # Edge Direction Convention
//!
//! An edge always has a *subject* (`task_id`) and an *object*
//! (`depends_on_task_id`). How that maps to precedence depends on the label:
//!
//! - `A Blocks B`: the subject depends on the object, so **B is the
//!   prerequisite of A**.
//! - `B BlockedBy A`: the inverse label for the same relation, so
//!   **B is the prerequisite of A** here too.
//! - `RelatesTo`: no precedence at all; symmetric and informational.
//!
//! Both ordering labels normalize to one [`Precedence`] value
//! (prerequisite -> dependent), which is what cycle detection works on. The
//! caller's chosen label is kept on the stored edge for display.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unique identifier for a task (owned by the task collaborator).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Create a new task ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Unique identifier for a dependency edge, assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub String);

impl EdgeId {
    /// Create a new edge ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EdgeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Status of a task, as reported by the task collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Work has not yet begun
    NotStarted,

    /// Currently being worked on
    InProgress,

    /// Temporarily halted
    Paused,

    /// All work has been completed
    Completed,
}

impl TaskStatus {
    /// Whether this status satisfies a prerequisite.
    #[must_use]
    pub fn is_completed(self) -> bool {
        self == Self::Completed
    }

    /// Stable string form used in storage and CLI output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Paused => "paused",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type of dependency relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DependencyType {
    /// The subject cannot finish before the object (object is the prerequisite)
    Blocks,

    /// Inverse label of `Blocks` (subject is the prerequisite)
    BlockedBy,

    /// Informational link, no ordering
    RelatesTo,
}

impl DependencyType {
    /// All dependency types, in display order.
    pub const ALL: [Self; 3] = [Self::Blocks, Self::BlockedBy, Self::RelatesTo];

    /// Whether edges of this type take part in precedence (and cycle checks).
    #[must_use]
    pub fn is_ordering(self) -> bool {
        matches!(self, Self::Blocks | Self::BlockedBy)
    }

    /// Stable string form used in storage, JSON and the CLI.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blocks => "blocks",
            Self::BlockedBy => "blocked-by",
            Self::RelatesTo => "relates-to",
        }
    }
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DependencyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "blocks" => Ok(Self::Blocks),
            "blocked-by" | "blockedby" => Ok(Self::BlockedBy),
            "relates-to" | "relatesto" | "related" => Ok(Self::RelatesTo),
            other => Err(format!(
                "Unknown dependency type '{other}' (expected blocks, blocked-by or relates-to)"
            )),
        }
    }
}

/// A canonical precedence relation: `prerequisite` must complete before
/// `dependent`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Precedence {
    /// Task that must finish first
    pub prerequisite: TaskId,

    /// Task that waits on the prerequisite
    pub dependent: TaskId,
}

/// Identity of a relation for duplicate detection.
///
/// Two edges with the same key describe the same relationship, even when
/// written with different labels or subject/object order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RelationKey {
    /// Ordering relation, keyed by its canonical direction
    Precedence(Precedence),

    /// Symmetric relation, keyed by the unordered pair (smaller id first)
    Related(TaskId, TaskId),
}

/// Canonical precedence for a `(subject, object, type)` triple.
fn precedence_of(
    task_id: &TaskId,
    depends_on_task_id: &TaskId,
    dep_type: DependencyType,
) -> Option<Precedence> {
    match dep_type {
        DependencyType::Blocks => Some(Precedence {
            prerequisite: depends_on_task_id.clone(),
            dependent: task_id.clone(),
        }),
        DependencyType::BlockedBy => Some(Precedence {
            prerequisite: task_id.clone(),
            dependent: depends_on_task_id.clone(),
        }),
        DependencyType::RelatesTo => None,
    }
}

fn relation_key_of(
    task_id: &TaskId,
    depends_on_task_id: &TaskId,
    dep_type: DependencyType,
) -> RelationKey {
    match precedence_of(task_id, depends_on_task_id, dep_type) {
        Some(precedence) => RelationKey::Precedence(precedence),
        None if task_id <= depends_on_task_id => {
            RelationKey::Related(task_id.clone(), depends_on_task_id.clone())
        }
        None => RelationKey::Related(depends_on_task_id.clone(), task_id.clone()),
    }
}

/// Data for creating a new dependency edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDependency {
    /// Subject task
    pub task_id: TaskId,

    /// Object task
    pub depends_on_task_id: TaskId,

    /// Relationship label
    pub dep_type: DependencyType,
}

impl NewDependency {
    /// Create a new dependency request
    pub fn new(
        task_id: impl Into<TaskId>,
        depends_on_task_id: impl Into<TaskId>,
        dep_type: DependencyType,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            depends_on_task_id: depends_on_task_id.into(),
            dep_type,
        }
    }

    /// Validate the request shape: non-blank ids, no self-loop.
    ///
    /// # Errors
    ///
    /// Returns a human-readable message describing the first violation.
    pub fn validate(&self) -> Result<(), String> {
        if self.task_id.as_str().trim().is_empty()
            || self.depends_on_task_id.as_str().trim().is_empty()
        {
            return Err("Task IDs cannot be empty".to_string());
        }
        if self.task_id == self.depends_on_task_id {
            return Err(format!(
                "A task cannot depend on itself: {}",
                self.task_id
            ));
        }
        Ok(())
    }

    /// Canonical precedence, or `None` for `RelatesTo`.
    #[must_use]
    pub fn precedence(&self) -> Option<Precedence> {
        precedence_of(&self.task_id, &self.depends_on_task_id, self.dep_type)
    }

    /// Key used for semantic duplicate detection.
    #[must_use]
    pub fn relation_key(&self) -> RelationKey {
        relation_key_of(&self.task_id, &self.depends_on_task_id, self.dep_type)
    }
}

/// A stored dependency edge between two tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    /// Unique identifier
    pub id: EdgeId,

    /// Subject task (declares the relationship)
    pub task_id: TaskId,

    /// Object task (referenced by the relationship)
    pub depends_on_task_id: TaskId,

    /// Relationship label as chosen by the caller
    pub dep_type: DependencyType,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl DependencyEdge {
    /// Build a stored edge from a request.
    #[must_use]
    pub fn from_new(id: EdgeId, new: NewDependency, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            task_id: new.task_id,
            depends_on_task_id: new.depends_on_task_id,
            dep_type: new.dep_type,
            created_at,
        }
    }

    /// Canonical precedence, or `None` for `RelatesTo`.
    #[must_use]
    pub fn precedence(&self) -> Option<Precedence> {
        precedence_of(&self.task_id, &self.depends_on_task_id, self.dep_type)
    }

    /// Key used for semantic duplicate detection.
    #[must_use]
    pub fn relation_key(&self) -> RelationKey {
        relation_key_of(&self.task_id, &self.depends_on_task_id, self.dep_type)
    }

    /// Whether the edge references `task` on either side.
    #[must_use]
    pub fn mentions(&self, task: &TaskId) -> bool {
        &self.task_id == task || &self.depends_on_task_id == task
    }

    /// The task on the other side of the edge from `task`.
    #[must_use]
    pub fn counterpart(&self, task: &TaskId) -> Option<&TaskId> {
        if &self.task_id == task {
            Some(&self.depends_on_task_id)
        } else if &self.depends_on_task_id == task {
            Some(&self.task_id)
        } else {
            None
        }
    }

    /// Role the counterpart of `task` plays relative to `task`.
    #[must_use]
    pub fn counterpart_role(&self, task: &TaskId) -> Option<Role> {
        let counterpart = self.counterpart(task)?;
        Some(match self.precedence() {
            None => Role::Related,
            Some(p) if &p.prerequisite == counterpart => Role::Prerequisite,
            Some(_) => Role::Dependent,
        })
    }

    /// Ordering used for every edge listing: oldest first, id as tiebreak.
    pub(crate) fn listing_order(a: &Self, b: &Self) -> std::cmp::Ordering {
        a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id))
    }
}

/// How a related task stands relative to the task being inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Must complete before the inspected task
    Prerequisite,

    /// Waits on the inspected task
    Dependent,

    /// Linked without ordering
    Related,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Prerequisite => "prerequisite",
            Self::Dependent => "dependent",
            Self::Related => "related",
        })
    }
}

/// A task reference annotated with its current status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskState {
    /// Task identifier
    pub id: TaskId,

    /// Status at query time
    pub status: TaskStatus,
}

/// Display data for a task: title and status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSummary {
    /// Task identifier
    pub id: TaskId,

    /// Task title
    pub title: String,

    /// Status at query time
    pub status: TaskStatus,
}

/// An edge joined with the task on its other side, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyDetails {
    /// The stored edge
    pub edge: DependencyEdge,

    /// Role of the counterpart relative to the inspected task
    pub role: Role,

    /// The task on the other side of the edge
    pub counterpart: TaskSummary,
}

/// One entry of a transitive prerequisite traversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrerequisiteNode {
    /// Prerequisite task
    pub task_id: TaskId,

    /// 1 for immediate prerequisites, 2 for theirs, and so on
    pub depth: usize,

    /// Edge through which the prerequisite was first reached
    pub via: EdgeId,
}
