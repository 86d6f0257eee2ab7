//! Precedence graph construction and cycle prevention.
//!
//! The graph is built from the ordering edges of a store snapshot and
//! thrown away after use. Nodes are task ids; an edge points from a
//! prerequisite to the task that waits on it, so "everything downstream of
//! X" is a forward traversal and "everything X waits on" is a backward one.
//!
//! Adding `prerequisite -> dependent` closes a cycle exactly when
//! `prerequisite` is already reachable from `dependent`.

use crate::domain::{DependencyEdge, EdgeId, NewDependency, Precedence, PrerequisiteNode, TaskId};
use crate::error::{Error, Result};
use crate::storage::EdgeGuard;
use petgraph::Direction;
use petgraph::algo;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

/// Directed graph of canonical precedence relations.
#[derive(Debug, Default)]
pub struct PrecedenceGraph {
    graph: DiGraph<TaskId, EdgeId>,
    node_map: HashMap<TaskId, NodeIndex>,
}

impl PrecedenceGraph {
    /// Build the graph from the ordering edges in `edges`.
    ///
    /// `RelatesTo` edges are ignored.
    pub fn from_edges<'a, I>(edges: I) -> Self
    where
        I: IntoIterator<Item = &'a DependencyEdge>,
    {
        let mut graph = Self::default();
        for edge in edges {
            if let Some(precedence) = edge.precedence() {
                graph.add(&precedence, edge.id.clone());
            }
        }
        graph
    }

    /// Add one precedence relation.
    pub fn add(&mut self, precedence: &Precedence, via: EdgeId) {
        let from = self.node(&precedence.prerequisite);
        let to = self.node(&precedence.dependent);
        self.graph.add_edge(from, to, via);
    }

    fn node(&mut self, id: &TaskId) -> NodeIndex {
        if let Some(&idx) = self.node_map.get(id) {
            return idx;
        }
        let idx = self.graph.add_node(id.clone());
        self.node_map.insert(id.clone(), idx);
        idx
    }

    /// Number of tasks taking part in at least one precedence relation.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of precedence relations.
    #[must_use]
    pub fn relation_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Shortest forward path from `from` to `to`, both ends included.
    ///
    /// Iterative breadth-first search with an explicit visited set, so deep
    /// chains cannot exhaust the stack.
    #[must_use]
    pub fn path(&self, from: &TaskId, to: &TaskId) -> Option<Vec<TaskId>> {
        let start = *self.node_map.get(from)?;
        let goal = *self.node_map.get(to)?;

        let mut visited = HashSet::from([start]);
        let mut came_from: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut queue = VecDeque::from([start]);

        while let Some(current) = queue.pop_front() {
            if current == goal {
                let mut path = vec![self.graph[current].clone()];
                let mut node = current;
                while let Some(&prev) = came_from.get(&node) {
                    path.push(self.graph[prev].clone());
                    node = prev;
                }
                path.reverse();
                return Some(path);
            }
            for next in self.graph.neighbors_directed(current, Direction::Outgoing) {
                if visited.insert(next) {
                    came_from.insert(next, current);
                    queue.push_back(next);
                }
            }
        }

        None
    }

    /// The cycle adding `precedence` would close, if any.
    ///
    /// The returned path starts and ends with the prerequisite:
    /// `[prerequisite, dependent, ..., prerequisite]`.
    #[must_use]
    pub fn cycle_through(&self, precedence: &Precedence) -> Option<Vec<TaskId>> {
        let back = self.path(&precedence.dependent, &precedence.prerequisite)?;
        let mut cycle = Vec::with_capacity(back.len() + 1);
        cycle.push(precedence.prerequisite.clone());
        cycle.extend(back);
        Some(cycle)
    }

    /// Whether the graph as a whole has no cycle.
    #[must_use]
    pub fn is_acyclic(&self) -> bool {
        !algo::is_cyclic_directed(&self.graph)
    }

    /// Tasks of one strongly connected component with more than one member,
    /// sorted by id. `None` when the graph is acyclic.
    #[must_use]
    pub fn find_cycle(&self) -> Option<Vec<TaskId>> {
        algo::tarjan_scc(&self.graph)
            .into_iter()
            .find(|component| component.len() > 1)
            .map(|component| {
                let mut tasks: Vec<TaskId> = component
                    .into_iter()
                    .map(|idx| self.graph[idx].clone())
                    .collect();
                tasks.sort();
                tasks
            })
    }

    /// Transitive prerequisites of `task` in breadth-first order.
    ///
    /// Each prerequisite appears once, at the depth it was first reached.
    /// `max_depth` of `None` means unbounded.
    #[must_use]
    pub fn prerequisites(&self, task: &TaskId, max_depth: Option<usize>) -> Vec<PrerequisiteNode> {
        let Some(&start) = self.node_map.get(task) else {
            return Vec::new();
        };

        let mut result = Vec::new();
        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([(start, 0usize)]);

        while let Some((current, depth)) = queue.pop_front() {
            if max_depth.is_some_and(|max| depth >= max) {
                continue;
            }
            let mut incoming: Vec<_> = self
                .graph
                .edges_directed(current, Direction::Incoming)
                .collect();
            // petgraph yields the newest edge first
            incoming.reverse();

            for edge in incoming {
                let source = edge.source();
                if visited.insert(source) {
                    result.push(PrerequisiteNode {
                        task_id: self.graph[source].clone(),
                        depth: depth + 1,
                        via: edge.weight().clone(),
                    });
                    queue.push_back((source, depth + 1));
                }
            }
        }

        debug!(task = %task, found = result.len(), "Traversed prerequisite tree");
        result
    }
}

/// Decides whether a proposed edge may join the current edge set.
///
/// Checks, in order: request shape (blank ids, self-loop), semantic
/// duplicates, and for ordering edges, whether the edge would close a
/// precedence cycle.
#[derive(Debug, Default, Clone, Copy)]
pub struct GraphValidator;

impl GraphValidator {
    /// Create a validator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Validate `proposed` against `existing`.
    ///
    /// # Errors
    ///
    /// - `Validation` for a self-loop or blank id
    /// - `DuplicateEdge` if an equivalent relation exists
    /// - `CircularDependency` if the edge would close a cycle
    pub fn validate(&self, existing: &[DependencyEdge], proposed: &NewDependency) -> Result<()> {
        proposed.validate().map_err(Error::Validation)?;

        let key = proposed.relation_key();
        if existing.iter().any(|edge| edge.relation_key() == key) {
            return Err(Error::DuplicateEdge {
                task_id: proposed.task_id.clone(),
                depends_on_task_id: proposed.depends_on_task_id.clone(),
                dep_type: proposed.dep_type,
            });
        }

        let Some(precedence) = proposed.precedence() else {
            return Ok(());
        };

        let graph = PrecedenceGraph::from_edges(existing);
        if let Some(path) = graph.cycle_through(&precedence) {
            debug!(
                prerequisite = %precedence.prerequisite,
                dependent = %precedence.dependent,
                cycle_len = path.len(),
                "Rejected edge closing a cycle"
            );
            return Err(Error::CircularDependency { path });
        }

        Ok(())
    }
}

impl EdgeGuard for GraphValidator {
    fn check(&self, existing: &[DependencyEdge], proposed: &NewDependency) -> Result<()> {
        self.validate(existing, proposed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DependencyType;
    use chrono::Utc;

    fn edge(id: &str, task: &str, depends_on: &str, dep_type: DependencyType) -> DependencyEdge {
        DependencyEdge::from_new(
            EdgeId::new(id),
            NewDependency::new(task, depends_on, dep_type),
            Utc::now(),
        )
    }

    fn ids(raw: &[&str]) -> Vec<TaskId> {
        raw.iter().map(|s| TaskId::new(*s)).collect()
    }

    #[test]
    fn direct_cycle_is_rejected_with_path() {
        // t2 is the prerequisite of t1
        let existing = vec![edge("dep-1", "t1", "t2", DependencyType::Blocks)];
        let proposed = NewDependency::new("t2", "t1", DependencyType::Blocks);

        let err = GraphValidator::new().validate(&existing, &proposed).unwrap_err();
        match err {
            Error::CircularDependency { path } => assert_eq!(path, ids(&["t1", "t2", "t1"])),
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn transitive_cycle_is_rejected() {
        // c -> b -> a in precedence order
        let existing = vec![
            edge("dep-1", "a", "b", DependencyType::Blocks),
            edge("dep-2", "b", "c", DependencyType::Blocks),
        ];
        let proposed = NewDependency::new("c", "a", DependencyType::Blocks);

        let err = GraphValidator::new().validate(&existing, &proposed).unwrap_err();
        match err {
            Error::CircularDependency { path } => {
                assert_eq!(path, ids(&["a", "c", "b", "a"]));
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn blocked_by_participates_in_cycle_check() {
        // a BlockedBy b: a is the prerequisite of b
        let existing = vec![edge("dep-1", "a", "b", DependencyType::BlockedBy)];
        let proposed = NewDependency::new("a", "b", DependencyType::Blocks);

        assert!(matches!(
            GraphValidator::new().validate(&existing, &proposed),
            Err(Error::CircularDependency { .. })
        ));
    }

    #[test]
    fn relates_to_skips_cycle_check() {
        let existing = vec![edge("dep-1", "a", "b", DependencyType::Blocks)];
        let proposed = NewDependency::new("b", "a", DependencyType::RelatesTo);

        assert!(GraphValidator::new().validate(&existing, &proposed).is_ok());
    }

    #[test]
    fn semantic_duplicates_are_rejected() {
        let existing = vec![
            edge("dep-1", "a", "b", DependencyType::Blocks),
            edge("dep-2", "c", "d", DependencyType::RelatesTo),
        ];
        let validator = GraphValidator::new();

        for proposed in [
            NewDependency::new("a", "b", DependencyType::Blocks),
            NewDependency::new("b", "a", DependencyType::BlockedBy),
            NewDependency::new("d", "c", DependencyType::RelatesTo),
        ] {
            assert!(
                matches!(
                    validator.validate(&existing, &proposed),
                    Err(Error::DuplicateEdge { .. })
                ),
                "{proposed:?} should be a duplicate"
            );
        }
    }

    #[test]
    fn self_loop_is_validation_error() {
        let proposed = NewDependency::new("a", "a", DependencyType::RelatesTo);
        assert!(matches!(
            GraphValidator::new().validate(&[], &proposed),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn prerequisites_are_breadth_first_with_depth() {
        // d needs b and c; b needs a
        let edges = vec![
            edge("dep-1", "d", "b", DependencyType::Blocks),
            edge("dep-2", "d", "c", DependencyType::Blocks),
            edge("dep-3", "b", "a", DependencyType::Blocks),
            edge("dep-4", "d", "x", DependencyType::RelatesTo),
        ];
        let graph = PrecedenceGraph::from_edges(&edges);

        let tree = graph.prerequisites(&TaskId::new("d"), None);
        let flat: Vec<_> = tree
            .iter()
            .map(|n| (n.task_id.as_str(), n.depth, n.via.as_str()))
            .collect();
        assert_eq!(
            flat,
            vec![("b", 1, "dep-1"), ("c", 1, "dep-2"), ("a", 2, "dep-3")]
        );

        let shallow = graph.prerequisites(&TaskId::new("d"), Some(1));
        assert_eq!(shallow.len(), 2);
    }

    #[test]
    fn prerequisites_of_unknown_task_is_empty() {
        let graph = PrecedenceGraph::default();
        assert!(graph.prerequisites(&TaskId::new("nope"), None).is_empty());
    }

    #[test]
    fn acyclicity_and_cycle_report() {
        let mut graph = PrecedenceGraph::from_edges(&[
            edge("dep-1", "a", "b", DependencyType::Blocks),
            edge("dep-2", "b", "c", DependencyType::Blocks),
        ]);
        assert!(graph.is_acyclic());
        assert_eq!(graph.find_cycle(), None);
        assert_eq!(graph.task_count(), 3);
        assert_eq!(graph.relation_count(), 2);

        // Only reachable by bypassing the validator.
        graph.add(
            &Precedence {
                prerequisite: TaskId::new("a"),
                dependent: TaskId::new("c"),
            },
            EdgeId::new("dep-3"),
        );
        assert!(!graph.is_acyclic());
        assert_eq!(graph.find_cycle(), Some(ids(&["a", "b", "c"])));
    }
}
