//! Dependency DAG over submitted operations.

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::FxHashMap;

use crate::error::{SchedError, SchedResult};
use crate::operation::OperationId;

/// Whether a node's operation has finished, as far as dependents care.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    Open,
    Completed,
    Failed,
}

/// A node in the dependency DAG.
#[derive(Debug, Clone)]
struct DependencyNode {
    id: OperationId,
    resolution: Resolution,
    /// Predecessors that have not completed yet.
    unmet: usize,
}

/// Operations and their "must complete before" edges.
///
/// Cancelled operations count as failed here; dependents of either can
/// never run.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    dag: DiGraph<DependencyNode, ()>,
    index: FxHashMap<OperationId, NodeIndex>,
}

impl DependencyGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an operation with edges from each predecessor.
    ///
    /// Returns the number of predecessors that have not completed.
    pub fn add_operation(
        &mut self,
        id: OperationId,
        predecessors: &[OperationId],
    ) -> SchedResult<usize> {
        let mut sources = Vec::with_capacity(predecessors.len());
        for pred in predecessors {
            let idx = self
                .index
                .get(pred)
                .copied()
                .ok_or(SchedError::InvalidDependency(*pred))?;
            if !sources.contains(&idx) {
                sources.push(idx);
            }
        }

        let node = self.dag.add_node(DependencyNode {
            id,
            resolution: Resolution::Open,
            unmet: 0,
        });
        self.index.insert(id, node);

        // A fresh node has no outgoing edges, so incoming ones cannot close a cycle.
        let mut unmet = 0;
        for source in sources {
            self.dag.add_edge(source, node, ());
            if self.dag[source].resolution != Resolution::Completed {
                unmet += 1;
            }
        }
        self.dag[node].unmet = unmet;
        Ok(unmet)
    }

    /// Record a completion. Returns dependents that have no unmet
    /// predecessors left.
    pub fn mark_completed(&mut self, id: OperationId) -> SchedResult<Vec<OperationId>> {
        let idx = self.node(id)?;
        self.dag[idx].resolution = Resolution::Completed;

        let dependents: Vec<NodeIndex> = self
            .dag
            .neighbors_directed(idx, Direction::Outgoing)
            .collect();
        let mut ready = Vec::new();
        for dep in dependents {
            let node = &mut self.dag[dep];
            node.unmet = node.unmet.saturating_sub(1);
            if node.unmet == 0 && node.resolution == Resolution::Open {
                ready.push(node.id);
            }
        }
        ready.sort();
        Ok(ready)
    }

    /// Record a failure or cancellation. Returns the direct dependents.
    pub fn mark_failed(&mut self, id: OperationId) -> SchedResult<Vec<OperationId>> {
        let idx = self.node(id)?;
        self.dag[idx].resolution = Resolution::Failed;
        Ok(self.dependents(id))
    }

    /// First predecessor of `id` that failed, if any.
    pub fn failed_predecessor(&self, id: OperationId) -> Option<OperationId> {
        let idx = *self.index.get(&id)?;
        self.dag
            .neighbors_directed(idx, Direction::Incoming)
            .filter(|p| self.dag[*p].resolution == Resolution::Failed)
            .map(|p| self.dag[p].id)
            .min()
    }

    /// Predecessors that have not completed.
    pub fn unmet(&self, id: OperationId) -> Option<usize> {
        self.index.get(&id).map(|idx| self.dag[*idx].unmet)
    }

    /// Direct predecessors of an operation, ascending.
    pub fn predecessors(&self, id: OperationId) -> Vec<OperationId> {
        self.neighbours(id, Direction::Incoming)
    }

    /// Direct dependents of an operation, ascending.
    pub fn dependents(&self, id: OperationId) -> Vec<OperationId> {
        self.neighbours(id, Direction::Outgoing)
    }

    /// All operations in dependency order.
    pub fn topological_order(&self) -> SchedResult<Vec<OperationId>> {
        let order = toposort(&self.dag, None).map_err(|_| SchedError::DependencyCycle)?;
        Ok(order.into_iter().map(|idx| self.dag[idx].id).collect())
    }

    /// Check if an operation is known.
    pub fn contains(&self, id: OperationId) -> bool {
        self.index.contains_key(&id)
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.dag.node_count()
    }

    /// Check if the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.dag.node_count() == 0
    }

    fn node(&self, id: OperationId) -> SchedResult<NodeIndex> {
        self.index
            .get(&id)
            .copied()
            .ok_or(SchedError::OperationNotFound(id))
    }

    fn neighbours(&self, id: OperationId, direction: Direction) -> Vec<OperationId> {
        let Some(idx) = self.index.get(&id) else {
            return Vec::new();
        };
        let mut ids: Vec<OperationId> = self
            .dag
            .neighbors_directed(*idx, direction)
            .map(|n| self.dag[n].id)
            .collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(i: u64) -> OperationId {
        OperationId(i)
    }

    #[test]
    fn test_unmet_counts() {
        let mut graph = DependencyGraph::new();
        assert_eq!(graph.add_operation(op(0), &[]).unwrap(), 0);
        assert_eq!(graph.add_operation(op(1), &[]).unwrap(), 0);
        assert_eq!(graph.add_operation(op(2), &[op(0), op(1)]).unwrap(), 2);

        assert!(graph.mark_completed(op(0)).unwrap().is_empty());
        assert_eq!(graph.mark_completed(op(1)).unwrap(), vec![op(2)]);
        assert_eq!(graph.unmet(op(2)), Some(0));

        // Already-completed predecessors are not counted.
        assert_eq!(graph.add_operation(op(3), &[op(0)]).unwrap(), 0);
    }

    #[test]
    fn test_unknown_predecessor() {
        let mut graph = DependencyGraph::new();
        let err = graph.add_operation(op(1), &[op(0)]).unwrap_err();
        assert!(matches!(err, SchedError::InvalidDependency(id) if id == op(0)));
        assert!(graph.is_empty());
    }

    #[test]
    fn test_edges_only_reach_new_operations() {
        let mut graph = DependencyGraph::new();
        graph.add_operation(op(0), &[]).unwrap();
        assert_eq!(graph.add_operation(op(1), &[op(0), op(0)]).unwrap(), 1);
        graph.add_operation(op(2), &[op(1), op(0)]).unwrap();

        assert_eq!(graph.predecessors(op(1)), vec![op(0)]);
        assert!(graph.predecessors(op(0)).is_empty());
        assert_eq!(graph.topological_order().unwrap(), vec![op(0), op(1), op(2)]);
    }

    #[test]
    fn test_failure_propagation_helpers() {
        let mut graph = DependencyGraph::new();
        graph.add_operation(op(0), &[]).unwrap();
        graph.add_operation(op(1), &[op(0)]).unwrap();
        graph.add_operation(op(2), &[op(0)]).unwrap();

        assert_eq!(graph.mark_failed(op(0)).unwrap(), vec![op(1), op(2)]);
        assert_eq!(graph.failed_predecessor(op(1)), Some(op(0)));

        graph.add_operation(op(3), &[op(0)]).unwrap();
        assert_eq!(graph.failed_predecessor(op(3)), Some(op(0)));
    }

    #[test]
    fn test_topological_order() {
        let mut graph = DependencyGraph::new();
        graph.add_operation(op(0), &[]).unwrap();
        graph.add_operation(op(1), &[]).unwrap();
        graph.add_operation(op(2), &[op(1)]).unwrap();
        graph.add_operation(op(3), &[op(2), op(0)]).unwrap();

        let order = graph.topological_order().unwrap();
        let pos = |id| order.iter().position(|o| *o == id).unwrap();
        assert!(pos(op(1)) < pos(op(2)));
        assert!(pos(op(2)) < pos(op(3)));
        assert!(pos(op(0)) < pos(op(3)));
        assert_eq!(graph.dependents(op(0)), vec![op(3)]);
    }
}
