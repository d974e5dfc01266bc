//! dag.rs
//! Generic dependency graph: symmetric-indexed edges, cycle detection and a
//! stable, layered topological order.

use super::edge::DependEdge;
use super::error::GraphError;
use super::node::{NodeId, Slot};
use indexmap::IndexSet;
use petgraph::stable_graph::{EdgeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction::{Incoming, Outgoing};
use smallvec::SmallVec;

/// The operations every dependency graph offers, whatever its node payload.
///
/// Templates, entities and the include resolver each *hold* one of these
/// rather than being one.
pub trait DependencyGraph {
    type Weight;

    fn add_node(&mut self, weight: Self::Weight) -> NodeId;
    fn remove_node(&mut self, id: NodeId) -> Result<Self::Weight, GraphError>;
    /// Adds `from -> to`. Re-adding an existing edge is a no-op.
    fn add_edge(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError>;
    /// Removes `from -> to`, returning whether the edge existed.
    fn remove_edge(&mut self, from: NodeId, to: NodeId) -> Result<bool, GraphError>;
    /// Returns a cyclic path (first node repeated at the end) if one exists.
    fn find_cycle(&mut self) -> Option<Vec<NodeId>>;
    /// Leaves first. Requires a prior `find_cycle` that reported no cycle.
    fn topological_order(&mut self) -> Result<Vec<NodeId>, GraphError>;
}

type EdgeList = SmallVec<[(EdgeIndex, NodeId); 8]>;

#[derive(Debug, Clone)]
pub struct DependGraph<N> {
    graph: StableDiGraph<Slot<N>, DependEdge>,
    next_seq: u64,
    /// `None` until checked; any edge mutation resets it.
    acyclic: Option<bool>,
}

impl<N> Default for DependGraph<N> {
    fn default() -> Self {
        Self { graph: StableDiGraph::default(), next_seq: 0, acyclic: None }
    }
}

impl<N> DependGraph<N> {
    pub fn new() -> Self { Self::default() }

    pub fn node_count(&self) -> usize { self.graph.node_count() }
    pub fn edge_count(&self) -> usize { self.graph.edge_count() }
    pub fn contains(&self, id: NodeId) -> bool { self.graph.contains_node(id) }
    pub fn weight(&self, id: NodeId) -> Option<&N> { self.graph.node_weight(id).map(|s| &s.weight) }

    /// `Some(true)` when the last cycle check is still valid and found none.
    pub fn is_acyclic(&self) -> Option<bool> { self.acyclic }

    /// All nodes in registration order.
    pub fn nodes(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.graph.node_indices().collect();
        ids.sort_by_key(|&id| self.graph[id].seq);
        ids
    }

    /// Nodes `id` depends on (outgoing edges).
    pub fn depends(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.graph.neighbors_directed(id, Outgoing)
    }

    /// Nodes that depend on `id` (incoming edges).
    pub fn depended_by(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.graph.neighbors_directed(id, Incoming)
    }

    pub fn has_edge(&self, from: NodeId, to: NodeId) -> bool {
        self.graph.find_edge(from, to).is_some()
    }

    /// True while any edge carries a stale mark. Only useful to tests.
    pub fn any_marked(&self) -> bool {
        self.graph.edge_indices().any(|e| self.graph[e].marked)
    }

    fn check_owned(&self, id: NodeId) -> Result<(), GraphError> {
        if self.graph.contains_node(id) { Ok(()) } else { Err(GraphError::ForeignNode(id)) }
    }

    fn unmark(&mut self) {
        let edges: Vec<EdgeIndex> = self.graph.edge_indices().collect();
        for edge in edges {
            self.graph[edge].marked = false;
        }
    }

    fn has_unmarked_depends(&self, id: NodeId) -> bool {
        self.graph.edges_directed(id, Outgoing).any(|e| !e.weight().marked)
    }

    fn edges(&self, id: NodeId, outgoing: bool) -> EdgeList {
        if outgoing {
            self.graph.edges_directed(id, Outgoing).map(|e| (e.id(), e.target())).collect()
        } else {
            self.graph.edges_directed(id, Incoming).map(|e| (e.id(), e.source())).collect()
        }
    }

    /// Explores every unmarked branch leaving `node`, given the path that led here.
    fn cycle_from(&mut self, node: NodeId, path: &mut IndexSet<NodeId>) -> Option<Vec<NodeId>> {
        if let Some(start) = path.get_index_of(&node) {
            let mut cycle: Vec<NodeId> = path.iter().skip(start).copied().collect();
            cycle.push(node);
            return Some(cycle);
        }

        path.insert(node);
        for (edge, target) in self.edges(node, true) {
            if !self.graph[edge].marked {
                self.graph[edge].marked = true;
                if let Some(cycle) = self.cycle_from(target, path) {
                    return Some(cycle);
                }
            }
        }
        path.pop();
        None
    }
}

impl<N> DependencyGraph for DependGraph<N> {
    type Weight = N;

    fn add_node(&mut self, weight: N) -> NodeId {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.graph.add_node(Slot::new(weight, seq))
    }

    fn remove_node(&mut self, id: NodeId) -> Result<N, GraphError> {
        self.check_owned(id)?;
        let connected = self.graph.edges_directed(id, Outgoing).next().is_some()
            || self.graph.edges_directed(id, Incoming).next().is_some();
        if connected {
            self.acyclic = None;
        }
        self.graph.remove_node(id).map(|slot| slot.weight).ok_or(GraphError::ForeignNode(id))
    }

    fn add_edge(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        self.check_owned(from)?;
        self.check_owned(to)?;
        if self.graph.find_edge(from, to).is_none() {
            self.graph.add_edge(from, to, DependEdge::default());
            self.acyclic = None;
        }
        Ok(())
    }

    fn remove_edge(&mut self, from: NodeId, to: NodeId) -> Result<bool, GraphError> {
        self.check_owned(from)?;
        self.check_owned(to)?;
        match self.graph.find_edge(from, to) {
            Some(edge) => {
                self.graph.remove_edge(edge);
                self.acyclic = None;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn find_cycle(&mut self) -> Option<Vec<NodeId>> {
        if self.acyclic == Some(true) {
            return None;
        }
        for node in self.nodes() {
            if self.has_unmarked_depends(node) {
                let mut path = IndexSet::new();
                if let Some(cycle) = self.cycle_from(node, &mut path) {
                    self.unmark();
                    self.acyclic = Some(false);
                    return Some(cycle);
                }
            }
        }
        self.unmark();
        self.acyclic = Some(true);
        None
    }

    fn topological_order(&mut self) -> Result<Vec<NodeId>, GraphError> {
        match self.acyclic {
            None => return Err(GraphError::NotCycleChecked),
            Some(false) => return Err(GraphError::Cyclic),
            Some(true) => {}
        }

        let total = self.graph.node_count();
        let mut order = Vec::with_capacity(total);

        // 1. Leaves: nodes with no outgoing edges.
        let mut layer: Vec<NodeId> =
            self.nodes().into_iter().filter(|&n| !self.has_unmarked_depends(n)).collect();

        // 2. Emit a layer, satisfy the edges pointing into it, collect what became ready.
        while !layer.is_empty() {
            let mut ready = IndexSet::new();
            for &node in &layer {
                order.push(node);
                for (edge, source) in self.edges(node, false) {
                    self.graph[edge].marked = true;
                    if !self.has_unmarked_depends(source) {
                        ready.insert(source);
                    }
                }
            }
            let mut next: Vec<NodeId> = ready.into_iter().collect();
            next.sort_by_key(|&n| self.graph[n].seq);
            layer = next;
        }

        self.unmark();
        if order.len() != total {
            return Err(GraphError::IncompleteOrder { ordered: order.len(), total });
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_of(names: &[&'static str]) -> (DependGraph<&'static str>, Vec<NodeId>) {
        let mut g = DependGraph::new();
        let ids = names.iter().map(|n| g.add_node(*n)).collect();
        (g, ids)
    }

    fn names(g: &DependGraph<&'static str>, ids: &[NodeId]) -> Vec<&'static str> {
        ids.iter().map(|&id| *g.weight(id).unwrap()).collect()
    }

    #[test]
    fn test_add_edge_is_idempotent() {
        let (mut g, ids) = graph_of(&["a", "b"]);
        g.add_edge(ids[0], ids[1]).unwrap();
        g.add_edge(ids[0], ids[1]).unwrap();
        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.depends(ids[0]).collect::<Vec<_>>(), vec![ids[1]]);
        assert_eq!(g.depended_by(ids[1]).collect::<Vec<_>>(), vec![ids[0]]);
    }

    #[test]
    fn test_sort_diamond_dependency() {
        // d depends on b and c, which both depend on a.
        let (mut g, ids) = graph_of(&["d", "b", "c", "a"]);
        let (d, b, c, a) = (ids[0], ids[1], ids[2], ids[3]);
        g.add_edge(d, b).unwrap();
        g.add_edge(d, c).unwrap();
        g.add_edge(b, a).unwrap();
        g.add_edge(c, a).unwrap();

        assert!(g.find_cycle().is_none());
        let order = g.topological_order().unwrap();
        // b and c become ready together and keep registration order.
        assert_eq!(names(&g, &order), vec!["a", "b", "c", "d"]);
        assert!(!g.any_marked());
    }

    #[test]
    fn test_leaves_keep_registration_order() {
        let (mut g, ids) = graph_of(&["z", "y", "x"]);
        g.add_edge(ids[1], ids[2]).unwrap();
        assert!(g.find_cycle().is_none());
        let order = g.topological_order().unwrap();
        assert_eq!(names(&g, &order), vec!["z", "x", "y"]);
    }

    #[test]
    fn test_cycle_detection_returns_cyclic_suffix() {
        let (mut g, ids) = graph_of(&["entry", "a", "b", "c"]);
        g.add_edge(ids[0], ids[1]).unwrap();
        g.add_edge(ids[1], ids[2]).unwrap();
        g.add_edge(ids[2], ids[3]).unwrap();
        g.add_edge(ids[3], ids[1]).unwrap();

        let cycle = g.find_cycle().expect("cycle expected");
        assert_eq!(cycle.first(), cycle.last());
        assert_eq!(names(&g, &cycle), vec!["a", "b", "c", "a"]);
        for pair in cycle.windows(2) {
            assert!(g.has_edge(pair[0], pair[1]));
        }
        assert!(!g.any_marked());
        assert_eq!(g.is_acyclic(), Some(false));
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let (mut g, ids) = graph_of(&["a"]);
        g.add_edge(ids[0], ids[0]).unwrap();
        assert_eq!(g.find_cycle().map(|c| c.len()), Some(2));
    }

    #[test]
    fn test_topological_order_requires_cycle_check() {
        let (mut g, ids) = graph_of(&["a", "b"]);
        g.add_edge(ids[0], ids[1]).unwrap();
        assert_eq!(g.topological_order(), Err(GraphError::NotCycleChecked));

        g.add_edge(ids[1], ids[0]).unwrap();
        assert!(g.find_cycle().is_some());
        assert_eq!(g.topological_order(), Err(GraphError::Cyclic));
    }

    #[test]
    fn test_edge_mutation_invalidates_cache() {
        let (mut g, ids) = graph_of(&["a", "b"]);
        g.add_edge(ids[0], ids[1]).unwrap();
        assert!(g.find_cycle().is_none());
        assert_eq!(g.is_acyclic(), Some(true));

        g.add_edge(ids[1], ids[0]).unwrap();
        assert_eq!(g.is_acyclic(), None);
        assert!(g.find_cycle().is_some());

        assert!(g.remove_edge(ids[1], ids[0]).unwrap());
        assert_eq!(g.is_acyclic(), None);
        assert!(g.find_cycle().is_none());
        assert!(g.topological_order().is_ok());
    }

    #[test]
    fn test_foreign_node_is_rejected() {
        let (mut g, ids) = graph_of(&["a", "b"]);
        let removed = g.remove_node(ids[1]).unwrap();
        assert_eq!(removed, "b");
        assert_eq!(g.add_edge(ids[0], ids[1]), Err(GraphError::ForeignNode(ids[1])));
        assert_eq!(g.remove_node(ids[1]), Err(GraphError::ForeignNode(ids[1])));
    }
}
