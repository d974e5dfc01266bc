//! Defines the node handle and the payload slot stored for every node of a
//! dependency graph.

use petgraph::stable_graph::NodeIndex;

/// A unique, stable identifier for a node within one dependency graph.
///
/// This is a type alias for `petgraph`'s index type to abstract the
/// underlying graph implementation. Indices stay valid across removals of
/// other nodes (the graph is a `StableDiGraph`).
pub type NodeId = NodeIndex;

/// The weight stored for each node: the caller's payload plus the
/// registration sequence number used as the stable tie-break when ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot<N> {
    pub weight: N,
    pub(crate) seq: u64,
}

impl<N> Slot<N> {
    pub(crate) fn new(weight: N, seq: u64) -> Self {
        Self { weight, seq }
    }
}
