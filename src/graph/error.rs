//! Contract violations raised by the dependency graph engine.
use super::node::NodeId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("Run find_cycle() before topological_order()")]
    NotCycleChecked,
    #[error("topological_order() requires an acyclic graph")]
    Cyclic,
    #[error("Node {0:?} is not owned by this graph")]
    ForeignNode(NodeId),
    #[error("Topological order covered {ordered} of {total} nodes")]
    IncompleteOrder { ordered: usize, total: usize },
}
