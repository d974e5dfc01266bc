//! Defines the `DependEdge` type, representing a dependency between two nodes.

/// A directed edge `from -> to`, meaning "from's value depends on to's value".
///
/// The `marked` bit is scratch space for the graph algorithms in `dag.rs`.
/// It is false on entry to and exit from every public algorithm.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DependEdge {
    pub(crate) marked: bool,
}

impl DependEdge {
    pub fn is_marked(&self) -> bool { self.marked }
}
