//! Runtime settings of a rulebook.
use serde::Deserialize;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Optional bound on breadth-first propagation layers within one public
    /// call. Unbounded by default: a cascade runs until nothing changes.
    pub max_cascade_rounds: Option<usize>,
    /// Seed for dice rolled by calculated attributes; `None` seeds from the OS.
    pub seed: Option<u64>,
}
