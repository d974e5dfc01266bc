//! Defines the generic dependency graph shared by templates, entities and
//! include resolution.
pub mod dag;
pub mod edge;
pub mod error;
pub mod node;

// Re-export key types for convenient access
pub use dag::{DependGraph, DependencyGraph};
pub use edge::DependEdge;
pub use error::GraphError;
pub use node::NodeId;
