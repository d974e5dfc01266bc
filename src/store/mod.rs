//! Storage for live entities: a generational arena and its handle type.
pub mod registry;
pub mod types;

pub use registry::Registry;
pub use types::EntityId;
