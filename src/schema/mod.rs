//! Schema input types and include/reverse resolution.
pub mod resolve;
pub mod types;

pub use resolve::resolve;
pub use types::{AttrSchema, Schema, TemplateSchema};
