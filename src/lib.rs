//! rulebook_core
//!
//! A rules engine for templated entities. Templates declare typed attributes,
//! some stored and some calculated by small formulas (with NdM dice). Live
//! entities keep every calculated attribute current as stored values change,
//! on the entity itself and across linked entities, and keep paired
//! (reverse) relationships in step on both sides.

pub mod computation;
pub mod display;
pub mod entity;
pub mod error;
pub mod expr;
pub mod graph;
pub mod rulebook;
pub mod schema;
pub mod store;
pub mod template;
pub mod value;

pub use computation::EngineConfig;
pub use entity::Entity;
pub use error::RulebookError;
pub use expr::{ExprType, Expression, RollMode};
pub use rulebook::Rulebook;
pub use schema::{AttrSchema, Schema, TemplateSchema};
pub use store::EntityId;
pub use template::Template;
pub use value::Value;
