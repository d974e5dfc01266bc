//! Runtime mutation: coercion, the undo journal and the cascade engine.
pub mod coerce;
pub mod config;
pub mod engine;
pub mod ledger;

pub use config::EngineConfig;
pub use engine::Engine;
pub use ledger::Ledger;
