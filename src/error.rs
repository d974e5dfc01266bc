//! Crate-level error type. Every public operation reports one of these kinds.
use crate::expr::ExprError;
use crate::graph::GraphError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RulebookError {
    #[error("Malformed schema: {0}")]
    MalformedSchema(String),

    #[error("Type error: {0}")]
    AttributeType(String),

    #[error("Expression error in {context}: {error}")]
    Expression { context: String, error: ExprError },

    /// `chain` lists the cycle with its first element repeated at the end.
    #[error("Circular dependency: {}", .chain.join(" -> "))]
    CircularDependency { chain: Vec<String> },

    /// Only raised when `EngineConfig::max_cascade_rounds` is set.
    #[error("Cascade still changing after {rounds} rounds: {}", .pending.join(", "))]
    CascadeLimit { rounds: usize, pending: Vec<String> },

    #[error("Internal invariant violated: {0}")]
    InternalInvariant(#[from] GraphError),
}

impl RulebookError {
    pub(crate) fn expression(context: impl Into<String>, error: ExprError) -> Self {
        RulebookError::Expression { context: context.into(), error }
    }
}

impl From<ExprError> for RulebookError {
    fn from(error: ExprError) -> Self {
        RulebookError::Expression { context: "formula".to_string(), error }
    }
}
