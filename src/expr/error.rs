//! Defines the error types for the expression module.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    #[error("Unexpected character '{ch}' at offset {offset} in \"{text}\"")]
    UnexpectedChar { text: String, ch: char, offset: usize },
    #[error("Unterminated text literal in \"{0}\"")]
    UnterminatedText(String),
    #[error("Syntax error in \"{text}\": {message}")]
    Syntax { text: String, message: String },
    #[error("Unknown function \"{0}\"")]
    UnknownFunction(String),
    #[error("Can't process \"{0}\"")]
    NoOverload(String),
    #[error("Property \"{0}\" is not defined")]
    UnknownIdentifier(String),
    #[error("Entity {entity} has no attribute \"{field}\"")]
    UnknownField { entity: String, field: String },
    #[error("Evaluation error: {0}")]
    Eval(String),
}
