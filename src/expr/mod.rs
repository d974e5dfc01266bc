//! The formula language: lexing, overload-resolved parsing, evaluation.
pub mod error;
pub mod eval;
pub mod funcs;
pub mod lexer;
pub mod node;
pub mod parser;
pub mod types;

pub use error::ExprError;
pub use eval::{Bindings, EvalProps, MapBindings, NoBindings, RollMode};
pub use node::ParseNode;
pub use parser::{TypeEnv, Untyped};
pub use types::ExprType;

use crate::display::describe::{describe, DescProps};
use crate::value::Value;

/// A parsed formula together with its source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    root: ParseNode,
}

impl Expression {
    pub fn parse(source: &str, env: &dyn TypeEnv) -> Result<Self, ExprError> {
        let root = parser::parse(source, env)?;
        Ok(Self { source: source.to_string(), root })
    }

    #[inline(always)]
    pub fn source(&self) -> &str { &self.source }
    #[inline(always)]
    pub fn root(&self) -> &ParseNode { &self.root }
    #[inline(always)]
    pub fn ty(&self) -> ExprType { self.root.ty() }

    /// Names the formula reads, member chains reduced to their head.
    pub fn identifiers(&self) -> Vec<String> { self.root.identifiers() }

    pub fn has_dice(&self) -> bool { self.root.has_dice() }

    pub fn eval(&self, props: &mut EvalProps<'_>) -> Result<Value, ExprError> {
        eval::eval(&self.root, props)
    }

    pub fn describe(&self, bindings: &dyn Bindings, dice_only: bool) -> String {
        describe(&self.root, &DescProps { bindings, dice_only })
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}
