//! node.rs
//! The resolved expression tree. Every operator and call has already been bound
//! to an overload, so the static type of any node is known without a lookup.

use super::funcs::ExprFunc;
use super::types::ExprType;

#[derive(Debug, Clone, PartialEq)]
pub enum ParseNode {
    Number(f64),
    Text(String),
    Bool(bool),
    Dice { count: u32, sides: u32 },
    Identifier { name: String, ty: ExprType },
    /// `object.field`; over a list the field is projected element-wise.
    Member { object: Box<ParseNode>, field: String },
    Func { func: &'static ExprFunc, args: Vec<ParseNode> },
}

impl ParseNode {
    pub fn ty(&self) -> ExprType {
        match self {
            ParseNode::Number(_) | ParseNode::Dice { .. } => ExprType::Number,
            ParseNode::Text(_) => ExprType::Text,
            ParseNode::Bool(_) => ExprType::TrueFalse,
            ParseNode::Identifier { ty, .. } => *ty,
            // Cross-entity fields are not resolved statically.
            ParseNode::Member { .. } => ExprType::Any,
            ParseNode::Func { func, .. } => func.returns,
        }
    }

    /// Head identifiers referenced anywhere in the tree, first occurrence order.
    pub fn identifiers(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_identifiers(&mut out);
        out
    }

    fn collect_identifiers(&self, out: &mut Vec<String>) {
        match self {
            ParseNode::Identifier { name, .. } => {
                if !out.iter().any(|n| n == name) {
                    out.push(name.clone());
                }
            }
            ParseNode::Member { object, .. } => object.collect_identifiers(out),
            ParseNode::Func { args, .. } => args.iter().for_each(|a| a.collect_identifiers(out)),
            _ => {}
        }
    }

    pub fn has_dice(&self) -> bool {
        match self {
            ParseNode::Dice { .. } => true,
            ParseNode::Member { object, .. } => object.has_dice(),
            ParseNode::Func { args, .. } => args.iter().any(ParseNode::has_dice),
            _ => false,
        }
    }
}
