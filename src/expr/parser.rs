//! parser.rs
//! Precedence-climbing parser. Operators and calls are bound to their overload
//! while the tree is built, so a parsed expression is also a type-checked one.
//!
//! Precedence, lowest first: `||`, `&&`, `== !=`, `< <= > >=`, `+ -`, `* /`,
//! prefix `- !`, postfix `.field` and calls.

use super::error::ExprError;
use super::funcs;
use super::lexer::{tokenize, Spanned, Token};
use super::node::ParseNode;
use super::types::ExprType;
use crate::display::describe::{describe, DescProps};
use std::collections::HashMap;

/// Static types of the identifiers a formula may reference.
pub trait TypeEnv {
    fn type_of(&self, name: &str) -> Option<ExprType>;
}

impl TypeEnv for HashMap<String, ExprType> {
    fn type_of(&self, name: &str) -> Option<ExprType> { self.get(name).copied() }
}

/// Accepts every identifier as `Any`.
pub struct Untyped;

impl TypeEnv for Untyped {
    fn type_of(&self, _name: &str) -> Option<ExprType> { Some(ExprType::Any) }
}

pub fn parse(src: &str, env: &dyn TypeEnv) -> Result<ParseNode, ExprError> {
    let tokens = tokenize(src)?;
    let mut parser = Parser { src, tokens, pos: 0, env };
    if parser.tokens.is_empty() {
        return Err(parser.syntax("empty expression"));
    }
    let root = parser.parse_or()?;
    if let Some(extra) = parser.peek() {
        let message = format!("unexpected {:?} at offset {}", extra.token, extra.offset);
        return Err(parser.syntax(&message));
    }
    Ok(root)
}

struct Parser<'a> {
    src: &'a str,
    tokens: Vec<Spanned>,
    pos: usize,
    env: &'a dyn TypeEnv,
}

impl<'a> Parser<'a> {
    // --- Token cursor ---

    #[inline(always)]
    fn peek(&self) -> Option<&Spanned> { self.tokens.get(self.pos) }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek().is_some_and(|s| &s.token == token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token, what: &str) -> Result<(), ExprError> {
        if self.eat(&token) {
            Ok(())
        } else {
            Err(self.syntax(&format!("expected {}", what)))
        }
    }

    fn syntax(&self, message: &str) -> ExprError {
        ExprError::Syntax { text: self.src.to_string(), message: message.to_string() }
    }

    // --- Binary levels ---

    fn binary_level(
        &mut self,
        ops: &[(Token, &'static str)],
        operand: fn(&mut Self) -> Result<ParseNode, ExprError>,
    ) -> Result<ParseNode, ExprError> {
        let mut left = operand(self)?;
        'outer: loop {
            for (token, name) in ops {
                if self.eat(token) {
                    let right = operand(self)?;
                    left = self.bind(name, vec![left, right], true)?;
                    continue 'outer;
                }
            }
            return Ok(left);
        }
    }

    fn parse_or(&mut self) -> Result<ParseNode, ExprError> {
        self.binary_level(&[(Token::OrOr, "||")], Self::parse_and)
    }

    fn parse_and(&mut self) -> Result<ParseNode, ExprError> {
        self.binary_level(&[(Token::AndAnd, "&&")], Self::parse_equality)
    }

    fn parse_equality(&mut self) -> Result<ParseNode, ExprError> {
        self.binary_level(&[(Token::EqEq, "=="), (Token::NotEq, "!=")], Self::parse_comparison)
    }

    fn parse_comparison(&mut self) -> Result<ParseNode, ExprError> {
        self.binary_level(
            &[(Token::Lt, "<"), (Token::Le, "<="), (Token::Gt, ">"), (Token::Ge, ">=")],
            Self::parse_additive,
        )
    }

    fn parse_additive(&mut self) -> Result<ParseNode, ExprError> {
        self.binary_level(&[(Token::Plus, "+"), (Token::Minus, "-")], Self::parse_multiplicative)
    }

    fn parse_multiplicative(&mut self) -> Result<ParseNode, ExprError> {
        self.binary_level(&[(Token::Star, "*"), (Token::Slash, "/")], Self::parse_unary)
    }

    // --- Prefix, postfix, primary ---

    fn parse_unary(&mut self) -> Result<ParseNode, ExprError> {
        if self.eat(&Token::Minus) {
            let arg = self.parse_unary()?;
            return self.bind("-", vec![arg], true);
        }
        if self.eat(&Token::Bang) {
            let arg = self.parse_unary()?;
            return self.bind("!", vec![arg], true);
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<ParseNode, ExprError> {
        let mut node = self.parse_primary()?;
        while self.eat(&Token::Dot) {
            match self.next() {
                Some(Token::Ident(field)) => node = ParseNode::Member { object: Box::new(node), field },
                _ => return Err(self.syntax("expected a field name after '.'")),
            }
        }
        Ok(node)
    }

    fn parse_primary(&mut self) -> Result<ParseNode, ExprError> {
        match self.next() {
            Some(Token::Number(n)) => Ok(ParseNode::Number(n)),
            Some(Token::Text(s)) => Ok(ParseNode::Text(s)),
            Some(Token::True) => Ok(ParseNode::Bool(true)),
            Some(Token::False) => Ok(ParseNode::Bool(false)),
            Some(Token::Dice { count, sides }) => Ok(ParseNode::Dice { count, sides }),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => {
                if self.eat(&Token::LParen) {
                    let args = self.parse_args()?;
                    return self.bind(&name, args, false);
                }
                match self.env.type_of(&name) {
                    Some(ty) => Ok(ParseNode::Identifier { name, ty }),
                    None => Err(ExprError::UnknownIdentifier(name)),
                }
            }
            Some(other) => Err(self.syntax(&format!("unexpected {:?}", other))),
            None => Err(self.syntax("unexpected end of expression")),
        }
    }

    fn parse_args(&mut self) -> Result<Vec<ParseNode>, ExprError> {
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_or()?);
            if self.eat(&Token::RParen) {
                return Ok(args);
            }
            self.expect(Token::Comma, "',' or ')'")?;
        }
    }

    // --- Overload binding ---

    fn bind(&self, name: &str, args: Vec<ParseNode>, op: bool) -> Result<ParseNode, ExprError> {
        if !op && !funcs::is_known(name) {
            return Err(ExprError::UnknownFunction(name.to_string()));
        }
        let types: Vec<ExprType> = args.iter().map(ParseNode::ty).collect();
        match funcs::find(name, &types) {
            Some(func) => Ok(ParseNode::Func { func, args }),
            None => Err(no_overload(name, &args, op)),
        }
    }
}

/// Names the offending expression the way it would be described.
fn no_overload(name: &str, args: &[ParseNode], op: bool) -> ExprError {
    let props = DescProps::symbolic();
    let descs: Vec<String> = args.iter().map(|a| describe(a, &props)).collect();
    let text = match (op, descs.as_slice()) {
        (true, [only]) => format!("{}{}", name, only),
        (true, [left, right]) => format!("{} {} {}", left, name, right),
        _ => format!("{}({})", name, descs.join(", ")),
    };
    ExprError::NoOverload(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, ExprType)]) -> HashMap<String, ExprType> {
        pairs.iter().map(|(k, t)| (k.to_string(), *t)).collect()
    }

    #[test]
    fn test_reference_expression_shape() {
        let root = parse("(dexMod + ((1d8 +  2) -deity.adjustment / piety)) + \" and roll 2d8\"", &Untyped).unwrap();
        let ParseNode::Func { func, args } = &root else { panic!("expected a call") };
        assert_eq!(func.name, "+");
        assert_eq!(func.returns, ExprType::Text);
        assert_eq!(args[1], ParseNode::Text(" and roll 2d8".into()));

        let ParseNode::Func { func: inner, args: inner_args } = &args[0] else { panic!("expected a call") };
        assert_eq!(inner.returns, ExprType::Number);
        assert_eq!(inner_args[0], ParseNode::Identifier { name: "dexMod".into(), ty: ExprType::Any });

        let ParseNode::Func { func: minus, args: minus_args } = &inner_args[1] else { panic!("expected a call") };
        assert_eq!(minus.name, "-");
        let ParseNode::Func { func: div, args: div_args } = &minus_args[1] else { panic!("expected a call") };
        assert_eq!(div.name, "/");
        assert!(matches!(&div_args[0], ParseNode::Member { field, .. } if field == "adjustment"));
    }

    #[test]
    fn test_precedence() {
        let root = parse("1 + 2 * 3 < 10 && !false", &Untyped).unwrap();
        let ParseNode::Func { func, args } = &root else { panic!("expected a call") };
        assert_eq!(func.name, "&&");
        let ParseNode::Func { func: lt, .. } = &args[0] else { panic!("expected a call") };
        assert_eq!(lt.name, "<");
    }

    #[test]
    fn test_identifiers_use_member_heads() {
        let root = parse("sum(inventory.weight) + weight + inventory.count", &Untyped).unwrap();
        assert_eq!(root.identifiers(), vec!["inventory".to_string(), "weight".to_string()]);
    }

    #[test]
    fn test_typed_identifiers() {
        let types = env(&[("dexterity", ExprType::Number), ("name", ExprType::Text)]);
        let root = parse("floor((dexterity - 10) / 2)", &types).unwrap();
        assert_eq!(root.ty(), ExprType::Number);

        assert_eq!(parse("strength + 1", &types), Err(ExprError::UnknownIdentifier("strength".into())));
        assert_eq!(parse("name - 1", &types), Err(ExprError::NoOverload("name - 1".into())));
    }

    #[test]
    fn test_function_errors() {
        assert_eq!(parse("frobnicate(1)", &Untyped), Err(ExprError::UnknownFunction("frobnicate".into())));
        assert_eq!(parse("floor(1, 2)", &Untyped), Err(ExprError::NoOverload("floor(1, 2)".into())));
        assert!(matches!(parse("floor(1", &Untyped), Err(ExprError::Syntax { .. })));
        assert!(matches!(parse("1 2", &Untyped), Err(ExprError::Syntax { .. })));
        assert!(matches!(parse("", &Untyped), Err(ExprError::Syntax { .. })));
    }
}
