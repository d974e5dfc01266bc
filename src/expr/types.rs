//! Static result types of expression nodes and attribute declarations.
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExprType {
    #[serde(rename = "number")]
    Number,
    #[serde(rename = "text")]
    Text,
    #[serde(rename = "true-false")]
    TrueFalse,
    #[serde(rename = "entity")]
    Entity,

    #[serde(rename = "number list")]
    NumberList,
    #[serde(rename = "text list")]
    TextList,
    #[serde(rename = "true-false list")]
    TrueFalseList,
    #[serde(rename = "entity list")]
    EntityList,

    /// Unresolved at build time; matches anything.
    #[serde(rename = "any")]
    Any,
}

impl ExprType {
    pub fn name(&self) -> &'static str {
        match self {
            ExprType::Number => "number",
            ExprType::Text => "text",
            ExprType::TrueFalse => "true-false",
            ExprType::Entity => "entity",
            ExprType::NumberList => "number list",
            ExprType::TextList => "text list",
            ExprType::TrueFalseList => "true-false list",
            ExprType::EntityList => "entity list",
            ExprType::Any => "any",
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, ExprType::NumberList | ExprType::TextList | ExprType::TrueFalseList | ExprType::EntityList)
    }

    pub fn is_entity(&self) -> bool {
        matches!(self, ExprType::Entity | ExprType::EntityList)
    }

    /// The scalar type of a list's elements; scalars return themselves.
    pub fn element(&self) -> ExprType {
        match self {
            ExprType::NumberList => ExprType::Number,
            ExprType::TextList => ExprType::Text,
            ExprType::TrueFalseList => ExprType::TrueFalse,
            ExprType::EntityList => ExprType::Entity,
            other => *other,
        }
    }

    /// True when a value of static type `actual` may be stored where `self` is declared.
    pub fn accepts(&self, actual: ExprType) -> bool {
        *self == ExprType::Any || actual == ExprType::Any || *self == actual
    }
}

impl fmt::Display for ExprType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
