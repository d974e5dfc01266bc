//! value.rs
//! The runtime value stored in every attribute cell and produced by formulas.

use crate::expr::ExprType;
use crate::store::EntityId;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Bool(bool),
    /// `None` is the empty reference.
    Entity(Option<EntityId>),

    NumberList(Vec<f64>),
    TextList(Vec<String>),
    BoolList(Vec<bool>),
    /// Logically a set: no duplicates, insertion order kept.
    EntityList(Vec<EntityId>),
}

impl Value {
    /// The type-appropriate zero: 0, "", false, the empty reference, an empty list.
    pub fn zero(ty: ExprType) -> Self {
        match ty {
            ExprType::Number | ExprType::Any => Value::Number(0.0),
            ExprType::Text => Value::Text(String::new()),
            ExprType::TrueFalse => Value::Bool(false),
            ExprType::Entity => Value::Entity(None),
            ExprType::NumberList => Value::NumberList(Vec::new()),
            ExprType::TextList => Value::TextList(Vec::new()),
            ExprType::TrueFalseList => Value::BoolList(Vec::new()),
            ExprType::EntityList => Value::EntityList(Vec::new()),
        }
    }

    pub fn type_of(&self) -> ExprType {
        match self {
            Value::Number(_) => ExprType::Number,
            Value::Text(_) => ExprType::Text,
            Value::Bool(_) => ExprType::TrueFalse,
            Value::Entity(_) => ExprType::Entity,
            Value::NumberList(_) => ExprType::NumberList,
            Value::TextList(_) => ExprType::TextList,
            Value::BoolList(_) => ExprType::TrueFalseList,
            Value::EntityList(_) => ExprType::EntityList,
        }
    }

    pub fn is_list(&self) -> bool { self.type_of().is_list() }

    /// Cell equality: like `==`, except NaN equals NaN.
    pub fn same(&self, other: &Value) -> bool {
        fn num(a: f64, b: f64) -> bool { a == b || (a.is_nan() && b.is_nan()) }
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => num(*a, *b),
            (Value::NumberList(a), Value::NumberList(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| num(*x, *y))
            }
            _ => self == other,
        }
    }

    pub fn list_len(&self) -> Option<usize> {
        match self {
            Value::NumberList(v) => Some(v.len()),
            Value::TextList(v) => Some(v.len()),
            Value::BoolList(v) => Some(v.len()),
            Value::EntityList(v) => Some(v.len()),
            _ => None,
        }
    }

    /// Every entity this value refers to, in order.
    pub fn entities(&self) -> Vec<EntityId> {
        match self {
            Value::Entity(Some(id)) => vec![*id],
            Value::EntityList(ids) => ids.clone(),
            _ => Vec::new(),
        }
    }

    /// Splits a list into its scalar elements; a scalar yields itself.
    pub fn elements(&self) -> Vec<Value> {
        match self {
            Value::NumberList(v) => v.iter().map(|n| Value::Number(*n)).collect(),
            Value::TextList(v) => v.iter().map(|s| Value::Text(s.clone())).collect(),
            Value::BoolList(v) => v.iter().map(|b| Value::Bool(*b)).collect(),
            Value::EntityList(v) => v.iter().map(|id| Value::Entity(Some(*id))).collect(),
            scalar => vec![scalar.clone()],
        }
    }

    /// Builds a list from already-coerced scalars of `element` type.
    pub(crate) fn list_of(element: ExprType, items: Vec<Value>) -> Value {
        match element {
            ExprType::Text => Value::TextList(items.into_iter().filter_map(|v| v.as_text().map(str::to_string)).collect()),
            ExprType::TrueFalse => Value::BoolList(items.into_iter().filter_map(|v| v.as_bool()).collect()),
            ExprType::Entity => {
                let mut ids: Vec<EntityId> = Vec::with_capacity(items.len());
                for id in items.into_iter().filter_map(|v| v.as_entity()) {
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                }
                Value::EntityList(ids)
            }
            _ => Value::NumberList(items.into_iter().filter_map(|v| v.as_number()).collect()),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self { Value::Number(n) => Some(*n), _ => None }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self { Value::Text(s) => Some(s), _ => None }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self { Value::Bool(b) => Some(*b), _ => None }
    }

    pub fn as_entity(&self) -> Option<EntityId> {
        match self { Value::Entity(id) => *id, _ => None }
    }

    /// Converts raw JSON input. Objects and nulls inside arrays are rejected;
    /// a top-level `null` is the empty entity reference.
    pub fn from_json(json: &serde_json::Value) -> Result<Value, String> {
        use serde_json::Value as Json;
        match json {
            Json::Null => Ok(Value::Entity(None)),
            Json::Bool(b) => Ok(Value::Bool(*b)),
            Json::Number(n) => n.as_f64().map(Value::Number).ok_or_else(|| format!("unrepresentable number {}", n)),
            Json::String(s) => Ok(Value::Text(s.clone())),
            Json::Array(items) => {
                let values = items.iter().map(Value::from_json).collect::<Result<Vec<_>, _>>()?;
                match values.first().map(Value::type_of) {
                    None => Ok(Value::NumberList(Vec::new())),
                    Some(first) if values.iter().all(|v| v.type_of() == first && !v.is_list()) => {
                        Ok(Value::list_of(first, values))
                    }
                    _ => Err(format!("mixed or nested array {}", json)),
                }
            }
            Json::Object(_) => Err(format!("objects are not attribute values: {}", json)),
        }
    }

    /// Literal rendering used by `describe`: text is quoted, everything else
    /// prints as `Display` does.
    pub fn literal(&self) -> String {
        match self {
            Value::Text(s) => serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s)),
            Value::TextList(items) => {
                let parts: Vec<String> = items.iter().map(|s| Value::Text(s.clone()).literal()).collect();
                format!("[{}]", parts.join(", "))
            }
            other => other.to_string(),
        }
    }
}

/// Shortest round-trip formatting: `17`, `14.7`, `-0.5`.
pub(crate) fn format_number(n: f64) -> String {
    format!("{}", n)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join<T, F: Fn(&T) -> String>(items: &[T], render: F) -> String {
            items.iter().map(render).collect::<Vec<_>>().join(", ")
        }
        match self {
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::Text(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Entity(Some(id)) => write!(f, "{}", id),
            Value::Entity(None) => f.write_str("null"),
            Value::NumberList(v) => write!(f, "[{}]", join(v, |n| format_number(*n))),
            Value::TextList(v) => write!(f, "[{}]", join(v, |s| s.clone())),
            Value::BoolList(v) => write!(f, "[{}]", join(v, |b| b.to_string())),
            Value::EntityList(v) => write!(f, "[{}]", join(v, |id| id.to_string())),
        }
    }
}

// --- Conversions for caller-supplied input ---

impl From<f64> for Value {
    fn from(n: f64) -> Self { Value::Number(n) }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self { Value::Number(n as f64) }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self { Value::Bool(b) }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self { Value::Text(s.to_string()) }
}

impl From<String> for Value {
    fn from(s: String) -> Self { Value::Text(s) }
}

impl From<EntityId> for Value {
    fn from(id: EntityId) -> Self { Value::Entity(Some(id)) }
}

impl From<Option<EntityId>> for Value {
    fn from(id: Option<EntityId>) -> Self { Value::Entity(id) }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self { Value::NumberList(v) }
}

impl From<Vec<EntityId>> for Value {
    fn from(v: Vec<EntityId>) -> Self { Value::EntityList(v) }
}

impl From<Vec<&str>> for Value {
    fn from(v: Vec<&str>) -> Self { Value::TextList(v.into_iter().map(str::to_string).collect()) }
}
