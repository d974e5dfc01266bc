//! eval.rs
//! Evaluates a resolved tree against a binding environment.

use super::error::ExprError;
use super::node::ParseNode;
use super::types::ExprType;
use crate::store::EntityId;
use crate::value::Value;
use rand::{Rng, RngCore};
use serde::Deserialize;
use std::collections::HashMap;

/// Current values visible to a formula.
pub trait Bindings {
    fn lookup(&self, name: &str) -> Option<Value>;
    /// A field of a linked entity; `None` if the entity or the field is unknown.
    fn member(&self, entity: EntityId, field: &str) -> Option<Value>;
}

/// Binds nothing; every identifier stays symbolic when described.
pub struct NoBindings;

impl Bindings for NoBindings {
    fn lookup(&self, _name: &str) -> Option<Value> { None }
    fn member(&self, _entity: EntityId, _field: &str) -> Option<Value> { None }
}

/// Plain maps, used by tests and by one-off evaluations outside an entity.
#[derive(Debug, Default, Clone)]
pub struct MapBindings {
    pub vals: HashMap<String, Value>,
    pub entities: HashMap<EntityId, HashMap<String, Value>>,
}

impl MapBindings {
    pub fn new() -> Self { Self::default() }

    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.vals.insert(name.to_string(), value.into());
        self
    }

    pub fn with_field(mut self, entity: EntityId, field: &str, value: impl Into<Value>) -> Self {
        self.entities.entry(entity).or_default().insert(field.to_string(), value.into());
        self
    }
}

impl Bindings for MapBindings {
    fn lookup(&self, name: &str) -> Option<Value> { self.vals.get(name).cloned() }

    fn member(&self, entity: EntityId, field: &str) -> Option<Value> {
        self.entities.get(&entity).and_then(|fields| fields.get(field)).cloned()
    }
}

/// How dice literals are rolled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RollMode {
    #[default]
    Random,
    /// Every die shows 1.
    ForceMin,
    /// Every die shows its number of sides.
    ForceMax,
}

pub struct EvalProps<'a> {
    pub bindings: &'a dyn Bindings,
    pub mode: RollMode,
    pub rng: &'a mut dyn RngCore,
}

pub fn eval(node: &ParseNode, props: &mut EvalProps<'_>) -> Result<Value, ExprError> {
    match node {
        ParseNode::Number(n) => Ok(Value::Number(*n)),
        ParseNode::Text(s) => Ok(Value::Text(s.clone())),
        ParseNode::Bool(b) => Ok(Value::Bool(*b)),
        ParseNode::Dice { count, sides } => Ok(Value::Number(roll(*count, *sides, props))),
        ParseNode::Identifier { name, .. } => {
            props.bindings.lookup(name).ok_or_else(|| ExprError::UnknownIdentifier(name.clone()))
        }
        ParseNode::Member { object, field } => {
            let object = eval(object, props)?;
            project(&object, field, props.bindings)
        }
        ParseNode::Func { func, args } => {
            let values = args.iter().map(|a| eval(a, props)).collect::<Result<Vec<_>, _>>()?;
            func.apply(&values)
        }
    }
}

fn roll(count: u32, sides: u32, props: &mut EvalProps<'_>) -> f64 {
    match props.mode {
        RollMode::ForceMin => count as f64,
        RollMode::ForceMax => count as f64 * sides as f64,
        RollMode::Random => (0..count).map(|_| props.rng.random_range(1..=sides) as f64).sum(),
    }
}

/// `object.field`. A list of entities projects to the list of their fields,
/// flattening list-valued fields; the empty reference projects to itself.
pub(crate) fn project(object: &Value, field: &str, bindings: &dyn Bindings) -> Result<Value, ExprError> {
    let one = |id: EntityId| {
        bindings
            .member(id, field)
            .ok_or_else(|| ExprError::UnknownField { entity: id.to_string(), field: field.to_string() })
    };
    match object {
        Value::Entity(Some(id)) => one(*id),
        Value::Entity(None) => Ok(Value::Entity(None)),
        Value::EntityList(ids) => {
            let mut items = Vec::with_capacity(ids.len());
            for id in ids {
                items.extend(one(*id)?.elements());
            }
            let element = match items.first().map(Value::type_of) {
                Some(first) if items.iter().all(|v| v.type_of() == first) => first,
                Some(_) => return Err(ExprError::Eval(format!("field \"{}\" differs in type across the list", field))),
                None => ExprType::Number,
            };
            Ok(Value::list_of(element, items))
        }
        other => Err(ExprError::Eval(format!("{} \"{}\" has no field \"{}\"", other.type_of(), other, field))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parser::{parse, Untyped};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn run(src: &str, bindings: &MapBindings, mode: RollMode) -> Result<Value, ExprError> {
        let node = parse(src, &Untyped)?;
        let mut rng = StdRng::seed_from_u64(7);
        eval(&node, &mut EvalProps { bindings, mode, rng: &mut rng })
    }

    #[test]
    fn test_reference_expression_force_max() {
        let deity = EntityId::new(0, 0);
        let b = MapBindings::new()
            .with("dexMod", 5)
            .with("deity", deity)
            .with("piety", 10)
            .with_field(deity, "adjustment", 3);
        let out = run("(dexMod + ((1d8 +  2) -deity.adjustment / piety)) + \" and roll 2d8\"", &b, RollMode::ForceMax);
        assert_eq!(out, Ok(Value::from("14.7 and roll 2d8")));
    }

    #[test]
    fn test_dice_modes() {
        let b = MapBindings::new();
        assert_eq!(run("3d6", &b, RollMode::ForceMin), Ok(Value::Number(3.0)));
        assert_eq!(run("3d6", &b, RollMode::ForceMax), Ok(Value::Number(18.0)));
        for _ in 0..20 {
            let Ok(Value::Number(n)) = run("2d4", &b, RollMode::Random) else { panic!("expected a number") };
            assert!((2.0..=8.0).contains(&n));
        }
    }

    #[test]
    fn test_list_projection() {
        let (a, b, c) = (EntityId::new(0, 0), EntityId::new(1, 0), EntityId::new(2, 0));
        let env = MapBindings::new()
            .with("inventory", vec![a, b, c])
            .with_field(a, "weight", 3)
            .with_field(b, "weight", 5)
            .with_field(c, "weight", 7);
        assert_eq!(run("inventory.weight", &env, RollMode::Random), Ok(Value::NumberList(vec![3.0, 5.0, 7.0])));
        assert_eq!(run("sum(inventory.weight)", &env, RollMode::Random), Ok(Value::Number(15.0)));
        assert_eq!(run("count(inventory)", &env, RollMode::Random), Ok(Value::Number(3.0)));
    }

    #[test]
    fn test_empty_projection_sums_to_zero() {
        let env = MapBindings::new().with("inventory", Vec::<EntityId>::new());
        assert_eq!(run("sum(inventory.weight)", &env, RollMode::Random), Ok(Value::Number(0.0)));
    }

    #[test]
    fn test_null_reference_member() {
        let env = MapBindings::new().with("owner", None::<EntityId>);
        assert_eq!(run("owner.weight", &env, RollMode::Random), Ok(Value::Entity(None)));
        assert_eq!(run("owner.weight + 1", &env, RollMode::Random), Ok(Value::Number(1.0)));
    }

    #[test]
    fn test_logic_and_comparison() {
        let env = MapBindings::new().with("hp", 7);
        assert_eq!(run("hp >= 0 && hp <= 10", &env, RollMode::Random), Ok(Value::Bool(true)));
        assert_eq!(run("!(hp == 7) || hp > 100", &env, RollMode::Random), Ok(Value::Bool(false)));
        assert_eq!(run("text(hp) + \"hp\"", &env, RollMode::Random), Ok(Value::from("7hp")));
    }

    #[test]
    fn test_unknown_binding() {
        let env = MapBindings::new();
        assert_eq!(run("missing + 1", &env, RollMode::Random), Err(ExprError::UnknownIdentifier("missing".into())));
    }
}
