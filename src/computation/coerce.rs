//! Validation and coercion of values stored into attribute cells.
use crate::entity::Entity;
use crate::error::RulebookError;
use crate::expr::ExprType;
use crate::store::Registry;
use crate::template::AttrDef;
use crate::value::{format_number, Value};

/// Coerces `raw` to the declared type of `attr`, all-or-nothing.
///
/// `owner` names the template for error messages.
pub fn coerce(raw: Value, owner: &str, attr: &AttrDef, entities: &Registry<Entity>) -> Result<Value, RulebookError> {
    let ty = attr.ty;
    if ty == ExprType::Any {
        return Ok(raw);
    }
    if !ty.is_list() {
        if raw.is_list() {
            return Err(mismatch(owner, attr, &raw));
        }
        return scalar(raw, ty, owner, attr, entities);
    }

    let element = ty.element();
    let items = match raw {
        Value::Entity(None) => Vec::new(),
        list if list.is_list() => list.elements(),
        scalar => vec![scalar],
    };
    let coerced = items
        .into_iter()
        .map(|item| scalar(item, element, owner, attr, entities))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::list_of(element, coerced))
}

fn scalar(raw: Value, ty: ExprType, owner: &str, attr: &AttrDef, entities: &Registry<Entity>) -> Result<Value, RulebookError> {
    match (ty, raw) {
        (ExprType::Number, Value::Number(n)) => Ok(Value::Number(n)),
        (ExprType::Number, Value::Text(s)) => match s.trim().parse::<f64>() {
            Ok(n) => Ok(Value::Number(n)),
            Err(_) => Err(mismatch(owner, attr, &Value::Text(s))),
        },

        (ExprType::Text, Value::Text(s)) => Ok(Value::Text(s)),
        (ExprType::Text, Value::Number(n)) => Ok(Value::Text(format_number(n))),
        (ExprType::Text, Value::Bool(b)) => Ok(Value::Text(b.to_string())),

        (ExprType::TrueFalse, Value::Bool(b)) => Ok(Value::Bool(b)),
        (ExprType::TrueFalse, Value::Text(s)) if s == "true" || s == "false" => Err(RulebookError::AttributeType(format!(
            "Attribute \"{}.{}\" is true-false; got the text \"{}\" (use the literal {} instead of a string)",
            owner, attr.name, s, s
        ))),

        (ExprType::Entity, Value::Entity(None)) => Ok(Value::Entity(None)),
        (ExprType::Entity, Value::Entity(Some(id))) => {
            let target = entities.get(id).ok_or_else(|| {
                RulebookError::AttributeType(format!(
                    "Attribute \"{}.{}\" was given entity {} which no longer exists",
                    owner, attr.name, id
                ))
            })?;
            if target.template().is_any(&attr.entity_types) {
                Ok(Value::Entity(Some(id)))
            } else {
                Err(RulebookError::AttributeType(format!(
                    "Attribute \"{}.{}\" accepts {}, not \"{}\"",
                    owner,
                    attr.name,
                    attr.entity_types.join(" or "),
                    target.template_name()
                )))
            }
        }

        (_, raw) => Err(mismatch(owner, attr, &raw)),
    }
}

fn mismatch(owner: &str, attr: &AttrDef, raw: &Value) -> RulebookError {
    RulebookError::AttributeType(format!(
        "Attribute \"{}.{}\" expects {}, got {} {}",
        owner,
        attr.name,
        attr.ty,
        raw.type_of(),
        raw.literal()
    ))
}
