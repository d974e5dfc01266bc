//! The per-attribute rules applied while a template is built.
use super::AttrDef;
use crate::error::RulebookError;
use crate::expr::{ExprType, Expression, TypeEnv};
use crate::graph::NodeId;
use crate::schema::AttrSchema;

/// Validates one attribute declaration against its template.
pub(crate) struct AttrChecker<'a> {
    pub template: &'a str,
    pub env: &'a dyn TypeEnv,
    pub known_templates: &'a dyn Fn(&str) -> bool,
}

impl<'a> AttrChecker<'a> {
    fn malformed(&self, name: &str, what: &str) -> RulebookError {
        RulebookError::MalformedSchema(format!("Attribute \"{}.{}\" {}", self.template, name, what))
    }

    pub fn check(&self, name: &str, schema: &AttrSchema, node: NodeId) -> Result<AttrDef, RulebookError> {
        // --- PHASE 1: STRUCTURE ---
        let ty = schema.ty.ok_or_else(|| self.malformed(name, "has no type"))?;
        if schema.calc.is_some() {
            if schema.valid.is_some() {
                return Err(self.malformed(name, "has both \"calc\" and \"valid\" set"));
            }
            if schema.mutable == Some(true) {
                return Err(self.malformed(name, "has \"calc\" set but is mutable"));
            }
            if schema.reverse.is_some() {
                return Err(self.malformed(name, "has \"calc\" set but declares a reverse attribute"));
            }
        }

        let entity_types = schema.entity_types.clone().unwrap_or_default();
        if ty.is_entity() {
            if entity_types.is_empty() {
                return Err(self.malformed(name, &format!("is type {} but does not specify entityTypes", ty)));
            }
            if let Some(unknown) = entity_types.iter().find(|t| !(self.known_templates)(t.as_str())) {
                return Err(self.malformed(name, &format!("contains unknown entityType \"{}\"", unknown)));
            }
        } else if !entity_types.is_empty() || schema.reverse.is_some() {
            return Err(self.malformed(name, &format!("is type {} but declares entity links", ty)));
        }

        // --- PHASE 2: FORMULAS ---
        let calc = match &schema.calc {
            Some(src) => {
                let expr = Expression::parse(src, self.env)
                    .map_err(|e| RulebookError::expression(format!("{}.{} calc", self.template, name), e))?;
                if !ty.accepts(expr.ty()) {
                    return Err(RulebookError::AttributeType(format!(
                        "Attribute \"{}.{}\" has \"calc\" formula returning wrong type (expected {}, got {})",
                        self.template,
                        name,
                        ty,
                        expr.ty()
                    )));
                }
                Some(expr)
            }
            None => None,
        };

        let valid = match &schema.valid {
            Some(src) => {
                let expr = Expression::parse(src, self.env)
                    .map_err(|e| RulebookError::expression(format!("{}.{} valid", self.template, name), e))?;
                if !ExprType::TrueFalse.accepts(expr.ty()) {
                    return Err(RulebookError::AttributeType(format!(
                        "Attribute \"{}.{}\" has \"valid\" formula returning {} instead of true-false",
                        self.template,
                        name,
                        expr.ty()
                    )));
                }
                Some(expr)
            }
            None => None,
        };

        // --- PHASE 3: RESULT ---
        let mutable = calc.is_none() && schema.mutable != Some(false);
        Ok(AttrDef {
            name: name.to_string(),
            ty,
            calc,
            valid,
            mutable,
            entity_types,
            reverse: schema.reverse.clone(),
            node,
        })
    }
}
