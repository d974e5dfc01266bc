//! resolve.rs
//! Turns raw template declarations into flat, self-contained ones.
//!
//! 1. Check include names.
//! 2. Synthesize reverse attributes on link targets.
//! 3. Order templates by their includes (cycle-checked).
//! 4. Merge included attributes, leaves first; includes become transitive.
//! 5. Verify every reverse pairing on the merged result.

use super::types::{AttrSchema, Schema, TemplateSchema};
use crate::error::RulebookError;
use crate::expr::ExprType;
use crate::graph::{DependGraph, DependencyGraph};
use indexmap::IndexMap;
use log::debug;

pub fn resolve(schema: &Schema) -> Result<Schema, RulebookError> {
    check_includes(schema)?;
    let mut schema = schema.clone();
    synthesize_reverses(&mut schema)?;
    let order = include_order(&schema)?;
    let merged = merge_includes(schema, &order);
    check_reverses(&merged)?;
    debug!("resolved {} templates", merged.len());
    Ok(merged)
}

fn malformed(message: String) -> RulebookError {
    RulebookError::MalformedSchema(message)
}

fn check_includes(schema: &Schema) -> Result<(), RulebookError> {
    for (name, template) in schema {
        if let Some(missing) = template.includes.iter().find(|inc| !schema.contains_key(*inc)) {
            return Err(malformed(format!("Template \"{}\" includes unknown template \"{}\"", name, missing)));
        }
    }
    Ok(())
}

// --- Reverse synthesis ---

/// Declares the back-reference of every `reverse` link on its target templates,
/// or checks that an existing declaration agrees with it.
fn synthesize_reverses(schema: &mut Schema) -> Result<(), RulebookError> {
    let mut pending: Vec<(String, String, String, AttrSchema)> = Vec::new();

    for (owner, template) in schema.iter() {
        for (forward, attr) in &template.attrs {
            let Some(reverse) = &attr.reverse else { continue };
            for target in attr.entity_types.iter().flatten() {
                if !schema.contains_key(target) {
                    return Err(malformed(format!(
                        "Attribute \"{}.{}\" links to unknown template \"{}\"",
                        owner, forward, target
                    )));
                }
                let back = AttrSchema {
                    ty: Some(attr.reverse_type.unwrap_or(ExprType::Entity)),
                    entity_types: Some(attr.reverse_entity_types.clone().unwrap_or_else(|| vec![owner.clone()])),
                    reverse: Some(forward.clone()),
                    ..AttrSchema::default()
                };
                pending.push((target.clone(), reverse.clone(), owner.clone(), back));
            }
        }
    }

    for (target, reverse, owner, back) in pending {
        let Some(template) = schema.get_mut(&target) else { continue };
        match template.attrs.get_mut(&reverse) {
            None => {
                debug!("synthesized reverse attribute {}.{}", target, reverse);
                template.attrs.insert(reverse, back);
            }
            Some(existing) => agree(existing, &back, &target, &reverse, &owner)?,
        }
    }
    Ok(())
}

fn agree(existing: &mut AttrSchema, back: &AttrSchema, target: &str, name: &str, owner: &str) -> Result<(), RulebookError> {
    if let Some(ty) = existing.ty {
        if !ty.is_entity() {
            return Err(malformed(format!(
                "Reverse attribute \"{}.{}\" must be an entity type, found {}",
                target, name, ty
            )));
        }
    }
    match (&existing.reverse, &back.reverse) {
        (Some(declared), Some(expected)) if declared != expected => {
            return Err(malformed(format!(
                "Reverse attribute \"{}.{}\" points back to \"{}\", but \"{}.{}\" expects it",
                target, name, declared, owner, expected
            )));
        }
        (None, expected) => existing.reverse = expected.clone(),
        _ => {}
    }
    if existing.ty.is_none() {
        existing.ty = back.ty;
    }
    let targets = existing.entity_types.get_or_insert_with(Vec::new);
    for t in back.entity_types.iter().flatten() {
        if !targets.contains(t) {
            targets.push(t.clone());
        }
    }
    Ok(())
}

// --- Includes ---

/// Template names, included templates before their includers.
fn include_order(schema: &Schema) -> Result<Vec<String>, RulebookError> {
    let mut graph: DependGraph<String> = DependGraph::new();
    let ids: IndexMap<&str, _> = schema.keys().map(|name| (name.as_str(), graph.add_node(name.clone()))).collect();

    for (name, template) in schema {
        for inc in &template.includes {
            graph.add_edge(ids[name.as_str()], ids[inc.as_str()])?;
        }
    }

    if let Some(cycle) = graph.find_cycle() {
        let chain = cycle.iter().filter_map(|id| graph.weight(*id).cloned()).collect();
        return Err(RulebookError::CircularDependency { chain });
    }
    let order = graph.topological_order()?;
    Ok(order.into_iter().filter_map(|id| graph.weight(id).cloned()).collect())
}

fn merge_includes(mut schema: Schema, order: &[String]) -> Schema {
    for name in order {
        let Some(own) = schema.get(name) else { continue };
        if own.includes.is_empty() {
            continue;
        }
        let mut merged = own.clone();
        for inc in &own.includes {
            // Leaves-first order guarantees `inc` is already flat.
            let Some(base) = schema.get(inc) else { continue };
            for sub in &base.includes {
                if !merged.includes.contains(sub) {
                    merged.includes.push(sub.clone());
                }
            }
            for (attr_name, base_attr) in &base.attrs {
                match merged.attrs.get_mut(attr_name) {
                    Some(attr) => attr.inherit(base_attr),
                    None => {
                        merged.attrs.insert(attr_name.clone(), base_attr.clone());
                    }
                }
            }
        }
        schema.insert(name.clone(), merged);
    }
    schema
}

// --- Post-merge checks ---

fn is_a(schema: &Schema, template: &str, targets: &[String]) -> bool {
    targets.iter().any(|t| t == template)
        || schema.get(template).is_some_and(|s| s.includes.iter().any(|inc| targets.contains(inc)))
}

fn check_reverses(schema: &Schema) -> Result<(), RulebookError> {
    for (owner, template) in schema {
        for (forward, attr) in &template.attrs {
            let Some(reverse) = &attr.reverse else { continue };
            let targets = attr.entity_types.as_deref().unwrap_or_default();

            for (candidate, candidate_schema) in schema.iter().filter(|(name, _)| is_a(schema, name, targets)) {
                let back = reverse_of(candidate_schema, reverse).ok_or_else(|| {
                    malformed(format!(
                        "Template \"{}\" is a target of \"{}.{}\" but has no reverse attribute \"{}\"",
                        candidate, owner, forward, reverse
                    ))
                })?;
                if back.reverse.as_deref() != Some(forward.as_str()) {
                    return Err(malformed(format!(
                        "\"{}.{}\" does not point back to \"{}.{}\"",
                        candidate, reverse, owner, forward
                    )));
                }
                if back.calc.is_some() || !back.ty.is_some_and(|t| t.is_entity()) {
                    return Err(malformed(format!(
                        "Reverse attribute \"{}.{}\" must be a stored entity attribute",
                        candidate, reverse
                    )));
                }
                if !is_a(schema, owner, back.entity_types.as_deref().unwrap_or_default()) {
                    return Err(malformed(format!(
                        "\"{}.{}\" does not accept \"{}\" entities",
                        candidate, reverse, owner
                    )));
                }
            }
        }
    }
    Ok(())
}

fn reverse_of<'a>(template: &'a TemplateSchema, name: &str) -> Option<&'a AttrSchema> {
    template.attrs.get(name)
}
