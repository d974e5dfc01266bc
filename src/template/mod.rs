//! The Template Model: one built, immutable template per entity type.
//!
//! Building a template parses and type-checks every formula, wires one
//! dependency edge per referenced attribute, proves the graph acyclic and
//! caches its evaluation order. Entities reuse that order as-is.

mod checker;

use crate::error::RulebookError;
use crate::expr::{ExprType, Expression};
use crate::graph::{DependGraph, DependencyGraph, NodeId};
use crate::schema::TemplateSchema;
use checker::AttrChecker;
use indexmap::IndexSet;
use log::debug;
use std::collections::HashMap;

/// One declared attribute after checking.
#[derive(Debug, Clone)]
pub struct AttrDef {
    pub name: String,
    pub ty: ExprType,
    pub calc: Option<Expression>,
    pub valid: Option<Expression>,
    pub mutable: bool,
    /// Permitted target templates of an entity-typed attribute.
    pub entity_types: Vec<String>,
    /// Name of the paired attribute on the targets.
    pub reverse: Option<String>,
    pub(crate) node: NodeId,
}

impl AttrDef {
    #[inline(always)]
    pub fn is_calc(&self) -> bool { self.calc.is_some() }
}

#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    /// Transitive include markers.
    includes: IndexSet<String>,
    attrs: Vec<AttrDef>,
    index: HashMap<String, usize>,
    /// Node weights are indices into `attrs`.
    graph: DependGraph<usize>,
    order: Vec<usize>,
    /// Per attribute: its calc reads a linked entity, directly or through another calc.
    linked: Vec<bool>,
}

impl Template {
    /// Builds a template from a flat (include-resolved) schema.
    /// `known_templates` answers whether a link target name exists.
    pub fn build(
        name: &str,
        schema: &TemplateSchema,
        known_templates: &dyn Fn(&str) -> bool,
    ) -> Result<Self, RulebookError> {
        // 1. Static types of every attribute, so formulas can reference any of them.
        let mut env: HashMap<String, ExprType> = HashMap::with_capacity(schema.attrs.len());
        for (attr_name, attr) in &schema.attrs {
            let ty = attr.ty.ok_or_else(|| {
                RulebookError::MalformedSchema(format!("Attribute \"{}.{}\" has no type", name, attr_name))
            })?;
            env.insert(attr_name.clone(), ty);
        }

        // 2. One node per attribute, checked in declaration order.
        let checker = AttrChecker { template: name, env: &env, known_templates };
        let mut graph = DependGraph::new();
        let mut attrs = Vec::with_capacity(schema.attrs.len());
        let mut index = HashMap::with_capacity(schema.attrs.len());
        for (i, (attr_name, attr)) in schema.attrs.iter().enumerate() {
            let node = graph.add_node(i);
            attrs.push(checker.check(attr_name, attr, node)?);
            index.insert(attr_name.clone(), i);
        }

        // 3. Edges from each calc to the head identifiers it reads.
        for attr in &attrs {
            let Some(calc) = &attr.calc else { continue };
            for dep in calc.identifiers() {
                if let Some(&j) = index.get(&dep) {
                    graph.add_edge(attr.node, attrs[j].node)?;
                }
            }
        }

        // 4. Prove acyclic, freeze the order.
        if let Some(cycle) = graph.find_cycle() {
            let chain = cycle
                .iter()
                .filter_map(|id| graph.weight(*id))
                .map(|&i| format!("{}.{}", name, attrs[i].name))
                .collect();
            return Err(RulebookError::CircularDependency { chain });
        }
        let order = graph
            .topological_order()?
            .into_iter()
            .filter_map(|id| graph.weight(id).copied())
            .collect::<Vec<usize>>();

        // 5. Calcs that must be revisited when a linked entity changes.
        let mut linked = vec![false; attrs.len()];
        for &i in &order {
            if attrs[i].is_calc() {
                let reads = graph
                    .depends(attrs[i].node)
                    .filter_map(|n| graph.weight(n).copied())
                    .any(|j| attrs[j].ty.is_entity() || linked[j]);
                linked[i] = reads;
            }
        }

        debug!("built template \"{}\" ({} attributes, {} edges)", name, attrs.len(), graph.edge_count());
        Ok(Self {
            name: name.to_string(),
            includes: schema.includes.iter().cloned().collect(),
            attrs,
            index,
            graph,
            order,
            linked,
        })
    }

    #[inline(always)]
    pub fn name(&self) -> &str { &self.name }
    pub fn includes(&self) -> &IndexSet<String> { &self.includes }
    pub fn attrs(&self) -> &[AttrDef] { &self.attrs }
    pub fn attr(&self, name: &str) -> Option<&AttrDef> { self.index.get(name).map(|&i| &self.attrs[i]) }
    pub fn attr_index(&self, name: &str) -> Option<usize> { self.index.get(name).copied() }

    /// Attribute indices, dependencies before dependents.
    pub fn eval_order(&self) -> &[usize] { &self.order }

    pub(crate) fn graph(&self) -> &DependGraph<usize> { &self.graph }

    /// Whether the calc of `attr` can change when a linked entity does.
    #[inline(always)]
    pub fn reads_links(&self, attr: usize) -> bool { self.linked[attr] }

    /// Structural type test against a template or include name.
    pub fn is(&self, name: &str) -> bool {
        self.name == name || self.includes.contains(name)
    }

    /// Whether this template satisfies any of `targets`.
    pub fn is_any(&self, targets: &[String]) -> bool {
        targets.iter().any(|t| self.is(t))
    }

    /// Names the given attribute's calc reads, in the order the graph holds them.
    pub fn depends_of(&self, name: &str) -> Vec<&str> {
        let Some(attr) = self.attr(name) else { return Vec::new() };
        let mut deps: Vec<usize> = self.graph.depends(attr.node).filter_map(|n| self.graph.weight(n).copied()).collect();
        deps.sort_unstable();
        deps.into_iter().map(|i| self.attrs[i].name.as_str()).collect()
    }

    /// Names of the attributes whose calc reads `name`.
    pub fn depended_by_of(&self, name: &str) -> Vec<&str> {
        let Some(attr) = self.attr(name) else { return Vec::new() };
        let mut deps: Vec<usize> =
            self.graph.depended_by(attr.node).filter_map(|n| self.graph.weight(n).copied()).collect();
        deps.sort_unstable();
        deps.into_iter().map(|i| self.attrs[i].name.as_str()).collect()
    }
}
