//! Live entity instances: one cell per template attribute plus a private copy
//! of the template's dependency edges.
mod scope;

pub use scope::Scope;

use crate::graph::DependGraph;
use crate::store::EntityId;
use crate::template::Template;
use crate::value::Value;
use indexmap::IndexSet;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub(crate) value: Value,
    /// Set while an assignment to this cell is cascading; writes are ignored.
    pub(crate) frozen: bool,
}

impl Cell {
    #[inline(always)]
    pub fn value(&self) -> &Value { &self.value }
    #[inline(always)]
    pub fn is_frozen(&self) -> bool { self.frozen }
}

#[derive(Debug, Clone)]
pub struct Entity {
    id: EntityId,
    template: Arc<Template>,
    cells: Vec<Cell>,
    graph: DependGraph<usize>,
    /// Changed during the current cascade and not yet revisited.
    pub(crate) dirty: bool,
}

impl Entity {
    /// Allocates zeroed cells; values are filled in by the engine in template order.
    pub(crate) fn new(id: EntityId, template: Arc<Template>) -> Self {
        let cells = template
            .attrs()
            .iter()
            .map(|attr| Cell { value: Value::zero(attr.ty), frozen: false })
            .collect();
        let graph = template.graph().clone();
        Self { id, template, cells, graph, dirty: false }
    }

    #[inline(always)]
    pub fn id(&self) -> EntityId { self.id }
    pub fn template(&self) -> &Arc<Template> { &self.template }
    pub fn template_name(&self) -> &str { self.template.name() }
    pub fn is(&self, name: &str) -> bool { self.template.is(name) }
    pub fn is_dirty(&self) -> bool { self.dirty }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.template.attr_index(name).map(|i| &self.cells[i].value)
    }

    #[inline(always)]
    pub fn value_at(&self, attr: usize) -> &Value { &self.cells[attr].value }

    pub fn cells(&self) -> &[Cell] { &self.cells }

    /// Attribute names and values in declaration order.
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.template.attrs().iter().zip(&self.cells).map(|(a, c)| (a.name.as_str(), &c.value))
    }

    pub(crate) fn store(&mut self, attr: usize, value: Value) -> Value {
        std::mem::replace(&mut self.cells[attr].value, value)
    }

    pub(crate) fn set_frozen(&mut self, attr: usize, frozen: bool) {
        self.cells[attr].frozen = frozen;
    }

    /// Every entity linked through this entity's entity-typed cells.
    pub fn neighbors(&self) -> IndexSet<EntityId> {
        let mut out = IndexSet::new();
        for (attr, cell) in self.template.attrs().iter().zip(&self.cells) {
            if attr.ty.is_entity() {
                out.extend(cell.value.entities().into_iter().filter(|id| *id != self.id));
            }
        }
        out
    }

    /// Calculated attributes that read `attr`, directly or not, in evaluation order.
    pub fn downstream(&self, attr: usize) -> Vec<usize> {
        let start = self.template.attrs()[attr].node;
        let mut reached: IndexSet<usize> = IndexSet::new();
        let mut queue = VecDeque::from([start]);
        while let Some(node) = queue.pop_front() {
            for dependent in self.graph.depended_by(node) {
                if let Some(&i) = self.graph.weight(dependent) {
                    if reached.insert(i) {
                        queue.push_back(dependent);
                    }
                }
            }
        }
        self.template.eval_order().iter().copied().filter(|i| reached.contains(i)).collect()
    }
}
