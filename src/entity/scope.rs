//! The binding environment a formula sees when evaluated on an entity.
use super::Entity;
use crate::expr::Bindings;
use crate::store::{EntityId, Registry};
use crate::value::Value;

/// Identifiers resolve to the entity's own cells; member access reaches into
/// other live entities. One cell may be overridden with a candidate value.
pub struct Scope<'a> {
    entities: &'a Registry<Entity>,
    entity: &'a Entity,
    candidate: Option<(usize, &'a Value)>,
}

impl<'a> Scope<'a> {
    pub fn new(entities: &'a Registry<Entity>, entity: &'a Entity) -> Self {
        Self { entities, entity, candidate: None }
    }

    /// Binds `value` in place of the stored value of `attr`.
    pub fn with_candidate(mut self, attr: usize, value: &'a Value) -> Self {
        self.candidate = Some((attr, value));
        self
    }
}

impl Bindings for Scope<'_> {
    fn lookup(&self, name: &str) -> Option<Value> {
        let attr = self.entity.template().attr_index(name)?;
        match self.candidate {
            Some((i, value)) if i == attr => Some(value.clone()),
            _ => Some(self.entity.value_at(attr).clone()),
        }
    }

    fn member(&self, entity: EntityId, field: &str) -> Option<Value> {
        self.entities.get(entity)?.get(field).cloned()
    }
}
