//! ledger.rs
//! Undo journal for one public mutation. Every cell write and every created
//! entity is recorded so a failed call can put the world back as it was.

use crate::entity::Entity;
use crate::store::{EntityId, Registry};
use crate::value::Value;
use indexmap::IndexSet;

#[derive(Debug, Clone, PartialEq)]
enum Entry {
    Cell { entity: EntityId, attr: usize, old: Value },
    Created(EntityId),
}

#[derive(Debug, Default)]
pub struct Ledger {
    entries: Vec<Entry>,
    touched: IndexSet<EntityId>,
}

impl Ledger {
    pub fn new() -> Self { Self::default() }

    #[inline(always)]
    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Cells written so far, oldest first. A cell written twice appears twice.
    pub fn writes(&self) -> impl Iterator<Item = (EntityId, usize)> + '_ {
        self.entries.iter().filter_map(|entry| match entry {
            Entry::Cell { entity, attr, .. } => Some((*entity, *attr)),
            Entry::Created(_) => None,
        })
    }

    /// Entities written to since the journal was opened.
    pub fn touched(&self) -> &IndexSet<EntityId> { &self.touched }

    pub fn record_write(&mut self, entity: EntityId, attr: usize, old: Value) {
        self.touched.insert(entity);
        self.entries.push(Entry::Cell { entity, attr, old });
    }

    pub fn record_created(&mut self, entity: EntityId) {
        self.touched.insert(entity);
        self.entries.push(Entry::Created(entity));
    }

    /// Undoes every entry, newest first, and clears cascade flags.
    pub fn rollback(self, entities: &mut Registry<Entity>) {
        for entry in self.entries.into_iter().rev() {
            match entry {
                Entry::Cell { entity, attr, old } => {
                    if let Some(e) = entities.get_mut(entity) {
                        e.store(attr, old);
                    }
                }
                Entry::Created(entity) => {
                    entities.remove(entity);
                }
            }
        }
        Self::settle_all(&self.touched, entities);
    }

    /// Keeps every write; clears the cascade flags of touched entities.
    pub fn commit(self, entities: &mut Registry<Entity>) {
        Self::settle_all(&self.touched, entities);
    }

    fn settle_all(touched: &IndexSet<EntityId>, entities: &mut Registry<Entity>) {
        for id in touched {
            if let Some(e) = entities.get_mut(*id) {
                e.dirty = false;
                for attr in 0..e.cells().len() {
                    e.set_frozen(attr, false);
                }
            }
        }
    }
}
