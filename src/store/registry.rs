//! registry.rs
//! Generational arena owning every live entity.

use super::types::EntityId;

#[derive(Debug, Clone)]
enum Slot<T> {
    Occupied { generation: u32, value: T },
    Vacant { generation: u32, next_free: Option<u32> },
}

#[derive(Debug, Clone)]
pub struct Registry<T> {
    slots: Vec<Slot<T>>,
    free_head: Option<u32>,
    len: usize,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self { slots: Vec::new(), free_head: None, len: 0 }
    }
}

impl<T> Registry<T> {
    pub fn new() -> Self { Self::default() }
    pub fn len(&self) -> usize { self.len }
    pub fn is_empty(&self) -> bool { self.len == 0 }

    /// Returns the id the next `insert` will hand out.
    pub fn next_id(&self) -> EntityId {
        match self.free_head {
            Some(idx) => match &self.slots[idx as usize] {
                Slot::Vacant { generation, .. } => EntityId::new(idx, *generation),
                Slot::Occupied { .. } => unreachable!("free list points at an occupied slot"),
            },
            None => EntityId::new(self.slots.len() as u32, 0),
        }
    }

    pub fn insert(&mut self, value: T) -> EntityId {
        let id = self.next_id();
        let idx = id.index();
        if idx == self.slots.len() {
            self.slots.push(Slot::Occupied { generation: id.generation(), value });
        } else {
            if let Slot::Vacant { next_free, .. } = &self.slots[idx] {
                self.free_head = *next_free;
            }
            self.slots[idx] = Slot::Occupied { generation: id.generation(), value };
        }
        self.len += 1;
        id
    }

    pub fn remove(&mut self, id: EntityId) -> Option<T> {
        if !self.contains(id) {
            return None;
        }
        let idx = id.index();
        let vacant = Slot::Vacant { generation: id.generation().wrapping_add(1), next_free: self.free_head };
        let old = std::mem::replace(&mut self.slots[idx], vacant);
        self.free_head = Some(idx as u32);
        self.len -= 1;
        match old {
            Slot::Occupied { value, .. } => Some(value),
            Slot::Vacant { .. } => None,
        }
    }

    #[inline(always)]
    pub fn get(&self, id: EntityId) -> Option<&T> {
        match self.slots.get(id.index())? {
            Slot::Occupied { generation, value } if *generation == id.generation() => Some(value),
            _ => None,
        }
    }

    #[inline(always)]
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut T> {
        match self.slots.get_mut(id.index())? {
            Slot::Occupied { generation, value } if *generation == id.generation() => Some(value),
            _ => None,
        }
    }

    pub fn contains(&self, id: EntityId) -> bool { self.get(id).is_some() }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| match slot {
            Slot::Occupied { generation, value } => Some((EntityId::new(i as u32, *generation), value)),
            Slot::Vacant { .. } => None,
        })
    }
}
