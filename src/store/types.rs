use serde::{Deserialize, Serialize};
use std::fmt;

/// Generational handle to an entity in the arena.
///
/// The generation changes whenever a slot is reused, so a handle to a
/// destroyed entity never aliases the entity that replaced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId {
    index: u32,
    generation: u32,
}

impl EntityId {
    pub(crate) fn new(index: u32, generation: u32) -> Self { Self { index, generation } }

    #[inline(always)]
    pub fn index(&self) -> usize { self.index as usize }
    pub fn generation(&self) -> u32 { self.generation }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}
