//! # Entity: Slots for Fetched Records
//!
//! An [`Entity`] carries no data of its own. One is created for each entity
//! record that arrives from the content store, and destroyed when that record
//! leaves the active scene set. Other entities never store an `Entity` to point
//! at it: cross-entity references go through the record's
//! [`Cid`](crate::cid::Cid), resolved by the [`World`](super::world::World)
//! each time they are read.
//!
//! `Entity` handles are still handed out to collaborators, though: an asset
//! load or a platform anchor request is tagged with the entity that asked for
//! it, and the reply may land many ticks later. By then the record may have
//! been removed and its slot recycled for another record.
//!
//! ## Generational Slots
//!
//! Each slot index is paired with a generation. Freeing a slot bumps its
//! generation, so a reply carrying an old handle fails the liveness check
//! instead of writing into the new occupant:
//!
//! ```text
//! request issued for Entity { index: 3, generation: 0 }
//! record removed            → slot 3 generation becomes 1
//! new record spawned        → Entity { index: 3, generation: 1 }
//! reply arrives for 3v0     → is_alive() == false, dropped
//! ```

use std::fmt;

/// A handle to an entity in the [`World`](super::world::World).
///
/// Only meaningful for the world that created it, and only while its
/// generation matches the slot's current one.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl Entity {
    /// Slot index. Also the row used by every component column.
    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Hands out entity slots and recycles freed ones.
///
/// ```text
/// generations: [0, 1, 0, 2]   ← current generation per slot
/// free:        [1, 3]         ← slots waiting for reuse (LIFO)
/// ```
pub(crate) struct EntityAllocator {
    generations: Vec<u32>,
    free: Vec<u32>,
}

impl EntityAllocator {
    pub fn new() -> Self {
        Self {
            generations: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Take a recycled slot if there is one, otherwise grow by one.
    pub fn allocate(&mut self) -> Entity {
        match self.free.pop() {
            Some(index) => Entity {
                index,
                generation: self.generations[index as usize],
            },
            None => {
                let index = self.generations.len() as u32;
                self.generations.push(0);
                Entity {
                    index,
                    generation: 0,
                }
            }
        }
    }

    /// Free a slot. Returns `false` for a handle that was already stale.
    pub fn deallocate(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        let generation = &mut self.generations[entity.index as usize];
        *generation = generation.wrapping_add(1);
        self.free.push(entity.index);
        true
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.generations
            .get(entity.index as usize)
            .is_some_and(|&g| g == entity.generation)
    }

    pub fn alive_count(&self) -> usize {
        self.generations.len() - self.free.len()
    }
}
