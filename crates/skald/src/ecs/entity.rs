//! # Entity — Generational Identity
//!
//! An [`Entity`] is an index plus a generation. The index addresses the
//! entity's slot row inside its [`World`](super::world::World); the generation
//! is bumped whenever that row is recycled, so a handle kept across a
//! `despawn` is detected as stale instead of silently aliasing a newer entity.
//!
//! ```text
//! Entity { index: 3, generation: 0 }  ← created
//! despawn → generations[3] = 1, 3 pushed on the free list
//! Entity { index: 3, generation: 1 }  ← next create_entity()
//! ```
//!
//! Handles are only meaningful for the world that issued them.

use std::fmt;

/// A lightweight handle to an entity of one [`World`](super::world::World).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl Entity {
    /// Row index inside the owning world.
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

/// Hands out entity handles and recycles despawned rows.
///
/// ```text
/// generations: [0, 1, 0]             ← one per row ever allocated
/// alive:       [true, false, true]
/// free_list:   [1]                   ← rows available for reuse
/// ```
#[derive(Debug, Default)]
pub(crate) struct EntityAllocator {
    generations: Vec<u32>,
    alive: Vec<bool>,
    free_list: Vec<u32>,
}

impl EntityAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pop a recycled row if there is one, otherwise grow by one row.
    pub fn allocate(&mut self) -> Entity {
        if let Some(index) = self.free_list.pop() {
            self.alive[index as usize] = true;
            let generation = self.generations[index as usize];
            Entity { index, generation }
        } else {
            let index = self.generations.len() as u32;
            self.generations.push(0);
            self.alive.push(true);
            Entity {
                index,
                generation: 0,
            }
        }
    }

    /// Returns `false` when the handle was already stale.
    pub fn deallocate(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        self.generations[entity.index as usize] += 1;
        self.alive[entity.index as usize] = false;
        self.free_list.push(entity.index);
        true
    }

    /// Check if an entity's generation still matches its row.
    pub fn is_alive(&self, entity: Entity) -> bool {
        let idx = entity.index as usize;
        idx < self.generations.len() && self.alive[idx] && self.generations[idx] == entity.generation
    }

    pub fn alive_count(&self) -> usize {
        self.generations.len() - self.free_list.len()
    }

    /// Total rows ever allocated, alive or free.
    pub fn total_rows(&self) -> usize {
        self.generations.len()
    }

    /// Handle for an alive row, `None` for a free one.
    pub fn entity_at(&self, index: u32) -> Option<Entity> {
        let generation = *self.generations.get(index as usize)?;
        let entity = Entity { index, generation };
        self.is_alive(entity).then_some(entity)
    }

    /// Free every live row, bumping its generation. All rows go on the free
    /// list with row 0 handed out first.
    pub fn despawn_all(&mut self) {
        for (generation, alive) in self.generations.iter_mut().zip(self.alive.iter_mut()) {
            if *alive {
                *generation += 1;
                *alive = false;
            }
        }
        self.free_list = (0..self.generations.len() as u32).rev().collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_sequential() {
        let mut alloc = EntityAllocator::new();
        let e0 = alloc.allocate();
        let e1 = alloc.allocate();
        assert_eq!((e0.index, e0.generation), (0, 0));
        assert_eq!((e1.index, e1.generation), (1, 0));
    }

    #[test]
    fn recycled_row_gets_new_generation() {
        let mut alloc = EntityAllocator::new();
        let e0 = alloc.allocate();
        assert!(alloc.deallocate(e0));
        let again = alloc.allocate();
        assert_eq!(again.index, 0);
        assert_eq!(again.generation, 1);
        assert!(!alloc.is_alive(e0));
        assert!(alloc.is_alive(again));
    }

    #[test]
    fn double_free_is_rejected() {
        let mut alloc = EntityAllocator::new();
        let e0 = alloc.allocate();
        assert!(alloc.deallocate(e0));
        assert!(!alloc.deallocate(e0));
        assert_eq!(alloc.alive_count(), 0);
    }

    #[test]
    fn despawn_all_keeps_old_handles_stale() {
        let mut alloc = EntityAllocator::new();
        let e0 = alloc.allocate();
        let e1 = alloc.allocate();
        alloc.deallocate(e1);
        alloc.despawn_all();
        assert_eq!(alloc.alive_count(), 0);

        let fresh = alloc.allocate();
        assert_eq!(fresh.index, 0);
        assert_eq!(fresh.generation, 1);
        assert!(!alloc.is_alive(e0));
        let next = alloc.allocate();
        assert_eq!((next.index, next.generation), (1, 1));
        assert!(!alloc.is_alive(e1));
    }

    #[test]
    fn entity_at_skips_free_rows() {
        let mut alloc = EntityAllocator::new();
        let e0 = alloc.allocate();
        let e1 = alloc.allocate();
        alloc.deallocate(e0);
        assert_eq!(alloc.entity_at(0), None);
        assert_eq!(alloc.entity_at(1), Some(e1));
        assert_eq!(alloc.entity_at(7), None);
        assert_eq!(alloc.total_rows(), 2);
    }
}
