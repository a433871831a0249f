//! # World — One Named Entity Container
//!
//! A [`World`] owns the entities of one registered world and stores their
//! components in roster-indexed [`ComponentSlots`].
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │ World "Game"                                  │
//! │                                               │
//! │  roster: [Position, Velocity, Tag]            │
//! │  allocator: entity index/generation lifecycle │
//! │  rows: Vec<Option<ComponentSlots>>            │
//! │    row i = components of the entity with      │
//! │    index i, None when the row is free         │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Add vs. replace
//!
//! `add_*` never overwrites: adding a kind the entity already holds is a
//! silent no-op. `replace_*` always writes, whether the slot was empty or
//! not.
//!
//! Worlds are not synchronized. One thread mutates a world at a time.

use std::sync::Arc;

use super::component::{BoxedComponent, Component, ComponentSlots, ComponentValue};
use super::entity::{Entity, EntityAllocator};
use crate::error::WorldError;
use crate::registry::{Roster, TypeRegistry, WorldInfo};

/// The entities and components of one registered world.
pub struct World {
    registry: Arc<TypeRegistry>,
    id: usize,
    allocator: EntityAllocator,
    rows: Vec<Option<ComponentSlots>>,
}

impl World {
    /// Create an empty instance of the registered world `name`.
    ///
    /// Most callers go through [`Contexts::instance`](crate::context::Contexts::instance),
    /// which keeps one instance per name.
    pub fn new(registry: Arc<TypeRegistry>, name: &str) -> Option<Self> {
        let id = registry.lookup_world(name)?.id();
        Some(Self::with_id(registry, id))
    }

    pub(crate) fn with_id(registry: Arc<TypeRegistry>, id: usize) -> Self {
        Self {
            registry,
            id,
            allocator: EntityAllocator::new(),
            rows: Vec::new(),
        }
    }

    fn info(&self) -> &WorldInfo {
        self.registry.world_at(self.id)
    }

    /// The registered name of this world.
    pub fn name(&self) -> &str {
        self.info().name()
    }

    /// The fixed, ordered component kinds of this world.
    pub fn roster(&self) -> &Roster {
        self.info().roster()
    }

    /// The registry this world was created from.
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Slot index of component type `T`.
    pub fn slot_of<T: Component>(&self) -> Option<usize> {
        self.roster().index_of(T::KIND)
    }

    // ── Entity lifecycle ─────────────────────────────────────────────

    /// Create an entity with every slot empty.
    ///
    /// Reuses the most recently freed row when there is one. The returned
    /// handle carries that row's bumped generation, so handles to the row's
    /// previous occupant stay stale.
    pub fn create_entity(&mut self) -> Entity {
        let entity = self.allocator.allocate();
        let slots = ComponentSlots::new(self.roster().len());
        let row = entity.index as usize;
        if row == self.rows.len() {
            self.rows.push(Some(slots));
        } else {
            self.rows[row] = Some(slots);
        }
        log::trace!("world `{}`: created entity {entity}", self.name());
        entity
    }

    /// Create an entity and add `values` with the idempotent add rule.
    pub fn create_entity_with(&mut self, values: impl IntoIterator<Item = BoxedComponent>) -> Entity {
        let entity = self.create_entity();
        self.insert_values(entity, values);
        entity
    }

    /// Create an entity holding default values for the slots in `indices`.
    pub fn create_entity_with_defaults(&mut self, indices: &[usize]) -> Result<Entity, WorldError> {
        self.check_slots(indices)?;
        let entity = self.create_entity();
        self.add_default_components(entity, indices)?;
        Ok(entity)
    }

    /// Create `count` empty entities.
    pub fn create_entities(&mut self, count: usize) -> Vec<Entity> {
        (0..count).map(|_| self.create_entity()).collect()
    }

    /// Start an entity and chain components onto it.
    pub fn build_entity(&mut self) -> EntityBuilder<'_> {
        let entity = self.create_entity();
        EntityBuilder {
            world: self,
            entity,
        }
    }

    /// Despawn an entity, dropping its components and freeing its row for
    /// reuse.
    ///
    /// Returns `true` if the entity was alive.
    pub fn despawn(&mut self, entity: Entity) -> bool {
        if !self.allocator.deallocate(entity) {
            return false;
        }
        self.rows[entity.index as usize] = None;
        true
    }

    /// Despawn every entity. Handles issued before the call stay stale, even
    /// after their rows are reused.
    pub fn clear(&mut self) {
        self.allocator.despawn_all();
        self.rows.iter_mut().for_each(|row| *row = None);
    }

    /// Returns `true` if `entity` was created by this world and not yet despawned.
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.allocator.is_alive(entity)
    }

    /// Returns the number of alive entities.
    pub fn entity_count(&self) -> usize {
        self.allocator.alive_count()
    }

    /// Live entities in row order.
    pub fn entities(&self) -> Vec<Entity> {
        self.iter().map(|(entity, _)| entity).collect()
    }

    /// Live entities with their component slots, in row order.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &ComponentSlots)> + '_ {
        (0..self.allocator.total_rows() as u32).filter_map(move |index| {
            let entity = self.allocator.entity_at(index)?;
            let slots = self.rows.get(index as usize)?.as_ref()?;
            Some((entity, slots))
        })
    }

    /// The component store of a live entity.
    pub fn slots(&self, entity: Entity) -> Option<&ComponentSlots> {
        if !self.allocator.is_alive(entity) {
            return None;
        }
        self.rows.get(entity.index as usize)?.as_ref()
    }

    fn slots_mut(&mut self, entity: Entity) -> Result<&mut ComponentSlots, WorldError> {
        let alive = self.allocator.is_alive(entity);
        // Only disjoint fields are borrowed here, so the error arm may read the registry.
        match self.rows.get_mut(entity.index as usize) {
            Some(Some(slots)) if alive => Ok(slots),
            _ => Err(WorldError::StaleEntity {
                world: self.registry.world_at(self.id).name().to_string(),
                entity,
            }),
        }
    }

    fn check_slots(&self, indices: &[usize]) -> Result<(), WorldError> {
        let len = self.roster().len();
        match indices.iter().find(|&&index| index >= len) {
            Some(&index) => Err(WorldError::SlotOutOfRange {
                world: self.name().to_string(),
                index,
                len,
            }),
            None => Ok(()),
        }
    }

    // ── Adding ───────────────────────────────────────────────────────

    /// Add one value. Returns `Ok(false)` when the entity already holds its kind.
    ///
    /// # Errors
    ///
    /// `KindNotInRoster` if this world does not store the value's kind, and
    /// `StaleEntity` if `entity` is not alive. Unlike
    /// [`add_components`](Self::add_components), nothing is skipped silently.
    pub fn add_component(&mut self, entity: Entity, value: BoxedComponent) -> Result<bool, WorldError> {
        let Some(index) = self.roster().index_of(value.kind()) else {
            return Err(WorldError::KindNotInRoster {
                world: self.name().to_string(),
                kind: value.kind().to_string(),
            });
        };
        Ok(self.slots_mut(entity)?.insert_if_absent(index, value))
    }

    /// Add every value whose slot is still empty. Kinds outside the roster are
    /// skipped with a warning. Returns how many values were stored.
    ///
    /// A kind listed twice keeps its first value.
    ///
    /// # Errors
    ///
    /// `StaleEntity` if `entity` is not alive. No value is stored then.
    pub fn add_components(
        &mut self,
        entity: Entity,
        values: impl IntoIterator<Item = BoxedComponent>,
    ) -> Result<usize, WorldError> {
        self.slots_mut(entity)?;
        Ok(self.insert_values(entity, values))
    }

    /// Add default-constructed values for the slots in `indices`. Slots that
    /// are already occupied keep their value.
    ///
    /// # Errors
    ///
    /// `SlotOutOfRange` for an index past the roster, checked before anything
    /// is added. `StaleEntity` if `entity` is not alive.
    pub fn add_default_components(&mut self, entity: Entity, indices: &[usize]) -> Result<usize, WorldError> {
        self.check_slots(indices)?;
        let defaults: Vec<(usize, BoxedComponent)> = indices
            .iter()
            .filter_map(|&index| {
                let kind = self.roster().kind_at(index)?;
                Some((index, self.registry.default_value(kind)?))
            })
            .collect();

        let slots = self.slots_mut(entity)?;
        Ok(defaults
            .into_iter()
            .map(|(index, value)| slots.insert_if_absent(index, value))
            .filter(|&added| added)
            .count())
    }

    /// Shared by creation and loading; `entity` must be alive.
    pub(crate) fn insert_values(
        &mut self,
        entity: Entity,
        values: impl IntoIterator<Item = BoxedComponent>,
    ) -> usize {
        let world = self.info().name().to_string();
        let placed: Vec<(usize, BoxedComponent)> = values
            .into_iter()
            .filter_map(|value| match self.roster().index_of(value.kind()) {
                Some(index) => Some((index, value)),
                None => {
                    log::warn!(
                        "component `{}` is not defined in world `{world}`, skipped",
                        value.kind()
                    );
                    None
                }
            })
            .collect();

        let Ok(slots) = self.slots_mut(entity) else {
            return 0;
        };
        placed
            .into_iter()
            .map(|(index, value)| slots.insert_if_absent(index, value))
            .filter(|&added| added)
            .count()
    }

    // ── Removing and replacing ───────────────────────────────────────

    /// Clear slot `index`, returning its value. `Ok(None)` when it was empty
    /// or out of range. The slot leaves the add order.
    pub fn remove_component(&mut self, entity: Entity, index: usize) -> Result<Option<BoxedComponent>, WorldError> {
        Ok(self.slots_mut(entity)?.remove(index))
    }

    /// Clear every occupied slot in `indices`, returning the removed values.
    pub fn remove_components(&mut self, entity: Entity, indices: &[usize]) -> Result<Vec<BoxedComponent>, WorldError> {
        let slots = self.slots_mut(entity)?;
        Ok(indices.iter().filter_map(|&index| slots.remove(index)).collect())
    }

    /// Write `value` to slot `index` whether or not it is occupied, returning
    /// the previous value. `value` must be of the kind the roster puts at `index`.
    ///
    /// A refilled slot keeps its place in the add order; a newly filled one is
    /// appended.
    ///
    /// # Errors
    ///
    /// `SlotOutOfRange` or `KindMismatch` for a bad slot, `StaleEntity` for a
    /// dead entity.
    pub fn replace_component(
        &mut self,
        entity: Entity,
        index: usize,
        value: BoxedComponent,
    ) -> Result<Option<BoxedComponent>, WorldError> {
        self.check_slots(&[index])?;
        let expected = self.roster().kind_at(index).unwrap_or_default();
        if expected != value.kind() {
            return Err(WorldError::KindMismatch {
                world: self.name().to_string(),
                index,
                expected: expected.to_string(),
                found: value.kind().to_string(),
            });
        }
        Ok(self.slots_mut(entity)?.replace(index, value))
    }

    /// Upsert every value at its roster slot. Kinds outside the roster are
    /// skipped with a warning. Returns how many values were written.
    pub fn replace_components(
        &mut self,
        entity: Entity,
        values: impl IntoIterator<Item = BoxedComponent>,
    ) -> Result<usize, WorldError> {
        self.slots_mut(entity)?;
        let mut written = 0;
        for value in values {
            match self.roster().index_of(value.kind()) {
                Some(index) => {
                    self.slots_mut(entity)?.replace(index, value);
                    written += 1;
                }
                None => log::warn!(
                    "component `{}` is not defined in world `{}`, skipped",
                    value.kind(),
                    self.name()
                ),
            }
        }
        Ok(written)
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// `false` for dead entities and empty slots.
    pub fn has_component(&self, entity: Entity, index: usize) -> bool {
        self.slots(entity).is_some_and(|slots| slots.has(index))
    }

    /// Returns `true` if the entity occupies at least one slot of `indices`.
    /// `false` for dead entities and an empty query.
    pub fn has_any_component(&self, entity: Entity, indices: &[usize]) -> bool {
        self.slots(entity).is_some_and(|slots| slots.has_any(indices))
    }

    /// First slot of `indices`, in query order, that the entity occupies.
    pub fn get_any_component(&self, entity: Entity, indices: &[usize]) -> Option<(usize, &dyn ComponentValue)> {
        self.slots(entity)?.get_any(indices)
    }

    /// The value in slot `index`. Returns `None` unless the entity is alive
    /// and the slot is occupied.
    pub fn component(&self, entity: Entity, index: usize) -> Option<&dyn ComponentValue> {
        self.slots(entity)?.get(index)
    }

    /// Occupied slots in add order; empty for dead entities.
    pub fn occupied_indexes(&self, entity: Entity) -> &[usize] {
        self.slots(entity)
            .map(ComponentSlots::occupied_indexes)
            .unwrap_or_default()
    }

    /// All values in add order; empty for dead entities.
    pub fn components(&self, entity: Entity) -> Vec<&dyn ComponentValue> {
        self.slots(entity)
            .map(|slots| slots.components().collect())
            .unwrap_or_default()
    }

    /// Values at the occupied slots of `indices`, in query order. Empty slots
    /// are skipped.
    pub fn components_at(&self, entity: Entity, indices: &[usize]) -> Vec<&dyn ComponentValue> {
        self.slots(entity)
            .map(|slots| slots.components_at(indices))
            .unwrap_or_default()
    }

    /// Values at occupied slots *not* in `indices`, in add order.
    pub fn subtract(&self, entity: Entity, indices: &[usize]) -> Vec<&dyn ComponentValue> {
        self.slots(entity)
            .map(|slots| slots.subtract(indices))
            .unwrap_or_default()
    }

    /// [`subtract`](Self::subtract) over many entities, concatenated.
    pub fn subtract_all(&self, entities: &[Entity], indices: &[usize]) -> Vec<&dyn ComponentValue> {
        entities
            .iter()
            .flat_map(|&entity| self.subtract(entity, indices))
            .collect()
    }

    /// Roster slot of each value's kind.
    pub fn indices_of(&self, values: &[BoxedComponent]) -> Vec<Option<usize>> {
        values
            .iter()
            .map(|value| self.roster().index_of(value.kind()))
            .collect()
    }

    // ── Typed access ─────────────────────────────────────────────────

    /// Typed shared access to the entity's `T`. Returns `None` unless the
    /// entity is alive and holds a `T`.
    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        let index = self.slot_of::<T>()?;
        self.slots(entity)?.get(index)?.downcast_ref::<T>()
    }

    /// Typed mutable access to the entity's `T`. Same `None` cases as
    /// [`get`](Self::get).
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        let index = self.slot_of::<T>()?;
        self.slots_mut(entity).ok()?.get_mut(index)?.downcast_mut::<T>()
    }

    /// Check if the entity holds a `T`.
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.get::<T>(entity).is_some()
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("name", &self.name())
            .field("roster", &self.roster().kinds())
            .field("entities", &self.entity_count())
            .finish()
    }
}

/// Chains components onto a freshly created entity.
///
/// ```ignore
/// let player = world.build_entity().with(Position::default()).with(Tag).id();
/// ```
pub struct EntityBuilder<'w> {
    world: &'w mut World,
    entity: Entity,
}

impl EntityBuilder<'_> {
    /// Add `value` with the idempotent add rule.
    pub fn with<T: Component>(self, value: T) -> Self {
        self.world.insert_values(self.entity, [Box::new(value) as BoxedComponent]);
        self
    }

    /// The entity being built.
    pub fn id(&self) -> Entity {
        self.entity
    }
}
