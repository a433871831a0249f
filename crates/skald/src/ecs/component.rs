//! # Component — Kinds, Erased Values, Sparse Slots
//!
//! A component is plain data identified by a stable kind name
//! ([`Component::KIND`]). Worlds store components type-erased as
//! [`BoxedComponent`] so one entity can mix arbitrary kinds, and the codec can
//! move values in and out without knowing their concrete types.
//!
//! ## Sparse storage
//!
//! Each entity owns a [`ComponentSlots`]: one optional slot per position of its
//! world's roster, plus the order in which slots were filled.
//!
//! ```text
//! roster:  [Position, Velocity, Tag]
//! slots:   [Some(Position), Some(Velocity), None]
//! order:   [1, 0]          ← Velocity was added first
//! ```
//!
//! The add order is what [`ComponentSlots::occupied_indexes`] reports and what
//! the codec writes to disk. It is *not* sorted by slot index.

use std::any::Any;
use std::fmt;

/// Plain data that can be attached to an entity.
///
/// `KIND` is the stable name used by rosters and as the `"kind"` discriminator
/// in saved documents. Renaming a Rust type is safe as long as `KIND` stays
/// the same.
///
/// `Default` provides the representative value for archetypes and the value
/// created by [`World::add_default_components`](super::World::add_default_components).
pub trait Component: Any + Clone + PartialEq + fmt::Debug + Default + Send + Sync {
    const KIND: &'static str;
}

/// Object-safe view of a component value.
///
/// Implemented for every [`Component`]; not meant to be implemented by hand.
pub trait ComponentValue: Any + fmt::Debug + Send + Sync {
    fn kind(&self) -> &'static str;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn clone_boxed(&self) -> BoxedComponent;
    /// Value equality; values of different kinds are never equal.
    fn eq_value(&self, other: &dyn ComponentValue) -> bool;
}

/// A heap-allocated, type-erased component value.
pub type BoxedComponent = Box<dyn ComponentValue>;

impl<T: Component> ComponentValue for T {
    fn kind(&self) -> &'static str {
        T::KIND
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn clone_boxed(&self) -> BoxedComponent {
        Box::new(self.clone())
    }

    fn eq_value(&self, other: &dyn ComponentValue) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }
}

impl<'a> dyn ComponentValue + 'a {
    /// Returns `None` if the value is not a `T`.
    pub fn downcast_ref<T: Component>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }

    pub fn is<T: Component>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

impl<'a> PartialEq for dyn ComponentValue + 'a {
    fn eq(&self, other: &Self) -> bool {
        self.eq_value(other)
    }
}

impl Clone for BoxedComponent {
    fn clone(&self) -> Self {
        self.clone_boxed()
    }
}

/// Box a list of heterogeneous components.
///
/// ```ignore
/// let values = components![Position { x: 1.0, y: 2.0 }, Tag];
/// world.create_entity_with(values);
/// ```
#[macro_export]
macro_rules! components {
    ($($value:expr),* $(,)?) => {
        ::std::vec![$(::std::boxed::Box::new($value) as $crate::ecs::BoxedComponent),*]
    };
}

/// The sparse, roster-indexed component store of one entity.
#[derive(Debug, Clone)]
pub struct ComponentSlots {
    slots: Vec<Option<BoxedComponent>>,
    /// Occupied slot indices, in the order they were filled.
    order: Vec<usize>,
}

impl ComponentSlots {
    pub(crate) fn new(roster_len: usize) -> Self {
        Self {
            slots: (0..roster_len).map(|_| None).collect(),
            order: Vec::new(),
        }
    }

    /// Number of slots (the roster length).
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// `false` for empty and out-of-range slots.
    pub fn has(&self, index: usize) -> bool {
        matches!(self.slots.get(index), Some(Some(_)))
    }

    pub fn has_any(&self, indices: &[usize]) -> bool {
        indices.iter().any(|&index| self.has(index))
    }

    /// First index of `indices` (in query order) that is occupied, with its value.
    pub fn get_any(&self, indices: &[usize]) -> Option<(usize, &dyn ComponentValue)> {
        indices
            .iter()
            .find_map(|&index| self.get(index).map(|value| (index, value)))
    }

    /// Value in slot `index`, if occupied.
    pub fn get(&self, index: usize) -> Option<&dyn ComponentValue> {
        self.slots.get(index)?.as_deref()
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut (dyn ComponentValue + 'static)> {
        self.slots.get_mut(index)?.as_deref_mut()
    }

    /// Occupied slot indices in add order.
    pub fn occupied_indexes(&self) -> &[usize] {
        &self.order
    }

    /// All values in add order.
    pub fn components(&self) -> impl Iterator<Item = &dyn ComponentValue> + '_ {
        self.order.iter().filter_map(|&index| self.get(index))
    }

    /// Values at the occupied slots listed in `indices`, in add order.
    pub fn components_at(&self, indices: &[usize]) -> Vec<&dyn ComponentValue> {
        self.order
            .iter()
            .filter(|index| indices.contains(index))
            .filter_map(|&index| self.get(index))
            .collect()
    }

    /// Values at the occupied slots *not* listed in `indices`, in add order.
    pub fn subtract(&self, indices: &[usize]) -> Vec<&dyn ComponentValue> {
        self.order
            .iter()
            .filter(|index| !indices.contains(index))
            .filter_map(|&index| self.get(index))
            .collect()
    }

    /// Fill an empty slot. Returns `false` (dropping `value`) when occupied.
    /// The caller guarantees `index` is in range.
    pub(crate) fn insert_if_absent(&mut self, index: usize, value: BoxedComponent) -> bool {
        let slot = &mut self.slots[index];
        if slot.is_some() {
            return false;
        }
        *slot = Some(value);
        self.order.push(index);
        true
    }

    /// Overwrite a slot whether or not it is occupied. A refilled slot keeps
    /// its place in the add order.
    pub(crate) fn replace(&mut self, index: usize, value: BoxedComponent) -> Option<BoxedComponent> {
        let previous = self.slots[index].replace(value);
        if previous.is_none() {
            self.order.push(index);
        }
        previous
    }

    pub(crate) fn remove(&mut self, index: usize) -> Option<BoxedComponent> {
        let previous = self.slots.get_mut(index)?.take()?;
        self.order.retain(|&occupied| occupied != index);
        Some(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }
    impl Component for Position {
        const KIND: &'static str = "Position";
    }

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Velocity {
        dx: f32,
        dy: f32,
    }
    impl Component for Velocity {
        const KIND: &'static str = "Velocity";
    }

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Tag;
    impl Component for Tag {
        const KIND: &'static str = "Tag";
    }

    fn kinds(values: &[&dyn ComponentValue]) -> Vec<&'static str> {
        values.iter().map(|v| v.kind()).collect()
    }

    fn filled() -> ComponentSlots {
        let mut slots = ComponentSlots::new(3);
        slots.insert_if_absent(2, Box::new(Tag));
        slots.insert_if_absent(0, Box::new(Position { x: 1.0, y: 2.0 }));
        slots.insert_if_absent(1, Box::new(Velocity { dx: 3.0, dy: 4.0 }));
        slots
    }

    #[test]
    fn occupied_indexes_follow_add_order() {
        let slots = filled();
        assert_eq!(slots.occupied_indexes(), &[2, 0, 1]);
        assert_eq!(kinds(&slots.components().collect::<Vec<_>>()), ["Tag", "Position", "Velocity"]);
    }

    #[test]
    fn insert_if_absent_keeps_first_value() {
        let mut slots = ComponentSlots::new(3);
        assert!(slots.insert_if_absent(0, Box::new(Position { x: 1.0, y: 1.0 })));
        assert!(!slots.insert_if_absent(0, Box::new(Position { x: 9.0, y: 9.0 })));
        let kept = slots.get(0).and_then(|v| v.downcast_ref::<Position>()).cloned();
        assert_eq!(kept, Some(Position { x: 1.0, y: 1.0 }));
        assert_eq!(slots.len(), 1);
    }

    #[test]
    fn replace_overwrites_in_place() {
        let mut slots = filled();
        let previous = slots.replace(0, Box::new(Position { x: 5.0, y: 5.0 }));
        assert!(previous.is_some());
        assert_eq!(slots.occupied_indexes(), &[2, 0, 1]);

        let mut sparse = ComponentSlots::new(3);
        assert!(sparse.replace(1, Box::new(Velocity::default())).is_none());
        assert_eq!(sparse.occupied_indexes(), &[1]);
    }

    #[test]
    fn remove_only_clears_occupied_slots() {
        let mut slots = filled();
        assert!(slots.remove(0).is_some());
        assert!(slots.remove(0).is_none());
        assert!(slots.remove(42).is_none());
        assert_eq!(slots.occupied_indexes(), &[2, 1]);
    }

    #[test]
    fn presence_queries() {
        let mut slots = ComponentSlots::new(3);
        slots.insert_if_absent(1, Box::new(Velocity::default()));
        assert!(slots.has(1));
        assert!(!slots.has(0));
        assert!(!slots.has(99));
        assert!(slots.has_any(&[0, 1]));
        assert!(!slots.has_any(&[0, 2]));
        assert!(!slots.has_any(&[]));
        let (index, value) = slots.get_any(&[2, 1, 0]).unwrap();
        assert_eq!(index, 1);
        assert_eq!(value.kind(), "Velocity");
        assert!(slots.get_any(&[0, 2]).is_none());
    }

    #[test]
    fn subtract_laws() {
        let slots = filled();
        let full = kinds(&slots.components().collect::<Vec<_>>());

        assert_eq!(kinds(&slots.subtract(&[])), full);
        assert!(slots.subtract(slots.occupied_indexes()).is_empty());

        for subset in [vec![], vec![0], vec![1, 2], vec![2, 0, 1], vec![0, 7]] {
            let mut union = kinds(&slots.components_at(&subset));
            union.extend(kinds(&slots.subtract(&subset)));
            union.sort();
            let mut expected = full.clone();
            expected.sort();
            assert_eq!(union, expected, "subset {subset:?}");
        }
    }

    #[test]
    fn value_equality_respects_kind() {
        let a: BoxedComponent = Box::new(Position { x: 1.0, y: 2.0 });
        let b: BoxedComponent = Box::new(Position { x: 1.0, y: 2.0 });
        let c: BoxedComponent = Box::new(Position { x: 0.0, y: 2.0 });
        let d: BoxedComponent = Box::new(Velocity { dx: 1.0, dy: 2.0 });
        assert!(*a == *b);
        assert!(*a != *c);
        assert!(*a != *d);
        assert_eq!(vec![a.clone(), d.clone()], vec![b, d]);
    }

    #[test]
    fn components_macro_boxes_mixed_kinds() {
        let values = crate::components![Position::default(), Tag];
        assert_eq!(values.len(), 2);
        assert!(values[1].is::<Tag>());
    }
}
