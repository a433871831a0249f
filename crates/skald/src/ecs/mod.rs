//! # Sparse Entity–Component Storage
//!
//! Storage and identity only: there are no systems, queries or schedules.
//! Every world has a fixed roster of component kinds, and every entity has
//! one optional slot per roster position.
//!
//! ## Module Overview
//!
//! - [`entity`] — Generational entity IDs
//! - [`component`] — The `Component` trait, erased values, per-entity slots
//! - [`world`] — Named entity container and all entity operations
//! - [`archetype`] — Deduplicated component-presence patterns

pub mod archetype;
pub mod component;
pub mod entity;
pub mod world;

pub use archetype::{Archetype, ArchetypeExtractor, ArchetypeIdentity};
pub use component::{BoxedComponent, Component, ComponentSlots, ComponentValue};
pub use entity::Entity;
pub use world::{EntityBuilder, World};
