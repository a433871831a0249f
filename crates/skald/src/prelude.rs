//! Convenience re-exports — `use skald::prelude::*` for the common items.

pub use crate::asset::{DirectorySource, DocumentWatcher, MemorySource, TextSink, TextSource};
pub use crate::codec::{ContextData, ContextDataCodec, LoadReport, Problem, merge};
pub use crate::components;
pub use crate::config::SkaldConfig;
pub use crate::context::Contexts;
pub use crate::ecs::{
    Archetype, ArchetypeExtractor, ArchetypeIdentity, BoxedComponent, Component, ComponentSlots,
    ComponentValue, Entity, EntityBuilder, World,
};
pub use crate::error::{AssetError, CodecError, ConfigError, RegistryError, WorldError};
pub use crate::registry::{RegistryBuilder, Roster, Shape, TypeRegistry, WorldInfo, WorldType};
