//! # Skald — Entity Worlds and Context Documents
//!
//! Sparse entity–component storage for named worlds, plus a self-describing
//! JSON format that saves and restores them.
//!
//! Build a [`TypeRegistry`](registry::TypeRegistry) once, open worlds through
//! [`Contexts`](context::Contexts), and persist them with a
//! [`ContextDataCodec`](codec::ContextDataCodec). Start with
//! `use skald::prelude::*`.

pub mod asset;
pub mod codec;
pub mod config;
pub mod context;
pub mod ecs;
pub mod error;
pub mod prelude;
pub mod registry;
