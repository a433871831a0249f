//! # Errors
//!
//! One error enum per concern. Lookups of unknown worlds are *not* errors:
//! they log and return `None` (see [`TypeRegistry::lookup_world`](crate::registry::TypeRegistry::lookup_world)).
//! Adding a component that is already present is not an error either.

use std::path::PathBuf;

use thiserror::Error;

use crate::ecs::Entity;

/// Problems detected while building a [`TypeRegistry`](crate::registry::TypeRegistry).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("component kind `{0}` is registered twice")]
    DuplicateComponent(String),

    #[error("world `{0}` is registered twice")]
    DuplicateWorld(String),

    #[error("world name must not be empty")]
    EmptyWorldName,

    #[error("world `{world}` lists unregistered component kind `{kind}`")]
    UnknownRosterKind { world: String, kind: String },

    #[error("world `{world}` lists component kind `{kind}` more than once")]
    DuplicateRosterKind { world: String, kind: String },

    #[error("component kind `{kind}` cannot be encoded: {reason}")]
    UnencodableDefault { kind: String, reason: String },

    #[error("a global type registry is already installed")]
    GlobalAlreadyInstalled,
}

/// Failures of entity-level operations on a [`World`](crate::ecs::World).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorldError {
    #[error("entity {entity} is not alive in world `{world}`")]
    StaleEntity { world: String, entity: Entity },

    #[error("component kind `{kind}` is not in the roster of world `{world}`")]
    KindNotInRoster { world: String, kind: String },

    #[error("slot {index} is out of range for world `{world}` (roster has {len} kinds)")]
    SlotOutOfRange { world: String, index: usize, len: usize },

    #[error("slot {index} of world `{world}` holds `{expected}`, got `{found}`")]
    KindMismatch {
        world: String,
        index: usize,
        expected: String,
        found: String,
    },
}

/// Failures while encoding or decoding a context document. Decode failures
/// reject the whole document.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("malformed document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("component at {location} has no `kind` discriminator")]
    MissingKind { location: String },

    #[error("component at {location} has unknown kind `{kind}`")]
    UnknownKind { location: String, kind: String },

    #[error("component kind `{kind}` at {location} is transient and cannot be decoded")]
    NotSerializable { location: String, kind: String },

    #[error("component `{kind}` at {location} failed to decode: {source}")]
    InvalidFields {
        location: String,
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("component `{kind}` failed to encode: {source}")]
    Encode {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("component at {location} is not a JSON object")]
    NotAnObject { location: String },

    #[error(transparent)]
    Asset(#[from] AssetError),
}

/// Failures of a [`TextSource`](crate::asset::TextSource) or [`TextSink`](crate::asset::TextSink).
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("no document stored under key `{0}`")]
    NotFound(String),

    #[error("invalid document key `{0}`")]
    InvalidKey(String),

    #[error("I/O error on `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures while loading a [`SkaldConfig`](crate::config::SkaldConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}
