//! # TypeRegistry — Worlds, Rosters, and Component Kinds
//!
//! The registry is the static type universe: which component kinds exist,
//! how each one is encoded, and which worlds exist with which roster. It is
//! assembled once through a [`RegistryBuilder`] and then frozen; nothing is
//! discovered at runtime.
//!
//! ```ignore
//! let registry = RegistryBuilder::new()
//!     .component::<Position>()
//!     .component::<Velocity>()
//!     .transient::<Selected>()
//!     .world("Game", &["Position", "Velocity", "Selected"])
//!     .build()?;
//! ```
//!
//! ## Encoding shapes
//!
//! Every serializable kind is written as a JSON object tagged with
//! `"kind"`. How the rest of the object looks depends on the serde form of
//! each value being written, so two values of one kind may differ:
//!
//! ```text
//! struct Position { x, y }  → { "kind": "Position", "x": 1.0, "y": 2.0 }
//! struct Tag;               → { "kind": "Tag" }
//! struct Health(u32);       → { "kind": "Health", "value": 100 }
//! Maybe(None)               → { "kind": "Maybe" }
//! Maybe(Some(3))            → { "kind": "Maybe", "value": 3 }
//! struct Empty {}           → { "kind": "Empty", "value": {} }
//! struct Slot { value }     → { "kind": "Slot", "value": { "value": 1 } }
//! ```
//!
//! An object is flattened only when it is non-empty and has no field named
//! `kind` or `value`. Decoding reverses this: a lone `"value"` is the
//! payload, an empty remainder is `null`, anything else is the object.

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, OnceLock};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::ecs::{BoxedComponent, Component, ComponentValue};
use crate::error::RegistryError;

/// Wire key carrying the component kind.
pub const KIND_KEY: &str = "kind";
/// Wire key carrying non-object component payloads.
pub const VALUE_KEY: &str = "value";

static GLOBAL: OnceLock<Arc<TypeRegistry>> = OnceLock::new();

/// A world declared at compile time.
///
/// ```ignore
/// struct Game;
/// impl WorldType for Game {
///     const NAME: &'static str = "Game";
///     const ROSTER: &'static [&'static str] = &["Position", "Velocity"];
/// }
/// ```
pub trait WorldType {
    const NAME: &'static str;
    const ROSTER: &'static [&'static str];
}

// ── Component kinds ──────────────────────────────────────────────────────

/// How a value's fields sit next to the `"kind"` discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Fields are flattened into the tagged object.
    Fields,
    /// No payload at all.
    Unit,
    /// The serde value is stored under `"value"`.
    Value,
}

impl Shape {
    /// The layout used for one serde value.
    pub fn of(json: &Value) -> Shape {
        match json {
            Value::Null => Shape::Unit,
            Value::Object(fields)
                if !fields.is_empty()
                    && !fields.contains_key(KIND_KEY)
                    && !fields.contains_key(VALUE_KEY) =>
            {
                Shape::Fields
            }
            _ => Shape::Value,
        }
    }
}

type EncodeFn = fn(&dyn ComponentValue) -> Result<Value, serde_json::Error>;
type DecodeFn = fn(Value) -> Result<BoxedComponent, serde_json::Error>;

#[derive(Clone, Copy)]
struct KindCodec {
    encode: EncodeFn,
    decode: DecodeFn,
    shape: Shape,
}

/// Metadata of one registered component kind.
#[derive(Clone)]
pub struct ComponentKind {
    name: &'static str,
    type_id: TypeId,
    type_name: &'static str,
    make_default: fn() -> BoxedComponent,
    codec: Option<KindCodec>,
}

impl ComponentKind {
    /// The wire name, `Component::KIND`.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Whether values of this kind are persisted by the codec.
    pub fn is_serializable(&self) -> bool {
        self.codec.is_some()
    }

    /// Layout of the kind's default value. Other values may encode
    /// differently, see [`Shape::of`]. `None` for transient kinds.
    pub fn shape(&self) -> Option<Shape> {
        self.codec.map(|codec| codec.shape)
    }

    /// A freshly constructed `T::default()`.
    pub fn default_value(&self) -> BoxedComponent {
        (self.make_default)()
    }

    /// Serde form of `value`; `None` for transient kinds.
    pub(crate) fn encode(&self, value: &dyn ComponentValue) -> Option<Result<Value, serde_json::Error>> {
        self.codec.map(|codec| (codec.encode)(value))
    }

    /// Rebuild a value from its serde form; `None` for transient kinds.
    pub(crate) fn decode(&self, value: Value) -> Option<Result<BoxedComponent, serde_json::Error>> {
        self.codec.map(|codec| (codec.decode)(value))
    }
}

impl fmt::Debug for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentKind")
            .field("name", &self.name)
            .field("type", &self.type_name)
            .field("shape", &self.shape())
            .finish()
    }
}

// ── Rosters and worlds ───────────────────────────────────────────────────

/// A world's fixed, ordered list of component kinds. A kind's slot index is
/// its position in this list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    kinds: Vec<&'static str>,
    index: HashMap<&'static str, usize>,
}

impl Roster {
    fn new(kinds: Vec<&'static str>) -> Self {
        let index = kinds.iter().enumerate().map(|(i, &kind)| (kind, i)).collect();
        Self { kinds, index }
    }

    /// Slot index of `kind`, or `None` when the world does not store it.
    pub fn index_of(&self, kind: &str) -> Option<usize> {
        self.index.get(kind).copied()
    }

    /// Kind stored in slot `index`.
    pub fn kind_at(&self, index: usize) -> Option<&'static str> {
        self.kinds.get(index).copied()
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.index.contains_key(kind)
    }

    /// Kinds in slot order.
    pub fn kinds(&self) -> &[&'static str] {
        &self.kinds
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

/// A registered world: its name and roster.
#[derive(Debug, Clone)]
pub struct WorldInfo {
    id: usize,
    name: String,
    roster: Roster,
}

impl WorldInfo {
    /// Position in registration order.
    pub fn id(&self) -> usize {
        self.id
    }

    /// The name documents use in their `"context"` field.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }
}

// ── Builder ──────────────────────────────────────────────────────────────

/// Collects component kinds and worlds, then validates them in [`build`](Self::build).
#[derive(Default)]
pub struct RegistryBuilder {
    kinds: Vec<ComponentKind>,
    worlds: Vec<(String, Vec<String>)>,
    errors: Vec<RegistryError>,
}

impl RegistryBuilder {
    /// An empty builder. Same as [`TypeRegistry::builder`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a serializable component kind.
    pub fn component<T>(mut self) -> Self
    where
        T: Component + Serialize + DeserializeOwned,
    {
        let shape = match serde_json::to_value(T::default()) {
            Ok(value) => Shape::of(&value),
            Err(e) => {
                self.errors.push(RegistryError::UnencodableDefault {
                    kind: T::KIND.to_string(),
                    reason: e.to_string(),
                });
                return self;
            }
        };

        let codec = KindCodec {
            encode: |value| match value.downcast_ref::<T>() {
                Some(value) => serde_json::to_value(value),
                None => Err(serde::ser::Error::custom(format!(
                    "expected `{}`, got `{}`",
                    T::KIND,
                    value.kind()
                ))),
            },
            decode: |json| {
                let value: T = serde_json::from_value(json)?;
                Ok(Box::new(value) as BoxedComponent)
            },
            shape,
        };

        self.kinds.push(Self::kind::<T>(Some(codec)));
        self
    }

    /// Register a component kind that is never persisted.
    pub fn transient<T: Component>(mut self) -> Self {
        self.kinds.push(Self::kind::<T>(None));
        self
    }

    /// Declare a world whose roster is `kinds`, in slot order.
    pub fn world(mut self, name: impl Into<String>, kinds: &[&str]) -> Self {
        self.worlds
            .push((name.into(), kinds.iter().map(|k| k.to_string()).collect()));
        self
    }

    /// Declare a world from its [`WorldType`].
    pub fn world_type<W: WorldType>(self) -> Self {
        self.world(W::NAME, W::ROSTER)
    }

    fn kind<T: Component>(codec: Option<KindCodec>) -> ComponentKind {
        ComponentKind {
            name: T::KIND,
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            make_default: || Box::new(T::default()) as BoxedComponent,
            codec,
        }
    }

    /// Validate and freeze. Reports the first problem found.
    pub fn build(self) -> Result<TypeRegistry, RegistryError> {
        if let Some(error) = self.errors.into_iter().next() {
            return Err(error);
        }

        let mut kinds_by_name = HashMap::with_capacity(self.kinds.len());
        for kind in self.kinds {
            if kinds_by_name.contains_key(kind.name) {
                return Err(RegistryError::DuplicateComponent(kind.name.to_string()));
            }
            kinds_by_name.insert(kind.name, kind);
        }

        let mut worlds = Vec::with_capacity(self.worlds.len());
        let mut worlds_by_name = HashMap::with_capacity(self.worlds.len());
        for (name, roster_names) in self.worlds {
            if name.is_empty() {
                return Err(RegistryError::EmptyWorldName);
            }
            if worlds_by_name.contains_key(&name) {
                return Err(RegistryError::DuplicateWorld(name));
            }

            let mut seen = HashSet::new();
            let mut roster = Vec::with_capacity(roster_names.len());
            for kind_name in roster_names {
                let Some(kind) = kinds_by_name.get(kind_name.as_str()) else {
                    return Err(RegistryError::UnknownRosterKind {
                        world: name,
                        kind: kind_name,
                    });
                };
                if !seen.insert(kind.name) {
                    return Err(RegistryError::DuplicateRosterKind {
                        world: name,
                        kind: kind_name,
                    });
                }
                roster.push(kind.name);
            }

            let id = worlds.len();
            worlds_by_name.insert(name.clone(), id);
            worlds.push(WorldInfo {
                id,
                name,
                roster: Roster::new(roster),
            });
        }

        log::debug!(
            "type registry built: {} component kinds, {} worlds",
            kinds_by_name.len(),
            worlds.len()
        );

        Ok(TypeRegistry {
            kinds: kinds_by_name,
            worlds,
            worlds_by_name,
        })
    }
}

// ── Registry ─────────────────────────────────────────────────────────────

/// The frozen type universe. Share it with `Arc`; it never changes.
pub struct TypeRegistry {
    kinds: HashMap<&'static str, ComponentKind>,
    worlds: Vec<WorldInfo>,
    worlds_by_name: HashMap<String, usize>,
}

impl TypeRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Unknown names are logged and yield `None`.
    pub fn lookup_world(&self, name: &str) -> Option<&WorldInfo> {
        let info = self.find_world(name);
        if info.is_none() {
            log::warn!("\"{name}\" is not a registered world");
        }
        info
    }

    /// Like [`lookup_world`](Self::lookup_world) but silent.
    pub fn find_world(&self, name: &str) -> Option<&WorldInfo> {
        self.worlds_by_name.get(name).map(|&id| &self.worlds[id])
    }

    /// Returns `true` if a world called `name` is registered. Never logs.
    pub fn contains_world(&self, name: &str) -> bool {
        self.worlds_by_name.contains_key(name)
    }

    /// Metadata for the component kind called `name`, serializable or not.
    pub fn lookup_component(&self, name: &str) -> Option<&ComponentKind> {
        self.kinds.get(name)
    }

    /// All worlds in registration order.
    pub fn all_worlds(&self) -> &[WorldInfo] {
        &self.worlds
    }

    pub(crate) fn world_at(&self, id: usize) -> &WorldInfo {
        &self.worlds[id]
    }

    /// All component kind names, sorted.
    pub fn component_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.kinds.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// A fresh default value of `kind`.
    pub fn default_value(&self, kind: &str) -> Option<BoxedComponent> {
        self.kinds.get(kind).map(ComponentKind::default_value)
    }

    /// Whether `kind` is registered and persisted.
    pub fn is_serializable(&self, kind: &str) -> bool {
        self.kinds.get(kind).is_some_and(ComponentKind::is_serializable)
    }

    /// Make `registry` the process-wide registry. Only the first call succeeds.
    pub fn install_global(registry: Arc<TypeRegistry>) -> Result<(), RegistryError> {
        GLOBAL
            .set(registry)
            .map_err(|_| RegistryError::GlobalAlreadyInstalled)
    }

    /// The registry installed by [`install_global`](Self::install_global).
    pub fn global() -> Option<Arc<TypeRegistry>> {
        GLOBAL.get().cloned()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("kinds", &self.component_names())
            .field("worlds", &self.worlds)
            .finish()
    }
}
