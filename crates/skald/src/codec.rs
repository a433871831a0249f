//! # Context Documents — Save, Load, Merge, Validate
//!
//! Converts worlds to and from a portable JSON document. A document is a list
//! of [`ContextData`] records, one per world; each entity is a list of
//! components tagged with their kind.
//!
//! ```json
//! [
//!   {
//!     "context": "Game",
//!     "entities": [
//!       [ { "kind": "Position", "x": 1.0, "y": 2.0 }, { "kind": "Tag" } ],
//!       [ { "kind": "Health", "value": 100 } ]
//!     ]
//!   }
//! ]
//! ```
//!
//! Components are listed by value, not by slot index, so documents survive
//! roster reordering. Transient kinds are never written.
//!
//! ## Quick Start
//!
//! ```ignore
//! let codec = ContextDataCodec::new(registry.clone()).with_pretty(true);
//! let text = codec.save_to_text(&contexts)?;
//!
//! let mut fresh = Contexts::new(registry);
//! let report = codec.load_from_text(&mut fresh, &text)?;
//! ```
//!
//! Decoding is all-or-nothing: the whole document is decoded before any
//! entity is created, so a malformed document leaves the worlds untouched.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::asset::{DirectorySource, DocumentWatcher, TextSink, TextSource};
use crate::config::SkaldConfig;
use crate::context::Contexts;
use crate::ecs::{BoxedComponent, ComponentValue, Entity, World};
use crate::error::{CodecError, WorldError};
use crate::registry::{KIND_KEY, Shape, TypeRegistry, VALUE_KEY};

// ── ContextData ──────────────────────────────────────────────────────────

/// The entities of one world, listed by component value.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextData {
    pub context: String,
    pub entities: Vec<Vec<BoxedComponent>>,
}

impl ContextData {
    /// A record for world `context`. Each inner list is one entity.
    pub fn new(context: impl Into<String>, entities: Vec<Vec<BoxedComponent>>) -> Self {
        Self {
            context: context.into(),
            entities,
        }
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }
}

/// JSON form of a [`ContextData`], components still untyped.
#[derive(Debug, Serialize, Deserialize)]
struct WireRecord {
    context: String,
    #[serde(default)]
    entities: Vec<Vec<Value>>,
}

fn location(record: usize, entity: usize, component: usize) -> String {
    format!("[{record}].entities[{entity}][{component}]")
}

// ── Reports ──────────────────────────────────────────────────────────────

/// What a load did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Created entities per world name.
    pub created: BTreeMap<String, Vec<Entity>>,
    pub components_added: usize,
    /// Values dropped because the entity already held their kind.
    pub duplicates: usize,
    /// Values dropped because their kind is not in the world's roster.
    pub skipped_kinds: usize,
    /// Records whose world is not registered. These records were not applied.
    pub unknown_worlds: Vec<String>,
}

impl LoadReport {
    pub fn entity_count(&self) -> usize {
        self.created.values().map(Vec::len).sum()
    }

    /// Nothing was dropped.
    pub fn is_clean(&self) -> bool {
        self.duplicates == 0 && self.skipped_kinds == 0 && self.unknown_worlds.is_empty()
    }
}

/// A defect found by [`ContextDataCodec::validate`]. `entity` is the position
/// of the entity inside its record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Problem {
    EmptyWorldName,
    UnknownWorld(String),
    KindNotInRoster { entity: usize, kind: String },
    NotSerializable { entity: usize, kind: String },
    DuplicateKind { entity: usize, kind: String },
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Problem::EmptyWorldName => write!(f, "record has no world name"),
            Problem::UnknownWorld(name) => write!(f, "\"{name}\" is not a registered world"),
            Problem::KindNotInRoster { entity, kind } => {
                write!(f, "entity {entity}: `{kind}` is not in the world's roster")
            }
            Problem::NotSerializable { entity, kind } => {
                write!(f, "entity {entity}: `{kind}` is transient")
            }
            Problem::DuplicateKind { entity, kind } => {
                write!(f, "entity {entity}: `{kind}` appears more than once")
            }
        }
    }
}

// ── Codec ────────────────────────────────────────────────────────────────

/// Moves world contents in and out of context documents.
#[derive(Debug, Clone)]
pub struct ContextDataCodec {
    registry: Arc<TypeRegistry>,
    pretty: bool,
}

impl ContextDataCodec {
    /// Writes compact JSON. See [`with_pretty`](Self::with_pretty).
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self {
            registry,
            pretty: false,
        }
    }

    /// Uses [`SkaldConfig::pretty`].
    pub fn from_config(registry: Arc<TypeRegistry>, config: &SkaldConfig) -> Self {
        Self::new(registry).with_pretty(config.pretty)
    }

    /// Indent encoded documents.
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    // ── Collect ──────────────────────────────────────────────────────

    /// One record per world, keeping serializable components in add order.
    /// Entities without any serializable component are left out.
    pub fn collect<'w>(&self, worlds: impl IntoIterator<Item = &'w World>) -> Vec<ContextData> {
        worlds
            .into_iter()
            .map(|world| {
                let entities: Vec<Vec<BoxedComponent>> = world
                    .iter()
                    .map(|(_, slots)| {
                        slots
                            .components()
                            .filter(|value| self.registry.is_serializable(value.kind()))
                            .map(|value| value.clone_boxed())
                            .collect::<Vec<_>>()
                    })
                    .filter(|components| !components.is_empty())
                    .collect();
                log::debug!(
                    "collected {} of {} entities from world `{}`",
                    entities.len(),
                    world.entity_count(),
                    world.name()
                );
                ContextData::new(world.name(), entities)
            })
            .collect()
    }

    /// [`collect`](Self::collect) over every instantiated world.
    pub fn collect_all(&self, contexts: &Contexts) -> Vec<ContextData> {
        self.collect(contexts.worlds())
    }

    // ── Encode ───────────────────────────────────────────────────────

    /// Write records as a document. Transient values have no encoder, so
    /// they fail with `NotSerializable`; [`collect`](Self::collect) already
    /// leaves them out.
    pub fn encode(&self, records: &[ContextData]) -> Result<String, CodecError> {
        let wire = records
            .iter()
            .enumerate()
            .map(|(i, record)| self.encode_record(i, &record.context, &record.entities))
            .collect::<Result<Vec<_>, _>>()?;
        self.to_text(&wire)
    }

    /// Encode an explicit entity list as a one-record document.
    pub fn encode_entities(
        &self,
        world: &str,
        entities: &[Vec<BoxedComponent>],
    ) -> Result<String, CodecError> {
        let wire = self.encode_record(0, world, entities)?;
        self.to_text(&[wire])
    }

    fn to_text(&self, wire: &[WireRecord]) -> Result<String, CodecError> {
        let text = if self.pretty {
            serde_json::to_string_pretty(wire)?
        } else {
            serde_json::to_string(wire)?
        };
        Ok(text)
    }

    fn encode_record(
        &self,
        index: usize,
        world: &str,
        entities: &[Vec<BoxedComponent>],
    ) -> Result<WireRecord, CodecError> {
        let entities = entities
            .iter()
            .enumerate()
            .map(|(j, components)| {
                components
                    .iter()
                    .enumerate()
                    .map(|(k, value)| self.encode_component(&**value, || location(index, j, k)))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(WireRecord {
            context: world.to_string(),
            entities,
        })
    }

    /// Tagged JSON object of one value.
    pub fn encode_component(
        &self,
        value: &dyn ComponentValue,
        location: impl FnOnce() -> String,
    ) -> Result<Value, CodecError> {
        let Some(kind) = self.registry.lookup_component(value.kind()) else {
            return Err(CodecError::UnknownKind {
                location: location(),
                kind: value.kind().to_string(),
            });
        };
        let Some(encoded) = kind.encode(value) else {
            return Err(CodecError::NotSerializable {
                location: location(),
                kind: kind.name().to_string(),
            });
        };
        let json = encoded.map_err(|source| CodecError::Encode {
            kind: kind.name().to_string(),
            source,
        })?;

        let mut object = Map::new();
        object.insert(KIND_KEY.to_string(), Value::String(kind.name().to_string()));
        match (Shape::of(&json), json) {
            (Shape::Fields, Value::Object(fields)) => object.extend(fields),
            (Shape::Unit, _) => {}
            (_, other) => {
                object.insert(VALUE_KEY.to_string(), other);
            }
        }
        Ok(Value::Object(object))
    }

    // ── Decode ───────────────────────────────────────────────────────

    /// Parse a document. Any malformed, unknown, or transient component
    /// rejects the whole document.
    pub fn decode(&self, text: &str) -> Result<Vec<ContextData>, CodecError> {
        let wire: Vec<WireRecord> = serde_json::from_str(text)?;
        wire.into_iter()
            .enumerate()
            .map(|(i, record)| -> Result<ContextData, CodecError> {
                let entities = record
                    .entities
                    .into_iter()
                    .enumerate()
                    .map(|(j, components)| {
                        components
                            .into_iter()
                            .enumerate()
                            .map(|(k, json)| self.decode_component(location(i, j, k), json))
                            .collect::<Result<Vec<_>, _>>()
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ContextData::new(record.context, entities))
            })
            .collect()
    }

    /// Rebuild one value from its tagged JSON object.
    pub fn decode_component(&self, location: String, json: Value) -> Result<BoxedComponent, CodecError> {
        let Value::Object(mut object) = json else {
            return Err(CodecError::NotAnObject { location });
        };
        let Some(Value::String(name)) = object.remove(KIND_KEY) else {
            return Err(CodecError::MissingKind { location });
        };
        let Some(kind) = self.registry.lookup_component(&name) else {
            return Err(CodecError::UnknownKind { location, kind: name });
        };

        if !kind.is_serializable() {
            return Err(CodecError::NotSerializable { location, kind: name });
        }

        // Inverse of `Shape::of`: a lone `value` is the payload itself.
        let payload = match object.remove(VALUE_KEY) {
            Some(value) if object.is_empty() => value,
            Some(value) => {
                object.insert(VALUE_KEY.to_string(), value);
                Value::Object(object)
            }
            None if object.is_empty() => Value::Null,
            None => Value::Object(object),
        };
        match kind.decode(payload) {
            Some(Ok(value)) => Ok(value),
            Some(Err(source)) => Err(CodecError::InvalidFields {
                location,
                kind: name,
                source,
            }),
            None => Err(CodecError::NotSerializable { location, kind: name }),
        }
    }

    // ── Load ─────────────────────────────────────────────────────────

    /// Create one entity per entity record. Loading adds to whatever the
    /// worlds already hold.
    pub fn apply(&self, contexts: &mut Contexts, records: Vec<ContextData>) -> LoadReport {
        let mut report = LoadReport::default();
        for record in records {
            let Some(world) = contexts.instance(&record.context) else {
                report.unknown_worlds.push(record.context);
                continue;
            };

            let mut created = Vec::with_capacity(record.entities.len());
            for components in record.entities {
                let entity = world.create_entity();
                for value in components {
                    match world.add_component(entity, value) {
                        Ok(true) => report.components_added += 1,
                        Ok(false) => report.duplicates += 1,
                        Err(WorldError::KindNotInRoster { world: name, kind }) => {
                            log::warn!("component `{kind}` is not defined in world `{name}`, skipped");
                            report.skipped_kinds += 1;
                        }
                        Err(e) => log::warn!("{e}"),
                    }
                }
                created.push(entity);
            }

            report
                .created
                .entry(world.name().to_string())
                .or_default()
                .extend(created);
        }
        report
    }

    /// [`decode`](Self::decode) then [`apply`](Self::apply). On a decode error
    /// no world is touched.
    pub fn load_from_text(&self, contexts: &mut Contexts, text: &str) -> Result<LoadReport, CodecError> {
        let records = self.decode(text)?;
        let report = self.apply(contexts, records);
        log::info!(
            "loaded {} entities into {} worlds ({} duplicate, {} skipped components)",
            report.entity_count(),
            report.created.len(),
            report.duplicates,
            report.skipped_kinds
        );
        Ok(report)
    }

    /// Collect every instantiated world and encode the result.
    pub fn save_to_text(&self, contexts: &Contexts) -> Result<String, CodecError> {
        let records = self.collect_all(contexts);
        let text = self.encode(&records)?;
        log::info!(
            "saved {} entities from {} worlds",
            records.iter().map(ContextData::entity_count).sum::<usize>(),
            records.len()
        );
        Ok(text)
    }

    /// Fetch document `key` from `source` and load it.
    pub fn load_key(
        &self,
        contexts: &mut Contexts,
        source: &impl TextSource,
        key: &str,
    ) -> Result<LoadReport, CodecError> {
        let text = source.fetch(key)?;
        log::debug!("fetched document `{key}`");
        self.load_from_text(contexts, &text)
    }

    pub fn save_key(&self, contexts: &Contexts, sink: &mut impl TextSink, key: &str) -> Result<(), CodecError> {
        let text = self.save_to_text(contexts)?;
        sink.store(key, &text)?;
        Ok(())
    }

    // ── Reload ───────────────────────────────────────────────────────

    /// Replace the contents of every world named in document `key`.
    ///
    /// Worlds the document does not mention are left alone. The document is
    /// decoded before anything is cleared, so a broken edit keeps the
    /// previous entities.
    pub fn reload_key(
        &self,
        contexts: &mut Contexts,
        source: &impl TextSource,
        key: &str,
    ) -> Result<LoadReport, CodecError> {
        let records = self.decode(&source.fetch(key)?)?;
        for record in &records {
            if let Some(world) = contexts.get_mut(&record.context) {
                world.clear();
            }
        }
        let report = self.apply(contexts, records);
        log::info!("reloaded `{key}`: {} entities", report.entity_count());
        Ok(report)
    }

    /// Reload the watched documents whose files changed since the last call.
    /// A document that fails to reload is logged and skipped.
    pub fn reload_changed(
        &self,
        contexts: &mut Contexts,
        watcher: &mut DocumentWatcher,
        source: &DirectorySource,
    ) -> Vec<(String, LoadReport)> {
        let mut reloaded = Vec::new();
        for key in watcher.poll_ready() {
            match self.reload_key(contexts, source, &key) {
                Ok(report) => reloaded.push((key, report)),
                Err(e) => log::warn!("Failed to reload document `{key}`: {e}"),
            }
        }
        reloaded
    }

    // ── Editing ──────────────────────────────────────────────────────

    /// A starter record: one entity holding the default value of the
    /// world's first serializable kind.
    pub fn template(&self, world: &str) -> Option<ContextData> {
        let info = self.registry.lookup_world(world)?;
        let kind = info
            .roster()
            .kinds()
            .iter()
            .find(|kind| self.registry.is_serializable(kind))?;
        let value = self.registry.default_value(kind)?;
        Some(ContextData::new(info.name(), vec![vec![value]]))
    }

    /// Every problem `record` would hit on load. An empty result means the
    /// record loads cleanly.
    pub fn validate(&self, record: &ContextData) -> Vec<Problem> {
        if record.context.is_empty() {
            return vec![Problem::EmptyWorldName];
        }
        let Some(info) = self.registry.find_world(&record.context) else {
            return vec![Problem::UnknownWorld(record.context.clone())];
        };

        let mut problems = Vec::new();
        for (entity, components) in record.entities.iter().enumerate() {
            let mut seen: Vec<&str> = Vec::with_capacity(components.len());
            for value in components {
                let kind = value.kind();
                if !info.roster().contains(kind) {
                    problems.push(Problem::KindNotInRoster {
                        entity,
                        kind: kind.to_string(),
                    });
                } else if !self.registry.is_serializable(kind) {
                    problems.push(Problem::NotSerializable {
                        entity,
                        kind: kind.to_string(),
                    });
                }
                if seen.contains(&kind) {
                    problems.push(Problem::DuplicateKind {
                        entity,
                        kind: kind.to_string(),
                    });
                } else {
                    seen.push(kind);
                }
            }
        }
        problems
    }

    /// At least one record, and no record has problems.
    pub fn is_valid(&self, records: &[ContextData]) -> bool {
        !records.is_empty() && records.iter().all(|record| self.validate(record).is_empty())
    }
}

/// Fold `incoming` into `existing`. A record for a new world is appended.
/// For a known world, each incoming entity is appended unless an equal
/// entity is already listed.
pub fn merge(existing: &mut Vec<ContextData>, incoming: impl IntoIterator<Item = ContextData>) {
    for record in incoming {
        match existing.iter_mut().find(|known| known.context == record.context) {
            Some(known) => {
                for entity in record.entities {
                    if !known.entities.contains(&entity) {
                        known.entities.push(entity);
                    }
                }
            }
            None => existing.push(record),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    use super::*;
    use crate::asset::MemorySource;
    use crate::components;
    use crate::ecs::Component;
    use crate::registry::RegistryBuilder;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Position {
        x: f32,
        y: f32,
    }
    impl Component for Position {
        const KIND: &'static str = "Position";
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Tag;
    impl Component for Tag {
        const KIND: &'static str = "Tag";
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Health(u32);
    impl Component for Health {
        const KIND: &'static str = "Health";
    }

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Selected;
    impl Component for Selected {
        const KIND: &'static str = "Selected";
    }

    fn registry() -> Arc<TypeRegistry> {
        Arc::new(
            RegistryBuilder::new()
                .component::<Position>()
                .component::<Tag>()
                .component::<Health>()
                .transient::<Selected>()
                .world("Game", &["Position", "Tag", "Health", "Selected"])
                .world("Menu", &["Tag"])
                .world("Cursor", &["Selected"])
                .build()
                .unwrap(),
        )
    }

    fn codec() -> ContextDataCodec {
        ContextDataCodec::new(registry())
    }

    #[test]
    fn encodes_every_shape_with_kind() {
        let codec = codec();
        let text = codec
            .encode_entities(
                "Game",
                &[components![Position { x: 1.0, y: 2.0 }, Tag, Health(7)]],
            )
            .unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            value,
            json!([{
                "context": "Game",
                "entities": [[
                    { "kind": "Position", "x": 1.0, "y": 2.0 },
                    { "kind": "Tag" },
                    { "kind": "Health", "value": 7 }
                ]]
            }])
        );
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Maybe(Option<u32>);
    impl Component for Maybe {
        const KIND: &'static str = "Maybe";
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    enum Outline {
        Circle { radius: f32 },
        Square,
        Scaled(f32),
    }
    impl Default for Outline {
        fn default() -> Self {
            Outline::Circle { radius: 1.0 }
        }
    }
    impl Component for Outline {
        const KIND: &'static str = "Outline";
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Slot {
        value: u32,
        kind: String,
    }
    impl Component for Slot {
        const KIND: &'static str = "Slot";
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Empty {}
    impl Component for Empty {
        const KIND: &'static str = "Empty";
    }

    fn shapes_codec() -> ContextDataCodec {
        let registry = RegistryBuilder::new()
            .component::<Maybe>()
            .component::<Outline>()
            .component::<Slot>()
            .component::<Empty>()
            .world("Shapes", &["Maybe", "Outline", "Slot", "Empty"])
            .build()
            .unwrap();
        ContextDataCodec::new(Arc::new(registry))
    }

    #[test]
    fn layout_follows_each_value() {
        let codec = shapes_codec();
        let encoded = |value: BoxedComponent| codec.encode_component(&*value, String::new).unwrap();

        assert_eq!(encoded(Box::new(Maybe(None))), json!({ "kind": "Maybe" }));
        assert_eq!(encoded(Box::new(Maybe(Some(3)))), json!({ "kind": "Maybe", "value": 3 }));
        assert_eq!(
            encoded(Box::new(Outline::default())),
            json!({ "kind": "Outline", "Circle": { "radius": 1.0 } })
        );
        assert_eq!(encoded(Box::new(Outline::Square)), json!({ "kind": "Outline", "value": "Square" }));
        assert_eq!(
            encoded(Box::new(Slot { value: 2, kind: "a".into() })),
            json!({ "kind": "Slot", "value": { "value": 2, "kind": "a" } })
        );
        assert_eq!(encoded(Box::new(Empty {})), json!({ "kind": "Empty", "value": {} }));
    }

    #[test]
    fn values_of_every_layout_decode_back() {
        let codec = shapes_codec();
        let values: Vec<BoxedComponent> = vec![
            Box::new(Maybe(Some(3))),
            Box::new(Maybe(None)),
            Box::new(Outline::Square),
            Box::new(Outline::Scaled(0.5)),
            Box::new(Outline::Circle { radius: 4.0 }),
            Box::new(Slot { value: 9, kind: "b".into() }),
            Box::new(Empty {}),
        ];
        for value in values {
            let json = codec.encode_component(&*value, String::new).unwrap();
            let back = codec.decode_component("[0]".into(), json.clone()).unwrap();
            assert!(*back == *value, "{json} decoded to {back:?}");
        }
    }

    #[test]
    fn transient_components_are_not_written() {
        let codec = codec();
        let mut contexts = Contexts::new(codec.registry().clone());
        let game = contexts.instance("Game").unwrap();
        game.create_entity_with(components![Selected, Position { x: 3.0, y: 0.0 }]);
        game.create_entity_with(components![Selected]);
        contexts.instance("Cursor").unwrap().create_entity_with(components![Selected]);

        let value: Value = serde_json::from_str(&codec.save_to_text(&contexts).unwrap()).unwrap();
        assert_eq!(
            value,
            json!([
                { "context": "Game", "entities": [[{ "kind": "Position", "x": 3.0, "y": 0.0 }]] },
                { "context": "Cursor", "entities": [] }
            ])
        );
    }

    #[test]
    fn decode_resolves_kinds() {
        let codec = codec();
        let records = codec
            .decode(
                &json!([{
                    "context": "Game",
                    "entities": [[{ "kind": "Health", "value": 3 }, { "kind": "Tag" }]]
                }])
                .to_string(),
            )
            .unwrap();
        assert_eq!(
            records,
            vec![ContextData::new("Game", vec![components![Health(3), Tag]])]
        );
    }

    #[test]
    fn decode_failures_reject_the_document() {
        let codec = codec();
        let decode = |doc: Value| codec.decode(&doc.to_string()).unwrap_err();

        let doc = |component: Value| json!([{ "context": "Game", "entities": [[{ "kind": "Tag" }, component]] }]);
        assert!(matches!(
            decode(doc(json!({ "x": 1.0 }))),
            CodecError::MissingKind { location } if location == "[0].entities[0][1]"
        ));
        assert!(matches!(decode(doc(json!({ "kind": "Ghost" }))), CodecError::UnknownKind { .. }));
        assert!(matches!(decode(doc(json!({ "kind": "Selected" }))), CodecError::NotSerializable { .. }));
        assert!(matches!(
            decode(doc(json!({ "kind": "Position", "x": "left" }))),
            CodecError::InvalidFields { .. }
        ));
        assert!(matches!(decode(doc(json!(5))), CodecError::NotAnObject { .. }));
        assert!(matches!(codec.decode("{ not json"), Err(CodecError::Json(_))));
    }

    #[test]
    fn failed_decode_creates_nothing() {
        let codec = codec();
        let mut contexts = Contexts::new(codec.registry().clone());
        let doc = json!([
            { "context": "Menu", "entities": [[{ "kind": "Tag" }]] },
            { "context": "Game", "entities": [[{ "kind": "Ghost" }]] }
        ]);
        assert!(codec.load_from_text(&mut contexts, &doc.to_string()).is_err());
        assert!(contexts.get("Menu").is_none());
    }

    #[test]
    fn load_reports_dropped_values() {
        let codec = codec();
        let mut contexts = Contexts::new(codec.registry().clone());
        let records = vec![
            ContextData::new("Menu", vec![components![Tag, Tag, Health(1)], vec![]]),
            ContextData::new("Nowhere", vec![components![Tag]]),
        ];
        let report = codec.apply(&mut contexts, records);

        assert_eq!(report.entity_count(), 2);
        assert_eq!(report.components_added, 1);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.skipped_kinds, 1);
        assert_eq!(report.unknown_worlds, ["Nowhere"]);
        assert!(!report.is_clean());

        let menu = contexts.get("Menu").unwrap();
        let first = report.created["Menu"][0];
        assert_eq!(menu.occupied_indexes(first), &[0]);
    }

    #[test]
    fn load_key_reads_from_source() {
        let codec = codec();
        let source = MemorySource::new().with(
            "menu.json",
            json!([{ "context": "Menu", "entities": [[{ "kind": "Tag" }]] }]).to_string(),
        );
        let mut contexts = Contexts::new(codec.registry().clone());
        let report = codec.load_key(&mut contexts, &source, "menu.json").unwrap();
        assert!(report.is_clean());
        assert_eq!(contexts.get("Menu").unwrap().entity_count(), 1);
        assert!(matches!(
            codec.load_key(&mut contexts, &source, "other.json"),
            Err(CodecError::Asset(_))
        ));
    }

    #[test]
    fn reload_replaces_named_worlds() {
        let codec = codec();
        let mut contexts = Contexts::new(codec.registry().clone());
        let old = contexts.instance("Menu").unwrap().create_entity_with(components![Tag]);
        contexts
            .instance("Game")
            .unwrap()
            .create_entity_with(components![Health(5)]);

        let mut source = MemorySource::new().with(
            "menu.json",
            json!([{ "context": "Menu", "entities": [[{ "kind": "Tag" }], [{ "kind": "Tag" }]] }]).to_string(),
        );
        let report = codec.reload_key(&mut contexts, &source, "menu.json").unwrap();
        assert_eq!(report.entity_count(), 2);

        let menu = contexts.get("Menu").unwrap();
        assert_eq!(menu.entity_count(), 2);
        assert!(!menu.is_alive(old));
        assert_eq!(contexts.get("Game").unwrap().entity_count(), 1);

        source.store("menu.json", "[{ \"context\": \"Menu\"").unwrap();
        assert!(codec.reload_key(&mut contexts, &source, "menu.json").is_err());
        assert_eq!(contexts.get("Menu").unwrap().entity_count(), 2);
    }

    #[test]
    fn save_key_writes_to_sink() {
        let codec = codec().with_pretty(true);
        let mut contexts = Contexts::new(codec.registry().clone());
        contexts.instance("Menu").unwrap().create_entity_with(components![Tag]);
        let mut sink = MemorySource::new();
        codec.save_key(&contexts, &mut sink, "out.json").unwrap();
        let text = sink.get("out.json").unwrap();
        assert!(text.contains('\n'));
        assert_eq!(codec.decode(text).unwrap()[0].entity_count(), 1);
    }

    #[test]
    fn validate_flags_each_problem() {
        let codec = codec();
        assert_eq!(
            codec.validate(&ContextData::new("", vec![])),
            [Problem::EmptyWorldName]
        );
        assert_eq!(
            codec.validate(&ContextData::new("Nowhere", vec![])),
            [Problem::UnknownWorld("Nowhere".into())]
        );

        let record = ContextData::new(
            "Game",
            vec![
                components![Tag, Position::default()],
                components![Tag, Tag, Selected],
            ],
        );
        assert_eq!(
            codec.validate(&record),
            [
                Problem::DuplicateKind { entity: 1, kind: "Tag".into() },
                Problem::NotSerializable { entity: 1, kind: "Selected".into() },
            ]
        );

        let menu = ContextData::new("Menu", vec![components![Health(1)]]);
        assert_eq!(
            codec.validate(&menu),
            [Problem::KindNotInRoster { entity: 0, kind: "Health".into() }]
        );
    }

    #[test]
    fn is_valid_needs_records() {
        let codec = codec();
        assert!(!codec.is_valid(&[]));
        assert!(codec.is_valid(&[ContextData::new("Menu", vec![components![Tag]])]));
        assert!(!codec.is_valid(&[
            ContextData::new("Menu", vec![components![Tag]]),
            ContextData::new("Nowhere", vec![]),
        ]));
    }

    #[test]
    fn template_uses_first_serializable_kind() {
        let codec = codec();
        let game = codec.template("Game").unwrap();
        assert_eq!(game.entities, vec![components![Position::default()]]);
        assert!(codec.is_valid(&[game]));
        assert!(codec.template("Cursor").is_none());
        assert!(codec.template("Nowhere").is_none());
    }

    #[test]
    fn merge_unions_by_value() {
        let mut existing = vec![ContextData::new(
            "Game",
            vec![components![Tag], components![Tag]],
        )];
        merge(
            &mut existing,
            vec![
                ContextData::new("Game", vec![components![Tag], components![Health(2)]]),
                ContextData::new("Menu", vec![components![Tag]]),
            ],
        );
        assert_eq!(existing.len(), 2);
        assert_eq!(
            existing[0].entities,
            vec![components![Tag], components![Tag], components![Health(2)]]
        );
        assert_eq!(existing[1].context, "Menu");
    }
}
