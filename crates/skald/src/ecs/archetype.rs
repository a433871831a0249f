//! # Archetype — Distinct Component Combinations
//!
//! An archetype is a component-presence pattern observed on at least one live
//! entity of a world. [`ArchetypeExtractor`] scans a world, deduplicates
//! patterns, and builds one [`Archetype`] per pattern in first-seen order.
//!
//! ```text
//! e1: occupied [0, 1]
//! e2: occupied [1, 0]
//! e3: occupied [2]
//!
//! Set identity       → {0,1}, {2}         (2 archetypes)
//! Sequence identity  → [0,1], [1,0], [2]  (3 archetypes)
//! ```
//!
//! Each archetype carries a default-constructed value per occupied slot,
//! for display and templating. Values are never copied from live entities.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use super::component::BoxedComponent;
use super::world::World;
use crate::config::SkaldConfig;
use crate::context::Contexts;

/// How two occupied-slot patterns are compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchetypeIdentity {
    /// Same kinds in any order are one archetype.
    #[default]
    Set,
    /// Same kinds added in a different order are distinct archetypes.
    Sequence,
}

/// One distinct pattern of occupied slots in a world.
#[derive(Debug, Clone)]
pub struct Archetype {
    world: String,
    slots: Vec<usize>,
    values: Vec<BoxedComponent>,
}

impl Archetype {
    pub fn world(&self) -> &str {
        &self.world
    }

    /// Occupied slot indices. Sorted under [`ArchetypeIdentity::Set`], in add
    /// order of the first matching entity under [`ArchetypeIdentity::Sequence`].
    pub fn slots(&self) -> &[usize] {
        &self.slots
    }

    /// Default representative values, parallel to [`slots`](Self::slots).
    pub fn values(&self) -> &[BoxedComponent] {
        &self.values
    }

    /// Kind names, parallel to [`slots`](Self::slots).
    pub fn kinds(&self) -> Vec<&'static str> {
        self.values.iter().map(|value| value.kind()).collect()
    }
}

/// Builds the archetype list of one or more worlds.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchetypeExtractor {
    identity: ArchetypeIdentity,
}

impl ArchetypeExtractor {
    pub fn new(identity: ArchetypeIdentity) -> Self {
        Self { identity }
    }

    /// Uses [`SkaldConfig::archetype_identity`].
    pub fn from_config(config: &SkaldConfig) -> Self {
        Self::new(config.archetype_identity)
    }

    pub fn identity(&self) -> ArchetypeIdentity {
        self.identity
    }

    fn pattern(&self, occupied: &[usize]) -> Vec<usize> {
        let mut pattern = occupied.to_vec();
        if self.identity == ArchetypeIdentity::Set {
            pattern.sort_unstable();
        }
        pattern
    }

    /// Archetypes of `world`, in the order their patterns first appear.
    pub fn extract(&self, world: &World) -> Vec<Archetype> {
        let mut seen = HashSet::new();
        let mut patterns = Vec::new();
        for (_, slots) in world.iter() {
            let pattern = self.pattern(slots.occupied_indexes());
            if seen.insert(pattern.clone()) {
                patterns.push(pattern);
            }
        }

        let archetypes: Vec<Archetype> = patterns
            .into_iter()
            .map(|slots| {
                let values = slots
                    .iter()
                    .filter_map(|&index| world.roster().kind_at(index))
                    .filter_map(|kind| world.registry().default_value(kind))
                    .collect();
                Archetype {
                    world: world.name().to_string(),
                    slots,
                    values,
                }
            })
            .collect();

        log::debug!(
            "world `{}`: {} entities, {} archetypes",
            world.name(),
            world.entity_count(),
            archetypes.len()
        );
        archetypes
    }

    /// Archetypes of every instantiated world, keyed by world name.
    pub fn extract_all(&self, contexts: &Contexts) -> BTreeMap<String, Vec<Archetype>> {
        let mut by_world: BTreeMap<String, Vec<Archetype>> = BTreeMap::new();
        for world in contexts.worlds() {
            by_world
                .entry(world.name().to_string())
                .or_default()
                .extend(self.extract(world));
        }
        by_world
    }
}
