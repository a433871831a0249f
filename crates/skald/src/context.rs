//! Contexts — the set of live worlds.
//!
//! [`Contexts`] holds at most one [`World`] per registered world name. Worlds
//! are created on first request and live as long as the `Contexts` that owns
//! them. Pass it explicitly wherever worlds are read or loaded.
//!
//! ```ignore
//! let mut contexts = Contexts::new(registry);
//! let game = contexts.instance("Game").expect("registered");
//! game.create_entity_with(components![Position::default()]);
//! ```

use std::sync::Arc;

use crate::ecs::World;
use crate::registry::TypeRegistry;

/// Lazily instantiated worlds, one slot per registered world.
pub struct Contexts {
    registry: Arc<TypeRegistry>,
    worlds: Vec<Option<World>>,
}

impl Contexts {
    /// No world is instantiated until it is first asked for.
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        let worlds = registry.all_worlds().iter().map(|_| None).collect();
        Self { registry, worlds }
    }

    /// Uses the registry installed with [`TypeRegistry::install_global`].
    pub fn from_global() -> Option<Self> {
        TypeRegistry::global().map(Self::new)
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// The only instance of world `name`, created on first call.
    /// Unknown names are logged and yield `None`.
    pub fn instance(&mut self, name: &str) -> Option<&mut World> {
        let id = self.registry.lookup_world(name)?.id();
        let registry = &self.registry;
        let world = self.worlds[id].get_or_insert_with(|| {
            log::debug!("instantiating world `{name}`");
            World::with_id(Arc::clone(registry), id)
        });
        Some(world)
    }

    /// An already instantiated world. Never creates one.
    pub fn get(&self, name: &str) -> Option<&World> {
        let id = self.registry.find_world(name)?.id();
        self.worlds[id].as_ref()
    }

    /// Mutable access to an already instantiated world. Never creates one,
    /// and never logs for unknown names.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut World> {
        let id = self.registry.find_world(name)?.id();
        self.worlds[id].as_mut()
    }

    /// Instantiated worlds in registration order.
    pub fn worlds(&self) -> impl Iterator<Item = &World> + '_ {
        self.worlds.iter().flatten()
    }

    /// Mutable [`worlds`](Self::worlds).
    pub fn worlds_mut(&mut self) -> impl Iterator<Item = &mut World> + '_ {
        self.worlds.iter_mut().flatten()
    }

    /// Instantiate every registered world.
    pub fn instantiate_all(&mut self) {
        let names: Vec<String> = self
            .registry
            .all_worlds()
            .iter()
            .map(|info| info.name().to_string())
            .collect();
        for name in names {
            self.instance(&name);
        }
    }
}

impl std::fmt::Debug for Contexts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.worlds()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components;
    use crate::ecs::Component;
    use crate::registry::RegistryBuilder;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Tag;
    impl Component for Tag {
        const KIND: &'static str = "Tag";
    }

    fn contexts() -> Contexts {
        let registry = RegistryBuilder::new()
            .transient::<Tag>()
            .world("Game", &["Tag"])
            .world("Menu", &[])
            .build()
            .unwrap();
        Contexts::new(Arc::new(registry))
    }

    #[test]
    fn instance_is_lazy_and_unique() {
        let mut contexts = contexts();
        assert!(contexts.get("Game").is_none());
        assert_eq!(contexts.worlds().count(), 0);

        let e = contexts.instance("Game").unwrap().create_entity_with(components![Tag]);
        let again = contexts.instance("Game").unwrap();
        assert!(again.is_alive(e));
        assert_eq!(again.entity_count(), 1);
        assert_eq!(contexts.worlds().count(), 1);
    }

    #[test]
    fn unknown_world_is_none() {
        let mut contexts = contexts();
        assert!(contexts.instance("Nowhere").is_none());
        assert!(contexts.get("Nowhere").is_none());
        assert_eq!(contexts.worlds().count(), 0);
    }

    #[test]
    fn global_registry_installs_once() {
        let registry = Arc::clone(contexts().registry());
        TypeRegistry::install_global(Arc::clone(&registry)).unwrap();
        assert_eq!(
            TypeRegistry::install_global(registry),
            Err(crate::error::RegistryError::GlobalAlreadyInstalled)
        );
        let mut contexts = Contexts::from_global().unwrap();
        assert!(contexts.instance("Game").is_some());
    }

    #[test]
    fn instantiate_all_follows_registration_order() {
        let mut contexts = contexts();
        contexts.instance("Menu");
        contexts.instantiate_all();
        let names: Vec<&str> = contexts.worlds().map(World::name).collect();
        assert_eq!(names, ["Game", "Menu"]);
        assert!(contexts.get_mut("Menu").unwrap().roster().is_empty());
    }
}
