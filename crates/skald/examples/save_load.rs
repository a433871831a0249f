//! Save/Load — round-trip two worlds through a document on disk.
//!
//! Populates a `Game` and a `Menu` world, prints their archetypes, saves them
//! under `SKALD_ASSETS` (default: a temp directory), then loads the document
//! into fresh worlds and prints what came back.
//!
//! With `--watch` it keeps running afterwards and reloads the worlds each
//! time the saved document is edited.
//!
//! Run with: `RUST_LOG=debug cargo run -p skald --example save_load [-- --watch]`

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use skald::prelude::*;

const DOCUMENT: &str = "entities.json";

// ── Serializable components ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Position {
    x: f32,
    y: f32,
}
impl Component for Position {
    const KIND: &'static str = "Position";
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Velocity {
    dx: f32,
    dy: f32,
}
impl Component for Velocity {
    const KIND: &'static str = "Velocity";
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Label(String);
impl Component for Label {
    const KIND: &'static str = "Label";
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Button;
impl Component for Button {
    const KIND: &'static str = "Button";
}

// ── Transient ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
struct Hovered;
impl Component for Hovered {
    const KIND: &'static str = "Hovered";
}

// ── Worlds ───────────────────────────────────────────────────────────────

struct Game;
impl WorldType for Game {
    const NAME: &'static str = "Game";
    const ROSTER: &'static [&'static str] = &["Position", "Velocity", "Label"];
}

struct Menu;
impl WorldType for Menu {
    const NAME: &'static str = "Menu";
    const ROSTER: &'static [&'static str] = &["Label", "Button", "Hovered"];
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let registry = Arc::new(
        TypeRegistry::builder()
            .component::<Position>()
            .component::<Velocity>()
            .component::<Label>()
            .component::<Button>()
            .transient::<Hovered>()
            .world_type::<Game>()
            .world_type::<Menu>()
            .build()?,
    );

    let root = match std::env::var_os("SKALD_ASSETS") {
        Some(dir) => dir.into(),
        None => std::env::temp_dir().join("skald_demo"),
    };
    let config = SkaldConfig::default().with_pretty(true).with_asset_root(root);

    let mut contexts = Contexts::new(registry.clone());
    populate(&mut contexts);
    print_archetypes("before save", &contexts, &config);

    let codec = ContextDataCodec::from_config(registry.clone(), &config);
    let mut storage = DirectorySource::from_config(&config);
    codec.save_key(&contexts, &mut storage, DOCUMENT)?;
    println!("saved to {}", storage.path_of(DOCUMENT)?.display());

    let mut restored = Contexts::new(registry);
    let report = codec.load_key(&mut restored, &storage, DOCUMENT)?;
    println!(
        "loaded {} entities ({} components)",
        report.entity_count(),
        report.components_added
    );
    print_archetypes("after load", &restored, &config);

    if let Some(menu) = restored.get("Menu") {
        for entity in menu.entities() {
            let kinds: Vec<_> = menu.components(entity).iter().map(|c| c.kind()).collect();
            println!("  Menu {entity}: {kinds:?}");
        }
    }

    if std::env::args().any(|arg| arg == "--watch") {
        let mut watcher = DocumentWatcher::from_config(&config);
        watcher.watch(&storage, DOCUMENT)?;
        println!("watching {} (Ctrl-C to stop)", storage.path_of(DOCUMENT)?.display());
        loop {
            for (key, report) in codec.reload_changed(&mut restored, &mut watcher, &storage) {
                println!("reloaded {key}: {} entities", report.entity_count());
                print_archetypes("after reload", &restored, &config);
            }
            std::thread::sleep(Duration::from_millis(50));
        }
    }
    Ok(())
}

fn populate(contexts: &mut Contexts) {
    if let Some(game) = contexts.instance(Game::NAME) {
        game.create_entity_with(components![
            Position { x: 0.0, y: 0.0 },
            Velocity { dx: 1.0, dy: 0.5 },
            Label("player".into()),
        ]);
        game.create_entity_with(components![
            Velocity { dx: -1.0, dy: 0.0 },
            Position { x: 10.0, y: 4.0 },
        ]);
        game.build_entity().with(Position { x: 3.0, y: 3.0 }).with(Label("rock".into()));
    }

    if let Some(menu) = contexts.instance(Menu::NAME) {
        menu.create_entity_with(components![Label("Start".into()), Button, Hovered]);
        menu.create_entity_with(components![Label("Quit".into()), Button]);
        // Only transient data: left out of the document.
        menu.create_entity_with(components![Hovered]);
    }
}

fn print_archetypes(stage: &str, contexts: &Contexts, config: &SkaldConfig) {
    println!("archetypes {stage}:");
    let extractor = ArchetypeExtractor::from_config(config);
    for (world, archetypes) in extractor.extract_all(contexts) {
        for archetype in archetypes {
            println!("  {world}: {:?}", archetype.kinds());
        }
    }
}
