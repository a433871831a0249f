//! # Document Storage and Watching
//!
//! Context documents are addressed by string keys. Where the text lives is
//! behind two small traits, so the codec never touches the filesystem
//! directly:
//!
//! - [`TextSource`] fetches the text stored under a key.
//! - [`TextSink`] stores text under a key.
//!
//! [`DirectorySource`] maps keys to files below a root directory.
//! [`MemorySource`] keeps documents in a map.
//!
//! ## Watching
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │  DocumentWatcher                                       │
//! │                                                        │
//! │  watcher ──► background thread (notify crate)          │
//! │              sends events over mpsc channel            │
//! │  rx ◄──────── receives filesystem events               │
//! │                                                        │
//! │  watched ── canonical path → document key              │
//! │  pending ── debounce buffer (key → last event time)    │
//! └────────────────────────────────────────────────────────┘
//!
//! poll_ready():
//!   1. drain rx into pending
//!   2. return keys that have been quiet for the debounce window
//! ```
//!
//! Editors often save atomically (write a temp file, rename over the
//! original), which fires several events in a row. Every event restarts the
//! key's timer, so one burst of saves reports the key once.
//!
//! If the watcher cannot start (e.g. inotify limit reached), documents still
//! load; they just never report changes. Errors are logged.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};

use crate::config::SkaldConfig;
use crate::error::AssetError;

/// Read access to stored documents.
pub trait TextSource {
    fn fetch(&self, key: &str) -> Result<String, AssetError>;
}

/// Write access to stored documents.
pub trait TextSink {
    fn store(&mut self, key: &str, text: &str) -> Result<(), AssetError>;
}

// ── DirectorySource ──────────────────────────────────────────────────────

/// Documents stored as files below `root`. A key is a relative path.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    /// Keys resolve below `root`. The directory need not exist yet.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &SkaldConfig) -> Self {
        Self::new(&config.asset_root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File path of `key`. Keys must be non-empty relative paths without
    /// `..` or root components.
    pub fn path_of(&self, key: &str) -> Result<PathBuf, AssetError> {
        let relative = Path::new(key);
        let plain = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if key.is_empty() || !plain {
            return Err(AssetError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

impl TextSource for DirectorySource {
    fn fetch(&self, key: &str) -> Result<String, AssetError> {
        let path = self.path_of(key)?;
        std::fs::read_to_string(&path).map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => AssetError::NotFound(key.to_string()),
            _ => AssetError::Io { path, source },
        })
    }
}

impl TextSink for DirectorySource {
    fn store(&mut self, key: &str, text: &str) -> Result<(), AssetError> {
        let path = self.path_of(key)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| AssetError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(&path, text).map_err(|source| AssetError::Io { path, source })
    }
}

// ── MemorySource ─────────────────────────────────────────────────────────

/// Documents kept in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    documents: HashMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, text: impl Into<String>) -> Self {
        self.documents.insert(key.into(), text.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.documents.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl TextSource for MemorySource {
    fn fetch(&self, key: &str) -> Result<String, AssetError> {
        self.get(key)
            .map(str::to_string)
            .ok_or_else(|| AssetError::NotFound(key.to_string()))
    }
}

impl TextSink for MemorySource {
    fn store(&mut self, key: &str, text: &str) -> Result<(), AssetError> {
        self.documents.insert(key.to_string(), text.to_string());
        Ok(())
    }
}

// ── DocumentWatcher ──────────────────────────────────────────────────────

/// Reports document keys whose files changed on disk.
pub struct DocumentWatcher {
    /// `None` if the watcher failed to start.
    watcher: Option<RecommendedWatcher>,
    rx: mpsc::Receiver<Result<notify::Event, notify::Error>>,
    watched: HashMap<PathBuf, String>,
    pending: HashMap<String, Instant>,
    debounce: Duration,
    rx_disconnected: bool,
}

impl DocumentWatcher {
    /// Start the watcher thread. A watcher that fails to start is logged and
    /// leaves this instance inactive.
    pub fn new(debounce: Duration) -> Self {
        let (tx, rx) = mpsc::channel();

        let watcher = notify::recommended_watcher(move |res| {
            // Receiver dropped means nobody is polling anymore.
            let _ = tx.send(res);
        });

        let watcher = match watcher {
            Ok(w) => Some(w),
            Err(e) => {
                log::warn!("Failed to create file watcher: {e}. Document reload disabled.");
                None
            }
        };

        Self {
            watcher,
            rx,
            watched: HashMap::new(),
            pending: HashMap::new(),
            debounce,
            rx_disconnected: false,
        }
    }

    pub fn from_config(config: &SkaldConfig) -> Self {
        Self::new(config.watch_debounce())
    }

    /// Whether filesystem events are being received.
    pub fn is_active(&self) -> bool {
        self.watcher.is_some() && !self.rx_disconnected
    }

    pub fn watched_keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.watched.values().map(String::as_str)
    }

    /// Start watching the file behind `key`. The file must exist.
    pub fn watch(&mut self, source: &DirectorySource, key: &str) -> Result<(), AssetError> {
        let path = source.path_of(key)?;
        // Canonical paths so event paths match.
        let canonical = path
            .canonicalize()
            .map_err(|source| AssetError::Io { path, source })?;

        if let Some(watcher) = &mut self.watcher {
            if let Err(e) = watcher.watch(&canonical, RecursiveMode::NonRecursive) {
                log::warn!("Failed to watch '{}': {e}", canonical.display());
            }
        }

        log::debug!("watching document `{key}` at '{}'", canonical.display());
        self.watched.insert(canonical, key.to_string());
        Ok(())
    }

    /// Keys whose files changed and have been quiet for the debounce window.
    pub fn poll_ready(&mut self) -> Vec<String> {
        self.poll();
        self.drain_ready(Instant::now())
    }

    /// Drain filesystem events into the debounce buffer.
    fn poll(&mut self) {
        if self.rx_disconnected {
            return;
        }

        loop {
            match self.rx.try_recv() {
                Ok(Ok(event)) => {
                    use notify::EventKind;
                    if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                        let now = Instant::now();
                        for path in &event.paths {
                            let canonical = path.canonicalize().unwrap_or_else(|_| path.clone());
                            if let Some(key) = self.watched.get(&canonical) {
                                self.pending.insert(key.clone(), now);
                            }
                        }
                    }
                }
                Ok(Err(e)) => {
                    log::warn!("File watcher error: {e}");
                }
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => {
                    log::warn!("File watcher disconnected. Document reload disabled.");
                    self.rx_disconnected = true;
                    break;
                }
            }
        }
    }

    fn mark_changed(&mut self, key: &str, at: Instant) {
        self.pending.insert(key.to_string(), at);
    }

    fn drain_ready(&mut self, now: Instant) -> Vec<String> {
        let debounce = self.debounce;
        let mut ready = Vec::new();
        self.pending.retain(|key, timestamp| {
            let quiet = now.saturating_duration_since(*timestamp) >= debounce;
            if quiet {
                ready.push(key.clone());
            }
            !quiet
        });
        ready.sort();
        ready
    }
}

impl std::fmt::Debug for DocumentWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentWatcher")
            .field("active", &self.is_active())
            .field("watched", &self.watched.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}
