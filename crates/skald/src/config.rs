//! Runtime configuration.
//!
//! ```json
//! {
//!   "pretty": true,
//!   "archetype_identity": "sequence",
//!   "asset_root": "assets/entities",
//!   "watch_debounce_ms": 250
//! }
//! ```
//!
//! Every field is optional; missing fields take their defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ecs::ArchetypeIdentity;
use crate::error::ConfigError;

const DEFAULT_DEBOUNCE_MS: u64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkaldConfig {
    /// Indent encoded documents.
    pub pretty: bool,
    pub archetype_identity: ArchetypeIdentity,
    /// Root directory of [`DirectorySource`](crate::asset::DirectorySource).
    pub asset_root: PathBuf,
    /// Quiet time before a changed document is reported by the watcher.
    pub watch_debounce_ms: u64,
}

impl Default for SkaldConfig {
    fn default() -> Self {
        Self {
            pretty: false,
            archetype_identity: ArchetypeIdentity::default(),
            asset_root: PathBuf::from("assets"),
            watch_debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

impl SkaldConfig {
    /// Parse settings. Missing fields keep their defaults.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&text)?;
        log::debug!("loaded config from `{}`", path.display());
        Ok(config)
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn with_archetype_identity(mut self, identity: ArchetypeIdentity) -> Self {
        self.archetype_identity = identity;
        self
    }

    pub fn with_asset_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.asset_root = root.into();
        self
    }

    pub fn with_watch_debounce_ms(mut self, millis: u64) -> Self {
        self.watch_debounce_ms = millis;
        self
    }

    pub fn watch_debounce(&self) -> Duration {
        Duration::from_millis(self.watch_debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config = SkaldConfig::from_json_str(r#"{ "pretty": true }"#).unwrap();
        assert!(config.pretty);
        assert_eq!(config.archetype_identity, ArchetypeIdentity::Set);
        assert_eq!(config.asset_root, PathBuf::from("assets"));
        assert_eq!(config.watch_debounce(), Duration::from_millis(100));
    }

    #[test]
    fn full_document() {
        let config = SkaldConfig::from_json_str(
            r#"{
                "pretty": false,
                "archetype_identity": "sequence",
                "asset_root": "data",
                "watch_debounce_ms": 5
            }"#,
        )
        .unwrap();
        assert_eq!(
            config,
            SkaldConfig::default()
                .with_archetype_identity(ArchetypeIdentity::Sequence)
                .with_asset_root("data")
                .with_watch_debounce_ms(5)
        );
    }

    #[test]
    fn invalid_documents_are_rejected() {
        assert!(matches!(
            SkaldConfig::from_json_str(r#"{ "archetype_identity": "bag" }"#),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            SkaldConfig::from_file("/definitely/not/here.json"),
            Err(ConfigError::Io { .. })
        ));
    }
}
