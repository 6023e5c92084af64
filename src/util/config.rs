//! Global configuration (`config.toml` in the cache root).
//!
//! Configuration is deliberately small: it names registries and nothing
//! else. Project-level settings live in `project.toml`.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use url::Url;

/// The default registry index, overridable via `VBA_BLOCKS_REGISTRY`.
pub const DEFAULT_REGISTRY_URL: &str = "https://github.com/vba-blocks/registry";

/// The name under which the default registry is registered.
pub const DEFAULT_REGISTRY_NAME: &str = "default";

/// Global configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Named registries. The `default` entry is synthesised if absent.
    #[serde(default)]
    pub registries: HashMap<String, RegistryEntry>,
}

/// A single registry entry.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryEntry {
    /// Git URL of the registry index.
    pub index: Url,
}

impl Config {
    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path, default_registry: &Url) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        } else {
            Config::default()
        };

        config
            .registries
            .entry(DEFAULT_REGISTRY_NAME.to_string())
            .or_insert_with(|| RegistryEntry {
                index: default_registry.clone(),
            });

        Ok(config)
    }

    /// Look up a registry by name.
    pub fn registry(&self, name: &str) -> Option<&RegistryEntry> {
        self.registries.get(name)
    }
}
