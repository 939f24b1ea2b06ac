//! Bridge configuration types.

use std::path::{Path, PathBuf};

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, BridgeResult};

/// Configuration applied to every plugin sub-context.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct BridgeConfig {
    /// Extra directories searched for plugin modules, after the per-plugin path.
    #[builder(default)]
    #[serde(default)]
    pub search_paths: Vec<PathBuf>,

    /// Memory limit per sub-context in bytes (0 = unlimited).
    #[builder(default = "0")]
    #[serde(default)]
    pub memory_limit: usize,

    /// Remove `loadfile`, `dofile` and `load` from plugin globals.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub sandbox: bool,

    /// Install the `host` table (logging, version constants) in plugin globals.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub host_api: bool,
}

fn default_true() -> bool {
    true
}

impl BridgeConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(ref paths) = self.search_paths {
            if paths.iter().any(|p| p.as_os_str().is_empty()) {
                return Err("Search paths cannot be empty".to_string());
            }
        }
        Ok(())
    }
}

impl BridgeConfig {
    /// Create a new config builder.
    pub fn builder() -> BridgeConfigBuilder {
        BridgeConfigBuilder::default()
    }

    /// Parse a config from TOML text.
    pub fn from_toml_str(text: &str) -> BridgeResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| BridgeError::InvalidConfig {
            message: e.to_string(),
        })?;
        if config.search_paths.iter().any(|p| p.as_os_str().is_empty()) {
            return Err(BridgeError::InvalidConfig {
                message: "Search paths cannot be empty".to_string(),
            });
        }
        Ok(config)
    }

    /// Read a config from a TOML file.
    pub fn load(path: &Path) -> BridgeResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| BridgeError::InvalidConfig {
            message: format!("{}: {e}", path.display()),
        })?;
        Self::from_toml_str(&text)
    }

    /// Add a module search directory.
    pub fn with_search_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_paths.push(dir.into());
        self
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            search_paths: Vec::new(),
            memory_limit: 0,
            sandbox: true,
            host_api: true,
        }
    }
}
