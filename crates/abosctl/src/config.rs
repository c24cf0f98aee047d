//! Configuration file handling for abosctl

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use abos_mapping::StoreConfig;
use abos_zboot::config::ZbootConfig;

/// Default location of the config file
pub const DEFAULT_CONFIG_PATH: &str = "/etc/abos/abos.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Boot-control utility and image copy settings
    #[serde(default)]
    pub zboot: ZbootConfig,
    /// Mapping and base-OS document directories
    #[serde(default)]
    pub storage: StoreConfig,
}

impl AppConfig {
    /// Load from `path`, or from [`DEFAULT_CONFIG_PATH`] if it exists.
    /// An explicit path must exist; a missing default file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::load_from(path)?,
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    Self::load_from(&default)?
                } else {
                    Self::default()
                }
            }
        };
        config.zboot.validate().context("Invalid [zboot] section")?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}
