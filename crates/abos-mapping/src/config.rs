//! Storage locations (`[storage]` table)

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Directories of the mapping records and the base-OS documents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Holds `IMGA.json` / `IMGB.json`
    #[serde(default = "default_partition_map_dir")]
    pub partition_map_dir: PathBuf,
    /// Holds `<uuid>.json` base-OS configs
    #[serde(default = "default_base_os_config_dir")]
    pub base_os_config_dir: PathBuf,
    /// Holds `<uuid>.json` base-OS statuses
    #[serde(default = "default_base_os_status_dir")]
    pub base_os_status_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            partition_map_dir: default_partition_map_dir(),
            base_os_config_dir: default_base_os_config_dir(),
            base_os_status_dir: default_base_os_status_dir(),
        }
    }
}

fn default_partition_map_dir() -> PathBuf {
    PathBuf::from("/var/tmp/zededa/config")
}

fn default_base_os_config_dir() -> PathBuf {
    PathBuf::from("/var/tmp/zedagent/baseOsConfig")
}

// Statuses live under /var/run so they do not survive a reboot
fn default_base_os_status_dir() -> PathBuf {
    PathBuf::from("/var/run/zedagent/baseOsStatus")
}
