//! Partition layer configuration (`[zboot]` table)

use std::path::PathBuf;

use abos_core::{AbosError, AbosResult, PartitionLabel};
use serde::{Deserialize, Serialize};

/// Boot-control and image-copy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZbootConfig {
    /// Boot-control utility (path or name on `PATH`)
    #[serde(default = "default_command")]
    pub command: String,
    /// Block size used when copying an image onto a partition
    #[serde(default = "default_block_size")]
    pub block_size: usize,
    /// Use the in-memory two-slot simulator instead of the utility
    #[serde(default)]
    pub simulate: bool,
    /// Simulator settings (only read when `simulate = true`)
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl Default for ZbootConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            block_size: default_block_size(),
            simulate: false,
            simulation: SimulationConfig::default(),
        }
    }
}

impl ZbootConfig {
    pub fn validate(&self) -> AbosResult<()> {
        if self.command.trim().is_empty() {
            return Err(AbosError::Config("zboot.command is empty".to_string()));
        }
        if self.block_size == 0 {
            return Err(AbosError::Config("zboot.block_size must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Simulated device settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Partition the simulated device booted from
    #[serde(default = "default_sim_current")]
    pub current: PartitionLabel,
    /// Directory holding `IMGA.img` / `IMGB.img` as simulated raw devices
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_dir: Option<PathBuf>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            current: default_sim_current(),
            device_dir: None,
        }
    }
}

fn default_command() -> String {
    "zboot".to_string()
}

fn default_block_size() -> usize {
    8 * 1024 * 1024 // 8 MiB
}

fn default_sim_current() -> PartitionLabel {
    PartitionLabel::A
}
