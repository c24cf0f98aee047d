//! Command implementations

mod mapping;
mod partition;

pub use mapping::{cancel, find, install, reset_mapping, show_mapping};
pub use partition::{commit, init, mark_unused, mark_updating, reboot, status, write};

use std::sync::Arc;

use anyhow::{Context, Result};

use abos_mapping::{BaseOsStore, PartitionMapStore, PartitionMapper};
use abos_zboot::{create_boot_control, PartitionManager};

use crate::config::AppConfig;

/// Partition layer and mapping coordinator built from configuration
pub struct Runtime {
    pub partitions: Arc<PartitionManager>,
    pub mapper: PartitionMapper,
}

impl Runtime {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let boot = create_boot_control(&config.zboot).context("Failed to set up boot control")?;
        let partitions = Arc::new(PartitionManager::new(boot, &config.zboot));

        let store = PartitionMapStore::open(&config.storage.partition_map_dir)
            .context("Failed to open partition map store")?;
        let registry = Arc::new(
            BaseOsStore::open(&config.storage).context("Failed to open base OS documents")?,
        );

        Ok(Self {
            mapper: PartitionMapper::new(partitions.clone(), store, registry),
            partitions,
        })
    }
}
