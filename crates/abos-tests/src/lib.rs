//! Integration tests for the A/B partition and mapping crates
//!
//! The tests drive a whole device: partition layer, mapping records and
//! base-OS documents, on top of either the in-memory simulator or a scripted
//! stand-in for the `zboot` utility.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p abos-tests
//! ```
//!
//! # Test Structure
//!
//! - `update_flow.rs` - install, reboot and commit on a simulated device
//! - `zboot_script.rs` - the subprocess adapter against a shell-script utility (unix)

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use uuid::Uuid;

use abos_core::{BaseOsConfig, PartitionLabel, StorageConfig, UuidAndVersion};
use abos_mapping::{BaseOsRegistry, BaseOsStore, PartitionMapStore, PartitionMapper, StoreConfig};
use abos_zboot::config::ZbootConfig;
use abos_zboot::{BootControl, PartitionManager, SimulatedBootControl};

/// A simulated device with on-disk stores under one temp directory
pub struct Device {
    pub dir: TempDir,
    pub sim: Arc<SimulatedBootControl>,
    pub registry: Arc<BaseOsStore>,
    pub mapper: PartitionMapper,
}

impl Device {
    /// Device booted from `current`, with both raw devices as empty files
    pub fn booted_from(current: PartitionLabel) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let sim = Arc::new(SimulatedBootControl::new(current));
        for label in PartitionLabel::ALL {
            let device = dir.path().join(format!("{}.img", label));
            std::fs::write(&device, b"").expect("device file");
            sim.set_device(label, device.display().to_string());
        }

        let config = ZbootConfig {
            block_size: 4096,
            ..Default::default()
        };
        let (registry, mapper) = open_stores(dir.path(), sim.clone(), &config);

        Self {
            dir,
            sim,
            registry,
            mapper,
        }
    }

    pub fn partitions(&self) -> &PartitionManager {
        self.mapper.partitions()
    }

    /// Raw device backing `label`
    pub fn device_path(&self, label: PartitionLabel) -> PathBuf {
        self.dir.path().join(format!("{}.img", label))
    }

    /// Stage an image file and register a config assigned to `label`
    pub async fn stage(
        &self,
        label: PartitionLabel,
        version: &str,
        bytes: &[u8],
    ) -> (BaseOsConfig, PathBuf) {
        let uuid = Uuid::new_v4();
        let image = self.dir.path().join(format!("{}.bin", uuid));
        std::fs::write(&image, bytes).expect("staged image");

        let config = base_os_config(uuid, version, Some(label), "");
        self.registry
            .put_config(config.clone())
            .await
            .expect("put config");
        (config, image)
    }

    /// Reopen the stores from disk, as a restarted agent would
    pub fn restart(&self) -> (Arc<BaseOsStore>, PartitionMapper) {
        open_stores(self.dir.path(), self.sim.clone(), &ZbootConfig::default())
    }
}

fn open_stores(
    root: &Path,
    boot: Arc<dyn BootControl>,
    zboot: &ZbootConfig,
) -> (Arc<BaseOsStore>, PartitionMapper) {
    let store_config = store_config(root);
    let registry = Arc::new(BaseOsStore::open(&store_config).expect("base OS store"));
    let store = PartitionMapStore::open(&store_config.partition_map_dir).expect("map store");
    let partitions = Arc::new(PartitionManager::new(boot, zboot));
    let mapper = PartitionMapper::new(partitions, store, registry.clone());
    (registry, mapper)
}

/// Store directories under `root`
pub fn store_config(root: &Path) -> StoreConfig {
    StoreConfig {
        partition_map_dir: root.join("config"),
        base_os_config_dir: root.join("baseOsConfig"),
        base_os_status_dir: root.join("baseOsStatus"),
    }
}

/// Base-OS config with a single rootfs item
pub fn base_os_config(
    uuid: Uuid,
    version: &str,
    label: Option<PartitionLabel>,
    sha256: &str,
) -> BaseOsConfig {
    BaseOsConfig {
        uuid_and_version: UuidAndVersion::new(uuid, version),
        display_name: format!("base-os-{}", version),
        base_os_version: version.to_string(),
        partition_label: label,
        activate: true,
        storage_config_list: vec![StorageConfig {
            name: "rootfs".to_string(),
            image_sha256: sha256.to_string(),
            final_obj_dir: format!("/persist/img/{}", uuid),
        }],
    }
}

/// Pretty JSON of a mapping record file, for failure messages
pub fn dump_record(path: &Path) -> String {
    std::fs::read(path)
        .ok()
        .and_then(|bytes| serde_json::from_slice::<serde_json::Value>(&bytes).ok())
        .map(|v| v.to_string())
        .unwrap_or_else(|| "<none>".to_string())
}
