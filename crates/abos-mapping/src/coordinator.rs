//! Update/rollback coordinator
//!
//! Ties the partition layer, the mapping records and the agent's base-OS
//! documents together. The mapping is kept injective (an image lives on at
//! most one partition) and only the non-booted partition's record is ever
//! replaced or removed.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use abos_core::{
    AbosError, AbosResult, BaseOsConfig, BaseOsStatus, PartitionInfo, PartitionLabel,
    PartitionState, SwState,
};
use abos_zboot::{image_sha256, PartitionManager};

use crate::keyed::BaseOsRegistry;
use crate::store::{MappingRecord, PartitionMapStore};

/// Coordinates partition mappings with base-OS configs and statuses
pub struct PartitionMapper {
    partitions: Arc<PartitionManager>,
    store: PartitionMapStore,
    registry: Arc<dyn BaseOsRegistry>,
}

impl PartitionMapper {
    pub fn new(
        partitions: Arc<PartitionManager>,
        store: PartitionMapStore,
        registry: Arc<dyn BaseOsRegistry>,
    ) -> Self {
        Self {
            partitions,
            store,
            registry,
        }
    }

    pub fn partitions(&self) -> &PartitionManager {
        &self.partitions
    }

    pub fn store(&self) -> &PartitionMapStore {
        &self.store
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    pub async fn read_partition_info(&self, label: PartitionLabel) -> Option<PartitionInfo> {
        self.store.read(label).await
    }

    pub async fn read_current_partition_info(&self) -> AbosResult<Option<PartitionInfo>> {
        let current = self.partitions.current_partition().await?;
        Ok(self.store.read(current).await)
    }

    pub async fn read_other_partition_info(&self) -> AbosResult<Option<PartitionInfo>> {
        let other = self.partitions.other_partition().await?;
        Ok(self.store.read(other).await)
    }

    /// Partition holding the image `uuid` (or, failing a UUID match, the image
    /// with hash `image_sha256`).
    ///
    /// Both partitions claiming the image breaks the mapping's injectivity and
    /// is reported as the fatal [`AbosError::ConflictingMapping`].
    pub async fn find_owner(
        &self,
        uuid: &Uuid,
        image_sha256: &str,
    ) -> AbosResult<Option<PartitionLabel>> {
        let current = self.partitions.current_partition().await?;
        let other = current.other();

        let on_current = self
            .store
            .read(current)
            .await
            .is_some_and(|info| info.claims(uuid, image_sha256));
        let on_other = self
            .store
            .read(other)
            .await
            .is_some_and(|info| info.claims(uuid, image_sha256));

        match (on_current, on_other) {
            (true, true) => {
                error!(uuid = %uuid, "Both partitions assigned with the same base OS");
                Err(AbosError::ConflictingMapping { uuid: *uuid })
            }
            (true, false) => Ok(Some(current)),
            (false, true) => Ok(Some(other)),
            (false, false) => Ok(None),
        }
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Record that `config`'s image now occupies its assigned partition.
    ///
    /// The partition must be the other one. Any record it already holds for a
    /// different image is retired first.
    pub async fn set_partition_info(&self, uuid: &Uuid, config: &BaseOsConfig) -> AbosResult<()> {
        let label = assigned_label(uuid, config)?;
        info!(uuid = %uuid, label = %label, "Setting partition mapping");
        self.partitions.ensure_other(label).await?;

        let info = PartitionInfo {
            uuid_and_version: config.uuid_and_version.clone(),
            image_sha256: config.image_sha256().unwrap_or_default().to_string(),
            base_os_version: config.base_os_version.clone(),
            partition_label: label,
        };

        self.remove_stale_mapping(Some(&info)).await?;

        self.store.save(&info).await.map_err(|e| {
            warn!(uuid = %uuid, label = %label, error = %e, "Failed to save partition mapping");
            e
        })
    }

    /// Drop the mapping of `uuid`'s image if it sits on the other partition.
    /// A config assigned to the booted partition (or to none) is left alone.
    pub async fn reset_partition_info(&self, uuid: &Uuid) -> AbosResult<()> {
        info!(uuid = %uuid, "Resetting partition mapping");
        let config = self.registry.config(uuid).ok_or_else(|| {
            warn!(uuid = %uuid, "Base OS config absent");
            AbosError::ConfigAbsent(*uuid)
        })?;

        let Some(label) = config.partition_label else {
            return Ok(());
        };
        if !self.partitions.is_other_partition(label).await? {
            return Ok(());
        }
        self.remove_stale_mapping(None).await
    }

    /// Retire the other partition's record unless it already describes
    /// `replacement`.
    ///
    /// The retired image's config loses its partition assignment and staging
    /// directories, and its status becomes `delivered` with an
    /// "uninstalled from" note. Removing the record file is best-effort: a
    /// failure is logged and the document updates stay.
    pub async fn remove_stale_mapping(&self, replacement: Option<&PartitionInfo>) -> AbosResult<()> {
        let other = self.partitions.other_partition().await?;

        let existing = match self.store.load(other).await {
            MappingRecord::Present(info) => info,
            MappingRecord::Absent => {
                warn!(label = %other, "No partition mapping to remove");
                return Ok(());
            }
            MappingRecord::Corrupt(reason) => {
                warn!(label = %other, reason = %reason, "Removing corrupt partition mapping");
                self.delete_record(other).await;
                return Ok(());
            }
        };

        if let Some(replacement) = replacement {
            if replacement.uuid_and_version == existing.uuid_and_version {
                debug!(label = %other, uuid = %existing.uuid(), "Partition mapping unchanged");
                return Ok(());
            }
        }

        let uuid = existing.uuid();
        info!(label = %other, uuid = %uuid, "Retiring stale partition mapping");

        if let Some(mut config) = self.registry.config(&uuid) {
            config.clear_partition();
            self.registry.put_config(config).await?;
        }

        if let Some(mut status) = self.registry.status(&uuid) {
            status.state = SwState::Delivered;
            status.partition_label = None;
            status.set_error(format!("uninstalled from {}", other), Utc::now());
            self.registry.put_status(status).await?;
        }

        self.delete_record(other).await;
        Ok(())
    }

    async fn delete_record(&self, label: PartitionLabel) {
        if let Err(e) = self.store.delete(label).await {
            warn!(label = %label, error = %e, "Failed to remove partition mapping");
        }
    }

    // =========================================================================
    // Staging
    // =========================================================================

    /// Install `uuid`'s staged image onto its assigned (other) partition.
    ///
    /// Verifies the image digest when the config carries one, writes it,
    /// records the mapping, then advances the partition to `updating` and
    /// marks the status `installed`. The device is not rebooted.
    ///
    /// The partition only becomes bootable once its mapping is on disk. If
    /// recording the mapping or advancing the state fails after the write,
    /// the partition is put back to `unused` so the install can be retried.
    pub async fn install_image(&self, uuid: &Uuid, image: &Path) -> AbosResult<PartitionLabel> {
        let config = self
            .registry
            .config(uuid)
            .ok_or(AbosError::ConfigAbsent(*uuid))?;
        let label = assigned_label(uuid, &config)?;
        self.partitions.ensure_other(label).await?;

        if let Some(expected) = config.image_sha256() {
            let actual = image_sha256(image).await?;
            if !actual.eq_ignore_ascii_case(expected) {
                warn!(uuid = %uuid, expected = %expected, actual = %actual, "Staged image digest mismatch");
                return Err(AbosError::ImageDigestMismatch {
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        self.partitions.write_to_partition(image, label).await?;
        if let Err(e) = self.commit_write(uuid, &config, label).await {
            self.abandon_write(label).await;
            return Err(e);
        }

        let mut status = self
            .registry
            .status(uuid)
            .unwrap_or_else(|| BaseOsStatus::for_config(&config));
        status.state = SwState::Installed;
        status.partition_label = Some(label);
        status.clear_error();
        self.registry.put_status(status).await?;

        info!(uuid = %uuid, label = %label, "Base OS installed, reboot to activate");
        Ok(label)
    }

    async fn commit_write(
        &self,
        uuid: &Uuid,
        config: &BaseOsConfig,
        label: PartitionLabel,
    ) -> AbosResult<()> {
        self.set_partition_info(uuid, config).await?;
        self.partitions.mark_updating(label).await
    }

    async fn abandon_write(&self, label: PartitionLabel) {
        warn!(label = %label, "Install incomplete, returning partition to unused");
        if let Err(e) = self
            .partitions
            .set_partition_state(label, PartitionState::Unused)
            .await
        {
            error!(label = %label, error = %e, "Failed to return partition to unused");
        }
    }

    /// Abandon an install that has not been booted yet: the other partition
    /// goes back to `unused` and its mapping is retired.
    pub async fn cancel_install(&self, uuid: &Uuid) -> AbosResult<()> {
        let config = self
            .registry
            .config(uuid)
            .ok_or(AbosError::ConfigAbsent(*uuid))?;
        let label = assigned_label(uuid, &config)?;

        self.partitions.mark_unused(label).await?;
        self.reset_partition_info(uuid).await
    }
}

fn assigned_label(uuid: &Uuid, config: &BaseOsConfig) -> AbosResult<PartitionLabel> {
    config.partition_label.ok_or_else(|| {
        warn!(uuid = %uuid, "Base OS config has no partition assigned");
        AbosError::NotOtherPartition("<unassigned>".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use abos_core::{StorageConfig, UuidAndVersion};
    use abos_zboot::config::ZbootConfig;
    use abos_zboot::SimulatedBootControl;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use crate::config::StoreConfig;
    use crate::keyed::BaseOsStore;

    struct Fixture {
        dir: TempDir,
        sim: Arc<SimulatedBootControl>,
        registry: Arc<BaseOsStore>,
        mapper: PartitionMapper,
    }

    /// Device booted from A
    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let sim = Arc::new(SimulatedBootControl::new(PartitionLabel::A));
        let partitions = Arc::new(PartitionManager::new(sim.clone(), &ZbootConfig::default()));

        let store_config = StoreConfig {
            partition_map_dir: dir.path().join("map"),
            base_os_config_dir: dir.path().join("config"),
            base_os_status_dir: dir.path().join("status"),
        };
        let registry = Arc::new(BaseOsStore::open(&store_config).unwrap());
        let store = PartitionMapStore::open(&store_config.partition_map_dir).unwrap();
        let mapper = PartitionMapper::new(partitions, store, registry.clone());

        Fixture {
            dir,
            sim,
            registry,
            mapper,
        }
    }

    fn base_os(label: Option<PartitionLabel>, sha: &str) -> BaseOsConfig {
        BaseOsConfig {
            uuid_and_version: UuidAndVersion::new(Uuid::new_v4(), "1"),
            display_name: "edge-os".into(),
            base_os_version: "9.3.0".into(),
            partition_label: label,
            activate: true,
            storage_config_list: vec![StorageConfig {
                name: "rootfs".into(),
                image_sha256: sha.into(),
                final_obj_dir: "/persist/img/rootfs".into(),
            }],
        }
    }

    fn record(uuid: Uuid, sha: &str, label: PartitionLabel) -> PartitionInfo {
        PartitionInfo {
            uuid_and_version: UuidAndVersion::new(uuid, "1"),
            image_sha256: sha.into(),
            base_os_version: "9.3.0".into(),
            partition_label: label,
        }
    }

    #[tokio::test]
    async fn test_find_owner_by_uuid() {
        let fx = fixture();
        let u1 = Uuid::new_v4();
        fx.mapper.store().save(&record(u1, "", PartitionLabel::A)).await.unwrap();
        fx.mapper
            .store()
            .save(&record(Uuid::new_v4(), "", PartitionLabel::B))
            .await
            .unwrap();

        assert_eq!(
            fx.mapper.find_owner(&u1, "").await.unwrap(),
            Some(PartitionLabel::A)
        );
        assert_eq!(fx.mapper.find_owner(&Uuid::new_v4(), "").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_find_owner_by_sha_fallback() {
        let fx = fixture();
        fx.mapper
            .store()
            .save(&record(Uuid::new_v4(), "", PartitionLabel::A))
            .await
            .unwrap();
        fx.mapper
            .store()
            .save(&record(Uuid::new_v4(), "d00d", PartitionLabel::B))
            .await
            .unwrap();

        assert_eq!(
            fx.mapper.find_owner(&Uuid::new_v4(), "d00d").await.unwrap(),
            Some(PartitionLabel::B)
        );
    }

    #[tokio::test]
    async fn test_find_owner_conflict_is_fatal() {
        let fx = fixture();
        let u1 = Uuid::new_v4();
        fx.mapper.store().save(&record(u1, "", PartitionLabel::A)).await.unwrap();
        fx.mapper.store().save(&record(u1, "", PartitionLabel::B)).await.unwrap();

        let err = fx.mapper.find_owner(&u1, "").await.unwrap_err();
        assert!(matches!(err, AbosError::ConflictingMapping { uuid } if uuid == u1));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_set_partition_info_round_trip() {
        let fx = fixture();
        let config = base_os(Some(PartitionLabel::B), "beef");

        fx.mapper
            .set_partition_info(&config.uuid(), &config)
            .await
            .unwrap();

        let stored = fx.mapper.read_other_partition_info().await.unwrap().unwrap();
        assert_eq!(stored, record(config.uuid(), "beef", PartitionLabel::B));
        assert_eq!(fx.mapper.read_current_partition_info().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_partition_info_on_current_rejected() {
        let fx = fixture();
        let config = base_os(Some(PartitionLabel::A), "beef");

        let err = fx
            .mapper
            .set_partition_info(&config.uuid(), &config)
            .await
            .unwrap_err();

        assert!(matches!(err, AbosError::NotOtherPartition(_)));
        assert!(!fx.mapper.store().path(PartitionLabel::A).exists());
    }

    #[tokio::test]
    async fn test_set_partition_info_unassigned_rejected() {
        let fx = fixture();
        let config = base_os(None, "beef");

        assert!(fx
            .mapper
            .set_partition_info(&config.uuid(), &config)
            .await
            .is_err());
        assert!(!fx.mapper.store().path(PartitionLabel::B).exists());
    }

    #[tokio::test]
    async fn test_replacing_mapping_retires_old_image() {
        let fx = fixture();
        let old = base_os(Some(PartitionLabel::B), "0001");
        fx.registry.put_config(old.clone()).await.unwrap();
        let mut old_status = BaseOsStatus::for_config(&old);
        old_status.state = SwState::Installed;
        fx.registry.put_status(old_status).await.unwrap();
        fx.mapper.set_partition_info(&old.uuid(), &old).await.unwrap();

        let new = base_os(Some(PartitionLabel::B), "0002");
        fx.mapper.set_partition_info(&new.uuid(), &new).await.unwrap();

        let stored = fx.mapper.read_partition_info(PartitionLabel::B).await.unwrap();
        assert_eq!(stored.uuid(), new.uuid());

        let old_config = fx.registry.config(&old.uuid()).unwrap();
        assert_eq!(old_config.partition_label, None);
        assert!(old_config.storage_config_list[0].final_obj_dir.is_empty());

        let old_status = fx.registry.status(&old.uuid()).unwrap();
        assert_eq!(old_status.state, SwState::Delivered);
        assert_eq!(old_status.error, "uninstalled from IMGB");
        assert!(old_status.error_time.is_some());
    }

    #[tokio::test]
    async fn test_rewriting_same_image_keeps_documents() {
        let fx = fixture();
        let config = base_os(Some(PartitionLabel::B), "0001");
        fx.registry.put_config(config.clone()).await.unwrap();
        fx.mapper.set_partition_info(&config.uuid(), &config).await.unwrap();

        fx.mapper.set_partition_info(&config.uuid(), &config).await.unwrap();

        assert_eq!(fx.registry.config(&config.uuid()), Some(config));
        assert!(fx.mapper.store().path(PartitionLabel::B).exists());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let fx = fixture();
        let config = base_os(Some(PartitionLabel::B), "0001");
        fx.mapper.set_partition_info(&config.uuid(), &config).await.unwrap();

        fx.mapper.remove_stale_mapping(None).await.unwrap();
        assert!(!fx.mapper.store().path(PartitionLabel::B).exists());

        fx.mapper.remove_stale_mapping(None).await.unwrap();
    }

    #[tokio::test]
    async fn test_remove_never_touches_current() {
        let fx = fixture();
        fx.mapper
            .store()
            .save(&record(Uuid::new_v4(), "", PartitionLabel::A))
            .await
            .unwrap();

        fx.mapper.remove_stale_mapping(None).await.unwrap();

        assert!(fx.mapper.store().path(PartitionLabel::A).exists());
    }

    #[tokio::test]
    async fn test_remove_clears_corrupt_record() {
        let fx = fixture();
        std::fs::write(fx.mapper.store().path(PartitionLabel::B), b"garbage").unwrap();

        fx.mapper.remove_stale_mapping(None).await.unwrap();

        assert!(!fx.mapper.store().path(PartitionLabel::B).exists());
    }

    #[tokio::test]
    async fn test_reset_requires_config() {
        let fx = fixture();
        let err = fx
            .mapper
            .reset_partition_info(&Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AbosError::ConfigAbsent(_)));
    }

    #[tokio::test]
    async fn test_reset_ignores_current_partition() {
        let fx = fixture();
        let config = base_os(Some(PartitionLabel::A), "0001");
        fx.registry.put_config(config.clone()).await.unwrap();
        fx.mapper
            .store()
            .save(&record(config.uuid(), "0001", PartitionLabel::A))
            .await
            .unwrap();

        fx.mapper.reset_partition_info(&config.uuid()).await.unwrap();

        assert!(fx.mapper.store().path(PartitionLabel::A).exists());
        assert_eq!(fx.registry.config(&config.uuid()), Some(config));
    }

    #[tokio::test]
    async fn test_reset_removes_other_mapping() {
        let fx = fixture();
        let config = base_os(Some(PartitionLabel::B), "0001");
        fx.registry.put_config(config.clone()).await.unwrap();
        fx.mapper.set_partition_info(&config.uuid(), &config).await.unwrap();

        fx.mapper.reset_partition_info(&config.uuid()).await.unwrap();

        assert!(!fx.mapper.store().path(PartitionLabel::B).exists());
        assert_eq!(fx.registry.config(&config.uuid()).unwrap().partition_label, None);
    }

    fn staged_image(fx: &Fixture, bytes: &[u8]) -> std::path::PathBuf {
        let image = fx.dir.path().join("rootfs.img");
        std::fs::write(&image, bytes).unwrap();
        let device = fx.dir.path().join("sdb");
        std::fs::write(&device, b"").unwrap();
        fx.sim.set_device(PartitionLabel::B, device.display().to_string());
        image
    }

    #[tokio::test]
    async fn test_install_image() {
        let fx = fixture();
        let image = staged_image(&fx, b"abc");
        // sha256("abc")
        let config = base_os(
            Some(PartitionLabel::B),
            "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD",
        );
        fx.registry.put_config(config.clone()).await.unwrap();

        let label = fx.mapper.install_image(&config.uuid(), &image).await.unwrap();

        assert_eq!(label, PartitionLabel::B);
        assert_eq!(fx.sim.state(PartitionLabel::B), "updating");
        assert_eq!(
            fx.mapper.find_owner(&config.uuid(), "").await.unwrap(),
            Some(PartitionLabel::B)
        );
        let status = fx.registry.status(&config.uuid()).unwrap();
        assert_eq!(status.state, SwState::Installed);
        assert_eq!(status.partition_label, Some(PartitionLabel::B));
    }

    #[tokio::test]
    async fn test_install_rejects_digest_mismatch() {
        let fx = fixture();
        let image = staged_image(&fx, b"abc");
        let config = base_os(Some(PartitionLabel::B), "0000");
        fx.registry.put_config(config.clone()).await.unwrap();

        let err = fx
            .mapper
            .install_image(&config.uuid(), &image)
            .await
            .unwrap_err();

        assert!(matches!(err, AbosError::ImageDigestMismatch { .. }));
        assert_eq!(fx.sim.state(PartitionLabel::B), "unused");
        assert!(!fx.mapper.store().path(PartitionLabel::B).exists());
    }

    #[tokio::test]
    async fn test_cancel_install() {
        let fx = fixture();
        let image = staged_image(&fx, b"abc");
        let config = base_os(Some(PartitionLabel::B), "");
        fx.registry.put_config(config.clone()).await.unwrap();
        fx.mapper.install_image(&config.uuid(), &image).await.unwrap();

        fx.mapper.cancel_install(&config.uuid()).await.unwrap();

        assert_eq!(fx.sim.state(PartitionLabel::B), "unused");
        assert!(!fx.mapper.store().path(PartitionLabel::B).exists());
        assert_eq!(
            fx.registry.status(&config.uuid()).unwrap().state,
            SwState::Delivered
        );
        assert_eq!(fx.sim.state(PartitionLabel::A), PartitionState::Active.to_string());
    }

    #[tokio::test]
    async fn test_install_mapping_failure_leaves_partition_unused() {
        let fx = fixture();
        let image = staged_image(&fx, b"abc");
        let config = base_os(Some(PartitionLabel::B), "");
        fx.registry.put_config(config.clone()).await.unwrap();

        // Map directory replaced by a plain file: records cannot be saved
        let map_dir = fx.mapper.store().dir().to_path_buf();
        std::fs::remove_dir_all(&map_dir).unwrap();
        std::fs::write(&map_dir, b"").unwrap();

        let err = fx
            .mapper
            .install_image(&config.uuid(), &image)
            .await
            .unwrap_err();
        assert!(matches!(err, AbosError::Persist(_)));
        assert_eq!(fx.sim.state(PartitionLabel::B), "unused");
        assert_eq!(fx.registry.status(&config.uuid()), None);

        std::fs::remove_file(&map_dir).unwrap();
        std::fs::create_dir(&map_dir).unwrap();

        fx.mapper.install_image(&config.uuid(), &image).await.unwrap();
        assert_eq!(fx.sim.state(PartitionLabel::B), "updating");
        assert_eq!(
            fx.mapper.read_other_partition_info().await.unwrap().map(|i| i.uuid()),
            Some(config.uuid())
        );
    }

    #[tokio::test]
    async fn test_cancel_refused_before_commit() {
        let fx = fixture();
        // Booted into B after an update, A is the fallback
        fx.sim.set_raw_current("IMGB");
        fx.sim.set_state(PartitionLabel::B, PartitionState::InProgress);
        fx.sim.set_state(PartitionLabel::A, PartitionState::Active);

        let config = base_os(Some(PartitionLabel::A), "");
        fx.registry.put_config(config.clone()).await.unwrap();
        fx.mapper
            .store()
            .save(&record(config.uuid(), "", PartitionLabel::A))
            .await
            .unwrap();

        let err = fx.mapper.cancel_install(&config.uuid()).await.unwrap_err();

        assert!(matches!(err, AbosError::InvalidState { .. }));
        assert_eq!(fx.sim.state(PartitionLabel::A), "active");
        assert!(fx.mapper.store().path(PartitionLabel::A).exists());
        assert_eq!(
            fx.registry.config(&config.uuid()).unwrap().partition_label,
            Some(PartitionLabel::A)
        );
    }

    /// Registry that turns the record file into a non-empty directory once
    /// the retired status is written, so the record can no longer be removed
    struct PinningRegistry {
        inner: BaseOsStore,
        record: std::path::PathBuf,
    }

    #[async_trait::async_trait]
    impl BaseOsRegistry for PinningRegistry {
        fn config(&self, uuid: &Uuid) -> Option<BaseOsConfig> {
            self.inner.config(uuid)
        }

        async fn put_config(&self, config: BaseOsConfig) -> AbosResult<()> {
            self.inner.put_config(config).await
        }

        fn status(&self, uuid: &Uuid) -> Option<BaseOsStatus> {
            self.inner.status(uuid)
        }

        async fn put_status(&self, status: BaseOsStatus) -> AbosResult<()> {
            self.inner.put_status(status).await?;
            std::fs::remove_file(&self.record).unwrap();
            std::fs::create_dir_all(self.record.join("pinned")).unwrap();
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failed_record_removal_keeps_document_updates() {
        let fx = fixture();
        let store = fx.mapper.store().clone();
        let registry = Arc::new(PinningRegistry {
            inner: BaseOsStore::open(&StoreConfig {
                partition_map_dir: store.dir().to_path_buf(),
                base_os_config_dir: fx.dir.path().join("config"),
                base_os_status_dir: fx.dir.path().join("status"),
            })
            .unwrap(),
            record: store.path(PartitionLabel::B),
        });
        let mapper = PartitionMapper::new(
            Arc::new(PartitionManager::new(fx.sim.clone(), &ZbootConfig::default())),
            store,
            registry.clone(),
        );

        let old = base_os(Some(PartitionLabel::B), "0001");
        registry.put_config(old.clone()).await.unwrap();
        registry.inner.put_status(BaseOsStatus::for_config(&old)).await.unwrap();
        mapper
            .store()
            .save(&record(old.uuid(), "0001", PartitionLabel::B))
            .await
            .unwrap();

        mapper.remove_stale_mapping(None).await.unwrap();

        assert!(mapper.store().path(PartitionLabel::B).is_dir());
        let status = registry.status(&old.uuid()).unwrap();
        assert_eq!(status.state, SwState::Delivered);
        assert_eq!(status.error, "uninstalled from IMGB");
        assert_eq!(registry.config(&old.uuid()).unwrap().partition_label, None);
    }
}
