//! Partition accessor, validators and state machine
//!
//! Every read of boot metadata is validated against the closed label and
//! state sets. A failed or invalid read is reported as
//! [`AbosError::EnvironmentCorrupted`]: the metadata can no longer be trusted
//! and acting on it could write to the wrong slot. Precondition violations on
//! mutations are ordinary, recoverable errors.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use abos_core::{
    AbosError, AbosResult, BootControl, Partition, PartitionLabel, PartitionSnapshot,
    PartitionState,
};

use crate::config::ZbootConfig;

/// Validate a partition label reported by the boot-control utility
pub fn validate_label(raw: &str) -> AbosResult<PartitionLabel> {
    raw.parse().map_err(AbosError::EnvironmentCorrupted)
}

/// Validate a partition state reported by the boot-control utility
pub fn validate_state(raw: &str) -> AbosResult<PartitionState> {
    raw.parse().map_err(AbosError::EnvironmentCorrupted)
}

/// Access to the two boot partitions and their lifecycle
pub struct PartitionManager {
    boot: Arc<dyn BootControl>,
    pub(crate) block_size: usize,
}

impl PartitionManager {
    pub fn new(boot: Arc<dyn BootControl>, config: &ZbootConfig) -> Self {
        Self {
            boot,
            block_size: config.block_size,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Partition the device booted from
    pub async fn current_partition(&self) -> AbosResult<PartitionLabel> {
        let raw = self.boot.current_partition().await.map_err(|e| {
            error!(error = %e, "zboot curpart failed");
            AbosError::EnvironmentCorrupted(format!("curpart: {}", e))
        })?;
        validate_label(&raw)
    }

    /// The non-booted partition
    pub async fn other_partition(&self) -> AbosResult<PartitionLabel> {
        Ok(self.current_partition().await?.other())
    }

    pub async fn is_current_partition(&self, label: PartitionLabel) -> AbosResult<bool> {
        Ok(self.current_partition().await? == label)
    }

    pub async fn is_other_partition(&self, label: PartitionLabel) -> AbosResult<bool> {
        Ok(self.other_partition().await? == label)
    }

    /// Fail with `NotOtherPartition` unless `label` is the non-booted side
    pub async fn ensure_other(&self, label: PartitionLabel) -> AbosResult<()> {
        if self.is_other_partition(label).await? {
            Ok(())
        } else {
            warn!(label = %label, "Not other partition");
            Err(AbosError::NotOtherPartition(label.to_string()))
        }
    }

    pub async fn partition_state(&self, label: PartitionLabel) -> AbosResult<PartitionState> {
        let raw = self.boot.partition_state(label).await.map_err(|e| {
            error!(label = %label, error = %e, "zboot partstate failed");
            AbosError::EnvironmentCorrupted(format!("partstate {}: {}", label, e))
        })?;
        let state = validate_state(&raw)?;
        debug!(label = %label, state = %state, "Partition state");
        Ok(state)
    }

    pub async fn is_partition_state(
        &self,
        label: PartitionLabel,
        state: PartitionState,
    ) -> AbosResult<bool> {
        Ok(self.partition_state(label).await? == state)
    }

    /// Raw device of a partition. An empty answer is returned as-is.
    pub async fn partition_device(&self, label: PartitionLabel) -> AbosResult<String> {
        self.boot.partition_device(label).await.map_err(|e| {
            error!(label = %label, error = %e, "zboot partdev failed");
            AbosError::EnvironmentCorrupted(format!("partdev {}: {}", label, e))
        })
    }

    pub async fn partition(&self, label: PartitionLabel) -> AbosResult<Partition> {
        Ok(Partition {
            label,
            device_path: self.partition_device(label).await?,
            state: self.partition_state(label).await?,
        })
    }

    /// Both partitions with their devices and states
    pub async fn snapshot(&self) -> AbosResult<PartitionSnapshot> {
        let current = self.current_partition().await?;
        Ok(PartitionSnapshot {
            current: self.partition(current).await?,
            other: self.partition(current.other()).await?,
        })
    }

    /// Set a partition's state without any transition check
    pub async fn set_partition_state(
        &self,
        label: PartitionLabel,
        state: PartitionState,
    ) -> AbosResult<()> {
        self.boot
            .set_partition_state(label, state)
            .await
            .map_err(|e| {
                error!(label = %label, state = %state, error = %e, "zboot set_partstate failed");
                AbosError::from(e)
            })?;
        info!(label = %label, state = %state, "Partition state set");
        Ok(())
    }

    /// Reboot the device
    pub async fn reset(&self) -> AbosResult<()> {
        info!("Requesting reboot");
        self.boot.reset().await.map_err(|e| {
            error!(error = %e, "zboot reset failed");
            AbosError::from(e)
        })
    }

    // =========================================================================
    // State machine
    // =========================================================================

    /// Startup repair: if both partitions claim `active`, demote the other one.
    /// The booted partition always wins. Returns whether a repair was made.
    pub async fn partition_init(&self) -> AbosResult<bool> {
        let current = self.current_partition().await?;
        let other = current.other();

        let current_active = self.is_partition_state(current, PartitionState::Active).await?;
        let other_active = self.is_partition_state(other, PartitionState::Active).await?;

        if current_active && other_active {
            warn!(current = %current, other = %other, "Both partitions are active, marking other unused");
            self.set_partition_state(other, PartitionState::Unused).await?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Commit the booted partition.
    ///
    /// Requires the current partition to be `inprogress`; it becomes `active`.
    /// The other partition must then be `active` (the image we booted away
    /// from) and is demoted to `unused`.
    pub async fn mark_active(&self) -> AbosResult<()> {
        let current = self.current_partition().await?;
        let other = current.other();

        info!(partition = %current, "Checking current partition for inprogress state");
        let state = self.partition_state(current).await?;
        if state != PartitionState::InProgress {
            return Err(AbosError::InvalidState {
                label: current,
                expected: PartitionState::InProgress,
                actual: state,
            });
        }

        info!(partition = %current, "Marking current partition active");
        self.set_partition_state(current, PartitionState::Active)
            .await?;

        info!(partition = %other, "Checking other partition for active state");
        let state = self.partition_state(other).await?;
        if state != PartitionState::Active {
            return Err(AbosError::InvalidState {
                label: other,
                expected: PartitionState::Active,
                actual: state,
            });
        }

        info!(partition = %other, "Marking other partition unused");
        self.set_partition_state(other, PartitionState::Unused).await
    }

    /// Advance a freshly written partition from `unused` to `updating`
    pub async fn mark_updating(&self, label: PartitionLabel) -> AbosResult<()> {
        self.ensure_other(label).await?;
        self.require_state(label, PartitionState::Unused).await?;
        self.set_partition_state(label, PartitionState::Updating)
            .await
    }

    /// Return the non-booted partition to `unused`, abandoning whatever it holds
    ///
    /// Refused until the booted partition is committed: before that the other
    /// partition is the `active` fallback the bootloader reverts to.
    pub async fn mark_unused(&self, label: PartitionLabel) -> AbosResult<()> {
        self.ensure_other(label).await?;
        let current = label.other();
        self.require_state(current, PartitionState::Active).await?;
        self.set_partition_state(label, PartitionState::Unused).await
    }

    pub(crate) async fn require_state(
        &self,
        label: PartitionLabel,
        expected: PartitionState,
    ) -> AbosResult<()> {
        let actual = self.partition_state(label).await?;
        if actual == expected {
            Ok(())
        } else {
            warn!(label = %label, state = %actual, expected = %expected, "Unexpected partition state");
            Err(AbosError::InvalidState {
                label,
                expected,
                actual,
            })
        }
    }
}
