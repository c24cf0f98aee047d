//! BootControl trait - the capability seam to the boot-control utility
//!
//! Partition metadata (which slot booted, each slot's readiness state, each
//! slot's raw device) is owned by an external utility. Everything in this
//! workspace reaches it through this trait, so a simulated two-slot device
//! can stand in for the real one.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{PartitionLabel, PartitionState};

/// Result type for boot-control calls
pub type BootControlResult<T> = Result<T, BootControlError>;

/// Errors raised by a boot-control implementation
#[derive(Debug, Error, Clone)]
pub enum BootControlError {
    #[error("Failed to run '{command}': {message}")]
    Spawn { command: String, message: String },

    #[error("'{command}' exited with {code:?}: {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Boot control unavailable: {0}")]
    Unavailable(String),
}

/// Narrow boot-control capability.
///
/// Queries return the utility's trimmed textual answer unchanged; validating
/// it against the closed label and state sets is the caller's job.
/// Calls are not expected to run concurrently and carry no timeout.
#[async_trait]
pub trait BootControl: Send + Sync {
    /// Label of the partition the device booted from
    async fn current_partition(&self) -> BootControlResult<String>;

    /// Readiness state of a partition
    async fn partition_state(&self, label: PartitionLabel) -> BootControlResult<String>;

    /// Set the readiness state of a partition
    async fn set_partition_state(
        &self,
        label: PartitionLabel,
        state: PartitionState,
    ) -> BootControlResult<()>;

    /// Raw block device backing a partition (may be empty)
    async fn partition_device(&self, label: PartitionLabel) -> BootControlResult<String>;

    /// Reboot the device
    async fn reset(&self) -> BootControlResult<()>;
}
