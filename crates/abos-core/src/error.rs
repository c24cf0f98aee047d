//! Common error types for partition and mapping operations

use thiserror::Error;
use uuid::Uuid;

use crate::bootctl::BootControlError;
use crate::models::{PartitionLabel, PartitionState};

/// Result type for partition and mapping operations
pub type AbosResult<T> = Result<T, AbosError>;

/// Errors that can occur while staging, committing or mapping base-OS images
#[derive(Debug, Error)]
pub enum AbosError {
    /// Boot metadata could not be read or holds a value outside its closed set
    #[error("Boot environment corrupted: {0}")]
    EnvironmentCorrupted(String),

    /// Both partitions claim the same base-OS image
    #[error("Both partitions assigned with the same base OS {uuid}")]
    ConflictingMapping { uuid: Uuid },

    /// Target is not the non-booted partition
    #[error("{0}: not other partition")]
    NotOtherPartition(String),

    /// Partition is not in the state the transition requires
    #[error("Partition {label} is {actual}, expected {expected}")]
    InvalidState {
        label: PartitionLabel,
        expected: PartitionState,
        actual: PartitionState,
    },

    /// Boot-control utility returned an empty device path
    #[error("Null device name for partition {0}")]
    MissingDevice(PartitionLabel),

    /// Copying the image onto the raw device failed
    #[error("Image copy failed: {0}")]
    ImageCopy(String),

    /// Staged image does not match the digest its config announces
    #[error("Image digest mismatch: expected {expected}, got {actual}")]
    ImageDigestMismatch { expected: String, actual: String },

    /// Serializing or parsing a persisted document failed
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Writing or removing a persisted document failed
    #[error("Persist error: {0}")]
    Persist(String),

    /// No base-OS config exists for the given UUID
    #[error("{0}: base OS config absent")]
    ConfigAbsent(Uuid),

    /// A boot-control mutation (state change, reset) failed
    #[error("Boot control error: {0}")]
    BootControl(#[from] BootControlError),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AbosError {
    /// Whether this error means the device's boot metadata can no longer be
    /// trusted. The supervisor aborts on fatal errors; everything else is an
    /// ordinary sequencing failure returned to the caller.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AbosError::EnvironmentCorrupted(_) | AbosError::ConflictingMapping { .. }
        )
    }
}

impl From<serde_json::Error> for AbosError {
    fn from(err: serde_json::Error) -> Self {
        AbosError::Serialize(err.to_string())
    }
}
