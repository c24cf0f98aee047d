//! Partition models

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One of the two fixed boot partitions.
///
/// The text form is the name the boot-control utility prints (`IMGA`,
/// `IMGB`), which is also the persisted form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartitionLabel {
    #[serde(rename = "IMGA")]
    A,
    #[serde(rename = "IMGB")]
    B,
}

impl PartitionLabel {
    /// Both labels, A first
    pub const ALL: [PartitionLabel; 2] = [PartitionLabel::A, PartitionLabel::B];

    /// The opposite slot
    pub fn other(self) -> Self {
        match self {
            PartitionLabel::A => PartitionLabel::B,
            PartitionLabel::B => PartitionLabel::A,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PartitionLabel::A => "IMGA",
            PartitionLabel::B => "IMGB",
        }
    }
}

impl std::fmt::Display for PartitionLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PartitionLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IMGA" => Ok(PartitionLabel::A),
            "IMGB" => Ok(PartitionLabel::B),
            _ => Err(format!("invalid partition '{}'", s)),
        }
    }
}

/// Readiness state of a partition's content.
///
/// # Lifecycle
///
/// ```text
/// unused ──write + mark_updating──▶ updating ──bootloader──▶ inprogress
///   ▲                                                           │
///   │                                                  mark_active()
///   └──────────── demoted when the other side commits ◀── active
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionState {
    /// No image of interest; sole state that accepts a write
    Unused,
    /// Image written, waiting for the next boot attempt
    Updating,
    /// Booted once from this partition, not yet committed
    InProgress,
    /// Committed, known-good
    Active,
}

impl std::fmt::Display for PartitionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PartitionState::Unused => "unused",
            PartitionState::Updating => "updating",
            PartitionState::InProgress => "inprogress",
            PartitionState::Active => "active",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for PartitionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unused" => Ok(PartitionState::Unused),
            "updating" => Ok(PartitionState::Updating),
            "inprogress" => Ok(PartitionState::InProgress),
            "active" => Ok(PartitionState::Active),
            _ => Err(format!("invalid partition state '{}'", s)),
        }
    }
}

/// Identity of a base-OS image
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UuidAndVersion {
    pub uuid: Uuid,
    #[serde(default)]
    pub version: String,
}

impl UuidAndVersion {
    pub fn new(uuid: Uuid, version: impl Into<String>) -> Self {
        Self {
            uuid,
            version: version.into(),
        }
    }
}

/// Persisted record asserting which base-OS image occupies a partition.
///
/// Records are replaced wholesale, never edited in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionInfo {
    #[serde(flatten)]
    pub uuid_and_version: UuidAndVersion,
    /// SHA-256 of the image (hex), empty when unknown
    #[serde(default)]
    pub image_sha256: String,
    #[serde(default)]
    pub base_os_version: String,
    pub partition_label: PartitionLabel,
}

impl PartitionInfo {
    pub fn uuid(&self) -> Uuid {
        self.uuid_and_version.uuid
    }

    /// Whether this record claims the image `uuid`, falling back to the
    /// content hash when the UUID differs. An empty `image_sha256` never
    /// matches.
    pub fn claims(&self, uuid: &Uuid, image_sha256: &str) -> bool {
        if self.uuid_and_version.uuid == *uuid {
            return true;
        }
        !image_sha256.is_empty() && image_sha256 == self.image_sha256
    }
}

/// A boot partition as seen through the boot-control utility
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub label: PartitionLabel,
    pub device_path: String,
    pub state: PartitionState,
}

/// Both partitions, split by which one is booted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionSnapshot {
    pub current: Partition,
    pub other: Partition,
}
