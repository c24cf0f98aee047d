//! Base-OS config and status documents
//!
//! These are owned by the agent's base-OS handling; the partition layer only
//! reads them and touches the partition label, the per-item staging
//! directories and the terminal state/error fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::partition::{PartitionLabel, UuidAndVersion};

/// Software state of a base-OS image
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwState {
    #[default]
    Initial,
    Downloading,
    Downloaded,
    /// Verified and available, not installed on any partition
    Delivered,
    /// Written to a partition
    Installed,
}

impl std::fmt::Display for SwState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SwState::Initial => "initial",
            SwState::Downloading => "downloading",
            SwState::Downloaded => "downloaded",
            SwState::Delivered => "delivered",
            SwState::Installed => "installed",
        };
        f.write_str(s)
    }
}

/// One downloadable item of a base-OS config
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image_sha256: String,
    /// Staging directory of the verified object
    #[serde(default)]
    pub final_obj_dir: String,
}

/// Desired base-OS image, keyed by UUID
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseOsConfig {
    #[serde(flatten)]
    pub uuid_and_version: UuidAndVersion,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub base_os_version: String,
    /// Partition this image is assigned to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_label: Option<PartitionLabel>,
    #[serde(default)]
    pub activate: bool,
    #[serde(default)]
    pub storage_config_list: Vec<StorageConfig>,
}

impl BaseOsConfig {
    pub fn uuid(&self) -> Uuid {
        self.uuid_and_version.uuid
    }

    /// Image hash of the config: the first non-empty item hash
    pub fn image_sha256(&self) -> Option<&str> {
        self.storage_config_list
            .iter()
            .map(|sc| sc.image_sha256.as_str())
            .find(|sha| !sha.is_empty())
    }

    /// Drop the partition assignment and every staging directory
    pub fn clear_partition(&mut self) {
        self.partition_label = None;
        for sc in &mut self.storage_config_list {
            sc.final_obj_dir.clear();
        }
    }
}

/// Observed state of a base-OS image, keyed by UUID
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseOsStatus {
    #[serde(flatten)]
    pub uuid_and_version: UuidAndVersion,
    #[serde(default)]
    pub base_os_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_label: Option<PartitionLabel>,
    #[serde(default)]
    pub state: SwState,
    #[serde(default)]
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_time: Option<DateTime<Utc>>,
}

impl BaseOsStatus {
    /// Fresh status mirroring a config
    pub fn for_config(config: &BaseOsConfig) -> Self {
        Self {
            uuid_and_version: config.uuid_and_version.clone(),
            base_os_version: config.base_os_version.clone(),
            partition_label: config.partition_label,
            state: SwState::Initial,
            error: String::new(),
            error_time: None,
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid_and_version.uuid
    }

    pub fn set_error(&mut self, error: impl Into<String>, at: DateTime<Utc>) {
        self.error = error.into();
        self.error_time = Some(at);
    }

    pub fn clear_error(&mut self) {
        self.error.clear();
        self.error_time = None;
    }
}
