//! Partition map store - one JSON record per partition label
//!
//! Plain create/overwrite/remove on a directory, no lock. A single agent per
//! device is assumed.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use abos_core::{AbosError, AbosResult, PartitionInfo, PartitionLabel};

/// Outcome of loading a mapping record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingRecord {
    /// No record file for the label
    Absent,
    /// A valid record
    Present(PartitionInfo),
    /// A file exists but is unreadable, unparseable, or filed under the wrong label
    Corrupt(String),
}

impl MappingRecord {
    pub fn into_info(self) -> Option<PartitionInfo> {
        match self {
            MappingRecord::Present(info) => Some(info),
            MappingRecord::Absent | MappingRecord::Corrupt(_) => None,
        }
    }
}

/// Directory of `<LABEL>.json` mapping records
#[derive(Debug, Clone)]
pub struct PartitionMapStore {
    dir: PathBuf,
}

impl PartitionMapStore {
    /// Open the store, creating its directory if needed
    pub fn open(dir: impl Into<PathBuf>) -> AbosResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| AbosError::Persist(format!("{}: {}", dir.display(), e)))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the record of `label`
    pub fn path(&self, label: PartitionLabel) -> PathBuf {
        self.dir.join(format!("{}.json", label))
    }

    /// Load the record of `label`, telling a missing file apart from a bad one
    pub async fn load(&self, label: PartitionLabel) -> MappingRecord {
        let path = self.path(label);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return MappingRecord::Absent,
            Err(e) => return MappingRecord::Corrupt(format!("{}: {}", path.display(), e)),
        };

        let info: PartitionInfo = match serde_json::from_slice(&bytes) {
            Ok(info) => info,
            Err(e) => return MappingRecord::Corrupt(format!("{}: {}", path.display(), e)),
        };

        if info.partition_label != label {
            return MappingRecord::Corrupt(format!(
                "{}: record names partition {}",
                path.display(),
                info.partition_label
            ));
        }
        MappingRecord::Present(info)
    }

    /// Record of `label`, or `None` when missing or unusable
    pub async fn read(&self, label: PartitionLabel) -> Option<PartitionInfo> {
        match self.load(label).await {
            MappingRecord::Corrupt(reason) => {
                warn!(label = %label, reason = %reason, "Ignoring corrupt partition mapping");
                None
            }
            record => record.into_info(),
        }
    }

    /// Overwrite the record for `info.partition_label`
    pub async fn save(&self, info: &PartitionInfo) -> AbosResult<()> {
        let path = self.path(info.partition_label);
        let bytes = serde_json::to_vec(info)?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| AbosError::Persist(format!("{}: {}", path.display(), e)))?;
        debug!(label = %info.partition_label, uuid = %info.uuid(), "Partition mapping saved");
        Ok(())
    }

    /// Remove the record file of `label`
    pub async fn delete(&self, label: PartitionLabel) -> AbosResult<()> {
        let path = self.path(label);
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| AbosError::Persist(format!("{}: {}", path.display(), e)))
    }
}
