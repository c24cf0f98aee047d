//! UUID-keyed document stores for base-OS configs and statuses
//!
//! Each store is a directory of `<uuid>.json` files fronted by an in-memory
//! map. The map is filled when the store is opened and lives as long as the
//! store object; writes go to disk first, then to the map. Opening reads the
//! directory synchronously at startup; writes are async like the mapping
//! store's.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use abos_core::{AbosError, AbosResult, BaseOsConfig, BaseOsStatus};

use crate::config::StoreConfig;

/// A document addressed by UUID
pub trait Keyed {
    fn key(&self) -> Uuid;
}

impl Keyed for BaseOsConfig {
    fn key(&self) -> Uuid {
        self.uuid()
    }
}

impl Keyed for BaseOsStatus {
    fn key(&self) -> Uuid {
        self.uuid()
    }
}

/// Directory-backed, cached store of `T` keyed by UUID
#[derive(Debug)]
pub struct KeyedStore<T> {
    dir: PathBuf,
    entries: RwLock<HashMap<Uuid, T>>,
}

impl<T> KeyedStore<T>
where
    T: Keyed + Clone + Serialize + DeserializeOwned,
{
    /// Open (creating if needed) the directory and load every readable entry
    pub fn open(dir: impl Into<PathBuf>) -> AbosResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| AbosError::Persist(format!("{}: {}", dir.display(), e)))?;

        let mut entries = HashMap::new();
        let listing = std::fs::read_dir(&dir)
            .map_err(|e| AbosError::Persist(format!("{}: {}", dir.display(), e)))?;
        for entry in listing.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::load_file(&path) {
                Ok(value) => {
                    entries.insert(value.key(), value);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable entry"),
            }
        }
        debug!(dir = %dir.display(), count = entries.len(), "Keyed store opened");

        Ok(Self {
            dir,
            entries: RwLock::new(entries),
        })
    }

    fn load_file(path: &Path) -> AbosResult<T> {
        let bytes = std::fs::read(path)
            .map_err(|e| AbosError::Persist(format!("{}: {}", path.display(), e)))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn path(&self, uuid: &Uuid) -> PathBuf {
        self.dir.join(format!("{}.json", uuid))
    }

    pub fn get(&self, uuid: &Uuid) -> Option<T> {
        self.entries.read().get(uuid).cloned()
    }

    /// Persist `value` and cache it
    pub async fn put(&self, value: T) -> AbosResult<()> {
        let uuid = value.key();
        let path = self.path(&uuid);
        let bytes = serde_json::to_vec_pretty(&value)?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| AbosError::Persist(format!("{}: {}", path.display(), e)))?;
        self.entries.write().insert(uuid, value);
        Ok(())
    }

    /// Remove an entry from disk and cache
    pub async fn remove(&self, uuid: &Uuid) -> AbosResult<Option<T>> {
        let path = self.path(uuid);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(AbosError::Persist(format!("{}: {}", path.display(), e))),
        }
        Ok(self.entries.write().remove(uuid))
    }

    pub fn keys(&self) -> Vec<Uuid> {
        self.entries.read().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// The agent's base-OS config/status documents, as the mapping layer sees them.
/// Lookups are served from memory; writes persist before returning.
#[async_trait]
pub trait BaseOsRegistry: Send + Sync {
    fn config(&self, uuid: &Uuid) -> Option<BaseOsConfig>;
    async fn put_config(&self, config: BaseOsConfig) -> AbosResult<()>;
    fn status(&self, uuid: &Uuid) -> Option<BaseOsStatus>;
    async fn put_status(&self, status: BaseOsStatus) -> AbosResult<()>;
}

/// File-backed [`BaseOsRegistry`]
#[derive(Debug)]
pub struct BaseOsStore {
    pub configs: KeyedStore<BaseOsConfig>,
    pub statuses: KeyedStore<BaseOsStatus>,
}

impl BaseOsStore {
    pub fn open(config: &StoreConfig) -> AbosResult<Self> {
        Ok(Self {
            configs: KeyedStore::open(&config.base_os_config_dir)?,
            statuses: KeyedStore::open(&config.base_os_status_dir)?,
        })
    }
}

#[async_trait]
impl BaseOsRegistry for BaseOsStore {
    fn config(&self, uuid: &Uuid) -> Option<BaseOsConfig> {
        self.configs.get(uuid)
    }

    async fn put_config(&self, config: BaseOsConfig) -> AbosResult<()> {
        self.configs.put(config).await
    }

    fn status(&self, uuid: &Uuid) -> Option<BaseOsStatus> {
        self.statuses.get(uuid)
    }

    async fn put_status(&self, status: BaseOsStatus) -> AbosResult<()> {
        self.statuses.put(status).await
    }
}
