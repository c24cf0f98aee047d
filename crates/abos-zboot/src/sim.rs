//! Simulated two-slot boot control for testing and dry runs

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use abos_core::{BootControl, BootControlError, BootControlResult, PartitionLabel, PartitionState};

/// Raw slot metadata. Values are kept as text so tests can inject output the
/// real utility would never produce.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SlotTable {
    current: String,
    states: HashMap<PartitionLabel, String>,
    devices: HashMap<PartitionLabel, String>,
}

/// In-memory boot control.
///
/// Starts with the booted slot `active` and the other slot `unused`.
/// [`reset`](BootControl::reset) runs a minimal bootloader: a slot marked
/// `updating` is tried next and comes up `inprogress`.
///
/// A simulator opened with [`persistent`](Self::persistent) writes its slot
/// table to a JSON file after every state change or reset, so a dry run can
/// span several processes.
pub struct SimulatedBootControl {
    slots: RwLock<SlotTable>,
    available: AtomicBool,
    resets: AtomicUsize,
    state_file: Option<PathBuf>,
}

impl SimulatedBootControl {
    pub fn new(current: PartitionLabel) -> Self {
        let mut states = HashMap::new();
        states.insert(current, PartitionState::Active.to_string());
        states.insert(current.other(), PartitionState::Unused.to_string());

        Self {
            slots: RwLock::new(SlotTable {
                current: current.to_string(),
                states,
                devices: HashMap::new(),
            }),
            available: AtomicBool::new(true),
            resets: AtomicUsize::new(0),
            state_file: None,
        }
    }

    /// Simulator backed by `path`: resumes the saved slot table if the file
    /// exists, otherwise starts fresh booted from `current`.
    pub fn persistent(path: impl Into<PathBuf>, current: PartitionLabel) -> BootControlResult<Self> {
        let path = path.into();
        let unreadable =
            |e: String| BootControlError::Unavailable(format!("{}: {}", path.display(), e));

        let mut sim = match std::fs::read(&path) {
            Ok(bytes) => {
                let slots: SlotTable =
                    serde_json::from_slice(&bytes).map_err(|e| unreadable(e.to_string()))?;
                debug!(path = %path.display(), current = %slots.current, "Simulated slot table resumed");
                let mut sim = Self::new(current);
                sim.slots = RwLock::new(slots);
                sim
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| unreadable(e.to_string()))?;
                }
                Self::new(current)
            }
            Err(e) => return Err(unreadable(e.to_string())),
        };
        sim.state_file = Some(path);
        Ok(sim)
    }

    async fn persist(&self) -> BootControlResult<()> {
        let Some(path) = &self.state_file else {
            return Ok(());
        };
        let bytes = serde_json::to_vec_pretty(&*self.slots.read())
            .map_err(|e| BootControlError::Unavailable(e.to_string()))?;
        tokio::fs::write(path, bytes)
            .await
            .map_err(|e| BootControlError::Unavailable(format!("{}: {}", path.display(), e)))
    }

    /// Builder-style device assignment
    pub fn with_devices(self, a: impl Into<String>, b: impl Into<String>) -> Self {
        self.set_device(PartitionLabel::A, a);
        self.set_device(PartitionLabel::B, b);
        self
    }

    pub fn set_device(&self, label: PartitionLabel, device: impl Into<String>) {
        self.slots.write().devices.insert(label, device.into());
    }

    pub fn set_state(&self, label: PartitionLabel, state: PartitionState) {
        self.set_raw_state(label, &state.to_string());
    }

    /// Store an arbitrary state string for a slot
    pub fn set_raw_state(&self, label: PartitionLabel, raw: &str) {
        self.slots.write().states.insert(label, raw.to_string());
    }

    /// Store an arbitrary answer for the current-partition query
    pub fn set_raw_current(&self, raw: &str) {
        self.slots.write().current = raw.to_string();
    }

    /// Make every call fail, as if the utility could not be run
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Raw state of a slot
    pub fn state(&self, label: PartitionLabel) -> String {
        self.slots
            .read()
            .states
            .get(&label)
            .cloned()
            .unwrap_or_default()
    }

    /// Raw current-partition answer
    pub fn current(&self) -> String {
        self.slots.read().current.clone()
    }

    /// Number of resets requested so far
    pub fn reset_count(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    /// Reboot the simulated device
    pub fn reboot(&self) {
        let mut slots = self.slots.write();
        let Ok(current) = slots.current.parse::<PartitionLabel>() else {
            return;
        };
        let other = current.other();
        let updating = PartitionState::Updating.to_string();

        if slots.states.get(&other) == Some(&updating) {
            slots
                .states
                .insert(other, PartitionState::InProgress.to_string());
            slots.current = other.to_string();
            info!(from = %current, to = %other, "Simulated boot switched partition");
        } else {
            info!(partition = %current, "Simulated boot kept partition");
        }
    }

    fn check_available(&self, call: &str) -> BootControlResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BootControlError::Unavailable(format!("simulated {}", call)))
        }
    }
}

#[async_trait]
impl BootControl for SimulatedBootControl {
    async fn current_partition(&self) -> BootControlResult<String> {
        self.check_available("curpart")?;
        Ok(self.current())
    }

    async fn partition_state(&self, label: PartitionLabel) -> BootControlResult<String> {
        self.check_available("partstate")?;
        Ok(self.state(label))
    }

    async fn set_partition_state(
        &self,
        label: PartitionLabel,
        state: PartitionState,
    ) -> BootControlResult<()> {
        self.check_available("set_partstate")?;
        self.set_state(label, state);
        self.persist().await
    }

    async fn partition_device(&self, label: PartitionLabel) -> BootControlResult<String> {
        self.check_available("partdev")?;
        Ok(self
            .slots
            .read()
            .devices
            .get(&label)
            .cloned()
            .unwrap_or_default())
    }

    async fn reset(&self) -> BootControlResult<()> {
        self.check_available("reset")?;
        self.resets.fetch_add(1, Ordering::SeqCst);
        self.reboot();
        self.persist().await
    }
}
