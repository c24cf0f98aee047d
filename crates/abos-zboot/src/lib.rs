//! abos-zboot - A/B partition layer
//!
//! Resolves and validates partition labels and states through a
//! [`BootControl`] implementation, runs the partition state machine
//! (dual-active repair, commit), and writes staged images onto the raw device
//! of the non-booted partition.
//!
//! # Example
//!
//! ```ignore
//! use abos_zboot::{create_boot_control, config::ZbootConfig, PartitionManager};
//!
//! let config = ZbootConfig::default();
//! let manager = PartitionManager::new(create_boot_control(&config)?, &config);
//!
//! manager.partition_init().await?;
//! let other = manager.other_partition().await?;
//! manager.write_to_partition("/persist/img/rootfs.img", other).await?;
//! manager.mark_updating(other).await?;
//! ```

pub mod command;
pub mod config;
pub mod partition;
pub mod sim;
pub mod writer;

pub use abos_core::{BootControl, BootControlError};
pub use command::ZbootCommand;
pub use partition::{validate_label, validate_state, PartitionManager};
pub use sim::SimulatedBootControl;
pub use writer::image_sha256;

use std::sync::Arc;

use abos_core::AbosResult;

use crate::config::ZbootConfig;

/// File under `[zboot.simulation] device_dir` holding the simulated slot table
pub const SIMULATION_STATE_FILE: &str = "zboot-state.json";

/// Create a boot-control implementation based on configuration.
///
/// A simulator with a `device_dir` keeps its slot table in that directory and
/// uses `IMGA.img` / `IMGB.img` there as raw devices. Without one it only
/// lives as long as the process.
pub fn create_boot_control(config: &ZbootConfig) -> AbosResult<Arc<dyn BootControl>> {
    if !config.simulate {
        return Ok(Arc::new(ZbootCommand::new(config)));
    }

    let current = config.simulation.current;
    let Some(ref dir) = config.simulation.device_dir else {
        return Ok(Arc::new(SimulatedBootControl::new(current)));
    };

    let sim = SimulatedBootControl::persistent(dir.join(SIMULATION_STATE_FILE), current)?;
    for label in abos_core::PartitionLabel::ALL {
        sim.set_device(label, dir.join(format!("{}.img", label)).display().to_string());
    }
    Ok(Arc::new(sim))
}
