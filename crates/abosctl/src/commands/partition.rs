//! Partition commands - inspect, repair, commit and stage

use std::path::Path;

use anyhow::Result;
use tracing::info;

use abos_core::{PartitionLabel, PartitionSnapshot};

use super::Runtime;
use crate::output::{OutputContext, PartitionRow};

/// Show both partitions with their state, device and mapped image
pub async fn status(rt: &Runtime, ctx: &OutputContext) -> Result<()> {
    let PartitionSnapshot { current, other } = rt.partitions.snapshot().await?;
    let current_info = rt.mapper.read_partition_info(current.label).await;
    let other_info = rt.mapper.read_partition_info(other.label).await;

    let rows = [
        PartitionRow::new(&current, "current", current_info.as_ref()),
        PartitionRow::new(&other, "other", other_info.as_ref()),
    ];
    ctx.print(&rows);
    Ok(())
}

/// Repair a dual-active boot environment
pub async fn init(rt: &Runtime, ctx: &OutputContext) -> Result<()> {
    if rt.partitions.partition_init().await? {
        ctx.success("Both partitions were active; other partition marked unused");
    } else {
        ctx.success("Partition states consistent");
    }
    Ok(())
}

/// Commit the booted partition after a successful update boot
pub async fn commit(rt: &Runtime, ctx: &OutputContext) -> Result<()> {
    rt.partitions.mark_active().await?;
    let current = rt.partitions.current_partition().await?;
    ctx.success(&format!("Partition {} committed", current));
    Ok(())
}

/// Copy an image onto the other partition without touching the mapping
pub async fn write(rt: &Runtime, image: &Path, ctx: &OutputContext) -> Result<()> {
    let other = rt.partitions.other_partition().await?;
    let written = rt.partitions.write_to_partition(image, other).await?;
    info!(label = %other, bytes = written, "Image written");
    ctx.success(&format!("Wrote {} bytes to {}", written, other));
    Ok(())
}

pub async fn mark_updating(rt: &Runtime, label: PartitionLabel, ctx: &OutputContext) -> Result<()> {
    rt.partitions.mark_updating(label).await?;
    ctx.success(&format!("Partition {} marked updating", label));
    Ok(())
}

pub async fn mark_unused(rt: &Runtime, label: PartitionLabel, ctx: &OutputContext) -> Result<()> {
    rt.partitions.mark_unused(label).await?;
    ctx.success(&format!("Partition {} marked unused", label));
    Ok(())
}

/// Ask the boot-control layer to reset the device
pub async fn reboot(rt: &Runtime, ctx: &OutputContext) -> Result<()> {
    ctx.success("Rebooting");
    rt.partitions.reset().await?;
    Ok(())
}
