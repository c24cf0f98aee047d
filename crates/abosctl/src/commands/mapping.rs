//! Mapping commands - inspect, look up, reset, install

use std::path::Path;

use anyhow::Result;
use uuid::Uuid;

use abos_core::PartitionLabel;

use super::Runtime;
use crate::output::{MappingRow, OutputContext};

/// Show the mapping records of both partitions
pub async fn show_mapping(rt: &Runtime, ctx: &OutputContext) -> Result<()> {
    let mut rows = Vec::new();
    for label in PartitionLabel::ALL {
        if let Some(info) = rt.mapper.read_partition_info(label).await {
            rows.push(MappingRow::from(&info));
        }
    }
    ctx.print(&rows);
    Ok(())
}

/// Print the partition holding an image
pub async fn find(rt: &Runtime, uuid: &Uuid, sha256: &str, ctx: &OutputContext) -> Result<()> {
    let owner = rt.mapper.find_owner(uuid, sha256).await?;
    let text = owner
        .map(|label| label.to_string())
        .unwrap_or_else(|| "none".to_string());
    ctx.print_value(&owner, &text);
    Ok(())
}

pub async fn reset_mapping(rt: &Runtime, uuid: &Uuid, ctx: &OutputContext) -> Result<()> {
    rt.mapper.reset_partition_info(uuid).await?;
    ctx.success(&format!("Mapping of {} reset", uuid));
    Ok(())
}

/// Stage a base-OS image onto its assigned partition
pub async fn install(rt: &Runtime, uuid: &Uuid, image: &Path, ctx: &OutputContext) -> Result<()> {
    let label = rt.mapper.install_image(uuid, image).await?;
    ctx.success(&format!("Installed {} on {}, reboot to activate", uuid, label));
    Ok(())
}

pub async fn cancel(rt: &Runtime, uuid: &Uuid, ctx: &OutputContext) -> Result<()> {
    rt.mapper.cancel_install(uuid).await?;
    ctx.success(&format!("Install of {} cancelled", uuid));
    Ok(())
}
