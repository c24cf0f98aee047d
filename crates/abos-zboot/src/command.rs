//! `zboot` subprocess adapter
//!
//! Each call spawns the boot-control utility once and waits for it. There is
//! no timeout: a hung utility blocks the caller.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use abos_core::{BootControl, BootControlError, BootControlResult, PartitionLabel, PartitionState};

use crate::config::ZbootConfig;

/// Boot control backed by the `zboot` command-line utility
#[derive(Debug, Clone)]
pub struct ZbootCommand {
    program: String,
}

impl ZbootCommand {
    pub fn new(config: &ZbootConfig) -> Self {
        Self {
            program: config.command.clone(),
        }
    }

    /// Run the utility and return its trimmed stdout
    async fn run(&self, args: &[&str]) -> BootControlResult<String> {
        let command = format!("{} {}", self.program, args.join(" "));
        debug!(command = %command, "Running boot control");

        let output = Command::new(&self.program)
            .args(args)
            .output()
            .await
            .map_err(|e| BootControlError::Spawn {
                command: command.clone(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(BootControlError::CommandFailed {
                command,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl BootControl for ZbootCommand {
    async fn current_partition(&self) -> BootControlResult<String> {
        self.run(&["curpart"]).await
    }

    async fn partition_state(&self, label: PartitionLabel) -> BootControlResult<String> {
        self.run(&["partstate", label.as_str()]).await
    }

    async fn set_partition_state(
        &self,
        label: PartitionLabel,
        state: PartitionState,
    ) -> BootControlResult<()> {
        let state = state.to_string();
        self.run(&["set_partstate", label.as_str(), &state])
            .await
            .map(|_| ())
    }

    async fn partition_device(&self, label: PartitionLabel) -> BootControlResult<String> {
        self.run(&["partdev", label.as_str()]).await
    }

    async fn reset(&self) -> BootControlResult<()> {
        self.run(&["reset"]).await.map(|_| ())
    }
}
