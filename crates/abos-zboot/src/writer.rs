//! Partition image writer
//!
//! Copies a staged image onto the raw device of the non-booted partition.
//! The partition is left `unused`; advancing it to `updating` is the caller's
//! job once the write has succeeded.

use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::{info, warn};

use abos_core::{AbosError, AbosResult, PartitionLabel, PartitionState};

use crate::partition::PartitionManager;

impl PartitionManager {
    /// Write `source` onto the raw device of `label`.
    ///
    /// `label` must be the other partition and in state `unused`, and must
    /// resolve to a non-empty device. Returns the number of bytes written.
    pub async fn write_to_partition(
        &self,
        source: impl AsRef<Path>,
        label: PartitionLabel,
    ) -> AbosResult<u64> {
        let source = source.as_ref();
        info!(label = %label, source = %source.display(), "Writing image to partition");

        self.ensure_other(label).await?;
        self.require_state(label, PartitionState::Unused).await?;

        let device = self.partition_device(label).await?;
        if device.is_empty() {
            warn!(label = %label, "Null device name for partition");
            return Err(AbosError::MissingDevice(label));
        }

        let written = copy_image(source, Path::new(&device), self.block_size)
            .await
            .map_err(|e| {
                warn!(label = %label, device = %device, error = %e, "Image copy failed");
                AbosError::ImageCopy(format!("{} -> {}: {}", source.display(), device, e))
            })?;

        info!(label = %label, device = %device, bytes = written, "Image written");
        Ok(written)
    }
}

/// Stream `source` onto `device` in `block_size` chunks, then flush to disk
async fn copy_image(source: &Path, device: &Path, block_size: usize) -> std::io::Result<u64> {
    if block_size == 0 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "block size must be > 0",
        ));
    }
    let mut input = File::open(source).await?;
    // The device node must already exist; never create a regular file in its place.
    let mut output = OpenOptions::new().write(true).open(device).await?;

    let mut block = vec![0u8; block_size];
    let mut total = 0u64;
    loop {
        let n = read_block(&mut input, &mut block).await?;
        if n == 0 {
            break;
        }
        output.write_all(&block[..n]).await?;
        total += n as u64;
    }

    output.flush().await?;
    output.sync_all().await?;
    Ok(total)
}

/// Fill `buf` as far as the input allows; short only at end of input
async fn read_block<R: AsyncRead + Unpin>(input: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = input.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// SHA-256 of a staged image file (lowercase hex)
pub async fn image_sha256(path: impl AsRef<Path>) -> AbosResult<String> {
    let path = path.as_ref();
    let mut file = File::open(path)
        .await
        .map_err(|e| AbosError::ImageCopy(format!("{}: {}", path.display(), e)))?;

    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file
            .read(&mut buf)
            .await
            .map_err(|e| AbosError::ImageCopy(format!("{}: {}", path.display(), e)))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ZbootConfig;
    use crate::sim::SimulatedBootControl;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        sim: Arc<SimulatedBootControl>,
        manager: PartitionManager,
        image: std::path::PathBuf,
        device_a: std::path::PathBuf,
        device_b: std::path::PathBuf,
    }

    /// Device A booted, both devices pre-created and zero-filled
    fn fixture(image: &[u8]) -> Fixture {
        // Small blocks so the copy loop runs more than once
        fixture_with_block_size(image, 7)
    }

    fn fixture_with_block_size(image: &[u8], block_size: usize) -> Fixture {
        let dir = TempDir::new().unwrap();
        let device_a = dir.path().join("sda2");
        let device_b = dir.path().join("sda3");
        std::fs::write(&device_a, b"").unwrap();
        std::fs::write(&device_b, b"").unwrap();
        let image_path = dir.path().join("rootfs.img");
        std::fs::write(&image_path, image).unwrap();

        let sim = Arc::new(
            SimulatedBootControl::new(PartitionLabel::A)
                .with_devices(device_a.display().to_string(), device_b.display().to_string()),
        );
        let config = ZbootConfig {
            block_size,
            ..Default::default()
        };
        let manager = PartitionManager::new(sim.clone(), &config);

        Fixture {
            _dir: dir,
            sim,
            manager,
            image: image_path,
            device_a,
            device_b,
        }
    }

    #[tokio::test]
    async fn test_write_to_other_partition() {
        let payload: Vec<u8> = (0..100u8).collect();
        let fx = fixture(&payload);

        let written = fx
            .manager
            .write_to_partition(&fx.image, PartitionLabel::B)
            .await
            .unwrap();

        assert_eq!(written, 100);
        assert_eq!(std::fs::read(&fx.device_b).unwrap(), payload);
        // No implicit state transition
        assert_eq!(fx.sim.state(PartitionLabel::B), "unused");
    }

    #[tokio::test]
    async fn test_write_to_current_rejected() {
        let fx = fixture(b"image");

        let err = fx
            .manager
            .write_to_partition(&fx.image, PartitionLabel::A)
            .await
            .unwrap_err();

        assert!(matches!(err, AbosError::NotOtherPartition(_)));
        assert!(std::fs::read(&fx.device_a).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_requires_unused() {
        let fx = fixture(b"image");
        fx.sim.set_state(PartitionLabel::B, PartitionState::Updating);

        let err = fx
            .manager
            .write_to_partition(&fx.image, PartitionLabel::B)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AbosError::InvalidState {
                actual: PartitionState::Updating,
                ..
            }
        ));
        assert!(std::fs::read(&fx.device_b).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_requires_device() {
        let fx = fixture(b"image");
        fx.sim.set_device(PartitionLabel::B, "");

        let err = fx
            .manager
            .write_to_partition(&fx.image, PartitionLabel::B)
            .await
            .unwrap_err();
        assert!(matches!(err, AbosError::MissingDevice(PartitionLabel::B)));
    }

    #[tokio::test]
    async fn test_copy_failure_propagates() {
        let fx = fixture(b"image");

        let err = fx
            .manager
            .write_to_partition(fx.image.with_file_name("missing.img"), PartitionLabel::B)
            .await
            .unwrap_err();
        assert!(matches!(err, AbosError::ImageCopy(_)));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_zero_block_size_rejected() {
        let fx = fixture_with_block_size(b"rootfs!", 0);

        let err = fx
            .manager
            .write_to_partition(&fx.image, PartitionLabel::B)
            .await
            .unwrap_err();

        assert!(matches!(err, AbosError::ImageCopy(_)));
        assert!(std::fs::read(&fx.device_b).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_image_sha256() {
        let fx = fixture(b"abc");
        assert_eq!(
            image_sha256(&fx.image).await.unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
