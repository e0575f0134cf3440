//! Component E: the Safe-Zone Builder. Formats the leading region of the MD
//! array as an innocuous filesystem and seeds it with innocuous content, so
//! a casual inspection of the array finds nothing but a stock kernel
//! tarball.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::{
    config::{Config, GIB},
    error::CoreResult,
    exe::RunAndCheck,
    probe,
    tool::Dependency,
};

const MIB: u64 = 1 << 20;

/// The safe-zone filesystem occupies everything before the reserved header
/// region, i.e. the leading `1 GiB - 1 MiB`.
pub const SAFEZONE_SIZE_BYTES: u64 = GIB - MIB;

/// Minimum free space the safe-zone filesystem must report before a content
/// download is attempted; below this, the download is skipped rather than
/// left half-extracted.
pub const MIN_CONTENT_FREE_BYTES: u64 = 800 * MIB;

/// `mkfs.f2fs` takes its size argument in 512-byte sectors, regardless of
/// the LUKS sector size configured for the header vault.
pub fn safezone_size_sectors() -> u64 {
    SAFEZONE_SIZE_BYTES / 512
}

fn mount_point() -> PathBuf {
    std::env::temp_dir().join(Uuid::new_v4().to_string())
}

/// Format `device`'s leading region as f2fs. Always reformats; callers are
/// expected to only call this against a freshly-created array.
pub fn format(device: &Path) -> CoreResult<()> {
    let sectors = safezone_size_sectors();
    Dependency::MkfsF2fs
        .cmd()
        .arg("-q")
        .arg(device)
        .arg(sectors.to_string())
        .run_and_check()?;
    Ok(())
}

/// Mount the safe-zone filesystem, download and extract the configured
/// innocuous content, then unmount. A failed download is logged and
/// tolerated: an empty-but-mounted safe-zone is still a valid, if less
/// convincing, decoy.
pub fn populate(device: &Path, config: &Config) -> CoreResult<()> {
    let mountpoint = mount_point();
    std::fs::create_dir_all(&mountpoint)?;

    Dependency::Mount
        .cmd()
        .arg("-t")
        .arg("f2fs")
        .arg(device)
        .arg(&mountpoint)
        .run_and_check()?;

    let result = populate_mounted(&mountpoint, config);

    if let Err(e) = Dependency::Umount.cmd().arg(&mountpoint).run_and_check() {
        log::error!("failed to unmount safe-zone at {}: {e}", mountpoint.display());
    }
    let _ = std::fs::remove_dir(&mountpoint);

    result
}

fn populate_mounted(mountpoint: &Path, config: &Config) -> CoreResult<()> {
    let space = probe::statvfs(mountpoint)?;
    if space.available_bytes < MIN_CONTENT_FREE_BYTES {
        log::warn!(
            "safe-zone has only {} bytes free, skipping content download",
            space.available_bytes
        );
        return Ok(());
    }

    let archive = mountpoint.join("safezone.tar.xz");
    let download = Dependency::Curl
        .cmd()
        .arg("-fsSL")
        .arg("-o")
        .arg(&archive)
        .arg(&config.safezone_content_url)
        .run_and_check();

    if let Err(e) = download {
        log::warn!("safe-zone content download failed, leaving safe-zone empty: {e}");
        return Ok(());
    }

    if let Err(e) = Dependency::Tar
        .cmd()
        .arg("-xf")
        .arg(&archive)
        .arg("-C")
        .arg(mountpoint)
        .run_and_check()
    {
        log::warn!("safe-zone content extraction failed: {e}");
    }

    match std::fs::remove_file(&archive) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safezone_size_sectors() {
        assert_eq!(safezone_size_sectors(), SAFEZONE_SIZE_BYTES / 512);
    }

    #[test]
    fn test_safezone_size_bytes_is_just_under_a_gib() {
        assert_eq!(SAFEZONE_SIZE_BYTES, GIB - (1 << 20));
    }

    #[test]
    fn test_min_content_free_bytes() {
        assert_eq!(MIN_CONTENT_FREE_BYTES, 800 * (1 << 20));
    }
}
