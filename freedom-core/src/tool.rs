//! Names the external binaries this crate shells out to, and the preflight
//! check that must pass before any of them is used. Grounded on the
//! `Dependency`-enum pattern the teacher uses to centralize tool lookup.

use std::process::Command;

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dependency {
    Dd,
    Losetup,
    Mdadm,
    MkfsF2fs,
    MkfsExt4,
    Mount,
    Umount,
    Cryptsetup,
    Curl,
    Tar,
    File,
}

impl Dependency {
    pub fn name(self) -> &'static str {
        match self {
            Dependency::Dd => "dd",
            Dependency::Losetup => "losetup",
            Dependency::Mdadm => "mdadm",
            Dependency::MkfsF2fs => "mkfs.f2fs",
            Dependency::MkfsExt4 => "mkfs.ext4",
            Dependency::Mount => "mount",
            Dependency::Umount => "umount",
            Dependency::Cryptsetup => "cryptsetup",
            Dependency::Curl => "curl",
            Dependency::Tar => "tar",
            Dependency::File => "file",
        }
    }

    pub fn exists(self) -> bool {
        which::which(self.name()).is_ok()
    }

    pub fn cmd(self) -> Command {
        Command::new(self.name())
    }
}

/// The tools §4.A requires to be present before the first operation runs.
const REQUIRED_TOOLS: &[Dependency] = &[Dependency::Cryptsetup, Dependency::Mdadm, Dependency::MkfsF2fs];

/// Verify that `cryptsetup`, `mdadm`, and `mkfs.f2fs` are on `PATH`.
pub fn preflight() -> Result<(), CoreError> {
    for dep in REQUIRED_TOOLS {
        if !dep.exists() {
            return Err(CoreError::PreflightFailure {
                missing_tool: dep.name().to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert_eq!(Dependency::MkfsF2fs.name(), "mkfs.f2fs");
        assert_eq!(Dependency::Cryptsetup.name(), "cryptsetup");
    }

    #[test]
    fn test_exists_for_missing_tool() {
        // Not a real Dependency variant, but `which` itself is exercised via
        // a fabricated binary name through the underlying crate directly.
        assert!(which::which("nonexistent_tool_1234").is_err());
    }
}
