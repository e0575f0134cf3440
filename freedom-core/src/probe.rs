//! Component B: the Filesystem Probe. Pure-read operations over `statvfs`,
//! directory listings, file contents, and the sysfs/procfs surface listed in
//! spec §6. Nothing here mutates anything.

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{error::CoreError, exe::RunAndCheck, tool::Dependency};

/// Free-space facts about a mounted filesystem, as reported by `statvfs(2)`.
#[derive(Debug, Clone, Copy)]
pub struct SpaceInfo {
    pub available_bytes: u64,
    pub fragment_size: u64,
}

pub fn statvfs(path: &Path) -> Result<SpaceInfo, CoreError> {
    let vfs = nix::sys::statvfs::statvfs(path).map_err(std::io::Error::from)?;
    Ok(SpaceInfo {
        available_bytes: vfs.blocks_available() * vfs.fragment_size(),
        fragment_size: vfs.fragment_size(),
    })
}

/// List the immediate children of a directory. Returns an empty vector if
/// the directory does not exist.
pub fn listdir(path: &Path) -> Result<Vec<PathBuf>, CoreError> {
    if !path.is_dir() {
        return Ok(Vec::new());
    }
    let mut entries: Vec<PathBuf> = fs::read_dir(path)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    entries.sort();
    Ok(entries)
}

pub fn is_dir(path: &Path) -> bool {
    path.is_dir()
}

/// Read a sysfs/procfs text file and trim surrounding whitespace. Returns
/// `None` if the file does not exist, since an absent sysfs attribute is
/// usually "not applicable" rather than an error.
pub fn read_file_trim(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}

/// Classify a backing file's contents using `file -b`. A virgin, zero-filled
/// page reports as the generic `data`; an MD-member page reports something
/// else (e.g. `Linux Software RAID ...`).
pub fn magic(path: &Path) -> Result<String, CoreError> {
    let output = Dependency::File.cmd().arg("-b").arg(path).run_and_check()?;
    Ok(output.stdout.trim().to_string())
}

/// True if `/sys/block/<dev_name>/md` exists, i.e. `dev_name` is an MD array.
pub fn is_md_device(dev_name: &str) -> bool {
    Path::new("/sys/block").join(dev_name).join("md").is_dir()
}

/// Kernel device names of every slave (member) of an MD array, read from
/// `/sys/block/<md>/slaves`.
pub fn md_slaves(dev_name: &str) -> Result<Vec<String>, CoreError> {
    let slaves_dir = Path::new("/sys/block").join(dev_name).join("slaves");
    Ok(listdir(&slaves_dir)?
        .into_iter()
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect())
}

/// The backing file behind a loop device's kernel name, e.g. `loop7`, read
/// from `/sys/block/loop7/loop/backing_file`.
pub fn loop_backing_file(loop_name: &str) -> Option<PathBuf> {
    read_file_trim(
        &Path::new("/sys/block")
            .join(loop_name)
            .join("loop")
            .join("backing_file"),
    )
    .map(PathBuf::from)
}

/// Resolve `/dev/md/<name>` (the name mdadm was given) to its kernel device
/// name (e.g. `md127`) by following the symlink mdadm creates.
pub fn md_kernel_name(md_name: &str) -> Option<String> {
    let path = Path::new("/dev/md").join(md_name);
    let canonical = fs::canonicalize(path).ok()?;
    canonical
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
}

/// Find the loop device already backed by `backing_path`, by walking
/// `/sys/block/loop*/loop/backing_file` instead of shelling out to
/// `losetup --associated`. A read-only sysfs walk, so a repeated call over
/// an unchanged set of pages makes no external tool invocation at all.
pub fn find_loop_device(backing_path: &Path) -> Result<Option<PathBuf>, CoreError> {
    find_loop_device_under(Path::new("/sys/block"), backing_path)
}

fn find_loop_device_under(sys_block: &Path, backing_path: &Path) -> Result<Option<PathBuf>, CoreError> {
    let target = fs::canonicalize(backing_path).unwrap_or_else(|_| backing_path.to_path_buf());

    for entry in listdir(sys_block)? {
        let Some(dev_name) = entry.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if !dev_name.starts_with("loop") {
            continue;
        }
        let Some(backing) = read_file_trim(&sys_block.join(&dev_name).join("loop").join("backing_file")) else {
            continue;
        };
        let resolved = fs::canonicalize(&backing).unwrap_or_else(|_| PathBuf::from(&backing));
        if resolved == target {
            return Ok(Some(Path::new("/dev").join(dev_name)));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listdir_nonexistent() {
        let entries = listdir(Path::new("/nonexistent/path/1234")).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_listdir_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b"), "").unwrap();
        std::fs::write(dir.path().join("a"), "").unwrap();
        let entries = listdir(dir.path()).unwrap();
        assert_eq!(
            entries,
            vec![dir.path().join("a"), dir.path().join("b")]
        );
    }

    #[test]
    fn test_read_file_trim_missing() {
        assert_eq!(read_file_trim(Path::new("/nonexistent/path/1234")), None);
    }

    #[test]
    fn test_read_file_trim_present() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        std::fs::write(&file, "  hello\n").unwrap();
        assert_eq!(read_file_trim(&file), Some("hello".to_string()));
    }

    #[test]
    fn test_is_md_device_false_for_missing() {
        assert!(!is_md_device("nonexistent_md_device_1234"));
    }

    #[test]
    fn test_md_kernel_name_none_for_missing_symlink() {
        assert_eq!(md_kernel_name("nonexistent_md_name_1234"), None);
    }

    #[test]
    fn test_find_loop_device_under_matches_backing_file() {
        let sys_block = tempfile::tempdir().unwrap();
        let backing_dir = tempfile::tempdir().unwrap();
        let backing_file = backing_dir.path().join("page");
        fs::write(&backing_file, b"page contents").unwrap();

        let loop_sys_dir = sys_block.path().join("loop7").join("loop");
        fs::create_dir_all(&loop_sys_dir).unwrap();
        fs::write(loop_sys_dir.join("backing_file"), backing_file.to_string_lossy().as_bytes()).unwrap();

        let found = find_loop_device_under(sys_block.path(), &backing_file).unwrap();
        assert_eq!(found, Some(PathBuf::from("/dev/loop7")));
    }

    #[test]
    fn test_find_loop_device_under_no_match() {
        let sys_block = tempfile::tempdir().unwrap();
        let backing_dir = tempfile::tempdir().unwrap();
        let backing_file = backing_dir.path().join("page");
        fs::write(&backing_file, b"page contents").unwrap();

        let found = find_loop_device_under(sys_block.path(), &backing_file).unwrap();
        assert_eq!(found, None);
    }
}
