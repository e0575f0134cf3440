//! Component H: the PDE Mapper. Opens a detached LUKS header against a
//! device at a caller-supplied (key, keyfile_offset) tuple, and optionally
//! blesses the resulting mapping with a fresh filesystem.

use std::path::{Path, PathBuf};

use crate::{
    config::Config,
    error::{CoreError, CoreResult},
    exe::RunAndCheck,
    tool::Dependency,
};

fn mapper_path(mapper_name: &str) -> PathBuf {
    Path::new("/dev/mapper").join(mapper_name)
}

/// True if the configured mapper device is currently open.
pub fn is_open(config: &Config) -> bool {
    mapper_path(&config.mapper_name).exists()
}

/// Open `header` against `device`, sealed by the `key_size` bytes of `key`
/// starting at `keyfile_offset`. A wrong header/key/offset tuple does not
/// distinguish itself from "no such mapping exists" at the `cryptsetup`
/// layer, so any failure here is reported as [`CoreError::WrongTuple`].
/// When `bless` is set, the newly opened mapping is formatted ext4,
/// destroying anything that happened to decrypt underneath it.
pub fn open(
    config: &Config,
    header: &Path,
    key: &Path,
    keyfile_offset: u64,
    device: &Path,
    bless: bool,
) -> CoreResult<PathBuf> {
    if !header.is_file() {
        return Err(CoreError::NotFound {
            path: header.to_path_buf(),
        });
    }
    if !key.is_file() {
        return Err(CoreError::NotFound {
            path: key.to_path_buf(),
        });
    }

    let result = Dependency::Cryptsetup
        .cmd()
        .arg("luksOpen")
        .arg(device)
        .arg(&config.mapper_name)
        .arg("--key-size")
        .arg(config.key_size.to_string())
        .arg("--key-file")
        .arg(key)
        .arg("--keyfile-offset")
        .arg(keyfile_offset.to_string())
        .arg("--header")
        .arg(header)
        .run_and_check();

    if result.is_err() {
        return Err(CoreError::WrongTuple);
    }

    let mapped = mapper_path(&config.mapper_name);

    if bless {
        Dependency::MkfsExt4
            .cmd()
            .arg("-q")
            .arg("-F")
            .arg(&mapped)
            .run_and_check()?;
    }

    Ok(mapped)
}

/// Close the mapper device. Idempotent: a no-op if nothing is open.
pub fn close(config: &Config) -> CoreResult<()> {
    if !is_open(config) {
        return Ok(());
    }

    Dependency::Cryptsetup
        .cmd()
        .arg("luksClose")
        .arg(&config.mapper_name)
        .run_and_check()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapper_path() {
        assert_eq!(mapper_path("freedom"), PathBuf::from("/dev/mapper/freedom"));
    }

    #[test]
    fn test_open_rejects_missing_header() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        let missing_header = dir.path().join("no-such-header");
        let key = dir.path().join("key");
        std::fs::write(&key, b"k").unwrap();

        let err = open(&config, &missing_header, &key, 0, Path::new("/dev/null"), false).unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[test]
    fn test_open_rejects_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        let header = dir.path().join("header");
        std::fs::write(&header, b"h").unwrap();
        let missing_key = dir.path().join("no-such-key");

        let err = open(&config, &header, &missing_key, 0, Path::new("/dev/null"), false).unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[test]
    fn test_close_is_noop_when_not_open() {
        let mut config = Config::default();
        config.mapper_name = "freedom_test_definitely_not_open_1234".to_string();
        close(&config).unwrap();
    }
}
