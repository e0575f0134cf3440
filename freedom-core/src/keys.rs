//! Component F: the Key Vault. Owns `.k/`: random keyfiles, named by UUID,
//! that the Header Vault draws on when sealing a detached LUKS header.

use std::{
    fs,
    path::{Path, PathBuf},
};

use md5::{Digest, Md5};
use uuid::Uuid;

use crate::{
    config::Config,
    error::{CoreError, CoreResult},
    exe::RunAndCheck,
    probe,
    tool::Dependency,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInfo {
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    /// MD5 of the keyfile's contents, for human identification only; this
    /// is never used for anything security-relevant.
    pub fingerprint: String,
}

fn is_uuid_filename(name: &str) -> bool {
    Uuid::parse_str(name).is_ok()
}

/// Generate `count` random keyfiles of `keyfile_size` bytes under
/// `config.key_root()`, named by a freshly-minted UUID.
pub fn create(config: &Config, count: usize) -> CoreResult<Vec<PathBuf>> {
    let root = config.key_root();
    fs::create_dir_all(&root)?;

    let mut created = Vec::with_capacity(count);
    for _ in 0..count {
        let path = root.join(Uuid::new_v4().to_string());
        Dependency::Dd
            .cmd()
            .arg("if=/dev/urandom")
            .arg(format!("of={}", path.display()))
            .arg("bs=1")
            .arg(format!("count={}", config.keyfile_size))
            .run_and_check()?;
        created.push(path);
    }

    Ok(created)
}

fn fingerprint_of(path: &Path) -> CoreResult<String> {
    let bytes = fs::read(path)?;
    let digest = Md5::digest(&bytes);
    Ok(format!("{digest:x}"))
}

/// Enumerate every keyfile under `config.key_root()`, re-read from disk.
pub fn list(config: &Config) -> CoreResult<Vec<KeyInfo>> {
    let root = config.key_root();
    let mut keys = Vec::new();

    for path in probe::listdir(&root)? {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if !path.is_file() || !is_uuid_filename(&name) {
            continue;
        }

        let size_bytes = fs::metadata(&path)?.len();
        let fingerprint = fingerprint_of(&path)?;
        keys.push(KeyInfo {
            name,
            path,
            size_bytes,
            fingerprint,
        });
    }

    keys.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(keys)
}

/// Delete every keyfile under `config.key_root()`. Refuses unless
/// `confirmed`, since a key lost without a corresponding header backup is
/// unrecoverable.
pub fn remove(config: &Config, confirmed: bool) -> CoreResult<()> {
    if !confirmed {
        return Err(CoreError::RefusedUnconfirmed);
    }

    for key in list(config)? {
        match fs::remove_file(&key.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_of_known_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, b"abc").unwrap();
        // md5("abc") is a well-known test vector.
        assert_eq!(fingerprint_of(&path).unwrap(), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn test_list_ignores_non_uuid_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.root = dir.path().to_path_buf();
        fs::create_dir_all(config.key_root()).unwrap();
        fs::write(config.key_root().join("README"), "not a key").unwrap();

        let keys = list(&config).unwrap();
        assert!(keys.is_empty());
    }

    #[test]
    fn test_list_finds_uuid_named_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.root = dir.path().to_path_buf();
        fs::create_dir_all(config.key_root()).unwrap();
        let name = Uuid::new_v4().to_string();
        fs::write(config.key_root().join(&name), b"keybytes").unwrap();

        let keys = list(&config).unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].name, name);
        assert_eq!(keys[0].size_bytes, 8);
    }

    #[test]
    fn test_remove_refuses_unconfirmed() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.root = dir.path().to_path_buf();
        let err = remove(&config, false).unwrap_err();
        assert!(matches!(err, CoreError::RefusedUnconfirmed));
    }

    #[test]
    fn test_remove_confirmed_deletes_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.root = dir.path().to_path_buf();
        fs::create_dir_all(config.key_root()).unwrap();
        fs::write(config.key_root().join(Uuid::new_v4().to_string()), b"x").unwrap();

        remove(&config, true).unwrap();
        assert!(list(&config).unwrap().is_empty());
    }
}
