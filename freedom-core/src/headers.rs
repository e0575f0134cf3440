//! Component G: the Header Vault. Owns `.h/`: detached LUKS1 headers, each
//! sealed against a freshly-minted key from the Key Vault at a randomly
//! chosen keyfile offset and payload offset. Offsets are returned to the
//! caller at creation time and never persisted anywhere: losing the
//! `HeaderRecord` makes the header indistinguishable from random data,
//! which is the point.

use std::{
    fs,
    ops::RangeInclusive,
    path::{Path, PathBuf},
};

use rand::seq::SliceRandom;
use uuid::Uuid;

use crate::{
    config::{Config, GIB},
    error::{CoreError, CoreResult},
    exe::RunAndCheck,
    keys, probe,
    tool::Dependency,
};

const SECTOR_BYTES: u64 = 512;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderRecord {
    pub header_name: String,
    pub keyfile_offset: u64,
    pub payload_offset: u64,
    pub key_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderInfo {
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
}

fn is_uuid_filename(name: &str) -> bool {
    Uuid::parse_str(name).is_ok()
}

/// Byte offsets into a keyfile at which a `key_size`-byte slice can start
/// without running off the end.
pub fn keyfile_offset_range(keyfile_size: usize, key_size: usize) -> RangeInclusive<u64> {
    0..=(keyfile_size.saturating_sub(key_size) as u64)
}

/// `--align-payload` sector offsets within `[1 GiB, 1 GiB + 1 MiB]`, per
/// design note 2: close enough to a real-world partition start to not stand
/// out, wide enough to give every header a distinct payload origin.
pub fn payload_offset_sector_range() -> RangeInclusive<u64> {
    let lo = GIB.div_ceil(SECTOR_BYTES);
    let hi = (GIB + (1 << 20)).div_ceil(SECTOR_BYTES);
    lo..=hi
}

/// Draw `count` distinct values from `range`, order randomized so no two
/// headers in a batch share an offset (testable properties 4 and 5).
fn choose_distinct(range: RangeInclusive<u64>, count: usize) -> CoreResult<Vec<u64>> {
    let mut pool: Vec<u64> = range.collect();
    if pool.len() < count {
        return Err(CoreError::PreconditionUnmet {
            what: format!("only {} distinct offsets available, {count} requested", pool.len()),
        });
    }
    pool.shuffle(&mut rand::rng());
    pool.truncate(count);
    Ok(pool)
}

/// Seal `count` fresh headers against `device`, each keyed by a newly
/// generated keyfile and a distinct, randomly chosen (keyfile_offset,
/// payload_offset) pair.
pub fn create(config: &Config, device: &Path, count: usize) -> CoreResult<Vec<HeaderRecord>> {
    fs::create_dir_all(config.header_root())?;

    let keyfile_offsets = choose_distinct(keyfile_offset_range(config.keyfile_size, config.key_size), count)?;
    let payload_offsets = choose_distinct(payload_offset_sector_range(), count)?;
    let key_paths = keys::create(config, count)?;

    let mut records = Vec::with_capacity(count);
    for i in 0..count {
        let header_name = Uuid::new_v4().to_string();
        let header_path = config.header_root().join(&header_name);
        let key_path = &key_paths[i];
        let keyfile_offset = keyfile_offsets[i];
        let payload_offset = payload_offsets[i];

        Dependency::Cryptsetup
            .cmd()
            .arg("luksFormat")
            .arg("--type")
            .arg("luks1")
            .arg("--batch-mode")
            .arg("--header")
            .arg(&header_path)
            .arg("--key-file")
            .arg(key_path)
            .arg("--keyfile-offset")
            .arg(keyfile_offset.to_string())
            .arg("--key-size")
            .arg(config.key_size.to_string())
            .arg("--align-payload")
            .arg(payload_offset.to_string())
            .arg(device)
            .run_and_check()?;

        let key_name = key_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        records.push(HeaderRecord {
            header_name,
            keyfile_offset,
            payload_offset,
            key_name,
        });
    }

    Ok(records)
}

/// Enumerate the header files present under `config.header_root()`. Offsets
/// are not recoverable from this listing by design; see module docs.
pub fn list(config: &Config) -> CoreResult<Vec<HeaderInfo>> {
    let mut headers = Vec::new();

    for path in probe::listdir(&config.header_root())? {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if !path.is_file() || !is_uuid_filename(&name) {
            continue;
        }
        let size_bytes = fs::metadata(&path)?.len();
        headers.push(HeaderInfo {
            name,
            path,
            size_bytes,
        });
    }

    headers.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(headers)
}

/// Delete every header file. Refuses unless `confirmed`: a header lost
/// without its `HeaderRecord` makes the mapping it sealed unrecoverable.
pub fn remove(config: &Config, confirmed: bool) -> CoreResult<()> {
    if !confirmed {
        return Err(CoreError::RefusedUnconfirmed);
    }

    for header in list(config)? {
        match fs::remove_file(&header.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}
