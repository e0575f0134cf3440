use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default URL for the innocuous safe-zone payload: a Linux 3.19.8 tarball.
pub const DEFAULT_SAFEZONE_CONTENT_URL: &str =
    "https://cdn.kernel.org/pub/linux/kernel/v3.x/linux-3.19.8.tar.xz";

/// Size of one backing page, in bytes.
pub const GIB: u64 = 1 << 30;

/// Recognized settings, mirroring the table in spec §6. Every field has a
/// default; callers override only what they need.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[serde(default)]
pub struct Config {
    /// Backing-page directory.
    pub root: PathBuf,

    /// MD kernel array name, exposed as `/dev/md/<name>`.
    pub md_name: String,

    /// dm-crypt mapper name, exposed as `/dev/mapper/<name>`.
    pub mapper_name: String,

    /// Size in bytes of one backing page.
    pub data_pagesize: u64,

    /// Default number of keys created by an unparameterized `keys create`.
    pub key_count: usize,

    /// Default number of headers created by an unparameterized `headers create`.
    pub header_count: usize,

    /// Bytes per keyfile.
    pub keyfile_size: usize,

    /// Bytes of a keyfile actually presented to dm-crypt as key material.
    pub key_size: usize,

    /// LUKS sector size unit, in bytes.
    pub luks_sector_size: u64,

    /// URL of the innocuous content downloaded to seed the safe-zone.
    pub safezone_content_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            root: PathBuf::from("/.space"),
            md_name: "freedom".to_string(),
            mapper_name: "freedom".to_string(),
            data_pagesize: GIB,
            key_count: 5,
            header_count: 5,
            keyfile_size: 8192,
            key_size: 512,
            luks_sector_size: 512,
            safezone_content_url: DEFAULT_SAFEZONE_CONTENT_URL.to_string(),
        }
    }
}

impl Config {
    /// Path to the key vault sub-root.
    pub fn key_root(&self) -> PathBuf {
        self.root.join(".k")
    }

    /// Path to the header vault sub-root.
    pub fn header_root(&self) -> PathBuf {
        self.root.join(".h")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.root, PathBuf::from("/.space"));
        assert_eq!(config.md_name, "freedom");
        assert_eq!(config.mapper_name, "freedom");
        assert_eq!(config.data_pagesize, GIB);
        assert_eq!(config.key_count, 5);
        assert_eq!(config.header_count, 5);
        assert_eq!(config.keyfile_size, 8192);
        assert_eq!(config.key_size, 512);
        assert_eq!(config.luks_sector_size, 512);
    }

    #[test]
    fn test_key_header_roots() {
        let mut config = Config::default();
        config.root = PathBuf::from("/tmp/s1");
        assert_eq!(config.key_root(), PathBuf::from("/tmp/s1/.k"));
        assert_eq!(config.header_root(), PathBuf::from("/tmp/s1/.h"));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: Config = serde_yaml::from_str("root: /tmp/x\nkey-count: 3\n").unwrap();
        assert_eq!(config.root, PathBuf::from("/tmp/x"));
        assert_eq!(config.key_count, 3);
        // Untouched fields keep their defaults.
        assert_eq!(config.md_name, "freedom");
    }
}
