//! Top-level facade wiring components A-I together behind the ordering
//! spec §5 calls out: forward (pages -> array -> safe-zone -> keys ->
//! headers -> mapping) when building up, the exact reverse when tearing
//! down. Nothing here talks to the outside world directly; `freedomctl` is
//! the only thing that prints or parses.

use std::path::{Path, PathBuf};

use crate::{
    config::Config,
    error::CoreResult,
    headers::{self, HeaderInfo, HeaderRecord},
    keys::{self, KeyInfo},
    mapper,
    mdarray::{self, MdArray},
    pages::{self, Allocation, BackingSet},
    safezone,
    state::{self, EnvironmentState},
    tool,
};

pub struct Environment {
    pub config: Config,
}

impl Environment {
    pub fn new(config: Config) -> Self {
        Environment { config }
    }

    /// Verify the tools §4.A requires are on `PATH` before anything else
    /// runs.
    pub fn preflight(&self) -> CoreResult<()> {
        tool::preflight()
    }

    // -- pages --------------------------------------------------------

    /// `page_size == 0` uses `config.data_pagesize`; a nonzero value
    /// overrides it for this call only.
    pub fn pages_allocate(&self, limit: usize, page_size: u64, simulated: bool) -> CoreResult<Allocation> {
        let page_size = if page_size == 0 { self.config.data_pagesize } else { page_size };
        pages::allocate(&self.config.root, page_size, limit, simulated)
    }

    pub fn pages_list(&self) -> CoreResult<BackingSet> {
        pages::rediscover(&self.config.root, false)
    }

    pub fn pages_activate(&self) -> CoreResult<BackingSet> {
        pages::rediscover(&self.config.root, true)
    }

    pub fn pages_deactivate(&self) -> CoreResult<BackingSet> {
        pages::deactivate(&self.config.root)
    }

    /// Tear down in reverse order: close any open mapping, stop the array,
    /// detach loop devices, then unlink the backing files.
    pub fn pages_remove(&self) -> CoreResult<()> {
        mapper::close(&self.config)?;
        mdarray::stop(&self.config)?;
        pages::remove(&self.config.root)
    }

    // -- array --------------------------------------------------------

    pub fn md_start(&self) -> CoreResult<MdArray> {
        let set = pages::rediscover(&self.config.root, true)?;
        mdarray::start(&self.config, &set)
    }

    pub fn md_stop(&self) -> CoreResult<()> {
        mapper::close(&self.config)?;
        mdarray::stop(&self.config)
    }

    pub fn md_status(&self) -> CoreResult<Option<MdArray>> {
        mdarray::status(&self.config.root, &self.config.md_name)
    }

    pub fn md_populate_safezone(&self) -> CoreResult<()> {
        let array = self.md_start()?;
        let device = Path::new("/dev/md").join(&array.name);
        safezone::format(&device)?;
        safezone::populate(&device, &self.config)
    }

    // -- keys -----------------------------------------------------------

    pub fn keys_create(&self, count: usize) -> CoreResult<Vec<PathBuf>> {
        let count = if count == 0 { self.config.key_count } else { count };
        keys::create(&self.config, count)
    }

    pub fn keys_list(&self) -> CoreResult<Vec<KeyInfo>> {
        keys::list(&self.config)
    }

    pub fn keys_remove(&self, confirmed: bool) -> CoreResult<()> {
        keys::remove(&self.config, confirmed)
    }

    // -- headers ----------------------------------------------------------

    pub fn headers_create(&self, count: usize) -> CoreResult<Vec<HeaderRecord>> {
        let array = self.md_start()?;
        let device = Path::new("/dev/md").join(&array.name);
        let count = if count == 0 { self.config.header_count } else { count };
        headers::create(&self.config, &device, count)
    }

    pub fn headers_list(&self) -> CoreResult<Vec<HeaderInfo>> {
        headers::list(&self.config)
    }

    pub fn headers_remove(&self, confirmed: bool) -> CoreResult<()> {
        headers::remove(&self.config, confirmed)
    }

    // -- PDE mapping ----------------------------------------------------

    pub fn pde_start(&self, header_name: &str, key_name: &str, keyfile_offset: u64, bless: bool) -> CoreResult<PathBuf> {
        let array = self.md_start()?;
        let device = Path::new("/dev/md").join(&array.name);
        let header = self.config.header_root().join(header_name);
        let key = self.config.key_root().join(key_name);
        mapper::open(&self.config, &header, &key, keyfile_offset, &device, bless)
    }

    pub fn pde_stop(&self) -> CoreResult<()> {
        mapper::close(&self.config)
    }

    // -- status -----------------------------------------------------------

    pub fn status(&self) -> CoreResult<EnvironmentState> {
        state::status(&self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_create_defaults_to_config_count() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.root = dir.path().to_path_buf();
        config.key_count = 2;
        let env = Environment::new(config);

        let created = env.keys_create(0).unwrap();
        assert_eq!(created.len(), 2);
    }

    #[test]
    fn test_status_on_fresh_environment() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.root = dir.path().to_path_buf();
        config.mapper_name = "freedom_test_environment_facade_1234".to_string();
        let env = Environment::new(config);

        let state = env.status().unwrap();
        assert!(!state.backing_active);
        assert!(!state.luks_open);
    }
}
