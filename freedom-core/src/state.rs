//! Component I: the State Aggregator. Composes the other components' fresh
//! reads into one snapshot; holds no state of its own and caches nothing.

use crate::{config::Config, error::CoreResult, headers, keys, mapper, mdarray, pages};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentState {
    pub backing_active: bool,
    pub backing_page_count: usize,
    pub md_active: bool,
    pub md_name: Option<String>,
    pub luks_open: bool,
    pub key_count: usize,
    pub header_count: usize,
}

/// Re-derive the full environment state from the filesystem and kernel.
/// Never trusts a previous snapshot.
pub fn status(config: &Config) -> CoreResult<EnvironmentState> {
    let backing = pages::rediscover(&config.root, false)?;
    let array = mdarray::status(&config.root, &config.md_name)?;
    let keys = keys::list(config)?;
    let headers = headers::list(config)?;

    Ok(EnvironmentState {
        backing_active: backing.active(),
        backing_page_count: backing.pages.len(),
        md_active: array.is_some(),
        md_name: array.map(|a| a.name),
        luks_open: mapper::is_open(config),
        key_count: keys.len(),
        header_count: headers.len(),
    })
}
