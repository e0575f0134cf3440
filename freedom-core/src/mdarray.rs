//! Component D: the MD Array Controller. Assembles, creates, adopts, and
//! stops the RAID-0 device built from the backing-page loop devices.

use std::path::{Path, PathBuf};

use crate::{
    config::Config,
    error::{CoreError, CoreResult},
    exe::RunAndCheck,
    pages::BackingSet,
    probe,
    tool::Dependency,
};

/// Only RAID-0 is ever reachable from the command surface, but the type
/// keeps `mdadm --level=` out of stringly-typed call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaidLevel {
    Raid0,
}

impl RaidLevel {
    pub fn name(self) -> &'static str {
        match self {
            RaidLevel::Raid0 => "0",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MdArray {
    pub name: String,
    pub member_devices: Vec<PathBuf>,
    pub total_sectors: u64,
}

fn md_device_path(name: &str) -> PathBuf {
    Path::new("/dev/md").join(name)
}

/// True if every slave of `kernel_name` resolves to a backing page inside
/// `root`.
fn owns_all_slaves(kernel_name: &str, root: &Path) -> CoreResult<bool> {
    let slaves = probe::md_slaves(kernel_name)?;
    if slaves.is_empty() {
        return Ok(false);
    }
    for slave in &slaves {
        let owned = probe::loop_backing_file(slave)
            .map(|p| p.starts_with(root))
            .unwrap_or(false);
        if !owned {
            return Ok(false);
        }
    }
    Ok(true)
}

fn array_at(kernel_name: &str, root: &Path) -> CoreResult<Option<MdArray>> {
    if !probe::is_md_device(kernel_name) || !owns_all_slaves(kernel_name, root)? {
        return Ok(None);
    }
    let member_devices = probe::md_slaves(kernel_name)?
        .into_iter()
        .map(|s| PathBuf::from("/dev").join(s))
        .collect();
    let total_sectors = probe::read_file_trim(&Path::new("/sys/block").join(kernel_name).join("size"))
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    Ok(Some(MdArray {
        name: kernel_name.to_string(),
        member_devices,
        total_sectors,
    }))
}

/// Resolve `/dev/md/<md_name>` directly via its kernel name first, falling
/// back to a full `/sys/block/*/md` walk for an array assembled under a
/// different name but still entirely backed by pages under `root`.
pub fn status(root: &Path, md_name: &str) -> CoreResult<Option<MdArray>> {
    if let Some(kernel_name) = probe::md_kernel_name(md_name) {
        if let Some(array) = array_at(&kernel_name, root)? {
            return Ok(Some(array));
        }
    }

    for entry in probe::listdir(Path::new("/sys/block"))? {
        let Some(dev_name) = entry.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if let Some(array) = array_at(&dev_name, root)? {
            return Ok(Some(array));
        }
    }
    Ok(None)
}

/// Start the array named in `config.md_name` from `set`'s loop devices.
/// Adopts a pre-existing array already entirely backed by our pages;
/// otherwise creates one (virgin, zero-filled pages) or assembles one
/// (pages already bearing MD metadata).
pub fn start(config: &Config, set: &BackingSet) -> CoreResult<MdArray> {
    if set.pages.is_empty() {
        return Err(CoreError::PreconditionUnmet {
            what: "no backing pages".to_string(),
        });
    }

    if let Some(existing) = status(&config.root, &config.md_name)? {
        log::debug!("adopting pre-existing array '{}'", existing.name);
        return Ok(existing);
    }

    let md_dev_path = md_device_path(&config.md_name);
    if md_dev_path.exists() {
        return Err(CoreError::PreconditionUnmet {
            what: format!("md name '{}' already in use", config.md_name),
        });
    }

    let loop_devices = set.loop_devices();
    if loop_devices.len() != set.pages.len() {
        return Err(CoreError::PreconditionUnmet {
            what: "not every backing page has an attached loop device".to_string(),
        });
    }

    let first_magic = probe::magic(&loop_devices[0])?;

    if first_magic == "data" {
        log::debug!("creating array '{}' from {} virgin page(s)", config.md_name, loop_devices.len());
        let mut cmd = Dependency::Mdadm.cmd();
        cmd.arg("--create")
            .arg(&md_dev_path)
            .arg(format!("--level={}", RaidLevel::Raid0.name()))
            .arg(format!("--raid-devices={}", loop_devices.len()));
        for dev in &loop_devices {
            cmd.arg(dev);
        }
        cmd.run_and_check()?;
    } else {
        log::debug!("assembling array '{}' from {} existing member(s)", config.md_name, loop_devices.len());
        let mut cmd = Dependency::Mdadm.cmd();
        cmd.arg("--assemble").arg(&md_dev_path);
        for dev in &loop_devices {
            cmd.arg(dev);
        }
        if cmd.run_and_check().is_err() {
            return Err(CoreError::ArrayInconsistent {
                expected: loop_devices.len(),
                found: 0,
            });
        }
    }

    let array = status(&config.root, &config.md_name)?.ok_or_else(|| CoreError::PreconditionUnmet {
        what: "array did not appear in /sys/block after create/assemble".to_string(),
    })?;
    log::info!("assembled array '{}' from {} member(s)", array.name, array.member_devices.len());
    Ok(array)
}

/// Stop the array named in `config.md_name`. Idempotent: a no-op if the
/// device does not exist.
pub fn stop(config: &Config) -> CoreResult<()> {
    let md_dev_path = md_device_path(&config.md_name);
    if !md_dev_path.exists() {
        log::debug!("array '{}' not present, nothing to stop", config.md_name);
        return Ok(());
    }

    Dependency::Mdadm
        .cmd()
        .arg("--stop")
        .arg(&md_dev_path)
        .run_and_check()?;
    log::info!("stopped array '{}'", config.md_name);
    Ok(())
}
