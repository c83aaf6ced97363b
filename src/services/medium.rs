//! Removable medium carrying the operator configuration

use crate::config::MediumConfig;
use anyhow::{Context, Result};
use log::info;
use nix::mount::{MntFlags, MsFlags, mount, umount2};
use std::path::{Path, PathBuf};

pub trait Medium {
    /// Directory the medium's contents are reachable under once mounted
    fn mount_point(&self) -> &Path;
    fn mount(&self) -> Result<()>;
    fn unmount(&self) -> Result<()>;
}

/// Block device partition mounted with the mount syscall
#[derive(Clone, Debug)]
pub struct BlockDeviceMedium {
    device: PathBuf,
    mount_point: PathBuf,
    fs_type: String,
}

impl BlockDeviceMedium {
    pub fn new(config: &MediumConfig) -> Self {
        Self {
            device: config.device.clone(),
            mount_point: config.mount_point.clone(),
            fs_type: config.fs_type.clone(),
        }
    }
}

impl Medium for BlockDeviceMedium {
    fn mount_point(&self) -> &Path {
        &self.mount_point
    }

    fn mount(&self) -> Result<()> {
        info!(
            "mount {:?} ({}) at {:?}",
            self.device, self.fs_type, self.mount_point
        );

        mount(
            Some(self.device.as_path()),
            self.mount_point.as_path(),
            Some(self.fs_type.as_str()),
            MsFlags::empty(),
            None::<&str>,
        )
        .context(format!(
            "failed to mount {:?} at {:?}",
            self.device, self.mount_point
        ))
    }

    fn unmount(&self) -> Result<()> {
        info!("unmount {:?}", self.mount_point);

        umount2(self.mount_point.as_path(), MntFlags::MNT_DETACH)
            .context(format!("failed to unmount {:?}", self.mount_point))
    }
}
