//! Best-effort kernel network settings applied before provisioning

use crate::config::HardeningConfig;
use anyhow::{Context, Result};
use log::{info, warn};
use std::{fs, path::Path};

/// Write a single sysfs/procfs attribute
pub fn write_attribute(path: &Path, value: &str) -> Result<()> {
    fs::write(path, value).context(format!("failed to write {value:?} to {path:?}"))
}

/// Apply all configured sysctls, returning how many were written
pub fn apply(config: &HardeningConfig) -> usize {
    let mut applied = 0;

    for (path, value) in &config.sysctls {
        match write_attribute(path, value) {
            Ok(()) => applied += 1,
            Err(e) => warn!("network hardening skipped: {e:#}"),
        }
    }

    info!("network hardening: {applied}/{} settings applied", config.sysctls.len());
    applied
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_do_not_stop_remaining_settings() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let writable = dir.path().join("disable_ipv6");
        let config = HardeningConfig {
            sysctls: vec![
                (dir.path().join("missing/disable_ipv6"), "1".to_string()),
                (writable.clone(), "1".to_string()),
            ],
        };

        assert_eq!(apply(&config), 1);
        assert_eq!(fs::read_to_string(writable).expect("should read"), "1");
    }
}
