//! Resource preflight before an upload begins
//!
//! Publishing holds the full archive on disk and recompression buffers
//! in memory, so both are checked up front; insufficiency is a fatal
//! error rather than something to discover mid-upload.

use ipaforge_config::PublishConfig;
use ipaforge_errors::{Error, PublishError};
use std::path::Path;
use sysinfo::{Disks, System};
use tracing::warn;

/// Verify available memory and disk exceed the configured minimums.
///
/// A threshold of zero disables that check.
///
/// # Errors
///
/// `PublishError::InsufficientMemory` / `InsufficientDisk`, both fatal
/// and never retried.
pub fn check_resources(config: &PublishConfig) -> Result<(), Error> {
    if config.min_free_memory > 0 {
        let mut system = System::new();
        system.refresh_memory();
        let available = system.available_memory();
        if available < config.min_free_memory {
            return Err(PublishError::InsufficientMemory {
                available,
                required: config.min_free_memory,
            }
            .into());
        }
    }

    if config.min_free_disk > 0 {
        match staging_disk_space(&config.staging_path) {
            Some(available) if available < config.min_free_disk => {
                return Err(PublishError::InsufficientDisk {
                    available,
                    required: config.min_free_disk,
                }
                .into());
            }
            Some(_) => {}
            None => {
                warn!(path = %config.staging_path.display(), "no disk found for staging path, skipping disk preflight");
            }
        }
    }

    Ok(())
}

/// Available space on the filesystem holding the staging path: the
/// disk with the longest mount-point prefix of that path.
fn staging_disk_space(staging: &Path) -> Option<u64> {
    let disks = Disks::new_with_refreshed_list();
    disks
        .iter()
        .filter(|disk| staging.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len())
        .map(sysinfo::Disk::available_space)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_thresholds_always_pass() {
        let config = PublishConfig {
            min_free_memory: 0,
            min_free_disk: 0,
            ..PublishConfig::default()
        };
        check_resources(&config).unwrap();
    }

    #[test]
    fn impossible_memory_requirement_fails_with_no_memory() {
        let config = PublishConfig {
            min_free_memory: u64::MAX,
            min_free_disk: 0,
            ..PublishConfig::default()
        };
        let err = check_resources(&config).unwrap_err();
        assert_eq!(err.code(), "NO_MEMORY");
    }
}
