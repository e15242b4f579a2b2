//! POSIX adapters for the 'dir' family
//!
//! A dir device is a plain directory which permanently holds its
//! medium, so "mounting" only publishes the directory under the
//! configured mount prefix (a symlink), and space accounting goes
//! through statvfs.

use std::fs::File;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

use anyhow::{bail, Error};

use phobos_api_types::{DeviceState, MediaFamily};

use crate::adapters::{DeviceLookup, FileSystemAdapter, FsUsage, IoFlush};

/// Space usage of the filesystem backing `path`
pub fn statvfs_usage(path: &Path) -> Result<FsUsage, Error> {
    let stat = nix::sys::statvfs::statvfs(path)?;
    let frsize = stat.fragment_size() as u64;
    Ok(FsUsage {
        used: (stat.blocks() as u64 - stat.blocks_free() as u64) * frsize,
        free: stat.blocks_available() as u64 * frsize,
    })
}

/// Device adapter for the 'dir' family (a device serial is its path)
#[derive(Default)]
pub struct PosixDeviceLookup;

impl PosixDeviceLookup {
    pub fn new() -> Self {
        PosixDeviceLookup
    }
}

impl DeviceLookup for PosixDeviceLookup {
    fn lookup(&self, serial: &str) -> Result<PathBuf, Error> {
        Ok(PathBuf::from(serial))
    }

    fn query(&self, path: &Path) -> Result<DeviceState, Error> {
        let metadata = std::fs::metadata(path)?;
        if !metadata.is_dir() {
            bail!("device path {:?} is not a directory", path);
        }
        Ok(DeviceState {
            family: MediaFamily::Dir,
            serial: path.to_string_lossy().to_string(),
            model: None,
        })
    }
}

/// Filesystem adapter for the 'dir' family
pub struct PosixFs {
    mount_prefix: PathBuf,
}

impl PosixFs {
    pub fn new<P: AsRef<Path>>(mount_prefix: P) -> Self {
        Self {
            mount_prefix: mount_prefix.as_ref().to_owned(),
        }
    }

    // the deterministic mount point candidate for a device path
    fn mount_candidate(&self, device_path: &Path) -> Result<PathBuf, Error> {
        match device_path.file_name() {
            Some(name) => Ok(self.mount_prefix.join(name)),
            None => bail!("device path {:?} has no basename", device_path),
        }
    }
}

impl FileSystemAdapter for PosixFs {
    fn mount(&self, device_path: &Path, mount_point: &Path) -> Result<(), Error> {
        if !device_path.is_dir() {
            bail!("device path {:?} is not a directory", device_path);
        }
        if let Some(parent) = mount_point.parent() {
            std::fs::create_dir_all(parent)?;
        }
        symlink(device_path, mount_point)?;
        Ok(())
    }

    fn umount(&self, device_path: &Path, mount_point: &Path) -> Result<(), Error> {
        let target = std::fs::read_link(mount_point)?;
        if target != device_path {
            bail!(
                "mount point {:?} does not belong to {:?}",
                mount_point,
                device_path
            );
        }
        std::fs::remove_file(mount_point)?;
        Ok(())
    }

    fn format(&self, device_path: &Path, label: &str) -> Result<(), Error> {
        if device_path.is_dir() && std::fs::read_dir(device_path)?.next().is_some() {
            bail!("directory {:?} is not empty", device_path);
        }
        std::fs::create_dir_all(device_path)?;
        std::fs::write(device_path.join(".phobos_label"), format!("{}\n", label))?;
        Ok(())
    }

    fn mounted(&self, device_path: &Path) -> Result<Option<PathBuf>, Error> {
        let candidate = self.mount_candidate(device_path)?;
        match std::fs::read_link(&candidate) {
            Ok(target) if target == device_path => Ok(Some(candidate)),
            Ok(_) => Ok(None),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn df(&self, mount_point: &Path) -> Result<FsUsage, Error> {
        statvfs_usage(mount_point)
    }
}

/// I/O flush for POSIX backed media (fsync on the medium root)
#[derive(Default)]
pub struct PosixIoFlush;

impl PosixIoFlush {
    pub fn new() -> Self {
        PosixIoFlush
    }
}

impl IoFlush for PosixIoFlush {
    fn flush(&self, root_path: &Path) -> Result<(), Error> {
        let file = File::open(root_path)?;
        file.sync_all()?;
        Ok(())
    }
}
