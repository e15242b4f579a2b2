//! Library, device, filesystem and I/O adapter interfaces
//!
//! One implementation per medium family performs the mechanical and
//! OS level actions. The scheduler core only calls the narrow
//! operations declared here and never looks behind them.

use std::path::{Path, PathBuf};

use anyhow::Error;
use serde::{Deserialize, Serialize};

use phobos_api_types::DeviceState;

mod dummy;
pub use dummy::*;

mod virtual_changer;
pub use virtual_changer::*;

mod virtual_fs;
pub use virtual_fs::*;

mod posix;
pub use posix::*;

mod ltfs;
pub use ltfs::*;

/// Address of an element (storage slot or drive) inside a media library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementAddr(pub u64);

impl std::fmt::Display for ElementAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Drive element state reported by a library
#[derive(Debug, Clone)]
pub struct DriveSlot {
    /// Library address of the drive itself
    pub addr: ElementAddr,
    /// Label of the medium currently inside the drive, if any
    pub loaded_label: Option<String>,
}

/// Interface to media change devices (the "library adapter")
///
/// Opening and closing a library handle map to construction and Drop.
/// A single physical changer accepts one command at a time, so the
/// scheduler serializes access to the handle.
pub trait MediaChanger {
    /// Slot address and loaded medium of a drive, looked up by serial
    fn drive_status(&mut self, serial: &str) -> Result<DriveSlot, Error>;

    /// Current address of a medium, looked up by label
    fn locate_media(&mut self, label: &str) -> Result<ElementAddr, Error>;

    /// Address of a free storage slot (the library picks which one)
    fn free_slot(&mut self) -> Result<ElementAddr, Error>;

    /// Move a medium from `src` to `dst`
    fn transfer(&mut self, src: ElementAddr, dst: ElementAddr) -> Result<(), Error>;
}

/// Interface to per-family device drivers (the "device adapter")
pub trait DeviceLookup {
    /// Resolve a device serial to its OS path
    fn lookup(&self, serial: &str) -> Result<PathBuf, Error>;

    /// Query the OS about the device behind `path`
    fn query(&self, path: &Path) -> Result<DeviceState, Error>;
}

/// Space usage reported by a filesystem
#[derive(Debug, Clone, Copy)]
pub struct FsUsage {
    pub used: u64,
    pub free: u64,
}

/// Interface to per-fs-type filesystem drivers (the "fs adapter")
pub trait FileSystemAdapter {
    fn mount(&self, device_path: &Path, mount_point: &Path) -> Result<(), Error>;

    fn umount(&self, device_path: &Path, mount_point: &Path) -> Result<(), Error>;

    /// Create an empty filesystem labeled `label` on the device
    fn format(&self, device_path: &Path, label: &str) -> Result<(), Error>;

    /// Returns the mount point if the device is currently mounted
    fn mounted(&self, device_path: &Path) -> Result<Option<PathBuf>, Error>;

    fn df(&self, mount_point: &Path) -> Result<FsUsage, Error>;
}

/// The slice of the I/O adapter the completion protocol needs
pub trait IoFlush {
    /// Flush caches so that data written under `root_path` is persistent
    fn flush(&self, root_path: &Path) -> Result<(), Error>;
}
