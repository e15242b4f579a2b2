// Note: This is only for test and debug

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{bail, format_err, Error};
use serde::{Deserialize, Serialize};

use proxmox_sys::fs::{replace_file, CreateOptions};

use crate::adapters::{FileSystemAdapter, FsUsage, IoFlush};

#[derive(Serialize, Deserialize)]
struct VirtualFsState {
    label: String,
    capacity: u64,
    used: u64,
    mounted: Option<String>,
}

/// Simulated filesystem driver matching [`VirtualChanger`] media
///
/// Keeps one JSON state file per formatted medium in the changer
/// state directory. Which medium a device currently holds is resolved
/// through the changer status file.
///
/// [VirtualChanger]: crate::adapters::VirtualChanger
pub struct VirtualFs {
    path: PathBuf,
    default_capacity: u64,
}

impl VirtualFs {
    pub fn new<P: AsRef<Path>>(path: P, default_capacity: u64) -> Self {
        Self {
            path: path.as_ref().to_owned(),
            default_capacity,
        }
    }

    fn fs_state_path(&self, label: &str) -> PathBuf {
        let mut path = self.path.clone();
        path.push(format!("fs-{}.json", label));
        path
    }

    fn load_fs_state(&self, label: &str) -> Result<Option<VirtualFsState>, Error> {
        let raw = proxmox_sys::fs::file_read_optional_string(self.fs_state_path(label))?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn store_fs_state(&self, state: &VirtualFsState) -> Result<(), Error> {
        let raw = serde_json::to_string_pretty(state)?;
        replace_file(
            self.fs_state_path(&state.label),
            raw.as_bytes(),
            CreateOptions::new(),
            false,
        )?;
        Ok(())
    }

    // resolve the medium currently inside the device behind `device_path`
    fn current_media(&self, device_path: &Path) -> Result<Option<String>, Error> {
        let name = device_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| format_err!("invalid virtual device path {:?}", device_path))?;
        let serial = match name.strip_prefix("drive-") {
            Some(serial) => serial,
            None => bail!("not a virtual device path: {:?}", device_path),
        };

        let mut status_path = self.path.clone();
        status_path.push("changer-status.json");
        let raw = proxmox_sys::fs::file_read_optional_string(&status_path)?
            .ok_or_else(|| format_err!("virtual changer at {:?} is not provisioned", self.path))?;
        let status: serde_json::Value = serde_json::from_str(&raw)?;

        let drives = status["drives"]
            .as_array()
            .ok_or_else(|| format_err!("malformed changer status file"))?;
        for drive in drives {
            if drive["serial"].as_str() == Some(serial) {
                return Ok(drive["loaded"].as_str().map(String::from));
            }
        }
        bail!("no drive with serial '{}' in virtual changer", serial);
    }

    fn loaded_media(&self, device_path: &Path) -> Result<String, Error> {
        match self.current_media(device_path)? {
            Some(label) => Ok(label),
            None => bail!("device {:?} holds no medium", device_path),
        }
    }

    /// Pre-create a formatted filesystem on a medium (test setup)
    pub fn provision_media(&self, label: &str, capacity: u64, used: u64) -> Result<(), Error> {
        self.store_fs_state(&VirtualFsState {
            label: label.to_string(),
            capacity,
            used,
            mounted: None,
        })
    }

    /// Simulate I/O by adjusting the used space of a formatted medium
    pub fn set_used(&self, label: &str, used: u64) -> Result<(), Error> {
        let mut state = self
            .load_fs_state(label)?
            .ok_or_else(|| format_err!("medium '{}' has no filesystem", label))?;
        state.used = used;
        self.store_fs_state(&state)
    }
}

impl FileSystemAdapter for VirtualFs {
    fn mount(&self, device_path: &Path, mount_point: &Path) -> Result<(), Error> {
        let label = self.loaded_media(device_path)?;
        let mut state = self
            .load_fs_state(&label)?
            .ok_or_else(|| format_err!("medium '{}' has no filesystem", label))?;

        if let Some(ref at) = state.mounted {
            bail!("medium '{}' is already mounted at {}", label, at);
        }

        std::fs::create_dir_all(mount_point)?;
        state.mounted = Some(mount_point.to_string_lossy().to_string());
        self.store_fs_state(&state)
    }

    fn umount(&self, device_path: &Path, mount_point: &Path) -> Result<(), Error> {
        let label = self.loaded_media(device_path)?;
        let mut state = self
            .load_fs_state(&label)?
            .ok_or_else(|| format_err!("medium '{}' has no filesystem", label))?;

        match state.mounted {
            Some(ref at) if Path::new(at) == mount_point => (),
            _ => bail!("medium '{}' is not mounted at {:?}", label, mount_point),
        }

        state.mounted = None;
        self.store_fs_state(&state)
    }

    fn format(&self, device_path: &Path, label: &str) -> Result<(), Error> {
        let loaded = self.loaded_media(device_path)?;
        if loaded != label {
            bail!("device {:?} holds '{}', not '{}'", device_path, loaded, label);
        }
        if self.load_fs_state(label)?.is_some() {
            bail!("medium '{}' already has a filesystem", label);
        }

        self.store_fs_state(&VirtualFsState {
            label: label.to_string(),
            capacity: self.default_capacity,
            used: 0,
            mounted: None,
        })
    }

    fn mounted(&self, device_path: &Path) -> Result<Option<PathBuf>, Error> {
        let label = match self.current_media(device_path)? {
            Some(label) => label,
            None => return Ok(None),
        };
        match self.load_fs_state(&label)? {
            Some(state) => Ok(state.mounted.map(PathBuf::from)),
            None => Ok(None),
        }
    }

    fn df(&self, mount_point: &Path) -> Result<FsUsage, Error> {
        for entry in std::fs::read_dir(&self.path)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !name.starts_with("fs-") || !name.ends_with(".json") {
                continue;
            }
            let raw = std::fs::read_to_string(entry.path())?;
            let state: VirtualFsState = serde_json::from_str(&raw)?;
            if state.mounted.as_deref().map(Path::new) == Some(mount_point) {
                return Ok(FsUsage {
                    used: state.used,
                    free: state.capacity.saturating_sub(state.used),
                });
            }
        }
        bail!("nothing mounted at {:?}", mount_point);
    }
}

/// I/O flush stub counting sync requests
#[derive(Default)]
pub struct VirtualIoFlush {
    flushes: AtomicU64,
}

impl VirtualIoFlush {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flush_count(&self) -> u64 {
        self.flushes.load(Ordering::SeqCst)
    }
}

impl IoFlush for VirtualIoFlush {
    fn flush(&self, _root_path: &Path) -> Result<(), Error> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
