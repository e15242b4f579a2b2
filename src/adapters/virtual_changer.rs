// Note: This is only for test and debug

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{bail, format_err, Error};
use serde::{Deserialize, Serialize};

use proxmox_sys::fs::{replace_file, CreateOptions};

use phobos_api_types::{DeviceState, MediaFamily};

use crate::adapters::{DeviceLookup, DriveSlot, ElementAddr, MediaChanger};

/// First storage slot address; drives live below this
const SLOT_BASE_ADDR: u64 = 1024;

#[derive(Serialize, Deserialize)]
struct VirtualDriveEntry {
    serial: String,
    addr: u64,
    loaded: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct VirtualSlotEntry {
    addr: u64,
    label: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct VirtualChangerStatus {
    drives: Vec<VirtualDriveEntry>,
    slots: Vec<VirtualSlotEntry>,
}

/// Simulated media changer keeping its state in a JSON file
///
/// Opening the changer locks the state directory, so only one handle
/// can issue commands at a time (like a real SCSI changer).
pub struct VirtualChanger {
    path: PathBuf,
    _lock: File,
}

impl VirtualChanger {
    /// This needs to lock the changer state directory
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_owned();
        proxmox_lang::try_block!({
            let mut lock_path = path.clone();
            lock_path.push(".changer.lck");

            let options = CreateOptions::new();
            let timeout = std::time::Duration::new(10, 0);
            let lock = proxmox_sys::fs::open_file_locked(&lock_path, timeout, true, options)?;

            Ok(Self { path, _lock: lock })
        })
        .map_err(|err: Error| format_err!("open virtual changer failed - {}", err))
    }

    /// Create the initial state: empty drives, one slot per medium
    pub fn provision<P: AsRef<Path>>(
        path: P,
        drives: &[&str],
        media: &[&str],
    ) -> Result<(), Error> {
        std::fs::create_dir_all(&path)?;

        let status = VirtualChangerStatus {
            drives: drives
                .iter()
                .enumerate()
                .map(|(i, serial)| VirtualDriveEntry {
                    serial: serial.to_string(),
                    addr: i as u64 + 1,
                    loaded: None,
                })
                .collect(),
            slots: media
                .iter()
                .enumerate()
                .map(|(i, label)| VirtualSlotEntry {
                    addr: SLOT_BASE_ADDR + i as u64,
                    label: Some(label.to_string()),
                })
                .collect(),
        };

        let changer = Self::open(path)?;
        changer.store_status(&status)
    }

    fn status_file_path(&self) -> PathBuf {
        let mut path = self.path.clone();
        path.push("changer-status.json");
        path
    }

    fn load_status(&self) -> Result<VirtualChangerStatus, Error> {
        let raw = proxmox_sys::fs::file_read_optional_string(self.status_file_path())?;
        match raw {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => bail!("virtual changer at {:?} is not provisioned", self.path),
        }
    }

    fn store_status(&self, status: &VirtualChangerStatus) -> Result<(), Error> {
        let raw = serde_json::to_string_pretty(status)?;
        replace_file(
            self.status_file_path(),
            raw.as_bytes(),
            CreateOptions::new(),
            false,
        )?;
        Ok(())
    }

    // take the medium at `addr`, if any
    fn take_at(status: &mut VirtualChangerStatus, addr: u64) -> Option<String> {
        for drive in status.drives.iter_mut() {
            if drive.addr == addr {
                return drive.loaded.take();
            }
        }
        for slot in status.slots.iter_mut() {
            if slot.addr == addr {
                return slot.label.take();
            }
        }
        None
    }

    // put a medium at `addr`; fails if the element is missing or occupied
    fn put_at(status: &mut VirtualChangerStatus, addr: u64, label: String) -> Result<(), Error> {
        for drive in status.drives.iter_mut() {
            if drive.addr == addr {
                if drive.loaded.is_some() {
                    bail!("drive at address {} is occupied", addr);
                }
                drive.loaded = Some(label);
                return Ok(());
            }
        }
        for slot in status.slots.iter_mut() {
            if slot.addr == addr {
                if slot.label.is_some() {
                    bail!("slot at address {} is occupied", addr);
                }
                slot.label = Some(label);
                return Ok(());
            }
        }
        bail!("no such element address {}", addr);
    }
}

impl MediaChanger for VirtualChanger {
    fn drive_status(&mut self, serial: &str) -> Result<DriveSlot, Error> {
        let status = self.load_status()?;
        for drive in status.drives.iter() {
            if drive.serial == serial {
                return Ok(DriveSlot {
                    addr: ElementAddr(drive.addr),
                    loaded_label: drive.loaded.clone(),
                });
            }
        }
        bail!("no drive with serial '{}' in virtual changer", serial);
    }

    fn locate_media(&mut self, label: &str) -> Result<ElementAddr, Error> {
        let status = self.load_status()?;
        for slot in status.slots.iter() {
            if slot.label.as_deref() == Some(label) {
                return Ok(ElementAddr(slot.addr));
            }
        }
        for drive in status.drives.iter() {
            if drive.loaded.as_deref() == Some(label) {
                return Ok(ElementAddr(drive.addr));
            }
        }
        bail!("medium '{}' not found in virtual changer", label);
    }

    fn free_slot(&mut self) -> Result<ElementAddr, Error> {
        let status = self.load_status()?;
        for slot in status.slots.iter() {
            if slot.label.is_none() {
                return Ok(ElementAddr(slot.addr));
            }
        }
        bail!("no free slot in virtual changer");
    }

    fn transfer(&mut self, src: ElementAddr, dst: ElementAddr) -> Result<(), Error> {
        let mut status = self.load_status()?;

        let label = match Self::take_at(&mut status, src.0) {
            Some(label) => label,
            None => bail!("no medium at source address {}", src),
        };
        Self::put_at(&mut status, dst.0, label)?;

        self.store_status(&status)
    }
}

/// Device adapter matching [`VirtualChanger`] drives
pub struct VirtualDeviceLookup {
    path: PathBuf,
}

impl VirtualDeviceLookup {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_owned(),
        }
    }
}

impl DeviceLookup for VirtualDeviceLookup {
    fn lookup(&self, serial: &str) -> Result<PathBuf, Error> {
        let mut path = self.path.clone();
        path.push(format!("drive-{}", serial));
        Ok(path)
    }

    fn query(&self, path: &Path) -> Result<DeviceState, Error> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| format_err!("invalid virtual device path {:?}", path))?;
        let serial = match name.strip_prefix("drive-") {
            Some(serial) => serial.to_string(),
            None => bail!("not a virtual device path: {:?}", path),
        };
        Ok(DeviceState {
            family: MediaFamily::Tape,
            serial,
            model: Some(String::from("VIRTUAL-DRIVE")),
        })
    }
}
