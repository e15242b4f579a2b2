//! Device descriptor and the device state machine
//!
//! A device moves through `EMPTY -> LOADED -> MOUNTED -> BUSY` (and
//! back), with `FAILED` reachable from any state on hard error. The
//! fields driving this are private; the methods below are the only
//! way to change them.

use std::path::{Path, PathBuf};

use log::info;

use phobos_api_types::{DeviceInfo, MediaInfo, MediaStats, OpStatus};

use crate::adapters::{ElementAddr, FileSystemAdapter, MediaChanger};
use crate::lrs::LrsError;

/// One physical device known to this host
pub struct DeviceDescriptor {
    info: DeviceInfo,
    dev_path: PathBuf,
    lib_addr: ElementAddr,
    op_status: OpStatus,
    mount_path: Option<PathBuf>,
    // exclusively owned once attached, released on unload
    media: Option<MediaInfo>,
}

impl DeviceDescriptor {
    /// Device discovered without a medium inside
    pub fn discovered_empty(info: DeviceInfo, dev_path: PathBuf, lib_addr: ElementAddr) -> Self {
        let dev = Self {
            info,
            dev_path,
            lib_addr,
            op_status: OpStatus::Empty,
            mount_path: None,
            media: None,
        };
        dev.assert_invariants();
        dev
    }

    /// Device discovered with a medium loaded but not mounted
    pub fn discovered_loaded(
        info: DeviceInfo,
        dev_path: PathBuf,
        lib_addr: ElementAddr,
        media: MediaInfo,
    ) -> Self {
        let dev = Self {
            info,
            dev_path,
            lib_addr,
            op_status: OpStatus::Loaded,
            mount_path: None,
            media: Some(media),
        };
        dev.assert_invariants();
        dev
    }

    /// Device discovered with its medium already mounted
    pub fn discovered_mounted(
        info: DeviceInfo,
        dev_path: PathBuf,
        lib_addr: ElementAddr,
        media: MediaInfo,
        mount_path: PathBuf,
    ) -> Self {
        let dev = Self {
            info,
            dev_path,
            lib_addr,
            op_status: OpStatus::Mounted,
            mount_path: Some(mount_path),
            media: Some(media),
        };
        dev.assert_invariants();
        dev
    }

    /// Device excluded from use because discovery failed
    pub fn discovered_failed(info: DeviceInfo) -> Self {
        Self {
            info,
            dev_path: PathBuf::new(),
            lib_addr: ElementAddr(0),
            op_status: OpStatus::Failed,
            mount_path: None,
            media: None,
        }
    }

    pub fn serial(&self) -> &str {
        &self.info.serial
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    pub fn dev_path(&self) -> &Path {
        &self.dev_path
    }

    pub fn op_status(&self) -> OpStatus {
        self.op_status
    }

    pub fn media(&self) -> Option<&MediaInfo> {
        self.media.as_ref()
    }

    pub fn mount_path(&self) -> Option<&Path> {
        self.mount_path.as_deref()
    }

    /// Free space on the loaded medium, if any
    pub fn free_space(&self) -> Option<u64> {
        self.media.as_ref().map(|m| m.stats.phys_spc_free)
    }

    // FAILED devices may keep a stuck medium/mount path attached, so
    // the invariant only binds the live states
    fn assert_invariants(&self) {
        if self.op_status == OpStatus::Failed {
            return;
        }
        debug_assert_eq!(
            self.media.is_some(),
            matches!(
                self.op_status,
                OpStatus::Loaded | OpStatus::Mounted | OpStatus::Busy
            ),
            "loaded medium vs op_status invariant violated on '{}'",
            self.info.serial
        );
        debug_assert_eq!(
            self.mount_path.is_some(),
            matches!(self.op_status, OpStatus::Mounted | OpStatus::Busy),
            "mount path vs op_status invariant violated on '{}'",
            self.info.serial
        );
    }

    fn invalid_state(&self, op: &'static str) -> LrsError {
        LrsError::InvalidDeviceState {
            serial: self.info.serial.clone(),
            status: self.op_status,
            op,
        }
    }

    fn adapter_error(&self, op: &'static str, err: anyhow::Error) -> LrsError {
        LrsError::Device {
            op,
            serial: self.info.serial.clone(),
            source: err,
        }
    }

    /// Mark the device unusable for the rest of the process lifetime
    ///
    /// A stuck medium or mount path stays attached; reconciling a
    /// FAILED device is an operator task.
    pub fn mark_failed(&mut self) {
        self.op_status = OpStatus::Failed;
    }

    /// Move a medium from its library slot into this device
    ///
    /// On success the descriptor takes ownership of `media`. On move
    /// failure the device is blamed and marked FAILED, even though
    /// the medium could be at fault - the library gives us no way to
    /// tell them apart.
    pub fn load(
        &mut self,
        changer: &mut dyn MediaChanger,
        media: MediaInfo,
    ) -> Result<(), LrsError> {
        if self.op_status != OpStatus::Empty || self.media.is_some() {
            return Err(self.invalid_state("load"));
        }

        let src = match changer.locate_media(&media.label) {
            Ok(addr) => addr,
            Err(err) => {
                self.mark_failed();
                return Err(self.adapter_error("load", err));
            }
        };

        if let Err(err) = changer.transfer(src, self.lib_addr) {
            self.mark_failed();
            return Err(self.adapter_error("load", err));
        }

        info!(
            "loaded medium '{}' into device '{}'",
            media.label, self.info.serial
        );
        self.op_status = OpStatus::Loaded;
        self.media = Some(media);
        self.assert_invariants();
        Ok(())
    }

    /// Mount the loaded medium under `mount_prefix`
    ///
    /// The mount point is deterministic: the device basename under
    /// the prefix. On failure the device is marked FAILED but keeps
    /// the medium attached; recovery has to go through an explicit
    /// unload.
    pub fn mount(
        &mut self,
        fs: &dyn FileSystemAdapter,
        mount_prefix: &Path,
    ) -> Result<(), LrsError> {
        if self.op_status != OpStatus::Loaded || self.media.is_none() {
            return Err(self.invalid_state("mount"));
        }

        let basename = match self.dev_path.file_name() {
            Some(name) => name.to_owned(),
            None => std::ffi::OsString::from(&self.info.serial),
        };
        let mount_point = mount_prefix.join(basename);

        if let Err(err) = fs.mount(&self.dev_path, &mount_point) {
            self.mark_failed();
            return Err(self.adapter_error("mount", err));
        }

        info!(
            "mounted device '{}' at {:?}",
            self.info.serial, mount_point
        );
        self.op_status = OpStatus::Mounted;
        self.mount_path = Some(mount_point);
        self.assert_invariants();
        Ok(())
    }

    /// Unmount the medium; the device stays LOADED
    ///
    /// Failure leaves the device MOUNTED so the caller may retry or
    /// escalate to FAILED itself.
    pub fn umount(&mut self, fs: &dyn FileSystemAdapter) -> Result<(), LrsError> {
        if self.op_status != OpStatus::Mounted || self.mount_path.is_none() || self.media.is_none()
        {
            return Err(self.invalid_state("umount"));
        }

        let mount_point = self.mount_path.clone().unwrap();
        fs.umount(&self.dev_path, &mount_point)
            .map_err(|err| self.adapter_error("umount", err))?;

        info!("unmounted device '{}'", self.info.serial);
        self.op_status = OpStatus::Loaded;
        self.mount_path = None;
        self.assert_invariants();
        Ok(())
    }

    /// Move the medium back into a free library slot
    ///
    /// The library picks the target slot. On success the owned medium
    /// record is released.
    pub fn unload(&mut self, changer: &mut dyn MediaChanger) -> Result<(), LrsError> {
        if self.op_status != OpStatus::Loaded || self.media.is_none() {
            return Err(self.invalid_state("unload"));
        }

        let slot = match changer.free_slot() {
            Ok(addr) => addr,
            Err(err) => {
                self.mark_failed();
                return Err(self.adapter_error("unload", err));
            }
        };

        if let Err(err) = changer.transfer(self.lib_addr, slot) {
            self.mark_failed();
            return Err(self.adapter_error("unload", err));
        }

        let media = self.media.take();
        info!(
            "unloaded medium '{}' from device '{}'",
            media.map(|m| m.label).unwrap_or_default(),
            self.info.serial
        );
        self.op_status = OpStatus::Empty;
        self.assert_invariants();
        Ok(())
    }

    /// Reserve the mounted device for one caller's I/O
    pub fn reserve(&mut self) -> Result<(), LrsError> {
        if self.op_status != OpStatus::Mounted {
            return Err(self.invalid_state("reserve"));
        }
        self.op_status = OpStatus::Busy;
        self.assert_invariants();
        Ok(())
    }

    /// Give the reservation back; the device stays MOUNTED
    pub fn release(&mut self) -> Result<(), LrsError> {
        if self.op_status != OpStatus::Busy {
            return Err(self.invalid_state("release"));
        }
        self.op_status = OpStatus::Mounted;
        self.assert_invariants();
        Ok(())
    }

    /// Refresh the space counters of the loaded medium
    pub fn update_media_stats(&mut self, stats: MediaStats) -> Result<(), LrsError> {
        match self.media {
            Some(ref mut media) => {
                media.stats = stats;
                Ok(())
            }
            None => Err(self.invalid_state("update stats of")),
        }
    }

    /// Replace the record of the loaded medium (after a format)
    pub fn replace_media_record(&mut self, media: MediaInfo) -> Result<(), LrsError> {
        match self.media {
            Some(ref mut record) => {
                *record = media;
                Ok(())
            }
            None => Err(self.invalid_state("update record of")),
        }
    }
}
