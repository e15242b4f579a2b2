//! Resource acquisition protocols
//!
//! `write_prepare`, `read_prepare` and `format` compose the selection
//! policies and the device state machine into one consistent
//! allocation; `done`/`release` are the completion side. The context
//! owns the device directory, the configuration and the adapter
//! handles - no process wide singletons, tests build their own.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use log::{info, warn};

use phobos_api_types::{
    AdminStatus, DeviceListEntry, FitPolicy, FsStatus, FsType, LrsConfig, MediaFamily, MediaInfo,
    OpStatus,
};

use crate::adapters::{DeviceLookup, FileSystemAdapter, IoFlush, MediaChanger};
use crate::dss::{Dss, MediaFilter};
use crate::lrs::{
    any_device, best_fit, drive_to_free, first_fit, select_device, DeviceDescriptor,
    DeviceDirectory, LrsError, PolicyFn, DEFAULT_MOUNT_PREFIX,
};

/// Load the named scheduler section from the configuration file
pub fn load_config(name: &str) -> Result<LrsConfig, LrsError> {
    let data = phobos_config::config().map_err(|err| LrsError::Config(err.to_string()))?;
    data.lookup("lrs", name)
        .map_err(|err| LrsError::Config(err.to_string()))
}

/// What the caller intends to do with an allocated device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoIntent {
    Read,
    Write,
}

/// Location of one extent within a layout
#[derive(Debug, Clone)]
pub struct ExtentLocation {
    /// Label of the medium holding the extent
    pub media_label: String,
    /// Address of the extent on that medium
    pub address: String,
}

/// Caller-held handle to an allocated (BUSY) device
///
/// Returned fully populated or not at all. Pass it to
/// [`SchedulerContext::done`] after I/O, then hand it back through
/// [`SchedulerContext::release`] to end the reservation.
#[derive(Debug)]
pub struct DeviceAlloc {
    pub intent: IoIntent,
    pub serial: String,
    pub media_label: String,
    /// Root path for I/O on the mounted medium
    pub root_path: PathBuf,
}

/// Scheduler state for one (host, family) pair
pub struct SchedulerContext {
    family: MediaFamily,
    policy: FitPolicy,
    mount_prefix: PathBuf,
    hostname: String,
    dss: Arc<dyn Dss>,
    // one physical changer accepts one in-flight command at a time
    changer: Mutex<Box<dyn MediaChanger>>,
    devs: Box<dyn DeviceLookup>,
    fs: Arc<dyn FileSystemAdapter>,
    io: Arc<dyn IoFlush>,
    directory: DeviceDirectory,
}

impl SchedulerContext {
    pub fn new(
        config: &LrsConfig,
        dss: Arc<dyn Dss>,
        changer: Box<dyn MediaChanger>,
        devs: Box<dyn DeviceLookup>,
        fs: Arc<dyn FileSystemAdapter>,
        io: Arc<dyn IoFlush>,
    ) -> Result<Self, LrsError> {
        let family = config
            .family
            .ok_or_else(|| LrsError::Config("no default family configured".to_string()))?;

        let policy = match config.policy {
            Some(ref policy) => policy
                .parse()
                .map_err(|_| LrsError::Config(format!("invalid fit policy '{}'", policy)))?,
            None => FitPolicy::default(),
        };

        let mount_prefix = PathBuf::from(
            config
                .mount_prefix
                .clone()
                .unwrap_or_else(|| DEFAULT_MOUNT_PREFIX.to_string()),
        );

        Ok(Self {
            family,
            policy,
            mount_prefix,
            hostname: proxmox_sys::nodename().to_string(),
            dss,
            changer: Mutex::new(changer),
            devs,
            fs,
            io,
            directory: DeviceDirectory::new(),
        })
    }

    pub fn family(&self) -> MediaFamily {
        self.family
    }

    /// Read-only view of the device directory
    pub fn directory(&self) -> &DeviceDirectory {
        &self.directory
    }

    /// Read-only directory snapshot for monitoring layers
    pub fn device_list(&self) -> Vec<DeviceListEntry> {
        self.directory
            .devices()
            .iter()
            .map(|device| DeviceListEntry {
                serial: device.serial().to_string(),
                op_status: device.op_status(),
                media_label: device.media().map(|m| m.label.clone()),
                mount_path: device
                    .mount_path()
                    .map(|p| p.to_string_lossy().to_string()),
            })
            .collect()
    }

    fn fit_policy(&self) -> PolicyFn {
        match self.policy {
            FitPolicy::FirstFit => first_fit,
            FitPolicy::BestFit => best_fit,
        }
    }

    pub(crate) fn ensure_refreshed(&mut self) -> Result<(), LrsError> {
        if self.directory.is_populated() {
            return Ok(());
        }
        let mut changer = self.changer.lock().unwrap();
        self.directory.refresh(
            self.dss.as_ref(),
            changer.as_mut(),
            self.devs.as_ref(),
            self.fs.as_ref(),
            self.family,
            &self.hostname,
        )
    }

    fn alloc(device: &DeviceDescriptor, intent: IoIntent) -> Result<DeviceAlloc, LrsError> {
        let invalid = || LrsError::InvalidDeviceState {
            serial: device.serial().to_string(),
            status: device.op_status(),
            op: "allocate",
        };
        let media = device.media().ok_or_else(invalid)?;
        let root_path = device.mount_path().ok_or_else(invalid)?.to_owned();

        Ok(DeviceAlloc {
            intent,
            serial: device.serial().to_string(),
            media_label: media.label.clone(),
            root_path,
        })
    }

    // Fetch exactly one medium record from the DSS
    fn fetch_media_record(&self, label: &str) -> Result<MediaInfo, LrsError> {
        let records = self
            .dss
            .get_media(&MediaFilter::by_id(self.family, label))
            .map_err(LrsError::Dss)?;
        match records.len() {
            1 => Ok(records.into_iter().next().unwrap()),
            n => Err(LrsError::MediumLookupFailed {
                label: label.to_string(),
                reason: format!("expected exactly one DSS record, got {}", n),
            }),
        }
    }

    // Best-fit at the DSS layer: writable medium with the smallest
    // sufficient free space, skipping media already inside a device
    fn select_media(&self, required_size: u64) -> Result<MediaInfo, LrsError> {
        let filter = MediaFilter {
            family: Some(self.family),
            admin_status: Some(AdminStatus::Unlocked),
            min_phys_spc_free: Some(required_size),
            exclude_fs_status: vec![FsStatus::Blank, FsStatus::Full],
            ..Default::default()
        };

        let mut best: Option<MediaInfo> = None;
        for media in self.dss.get_media(&filter).map_err(LrsError::Dss)? {
            if self.directory.find_media(&media.label).is_some() {
                continue;
            }
            match best {
                Some(ref current)
                    if current.stats.phys_spc_free <= media.stats.phys_spc_free => {}
                _ => best = Some(media),
            }
        }

        best.ok_or(LrsError::NoSpaceAvailable(required_size))
    }

    // Measure the mounted medium and push the counters to the DSS
    fn push_media_stats(&mut self, index: usize) -> Result<(), LrsError> {
        let device = self.directory.get_mut(index);
        let invalid = |op| LrsError::InvalidDeviceState {
            serial: device.serial().to_string(),
            status: device.op_status(),
            op,
        };

        let mount_path = match device.mount_path() {
            Some(path) => path.to_owned(),
            None => return Err(invalid("measure")),
        };
        let mut media = match device.media() {
            Some(media) => media.clone(),
            None => return Err(invalid("measure")),
        };

        let usage = self.fs.df(&mount_path).map_err(|err| LrsError::Device {
            op: "df",
            serial: device.serial().to_string(),
            source: err,
        })?;

        let mut stats = media.stats.clone();
        stats.phys_spc_used = usage.used;
        stats.phys_spc_free = usage.free;
        stats.last_update = proxmox_time::epoch_i64();

        device.update_media_stats(stats.clone())?;
        media.stats = stats;
        self.dss.update_media(&[media]).map_err(LrsError::Dss)
    }

    /// Drive one occupied device back to EMPTY and return its index
    ///
    /// Retries over eviction candidates; a device failing any step is
    /// marked FAILED and a different one is tried, bounded by the
    /// directory size.
    fn free_one_device(&mut self) -> Result<usize, LrsError> {
        for _ in 0..self.directory.len() {
            let index = match select_device(&self.directory, OpStatus::Unspecified, 0, drive_to_free)
            {
                Some(index) => index,
                None => break,
            };

            let device = self.directory.get_mut(index);

            if device.op_status() == OpStatus::Mounted {
                if let Err(err) = device.umount(self.fs.as_ref()) {
                    warn!("eviction of device '{}' failed: {}", device.serial(), err);
                    device.mark_failed();
                    continue;
                }
            }

            let mut changer = self.changer.lock().unwrap();
            match device.unload(changer.as_mut()) {
                Ok(()) => return Ok(index),
                Err(err) => {
                    // unload already marked the device FAILED
                    warn!("eviction of device '{}' failed: {}", device.serial(), err);
                    continue;
                }
            }
        }
        Err(LrsError::NoDeviceAvailable)
    }

    // Find an EMPTY device or make one by eviction
    fn get_empty_device(&mut self) -> Result<usize, LrsError> {
        match select_device(&self.directory, OpStatus::Empty, 0, any_device) {
            Some(index) => Ok(index),
            None => self.free_one_device(),
        }
    }

    // Load `media` into an empty (possibly evicted) device and mount it
    fn load_and_mount(&mut self, media: MediaInfo) -> Result<usize, LrsError> {
        let index = self.get_empty_device()?;

        let device = self.directory.get_mut(index);
        {
            let mut changer = self.changer.lock().unwrap();
            device.load(changer.as_mut(), media)?;
        }
        device.mount(self.fs.as_ref(), &self.mount_prefix)?;

        Ok(index)
    }

    /// Acquire a device with a mounted medium holding at least
    /// `required_size` bytes of free space
    ///
    /// The returned device is BUSY (exclusively reserved) until
    /// [`release`](Self::release) is called.
    pub fn write_prepare(&mut self, required_size: u64) -> Result<DeviceAlloc, LrsError> {
        self.ensure_refreshed()?;
        let policy = self.fit_policy();

        // fast path: an already mounted medium with enough room, no
        // medium move involved
        if let Some(index) =
            select_device(&self.directory, OpStatus::Mounted, required_size, policy)
        {
            let device = self.directory.get_mut(index);
            device.reserve()?;
            info!(
                "write prepare: reusing mounted medium on device '{}'",
                device.serial()
            );
            return Self::alloc(device, IoIntent::Write);
        }

        // a loaded medium only needs a mount
        if let Some(index) =
            select_device(&self.directory, OpStatus::Loaded, required_size, policy)
        {
            let device = self.directory.get_mut(index);
            device.mount(self.fs.as_ref(), &self.mount_prefix)?;
            self.push_media_stats(index)?;

            let device = self.directory.get_mut(index);
            device.reserve()?;
            info!(
                "write prepare: mounted loaded medium on device '{}'",
                device.serial()
            );
            return Self::alloc(device, IoIntent::Write);
        }

        // nothing usable in a device: pick a medium from the DSS and
        // bring it online. The medium record is owned by this frame
        // until load() attaches it; any failure before that drops it.
        let media = self.select_media(required_size)?;
        let label = media.label.clone();

        let index = self.load_and_mount(media)?;
        self.push_media_stats(index)?;

        let device = self.directory.get_mut(index);
        device.reserve()?;
        info!(
            "write prepare: loaded medium '{}' into device '{}'",
            label,
            device.serial()
        );
        Self::alloc(device, IoIntent::Write)
    }

    /// Acquire the device holding the medium a layout points to
    ///
    /// Reads address a known extent: the layout must resolve to
    /// exactly one medium, and no capacity search is involved.
    pub fn read_prepare(&mut self, layout: &[ExtentLocation]) -> Result<DeviceAlloc, LrsError> {
        if layout.len() != 1 {
            return Err(LrsError::InvalidLayout(format!(
                "expected exactly one extent, got {}",
                layout.len()
            )));
        }
        let label = &layout[0].media_label;

        self.ensure_refreshed()?;

        // reuse the device already holding the medium, if any
        if let Some(index) = self.directory.find_media(label) {
            let device = self.directory.get_mut(index);
            match device.op_status() {
                OpStatus::Mounted => (),
                OpStatus::Loaded => {
                    device.mount(self.fs.as_ref(), &self.mount_prefix)?;
                }
                // another caller holds it; retryable
                OpStatus::Busy => return Err(LrsError::NoDeviceAvailable),
                status => {
                    return Err(LrsError::InvalidDeviceState {
                        serial: device.serial().to_string(),
                        status,
                        op: "read from",
                    })
                }
            }

            let device = self.directory.get_mut(index);
            device.reserve()?;
            return Self::alloc(device, IoIntent::Read);
        }

        let media = self.fetch_media_record(label)?;
        let index = self.load_and_mount(media)?;

        let device = self.directory.get_mut(index);
        device.reserve()?;
        info!(
            "read prepare: loaded medium '{}' into device '{}'",
            label,
            device.serial()
        );
        Self::alloc(device, IoIntent::Read)
    }

    /// Format a blank medium to the given filesystem
    ///
    /// Only LTFS is supported. On success the DSS record moves to
    /// `fs_status=empty` with measured space counters; `unlock`
    /// additionally clears the admin lock.
    pub fn format(&mut self, label: &str, fs_type: FsType, unlock: bool) -> Result<(), LrsError> {
        if fs_type != FsType::Ltfs {
            return Err(LrsError::UnsupportedFilesystem(fs_type));
        }

        self.ensure_refreshed()?;

        let media = self.fetch_media_record(label)?;
        if media.fs_status != FsStatus::Blank {
            return Err(LrsError::MediumNotBlank(label.to_string()));
        }

        // get the medium into a device; it may already sit in one
        let index = match self.directory.find_media(label) {
            Some(index) => {
                let device = self.directory.get(index);
                match device.op_status() {
                    OpStatus::Loaded => index,
                    status => {
                        return Err(LrsError::InvalidDeviceState {
                            serial: device.serial().to_string(),
                            status,
                            op: "format in",
                        })
                    }
                }
            }
            None => {
                let index = self.get_empty_device()?;
                let device = self.directory.get_mut(index);
                let mut changer = self.changer.lock().unwrap();
                device.load(changer.as_mut(), media.clone())?;
                index
            }
        };

        let device = self.directory.get_mut(index);

        self.fs
            .format(device.dev_path(), label)
            .map_err(|err| LrsError::Device {
                op: "format",
                serial: device.serial().to_string(),
                source: err,
            })?;

        // mount once to measure the fresh filesystem
        device.mount(self.fs.as_ref(), &self.mount_prefix)?;
        let mount_path = device.mount_path().map(Path::to_owned);
        let usage = match mount_path {
            Some(ref path) => self.fs.df(path).map_err(|err| LrsError::Device {
                op: "df",
                serial: device.serial().to_string(),
                source: err,
            })?,
            None => {
                return Err(LrsError::InvalidDeviceState {
                    serial: device.serial().to_string(),
                    status: device.op_status(),
                    op: "measure",
                })
            }
        };

        let mut updated = media;
        updated.fs_status = FsStatus::Empty;
        updated.stats.phys_spc_used = usage.used;
        updated.stats.phys_spc_free = usage.free;
        updated.stats.last_update = proxmox_time::epoch_i64();
        if unlock {
            updated.admin_status = AdminStatus::Unlocked;
        }

        device.replace_media_record(updated.clone())?;

        // the format already succeeded, unmounting is best effort
        if let Err(err) = device.umount(self.fs.as_ref()) {
            warn!(
                "leaving device '{}' mounted after format: {}",
                device.serial(),
                err
            );
        }

        // a failure past this point means DSS and medium disagree;
        // the operator has to reconcile
        self.dss.update_media(&[updated]).map_err(LrsError::Dss)?;

        info!("formatted medium '{}' as {}", label, fs_type);
        Ok(())
    }

    /// Completion protocol: flush a write intent's medium
    ///
    /// A no-op for read intents. The device state is left exactly as
    /// it was; call [`release`](Self::release) to end the
    /// reservation.
    pub fn done(
        &self,
        alloc: &DeviceAlloc,
        io_error: Option<anyhow::Error>,
    ) -> Result<(), LrsError> {
        if let Some(err) = io_error {
            warn!(
                "I/O on medium '{}' reported failure: {}",
                alloc.media_label, err
            );
        }

        match alloc.intent {
            IoIntent::Read => Ok(()),
            IoIntent::Write => self.io.flush(&alloc.root_path).map_err(|err| LrsError::Device {
                op: "flush",
                serial: alloc.serial.clone(),
                source: err,
            }),
        }
    }

    /// End a reservation; the device returns to MOUNTED
    ///
    /// Consumes the handle, so the root path cannot be used after.
    pub fn release(&mut self, alloc: DeviceAlloc) -> Result<(), LrsError> {
        let index = match self.directory.find_device(&alloc.serial) {
            Some(index) => index,
            None => {
                return Err(LrsError::InvalidDeviceState {
                    serial: alloc.serial.clone(),
                    status: OpStatus::Unspecified,
                    op: "release",
                })
            }
        };
        self.directory.get_mut(index).release()
    }
}
