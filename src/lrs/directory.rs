//! Device directory
//!
//! The process wide table of all devices usable on this host for one
//! medium family. Populated lazily from the DSS and the physical
//! library, mutated in place as operations run. Devices found FAILED
//! stay in the table (excluded by selection filters) until an
//! operator reconciles them out-of-band.

use log::{info, warn};

use phobos_api_types::{AdminStatus, DeviceInfo, MediaFamily, OpStatus};

use crate::adapters::{DeviceLookup, FileSystemAdapter, MediaChanger};
use crate::dss::{DeviceFilter, Dss, MediaFilter};
use crate::lrs::{DeviceDescriptor, LrsError};

#[derive(Default)]
pub struct DeviceDirectory {
    devices: Vec<DeviceDescriptor>,
    populated: bool,
}

impl DeviceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a directory from known descriptors (embedding and tests)
    pub fn from_devices(devices: Vec<DeviceDescriptor>) -> Self {
        Self {
            devices,
            populated: true,
        }
    }

    pub fn is_populated(&self) -> bool {
        self.populated
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn devices(&self) -> &[DeviceDescriptor] {
        &self.devices
    }

    pub fn get(&self, index: usize) -> &DeviceDescriptor {
        &self.devices[index]
    }

    pub fn get_mut(&mut self, index: usize) -> &mut DeviceDescriptor {
        &mut self.devices[index]
    }

    /// Index of the device whose serial matches
    pub fn find_device(&self, serial: &str) -> Option<usize> {
        self.devices.iter().position(|d| d.serial() == serial)
    }

    /// Index of the device currently holding the medium `label`
    pub fn find_media(&self, label: &str) -> Option<usize> {
        self.devices
            .iter()
            .position(|d| d.media().map(|m| m.label.as_str()) == Some(label))
    }

    /// Populate the directory from the DSS and the physical library
    ///
    /// No-op if already populated. A single bad device is marked
    /// FAILED and does not block discovery of the others.
    pub fn refresh(
        &mut self,
        dss: &dyn Dss,
        changer: &mut dyn MediaChanger,
        devs: &dyn DeviceLookup,
        fs: &dyn FileSystemAdapter,
        family: MediaFamily,
        hostname: &str,
    ) -> Result<(), LrsError> {
        if self.populated {
            return Ok(());
        }

        let filter = DeviceFilter {
            host: Some(hostname.to_string()),
            family: Some(family),
            admin_status: Some(AdminStatus::Unlocked),
        };
        let records = dss.get_devices(&filter).map_err(LrsError::Dss)?;

        if records.is_empty() {
            return Err(LrsError::NoDeviceAvailable);
        }

        for record in records {
            let descriptor = match probe_device(&record, dss, changer, devs, fs, family) {
                Ok(descriptor) => descriptor,
                Err(err) => {
                    warn!(
                        "excluding device '{}' from directory: {}",
                        record.serial, err
                    );
                    DeviceDescriptor::discovered_failed(record)
                }
            };
            self.devices.push(descriptor);
        }

        info!(
            "device directory populated with {} {} device(s) on '{}'",
            self.devices.len(),
            family,
            hostname
        );
        self.populated = true;
        Ok(())
    }
}

// query OS and library state for one DSS device record
fn probe_device(
    record: &DeviceInfo,
    dss: &dyn Dss,
    changer: &mut dyn MediaChanger,
    devs: &dyn DeviceLookup,
    fs: &dyn FileSystemAdapter,
    family: MediaFamily,
) -> Result<DeviceDescriptor, LrsError> {
    let adapter_error = |op: &'static str, err: anyhow::Error| LrsError::Device {
        op,
        serial: record.serial.clone(),
        source: err,
    };

    let dev_path = devs
        .lookup(&record.serial)
        .map_err(|err| adapter_error("lookup", err))?;
    let sys_state = devs
        .query(&dev_path)
        .map_err(|err| adapter_error("query", err))?;

    // the DB record must agree with what the OS reports
    if sys_state.serial != record.serial {
        return Err(LrsError::InconsistentDeviceInfo {
            serial: record.serial.clone(),
            reason: format!(
                "serial mismatch ('{}' != '{}')",
                sys_state.serial, record.serial
            ),
        });
    }
    if let (Some(sys_model), Some(db_model)) = (&sys_state.model, &record.model) {
        if sys_model != db_model {
            return Err(LrsError::InconsistentDeviceInfo {
                serial: record.serial.clone(),
                reason: format!("model mismatch ('{}' != '{}')", sys_model, db_model),
            });
        }
    }

    let drive = changer
        .drive_status(&record.serial)
        .map_err(|err| adapter_error("drive status", err))?;

    let label = match drive.loaded_label {
        None => return Ok(DeviceDescriptor::discovered_empty(
            record.clone(),
            dev_path,
            drive.addr,
        )),
        Some(label) => label,
    };

    let media_records = dss
        .get_media(&MediaFilter::by_id(family, &label))
        .map_err(LrsError::Dss)?;
    let media = match media_records.len() {
        1 => media_records.into_iter().next().unwrap(),
        n => {
            return Err(LrsError::MediumLookupFailed {
                label,
                reason: format!("expected exactly one DSS record, got {}", n),
            })
        }
    };

    // loaded; escalate to mounted if the filesystem says so
    match fs
        .mounted(&dev_path)
        .map_err(|err| adapter_error("mount check", err))?
    {
        Some(mount_path) => Ok(DeviceDescriptor::discovered_mounted(
            record.clone(),
            dev_path,
            drive.addr,
            media,
            mount_path,
        )),
        None => Ok(DeviceDescriptor::discovered_loaded(
            record.clone(),
            dev_path,
            drive.addr,
            media,
        )),
    }
}

/// Filter devices by operational status (`Unspecified` matches all)
pub fn status_matches(filter: OpStatus, status: OpStatus) -> bool {
    filter == OpStatus::Unspecified || filter == status
}
