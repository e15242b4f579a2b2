//! Interface to the Distributed State Service (DSS)
//!
//! The DSS is the database backed catalog of devices and media. The
//! scheduler treats it as a remote source of truth: it refreshes the
//! device directory from it and writes medium updates back. Queries
//! are expressed as typed filters; every field present in a filter is
//! an AND-ed criterion.

use anyhow::Error;

use phobos_api_types::{AdminStatus, DeviceInfo, FsStatus, MediaFamily, MediaInfo};

mod mem;
pub use mem::*;

/// Criteria for a device query (all present fields must match)
#[derive(Debug, Default, Clone)]
pub struct DeviceFilter {
    /// `host == value`
    pub host: Option<String>,
    /// `family == value`
    pub family: Option<MediaFamily>,
    /// `admin_status == value`
    pub admin_status: Option<AdminStatus>,
}

/// Criteria for a media query (all present fields must match)
#[derive(Debug, Default, Clone)]
pub struct MediaFilter {
    /// `family == value`
    pub family: Option<MediaFamily>,
    /// `label == value`
    pub label: Option<String>,
    /// `admin_status == value`
    pub admin_status: Option<AdminStatus>,
    /// `stats.phys_spc_free >= value`
    pub min_phys_spc_free: Option<u64>,
    /// `fs_status NOT IN set`
    pub exclude_fs_status: Vec<FsStatus>,
}

impl MediaFilter {
    /// Filter selecting exactly one medium by its unique key
    pub fn by_id(family: MediaFamily, label: &str) -> Self {
        MediaFilter {
            family: Some(family),
            label: Some(label.to_string()),
            ..Default::default()
        }
    }

    pub fn matches(&self, media: &MediaInfo) -> bool {
        if let Some(family) = self.family {
            if media.family != family {
                return false;
            }
        }
        if let Some(ref label) = self.label {
            if &media.label != label {
                return false;
            }
        }
        if let Some(admin_status) = self.admin_status {
            if media.admin_status != admin_status {
                return false;
            }
        }
        if let Some(min_free) = self.min_phys_spc_free {
            if media.stats.phys_spc_free < min_free {
                return false;
            }
        }
        if self.exclude_fs_status.contains(&media.fs_status) {
            return false;
        }
        true
    }
}

impl DeviceFilter {
    pub fn matches(&self, device: &DeviceInfo) -> bool {
        if let Some(ref host) = self.host {
            if &device.host != host {
                return false;
            }
        }
        if let Some(family) = self.family {
            if device.family != family {
                return false;
            }
        }
        if let Some(admin_status) = self.admin_status {
            if device.admin_status != admin_status {
                return false;
            }
        }
        true
    }
}

/// DSS client interface
pub trait Dss {
    /// List device records matching the filter
    fn get_devices(&self, filter: &DeviceFilter) -> Result<Vec<DeviceInfo>, Error>;

    /// List medium records matching the filter
    fn get_media(&self, filter: &MediaFilter) -> Result<Vec<MediaInfo>, Error>;

    /// Update existing medium records
    fn update_media(&self, media: &[MediaInfo]) -> Result<(), Error>;
}
