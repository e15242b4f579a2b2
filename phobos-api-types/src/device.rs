//! Types describing devices (drives, directories) known to the LRS

use serde::{Deserialize, Serialize};

use proxmox_schema::{api, Schema, StringSchema};

use crate::PHOBOS_SAFE_ID_FORMAT;

pub const DEVICE_SERIAL_SCHEMA: Schema = StringSchema::new("Device serial number.")
    .format(&PHOBOS_SAFE_ID_FORMAT)
    .min_length(1)
    .max_length(64)
    .schema();

#[api()]
/// Family of a medium or of the devices able to host it
#[derive(Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFamily {
    /// Magnetic tape cartridges, handled through a tape library
    Tape,
    /// Plain POSIX directories
    Dir,
    /// RADOS object store pools
    #[serde(rename = "rados-pool")]
    RadosPool,
}

serde_plain::derive_display_from_serialize!(MediaFamily);
serde_plain::derive_fromstr_from_deserialize!(MediaFamily);

#[api()]
/// Administrative status of a device or medium
#[derive(Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminStatus {
    /// Resource may be used
    Unlocked,
    /// Resource is administratively excluded from use
    Locked,
}

serde_plain::derive_display_from_serialize!(AdminStatus);

#[api()]
/// Operational status of a device, as tracked by the LRS
///
/// Only the scheduler state machine may move a device between these
/// states. `Unspecified` is a wildcard for selection filters and never
/// a real device state.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpStatus {
    /// No medium inside the device
    Empty,
    /// A medium is loaded but not mounted
    Loaded,
    /// The loaded medium is mounted and ready for I/O
    Mounted,
    /// Mounted and reserved for a caller's I/O
    Busy,
    /// Device is unusable until an operator intervenes
    Failed,
    /// Wildcard, matches any status in selection filters
    Unspecified,
}

serde_plain::derive_display_from_serialize!(OpStatus);

#[api(
    properties: {
        serial: {
            schema: DEVICE_SERIAL_SCHEMA,
        },
        family: {
            type: MediaFamily,
        },
        "admin-status": {
            type: AdminStatus,
        },
    },
)]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
/// Device record as stored in the DSS
pub struct DeviceInfo {
    pub serial: String,
    pub family: MediaFamily,
    pub admin_status: AdminStatus,
    /// Host owning the device
    pub host: String,
    /// Vendor model string
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Optional path hint (directories use their path as device path)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Result of querying the OS about a device path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceState {
    pub family: MediaFamily,
    pub serial: String,
    pub model: Option<String>,
}

#[api(
    properties: {
        serial: {
            schema: DEVICE_SERIAL_SCHEMA,
        },
        "op-status": {
            type: OpStatus,
        },
    },
)]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
/// Read-only device directory snapshot entry (for monitoring layers)
pub struct DeviceListEntry {
    pub serial: String,
    pub op_status: OpStatus,
    /// Label of the loaded medium, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_label: Option<String>,
    /// Mount point, if mounted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mount_path: Option<String>,
}
