//! Types describing media (tapes, directories, pools) stored in the DSS

use serde::{Deserialize, Serialize};

use proxmox_schema::{api, Schema, StringSchema};

use crate::{AdminStatus, MediaFamily, PHOBOS_SAFE_ID_FORMAT};

pub const MEDIA_LABEL_SCHEMA: Schema = StringSchema::new("Media label text (or Barcode).")
    .format(&PHOBOS_SAFE_ID_FORMAT)
    .min_length(1)
    .max_length(32)
    .schema();

#[api()]
/// Filesystem type used on a medium
#[derive(Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FsType {
    /// Plain POSIX filesystem (dir family)
    Posix,
    /// Linear Tape File System (tape family)
    Ltfs,
}

serde_plain::derive_display_from_serialize!(FsType);
serde_plain::derive_fromstr_from_deserialize!(FsType);

#[api()]
/// How extents are addressed on a medium
#[derive(Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddrType {
    /// Address is a path relative to the medium root
    Path,
    /// Address is a hash-based path
    Hash1,
    /// Address is opaque to upper layers
    Opaque,
}

#[api()]
/// Filesystem status of a medium
#[derive(Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FsStatus {
    /// Medium has no filesystem yet, must be formatted before use
    Blank,
    /// Filesystem present, contains no object
    Empty,
    /// Filesystem present, contains objects, space left
    Used,
    /// Medium is full, excluded from write candidate search
    Full,
}

serde_plain::derive_display_from_serialize!(FsStatus);

#[api()]
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
/// Space accounting for a medium
pub struct MediaStats {
    /// Number of objects stored
    pub nb_obj: u64,
    /// Logical space used by object data
    pub logc_spc_used: u64,
    /// Physical space used on the medium
    pub phys_spc_used: u64,
    /// Physical space left on the medium
    pub phys_spc_free: u64,
    /// Timestamp of the last stats refresh (unix epoch)
    pub last_update: i64,
}

#[api(
    properties: {
        label: {
            schema: MEDIA_LABEL_SCHEMA,
        },
        family: {
            type: MediaFamily,
        },
        "fs-type": {
            type: FsType,
        },
        "addr-type": {
            type: AddrType,
        },
        "admin-status": {
            type: AdminStatus,
        },
        "fs-status": {
            type: FsStatus,
        },
        stats: {
            type: MediaStats,
        },
    },
)]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
/// Medium record as stored in the DSS
///
/// `(family, label)` is the unique key.
pub struct MediaInfo {
    pub family: MediaFamily,
    pub label: String,
    pub fs_type: FsType,
    pub addr_type: AddrType,
    pub admin_status: AdminStatus,
    pub fs_status: FsStatus,
    pub stats: MediaStats,
}

impl MediaInfo {
    /// Unique key of this medium
    pub fn id(&self) -> (MediaFamily, &str) {
        (self.family, &self.label)
    }
}
