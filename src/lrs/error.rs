use thiserror::Error;

use phobos_api_types::{FsType, OpStatus};

/// Errors returned by the scheduler protocols
#[derive(Debug, Error)]
pub enum LrsError {
    /// Required configuration missing or invalid
    #[error("missing or invalid configuration: {0}")]
    Config(String),

    /// No usable device on this host right now (retryable)
    #[error("no device available")]
    NoDeviceAvailable,

    /// No medium with enough free space right now (retryable)
    #[error("no space available for {0} bytes")]
    NoSpaceAvailable(u64),

    /// DSS record disagrees with the live system/library state
    #[error("device '{serial}': DSS record disagrees with system state - {reason}")]
    InconsistentDeviceInfo { serial: String, reason: String },

    /// A state machine precondition was violated
    #[error("cannot {op} device '{serial}' in state '{status}'")]
    InvalidDeviceState {
        serial: String,
        status: OpStatus,
        op: &'static str,
    },

    /// The DSS does not know exactly one medium with this label
    #[error("medium lookup for '{label}' failed: {reason}")]
    MediumLookupFailed { label: String, reason: String },

    /// Layout metadata does not resolve to exactly one medium
    #[error("invalid layout: {0}")]
    InvalidLayout(String),

    /// Format only supports LTFS
    #[error("unsupported filesystem '{0}'")]
    UnsupportedFilesystem(FsType),

    /// Format requires a blank medium
    #[error("medium '{0}' is not blank")]
    MediumNotBlank(String),

    /// An adapter operation failed on a specific device
    #[error("{op} failed on device '{serial}': {source}")]
    Device {
        op: &'static str,
        serial: String,
        #[source]
        source: anyhow::Error,
    },

    /// A DSS request failed
    #[error("DSS request failed: {0}")]
    Dss(#[source] anyhow::Error),
}

impl LrsError {
    /// Transient resource exhaustion, the caller may retry later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LrsError::NoDeviceAvailable | LrsError::NoSpaceAvailable(_)
        )
    }
}
