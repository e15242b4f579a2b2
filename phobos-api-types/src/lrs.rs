//! Types for the LRS configuration section

use serde::{Deserialize, Serialize};

use proxmox_schema::{api, ApiStringFormat, Schema, StringSchema};

use crate::{MediaFamily, PHOBOS_SAFE_ID_FORMAT};

pub const LRS_NAME_SCHEMA: Schema = StringSchema::new("LRS instance identifier.")
    .format(&PHOBOS_SAFE_ID_FORMAT)
    .min_length(2)
    .max_length(32)
    .schema();

#[api()]
/// Capacity matching strategy used to pick a device or medium for a write
#[derive(Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitPolicy {
    /// Take the first candidate with enough free space
    FirstFit,
    /// Take the candidate with the smallest sufficient free space
    BestFit,
}

serde_plain::derive_display_from_serialize!(FitPolicy);
serde_plain::derive_fromstr_from_deserialize!(FitPolicy);

impl Default for FitPolicy {
    fn default() -> Self {
        FitPolicy::BestFit
    }
}

pub const FIT_POLICY_FORMAT: ApiStringFormat = ApiStringFormat::VerifyFn(|s| {
    let _: FitPolicy = s.parse()?;
    Ok(())
});

pub const FIT_POLICY_SCHEMA: Schema =
    StringSchema::new("Fit policy ('first_fit' or 'best_fit').")
        .format(&FIT_POLICY_FORMAT)
        .schema();

pub const MOUNT_PREFIX_SCHEMA: Schema =
    StringSchema::new("Directory under which media get mounted.").schema();

#[api(
    properties: {
        name: {
            schema: LRS_NAME_SCHEMA,
        },
        family: {
            type: MediaFamily,
            optional: true,
        },
        policy: {
            schema: FIT_POLICY_SCHEMA,
            optional: true,
        },
        "mount-prefix": {
            schema: MOUNT_PREFIX_SCHEMA,
            optional: true,
        },
    },
)]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
/// LRS configuration section
pub struct LrsConfig {
    pub name: String,
    /// Default family served by this scheduler
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family: Option<MediaFamily>,
    /// Fit policy (defaults to 'best_fit')
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
    /// Mount point prefix (defaults to '/mnt/phobos')
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mount_prefix: Option<String>,
}
