//! Basic API types shared by the Phobos LRS crates.

use proxmox_schema::{const_regex, ApiStringFormat, Schema, StringSchema};

const_regex! {
    pub PHOBOS_SAFE_ID_REGEX = r"^(?:[A-Za-z0-9_][A-Za-z0-9._\-]*)$";
    pub HOSTNAME_REGEX = r"^(?:[a-zA-Z0-9](?:[a-zA-Z0-9\-]*[a-zA-Z0-9])?)$";
}

pub const PHOBOS_SAFE_ID_FORMAT: ApiStringFormat =
    ApiStringFormat::Pattern(&PHOBOS_SAFE_ID_REGEX);

pub const HOSTNAME_FORMAT: ApiStringFormat = ApiStringFormat::Pattern(&HOSTNAME_REGEX);

pub const HOSTNAME_SCHEMA: Schema = StringSchema::new("Hostname (without domain part).")
    .format(&HOSTNAME_FORMAT)
    .schema();

mod device;
pub use device::*;

mod media;
pub use media::*;

mod lrs;
pub use lrs::*;
