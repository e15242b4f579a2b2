//! LRS configuration file handling
//!
//! This module is based on [`SectionConfig`], and provides a type safe
//! interface to store [`LrsConfig`] sections.
//!
//! [LrsConfig]: phobos_api_types::LrsConfig
//! [SectionConfig]: proxmox_section_config::SectionConfig

use std::fs::File;
use std::time::Duration;

use anyhow::Error;
use lazy_static::lazy_static;

use proxmox_schema::{ApiType, Schema};
use proxmox_section_config::{SectionConfig, SectionConfigData, SectionConfigPlugin};
use proxmox_sys::fs::CreateOptions;

use phobos_api_types::{LrsConfig, LRS_NAME_SCHEMA};

lazy_static! {
    /// Static [`SectionConfig`] to access parser/writer functions.
    pub static ref CONFIG: SectionConfig = init();
}

fn init() -> SectionConfig {
    let mut config = SectionConfig::new(&LRS_NAME_SCHEMA);

    let obj_schema = match LrsConfig::API_SCHEMA {
        Schema::Object(ref obj_schema) => obj_schema,
        _ => unreachable!(),
    };
    let plugin = SectionConfigPlugin::new("lrs".to_string(), Some("name".to_string()), obj_schema);
    config.register_plugin(plugin);

    config
}

/// Configuration file name
pub const LRS_CFG_FILENAME: &str = "/etc/phobos/lrs.cfg";
/// Lock file name (used to prevent concurrent access)
pub const LRS_CFG_LOCKFILE: &str = "/etc/phobos/.lrs.lck";

/// Get exclusive lock
pub fn lock() -> Result<File, Error> {
    proxmox_sys::fs::open_file_locked(
        LRS_CFG_LOCKFILE,
        Duration::new(10, 0),
        true,
        CreateOptions::new(),
    )
}

/// Read and parse the configuration file
pub fn config() -> Result<SectionConfigData, Error> {
    let content =
        proxmox_sys::fs::file_read_optional_string(LRS_CFG_FILENAME)?.unwrap_or_default();

    CONFIG.parse(LRS_CFG_FILENAME, &content)
}

/// Parse configuration from an arbitrary source (used by tests)
pub fn parse_config(filename: &str, content: &str) -> Result<SectionConfigData, Error> {
    CONFIG.parse(filename, content)
}

/// Save the configuration file
pub fn save_config(config: &SectionConfigData) -> Result<(), Error> {
    let raw = CONFIG.write(LRS_CFG_FILENAME, config)?;
    proxmox_sys::fs::replace_file(LRS_CFG_FILENAME, raw.as_bytes(), CreateOptions::new(), true)?;
    Ok(())
}
