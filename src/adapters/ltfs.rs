//! LTFS filesystem adapter for the 'tape' family
//!
//! Drives the `ltfs`/`mkltfs` userspace tools; mount state is read
//! back from /proc/mounts.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{format_err, Error};

use crate::adapters::{statvfs_usage, FileSystemAdapter, FsUsage};

const PROC_MOUNTS: &str = "/proc/mounts";

#[derive(Default)]
pub struct LtfsFs;

impl LtfsFs {
    pub fn new() -> Self {
        LtfsFs
    }
}

impl FileSystemAdapter for LtfsFs {
    fn mount(&self, device_path: &Path, mount_point: &Path) -> Result<(), Error> {
        std::fs::create_dir_all(mount_point)?;

        let mut command = Command::new("ltfs");
        command.arg("-o");
        command.arg(format!("devname={}", device_path.display()));
        command.arg(mount_point);

        proxmox_sys::command::run_command(command, None)?;
        Ok(())
    }

    fn umount(&self, _device_path: &Path, mount_point: &Path) -> Result<(), Error> {
        let mut command = Command::new("umount");
        command.arg(mount_point);

        proxmox_sys::command::run_command(command, None)?;
        Ok(())
    }

    fn format(&self, device_path: &Path, label: &str) -> Result<(), Error> {
        let mut command = Command::new("mkltfs");
        command.args(["-d", &device_path.display().to_string()]);
        command.args(["-n", label]);
        command.arg("-f");

        proxmox_sys::command::run_command(command, None)?;
        Ok(())
    }

    fn mounted(&self, device_path: &Path) -> Result<Option<PathBuf>, Error> {
        let device = device_path.display().to_string();
        let data = proxmox_sys::fs::file_read_optional_string(PROC_MOUNTS)?
            .ok_or_else(|| format_err!("unable to read {}", PROC_MOUNTS))?;

        for line in data.lines() {
            let mut parts = line.split_ascii_whitespace();
            let source = parts.next();
            let target = parts.next();
            let fstype = parts.next();
            if fstype != Some("ltfs") {
                continue;
            }
            // ltfs reports 'ltfs:<devname>' as mount source
            match source {
                Some(source) if source == device || source.ends_with(&device) => {
                    if let Some(target) = target {
                        return Ok(Some(PathBuf::from(target)));
                    }
                }
                _ => continue,
            }
        }
        Ok(None)
    }

    fn df(&self, mount_point: &Path) -> Result<FsUsage, Error> {
        statvfs_usage(mount_point)
    }
}
