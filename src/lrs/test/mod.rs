// Local resource scheduler tests
//
// # cargo test lrs::test

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Error;

use phobos_api_types::{
    AddrType, AdminStatus, DeviceInfo, FsStatus, FsType, LrsConfig, MediaFamily, MediaInfo,
    MediaStats,
};

use crate::adapters::{MediaChanger, VirtualChanger, VirtualDeviceLookup, VirtualFs, VirtualIoFlush};
use crate::dss::MemDss;
use crate::lrs::SchedulerContext;

mod refresh;
mod select;
mod write_prepare;

fn create_testdir(name: &str) -> Result<PathBuf, Error> {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut testdir: PathBuf = String::from("./target/testout").into();
    testdir.push(std::module_path!());
    testdir.push(name);

    let _ = std::fs::remove_dir_all(&testdir);
    let _ = std::fs::create_dir_all(&testdir);

    Ok(testdir)
}

/// DSS device record matching a virtual changer drive on this host
fn local_device(serial: &str) -> DeviceInfo {
    DeviceInfo {
        serial: serial.to_string(),
        family: MediaFamily::Tape,
        admin_status: AdminStatus::Unlocked,
        host: proxmox_sys::nodename().to_string(),
        model: Some(String::from("VIRTUAL-DRIVE")),
        path: None,
    }
}

fn tape_media(label: &str, fs_status: FsStatus, free: u64) -> MediaInfo {
    MediaInfo {
        family: MediaFamily::Tape,
        label: label.to_string(),
        fs_type: FsType::Ltfs,
        addr_type: AddrType::Hash1,
        admin_status: AdminStatus::Unlocked,
        fs_status,
        stats: MediaStats {
            nb_obj: 0,
            logc_spc_used: 0,
            phys_spc_used: 0,
            phys_spc_free: free,
            last_update: 0,
        },
    }
}

struct TestEnv {
    ctx: SchedulerContext,
    dss: Arc<MemDss>,
    fs: Arc<VirtualFs>,
    io: Arc<VirtualIoFlush>,
    dir: PathBuf,
}

/// Build a scheduler on a freshly provisioned virtual changer
///
/// `preload` moves media from their slots into drives before the
/// scheduler takes the changer lock.
fn make_env(
    name: &str,
    drives: &[&str],
    media: &[&str],
    preload: &[(&str, &str)],
    capacity: u64,
) -> Result<TestEnv, Error> {
    let dir = create_testdir(name)?;
    VirtualChanger::provision(&dir, drives, media)?;

    {
        let mut changer = VirtualChanger::open(&dir)?;
        for (drive, label) in preload {
            let slot = changer.locate_media(label)?;
            let dst = changer.drive_status(drive)?.addr;
            changer.transfer(slot, dst)?;
        }
    }

    let dss = Arc::new(MemDss::new());
    let fs = Arc::new(VirtualFs::new(&dir, capacity));
    let io = Arc::new(VirtualIoFlush::new());

    let config = LrsConfig {
        name: String::from("lrs0"),
        family: Some(MediaFamily::Tape),
        policy: None,
        mount_prefix: Some(dir.join("mnt").to_string_lossy().to_string()),
    };

    let ctx = SchedulerContext::new(
        &config,
        dss.clone(),
        Box::new(VirtualChanger::open(&dir)?),
        Box::new(VirtualDeviceLookup::new(&dir)),
        fs.clone(),
        io.clone(),
    )?;

    Ok(TestEnv {
        ctx,
        dss,
        fs,
        io,
        dir,
    })
}
