// Device directory discovery tests

use anyhow::Error;

use phobos_api_types::{FsStatus, OpStatus};

use crate::adapters::FileSystemAdapter;
use crate::lrs::test::{local_device, make_env, tape_media};
use crate::lrs::LrsError;

#[test]
fn test_refresh_discovers_device_states() -> Result<(), Error> {
    let mut env = make_env(
        "test_refresh_discovers_device_states",
        &["d0", "d1", "d2"],
        &["t2"],
        &[("d2", "t2")],
        1000,
    )?;
    env.dss.insert_device(local_device("d0"));
    // model disagrees with what the OS reports
    let mut bad = local_device("d1");
    bad.model = Some(String::from("LTO-5"));
    env.dss.insert_device(bad);
    env.dss.insert_device(local_device("d2"));
    env.dss.insert_media(tape_media("t2", FsStatus::Used, 500));

    env.ctx.ensure_refreshed()?;

    let list = env.ctx.device_list();
    assert_eq!(list.len(), 3);

    assert_eq!(list[0].serial, "d0");
    assert_eq!(list[0].op_status, OpStatus::Empty);
    assert!(list[0].media_label.is_none());

    // the mismatching device is kept but excluded
    assert_eq!(list[1].serial, "d1");
    assert_eq!(list[1].op_status, OpStatus::Failed);

    assert_eq!(list[2].serial, "d2");
    assert_eq!(list[2].op_status, OpStatus::Loaded);
    assert_eq!(list[2].media_label.as_deref(), Some("t2"));

    Ok(())
}

#[test]
fn test_refresh_escalates_to_mounted() -> Result<(), Error> {
    let mut env = make_env(
        "test_refresh_escalates_to_mounted",
        &["d0"],
        &["t1"],
        &[("d0", "t1")],
        1000,
    )?;
    env.dss.insert_device(local_device("d0"));
    env.dss.insert_media(tape_media("t1", FsStatus::Used, 500));
    env.fs.provision_media("t1", 1000, 500)?;

    // mount behind the scheduler's back, before discovery runs
    let mount_point = env.dir.join("mnt").join("drive-d0");
    env.fs.mount(&env.dir.join("drive-d0"), &mount_point)?;

    env.ctx.ensure_refreshed()?;

    let list = env.ctx.device_list();
    assert_eq!(list[0].op_status, OpStatus::Mounted);
    assert_eq!(
        list[0].mount_path.as_deref(),
        Some(mount_point.to_string_lossy().as_ref())
    );

    Ok(())
}

#[test]
fn test_refresh_without_device_records_is_retryable() -> Result<(), Error> {
    let mut env = make_env(
        "test_refresh_without_device_records_is_retryable",
        &["d0"],
        &[],
        &[],
        1000,
    )?;

    match env.ctx.ensure_refreshed() {
        Err(err @ LrsError::NoDeviceAvailable) => assert!(err.is_retryable()),
        other => panic!("expected NoDeviceAvailable, got {:?}", other.err()),
    }

    Ok(())
}

#[test]
fn test_refresh_ignores_devices_of_other_hosts() -> Result<(), Error> {
    let mut env = make_env(
        "test_refresh_ignores_devices_of_other_hosts",
        &["d0"],
        &[],
        &[],
        1000,
    )?;
    env.dss.insert_device(local_device("d0"));

    let mut remote = local_device("d9");
    remote.host = String::from("otherhost");
    env.dss.insert_device(remote);

    env.ctx.ensure_refreshed()?;

    let list = env.ctx.device_list();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].serial, "d0");

    Ok(())
}

#[test]
fn test_refresh_loaded_medium_unknown_to_dss() -> Result<(), Error> {
    let mut env = make_env(
        "test_refresh_loaded_medium_unknown_to_dss",
        &["d0"],
        &["t1"],
        &[("d0", "t1")],
        1000,
    )?;
    env.dss.insert_device(local_device("d0"));
    // no medium record for t1

    env.ctx.ensure_refreshed()?;

    let list = env.ctx.device_list();
    assert_eq!(list[0].op_status, OpStatus::Failed);

    Ok(())
}

#[test]
fn test_refresh_runs_once() -> Result<(), Error> {
    let mut env = make_env("test_refresh_runs_once", &["d0"], &[], &[], 1000)?;
    env.dss.insert_device(local_device("d0"));

    env.ctx.ensure_refreshed()?;

    // records added later are not picked up by a populated directory
    env.dss.insert_device(local_device("d1"));
    env.ctx.ensure_refreshed()?;

    assert_eq!(env.ctx.device_list().len(), 1);

    Ok(())
}
