// Write allocation protocol tests

use anyhow::Error;

use phobos_api_types::{FsStatus, OpStatus};

use crate::adapters::MediaChanger;
use crate::lrs::test::{local_device, make_env, tape_media};
use crate::lrs::{IoIntent, LrsError};

#[test]
fn test_write_prepare_full_cycle() -> Result<(), Error> {
    let mut env = make_env("test_write_prepare_full_cycle", &["d0"], &["t1"], &[], 1000)?;
    env.dss.insert_device(local_device("d0"));
    env.dss.insert_media(tape_media("t1", FsStatus::Used, 1000));
    env.fs.provision_media("t1", 1000, 0)?;

    let alloc = env.ctx.write_prepare(500)?;
    assert_eq!(alloc.intent, IoIntent::Write);
    assert_eq!(alloc.serial, "d0");
    assert_eq!(alloc.media_label, "t1");
    assert!(alloc.root_path.is_dir());

    let list = env.ctx.device_list();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].op_status, OpStatus::Busy);
    assert_eq!(list[0].media_label.as_deref(), Some("t1"));

    // measured counters were pushed back to the DSS
    let record = env.dss.media_by_label("t1").unwrap();
    assert_eq!(record.stats.phys_spc_free, 1000);
    assert!(record.stats.last_update > 0);

    env.ctx.done(&alloc, None)?;
    assert_eq!(env.io.flush_count(), 1);

    env.ctx.release(alloc)?;
    assert_eq!(env.ctx.device_list()[0].op_status, OpStatus::Mounted);

    Ok(())
}

#[test]
fn test_write_prepare_reuses_mounted_medium() -> Result<(), Error> {
    let mut env = make_env(
        "test_write_prepare_reuses_mounted_medium",
        &["d0"],
        &["t1"],
        &[],
        1000,
    )?;
    env.dss.insert_device(local_device("d0"));
    env.dss.insert_media(tape_media("t1", FsStatus::Used, 1000));
    env.fs.provision_media("t1", 1000, 0)?;

    let first = env.ctx.write_prepare(100)?;
    let root = first.root_path.clone();
    env.ctx.done(&first, None)?;
    env.ctx.release(first)?;

    // no medium movement needed the second time
    let second = env.ctx.write_prepare(100)?;
    assert_eq!(second.serial, "d0");
    assert_eq!(second.media_label, "t1");
    assert_eq!(second.root_path, root);

    Ok(())
}

#[test]
fn test_write_prepare_mounts_preloaded_medium() -> Result<(), Error> {
    let mut env = make_env(
        "test_write_prepare_mounts_preloaded_medium",
        &["d0"],
        &["t1"],
        &[("d0", "t1")],
        1000,
    )?;
    env.dss.insert_device(local_device("d0"));
    env.dss.insert_media(tape_media("t1", FsStatus::Used, 1000));
    env.fs.provision_media("t1", 1000, 200)?;

    let alloc = env.ctx.write_prepare(500)?;
    assert_eq!(alloc.media_label, "t1");

    // stats were measured on mount, not taken from the DSS record
    let record = env.dss.media_by_label("t1").unwrap();
    assert_eq!(record.stats.phys_spc_used, 200);
    assert_eq!(record.stats.phys_spc_free, 800);

    Ok(())
}

#[test]
fn test_write_prepare_no_space_is_retryable() -> Result<(), Error> {
    let mut env = make_env(
        "test_write_prepare_no_space_is_retryable",
        &["d0"],
        &["t1"],
        &[],
        1000,
    )?;
    env.dss.insert_device(local_device("d0"));
    env.dss.insert_media(tape_media("t1", FsStatus::Used, 1000));
    env.fs.provision_media("t1", 1000, 0)?;

    match env.ctx.write_prepare(2000) {
        Err(err @ LrsError::NoSpaceAvailable(2000)) => assert!(err.is_retryable()),
        other => panic!("expected NoSpaceAvailable, got {:?}", other.err()),
    }
    // nothing was moved
    assert_eq!(env.ctx.device_list()[0].op_status, OpStatus::Empty);

    Ok(())
}

#[test]
fn test_write_prepare_concurrent_callers_get_distinct_devices() -> Result<(), Error> {
    let mut env = make_env(
        "test_write_prepare_concurrent_callers_get_distinct_devices",
        &["d0", "d1"],
        &["t1", "t2"],
        &[],
        1000,
    )?;
    env.dss.insert_device(local_device("d0"));
    env.dss.insert_device(local_device("d1"));
    env.dss.insert_media(tape_media("t1", FsStatus::Used, 1000));
    env.dss.insert_media(tape_media("t2", FsStatus::Used, 1000));
    env.fs.provision_media("t1", 1000, 0)?;
    env.fs.provision_media("t2", 1000, 0)?;

    let first = env.ctx.write_prepare(100)?;
    let second = env.ctx.write_prepare(100)?;

    assert_ne!(first.serial, second.serial);
    assert_ne!(first.media_label, second.media_label);

    Ok(())
}

#[test]
fn test_write_prepare_evicts_full_medium() -> Result<(), Error> {
    let mut env = make_env(
        "test_write_prepare_evicts_full_medium",
        &["d0"],
        &["t1", "t2"],
        &[("d0", "t1")],
        1000,
    )?;
    env.dss.insert_device(local_device("d0"));
    env.dss.insert_media(tape_media("t1", FsStatus::Used, 50));
    env.dss.insert_media(tape_media("t2", FsStatus::Used, 1000));
    env.fs.provision_media("t1", 1000, 950)?;
    env.fs.provision_media("t2", 1000, 0)?;

    // t1 in the only drive is too small, t2 must replace it
    let alloc = env.ctx.write_prepare(500)?;
    assert_eq!(alloc.serial, "d0");
    assert_eq!(alloc.media_label, "t2");

    drop(env.ctx);

    // t1 went back to a storage slot
    let mut changer = crate::adapters::VirtualChanger::open(&env.dir)?;
    let addr = changer.locate_media("t1")?;
    assert!(addr.0 >= 1024, "t1 left in a drive (addr {})", addr);

    Ok(())
}

#[test]
fn test_write_prepare_while_device_busy() -> Result<(), Error> {
    let mut env = make_env(
        "test_write_prepare_while_device_busy",
        &["d0"],
        &["t1"],
        &[],
        1000,
    )?;
    env.dss.insert_device(local_device("d0"));
    env.dss.insert_media(tape_media("t1", FsStatus::Used, 1000));
    env.fs.provision_media("t1", 1000, 0)?;

    let first = env.ctx.write_prepare(500)?;
    assert_eq!(env.ctx.device_list()[0].op_status, OpStatus::Busy);

    // the only device is reserved; a second writer has to retry later
    match env.ctx.write_prepare(2000) {
        Err(err) => assert!(err.is_retryable(), "got non-retryable {:?}", err),
        Ok(alloc) => panic!("unexpected allocation on busy device: {:?}", alloc),
    }

    // after completion the device is allocatable again
    env.ctx.done(&first, None)?;
    env.ctx.release(first)?;

    let second = env.ctx.write_prepare(500)?;
    assert_eq!(second.serial, "d0");
    assert_eq!(second.media_label, "t1");

    Ok(())
}

#[test]
fn test_write_prepare_skips_blank_media() -> Result<(), Error> {
    let mut env = make_env(
        "test_write_prepare_skips_blank_media",
        &["d0"],
        &["t1"],
        &[],
        1000,
    )?;
    env.dss.insert_device(local_device("d0"));
    env.dss.insert_media(tape_media("t1", FsStatus::Blank, 1000));

    assert!(matches!(
        env.ctx.write_prepare(100),
        Err(LrsError::NoSpaceAvailable(100))
    ));

    Ok(())
}
