// Selection policy tests

use std::path::PathBuf;

use phobos_api_types::{FsStatus, OpStatus};

use crate::adapters::ElementAddr;
use crate::lrs::test::{local_device, tape_media};
use crate::lrs::{
    any_device, best_fit, drive_to_free, first_fit, select_device, DeviceDescriptor,
    DeviceDirectory,
};

fn loaded_device(serial: &str, free: u64) -> DeviceDescriptor {
    DeviceDescriptor::discovered_loaded(
        local_device(serial),
        PathBuf::from(format!("/dev/{}", serial)),
        ElementAddr(1),
        tape_media(&format!("m-{}", serial), FsStatus::Used, free),
    )
}

fn mounted_device(serial: &str, free: u64) -> DeviceDescriptor {
    DeviceDescriptor::discovered_mounted(
        local_device(serial),
        PathBuf::from(format!("/dev/{}", serial)),
        ElementAddr(1),
        tape_media(&format!("m-{}", serial), FsStatus::Used, free),
        PathBuf::from(format!("/mnt/phobos/{}", serial)),
    )
}

#[test]
fn test_best_fit_picks_smallest_sufficient() {
    let directory = DeviceDirectory::from_devices(vec![
        loaded_device("d0", 50),
        loaded_device("d1", 80),
        loaded_device("d2", 100),
    ]);

    let index = select_device(&directory, OpStatus::Loaded, 60, best_fit);
    assert_eq!(index, Some(1));
}

#[test]
fn test_best_fit_stops_on_exact_match() {
    let directory = DeviceDirectory::from_devices(vec![
        loaded_device("d0", 80),
        loaded_device("d1", 60),
        loaded_device("d2", 70),
    ]);

    let index = select_device(&directory, OpStatus::Loaded, 60, best_fit);
    assert_eq!(index, Some(1));
}

#[test]
fn test_best_fit_no_candidate() {
    let directory =
        DeviceDirectory::from_devices(vec![loaded_device("d0", 10), loaded_device("d1", 20)]);

    assert_eq!(select_device(&directory, OpStatus::Loaded, 60, best_fit), None);
}

#[test]
fn test_first_fit_takes_first_sufficient() {
    let directory = DeviceDirectory::from_devices(vec![
        loaded_device("d0", 50),
        loaded_device("d1", 80),
        loaded_device("d2", 100),
    ]);

    // 50 is skipped, 80 is taken immediately, 100 never looked at
    let index = select_device(&directory, OpStatus::Loaded, 60, first_fit);
    assert_eq!(index, Some(1));
}

#[test]
fn test_first_fit_does_not_prefer_better_later_match() {
    let directory =
        DeviceDirectory::from_devices(vec![loaded_device("d0", 100), loaded_device("d1", 80)]);

    let index = select_device(&directory, OpStatus::Loaded, 60, first_fit);
    assert_eq!(index, Some(0));
}

#[test]
fn test_any_device_ignores_capacity() {
    let directory = DeviceDirectory::from_devices(vec![
        loaded_device("d0", 50),
        DeviceDescriptor::discovered_empty(
            local_device("d1"),
            PathBuf::from("/dev/d1"),
            ElementAddr(2),
        ),
    ]);

    let index = select_device(&directory, OpStatus::Empty, 0, any_device);
    assert_eq!(index, Some(1));
}

#[test]
fn test_eviction_picks_minimum_free_space() {
    let directory = DeviceDirectory::from_devices(vec![
        loaded_device("d0", 10),
        mounted_device("d1", 5),
        loaded_device("d2", 20),
    ]);

    let index = select_device(&directory, OpStatus::Unspecified, 0, drive_to_free);
    assert_eq!(index, Some(1));
}

#[test]
fn test_eviction_skips_busy_and_failed() {
    let mut busy = mounted_device("d0", 1);
    busy.reserve().unwrap();

    let directory = DeviceDirectory::from_devices(vec![
        busy,
        DeviceDescriptor::discovered_failed(local_device("d1")),
        loaded_device("d2", 20),
        loaded_device("d3", 5),
    ]);

    let index = select_device(&directory, OpStatus::Unspecified, 0, drive_to_free);
    assert_eq!(index, Some(3));
}

#[test]
fn test_eviction_none_available() {
    let mut busy = mounted_device("d0", 1);
    busy.reserve().unwrap();

    let directory = DeviceDirectory::from_devices(vec![
        busy,
        DeviceDescriptor::discovered_empty(
            local_device("d1"),
            PathBuf::from("/dev/d1"),
            ElementAddr(2),
        ),
    ]);

    assert_eq!(
        select_device(&directory, OpStatus::Unspecified, 0, drive_to_free),
        None
    );
}
