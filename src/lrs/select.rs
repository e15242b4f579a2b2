//! Selection policies
//!
//! Pure scan-and-pick functions over the device directory. A policy
//! looks at one candidate at a time, compared against the best
//! candidate found so far, and decides whether to take it, keep
//! scanning, or ignore it.

use phobos_api_types::OpStatus;

use crate::lrs::{status_matches, DeviceDescriptor, DeviceDirectory};

/// Decision of a policy for one candidate device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    /// Take this candidate and stop scanning
    TakeAndStop,
    /// Remember this candidate, keep scanning for a better one
    Take,
    /// Candidate does not qualify
    Ignore,
}

/// Policy signature: (required size, best so far, candidate)
pub type PolicyFn =
    fn(u64, Option<&DeviceDescriptor>, &DeviceDescriptor) -> SelectOutcome;

/// Scan the directory filtered by `status` and apply `policy`
///
/// `OpStatus::Unspecified` scans devices in any state. Returns the
/// index of the selected device, if any.
pub fn select_device(
    directory: &DeviceDirectory,
    status: OpStatus,
    required_size: u64,
    policy: PolicyFn,
) -> Option<usize> {
    let mut best: Option<usize> = None;

    for (index, device) in directory.devices().iter().enumerate() {
        if !status_matches(status, device.op_status()) {
            continue;
        }
        match policy(required_size, best.map(|b| directory.get(b)), device) {
            SelectOutcome::TakeAndStop => return Some(index),
            SelectOutcome::Take => best = Some(index),
            SelectOutcome::Ignore => (),
        }
    }

    best
}

/// First device whose loaded medium has enough free space
pub fn first_fit(
    required_size: u64,
    _best: Option<&DeviceDescriptor>,
    candidate: &DeviceDescriptor,
) -> SelectOutcome {
    match candidate.free_space() {
        Some(free) if free >= required_size => SelectOutcome::TakeAndStop,
        _ => SelectOutcome::Ignore,
    }
}

/// Device with the smallest sufficient free space
///
/// Stops early only on an exact size match, otherwise the whole
/// filtered set is scanned.
pub fn best_fit(
    required_size: u64,
    best: Option<&DeviceDescriptor>,
    candidate: &DeviceDescriptor,
) -> SelectOutcome {
    let free = match candidate.free_space() {
        Some(free) if free >= required_size => free,
        _ => return SelectOutcome::Ignore,
    };

    if free == required_size {
        return SelectOutcome::TakeAndStop;
    }

    match best.and_then(|b| b.free_space()) {
        Some(best_free) if best_free <= free => SelectOutcome::Ignore,
        _ => SelectOutcome::Take,
    }
}

/// First device encountered, regardless of medium
pub fn any_device(
    _required_size: u64,
    _best: Option<&DeviceDescriptor>,
    _candidate: &DeviceDescriptor,
) -> SelectOutcome {
    SelectOutcome::TakeAndStop
}

/// Eviction candidate: the occupied device least useful to keep
///
/// Skips FAILED and BUSY devices; among the remaining loaded or
/// mounted ones, picks the medium with the least free space. Never
/// stops early - the true minimum needs a full scan.
pub fn drive_to_free(
    _required_size: u64,
    best: Option<&DeviceDescriptor>,
    candidate: &DeviceDescriptor,
) -> SelectOutcome {
    match candidate.op_status() {
        OpStatus::Loaded | OpStatus::Mounted => (),
        _ => return SelectOutcome::Ignore,
    }
    let free = match candidate.free_space() {
        Some(free) => free,
        None => return SelectOutcome::Ignore,
    };

    match best.and_then(|b| b.free_space()) {
        Some(best_free) if best_free <= free => SelectOutcome::Ignore,
        _ => SelectOutcome::Take,
    }
}
